//! Execution engine - applies planned changes with parallelism

use crate::bag::AttributeBag;
use crate::context::{ConfirmCallback, Context, ProgressCallback};
use crate::error::{Error, Result};
use crate::orchestrator::{self, Resource};
use crate::plan::{Action, Change, Plan};
use crate::types::{ChangeResult, ExecuteOptions, ExecuteSummary};
use rayon::prelude::*;

/// Looks up resource implementations by type name.
pub trait Provider: Sync {
    /// Remote client handle shared by all cycles.
    type Client: ?Sized + Sync;

    /// Implementation for a resource type, if the provider has one.
    fn resource(&self, type_name: &str) -> Option<&dyn Resource<Client = Self::Client>>;
}

/// What happened to one change.
#[derive(Debug)]
pub struct ChangeOutcome {
    pub address: String,
    pub resource_type: String,
    pub action: Action,
    pub result: ChangeResult,
    /// Bag after the cycle. Carries an identity even when a create succeeded
    /// remotely but the follow-up read failed.
    pub bag: AttributeBag,
}

/// Result of executing a plan.
#[derive(Debug, Default)]
pub struct ExecuteReport {
    pub summary: ExecuteSummary,
    pub outcomes: Vec<ChangeOutcome>,
}

/// Execute a plan with the given options and callbacks
///
/// # Arguments
/// * `plan` - The changes to apply; no-op changes are ignored
/// * `provider` - Resource implementations by type name
/// * `client` - Remote client shared by every cycle
/// * `ctx` - Cancellation and deadline for the whole run
/// * `opts` - Execution options (dry_run, jobs)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback, asked once for the whole run
pub fn execute<P, Pr, C>(
    plan: Plan,
    provider: &P,
    client: &P::Client,
    ctx: &Context,
    opts: &ExecuteOptions,
    progress: &mut Pr,
    confirm: &mut C,
) -> Result<ExecuteReport>
where
    P: Provider,
    Pr: ProgressCallback,
    C: ConfirmCallback,
{
    let changes: Vec<Change> = plan
        .changes
        .into_iter()
        .filter(|c| c.action.is_change())
        .collect();

    if changes.is_empty() {
        return Ok(ExecuteReport::default());
    }

    if opts.dry_run {
        return Ok(skip_all(changes, "dry run"));
    }

    let prompt = format!("Apply {} change(s)?", changes.len());
    if !confirm.confirm(&prompt)? {
        return Ok(skip_all(changes, "not confirmed"));
    }

    progress.on_batch_start(changes.len());
    let outcomes = if opts.jobs <= 1 || changes.len() == 1 {
        execute_sequential(changes, provider, client, ctx, progress)
    } else {
        execute_parallel(changes, provider, client, ctx, opts.jobs, progress)
    };
    progress.on_batch_complete();

    let mut summary = ExecuteSummary::default();
    for outcome in &outcomes {
        summary.add_result(&outcome.result);
    }

    Ok(ExecuteReport { summary, outcomes })
}

fn skip_all(changes: Vec<Change>, reason: &str) -> ExecuteReport {
    let mut report = ExecuteReport::default();
    for change in changes {
        let result = ChangeResult::Skipped {
            reason: reason.to_string(),
        };
        report.summary.add_result(&result);
        report.outcomes.push(ChangeOutcome {
            address: change.address,
            resource_type: change.resource_type,
            action: change.action,
            result,
            bag: change.bag,
        });
    }
    report
}

fn execute_sequential<P: Provider, Pr: ProgressCallback>(
    changes: Vec<Change>,
    provider: &P,
    client: &P::Client,
    ctx: &Context,
    progress: &mut Pr,
) -> Vec<ChangeOutcome> {
    let mut outcomes = Vec::with_capacity(changes.len());
    for change in changes {
        progress.on_change_start(&change.address, change.action.label());
        let outcome = apply_change(provider, client, ctx, change);
        progress.on_change_complete(&outcome.address, &outcome.result);
        outcomes.push(outcome);
    }
    outcomes
}

/// Execute changes in parallel using rayon
///
/// Progress is reported after the parallel run; the callback is not shared
/// across threads.
fn execute_parallel<P: Provider, Pr: ProgressCallback>(
    changes: Vec<Change>,
    provider: &P,
    client: &P::Client,
    ctx: &Context,
    jobs: usize,
    progress: &mut Pr,
) -> Vec<ChangeOutcome> {
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool,
        Err(e) => {
            log::warn!("failed to create thread pool ({e}), applying sequentially");
            return execute_sequential(changes, provider, client, ctx, progress);
        }
    };

    let outcomes: Vec<ChangeOutcome> = pool.install(|| {
        changes
            .into_par_iter()
            .map(|change| apply_change(provider, client, ctx, change))
            .collect()
    });

    for outcome in &outcomes {
        progress.on_change_complete(&outcome.address, &outcome.result);
    }

    outcomes
}

/// Run one reconciliation cycle for a change
fn apply_change<P: Provider>(
    provider: &P,
    client: &P::Client,
    ctx: &Context,
    change: Change,
) -> ChangeOutcome {
    let Change {
        address,
        resource_type,
        action,
        mut bag,
    } = change;

    let result = match provider.resource(&resource_type) {
        None => ChangeResult::failed(&Error::validation(
            "type",
            format!("unknown resource type {resource_type}"),
        )),
        Some(resource) => match run_cycle(resource, client, ctx, &action, &mut bag) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("{address}: {e}");
                ChangeResult::failed(&e)
            }
        },
    };

    ChangeOutcome {
        address,
        resource_type,
        action,
        result,
        bag,
    }
}

fn run_cycle<C: ?Sized + Sync>(
    resource: &dyn Resource<Client = C>,
    client: &C,
    ctx: &Context,
    action: &Action,
    bag: &mut AttributeBag,
) -> Result<ChangeResult> {
    match action {
        Action::NoOp => Ok(ChangeResult::NoChange),
        Action::Create => {
            orchestrator::create(resource, client, ctx, bag)?;
            Ok(ChangeResult::Created)
        }
        Action::Update { .. } => {
            orchestrator::update(resource, client, ctx, bag)?;
            Ok(ChangeResult::Updated)
        }
        Action::Replace { .. } => {
            orchestrator::delete(resource, client, ctx, bag)?;
            bag.reset_for_create();
            orchestrator::create(resource, client, ctx, bag)?;
            Ok(ChangeResult::Replaced)
        }
        Action::Delete => {
            orchestrator::delete(resource, client, ctx, bag)?;
            Ok(ChangeResult::Deleted)
        }
    }
}
