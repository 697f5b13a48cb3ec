//! Refresh and plan.

use anyhow::{Context as AnyhowContext, Result, anyhow, bail};
use labkit::{Client, GitLabProvider};
use rayon::prelude::*;
use reconcile::{AttributeBag, Change, Context, Plan, Provider, ReadOutcome, orchestrator};

use crate::config::Manifest;
use crate::state::{State, StateEntry};

/// Result of a refresh
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Addresses whose object still exists
    pub present: usize,
    /// Addresses whose object is gone; they were dropped from state
    pub gone: Vec<String>,
}

/// Whether an address falls under `--target` (a type or a full address)
pub fn matches_target(address: &str, target: Option<&str>) -> bool {
    match target {
        None => true,
        Some(t) if t.contains('.') => address == t,
        Some(t) => address.split_once('.').is_some_and(|(ty, _)| ty == t),
    }
}

/// Read every recorded object back from GitLab.
///
/// Entries whose object no longer exists are removed. Any read failure fails
/// the refresh, after the successful reads have been folded in.
pub fn refresh(
    state: &mut State,
    provider: &GitLabProvider,
    client: &Client,
    ctx: &Context,
    jobs: usize,
    target: Option<&str>,
) -> Result<RefreshReport> {
    let entries: Vec<(String, StateEntry)> = state
        .resources
        .iter()
        .filter(|(address, _)| matches_target(address, target))
        .map(|(address, entry)| (address.clone(), entry.clone()))
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create refresh thread pool")?;

    let results: Vec<(String, Result<Option<StateEntry>>)> = pool.install(|| {
        entries
            .into_par_iter()
            .map(|(address, entry)| {
                let result = refresh_entry(provider, client, ctx, &entry);
                (address, result)
            })
            .collect()
    });

    let mut report = RefreshReport::default();
    let mut failures = Vec::new();
    for (address, result) in results {
        match result {
            Ok(Some(entry)) => {
                state.insert(address, entry);
                report.present += 1;
            }
            Ok(None) => {
                log::info!("{address} no longer exists; dropping it from state");
                state.remove(&address);
                report.gone.push(address);
            }
            Err(e) => failures.push(format!("{address}: {e:#}")),
        }
    }

    if !failures.is_empty() {
        bail!(
            "refresh failed for {} resource(s):\n  {}",
            failures.len(),
            failures.join("\n  ")
        );
    }
    Ok(report)
}

fn refresh_entry(
    provider: &GitLabProvider,
    client: &Client,
    ctx: &Context,
    entry: &StateEntry,
) -> Result<Option<StateEntry>> {
    let resource = provider
        .resource(&entry.resource_type)
        .ok_or_else(|| anyhow!("unknown resource type {}", entry.resource_type))?;
    let mut bag = entry.to_bag(resource, None)?;

    match orchestrator::read(resource, client, ctx, &mut bag)? {
        ReadOutcome::Present => Ok(Some(StateEntry::from_bag(&entry.resource_type, &bag))),
        ReadOutcome::Gone => Ok(None),
    }
}

/// Compare the manifest with state: declared blocks become create/update/
/// replace/no-op changes, recorded addresses no longer declared become deletes.
pub fn plan(manifest: &Manifest, state: &State, provider: &GitLabProvider) -> Result<Plan> {
    let mut plan = Plan::new();

    for block in &manifest.resources {
        let address = block.address();
        let resource = provider
            .resource(&block.resource_type)
            .ok_or_else(|| anyhow!("{address}: unknown resource type"))?;

        let bag = match state.get(&address) {
            Some(entry) if entry.resource_type == block.resource_type => {
                entry.to_bag(resource, Some(&block.attributes))
            }
            _ => AttributeBag::for_create(resource.schema(), &block.attributes),
        }
        .with_context(|| format!("{address}: invalid attributes"))?;

        plan.add(Change::declared(&block.resource_type, &block.name, bag));
    }

    for (address, entry) in &state.resources {
        let declared = manifest
            .find(address)
            .is_some_and(|b| b.resource_type == entry.resource_type);
        if declared {
            continue;
        }
        plan.add(removal(address, entry, provider)?);
    }

    Ok(plan)
}

/// Delete every recorded object.
pub fn destroy(state: &State, provider: &GitLabProvider) -> Result<Plan> {
    let mut plan = Plan::new();
    for (address, entry) in &state.resources {
        plan.add(removal(address, entry, provider)?);
    }
    Ok(plan)
}

fn removal(address: &str, entry: &StateEntry, provider: &GitLabProvider) -> Result<Change> {
    let resource = provider
        .resource(&entry.resource_type)
        .ok_or_else(|| anyhow!("{address}: unknown resource type {}", entry.resource_type))?;
    let name = address
        .split_once('.')
        .map_or(address, |(_, name)| name);
    let bag = entry.to_bag(resource, None)?;
    Ok(Change::removal(&entry.resource_type, name, bag))
}
