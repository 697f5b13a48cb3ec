//! Plan execution - run the engine and fold outcomes into state

use crate::progress::ApplyProgress;
use crate::state::State;
use crate::ui;
use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use labkit::{Client, GitLabProvider};
use reconcile::{ChangeOutcome, ChangeResult, Context, ExecuteOptions, ExecuteSummary, Plan};

/// Execute a plan and record every outcome in `state`.
///
/// The caller saves the state afterwards, whether or not changes failed.
pub fn run(
    plan: Plan,
    provider: &GitLabProvider,
    client: &Client,
    state: &mut State,
    opts: &ExecuteOptions,
    assume_yes: bool,
    ctx: &Context,
) -> Result<ExecuteSummary> {
    if plan.is_empty() {
        println!();
        println!("  {} No changes to apply", "✓".green());
        return Ok(ExecuteSummary::default());
    }

    let mut progress = ApplyProgress::new();
    let mut confirm = ui::Confirm { assume_yes };
    let report = reconcile::execute(
        plan,
        provider,
        client,
        ctx,
        opts,
        &mut progress,
        &mut confirm,
    )
    .context("Failed to execute plan")?;

    for outcome in &report.outcomes {
        state.record(outcome);
    }

    if report.summary.skipped == report.summary.total() {
        if let Some(ChangeOutcome {
            result: ChangeResult::Skipped { reason },
            ..
        }) = report.outcomes.first()
        {
            ui::warn(&format!("Nothing applied ({reason})"));
        }
        return Ok(report.summary);
    }

    print_failures(&report.outcomes);
    print_summary(&report.summary);
    Ok(report.summary)
}

/// `(address, "<category>: <error>", advice)` for every failed outcome
fn failures(outcomes: &[ChangeOutcome]) -> Vec<(&str, String, &'static str)> {
    outcomes
        .iter()
        .filter_map(|o| match &o.result {
            ChangeResult::Failed { error, category } => Some((
                o.address.as_str(),
                format!("{category}: {error}"),
                category.advice(),
            )),
            _ => None,
        })
        .collect()
}

fn print_failures(outcomes: &[ChangeOutcome]) {
    let failed = failures(outcomes);
    if failed.is_empty() {
        return;
    }

    ui::section("Failures");
    for (address, error, advice) in failed {
        println!("  {} {}", "✗".red(), address.bold());
        println!("      {}", error);
        println!("      {} {}", "hint:".dimmed(), advice);
    }
}

fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}
