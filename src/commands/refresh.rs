use crate::Context;
use crate::commands::{Workspace, run_context};
use crate::engine::planner;
use crate::ui;
use anyhow::Result;
use reconcile::ExecuteOptions;

/// Update the state file from GitLab without changing anything remote.
pub fn run(ctx: &Context) -> Result<()> {
    let mut ws = Workspace::load(ctx)?;
    let client = ws.client(ctx)?;

    let report = planner::refresh(
        &mut ws.state,
        &ws.provider,
        &client,
        &run_context(None),
        ExecuteOptions::default().jobs,
        None,
    );
    ws.save()?;
    let report = report?;

    for address in &report.gone {
        ui::warn(&format!("{address} no longer exists; removed from state"));
    }
    ui::success(&format!(
        "Refreshed {} resource(s), {} gone",
        report.present,
        report.gone.len()
    ));
    Ok(())
}
