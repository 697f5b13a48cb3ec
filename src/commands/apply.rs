use crate::Context;
use crate::cli::ApplyArgs;
use crate::commands::{Workspace, run_context};
use crate::engine::{differ, executor, planner};
use crate::ui;
use anyhow::{Result, bail};
use reconcile::ExecuteOptions;

/// Make GitLab match the manifest.
///
/// State is saved after execution even when some changes failed, so objects
/// created before a failure stay tracked.
pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let mut ws = Workspace::load(ctx)?;
    let client = ws.client(ctx)?;
    let rctx = run_context(args.timeout);

    if !args.no_refresh {
        let report = planner::refresh(
            &mut ws.state,
            &ws.provider,
            &client,
            &rctx,
            args.jobs,
            args.target.as_deref(),
        )?;
        for address in &report.gone {
            ui::warn(&format!("{address} was deleted outside glrecon; it will be recreated"));
        }
    }

    let plan = planner::plan(&ws.manifest, &ws.state, &ws.provider)?
        .filter_by_target(args.target.as_deref());
    differ::display_plan(&plan, ctx.verbose > 0);

    let opts = ExecuteOptions {
        dry_run: false,
        jobs: args.jobs,
    };
    let summary = executor::run(
        plan,
        &ws.provider,
        &client,
        &mut ws.state,
        &opts,
        args.yes,
        &rctx,
    );
    ws.save()?;
    let summary = summary?;

    if summary.failed > 0 {
        bail!("{} change(s) failed", summary.failed);
    }
    Ok(())
}
