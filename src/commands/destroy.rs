use crate::Context;
use crate::cli::DestroyArgs;
use crate::commands::{Workspace, run_context};
use crate::engine::{differ, executor, planner};
use crate::ui;
use anyhow::{Result, bail};
use reconcile::ExecuteOptions;

/// Delete every managed object, or those under `--target`.
pub fn run(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    let mut ws = Workspace::load(ctx)?;

    let plan = planner::destroy(&ws.state, &ws.provider)?.filter_by_target(args.target.as_deref());
    if plan.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(());
    }
    differ::display_plan(&plan, ctx.verbose > 0);

    let client = ws.client(ctx)?;
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
        &run_context(args.timeout),
    );
    ws.save()?;
    let summary = summary?;

    if summary.failed > 0 {
        bail!("{} deletion(s) failed", summary.failed);
    }
    Ok(())
}
