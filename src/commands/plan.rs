use crate::Context;
use crate::cli::PlanArgs;
use crate::commands::{Workspace, run_context};
use crate::engine::{differ, planner};
use crate::ui;
use anyhow::Result;
use reconcile::ExecuteOptions;

/// Show what apply would change. The state file is not written.
pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let mut ws = Workspace::load(ctx)?;

    if !args.no_refresh {
        let client = ws.client(ctx)?;
        let report = planner::refresh(
            &mut ws.state,
            &ws.provider,
            &client,
            &run_context(None),
            ExecuteOptions::default().jobs,
            args.target.as_deref(),
        )?;
        for address in &report.gone {
            ui::warn(&format!("{address} was deleted outside glrecon"));
        }
    }

    let plan = planner::plan(&ws.manifest, &ws.state, &ws.provider)?
        .filter_by_target(args.target.as_deref());
    differ::display_plan(&plan, ctx.verbose > 0);

    if !plan.is_empty() && !ctx.quiet {
        println!();
        ui::dim("Run 'glrecon apply' to make these changes");
    }
    Ok(())
}
