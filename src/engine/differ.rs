//! Plan display

use crate::ui;
use colored::Colorize;
use reconcile::plan::group_by_type;
use reconcile::{Action, Change, Plan, PlanSummary, Value};

/// Human-readable heading for a resource type
fn type_heading(resource_type: &str) -> &str {
    match resource_type {
        "gitlab_group" => "Groups",
        "gitlab_group_membership" => "Group memberships",
        "gitlab_project_variable" => "Project variables",
        "gitlab_deploy_key" => "Deploy keys",
        "gitlab_pipeline_schedule_variable" => "Pipeline schedule variables",
        "gitlab_project_access_token" => "Project access tokens",
        _ => resource_type,
    }
}

fn render(value: &Value) -> String {
    if value.is_null() {
        "(unset)".to_string()
    } else {
        value.to_string()
    }
}

/// Per-attribute lines shown under a change
pub fn attribute_lines(change: &Change) -> Vec<String> {
    let mut lines: Vec<String> = change
        .attribute_changes()
        .into_iter()
        .map(|(name, old, new)| match change.action {
            Action::Create => format!("{name} = {}", render(&new)),
            _ => format!("{name}: {} → {}", render(&old), render(&new)),
        })
        .collect();

    if let Action::Replace { attributes } = &change.action {
        lines.push(format!("(forces replacement: {})", attributes.join(", ")));
    }
    lines
}

/// One-line summary of a plan
pub fn summary_line(summary: &PlanSummary) -> String {
    format!(
        "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
        summary.create, summary.update, summary.replace, summary.delete, summary.unchanged
    )
}

/// Display a plan grouped by resource type
///
/// Unchanged instances are listed only with `verbose`.
pub fn display_plan(plan: &Plan, verbose: bool) {
    let summary = plan.summary();
    if !summary.has_changes() && !verbose {
        println!();
        println!("  {} No changes. GitLab matches the manifest.", "✓".green());
        return;
    }

    let groups = group_by_type(&plan.changes);
    let mut types: Vec<&String> = groups.keys().collect();
    types.sort();

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for resource_type in types {
        let visible: Vec<&&Change> = groups[resource_type]
            .iter()
            .filter(|c| verbose || c.action.is_change())
            .collect();
        if visible.is_empty() {
            continue;
        }

        println!("│ {}", type_heading(resource_type).bold());
        for change in visible {
            println!(
                "│   {} {:<40} {}",
                ui::action_symbol(&change.action),
                change.address,
                change.action.label().dimmed()
            );
            for line in attribute_lines(change) {
                println!("│       {}", line.dimmed());
            }
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!("│ Plan: {}", summary_line(&summary));
    println!("└─────────────────────────────────────────────────────┘");
}
