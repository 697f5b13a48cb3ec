use crate::Context;
use crate::engine::planner::matches_target;
use crate::state::{State, StateEntry};
use crate::ui;
use anyhow::{Context as AnyhowContext, Result, anyhow};
use colored::Colorize;
use labkit::GitLabProvider;
use reconcile::{Provider, Value};
use serde::Serialize;
use std::collections::BTreeMap;

/// One managed resource as shown to the user
#[derive(Debug, Serialize)]
struct Shown {
    #[serde(rename = "type")]
    resource_type: String,
    id: String,
    attributes: BTreeMap<String, Value>,
}

/// Show managed resources from the state file. GitLab is not contacted.
pub fn run(ctx: &Context, target: Option<&str>, json: bool) -> Result<()> {
    let state = State::load(&State::path(ctx.state.as_deref())?)?;
    let shown = collect(&state, &GitLabProvider::new(), target)?;

    if json {
        let out = serde_json::to_string_pretty(&shown).context("Failed to serialize state")?;
        println!("{out}");
        return Ok(());
    }

    if shown.is_empty() {
        ui::info("No managed resources");
        return Ok(());
    }

    ui::header("Managed resources");
    for (address, resource) in &shown {
        ui::section(address);
        ui::kv("id", &resource.id);
        for (name, value) in &resource.attributes {
            ui::kv(name, &value.to_string());
        }
    }
    println!();
    println!("  {} resource(s)", shown.len().to_string().bold());
    Ok(())
}

/// Entries under `target`, with sensitive attributes masked
fn collect(
    state: &State,
    provider: &GitLabProvider,
    target: Option<&str>,
) -> Result<BTreeMap<String, Shown>> {
    state
        .resources
        .iter()
        .filter(|(address, _)| matches_target(address, target))
        .map(|(address, entry)| Ok((address.clone(), redact(address, entry, provider)?)))
        .collect()
}

fn redact(address: &str, entry: &StateEntry, provider: &GitLabProvider) -> Result<Shown> {
    let resource = provider
        .resource(&entry.resource_type)
        .ok_or_else(|| anyhow!("{address}: unknown resource type {}", entry.resource_type))?;
    let bag = entry.to_bag(resource, None)?;
    Ok(Shown {
        resource_type: entry.resource_type.clone(),
        id: entry.id.clone(),
        attributes: bag.redacted(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> State {
        let mut state = State::default();
        state.insert(
            "gitlab_project_variable.db",
            StateEntry {
                resource_type: "gitlab_project_variable".to_string(),
                id: "group/app:DATABASE_URL:*".to_string(),
                attributes: [
                    ("key".to_string(), Value::from("DATABASE_URL")),
                    ("value".to_string(), Value::from("postgres://secret")),
                ]
                .into(),
            },
        );
        state.insert(
            "gitlab_group.platform",
            StateEntry {
                resource_type: "gitlab_group".to_string(),
                id: "42".to_string(),
                attributes: [("name".to_string(), Value::from("Platform"))].into(),
            },
        );
        state
    }

    #[test]
    fn test_collect_masks_sensitive_values() {
        let shown = collect(&state(), &GitLabProvider::new(), None).unwrap();
        let variable = &shown["gitlab_project_variable.db"];
        assert_eq!(variable.attributes["key"], Value::from("DATABASE_URL"));
        assert_eq!(variable.attributes["value"], Value::from("(sensitive)"));

        let json = serde_json::to_string(&shown).unwrap();
        assert!(!json.contains("postgres://secret"));
    }

    #[test]
    fn test_collect_filters_by_target() {
        let shown = collect(&state(), &GitLabProvider::new(), Some("gitlab_group")).unwrap();
        assert_eq!(shown.keys().collect::<Vec<_>>(), vec!["gitlab_group.platform"]);
    }
}
