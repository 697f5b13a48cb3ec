use crate::Context;
use crate::commands::{Workspace, run_context};
use crate::config::{Manifest, split_address};
use crate::state::{State, StateEntry};
use crate::ui;
use anyhow::{Context as AnyhowContext, Result, anyhow, bail};
use labkit::{Client, GitLabProvider};
use reconcile::{AttributeBag, Provider, orchestrator};

/// Adopt an existing GitLab object under a manifest address.
pub fn run(ctx: &Context, address: &str, id: &str) -> Result<()> {
    let mut ws = Workspace::load(ctx)?;
    let client = ws.client(ctx)?;

    let entry = adopt(
        &mut ws.state,
        &ws.manifest,
        &ws.provider,
        &client,
        &run_context(None),
        address,
        id,
    )?;
    ws.save()?;

    ui::success(&format!("Imported {address} ({})", entry.id));
    ui::dim("Run 'glrecon plan' to compare it with the manifest");
    Ok(())
}

/// Read the object behind `id` and record it under `address`.
pub fn adopt(
    state: &mut State,
    manifest: &Manifest,
    provider: &GitLabProvider,
    client: &Client,
    ctx: &reconcile::Context,
    address: &str,
    id: &str,
) -> Result<StateEntry> {
    let (resource_type, _) = split_address(address)?;
    let resource = provider.resource(resource_type).ok_or_else(|| {
        anyhow!(
            "unknown resource type {resource_type:?} (supported: {})",
            provider.type_names().join(", ")
        )
    })?;

    if let Some(existing) = state.get(address) {
        bail!(
            "{address} is already managed (id {}); remove it from state before importing",
            existing.id
        );
    }
    if manifest.find(address).is_none() {
        ui::warn(&format!(
            "{address} is not declared in the manifest; the next apply will delete it"
        ));
    }

    let mut bag = AttributeBag::new(resource.schema());
    orchestrator::import(resource, client, ctx, &mut bag, id)
        .with_context(|| format!("Failed to import {address} from {id:?}"))?;

    let entry = StateEntry::from_bag(resource_type, &bag);
    state.insert(address, entry.clone());
    Ok(entry)
}
