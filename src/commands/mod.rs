pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod refresh;
pub mod show;

use crate::Context;
use crate::config::Manifest;
use crate::progress;
use crate::state::State;
use anyhow::{Result, anyhow};
use labkit::{Client, GitLabProvider};
use std::path::PathBuf;
use std::time::Duration;

/// Manifest, state and provider for one command
pub struct Workspace {
    pub manifest: Manifest,
    pub state_path: PathBuf,
    pub state: State,
    pub provider: GitLabProvider,
}

impl Workspace {
    /// Load the manifest and the state file
    pub fn load(ctx: &Context) -> Result<Self> {
        let manifest = Manifest::load(&ctx.manifest)?;
        let state_path = State::path(ctx.state.as_deref())?;
        let state = State::load(&state_path)?;
        Ok(Self {
            manifest,
            state_path,
            state,
            provider: GitLabProvider::new(),
        })
    }

    /// Connect to GitLab with the manifest's provider settings
    pub fn client(&self, ctx: &Context) -> Result<Client> {
        let spinner = (!ctx.quiet).then(|| progress::spinner("Connecting to GitLab..."));
        let result = self.manifest.provider.client();
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        result.map_err(|e| {
            let category = e.category();
            anyhow!("{category}: {e}\n  hint: {}", category.advice())
        })
    }

    pub fn save(&mut self) -> Result<()> {
        self.state.save(&self.state_path)
    }
}

/// Cancellation context for one run, bounded by `--timeout` when given
pub fn run_context(timeout: Option<u64>) -> reconcile::Context {
    let ctx = reconcile::Context::new();
    match timeout {
        Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
        None => ctx,
    }
}
