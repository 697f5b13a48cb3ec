use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reconcile::{AttributeBag, ChangeOutcome, ChangeResult, Resource, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// State Structures
// ============================================================================

/// Remote objects glrecon manages, by address
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct State {
    /// Format version
    #[serde(default = "current_version")]
    pub version: u32,

    /// Last time the state was written
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub resources: BTreeMap<String, StateEntry>,
}

/// What was last observed for one address
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StateEntry {
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Composite identity, e.g. `42` or `group/app:KEY:*`
    pub id: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

const STATE_VERSION: u32 = 1;

fn current_version() -> u32 {
    STATE_VERSION
}

impl StateEntry {
    pub fn from_bag(resource_type: &str, bag: &AttributeBag) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            id: bag.identity().to_string(),
            attributes: bag.state().clone(),
        }
    }

    /// Bag holding the recorded attributes as prior state
    pub fn to_bag<C: ?Sized + Sync>(
        &self,
        resource: &dyn Resource<Client = C>,
        desired: Option<&BTreeMap<String, Value>>,
    ) -> reconcile::Result<AttributeBag> {
        AttributeBag::from_state(resource.schema(), &self.id, self.attributes.clone(), desired)
    }
}

// ============================================================================
// State Implementation
// ============================================================================

impl State {
    /// Resolve the state file: explicit path or the default location
    pub fn path(explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path.to_path_buf()),
            None => crate::paths::state_file(),
        }
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using empty state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!(
            "Loaded {} resource(s) from {}",
            state.resources.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save state to disk, replacing the old file in one rename
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.version = STATE_VERSION;
        self.last_updated = Some(Utc::now());
        let content =
            serde_json::to_string_pretty(&self).context("Failed to serialize state to JSON")?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&StateEntry> {
        self.resources.get(address)
    }

    pub fn insert(&mut self, address: impl Into<String>, entry: StateEntry) {
        self.resources.insert(address.into(), entry);
    }

    pub fn remove(&mut self, address: &str) -> Option<StateEntry> {
        self.resources.remove(address)
    }

    /// Fold the result of one applied change into the state.
    ///
    /// A bag without identity means the remote object no longer exists.
    /// After a failure the previous entry is kept while it still names the
    /// same object; an object created by a failed cycle is still recorded so
    /// it is not orphaned.
    pub fn record(&mut self, outcome: &ChangeOutcome) {
        if matches!(outcome.result, ChangeResult::Skipped { .. }) {
            return;
        }

        let bag = &outcome.bag;
        if bag.is_new() {
            if self.remove(&outcome.address).is_some() {
                log::debug!("{}: removed from state", outcome.address);
            }
            return;
        }

        let unchanged_object = self
            .get(&outcome.address)
            .is_some_and(|entry| entry.id == bag.identity());
        if !outcome.result.is_success() && unchanged_object {
            return;
        }

        self.insert(
            outcome.address.clone(),
            StateEntry::from_bag(&outcome.resource_type, bag),
        );
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{Action, Attribute, Kind, RemoteError, Schema};
    use std::sync::LazyLock;
    use tempfile::TempDir;

    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
        Schema::new(vec![
            Attribute::required("name", Kind::String),
            Attribute::optional("path", Kind::String),
        ])
    });

    fn entry(id: &str, name: &str) -> StateEntry {
        StateEntry {
            resource_type: "gitlab_group".to_string(),
            id: id.to_string(),
            attributes: [("name".to_string(), Value::from(name))].into(),
        }
    }

    fn outcome(id: &str, name: &str, result: ChangeResult) -> ChangeOutcome {
        let attributes = [("name".to_string(), Value::from(name))].into();
        ChangeOutcome {
            address: "gitlab_group.platform".to_string(),
            resource_type: "gitlab_group".to_string(),
            action: Action::Create,
            result,
            bag: AttributeBag::from_state(&SCHEMA, id, attributes, None).unwrap(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let temp = TempDir::new().unwrap();
        let state = State::load(&temp.path().join("state.json")).unwrap();
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("state.json");

        let mut state = State::default();
        state.insert("gitlab_group.platform", entry("42", "Platform"));
        state.save(&path).unwrap();

        let loaded = State::load(&path).unwrap();
        assert_eq!(loaded.version, STATE_VERSION);
        assert!(loaded.last_updated.is_some());
        assert_eq!(loaded.get("gitlab_group.platform"), Some(&entry("42", "Platform")));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_names_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let err = State::load(&path).unwrap_err();
        assert!(err.to_string().contains("state.json"));
    }

    #[test]
    fn test_record_success() {
        let mut state = State::default();
        state.record(&outcome("42", "Platform", ChangeResult::Created));
        assert_eq!(state.get("gitlab_group.platform"), Some(&entry("42", "Platform")));
    }

    #[test]
    fn test_record_delete_removes() {
        let mut state = State::default();
        state.insert("gitlab_group.platform", entry("42", "Platform"));
        state.record(&outcome("", "Platform", ChangeResult::Deleted));
        assert!(state.get("gitlab_group.platform").is_none());
    }

    #[test]
    fn test_record_failed_update_keeps_previous() {
        let mut state = State::default();
        state.insert("gitlab_group.platform", entry("42", "Platform"));
        state.record(&outcome(
            "42",
            "Renamed",
            ChangeResult::failed(&RemoteError::status(500, "boom").into()),
        ));
        assert_eq!(state.get("gitlab_group.platform"), Some(&entry("42", "Platform")));
    }

    #[test]
    fn test_record_failed_create_keeps_new_identity() {
        let mut state = State::default();
        state.record(&outcome(
            "43",
            "Platform",
            ChangeResult::failed(&reconcile::Error::inconsistent("gitlab_group 43", "read failed")),
        ));
        assert_eq!(state.get("gitlab_group.platform").unwrap().id, "43");
    }

    #[test]
    fn test_record_skipped_is_ignored() {
        let mut state = State::default();
        state.insert("gitlab_group.platform", entry("42", "Platform"));
        state.record(&outcome(
            "",
            "Platform",
            ChangeResult::Skipped {
                reason: "not confirmed".to_string(),
            },
        ));
        assert!(state.get("gitlab_group.platform").is_some());
    }
}
