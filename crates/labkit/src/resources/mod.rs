//! GitLab resource types.
//!
//! Each module implements [`reconcile::Resource`] for one GitLab object:
//! its attribute schema, its field mapping, and the REST calls behind
//! create/read/update/delete. [`GitLabProvider`] looks them up by type name.

pub mod deploy_key;
pub mod group;
pub mod group_membership;
pub mod pipeline_schedule_variable;
pub mod project_access_token;
pub mod project_variable;

use crate::client::{Client, segment};
use reconcile::{AttributeBag, Error, Provider, RemoteError, Resource};
use std::fmt;

pub use deploy_key::DeployKey;
pub use group::Group;
pub use group_membership::GroupMembership;
pub use pipeline_schedule_variable::PipelineScheduleVariable;
pub use project_access_token::ProjectAccessToken;
pub use project_variable::ProjectVariable;

/// All GitLab resource types, by type name.
pub struct GitLabProvider {
    resources: Vec<Box<dyn Resource<Client = Client>>>,
}

impl GitLabProvider {
    /// Provider with every supported resource type.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resources: vec![
                Box::new(Group::new()),
                Box::new(GroupMembership),
                Box::new(ProjectVariable),
                Box::new(DeployKey),
                Box::new(PipelineScheduleVariable),
                Box::new(ProjectAccessToken),
            ],
        }
    }

    /// Supported type names, in registration order.
    pub fn type_names(&self) -> Vec<&'static str> {
        self.resources.iter().map(|r| r.type_name()).collect()
    }
}

impl Default for GitLabProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for GitLabProvider {
    type Client = Client;

    fn resource(&self, type_name: &str) -> Option<&dyn Resource<Client = Client>> {
        self.resources
            .iter()
            .find(|r| r.type_name() == type_name)
            .map(|r| &**r)
    }
}

/// The 404 a resource reports when a lookup comes back empty.
pub(crate) fn not_found(what: impl fmt::Display) -> Error {
    RemoteError::not_found(what).into()
}

/// `projects/<project>` with the project id or path encoded.
pub(crate) fn project_path(bag: &AttributeBag) -> reconcile::Result<String> {
    Ok(format!("projects/{}", segment(bag.require_str("project")?)))
}
