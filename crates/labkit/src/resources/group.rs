//! `gitlab_group`
//!
//! Groups are identified by their numeric id. Deleting a group only marks it
//! for deletion on instances with delayed deletion; the group disappears
//! later, so deletion waits until a lookup returns 404 or shows the mark.

use crate::client::Client;
use crate::drift;
use crate::levels;
use crate::resources::not_found;
use reconcile::mapper::{self, Codec, Document, FieldMap, Mapping};
use reconcile::{
    Attribute, AttributeBag, CompositeId, Context, Error, Kind, PollConfig, Resource, Result, Schema,
};
use std::sync::LazyLock;

pub const TYPE_NAME: &str = "gitlab_group";

const VISIBILITY: &[&str] = &["private", "internal", "public"];
const SUBGROUP_CREATION: &[&str] = &["owner", "maintainer"];
const PROJECT_CREATION: &[&str] = &["noone", "developer", "maintainer"];

const SHARED_WITH: &[FieldMap] = &[
    FieldMap::direct("group_id"),
    FieldMap::direct("group_name"),
    FieldMap::direct("group_full_path"),
    FieldMap::new("group_access_level", "group_access_level", levels::CODEC),
    FieldMap::new("expires_at", "expires_at", Codec::Date),
];

const FIELDS: &[FieldMap] = &[
    FieldMap::direct("name"),
    FieldMap::direct("path"),
    FieldMap::direct("description"),
    FieldMap::direct("lfs_enabled"),
    FieldMap::direct("request_access_enabled"),
    FieldMap::new("visibility_level", "visibility", Codec::Enum(VISIBILITY)),
    FieldMap::new(
        "subgroup_creation_level",
        "subgroup_creation_level",
        Codec::Enum(SUBGROUP_CREATION),
    ),
    FieldMap::new(
        "project_creation_level",
        "project_creation_level",
        Codec::Enum(PROJECT_CREATION),
    ),
    FieldMap::direct("parent_id").create_only(),
    FieldMap::direct("full_path").read_only(),
    FieldMap::direct("full_name").read_only(),
    FieldMap::direct("web_url").read_only(),
    FieldMap::direct("runners_token").read_only(),
    FieldMap::new("shared_with_groups", "shared_with_groups", Codec::Nested(SHARED_WITH)).read_only(),
];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new(vec![
        Attribute::required("name", Kind::String),
        Attribute::required("path", Kind::String),
        Attribute::optional_computed("description", Kind::String),
        Attribute::optional("lfs_enabled", Kind::Bool).default(true),
        Attribute::optional("request_access_enabled", Kind::Bool).default(false),
        Attribute::optional_computed("visibility_level", Kind::String),
        Attribute::optional_computed("subgroup_creation_level", Kind::String),
        Attribute::optional_computed("project_creation_level", Kind::String),
        Attribute::optional("parent_id", Kind::Int).force_new(),
        Attribute::computed("full_path", Kind::String),
        Attribute::computed("full_name", Kind::String),
        Attribute::computed("web_url", Kind::String),
        Attribute::computed("runners_token", Kind::String).sensitive(),
        Attribute::computed("shared_with_groups", Kind::List),
    ])
});

static MAPPING: LazyLock<Mapping> = LazyLock::new(|| {
    Mapping::new(TYPE_NAME, FIELDS).with_always_send(drift::always_send(TYPE_NAME))
});

/// GitLab answers a second delete of a group awaiting deletion with this.
const ALREADY_MARKED: &str = "already marked for deletion";

/// A GitLab group.
#[derive(Debug, Clone)]
pub struct Group {
    deletion: PollConfig,
}

impl Group {
    /// Group resource waiting for deletion with the default poll settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deletion: PollConfig::default(),
        }
    }

    /// Group resource with custom deletion polling.
    #[must_use]
    pub fn with_deletion_poll(deletion: PollConfig) -> Self {
        Self { deletion }
    }

    fn path(id: &CompositeId) -> Result<String> {
        Ok(format!("groups/{}", id.numeric(0)?))
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

fn already_marked(err: &Error) -> bool {
    matches!(err, Error::Remote(remote)
        if remote.status == Some(400) && remote.message.contains(ALREADY_MARKED))
}

impl Resource for Group {
    type Client = Client;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn mapping(&self) -> &'static Mapping {
        &MAPPING
    }

    fn identity_parts(&self, _bag: &AttributeBag, entity: &Document) -> Result<Vec<String>> {
        Ok(vec![mapper::remote_id(entity, "id", TYPE_NAME)?])
    }

    fn create(
        &self,
        client: &Client,
        ctx: &Context,
        _bag: &AttributeBag,
        request: Document,
    ) -> Result<Document> {
        client.post(ctx, "groups", request)
    }

    fn get(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<Document> {
        client.get(ctx, &Self::path(id)?)
    }

    fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
        request: Document,
    ) -> Result<()> {
        client.put(ctx, &Self::path(id)?, request).map(|_| ())
    }

    fn delete(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<()> {
        match client.delete(ctx, &Self::path(id)?) {
            Err(err) if already_marked(&err) => {
                log::debug!("{TYPE_NAME} {id} is already marked for deletion");
                Ok(())
            }
            other => other,
        }
    }

    fn is_gone(&self, entity: &Document) -> bool {
        ["marked_for_deletion_on", "marked_for_deletion_at"]
            .iter()
            .any(|key| entity.get(*key).is_some_and(|v| !v.is_null()))
    }

    fn deletion_wait(&self) -> Option<PollConfig> {
        Some(self.deletion)
    }
}

/// Look a group up by full path, e.g. to resolve a `parent_id`.
pub fn find_by_path(client: &Client, ctx: &Context, full_path: &str) -> Result<Document> {
    let path = format!("groups/{}", crate::client::segment(full_path));
    client
        .get(ctx, &path)
        .map_err(|err| match err {
            Error::Remote(remote) if remote.is_not_found() => not_found(format!("group {full_path}")),
            other => other,
        })
}
