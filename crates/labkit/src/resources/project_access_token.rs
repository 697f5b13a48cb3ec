//! `gitlab_project_access_token`
//!
//! Identity is `project:token_id`. The token value is only returned by the
//! create call, so it is kept from then on; listings never include it.
//! Tokens cannot be edited: every settable attribute forces replacement.

use super::{not_found, project_path};
use crate::client::{Client, segment};
use crate::drift;
use crate::levels;
use crate::validation;
use reconcile::mapper::{self, Codec, Document, FieldMap, Mapping};
use reconcile::{
    Attribute, AttributeBag, CompositeId, Context, Error, Kind, Resource, Result, Schema, Value,
};
use std::sync::LazyLock;

pub const TYPE_NAME: &str = "gitlab_project_access_token";

/// Scopes a project access token may be granted.
pub const SCOPES: &[&str] = &[
    "api",
    "read_api",
    "read_registry",
    "write_registry",
    "read_repository",
    "write_repository",
];

/// Page size used when looking a token up in the project's listing.
const LOOKUP_PER_PAGE: u32 = 100;

const FIELDS: &[FieldMap] = &[
    FieldMap::direct("name").create_only(),
    FieldMap::new("scopes", "scopes", Codec::StringList).create_only(),
    FieldMap::new("expires_at", "expires_at", Codec::Date).create_only(),
    FieldMap::new("access_level", "access_level", levels::CODEC).create_only(),
    FieldMap::direct("token").read_only(),
    FieldMap::direct("active").read_only(),
    FieldMap::direct("revoked").read_only(),
    FieldMap::new("created_at", "created_at", Codec::Timestamp).read_only(),
    FieldMap::direct("user_id").read_only(),
];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new(vec![
        Attribute::required("project", Kind::String).force_new(),
        Attribute::required("name", Kind::String).force_new(),
        Attribute::required("scopes", Kind::List).force_new(),
        Attribute::optional("expires_at", Kind::String).force_new(),
        Attribute::optional_computed("access_level", Kind::String).force_new(),
        Attribute::computed("token", Kind::String).sensitive(),
        Attribute::computed("active", Kind::Bool),
        Attribute::computed("revoked", Kind::Bool),
        Attribute::computed("created_at", Kind::String),
        Attribute::computed("user_id", Kind::Int),
    ])
});

static MAPPING: LazyLock<Mapping> = LazyLock::new(|| {
    Mapping::new(TYPE_NAME, FIELDS).with_always_send(drift::always_send(TYPE_NAME))
});

/// A bot token scoped to one project.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectAccessToken;

fn tokens_path(project: &str) -> String {
    format!("projects/{}/access_tokens", segment(project))
}

impl Resource for ProjectAccessToken {
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

    fn identity_arity(&self) -> usize {
        2
    }

    fn identity_parts(&self, bag: &AttributeBag, entity: &Document) -> Result<Vec<String>> {
        Ok(vec![
            bag.require_str("project")?.to_string(),
            mapper::remote_id(entity, "id", TYPE_NAME)?,
        ])
    }

    fn create(
        &self,
        client: &Client,
        ctx: &Context,
        bag: &AttributeBag,
        request: Document,
    ) -> Result<Document> {
        let scopes = bag.get_list("scopes")?.unwrap_or_default();
        if scopes.is_empty() {
            return Err(Error::validation("scopes", "at least one scope is required"));
        }
        validation::all_in("scopes", scopes.iter().filter_map(Value::as_str), SCOPES)?;

        let path = format!("{}/access_tokens", project_path(bag)?);
        client.post(ctx, &path, request)
    }

    fn get(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<Document> {
        let token_id = id.numeric(1)?;
        client
            .find(ctx, &tokens_path(id.part(0)), LOOKUP_PER_PAGE, |token| {
                token.get("id").and_then(|v| v.as_i64()) == Some(token_id)
            })?
            .ok_or_else(|| not_found(format!("{TYPE_NAME} {id}")))
    }

    fn update(
        &self,
        _client: &Client,
        _ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
        _request: Document,
    ) -> Result<()> {
        Err(Error::inconsistent(
            format!("{TYPE_NAME} {id}"),
            "access tokens cannot be updated in place",
        ))
    }

    fn delete(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<()> {
        let path = format!("{}/{}", tokens_path(id.part(0)), id.numeric(1)?);
        client.delete(ctx, &path)
    }

    fn is_gone(&self, entity: &Document) -> bool {
        entity.get("revoked").and_then(|v| v.as_bool()) == Some(true)
    }

    fn import(&self, id: &CompositeId, bag: &mut AttributeBag) -> Result<()> {
        id.numeric(1)?;
        bag.set("project", id.part(0));
        Ok(())
    }
}
