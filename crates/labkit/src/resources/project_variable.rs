//! `gitlab_project_variable`
//!
//! Identity is `project:key:environment_scope`. Identities written before
//! scopes were tracked are `project:key` and mean the `*` scope. The scope is
//! free text and may itself contain `:`.
//!
//! A project may hold the same key once per environment scope, so the
//! per-key endpoints are always called with `filter[environment_scope]`.

use super::{not_found, project_path};
use crate::backend::ApiRequest;
use crate::client::{Client, segment};
use crate::drift;
use crate::validation;
use reconcile::mapper::{Codec, Document, FieldMap, Mapping};
use reconcile::pagination::DEFAULT_PER_PAGE;
use reconcile::{
    Attribute, AttributeBag, CompositeId, Context, Error, Kind, Resource, Result, Schema,
};
use std::ops::RangeInclusive;
use std::sync::LazyLock;

pub const TYPE_NAME: &str = "gitlab_project_variable";

const DEFAULT_SCOPE: &str = "*";

const VARIABLE_TYPES: &[&str] = &["env_var", "file"];

const FIELDS: &[FieldMap] = &[
    FieldMap::direct("key").create_only(),
    FieldMap::direct("value"),
    FieldMap::new("variable_type", "variable_type", Codec::Enum(VARIABLE_TYPES)),
    FieldMap::direct("protected"),
    FieldMap::direct("masked"),
    FieldMap::direct("environment_scope"),
];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new(vec![
        Attribute::required("project", Kind::String).force_new(),
        Attribute::required("key", Kind::String).force_new(),
        Attribute::required("value", Kind::String).sensitive(),
        Attribute::optional("variable_type", Kind::String).default("env_var"),
        Attribute::optional("protected", Kind::Bool).default(false),
        Attribute::optional("masked", Kind::Bool).default(false),
        Attribute::optional("environment_scope", Kind::String)
            .default(DEFAULT_SCOPE)
            .force_new(),
    ])
});

static MAPPING: LazyLock<Mapping> = LazyLock::new(|| {
    Mapping::new(TYPE_NAME, FIELDS).with_always_send(drift::always_send(TYPE_NAME))
});

/// A CI/CD variable defined on a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectVariable;

fn scope(id: &CompositeId) -> &str {
    match id.part(2) {
        "" => DEFAULT_SCOPE,
        scope => scope,
    }
}

fn variables_path(project: &str) -> String {
    format!("projects/{}/variables", segment(project))
}

fn variable_request(request: ApiRequest, id: &CompositeId) -> ApiRequest {
    request.query("filter[environment_scope]", scope(id))
}

fn variable_path(id: &CompositeId) -> String {
    format!("{}/{}", variables_path(id.part(0)), segment(id.part(1)))
}

/// GitLab rejects masked values that do not meet its masking rules with a
/// bare 400; say which attribute is at fault.
fn explain_masking(err: Error, bag: &AttributeBag) -> Error {
    let masked = matches!(bag.get_bool("masked"), Ok(Some(true)));
    if masked && err.remote_status() == Some(400) {
        return Error::validation(
            "value",
            format!(
                "invalid value for a masked variable; check the masked variable requirements \
                 (https://docs.gitlab.com/ee/ci/variables/#masked-variable-requirements): {err}"
            ),
        );
    }
    err
}

impl Resource for ProjectVariable {
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
        3
    }

    fn identity_arities(&self) -> RangeInclusive<usize> {
        2..=3
    }

    fn identity_free_tail(&self) -> bool {
        true
    }

    fn identity_parts(&self, bag: &AttributeBag, _entity: &Document) -> Result<Vec<String>> {
        Ok(vec![
            bag.require_str("project")?.to_string(),
            bag.require_str("key")?.to_string(),
            bag.get_str("environment_scope")?
                .unwrap_or(DEFAULT_SCOPE)
                .to_string(),
        ])
    }

    fn create(
        &self,
        client: &Client,
        ctx: &Context,
        bag: &AttributeBag,
        request: Document,
    ) -> Result<Document> {
        validation::variable_name("key", bag.require_str("key")?)?;
        let path = format!("{}/variables", project_path(bag)?);
        client
            .post(ctx, &path, request)
            .map_err(|err| explain_masking(err, bag))
    }

    fn get(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<Document> {
        let (key, scope) = (id.part(1), scope(id));
        client
            .find(ctx, &variables_path(id.part(0)), DEFAULT_PER_PAGE, |variable| {
                variable.get("key").and_then(|v| v.as_str()) == Some(key)
                    && variable.get("environment_scope").and_then(|v| v.as_str()) == Some(scope)
            })?
            .ok_or_else(|| not_found(format!("{TYPE_NAME} {id}")))
    }

    fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        bag: &AttributeBag,
        request: Document,
    ) -> Result<()> {
        let request = variable_request(ApiRequest::put(variable_path(id), request.into()), id);
        client
            .request(ctx, &request)
            .map(|_| ())
            .map_err(|err| explain_masking(err, bag))
    }

    fn delete(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<()> {
        let request = variable_request(ApiRequest::delete(variable_path(id)), id);
        client.request(ctx, &request).map(|_| ())
    }

    fn import(&self, id: &CompositeId, bag: &mut AttributeBag) -> Result<()> {
        bag.set("project", id.part(0));
        bag.set("key", id.part(1));
        bag.set("environment_scope", scope(id));
        Ok(())
    }
}
