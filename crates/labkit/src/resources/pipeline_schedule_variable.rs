//! `gitlab_pipeline_schedule_variable`
//!
//! Identity is `project:pipeline_schedule_id:key`. GitLab has no endpoint
//! for a single schedule variable; reads fetch the schedule and look the key
//! up in its `variables`.

use super::not_found;
use crate::client::{Client, segment};
use crate::drift;
use crate::validation;
use reconcile::mapper::{Codec, Document, FieldMap, Mapping};
use reconcile::{Attribute, AttributeBag, CompositeId, Context, Kind, Resource, Result, Schema};
use std::sync::LazyLock;

pub const TYPE_NAME: &str = "gitlab_pipeline_schedule_variable";

const VARIABLE_TYPES: &[&str] = &["env_var", "file"];

const FIELDS: &[FieldMap] = &[
    FieldMap::direct("key").create_only(),
    FieldMap::direct("value"),
    FieldMap::new("variable_type", "variable_type", Codec::Enum(VARIABLE_TYPES)),
];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new(vec![
        Attribute::required("project", Kind::String).force_new(),
        Attribute::required("pipeline_schedule_id", Kind::Int).force_new(),
        Attribute::required("key", Kind::String).force_new(),
        Attribute::required("value", Kind::String),
        Attribute::optional("variable_type", Kind::String).default("env_var"),
    ])
});

static MAPPING: LazyLock<Mapping> = LazyLock::new(|| {
    Mapping::new(TYPE_NAME, FIELDS).with_always_send(drift::always_send(TYPE_NAME))
});

/// A variable passed to the pipelines a schedule starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineScheduleVariable;

fn schedule_path(project: &str, schedule: i64) -> String {
    format!(
        "projects/{}/pipeline_schedules/{schedule}",
        segment(project)
    )
}

fn variable_path(id: &CompositeId) -> Result<String> {
    Ok(format!(
        "{}/variables/{}",
        schedule_path(id.part(0), id.numeric(1)?),
        segment(id.part(2))
    ))
}

impl Resource for PipelineScheduleVariable {
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

    fn identity_parts(&self, bag: &AttributeBag, _entity: &Document) -> Result<Vec<String>> {
        Ok(vec![
            bag.require_str("project")?.to_string(),
            bag.require_int("pipeline_schedule_id")?.to_string(),
            bag.require_str("key")?.to_string(),
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
        let path = format!(
            "{}/variables",
            schedule_path(
                bag.require_str("project")?,
                bag.require_int("pipeline_schedule_id")?
            )
        );
        client.post(ctx, &path, request)
    }

    fn get(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<Document> {
        let schedule = client.get(ctx, &schedule_path(id.part(0), id.numeric(1)?))?;
        let key = id.part(2);
        schedule
            .get("variables")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_object())
            .find(|v| v.get("key").and_then(|k| k.as_str()) == Some(key))
            .cloned()
            .ok_or_else(|| not_found(format!("{TYPE_NAME} {id}")))
    }

    fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
        request: Document,
    ) -> Result<()> {
        client.put(ctx, &variable_path(id)?, request).map(|_| ())
    }

    fn delete(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<()> {
        client.delete(ctx, &variable_path(id)?)
    }

    fn import(&self, id: &CompositeId, bag: &mut AttributeBag) -> Result<()> {
        bag.set("project", id.part(0));
        bag.set("pipeline_schedule_id", id.numeric(1)?);
        bag.set("key", id.part(2));
        Ok(())
    }
}
