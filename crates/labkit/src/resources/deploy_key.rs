//! `gitlab_deploy_key`
//!
//! Identity is `project:key_id`. Every attribute forces replacement.

use super::project_path;
use crate::client::{Client, segment};
use crate::drift;
use reconcile::mapper::{self, Document, FieldMap, Mapping};
use reconcile::{
    Attribute, AttributeBag, CompositeId, Context, Error, Kind, Resource, Result, Schema,
};
use std::sync::LazyLock;

pub const TYPE_NAME: &str = "gitlab_deploy_key";

const FIELDS: &[FieldMap] = &[
    FieldMap::direct("title"),
    FieldMap::direct("key"),
    FieldMap::direct("can_push"),
];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new(vec![
        Attribute::required("project", Kind::String).force_new(),
        Attribute::required("title", Kind::String).force_new(),
        Attribute::required("key", Kind::String).force_new(),
        Attribute::optional("can_push", Kind::Bool)
            .default(false)
            .force_new(),
    ])
});

static MAPPING: LazyLock<Mapping> = LazyLock::new(|| {
    Mapping::new(TYPE_NAME, FIELDS).with_always_send(drift::always_send(TYPE_NAME))
});

/// An SSH key with access to a single project.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployKey;

fn key_path(id: &CompositeId) -> Result<String> {
    Ok(format!(
        "projects/{}/deploy_keys/{}",
        segment(id.part(0)),
        id.numeric(1)?
    ))
}

impl Resource for DeployKey {
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
        // GitLab stores the key trimmed, which would read back as a change.
        let key = bag.require_str("key")?;
        if key.trim() != key {
            return Err(Error::validation(
                "key",
                "must not have leading or trailing whitespace",
            ));
        }
        let path = format!("{}/deploy_keys", project_path(bag)?);
        client.post(ctx, &path, request)
    }

    fn get(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<Document> {
        client.get(ctx, &key_path(id)?)
    }

    fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
        request: Document,
    ) -> Result<()> {
        client.put(ctx, &key_path(id)?, request).map(|_| ())
    }

    fn delete(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<()> {
        client.delete(ctx, &key_path(id)?)
    }

    fn import(&self, id: &CompositeId, bag: &mut AttributeBag) -> Result<()> {
        id.numeric(1)?;
        bag.set("project", id.part(0));
        Ok(())
    }
}
