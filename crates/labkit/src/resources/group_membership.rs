//! `gitlab_group_membership`
//!
//! Identity is `group_id:user_id`. The member endpoint reports the user id as
//! `id`, so the group id only ever comes from the bag or the identity.

use crate::client::{Client, segment};
use crate::drift;
use crate::levels;
use reconcile::mapper::{self, Codec, Document, FieldMap, Mapping};
use reconcile::{Attribute, AttributeBag, CompositeId, Context, Kind, Resource, Result, Schema};
use std::sync::LazyLock;

pub const TYPE_NAME: &str = "gitlab_group_membership";

const FIELDS: &[FieldMap] = &[
    FieldMap::new("user_id", "id", Codec::Direct).read_only(),
    FieldMap::new("access_level", "access_level", levels::CODEC),
    FieldMap::new("expires_at", "expires_at", Codec::Date),
];

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new(vec![
        Attribute::required("group_id", Kind::String).force_new(),
        Attribute::required("user_id", Kind::Int).force_new(),
        Attribute::required("access_level", Kind::String),
        Attribute::optional("expires_at", Kind::String),
    ])
});

static MAPPING: LazyLock<Mapping> = LazyLock::new(|| {
    Mapping::new(TYPE_NAME, FIELDS).with_always_send(drift::always_send(TYPE_NAME))
});

/// A user's membership in a group.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupMembership;

fn members_path(group: &str) -> String {
    format!("groups/{}/members", segment(group))
}

fn member_path(id: &CompositeId) -> Result<String> {
    Ok(format!("{}/{}", members_path(id.part(0)), id.numeric(1)?))
}

impl Resource for GroupMembership {
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
            bag.require_str("group_id")?.to_string(),
            mapper::remote_id(entity, "id", TYPE_NAME)?,
        ])
    }

    fn create(
        &self,
        client: &Client,
        ctx: &Context,
        bag: &AttributeBag,
        mut request: Document,
    ) -> Result<Document> {
        request.insert("user_id".to_string(), bag.require_int("user_id")?.into());
        client.post(ctx, &members_path(bag.require_str("group_id")?), request)
    }

    fn get(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<Document> {
        client.get(ctx, &member_path(id)?)
    }

    fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
        request: Document,
    ) -> Result<()> {
        client.put(ctx, &member_path(id)?, request).map(|_| ())
    }

    fn delete(
        &self,
        client: &Client,
        ctx: &Context,
        id: &CompositeId,
        _bag: &AttributeBag,
    ) -> Result<()> {
        client.delete(ctx, &member_path(id)?)
    }

    fn import(&self, id: &CompositeId, bag: &mut AttributeBag) -> Result<()> {
        bag.set("group_id", id.part(0));
        bag.set("user_id", id.numeric(1)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ApiResponse, Method};
    use crate::resources::tests::{client, desired};
    use reconcile::{Error, ReadOutcome, Value, orchestrator};
    use serde_json::json;

    fn member(level: i64, expires_at: serde_json::Value) -> ApiResponse {
        ApiResponse::ok(json!({
            "id": 7,
            "username": "jane",
            "access_level": level,
            "expires_at": expires_at
        }))
    }

    #[test]
    fn test_create_encodes_access_level() {
        let (client, mock) = client();
        mock.respond(Method::Post, "groups/12/members", member(30, json!("2030-06-30")));
        mock.respond(Method::Get, "groups/12/members/7", member(30, json!("2030-06-30")));

        let mut bag = AttributeBag::for_create(
            &SCHEMA,
            &desired(&[
                ("group_id", "12".into()),
                ("user_id", Value::Int(7)),
                ("access_level", "developer".into()),
                ("expires_at", "2030-06-30".into()),
            ]),
        )
        .unwrap();
        orchestrator::create(&GroupMembership, &client, &Context::new(), &mut bag).unwrap();

        assert_eq!(bag.identity(), "12:7");
        let posts = mock.requests_with(Method::Post);
        assert_eq!(
            posts[0].body,
            Some(json!({"user_id": 7, "access_level": 30, "expires_at": "2030-06-30"}))
        );
        assert_eq!(bag.get_str("access_level").unwrap(), Some("developer"));
    }

    #[test]
    fn test_unknown_access_level_rejected() {
        let (client, mock) = client();
        let mut bag = AttributeBag::for_create(
            &SCHEMA,
            &desired(&[
                ("group_id", "12".into()),
                ("user_id", Value::Int(7)),
                ("access_level", "admin".into()),
            ]),
        )
        .unwrap();
        let err =
            orchestrator::create(&GroupMembership, &client, &Context::new(), &mut bag).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_import_fills_identity_attributes() {
        let (client, mock) = client();
        mock.respond(Method::Get, "groups/team%2Fops/members/7", member(40, json!(null)));

        let mut bag = AttributeBag::new(&SCHEMA);
        orchestrator::import(&GroupMembership, &client, &Context::new(), &mut bag, "team/ops:7")
            .unwrap();

        assert_eq!(bag.identity(), "team/ops:7");
        assert_eq!(bag.get_str("group_id").unwrap(), Some("team/ops"));
        assert_eq!(bag.get_int("user_id").unwrap(), Some(7));
        assert_eq!(bag.get_str("access_level").unwrap(), Some("maintainer"));
        assert_eq!(bag.get("expires_at"), &Value::Null);
    }

    #[test]
    fn test_clearing_expiry_sends_null() {
        let (client, mock) = client();
        mock.respond(Method::Get, "groups/12/members/7", member(30, json!("2030-06-30")));
        mock.respond(Method::Put, "groups/12/members/7", member(30, json!(null)));

        let prior = desired(&[
            ("group_id", "12".into()),
            ("user_id", Value::Int(7)),
            ("access_level", "developer".into()),
            ("expires_at", "2030-06-30".into()),
        ]);
        let wanted = desired(&[
            ("group_id", "12".into()),
            ("user_id", Value::Int(7)),
            ("access_level", "developer".into()),
        ]);
        let mut bag = AttributeBag::from_state(&SCHEMA, "12:7", prior, Some(&wanted)).unwrap();
        orchestrator::update(&GroupMembership, &client, &Context::new(), &mut bag).unwrap();

        let puts = mock.requests_with(Method::Put);
        assert_eq!(puts[0].body, Some(json!({"expires_at": null})));
    }

    #[test]
    fn test_removed_member_is_gone() {
        let (client, _mock) = client();
        let mut bag = AttributeBag::from_state(
            &SCHEMA,
            "12:7",
            desired(&[("group_id", "12".into()), ("user_id", Value::Int(7))]),
            None,
        )
        .unwrap();
        let outcome =
            orchestrator::read(&GroupMembership, &client, &Context::new(), &mut bag).unwrap();
        assert_eq!(outcome, ReadOutcome::Gone);
        assert!(bag.is_new());
    }

    #[test]
    fn test_identity_needs_numeric_user() {
        let (client, _mock) = client();
        let mut bag = AttributeBag::new(&SCHEMA);
        let err =
            orchestrator::import(&GroupMembership, &client, &Context::new(), &mut bag, "12:jane")
                .unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity { .. }));
    }
}
