//! CRUD orchestrator
//!
//! Sequences one reconciliation cycle for a resource instance:
//!
//! - **create**: build the full request, call the remote, encode the identity
//!   from the response, then read.
//! - **read**: decode the identity, fetch, and copy the entity into the bag.
//!   A 404 (or an entity the resource reports as gone) clears the identity.
//! - **update**: build a request from the changed attributes plus the
//!   always-send list, call the remote if there is anything to send, then read.
//! - **delete**: call the remote (404 counts as done), wait for background
//!   teardown when the resource asks for it, then clear the identity.
//!
//! Cycles share nothing but the read-only client handle.

use crate::bag::AttributeBag;
use crate::bag::Schema;
use crate::classify::{Classification, absorb_not_found, classify};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::identity::{self, CompositeId};
use crate::mapper::{self, Document, Mapping, RequestMode};
use crate::poller::{self, PollConfig, PollState};
use std::ops::RangeInclusive;

/// A resource type the orchestrator can drive.
///
/// Implementations translate between the engine and one remote entity type:
/// they own the remote calls and how identity parts are derived, while the
/// orchestrator owns sequencing, not-found handling and request building.
pub trait Resource: Send + Sync {
    /// Remote client handle shared by all cycles.
    type Client: ?Sized + Sync;

    /// Resource type name, e.g. `gitlab_group`.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> &'static Schema;

    fn mapping(&self) -> &'static Mapping;

    /// Number of parts in the identity.
    fn identity_arity(&self) -> usize {
        1
    }

    /// Accepted identity arities, for types with an older shorter format.
    fn identity_arities(&self) -> RangeInclusive<usize> {
        let arity = self.identity_arity();
        arity..=arity
    }

    /// Whether the last identity part is free text that may contain `:`.
    fn identity_free_tail(&self) -> bool {
        false
    }

    /// Identity parts for an entity returned by the remote.
    fn identity_parts(&self, bag: &AttributeBag, entity: &Document) -> Result<Vec<String>>;

    /// Create the entity and return the remote's answer.
    fn create(
        &self,
        client: &Self::Client,
        ctx: &Context,
        bag: &AttributeBag,
        request: Document,
    ) -> Result<Document>;

    /// Fetch the entity. A missing entity must surface as a 404 remote error.
    fn get(
        &self,
        client: &Self::Client,
        ctx: &Context,
        id: &CompositeId,
        bag: &AttributeBag,
    ) -> Result<Document>;

    fn update(
        &self,
        client: &Self::Client,
        ctx: &Context,
        id: &CompositeId,
        bag: &AttributeBag,
        request: Document,
    ) -> Result<()>;

    fn delete(
        &self,
        client: &Self::Client,
        ctx: &Context,
        id: &CompositeId,
        bag: &AttributeBag,
    ) -> Result<()>;

    /// Whether a fetched entity should be treated as deleted.
    fn is_gone(&self, _entity: &Document) -> bool {
        false
    }

    /// Polling parameters when deletion completes in the background.
    fn deletion_wait(&self) -> Option<PollConfig> {
        None
    }

    /// Prepare a bag for import, e.g. fill attributes carried by the identity.
    fn import(&self, _id: &CompositeId, _bag: &mut AttributeBag) -> Result<()> {
        Ok(())
    }
}

/// Result of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The entity exists and the bag reflects it.
    Present,
    /// The entity no longer exists; the identity was cleared.
    Gone,
}

fn parse_identity<R: Resource + ?Sized>(resource: &R, id: &str) -> Result<CompositeId> {
    CompositeId::parse_legacy(id, resource.identity_arities(), resource.identity_free_tail())
}

fn encode_identity<R: Resource + ?Sized>(resource: &R, parts: &[String]) -> Result<String> {
    if resource.identity_free_tail() {
        identity::encode_free_tail(parts)
    } else {
        identity::encode(parts)
    }
}

fn label<R: Resource + ?Sized>(resource: &R, id: &str) -> String {
    format!("{} {id}", resource.type_name())
}

/// Create the entity described by the bag.
///
/// A bag that already carries the identity of an existing entity is only
/// refreshed. An identity whose entity is gone is cleared and the entity is
/// created again. On a remote failure the bag keeps no identity.
pub fn create<R: Resource + ?Sized>(
    resource: &R,
    client: &R::Client,
    ctx: &Context,
    bag: &mut AttributeBag,
) -> Result<()> {
    if !bag.is_new() {
        let existing = bag.identity().to_string();
        if read(resource, client, ctx, bag)? == ReadOutcome::Present {
            log::debug!("{} already exists, not creating", label(resource, &existing));
            return Ok(());
        }
    }

    let mapping = resource.mapping();
    let request = mapper::to_request(bag, mapping, RequestMode::Create)?;

    ctx.check(resource.type_name())?;
    log::debug!("create {} ({} fields)", resource.type_name(), request.len());
    let entity = resource.create(client, ctx, bag, request)?;

    let id = encode_identity(resource, &resource.identity_parts(bag, &entity)?)?;
    log::info!("created {}", label(resource, &id));
    bag.set_identity(id);
    mapper::to_bag(&entity, mapping, bag)?;

    match read(resource, client, ctx, bag)? {
        ReadOutcome::Present => Ok(()),
        ReadOutcome::Gone => Err(Error::inconsistent(
            resource.type_name(),
            "entity was not found right after it was created",
        )),
    }
}

/// Refresh the bag from the remote entity.
///
/// The bag is only modified on success: mapping happens on a scratch copy that
/// replaces the bag once the identity has been re-derived.
pub fn read<R: Resource + ?Sized>(
    resource: &R,
    client: &R::Client,
    ctx: &Context,
    bag: &mut AttributeBag,
) -> Result<ReadOutcome> {
    if bag.is_new() {
        return Ok(ReadOutcome::Gone);
    }

    let id = parse_identity(resource, bag.identity())?;
    let what = label(resource, id.as_str());
    ctx.check(&what)?;
    log::debug!("read {what}");

    let entity = match absorb_not_found(resource.get(client, ctx, &id, bag))? {
        Some(entity) if !resource.is_gone(&entity) => entity,
        _ => {
            log::info!("{what} no longer exists");
            bag.clear_identity();
            return Ok(ReadOutcome::Gone);
        }
    };

    let mut scratch = bag.clone();
    mapper::to_bag(&entity, resource.mapping(), &mut scratch)?;
    let fresh = encode_identity(resource, &resource.identity_parts(&scratch, &entity)?)?;
    if fresh != id.as_str() {
        log::debug!("{what} identity is now {fresh}");
    }
    scratch.set_identity(fresh);
    scratch.commit();
    *bag = scratch;

    Ok(ReadOutcome::Present)
}

/// Attributes whose change cannot be applied in place.
pub fn requires_replacement(bag: &AttributeBag) -> Vec<&'static str> {
    bag.replacement_attributes()
}

/// Apply changed attributes to the remote entity.
///
/// With nothing to send no remote update is issued; the entity is still read
/// back. Changes to force-new attributes are refused.
pub fn update<R: Resource + ?Sized>(
    resource: &R,
    client: &R::Client,
    ctx: &Context,
    bag: &mut AttributeBag,
) -> Result<()> {
    if let Some(attribute) = requires_replacement(bag).first() {
        return Err(Error::validation(
            *attribute,
            "cannot be changed in place; the resource must be replaced",
        ));
    }

    let id = parse_identity(resource, bag.identity())?;
    let what = label(resource, id.as_str());
    let request = mapper::to_request(bag, resource.mapping(), RequestMode::Update)?;

    if request.is_empty() {
        log::debug!("update {what}: nothing to send");
    } else {
        ctx.check(&what)?;
        log::debug!(
            "update {what}: {}",
            request.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        resource.update(client, ctx, &id, bag, request)?;
    }

    match read(resource, client, ctx, bag)? {
        ReadOutcome::Present => Ok(()),
        ReadOutcome::Gone => Err(Error::inconsistent(
            what,
            "entity disappeared during update",
        )),
    }
}

/// Delete the remote entity.
///
/// A 404 counts as already deleted. Resources with background teardown are
/// polled until a probe reports 404 or [`Resource::is_gone`].
pub fn delete<R: Resource + ?Sized>(
    resource: &R,
    client: &R::Client,
    ctx: &Context,
    bag: &mut AttributeBag,
) -> Result<()> {
    if bag.is_new() {
        return Ok(());
    }

    let id = parse_identity(resource, bag.identity())?;
    let what = label(resource, id.as_str());
    ctx.check(&what)?;
    log::debug!("delete {what}");

    match resource.delete(client, ctx, &id, bag) {
        Ok(()) => {}
        Err(err) if classify(&err) == Classification::NotFound => {
            log::info!("{what} was already deleted");
            bag.clear_identity();
            return Ok(());
        }
        Err(err) => return Err(err),
    }

    if let Some(config) = resource.deletion_wait() {
        let probe_bag = bag.clone();
        poller::wait_for(ctx, &what, &config, |ctx| {
            match absorb_not_found(resource.get(client, ctx, &id, &probe_bag))? {
                None => Ok(PollState::Done(())),
                Some(entity) if resource.is_gone(&entity) => Ok(PollState::Done(())),
                Some(_) => Ok(PollState::Pending("deleting".to_string())),
            }
        })?;
    }

    log::info!("deleted {what}");
    bag.clear_identity();
    Ok(())
}

/// Adopt an existing remote entity under `id`.
pub fn import<R: Resource + ?Sized>(
    resource: &R,
    client: &R::Client,
    ctx: &Context,
    bag: &mut AttributeBag,
    id: &str,
) -> Result<()> {
    let parsed = parse_identity(resource, id)?;
    bag.set_identity(parsed.as_str());
    resource.import(&parsed, bag)?;

    match read(resource, client, ctx, bag)? {
        ReadOutcome::Present => Ok(()),
        ReadOutcome::Gone => Err(Error::inconsistent(
            label(resource, id),
            "cannot import an entity that does not exist",
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bag::{Attribute, Kind, Value};
    use crate::error::RemoteError;
    use crate::mapper::{Codec, FieldMap};
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{LazyLock, Mutex};
    use std::time::Duration;

    const VISIBILITY: &[&str] = &["private", "internal", "public"];

    const FIELDS: &[FieldMap] = &[
        FieldMap::direct("name"),
        FieldMap::direct("path"),
        FieldMap::direct("description"),
        FieldMap::new("visibility_level", "visibility", Codec::Enum(VISIBILITY)),
        FieldMap::direct("parent_id").create_only(),
        FieldMap::direct("web_url").read_only(),
        FieldMap::direct("runners_token").read_only(),
    ];

    static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
        Schema::new(vec![
            Attribute::required("name", Kind::String),
            Attribute::required("path", Kind::String),
            Attribute::optional("description", Kind::String),
            Attribute::optional_computed("visibility_level", Kind::String),
            Attribute::optional("parent_id", Kind::Int)
                .default(Value::Int(0))
                .force_new(),
            Attribute::computed("web_url", Kind::String),
            Attribute::computed("runners_token", Kind::String).sensitive(),
        ])
    });

    static MAPPING: Mapping =
        Mapping::new("fake_group", FIELDS).with_always_send(&["visibility_level"]);

    /// In-memory remote holding groups keyed by numeric id.
    #[derive(Default)]
    pub(crate) struct FakeRemote {
        pub(crate) groups: Mutex<HashMap<i64, Document>>,
        pub(crate) next_id: AtomicUsize,
        pub(crate) updates: Mutex<Vec<Document>>,
        pub(crate) fail_with: Mutex<Option<u16>>,
        /// Probes left before a marked group disappears.
        pub(crate) teardown_probes: AtomicUsize,
        pub(crate) gets: AtomicUsize,
    }

    impl FakeRemote {
        fn failure(&self) -> Result<()> {
            match *self.fail_with.lock().unwrap() {
                Some(status) => Err(RemoteError::status(status, "scripted failure").into()),
                None => Ok(()),
            }
        }

        pub(crate) fn insert(&self, id: i64, entity: serde_json::Value) {
            let serde_json::Value::Object(mut doc) = entity else {
                panic!("entity must be an object");
            };
            doc.insert("id".into(), json!(id));
            self.groups.lock().unwrap().insert(id, doc);
        }
    }

    pub(crate) struct FakeGroup {
        pub(crate) async_delete: bool,
    }

    impl Resource for FakeGroup {
        type Client = FakeRemote;

        fn type_name(&self) -> &'static str {
            "fake_group"
        }

        fn schema(&self) -> &'static Schema {
            &SCHEMA
        }

        fn mapping(&self) -> &'static Mapping {
            &MAPPING
        }

        fn identity_parts(&self, _bag: &AttributeBag, entity: &Document) -> Result<Vec<String>> {
            Ok(vec![mapper::remote_id(entity, "id", self.type_name())?])
        }

        fn create(
            &self,
            client: &FakeRemote,
            _ctx: &Context,
            _bag: &AttributeBag,
            mut request: Document,
        ) -> Result<Document> {
            client.failure()?;
            let id = client.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
            let path = request["path"].as_str().unwrap_or_default().to_string();
            request.insert("id".into(), json!(id));
            request.insert("web_url".into(), json!(format!("https://gitlab.example/{path}")));
            request.insert("runners_token".into(), json!("glrt-server-generated"));
            request
                .entry("visibility")
                .or_insert_with(|| json!("private"));
            client.groups.lock().unwrap().insert(id, request.clone());
            Ok(request)
        }

        fn get(
            &self,
            client: &FakeRemote,
            _ctx: &Context,
            id: &CompositeId,
            _bag: &AttributeBag,
        ) -> Result<Document> {
            client.gets.fetch_add(1, Ordering::SeqCst);
            client.failure()?;
            let key = id.numeric(0)?;
            let mut groups = client.groups.lock().unwrap();
            let Some(group) = groups.get(&key).cloned() else {
                return Err(RemoteError::not_found(format!("group {key}")).into());
            };
            if group.contains_key("marked_for_deletion_on") {
                let left = client.teardown_probes.load(Ordering::SeqCst);
                if left == 0 {
                    groups.remove(&key);
                    return Err(RemoteError::not_found(format!("group {key}")).into());
                }
                client.teardown_probes.store(left - 1, Ordering::SeqCst);
            }
            Ok(group)
        }

        fn update(
            &self,
            client: &FakeRemote,
            _ctx: &Context,
            id: &CompositeId,
            _bag: &AttributeBag,
            request: Document,
        ) -> Result<()> {
            client.failure()?;
            let key = id.numeric(0)?;
            let mut groups = client.groups.lock().unwrap();
            let group = groups
                .get_mut(&key)
                .ok_or_else(|| Error::from(RemoteError::not_found(format!("group {key}"))))?;
            for (k, v) in &request {
                group.insert(k.clone(), v.clone());
            }
            client.updates.lock().unwrap().push(request);
            Ok(())
        }

        fn delete(
            &self,
            client: &FakeRemote,
            _ctx: &Context,
            id: &CompositeId,
            _bag: &AttributeBag,
        ) -> Result<()> {
            client.failure()?;
            let key = id.numeric(0)?;
            let mut groups = client.groups.lock().unwrap();
            if self.async_delete {
                let group = groups
                    .get_mut(&key)
                    .ok_or_else(|| Error::from(RemoteError::not_found(format!("group {key}"))))?;
                group.insert("marked_for_deletion_on".into(), json!("2030-01-01"));
                return Ok(());
            }
            groups
                .remove(&key)
                .map(|_| ())
                .ok_or_else(|| RemoteError::not_found(format!("group {key}")).into())
        }

        fn deletion_wait(&self) -> Option<PollConfig> {
            self.async_delete
                .then(|| PollConfig::immediate(Duration::from_millis(5), Duration::from_secs(2)))
        }
    }

    pub(crate) fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn desired(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn created(remote: &FakeRemote) -> AttributeBag {
        let mut bag = AttributeBag::for_create(
            &SCHEMA,
            &desired(&[("name", "Team".into()), ("path", "team".into())]),
        )
        .unwrap();
        create(&FakeGroup { async_delete: false }, remote, &Context::new(), &mut bag).unwrap();
        bag
    }

    #[test]
    fn test_create_then_read_fills_computed() {
        let remote = FakeRemote::default();
        let bag = created(&remote);

        assert_eq!(bag.identity(), "1");
        assert_eq!(
            bag.get_str("web_url").unwrap(),
            Some("https://gitlab.example/team")
        );
        assert_eq!(bag.get_str("runners_token").unwrap(), Some("glrt-server-generated"));
        assert_eq!(bag.get_str("visibility_level").unwrap(), Some("private"));
        assert!(bag.changed_attributes().is_empty());
        assert_eq!(remote.gets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_create_twice_keeps_single_entity() {
        let remote = FakeRemote::default();
        let mut bag = created(&remote);

        create(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag).unwrap();

        assert_eq!(bag.identity(), "1");
        assert_eq!(remote.groups.lock().unwrap().len(), 1);
        assert_eq!(remote.next_id.load(Ordering::SeqCst), 1);
        assert_eq!(bag.get_str("path").unwrap(), Some("team"));
    }

    #[test]
    fn test_create_with_stale_identity_recreates() {
        let remote = FakeRemote::default();
        let mut bag = created(&remote);
        remote.groups.lock().unwrap().remove(&1);

        create(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag).unwrap();

        assert_eq!(bag.identity(), "2");
        assert_eq!(remote.groups.lock().unwrap().len(), 1);
        assert_eq!(bag.get_str("web_url").unwrap(), Some("https://gitlab.example/team"));
    }

    #[test]
    fn test_create_failure_leaves_no_identity() {
        let remote = FakeRemote::default();
        *remote.fail_with.lock().unwrap() = Some(500);

        let mut bag =
            AttributeBag::for_create(&SCHEMA, &desired(&[("name", "T".into()), ("path", "t".into())]))
                .unwrap();
        let err = create(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag)
            .unwrap_err();

        assert_eq!(err.remote_status(), Some(500));
        assert!(bag.is_new());
    }

    #[test]
    fn test_create_validation_before_remote_call() {
        let remote = FakeRemote::default();
        let mut bag = AttributeBag::for_create(
            &SCHEMA,
            &desired(&[
                ("name", "T".into()),
                ("path", "t".into()),
                ("visibility_level", "secret".into()),
            ]),
        )
        .unwrap();
        let err = create(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag)
            .unwrap_err();

        assert!(matches!(err, Error::Validation { .. }));
        assert!(remote.groups.lock().unwrap().is_empty());
    }

    #[test]
    fn test_read_not_found_clears_identity() {
        let remote = FakeRemote::default();
        let mut bag = AttributeBag::from_state(&SCHEMA, "99", BTreeMap::new(), None).unwrap();

        let outcome = read(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag)
            .unwrap();
        assert_eq!(outcome, ReadOutcome::Gone);
        assert_eq!(bag.identity(), "");

        let again = read(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag)
            .unwrap();
        assert_eq!(again, ReadOutcome::Gone);
    }

    #[test]
    fn test_read_fatal_leaves_bag_untouched() {
        let remote = FakeRemote::default();
        let mut bag = created(&remote);
        let before = bag.state().clone();

        *remote.fail_with.lock().unwrap() = Some(502);
        let err = read(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag)
            .unwrap_err();

        assert_eq!(err.remote_status(), Some(502));
        assert_eq!(bag.identity(), "1");
        assert_eq!(bag.state(), &before);
    }

    #[test]
    fn test_read_malformed_identity() {
        let remote = FakeRemote::default();
        let mut bag = AttributeBag::from_state(&SCHEMA, "abc", BTreeMap::new(), None).unwrap();
        let err = read(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity { .. }));
    }

    #[test]
    fn test_read_rejects_extra_identity_parts() {
        let remote = FakeRemote::default();
        created(&remote);
        let mut bag = AttributeBag::from_state(&SCHEMA, "1:7", BTreeMap::new(), None).unwrap();
        let gets = remote.gets.load(Ordering::SeqCst);

        let err = read(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag)
            .unwrap_err();

        assert!(matches!(err, Error::MalformedIdentity { ref id, .. } if id == "1:7"));
        assert_eq!(remote.gets.load(Ordering::SeqCst), gets);
        assert_eq!(bag.identity(), "1:7");
    }

    #[test]
    fn test_read_picks_up_remote_changes() {
        let remote = FakeRemote::default();
        let mut bag = created(&remote);
        remote
            .groups
            .lock()
            .unwrap()
            .get_mut(&1)
            .unwrap()
            .insert("description".into(), json!("edited in the UI"));

        read(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag).unwrap();
        assert_eq!(bag.get_str("description").unwrap(), Some("edited in the UI"));
    }

    #[test]
    fn test_update_sends_minimal_request() {
        let remote = FakeRemote::default();
        let bag = created(&remote);

        let wanted = desired(&[
            ("name", "Team".into()),
            ("path", "team".into()),
            ("description", "new".into()),
        ]);
        let mut bag =
            AttributeBag::from_state(&SCHEMA, bag.identity(), bag.state().clone(), Some(&wanted))
                .unwrap();
        update(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag).unwrap();

        let updates = remote.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            serde_json::Value::Object(updates[0].clone()),
            json!({"description": "new", "visibility": "private"})
        );
        assert_eq!(bag.get_str("description").unwrap(), Some("new"));
    }

    #[test]
    fn test_update_with_nothing_to_send() {
        let remote = FakeRemote::default();
        let created = created(&remote);
        let mut bag = AttributeBag::from_state(
            &SCHEMA,
            created.identity(),
            created.state().clone(),
            None,
        )
        .unwrap();
        bag.clear("visibility_level");
        bag.commit();

        update(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag).unwrap();
        assert!(remote.updates.lock().unwrap().is_empty());
    }

    #[test]
    fn test_update_refuses_force_new_change() {
        let remote = FakeRemote::default();
        let bag = created(&remote);
        let wanted = desired(&[
            ("name", "Team".into()),
            ("path", "team".into()),
            ("parent_id", Value::Int(5)),
        ]);
        let mut bag =
            AttributeBag::from_state(&SCHEMA, bag.identity(), bag.state().clone(), Some(&wanted))
                .unwrap();

        assert_eq!(requires_replacement(&bag), vec!["parent_id"]);
        let err = update(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag)
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref attribute, .. } if attribute == "parent_id"));
        assert!(remote.updates.lock().unwrap().is_empty());
    }

    #[test]
    fn test_delete_not_found_is_success() {
        let remote = FakeRemote::default();
        let mut bag = AttributeBag::from_state(&SCHEMA, "7", BTreeMap::new(), None).unwrap();
        delete(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag).unwrap();
        assert!(bag.is_new());
    }

    #[test]
    fn test_delete_fatal_keeps_identity() {
        let remote = FakeRemote::default();
        let mut bag = created(&remote);
        *remote.fail_with.lock().unwrap() = Some(403);
        let err = delete(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag)
            .unwrap_err();
        assert_eq!(err.remote_status(), Some(403));
        assert_eq!(bag.identity(), "1");
    }

    #[test]
    fn test_delete_waits_for_background_teardown() {
        let remote = FakeRemote::default();
        let mut bag = created(&remote);
        remote.teardown_probes.store(3, Ordering::SeqCst);
        let gets_before = remote.gets.load(Ordering::SeqCst);

        delete(&FakeGroup { async_delete: true }, &remote, &Context::new(), &mut bag).unwrap();

        assert!(bag.is_new());
        assert!(remote.groups.lock().unwrap().is_empty());
        assert_eq!(remote.gets.load(Ordering::SeqCst) - gets_before, 4);
    }

    #[test]
    fn test_read_existing_entity() {
        let remote = FakeRemote::default();
        remote.insert(4, json!({"name": "Old", "path": "old"}));
        let mut bag = AttributeBag::from_state(&SCHEMA, "4", BTreeMap::new(), None).unwrap();
        let outcome = read(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag)
            .unwrap();
        assert_eq!(outcome, ReadOutcome::Present);
        assert_eq!(bag.get_str("path").unwrap(), Some("old"));
    }

    #[test]
    fn test_import() {
        let remote = FakeRemote::default();
        remote.insert(12, json!({"name": "Imported", "path": "imported", "visibility": "public"}));

        let mut bag = AttributeBag::new(&SCHEMA);
        import(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut bag, "12")
            .unwrap();
        assert_eq!(bag.identity(), "12");
        assert_eq!(bag.get_str("visibility_level").unwrap(), Some("public"));

        let mut missing = AttributeBag::new(&SCHEMA);
        let err = import(&FakeGroup { async_delete: false }, &remote, &Context::new(), &mut missing, "13")
            .unwrap_err();
        assert!(matches!(err, Error::Inconsistent { .. }));
    }

    #[test]
    fn test_cancelled_context_stops_before_remote_call() {
        let remote = FakeRemote::default();
        let ctx = Context::new();
        ctx.cancel_token().cancel();
        let mut bag =
            AttributeBag::for_create(&SCHEMA, &desired(&[("name", "T".into()), ("path", "t".into())]))
                .unwrap();
        let err = create(&FakeGroup { async_delete: false }, &remote, &ctx, &mut bag).unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
        assert!(remote.groups.lock().unwrap().is_empty());
    }
}
