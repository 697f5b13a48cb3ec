//! State mapper
//!
//! Converts between an [`AttributeBag`] and the JSON documents a remote API
//! sends and receives. Each resource type declares a [`Mapping`]: a list of
//! [`FieldMap`]s naming the attribute, its remote key and how to convert it.
//!
//! Request building follows two rules. On create every declared, non-null
//! attribute is sent. On update only changed attributes are sent, plus the
//! mapping's `always_send` list, which holds fields the remote API resets when
//! they are omitted from an update.

use crate::bag::{AttributeBag, Kind, Value};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;

/// A remote JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Timestamp format written into bags.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Date format written into bags and sent to the API.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// How a field converts between its attribute and remote representation.
#[derive(Debug, Clone, Copy)]
pub enum Codec {
    /// JSON value as-is.
    Direct,
    /// String restricted to the listed values.
    Enum(&'static [&'static str]),
    /// Level name in the bag, integer on the wire.
    ///
    /// Decoding picks the first name with a matching level, so aliases go
    /// after the canonical name.
    AccessLevel(&'static [(&'static str, i64)]),
    /// RFC 3339 timestamp, normalized to UTC seconds.
    Timestamp,
    /// Calendar date, `YYYY-MM-DD`.
    Date,
    /// List of strings.
    StringList,
    /// Array of objects, each mapped field by field into a map.
    Nested(&'static [FieldMap]),
}

/// When a field is sent on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Sent when the attribute changed.
    WhenChanged,
    /// Never sent on update.
    Never,
}

/// One attribute and its remote counterpart.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    pub attribute: &'static str,
    pub remote: &'static str,
    pub codec: Codec,
    /// Sent on create.
    pub on_create: bool,
    pub on_update: UpdatePolicy,
    /// Copied from remote documents into the bag.
    pub read: bool,
}

impl FieldMap {
    pub const fn new(attribute: &'static str, remote: &'static str, codec: Codec) -> Self {
        Self {
            attribute,
            remote,
            codec,
            on_create: true,
            on_update: UpdatePolicy::WhenChanged,
            read: true,
        }
    }

    /// Attribute and remote key share a name, value passed through.
    pub const fn direct(name: &'static str) -> Self {
        Self::new(name, name, Codec::Direct)
    }

    /// Sent on create only.
    pub const fn create_only(self) -> Self {
        Self {
            on_update: UpdatePolicy::Never,
            ..self
        }
    }

    /// Never sent; only read back.
    pub const fn read_only(self) -> Self {
        Self {
            on_create: false,
            on_update: UpdatePolicy::Never,
            ..self
        }
    }

    /// Sent but never read back.
    pub const fn write_only(self) -> Self {
        Self { read: false, ..self }
    }
}

/// Field mappings of one resource type.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub resource_type: &'static str,
    pub fields: &'static [FieldMap],
    /// Attributes sent on every update, changed or not.
    pub always_send: &'static [&'static str],
}

impl Mapping {
    pub const fn new(resource_type: &'static str, fields: &'static [FieldMap]) -> Self {
        Self {
            resource_type,
            fields,
            always_send: &[],
        }
    }

    pub const fn with_always_send(self, always_send: &'static [&'static str]) -> Self {
        Self {
            always_send,
            ..self
        }
    }

    pub fn field(&self, attribute: &str) -> Option<&FieldMap> {
        self.fields.iter().find(|f| f.attribute == attribute)
    }

    fn always_sends(&self, attribute: &str) -> bool {
        self.always_send.contains(&attribute)
    }
}

/// Which request is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Create,
    Update,
}

/// Build a request body from a bag.
///
/// Values are validated before anything is returned, so a `Validation` error
/// means no request was built and nothing was sent.
pub fn to_request(bag: &AttributeBag, mapping: &Mapping, mode: RequestMode) -> Result<Document> {
    let mut request = Document::new();

    for field in mapping.fields {
        let value = bag.get(field.attribute);

        let wire = match mode {
            RequestMode::Create => {
                if !field.on_create || value.is_null() {
                    continue;
                }
                encode(field.attribute, field.codec, value)?
            }
            RequestMode::Update => {
                let changed = bag.has_changed(field.attribute);
                let always = mapping.always_sends(field.attribute);
                let allowed = field.on_update == UpdatePolicy::WhenChanged || always;
                if !allowed || !(changed || always) {
                    continue;
                }
                if value.is_null() {
                    if !changed {
                        continue;
                    }
                    cleared(bag, field)
                } else {
                    encode(field.attribute, field.codec, value)?
                }
            }
        };

        request.insert(field.remote.to_string(), wire);
    }

    Ok(request)
}

/// Copy a remote document into a bag.
///
/// Keys absent from the document leave the bag untouched; explicit `null`s
/// unset the attribute.
pub fn to_bag(entity: &Document, mapping: &Mapping, bag: &mut AttributeBag) -> Result<()> {
    for field in mapping.fields.iter().filter(|f| f.read) {
        let Some(json) = entity.get(field.remote) else {
            continue;
        };
        let value = decode(field, json).map_err(|message| {
            Error::inconsistent(
                mapping.resource_type,
                format!("field {}: {message}", field.remote),
            )
        })?;
        bag.set(field.attribute, value);
    }
    Ok(())
}

/// Read a remote identifier (string or number) as a string.
pub fn remote_id(entity: &Document, key: &str, resource_type: &str) -> Result<String> {
    match entity.get(key) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(Error::inconsistent(
            resource_type,
            format!("response has no usable {key:?}"),
        )),
    }
}

fn cleared(bag: &AttributeBag, field: &FieldMap) -> serde_json::Value {
    match field.codec {
        Codec::Direct | Codec::StringList | Codec::Nested(_) => bag
            .schema()
            .get(field.attribute)
            .map_or(serde_json::Value::Null, |attr| attr.kind.zero().to_json()),
        _ => serde_json::Value::Null,
    }
}

fn encode(attribute: &str, codec: Codec, value: &Value) -> Result<serde_json::Value> {
    match codec {
        Codec::Direct => Ok(value.to_json()),
        Codec::Enum(allowed) => {
            let s = expect_str(attribute, value)?;
            if allowed.contains(&s) {
                Ok(serde_json::Value::from(s))
            } else {
                Err(Error::validation(
                    attribute,
                    format!("{s:?} is not one of: {}", allowed.join(", ")),
                ))
            }
        }
        Codec::AccessLevel(levels) => {
            let s = expect_str(attribute, value)?;
            levels
                .iter()
                .find(|(name, _)| *name == s)
                .map(|(_, level)| serde_json::Value::from(*level))
                .ok_or_else(|| {
                    let names: Vec<&str> = levels.iter().map(|(name, _)| *name).collect();
                    Error::validation(
                        attribute,
                        format!("{s:?} is not one of: {}", names.join(", ")),
                    )
                })
        }
        Codec::Timestamp => {
            let s = expect_str(attribute, value)?;
            DateTime::parse_from_rfc3339(s).map_err(|e| {
                Error::validation(attribute, format!("{s:?} is not an RFC 3339 timestamp: {e}"))
            })?;
            Ok(serde_json::Value::from(s))
        }
        Codec::Date => {
            let s = expect_str(attribute, value)?;
            NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| {
                Error::validation(attribute, format!("{s:?} is not a YYYY-MM-DD date"))
            })?;
            Ok(serde_json::Value::from(s))
        }
        Codec::StringList => {
            let Some(items) = value.as_list() else {
                return Err(kind_error(attribute, Kind::List, value));
            };
            items
                .iter()
                .map(|item| expect_str(attribute, item).map(serde_json::Value::from))
                .collect::<Result<Vec<_>>>()
                .map(serde_json::Value::Array)
        }
        Codec::Nested(fields) => {
            let Some(items) = value.as_list() else {
                return Err(kind_error(attribute, Kind::List, value));
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let Some(map) = item.as_map() else {
                    return Err(kind_error(attribute, Kind::Map, item));
                };
                let mut object = Document::new();
                for field in fields.iter().filter(|f| f.on_create) {
                    let Some(inner) = map.get(field.attribute).filter(|v| !v.is_null()) else {
                        continue;
                    };
                    let name = format!("{attribute}.{}", field.attribute);
                    object.insert(field.remote.to_string(), encode(&name, field.codec, inner)?);
                }
                out.push(serde_json::Value::Object(object));
            }
            Ok(serde_json::Value::Array(out))
        }
    }
}

fn expect_str<'a>(attribute: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| kind_error(attribute, Kind::String, value))
}

fn kind_error(attribute: &str, expected: Kind, found: &Value) -> Error {
    let found = found.kind().map_or("null", Kind::name);
    Error::validation(attribute, format!("expected {expected}, found {found}"))
}

fn decode(field: &FieldMap, json: &serde_json::Value) -> std::result::Result<Value, String> {
    if json.is_null() {
        return Ok(Value::Null);
    }

    match field.codec {
        Codec::Direct => Ok(Value::from_json(json)),
        Codec::Enum(_) => json
            .as_str()
            .map(Value::from)
            .ok_or_else(|| format!("expected a string, got {json}")),
        Codec::AccessLevel(levels) => {
            let level = json
                .as_i64()
                .ok_or_else(|| format!("expected an access level number, got {json}"))?;
            Ok(levels
                .iter()
                .find(|(_, l)| *l == level)
                .map_or_else(|| Value::String(level.to_string()), |(name, _)| Value::from(*name)))
        }
        Codec::Timestamp => {
            let s = json
                .as_str()
                .ok_or_else(|| format!("expected a timestamp, got {json}"))?;
            let parsed = DateTime::parse_from_rfc3339(s)
                .map_err(|e| format!("bad timestamp {s:?}: {e}"))?;
            Ok(Value::String(
                parsed.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string(),
            ))
        }
        Codec::Date => {
            let s = json
                .as_str()
                .ok_or_else(|| format!("expected a date, got {json}"))?;
            let date = NaiveDate::parse_from_str(s, DATE_FORMAT)
                .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.date_naive()))
                .map_err(|e| format!("bad date {s:?}: {e}"))?;
            Ok(Value::String(date.format(DATE_FORMAT).to_string()))
        }
        Codec::StringList => {
            let items = json
                .as_array()
                .ok_or_else(|| format!("expected an array, got {json}"))?;
            items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(Value::from)
                        .ok_or_else(|| format!("expected strings, got {item}"))
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::List)
        }
        Codec::Nested(fields) => {
            let items = json
                .as_array()
                .ok_or_else(|| format!("expected an array, got {json}"))?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let object = item
                    .as_object()
                    .ok_or_else(|| format!("expected objects, got {item}"))?;
                let mut map = BTreeMap::new();
                for inner in fields.iter().filter(|f| f.read) {
                    if let Some(value) = object.get(inner.remote) {
                        let value = decode(inner, value)?;
                        if !value.is_null() {
                            map.insert(inner.attribute.to_string(), value);
                        }
                    }
                }
                out.push(Value::Map(map));
            }
            Ok(Value::List(out))
        }
    }
}
