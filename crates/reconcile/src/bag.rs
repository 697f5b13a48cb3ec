//! Attribute bag
//!
//! Typed key-value view of one resource instance. A bag holds two maps: the
//! `prior` values (what was last observed remotely) and the `planned` values
//! (what the cycle wants, or has just read). "Changed" means the two differ.
//!
//! Every attribute is declared in a [`Schema`]; the schema decides which
//! attributes the user may set, which are server-computed, which are sensitive
//! and which force a replacement when they change.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An attribute value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Unset. Distinct from any zero value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

static NULL: Value = Value::Null;

impl Value {
    /// Whether the value is unset.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The kind of this value, or `None` for `Null`.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(Kind::Bool),
            Self::Int(_) => Some(Kind::Int),
            Self::String(_) => Some(Kind::String),
            Self::List(_) => Some(Kind::List),
            Self::Map(_) => Some(Kind::Map),
        }
    }

    /// Whether the value may be stored in an attribute of `kind`.
    pub fn matches(&self, kind: Kind) -> bool {
        self.kind().is_none_or(|k| k == kind)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Convert a JSON value. Non-integral numbers become strings.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::String(n.to_string()), Self::Int),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    String,
    List,
    Map,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::String => "string",
            Self::List => "list",
            Self::Map => "map",
        }
    }

    /// The value sent to clear an attribute of this kind.
    pub fn zero(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::String => Value::String(String::new()),
            Self::List => Value::List(Vec::new()),
            Self::Map => Value::Map(BTreeMap::new()),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who provides an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be declared.
    Required,
    /// May be declared; unset means unset.
    Optional,
    /// Set by the server only.
    Computed,
    /// May be declared; when omitted the server's value is kept.
    OptionalComputed,
}

impl Presence {
    /// Whether the user may declare a value.
    pub fn is_settable(self) -> bool {
        !matches!(self, Self::Computed)
    }
}

/// Declaration of one attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: Kind,
    pub presence: Presence,
    /// Excluded from logs and rendered diffs.
    pub sensitive: bool,
    /// Changing it requires deleting and recreating the remote entity.
    pub force_new: bool,
    /// Used when the attribute is not declared.
    pub default: Option<Value>,
}

impl Attribute {
    fn new(name: &'static str, kind: Kind, presence: Presence) -> Self {
        Self {
            name,
            kind,
            presence,
            sensitive: false,
            force_new: false,
            default: None,
        }
    }

    pub fn required(name: &'static str, kind: Kind) -> Self {
        Self::new(name, kind, Presence::Required)
    }

    pub fn optional(name: &'static str, kind: Kind) -> Self {
        Self::new(name, kind, Presence::Optional)
    }

    pub fn computed(name: &'static str, kind: Kind) -> Self {
        Self::new(name, kind, Presence::Computed)
    }

    pub fn optional_computed(name: &'static str, kind: Kind) -> Self {
        Self::new(name, kind, Presence::OptionalComputed)
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// The declared attributes of one resource type, in declaration order.
#[derive(Debug, Clone)]
pub struct Schema {
    attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Check declared values against the schema.
    ///
    /// Rejects unknown attributes, values for computed attributes, kind
    /// mismatches, and missing required attributes.
    pub fn validate(&self, desired: &BTreeMap<String, Value>) -> Result<()> {
        for (name, value) in desired {
            let Some(attr) = self.get(name) else {
                return Err(Error::validation(name, "unknown attribute"));
            };
            if !attr.presence.is_settable() {
                return Err(Error::validation(name, "is computed and cannot be set"));
            }
            if !value.matches(attr.kind) {
                return Err(mismatch(name, attr.kind, value));
            }
        }

        for attr in &self.attributes {
            if attr.presence == Presence::Required
                && desired.get(attr.name).is_none_or(Value::is_null)
            {
                return Err(Error::validation(attr.name, "is required"));
            }
        }

        Ok(())
    }
}

fn mismatch(name: &str, expected: Kind, found: &Value) -> Error {
    let found = found.kind().map_or("null", Kind::name);
    Error::validation(name, format!("expected {expected}, found {found}"))
}

/// Attribute values of one resource instance for one reconciliation cycle.
#[derive(Clone)]
pub struct AttributeBag {
    schema: &'static Schema,
    identity: String,
    prior: BTreeMap<String, Value>,
    planned: BTreeMap<String, Value>,
}

impl AttributeBag {
    /// An empty bag with no identity.
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            identity: String::new(),
            prior: BTreeMap::new(),
            planned: BTreeMap::new(),
        }
    }

    /// A bag for a resource that does not exist yet.
    pub fn for_create(schema: &'static Schema, desired: &BTreeMap<String, Value>) -> Result<Self> {
        Self::from_state(schema, "", BTreeMap::new(), Some(desired))
    }

    /// A bag for a known resource.
    ///
    /// With `desired`, planned values come from it: computed attributes keep
    /// their prior value, omitted optional-computed attributes keep theirs, and
    /// omitted optional attributes fall back to the schema default. Without
    /// `desired` the bag reflects the prior state unchanged.
    pub fn from_state(
        schema: &'static Schema,
        identity: &str,
        prior: BTreeMap<String, Value>,
        desired: Option<&BTreeMap<String, Value>>,
    ) -> Result<Self> {
        let planned = match desired {
            None => prior.clone(),
            Some(desired) => {
                schema.validate(desired)?;
                merge(schema, &prior, desired)
            }
        };

        Ok(Self {
            schema,
            identity: identity.to_string(),
            prior,
            planned,
        })
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Current value, `Null` when unset.
    pub fn get(&self, name: &str) -> &Value {
        self.planned.get(name).unwrap_or(&NULL)
    }

    pub fn get_str(&self, name: &str) -> Result<Option<&str>> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(mismatch(name, Kind::String, other)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<Option<i64>> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(*i)),
            other => Err(mismatch(name, Kind::Int, other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            other => Err(mismatch(name, Kind::Bool, other)),
        }
    }

    pub fn get_list(&self, name: &str) -> Result<Option<&[Value]>> {
        match self.get(name) {
            Value::Null => Ok(None),
            Value::List(items) => Ok(Some(items)),
            other => Err(mismatch(name, Kind::List, other)),
        }
    }

    /// String value that must be present.
    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.get_str(name)?
            .ok_or_else(|| Error::validation(name, "is required"))
    }

    /// Integer value that must be present.
    pub fn require_int(&self, name: &str) -> Result<i64> {
        self.get_int(name)?
            .ok_or_else(|| Error::validation(name, "is required"))
    }

    /// Set a value. Setting `Null` unsets it.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if value.is_null() {
            self.planned.remove(name);
        } else {
            self.planned.insert(name.to_string(), value);
        }
    }

    pub fn clear(&mut self, name: &str) {
        self.planned.remove(name);
    }

    /// Whether the planned value differs from the prior one.
    pub fn has_changed(&self, name: &str) -> bool {
        self.prior.get(name).unwrap_or(&NULL) != self.get(name)
    }

    /// `(old, new)` for an attribute.
    pub fn get_change(&self, name: &str) -> (&Value, &Value) {
        (self.prior.get(name).unwrap_or(&NULL), self.get(name))
    }

    /// Settable attributes whose value changed, in schema order.
    pub fn changed_attributes(&self) -> Vec<&'static str> {
        self.schema
            .iter()
            .filter(|a| a.presence.is_settable() && self.has_changed(a.name))
            .map(|a| a.name)
            .collect()
    }

    /// Changed attributes that cannot be updated in place.
    ///
    /// Empty for a bag that has no identity yet.
    pub fn replacement_attributes(&self) -> Vec<&'static str> {
        if self.is_new() {
            return Vec::new();
        }
        self.schema
            .iter()
            .filter(|a| a.force_new && self.has_changed(a.name))
            .map(|a| a.name)
            .collect()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn set_identity(&mut self, identity: impl Into<String>) {
        self.identity = identity.into();
    }

    pub fn clear_identity(&mut self) {
        self.identity.clear();
    }

    /// Whether the bag has no remote identity.
    pub fn is_new(&self) -> bool {
        self.identity.is_empty()
    }

    /// Accept the planned values as the observed state.
    pub fn commit(&mut self) {
        self.prior = self.planned.clone();
    }

    /// Forget the remote entity so the bag can be created again.
    pub fn reset_for_create(&mut self) {
        self.identity.clear();
        self.prior.clear();
        for attr in self.schema.iter() {
            if attr.presence == Presence::Computed {
                self.planned.remove(attr.name);
            }
        }
    }

    /// Planned values. This is what gets persisted.
    pub fn state(&self) -> &BTreeMap<String, Value> {
        &self.planned
    }

    /// Prior values.
    pub fn prior(&self) -> &BTreeMap<String, Value> {
        &self.prior
    }

    /// Whether an attribute is declared sensitive.
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.schema.get(name).is_some_and(|a| a.sensitive)
    }

    /// Planned values with sensitive ones masked, for logs and display.
    pub fn redacted(&self) -> BTreeMap<String, Value> {
        self.planned
            .iter()
            .map(|(name, value)| {
                let value = if self.is_sensitive(name) {
                    Value::from("(sensitive)")
                } else {
                    value.clone()
                };
                (name.clone(), value)
            })
            .collect()
    }
}

impl fmt::Debug for AttributeBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeBag")
            .field("identity", &self.identity)
            .field("state", &self.redacted())
            .finish_non_exhaustive()
    }
}

fn merge(
    schema: &Schema,
    prior: &BTreeMap<String, Value>,
    desired: &BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    let mut planned = BTreeMap::new();

    for attr in schema.iter() {
        let declared = desired.get(attr.name).filter(|v| !v.is_null());
        let value = match (attr.presence, declared) {
            (Presence::Computed, _) => prior.get(attr.name).cloned(),
            (_, Some(value)) => Some(value.clone()),
            (Presence::OptionalComputed, None) => prior.get(attr.name).cloned(),
            (_, None) => attr.default.clone(),
        };
        if let Some(value) = value.filter(|v| !v.is_null()) {
            planned.insert(attr.name.to_string(), value);
        }
    }

    planned
}
