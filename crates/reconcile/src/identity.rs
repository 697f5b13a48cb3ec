//! Composite identity codec
//!
//! Multi-part identities are joined with `:`. No part may contain the
//! separator, and decoding rejects any identity whose separator count does not
//! match the arity.
//!
//! Types whose last part is free text use the `_free_tail` variants: only the
//! leading parts are checked, and decoding splits on the first `arity - 1`
//! separators, so `project:key:scope:with:colons` decodes to
//! `["project", "key", "scope:with:colons"]` at arity 3.
//!
//! GitLab project paths use `/`, never `:`, so a project path is always safe as
//! a leading part.

use crate::error::{Error, Result};
use std::fmt;
use std::ops::RangeInclusive;

/// Separator between identity parts.
pub const SEPARATOR: char = ':';

/// Join identity parts into one identity string.
///
/// Fails with `MalformedIdentity` when a part is empty or contains the
/// separator.
pub fn encode<S: AsRef<str>>(parts: &[S]) -> Result<String> {
    join(parts, false)
}

/// Like [`encode`], but the last part may contain the separator.
pub fn encode_free_tail<S: AsRef<str>>(parts: &[S]) -> Result<String> {
    join(parts, true)
}

fn join<S: AsRef<str>>(parts: &[S], free_tail: bool) -> Result<String> {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(":");

    let Some(last) = parts.len().checked_sub(1) else {
        return Err(Error::malformed(joined, "identity needs at least one part"));
    };

    for (index, part) in parts.iter().enumerate() {
        let part = part.as_ref();
        if part.is_empty() {
            return Err(Error::malformed(
                joined,
                format!("part {} is empty", index + 1),
            ));
        }
        if (index < last || !free_tail) && part.contains(SEPARATOR) {
            return Err(Error::malformed(
                joined,
                format!("part {} ({part:?}) contains '{SEPARATOR}'", index + 1),
            ));
        }
    }

    Ok(joined)
}

/// Split an identity string into exactly `arity` parts.
///
/// Every separator splits, so extra separators are an error.
pub fn decode(id: &str, arity: usize) -> Result<Vec<String>> {
    split(id, arity, false)
}

/// Split an identity string into `arity` parts, the last keeping any further
/// separators.
pub fn decode_free_tail(id: &str, arity: usize) -> Result<Vec<String>> {
    split(id, arity, true)
}

fn split(id: &str, arity: usize, free_tail: bool) -> Result<Vec<String>> {
    if arity == 0 {
        return Err(Error::malformed(id, "arity must be at least 1"));
    }

    let parts: Vec<String> = if free_tail {
        id.splitn(arity, SEPARATOR).map(str::to_string).collect()
    } else {
        id.split(SEPARATOR).map(str::to_string).collect()
    };

    if parts.len() != arity {
        return Err(Error::malformed(
            id,
            format!(
                "expected {arity} parts separated by '{SEPARATOR}', found {}",
                parts.len()
            ),
        ));
    }

    if let Some(index) = parts.iter().position(String::is_empty) {
        return Err(Error::malformed(id, format!("part {} is empty", index + 1)));
    }

    Ok(parts)
}

/// Split an identity that may use any arity in `arities`.
///
/// Used where an older identity format had fewer parts. The number of parts
/// actually present picks the arity. More parts than the largest accepted
/// arity is an error unless `free_tail` is set, in which case the last part
/// absorbs the rest.
pub fn decode_legacy(id: &str, arities: RangeInclusive<usize>, free_tail: bool) -> Result<Vec<String>> {
    let (min, max) = (*arities.start(), *arities.end());
    let present = id.matches(SEPARATOR).count() + 1;
    if present < min || (present > max && !free_tail) {
        return Err(Error::malformed(
            id,
            format!("expected {min} to {max} parts separated by '{SEPARATOR}', found {present}"),
        ));
    }
    split(id, present.min(max), free_tail)
}

/// Parse one identity part as an integer.
pub fn parse_numeric(id: &str, part: &str) -> Result<i64> {
    part.parse::<i64>()
        .map_err(|_| Error::malformed(id, format!("{part:?} is not a numeric ID")))
}

/// A decoded composite identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeId {
    raw: String,
    parts: Vec<String>,
}

impl CompositeId {
    /// Decode an identity with a fixed arity.
    pub fn parse(id: &str, arity: usize) -> Result<Self> {
        Ok(Self {
            raw: id.to_string(),
            parts: decode(id, arity)?,
        })
    }

    /// Decode an identity accepting a range of arities.
    pub fn parse_legacy(id: &str, arities: RangeInclusive<usize>, free_tail: bool) -> Result<Self> {
        Ok(Self {
            raw: id.to_string(),
            parts: decode_legacy(id, arities, free_tail)?,
        })
    }

    /// Build an identity from parts, validating them like [`encode`].
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> Result<Self> {
        let raw = encode(parts)?;
        Ok(Self {
            raw,
            parts: parts.iter().map(|p| p.as_ref().to_string()).collect(),
        })
    }

    /// The identity string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always false; a decoded identity has at least one part.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// All parts, in order.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Part at `index`, or `""` past the end.
    pub fn part(&self, index: usize) -> &str {
        self.parts.get(index).map_or("", String::as_str)
    }

    /// Part at `index` parsed as an integer.
    pub fn numeric(&self, index: usize) -> Result<i64> {
        match self.parts.get(index) {
            Some(part) => parse_numeric(&self.raw, part),
            None => Err(Error::malformed(
                &self.raw,
                format!("missing part {}", index + 1),
            )),
        }
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
