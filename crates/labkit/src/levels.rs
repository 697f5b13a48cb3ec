//! GitLab access levels.
//!
//! Access levels are integers on the wire and names in manifests. The table
//! feeds [`reconcile::Codec::AccessLevel`]; decoding picks the first name with
//! a matching level, so the deprecated `master` alias sits after `maintainer`.

use reconcile::Codec;

pub const NO_ACCESS: i64 = 0;
pub const MINIMAL: i64 = 5;
pub const GUEST: i64 = 10;
pub const REPORTER: i64 = 20;
pub const DEVELOPER: i64 = 30;
pub const MAINTAINER: i64 = 40;
pub const OWNER: i64 = 50;

/// Level names and their numeric values.
pub const ACCESS_LEVELS: &[(&str, i64)] = &[
    ("no one", NO_ACCESS),
    ("minimal", MINIMAL),
    ("guest", GUEST),
    ("reporter", REPORTER),
    ("developer", DEVELOPER),
    ("maintainer", MAINTAINER),
    ("master", MAINTAINER),
    ("owner", OWNER),
];

/// Codec for access level fields.
pub const CODEC: Codec = Codec::AccessLevel(ACCESS_LEVELS);

/// Numeric value of a level name.
pub fn value(name: &str) -> Option<i64> {
    ACCESS_LEVELS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, level)| *level)
}

/// Canonical name of a numeric level.
pub fn name(level: i64) -> Option<&'static str> {
    ACCESS_LEVELS
        .iter()
        .find(|(_, l)| *l == level)
        .map(|(n, _)| *n)
}
