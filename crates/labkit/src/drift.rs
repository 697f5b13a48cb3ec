//! Fields GitLab resets when an update omits them.
//!
//! Some update endpoints treat a missing field as "use the default" rather
//! than "leave unchanged". Such fields are sent on every update, changed or
//! not. The list is kept in one place so it can be reviewed as a whole.

/// Resource type to attributes sent on every update.
pub const ALWAYS_SEND_ON_UPDATE: &[(&str, &[&str])] = &[("gitlab_group", &["visibility_level"])];

/// Attributes of `resource_type` that go into every update request.
pub fn always_send(resource_type: &str) -> &'static [&'static str] {
    ALWAYS_SEND_ON_UPDATE
        .iter()
        .find(|(name, _)| *name == resource_type)
        .map(|(_, attributes)| *attributes)
        .unwrap_or_default()
}
