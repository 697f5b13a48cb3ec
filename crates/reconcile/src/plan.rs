//! Change planning - decide what each resource instance needs

use crate::bag::{AttributeBag, Value};
use std::collections::HashMap;

/// What a change will do to the remote entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do
    NoOp,
    /// Entity does not exist yet
    Create,
    /// Update in place
    Update { changed: Vec<&'static str> },
    /// Delete and create again because these attributes changed
    Replace { attributes: Vec<&'static str> },
    /// Entity is no longer declared
    Delete,
}

impl Action {
    /// Short label used in output and progress callbacks
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Update { .. } => "update",
            Self::Replace { .. } => "replace",
            Self::Delete => "delete",
        }
    }

    /// Check if the action touches the remote entity
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

/// Decide the action for a declared resource instance.
pub fn planned_action(bag: &AttributeBag) -> Action {
    if bag.is_new() {
        return Action::Create;
    }

    let replace = bag.replacement_attributes();
    if !replace.is_empty() {
        return Action::Replace {
            attributes: replace,
        };
    }

    let changed = bag.changed_attributes();
    if changed.is_empty() {
        Action::NoOp
    } else {
        Action::Update { changed }
    }
}

/// One planned change
#[derive(Debug, Clone)]
pub struct Change {
    /// Address of the instance, `type.name`
    pub address: String,
    /// Resource type name
    pub resource_type: String,
    /// What to do
    pub action: Action,
    /// Attribute bag the cycle runs with
    pub bag: AttributeBag,
}

impl Change {
    /// Plan a declared instance.
    pub fn declared(resource_type: &str, name: &str, bag: AttributeBag) -> Self {
        Self {
            address: address(resource_type, name),
            resource_type: resource_type.to_string(),
            action: planned_action(&bag),
            bag,
        }
    }

    /// Plan the deletion of an instance that is no longer declared.
    pub fn removal(resource_type: &str, name: &str, bag: AttributeBag) -> Self {
        Self {
            address: address(resource_type, name),
            resource_type: resource_type.to_string(),
            action: Action::Delete,
            bag,
        }
    }

    /// `(attribute, old, new)` for every attribute the change touches.
    ///
    /// Sensitive values are masked.
    pub fn attribute_changes(&self) -> Vec<(&'static str, Value, Value)> {
        let names: Vec<&'static str> = match &self.action {
            Action::NoOp => Vec::new(),
            Action::Delete => Vec::new(),
            Action::Create => self
                .bag
                .schema()
                .iter()
                .filter(|a| !self.bag.get(a.name).is_null())
                .map(|a| a.name)
                .collect(),
            Action::Update { .. } | Action::Replace { .. } => self.bag.changed_attributes(),
        };

        names
            .into_iter()
            .map(|name| {
                let (old, new) = self.bag.get_change(name);
                if self.bag.is_sensitive(name) {
                    let mask = |v: &Value| {
                        if v.is_null() { Value::Null } else { Value::from("(sensitive)") }
                    };
                    (name, mask(old), mask(new))
                } else {
                    (name, old.clone(), new.clone())
                }
            })
            .collect()
    }
}

/// Build an address from type and name.
pub fn address(resource_type: &str, name: &str) -> String {
    format!("{resource_type}.{name}")
}

/// A set of planned changes
#[derive(Debug, Default)]
pub struct Plan {
    pub changes: Vec<Change>,
}

impl Plan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a change to the plan
    pub fn add(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Filter plan to only include changes matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                Self {
                    changes: self
                        .changes
                        .into_iter()
                        .filter(|c| matches_filter(c, resource_type.as_deref(), name.as_deref()))
                        .collect(),
                }
            }
        }
    }

    /// Changes that touch the remote
    pub fn actionable(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.action.is_change())
    }

    /// Number of changes that touch the remote
    pub fn total(&self) -> usize {
        self.actionable().count()
    }

    /// Check if the plan has nothing to do
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Summary counts
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for change in &self.changes {
            match change.action {
                Action::NoOp => summary.unchanged += 1,
                Action::Create => summary.create += 1,
                Action::Update { .. } => summary.update += 1,
                Action::Replace { .. } => summary.replace += 1,
                Action::Delete => summary.delete += 1,
            }
        }
        summary
    }
}

/// Plan summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub unchanged: usize,
}

impl PlanSummary {
    /// Total number of changes
    pub fn total(&self) -> usize {
        self.create + self.update + self.replace + self.delete
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group changes by resource type
pub fn group_by_type(changes: &[Change]) -> HashMap<String, Vec<&Change>> {
    let mut groups: HashMap<String, Vec<&Change>> = HashMap::new();
    for change in changes {
        groups
            .entry(change.resource_type.clone())
            .or_default()
            .push(change);
    }
    groups
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((resource_type, name)) if !name.contains('.') => {
            (Some(resource_type.to_string()), Some(name.to_string()))
        }
        Some(_) => (None, Some(target.to_string())),
    }
}

/// Check if a change matches the filter criteria
fn matches_filter(change: &Change, resource_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(rt) = resource_type {
        let matches_type = change.resource_type == rt
            || change.resource_type.strip_prefix("gitlab_") == Some(rt);
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && change.address.rsplit_once('.').map(|(_, own)| own) != Some(n)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::schema;
    use std::collections::BTreeMap;

    fn bag(identity: &str, prior: &[(&str, Value)], desired: &[(&str, Value)]) -> AttributeBag {
        let map = |pairs: &[(&str, Value)]| -> BTreeMap<String, Value> {
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect()
        };
        AttributeBag::from_state(schema(), identity, map(prior), Some(&map(desired))).unwrap()
    }

    fn base() -> Vec<(&'static str, Value)> {
        vec![
            ("name", "Team".into()),
            ("path", "team".into()),
            ("parent_id", Value::Int(0)),
        ]
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("gitlab_group"), (Some("gitlab_group".to_string()), None));
        assert_eq!(
            parse_target("gitlab_group.platform"),
            (
                Some("gitlab_group".to_string()),
                Some("platform".to_string())
            )
        );
        assert_eq!(parse_target("a.b.c"), (None, Some("a.b.c".to_string())));
    }

    #[test]
    fn test_planned_actions() {
        let new = bag("", &[], &base());
        assert_eq!(planned_action(&new), Action::Create);

        let same = bag("1", &base(), &base());
        assert_eq!(planned_action(&same), Action::NoOp);

        let mut wanted = base();
        wanted.push(("description", "new".into()));
        let changed = bag("1", &base(), &wanted);
        assert_eq!(
            planned_action(&changed),
            Action::Update {
                changed: vec!["description"]
            }
        );

        let mut moved = base();
        moved[2] = ("parent_id", Value::Int(3));
        let replaced = bag("1", &base(), &moved);
        assert_eq!(
            planned_action(&replaced),
            Action::Replace {
                attributes: vec!["parent_id"]
            }
        );
    }

    #[test]
    fn test_plan_summary_and_filter() {
        let mut plan = Plan::new();
        plan.add(Change::declared("fake_group", "a", bag("", &[], &base())));
        plan.add(Change::declared("fake_group", "b", bag("1", &base(), &base())));
        plan.add(Change::removal("other_thing", "c", bag("2", &base(), &base())));

        let summary = plan.summary();
        assert_eq!(summary.create, 1);
        assert_eq!(summary.delete, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(plan.total(), 2);
        assert!(summary.has_changes());

        let groups = group_by_type(&plan.changes);
        assert_eq!(groups["fake_group"].len(), 2);

        let filtered = plan.filter_by_target(Some("fake_group.a"));
        assert_eq!(filtered.changes.len(), 1);
        assert_eq!(filtered.changes[0].address, "fake_group.a");
    }

    #[test]
    fn test_filter_by_short_type() {
        let mut plan = Plan::new();
        plan.add(Change::declared("gitlab_group", "a", bag("", &[], &base())));
        plan.add(Change::declared("gitlab_deploy_key", "k", bag("", &[], &base())));
        let filtered = plan.filter_by_target(Some("group"));
        assert_eq!(filtered.changes.len(), 1);
    }

    #[test]
    fn test_attribute_changes() {
        let mut prior = base();
        prior.push(("runners_token", "old-token".into()));
        let mut change_bag = bag("1", &prior, &base());
        change_bag.commit();
        change_bag.set("runners_token", "new-token");
        change_bag.set("description", "x");
        let change = Change {
            address: "fake_group.a".into(),
            resource_type: "fake_group".into(),
            action: Action::Update {
                changed: vec!["description"],
            },
            bag: change_bag,
        };

        let changes = change.attribute_changes();
        assert!(
            changes
                .iter()
                .any(|(name, _, new)| *name == "description" && *new == Value::from("x"))
        );
        assert!(!changes.iter().any(|(name, _, _)| *name == "runners_token"));

        let create = Change::declared("fake_group", "n", bag("", &[], &base()));
        let created = create.attribute_changes();
        assert_eq!(created.len(), 3);
    }
}
