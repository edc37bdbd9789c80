//! Placement constraints.
//!
//! Constraints combine by AND across entries and by OR across the values
//! of a single entry. A set is only ever appended to; nothing removes a
//! caller-supplied constraint.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The host attribute a constraint restricts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    Datastore,
    DatastoreTag,
    Network,
    Host,
    AvailabilityZone,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Datastore => "DATASTORE",
            Self::DatastoreTag => "DATASTORE_TAG",
            Self::Network => "NETWORK",
            Self::Host => "HOST",
            Self::AvailabilityZone => "AVAILABILITY_ZONE",
        };
        f.write_str(s)
    }
}

/// A typed key plus the set of acceptable values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub values: BTreeSet<String>,
}

impl Constraint {
    pub fn new<I, S>(kind: ConstraintKind, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// True when any of the host's values for this kind is acceptable.
    pub fn accepts<'a, I>(&self, host_values: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        host_values.into_iter().any(|v| self.values.contains(v))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<&str> = self.values.iter().map(String::as_str).collect();
        write!(f, "{}=[{}]", self.kind, values.join(","))
    }
}

/// Ordered conjunction of constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSet(Vec<Constraint>);

impl ConstraintSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a constraint; existing entries are kept.
    pub fn push(&mut self, constraint: Constraint) {
        self.0.push(constraint);
    }

    /// Return a copy of this set with `constraint` appended.
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.push(constraint);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluate the conjunction against a host, given a lookup from
    /// constraint kind to that host's values for it.
    pub fn satisfied_by<'a, F, I>(&self, mut host_values: F) -> bool
    where
        F: FnMut(ConstraintKind) -> I,
        I: IntoIterator<Item = &'a str>,
    {
        self.0.iter().all(|c| c.accepts(host_values(c.kind)))
    }
}

impl From<Vec<Constraint>> for ConstraintSet {
    fn from(v: Vec<Constraint>) -> Self {
        Self(v)
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(kind: ConstraintKind) -> Vec<&'static str> {
        match kind {
            ConstraintKind::Datastore => vec!["ds-1", "ds-2"],
            ConstraintKind::Network => vec!["vm-net"],
            _ => vec![],
        }
    }

    #[test]
    fn empty_set_accepts_every_host() {
        assert!(ConstraintSet::new().satisfied_by(lookup));
    }

    #[test]
    fn values_within_a_constraint_are_or() {
        let set = ConstraintSet::new().with(Constraint::new(ConstraintKind::Datastore, ["ds-9", "ds-2"]));
        assert!(set.satisfied_by(lookup));
    }

    #[test]
    fn constraints_are_and() {
        let set = ConstraintSet::new()
            .with(Constraint::new(ConstraintKind::Datastore, ["ds-1"]))
            .with(Constraint::new(ConstraintKind::Network, ["other-net"]));
        assert!(!set.satisfied_by(lookup));
    }

    #[test]
    fn host_without_attribute_fails_constraint() {
        let set = ConstraintSet::new().with(Constraint::new(ConstraintKind::AvailabilityZone, ["az-1"]));
        assert!(!set.satisfied_by(lookup));
    }

    #[test]
    fn serializes_as_plain_list() {
        let set = ConstraintSet::new().with(Constraint::new(ConstraintKind::DatastoreTag, ["ssd"]));
        let v = serde_json::to_value(&set).unwrap();
        assert_eq!(v[0]["kind"], "DATASTORE_TAG");
        assert_eq!(v[0]["values"][0], "ssd");
        assert_eq!(set.to_string(), "[DATASTORE_TAG=[ssd]]");
    }
}
