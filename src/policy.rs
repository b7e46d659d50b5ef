//! Locality descriptions and replication policy predicates. Policies are
//! pure functions over sets of localities; the log system consults them to
//! decide whether a group of servers can carry (or could have carried) a
//! committed write on its own.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Standard locality keys.
pub const LOC_DCID: &str = "dcid";
pub const LOC_ZONEID: &str = "zoneid";
pub const LOC_MACHINEID: &str = "machineid";

/// Key-value description of where a process runs.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct LocalityData(BTreeMap<String, String>);

impl LocalityData {
    pub fn new() -> Self {
        LocalityData(BTreeMap::new())
    }

    /// Builder-style entry insertion.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }
}

impl fmt::Display for LocalityData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}={}", k, v)?;
            first = false;
        }
        Ok(())
    }
}

/// A group of localities collected for policy validation.
#[derive(Debug, Clone, Default)]
pub struct LocalityGroup {
    entries: Vec<LocalityData>,
}

impl LocalityGroup {
    pub fn new() -> Self {
        LocalityGroup { entries: vec![] }
    }

    pub fn from_slice(entries: &[LocalityData]) -> Self {
        LocalityGroup {
            entries: entries.to_vec(),
        }
    }

    pub fn add(&mut self, entry: LocalityData) {
        self.entries.push(entry);
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[LocalityData] {
        &self.entries
    }

    /// True if this group of localities satisfies the policy.
    pub fn validate(&self, policy: &ReplicationPolicy) -> bool {
        policy.validate(self)
    }
}

/// Replication policy predicate over locality groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationPolicy {
    /// Any single replica suffices.
    One,

    /// `count` replicas across distinct values of `field`, each group of
    /// which satisfies `inner`.
    Across {
        count: usize,
        field: String,
        inner: Box<ReplicationPolicy>,
    },
}

impl ReplicationPolicy {
    /// Shorthand for the common "N across distinct FIELD values" shape.
    pub fn across(count: usize, field: &str) -> Self {
        ReplicationPolicy::Across {
            count,
            field: field.into(),
            inner: Box::new(ReplicationPolicy::One),
        }
    }

    /// True if the group satisfies this policy.
    pub fn validate(&self, group: &LocalityGroup) -> bool {
        match self {
            ReplicationPolicy::One => group.size() >= 1,
            ReplicationPolicy::Across {
                count,
                field,
                inner,
            } => {
                // bucket by field value; entries lacking the field never count
                let mut buckets: BTreeMap<&str, LocalityGroup> =
                    BTreeMap::new();
                for entry in group.entries() {
                    if let Some(value) = entry.get(field) {
                        buckets
                            .entry(value)
                            .or_insert_with(LocalityGroup::new)
                            .add(entry.clone());
                    }
                }
                buckets.values().filter(|g| inner.validate(g)).count()
                    >= *count
            }
        }
    }

    /// The number of distinct locality keys this policy constrains, a cheap
    /// proxy for how selective it is.
    pub fn depth(&self) -> usize {
        let mut fields = BTreeSet::new();
        let mut cur = self;
        while let ReplicationPolicy::Across { field, inner, .. } = cur {
            fields.insert(field.as_str());
            cur = inner;
        }
        fields.len()
    }
}

impl fmt::Display for ReplicationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReplicationPolicy::One => write!(f, "One"),
            ReplicationPolicy::Across {
                count,
                field,
                inner,
            } => write!(f, "Across({},{},{})", count, field, inner),
        }
    }
}

/// Checks every `combination_size`-sized combination of `new_items` merged
/// into `group` against the policy: returns true iff each combined group's
/// validity equals `check_if_valid`. With `check_if_valid = false` this asks
/// whether the given group plus any such combination can never form a
/// policy-satisfying cohort, the question the durable-version computation
/// poses about unresponsive servers plus anti-quorum laggards.
pub fn validate_all_combinations(
    policy: &ReplicationPolicy,
    group: &LocalityGroup,
    new_items: &[LocalityData],
    combination_size: usize,
    check_if_valid: bool,
) -> bool {
    if combination_size > new_items.len() {
        // no combinations exist; vacuously true
        return true;
    }
    let mut scratch = group.clone();
    check_combinations(
        policy,
        &mut scratch,
        new_items,
        combination_size,
        0,
        check_if_valid,
    )
}

fn check_combinations(
    policy: &ReplicationPolicy,
    group: &mut LocalityGroup,
    items: &[LocalityData],
    remaining: usize,
    start: usize,
    check_if_valid: bool,
) -> bool {
    if remaining == 0 {
        return group.validate(policy) == check_if_valid;
    }
    for i in start..=(items.len() - remaining) {
        group.entries.push(items[i].clone());
        let ok = check_combinations(
            policy,
            group,
            items,
            remaining - 1,
            i + 1,
            check_if_valid,
        );
        group.entries.pop();
        if !ok {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod policy_tests {
    use super::*;

    fn zone(z: &str) -> LocalityData {
        LocalityData::new().with(LOC_ZONEID, z)
    }

    #[test]
    fn validate_one() {
        let policy = ReplicationPolicy::One;
        assert!(!LocalityGroup::new().validate(&policy));
        let mut group = LocalityGroup::new();
        group.add(zone("z1"));
        assert!(group.validate(&policy));
    }

    #[test]
    fn validate_across_zones() {
        let policy = ReplicationPolicy::across(3, LOC_ZONEID);
        let mut group = LocalityGroup::new();
        group.add(zone("z1"));
        group.add(zone("z2"));
        assert!(!group.validate(&policy));
        group.add(zone("z2")); // duplicate zone does not help
        assert!(!group.validate(&policy));
        group.add(zone("z3"));
        assert!(group.validate(&policy));
    }

    #[test]
    fn validate_missing_field() {
        let policy = ReplicationPolicy::across(1, LOC_DCID);
        let mut group = LocalityGroup::new();
        group.add(zone("z1")); // no dcid entry
        assert!(!group.validate(&policy));
        group.add(LocalityData::new().with(LOC_DCID, "dc1"));
        assert!(group.validate(&policy));
    }

    #[test]
    fn all_combinations_safe() {
        // two unresponsive zones + any 1 of the available zones can never
        // reach 4 distinct zones
        let policy = ReplicationPolicy::across(4, LOC_ZONEID);
        let mut unresponsive = LocalityGroup::new();
        unresponsive.add(zone("z1"));
        unresponsive.add(zone("z2"));
        let available = vec![zone("z1"), zone("z2")];
        assert!(validate_all_combinations(
            &policy,
            &unresponsive,
            &available,
            1,
            false
        ));
    }

    #[test]
    fn all_combinations_unsafe() {
        // two unresponsive zones + one available laggard zone can form a
        // 3-zone cohort, so a stale quorum could exist
        let policy = ReplicationPolicy::across(3, LOC_ZONEID);
        let mut unresponsive = LocalityGroup::new();
        unresponsive.add(zone("z1"));
        unresponsive.add(zone("z2"));
        let available = vec![zone("z3"), zone("z1")];
        assert!(!validate_all_combinations(
            &policy,
            &unresponsive,
            &available,
            1,
            false
        ));
    }

    #[test]
    fn all_combinations_vacuous() {
        let policy = ReplicationPolicy::across(2, LOC_ZONEID);
        let unresponsive = LocalityGroup::new();
        assert!(validate_all_combinations(
            &policy,
            &unresponsive,
            &[],
            1,
            false
        ));
    }
}
