//! One replica group of log servers: membership, replication parameters,
//! locality, and the version at which the group started accepting commits.

use std::sync::RwLock;

use crate::interface::LogServerHandle;
use crate::policy::{LocalityData, ReplicationPolicy};
use crate::tags::{Tag, TagLocality, Version};

use get_size::GetSize;

use serde::{Deserialize, Serialize};

/// Whether the set maps a tag to a preferred ("best") server index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, GetSize,
)]
pub enum BestPolicy {
    /// No preferred location; reads merge the whole set.
    None,
    /// The tag id picks the preferred location.
    Id,
}

/// One replica group. `log_routers` is interior-mutable because epoch
/// start-up repopulates routers on sets that are otherwise frozen history.
#[derive(Debug)]
pub struct LogSet {
    pub log_servers: Vec<LogServerHandle>,
    pub log_routers: RwLock<Vec<LogServerHandle>>,
    pub replication_factor: usize,
    pub anti_quorum: usize,
    pub policy: ReplicationPolicy,
    pub localities: Vec<LocalityData>,
    pub is_local: bool,
    pub has_best_policy: BestPolicy,
    pub locality: TagLocality,
    pub start_version: Version,
}

impl LogSet {
    /// An empty placeholder set carrying only routing attributes.
    pub fn stub(locality: TagLocality, start_version: Version) -> Self {
        LogSet {
            log_servers: vec![],
            log_routers: RwLock::new(vec![]),
            replication_factor: 1,
            anti_quorum: 0,
            policy: ReplicationPolicy::One,
            localities: vec![],
            is_local: false,
            has_best_policy: BestPolicy::None,
            locality,
            start_version,
        }
    }

    pub fn server_count(&self) -> usize {
        self.log_servers.len()
    }

    pub fn router_count(&self) -> usize {
        self.log_routers.read().unwrap().len()
    }

    /// Snapshot of the current router handles.
    pub fn routers(&self) -> Vec<LogServerHandle> {
        self.log_routers.read().unwrap().clone()
    }

    /// The preferred server index for a tag, when the set has one.
    pub fn best_location_for(&self, tag: Tag) -> Option<usize> {
        match self.has_best_policy {
            BestPolicy::None => None,
            BestPolicy::Id => {
                if self.log_servers.is_empty() {
                    None
                } else {
                    Some(tag.id as usize % self.log_servers.len())
                }
            }
        }
    }

    /// Locality match for peek routing: equal localities, or either side
    /// wildcarding through `Special`, or an `Upgraded` set.
    pub fn knows_tag(&self, tag: Tag) -> bool {
        self.locality == tag.locality
            || tag.locality == TagLocality::Special
            || self.locality == TagLocality::Special
            || self.locality == TagLocality::Upgraded
    }

    /// Appends the in-set server indices (shifted by `offset`) that must
    /// receive a batch carrying `tags`: the best location for each tag first,
    /// then ring order until `replication_factor` distinct indices, unioned
    /// over tags in ascending index order.
    pub fn get_push_locations(
        &self,
        tags: &[Tag],
        offset: usize,
        locations: &mut Vec<usize>,
    ) {
        let n = self.log_servers.len();
        if n == 0 {
            return;
        }
        let mut chosen: Vec<usize> = vec![];
        for &tag in tags {
            let start = self
                .best_location_for(tag)
                .unwrap_or(tag.id as usize % n);
            for step in 0..self.replication_factor.min(n) {
                let loc = (start + step) % n;
                if !chosen.contains(&loc) {
                    chosen.push(loc);
                }
            }
        }
        chosen.sort_unstable();
        for loc in chosen {
            locations.push(offset + loc);
        }
    }

    /// Space-joined server id list, for trace messages.
    pub fn log_server_string(&self) -> String {
        self.log_servers
            .iter()
            .map(|h| h.get().id().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Space-joined router id list, for trace messages.
    pub fn log_router_string(&self) -> String {
        self.log_routers
            .read()
            .unwrap()
            .iter()
            .map(|h| h.get().id().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod logset_tests {
    use super::*;
    use crate::interface::OptionalInterface;
    use crate::policy::LOC_ZONEID;
    use crate::tags::Uid;
    use crate::utils::AsyncVar;

    fn id_only_handles(n: usize) -> Vec<LogServerHandle> {
        (0..n)
            .map(|i| {
                AsyncVar::new(OptionalInterface::id_only(Uid(i as u64, 7)))
            })
            .collect()
    }

    fn test_set(n: usize, replication: usize) -> LogSet {
        LogSet {
            log_servers: id_only_handles(n),
            log_routers: RwLock::new(vec![]),
            replication_factor: replication,
            anti_quorum: 0,
            policy: ReplicationPolicy::across(replication, LOC_ZONEID),
            localities: (0..n)
                .map(|i| {
                    LocalityData::new().with(LOC_ZONEID, &format!("z{}", i))
                })
                .collect(),
            is_local: true,
            has_best_policy: BestPolicy::Id,
            locality: TagLocality::Primary,
            start_version: 0,
        }
    }

    #[test]
    fn best_location_wraps() {
        let set = test_set(4, 2);
        let tag = Tag::new(TagLocality::Primary, 6);
        assert_eq!(set.best_location_for(tag), Some(2));
    }

    #[test]
    fn push_locations_distinct() {
        let set = test_set(4, 3);
        let mut locations = vec![];
        set.get_push_locations(
            &[Tag::new(TagLocality::Primary, 3)],
            0,
            &mut locations,
        );
        // ring from index 3: {3, 0, 1}
        assert_eq!(locations, vec![0, 1, 3]);
    }

    #[test]
    fn push_locations_offset_and_union() {
        let set = test_set(4, 2);
        let mut locations = vec![];
        set.get_push_locations(
            &[
                Tag::new(TagLocality::Primary, 0),
                Tag::new(TagLocality::Primary, 1),
            ],
            10,
            &mut locations,
        );
        // tag 0 -> {0, 1}, tag 1 -> {1, 2}; union {0, 1, 2} shifted by 10
        assert_eq!(locations, vec![10, 11, 12]);
    }

    #[test]
    fn tag_locality_matching() {
        let set = test_set(3, 2);
        assert!(set.knows_tag(Tag::new(TagLocality::Primary, 0)));
        assert!(set.knows_tag(Tag::new(TagLocality::Special, 0)));
        assert!(!set.knows_tag(Tag::new(TagLocality::RemoteLog, 0)));
        let upgraded = LogSet {
            locality: TagLocality::Upgraded,
            ..test_set(3, 2)
        };
        assert!(upgraded.knows_tag(Tag::new(TagLocality::RemoteLog, 0)));
    }
}
