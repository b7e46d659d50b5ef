//! Peek cursors: the structural composition the log system's peek routing
//! produces. A cursor names which servers to read a tag from over which
//! version range; consumers (storage servers, log routers) drive the actual
//! message transfer, yielding messages in strictly increasing
//! (version, subversion) order across the whole stack.

use std::sync::Arc;

use crate::interface::LogServerHandle;
use crate::logset::LogSet;
use crate::policy::{LocalityData, ReplicationPolicy};
use crate::tags::{Tag, Version};

/// A composed read plan for one tag (or a merged group of tags).
#[derive(Debug)]
pub enum PeekCursor {
    /// A single server (possibly absent: an empty stream).
    Server(ServerPeekCursor),
    /// k sub-cursors merged under replication parameters.
    Merged(MergedPeekCursor),
    /// All servers of one or more log sets, preferring a best server.
    Set(SetPeekCursor),
    /// A sequence of sub-cursors spanning generations.
    Multi(MultiCursor),
}

impl PeekCursor {
    /// The version range `[begin, end)` this cursor covers.
    pub fn range(&self) -> (Version, Version) {
        match self {
            PeekCursor::Server(c) => (c.begin, c.end),
            PeekCursor::Merged(c) => (c.begin, c.end),
            PeekCursor::Set(c) => (c.begin, c.end),
            PeekCursor::Multi(c) => {
                let begin = c
                    .cursors
                    .iter()
                    .map(|c| c.range().0)
                    .min()
                    .unwrap_or(0);
                let end = c
                    .cursors
                    .iter()
                    .map(|c| c.range().1)
                    .max()
                    .unwrap_or(0);
                (begin, end)
            }
        }
    }

    /// True for a stream known to be empty (no server behind it).
    pub fn is_empty_stream(&self) -> bool {
        matches!(self, PeekCursor::Server(c) if c.server.is_none())
    }

    pub fn as_server(&self) -> Option<&ServerPeekCursor> {
        match self {
            PeekCursor::Server(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_merged(&self) -> Option<&MergedPeekCursor> {
        match self {
            PeekCursor::Merged(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&SetPeekCursor> {
        match self {
            PeekCursor::Set(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_multi(&self) -> Option<&MultiCursor> {
        match self {
            PeekCursor::Multi(c) => Some(c),
            _ => None,
        }
    }
}

/// Read one tag from one server over `[begin, end)`.
#[derive(Debug)]
pub struct ServerPeekCursor {
    pub server: Option<LogServerHandle>,
    pub tag: Tag,
    pub begin: Version,
    pub end: Version,
    pub return_if_blocked: bool,
    pub parallel_get_more: bool,
}

impl ServerPeekCursor {
    pub fn new(
        server: Option<LogServerHandle>,
        tag: Tag,
        begin: Version,
        end: Version,
        return_if_blocked: bool,
        parallel_get_more: bool,
    ) -> PeekCursor {
        PeekCursor::Server(ServerPeekCursor {
            server,
            tag,
            begin,
            end,
            return_if_blocked,
            parallel_get_more,
        })
    }

    /// An always-empty stream covering `[begin, end)`.
    pub fn empty(tag: Tag, begin: Version, end: Version) -> PeekCursor {
        Self::new(None, tag, begin, end, false, false)
    }
}

/// Merge sub-cursors, optionally honoring a replication policy so the merge
/// is complete once a read quorum of them has been drained.
#[derive(Debug)]
pub struct MergedPeekCursor {
    pub cursors: Vec<PeekCursor>,
    pub best_server: Option<usize>,
    pub read_quorum: usize,
    pub tag: Option<Tag>,
    pub begin: Version,
    pub end: Version,
    pub localities: Vec<LocalityData>,
    pub policy: Option<ReplicationPolicy>,
    pub replication_factor: usize,
    /// Re-tag messages while draining (needed under upgraded localities).
    pub collect_tags: bool,
}

impl MergedPeekCursor {
    /// Merge per-server streams of `servers` for one tag.
    #[allow(clippy::too_many_arguments)]
    pub fn over_servers(
        servers: &[LogServerHandle],
        best_server: Option<usize>,
        read_quorum: usize,
        tag: Tag,
        begin: Version,
        end: Version,
        parallel_get_more: bool,
        localities: Vec<LocalityData>,
        policy: Option<ReplicationPolicy>,
        replication_factor: usize,
    ) -> PeekCursor {
        let cursors = servers
            .iter()
            .map(|s| {
                ServerPeekCursor::new(
                    Some(s.clone()),
                    tag,
                    begin,
                    end,
                    false,
                    parallel_get_more,
                )
            })
            .collect();
        PeekCursor::Merged(MergedPeekCursor {
            cursors,
            best_server,
            read_quorum,
            tag: Some(tag),
            begin,
            end,
            localities,
            policy,
            replication_factor,
            collect_tags: false,
        })
    }

    /// Merge arbitrary sub-cursors (one per tag).
    pub fn over_cursors(
        cursors: Vec<PeekCursor>,
        begin: Version,
        collect_tags: bool,
    ) -> PeekCursor {
        let end = cursors.iter().map(|c| c.range().1).max().unwrap_or(begin);
        let read_quorum = cursors.len();
        PeekCursor::Merged(MergedPeekCursor {
            cursors,
            best_server: None,
            read_quorum,
            tag: None,
            begin,
            end,
            localities: vec![],
            policy: None,
            replication_factor: 0,
            collect_tags,
        })
    }
}

/// Read one tag from the servers of whole log sets, using the best set's
/// best server when one exists.
#[derive(Debug)]
pub struct SetPeekCursor {
    pub sets: Vec<Arc<LogSet>>,
    pub best_set: Option<usize>,
    pub best_server: Option<usize>,
    pub tag: Tag,
    pub begin: Version,
    pub end: Version,
    pub parallel_get_more: bool,
}

impl SetPeekCursor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sets: Vec<Arc<LogSet>>,
        best_set: Option<usize>,
        best_server: Option<usize>,
        tag: Tag,
        begin: Version,
        end: Version,
        parallel_get_more: bool,
    ) -> PeekCursor {
        PeekCursor::Set(SetPeekCursor {
            sets,
            best_set,
            best_server,
            tag,
            begin,
            end,
            parallel_get_more,
        })
    }
}

/// Stitch per-generation cursors into one monotone stream. `cursors` is
/// ordered newest first; traversal starts from the back (the oldest) and
/// advances past each boundary version in `epoch_ends`.
#[derive(Debug)]
pub struct MultiCursor {
    pub cursors: Vec<PeekCursor>,
    pub epoch_ends: Vec<Version>,
}

impl MultiCursor {
    pub fn new(cursors: Vec<PeekCursor>, epoch_ends: Vec<Version>) -> PeekCursor {
        PeekCursor::Multi(MultiCursor { cursors, epoch_ends })
    }

    /// The cursor traversal begins with: the oldest generation.
    pub fn initial(&self) -> Option<&PeekCursor> {
        self.cursors.last()
    }
}

#[cfg(test)]
mod cursor_tests {
    use super::*;
    use crate::tags::TagLocality;

    #[test]
    fn empty_server_cursor() {
        let tag = Tag::new(TagLocality::Primary, 0);
        let c = ServerPeekCursor::empty(tag, 5, 100);
        assert!(c.is_empty_stream());
        assert_eq!(c.range(), (5, 100));
    }

    #[test]
    fn multi_cursor_ranges() {
        let tag = Tag::new(TagLocality::Primary, 0);
        let newer = ServerPeekCursor::empty(tag, 200, 300);
        let older = ServerPeekCursor::empty(tag, 100, 200);
        let multi = MultiCursor::new(vec![newer, older], vec![200]);
        assert_eq!(multi.range(), (100, 300));
        let inner = multi.as_multi().unwrap();
        assert_eq!(inner.initial().unwrap().range(), (100, 200));
        assert_eq!(inner.epoch_ends, vec![200]);
    }

    #[test]
    fn merged_over_cursors_end() {
        let tag = Tag::new(TagLocality::Primary, 0);
        let a = ServerPeekCursor::empty(tag, 10, 50);
        let b = ServerPeekCursor::empty(tag, 10, 80);
        let merged = MergedPeekCursor::over_cursors(vec![a, b], 10, false);
        assert_eq!(merged.range(), (10, 80));
        assert_eq!(merged.as_merged().unwrap().read_quorum, 2);
    }
}
