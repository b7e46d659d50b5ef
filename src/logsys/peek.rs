//! Multi-generation peek routing: serve ordered reads of a tag that may span
//! several historical generations, stitching per-generation cursors into one
//! monotone stream.

use std::sync::Arc;

use crate::cursor::{
    MergedPeekCursor, MultiCursor, PeekCursor, ServerPeekCursor,
    SetPeekCursor,
};
use crate::logset::{BestPolicy, LogSet};
use crate::tags::{Tag, TagLocality, Uid, Version};
use crate::utils::TaglogError;

use super::TagPartitionedLogSystem;

/// One pass over a generation's sets: the local ones, which of them is best
/// (or next best) for a tag, and the highest local start version.
struct LocalSetScan {
    sets: Vec<Arc<LogSet>>,
    best: Option<usize>,
    next_best: Option<usize>,
    last_begin: Version,
}

impl LocalSetScan {
    fn best_or_next(&self) -> Option<usize> {
        self.best.or(self.next_best)
    }

    fn best_server(&self, tag: Tag) -> Option<usize> {
        self.best
            .and_then(|b| self.sets[b].best_location_for(tag))
    }
}

fn scan_local_sets(
    all: &[Arc<LogSet>],
    tag: Tag,
    floor: Version,
) -> LocalSetScan {
    let mut scan = LocalSetScan {
        sets: vec![],
        best: None,
        next_best: None,
        last_begin: floor,
    };
    for set in all {
        if set.is_local && set.server_count() > 0 {
            scan.last_begin = scan.last_begin.max(set.start_version);
            scan.sets.push(set.clone());
            let idx = scan.sets.len() - 1;
            if set.has_best_policy == BestPolicy::Id && set.knows_tag(tag) {
                scan.best = Some(idx);
                scan.next_best = scan.best;
            }
            if set.has_best_policy == BestPolicy::Id && scan.best.is_none() {
                scan.next_best = Some(idx);
            }
        }
    }
    scan
}

/// The peek-local set preference: best-policy sets whose locality matches
/// the tag (with Special/Upgraded wildcards, and local sets serving router
/// tags).
fn local_match(set: &LogSet, tag: Tag) -> bool {
    set.server_count() > 0
        && set.has_best_policy == BestPolicy::Id
        && (set.knows_tag(tag)
            || (set.is_local && tag.locality == TagLocality::LogRouter))
}

impl TagPartitionedLogSystem {
    /// A cursor for `tag` from `begin` through the end of the epoch,
    /// delegating remote-log tags to the log routers.
    pub fn peek(
        &self,
        dbgid: Uid,
        begin: Version,
        tag: Tag,
        parallel_get_more: bool,
    ) -> PeekCursor {
        if self.tlogs.read().unwrap().is_empty() {
            pf_debug!(dbgid; "peek {} from {}: no log sets", tag, begin);
            return ServerPeekCursor::empty(tag, begin, self.get_peek_end());
        }
        if tag.locality == TagLocality::RemoteLog {
            self.peek_remote(dbgid, begin, tag, parallel_get_more)
        } else {
            self.peek_all(
                dbgid,
                begin,
                self.get_peek_end(),
                tag,
                parallel_get_more,
                false,
            )
            .expect("peek_all is infallible when not throwing on dead")
        }
    }

    /// A merged cursor over several tags.
    pub fn peek_tags(
        &self,
        dbgid: Uid,
        begin: Version,
        tags: &[Tag],
        parallel_get_more: bool,
    ) -> PeekCursor {
        if tags.is_empty() {
            pf_debug!(dbgid; "peek from {}: no tags", begin);
            return ServerPeekCursor::empty(
                Tag::new(TagLocality::Invalid, 0),
                begin,
                self.get_peek_end(),
            );
        }
        if tags.len() == 1 {
            return self.peek(dbgid, begin, tags[0], parallel_get_more);
        }
        let cursors = tags
            .iter()
            .map(|&tag| self.peek(dbgid, begin, tag, parallel_get_more))
            .collect();
        let upgraded = self
            .tlogs
            .read()
            .unwrap()
            .first()
            .map(|s| s.locality == TagLocality::Upgraded)
            .unwrap_or(false);
        MergedPeekCursor::over_cursors(cursors, begin, upgraded)
    }

    /// Reads from local log sets, stitching across old generations when
    /// `begin` predates the current epoch.
    pub(crate) fn peek_all(
        &self,
        dbgid: Uid,
        begin: Version,
        end: Version,
        tag: Tag,
        parallel_get_more: bool,
        throw_if_dead: bool,
    ) -> Result<PeekCursor, TaglogError> {
        let tlogs = self.tlogs.read().unwrap().clone();
        let old_log_data = self.old_log_data.read().unwrap().clone();

        let scan = scan_local_sets(&tlogs, tag, 0);
        let mut last_begin = scan.last_begin;

        if begin >= last_begin {
            pf_debug!(dbgid; "peek {} [{}, {}): current epoch only", tag, begin, end);
            let best_or_next = scan.best_or_next();
            let best_server = scan.best_server(tag);
            return Ok(SetPeekCursor::new(
                scan.sets,
                best_or_next,
                best_server,
                tag,
                begin,
                end,
                parallel_get_more,
            ));
        }

        let mut cursors = vec![];
        let mut epoch_ends = vec![];
        if last_begin < end {
            pf_debug!(dbgid; "peek {} [{}, {}): adding current epoch from {}",
                      tag, begin, end, last_begin);
            cursors.push(SetPeekCursor::new(
                scan.sets.clone(),
                scan.best_or_next(),
                scan.best_server(tag),
                tag,
                last_begin,
                end,
                parallel_get_more,
            ));
        }
        let mut i = 0;
        while begin < last_begin {
            if i == old_log_data.len() {
                if tag == Tag::TXS {
                    break;
                }
                pf_debug!(dbgid; "peek {} [{}, {}): generations exhausted below {}",
                          tag, begin, end, last_begin);
                if throw_if_dead {
                    return Err(TaglogError::WorkerRemoved);
                } else {
                    return Ok(ServerPeekCursor::empty(
                        tag,
                        begin,
                        self.get_peek_end(),
                    ));
                }
            }

            let old_scan =
                scan_local_sets(&old_log_data[i].tlogs, tag, begin);
            let this_begin = old_scan.last_begin;
            if this_begin < last_begin {
                if this_begin < end {
                    pf_debug!(dbgid; "peek {} [{}, {}): adding generation {} from {}",
                              tag, begin, end, i, this_begin);
                    cursors.push(SetPeekCursor::new(
                        old_scan.sets.clone(),
                        old_scan.best_or_next(),
                        old_scan.best_server(tag),
                        tag,
                        this_begin,
                        last_begin.min(end),
                        parallel_get_more,
                    ));
                    epoch_ends.push(last_begin.min(end));
                }
                last_begin = this_begin;
            }
            i += 1;
        }

        Ok(MultiCursor::new(cursors, epoch_ends))
    }

    /// Reads a remote-log tag through the log routers of each generation.
    fn peek_remote(
        &self,
        dbgid: Uid,
        begin: Version,
        tag: Tag,
        _parallel_get_more: bool,
    ) -> PeekCursor {
        let tlogs = self.tlogs.read().unwrap().clone();
        let old_log_data = self.old_log_data.read().unwrap().clone();

        let mut best_set = None;
        let mut last_begin = 0;
        for (t, set) in tlogs.iter().enumerate() {
            if set.is_local {
                last_begin = last_begin.max(set.start_version);
            }
            if set.router_count() > 0 {
                // at most one router-carrying set per generation
                assert!(best_set.is_none());
                best_set = Some(t);
            }
        }
        let Some(best) = best_set else {
            pf_debug!(dbgid; "remote peek {} from {}: no router set", tag, begin);
            return ServerPeekCursor::empty(tag, begin, self.get_peek_end());
        };

        if begin >= last_begin {
            let routers = tlogs[best].routers();
            let count = routers.len();
            return MergedPeekCursor::over_servers(
                &routers,
                None,
                count,
                tag,
                begin,
                self.get_peek_end(),
                false,
                vec![],
                None,
                0,
            );
        }

        let mut cursors = vec![];
        let mut epoch_ends = vec![];
        let routers = tlogs[best].routers();
        let count = routers.len();
        cursors.push(MergedPeekCursor::over_servers(
            &routers,
            None,
            count,
            tag,
            last_begin,
            self.get_peek_end(),
            false,
            vec![],
            None,
            0,
        ));
        let mut i = 0;
        while begin < last_begin {
            if i == old_log_data.len() {
                pf_debug!(dbgid; "remote peek {} from {}: generations exhausted below {}",
                          tag, begin, last_begin);
                return ServerPeekCursor::empty(
                    tag,
                    begin,
                    self.get_peek_end(),
                );
            }

            let mut best_old_set = None;
            let mut this_begin = begin;
            for (t, set) in old_log_data[i].tlogs.iter().enumerate() {
                if set.is_local {
                    this_begin = this_begin.max(set.start_version);
                }
                if set.router_count() > 0 {
                    assert!(best_old_set.is_none());
                    best_old_set = Some(t);
                }
            }
            let Some(best_old) = best_old_set else {
                pf_debug!(dbgid; "remote peek {} from {}: generation {} has no router set",
                          tag, begin, i);
                return ServerPeekCursor::empty(
                    tag,
                    begin,
                    self.get_peek_end(),
                );
            };

            if this_begin < last_begin {
                let routers = old_log_data[i].tlogs[best_old].routers();
                let count = routers.len();
                cursors.push(MergedPeekCursor::over_servers(
                    &routers,
                    None,
                    count,
                    tag,
                    this_begin,
                    last_begin,
                    false,
                    vec![],
                    None,
                    0,
                ));
                epoch_ends.push(last_begin);
                last_begin = this_begin;
            }
            i += 1;
        }

        MultiCursor::new(cursors, epoch_ends)
    }

    /// Reads from the best-matching local set per generation; falls back to
    /// `peek_all` below a Special-locality generation (routing is irregular
    /// there).
    fn peek_local(
        &self,
        dbgid: Uid,
        tag: Tag,
        begin: Version,
        end: Version,
    ) -> Result<PeekCursor, TaglogError> {
        let tlogs = self.tlogs.read().unwrap().clone();
        let old_log_data = self.old_log_data.read().unwrap().clone();

        let mut best_set = None;
        let mut found_special = false;
        for (t, set) in tlogs.iter().enumerate() {
            if local_match(set, tag) {
                if set.locality == TagLocality::Special {
                    found_special = true;
                }
                best_set = Some(t);
                break;
            }
        }
        let Some(best) = best_set else {
            pf_debug!(dbgid; "local peek {} [{}, {}): no best set", tag, begin, end);
            return Ok(ServerPeekCursor::empty(
                tag,
                begin,
                self.get_peek_end(),
            ));
        };
        let best_server = tlogs[best]
            .best_location_for(tag)
            .expect("best set carries the best policy");

        if begin >= tlogs[best].start_version {
            return Ok(ServerPeekCursor::new(
                Some(tlogs[best].log_servers[best_server].clone()),
                tag,
                begin,
                end,
                false,
                false,
            ));
        }

        let mut cursors = vec![];
        let mut epoch_ends = vec![];
        if tlogs[best].start_version < end {
            cursors.push(ServerPeekCursor::new(
                Some(tlogs[best].log_servers[best_server].clone()),
                tag,
                tlogs[best].start_version,
                end,
                false,
                false,
            ));
        }
        let mut last_begin = tlogs[best].start_version;
        let mut i = 0;
        while begin < last_begin {
            if i == old_log_data.len() {
                pf_debug!(dbgid; "local peek {} [{}, {}): generations exhausted below {}",
                          tag, begin, end, last_begin);
                return Err(TaglogError::WorkerRemoved);
            }

            let mut best_old_set = None;
            for (t, set) in old_log_data[i].tlogs.iter().enumerate() {
                if local_match(set, tag) {
                    if set.locality == TagLocality::Special {
                        found_special = true;
                    }
                    best_old_set = Some(t);
                    break;
                }
            }

            if found_special {
                pf_debug!(dbgid; "local peek {} [{}, {}): special locality fallback",
                          tag, begin, end);
                cursors.push(self.peek_all(
                    dbgid,
                    begin,
                    last_begin.min(end),
                    tag,
                    false,
                    true,
                )?);
                epoch_ends.push(last_begin.min(end));
                break;
            }

            let Some(best_old) = best_old_set else {
                i += 1;
                continue;
            };

            let old_set = &old_log_data[i].tlogs[best_old];
            let this_begin = old_set.start_version.max(begin);
            if this_begin < last_begin {
                if this_begin < end {
                    cursors.push(MergedPeekCursor::over_servers(
                        &old_set.log_servers,
                        old_set.best_location_for(tag),
                        old_set.server_count() + 1
                            - old_set.replication_factor,
                        tag,
                        this_begin,
                        last_begin.min(end),
                        false,
                        old_set.localities.clone(),
                        Some(old_set.policy.clone()),
                        old_set.replication_factor,
                    ));
                    epoch_ends.push(last_begin.min(end));
                }
                last_begin = this_begin;
            }
            i += 1;
        }

        Ok(MultiCursor::new(cursors, epoch_ends))
    }

    /// A cursor for a tag whose channel was renamed over time: one local
    /// peek per name over its live span, joined across the rename history
    /// (newest first, entries `(rename version, prior tag)`).
    pub fn peek_single(
        &self,
        dbgid: Uid,
        begin: Version,
        tag: Tag,
        mut history: Vec<(Version, Tag)>,
    ) -> Result<PeekCursor, TaglogError> {
        while history
            .last()
            .map(|h| begin >= h.0)
            .unwrap_or(false)
        {
            history.pop();
        }

        if history.is_empty() {
            return self.peek_local(dbgid, tag, begin, self.get_peek_end());
        }

        let mut cursors = vec![];
        let mut epoch_ends = vec![];
        cursors.push(self.peek_local(
            dbgid,
            tag,
            history[0].0,
            self.get_peek_end(),
        )?);
        for i in 0..history.len() {
            let span_begin = if i + 1 == history.len() {
                begin
            } else {
                history[i + 1].0.max(begin)
            };
            cursors.push(self.peek_local(
                dbgid,
                history[i].1,
                span_begin,
                history[i].0,
            )?);
            epoch_ends.push(history[i].0);
        }

        Ok(MultiCursor::new(cursors, epoch_ends))
    }

    /// A cursor from the perspective of one log router: serve from the local
    /// side of the generation that recruited it.
    pub fn peek_log_router(
        &self,
        router_id: Uid,
        begin: Version,
        tag: Tag,
    ) -> PeekCursor {
        let tlogs = self.tlogs.read().unwrap().clone();
        let old_log_data = self.old_log_data.read().unwrap().clone();

        let found = tlogs.iter().any(|set| {
            set.routers().iter().any(|r| r.get().id() == router_id)
        });
        if found {
            if self.stopped {
                let scan = scan_local_sets(&tlogs, tag, 0);
                pf_debug!(router_id; "router peek {} from {}: stopped epoch set read",
                          tag, begin);
                let best_or_next = scan.best_or_next();
                let best_server = scan.best_server(tag);
                return SetPeekCursor::new(
                    scan.sets,
                    best_or_next,
                    best_server,
                    tag,
                    begin,
                    self.get_peek_end(),
                    false,
                );
            } else {
                for set in tlogs.iter() {
                    if set.server_count() > 0
                        && set.is_local
                        && set.has_best_policy == BestPolicy::Id
                    {
                        let best_server = set
                            .best_location_for(tag)
                            .expect("set carries the best policy");
                        pf_debug!(router_id; "router peek {} from {}: best server only",
                                  tag, begin);
                        return ServerPeekCursor::new(
                            Some(set.log_servers[best_server].clone()),
                            tag,
                            begin,
                            self.get_peek_end(),
                            false,
                            false,
                        );
                    }
                }
            }
        }

        for old in &old_log_data {
            let found = old.tlogs.iter().any(|set| {
                set.routers().iter().any(|r| r.get().id() == router_id)
            });
            if found {
                let scan = scan_local_sets(&old.tlogs, tag, 0);
                pf_debug!(router_id; "router peek {} from {}: old generation ending {}",
                          tag, begin, old.epoch_end);
                let best_or_next = scan.best_or_next();
                let best_server = scan.best_server(tag);
                return SetPeekCursor::new(
                    scan.sets,
                    best_or_next,
                    best_server,
                    tag,
                    begin,
                    old.epoch_end,
                    false,
                );
            }
        }

        ServerPeekCursor::empty(tag, begin, self.get_peek_end())
    }
}
