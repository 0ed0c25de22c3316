//! Per-session cache entry (spec.md §3 "BeaconCacheEntry", §4.3).
//!
//! Holds the four record sequences for one session and the entry's own
//! byte counter. Callers serialize access to an entry through its own
//! lock (see [`crate::cache::BeaconCache`]); this type itself does no
//! locking.

use std::collections::VecDeque;

use crate::cache::record::BeaconCacheRecord;

#[derive(Debug, Default)]
pub struct BeaconCacheEntry {
    pub events: VecDeque<BeaconCacheRecord>,
    pub actions: VecDeque<BeaconCacheRecord>,
    pub events_being_sent: VecDeque<BeaconCacheRecord>,
    pub actions_being_sent: VecDeque<BeaconCacheRecord>,
    pub bytes: i64,
}

impl BeaconCacheEntry {
    pub fn new() -> Self {
        BeaconCacheEntry::default()
    }

    pub fn add_event(&mut self, record: BeaconCacheRecord) -> i64 {
        let cost = record.cost();
        self.events.push_back(record);
        self.bytes += cost;
        cost
    }

    pub fn add_action(&mut self, record: BeaconCacheRecord) -> i64 {
        let cost = record.cost();
        self.actions.push_back(record);
        self.bytes += cost;
        cost
    }

    /// True iff neither `events` nor `actions` (not counting being-sent)
    /// holds any record (spec.md §4.3 `is_empty`).
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.actions.is_empty()
    }

    /// True iff any of the four sequences holds a record — used by
    /// `get_beacon_ids` to decide whether a session id still has anything
    /// to report.
    pub fn has_any_records(&self) -> bool {
        !self.is_empty() || !self.events_being_sent.is_empty() || !self.actions_being_sent.is_empty()
    }

    /// Builds one chunk string: `prefix` followed by a `separator`-joined
    /// concatenation of record data, events first then actions, stopping
    /// before exceeding `max_bytes`. Selected records move into the
    /// `*_being_sent` sequences and are marked.
    pub fn next_chunk(&mut self, prefix: &str, max_bytes: usize, separator: &str) -> String {
        let mut out = String::from(prefix);
        let mut any_taken = false;

        loop {
            let Some(front) = self.events.front() else {
                break;
            };
            let addition_len = if any_taken { separator.len() } else { 0 } + front.data.len();
            if any_taken && out.len() + addition_len > max_bytes {
                break;
            }
            let mut record = self.events.pop_front().unwrap();
            if any_taken {
                out.push_str(separator);
            }
            out.push_str(&record.data);
            record.marked_for_sending = true;
            self.events_being_sent.push_back(record);
            any_taken = true;
        }

        loop {
            let Some(front) = self.actions.front() else {
                break;
            };
            let addition_len = if any_taken { separator.len() } else { 0 } + front.data.len();
            if any_taken && out.len() + addition_len > max_bytes {
                break;
            }
            let mut record = self.actions.pop_front().unwrap();
            if any_taken {
                out.push_str(separator);
            }
            out.push_str(&record.data);
            record.marked_for_sending = true;
            self.actions_being_sent.push_back(record);
            any_taken = true;
        }

        if !any_taken {
            return String::new();
        }
        out
    }

    /// Discards the "being-sent" buffers after a successful upload.
    /// Returns the bytes removed.
    pub fn remove_chunked_data(&mut self) -> i64 {
        let removed: i64 = self
            .events_being_sent
            .iter()
            .chain(self.actions_being_sent.iter())
            .map(BeaconCacheRecord::cost)
            .sum();
        self.events_being_sent.clear();
        self.actions_being_sent.clear();
        self.bytes -= removed;
        removed
    }

    /// Moves "being-sent" records back to the head of their sequences
    /// after a failed upload, clearing their marks.
    pub fn reset_chunked_data(&mut self) {
        while let Some(mut record) = self.events_being_sent.pop_back() {
            record.marked_for_sending = false;
            self.events.push_front(record);
        }
        while let Some(mut record) = self.actions_being_sent.pop_back() {
            record.marked_for_sending = false;
            self.actions.push_front(record);
        }
    }

    /// Drops every record (in `events` then `actions`) with
    /// `ts < min_ts_exclusive`. Returns the number of records removed.
    pub fn evict_by_age(&mut self, min_ts_exclusive: i64) -> usize {
        let mut removed = 0;
        removed += evict_front_while(&mut self.events, &mut self.bytes, |r| {
            r.timestamp_ms < min_ts_exclusive
        });
        removed += evict_front_while(&mut self.actions, &mut self.bytes, |r| {
            r.timestamp_ms < min_ts_exclusive
        });
        removed
    }

    /// Removes up to `n` records total, events first then actions, from
    /// the fronts of their sequences. Returns the number actually removed.
    pub fn evict_by_number(&mut self, n: usize) -> usize {
        let mut remaining = n;
        let mut removed = 0;
        while remaining > 0 {
            if let Some(record) = self.events.pop_front() {
                self.bytes -= record.cost();
                removed += 1;
                remaining -= 1;
            } else if let Some(record) = self.actions.pop_front() {
                self.bytes -= record.cost();
                removed += 1;
                remaining -= 1;
            } else {
                break;
            }
        }
        removed
    }
}

fn evict_front_while(
    queue: &mut VecDeque<BeaconCacheRecord>,
    bytes: &mut i64,
    predicate: impl Fn(&BeaconCacheRecord) -> bool,
) -> usize {
    let mut removed = 0;
    while let Some(front) = queue.front() {
        if !predicate(front) {
            break;
        }
        let record = queue.pop_front().unwrap();
        *bytes -= record.cost();
        removed += 1;
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(ts: i64, data: &str) -> BeaconCacheRecord {
        BeaconCacheRecord::new(ts, data)
    }

    #[test]
    fn evict_by_age_drops_older_events_and_actions() {
        let mut entry = BeaconCacheEntry::new();
        entry.add_event(rec(1000, "a"));
        entry.add_event(rec(1001, "iii"));
        entry.add_action(rec(1000, "b"));
        entry.add_action(rec(1001, "jjj"));
        let removed = entry.evict_by_age(1001);
        assert_eq!(removed, 2);
        assert_eq!(entry.events.len(), 1);
        assert_eq!(entry.actions.len(), 1);
    }

    #[test]
    fn next_chunk_prepends_prefix_and_stops_at_max_bytes() {
        let mut entry = BeaconCacheEntry::new();
        entry.add_event(rec(1, "aaaa"));
        entry.add_event(rec(2, "bbbb"));
        let chunk = entry.next_chunk("pfx&", 8, "&");
        assert_eq!(chunk, "pfx&aaaa");
        assert_eq!(entry.events_being_sent.len(), 1);
        assert_eq!(entry.events.len(), 1);
    }

    #[test]
    fn remove_then_reset_round_trip_restores_byte_count() {
        let mut entry = BeaconCacheEntry::new();
        entry.add_event(rec(1, "aaaa"));
        entry.add_event(rec(2, "bbbb"));
        let before = entry.bytes;
        entry.next_chunk("", 1000, "&");
        entry.reset_chunked_data();
        assert_eq!(entry.bytes, before);
        assert_eq!(entry.events.len(), 2);
    }

    #[test]
    fn get_next_chunk_then_remove_reduces_total_bytes() {
        let mut entry = BeaconCacheEntry::new();
        entry.add_event(rec(1, "aaaa"));
        let before = entry.bytes;
        let chunk = entry.next_chunk("", 1000, "&");
        assert_eq!(chunk, "aaaa");
        let removed = entry.remove_chunked_data();
        assert_eq!(entry.bytes, before - removed);
        assert_eq!(entry.bytes, 0);
    }
}
