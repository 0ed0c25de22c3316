//! A single cached beacon record (spec.md §3 "BeaconCacheRecord").

/// Per-record fixed overhead: the `i64` timestamp plus one byte, matching
/// the cost formula `len(data) + sizeof(timestamp) + 1` from spec.md §3.
const RECORD_OVERHEAD_BYTES: i64 = std::mem::size_of::<i64>() as i64 + 1;

#[derive(Debug, Clone)]
pub struct BeaconCacheRecord {
    pub timestamp_ms: i64,
    pub data: String,
    pub marked_for_sending: bool,
}

impl BeaconCacheRecord {
    pub fn new(timestamp_ms: i64, data: impl Into<String>) -> Self {
        BeaconCacheRecord {
            timestamp_ms,
            data: data.into(),
            marked_for_sending: false,
        }
    }

    /// Byte cost of this record toward the cache's total, per spec.md §3.
    pub fn cost(&self) -> i64 {
        self.data.len() as i64 + RECORD_OVERHEAD_BYTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_includes_overhead() {
        let r = BeaconCacheRecord::new(0, "x");
        assert_eq!(r.cost(), 1 + RECORD_OVERHEAD_BYTES);
    }
}
