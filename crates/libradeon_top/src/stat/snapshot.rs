use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use super::Sensors;

/// The published result of one completed aggregation window.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Monotonically increasing window number, starting at 1.
    pub sequence: u64,
    pub timestamp: SystemTime,
    /// Ticks actually taken in the window, the denominator of every
    /// percentage below.
    pub ticks: u32,
    /// Busy percentages in decode-table order.
    pub blocks: Vec<BlockUsage>,
    /// Every tick of the window failed to read. The percentages are all
    /// zero but mean "could not read", not "idle".
    pub stalled: bool,
    pub sensors: Option<Sensors>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockUsage {
    pub name: &'static str,
    pub percent: u8,
}

/// Latest-value cell between the sampling thread and consumers.
///
/// `publish` atomically replaces the visible snapshot; readers get an
/// `Arc` to an immutable value and can never observe a partial write.
/// Only the newest snapshot is retained.
#[derive(Debug, Default)]
pub struct SnapshotSlot {
    latest: Mutex<Option<Arc<Snapshot>>>,
    sequence: AtomicU64,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the visible snapshot, stamping it with the next sequence
    /// number. The previous snapshot is discarded.
    pub(crate) fn publish(&self, mut snapshot: Snapshot) {
        snapshot.sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        *self.latest.lock().unwrap() = Some(Arc::new(snapshot));
    }

    /// The most recently published snapshot, `None` before the first
    /// window closes.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest.lock().unwrap().clone()
    }

    /// Sequence number of the latest snapshot, 0 before the first one.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ticks: u32) -> Snapshot {
        Snapshot {
            sequence: 0,
            timestamp: SystemTime::now(),
            ticks,
            blocks: vec![BlockUsage { name: "SHADER", percent: 50 }],
            stalled: false,
            sensors: None,
        }
    }

    #[test]
    fn empty_before_first_publish() {
        let slot = SnapshotSlot::new();

        assert!(slot.latest().is_none());
        assert_eq!(slot.sequence(), 0);
    }

    #[test]
    fn publish_stamps_increasing_sequence() {
        let slot = SnapshotSlot::new();

        slot.publish(snapshot(120));
        assert_eq!(slot.latest().unwrap().sequence, 1);

        slot.publish(snapshot(120));
        assert_eq!(slot.latest().unwrap().sequence, 2);
        assert_eq!(slot.sequence(), 2);
    }

    #[test]
    fn repeated_reads_return_the_same_snapshot() {
        let slot = SnapshotSlot::new();
        slot.publish(snapshot(120));

        let first = slot.latest().unwrap();
        let second = slot.latest().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn only_the_newest_snapshot_is_retained() {
        let slot = SnapshotSlot::new();

        slot.publish(snapshot(120));
        slot.publish(snapshot(60));

        assert_eq!(slot.latest().unwrap().ticks, 60);
    }
}
