use linked_hash_map::LinkedHashMap;

use crate::common::types::FrameId;

/// LRU replacement policy over evictable frames.
///
/// Ordering reflects the order of `unpin` calls, not access recency of
/// pinned pages: the least recently unpinned frame is the victim. The
/// keyed map gives O(1) removal when a frame gets re-pinned.
pub struct LruReplacer {
    capacity: usize,
    // Oldest unpin at the front; victim pops from there.
    entries: LinkedHashMap<FrameId, ()>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: LinkedHashMap::new(),
        }
    }

    /// Remove and return the least recently unpinned frame.
    pub fn victim(&mut self) -> Option<FrameId> {
        self.entries.pop_front().map(|(frame_id, _)| frame_id)
    }

    /// A pinned frame is no longer evictable. Idempotent when the frame
    /// is not tracked.
    pub fn pin(&mut self, frame_id: FrameId) {
        self.entries.remove(&frame_id);
    }

    /// Mark a frame evictable. Ignored when already tracked or when the
    /// replacer is at capacity.
    pub fn unpin(&mut self, frame_id: FrameId) {
        if self.entries.len() >= self.capacity || self.entries.contains_key(&frame_id) {
            return;
        }
        self.entries.insert(frame_id, ());
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_victim_order_follows_unpin_order() {
        let mut replacer = LruReplacer::new(7);

        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_pin_removes_frame() {
        let mut replacer = LruReplacer::new(7);

        replacer.unpin(1);
        replacer.unpin(2);
        replacer.pin(1);
        // Pinning an untracked frame is a no-op.
        replacer.pin(9);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.victim(), Some(2));
    }

    #[test]
    fn test_duplicate_unpin_keeps_original_position() {
        let mut replacer = LruReplacer::new(7);

        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(1);

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(), Some(1));
    }

    #[test]
    fn test_capacity_bound() {
        let mut replacer = LruReplacer::new(2);

        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), None);
    }
}
