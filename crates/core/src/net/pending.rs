//! Updates that arrived before their avatar was spawned

use std::collections::HashMap;

use crate::mirror::AvatarState;

#[derive(Debug, Clone, Copy)]
struct Buffered {
    tick: u64,
    state: AvatarState,
}

/// Newest early update per entity, stamped with the frame it arrived in
///
/// Updates carry full state, so a later one supersedes an earlier one and
/// at most one is held per entity.
#[derive(Debug, Default)]
pub struct PendingUpdates {
    entities: HashMap<u64, Buffered>,
}

impl PendingUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold an update for `entity_id` received at frame `tick`
    ///
    /// Returns `true` if it replaced an older buffered update.
    pub fn buffer(&mut self, entity_id: u64, state: AvatarState, tick: u64) -> bool {
        self.entities
            .insert(entity_id, Buffered { tick, state })
            .is_some()
    }

    /// Remove and return an entity's newest update
    pub fn take(&mut self, entity_id: u64) -> Option<AvatarState> {
        self.entities.remove(&entity_id).map(|b| b.state)
    }

    /// Drop an entity's update; returns whether one was held
    pub fn discard(&mut self, entity_id: u64) -> bool {
        self.entities.remove(&entity_id).is_some()
    }

    /// Drop updates that have waited `max_age` frames or more
    pub fn expire(&mut self, now: u64, max_age: u64) -> usize {
        let before = self.entities.len();
        self.entities
            .retain(|_, b| now.saturating_sub(b.tick) < max_age);
        before - self.entities.len()
    }

    /// Entities with a buffered update
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::Vec3;

    fn update(id: u64, x: f32) -> AvatarState {
        AvatarState::new(id).with_position(Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_take_newest() {
        let mut pending = PendingUpdates::new();
        assert!(!pending.buffer(1, update(1, 1.0), 0));
        pending.buffer(2, update(2, 9.0), 0);
        assert!(pending.buffer(1, update(1, 2.0), 3));

        assert_eq!(pending.take(1).map(|s| s.position().x), Some(2.0));
        assert_eq!(pending.len(), 1);
        assert!(pending.take(1).is_none());
    }

    #[test]
    fn test_flood_holds_one_per_entity() {
        let mut pending = PendingUpdates::new();
        for n in 0..10_000u64 {
            pending.buffer(7, update(7, n as f32), n);
        }
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.take(7).map(|s| s.position().x), Some(9999.0));
    }

    #[test]
    fn test_expire_by_age() {
        let mut pending = PendingUpdates::new();
        pending.buffer(1, update(1, 1.0), 0);
        pending.buffer(2, update(2, 2.0), 10);

        assert_eq!(pending.expire(59, 60), 0);
        assert_eq!(pending.expire(60, 60), 1);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.expire(70, 60), 1);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_replacement_restarts_age() {
        let mut pending = PendingUpdates::new();
        pending.buffer(1, update(1, 1.0), 0);
        pending.buffer(1, update(1, 2.0), 50);
        assert_eq!(pending.expire(60, 60), 0);
        assert_eq!(pending.expire(110, 60), 1);
    }

    #[test]
    fn test_discard() {
        let mut pending = PendingUpdates::new();
        pending.buffer(5, update(5, 1.0), 0);
        pending.buffer(5, update(5, 2.0), 0);
        assert!(pending.discard(5));
        assert!(!pending.discard(5));
    }
}
