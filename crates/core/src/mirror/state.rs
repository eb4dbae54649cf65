//! The state mirror
//!
//! Holds the client's replica of server-authoritative state and pushes each
//! change into the host through [`GameCalls`]. Reads are lock-free snapshots
//! from any thread; writes happen on the game thread only. A write attempted
//! elsewhere is reported and re-posted to the scheduler.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::types::{AvatarState, Season};
use crate::error::{BridgeError, ErrorKind};
use crate::game::GameCalls;
use crate::tasks::{GameThreadScheduler, TaskKind};
use crate::thread::{report_violation, GameThread};

const NO_LOCAL_ENTITY: u64 = u64::MAX;

/// Error type for mirror mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MirrorError {
    #[error("Season {0} is not a valid target")]
    InvalidSeason(u8),

    #[error("Avatar state for entity {0} failed validation")]
    InvalidAvatar(u64),

    #[error("No local entity assigned")]
    NoLocalEntity,
}

impl MirrorError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidMessage
    }
}

/// Result of applying a replicated avatar update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The update was about our own avatar; local authority wins
    IgnoredLocal,
    /// No such avatar yet; the caller decides whether to buffer
    NotSpawned,
    /// Called off the game thread; re-posted to the scheduler
    Deferred,
}

/// Who owns an avatar row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Local,
    Replicated,
}

/// Host effects that could not be applied yet
#[derive(Debug, Default)]
struct PendingEffects {
    /// Latest season wins
    season: Option<Season>,
    /// Replayed in arrival order
    hours: VecDeque<i32>,
}

/// In-process replica of replicated game state
pub struct StateMirror {
    game_thread: GameThread,
    scheduler: Arc<GameThreadScheduler>,
    calls: Arc<GameCalls>,
    season: AtomicU8,
    clock: AtomicI64,
    local_entity: AtomicU64,
    avatars: DashMap<u64, AvatarState>,
    pending: Mutex<PendingEffects>,
    multi_scheduler_warned: AtomicBool,
}

impl StateMirror {
    pub fn new(game_thread: GameThread, scheduler: Arc<GameThreadScheduler>, calls: Arc<GameCalls>) -> Self {
        Self {
            game_thread,
            scheduler,
            calls,
            season: AtomicU8::new(Season::Invalid.as_u8()),
            clock: AtomicI64::new(0),
            local_entity: AtomicU64::new(NO_LOCAL_ENTITY),
            avatars: DashMap::new(),
            pending: Mutex::new(PendingEffects::default()),
            multi_scheduler_warned: AtomicBool::new(false),
        }
    }

    /// True on the game thread; otherwise reports the violation
    fn check_thread(&self, operation: &str) -> bool {
        if self.game_thread.is_current() {
            true
        } else {
            report_violation(operation);
            false
        }
    }

    // Reads

    /// Last applied season, `Invalid` until the server sends one
    pub fn season(&self) -> Season {
        Season::from_u8(self.season.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Total hours advanced this session
    pub fn clock(&self) -> i64 {
        self.clock.load(Ordering::Acquire)
    }

    pub fn avatar(&self, entity_id: u64) -> Option<AvatarState> {
        self.avatars.get(&entity_id).map(|row| *row)
    }

    pub fn avatar_count(&self) -> usize {
        self.avatars.len()
    }

    pub fn local_entity(&self) -> Option<u64> {
        match self.local_entity.load(Ordering::Acquire) {
            NO_LOCAL_ENTITY => None,
            id => Some(id),
        }
    }

    pub fn authority(&self, entity_id: u64) -> Authority {
        if self.local_entity() == Some(entity_id) {
            Authority::Local
        } else {
            Authority::Replicated
        }
    }

    /// True while host effects are waiting for their objects to appear
    pub fn has_pending_effects(&self) -> bool {
        let pending = self.pending.lock();
        pending.season.is_some() || !pending.hours.is_empty()
    }

    // Mutations

    /// Record which entity the server assigned to us
    pub fn set_local_entity(&self, entity_id: u64) {
        let previous = self.local_entity.swap(entity_id, Ordering::AcqRel);
        if previous != entity_id {
            info!("Local entity set to {}", entity_id);
        }
    }

    /// Apply a season from the server and switch the host to it
    pub fn apply_season(self: &Arc<Self>, season: Season) -> Result<(), MirrorError> {
        if !season.is_target() {
            return Err(MirrorError::InvalidSeason(season.as_u8()));
        }

        if !self.check_thread("StateMirror::apply_season") {
            let this = self.clone();
            self.scheduler.post(TaskKind::Environment, move || {
                let _ = this.apply_season(season);
            });
            return Ok(());
        }

        self.season.store(season.as_u8(), Ordering::Release);
        debug!("Season -> {:?}", season);

        // A newer season replaces any that never reached the host
        self.pending.lock().season = None;
        if let Err(e) = self.calls.set_current_season(season) {
            self.defer_on_not_found(e, |pending| pending.season = Some(season));
        }
        Ok(())
    }

    /// Apply a raw wire season value
    pub fn apply_season_raw(self: &Arc<Self>, value: u8) -> Result<(), MirrorError> {
        let season = Season::target_from_u8(value).ok_or(MirrorError::InvalidSeason(value))?;
        self.apply_season(season)
    }

    /// Advance the clock and every live host scheduler by `hours`
    pub fn advance_hours(self: &Arc<Self>, hours: i32) {
        if !self.check_thread("StateMirror::advance_hours") {
            let this = self.clone();
            self.scheduler
                .post(TaskKind::Environment, move || this.advance_hours(hours));
            return;
        }

        self.clock.fetch_add(hours as i64, Ordering::AcqRel);
        debug!("Clock advanced by {} hours (total {})", hours, self.clock());

        // Keep host deltas in order behind any that are still waiting
        {
            let mut pending = self.pending.lock();
            if !pending.hours.is_empty() {
                pending.hours.push_back(hours);
                return;
            }
        }

        match self.calls.advance_hours(hours) {
            Ok(count) => self.note_scheduler_count(count),
            Err(e) => self.defer_on_not_found(e, |pending| pending.hours.push_back(hours)),
        }
    }

    /// Upsert a replicated avatar
    pub fn apply_avatar_update(
        self: &Arc<Self>,
        entity_id: u64,
        state: AvatarState,
    ) -> Result<UpdateOutcome, MirrorError> {
        if !state.is_valid() {
            return Err(MirrorError::InvalidAvatar(entity_id));
        }

        if !self.check_thread("StateMirror::apply_avatar_update") {
            let this = self.clone();
            self.scheduler.post(TaskKind::AvatarUpdate(entity_id), move || {
                let _ = this.apply_avatar_update(entity_id, state);
            });
            return Ok(UpdateOutcome::Deferred);
        }

        if self.authority(entity_id) == Authority::Local {
            trace!("Ignoring server update for local entity {}", entity_id);
            return Ok(UpdateOutcome::IgnoredLocal);
        }

        match self.avatars.get_mut(&entity_id) {
            Some(mut row) => {
                *row = AvatarState { entity_id, ..state };
                Ok(UpdateOutcome::Applied)
            }
            None => Ok(UpdateOutcome::NotSpawned),
        }
    }

    /// Create or reset an avatar row
    pub fn spawn_avatar(self: &Arc<Self>, entity_id: u64, initial: AvatarState) -> Result<(), MirrorError> {
        if !initial.is_valid() {
            return Err(MirrorError::InvalidAvatar(entity_id));
        }

        if !self.check_thread("StateMirror::spawn_avatar") {
            let this = self.clone();
            self.scheduler.post(TaskKind::Spawn, move || {
                let _ = this.spawn_avatar(entity_id, initial);
            });
            return Ok(());
        }

        let replaced = self
            .avatars
            .insert(entity_id, AvatarState { entity_id, ..initial })
            .is_some();
        debug!(
            "Spawned avatar {} ({:?}{})",
            entity_id,
            self.authority(entity_id),
            if replaced { ", replaced" } else { "" }
        );
        Ok(())
    }

    /// Remove an avatar row; returns whether it existed
    pub fn despawn_avatar(self: &Arc<Self>, entity_id: u64) -> bool {
        if !self.check_thread("StateMirror::despawn_avatar") {
            let this = self.clone();
            self.scheduler.post(TaskKind::Despawn, move || {
                this.despawn_avatar(entity_id);
            });
            return false;
        }

        let removed = self.avatars.remove(&entity_id).is_some();
        if removed {
            debug!("Despawned avatar {}", entity_id);
        } else {
            trace!("Despawn for unknown avatar {}", entity_id);
        }
        removed
    }

    /// Write our own avatar from local input
    pub fn update_local_avatar(self: &Arc<Self>, state: AvatarState) -> Result<AvatarState, MirrorError> {
        let entity_id = self.local_entity().ok_or(MirrorError::NoLocalEntity)?;
        if !state.is_valid() {
            return Err(MirrorError::InvalidAvatar(entity_id));
        }
        let state = AvatarState { entity_id, ..state };

        if !self.check_thread("StateMirror::update_local_avatar") {
            let this = self.clone();
            self.scheduler.post(TaskKind::LocalAvatarUpdate(entity_id), move || {
                this.avatars.insert(entity_id, state);
            });
            return Ok(state);
        }

        self.avatars.insert(entity_id, state);
        Ok(state)
    }

    /// Retry host effects whose objects were missing earlier
    ///
    /// Called once per frame on the game thread.
    pub fn retry_pending(&self) {
        if !self.game_thread.is_current() {
            return;
        }

        let mut pending = self.pending.lock();

        if let Some(season) = pending.season {
            match self.calls.set_current_season(season) {
                Ok(_) => {
                    debug!("Applied pending season {:?}", season);
                    pending.season = None;
                }
                Err(e) if e.kind() == ErrorKind::NotFoundYet => {}
                Err(e) => {
                    warn!("Dropping pending season {:?}: {}", season, e);
                    pending.season = None;
                }
            }
        }

        while let Some(&hours) = pending.hours.front() {
            match self.calls.advance_hours(hours) {
                Ok(count) => {
                    pending.hours.pop_front();
                    self.note_scheduler_count(count);
                }
                Err(e) if e.kind() == ErrorKind::NotFoundYet => break,
                Err(e) => {
                    warn!("Dropping {} pending clock deltas: {}", pending.hours.len(), e);
                    pending.hours.clear();
                }
            }
        }
    }

    fn defer_on_not_found(&self, err: BridgeError, defer: impl FnOnce(&mut PendingEffects)) {
        if err.kind() == ErrorKind::NotFoundYet {
            debug!("Host effect deferred: {}", err);
            defer(&mut self.pending.lock());
        } else {
            warn!("Host effect failed: {}", err);
        }
    }

    fn note_scheduler_count(&self, count: usize) {
        if count > 1 && !self.multi_scheduler_warned.swap(true, Ordering::Relaxed) {
            warn!("{} live schedulers found; advancing all of them", count);
        }
    }

    /// Forget all replicated state (session end)
    pub fn clear(&self) {
        self.avatars.clear();
        *self.pending.lock() = PendingEffects::default();
        self.season.store(Season::Invalid.as_u8(), Ordering::Release);
        self.clock.store(0, Ordering::Release);
        self.local_entity.store(NO_LOCAL_ENTITY, Ordering::Release);
    }
}
