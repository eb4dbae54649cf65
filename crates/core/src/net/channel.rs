//! Replication channel
//!
//! Inbound frames are decoded and checked on the networking thread, then
//! turned into state mirror mutations posted to the game-thread scheduler.
//! Outbound frames are queued for the networking layer to poll.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::bitstream::StreamError;
use super::messages::{Chat, HumanUpdate, Message, MessageId, MAX_CHAT_BYTES};
use super::pending::PendingUpdates;
use crate::config::ReplicationConfig;
use crate::error::ErrorKind;
use crate::listeners::Listeners;
use crate::mirror::{AvatarState, MirrorError, StateMirror, UpdateOutcome};
use crate::status::BridgeStatus;
use crate::tasks::{GameThreadScheduler, TaskKind};

/// Error type for the replication channel
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,

    #[error("Malformed frame: {0}")]
    Malformed(#[from] StreamError),

    #[error("Invalid {0:?} message")]
    Invalid(MessageId),

    #[error("Chat message of {len} bytes exceeds limit of {max}")]
    ChatTooLong { len: usize, max: usize },

    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

impl ChannelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Closed => ErrorKind::Setup,
            Self::Mirror(e) => e.kind(),
            _ => ErrorKind::InvalidMessage,
        }
    }
}

/// Channel counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub received: u64,
    pub invalid: u64,
    pub buffered: u64,
    pub expired: u64,
    pub sent: u64,
}

/// Bidirectional message channel between the network and the state mirror
pub struct ReplicationChannel {
    config: ReplicationConfig,
    scheduler: Arc<GameThreadScheduler>,
    mirror: Arc<StateMirror>,
    listeners: Arc<Listeners>,
    status: Arc<BridgeStatus>,
    pending: Mutex<PendingUpdates>,
    /// Frames seen by `tick`, used to age pending updates
    tick: AtomicU64,
    /// Arrival times of recent invalid messages
    invalid_window: Mutex<VecDeque<Instant>>,
    outgoing_tx: Sender<Vec<u8>>,
    outgoing_rx: Receiver<Vec<u8>>,
    closed: AtomicBool,
    received: AtomicU64,
    invalid: AtomicU64,
    buffered: AtomicU64,
    expired: AtomicU64,
    sent: AtomicU64,
}

impl ReplicationChannel {
    pub fn new(
        config: ReplicationConfig,
        scheduler: Arc<GameThreadScheduler>,
        mirror: Arc<StateMirror>,
        listeners: Arc<Listeners>,
        status: Arc<BridgeStatus>,
    ) -> Self {
        let (outgoing_tx, outgoing_rx) = unbounded();
        Self {
            config,
            scheduler,
            mirror,
            listeners,
            status,
            pending: Mutex::new(PendingUpdates::new()),
            tick: AtomicU64::new(0),
            invalid_window: Mutex::new(VecDeque::new()),
            outgoing_tx,
            outgoing_rx,
            closed: AtomicBool::new(false),
            received: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            buffered: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            sent: AtomicU64::new(0),
        }
    }

    fn max_chat_len(&self) -> usize {
        self.config.max_chat_length.min(MAX_CHAT_BYTES)
    }

    /// Handle one inbound frame
    ///
    /// Safe to call from the networking thread. Malformed or invalid frames
    /// are dropped and counted; a burst of them requests a disconnect.
    pub fn receive_frame(self: &Arc<Self>, frame: &[u8]) -> Result<MessageId, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.received.fetch_add(1, Ordering::Relaxed);

        let message = match Message::decode(frame) {
            Ok(message) => message,
            Err(e) => return Err(self.reject(e.into())),
        };

        let id = message.id();
        if !message.valid() {
            return Err(self.reject(ChannelError::Invalid(id)));
        }
        if let Message::Chat(chat) = &message {
            let max = self.max_chat_len();
            if chat.text.len() > max {
                return Err(self.reject(ChannelError::ChatTooLong {
                    len: chat.text.len(),
                    max,
                }));
            }
        }

        trace!("Received {:?} ({} bytes)", id, frame.len());
        self.route(message);
        Ok(id)
    }

    /// Count an invalid message and check the burst threshold
    fn reject(&self, err: ChannelError) -> ChannelError {
        self.invalid.fetch_add(1, Ordering::Relaxed);
        warn!("Dropping message: {}", err);

        let window = Duration::from_millis(self.config.invalid_burst_window_ms);
        let now = Instant::now();
        let burst = {
            let mut recent = self.invalid_window.lock();
            recent.push_back(now);
            while recent
                .front()
                .is_some_and(|&at| now.duration_since(at) > window)
            {
                recent.pop_front();
            }
            recent.len()
        };

        if burst >= self.config.invalid_burst_threshold.max(1) as usize {
            self.status.request_disconnect(&format!(
                "{} invalid messages within {:?}",
                burst, window
            ));
            self.close();
        }
        err
    }

    /// Post the mirror mutation for a valid message
    fn route(self: &Arc<Self>, message: Message) {
        let this = self.clone();
        match message {
            Message::HumanSpawn(spawn) => {
                let entity_id = spawn.state.entity_id;
                self.scheduler
                    .post(TaskKind::Spawn, move || this.apply_spawn(entity_id, spawn.state));
            }
            Message::HumanDespawn(despawn) => {
                let entity_id = despawn.entity_id;
                self.scheduler
                    .post(TaskKind::Despawn, move || this.apply_despawn(entity_id));
            }
            Message::HumanUpdate(update) => {
                let entity_id = update.state.entity_id;
                self.scheduler.post(TaskKind::AvatarUpdate(entity_id), move || {
                    this.apply_update(entity_id, update.state)
                });
            }
            Message::EnvSeason(season) => {
                self.scheduler.post(TaskKind::Environment, move || {
                    if let Err(e) = this.mirror.apply_season_raw(season.season) {
                        warn!("Season not applied: {}", e);
                    }
                });
            }
            Message::EnvClockAdvance(clock) => {
                self.scheduler
                    .post(TaskKind::Environment, move || this.mirror.advance_hours(clock.hours));
            }
            Message::Chat(chat) => {
                self.scheduler
                    .post(TaskKind::General, move || this.listeners.fire_chat(&chat.text));
            }
        }
    }

    fn apply_spawn(&self, entity_id: u64, initial: AvatarState) {
        if let Err(e) = self.mirror.spawn_avatar(entity_id, initial) {
            warn!("Spawn of {} failed: {}", entity_id, e);
            return;
        }

        let early = self.pending.lock().take(entity_id);
        if let Some(state) = early {
            if let Err(e) = self.mirror.apply_avatar_update(entity_id, state) {
                warn!("Buffered update for {} failed: {}", entity_id, e);
            }
        }
        self.listeners.fire_avatar_spawned(entity_id);
    }

    fn apply_despawn(&self, entity_id: u64) {
        if self.pending.lock().discard(entity_id) {
            debug!("Dropped buffered update for despawned {}", entity_id);
        }
        if self.mirror.despawn_avatar(entity_id) {
            self.listeners.fire_avatar_despawned(entity_id);
        }
    }

    fn apply_update(&self, entity_id: u64, state: AvatarState) {
        match self.mirror.apply_avatar_update(entity_id, state) {
            Ok(UpdateOutcome::NotSpawned) => {
                let tick = self.tick.load(Ordering::Acquire);
                if self.pending.lock().buffer(entity_id, state, tick) {
                    trace!("Replaced buffered update for unspawned {}", entity_id);
                } else {
                    trace!("Buffered update for unspawned {}", entity_id);
                }
                self.buffered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(e) => warn!("Update for {} failed: {}", entity_id, e),
        }
    }

    /// Advance the frame counter and drop stale buffered updates
    ///
    /// Called once per frame on the game thread, after the scheduler drain.
    pub fn tick(&self) {
        let now = self.tick.fetch_add(1, Ordering::AcqRel) + 1;
        let expired = self
            .pending
            .lock()
            .expire(now, self.config.pending_update_ticks as u64);
        if expired > 0 {
            self.expired.fetch_add(expired as u64, Ordering::Relaxed);
            debug!("Dropped {} updates for avatars that never spawned", expired);
        }
    }

    /// Apply our own avatar locally and queue it for the server
    pub fn send_local_update(&self, state: AvatarState) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let state = self.mirror.update_local_avatar(state)?;
        self.enqueue(Message::HumanUpdate(HumanUpdate { state }))
    }

    /// Queue a chat line for the server
    pub fn send_chat(&self, text: &str) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let max = self.max_chat_len();
        if text.len() > max {
            return Err(ChannelError::ChatTooLong {
                len: text.len(),
                max,
            });
        }

        let message = Message::Chat(Chat {
            text: text.to_string(),
        });
        if !message.valid() {
            return Err(ChannelError::Invalid(MessageId::Chat));
        }
        self.enqueue(message)
    }

    fn enqueue(&self, message: Message) -> Result<(), ChannelError> {
        let frame = message.encode()?;
        if self.outgoing_tx.send(frame).is_err() {
            return Err(ChannelError::Closed);
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Next frame for the networking layer to send, if any
    pub fn poll_outgoing(&self) -> Option<Vec<u8>> {
        self.outgoing_rx.try_recv().ok()
    }

    /// Stop accepting frames in either direction
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Replication channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Buffered updates for unspawned avatars
    pub fn pending_updates(&self) -> usize {
        self.pending.lock().len()
    }

    /// Forget buffered updates and queued outbound frames
    pub fn clear(&self) {
        self.pending.lock().clear();
        while self.outgoing_rx.try_recv().is_ok() {}
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            received: self.received.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            buffered: self.buffered.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
        }
    }
}
