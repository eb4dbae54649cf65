//! Listeners for frame, chat and avatar lifecycle events
//!
//! Callbacks are stored in a slotmap and invoked on the game thread when the
//! corresponding event is applied. Registration returns a key that removes
//! the callback again.
//!
//! # Example
//!
//! ```ignore
//! let key = runtime.listeners().on_chat(|text| {
//!     tracing::info!("Chat: {}", text);
//! });
//!
//! // Later, unregister if needed
//! runtime.listeners().remove(key);
//! ```

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Key for registered listeners, used for removal
    pub struct ListenerKey;
}

/// Callback for each frame: (frame number)
pub type FrameCallback = Box<dyn Fn(u64) + Send + Sync>;
/// Callback for received chat: (text)
pub type ChatCallback = Box<dyn Fn(&str) + Send + Sync>;
/// Callback for avatar lifecycle: (entity id)
pub type AvatarCallback = Box<dyn Fn(u64) + Send + Sync>;

enum Listener {
    Frame(FrameCallback),
    Chat(ChatCallback),
    AvatarSpawned(AvatarCallback),
    AvatarDespawned(AvatarCallback),
}

/// Registered callbacks
///
/// Callbacks must not register or remove listeners while being fired.
#[derive(Default)]
pub struct Listeners {
    callbacks: RwLock<SlotMap<ListenerKey, Listener>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, listener: Listener) -> ListenerKey {
        self.callbacks.write().insert(listener)
    }

    /// Register a callback run after every drained frame
    pub fn on_frame<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.insert(Listener::Frame(Box::new(callback)))
    }

    /// Register a callback for chat lines from the server
    pub fn on_chat<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.insert(Listener::Chat(Box::new(callback)))
    }

    /// Register a callback for avatars spawned by the server
    pub fn on_avatar_spawned<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.insert(Listener::AvatarSpawned(Box::new(callback)))
    }

    /// Register a callback for avatars despawned by the server
    pub fn on_avatar_despawned<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.insert(Listener::AvatarDespawned(Box::new(callback)))
    }

    /// Remove a listener by its key
    ///
    /// Returns `true` if the listener was found and removed.
    pub fn remove(&self, key: ListenerKey) -> bool {
        self.callbacks.write().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.callbacks.write().clear();
    }

    /// Fire all frame callbacks
    pub fn fire_frame(&self, frame: u64) {
        for (_, listener) in self.callbacks.read().iter() {
            if let Listener::Frame(callback) = listener {
                callback(frame);
            }
        }
    }

    /// Fire all chat callbacks
    pub fn fire_chat(&self, text: &str) {
        tracing::debug!("Firing OnChat: {} bytes", text.len());
        for (_, listener) in self.callbacks.read().iter() {
            if let Listener::Chat(callback) = listener {
                callback(text);
            }
        }
    }

    /// Fire all avatar spawned callbacks
    pub fn fire_avatar_spawned(&self, entity_id: u64) {
        tracing::debug!("Firing OnAvatarSpawned: entity={}", entity_id);
        for (_, listener) in self.callbacks.read().iter() {
            if let Listener::AvatarSpawned(callback) = listener {
                callback(entity_id);
            }
        }
    }

    /// Fire all avatar despawned callbacks
    pub fn fire_avatar_despawned(&self, entity_id: u64) {
        tracing::debug!("Firing OnAvatarDespawned: entity={}", entity_id);
        for (_, listener) in self.callbacks.read().iter() {
            if let Listener::AvatarDespawned(callback) = listener {
                callback(entity_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_fire_only_matching_kind() {
        let listeners = Listeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        listeners.on_avatar_spawned(move |id| sink.lock().push(format!("spawn {}", id)));
        let sink = seen.clone();
        listeners.on_chat(move |text| sink.lock().push(format!("chat {}", text)));

        listeners.fire_avatar_spawned(4);
        listeners.fire_avatar_despawned(4);
        listeners.fire_chat("hi");

        assert_eq!(*seen.lock(), vec!["spawn 4".to_string(), "chat hi".to_string()]);
    }

    #[test]
    fn test_remove_listener() {
        let listeners = Listeners::new();
        let count = Arc::new(Mutex::new(0));

        let sink = count.clone();
        let key = listeners.on_frame(move |_| *sink.lock() += 1);
        listeners.fire_frame(1);

        assert!(listeners.remove(key));
        assert!(!listeners.remove(key));
        listeners.fire_frame(2);

        assert_eq!(*count.lock(), 1);
        assert!(listeners.is_empty());
    }
}
