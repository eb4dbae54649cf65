//! Replication channel and wire codec
//!
//! - [`BitStream`]: symmetric bit-level reader/writer
//! - [`Message`] / [`NetMessage`]: the fixed message catalogue
//! - [`ReplicationChannel`]: decode, validate, dispatch into the state mirror

mod bitstream;
mod channel;
mod messages;
mod pending;

pub use bitstream::{BitStream, Mode, StreamError};
pub use channel::{ChannelError, ChannelStats, ReplicationChannel};
pub use messages::{
    Chat, EnvClockAdvance, EnvSeason, HumanDespawn, HumanSpawn, HumanUpdate, Message, MessageId,
    NetMessage, MAX_CHAT_BYTES,
};
pub use pending::PendingUpdates;
