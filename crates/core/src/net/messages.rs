//! Message catalogue
//!
//! Every frame is `[u8 tag][payload]`. Tags are stable; never renumber them.

use super::bitstream::{BitStream, StreamError};
use crate::mirror::{AvatarState, InputFlags, Season};

/// Longest chat payload the wire format allows, in bytes
pub const MAX_CHAT_BYTES: usize = 512;

/// Stable one-byte message tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageId {
    HumanSpawn = 0x01,
    HumanDespawn = 0x02,
    HumanUpdate = 0x03,
    EnvSeason = 0x10,
    EnvClockAdvance = 0x11,
    Chat = 0x20,
}

impl MessageId {
    pub const ALL: [MessageId; 6] = [
        MessageId::HumanSpawn,
        MessageId::HumanDespawn,
        MessageId::HumanUpdate,
        MessageId::EnvSeason,
        MessageId::EnvClockAdvance,
        MessageId::Chat,
    ];

    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|id| *id as u8 == tag)
    }

    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// A typed message with a symmetric wire form
pub trait NetMessage: Default {
    const ID: MessageId;

    /// Write `self` to, or read it from, `bs` depending on the stream mode
    fn serialize(&mut self, bs: &mut BitStream) -> Result<(), StreamError>;

    /// Structural check run after decoding
    fn valid(&self) -> bool;

    fn id(&self) -> MessageId {
        Self::ID
    }
}

/// `[u64 id][f32 px py pz][f32 qx qy qz qw][f32 vx vy vz][u32 inputFlags]`
fn serialize_avatar(bs: &mut BitStream, state: &mut AvatarState) -> Result<(), StreamError> {
    bs.serialize_u64(&mut state.entity_id)?;

    let position = &mut state.transform.position;
    bs.serialize_f32(&mut position.x)?;
    bs.serialize_f32(&mut position.y)?;
    bs.serialize_f32(&mut position.z)?;

    let orientation = &mut state.transform.orientation;
    bs.serialize_f32(&mut orientation.x)?;
    bs.serialize_f32(&mut orientation.y)?;
    bs.serialize_f32(&mut orientation.z)?;
    bs.serialize_f32(&mut orientation.w)?;

    bs.serialize_f32(&mut state.velocity.x)?;
    bs.serialize_f32(&mut state.velocity.y)?;
    bs.serialize_f32(&mut state.velocity.z)?;

    let mut input = state.input.bits();
    bs.serialize_u32(&mut input)?;
    state.input = InputFlags::from_bits_retain(input);
    Ok(())
}

/// Server created an avatar
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HumanSpawn {
    pub state: AvatarState,
}

impl NetMessage for HumanSpawn {
    const ID: MessageId = MessageId::HumanSpawn;

    fn serialize(&mut self, bs: &mut BitStream) -> Result<(), StreamError> {
        serialize_avatar(bs, &mut self.state)
    }

    fn valid(&self) -> bool {
        self.state.is_valid()
    }
}

/// Server removed an avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HumanDespawn {
    pub entity_id: u64,
}

impl NetMessage for HumanDespawn {
    const ID: MessageId = MessageId::HumanDespawn;

    fn serialize(&mut self, bs: &mut BitStream) -> Result<(), StreamError> {
        bs.serialize_u64(&mut self.entity_id)
    }

    fn valid(&self) -> bool {
        true
    }
}

/// Full avatar state; server broadcast or our own upload
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HumanUpdate {
    pub state: AvatarState,
}

impl NetMessage for HumanUpdate {
    const ID: MessageId = MessageId::HumanUpdate;

    fn serialize(&mut self, bs: &mut BitStream) -> Result<(), StreamError> {
        serialize_avatar(bs, &mut self.state)
    }

    fn valid(&self) -> bool {
        self.state.is_valid()
    }
}

/// Season change; the raw byte is kept so bad values can be counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvSeason {
    pub season: u8,
}

impl EnvSeason {
    pub fn new(season: Season) -> Self {
        Self {
            season: season.as_u8(),
        }
    }

    pub fn target(&self) -> Option<Season> {
        Season::target_from_u8(self.season)
    }
}

impl NetMessage for EnvSeason {
    const ID: MessageId = MessageId::EnvSeason;

    fn serialize(&mut self, bs: &mut BitStream) -> Result<(), StreamError> {
        bs.serialize_u8(&mut self.season)
    }

    fn valid(&self) -> bool {
        self.target().is_some()
    }
}

/// Advance the world clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvClockAdvance {
    pub hours: i32,
}

impl NetMessage for EnvClockAdvance {
    const ID: MessageId = MessageId::EnvClockAdvance;

    fn serialize(&mut self, bs: &mut BitStream) -> Result<(), StreamError> {
        bs.serialize_i32(&mut self.hours)
    }

    fn valid(&self) -> bool {
        true
    }
}

/// Chat line in either direction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chat {
    pub text: String,
}

impl NetMessage for Chat {
    const ID: MessageId = MessageId::Chat;

    fn serialize(&mut self, bs: &mut BitStream) -> Result<(), StreamError> {
        bs.serialize_string_u16(&mut self.text, MAX_CHAT_BYTES)
    }

    fn valid(&self) -> bool {
        !self.text.is_empty() && self.text.len() <= MAX_CHAT_BYTES
    }
}

/// Any decoded message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    HumanSpawn(HumanSpawn),
    HumanDespawn(HumanDespawn),
    HumanUpdate(HumanUpdate),
    EnvSeason(EnvSeason),
    EnvClockAdvance(EnvClockAdvance),
    Chat(Chat),
}

fn read_body<M: NetMessage>(bs: &mut BitStream) -> Result<M, StreamError> {
    let mut message = M::default();
    message.serialize(bs)?;
    Ok(message)
}

fn write_frame<M: NetMessage + Clone>(message: &M) -> Result<Vec<u8>, StreamError> {
    let mut bs = BitStream::writer();
    bs.serialize_u8(&mut M::ID.tag())?;
    message.clone().serialize(&mut bs)?;
    Ok(bs.into_bytes())
}

impl Message {
    /// Decode one frame
    ///
    /// Structural problems (unknown tag, short payload, trailing bytes) are
    /// errors; semantic validity is left to [`Message::valid`].
    pub fn decode(frame: &[u8]) -> Result<Self, StreamError> {
        let mut bs = BitStream::reader(frame);
        let mut tag = 0u8;
        bs.serialize_u8(&mut tag)?;

        let message = match MessageId::from_u8(tag).ok_or(StreamError::UnknownTag(tag))? {
            MessageId::HumanSpawn => Self::HumanSpawn(read_body(&mut bs)?),
            MessageId::HumanDespawn => Self::HumanDespawn(read_body(&mut bs)?),
            MessageId::HumanUpdate => Self::HumanUpdate(read_body(&mut bs)?),
            MessageId::EnvSeason => Self::EnvSeason(read_body(&mut bs)?),
            MessageId::EnvClockAdvance => Self::EnvClockAdvance(read_body(&mut bs)?),
            MessageId::Chat => Self::Chat(read_body(&mut bs)?),
        };

        bs.finish()?;
        Ok(message)
    }

    /// Encode as one frame
    pub fn encode(&self) -> Result<Vec<u8>, StreamError> {
        match self {
            Self::HumanSpawn(m) => write_frame(m),
            Self::HumanDespawn(m) => write_frame(m),
            Self::HumanUpdate(m) => write_frame(m),
            Self::EnvSeason(m) => write_frame(m),
            Self::EnvClockAdvance(m) => write_frame(m),
            Self::Chat(m) => write_frame(m),
        }
    }

    pub fn id(&self) -> MessageId {
        match self {
            Self::HumanSpawn(m) => m.id(),
            Self::HumanDespawn(m) => m.id(),
            Self::HumanUpdate(m) => m.id(),
            Self::EnvSeason(m) => m.id(),
            Self::EnvClockAdvance(m) => m.id(),
            Self::Chat(m) => m.id(),
        }
    }

    pub fn valid(&self) -> bool {
        match self {
            Self::HumanSpawn(m) => m.valid(),
            Self::HumanDespawn(m) => m.valid(),
            Self::HumanUpdate(m) => m.valid(),
            Self::EnvSeason(m) => m.valid(),
            Self::EnvClockAdvance(m) => m.valid(),
            Self::Chat(m) => m.valid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::{Quat, Vec3};
    use proptest::prelude::*;

    #[test]
    fn test_tags_stable() {
        assert_eq!(MessageId::HumanSpawn.tag(), 0x01);
        assert_eq!(MessageId::EnvSeason.tag(), 0x10);
        assert_eq!(MessageId::Chat.tag(), 0x20);
        assert_eq!(MessageId::from_u8(0x11), Some(MessageId::EnvClockAdvance));
        assert_eq!(MessageId::from_u8(0x04), None);
    }

    #[test]
    fn test_env_frames_match_wire_layout() {
        let season = Message::EnvSeason(EnvSeason::new(Season::Spring));
        assert_eq!(season.encode().unwrap(), vec![0x10, 0x03]);

        let clock = Message::EnvClockAdvance(EnvClockAdvance { hours: 5 });
        assert_eq!(clock.encode().unwrap(), vec![0x11, 5, 0, 0, 0]);

        let despawn = Message::HumanDespawn(HumanDespawn { entity_id: 42 });
        assert_eq!(despawn.encode().unwrap(), vec![0x02, 42, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_update_frame_length() {
        let frame = Message::HumanUpdate(HumanUpdate {
            state: AvatarState::new(9),
        })
        .encode()
        .unwrap();
        // tag + u64 + 10 * f32 + u32
        assert_eq!(frame.len(), 1 + 8 + 40 + 4);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(Message::decode(&[]), Err(StreamError::Truncated { needed: 8, remaining: 0 }));
        assert_eq!(Message::decode(&[0x7F]), Err(StreamError::UnknownTag(0x7F)));
        assert!(matches!(
            Message::decode(&[0x11, 1, 0]),
            Err(StreamError::Truncated { .. })
        ));
        assert_eq!(Message::decode(&[0x10, 3, 9]), Err(StreamError::TrailingBits(8)));
    }

    #[test]
    fn test_invalid_season_decodes_but_fails_valid() {
        let message = Message::decode(&[0x10, 0x00]).unwrap();
        assert_eq!(message.id(), MessageId::EnvSeason);
        assert!(!message.valid());
    }

    fn finite() -> impl Strategy<Value = f32> {
        -1.0e6f32..1.0e6f32
    }

    prop_compose! {
        fn arb_avatar()(
            entity_id in any::<u64>(),
            p in (finite(), finite(), finite()),
            v in (finite(), finite(), finite()),
            q in (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0)
                .prop_filter("non-degenerate", |(x, y, z, w)| x * x + y * y + z * z + w * w > 0.01),
            input in any::<u32>(),
        ) -> AvatarState {
            let len = (q.0 * q.0 + q.1 * q.1 + q.2 * q.2 + q.3 * q.3).sqrt();
            let mut state = AvatarState::new(entity_id).with_position(Vec3::new(p.0, p.1, p.2));
            state.transform.orientation = Quat::new(q.0 / len, q.1 / len, q.2 / len, q.3 / len);
            state.velocity = Vec3::new(v.0, v.1, v.2);
            state.input = InputFlags::from_bits_retain(input);
            state
        }
    }

    fn arb_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            arb_avatar().prop_map(|state| Message::HumanSpawn(HumanSpawn { state })),
            any::<u64>().prop_map(|entity_id| Message::HumanDespawn(HumanDespawn { entity_id })),
            arb_avatar().prop_map(|state| Message::HumanUpdate(HumanUpdate { state })),
            (1u8..=4).prop_map(|season| Message::EnvSeason(EnvSeason { season })),
            any::<i32>().prop_map(|hours| Message::EnvClockAdvance(EnvClockAdvance { hours })),
            "[a-zA-Z0-9 äöü!?]{1,100}".prop_map(|text| Message::Chat(Chat { text })),
        ]
    }

    proptest! {
        #[test]
        fn prop_valid_messages_round_trip(message in arb_message()) {
            prop_assume!(message.valid());
            let frame = message.encode().unwrap();
            let decoded = Message::decode(&frame).unwrap();
            prop_assert_eq!(&decoded, &message);
            prop_assert_eq!(decoded.encode().unwrap(), frame);
        }
    }
}
