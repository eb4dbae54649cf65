//! Replicated value types

use bitflags::bitflags;

/// In-game season
///
/// `Invalid` and `Max` are sentinels: they are never applied and never sent
/// as a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Season {
    #[default]
    Invalid = 0,
    Fall = 1,
    Winter = 2,
    Spring = 3,
    Summer = 4,
    Max = 5,
}

impl Season {
    /// The four seasons a host can be switched to
    pub const TARGETS: [Season; 4] = [Season::Fall, Season::Winter, Season::Spring, Season::Summer];

    /// Decode a wire value; anything past `Max` is `None`
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Invalid),
            1 => Some(Self::Fall),
            2 => Some(Self::Winter),
            3 => Some(Self::Spring),
            4 => Some(Self::Summer),
            5 => Some(Self::Max),
            _ => None,
        }
    }

    /// Decode a wire value that must name a real season
    pub fn target_from_u8(value: u8) -> Option<Self> {
        Self::from_u8(value).filter(|season| season.is_target())
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for Fall, Winter, Spring and Summer
    #[inline]
    pub fn is_target(self) -> bool {
        matches!(self, Self::Fall | Self::Winter | Self::Spring | Self::Summer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quat,
}

bitflags! {
    /// Player input state; unknown bits are carried through untouched
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InputFlags: u32 {
        const FORWARD = 1 << 0;
        const BACKWARD = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const JUMP = 1 << 4;
        const SPRINT = 1 << 5;
        const CROUCH = 1 << 6;
        const ATTACK = 1 << 7;
    }
}

/// Accepted quaternion magnitude range for replicated avatars
pub const QUAT_MAGNITUDE_RANGE: std::ops::RangeInclusive<f32> = 0.9..=1.1;

/// One participant's avatar
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AvatarState {
    pub entity_id: u64,
    pub transform: Transform,
    pub velocity: Vec3,
    pub input: InputFlags,
}

impl AvatarState {
    pub fn new(entity_id: u64) -> Self {
        Self {
            entity_id,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// All floats finite and the orientation close to unit length
    pub fn is_valid(&self) -> bool {
        self.transform.position.is_finite()
            && self.transform.orientation.is_finite()
            && self.velocity.is_finite()
            && QUAT_MAGNITUDE_RANGE.contains(&self.transform.orientation.magnitude())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_targets() {
        assert_eq!(Season::target_from_u8(3), Some(Season::Spring));
        assert_eq!(Season::target_from_u8(0), None);
        assert_eq!(Season::target_from_u8(5), None);
        assert_eq!(Season::from_u8(5), Some(Season::Max));
        assert_eq!(Season::from_u8(200), None);
        assert!(Season::TARGETS.iter().all(|s| s.is_target()));
    }

    #[test]
    fn test_avatar_validity() {
        let avatar = AvatarState::new(1).with_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(avatar.is_valid());

        let mut nan = avatar;
        nan.velocity.y = f32::NAN;
        assert!(!nan.is_valid());

        let mut squashed = avatar;
        squashed.transform.orientation = Quat::new(0.0, 0.0, 0.0, 0.5);
        assert!(!squashed.is_valid());

        let mut zero = avatar;
        zero.transform.orientation = Quat::new(0.0, 0.0, 0.0, 0.0);
        assert!(!zero.is_valid());
    }

    #[test]
    fn test_unknown_input_bits_kept() {
        let input = InputFlags::from_bits_retain(0x8000_0011);
        assert!(input.contains(InputFlags::FORWARD | InputFlags::JUMP));
        assert_eq!(input.bits(), 0x8000_0011);
    }
}
