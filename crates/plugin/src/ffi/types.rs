//! C layouts for values crossing the export boundary

use coopbridge_core::mirror::{AvatarState, InputFlags, Quat, Transform, Vec3};

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CQuat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

/// Avatar snapshot as exchanged with the networking layer
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CAvatarState {
    pub entity_id: u64,
    pub position: CVec3,
    pub orientation: CQuat,
    pub velocity: CVec3,
    pub input_flags: u32,
}

impl From<CVec3> for Vec3 {
    fn from(v: CVec3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

impl From<Vec3> for CVec3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<CAvatarState> for AvatarState {
    fn from(c: CAvatarState) -> Self {
        let q = c.orientation;
        AvatarState {
            entity_id: c.entity_id,
            transform: Transform {
                position: c.position.into(),
                orientation: Quat::new(q.x, q.y, q.z, q.w),
            },
            velocity: c.velocity.into(),
            input: InputFlags::from_bits_retain(c.input_flags),
        }
    }
}

impl From<AvatarState> for CAvatarState {
    fn from(state: AvatarState) -> Self {
        let q = state.transform.orientation;
        Self {
            entity_id: state.entity_id,
            position: state.transform.position.into(),
            orientation: CQuat {
                x: q.x,
                y: q.y,
                z: q.z,
                w: q.w,
            },
            velocity: state.velocity.into(),
            input_flags: state.input.bits(),
        }
    }
}
