use crate::{Quat, Vec3};

/// Local transform of a scene node (translation, rotation, scale).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Zero the translation and hand back what it was.
    #[inline]
    pub fn take_translation(&mut self) -> Vec3 {
        std::mem::replace(&mut self.translation, Vec3::ZERO)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
