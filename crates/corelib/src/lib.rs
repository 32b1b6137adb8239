//! Core shared types: math re-exports, node Transform, errors.

use thiserror::Error;

pub use glam::{Quat, Vec3, vec3};

pub mod transform;

pub use transform::Transform;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid {what}: '{value}'")]
    InvalidValue { what: &'static str, value: String },
}
