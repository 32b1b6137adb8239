//! Extract an independently owned part from a cached model.

use std::str::FromStr;

use asset::{MeshData, Node, Scene};
use corelib::{CoreError, Transform, Vec3};

use crate::error::SelectError;

/// Geometry layout of a selected part.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BufferMode {
    /// Shared vertices addressed through an index buffer.
    #[default]
    Indexed,
    /// One vertex per triangle corner, no index buffer.
    Deindexed,
}

impl BufferMode {
    fn apply(self, mesh: &MeshData) -> MeshData {
        match self {
            BufferMode::Indexed => mesh.to_indexed(),
            BufferMode::Deindexed => mesh.to_non_indexed(),
        }
    }
}

impl FromStr for BufferMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "indexed" | "buffered" => Ok(BufferMode::Indexed),
            "deindexed" | "non-indexed" | "flat" => Ok(BufferMode::Deindexed),
            other => Err(CoreError::InvalidValue {
                what: "buffer mode",
                value: other.to_string(),
            }),
        }
    }
}

/// A drawable subtree copied out of a model. Owns all of its geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedAsset {
    /// Name that was looked up (the copied node may be one of its descendants).
    pub part: String,
    pub node: Node,
}

impl SelectedAsset {
    pub fn mesh(&self) -> Option<&MeshData> {
        self.node.mesh.as_ref()
    }

    pub fn transform(&self) -> &Transform {
        &self.node.transform
    }

    /// Move the part to the local origin and return where it was.
    pub fn reset_position(&mut self) -> Vec3 {
        self.node.transform.take_translation()
    }
}

/// Copy the drawable part named `part_name` out of `resource`.
///
/// The first node with that name in depth-first pre-order is the part; the
/// copied node is the part itself or its nearest drawable descendant. Every
/// mesh in the copy is converted to `mode`.
pub fn select_part(
    resource: &Scene,
    part_name: &str,
    mode: BufferMode,
) -> Result<SelectedAsset, SelectError> {
    let part = resource
        .find(part_name)
        .ok_or_else(|| SelectError::PartNotFound {
            part: part_name.to_string(),
        })?;
    let drawable = part
        .nearest_drawable()
        .ok_or_else(|| SelectError::NoDrawableFound {
            part: part_name.to_string(),
        })?;

    Ok(SelectedAsset {
        part: part_name.to_string(),
        node: copy_with_layout(drawable, mode),
    })
}

fn copy_with_layout(node: &Node, mode: BufferMode) -> Node {
    Node {
        name: node.name.clone(),
        transform: node.transform,
        mesh: node.mesh.as_ref().map(|mesh| mode.apply(mesh)),
        children: node
            .children
            .iter()
            .map(|child| copy_with_layout(child, mode))
            .collect(),
    }
}
