//! Model data and parsers: CPU-side meshes, the named node tree and the OBJ loader.

pub mod mesh;
pub mod obj;
pub mod scene;

pub use mesh::{MeshData, MeshVertex};
pub use scene::{Node, Scene};
