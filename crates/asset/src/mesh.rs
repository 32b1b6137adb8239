//! CPU-side mesh representation used by loaders and part selection.

use std::collections::HashMap;

/// Vertex with position/normal/uv. Values are in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Bit-exact identity used for welding; `-0.0` and `0.0` stay distinct.
    fn weld_key(&self) -> [u32; 8] {
        let [px, py, pz] = self.position;
        let [nx, ny, nz] = self.normal;
        let [u, v] = self.uv;
        [px, py, pz, nx, ny, nz, u, v].map(f32::to_bits)
    }
}

/// Triangle-list mesh. `indices` is `None` for flattened (one vertex per
/// triangle corner) geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Option<Vec<u32>>,
}

impl MeshData {
    /// Indexed triangle list.
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices: Some(indices),
        }
    }

    /// Flattened triangle list: every three vertices form a triangle.
    pub fn non_indexed(vertices: Vec<MeshVertex>) -> Self {
        Self {
            vertices,
            indices: None,
        }
    }

    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    /// Number of triangle corners (index count, or vertex count when flattened).
    pub fn corner_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.vertices.len(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.corner_count() / 3
    }

    /// Returns `true` if the mesh holds at least one whole triangle and every
    /// index points at an existing vertex.
    pub fn is_valid(&self) -> bool {
        let corners = self.corner_count();
        if self.vertices.is_empty() || corners == 0 || corners % 3 != 0 {
            return false;
        }
        match &self.indices {
            Some(indices) => indices.iter().all(|&i| (i as usize) < self.vertices.len()),
            None => true,
        }
    }

    /// Vertices in triangle-corner order. Out-of-range indices are skipped.
    pub fn corners(&self) -> impl Iterator<Item = MeshVertex> + '_ {
        let indexed = self
            .indices
            .iter()
            .flatten()
            .filter_map(|&i| self.vertices.get(i as usize).copied());
        let flat = self.indices.is_none().then(|| self.vertices.iter().copied());
        indexed.chain(flat.into_iter().flatten())
    }

    /// Flatten into one unique vertex per triangle corner, dropping the index buffer.
    pub fn to_non_indexed(&self) -> MeshData {
        MeshData::non_indexed(self.corners().collect())
    }

    /// Indexed copy of this mesh. Source indices are preserved as-is; flattened
    /// geometry is welded so bit-identical vertices share one index.
    pub fn to_indexed(&self) -> MeshData {
        if self.is_indexed() {
            return self.clone();
        }

        let mut unique: HashMap<[u32; 8], u32> = HashMap::new();
        let mut vertices: Vec<MeshVertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::with_capacity(self.vertices.len());
        for vertex in &self.vertices {
            let index = *unique.entry(vertex.weld_key()).or_insert_with(|| {
                vertices.push(*vertex);
                (vertices.len() - 1) as u32
            });
            indices.push(index);
        }
        MeshData::new(vertices, indices)
    }
}
