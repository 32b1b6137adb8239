//! OBJ parser building a named node tree.
//!
//! `o` opens a new child of the root, `g` opens a child of the current object
//! (or of the root when no object is open). Faces seen before any `o`/`g`
//! belong to the root itself. Each node gets its own indexed mesh; vertices
//! are shared inside a node when position, uv and normal all match.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};

use crate::{
    mesh::{MeshData, MeshVertex},
    scene::{Node, Scene},
};

const DEFAULT_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

/// Load an OBJ model from a file path. The root node is named after the file stem.
pub fn load_obj_from_path(path: impl AsRef<Path>) -> Result<Scene> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.display()))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model");
    load_obj_from_reader(name, BufReader::new(file))
        .with_context(|| format!("Failed to parse OBJ file: {}", path.display()))
}

/// Load an OBJ model from a [`BufRead`] implementation.
pub fn load_obj_from_reader<R: BufRead>(name: &str, reader: R) -> Result<Scene> {
    ObjParser::new(name).parse(reader)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(name: &str, contents: &str) -> Result<Scene> {
    load_obj_from_reader(name, io::Cursor::new(contents))
}

/// Where incoming faces currently land.
#[derive(Clone, Copy, Debug)]
enum Cursor {
    Root,
    Object(usize),
    Group { object: Option<usize>, group: usize },
}

/// (position, uv, normal) index triple identifying a unique vertex.
type CornerKey = (usize, Option<usize>, Option<usize>);

#[derive(Default)]
struct MeshBuilder {
    unique: HashMap<CornerKey, u32>,
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    fn finish(&mut self) -> Option<MeshData> {
        let builder = std::mem::take(self);
        (!builder.indices.is_empty()).then(|| MeshData::new(builder.vertices, builder.indices))
    }
}

struct ObjParser {
    root: Node,
    cursor: Cursor,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    mesh: MeshBuilder,
    triangles: usize,
}

impl ObjParser {
    fn new(name: &str) -> Self {
        Self {
            root: Node::new(name),
            cursor: Cursor::Root,
            positions: Vec::new(),
            normals: Vec::new(),
            texcoords: Vec::new(),
            mesh: MeshBuilder::default(),
            triangles: 0,
        }
    }

    fn parse<R: BufRead>(mut self, reader: R) -> Result<Scene> {
        for (line_no, line) in reader.lines().enumerate() {
            let line_no = line_no + 1;
            let line = line.with_context(|| format!("Failed to read line {line_no}"))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            self.parse_line(trimmed, line_no)?;
        }
        self.flush_mesh();

        if self.triangles == 0 {
            bail!("OBJ contained no triangles");
        }
        log::debug!(
            "Parsed OBJ '{}': {} vertices, {} triangles",
            self.root.name,
            self.positions.len(),
            self.triangles
        );
        Ok(Scene::new(self.root))
    }

    fn parse_line(&mut self, line: &str, line_no: usize) -> Result<()> {
        let mut parts = line.split_whitespace();
        let Some(tag) = parts.next() else {
            return Ok(());
        };

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                self.positions.push([x, y, z]);
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                let v = parse_f32(parts.next(), line_no, "v coordinate")?;
                self.texcoords.push([u, v]);
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                self.normals.push([nx, ny, nz]);
            }
            "f" => {
                let corners = parts
                    .map(|token| self.push_corner(token, line_no))
                    .collect::<Result<Vec<u32>>>()?;
                self.push_polygon(&corners);
            }
            "o" => {
                let name = rest_of_line(line, tag);
                self.open_object(name);
            }
            "g" => {
                let name = rest_of_line(line, tag);
                self.open_group(name);
            }
            // s/usemtl/mtllib and friends carry no geometry.
            _ => {}
        }
        Ok(())
    }

    fn open_object(&mut self, name: &str) {
        self.flush_mesh();
        self.root.children.push(Node::new(name));
        self.cursor = Cursor::Object(self.root.children.len() - 1);
    }

    fn open_group(&mut self, name: &str) {
        self.flush_mesh();
        let object = match self.cursor {
            Cursor::Root => None,
            Cursor::Object(object) => Some(object),
            Cursor::Group { object, .. } => object,
        };
        let parent = match object {
            Some(object) => &mut self.root.children[object],
            None => &mut self.root,
        };
        parent.children.push(Node::new(name));
        let group = parent.children.len() - 1;
        self.cursor = Cursor::Group { object, group };
    }

    fn current_node(&mut self) -> &mut Node {
        match self.cursor {
            Cursor::Root => &mut self.root,
            Cursor::Object(object) => &mut self.root.children[object],
            Cursor::Group {
                object: Some(object),
                group,
            } => &mut self.root.children[object].children[group],
            Cursor::Group {
                object: None,
                group,
            } => &mut self.root.children[group],
        }
    }

    fn flush_mesh(&mut self) {
        if let Some(mesh) = self.mesh.finish() {
            self.current_node().mesh = Some(mesh);
        }
    }

    fn push_corner(&mut self, token: &str, line_no: usize) -> Result<u32> {
        let key = self.parse_face_vertex(token, line_no)?;
        if let Some(&index) = self.mesh.unique.get(&key) {
            return Ok(index);
        }

        let (vi, vti, vni) = key;
        let position = self.positions[vi];
        let uv = vti.map_or([0.0, 0.0], |i| self.texcoords[i]);
        let normal = vni.map_or(DEFAULT_NORMAL, |i| self.normals[i]);

        let index = u32::try_from(self.mesh.vertices.len())
            .map_err(|_| anyhow!("Too many vertices in OBJ (>{})", u32::MAX))?;
        self.mesh.vertices.push(MeshVertex::new(position, normal, uv));
        self.mesh.unique.insert(key, index);
        Ok(index)
    }

    /// Fan-triangulate one face; faces with fewer than three corners are dropped.
    fn push_polygon(&mut self, corners: &[u32]) {
        if corners.len() < 3 {
            return;
        }
        for tri in 1..(corners.len() - 1) {
            self.mesh
                .indices
                .extend_from_slice(&[corners[0], corners[tri], corners[tri + 1]]);
            self.triangles += 1;
        }
    }

    fn parse_face_vertex(&self, token: &str, line_no: usize) -> Result<CornerKey> {
        let mut split = token.split('/');
        let position = split.next().unwrap_or_default();
        let position = resolve_index(position, self.positions.len(), line_no)?;

        let mut optional = |len: usize| -> Result<Option<usize>> {
            match split.next() {
                Some(value) if !value.is_empty() => Ok(Some(resolve_index(value, len, line_no)?)),
                _ => Ok(None),
            }
        };
        let texcoord = optional(self.texcoords.len())?;
        let normal = optional(self.normals.len())?;

        Ok((position, texcoord, normal))
    }
}

fn rest_of_line<'a>(line: &'a str, tag: &str) -> &'a str {
    line[tag.len()..].trim()
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {what} on line {line_no}"))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {what} on line {line_no}"))
}

/// Resolve a 1-based (or negative, relative-to-end) OBJ index into `0..len`.
fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw = token
        .parse::<i64>()
        .with_context(|| format!("Invalid index '{token}' on line {line_no}"))?;
    let resolved = match raw {
        0 => bail!("OBJ indices are 1-based; found 0 on line {line_no}"),
        r if r > 0 => r - 1,
        r => len as i64 + r,
    };
    if resolved < 0 || resolved as usize >= len {
        bail!("OBJ index {raw} resolved out of bounds (len={len}) on line {line_no}");
    }
    Ok(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let scene = load_obj_from_str("tri", src).expect("parse triangle");
        assert_eq!(scene.name(), "tri");
        let mesh = scene.root.mesh.as_ref().expect("root mesh");
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices.as_ref().map(Vec::len), Some(3));
        assert!(mesh.is_valid());
        assert_eq!(mesh.vertices[1].uv, [1.0, 0.0]);
    }

    #[test]
    fn objects_and_groups_become_named_nodes() {
        let src = r#"
            v 0 0 0
            v 1 0 0
            v 1 1 0
            v 0 1 0
            o car
            g body
            f 1 2 3 4
            g wheel
            f -4 -3 -2
            o sign
            f 1//1 2 3
            vn 0 1 0
        "#;
        // The trailing normal is declared after its use and must fail.
        assert!(load_obj_from_str("bad", src).is_err());

        let src = src.replace("f 1//1 2 3", "f 1 2 3");
        let scene = load_obj_from_str("street", &src).expect("parse");
        let names: Vec<_> = scene.root.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["street", "car", "body", "wheel", "sign"]);

        let body = scene.find("body").unwrap().mesh.as_ref().unwrap();
        assert_eq!(body.vertices.len(), 4, "quad corners are shared");
        assert_eq!(body.triangle_count(), 2);
        assert_eq!(scene.find("wheel").unwrap().mesh.as_ref().unwrap().triangle_count(), 1);
        assert!(scene.find("car").unwrap().mesh.is_none());
        assert!(scene.find("sign").unwrap().is_drawable());
        assert_eq!(scene.triangle_count(), 4);
    }

    #[test]
    fn group_without_object_hangs_off_root() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\ng lonely\nf 1 2 3\n";
        let scene = load_obj_from_str("m", src).unwrap();
        assert_eq!(scene.root.children.len(), 1);
        assert_eq!(scene.root.children[0].name, "lonely");
        assert!(scene.root.children[0].is_drawable());
    }

    #[test]
    fn rejects_empty_and_malformed_input() {
        assert!(load_obj_from_str("m", "# nothing here\n").is_err());
        assert!(load_obj_from_str("m", "v 0 0 0\nf 1 1 0\n").is_err());
        assert!(load_obj_from_str("m", "v 0 0\n").is_err());
        let err = load_obj_from_str("m", "v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert!(err.to_string().contains("out of bounds"), "{err}");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_obj_from_path("/definitely/not/here.obj").unwrap_err();
        assert!(format!("{err}").contains("here.obj"));
    }
}
