//! Named node tree produced by model loaders.

use std::collections::VecDeque;

use corelib::Transform;

use crate::mesh::MeshData;

/// A named node with a local transform, optional geometry and ordered children.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<MeshData>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_mesh(mut self, mesh: MeshData) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Node carries at least one valid triangle.
    pub fn is_drawable(&self) -> bool {
        self.mesh.as_ref().is_some_and(MeshData::is_valid)
    }

    /// Depth-first pre-order walk: a node before its children, children in order.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// First node named `name` in pre-order, including `self`.
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.iter().find(|node| node.name == name)
    }

    /// Closest drawable node: `self` first, then breadth-first by depth with
    /// siblings in declaration order.
    pub fn nearest_drawable(&self) -> Option<&Node> {
        let mut queue = VecDeque::from([self]);
        while let Some(node) = queue.pop_front() {
            if node.is_drawable() {
                return Some(node);
            }
            queue.extend(node.children.iter());
        }
        None
    }
}

/// Pre-order iterator over a node tree.
pub struct PreOrder<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A fully parsed model: one root node and everything below it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub root: Node,
}

impl Scene {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn name(&self) -> &str {
        &self.root.name
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.root.find(name)
    }

    pub fn node_count(&self) -> usize {
        self.root.iter().count()
    }

    pub fn mesh_count(&self) -> usize {
        self.root.iter().filter(|node| node.is_drawable()).count()
    }

    pub fn triangle_count(&self) -> usize {
        self.root
            .iter()
            .filter_map(|node| node.mesh.as_ref())
            .map(MeshData::triangle_count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshVertex;

    fn triangle() -> MeshData {
        MeshData::new(
            vec![
                MeshVertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                MeshVertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                MeshVertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }

    fn car() -> Node {
        Node::new("car")
            .with_child(
                Node::new("body")
                    .with_child(
                        Node::new("door").with_child(Node::new("handle").with_mesh(triangle())),
                    )
                    .with_child(Node::new("roof").with_mesh(triangle())),
            )
            .with_child(Node::new("wheel").with_mesh(triangle()))
    }

    #[test]
    fn pre_order_visits_parents_first() {
        let names: Vec<_> = car().iter().map(|n| n.name.clone()).collect();
        assert_eq!(names, ["car", "body", "door", "handle", "roof", "wheel"]);
    }

    #[test]
    fn find_returns_first_match_in_pre_order() {
        let root = Node::new("root")
            .with_child(Node::new("a").with_child(Node::new("dup").with_mesh(triangle())))
            .with_child(Node::new("dup"));
        let found = root.find("dup").expect("dup exists");
        assert!(found.mesh.is_some(), "deeper match in the first branch wins");
        assert!(root.find("missing").is_none());
    }

    #[test]
    fn nearest_drawable_prefers_shallow_nodes() {
        let car = car();
        let body = car.find("body").unwrap();
        assert_eq!(body.nearest_drawable().unwrap().name, "roof");
        assert_eq!(car.nearest_drawable().unwrap().name, "wheel");
        assert!(Node::new("empty").nearest_drawable().is_none());
    }

    #[test]
    fn empty_mesh_is_not_drawable() {
        let node = Node::new("n").with_mesh(MeshData::default());
        assert!(!node.is_drawable());
    }

    #[test]
    fn scene_counts() {
        let scene = Scene::new(car());
        assert_eq!(scene.name(), "car");
        assert_eq!(scene.node_count(), 6);
        assert_eq!(scene.mesh_count(), 3);
        assert_eq!(scene.triangle_count(), 3);
    }
}
