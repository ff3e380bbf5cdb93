/// A triangular Element of the Mesh
pub mod element;
/// Mesh vertices and 2D points
pub mod node;

use element::{Element, ElementOrder};
use node::{Node, Point};

use super::ModelError;

use json::JsonValue;
use smallvec::{smallvec, SmallVec};
use std::collections::BTreeMap;

/// An edge of the triangulation along with the Elements that share it
#[derive(Debug, Clone)]
pub struct MeshEdge {
    /// Indices (into `Mesh::elements`) of the one or two adjacent Elements
    pub elements: SmallVec<[usize; 2]>,
    /// Mid-edge node (2nd order meshes only)
    pub mid: Option<usize>,
}

/// The triangulated cross-section: nodes, elements and an edge adjacency map.
///
/// Immutable after construction; the edge map is built once from the full set of Elements.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub nodes: Vec<Node>,
    pub elements: Vec<Element>,
    order: ElementOrder,
    // {element id => index into `elements`}
    element_ids: BTreeMap<usize, usize>,
    // {[lower corner id, higher corner id] => adjacent elements}
    edges: BTreeMap<[usize; 2], MeshEdge>,
}

impl Mesh {
    /// Build a Mesh, checking that:
    /// * node IDs form the dense range `1..=N` (in order)
    /// * every Element has the same, supported, node count (3 or 6)
    /// * every Element references existing, distinct nodes
    /// * no Element has (numerically) zero area
    /// * no edge is shared by more than two Elements
    pub fn new(nodes: Vec<Node>, elements: Vec<Element>) -> Result<Self, ModelError> {
        if nodes.is_empty() || elements.is_empty() {
            return Err(ModelError::EmptyMesh);
        }

        for (idx, node) in nodes.iter().enumerate() {
            if node.id != idx + 1 {
                return Err(ModelError::NonContiguousNodeIds {
                    expected: idx + 1,
                    found: node.id,
                });
            }
        }

        let order = match elements[0].order() {
            Some(order) => order,
            None => {
                return Err(ModelError::UnsupportedNodeCount {
                    element_id: elements[0].id,
                    count: elements[0].nodes.len(),
                })
            }
        };

        for element in elements.iter() {
            match element.order() {
                Some(elem_order) if elem_order == order => (),
                Some(elem_order) => {
                    return Err(ModelError::MixedElementOrders {
                        element_id: element.id,
                        expected: order,
                        found: elem_order,
                    })
                }
                None => {
                    return Err(ModelError::UnsupportedNodeCount {
                        element_id: element.id,
                        count: element.nodes.len(),
                    })
                }
            }

            for node_id in element.nodes.iter() {
                if *node_id == 0 || *node_id > nodes.len() {
                    return Err(ModelError::UnknownNode {
                        context: format!("Element {}", element.id),
                        node_id: *node_id,
                    });
                }
            }

            if has_duplicates(&element.nodes) {
                return Err(ModelError::MalformedInput(format!(
                    "Element {} references the same node more than once",
                    element.id
                )));
            }

            if is_degenerate(&nodes, &element.nodes) {
                return Err(ModelError::DegenerateElement {
                    element_id: element.id,
                });
            }
        }

        let mut element_ids = BTreeMap::new();
        for (elem_idx, element) in elements.iter().enumerate() {
            if element_ids.insert(element.id, elem_idx).is_some() {
                return Err(ModelError::MalformedInput(format!(
                    "Element ID {} is used more than once",
                    element.id
                )));
            }
        }

        let edges = build_edge_map(&elements)?;

        Ok(Self {
            nodes,
            elements,
            order,
            element_ids,
            edges,
        })
    }

    /// The (uniform) order of every Element in the Mesh
    pub fn order(&self) -> ElementOrder {
        self.order
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains_node(&self, node_id: usize) -> bool {
        node_id >= 1 && node_id <= self.nodes.len()
    }

    /// Index into `elements` of the Element with the given ID
    pub fn element_index(&self, element_id: usize) -> Option<usize> {
        self.element_ids.get(&element_id).copied()
    }

    /// Coordinates of a node by ID
    ///
    /// Panics if the node doesn't exist (IDs are validated on Model construction)
    pub fn point(&self, node_id: usize) -> &Point {
        assert!(
            self.contains_node(node_id),
            "Node {} doesn't exist; cannot retrieve its coordinates!",
            node_id
        );
        &self.nodes[node_id - 1].coords
    }

    /// Coordinates of an Element's nodes in local order
    pub fn element_points(&self, element: &Element) -> SmallVec<[Point; 6]> {
        element.nodes.iter().map(|id| *self.point(*id)).collect()
    }

    /// Retrieve the edge joining two corner nodes (in either order)
    pub fn edge_between(&self, a: usize, b: usize) -> Option<&MeshEdge> {
        self.edges.get(&edge_key(a, b))
    }

    /// Iterate over all edges as (corner node IDs, edge)
    pub fn edges(&self) -> impl Iterator<Item = (&[usize; 2], &MeshEdge)> + '_ {
        self.edges.iter()
    }

    /// Construct a Mesh from the "Nodes" and "Elements" arrays of a JSON model
    ///
    /// ```JSON
    /// {
    ///     "Nodes": [[x_1, y_1], [x_2, y_2], ...],
    ///     "Elements": [
    ///         { "media": 0, "node_ids": [1, 2, 3] },
    ///         ...
    ///     ]
    /// }
    /// ```
    /// Node IDs are implied by position (the first node is Node 1)
    pub fn from_json(model_json: &JsonValue) -> Result<Self, ModelError> {
        let nodes = parse_node_information(model_json)?;
        let elements = parse_element_information(model_json)?;
        Self::new(nodes, elements)
    }
}

fn edge_key(a: usize, b: usize) -> [usize; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

fn build_edge_map(elements: &[Element]) -> Result<BTreeMap<[usize; 2], MeshEdge>, ModelError> {
    let mut edges: BTreeMap<[usize; 2], MeshEdge> = BTreeMap::new();

    for (elem_idx, element) in elements.iter().enumerate() {
        for ([a, b], mid) in element.edges() {
            let key = edge_key(a, b);
            match edges.get_mut(&key) {
                Some(edge) => {
                    if edge.elements.len() >= 2 {
                        return Err(ModelError::MalformedInput(format!(
                            "Edge {:?} is shared by more than two Elements (including Element {})",
                            key, element.id
                        )));
                    }
                    if edge.mid != mid {
                        return Err(ModelError::MalformedInput(format!(
                            "Edge {:?} has inconsistent mid-nodes ({:?} vs {:?})",
                            key, edge.mid, mid
                        )));
                    }
                    edge.elements.push(elem_idx);
                }
                None => {
                    edges.insert(
                        key,
                        MeshEdge {
                            elements: smallvec![elem_idx],
                            mid,
                        },
                    );
                }
            }
        }
    }

    Ok(edges)
}

// ----------------------------------------------------------------------------------------------------
// Mesh construction from JSON Utility functions
// ----------------------------------------------------------------------------------------------------

fn parse_node_information(model_json: &JsonValue) -> Result<Vec<Node>, ModelError> {
    if !model_json["Nodes"].is_array() {
        return Err(ModelError::MalformedInput(
            "Nodes must be an Array!".to_string(),
        ));
    }

    model_json["Nodes"]
        .members()
        .enumerate()
        .map(|(idx, json_node)| {
            if !json_node.is_array() || json_node.members().count() != 2 {
                return Err(ModelError::MalformedInput(format!(
                    "Node {} must be an Array of length 2!",
                    idx + 1
                )));
            }
            match (json_node[0].as_f64(), json_node[1].as_f64()) {
                (Some(x), Some(y)) => Ok(Node::new(idx + 1, Point::new(x, y))),
                _ => Err(ModelError::MalformedInput(format!(
                    "Node {} must be composed of numerical values!",
                    idx + 1
                ))),
            }
        })
        .collect()
}

fn parse_element_information(model_json: &JsonValue) -> Result<Vec<Element>, ModelError> {
    if !model_json["Elements"].is_array() {
        return Err(ModelError::MalformedInput(
            "Elements must be an Array!".to_string(),
        ));
    }

    model_json["Elements"]
        .members()
        .enumerate()
        .map(|(idx, json_element)| {
            let element_id = idx + 1;
            let node_ids = parse_id_list(&json_element["node_ids"]).ok_or_else(|| {
                ModelError::MalformedInput(format!(
                    "Element {} must have an Array of positive integer node_ids!",
                    element_id
                ))
            })?;
            let media = json_element["media"].as_usize().ok_or_else(|| {
                ModelError::MalformedInput(format!(
                    "Element {} must have a non-negative integer media index!",
                    element_id
                ))
            })?;

            Ok(Element::new(element_id, &node_ids, media))
        })
        .collect()
}

/// Parse a JSON Array of non-negative integers
pub(crate) fn parse_id_list(json_list: &JsonValue) -> Option<Vec<usize>> {
    if !json_list.is_array() {
        return None;
    }
    json_list.members().map(|id| id.as_usize()).collect()
}

// relative to the squared length of the longest edge
const DEGENERATE_AREA_TOLERANCE: f64 = 1e-12;

// whether an Element's corners are (nearly) collinear; node IDs must already be validated
fn is_degenerate(nodes: &[Node], element_nodes: &[usize]) -> bool {
    let [p0, p1, p2] = [0, 1, 2].map(|k| nodes[element_nodes[k] - 1].coords);
    let twice_area = ((p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y)).abs();
    let longest = p0.dist(&p1).max(p1.dist(&p2)).max(p2.dist(&p0));

    twice_area <= DEGENERATE_AREA_TOLERANCE * longest * longest
}

fn has_duplicates<T>(values: &[T]) -> bool
where
    T: PartialEq,
{
    for (i, val) in values.iter().enumerate() {
        for val_cmp in values.iter().skip(i + 1) {
            if val == val_cmp {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> (Vec<Node>, Vec<Element>) {
        /*
            3 *-----* 4
              | \   |
              |   \ |
            1 *-----* 2
        */
        let nodes = vec![
            Node::new(1, Point::new(0.0, 0.0)),
            Node::new(2, Point::new(1.0, 0.0)),
            Node::new(3, Point::new(0.0, 1.0)),
            Node::new(4, Point::new(1.0, 1.0)),
        ];
        let elements = vec![Element::new(1, &[1, 2, 3], 0), Element::new(2, &[2, 4, 3], 1)];
        (nodes, elements)
    }

    #[test]
    fn edge_adjacency() {
        let (nodes, elements) = two_triangles();
        let mesh = Mesh::new(nodes, elements).unwrap();

        assert_eq!(mesh.edges().count(), 5);
        assert_eq!(mesh.edge_between(3, 2).unwrap().elements.as_slice(), &[0, 1]);
        assert_eq!(mesh.edge_between(1, 2).unwrap().elements.as_slice(), &[0]);
        assert!(mesh.edge_between(1, 4).is_none());
        assert_eq!(mesh.order(), ElementOrder::First);
    }

    #[test]
    fn non_contiguous_ids() {
        let (mut nodes, elements) = two_triangles();
        nodes[2].id = 7;

        match Mesh::new(nodes, elements) {
            Err(ModelError::NonContiguousNodeIds { expected, found }) => {
                assert_eq!(expected, 3);
                assert_eq!(found, 7);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn mixed_orders_rejected() {
        let (mut nodes, mut elements) = two_triangles();
        nodes.push(Node::new(5, Point::new(0.5, 0.0)));
        nodes.push(Node::new(6, Point::new(0.5, 0.5)));
        elements[1] = Element::new(2, &[2, 4, 3, 5, 6, 1], 0);

        assert!(matches!(
            Mesh::new(nodes, elements),
            Err(ModelError::MixedElementOrders { element_id: 2, .. })
        ));
    }

    #[test]
    fn mixed_orders_report_both_orders() {
        let (mut nodes, mut elements) = two_triangles();
        nodes.push(Node::new(5, Point::new(0.5, 0.0)));
        nodes.push(Node::new(6, Point::new(0.5, 0.5)));
        nodes.push(Node::new(7, Point::new(0.0, 0.5)));
        elements[0] = Element::new(1, &[1, 2, 3, 5, 6, 7], 0);

        match Mesh::new(nodes, elements) {
            Err(ModelError::MixedElementOrders {
                element_id,
                expected,
                found,
            }) => {
                assert_eq!(element_id, 2);
                assert_eq!(expected, ElementOrder::Second);
                assert_eq!(found, ElementOrder::First);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn zero_area_element_rejected() {
        let (mut nodes, mut elements) = two_triangles();
        // a sliver along the bottom edge
        nodes.push(Node::new(5, Point::new(0.5, 0.0)));
        elements.push(Element::new(3, &[1, 5, 2], 0));

        assert!(matches!(
            Mesh::new(nodes, elements),
            Err(ModelError::DegenerateElement { element_id: 3 })
        ));
    }

    #[test]
    fn unsupported_node_count_rejected() {
        let (nodes, mut elements) = two_triangles();
        elements[0] = Element::new(1, &[1, 2, 3, 4], 0);

        assert!(matches!(
            Mesh::new(nodes, elements),
            Err(ModelError::UnsupportedNodeCount { element_id: 1, count: 4 })
        ));
    }

    #[test]
    fn unknown_node_rejected() {
        let (nodes, mut elements) = two_triangles();
        elements[1] = Element::new(2, &[2, 9, 3], 0);

        assert!(matches!(
            Mesh::new(nodes, elements),
            Err(ModelError::UnknownNode { node_id: 9, .. })
        ));
    }

    #[test]
    fn mesh_from_json() {
        let model_json = json::parse(
            r#"{
                "Nodes": [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
                "Elements": [
                    { "media": 0, "node_ids": [1, 2, 3] },
                    { "media": 0, "node_ids": [2, 4, 3] }
                ]
            }"#,
        )
        .unwrap();

        let mesh = Mesh::from_json(&model_json).unwrap();
        assert_eq!(mesh.num_nodes(), 4);
        assert_eq!(mesh.elements.len(), 2);
        assert!((mesh.point(4).x - 1.0).abs() < 1e-15);
    }

    #[test]
    fn malformed_json_nodes() {
        let model_json = json::parse(r#"{ "Nodes": [[0.0]], "Elements": [] }"#).unwrap();
        assert!(matches!(
            Mesh::from_json(&model_json),
            Err(ModelError::MalformedInput(_))
        ));
    }

    #[test]
    #[should_panic]
    fn point_of_missing_node() {
        let (nodes, elements) = two_triangles();
        let mesh = Mesh::new(nodes, elements).unwrap();
        let _ = mesh.point(5);
    }
}
