use super::mesh::{element::ElementOrder, parse_id_list, Mesh};
use super::ModelError;

use json::JsonValue;
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// The repeating lattice cell associated with a Port
#[derive(Debug, Clone, Default)]
pub struct PeriodicRegion {
    /// IDs of the Elements forming one period of the lattice
    pub element_ids: Vec<usize>,
    /// Node IDs on the first boundary of the period
    pub boundary_1: Vec<usize>,
    /// Node IDs on the second boundary of the period (same count as `boundary_1`)
    pub boundary_2: Vec<usize>,
    /// Nodes belonging to a locally perturbed (defect) cell
    pub defect_nodes: Vec<usize>,
}

impl PeriodicRegion {
    /// Length of one period: the distance between the centroids of the two boundaries
    pub fn period_length(&self, mesh: &Mesh) -> f64 {
        let c1 = super::Point::centroid(self.boundary_1.iter().map(|id| mesh.point(*id)));
        let c2 = super::Point::centroid(self.boundary_2.iter().map(|id| mesh.point(*id)));
        c1.dist(&c2)
    }

    fn validate(&self, port_idx: usize, mesh: &Mesh) -> Result<(), ModelError> {
        if self.boundary_1.len() != self.boundary_2.len() {
            return Err(ModelError::PeriodicBoundaryMismatch {
                port: port_idx,
                boundary_1: self.boundary_1.len(),
                boundary_2: self.boundary_2.len(),
            });
        }

        for node_id in self
            .boundary_1
            .iter()
            .chain(self.boundary_2.iter())
            .chain(self.defect_nodes.iter())
        {
            if !mesh.contains_node(*node_id) {
                return Err(ModelError::UnknownNode {
                    context: format!("periodic region of Port {}", port_idx),
                    node_id: *node_id,
                });
            }
        }

        for element_id in self.element_ids.iter() {
            if mesh.element_index(*element_id).is_none() {
                return Err(ModelError::UnknownElement {
                    port: port_idx,
                    element_id: *element_id,
                });
            }
        }

        Ok(())
    }

    fn from_json(periodic_json: &JsonValue, port_idx: usize) -> Result<Self, ModelError> {
        let list = |key: &str, required: bool| -> Result<Vec<usize>, ModelError> {
            if periodic_json[key].is_null() && !required {
                return Ok(Vec::new());
            }
            parse_id_list(&periodic_json[key]).ok_or_else(|| {
                ModelError::MalformedInput(format!(
                    "Port {}: periodic '{}' must be an Array of IDs!",
                    port_idx, key
                ))
            })
        };

        Ok(Self {
            element_ids: list("element_ids", false)?,
            boundary_1: list("boundary_1", true)?,
            boundary_2: list("boundary_2", true)?,
            defect_nodes: list("defect_node_ids", false)?,
        })
    }
}

/// An ordered list of boundary nodes where waves enter or leave the domain
#[derive(Debug, Clone)]
pub struct Port {
    /// Global node IDs tracing the port (ordered along the boundary)
    pub nodes: Vec<usize>,
    pub periodic: Option<PeriodicRegion>,
}

impl Port {
    pub fn new(nodes: Vec<usize>) -> Self {
        Self {
            nodes,
            periodic: None,
        }
    }

    pub fn with_periodic_region(mut self, region: PeriodicRegion) -> Self {
        self.periodic = Some(region);
        self
    }

    /// Split the port into line segments: node pairs (1st order) or [end, mid, end] triples (2nd order)
    pub fn segments(&self, order: ElementOrder) -> Vec<SmallVec<[usize; 3]>> {
        match order {
            ElementOrder::First => self
                .nodes
                .windows(2)
                .map(|pair| SmallVec::from_slice(pair))
                .collect(),
            ElementOrder::Second => (0..self.nodes.len().saturating_sub(1) / 2)
                .map(|k| SmallVec::from_slice(&self.nodes[2 * k..2 * k + 3]))
                .collect(),
        }
    }

    /// Port nodes which are not forced, in port order
    pub fn free_nodes(&self, forced: &ForceBoundarySet) -> Vec<usize> {
        self.nodes
            .iter()
            .copied()
            .filter(|id| !forced.contains(*id))
            .collect()
    }

    pub(crate) fn validate(
        &self,
        port_idx: usize,
        mesh: &Mesh,
        forced: &ForceBoundarySet,
    ) -> Result<(), ModelError> {
        let order = mesh.order();
        let n = self.nodes.len();
        let count_ok = match order {
            ElementOrder::First => n >= 2,
            ElementOrder::Second => n >= 3 && n % 2 == 1,
        };
        if !count_ok {
            return Err(ModelError::InvalidPortNodeCount {
                port: port_idx,
                count: n,
                order,
            });
        }

        for node_id in self.nodes.iter() {
            if !mesh.contains_node(*node_id) {
                return Err(ModelError::UnknownNode {
                    context: format!("Port {}", port_idx),
                    node_id: *node_id,
                });
            }
        }

        for segment in self.segments(order) {
            let (a, b) = (segment[0], segment[segment.len() - 1]);
            let mid = if segment.len() == 3 {
                Some(segment[1])
            } else {
                None
            };
            match mesh.edge_between(a, b) {
                Some(edge) if edge.mid == mid => (),
                _ => {
                    return Err(ModelError::PortEdgeNotInMesh {
                        port: port_idx,
                        nodes: segment.to_vec(),
                    })
                }
            }
        }

        if self.free_nodes(forced).is_empty() {
            return Err(ModelError::DegeneratePort { port: port_idx });
        }

        if let Some(region) = &self.periodic {
            region.validate(port_idx, mesh)?;
        }

        Ok(())
    }

    /// Parse a Port from JSON
    ///
    /// ```JSON
    /// {
    ///     "node_ids": [1, 2, 3],
    ///     "periodic": {
    ///         "element_ids": [1, 2],
    ///         "boundary_1": [1, 2, 3],
    ///         "boundary_2": [7, 8, 9],
    ///         "defect_node_ids": [2]
    ///     }
    /// }
    /// ```
    pub fn from_json(port_json: &JsonValue, port_idx: usize) -> Result<Self, ModelError> {
        let nodes = parse_id_list(&port_json["node_ids"]).ok_or_else(|| {
            ModelError::MalformedInput(format!(
                "Port {} must have an Array of node_ids!",
                port_idx
            ))
        })?;

        let periodic = if port_json["periodic"].is_null() {
            None
        } else {
            Some(PeriodicRegion::from_json(&port_json["periodic"], port_idx)?)
        };

        Ok(Self { nodes, periodic })
    }
}

/// Nodes subject to a forced (Dirichlet-zero) condition; they are excluded from the unknowns
#[derive(Debug, Clone, Default)]
pub struct ForceBoundarySet {
    nodes: BTreeSet<usize>,
}

impl ForceBoundarySet {
    pub fn new(nodes: impl IntoIterator<Item = usize>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn contains(&self, node_id: usize) -> bool {
        self.nodes.contains(&node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> + '_ {
        self.nodes.iter()
    }
}
