use smallvec::SmallVec;
use std::fmt;

/// Polynomial order of an element's Lagrange shape functions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementOrder {
    First,
    Second,
}

impl ElementOrder {
    /// Infer the order from the number of nodes on a triangle (3 or 6)
    pub fn from_triangle_node_count(count: usize) -> Option<Self> {
        match count {
            3 => Some(Self::First),
            6 => Some(Self::Second),
            _ => None,
        }
    }

    pub fn triangle_node_count(&self) -> usize {
        match self {
            Self::First => 3,
            Self::Second => 6,
        }
    }

    pub fn line_node_count(&self) -> usize {
        match self {
            Self::First => 2,
            Self::Second => 3,
        }
    }
}

impl fmt::Display for ElementOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::First => write!(f, "1st order"),
            Self::Second => write!(f, "2nd order"),
        }
    }
}

/// The geometric shape and order of an element; used to select its numerical kernel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Triangle { order: ElementOrder },
    Line { order: ElementOrder },
}

impl ElementKind {
    pub fn order(&self) -> ElementOrder {
        match self {
            Self::Triangle { order } | Self::Line { order } => *order,
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            Self::Triangle { order } => order.triangle_node_count(),
            Self::Line { order } => order.line_node_count(),
        }
    }
}

/*
    local node layout of a triangle

    1st order: [v0, v1, v2]
    2nd order: [v0, v1, v2, m01, m12, m20]

    edge 0 : v0 -> v1 (mid 3)
    edge 1 : v1 -> v2 (mid 4)
    edge 2 : v2 -> v0 (mid 5)
*/
const EDGE_VERTEX_DEFS: [[usize; 2]; 3] = [[0, 1], [1, 2], [2, 0]];

/// A triangular Element of the 2D mesh
///
/// Elements are pure data: an ID, their global node IDs (3 or 6, see the layout above) and the
/// index of the media that fills them.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: usize,
    pub nodes: SmallVec<[usize; 6]>,
    pub media: usize,
}

impl Element {
    pub fn new(id: usize, nodes: &[usize], media: usize) -> Self {
        Self {
            id,
            nodes: SmallVec::from_slice(nodes),
            media,
        }
    }

    /// The order implied by this Element's node count (`None` if the count isn't supported)
    pub fn order(&self) -> Option<ElementOrder> {
        ElementOrder::from_triangle_node_count(self.nodes.len())
    }

    pub fn kind(&self) -> Option<ElementKind> {
        self.order().map(|order| ElementKind::Triangle { order })
    }

    /// Global IDs of the three corner nodes
    pub fn vertices(&self) -> [usize; 3] {
        [self.nodes[0], self.nodes[1], self.nodes[2]]
    }

    /// The three edges as (corner node IDs, mid-node ID for 2nd order Elements)
    pub fn edges(&self) -> [([usize; 2], Option<usize>); 3] {
        let mut edges = [([0; 2], None); 3];
        for (edge_idx, [a, b]) in EDGE_VERTEX_DEFS.iter().enumerate() {
            let mid = if self.nodes.len() == 6 {
                Some(self.nodes[3 + edge_idx])
            } else {
                None
            };
            edges[edge_idx] = ([self.nodes[*a], self.nodes[*b]], mid);
        }
        edges
    }

    pub fn contains_node(&self, node_id: usize) -> bool {
        self.nodes.contains(&node_id)
    }
}
