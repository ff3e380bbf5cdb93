//! Structured straight-waveguide meshes shared by the unit tests

use crate::domain::{
    media::Material,
    port::{ForceBoundarySet, Port},
    Element, ElementOrder, Mesh, Model, ModelError, Node, Point,
};
use crate::settings::SweepSettings;

/// A rectangular waveguide `[0, length] x [0, width]` with PEC walls at `y = 0` and `y = width`
/// and ports at `x = 0` (incident) and `x = length`
pub struct WaveguideSpec {
    pub cells_x: usize,
    pub cells_y: usize,
    pub length: f64,
    pub width: f64,
    pub order: ElementOrder,
}

impl WaveguideSpec {
    pub fn first_order(cells_x: usize, cells_y: usize) -> Self {
        Self {
            cells_x,
            cells_y,
            length: 1.0,
            width: 1.0,
            order: ElementOrder::First,
        }
    }

    pub fn second_order(cells_x: usize, cells_y: usize) -> Self {
        Self {
            order: ElementOrder::Second,
            ..Self::first_order(cells_x, cells_y)
        }
    }
}

/// The pieces of a Model, kept separate so tests can tamper with them before validation
pub struct ModelParts {
    pub mesh: Mesh,
    pub media: Vec<Material>,
    pub forced: ForceBoundarySet,
    pub ports: Vec<Port>,
    pub incident_port: usize,
    pub settings: SweepSettings,
}

impl ModelParts {
    pub fn build(self) -> Result<Model, ModelError> {
        Model::new(
            self.mesh,
            self.media,
            self.forced,
            self.ports,
            self.incident_port,
            self.settings,
        )
    }
}

/// Nodes are numbered column by column (`id = i * rows + j + 1`) so each port is a contiguous run of IDs
pub fn straight_waveguide(spec: &WaveguideSpec) -> ModelParts {
    let sub = match spec.order {
        ElementOrder::First => 1,
        ElementOrder::Second => 2,
    };
    let cols = spec.cells_x * sub + 1;
    let rows = spec.cells_y * sub + 1;
    let id = |i: usize, j: usize| i * rows + j + 1;

    let dx = spec.length / (cols - 1) as f64;
    let dy = spec.width / (rows - 1) as f64;

    let mut nodes = Vec::with_capacity(cols * rows);
    for i in 0..cols {
        for j in 0..rows {
            nodes.push(Node::new(id(i, j), Point::new(i as f64 * dx, j as f64 * dy)));
        }
    }

    let mut elements = Vec::new();
    for cx in 0..spec.cells_x {
        for cy in 0..spec.cells_y {
            let (i, j) = (cx * sub, cy * sub);
            let (a, b, c, d) = ((i, j), (i + sub, j), (i + sub, j + sub), (i, j + sub));

            for tri in [[a, b, c], [a, c, d]] {
                let mut element_nodes: Vec<usize> = tri.iter().map(|&(x, y)| id(x, y)).collect();
                if sub == 2 {
                    for k in 0..3 {
                        let (p, q) = (tri[k], tri[(k + 1) % 3]);
                        element_nodes.push(id((p.0 + q.0) / 2, (p.1 + q.1) / 2));
                    }
                }
                elements.push(Element::new(elements.len() + 1, &element_nodes, 0));
            }
        }
    }

    let forced = ForceBoundarySet::new((0..cols).flat_map(|i| [id(i, 0), id(i, rows - 1)]));
    let ports = vec![
        Port::new((0..rows).map(|j| id(0, j)).collect()),
        Port::new((0..rows).map(|j| id(cols - 1, j)).collect()),
    ];

    ModelParts {
        mesh: Mesh::new(nodes, elements).expect("structured waveguide mesh should be valid"),
        media: vec![Material::default()],
        forced,
        ports,
        incident_port: 0,
        settings: SweepSettings::default(),
    }
}

/// A validated straight waveguide solved at the given normalized frequencies (`reference_length = width`)
pub fn waveguide_model(spec: &WaveguideSpec, settings: SweepSettings) -> Model {
    let mut parts = straight_waveguide(spec);
    parts.settings = SweepSettings {
        reference_length: spec.width,
        ..settings
    };
    parts.build().expect("straight waveguide model should be valid")
}
