/// Solved nodal fields and the rotational quantities derived from them
pub mod fields;
/// Material tensors and their Helmholtz coefficients
pub mod media;
/// The triangulated cross-section
pub mod mesh;
/// Ports, periodic regions and forced boundaries
pub mod port;

pub use mesh::element::{Element, ElementKind, ElementOrder};
pub use mesh::node::{Node, Point};
pub use mesh::Mesh;

use media::{Material, MediaInfo};
use port::{ForceBoundarySet, Port};

use crate::settings::SweepSettings;

use json::JsonValue;
use std::path::Path;

/// Input validation errors
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("the mesh has no nodes or no elements")]
    EmptyMesh,
    #[error("node IDs must form the range 1..=N in order; expected {expected}, found {found}")]
    NonContiguousNodeIds { expected: usize, found: usize },
    #[error("Element {element_id} has {count} nodes; only 3 (1st order) or 6 (2nd order) are supported")]
    UnsupportedNodeCount { element_id: usize, count: usize },
    #[error("Element {element_id} is {found} while the mesh is {expected}")]
    MixedElementOrders {
        element_id: usize,
        expected: ElementOrder,
        found: ElementOrder,
    },
    #[error("Element {element_id} has zero area")]
    DegenerateElement { element_id: usize },
    #[error("{context} references unknown Node {node_id}")]
    UnknownNode { context: String, node_id: usize },
    #[error("Element {element_id} references unknown media {media}")]
    UnknownMedia { element_id: usize, media: usize },
    #[error("media {media} has a singular tensor; cannot derive its Helmholtz coefficients")]
    SingularMaterialTensor { media: usize },
    #[error("the model must have at least one Port")]
    NoPorts,
    #[error("incident port {incident} is out of range ({num_ports} ports)")]
    IncidentPortOutOfRange { incident: usize, num_ports: usize },
    #[error("Port {port} has {count} nodes, which is invalid for a {order} mesh")]
    InvalidPortNodeCount {
        port: usize,
        count: usize,
        order: ElementOrder,
    },
    #[error("Port {port}: segment {nodes:?} is not an edge of the mesh")]
    PortEdgeNotInMesh { port: usize, nodes: Vec<usize> },
    #[error("Port {port}: periodic boundaries have {boundary_1} and {boundary_2} nodes")]
    PeriodicBoundaryMismatch {
        port: usize,
        boundary_1: usize,
        boundary_2: usize,
    },
    #[error("Port {port}: every node is forced; no eigenproblem can be built")]
    DegeneratePort { port: usize },
    #[error("Port {port}: periodic region references unknown Element {element_id}")]
    UnknownElement { port: usize, element_id: usize },
    #[error("invalid sweep settings: {0}")]
    InvalidSettings(String),
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),
}

/// A complete, validated description of the analysed structure
///
/// Read-only for the duration of a sweep.
#[derive(Debug, Clone)]
pub struct Model {
    pub mesh: Mesh,
    pub forced: ForceBoundarySet,
    pub ports: Vec<Port>,
    /// Index of the Port which carries the incident (excitation) mode
    pub incident_port: usize,
    media: Vec<Material>,
    settings: SweepSettings,
    // Helmholtz coefficients of each media for `settings.wave_mode`; rebuilt by `with_settings`
    media_info: Vec<MediaInfo>,
}

impl Model {
    pub fn new(
        mesh: Mesh,
        media: Vec<Material>,
        forced: ForceBoundarySet,
        ports: Vec<Port>,
        incident_port: usize,
        settings: SweepSettings,
    ) -> Result<Self, ModelError> {
        settings.validate()?;

        let media_info = derive_media_info(&media, &settings)?;

        for element in mesh.elements.iter() {
            if element.media >= media.len() {
                return Err(ModelError::UnknownMedia {
                    element_id: element.id,
                    media: element.media,
                });
            }
        }

        for node_id in forced.iter() {
            if !mesh.contains_node(*node_id) {
                return Err(ModelError::UnknownNode {
                    context: "forced boundary".to_string(),
                    node_id: *node_id,
                });
            }
        }

        if ports.is_empty() {
            return Err(ModelError::NoPorts);
        }
        if incident_port >= ports.len() {
            return Err(ModelError::IncidentPortOutOfRange {
                incident: incident_port,
                num_ports: ports.len(),
            });
        }
        for (port_idx, port) in ports.iter().enumerate() {
            port.validate(port_idx, &mesh, &forced)?;
        }

        Ok(Self {
            mesh,
            media,
            forced,
            ports,
            incident_port,
            settings,
            media_info,
        })
    }

    /// Replace the sweep settings, re-deriving the Helmholtz coefficients of each media
    pub fn with_settings(mut self, settings: SweepSettings) -> Result<Self, ModelError> {
        settings.validate()?;
        self.media_info = derive_media_info(&self.media, &settings)?;
        self.settings = settings;
        Ok(self)
    }

    pub fn media(&self) -> &[Material] {
        &self.media
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// Helmholtz coefficients (P, Q) of a media index for the configured wave mode
    pub fn media_info(&self, media: usize) -> &MediaInfo {
        &self.media_info[media]
    }

    /// Number of nodes which are not forced
    pub fn num_unknowns(&self) -> usize {
        self.mesh.num_nodes() - self.forced.len()
    }

    /// Load and validate a Model from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let model_file_contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&model_file_contents)
    }

    /// Load and validate a Model from a JSON string
    ///
    /// ```JSON
    /// {
    ///     "Nodes": [[0.0, 0.0], [1.0, 0.0], ...],
    ///     "Elements": [{ "media": 0, "node_ids": [1, 2, 3] }, ...],
    ///     "Media": [{ "eps": 1.0, "mu": 1.0 }],
    ///     "ForcedNodes": [1, 2],
    ///     "Ports": [{ "node_ids": [1, 4, 7] }, ...],
    ///     "IncidentPort": 0,
    ///     "Settings": { "first_frequency": 0.2, "last_frequency": 0.4, "frequency_count": 20 }
    /// }
    /// ```
    pub fn from_json_str(model_json: &str) -> Result<Self, ModelError> {
        let model_json = json::parse(model_json)
            .map_err(|err| ModelError::MalformedInput(format!("invalid JSON: {}", err)))?;

        let mesh = Mesh::from_json(&model_json)?;
        let media = parse_media_information(&model_json)?;

        let forced = if model_json["ForcedNodes"].is_null() {
            ForceBoundarySet::default()
        } else {
            ForceBoundarySet::new(mesh::parse_id_list(&model_json["ForcedNodes"]).ok_or_else(
                || ModelError::MalformedInput("ForcedNodes must be an Array of IDs!".to_string()),
            )?)
        };

        if !model_json["Ports"].is_array() {
            return Err(ModelError::MalformedInput(
                "Ports must be an Array!".to_string(),
            ));
        }
        let ports = model_json["Ports"]
            .members()
            .enumerate()
            .map(|(idx, port_json)| Port::from_json(port_json, idx))
            .collect::<Result<Vec<_>, _>>()?;

        let incident_port = match &model_json["IncidentPort"] {
            JsonValue::Null => 0,
            value => value.as_usize().ok_or_else(|| {
                ModelError::MalformedInput(
                    "IncidentPort must be a non-negative integer!".to_string(),
                )
            })?,
        };

        let settings = SweepSettings::from_json(&model_json["Settings"])?;

        Self::new(mesh, media, forced, ports, incident_port, settings)
    }
}

fn derive_media_info(
    media: &[Material],
    settings: &SweepSettings,
) -> Result<Vec<MediaInfo>, ModelError> {
    media
        .iter()
        .enumerate()
        .map(|(idx, material)| {
            MediaInfo::for_wave_mode(material, settings.wave_mode)
                .ok_or(ModelError::SingularMaterialTensor { media: idx })
        })
        .collect()
}

fn parse_media_information(model_json: &JsonValue) -> Result<Vec<Material>, ModelError> {
    if model_json["Media"].is_null() {
        return Ok(vec![Material::default()]);
    }
    if !model_json["Media"].is_array() {
        return Err(ModelError::MalformedInput(
            "Media must be an Array!".to_string(),
        ));
    }

    model_json["Media"]
        .members()
        .enumerate()
        .map(|(idx, media_json)| Material::from_json(media_json, idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::WaveMode;
    use crate::test_meshes::{straight_waveguide, WaveguideSpec};

    #[test]
    fn load_model_file() {
        let model = Model::from_file("./test_input/straight_waveguide.json").unwrap();

        assert_eq!(model.mesh.num_nodes(), 9);
        assert_eq!(model.mesh.elements.len(), 8);
        assert_eq!(model.ports.len(), 2);
        assert_eq!(model.incident_port, 0);
        assert_eq!(model.forced.len(), 6);
        assert_eq!(model.num_unknowns(), 3);
        assert_eq!(model.settings().frequency_count, 4);
    }

    #[test]
    fn replacing_settings_rederives_media() {
        let mut parts = straight_waveguide(&WaveguideSpec::first_order(2, 2));
        parts.media = vec![Material::isotropic(4.0, 2.0)];
        let model = parts.build().unwrap();
        assert!((model.media_info(0).q_zz() - 4.0).abs() < 1e-15);

        let model = model
            .with_settings(SweepSettings {
                wave_mode: WaveMode::TM,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(model.settings().wave_mode, WaveMode::TM);
        assert_eq!(model.media()[0], Material::isotropic(4.0, 2.0));
        assert!((model.media_info(0).q_zz() - 2.0).abs() < 1e-15);
        assert!((model.media_info(0).curl_tensor()[(0, 0)] - 0.25).abs() < 1e-15);
    }

    #[test]
    fn mixed_order_model_file() {
        assert!(matches!(
            Model::from_file("./test_input/mixed_order.json"),
            Err(ModelError::MixedElementOrders { element_id: 2, .. })
        ));
    }

    #[test]
    fn missing_model_file() {
        assert!(matches!(
            Model::from_file("./test_input/does_not_exist.json"),
            Err(ModelError::Io(_))
        ));
    }

    #[test]
    fn invalid_json() {
        assert!(matches!(
            Model::from_json_str("{ \"Nodes\": [ "),
            Err(ModelError::MalformedInput(_))
        ));
    }

    #[test]
    fn all_forced_port_is_rejected() {
        let mut parts = straight_waveguide(&WaveguideSpec::first_order(4, 4));
        // force the whole input port
        let port_nodes = parts.ports[0].nodes.clone();
        parts.forced = ForceBoundarySet::new(parts.forced.iter().copied().chain(port_nodes));

        assert!(matches!(
            parts.build(),
            Err(ModelError::DegeneratePort { port: 0 })
        ));
    }

    #[test]
    fn incident_port_out_of_range() {
        let mut parts = straight_waveguide(&WaveguideSpec::first_order(2, 2));
        parts.incident_port = 2;

        assert!(matches!(
            parts.build(),
            Err(ModelError::IncidentPortOutOfRange {
                incident: 2,
                num_ports: 2
            })
        ));
    }

    #[test]
    fn unknown_media_is_rejected() {
        let mut parts = straight_waveguide(&WaveguideSpec::first_order(2, 2));
        parts.mesh.elements[3].media = 5;

        assert!(matches!(
            parts.build(),
            Err(ModelError::UnknownMedia { media: 5, .. })
        ));
    }

    #[test]
    fn singular_tensor_is_rejected() {
        let mut parts = straight_waveguide(&WaveguideSpec::first_order(2, 2));
        parts.media[0].mu_rel[(2, 2)] = 0.0;

        assert!(matches!(
            parts.build(),
            Err(ModelError::SingularMaterialTensor { media: 0 })
        ));
    }

    #[test]
    fn port_off_the_boundary_edges() {
        let mut parts = straight_waveguide(&WaveguideSpec::first_order(2, 2));
        // nodes 1 and 9 are opposite corners; no edge joins them
        parts.ports[0].nodes = vec![1, 9];

        assert!(matches!(
            parts.build(),
            Err(ModelError::PortEdgeNotInMesh { port: 0, .. })
        ));
    }

    #[test]
    fn even_second_order_port_is_rejected() {
        let mut parts = straight_waveguide(&WaveguideSpec::second_order(1, 1));
        parts.ports[0].nodes.pop();

        assert!(matches!(
            parts.build(),
            Err(ModelError::InvalidPortNodeCount { port: 0, count: 2, .. })
        ));
    }

    #[test]
    fn periodic_boundary_mismatch() {
        let mut parts = straight_waveguide(&WaveguideSpec::first_order(2, 2));
        parts.ports[0].periodic = Some(port::PeriodicRegion {
            element_ids: vec![1, 2],
            boundary_1: vec![1, 2, 3],
            boundary_2: vec![4, 5],
            defect_nodes: Vec::new(),
        });

        assert!(matches!(
            parts.build(),
            Err(ModelError::PeriodicBoundaryMismatch {
                port: 0,
                boundary_1: 3,
                boundary_2: 2
            })
        ));
    }
}
