/// Fixed-layout binary records with an offset index
pub mod binary_writer;
/// One JSON object per frequency
#[cfg(feature = "json_export")]
pub mod json_writer;

use crate::domain::{
    fields::{FieldError, FieldSpace},
    Model,
};

use num_complex::Complex64;

/// Failures of a [ResultSink]
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error while persisting results: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt result record: {0}")]
    Corrupt(String),
    #[error("result {index} requested but only {len} are stored")]
    IndexOutOfRange { index: usize, len: usize },
}

/// One retained eigenmode of a port along with its scattering coefficient
#[derive(Clone, Debug, PartialEq)]
pub struct ModeResult {
    /// `β²`
    pub eigenvalue: f64,
    pub beta: Complex64,
    pub propagating: bool,
    /// Reflection (incident port) or transmission coefficient into this mode
    pub scattering: Complex64,
    /// Mode shape over the port's free nodes
    pub eigenvector: Vec<Complex64>,
    /// `β·d / 2π` (ports with a periodic region)
    pub normalized_beta: Option<Complex64>,
    /// Share of the modal norm on defect nodes (ports with defect nodes)
    pub defect_confinement: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PortResult {
    pub port: usize,
    /// Free port nodes indexing each mode's eigenvector
    pub boundary_nodes: Vec<usize>,
    /// Retained modes, fundamental first
    pub modes: Vec<ModeResult>,
}

impl PortResult {
    pub fn scattering(&self) -> impl Iterator<Item = Complex64> + '_ {
        self.modes.iter().map(|mode| mode.scattering)
    }
}

/// Everything computed for one frequency of a sweep
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyResult {
    pub frequency_index: usize,
    pub normalized_frequency: f64,
    pub wavelength: f64,
    pub max_modes: usize,
    /// Nodal field indexed by node ID - 1 (zero on forced nodes)
    pub field: Vec<Complex64>,
    pub ports: Vec<PortResult>,
    /// `Σ |s|²` over all propagating modes of all ports
    pub total_power: f64,
}

impl FrequencyResult {
    /// Scattering coefficient of a port's mode
    pub fn scattering(&self, port: usize, mode: usize) -> Option<Complex64> {
        self.ports
            .get(port)
            .and_then(|p| p.modes.get(mode))
            .map(|m| m.scattering)
    }

    /// Attach the solved field to the elements of the Model it was computed on
    pub fn field_space<'m>(&self, model: &'m Model) -> Result<FieldSpace<'m>, FieldError> {
        FieldSpace::new(model, self.field.clone())
    }
}

/// Append-only destination for per-frequency results
pub trait ResultSink {
    fn persist(&mut self, result: &FrequencyResult) -> Result<(), SinkError>;
}

impl ResultSink for Vec<FrequencyResult> {
    fn persist(&mut self, result: &FrequencyResult) -> Result<(), SinkError> {
        self.push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_result(frequency_index: usize) -> FrequencyResult {
        FrequencyResult {
            frequency_index,
            normalized_frequency: 0.3 + 0.01 * frequency_index as f64,
            wavelength: 1.0 / (0.3 + 0.01 * frequency_index as f64),
            max_modes: 2,
            field: vec![
                Complex64::new(0.0, 0.0),
                Complex64::new(0.5, -0.25),
                Complex64::new(0.0, 0.0),
            ],
            ports: vec![
                PortResult {
                    port: 0,
                    boundary_nodes: vec![2],
                    modes: vec![
                        ModeResult {
                            eigenvalue: 12.5,
                            beta: Complex64::new(12.5f64.sqrt(), 0.0),
                            propagating: true,
                            scattering: Complex64::new(0.01, -0.02),
                            eigenvector: vec![Complex64::new(1.5, 0.0)],
                            normalized_beta: Some(Complex64::new(0.2, 0.0)),
                            defect_confinement: Some(0.75),
                        },
                        ModeResult {
                            eigenvalue: -4.0,
                            beta: Complex64::new(0.0, -2.0),
                            propagating: false,
                            scattering: Complex64::new(1e-4, 0.0),
                            eigenvector: vec![Complex64::new(0.3, 0.0)],
                            normalized_beta: None,
                            defect_confinement: None,
                        },
                    ],
                },
                PortResult {
                    port: 1,
                    boundary_nodes: vec![],
                    modes: vec![],
                },
            ],
            total_power: 0.9995,
        }
    }

    #[test]
    fn in_memory_sink() {
        let mut sink: Vec<FrequencyResult> = Vec::new();
        sink.persist(&sample_result(0)).unwrap();
        sink.persist(&sample_result(1)).unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink[1].frequency_index, 1);
        assert_eq!(sink[0].scattering(0, 1), Some(Complex64::new(1e-4, 0.0)));
        assert_eq!(sink[0].scattering(1, 0), None);
    }
}
