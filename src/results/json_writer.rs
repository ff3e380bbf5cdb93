use super::{FrequencyResult, ResultSink, SinkError};

use json::JsonValue;
use num_complex::Complex64;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes each result as one line of JSON
///
/// Complex values are stored as `[re, im]` pairs.
pub struct JsonLinesWriter<W: Write> {
    writer: W,
}

impl JsonLinesWriter<BufWriter<File>> {
    /// Append to (or create) a `.jsonl` file
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonLinesWriter<W> {
    fn persist(&mut self, result: &FrequencyResult) -> Result<(), SinkError> {
        writeln!(self.writer, "{}", result_to_json(result).dump())?;
        self.writer.flush()?;
        Ok(())
    }
}

fn complex(value: Complex64) -> JsonValue {
    json::array![value.re, value.im]
}

fn complex_list(values: &[Complex64]) -> JsonValue {
    JsonValue::Array(values.iter().map(|v| complex(*v)).collect())
}

fn result_to_json(result: &FrequencyResult) -> JsonValue {
    let ports: Vec<JsonValue> = result
        .ports
        .iter()
        .map(|port| {
            let modes: Vec<JsonValue> = port
                .modes
                .iter()
                .map(|mode| {
                    json::object! {
                        eigenvalue: mode.eigenvalue,
                        beta: complex(mode.beta),
                        propagating: mode.propagating,
                        scattering: complex(mode.scattering),
                        normalized_beta: mode.normalized_beta.map_or(JsonValue::Null, complex),
                        defect_confinement: mode.defect_confinement,
                        eigenvector: complex_list(&mode.eigenvector),
                    }
                })
                .collect();

            json::object! {
                port: port.port,
                boundary_nodes: port.boundary_nodes.clone(),
                modes: modes,
            }
        })
        .collect();

    json::object! {
        frequency_index: result.frequency_index,
        normalized_frequency: result.normalized_frequency,
        wavelength: result.wavelength,
        max_modes: result.max_modes,
        total_power: result.total_power,
        field: complex_list(&result.field),
        ports: ports,
    }
}
