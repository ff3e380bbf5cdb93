use super::{ElementOrder, Model};
use crate::fem_problem::kernels::kernel_for;

use num_complex::Complex64;
use smallvec::SmallVec;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;

/// Failures while attaching a nodal field to a Model
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("field has {values} values but the mesh has {nodes} nodes")]
    LengthMismatch { values: usize, nodes: usize },
    #[error("Element {element_id} has an unsupported node count ({count})")]
    UnsupportedElement { element_id: usize, count: usize },
}

/// Solved values on one triangle and the rotational field derived from them
#[derive(Clone, Debug)]
pub struct ElementField {
    pub element_id: usize,
    /// Nodal values in the Element's local node order
    pub values: SmallVec<[Complex64; 6]>,
    /// `(∂φ/∂y, -∂φ/∂x)` at each of the Element's nodes
    pub rotational: SmallVec<[[Complex64; 2]; 6]>,
}

impl ElementField {
    /// Average of the rotational field over the Element's nodes
    pub fn mean_rotational(&self) -> [Complex64; 2] {
        let n = self.rotational.len() as f64;
        let sum = self
            .rotational
            .iter()
            .fold([Complex64::new(0.0, 0.0); 2], |acc, r| {
                [acc[0] + r[0], acc[1] + r[1]]
            });
        [sum[0] / n, sum[1] / n]
    }
}

/// A solved nodal field attached to every Element of a [Model]
///
/// Rebuilt from each result; derived quantities are never stored independently of the nodal values.
pub struct FieldSpace<'m> {
    model: &'m Model,
    nodal_values: Vec<Complex64>,
    elements: Vec<ElementField>,
}

impl<'m> FieldSpace<'m> {
    /// Attach `nodal_values` (indexed by node ID - 1) to the Model's Elements
    pub fn new(model: &'m Model, nodal_values: Vec<Complex64>) -> Result<Self, FieldError> {
        if nodal_values.len() != model.mesh.num_nodes() {
            return Err(FieldError::LengthMismatch {
                values: nodal_values.len(),
                nodes: model.mesh.num_nodes(),
            });
        }

        let elements = model
            .mesh
            .elements
            .iter()
            .map(|element| {
                let kernel = kernel_for(element.kind().ok_or(FieldError::UnsupportedElement {
                    element_id: element.id,
                    count: element.nodes.len(),
                })?);
                let points = model.mesh.element_points(element);
                let values: SmallVec<[Complex64; 6]> = element
                    .nodes
                    .iter()
                    .map(|id| nodal_values[id - 1])
                    .collect();

                let rotational = kernel
                    .node_coordinates()
                    .iter()
                    .map(|local| {
                        let grad = kernel
                            .shape_gradients(&points, local)
                            .iter()
                            .zip(values.iter())
                            .fold([Complex64::new(0.0, 0.0); 2], |acc, (g, v)| {
                                [acc[0] + v * g[0], acc[1] + v * g[1]]
                            });
                        [grad[1], -grad[0]]
                    })
                    .collect();

                Ok(ElementField {
                    element_id: element.id,
                    values,
                    rotational,
                })
            })
            .collect::<Result<Vec<_>, FieldError>>()?;

        Ok(Self {
            model,
            nodal_values,
            elements,
        })
    }

    pub fn elements(&self) -> &[ElementField] {
        &self.elements
    }

    pub fn nodal_values(&self) -> &[Complex64] {
        &self.nodal_values
    }

    /// Create a legacy VTK file with the field's magnitude, real and imaginary parts (per node) and
    /// its element-averaged rotational field (per cell)
    ///
    /// These files can be plotted using [Visit](https://wci.llnl.gov/simulation/computer-codes/visit) or ParaView
    pub fn print_to_vtk(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let output_file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(&output_file);
        let mesh = &self.model.mesh;

        // header
        writeln!(writer, "# vtk DataFile Version 3.0")?;
        writeln!(
            writer,
            "pcwg_fem field (generated at {}s since the UNIX epoch)",
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        )?;
        writeln!(writer, "ASCII")?;
        writeln!(writer, "DATASET UNSTRUCTURED_GRID")?;

        // points
        writeln!(writer, "\nPOINTS {} double", mesh.num_nodes())?;
        for node in mesh.nodes.iter() {
            writeln!(writer, "{:.10} {:.10} 0.0", node.coords.x, node.coords.y)?;
        }

        // cells
        let (nodes_per_cell, cell_type) = match mesh.order() {
            ElementOrder::First => (3, 5),
            ElementOrder::Second => (6, 22),
        };
        let num_cells = mesh.elements.len();
        writeln!(
            writer,
            "\nCELLS {} {}",
            num_cells,
            (nodes_per_cell + 1) * num_cells
        )?;
        for element in mesh.elements.iter() {
            write!(writer, "{}", nodes_per_cell)?;
            for id in element.nodes.iter() {
                write!(writer, "\t{}", id - 1)?;
            }
            writeln!(writer)?;
        }

        writeln!(writer, "\nCELL_TYPES {}", num_cells)?;
        for _ in 0..num_cells {
            write!(writer, " {}", cell_type)?;
        }
        writeln!(writer)?;

        // nodal quantities
        writeln!(writer, "\nPOINT_DATA {}", mesh.num_nodes())?;
        let quantities: [(&str, fn(Complex64) -> f64); 3] = [
            ("magnitude", |v| v.norm()),
            ("real", |v| v.re),
            ("imag", |v| v.im),
        ];
        for (name, quantity) in quantities {
            writeln!(writer, "SCALARS {} double 1\nLOOKUP_TABLE default", name)?;
            for value in self.nodal_values.iter() {
                write!(writer, "{:.15} ", quantity(*value))?;
            }
            writeln!(writer)?;
        }

        // rotational field
        writeln!(writer, "\nCELL_DATA {}", num_cells)?;
        let parts: [(&str, fn(Complex64) -> f64); 2] =
            [("rotational_real", |v| v.re), ("rotational_imag", |v| v.im)];
        for (name, part) in parts {
            writeln!(writer, "VECTORS {} double", name)?;
            for element in self.elements.iter() {
                let [rx, ry] = element.mean_rotational();
                writeln!(writer, "{:.15} {:.15} 0.0", part(rx), part(ry))?;
            }
        }

        Ok(())
    }
}
