use super::kernels::kernel_for;
use super::reorder::UnknownOrder;
use crate::domain::Model;
use crate::linalg::band_matrix::BandMatrix;

use num_complex::Complex64;

/// Failures while assembling the global system
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssemblyError {
    #[error("Element {element_id} has an unsupported node count ({count})")]
    UnsupportedElement { element_id: usize, count: usize },
    #[error("the matrix buffer has dimension {matrix} but there are {unknowns} unknowns")]
    DimensionMismatch { matrix: usize, unknowns: usize },
}

/// Assemble `∫ ∇Nᵢᵀ A ∇Nⱼ - k₀² Q_zz ∫ NᵢNⱼ` over every Element into the (zeroed) band buffer
///
/// Rows and columns of forced nodes are skipped entirely.
pub fn assemble_helmholtz(
    model: &Model,
    order: &UnknownOrder,
    wavenumber: f64,
    matrix: &mut BandMatrix,
) -> Result<(), AssemblyError> {
    if matrix.dimension() != order.len() {
        return Err(AssemblyError::DimensionMismatch {
            matrix: matrix.dimension(),
            unknowns: order.len(),
        });
    }
    matrix.zero();

    let k0_sq = wavenumber * wavenumber;

    for element in model.mesh.elements.iter() {
        let kind = element.kind().ok_or(AssemblyError::UnsupportedElement {
            element_id: element.id,
            count: element.nodes.len(),
        })?;
        let media = model.media_info(element.media);
        let points = model.mesh.element_points(element);

        let local = kernel_for(kind).local_matrices(&points, &media.curl_tensor());
        let q_zz = media.q_zz();

        for (i, node_i) in element.nodes.iter().enumerate() {
            if let Some(row) = order.equation_of(*node_i) {
                for (j, node_j) in element.nodes.iter().enumerate() {
                    if let Some(col) = order.equation_of(*node_j) {
                        let value = local.stiffness[(i, j)] - k0_sq * q_zz * local.mass[(i, j)];
                        matrix.add(row, col, Complex64::new(value, 0.0));
                    }
                }
            }
        }
    }

    Ok(())
}
