use super::port_eigen::PortModes;
use super::reorder::UnknownOrder;
use crate::linalg::band_matrix::BandMatrix;

use nalgebra::DMatrix;
use num_complex::Complex64;

/// Failures while injecting a port's modal boundary condition
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoundaryError {
    #[error("Port {port}: admittance block is asymmetric at ({row}, {col}) (relative asymmetry {asymmetry:e})")]
    AsymmetricAdmittance {
        port: usize,
        row: usize,
        col: usize,
        asymmetry: f64,
    },
    #[error("Port {port} has no retained mode to excite")]
    NoIncidentMode { port: usize },
    #[error("Port {port}: node {node_id} has no equation")]
    MissingEquation { port: usize, node_id: usize },
}

/// Modal admittance over a port's free nodes
///
/// `Y = Σₘ (j/c) βₘ|βₘ| (R vₘ)(R vₘ*)ᵀ` with `c = ω·μ₀` (TE) or `ω·ε₀` (TM)
pub fn admittance_block(modes: &PortModes) -> DMatrix<Complex64> {
    let n = modes.free_nodes.len();
    let mut block = DMatrix::from_element(n, n, Complex64::new(0.0, 0.0));

    for mode in modes.modes.iter() {
        let coefficient =
            Complex64::new(0.0, 1.0 / modes.admittance_constant) * mode.beta * mode.beta.norm();
        // R is real, so R v* = (R v)*
        let rv = modes.mass_times(&mode.vector);
        for i in 0..n {
            for j in 0..n {
                block[(i, j)] += coefficient * rv[i] * rv[j].conj();
            }
        }
    }

    block
}

/// Check that `block` is symmetric to within `tolerance` (relative to its largest entry)
pub fn check_symmetry(
    block: &DMatrix<Complex64>,
    tolerance: f64,
    port: usize,
) -> Result<(), BoundaryError> {
    let scale = block.iter().map(|v| v.norm()).fold(0.0, f64::max);
    if scale == 0.0 {
        return Ok(());
    }

    for row in 0..block.nrows() {
        for col in (row + 1)..block.ncols() {
            let asymmetry = (block[(row, col)] - block[(col, row)]).norm() / scale;
            if asymmetry > tolerance {
                return Err(BoundaryError::AsymmetricAdmittance {
                    port,
                    row,
                    col,
                    asymmetry,
                });
            }
        }
    }
    Ok(())
}

/// Merge a port's admittance into the global matrix and, for the incident port, add the
/// excitation `2jβ₀ (R v₀)` of its fundamental mode to the right-hand side
pub fn add_port_bc(
    modes: &PortModes,
    is_incident: bool,
    order: &UnknownOrder,
    symmetry_tolerance: f64,
    matrix: &mut BandMatrix,
    rhs: &mut [Complex64],
) -> Result<(), BoundaryError> {
    let equations = modes
        .free_nodes
        .iter()
        .map(|node_id| {
            order
                .equation_of(*node_id)
                .ok_or(BoundaryError::MissingEquation {
                    port: modes.port,
                    node_id: *node_id,
                })
        })
        .collect::<Result<Vec<usize>, _>>()?;

    let block = admittance_block(modes);
    check_symmetry(&block, symmetry_tolerance, modes.port)?;

    for (a, row) in equations.iter().enumerate() {
        for (b, col) in equations.iter().enumerate() {
            matrix.add(*row, *col, block[(a, b)]);
        }
    }

    if is_incident {
        let fundamental = modes
            .modes
            .first()
            .ok_or(BoundaryError::NoIncidentMode { port: modes.port })?;
        let excitation = Complex64::new(0.0, 2.0) * fundamental.beta;
        let rv = modes.mass_times(&fundamental.vector);
        for (a, row) in equations.iter().enumerate() {
            rhs[*row] += excitation * rv[a];
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem_problem::port_eigen::solve_port_eigen;
    use crate::fem_problem::reorder::{reorder_unknowns, BandMatrixPattern};
    use crate::linalg::nalgebra_eigen::NalgebraBandEigen;
    use crate::settings::SweepSettings;
    use crate::test_meshes::{waveguide_model, WaveguideSpec};
    use std::f64::consts::PI;

    fn port_modes(spec: &WaveguideSpec, max_modes: usize) -> PortModes {
        let model = waveguide_model(
            spec,
            SweepSettings {
                max_modes,
                ..Default::default()
            },
        );
        solve_port_eigen(&model, 0, 1.5 * PI, &NalgebraBandEigen).unwrap()
    }

    #[test]
    fn admittance_is_symmetric() {
        for spec in [
            WaveguideSpec::first_order(1, 10),
            WaveguideSpec::second_order(1, 4),
        ] {
            let modes = port_modes(&spec, 20);
            let block = admittance_block(&modes);

            assert_eq!(block.nrows(), modes.free_nodes.len());
            assert!(check_symmetry(&block, 1e-12, 0).is_ok());
        }
    }

    #[test]
    fn asymmetry_is_reported() {
        let mut block = DMatrix::from_element(2, 2, Complex64::new(1.0, 0.0));
        block[(0, 1)] = Complex64::new(1.0, 0.1);

        assert!(matches!(
            check_symmetry(&block, 1e-9, 3),
            Err(BoundaryError::AsymmetricAdmittance {
                port: 3,
                row: 0,
                col: 1,
                ..
            })
        ));
    }

    #[test]
    fn propagating_admittance_is_imaginary() {
        let modes = port_modes(&WaveguideSpec::first_order(1, 10), 1);
        let block = admittance_block(&modes);

        assert!(modes.modes[0].propagating);
        assert!(block.iter().all(|v| v.re.abs() < 1e-12 * v.norm().max(1e-300)));
    }

    #[test]
    fn incident_port_gets_excitation() {
        let model = waveguide_model(&WaveguideSpec::first_order(2, 4), SweepSettings::default());
        let pattern = BandMatrixPattern::build(&model.mesh, &model.ports, &model.forced);
        let order = reorder_unknowns(&pattern);
        let (kl, ku) = pattern.half_bandwidths(&order);
        let mut matrix = BandMatrix::new(order.len(), kl, ku);
        let mut rhs = vec![Complex64::new(0.0, 0.0); order.len()];

        for (port_idx, is_incident) in [(0, true), (1, false)] {
            let modes = solve_port_eigen(&model, port_idx, 1.5 * PI, &NalgebraBandEigen).unwrap();
            add_port_bc(&modes, is_incident, &order, 1e-9, &mut matrix, &mut rhs).unwrap();
        }

        // only the input port's free nodes (2, 3, 4) are excited
        for node_id in model.ports[0].free_nodes(&model.forced) {
            assert!(rhs[order.equation_of(node_id).unwrap()].norm() > 0.0);
        }
        for node_id in model.ports[1].free_nodes(&model.forced) {
            assert_eq!(rhs[order.equation_of(node_id).unwrap()].norm(), 0.0);
        }
        // the port block is full: opposite port nodes 2 and 4 are coupled
        let (a, b) = (order.equation_of(2).unwrap(), order.equation_of(4).unwrap());
        assert!(matrix.get(a, b).norm() > 0.0);
    }
}
