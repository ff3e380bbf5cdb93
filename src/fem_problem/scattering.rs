use super::port_eigen::PortModes;
use super::reorder::UnknownOrder;

use num_complex::Complex64;

/// Modal coefficients of the solved field on one port
///
/// `s = (R v*)ᵀ φ |β| / c`, minus 1 for the incident fundamental mode so only the reflected wave remains.
pub fn scattering_coefficients(
    modes: &PortModes,
    is_incident: bool,
    order: &UnknownOrder,
    field: &[Complex64],
) -> Vec<Complex64> {
    let port_field: Vec<Complex64> = modes
        .free_nodes
        .iter()
        .map(|node_id| {
            order
                .equation_of(*node_id)
                .map_or(Complex64::new(0.0, 0.0), |eq| field[eq])
        })
        .collect();

    modes
        .modes
        .iter()
        .enumerate()
        .map(|(mode_idx, mode)| {
            let rv = modes.mass_times(&mode.vector);
            let projection: Complex64 = rv
                .iter()
                .zip(port_field.iter())
                .map(|(rv_i, phi_i)| rv_i.conj() * phi_i)
                .sum();
            let s = projection * (mode.beta.norm() / modes.admittance_constant);

            if is_incident && mode_idx == 0 {
                s - 1.0
            } else {
                s
            }
        })
        .collect()
}

/// `Σ |s|²` over the propagating modes of every port
pub fn total_outgoing_power<'a>(
    ports: impl Iterator<Item = (&'a PortModes, &'a [Complex64])>,
) -> f64 {
    ports
        .flat_map(|(modes, coefficients)| {
            modes
                .modes
                .iter()
                .zip(coefficients.iter())
                .filter(|(mode, _)| mode.propagating)
                .map(|(_, s)| s.norm_sqr())
        })
        .sum()
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

    #[test]
    fn incident_mode_alone_has_zero_reflection() {
        let model = waveguide_model(&WaveguideSpec::first_order(2, 6), SweepSettings::default());
        let order = reorder_unknowns(&BandMatrixPattern::build(
            &model.mesh,
            &model.ports,
            &model.forced,
        ));
        let modes = solve_port_eigen(&model, 0, 1.5 * PI, &NalgebraBandEigen).unwrap();

        // a field equal to the incident mode on the port
        let mut field = vec![Complex64::new(0.0, 0.0); order.len()];
        for (node_id, v) in modes.free_nodes.iter().zip(modes.modes[0].vector.iter()) {
            field[order.equation_of(*node_id).unwrap()] = *v;
        }

        let s = scattering_coefficients(&modes, true, &order, &field);
        assert!(s[0].norm() < 1e-10);
        for s_m in s.iter().skip(1) {
            assert!(s_m.norm() < 1e-10);
        }

        // seen from a non-incident port the same field is a unit outgoing wave
        let s_out = scattering_coefficients(&modes, false, &order, &field);
        assert!((s_out[0] - 1.0).norm() < 1e-10);
        let power = total_outgoing_power(std::iter::once((&modes, s_out.as_slice())));
        assert!((power - 1.0).abs() < 1e-10);
    }
}
