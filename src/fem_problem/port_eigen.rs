use super::kernels::{kernel_for, ElementKind, LineFrame};
use crate::domain::{media::C_0, ElementOrder, Model, Point};
use crate::linalg::{band_matrix::SymBandMatrix, BandEigenSolver, EigenDecomposition, LinalgError};

use num_complex::Complex64;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::f64::consts::PI;

// relative magnitude difference below which two entries compete equally for the phase reference
const PHASE_TIE_TOLERANCE: f64 = 1e-12;

/// Failures while solving a port's eigenmodes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortEigenError {
    #[error("Port {port}: every node is forced; no eigenproblem can be built")]
    DegeneratePort { port: usize },
    #[error("Port {port}: segment {nodes:?} is not an edge of the mesh")]
    SegmentNotInMesh { port: usize, nodes: Vec<usize> },
    #[error("Port {port}: mode {mode} sits exactly at cutoff (β = 0); cannot normalize it")]
    CutoffMode { port: usize, mode: usize },
    #[error("Port {port}: eigensolver failed: {source}")]
    Eigensolver { port: usize, source: LinalgError },
}

/// A 1D element along a port; media is inherited from the neighbouring triangle
#[derive(Clone, Debug, PartialEq)]
pub struct LineElement {
    /// Global node IDs: `[start, end]` or `[start, mid, end]`
    pub nodes: SmallVec<[usize; 3]>,
    pub media: usize,
    pub order: ElementOrder,
}

/// One retained eigenmode of a port
#[derive(Clone, Debug)]
pub struct PortMode {
    /// Eigenvalue `β²` as returned by the eigensolver
    pub eigenvalue: f64,
    /// Propagation constant (`Im(β) <= 0`)
    pub beta: Complex64,
    /// Mode shape over the port's free nodes, power normalized and phase aligned
    pub vector: Vec<Complex64>,
    pub propagating: bool,
    /// `β·d / 2π` for ports with a periodic region of period `d`
    pub normalized_beta: Option<Complex64>,
    /// Share of the modal norm carried by the defect nodes (ports with defect nodes only)
    pub defect_confinement: Option<f64>,
}

/// The eigenmodes of one port at one frequency
#[derive(Clone, Debug)]
pub struct PortModes {
    pub port: usize,
    /// Free (non-forced) port nodes in port order; indexes the mode vectors
    pub free_nodes: Vec<usize>,
    /// Boundary mass matrix (`Ryy`) over the free nodes
    pub mass: SymBandMatrix,
    /// Retained modes, largest `β²` (the fundamental) first
    pub modes: Vec<PortMode>,
    pub wavenumber: f64,
    /// `ω·μ₀` (TE) or `ω·ε₀` (TM)
    pub admittance_constant: f64,
    /// Length of one period of the port's periodic region
    pub period_length: Option<f64>,
}

impl PortModes {
    pub fn num_propagating(&self) -> usize {
        self.modes.iter().filter(|mode| mode.propagating).count()
    }

    pub fn has_propagating_mode(&self) -> bool {
        self.modes.iter().any(|mode| mode.propagating)
    }

    /// `R v`
    pub fn mass_times(&self, vector: &[Complex64]) -> Vec<Complex64> {
        self.mass.mul_complex_vec(vector)
    }
}

/// Build the line elements along a port from the mesh's edge adjacency
///
/// Each line element takes the media of a triangle sharing its edge, preferring triangles of the
/// port's periodic region.
pub fn line_elements(model: &Model, port_idx: usize) -> Result<Vec<LineElement>, PortEigenError> {
    let port = &model.ports[port_idx];
    let order = model.mesh.order();

    let periodic_elements: Vec<usize> = port
        .periodic
        .as_ref()
        .map(|region| {
            region
                .element_ids
                .iter()
                .filter_map(|id| model.mesh.element_index(*id))
                .collect()
        })
        .unwrap_or_default();

    port.segments(order)
        .into_iter()
        .map(|nodes| {
            let (a, b) = (nodes[0], nodes[nodes.len() - 1]);
            let edge = model
                .mesh
                .edge_between(a, b)
                .ok_or_else(|| PortEigenError::SegmentNotInMesh {
                    port: port_idx,
                    nodes: nodes.to_vec(),
                })?;

            let elem_idx = edge
                .elements
                .iter()
                .find(|idx| periodic_elements.contains(idx))
                .or_else(|| edge.elements.first())
                .copied()
                .ok_or_else(|| PortEigenError::SegmentNotInMesh {
                    port: port_idx,
                    nodes: nodes.to_vec(),
                })?;

            Ok(LineElement {
                nodes,
                media: model.mesh.elements[elem_idx].media,
                order,
            })
        })
        .collect()
}

/// Solve the eigenmodes of one port at the free-space wavenumber `k₀`
///
/// Builds `Txx` (tangential derivative term), `Ryy` (normal mass term) and `Uzz` (k₀² mass term) over the
/// free port nodes, solves `-(Txx - k₀²Uzz) v = β² Ryy v`, then sorts, retains, sign-corrects,
/// normalizes and phase-aligns the modes.
pub fn solve_port_eigen<E>(
    model: &Model,
    port_idx: usize,
    wavenumber: f64,
    solver: &E,
) -> Result<PortModes, PortEigenError>
where
    E: BandEigenSolver + ?Sized,
{
    let port = &model.ports[port_idx];
    let free_nodes = port.free_nodes(&model.forced);
    if free_nodes.is_empty() {
        return Err(PortEigenError::DegeneratePort { port: port_idx });
    }
    let local_index: BTreeMap<usize, usize> = free_nodes
        .iter()
        .enumerate()
        .map(|(idx, id)| (*id, idx))
        .collect();

    let lines = line_elements(model, port_idx)?;

    // widest spread of free local indices within one line element
    let bandwidth = lines
        .iter()
        .map(|line| {
            let free: SmallVec<[usize; 3]> = line
                .nodes
                .iter()
                .filter_map(|id| local_index.get(id).copied())
                .collect();
            match (free.iter().min(), free.iter().max()) {
                (Some(lo), Some(hi)) => hi - lo,
                _ => 0,
            }
        })
        .max()
        .unwrap_or(0);

    let n = free_nodes.len();
    let mut txx = SymBandMatrix::new(n, bandwidth);
    let mut ryy = SymBandMatrix::new(n, bandwidth);
    let mut uzz = SymBandMatrix::new(n, bandwidth);

    for line in lines.iter() {
        let media = model.media_info(line.media);
        let tensor = media.curl_tensor();
        let points: SmallVec<[Point; 3]> =
            line.nodes.iter().map(|id| *model.mesh.point(*id)).collect();
        let p_nn = LineFrame::new(&points).normal_component(&tensor);

        let local =
            kernel_for(ElementKind::Line { order: line.order }).local_matrices(&points, &tensor);

        for (i, node_i) in line.nodes.iter().enumerate() {
            if let Some(row) = local_index.get(node_i) {
                for (j, node_j) in line.nodes.iter().enumerate() {
                    if let Some(col) = local_index.get(node_j) {
                        // each symmetric pair is visited twice; accumulate the upper triangle only
                        if row <= col {
                            txx.add(*row, *col, local.stiffness[(i, j)]);
                            ryy.add(*row, *col, p_nn * local.mass[(i, j)]);
                            uzz.add(*row, *col, media.q_zz() * local.mass[(i, j)]);
                        }
                    }
                }
            }
        }
    }

    let k0_sq = wavenumber * wavenumber;
    let stiffness = SymBandMatrix::linear_combination(-1.0, &txx, k0_sq, &uzz);

    let decomp = solver
        .solve(&stiffness, &ryy)
        .map_err(|source| PortEigenError::Eigensolver {
            port: port_idx,
            source,
        })?;

    let settings = model.settings();
    let omega = wavenumber * C_0;
    let admittance_constant = settings.wave_mode.admittance_constant(omega);

    let period_length = port
        .periodic
        .as_ref()
        .map(|region| region.period_length(&model.mesh));
    let defect_indices: Vec<usize> = port
        .periodic
        .as_ref()
        .map(|region| {
            region
                .defect_nodes
                .iter()
                .filter_map(|id| local_index.get(id).copied())
                .collect()
        })
        .unwrap_or_default();

    let sorted = sort_eigenpairs(decomp, settings.tolerances.eigen_tie);

    let mut modes = Vec::with_capacity(settings.max_modes.min(n));
    let retained = sorted.into_iter().rev().take(settings.max_modes);
    for (mode_idx, (eigenvalue, vector)) in retained.enumerate() {
        let mut beta = Complex64::new(eigenvalue, 0.0).sqrt();
        let mut vector: Vec<Complex64> = vector.iter().map(|v| Complex64::new(*v, 0.0)).collect();

        // decaying modes must take β = -jα
        if beta.im >= 0.0 {
            beta = beta.conj();
            vector.iter_mut().for_each(|v| *v = v.conj());
        }

        if beta.norm() == 0.0 {
            return Err(PortEigenError::CutoffMode {
                port: port_idx,
                mode: mode_idx,
            });
        }

        modes.push(PortMode {
            eigenvalue,
            beta,
            vector,
            propagating: beta.im.abs() / wavenumber < settings.tolerances.propagation,
            normalized_beta: period_length.map(|d| beta * d / (2.0 * PI)),
            defect_confinement: None,
        });
    }

    normalize_modes(&mut modes, &ryy, admittance_constant);
    for mode in modes.iter_mut() {
        phase_align(&mut mode.vector);
        if !defect_indices.is_empty() {
            mode.defect_confinement = Some(
                restricted_norm(&ryy, &mode.vector, &defect_indices)
                    / hermitian_norm(&ryy, &mode.vector),
            );
        }
    }

    let modes = PortModes {
        port: port_idx,
        free_nodes,
        mass: ryy,
        modes,
        wavenumber,
        admittance_constant,
        period_length,
    };

    log::debug!(
        "Port {}: {} of {} retained modes are propagating (k0 = {:.6})",
        port_idx,
        modes.num_propagating(),
        modes.modes.len(),
        wavenumber
    );

    Ok(modes)
}

/// Sort eigenpairs by ascending eigenvalue
///
/// Eigenvalues within `tie_tolerance` of their predecessor keep the eigensolver's relative order.
pub fn sort_eigenpairs(decomp: EigenDecomposition, tie_tolerance: f64) -> Vec<(f64, Vec<f64>)> {
    let mut indices: Vec<usize> = (0..decomp.values.len()).collect();
    indices.sort_by(|a, b| decomp.values[*a].total_cmp(&decomp.values[*b]));

    let mut run_start = 0;
    for k in 1..=indices.len() {
        let run_ends = k == indices.len()
            || (decomp.values[indices[k]] - decomp.values[indices[k - 1]]).abs() > tie_tolerance;
        if run_ends {
            indices[run_start..k].sort_unstable();
            run_start = k;
        }
    }

    let EigenDecomposition { values, mut vectors } = decomp;
    indices
        .into_iter()
        .map(|idx| (values[idx], std::mem::take(&mut vectors[idx])))
        .collect()
}

/// Scale each mode to carry unit modal power: `vᴴ R v = c / |β|`
pub fn normalize_modes(modes: &mut [PortMode], mass: &SymBandMatrix, admittance_constant: f64) {
    for mode in modes.iter_mut() {
        let norm = hermitian_norm(mass, &mode.vector);
        let scale = (admittance_constant / mode.beta.norm() / norm).sqrt();
        mode.vector.iter_mut().for_each(|v| *v *= scale);
    }
}

/// Divide a vector by the unit phase of its largest-magnitude entry
///
/// The first of several (nearly) equally large entries is used, so aligning twice is a no-op.
pub fn phase_align(vector: &mut [Complex64]) {
    let mut max_idx = None;
    let mut max_mag = 0.0;
    for (idx, v) in vector.iter().enumerate() {
        if v.norm() > max_mag * (1.0 + PHASE_TIE_TOLERANCE) {
            max_mag = v.norm();
            max_idx = Some(idx);
        }
    }

    if let Some(idx) = max_idx {
        let phase = vector[idx] / max_mag;
        vector.iter_mut().for_each(|v| *v /= phase);
        // the reference entry is exactly real
        vector[idx] = Complex64::new(max_mag, 0.0);
    }
}

// vᴴ R v
fn hermitian_norm(mass: &SymBandMatrix, vector: &[Complex64]) -> f64 {
    mass.mul_complex_vec(vector)
        .iter()
        .zip(vector.iter())
        .map(|(rv, v)| (v.conj() * rv).re)
        .sum()
}

// vᴴ R v restricted to a subset of rows/columns
fn restricted_norm(mass: &SymBandMatrix, vector: &[Complex64], indices: &[usize]) -> f64 {
    indices
        .iter()
        .flat_map(|i| indices.iter().map(move |j| (*i, *j)))
        .map(|(i, j)| (vector[i].conj() * vector[j] * mass.get(i, j)).re)
        .sum()
}
