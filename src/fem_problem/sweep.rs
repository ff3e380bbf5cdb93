use super::assembly::{assemble_helmholtz, AssemblyError};
use super::boundary::{add_port_bc, BoundaryError};
use super::port_eigen::{solve_port_eigen, PortEigenError, PortModes};
use super::reorder::{reorder_unknowns, BandMatrixPattern, UnknownOrder};
use super::scattering::{scattering_coefficients, total_outgoing_power};
use crate::domain::Model;
use crate::linalg::{
    band_lu::BandedLu, band_matrix::BandMatrix, nalgebra_eigen::NalgebraBandEigen,
    BandEigenSolver, BandLinearSolver, LinalgError,
};
use crate::results::{FrequencyResult, ModeResult, PortResult, ResultSink, SinkError};

use num_complex::Complex64;
use rayon::prelude::*;
use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Position of the driver within the per-frequency pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepStage {
    Idle,
    Assembling,
    PortEigenSolving,
    BoundaryInjecting,
    LinearSolving,
    ScatteringExtracting,
    Persisting,
    Done,
    Aborted,
}

impl fmt::Display for SweepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a sweep stopped before its last frequency
#[derive(Debug, thiserror::Error)]
pub enum AbortReason {
    #[error("abort flag was set")]
    AbortFlag,
    #[error("Port {port} has no propagating mode")]
    NoPropagatingMode { port: usize },
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    PortEigen(#[from] PortEigenError),
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
    #[error("linear solve failed: {0}")]
    LinearSolve(#[from] LinalgError),
    #[error("result sink failed: {0}")]
    Sink(#[from] SinkError),
}

/// Errors returned to the caller instead of a [SweepOutcome]
///
/// `run`/`run_from` only fail on an invalid start index; `solve_frequency` also reports a failed solve.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("frequency index {index} is out of range; the sweep has {count} frequencies")]
    FrequencyOutOfRange { index: usize, count: usize },
    #[error("frequency {frequency_index} could not be solved: {reason}")]
    Aborted {
        frequency_index: usize,
        reason: AbortReason,
    },
}

#[derive(Debug)]
pub enum SweepStatus {
    Completed,
    /// Frequencies before `frequency_index` were persisted; none after
    Aborted {
        frequency_index: usize,
        reason: AbortReason,
    },
}

#[derive(Debug)]
pub struct SweepOutcome {
    pub status: SweepStatus,
    /// Index of the first frequency this run attempted
    pub start_index: usize,
    /// Number of frequencies appended to the sink by this run
    pub frequencies_completed: usize,
}

impl SweepOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self.status, SweepStatus::Completed)
    }
}

/// Cached ordering and workspace for one Model
///
/// Built on the first frequency solved after a load and reused by every later frequency.
#[derive(Debug)]
pub struct SweepState {
    pattern: BandMatrixPattern,
    order: UnknownOrder,
    matrix: BandMatrix,
    rhs: Vec<Complex64>,
}

impl SweepState {
    pub fn prepare(model: &Model) -> Self {
        let pattern = BandMatrixPattern::build(&model.mesh, &model.ports, &model.forced);
        let order = reorder_unknowns(&pattern);
        let (kl, ku) = pattern.half_bandwidths(&order);
        log::debug!(
            "Prepared sweep workspace: {} unknowns, half-bandwidths ({}, {})",
            order.len(),
            kl,
            ku
        );

        Self {
            matrix: BandMatrix::new(order.len(), kl, ku),
            rhs: vec![Complex64::new(0.0, 0.0); order.len()],
            pattern,
            order,
        }
    }

    pub fn pattern(&self) -> &BandMatrixPattern {
        &self.pattern
    }

    pub fn order(&self) -> &UnknownOrder {
        &self.order
    }

    fn reset_rhs(&mut self) {
        self.rhs
            .iter_mut()
            .for_each(|v| *v = Complex64::new(0.0, 0.0));
    }
}

fn transition(stage: &mut SweepStage, next: SweepStage) {
    log::debug!("Sweep stage: {} -> {}", stage, next);
    *stage = next;
}

/// Runs a frequency sweep over a [Model]
///
/// Frequencies are solved strictly in sequence. The port eigenproblems of one frequency are
/// solved in parallel. An abort flag, shared through [SweepDriver::abort_handle], is polled
/// before each frequency.
pub struct SweepDriver<L = BandedLu, E = NalgebraBandEigen> {
    model: Model,
    linear_solver: L,
    eigen_solver: E,
    state: Option<SweepState>,
    stage: SweepStage,
    abort: Arc<AtomicBool>,
}

impl SweepDriver {
    /// A driver using the default banded LU and Nalgebra eigensolvers
    pub fn new(model: Model) -> Self {
        Self::with_solvers(model, BandedLu, NalgebraBandEigen)
    }
}

impl<L: BandLinearSolver, E: BandEigenSolver> SweepDriver<L, E> {
    pub fn with_solvers(model: Model, linear_solver: L, eigen_solver: E) -> Self {
        Self {
            model,
            linear_solver,
            eigen_solver,
            state: None,
            stage: SweepStage::Idle,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn stage(&self) -> SweepStage {
        self.stage
    }

    /// The cached workspace, if a frequency has been solved since the last load
    pub fn state(&self) -> Option<&SweepState> {
        self.state.as_ref()
    }

    /// Shared flag which stops the sweep before its next frequency when set
    ///
    /// The flag is not cleared by the driver.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Replace the Model and discard the cached workspace
    pub fn load(&mut self, model: Model) {
        self.model = model;
        self.state = None;
        self.stage = SweepStage::Idle;
    }

    pub fn frequency_plan(&self) -> Vec<f64> {
        self.model.settings().frequency_plan()
    }

    /// Solve every frequency of the plan, appending each result to `sink`
    pub fn run<S, F>(&mut self, sink: &mut S, on_complete: F) -> Result<SweepOutcome, SweepError>
    where
        S: ResultSink + ?Sized,
        F: FnMut(&FrequencyResult),
    {
        self.run_from(0, sink, on_complete)
    }

    /// Solve the frequencies of the plan starting at `start`
    ///
    /// The first failing frequency stops the sweep; results already appended to the sink remain valid.
    pub fn run_from<S, F>(
        &mut self,
        start: usize,
        sink: &mut S,
        mut on_complete: F,
    ) -> Result<SweepOutcome, SweepError>
    where
        S: ResultSink + ?Sized,
        F: FnMut(&FrequencyResult),
    {
        let plan = self.frequency_plan();
        if start >= plan.len() {
            return Err(SweepError::FrequencyOutOfRange {
                index: start,
                count: plan.len(),
            });
        }
        transition(&mut self.stage, SweepStage::Idle);

        let mut completed = 0;
        for (index, frequency) in plan.iter().enumerate().skip(start) {
            let attempt = if self.abort.load(Ordering::SeqCst) {
                Err(AbortReason::AbortFlag)
            } else {
                self.solve_at(index, *frequency).and_then(|result| {
                    transition(&mut self.stage, SweepStage::Persisting);
                    sink.persist(&result)?;
                    Ok(result)
                })
            };

            match attempt {
                Ok(result) => {
                    completed += 1;
                    log::info!(
                        "Frequency {} / {} (f = {:.6}, λ = {:.6}): total outgoing power {:.9}",
                        index + 1,
                        plan.len(),
                        result.normalized_frequency,
                        result.wavelength,
                        result.total_power
                    );
                    on_complete(&result);
                }
                Err(reason) => {
                    log::warn!("Sweep aborted at frequency {}: {}", index, reason);
                    transition(&mut self.stage, SweepStage::Aborted);
                    return Ok(SweepOutcome {
                        status: SweepStatus::Aborted {
                            frequency_index: index,
                            reason,
                        },
                        start_index: start,
                        frequencies_completed: completed,
                    });
                }
            }
        }

        transition(&mut self.stage, SweepStage::Done);
        Ok(SweepOutcome {
            status: SweepStatus::Completed,
            start_index: start,
            frequencies_completed: completed,
        })
    }

    /// Solve a single frequency of the plan without persisting it
    pub fn solve_frequency(&mut self, index: usize) -> Result<FrequencyResult, SweepError> {
        let plan = self.frequency_plan();
        let frequency = *plan.get(index).ok_or(SweepError::FrequencyOutOfRange {
            index,
            count: plan.len(),
        })?;

        match self.solve_at(index, frequency) {
            Ok(result) => {
                transition(&mut self.stage, SweepStage::Idle);
                Ok(result)
            }
            Err(reason) => {
                transition(&mut self.stage, SweepStage::Aborted);
                Err(SweepError::Aborted {
                    frequency_index: index,
                    reason,
                })
            }
        }
    }

    fn solve_at(&mut self, index: usize, frequency: f64) -> Result<FrequencyResult, AbortReason> {
        let model = &self.model;
        let settings = model.settings();
        let wavenumber = settings.wavenumber(frequency);
        let wavelength = settings.wavelength(frequency);
        let state = self
            .state
            .get_or_insert_with(|| SweepState::prepare(model));

        transition(&mut self.stage, SweepStage::Assembling);
        assemble_helmholtz(model, &state.order, wavenumber, &mut state.matrix)?;
        state.reset_rhs();

        transition(&mut self.stage, SweepStage::PortEigenSolving);
        let eigen_solver = &self.eigen_solver;
        let port_modes = (0..model.ports.len())
            .into_par_iter()
            .map(|port_idx| solve_port_eigen(model, port_idx, wavenumber, eigen_solver))
            .collect::<Result<Vec<PortModes>, _>>()
            .map_err(|err| {
                log::error!("Frequency {}: {}", index, err);
                err
            })?;

        if let Some(modes) = port_modes.iter().find(|modes| !modes.has_propagating_mode()) {
            return Err(AbortReason::NoPropagatingMode { port: modes.port });
        }

        transition(&mut self.stage, SweepStage::BoundaryInjecting);
        for modes in port_modes.iter() {
            add_port_bc(
                modes,
                modes.port == model.incident_port,
                &state.order,
                settings.tolerances.admittance_symmetry,
                &mut state.matrix,
                &mut state.rhs,
            )?;
        }

        transition(&mut self.stage, SweepStage::LinearSolving);
        let solution = self
            .linear_solver
            .solve(&mut state.matrix, &state.rhs)
            .map_err(|err| {
                log::error!("Frequency {}: {}", index, err);
                err
            })?;

        transition(&mut self.stage, SweepStage::ScatteringExtracting);
        let scattering: Vec<Vec<Complex64>> = port_modes
            .iter()
            .map(|modes| {
                scattering_coefficients(
                    modes,
                    modes.port == model.incident_port,
                    &state.order,
                    &solution,
                )
            })
            .collect();
        let total_power = total_outgoing_power(
            port_modes
                .iter()
                .zip(scattering.iter().map(|s| s.as_slice())),
        );

        let mut field = vec![Complex64::new(0.0, 0.0); model.mesh.num_nodes()];
        for (value, node_id) in solution.iter().zip(state.order.node_ids()) {
            field[node_id - 1] = *value;
        }

        let ports = port_modes
            .into_iter()
            .zip(scattering)
            .map(|(modes, coefficients)| PortResult {
                port: modes.port,
                boundary_nodes: modes.free_nodes,
                modes: modes
                    .modes
                    .into_iter()
                    .zip(coefficients)
                    .map(|(mode, scattering)| ModeResult {
                        eigenvalue: mode.eigenvalue,
                        beta: mode.beta,
                        propagating: mode.propagating,
                        scattering,
                        eigenvector: mode.vector,
                        normalized_beta: mode.normalized_beta,
                        defect_confinement: mode.defect_confinement,
                    })
                    .collect(),
            })
            .collect();

        Ok(FrequencyResult {
            frequency_index: index,
            normalized_frequency: frequency,
            wavelength,
            max_modes: settings.max_modes,
            field,
            ports,
            total_power,
        })
    }
}
