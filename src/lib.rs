//! Finite Element solver for 2D waveguides terminated by periodic (photonic crystal) ports.
//!
//! For every frequency of a sweep the solver:
//! 1. assembles the global Helmholtz matrix over the triangulated cross-section,
//! 2. solves a 1D generalized eigenproblem along each port to find its eigenmodes,
//! 3. injects a modal admittance (transparent) boundary condition at each port,
//! 4. solves the banded complex system and extracts modal scattering coefficients.
//!
//! ```ignore
//! use pcwg_fem::{Model, SweepDriver, FrequencyResult};
//!
//! let model = Model::from_file("./test_input/straight_waveguide.json")?;
//! let mut driver = SweepDriver::new(model);
//! let mut results: Vec<FrequencyResult> = Vec::new();
//! let outcome = driver.run(&mut results, |_| {})?;
//! ```

/// Structures describing the analysed structure: mesh, media, ports and forced boundaries
pub mod domain;
/// Element kernels, assembly, port eigen-solves, boundary injection and the frequency sweep
pub mod fem_problem;
/// Band-matrix storage and the banded linear algebra the solver depends on
pub mod linalg;
/// Per-frequency results and the append-only sinks they are written to
pub mod results;
/// Sweep configuration
pub mod settings;

#[cfg(test)]
pub(crate) mod test_meshes;

pub use domain::{Model, ModelError};
pub use fem_problem::sweep::{
    AbortReason, SweepDriver, SweepError, SweepOutcome, SweepStage, SweepStatus,
};
pub use results::{FrequencyResult, ModeResult, PortResult, ResultSink};
pub use settings::{SweepSettings, Tolerances};
