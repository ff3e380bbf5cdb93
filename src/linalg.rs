/// In-place banded LU factorization with partial pivoting (the default [BandLinearSolver])
pub mod band_lu;
/// Packed storage for banded complex and symmetric-banded real matrices
pub mod band_matrix;
/// Dense Cholesky reduction + Nalgebra's symmetric eigen-decomposition (the default [BandEigenSolver])
pub mod nalgebra_eigen;

use band_matrix::{BandMatrix, SymBandMatrix};
use num_complex::Complex64;

/// Failures of the numerical routines
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinalgError {
    #[error("band matrix is singular (zero pivot in column {column})")]
    SingularMatrix { column: usize },
    #[error("mass matrix is not positive definite; cannot reduce the generalized eigenproblem")]
    NotPositiveDefinite,
    #[error("eigen-decomposition did not converge")]
    NoConvergence,
    #[error("dimension mismatch: matrix is {matrix}x{matrix} but vector has {vector} entries")]
    DimensionMismatch { matrix: usize, vector: usize },
    #[error("matrices exceeded maximum size ({limit}x{limit}) with dimension {dimension}; cannot solve")]
    ProblemTooLarge { dimension: usize, limit: usize },
    #[error("cannot solve a problem of dimension 0")]
    EmptyProblem,
}

/// Solution of a generalized eigenvalue problem
///
/// `vectors[k]` is the eigenvector associated with `values[k]`
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    pub values: Vec<f64>,
    pub vectors: Vec<Vec<f64>>,
}

/// Solves `Ax = b` for a banded complex `A`
///
/// The matrix may be overwritten by its factorization.
pub trait BandLinearSolver {
    fn solve(
        &self,
        matrix: &mut BandMatrix,
        rhs: &[Complex64],
    ) -> Result<Vec<Complex64>, LinalgError>;
}

/// Solves the generalized symmetric eigenproblem `Ax = λBx` for symmetric-banded `A` and positive-definite `B`
///
/// Ports are solved concurrently, so implementations must be `Sync`.
pub trait BandEigenSolver: Sync {
    fn solve(
        &self,
        stiffness: &SymBandMatrix,
        mass: &SymBandMatrix,
    ) -> Result<EigenDecomposition, LinalgError>;
}
