use super::{band_matrix::BandMatrix, BandLinearSolver, LinalgError};
use num_complex::Complex64;

/// Gaussian elimination with partial pivoting on the packed band (`gbtrf`/`gbtrs` style)
///
/// The matrix is overwritten with its LU factors: `U` (with up to `kl + ku` superdiagonals) above the
/// diagonal and the unpermuted multipliers of `L` below it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BandedLu;

impl BandedLu {
    /// Factor `matrix` in place, returning the row interchanges (`pivots[k]` was swapped with row `k`)
    pub fn factor(matrix: &mut BandMatrix) -> Result<Vec<usize>, LinalgError> {
        let n = matrix.dimension();
        let (kl, ku) = (matrix.lower_bandwidth(), matrix.upper_bandwidth());
        let mut pivots = Vec::with_capacity(n);

        for k in 0..n {
            let last_row = (k + kl).min(n - 1);
            let last_col = (k + kl + ku).min(n - 1);

            let mut pivot_row = k;
            let mut pivot_mag = matrix.raw(k, k).norm();
            for r in (k + 1)..=last_row {
                let mag = matrix.raw(r, k).norm();
                if mag > pivot_mag {
                    pivot_row = r;
                    pivot_mag = mag;
                }
            }
            if pivot_mag == 0.0 || !pivot_mag.is_finite() {
                return Err(LinalgError::SingularMatrix { column: k });
            }
            pivots.push(pivot_row);

            if pivot_row != k {
                for j in k..=last_col {
                    let tmp = matrix.raw(k, j);
                    *matrix.raw_mut(k, j) = matrix.raw(pivot_row, j);
                    *matrix.raw_mut(pivot_row, j) = tmp;
                }
            }

            let pivot = matrix.raw(k, k);
            for r in (k + 1)..=last_row {
                let multiplier = matrix.raw(r, k) / pivot;
                *matrix.raw_mut(r, k) = multiplier;
                if multiplier.norm() == 0.0 {
                    continue;
                }
                for j in (k + 1)..=last_col {
                    let u_kj = matrix.raw(k, j);
                    *matrix.raw_mut(r, j) -= multiplier * u_kj;
                }
            }
        }

        Ok(pivots)
    }

    /// Solve with factors produced by [BandedLu::factor]
    pub fn solve_factored(
        matrix: &BandMatrix,
        pivots: &[usize],
        rhs: &[Complex64],
    ) -> Vec<Complex64> {
        let n = matrix.dimension();
        let (kl, ku) = (matrix.lower_bandwidth(), matrix.upper_bandwidth());
        let mut x = rhs.to_vec();

        // forward: replay the interchanges and eliminations
        for k in 0..n {
            x.swap(k, pivots[k]);
            let x_k = x[k];
            for r in (k + 1)..=(k + kl).min(n - 1) {
                x[r] -= matrix.raw(r, k) * x_k;
            }
        }

        // backward: U has kl + ku superdiagonals
        for i in (0..n).rev() {
            let mut acc = x[i];
            for j in (i + 1)..=(i + kl + ku).min(n - 1) {
                acc -= matrix.raw(i, j) * x[j];
            }
            x[i] = acc / matrix.raw(i, i);
        }

        x
    }
}

impl BandLinearSolver for BandedLu {
    fn solve(
        &self,
        matrix: &mut BandMatrix,
        rhs: &[Complex64],
    ) -> Result<Vec<Complex64>, LinalgError> {
        if matrix.dimension() == 0 {
            return Err(LinalgError::EmptyProblem);
        }
        if rhs.len() != matrix.dimension() {
            return Err(LinalgError::DimensionMismatch {
                matrix: matrix.dimension(),
                vector: rhs.len(),
            });
        }

        let pivots = Self::factor(matrix)?;
        Ok(Self::solve_factored(matrix, &pivots, rhs))
    }
}
