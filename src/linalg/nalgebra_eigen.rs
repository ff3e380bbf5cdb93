use super::{band_matrix::SymBandMatrix, BandEigenSolver, EigenDecomposition, LinalgError};
use nalgebra::{DMatrix, SymmetricEigen};

/// Largest port problem handed to the dense eigensolver
pub const MAX_DENSE_SIZE: usize = 1000;

const MAX_EIGEN_ITERATIONS: usize = 10_000;

/// Solves `Ax = λBx` by reducing it to a standard symmetric problem with the Cholesky factor of `B`
///
/// `B = LLᵀ`, `C = L⁻¹AL⁻ᵀ`, `Cy = λy`, `x = L⁻ᵀy`
///
/// The band matrices are expanded into dense Nalgebra matrices, so this is only suitable for port-sized problems.
/// Eigenvectors are returned `B`-orthonormal, with eigenvalues in the order Nalgebra produces them.
#[derive(Debug, Clone, Copy, Default)]
pub struct NalgebraBandEigen;

impl BandEigenSolver for NalgebraBandEigen {
    fn solve(
        &self,
        stiffness: &SymBandMatrix,
        mass: &SymBandMatrix,
    ) -> Result<EigenDecomposition, LinalgError> {
        let dimension = stiffness.dimension();
        if dimension == 0 {
            return Err(LinalgError::EmptyProblem);
        }
        if mass.dimension() != dimension {
            return Err(LinalgError::DimensionMismatch {
                matrix: dimension,
                vector: mass.dimension(),
            });
        }
        if dimension > MAX_DENSE_SIZE {
            return Err(LinalgError::ProblemTooLarge {
                dimension,
                limit: MAX_DENSE_SIZE,
            });
        }

        let a_mat = stiffness.to_dense();
        let b_mat = mass.to_dense();

        let l = b_mat
            .cholesky()
            .ok_or(LinalgError::NotPositiveDefinite)?
            .unpack();

        // C = L⁻¹ (L⁻¹ A)ᵀ since A is symmetric
        let l_inv_a = l
            .solve_lower_triangular(&a_mat)
            .ok_or(LinalgError::NotPositiveDefinite)?;
        let c_mat = l
            .solve_lower_triangular(&l_inv_a.transpose())
            .ok_or(LinalgError::NotPositiveDefinite)?;
        let c_sym = (&c_mat + c_mat.transpose()) * 0.5;

        let decomp = SymmetricEigen::try_new(c_sym, f64::EPSILON, MAX_EIGEN_ITERATIONS)
            .ok_or(LinalgError::NoConvergence)?;

        let x_mat: DMatrix<f64> = l
            .tr_solve_lower_triangular(&decomp.eigenvectors)
            .ok_or(LinalgError::NotPositiveDefinite)?;

        if decomp.eigenvalues.iter().any(|v| !v.is_finite()) {
            return Err(LinalgError::NoConvergence);
        }

        Ok(EigenDecomposition {
            values: decomp.eigenvalues.iter().cloned().collect(),
            vectors: x_mat
                .column_iter()
                .map(|col| col.iter().cloned().collect())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn diagonal_gep() {
        let mut a = SymBandMatrix::new(3, 1);
        let mut b = SymBandMatrix::new(3, 1);
        for (i, (av, bv)) in [(2.0, 1.0), (6.0, 2.0), (-4.0, 4.0)].iter().enumerate() {
            a.add(i, i, *av);
            b.add(i, i, *bv);
        }

        let decomp = NalgebraBandEigen.solve(&a, &b).unwrap();
        let mut values = decomp.values.clone();
        values.sort_by(|x, y| x.total_cmp(y));

        assert_relative_eq!(values[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(values[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(values[2], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn eigenpairs_satisfy_gep() {
        let n = 6;
        let mut a = SymBandMatrix::new(n, 1);
        let mut b = SymBandMatrix::new(n, 1);
        for i in 0..n {
            a.add(i, i, 2.0);
            b.add(i, i, 4.0);
            if i + 1 < n {
                a.add(i, i + 1, -1.0);
                b.add(i, i + 1, 1.0);
            }
        }

        let decomp = NalgebraBandEigen.solve(&a, &b).unwrap();
        let (a_dense, b_dense) = (a.to_dense(), b.to_dense());

        for (value, vector) in decomp.values.iter().zip(decomp.vectors.iter()) {
            let x = nalgebra::DVector::from_vec(vector.clone());
            let residual = &a_dense * &x - &b_dense * &x * *value;
            assert!(residual.norm() < 1e-10);
            // B-orthonormal
            assert_relative_eq!(x.dot(&(&b_dense * &x)), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn indefinite_mass() {
        let mut a = SymBandMatrix::new(2, 0);
        let mut b = SymBandMatrix::new(2, 0);
        a.add(0, 0, 1.0);
        b.add(0, 0, 1.0);
        b.add(1, 1, -1.0);

        assert_eq!(
            NalgebraBandEigen.solve(&a, &b).unwrap_err(),
            LinalgError::NotPositiveDefinite
        );
    }
}
