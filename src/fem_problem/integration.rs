use nalgebra::{DMatrix, SymmetricEigen};

/// Gauss-Legendre points and weights used to integrate along port line elements
#[derive(Clone, Debug)]
pub struct LineQuadrature {
    /// Points over `[0, 1]`
    pub points: Vec<f64>,
    /// Weights summing to 1
    pub weights: Vec<f64>,
}

impl LineQuadrature {
    /// `n` point rule over `[0, 1]` (exact for polynomials up to degree `2n - 1`)
    pub fn new(n: usize) -> Self {
        let (points, weights) = gauss_legendre(n);
        Self {
            points: points.iter().map(|x| 0.5 * (x + 1.0)).collect(),
            weights: weights.iter().map(|w| 0.5 * w).collect(),
        }
    }

    /// `∫₀¹ f(t) dt`
    pub fn integrate<F>(&self, integrand: F) -> f64
    where
        F: Fn(f64) -> f64,
    {
        self.points
            .iter()
            .zip(self.weights.iter())
            .map(|(t, w)| integrand(*t) * w)
            .sum()
    }
}

/// Get a set of n Gauss-Legendre-Quadrature Integration points and weights over `(-1, 1)`
///
/// ```
/// use pcwg_fem::fem_problem::integration::gauss_legendre;
///
/// let (points, weights) = gauss_legendre(4);
/// assert_eq!(points.len(), 4);
/// assert!(points.iter().sum::<f64>().abs() < 1e-12);
/// assert!((weights.iter().sum::<f64>() - 2.0).abs() < 1e-12);
/// ```
// Golub-Welsch: nodes are the eigenvalues of the Jacobi matrix of the Legendre recurrence
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let betas: Vec<f64> = (1..n)
        .map(|i| 0.5 / (1.0 - (2.0 * i as f64).powi(-2)).sqrt())
        .collect();

    let jacobi: DMatrix<f64> = DMatrix::from_fn(n, n, |r, c| {
        if r == c + 1 {
            betas[c]
        } else if c == r + 1 {
            betas[r]
        } else {
            0.0
        }
    });

    let eigen_decomp = SymmetricEigen::new(jacobi);

    let mut xw: Vec<(f64, f64)> = eigen_decomp
        .eigenvalues
        .iter()
        .cloned()
        .zip(
            eigen_decomp
                .eigenvectors
                .row(0)
                .iter()
                .map(|v| v.powi(2) * 2.0),
        )
        .collect();

    xw.sort_by(|a, b| a.0.total_cmp(&b.0));
    xw.into_iter().unzip()
}
