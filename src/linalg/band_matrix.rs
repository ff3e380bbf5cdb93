use nalgebra::DMatrix;
use num_complex::Complex64;

/*
    General band storage (row-wise)

    row i holds columns (i - kl) ..= (i + kl + ku) at offsets 0 ..= (2kl + ku)
    entry (i, j) lives at data[i * width + (j + kl - i)]

    only columns within (i - kl) ..= (i + ku) may be assembled; the extra kl
    superdiagonals hold the fill-in created by partial pivoting during LU
*/

/// Packed square band matrix of complex values with room for LU fill-in
#[derive(Clone, Debug)]
pub struct BandMatrix {
    dimension: usize,
    kl: usize,
    ku: usize,
    width: usize,
    data: Vec<Complex64>,
}

impl BandMatrix {
    /// A zeroed matrix with `kl` subdiagonals and `ku` superdiagonals
    pub fn new(dimension: usize, kl: usize, ku: usize) -> Self {
        let width = 2 * kl + ku + 1;
        Self {
            dimension,
            kl,
            ku,
            width,
            data: vec![Complex64::new(0.0, 0.0); dimension * width],
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of subdiagonals
    pub fn lower_bandwidth(&self) -> usize {
        self.kl
    }

    /// Number of superdiagonals
    pub fn upper_bandwidth(&self) -> usize {
        self.ku
    }

    /// Reset every entry to zero, keeping the allocation
    pub fn zero(&mut self) {
        self.data
            .iter_mut()
            .for_each(|v| *v = Complex64::new(0.0, 0.0));
    }

    /// Whether `(row, col)` is inside the assembled band
    pub fn in_band(&self, row: usize, col: usize) -> bool {
        row < self.dimension && col < self.dimension && col + self.kl >= row && col <= row + self.ku
    }

    /// Accumulate `value` into entry `(row, col)`
    pub fn add(&mut self, row: usize, col: usize, value: Complex64) {
        assert!(
            self.in_band(row, col),
            "entry ({}, {}) is outside of the band (kl: {}, ku: {}, dim: {}); cannot insert value!",
            row,
            col,
            self.kl,
            self.ku,
            self.dimension
        );
        let idx = self.index(row, col);
        self.data[idx] += value;
    }

    /// Entry `(row, col)`; zero outside of the band
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        if self.in_band(row, col) {
            self.data[self.index(row, col)]
        } else {
            Complex64::new(0.0, 0.0)
        }
    }

    /// `A x`
    pub fn mul_vec(&self, x: &[Complex64]) -> Vec<Complex64> {
        assert_eq!(x.len(), self.dimension, "vector length must match the matrix dimension!");
        (0..self.dimension)
            .map(|i| {
                let first = i.saturating_sub(self.kl);
                let last = (i + self.ku).min(self.dimension - 1);
                (first..=last).map(|j| self.get(i, j) * x[j]).sum()
            })
            .collect()
    }

    // Storage slot of (row, col) including the fill-in region
    pub(crate) fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(col + self.kl >= row && col <= row + self.kl + self.ku);
        row * self.width + (col + self.kl - row)
    }

    pub(crate) fn raw(&self, row: usize, col: usize) -> Complex64 {
        self.data[self.index(row, col)]
    }

    pub(crate) fn raw_mut(&mut self, row: usize, col: usize) -> &mut Complex64 {
        let idx = self.index(row, col);
        &mut self.data[idx]
    }
}

/// Packed symmetric band matrix of real values (upper triangle, row-wise)
///
/// entry `(i, j)` with `i <= j <= i + kd` lives at `data[i * (kd + 1) + (j - i)]`
#[derive(Clone, Debug)]
pub struct SymBandMatrix {
    dimension: usize,
    kd: usize,
    data: Vec<f64>,
}

impl SymBandMatrix {
    /// A zeroed matrix with `kd` superdiagonals
    pub fn new(dimension: usize, kd: usize) -> Self {
        Self {
            dimension,
            kd,
            data: vec![0.0; dimension * (kd + 1)],
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of superdiagonals
    pub fn bandwidth(&self) -> usize {
        self.kd
    }

    /// Accumulate `value` into entries `(row, col)` and `(col, row)`
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        let (i, j) = if row <= col { (row, col) } else { (col, row) };
        assert!(
            j < self.dimension && j - i <= self.kd,
            "entry ({}, {}) is outside of the band (kd: {}, dim: {}); cannot insert value!",
            row,
            col,
            self.kd,
            self.dimension
        );
        self.data[i * (self.kd + 1) + (j - i)] += value;
    }

    /// Entry `(row, col)`; zero outside of the band
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let (i, j) = if row <= col { (row, col) } else { (col, row) };
        if j < self.dimension && j - i <= self.kd {
            self.data[i * (self.kd + 1) + (j - i)]
        } else {
            0.0
        }
    }

    /// `α A + β B` for two matrices with the same dimension and bandwidth
    pub fn linear_combination(alpha: f64, a: &Self, beta: f64, b: &Self) -> Self {
        assert!(
            a.dimension == b.dimension && a.kd == b.kd,
            "Symmetric band matrices have different shapes; cannot combine them!"
        );
        Self {
            dimension: a.dimension,
            kd: a.kd,
            data: a
                .data
                .iter()
                .zip(b.data.iter())
                .map(|(va, vb)| alpha * va + beta * vb)
                .collect(),
        }
    }

    /// `A x` for a complex vector
    pub fn mul_complex_vec(&self, x: &[Complex64]) -> Vec<Complex64> {
        assert_eq!(x.len(), self.dimension, "vector length must match the matrix dimension!");
        (0..self.dimension)
            .map(|i| {
                let first = i.saturating_sub(self.kd);
                let last = (i + self.kd).min(self.dimension - 1);
                (first..=last).map(|j| x[j] * self.get(i, j)).sum()
            })
            .collect()
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.dimension, self.dimension, |r, c| self.get(r, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_accumulation() {
        let mut mat = BandMatrix::new(4, 1, 2);
        mat.add(0, 2, Complex64::new(1.0, 0.0));
        mat.add(0, 2, Complex64::new(0.5, -1.0));
        mat.add(3, 2, Complex64::new(2.0, 0.0));

        assert_eq!(mat.get(0, 2), Complex64::new(1.5, -1.0));
        assert_eq!(mat.get(3, 2), Complex64::new(2.0, 0.0));
        assert_eq!(mat.get(3, 0), Complex64::new(0.0, 0.0));
        assert!(!mat.in_band(0, 3));

        mat.zero();
        assert_eq!(mat.get(0, 2), Complex64::new(0.0, 0.0));
    }

    #[test]
    #[should_panic]
    fn insert_outside_band() {
        let mut mat = BandMatrix::new(5, 1, 1);
        mat.add(0, 2, Complex64::new(1.0, 0.0));
    }

    #[test]
    fn band_mul_vec() {
        let mut mat = BandMatrix::new(3, 1, 1);
        for i in 0..3 {
            mat.add(i, i, Complex64::new(2.0, 0.0));
        }
        mat.add(0, 1, Complex64::new(0.0, 1.0));
        mat.add(2, 1, Complex64::new(-1.0, 0.0));

        let x = vec![Complex64::new(1.0, 0.0); 3];
        let y = mat.mul_vec(&x);
        assert_eq!(y[0], Complex64::new(2.0, 1.0));
        assert_eq!(y[1], Complex64::new(2.0, 0.0));
        assert_eq!(y[2], Complex64::new(1.0, 0.0));
    }

    #[test]
    fn symmetric_insert() {
        let mut mat = SymBandMatrix::new(3, 1);
        mat.add(1, 0, 3.0);
        mat.add(0, 1, 1.0);

        assert_eq!(mat.get(0, 1), 4.0);
        assert_eq!(mat.get(1, 0), 4.0);
        assert_eq!(mat.get(0, 2), 0.0);

        let dense = mat.to_dense();
        assert_eq!(dense[(1, 0)], 4.0);
    }

    #[test]
    #[should_panic]
    fn symmetric_insert_outside_band() {
        let mut mat = SymBandMatrix::new(3, 1);
        mat.add(2, 0, 1.0);
    }

    #[test]
    fn symmetric_combination() {
        let mut a = SymBandMatrix::new(2, 1);
        let mut b = SymBandMatrix::new(2, 1);
        a.add(0, 1, 2.0);
        b.add(0, 1, 1.0);
        b.add(1, 1, 1.0);

        let c = SymBandMatrix::linear_combination(-1.0, &a, 3.0, &b);
        assert_eq!(c.get(1, 0), 1.0);
        assert_eq!(c.get(1, 1), 3.0);
    }
}
