use smallvec::{smallvec, SmallVec};
use std::ops::{Add, Mul};

/// `coefficient * L1^p1 * L2^p2 * L3^p3`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaTerm {
    pub coefficient: f64,
    pub powers: [u32; 3],
}

/// A polynomial in the area (barycentric) coordinates of a triangle
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AreaPolynomial {
    terms: SmallVec<[AreaTerm; 6]>,
}

impl AreaPolynomial {
    pub fn constant(value: f64) -> Self {
        Self {
            terms: smallvec![AreaTerm {
                coefficient: value,
                powers: [0; 3]
            }],
        }
    }

    /// The area coordinate `L_{k+1}`
    pub fn coordinate(k: usize) -> Self {
        let mut powers = [0; 3];
        powers[k] = 1;
        Self {
            terms: smallvec![AreaTerm {
                coefficient: 1.0,
                powers
            }],
        }
    }

    pub fn terms(&self) -> &[AreaTerm] {
        &self.terms
    }

    pub fn scale(mut self, factor: f64) -> Self {
        self.terms
            .iter_mut()
            .for_each(|term| term.coefficient *= factor);
        self
    }

    /// Partial derivative with respect to `L_{k+1}`
    pub fn derivative(&self, k: usize) -> Self {
        let mut result = Self::default();
        for term in self.terms.iter().filter(|term| term.powers[k] > 0) {
            let mut powers = term.powers;
            powers[k] -= 1;
            result.push(AreaTerm {
                coefficient: term.coefficient * term.powers[k] as f64,
                powers,
            });
        }
        result
    }

    pub fn evaluate(&self, l: [f64; 3]) -> f64 {
        self.terms
            .iter()
            .map(|term| {
                term.coefficient
                    * l[0].powi(term.powers[0] as i32)
                    * l[1].powi(term.powers[1] as i32)
                    * l[2].powi(term.powers[2] as i32)
            })
            .sum()
    }

    /// Exact integral over a triangle of the given (positive) area
    ///
    /// `∫ L1^a L2^b L3^c dA = 2A · a! b! c! / (a + b + c + 2)!`
    pub fn integrate(&self, area: f64) -> f64 {
        self.terms
            .iter()
            .map(|term| {
                let [a, b, c] = term.powers;
                term.coefficient * 2.0 * area * factorial(a) * factorial(b) * factorial(c)
                    / factorial(a + b + c + 2)
            })
            .sum()
    }

    // merge like terms
    fn push(&mut self, new_term: AreaTerm) {
        match self
            .terms
            .iter_mut()
            .find(|term| term.powers == new_term.powers)
        {
            Some(term) => term.coefficient += new_term.coefficient,
            None => self.terms.push(new_term),
        }
    }
}

impl Add for AreaPolynomial {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        for term in other.terms {
            self.push(term);
        }
        self
    }
}

impl Mul for &AreaPolynomial {
    type Output = AreaPolynomial;

    fn mul(self, other: Self) -> AreaPolynomial {
        let mut result = AreaPolynomial::default();
        for t0 in self.terms.iter() {
            for t1 in other.terms.iter() {
                result.push(AreaTerm {
                    coefficient: t0.coefficient * t1.coefficient,
                    powers: [
                        t0.powers[0] + t1.powers[0],
                        t0.powers[1] + t1.powers[1],
                        t0.powers[2] + t1.powers[2],
                    ],
                });
            }
        }
        result
    }
}

fn factorial(n: u32) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monomial_integrals() {
        let area = 0.5;
        let l1 = AreaPolynomial::coordinate(0);
        let l2 = AreaPolynomial::coordinate(1);

        assert!((l1.integrate(area) - area / 3.0).abs() < 1e-15);
        assert!(((&l1 * &l1).integrate(area) - area / 6.0).abs() < 1e-15);
        assert!(((&l1 * &l2).integrate(area) - area / 12.0).abs() < 1e-15);
        assert!((AreaPolynomial::constant(2.0).integrate(area) - 2.0 * area).abs() < 1e-15);
    }

    #[test]
    fn derivative_of_quadratic() {
        // 2L1² - L1
        let l1 = AreaPolynomial::coordinate(0);
        let n = (&l1 * &l1).scale(2.0) + l1.scale(-1.0);
        let dn = n.derivative(0);

        assert_eq!(dn.terms().len(), 2);
        assert!((dn.evaluate([0.25, 0.5, 0.25]) - 0.0).abs() < 1e-15);
        assert!((dn.evaluate([1.0, 0.0, 0.0]) - 3.0).abs() < 1e-15);
        assert!(n.derivative(2).terms().is_empty());
    }

    #[test]
    fn like_terms_merge() {
        let l3 = AreaPolynomial::coordinate(2);
        let sum = l3.clone() + l3.scale(2.0);

        assert_eq!(sum.terms().len(), 1);
        assert_eq!(sum.terms()[0].coefficient, 3.0);
    }
}
