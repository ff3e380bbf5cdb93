/// Polynomials in triangle area coordinates and their exact integration
pub mod area_poly;

pub use crate::domain::mesh::element::{ElementKind, ElementOrder};

use super::integration::LineQuadrature;
use crate::domain::Point;
use area_poly::AreaPolynomial;

use nalgebra::{DMatrix, Matrix2, Vector2};
use smallvec::SmallVec;

/// Element matrices before material scaling of the mass term
///
/// * `stiffness`: `∫ ∇Nᵢᵀ A ∇Nⱼ` (triangles) or `p_tt ∫ ∂ₛNᵢ ∂ₛNⱼ` (lines)
/// * `mass`: `∫ Nᵢ Nⱼ`
#[derive(Clone, Debug)]
pub struct LocalMatrices {
    pub stiffness: DMatrix<f64>,
    pub mass: DMatrix<f64>,
}

/// Shape functions and local matrices of one kind of element
pub trait ElementKernel: Sync {
    fn kind(&self) -> ElementKind;

    /// Shape function values at a local coordinate (area coordinates for triangles, `[t]` for lines)
    fn shape_values(&self, local: &[f64]) -> SmallVec<[f64; 6]>;

    /// Physical-space shape function gradients at a local coordinate
    fn shape_gradients(&self, points: &[Point], local: &[f64]) -> SmallVec<[Vector2<f64>; 6]>;

    /// Local stiffness and mass matrices with the in-plane tensor `A` applied to the stiffness
    fn local_matrices(&self, points: &[Point], tensor: &Matrix2<f64>) -> LocalMatrices;

    /// Local coordinates of each of the element's nodes
    fn node_coordinates(&self) -> SmallVec<[[f64; 3]; 6]>;
}

static TRIANGLE_FIRST: TriangleKernel = TriangleKernel {
    order: ElementOrder::First,
};
static TRIANGLE_SECOND: TriangleKernel = TriangleKernel {
    order: ElementOrder::Second,
};
static LINE_FIRST: LineKernel = LineKernel {
    order: ElementOrder::First,
};
static LINE_SECOND: LineKernel = LineKernel {
    order: ElementOrder::Second,
};

/// Dispatch table from an element kind to its kernel
pub fn kernel_for(kind: ElementKind) -> &'static dyn ElementKernel {
    match kind {
        ElementKind::Triangle {
            order: ElementOrder::First,
        } => &TRIANGLE_FIRST,
        ElementKind::Triangle {
            order: ElementOrder::Second,
        } => &TRIANGLE_SECOND,
        ElementKind::Line {
            order: ElementOrder::First,
        } => &LINE_FIRST,
        ElementKind::Line {
            order: ElementOrder::Second,
        } => &LINE_SECOND,
    }
}

// ----------------------------------------------------------------------------------------------------
// Triangles
// ----------------------------------------------------------------------------------------------------

/// Lagrange triangle with straight sides
///
/// Local nodes follow the mesh layout: `[v0, v1, v2]` or `[v0, v1, v2, m01, m12, m20]`.
/// Only the vertices define the geometry; mid-nodes are taken to sit at the edge midpoints.
#[derive(Clone, Copy, Debug)]
pub struct TriangleKernel {
    order: ElementOrder,
}

struct TriangleGeometry {
    area: f64,
    // ∇L_k
    coordinate_gradients: [Vector2<f64>; 3],
}

impl TriangleGeometry {
    fn new(points: &[Point]) -> Self {
        let [p0, p1, p2] = [points[0], points[1], points[2]];
        let twice_signed_area = (p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y);
        assert!(
            twice_signed_area.abs() > 0.0,
            "degenerate triangle ({}, {}, {}); cannot compute area coordinates!",
            p0,
            p1,
            p2
        );

        let grad = |a: &Point, b: &Point| {
            Vector2::new(a.y - b.y, b.x - a.x) / twice_signed_area
        };

        Self {
            area: twice_signed_area.abs() / 2.0,
            coordinate_gradients: [grad(&p1, &p2), grad(&p2, &p0), grad(&p0, &p1)],
        }
    }
}

impl TriangleKernel {
    fn shape_polynomials(&self) -> SmallVec<[AreaPolynomial; 6]> {
        let l: [AreaPolynomial; 3] = [0, 1, 2].map(AreaPolynomial::coordinate);
        match self.order {
            ElementOrder::First => l.into_iter().collect(),
            ElementOrder::Second => {
                let mut polys: SmallVec<[AreaPolynomial; 6]> = l
                    .iter()
                    .map(|li| (li * li).scale(2.0) + li.clone().scale(-1.0))
                    .collect();
                for k in 0..3 {
                    polys.push((&l[k] * &l[(k + 1) % 3]).scale(4.0));
                }
                polys
            }
        }
    }
}

impl ElementKernel for TriangleKernel {
    fn kind(&self) -> ElementKind {
        ElementKind::Triangle { order: self.order }
    }

    fn shape_values(&self, local: &[f64]) -> SmallVec<[f64; 6]> {
        let l = [local[0], local[1], local[2]];
        self.shape_polynomials()
            .iter()
            .map(|n| n.evaluate(l))
            .collect()
    }

    fn shape_gradients(&self, points: &[Point], local: &[f64]) -> SmallVec<[Vector2<f64>; 6]> {
        let geometry = TriangleGeometry::new(points);
        let l = [local[0], local[1], local[2]];

        self.shape_polynomials()
            .iter()
            .map(|n| {
                (0..3).fold(Vector2::zeros(), |acc, k| {
                    acc + geometry.coordinate_gradients[k] * n.derivative(k).evaluate(l)
                })
            })
            .collect()
    }

    fn local_matrices(&self, points: &[Point], tensor: &Matrix2<f64>) -> LocalMatrices {
        let geometry = TriangleGeometry::new(points);
        let shapes = self.shape_polynomials();
        let n = shapes.len();

        // G_kl = ∇L_kᵀ A ∇L_l
        let mut coupling = [[0.0; 3]; 3];
        for (k, row) in coupling.iter_mut().enumerate() {
            for (l, entry) in row.iter_mut().enumerate() {
                *entry = geometry.coordinate_gradients[k]
                    .dot(&(tensor * geometry.coordinate_gradients[l]));
            }
        }

        let derivatives: SmallVec<[[AreaPolynomial; 3]; 6]> = shapes
            .iter()
            .map(|s| [s.derivative(0), s.derivative(1), s.derivative(2)])
            .collect();

        let mut stiffness = DMatrix::zeros(n, n);
        let mut mass = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let mut k_ij = 0.0;
                for (k, g_row) in coupling.iter().enumerate() {
                    for (l, g_kl) in g_row.iter().enumerate() {
                        if *g_kl != 0.0 {
                            k_ij += g_kl
                                * (&derivatives[i][k] * &derivatives[j][l])
                                    .integrate(geometry.area);
                        }
                    }
                }
                stiffness[(i, j)] = k_ij;
                mass[(i, j)] = (&shapes[i] * &shapes[j]).integrate(geometry.area);
            }
        }

        LocalMatrices { stiffness, mass }
    }

    fn node_coordinates(&self) -> SmallVec<[[f64; 3]; 6]> {
        let mut coords: SmallVec<[[f64; 3]; 6]> = SmallVec::from_slice(&[
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ]);
        if self.order == ElementOrder::Second {
            coords.extend_from_slice(&[[0.5, 0.5, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5]]);
        }
        coords
    }
}

// ----------------------------------------------------------------------------------------------------
// Lines
// ----------------------------------------------------------------------------------------------------

/// Lagrange line element along a port; local nodes are `[start, end]` or `[start, mid, end]`
#[derive(Clone, Copy, Debug)]
pub struct LineKernel {
    order: ElementOrder,
}

/// Length, unit tangent and unit normal of a straight line element
#[derive(Clone, Copy, Debug)]
pub struct LineFrame {
    pub length: f64,
    pub tangent: Vector2<f64>,
    pub normal: Vector2<f64>,
}

impl LineFrame {
    pub fn new(points: &[Point]) -> Self {
        let (start, end) = (points[0], points[points.len() - 1]);
        let length = start.dist(&end);
        assert!(
            length > 0.0,
            "zero-length line element at {}; cannot build a local frame!",
            start
        );
        let tangent = Vector2::new(end.x - start.x, end.y - start.y) / length;
        Self {
            length,
            tangent,
            normal: Vector2::new(-tangent.y, tangent.x),
        }
    }

    /// `tᵀ A t`
    pub fn tangential(&self, tensor: &Matrix2<f64>) -> f64 {
        self.tangent.dot(&(tensor * self.tangent))
    }

    /// `nᵀ A n`
    pub fn normal_component(&self, tensor: &Matrix2<f64>) -> f64 {
        self.normal.dot(&(tensor * self.normal))
    }
}

impl LineKernel {
    fn values(&self, t: f64) -> SmallVec<[f64; 6]> {
        match self.order {
            ElementOrder::First => SmallVec::from_slice(&[1.0 - t, t]),
            ElementOrder::Second => SmallVec::from_slice(&[
                (1.0 - t) * (1.0 - 2.0 * t),
                4.0 * t * (1.0 - t),
                t * (2.0 * t - 1.0),
            ]),
        }
    }

    // d/dt of the shape functions
    fn derivatives(&self, t: f64) -> SmallVec<[f64; 6]> {
        match self.order {
            ElementOrder::First => SmallVec::from_slice(&[-1.0, 1.0]),
            ElementOrder::Second => {
                SmallVec::from_slice(&[4.0 * t - 3.0, 4.0 - 8.0 * t, 4.0 * t - 1.0])
            }
        }
    }
}

impl ElementKernel for LineKernel {
    fn kind(&self) -> ElementKind {
        ElementKind::Line { order: self.order }
    }

    fn shape_values(&self, local: &[f64]) -> SmallVec<[f64; 6]> {
        self.values(local[0])
    }

    fn shape_gradients(&self, points: &[Point], local: &[f64]) -> SmallVec<[Vector2<f64>; 6]> {
        let frame = LineFrame::new(points);
        self.derivatives(local[0])
            .iter()
            .map(|d| frame.tangent * (d / frame.length))
            .collect()
    }

    fn local_matrices(&self, points: &[Point], tensor: &Matrix2<f64>) -> LocalMatrices {
        let frame = LineFrame::new(points);
        let p_tt = frame.tangential(tensor);
        let quad = LineQuadrature::new(3);
        let n = self.order.line_node_count();

        let stiffness = DMatrix::from_fn(n, n, |i, j| {
            p_tt / frame.length * quad.integrate(|t| {
                let d = self.derivatives(t);
                d[i] * d[j]
            })
        });
        let mass = DMatrix::from_fn(n, n, |i, j| {
            frame.length * quad.integrate(|t| {
                let v = self.values(t);
                v[i] * v[j]
            })
        });

        LocalMatrices { stiffness, mass }
    }

    fn node_coordinates(&self) -> SmallVec<[[f64; 3]; 6]> {
        match self.order {
            ElementOrder::First => SmallVec::from_slice(&[[0.0; 3], [1.0, 0.0, 0.0]]),
            ElementOrder::Second => {
                SmallVec::from_slice(&[[0.0; 3], [0.5, 0.0, 0.0], [1.0, 0.0, 0.0]])
            }
        }
    }
}
