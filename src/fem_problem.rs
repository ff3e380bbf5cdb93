/// Element kinds and the local stiffness / mass strategies dispatched on them
pub mod kernels;

/// Gauss-Legendre quadrature along port line elements
pub mod integration;

/// Bandwidth-reducing ordering of the unknowns
pub mod reorder;

/// Global Helmholtz matrix assembly
pub mod assembly;

/// 1D generalized eigenproblems along each Port
pub mod port_eigen;

/// Modal admittance (transparent) boundary conditions
pub mod boundary;

/// Modal scattering coefficients and the outgoing power diagnostic
pub mod scattering;

/// The per-frequency solution pipeline
pub mod sweep;
