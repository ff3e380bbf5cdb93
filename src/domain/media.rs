use super::ModelError;

use json::JsonValue;
use nalgebra::{Matrix2, Matrix3};
use std::f64::consts::PI;
use std::fmt;

/// Vacuum permittivity (F/m)
pub const EPS_0: f64 = 8.854_187_812_8e-12;
/// Vacuum permeability (H/m)
pub const MU_0: f64 = 4.0 * PI * 1.0e-7;
/// Speed of light in vacuum (m/s)
pub const C_0: f64 = 2.997_924_58e8;

/// Polarization of the field being solved for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveMode {
    /// Ez is the unknown: P = μ⁻¹, Q = ε
    TE,
    /// Hz is the unknown: P = ε⁻¹, Q = μ
    TM,
}

impl WaveMode {
    /// The vacuum constant paired with this polarization in the modal admittance (μ₀ for TE, ε₀ for TM)
    pub fn vacuum_constant(&self) -> f64 {
        match self {
            Self::TE => MU_0,
            Self::TM => EPS_0,
        }
    }

    /// ω·μ₀ (TE) or ω·ε₀ (TM)
    ///
    /// This is the single source of the constant used by port mode normalization, admittance
    /// injection and scattering extraction.
    pub fn admittance_constant(&self, omega: f64) -> f64 {
        omega * self.vacuum_constant()
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "TE" => Some(Self::TE),
            "TM" => Some(Self::TM),
            _ => None,
        }
    }
}

impl Default for WaveMode {
    fn default() -> Self {
        Self::TE
    }
}

impl fmt::Display for WaveMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TE => write!(f, "TE"),
            Self::TM => write!(f, "TM"),
        }
    }
}

/// Relative permittivity and permeability tensors of a material
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    /// Relative Permittivity (ε_r)
    pub eps_rel: Matrix3<f64>,
    /// Relative Permeability (μ_r)
    pub mu_rel: Matrix3<f64>,
}

impl Material {
    pub fn isotropic(eps_rel: f64, mu_rel: f64) -> Self {
        Self {
            eps_rel: Matrix3::from_diagonal_element(eps_rel),
            mu_rel: Matrix3::from_diagonal_element(mu_rel),
        }
    }

    /// Parse a material from JSON
    ///
    /// Each tensor is either a single number (isotropic), 3 numbers (diagonal) or 9 numbers (row-major):
    /// ```JSON
    /// { "eps": [2.25, 2.25, 2.25], "mu": 1.0 }
    /// ```
    pub fn from_json(media_json: &JsonValue, media_idx: usize) -> Result<Self, ModelError> {
        Ok(Self {
            eps_rel: parse_tensor(&media_json["eps"], media_idx, "eps")?,
            mu_rel: parse_tensor(&media_json["mu"], media_idx, "mu")?,
        })
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::isotropic(1.0, 1.0)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(ε_zz: {}, μ_zz: {})",
            self.eps_rel[(2, 2)],
            self.mu_rel[(2, 2)]
        )
    }
}

/// Helmholtz coefficients of one media for a given [WaveMode]
#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    /// Coefficient of the curl-curl term (μ⁻¹ or ε⁻¹)
    pub p: Matrix3<f64>,
    /// Coefficient of the k₀² term (ε or μ)
    pub q: Matrix3<f64>,
}

impl MediaInfo {
    /// Select P and Q from a material's tensors
    ///
    /// Returns `None` if the tensor that must be inverted is singular
    pub fn for_wave_mode(material: &Material, wave_mode: WaveMode) -> Option<Self> {
        let (inverted, q) = match wave_mode {
            WaveMode::TE => (material.mu_rel, material.eps_rel),
            WaveMode::TM => (material.eps_rel, material.mu_rel),
        };

        inverted.try_inverse().map(|p| Self { p, q })
    }

    /// In-plane tensor `A` such that `∫ curl(Nᵢẑ)ᵀ P curl(Nⱼẑ) = ∫ ∇Nᵢᵀ A ∇Nⱼ`
    ///
    /// With `curl(Nẑ) = J ∇N` and `J = [[0, 1], [-1, 0]]`: `A = Jᵀ P₂ J = [[P_yy, -P_yx], [-P_xy, P_xx]]`
    pub fn curl_tensor(&self) -> Matrix2<f64> {
        Matrix2::new(
            self.p[(1, 1)],
            -self.p[(1, 0)],
            -self.p[(0, 1)],
            self.p[(0, 0)],
        )
    }

    pub fn q_zz(&self) -> f64 {
        self.q[(2, 2)]
    }
}

fn parse_tensor(
    tensor_json: &JsonValue,
    media_idx: usize,
    name: &str,
) -> Result<Matrix3<f64>, ModelError> {
    if let Some(value) = tensor_json.as_f64() {
        return Ok(Matrix3::from_diagonal_element(value));
    }

    let values: Option<Vec<f64>> = if tensor_json.is_array() {
        tensor_json.members().map(|v| v.as_f64()).collect()
    } else {
        None
    };

    match values {
        Some(v) if v.len() == 3 => Ok(Matrix3::new(
            v[0], 0.0, 0.0, //
            0.0, v[1], 0.0, //
            0.0, 0.0, v[2],
        )),
        Some(v) if v.len() == 9 => Ok(Matrix3::from_row_slice(&v)),
        _ => Err(ModelError::MalformedInput(format!(
            "Media {}: '{}' must be a number, or an Array of 3 or 9 numbers!",
            media_idx, name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn te_tm_selection() {
        let mat = Material::isotropic(4.0, 2.0);

        let te = MediaInfo::for_wave_mode(&mat, WaveMode::TE).unwrap();
        assert_relative_eq!(te.p[(0, 0)], 0.5, epsilon = 1e-15);
        assert_relative_eq!(te.q_zz(), 4.0, epsilon = 1e-15);

        let tm = MediaInfo::for_wave_mode(&mat, WaveMode::TM).unwrap();
        assert_relative_eq!(tm.p[(1, 1)], 0.25, epsilon = 1e-15);
        assert_relative_eq!(tm.q_zz(), 2.0, epsilon = 1e-15);
    }

    #[test]
    fn singular_tensor() {
        let mut mat = Material::default();
        mat.mu_rel[(1, 1)] = 0.0;
        assert!(MediaInfo::for_wave_mode(&mat, WaveMode::TE).is_none());
        assert!(MediaInfo::for_wave_mode(&mat, WaveMode::TM).is_some());
    }

    #[test]
    fn curl_tensor_swaps_axes() {
        let media = MediaInfo {
            p: Matrix3::new(2.0, 0.5, 0.0, 0.25, 3.0, 0.0, 0.0, 0.0, 1.0),
            q: Matrix3::identity(),
        };
        let a = media.curl_tensor();

        assert_relative_eq!(a[(0, 0)], 3.0);
        assert_relative_eq!(a[(1, 1)], 2.0);
        assert_relative_eq!(a[(0, 1)], -0.25);
        assert_relative_eq!(a[(1, 0)], -0.5);
    }

    #[test]
    fn admittance_constant_by_mode() {
        let omega = 2.0 * PI * 1.0e9;
        assert_relative_eq!(WaveMode::TE.admittance_constant(omega), omega * MU_0);
        assert_relative_eq!(WaveMode::TM.admittance_constant(omega), omega * EPS_0);
        assert_eq!(WaveMode::parse("tm"), Some(WaveMode::TM));
        assert_eq!(WaveMode::parse("xx"), None);
    }

    #[test]
    fn material_json_forms() {
        let media_json = json::parse(
            r#"{ "eps": [1.0, 2.0, 3.0], "mu": 1.5 }"#,
        )
        .unwrap();
        let mat = Material::from_json(&media_json, 0).unwrap();
        assert_relative_eq!(mat.eps_rel[(2, 2)], 3.0);
        assert_relative_eq!(mat.mu_rel[(1, 1)], 1.5);

        let bad_json = json::parse(r#"{ "eps": [1.0, 2.0], "mu": 1.0 }"#).unwrap();
        assert!(Material::from_json(&bad_json, 3).is_err());
    }
}
