use crate::domain::{media::WaveMode, ModelError};

use json::JsonValue;
use std::f64::consts::PI;

/// Normalized frequency range used when a sweep is configured with a zero-width range or no samples
pub const DEFAULT_FREQUENCY_RANGE: (f64, f64) = (1.0, 2.0);
/// Number of frequency intervals used together with [DEFAULT_FREQUENCY_RANGE]
pub const DEFAULT_FREQUENCY_COUNT: usize = 20;

/// Numerical tolerances used throughout a sweep
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    /// Maximum relative asymmetry of a port admittance block
    pub admittance_symmetry: f64,
    /// A mode is propagating when `|Im(β)| / k₀` is below this value
    pub propagation: f64,
    /// Eigenvalues closer than this are considered tied and keep the eigensolver's order
    pub eigen_tie: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            admittance_symmetry: 1e-9,
            propagation: 1e-8,
            eigen_tie: 1e-15,
        }
    }
}

/// Parameters of a frequency sweep
#[derive(Clone, Debug, PartialEq)]
pub struct SweepSettings {
    /// First normalized frequency (`reference_length / λ`)
    pub first_frequency: f64,
    /// Last normalized frequency (may be smaller than the first)
    pub last_frequency: f64,
    /// Number of intervals between the first and last frequency (`count + 1` samples are solved)
    pub frequency_count: usize,
    pub wave_mode: WaveMode,
    /// Maximum number of eigenmodes retained per port
    pub max_modes: usize,
    /// Length used to normalize frequencies (typically the lattice constant)
    pub reference_length: f64,
    pub tolerances: Tolerances,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            first_frequency: DEFAULT_FREQUENCY_RANGE.0,
            last_frequency: DEFAULT_FREQUENCY_RANGE.1,
            frequency_count: DEFAULT_FREQUENCY_COUNT,
            wave_mode: WaveMode::default(),
            max_modes: 10,
            reference_length: 1.0,
            tolerances: Tolerances::default(),
        }
    }
}

impl SweepSettings {
    /// Settings which solve a single normalized frequency
    pub fn single(frequency: f64) -> Self {
        Self {
            first_frequency: frequency,
            last_frequency: frequency,
            frequency_count: 0,
            ..Default::default()
        }
    }

    /// The normalized frequencies of the sweep in solution order
    ///
    /// A zero-width range or a sample count of zero falls back to [DEFAULT_FREQUENCY_RANGE] and [DEFAULT_FREQUENCY_COUNT]
    pub fn frequency_plan(&self) -> Vec<f64> {
        let (first, last, count) =
            if self.first_frequency == self.last_frequency || self.frequency_count == 0 {
                log::warn!(
                    "Degenerate frequency range [{}, {}] with {} samples; using defaults [{}, {}] with {} samples",
                    self.first_frequency,
                    self.last_frequency,
                    self.frequency_count,
                    DEFAULT_FREQUENCY_RANGE.0,
                    DEFAULT_FREQUENCY_RANGE.1,
                    DEFAULT_FREQUENCY_COUNT,
                );
                (
                    DEFAULT_FREQUENCY_RANGE.0,
                    DEFAULT_FREQUENCY_RANGE.1,
                    DEFAULT_FREQUENCY_COUNT,
                )
            } else {
                (
                    self.first_frequency,
                    self.last_frequency,
                    self.frequency_count,
                )
            };

        let step = (last - first) / count as f64;
        (0..=count).map(|i| first + i as f64 * step).collect()
    }

    /// Free-space wavelength of a normalized frequency
    pub fn wavelength(&self, normalized_frequency: f64) -> f64 {
        self.reference_length / normalized_frequency
    }

    /// Free-space wavenumber of a normalized frequency
    pub fn wavenumber(&self, normalized_frequency: f64) -> f64 {
        2.0 * PI / self.wavelength(normalized_frequency)
    }

    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        let finite = [
            self.first_frequency,
            self.last_frequency,
            self.reference_length,
        ]
        .iter()
        .all(|v| v.is_finite());

        if !finite || self.reference_length <= 0.0 {
            return Err(ModelError::InvalidSettings(format!(
                "frequencies and reference length must be finite and the reference length positive (got [{}, {}], {})",
                self.first_frequency, self.last_frequency, self.reference_length
            )));
        }
        if self.first_frequency <= 0.0 || self.last_frequency <= 0.0 {
            return Err(ModelError::InvalidSettings(format!(
                "normalized frequencies must be positive (got [{}, {}])",
                self.first_frequency, self.last_frequency
            )));
        }
        if self.max_modes == 0 {
            return Err(ModelError::InvalidSettings(
                "at least one mode must be retained per port".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse settings from JSON; missing entries keep their default values
    ///
    /// ```JSON
    /// {
    ///     "first_frequency": 0.2,
    ///     "last_frequency": 0.4,
    ///     "frequency_count": 40,
    ///     "wave_mode": "TM",
    ///     "max_modes": 8,
    ///     "reference_length": 1.0,
    ///     "tolerances": { "admittance_symmetry": 1e-9, "propagation": 1e-8, "eigen_tie": 1e-15 }
    /// }
    /// ```
    pub fn from_json(settings_json: &JsonValue) -> Result<Self, ModelError> {
        let mut settings = Self::default();
        if settings_json.is_null() {
            return Ok(settings);
        }
        if !settings_json.is_object() {
            return Err(ModelError::MalformedInput(
                "Settings must be an Object!".to_string(),
            ));
        }

        read_f64(settings_json, "first_frequency", &mut settings.first_frequency)?;
        read_f64(settings_json, "last_frequency", &mut settings.last_frequency)?;
        read_usize(settings_json, "frequency_count", &mut settings.frequency_count)?;
        read_usize(settings_json, "max_modes", &mut settings.max_modes)?;
        read_f64(settings_json, "reference_length", &mut settings.reference_length)?;

        let mode_json = &settings_json["wave_mode"];
        if !mode_json.is_null() {
            settings.wave_mode = mode_json
                .as_str()
                .and_then(WaveMode::parse)
                .ok_or_else(|| {
                    ModelError::MalformedInput(format!(
                        "Settings: wave_mode must be \"TE\" or \"TM\" (got {})",
                        mode_json
                    ))
                })?;
        }

        let tol_json = &settings_json["tolerances"];
        read_f64(
            tol_json,
            "admittance_symmetry",
            &mut settings.tolerances.admittance_symmetry,
        )?;
        read_f64(tol_json, "propagation", &mut settings.tolerances.propagation)?;
        read_f64(tol_json, "eigen_tie", &mut settings.tolerances.eigen_tie)?;

        Ok(settings)
    }
}

fn read_f64(json: &JsonValue, key: &str, target: &mut f64) -> Result<(), ModelError> {
    if json[key].is_null() {
        return Ok(());
    }
    *target = json[key].as_f64().ok_or_else(|| {
        ModelError::MalformedInput(format!("Settings: '{}' must be a number!", key))
    })?;
    Ok(())
}

fn read_usize(json: &JsonValue, key: &str, target: &mut usize) -> Result<(), ModelError> {
    if json[key].is_null() {
        return Ok(());
    }
    *target = json[key].as_usize().ok_or_else(|| {
        ModelError::MalformedInput(format!(
            "Settings: '{}' must be a non-negative integer!",
            key
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_includes_both_ends() {
        let settings = SweepSettings {
            first_frequency: 0.2,
            last_frequency: 0.4,
            frequency_count: 4,
            ..Default::default()
        };
        let plan = settings.frequency_plan();

        assert_eq!(plan.len(), 5);
        assert!((plan[0] - 0.2).abs() < 1e-15);
        assert!((plan[2] - 0.3).abs() < 1e-15);
        assert!((plan[4] - 0.4).abs() < 1e-15);
    }

    #[test]
    fn descending_plan() {
        let settings = SweepSettings {
            first_frequency: 0.75,
            last_frequency: 0.25,
            frequency_count: 1,
            ..Default::default()
        };
        assert_eq!(settings.frequency_plan(), vec![0.75, 0.25]);
    }

    #[test]
    fn zero_width_range_falls_back_to_defaults() {
        let plan = SweepSettings::single(0.5).frequency_plan();

        assert_eq!(plan.len(), DEFAULT_FREQUENCY_COUNT + 1);
        assert!((plan[0] - DEFAULT_FREQUENCY_RANGE.0).abs() < 1e-15);
        assert!((plan[DEFAULT_FREQUENCY_COUNT] - DEFAULT_FREQUENCY_RANGE.1).abs() < 1e-12);
        assert!(plan.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn zero_count_falls_back_to_defaults() {
        let settings = SweepSettings {
            first_frequency: 0.3,
            last_frequency: 0.6,
            frequency_count: 0,
            ..Default::default()
        };
        assert_eq!(settings.frequency_plan().len(), DEFAULT_FREQUENCY_COUNT + 1);
    }

    #[test]
    fn wavenumber_from_normalized_frequency() {
        let settings = SweepSettings {
            reference_length: 2.0,
            ..Default::default()
        };
        assert!((settings.wavelength(0.5) - 4.0).abs() < 1e-15);
        assert!((settings.wavenumber(0.5) - PI / 2.0).abs() < 1e-15);
    }

    #[test]
    fn settings_from_json() {
        let settings_json = json::parse(
            r#"{ "first_frequency": 0.2, "wave_mode": "TM", "max_modes": 3, "tolerances": { "propagation": 1e-6 } }"#,
        )
        .unwrap();
        let settings = SweepSettings::from_json(&settings_json).unwrap();

        assert_eq!(settings.wave_mode, WaveMode::TM);
        assert_eq!(settings.max_modes, 3);
        assert_eq!(settings.last_frequency, DEFAULT_FREQUENCY_RANGE.1);
        assert_eq!(settings.tolerances.propagation, 1e-6);
        assert_eq!(settings.tolerances.eigen_tie, 1e-15);
    }

    #[test]
    fn bad_wave_mode() {
        let settings_json = json::parse(r#"{ "wave_mode": "TEM" }"#).unwrap();
        assert!(matches!(
            SweepSettings::from_json(&settings_json),
            Err(ModelError::MalformedInput(_))
        ));
    }

    #[test]
    fn zero_modes_is_invalid() {
        let settings = SweepSettings {
            max_modes: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ModelError::InvalidSettings(_))
        ));
    }
}
