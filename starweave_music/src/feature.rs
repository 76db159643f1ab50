// Feature vector input: the six-component control signal for generation.
//
// The vector arrives from the upstream ephemeris/ML feature service as six
// floats in [0,1]: tempo, brightness, density, arc, motif, cadence. It is
// immutable once constructed and consumed once per request.
//
// Edge policy: finite out-of-range components are clamped into [0,1] (the
// engine's uniform rule — see also the bias clamps in guidance.rs). Wrong
// arity and non-finite values are precondition violations and fail fast
// with a typed error instead.
//
// The scalar helpers (lerp, clamp01) shared by the guidance deriver and the
// planner live here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of components in a feature vector.
pub const FEATURE_ARITY: usize = 6;

/// Component names in vector order, used in error messages.
pub const FEATURE_NAMES: [&str; FEATURE_ARITY] =
    ["tempo", "brightness", "density", "arc", "motif", "cadence"];

/// Precondition violations on structural input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("feature vector has {got} components, expected {expected}")]
    WrongArity { got: usize, expected: usize },
    #[error("feature component `{name}` is not a finite number")]
    NonFinite { name: &'static str },
}

/// The six-dimensional feature vector driving generation.
///
/// All components are in [0,1]. Order matters for slice construction and
/// hashing: tempo, brightness, density, arc, motif, cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub tempo: f64,
    pub brightness: f64,
    pub density: f64,
    pub arc: f64,
    pub motif: f64,
    pub cadence: f64,
}

impl FeatureVector {
    /// Build a vector, clamping each component into [0,1].
    pub fn new(
        tempo: f64,
        brightness: f64,
        density: f64,
        arc: f64,
        motif: f64,
        cadence: f64,
    ) -> Self {
        FeatureVector {
            tempo: clamp01(tempo),
            brightness: clamp01(brightness),
            density: clamp01(density),
            arc: clamp01(arc),
            motif: clamp01(motif),
            cadence: clamp01(cadence),
        }
    }

    /// Build a vector from a slice, failing fast on wrong arity or any
    /// non-finite component. Finite out-of-range values are clamped.
    pub fn from_slice(values: &[f64]) -> Result<Self, InputError> {
        if values.len() != FEATURE_ARITY {
            return Err(InputError::WrongArity {
                got: values.len(),
                expected: FEATURE_ARITY,
            });
        }
        for (i, &value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(InputError::NonFinite {
                    name: FEATURE_NAMES[i],
                });
            }
        }
        Ok(FeatureVector::new(
            values[0], values[1], values[2], values[3], values[4], values[5],
        ))
    }

    /// Components in canonical order.
    pub fn as_array(&self) -> [f64; FEATURE_ARITY] {
        [
            self.tempo,
            self.brightness,
            self.density,
            self.arc,
            self.motif,
            self.cadence,
        ]
    }
}

/// Clamp a value into [0,1]. NaN maps to 0.
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Linear interpolation between `lo` and `hi` at parameter `t`.
pub fn lerp(lo: f64, hi: f64, t: f64) -> f64 {
    lo + (hi - lo) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_out_of_range() {
        let v = FeatureVector::new(1.5, -0.2, 0.5, 0.5, 0.5, 0.5);
        assert_eq!(v.tempo, 1.0, "above-range component should clamp to 1");
        assert_eq!(v.brightness, 0.0, "below-range component should clamp to 0");
        assert_eq!(v.density, 0.5);
    }

    #[test]
    fn test_from_slice_wrong_arity() {
        let err = FeatureVector::from_slice(&[0.1, 0.2, 0.3]).unwrap_err();
        assert_eq!(
            err,
            InputError::WrongArity {
                got: 3,
                expected: 6
            }
        );
    }

    #[test]
    fn test_from_slice_non_finite() {
        let err =
            FeatureVector::from_slice(&[0.1, f64::NAN, 0.3, 0.4, 0.5, 0.6]).unwrap_err();
        assert_eq!(err, InputError::NonFinite { name: "brightness" });

        let err =
            FeatureVector::from_slice(&[0.1, 0.2, 0.3, f64::INFINITY, 0.5, 0.6]).unwrap_err();
        assert_eq!(err, InputError::NonFinite { name: "arc" });
    }

    #[test]
    fn test_from_slice_round_trip() {
        let v = FeatureVector::from_slice(&[0.8, 0.6, 0.7, 0.65, 0.357, 0.5]).unwrap();
        assert_eq!(v.as_array(), [0.8, 0.6, 0.7, 0.65, 0.357, 0.5]);
    }

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(lerp(70.0, 140.0, 0.0), 70.0);
        assert_eq!(lerp(70.0, 140.0, 1.0), 140.0);
        assert_eq!(lerp(70.0, 140.0, 0.8), 126.0);
    }

    #[test]
    fn test_clamp01_nan() {
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(2.0), 1.0);
        assert_eq!(clamp01(-1.0), 0.0);
    }
}
