// Chart guidance: converting astrological chart signals into bounded biases.
//
// ChartSignals describe the chart context — element proportions (fire,
// earth, air, water), aspect tension, cluster density, the sun's ecliptic
// longitude, and the lunar phase. derive_guidance maps them to an
// AstroGuidance of clamped bias values and table indices.
//
// Derivation is total: every signal field defaults to 0 when absent from
// the source JSON, and non-finite values are treated as 0, so no chart can
// make it throw.
//
// ResolvedGuidance::merge is the single place where optional guidance meets
// the feature vector. Precedence is field by field: a present guidance
// field wins, an absent one falls back to the vector-derived default
// (biases default to 0, indices to the scaled vector component). Indices
// are reduced modulo their table length rather than rejected.
//
// Consumed by planner.rs.

use crate::feature::{FeatureVector, clamp01};
use crate::planner::{CADENCE_TABLE_LEN, MOTIF_TABLE_LEN};
use serde::{Deserialize, Serialize};

/// Chart-context signals from the upstream ephemeris service.
///
/// Element proportions and tension/density are nominally in [0,1]; the sun
/// longitude is in degrees and the lunar phase in [0,1) (0 = new moon).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChartSignals {
    #[serde(default)]
    pub fire: f64,
    #[serde(default)]
    pub earth: f64,
    #[serde(default)]
    pub air: f64,
    #[serde(default)]
    pub water: f64,
    #[serde(default)]
    pub tension: f64,
    #[serde(default)]
    pub cluster_density: f64,
    #[serde(default)]
    pub sun_longitude_deg: f64,
    #[serde(default)]
    pub lunar_phase: f64,
}

/// Astrology-derived bias applied on top of the feature vector.
///
/// Every field is optional; an absent field means "use the vector-derived
/// default" (see `ResolvedGuidance::merge`). Biases are in [-1,1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AstroGuidance {
    pub tempo_bias: Option<f64>,
    pub arc_bias: Option<f64>,
    pub density_bias: Option<f64>,
    pub motif_idx: Option<usize>,
    pub cadence_idx: Option<usize>,
}

/// Guidance with every field resolved against the feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedGuidance {
    pub tempo_bias: f64,
    pub arc_bias: f64,
    pub density_bias: f64,
    pub motif_idx: usize,
    pub cadence_idx: usize,
}

/// Derive guidance biases from chart signals. Total and pure.
pub fn derive_guidance(signals: &ChartSignals) -> AstroGuidance {
    let dynamic = finite(signals.fire) + finite(signals.air);
    let stable = finite(signals.earth) + finite(signals.water);

    let tempo_bias = ((dynamic - stable) / 2.0).clamp(-1.0, 1.0);
    let arc_bias = ((finite(signals.tension) - 0.5) * 2.0).clamp(-1.0, 1.0);
    let density_bias = ((finite(signals.cluster_density) - 0.5) * 2.0).clamp(-1.0, 1.0);

    // 12 zodiac sign slots of 30 degrees each, folded onto the 8-entry
    // motif table. Euclidean remainder keeps negative longitudes total.
    let sign_slot = (finite(signals.sun_longitude_deg) / 30.0).floor() as i64;
    let motif_idx = sign_slot.rem_euclid(MOTIF_TABLE_LEN as i64) as usize;

    let cadence_idx = if finite(signals.lunar_phase) < 0.5 { 0 } else { 1 };

    AstroGuidance {
        tempo_bias: Some(tempo_bias),
        arc_bias: Some(arc_bias),
        density_bias: Some(density_bias),
        motif_idx: Some(motif_idx),
        cadence_idx: Some(cadence_idx),
    }
}

fn finite(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

impl ResolvedGuidance {
    /// Merge optional guidance with vector-derived defaults.
    ///
    /// A present guidance field overrides the default; biases are clamped
    /// into [-1,1] and indices reduced modulo table length.
    pub fn merge(vector: &FeatureVector, guidance: Option<&AstroGuidance>) -> Self {
        let g = guidance.copied().unwrap_or_default();

        let motif_default = (clamp01(vector.motif) * MOTIF_TABLE_LEN as f64).floor() as usize;
        let cadence_default =
            (clamp01(vector.cadence) * CADENCE_TABLE_LEN as f64).floor() as usize;

        ResolvedGuidance {
            tempo_bias: bias_or(g.tempo_bias, 0.0),
            arc_bias: bias_or(g.arc_bias, 0.0),
            density_bias: bias_or(g.density_bias, 0.0),
            motif_idx: g.motif_idx.unwrap_or(motif_default) % MOTIF_TABLE_LEN,
            cadence_idx: g.cadence_idx.unwrap_or(cadence_default) % CADENCE_TABLE_LEN,
        }
    }
}

fn bias_or(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(-1.0, 1.0),
        _ => default,
    }
}
