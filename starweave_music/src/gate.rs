// Quality gate: tiered thresholds over critic scores.
//
// The gate compares the critics' named metrics against a configured
// threshold tier and reports one boolean per axis plus an overall AND, at
// two strictness levels at once: calibrated (the rollout phase's bar) and
// strict (the fixed long-term bar). Both reports ride together so callers
// can distinguish "good enough for now" from "good enough, period".
//
// Threshold configuration is an explicit value loaded once at process
// start and validated there. A threshold outside its accepted bounds is a
// startup failure that must prevent serving traffic; the evaluator itself
// never validates per request. The rollback deltas carried by each tier
// belong to the surrounding rollout tooling and are not consulted here.
//
// Axis scores live in BTreeMaps so serialized reports are byte-stable.
//
// Consumed by compose.rs and text_atoms.rs.

use crate::scoring::{HarmonyScores, MelodicScores, RhythmScores};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// The gated axes, in report order.
pub const AXES: [&str; 11] = [
    "harmony_legality",
    "harmony_resolution",
    "harmony_voice_leading",
    "melody_arc",
    "melody_integrity",
    "melody_motif",
    "melody_narrative",
    "melody_step_leap",
    "rhythm_accent",
    "rhythm_diversity",
    "rhythm_groove",
];

/// The fixed long-term bar, above every calibrated tier.
pub const STRICT_THRESHOLD: f64 = 0.75;

/// Accepted bounds for configured quality thresholds.
pub const THRESHOLD_MIN: f64 = 0.5;
pub const THRESHOLD_MAX: f64 = 0.9;

/// Accepted bounds for rollback rate deltas (exclusive low, inclusive high).
pub const RATE_DELTA_MAX: f64 = 0.5;
/// Accepted upper bound for the rollback latency delta, in milliseconds.
pub const LATENCY_DELTA_MAX_MS: f64 = 1000.0;

/// Configuration failures. Fatal at startup, never raised per request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read gate config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse gate config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(
        "{tier} quality_threshold {value} outside [{THRESHOLD_MIN}, {THRESHOLD_MAX}]"
    )]
    ThresholdOutOfRange { tier: &'static str, value: f64 },
    #[error("{tier} rollback {field} = {value} outside (0, {max}]")]
    RollbackOutOfRange {
        tier: &'static str,
        field: &'static str,
        value: f64,
        max: f64,
    },
}

/// Canary-rollback deltas for one tier. Carried for the surrounding
/// rollout tooling; the evaluator does not read them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackDeltas {
    pub max_pass_rate_drop: f64,
    pub max_quality_drop: f64,
    pub max_error_rate_increase: f64,
    pub max_latency_increase_ms: f64,
}

impl Default for RollbackDeltas {
    fn default() -> Self {
        RollbackDeltas {
            max_pass_rate_drop: 0.05,
            max_quality_drop: 0.05,
            max_error_rate_increase: 0.02,
            max_latency_increase_ms: 250.0,
        }
    }
}

/// One severity tier: a quality threshold plus its rollback deltas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateTier {
    pub quality_threshold: f64,
    pub rollback: RollbackDeltas,
}

impl Default for GateTier {
    fn default() -> Self {
        GateTier {
            quality_threshold: 0.55,
            rollback: RollbackDeltas::default(),
        }
    }
}

/// The three-tier threshold configuration, loaded once at process start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub development: GateTier,
    pub preproduction: GateTier,
    pub production: GateTier,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            development: GateTier {
                quality_threshold: 0.55,
                rollback: RollbackDeltas::default(),
            },
            preproduction: GateTier {
                quality_threshold: 0.60,
                rollback: RollbackDeltas::default(),
            },
            production: GateTier {
                quality_threshold: 0.65,
                rollback: RollbackDeltas::default(),
            },
        }
    }
}

/// Rollout severity tier selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierLevel {
    Development,
    Preproduction,
    Production,
}

impl TierLevel {
    /// Parse a tier name as accepted on the command line.
    pub fn parse(name: &str) -> Option<TierLevel> {
        match name.to_lowercase().as_str() {
            "dev" | "development" => Some(TierLevel::Development),
            "preprod" | "preproduction" => Some(TierLevel::Preproduction),
            "prod" | "production" => Some(TierLevel::Production),
            _ => None,
        }
    }
}

impl GateConfig {
    pub fn tier(&self, level: TierLevel) -> &GateTier {
        match level {
            TierLevel::Development => &self.development,
            TierLevel::Preproduction => &self.preproduction,
            TierLevel::Production => &self.production,
        }
    }

    /// Validate every tier. Callers must refuse to serve on Err.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tiers = [
            ("development", &self.development),
            ("preproduction", &self.preproduction),
            ("production", &self.production),
        ];
        for (name, tier) in tiers {
            if !(THRESHOLD_MIN..=THRESHOLD_MAX).contains(&tier.quality_threshold) {
                return Err(ConfigError::ThresholdOutOfRange {
                    tier: name,
                    value: tier.quality_threshold,
                });
            }
            let rates = [
                ("max_pass_rate_drop", tier.rollback.max_pass_rate_drop),
                ("max_quality_drop", tier.rollback.max_quality_drop),
                (
                    "max_error_rate_increase",
                    tier.rollback.max_error_rate_increase,
                ),
            ];
            for (field, value) in rates {
                if !(value > 0.0 && value <= RATE_DELTA_MAX) {
                    return Err(ConfigError::RollbackOutOfRange {
                        tier: name,
                        field,
                        value,
                        max: RATE_DELTA_MAX,
                    });
                }
            }
            let latency = tier.rollback.max_latency_increase_ms;
            if !(latency > 0.0 && latency <= LATENCY_DELTA_MAX_MS) {
                return Err(ConfigError::RollbackOutOfRange {
                    tier: name,
                    field: "max_latency_increase_ms",
                    value: latency,
                    max: LATENCY_DELTA_MAX_MS,
                });
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<GateConfig, ConfigError> {
        let config: GateConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<GateConfig, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        GateConfig::from_json_str(&json)
    }
}

/// Per-stage wall-clock measurements, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageLatency {
    pub predict: f64,
    pub plan: f64,
    pub total: f64,
}

/// Pass/fail flags for one strictness level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisReport {
    pub axes: BTreeMap<String, bool>,
    pub overall: bool,
}

/// The gate's terminal verdict for one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub calibrated: AxisReport,
    pub strict: AxisReport,
    pub scores: BTreeMap<String, f64>,
    pub latency_ms: StageLatency,
}

/// Compares critic scores against one tier's threshold and the strict bar.
#[derive(Debug, Clone, Copy)]
pub struct GateEvaluator {
    calibrated_threshold: f64,
}

impl GateEvaluator {
    /// Build an evaluator for the active tier of a validated configuration.
    pub fn new(config: &GateConfig, level: TierLevel) -> Self {
        GateEvaluator {
            calibrated_threshold: config.tier(level).quality_threshold,
        }
    }

    pub fn evaluate(
        &self,
        melodic: &MelodicScores,
        harmony: &HarmonyScores,
        rhythm: &RhythmScores,
        latency_ms: StageLatency,
    ) -> GateReport {
        let scores = axis_scores(melodic, harmony, rhythm);
        GateReport {
            calibrated: flags_at(&scores, self.calibrated_threshold),
            strict: flags_at(&scores, STRICT_THRESHOLD),
            scores,
            latency_ms,
        }
    }
}

/// Fold the three critics' metrics into the gated axis map. Integrity
/// inverts the gaming penalty so every axis reads "higher is better".
fn axis_scores(
    melodic: &MelodicScores,
    harmony: &HarmonyScores,
    rhythm: &RhythmScores,
) -> BTreeMap<String, f64> {
    let entries = [
        ("harmony_legality", harmony.progression_legality),
        ("harmony_resolution", harmony.resolution),
        ("harmony_voice_leading", harmony.voice_leading),
        ("melody_arc", melodic.arc),
        ("melody_integrity", (1.0 - melodic.gaming_penalty).clamp(0.0, 1.0)),
        ("melody_motif", melodic.motif_recurrence),
        ("melody_narrative", melodic.narrative_flow),
        ("melody_step_leap", melodic.step_leap_ratio),
        ("rhythm_accent", rhythm.accent),
        ("rhythm_diversity", rhythm.diversity),
        ("rhythm_groove", rhythm.groove),
    ];
    entries
        .into_iter()
        .map(|(axis, score)| (axis.to_string(), score))
        .collect()
}

fn flags_at(scores: &BTreeMap<String, f64>, threshold: f64) -> AxisReport {
    let axes: BTreeMap<String, bool> = scores
        .iter()
        .map(|(axis, &score)| (axis.clone(), score >= threshold))
        .collect();
    let overall = axes.values().all(|&pass| pass);
    AxisReport { axes, overall }
}
