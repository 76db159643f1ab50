// Starweave Composition Engine
//
// A deterministic composition planner and quality gate for the Starweave
// service. The engine turns a six-component feature vector (derived upstream
// from chart/ML signals) into a fully quantized, multi-channel musical event
// plan, scores that plan along independent musical axes, and decides at
// tiered thresholds whether the result is presentable — producing either
// descriptive text or knob-targeted remediation hints.
//
// Architecture:
// - feature.rs: FeatureVector input type, clamping + fail-fast validation
// - guidance.rs: Chart-signal derivation into bounded biases + explicit merge
// - plan.rs: Core plan representation (channels, event tokens, quantization,
//   feature hashing, pitch naming)
// - planner.rs: Plan generation (tempo/register/arc resolution, motif and
//   cadence tables, density tiers, the four channel passes) and the resolved
//   control surface
// - scoring.rs: Melodic, harmonic, and rhythmic critics (pure, multi-metric)
// - gate.rs: Tiered threshold configuration, startup validation, calibrated
//   + strict gate reports
// - text_atoms.rs: Deterministic atoms and short-form text, fail-closed on
//   gate failure
// - compose.rs: End-to-end pipeline wrapper with stage latency measurement
//
// Every stage is a pure function of its arguments: identical inputs yield
// bit-identical plans and byte-identical text. The surrounding service
// hashes serialized output for reproducibility checks, so there is no
// randomness and no clock anywhere below compose.rs.

pub mod compose;
pub mod feature;
pub mod gate;
pub mod guidance;
pub mod plan;
pub mod planner;
pub mod scoring;
pub mod text_atoms;
