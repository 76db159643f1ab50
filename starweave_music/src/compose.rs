// End-to-end pipeline: guidance merge, plan, critics, gate, text.
//
// This is the single impure seam of the crate: it reads the wall clock to
// fill the report's per-stage latencies and emits tracing events at stage
// boundaries. Everything it calls stays pure, so the plan bytes and the
// realized text are still bit-identical across repeated calls with the
// same inputs; only the measured latencies vary.
//
// `predict` covers guidance resolution and the control surface, `plan`
// covers plan generation, `total` runs through the critics up to gate
// entry.

use crate::feature::{FeatureVector, InputError};
use crate::gate::{GateConfig, GateEvaluator, GateReport, StageLatency, TierLevel};
use crate::guidance::AstroGuidance;
use crate::plan::Plan;
use crate::planner::{control_surface, plan_composition, ControlSurface};
use crate::scoring::{score_harmony, score_melody, score_rhythm};
use crate::text_atoms::{realize_text, RealizedText};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// The full composition response body: plan, resolved controls, gate
/// verdict, and realized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub plan: Plan,
    pub control: ControlSurface,
    pub report: GateReport,
    pub text: RealizedText,
}

/// Run the whole pipeline for one request.
pub fn compose(
    vector: &FeatureVector,
    guidance: Option<&AstroGuidance>,
    config: &GateConfig,
    tier: TierLevel,
) -> Composition {
    let start = Instant::now();

    let control = control_surface(vector, guidance);
    let predict_ms = elapsed_ms(start);
    debug!(
        step_bias = control.step_bias,
        density_level = control.density_level,
        "control surface resolved"
    );

    let plan_start = Instant::now();
    let plan = plan_composition(vector, guidance);
    let plan_ms = elapsed_ms(plan_start);
    debug!(
        id = %plan.id,
        bpm = plan.bpm,
        key = %plan.key,
        events = plan.events.len(),
        "plan generated"
    );

    let melodic = score_melody(&plan);
    let harmony = score_harmony(&plan);
    let rhythm = score_rhythm(&plan);

    let latency_ms = StageLatency {
        predict: predict_ms,
        plan: plan_ms,
        total: elapsed_ms(start),
    };
    let report = GateEvaluator::new(config, tier).evaluate(&melodic, &harmony, &rhythm, latency_ms);
    info!(
        calibrated = report.calibrated.overall,
        strict = report.strict.overall,
        total_ms = report.latency_ms.total,
        "gate evaluated"
    );

    let text = realize_text(&control, &report, &plan.feature_hash);

    Composition {
        plan,
        control,
        report,
        text,
    }
}

/// Run the pipeline from a raw six-component slice, failing fast on
/// malformed structural input.
pub fn compose_from_slice(
    features: &[f64],
    guidance: Option<&AstroGuidance>,
    config: &GateConfig,
    tier: TierLevel,
) -> Result<Composition, InputError> {
    let vector = FeatureVector::from_slice(features)?;
    Ok(compose(&vector, guidance, config, tier))
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
