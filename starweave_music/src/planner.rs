// Plan generation: high-level form planning for one composition.
//
// The planner turns a feature vector plus resolved guidance into a fixed
// 16-bar, four-phrase event plan on the quarter-note grid. Generation is a
// pure function: identical (vector, guidance) inputs yield identical plans
// down to event order and floating-point timestamps.
//
// The shape resolution order mirrors the musical dependency chain: tempo
// first (it fixes the grid), then register, phrase arc, motif/cadence table
// selection, and density. The four channel passes then write events in a
// fixed order — melody, bass, harmony, rhythm — which is the plan's
// insertion-order contract.
//
// Edge policy: biased quantities clamp into their valid domain, table
// indices reduce modulo table length. Nothing here rejects.
//
// Consumed by scoring.rs (via the Plan) and text_atoms.rs (via the
// ControlSurface).

use crate::feature::{FeatureVector, clamp01, lerp};
use crate::guidance::{AstroGuidance, ResolvedGuidance};
use crate::plan::{
    Channel, EventToken, Plan, feature_hash, key_name, quantize, seconds_per_beat,
};
use serde::{Deserialize, Serialize};

/// Structure constants: 16 bars of 4/4 in four 4-bar phrases.
pub const BARS: usize = 16;
pub const BEATS_PER_BAR: usize = 4;
pub const PHRASE_BARS: usize = 4;
pub const PHRASES: usize = BARS / PHRASE_BARS;
pub const TOTAL_BEATS: usize = BARS * BEATS_PER_BAR;

/// Nominal duration cap in seconds.
pub const MAX_DURATION_SEC: f64 = 60.0;

/// Tempo bounds in BPM.
pub const BPM_MIN: f64 = 70.0;
pub const BPM_MAX: f64 = 140.0;

/// Register-center bounds (MIDI-style semitone numbers).
const CENTER_LOW: f64 = 55.0;
const CENTER_HIGH: f64 = 67.0;

/// Phrase-arc lift bounds in semitones.
const ARC_LIFT_MIN: f64 = 3.0;
const ARC_LIFT_MAX: f64 = 10.0;

/// Per-phrase register weights: rise to a third-phrase peak, then resolve.
const PHRASE_WEIGHTS: [f64; PHRASES] = [-0.5, 0.4, 1.0, -0.2];

/// Motif table: 3-step interval patterns relative to the bar's
/// transposition base.
pub const MOTIFS: [[i32; 3]; 8] = [
    [0, 2, 4],
    [0, 3, 5],
    [0, 2, -1],
    [0, -2, -4],
    [0, 4, 7],
    [0, -3, -5],
    [0, 1, 3],
    [0, 5, 4],
];
pub const MOTIF_TABLE_LEN: usize = MOTIFS.len();

/// Cadence table: absolute target pitches closing each phrase.
pub const CADENCES: [i32; 4] = [60, 64, 67, 72];
pub const CADENCE_TABLE_LEN: usize = CADENCES.len();

// Fixed velocities per pass.
const DROP_VELOCITIES: [f64; 2] = [0.8, 0.6];
const CADENCE_VELOCITY: f64 = 0.9;
const BASS_VELOCITY: f64 = 0.7;
const HARMONY_VELOCITY: f64 = 0.5;

// Percussion grid: fixed pitches and velocities, independent of density.
const KICK_PITCH: i32 = 36;
const HAT_PITCH: i32 = 42;
const KICK_VELOCITY: f64 = 0.9;
const HAT_VELOCITY: f64 = 0.55;

/// Resolved musical shape for one plan: every knob the channel passes need.
#[derive(Debug, Clone, Copy)]
struct PlanShape {
    bpm: u16,
    base_center: i32,
    phrase_centers: [i32; PHRASES],
    motif: [i32; 3],
    cadence_pitch: i32,
    drops: usize,
    density_level: f64,
    biased_tempo: f64,
    biased_arc: f64,
}

fn resolve_shape(vector: &FeatureVector, guidance: &ResolvedGuidance) -> PlanShape {
    let biased_tempo = clamp01(clamp01(vector.tempo) * (1.0 + 0.1 * guidance.tempo_bias));
    let bpm = lerp(BPM_MIN, BPM_MAX, biased_tempo).round() as u16;

    let base_center = lerp(CENTER_LOW, CENTER_HIGH, clamp01(vector.brightness)).round() as i32;

    let biased_arc = clamp01(clamp01(vector.arc) * (1.0 + 0.3 * guidance.arc_bias));
    let arc_lift = lerp(ARC_LIFT_MIN, ARC_LIFT_MAX, biased_arc);
    let mut phrase_centers = [0i32; PHRASES];
    for (i, weight) in PHRASE_WEIGHTS.iter().enumerate() {
        phrase_centers[i] = (base_center as f64 + weight * arc_lift).round() as i32;
    }

    let biased_density = clamp01(clamp01(vector.density) + 0.2 * guidance.density_bias);
    let density_level = lerp(0.3, 0.9, biased_density);
    let drops = drops_per_bar(density_level);

    PlanShape {
        bpm,
        base_center,
        phrase_centers,
        motif: MOTIFS[guidance.motif_idx % MOTIF_TABLE_LEN],
        cadence_pitch: CADENCES[guidance.cadence_idx % CADENCE_TABLE_LEN],
        drops,
        density_level,
        biased_tempo,
        biased_arc,
    }
}

/// Motif drops per bar as a step function of the density level.
pub fn drops_per_bar(density_level: f64) -> usize {
    if density_level > 0.75 {
        3
    } else if density_level > 0.5 {
        2
    } else {
        1
    }
}

/// Generate the event plan for a feature vector and optional guidance.
pub fn plan_composition(vector: &FeatureVector, guidance: Option<&AstroGuidance>) -> Plan {
    let resolved = ResolvedGuidance::merge(vector, guidance);
    let shape = resolve_shape(vector, &resolved);
    let spb = seconds_per_beat(shape.bpm);

    let mut events = Vec::new();
    let mut push = |channel: Channel, beat: usize, beats_len: usize, pitch: i32, velocity: f64| {
        events.push(EventToken {
            t0: quantize(beat as f64 * spb, spb),
            t1: quantize((beat + beats_len) as f64 * spb, spb),
            pitch,
            velocity,
            channel,
        });
    };

    // Melody pass: motif drops per bar, cadence pitch closing each phrase.
    for bar in 0..BARS {
        let center = shape.phrase_centers[bar / PHRASE_BARS];
        let base = center + if bar % 2 == 0 { -2 } else { 0 };
        let bar_start = bar * BEATS_PER_BAR;

        for drop in 0..shape.drops {
            for (step, &offset) in shape.motif.iter().enumerate() {
                let beat = bar_start + (drop + step) % BEATS_PER_BAR;
                push(
                    Channel::Melody,
                    beat,
                    1,
                    base + offset,
                    DROP_VELOCITIES[drop % DROP_VELOCITIES.len()],
                );
            }
        }

        if (bar + 1) % PHRASE_BARS == 0 {
            push(
                Channel::Melody,
                bar_start + BEATS_PER_BAR - 1,
                1,
                shape.cadence_pitch,
                CADENCE_VELOCITY,
            );
        }
    }

    // Bass pass: tonic two octaves down on beat 1, dominant on beat 3.
    for bar in 0..BARS {
        let tonic = shape.phrase_centers[bar / PHRASE_BARS] - 24;
        let bar_start = bar * BEATS_PER_BAR;
        push(Channel::Bass, bar_start, 2, tonic, BASS_VELOCITY);
        push(Channel::Bass, bar_start + 2, 2, tonic + 7, BASS_VELOCITY);
    }

    // Harmony pass: major triad sustained across each bar.
    for bar in 0..BARS {
        let center = shape.phrase_centers[bar / PHRASE_BARS];
        let bar_start = bar * BEATS_PER_BAR;
        for offset in [0, 4, 7] {
            push(
                Channel::Harmony,
                bar_start,
                BEATS_PER_BAR,
                center + offset,
                HARMONY_VELOCITY,
            );
        }
    }

    // Rhythm pass: fixed percussion grid, independent of density.
    for bar in 0..BARS {
        let bar_start = bar * BEATS_PER_BAR;
        push(Channel::Rhythm, bar_start, 1, KICK_PITCH, KICK_VELOCITY);
        push(Channel::Rhythm, bar_start + 1, 1, HAT_PITCH, HAT_VELOCITY);
        push(Channel::Rhythm, bar_start + 2, 1, KICK_PITCH, KICK_VELOCITY);
        push(Channel::Rhythm, bar_start + 3, 1, HAT_PITCH, HAT_VELOCITY);
    }

    let hash = feature_hash(vector, &resolved);
    let id = format!("plan-{}", &hash[..12]);

    Plan {
        id,
        feature_hash: hash,
        duration_sec: MAX_DURATION_SEC.min(TOTAL_BEATS as f64 * spb),
        bpm: shape.bpm,
        key: key_name(shape.base_center),
        events,
    }
}

/// The control surface: the resolved continuous parameters that drove
/// generation, exposed for the text realizer and for the API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSurface {
    pub step_bias: f64,
    pub leap_cap: f64,
    pub rhythm_template_id: u8,
    pub syncopation_bias: f64,
    pub motif_rate: f64,
    pub density_level: f64,
    pub tempo_norm: f64,
    pub arc_shape: f64,
    pub astro_tags: Vec<String>,
}

const SIGN_TAGS: [&str; MOTIF_TABLE_LEN] = [
    "aries-spark",
    "gemini-drift",
    "leo-blaze",
    "virgo-weave",
    "libra-poise",
    "scorpio-depth",
    "sagittarius-reach",
    "capricorn-stone",
];

const MOON_TAGS: [&str; CADENCE_TABLE_LEN] =
    ["waxing-moon", "waning-moon", "quarter-moon", "dark-moon"];

/// Derive the control surface for a vector and optional guidance.
///
/// Shares resolve_shape with plan_composition, so the surface always
/// describes exactly the plan those inputs would generate.
pub fn control_surface(
    vector: &FeatureVector,
    guidance: Option<&AstroGuidance>,
) -> ControlSurface {
    let resolved = ResolvedGuidance::merge(vector, guidance);
    let shape = resolve_shape(vector, &resolved);

    // Step character of the chosen motif: fraction of its moves that are
    // steps (<= 2 semitones), and its widest move.
    let moves = [
        shape.motif[1] - shape.motif[0],
        shape.motif[2] - shape.motif[1],
    ];
    let steps = moves.iter().filter(|m| m.unsigned_abs() <= 2).count();
    let step_bias = steps as f64 / moves.len() as f64;
    let leap_cap = moves.iter().map(|m| m.unsigned_abs()).max().unwrap_or(0) as f64;

    let element_tag = if resolved.tempo_bias > 0.15 {
        "fire-forward"
    } else if resolved.tempo_bias < -0.15 {
        "earth-rooted"
    } else {
        "even-elements"
    };

    ControlSurface {
        step_bias,
        leap_cap,
        rhythm_template_id: shape.drops as u8,
        syncopation_bias: (shape.drops - 1) as f64 / 2.0,
        motif_rate: shape.drops as f64 / 3.0,
        density_level: shape.density_level,
        tempo_norm: shape.biased_tempo,
        arc_shape: shape.biased_arc,
        astro_tags: vec![
            SIGN_TAGS[resolved.motif_idx].to_string(),
            MOON_TAGS[resolved.cadence_idx].to_string(),
            element_tag.to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureVector;

    fn reference_vector() -> FeatureVector {
        FeatureVector::new(0.8, 0.6, 0.7, 0.65, 0.357, 0.5)
    }

    #[test]
    fn test_reference_scenario_shape() {
        let resolved = ResolvedGuidance::merge(&reference_vector(), None);
        let shape = resolve_shape(&reference_vector(), &resolved);

        assert_eq!(shape.bpm, 126);
        assert_eq!(shape.base_center, 62);
        assert_eq!(shape.phrase_centers, [58, 65, 70, 60]);
        assert_eq!(shape.motif, [0, 2, -1], "motif index floor(0.357 * 8) = 2");
        assert_eq!(shape.cadence_pitch, CADENCES[2]);
        assert_eq!(shape.drops, 2, "density level 0.72 sits in (0.5, 0.75]");
        assert!((shape.density_level - 0.72).abs() < 1e-12);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let vector = reference_vector();
        let a = plan_composition(&vector, None);
        let b = plan_composition(&vector, None);
        assert_eq!(a, b, "identical inputs must produce identical plans");
    }

    #[test]
    fn test_bpm_stays_in_bounds() {
        for i in 0..=20 {
            let tempo = i as f64 / 20.0;
            let vector = FeatureVector::new(tempo, 0.5, 0.5, 0.5, 0.5, 0.5);
            let plan = plan_composition(&vector, None);
            assert!(
                (70..=140).contains(&plan.bpm),
                "bpm {} out of bounds for tempo {}",
                plan.bpm,
                tempo
            );
        }
        // Extreme bias cannot push past the bounds either
        let guidance = AstroGuidance {
            tempo_bias: Some(1.0),
            ..Default::default()
        };
        let vector = FeatureVector::new(1.0, 0.5, 0.5, 0.5, 0.5, 0.5);
        assert_eq!(plan_composition(&vector, Some(&guidance)).bpm, 140);
    }

    #[test]
    fn test_duration_capped() {
        for tempo in [0.0, 0.5, 1.0] {
            let vector = FeatureVector::new(tempo, 0.5, 0.5, 0.5, 0.5, 0.5);
            let plan = plan_composition(&vector, None);
            assert!(
                plan.duration_sec <= MAX_DURATION_SEC,
                "duration {} exceeds cap",
                plan.duration_sec
            );
            let spb = seconds_per_beat(plan.bpm);
            let expected = MAX_DURATION_SEC.min(TOTAL_BEATS as f64 * spb);
            assert!((plan.duration_sec - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_all_timestamps_on_beat_grid() {
        let plan = plan_composition(&reference_vector(), None);
        let spb = seconds_per_beat(plan.bpm);
        for event in &plan.events {
            for t in [event.t0, event.t1] {
                let beats = t / spb;
                assert!(
                    (beats - beats.round()).abs() < 1e-9,
                    "timestamp {} is {} beats, not on the grid",
                    t,
                    beats
                );
            }
            assert!(event.t0 < event.t1, "event must have positive length");
        }
    }

    #[test]
    fn test_drops_monotonic_in_density() {
        let mut prev = 0;
        for i in 0..=40 {
            let density = i as f64 / 40.0;
            let vector = FeatureVector::new(0.5, 0.5, density, 0.5, 0.5, 0.5);
            let resolved = ResolvedGuidance::merge(&vector, None);
            let drops = resolve_shape(&vector, &resolved).drops;
            assert!(
                drops >= prev,
                "drops must not decrease with density: {} after {} at density {}",
                drops,
                prev,
                density
            );
            prev = drops;
        }
        assert_eq!(drops_per_bar(0.5), 1);
        assert_eq!(drops_per_bar(0.51), 2);
        assert_eq!(drops_per_bar(0.75), 2);
        assert_eq!(drops_per_bar(0.76), 3);
    }

    #[test]
    fn test_event_counts_and_pass_order() {
        let plan = plan_composition(&reference_vector(), None);
        let stats = plan.stats();

        // 2 drops * 3 notes * 16 bars + 4 cadence notes
        assert_eq!(stats.melody, 100);
        assert_eq!(stats.bass, 32);
        assert_eq!(stats.harmony, 48);
        assert_eq!(stats.rhythm, 64);

        // Insertion order: melody block, then bass, harmony, rhythm
        let order: Vec<Channel> = plan.events.iter().map(|e| e.channel).collect();
        let melody_end = order.iter().rposition(|&c| c == Channel::Melody).unwrap();
        let bass_start = order.iter().position(|&c| c == Channel::Bass).unwrap();
        let harmony_start = order.iter().position(|&c| c == Channel::Harmony).unwrap();
        let rhythm_start = order.iter().position(|&c| c == Channel::Rhythm).unwrap();
        assert!(melody_end < bass_start);
        assert!(bass_start < harmony_start);
        assert!(harmony_start < rhythm_start);
    }

    #[test]
    fn test_cadence_closes_each_phrase() {
        let plan = plan_composition(&reference_vector(), None);
        let spb = seconds_per_beat(plan.bpm);
        let melody = plan.channel_events(Channel::Melody);

        for phrase in 0..PHRASES {
            let final_beat = (phrase * PHRASE_BARS + PHRASE_BARS) * BEATS_PER_BAR - 1;
            let t = final_beat as f64 * spb;
            let has_cadence = melody.iter().any(|e| {
                (e.t0 - t).abs() < 1e-9 && e.pitch == CADENCES[2] && e.velocity == 0.9
            });
            assert!(has_cadence, "phrase {} should end on the cadence pitch", phrase);
        }
    }

    #[test]
    fn test_guidance_shifts_tempo() {
        let vector = FeatureVector::new(0.8, 0.6, 0.7, 0.65, 0.357, 0.5);
        let guidance = AstroGuidance {
            tempo_bias: Some(1.0),
            ..Default::default()
        };
        let biased = plan_composition(&vector, Some(&guidance));
        let unbiased = plan_composition(&vector, None);
        // 0.8 * 1.1 = 0.88 -> round(lerp(70, 140, 0.88)) = 132
        assert_eq!(biased.bpm, 132);
        assert_eq!(unbiased.bpm, 126);
    }

    #[test]
    fn test_control_surface_matches_shape() {
        let surface = control_surface(&reference_vector(), None);
        // Motif [0, 2, -1]: moves 2 and -3 -> one step of two moves
        assert_eq!(surface.step_bias, 0.5);
        assert_eq!(surface.leap_cap, 3.0);
        assert_eq!(surface.rhythm_template_id, 2);
        assert_eq!(surface.syncopation_bias, 0.5);
        assert!((surface.density_level - 0.72).abs() < 1e-12);
        assert_eq!(
            surface.astro_tags,
            vec!["leo-blaze", "quarter-moon", "even-elements"]
        );
    }

    #[test]
    fn test_plan_metadata() {
        let plan = plan_composition(&reference_vector(), None);
        assert_eq!(plan.key, "D major");
        assert_eq!(plan.feature_hash.len(), 64);
        assert!(plan.id.starts_with("plan-"));
        assert_eq!(plan.id.len(), "plan-".len() + 12);
    }
}
