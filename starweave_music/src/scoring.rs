// Critics: pure multi-metric scoring of a plan along independent axes.
//
// Three critics, one per musical dimension. Each filters the plan's events
// down to its own channel, sorts them by start time, and computes named
// metrics in [0,1] (gaming_penalty is a penalty, higher is worse). The
// critics never mutate the plan and never consult anything beyond it, so
// two calls on the same plan always produce the same scores.
//
// Under-populated channels are not an error: below the minimum event count
// every metric is zero, and the melodic critic additionally reports the
// maximum gaming penalty so an empty melody can never slip past the gate.
//
// Consumed by gate.rs.

use crate::plan::{Channel, Plan, seconds_per_beat};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Minimum melody events before the melodic critic will score at all.
pub const MIN_MELODY_EVENTS: usize = 8;
/// Minimum events for the harmonic and rhythmic critics.
pub const MIN_HARMONY_EVENTS: usize = 4;
pub const MIN_RHYTHM_EVENTS: usize = 4;

/// Named melodic quality metrics, each in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MelodicScores {
    pub arc: f64,
    pub motif_recurrence: f64,
    pub contour_entropy: f64,
    pub step_leap_ratio: f64,
    pub range_ok: f64,
    pub narrative_flow: f64,
    /// Penalty metric: higher is worse. 1.0 marks an unscorable melody.
    pub gaming_penalty: f64,
}

/// Named harmonic quality metrics, each in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HarmonyScores {
    pub progression_legality: f64,
    pub voice_leading: f64,
    pub tension: f64,
    pub complexity: f64,
    pub resolution: f64,
}

/// Named rhythmic quality metrics, each in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RhythmScores {
    pub syncopation: f64,
    pub groove: f64,
    pub tempo_fitness: f64,
    pub diversity: f64,
    pub accent: f64,
}

// ── Interval classification ──

mod interval {
    /// Interval class of two pitches: semitone distance folded into 0..11.
    pub fn class(a: i32, b: i32) -> i32 {
        (a - b).rem_euclid(12)
    }

    /// Consonant interval classes: unison, thirds, fourth, fifth, sixths.
    pub fn is_consonant(ic: i32) -> bool {
        matches!(ic, 0 | 3 | 4 | 5 | 7 | 8 | 9)
    }

    /// Legal root-move classes for chord progressions: static, step up,
    /// fourth, and fifth.
    pub fn is_legal_root_move(ic: i32) -> bool {
        matches!(ic, 0 | 2 | 5 | 7)
    }
}

// ── Melodic critic ──

/// Score the plan's melody channel.
pub fn score_melody(plan: &Plan) -> MelodicScores {
    let pitches: Vec<i32> = plan
        .channel_events(Channel::Melody)
        .iter()
        .map(|e| e.pitch)
        .collect();

    if pitches.len() < MIN_MELODY_EVENTS {
        return MelodicScores {
            gaming_penalty: 1.0,
            ..MelodicScores::default()
        };
    }

    let deltas: Vec<i32> = pitches.windows(2).map(|w| w[1] - w[0]).collect();
    let range = (pitches.iter().max().unwrap() - pitches.iter().min().unwrap()) as f64;

    MelodicScores {
        arc: melodic_arc(&pitches),
        motif_recurrence: motif_recurrence(&pitches),
        contour_entropy: contour_entropy(&deltas),
        step_leap_ratio: step_leap_ratio(&deltas),
        range_ok: range_ok(range),
        narrative_flow: narrative_flow(&deltas),
        gaming_penalty: gaming_penalty(&pitches, &deltas, range),
    }
}

/// Rise-then-resolve shape: split pitches into three segments, compare the
/// middle segment's mean against the outer ones, scaled by an octave.
fn melodic_arc(pitches: &[i32]) -> f64 {
    let n = pitches.len();
    let (a, b) = (n / 3, 2 * n / 3);
    let mean = |s: &[i32]| s.iter().sum::<i32>() as f64 / s.len() as f64;

    let (m1, m2, m3) = (mean(&pitches[..a]), mean(&pitches[a..b]), mean(&pitches[b..]));
    let rise = (m2 - m1).max(0.0) / 12.0;
    let resolve = (m2 - m3).max(0.0) / 12.0;
    ((rise + resolve) / 2.0).clamp(0.0, 1.0)
}

/// Fraction of distinct pitch 3-grams that occur more than once.
fn motif_recurrence(pitches: &[i32]) -> f64 {
    let mut counts: HashMap<[i32; 3], usize> = HashMap::new();
    for w in pitches.windows(3) {
        *counts.entry([w[0], w[1], w[2]]).or_insert(0) += 1;
    }
    if counts.is_empty() {
        return 0.0;
    }
    let repeated = counts.values().filter(|&&c| c > 1).count();
    repeated as f64 / counts.len() as f64
}

/// Shannon entropy (base 2) of the bigram transition distribution over the
/// delta sign sequence, normalized by 3 bits and capped at 1.
fn contour_entropy(deltas: &[i32]) -> f64 {
    let signs: Vec<i8> = deltas.iter().map(|d| d.signum() as i8).collect();
    let mut counts: BTreeMap<(i8, i8), usize> = BTreeMap::new();
    for w in signs.windows(2) {
        *counts.entry((w[0], w[1])).or_insert(0) += 1;
    }
    let total: usize = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let entropy: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum();
    (entropy / 3.0).min(1.0)
}

/// Fraction of deltas that are steps (two semitones or fewer).
fn step_leap_ratio(deltas: &[i32]) -> f64 {
    let steps = deltas.iter().filter(|d| d.unsigned_abs() <= 2).count();
    steps as f64 / deltas.len() as f64
}

/// 1.0 inside the comfortable one-to-two-octave band, linear falloff with
/// slope 1/12 on both sides.
fn range_ok(range: f64) -> f64 {
    if (12.0..=24.0).contains(&range) {
        1.0
    } else if range < 12.0 {
        range / 12.0
    } else {
        (1.0 - (range - 24.0) / 12.0).clamp(0.0, 1.0)
    }
}

/// 1 minus the direction-change fraction. A change is a nonzero delta whose
/// sign differs from the last preceding nonzero sign; zero deltas neither
/// change nor reset direction.
fn narrative_flow(deltas: &[i32]) -> f64 {
    let mut changes = 0usize;
    let mut last_sign = 0i32;
    for &d in deltas {
        let sign = d.signum();
        if sign != 0 {
            if last_sign != 0 && sign != last_sign {
                changes += 1;
            }
            last_sign = sign;
        }
    }
    (1.0 - changes as f64 / deltas.len() as f64).clamp(0.0, 1.0)
}

/// Additive heuristic penalty for degenerate melodies, capped at 1.0.
fn gaming_penalty(pitches: &[i32], deltas: &[i32], range: f64) -> f64 {
    let mut penalty: f64 = 0.0;

    let zeros = deltas.iter().filter(|&&d| d == 0).count();
    if zeros as f64 / deltas.len() as f64 > 0.3 {
        penalty += 0.3;
    }

    let distinct_sizes: BTreeSet<u32> = deltas.iter().map(|d| d.unsigned_abs()).collect();
    if pitches.len() > 10 && distinct_sizes.len() < 3 {
        penalty += 0.4;
    }

    if range > 36.0 {
        penalty += 0.3;
    }

    penalty.min(1.0)
}

// ── Harmonic critic ──

/// Score the plan's harmony channel. Events sharing a start time form a
/// chord; the chord root is its lowest tone.
pub fn score_harmony(plan: &Plan) -> HarmonyScores {
    let events = plan.channel_events(Channel::Harmony);
    if events.len() < MIN_HARMONY_EVENTS {
        return HarmonyScores::default();
    }

    let chords = group_chords(events.iter().map(|e| (e.t0, e.pitch)));

    HarmonyScores {
        progression_legality: progression_legality(&chords),
        voice_leading: voice_leading(&chords),
        tension: dissonant_pair_fraction(chords.iter().flat_map(|c| chord_pairs(c))),
        complexity: pitch_class_complexity(&chords),
        resolution: chord_resolution(chords.last().unwrap()),
    }
}

/// Group (start, pitch) pairs into chords of simultaneous onsets. Input
/// must already be sorted by start time; tones come out sorted ascending.
fn group_chords(events: impl Iterator<Item = (f64, i32)>) -> Vec<Vec<i32>> {
    let mut chords: Vec<Vec<i32>> = Vec::new();
    let mut current_t0 = f64::NEG_INFINITY;
    for (t0, pitch) in events {
        if (t0 - current_t0).abs() < 1e-9 {
            chords.last_mut().unwrap().push(pitch);
        } else {
            chords.push(vec![pitch]);
            current_t0 = t0;
        }
    }
    for chord in &mut chords {
        chord.sort_unstable();
    }
    chords
}

/// Fraction of consecutive root transitions whose interval class is in the
/// fixed legality set. A single chord has no transitions to break.
fn progression_legality(chords: &[Vec<i32>]) -> f64 {
    if chords.len() < 2 {
        return 1.0;
    }
    let legal = chords
        .windows(2)
        .filter(|w| interval::is_legal_root_move(interval::class(w[1][0], w[0][0])))
        .count();
    legal as f64 / (chords.len() - 1) as f64
}

/// Mean positional voice movement between consecutive chords, scaled so
/// that a whole octave of average motion scores zero.
fn voice_leading(chords: &[Vec<i32>]) -> f64 {
    if chords.len() < 2 {
        return 1.0;
    }
    let mut movement = 0.0;
    let mut pairs = 0usize;
    for w in chords.windows(2) {
        for (a, b) in w[0].iter().zip(w[1].iter()) {
            movement += (b - a).abs() as f64;
            pairs += 1;
        }
    }
    if pairs == 0 {
        return 1.0;
    }
    (1.0 - movement / pairs as f64 / 12.0).clamp(0.0, 1.0)
}

fn chord_pairs(chord: &[i32]) -> impl Iterator<Item = (i32, i32)> + '_ {
    chord
        .iter()
        .enumerate()
        .flat_map(|(i, &a)| chord[i + 1..].iter().map(move |&b| (a, b)))
}

fn dissonant_pair_fraction(pairs: impl Iterator<Item = (i32, i32)>) -> f64 {
    let mut dissonant = 0usize;
    let mut total = 0usize;
    for (a, b) in pairs {
        total += 1;
        if !interval::is_consonant(interval::class(b, a)) {
            dissonant += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    dissonant as f64 / total as f64
}

/// Distinct pitch classes over the whole channel, scaled by the seven
/// degrees of a diatonic collection.
fn pitch_class_complexity(chords: &[Vec<i32>]) -> f64 {
    let classes: BTreeSet<i32> = chords
        .iter()
        .flat_map(|c| c.iter().map(|p| p.rem_euclid(12)))
        .collect();
    (classes.len() as f64 / 7.0).min(1.0)
}

/// Consonant pair fraction of the final chord. A lone tone resolves by
/// definition.
fn chord_resolution(chord: &[i32]) -> f64 {
    if chord.len() < 2 {
        return 1.0;
    }
    1.0 - dissonant_pair_fraction(chord_pairs(chord))
}

// ── Rhythmic critic ──

/// Score the plan's rhythm channel against its own beat grid.
pub fn score_rhythm(plan: &Plan) -> RhythmScores {
    let events = plan.channel_events(Channel::Rhythm);
    if events.len() < MIN_RHYTHM_EVENTS {
        return RhythmScores::default();
    }

    let spb = seconds_per_beat(plan.bpm);
    let beats: Vec<i64> = events.iter().map(|e| (e.t0 / spb).round() as i64).collect();

    RhythmScores {
        syncopation: weak_beat_fraction(&beats),
        groove: groove(&beats),
        tempo_fitness: tempo_fitness(plan.bpm),
        diversity: onset_diversity(events.iter().map(|e| e.pitch).zip(beats.iter().copied())),
        accent: velocity_accent(events.iter().map(|e| e.velocity)),
    }
}

/// Fraction of onsets landing on the weak in-bar beats (2 and 4).
fn weak_beat_fraction(beats: &[i64]) -> f64 {
    let weak = beats
        .iter()
        .filter(|b| matches!(b.rem_euclid(4), 1 | 3))
        .count();
    weak as f64 / beats.len() as f64
}

/// Fraction of inter-onset intervals equal to the modal interval.
fn groove(beats: &[i64]) -> f64 {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for w in beats.windows(2) {
        *counts.entry(w[1] - w[0]).or_insert(0) += 1;
    }
    let total: usize = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let modal = counts.values().copied().fold(0, usize::max);
    modal as f64 / total as f64
}

/// 1.0 inside the planner's tempo band, linear falloff outside.
fn tempo_fitness(bpm: u16) -> f64 {
    let bpm = bpm as f64;
    let outside = if bpm < 70.0 {
        70.0 - bpm
    } else if bpm > 140.0 {
        bpm - 140.0
    } else {
        return 1.0;
    };
    (1.0 - outside / 30.0).clamp(0.0, 1.0)
}

/// Distinct (pitch, in-bar beat) onset patterns, scaled by a full bar.
fn onset_diversity(onsets: impl Iterator<Item = (i32, i64)>) -> f64 {
    let patterns: BTreeSet<(i32, i64)> = onsets.map(|(p, b)| (p, b.rem_euclid(4))).collect();
    (patterns.len() as f64 / 4.0).min(1.0)
}

/// Velocity spread, scaled so half the velocity domain counts as full
/// accent contrast.
fn velocity_accent(velocities: impl Iterator<Item = f64>) -> f64 {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in velocities {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    ((hi - lo) / 0.5).clamp(0.0, 1.0)
}
