// The event plan: the central representation of one planned composition.
//
// A Plan is an immutable, fully time-quantized timeline of EventTokens
// across four channels (melody, bass, harmony, rhythm). Event order is the
// planner's insertion order — melody pass, then bass, then harmony, then
// rhythm — and is part of the determinism contract: the surrounding service
// hashes serialized plan bytes and requires identical hashes for identical
// inputs.
//
// The plan is the source of truth. Everything downstream — critic scores,
// gate reports, realized text — is derived from it, never the other way
// around.
//
// Consumed by scoring.rs (channel filtering) and by the embedding API layer
// (JSON serialization).

use crate::feature::FeatureVector;
use crate::guidance::ResolvedGuidance;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Event channel, in pass order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Melody,
    Bass,
    Harmony,
    Rhythm,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Melody,
        Channel::Bass,
        Channel::Harmony,
        Channel::Rhythm,
    ];
}

/// One quantized note event.
///
/// `t0`/`t1` are seconds, both multiples of the plan's beat length after
/// quantization, with `t0 < t1`. `pitch` is a MIDI-style semitone number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventToken {
    pub t0: f64,
    pub t1: f64,
    pub pitch: i32,
    pub velocity: f64,
    pub channel: Channel,
}

/// The generated, quantized multi-channel event timeline for one
/// composition. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub feature_hash: String,
    pub duration_sec: f64,
    pub bpm: u16,
    pub key: String,
    pub events: Vec<EventToken>,
}

/// Per-channel event counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanStats {
    pub total: usize,
    pub melody: usize,
    pub bass: usize,
    pub harmony: usize,
    pub rhythm: usize,
}

impl Plan {
    /// Events on one channel, sorted by start time. The sort is stable, so
    /// simultaneous events keep their insertion order.
    pub fn channel_events(&self, channel: Channel) -> Vec<&EventToken> {
        let mut events: Vec<&EventToken> =
            self.events.iter().filter(|e| e.channel == channel).collect();
        events.sort_by(|a, b| a.t0.total_cmp(&b.t0));
        events
    }

    pub fn stats(&self) -> PlanStats {
        let count =
            |channel| self.events.iter().filter(|e| e.channel == channel).count();
        PlanStats {
            total: self.events.len(),
            melody: count(Channel::Melody),
            bass: count(Channel::Bass),
            harmony: count(Channel::Harmony),
            rhythm: count(Channel::Rhythm),
        }
    }

    /// Compact text summary for CLI narration: one line per channel with
    /// event count and pitch span.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for channel in Channel::ALL {
            let events = self.channel_events(channel);
            if events.is_empty() {
                out.push_str(&format!("{:>8}: (empty)\n", channel_label(channel)));
                continue;
            }
            let lo = events.iter().map(|e| e.pitch).min().unwrap_or(0);
            let hi = events.iter().map(|e| e.pitch).max().unwrap_or(0);
            out.push_str(&format!(
                "{:>8}: {:>3} events, {}..{}\n",
                channel_label(channel),
                events.len(),
                pitch_name(lo),
                pitch_name(hi),
            ));
        }
        out
    }
}

fn channel_label(channel: Channel) -> &'static str {
    match channel {
        Channel::Melody => "melody",
        Channel::Bass => "bass",
        Channel::Harmony => "harmony",
        Channel::Rhythm => "rhythm",
    }
}

/// Beat length in seconds at a given tempo.
pub fn seconds_per_beat(bpm: u16) -> f64 {
    60.0 / bpm as f64
}

/// Round a time in seconds to the nearest multiple of the beat length.
pub fn quantize(t: f64, spb: f64) -> f64 {
    (t / spb).round() * spb
}

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// Compact note name for a MIDI-style pitch number (C4 = 60).
pub fn pitch_name(pitch: i32) -> String {
    let pc = pitch.rem_euclid(12) as usize;
    let octave = pitch.div_euclid(12) - 1;
    format!("{}{}", PITCH_CLASS_NAMES[pc], octave)
}

/// Key name for a register center, e.g. 62 -> "D major". The harmony pass
/// stacks major triads, so the quality is always major.
pub fn key_name(center: i32) -> String {
    format!("{} major", PITCH_CLASS_NAMES[center.rem_euclid(12) as usize])
}

/// Version tag folded into the feature hash. Bump when the motif/cadence
/// tables or the planning algorithm change shape.
pub const TABLE_VERSION: &str = "starweave-tables-v1";

/// Deterministic content tag over the planning inputs.
///
/// SHA-256 over the big-endian bit patterns of the vector components and
/// resolved guidance, prefixed with the table version. Identical inputs
/// produce the identical hex digest on every platform.
pub fn feature_hash(vector: &FeatureVector, guidance: &ResolvedGuidance) -> String {
    let mut hasher = Sha256::new();
    hasher.update(TABLE_VERSION.as_bytes());
    for value in vector.as_array() {
        hasher.update(value.to_bits().to_be_bytes());
    }
    for value in [guidance.tempo_bias, guidance.arc_bias, guidance.density_bias] {
        hasher.update(value.to_bits().to_be_bytes());
    }
    hasher.update((guidance.motif_idx as u64).to_be_bytes());
    hasher.update((guidance.cadence_idx as u64).to_be_bytes());

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
