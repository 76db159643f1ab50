// Text realization: deterministic atoms and short-form text for one plan.
//
// The realizer maps the resolved control surface and the gate's verdict to
// a set of named descriptive atoms and one short text. Control values are
// bucketed against fixed cut-points and each bucket selects one fixed
// astrology-first phrase, so identical inputs always produce byte-identical
// output. The caller supplies the content hash to embed; it is never
// recomputed here.
//
// Fail-closed contract: when the calibrated gate fails, the realized text
// contains no term from the fixed musical-quality adjective list, and
// carries one remediation hint per failing axis, each naming exactly one
// control knob. Quality adjectives appear only in pass-path flavor text.
//
// Terminal stage of the pipeline; consumed by the embedding API layer.

use crate::gate::GateReport;
use crate::planner::ControlSurface;
use serde::{Deserialize, Serialize};

/// Musical-quality adjectives that must never appear in failing output.
pub const FORBIDDEN_QUALITY_TERMS: [&str; 12] = [
    "gentle",
    "confident",
    "balanced",
    "harmonious",
    "graceful",
    "radiant",
    "soaring",
    "serene",
    "lush",
    "vibrant",
    "luminous",
    "polished",
];

/// Remediation hints, one per gated axis, each naming a single control
/// knob. Axes sharing a knob always push it in the same direction.
const AXIS_HINTS: [(&str, &str); 11] = [
    ("harmony_legality", "Try: lower leap_cap"),
    ("harmony_resolution", "Adjust: raise arc_shape"),
    ("harmony_voice_leading", "Adjust: lower syncopation_bias"),
    ("melody_arc", "Adjust: raise arc_shape"),
    ("melody_integrity", "Adjust: raise density_level"),
    ("melody_motif", "Adjust: raise motif_rate"),
    ("melody_narrative", "Try: lower leap_cap"),
    ("melody_step_leap", "Adjust: increase step_bias"),
    ("rhythm_accent", "Adjust: raise density_level"),
    ("rhythm_diversity", "Adjust: raise rhythm_template_id"),
    ("rhythm_groove", "Adjust: lower syncopation_bias"),
];

/// Control-value bucket at the fixed cut-points 0.4 and 0.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Low,
    Mid,
    High,
}

impl Bucket {
    fn of(value: f64) -> Bucket {
        if value >= 0.7 {
            Bucket::High
        } else if value >= 0.4 {
            Bucket::Mid
        } else {
            Bucket::Low
        }
    }

    /// Select this bucket's phrase from a [low, mid, high] table.
    fn pick(self, table: &[&'static str; 3]) -> &'static str {
        match self {
            Bucket::Low => table[0],
            Bucket::Mid => table[1],
            Bucket::High => table[2],
        }
    }
}

// Atom phrase tables, [low, mid, high]. Astrology-first wording; none of
// these may use a forbidden quality term (the atoms also ride in failing
// output).
const MOVEMENT_PHRASES: [&str; 3] = [
    "wide leaps cast between distant houses",
    "motion trading near steps for the occasional reach",
    "lines that walk the wheel a degree at a time",
];

const ARC_PHRASES: [&str; 3] = [
    "a low arc keeping close to its home degree",
    "a measured rise and release across four phrases",
    "a steep climb to the third-phrase summit before the return",
];

const RHYTHM_PHRASES: [&str; 3] = [
    "a pulse set squarely on the cardinal beats",
    "a pulse leaning between the strong beats",
    "offbeats pulled forward like a planet in retrograde",
];

const DENSITY_PHRASES: [&str; 3] = [
    "sparse figures, each given its own house",
    "figures spaced in paired aspects",
    "figures crowded close as a stellium",
];

const MOTIF_PHRASES: [&str; 3] = [
    "the seed motif stated once and left to echo",
    "the seed motif returning through most bars",
    "the seed motif woven into every bar",
];

// Pass-path flavor, selected by tempo bucket. The only place quality
// adjectives are allowed.
const FLAVOR_PHRASES: [&str; 3] = [
    "carried at a gentle drift",
    "held to a balanced pace",
    "driven at a confident stride",
];

/// The named descriptive atoms for one composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atoms {
    pub movement: String,
    pub arc_desc: String,
    pub rhythm_feel: String,
    pub density_desc: String,
    pub motif_desc: String,
    pub astro_color: String,
}

/// Realized output: short text, atoms, and remediation hints (empty on
/// the pass path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedText {
    pub short: String,
    pub atoms: Atoms,
    pub hints: Vec<String>,
}

/// Realize atoms and text from the control surface and gate verdict.
///
/// `hash` is embedded verbatim into the short text so the surrounding
/// service can tie the description back to the plan it hashes.
pub fn realize_text(control: &ControlSurface, report: &GateReport, hash: &str) -> RealizedText {
    let atoms = build_atoms(control);

    if report.calibrated.overall {
        let flavor = Bucket::of(control.tempo_norm).pick(&FLAVOR_PHRASES);
        let short = format!(
            "{movement}, over {arc}. {rhythm}; {density}; {motif}. Drawn from {color}, {flavor}. [{hash}]",
            movement = atoms.movement,
            arc = atoms.arc_desc,
            rhythm = atoms.rhythm_feel,
            density = atoms.density_desc,
            motif = atoms.motif_desc,
            color = atoms.astro_color,
        );
        return RealizedText {
            short,
            atoms,
            hints: Vec::new(),
        };
    }

    // Fail-closed path: no quality language, one hint per failing axis.
    let hints = remediation_hints(report);
    let short = format!(
        "Held at the quality gate on {count} of {total} axes. {hints} [{hash}]",
        count = hints.len(),
        total = report.calibrated.axes.len(),
        hints = hints.join(" "),
    );
    RealizedText {
        short,
        atoms,
        hints,
    }
}

fn build_atoms(control: &ControlSurface) -> Atoms {
    Atoms {
        movement: Bucket::of(control.step_bias).pick(&MOVEMENT_PHRASES).to_string(),
        arc_desc: Bucket::of(control.arc_shape).pick(&ARC_PHRASES).to_string(),
        rhythm_feel: Bucket::of(control.syncopation_bias)
            .pick(&RHYTHM_PHRASES)
            .to_string(),
        density_desc: Bucket::of(control.density_level)
            .pick(&DENSITY_PHRASES)
            .to_string(),
        motif_desc: Bucket::of(control.motif_rate).pick(&MOTIF_PHRASES).to_string(),
        astro_color: control.astro_tags.join(", "),
    }
}

/// One hint line per failing calibrated axis, in axis order.
fn remediation_hints(report: &GateReport) -> Vec<String> {
    report
        .calibrated
        .axes
        .iter()
        .filter(|&(_, &pass)| !pass)
        .map(|(axis, _)| {
            let hint = AXIS_HINTS
                .iter()
                .find(|(name, _)| *name == axis.as_str())
                .map(|(_, hint)| *hint)
                .unwrap_or("Adjust: revisit the control surface");
            format!("{axis}: {hint}.")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{AxisReport, StageLatency, AXES};
    use std::collections::BTreeMap;

    fn control(value: f64) -> ControlSurface {
        ControlSurface {
            step_bias: value,
            leap_cap: 3.0,
            rhythm_template_id: 2,
            syncopation_bias: value,
            motif_rate: value,
            density_level: value,
            tempo_norm: value,
            arc_shape: value,
            astro_tags: vec![
                "leo-blaze".to_string(),
                "quarter-moon".to_string(),
                "even-elements".to_string(),
            ],
        }
    }

    /// A gate report where the named axes fail and the rest pass.
    fn report_failing(failing: &[&str]) -> GateReport {
        let axes: BTreeMap<String, bool> = AXES
            .iter()
            .map(|&axis| (axis.to_string(), !failing.contains(&axis)))
            .collect();
        let overall = axes.values().all(|&p| p);
        let scores: BTreeMap<String, f64> = AXES
            .iter()
            .map(|&axis| (axis.to_string(), if failing.contains(&axis) { 0.2 } else { 0.8 }))
            .collect();
        GateReport {
            calibrated: AxisReport {
                axes: axes.clone(),
                overall,
            },
            strict: AxisReport {
                axes,
                overall,
            },
            scores,
            latency_ms: StageLatency::default(),
        }
    }

    fn contains_forbidden(text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        FORBIDDEN_QUALITY_TERMS
            .into_iter()
            .find(|term| lower.contains(term))
    }

    #[test]
    fn test_bucket_cut_points() {
        assert_eq!(Bucket::of(0.0), Bucket::Low);
        assert_eq!(Bucket::of(0.39), Bucket::Low);
        assert_eq!(Bucket::of(0.4), Bucket::Mid);
        assert_eq!(Bucket::of(0.69), Bucket::Mid);
        assert_eq!(Bucket::of(0.7), Bucket::High);
        assert_eq!(Bucket::of(1.0), Bucket::High);
    }

    #[test]
    fn test_pass_path_embeds_hash_and_flavor() {
        let text = realize_text(&control(0.8), &report_failing(&[]), "cafe0123");
        assert!(text.short.contains("[cafe0123]"), "hash embedded verbatim");
        assert!(text.hints.is_empty(), "pass path carries no hints");
        assert!(
            text.short.contains("confident stride"),
            "high tempo bucket selects its flavor phrase: {}",
            text.short
        );
        assert!(text.short.contains(&text.atoms.movement));
        assert!(text.short.contains(&text.atoms.astro_color));
    }

    #[test]
    fn test_fail_path_has_no_quality_language() {
        for failing in [
            vec!["melody_arc"],
            vec!["melody_step_leap", "rhythm_groove"],
            AXES.to_vec(),
        ] {
            let report = report_failing(&failing);
            for value in [0.1, 0.5, 0.9] {
                let text = realize_text(&control(value), &report, "deadbeef");
                assert_eq!(
                    contains_forbidden(&text.short),
                    None,
                    "failing text leaked a quality term: {}",
                    text.short
                );
                for hint in &text.hints {
                    assert_eq!(contains_forbidden(hint), None);
                }
            }
        }
    }

    #[test]
    fn test_fail_path_one_hint_per_failing_axis() {
        let failing = ["melody_step_leap", "melody_narrative", "rhythm_diversity"];
        let text = realize_text(&control(0.5), &report_failing(&failing), "deadbeef");

        assert_eq!(text.hints.len(), failing.len());
        for axis in failing {
            assert!(
                text.hints.iter().any(|h| h.starts_with(axis)),
                "missing hint for {axis}: {:?}",
                text.hints
            );
        }
        assert!(
            text.hints
                .iter()
                .any(|h| h.contains("increase step_bias")),
            "step_leap failure names its knob"
        );
        assert!(
            text.hints.iter().any(|h| h.contains("lower leap_cap")),
            "narrative failure names its knob"
        );
        // Every hint also appears in the short text
        for hint in &text.hints {
            assert!(text.short.contains(hint));
        }
        assert!(text.short.contains("[deadbeef]"));
    }

    #[test]
    fn test_every_axis_has_a_hint_entry() {
        for axis in AXES {
            assert!(
                AXIS_HINTS.iter().any(|(name, _)| *name == axis),
                "axis {axis} has no remediation hint"
            );
        }
        // And hints sharing a knob never push opposing directions
        for (_, hint) in AXIS_HINTS {
            assert!(
                !hint.contains("raise leap_cap") && !hint.contains("lower arc_shape"),
                "hint contradicts another axis' direction: {hint}"
            );
        }
    }

    #[test]
    fn test_atom_tables_avoid_forbidden_terms() {
        for table in [
            &MOVEMENT_PHRASES,
            &ARC_PHRASES,
            &RHYTHM_PHRASES,
            &DENSITY_PHRASES,
            &MOTIF_PHRASES,
        ] {
            for phrase in table {
                assert_eq!(
                    contains_forbidden(phrase),
                    None,
                    "atom phrase must stay quality-neutral: {phrase}"
                );
            }
        }
    }

    #[test]
    fn test_realization_is_byte_deterministic() {
        let report = report_failing(&["melody_arc"]);
        let a = realize_text(&control(0.6), &report, "0123abcd");
        let b = realize_text(&control(0.6), &report, "0123abcd");
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_buckets_drive_atom_selection() {
        let sparse = realize_text(&control(0.2), &report_failing(&[]), "00");
        let dense = realize_text(&control(0.9), &report_failing(&[]), "00");
        assert_ne!(sparse.atoms.density_desc, dense.atoms.density_desc);
        assert_eq!(sparse.atoms.density_desc, DENSITY_PHRASES[0]);
        assert_eq!(dense.atoms.density_desc, DENSITY_PHRASES[2]);
    }
}
