// Starweave Composition Planner — CLI entry point.
//
// Plans one composition from a feature vector, scores it, gates it, and
// prints the realized text. The pipeline: guidance → plan → critics →
// gate → text.
//
// Usage:
//   cargo run -p starweave_music -- [--features a,b,c,d,e,f] [--chart chart.json]
//     [--gate-config gate.json] [--tier dev|preprod|prod] [--json out.json]
//
// The feature list is tempo, brightness, density, arc, motif, cadence,
// each in [0,1]. --chart supplies chart signals from which guidance biases
// are derived. An invalid gate configuration is fatal before any planning
// happens.

use starweave_music::compose::compose_from_slice;
use starweave_music::gate::{GateConfig, TierLevel};
use starweave_music::guidance::{derive_guidance, ChartSignals};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    let features_arg: String = parse_flag(&args, "--features")
        .unwrap_or_else(|| "0.8,0.6,0.7,0.65,0.357,0.5".to_string());
    let chart_path: Option<String> = parse_flag(&args, "--chart");
    let config_path: Option<String> = parse_flag(&args, "--gate-config");
    let tier_name: String = parse_flag(&args, "--tier").unwrap_or_else(|| "dev".to_string());
    let json_path: Option<String> = parse_flag(&args, "--json");

    let Some(tier) = TierLevel::parse(&tier_name) else {
        eprintln!("Unknown tier '{tier_name}'. Use dev, preprod, or prod.");
        return ExitCode::FAILURE;
    };

    // Load and validate the gate configuration before anything else; an
    // out-of-bounds threshold must never reach the request path.
    let config = match config_path {
        Some(path) => match GateConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Gate config rejected: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => GateConfig::default(),
    };

    let features: Vec<f64> = match features_arg
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect()
    {
        Ok(values) => values,
        Err(e) => {
            eprintln!("Cannot parse --features '{features_arg}': {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("=== Starweave Composition Planner ===");
    println!("Features: {features:?}");
    println!("Tier: {tier:?}");
    println!();

    println!("[1/4] Resolving guidance...");
    let guidance = match chart_path {
        Some(path) => {
            let json = match std::fs::read_to_string(&path) {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("Cannot read chart file {path}: {e}");
                    return ExitCode::FAILURE;
                }
            };
            let signals: ChartSignals = match serde_json::from_str(&json) {
                Ok(signals) => signals,
                Err(e) => {
                    eprintln!("Cannot parse chart file {path}: {e}");
                    return ExitCode::FAILURE;
                }
            };
            let guidance = derive_guidance(&signals);
            println!(
                "  Chart biases: tempo {:+.2}, arc {:+.2}, density {:+.2}, motif {}, cadence {}",
                guidance.tempo_bias.unwrap_or(0.0),
                guidance.arc_bias.unwrap_or(0.0),
                guidance.density_bias.unwrap_or(0.0),
                guidance.motif_idx.unwrap_or(0),
                guidance.cadence_idx.unwrap_or(0),
            );
            Some(guidance)
        }
        None => {
            println!("  No chart supplied; vector-derived defaults apply.");
            None
        }
    };

    println!("[2/4] Planning composition...");
    let result = match compose_from_slice(&features, guidance.as_ref(), &config, tier) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Rejected input: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!(
        "  {} | {} | {} bpm | {:.1}s | {} events",
        result.plan.id,
        result.plan.key,
        result.plan.bpm,
        result.plan.duration_sec,
        result.plan.events.len(),
    );
    print!("{}", indent(&result.plan.summary()));

    println!("[3/4] Scoring and gating...");
    for (axis, score) in &result.report.scores {
        let calibrated = if result.report.calibrated.axes[axis] { "pass" } else { "FAIL" };
        let strict = if result.report.strict.axes[axis] { "pass" } else { "fail" };
        println!("  {axis:<22} {score:>5.2}  calibrated {calibrated}, strict {strict}");
    }
    println!(
        "  Overall: calibrated {}, strict {}  ({:.2} ms total)",
        verdict(result.report.calibrated.overall),
        verdict(result.report.strict.overall),
        result.report.latency_ms.total,
    );

    println!("[4/4] Realizing text...");
    println!("  {}", result.text.short);
    for hint in &result.text.hints {
        println!("    {hint}");
    }

    if let Some(path) = json_path {
        match serde_json::to_string_pretty(&result) {
            Ok(body) => {
                if let Err(e) = std::fs::write(&path, body) {
                    eprintln!("Cannot write {path}: {e}");
                    return ExitCode::FAILURE;
                }
                println!();
                println!("Composition written to {path}");
            }
            Err(e) => {
                eprintln!("Cannot serialize composition: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn verdict(pass: bool) -> &'static str {
    if pass { "PASS" } else { "FAIL" }
}

fn indent(block: &str) -> String {
    block
        .lines()
        .map(|line| format!("  {line}\n"))
        .collect()
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
