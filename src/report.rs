//! Finding reports - console text and on-disk artifacts
//!
//! Section banners follow the layout operators already know from the
//! console driver:
//!
//! ```text
//! ============= INPUT =============
//! <instance text>
//! =================================
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ConfigSource, GeneratorConfig};
use crate::core_types::Role;
use crate::driver::{Finding, RoundOutcome, TextEncoding};
use crate::executor::{ExecutionResult, ExitState};
use crate::generator::ShapePolicy;

const RULE: &str = "================================";

/// Arguments `matrix_diff generate` needs to rebuild a finding's instance:
/// the config it was loaded from and the effective shape policy, which a
/// `run --shape-policy` override may have changed.
#[derive(Debug, Clone, Default)]
pub struct Replay {
    source: ConfigSource,
    shape_policy: ShapePolicy,
}

impl Replay {
    pub fn new(source: ConfigSource, generator: &GeneratorConfig) -> Self {
        Self {
            source,
            shape_policy: generator.shape_policy,
        }
    }

    pub fn command(&self, seed: u64) -> String {
        let mut parts = vec!["matrix_diff".to_string()];
        parts.extend(self.source.cli_args());
        parts.push("generate".into());
        parts.push(format!("--seed {}", seed));
        parts.push(format!("--shape-policy {}", self.shape_policy));
        parts.join(" ")
    }
}

fn banner(out: &mut String, title: &str) {
    let _ = writeln!(out, "============= {} =============", title);
}

fn describe_exit(result: &ExecutionResult) -> String {
    match result.exit {
        ExitState::Exited(Some(code)) => format!("exit {}", code),
        ExitState::Exited(None) => "killed by signal".to_string(),
        ExitState::TimedOut => "TIMED OUT, partial output".to_string(),
    }
}

fn write_output(out: &mut String, result: &ExecutionResult, encoding: TextEncoding) {
    let title = match result.role {
        Role::Reference => "REFERENCE",
        Role::Candidate => "CANDIDATE",
    };
    banner(
        out,
        &format!(
            "{} ({}, {}, {} ms)",
            title,
            result.program,
            describe_exit(result),
            result.elapsed.as_millis()
        ),
    );
    match encoding.decode(&result.output) {
        Ok(text) => {
            let _ = writeln!(out, "{}", text);
        }
        Err(fault) => {
            let _ = writeln!(out, "[{}; raw bytes escaped below]", fault);
            let _ = writeln!(out, "{}", result.output.escape_ascii());
        }
    }
    let _ = writeln!(out, "{}", RULE);
}

/// Full labeled report for a non-matching round; `None` for `Match`.
pub fn render_outcome(
    outcome: &RoundOutcome,
    encoding: TextEncoding,
    replay: &Replay,
) -> Option<String> {
    let finding = outcome.finding()?;
    Some(render_finding(outcome.label(), finding, encoding, replay))
}

pub fn render_finding(
    label: &str,
    finding: &Finding,
    encoding: TextEncoding,
    replay: &Replay,
) -> String {
    let mut out = String::new();
    banner(&mut out, label);
    let _ = writeln!(out, "instance: {}", finding.instance.summary());
    match finding.instance.seed() {
        Some(seed) => {
            let _ = writeln!(out, "replay:   {}", replay.command(seed));
        }
        None => {
            let _ = writeln!(out, "replay:   (instance not generated from a seed)");
        }
    }

    banner(&mut out, "INPUT");
    let _ = writeln!(out, "{}", finding.instance.text());
    let _ = writeln!(out, "{}", RULE);

    write_output(&mut out, &finding.reference, encoding);
    write_output(&mut out, &finding.candidate, encoding);
    out
}

/// Persist a finding under `dir/<timestamp>-<label>/` and return that path.
///
/// Outputs are written as raw bytes so undecodable captures survive intact.
pub fn write_artifacts(
    dir: &Path,
    label: &str,
    finding: &Finding,
    report: &str,
) -> std::io::Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let slug = label.to_lowercase().replace(' ', "-");
    let name = match finding.instance.seed() {
        Some(seed) => format!("{}-{}-seed{}", stamp, slug, seed),
        None => format!("{}-{}", stamp, slug),
    };
    let target = dir.join(name);
    fs::create_dir_all(&target)?;

    fs::write(target.join("input.txt"), finding.instance.as_bytes())?;
    fs::write(target.join("reference.out"), &finding.reference.output)?;
    fs::write(target.join("candidate.out"), &finding.candidate.output)?;
    fs::write(target.join("report.txt"), report)?;
    Ok(target)
}
