//! Comparison Driver - rounds and the session state machine
//!
//! ```text
//!            Match
//!          ┌───────┐
//!          ▼       │
//!      ┌─────────┐ │   mismatch / timeout / bad encoding
//!      │ Running │─┴──────────────────────────────────────▶ Halted(Finding)
//!      └─────────┘──── max_rounds reached ─────────────────▶ Halted(RoundLimit)
//!           └───────── Ctrl-C ─────────────────────────────▶ Halted(Interrupted)
//! ```
//!
//! Launch failures are not a state: they abort the session as errors.

use std::future::Future;
use std::io::Write;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{GeneratorConfig, HarnessConfig};
use crate::core_types::Role;
use crate::error::HarnessError;
use crate::executor::{ExecutionResult, run_executable};
use crate::generator::{ProblemInstance, generate_instance};

// ============================================================
// DECODING & COMPARISON
// ============================================================

/// Text encoding both outputs must decode under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    Ascii,
    Utf8,
}

impl TextEncoding {
    pub fn decode(self, bytes: &[u8]) -> Result<String, EncodingFault> {
        match self {
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
                Some(offset) => Err(EncodingFault {
                    encoding: self,
                    offset,
                    byte: bytes[offset],
                }),
            },
            Self::Utf8 => match std::str::from_utf8(bytes) {
                Ok(text) => Ok(text.to_owned()),
                Err(e) => Err(EncodingFault {
                    encoding: self,
                    offset: e.valid_up_to(),
                    byte: bytes[e.valid_up_to()],
                }),
            },
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ascii => f.write_str("ascii"),
            Self::Utf8 => f.write_str("utf-8"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("byte 0x{byte:02x} at offset {offset} is not valid {encoding}")]
pub struct EncodingFault {
    pub encoding: TextEncoding,
    pub offset: usize,
    pub byte: u8,
}

/// Exact equality; no whitespace or numeric tolerance.
pub fn compare_outputs(reference: &str, candidate: &str) -> bool {
    reference == candidate
}

// ============================================================
// ROUND
// ============================================================

/// Everything needed to inspect a divergent round by hand.
#[derive(Debug, Clone)]
pub struct Finding {
    pub instance: ProblemInstance,
    pub reference: ExecutionResult,
    pub candidate: ExecutionResult,
}

impl Finding {
    pub fn result(&self, role: Role) -> &ExecutionResult {
        match role {
            Role::Reference => &self.reference,
            Role::Candidate => &self.candidate,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RoundOutcome {
    Match,
    /// Outputs decoded but differ
    Mismatch(Box<Finding>),
    /// At least one executable hit the round deadline
    Timeout(Box<Finding>),
    /// At least one output is not valid under the configured encoding
    Encoding(Box<Finding>),
}

impl RoundOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }

    pub fn finding(&self) -> Option<&Finding> {
        match self {
            Self::Match => None,
            Self::Mismatch(f) | Self::Timeout(f) | Self::Encoding(f) => Some(f),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Mismatch(_) => "MISMATCH",
            Self::Timeout(_) => "TIMEOUT",
            Self::Encoding(_) => "ENCODING ANOMALY",
        }
    }
}

/// Classify two finished runs. Timeouts win over encoding faults, which win
/// over plain comparison.
pub fn classify(
    instance: ProblemInstance,
    reference: ExecutionResult,
    candidate: ExecutionResult,
    encoding: TextEncoding,
) -> RoundOutcome {
    let timed_out = reference.timed_out() || candidate.timed_out();
    let decoded = (
        encoding.decode(&reference.output),
        encoding.decode(&candidate.output),
    );
    let finding = || {
        Box::new(Finding {
            instance,
            reference,
            candidate,
        })
    };

    if timed_out {
        return RoundOutcome::Timeout(finding());
    }
    match decoded {
        (Ok(r), Ok(c)) if compare_outputs(&r, &c) => RoundOutcome::Match,
        (Ok(_), Ok(_)) => RoundOutcome::Mismatch(finding()),
        _ => RoundOutcome::Encoding(finding()),
    }
}

/// Run both executables on the same bytes, concurrently, and classify.
pub async fn run_round(
    config: &HarnessConfig,
    instance: ProblemInstance,
) -> Result<RoundOutcome, HarnessError> {
    let timeout = config.round_timeout();
    let (reference, candidate) = {
        let input = instance.as_bytes();
        tokio::try_join!(
            run_executable(Role::Reference, &config.reference, input, timeout),
            run_executable(Role::Candidate, &config.candidate, input, timeout),
        )?
    };
    Ok(classify(instance, reference, candidate, config.encoding))
}

// ============================================================
// SESSION
// ============================================================

#[derive(Debug, Clone)]
pub enum HaltReason {
    /// Never `RoundOutcome::Match`
    Finding(RoundOutcome),
    RoundLimit,
    Interrupted,
}

#[derive(Debug, Clone)]
pub enum SessionState {
    Running,
    Halted(HaltReason),
}

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Completed rounds (an interrupted round is not counted)
    pub rounds: u64,
    pub matches: u64,
    pub total_round_time: Duration,
    pub max_round_time: Duration,
}

impl SessionStats {
    fn record(&mut self, elapsed: Duration, matched: bool) {
        self.rounds += 1;
        if matched {
            self.matches += 1;
        }
        self.total_round_time += elapsed;
        self.max_round_time = self.max_round_time.max(elapsed);
    }

    pub fn avg_round_time(&self) -> Option<Duration> {
        // u128 nanoseconds; `Duration / u32` would truncate the round count
        (self.rounds > 0).then(|| {
            let nanos = self.total_round_time.as_nanos() / u128::from(self.rounds);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        })
    }
}

/// Seed of round `round` (0-based) in a session seeded with `session_seed`.
///
/// `matrix_diff generate --seed S --count N` therefore prints exactly the
/// first N instances of a session seeded with S.
pub fn round_seed(session_seed: u64, round: u64) -> u64 {
    session_seed.wrapping_add(round)
}

/// Wire text of the first `count` rounds of a session seeded `seed`.
///
/// Each instance is preceded by `# seed N` when there is more than one, or
/// when the seed was drawn here and would otherwise be lost.
pub fn replay_listing(config: &GeneratorConfig, seed: Option<u64>, count: u64) -> String {
    let annotate = count > 1 || seed.is_none();
    let session_seed = seed.unwrap_or_else(rand::random);
    let mut out = String::new();
    for round in 0..count {
        let seed = round_seed(session_seed, round);
        if annotate {
            out.push_str(&format!("# seed {}\n", seed));
        }
        out.push_str(generate_instance(config, seed).text());
    }
    out
}

pub struct Session {
    config: HarnessConfig,
    session_seed: u64,
    state: SessionState,
    stats: SessionStats,
    show_progress: bool,
}

impl Session {
    pub fn new(config: HarnessConfig) -> Self {
        let session_seed = config.seed.unwrap_or_else(rand::random);
        Self {
            config,
            session_seed,
            state: SessionState::Running,
            stats: SessionStats::default(),
            show_progress: false,
        }
    }

    /// Print one `.` per matched round on stdout.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn session_seed(&self) -> u64 {
        self.session_seed
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running)
    }

    fn halt(&mut self, reason: HaltReason) {
        debug!(?reason, "session halted");
        self.state = SessionState::Halted(reason);
    }

    /// Instance for the next round.
    pub fn next_instance(&self) -> ProblemInstance {
        generate_instance(
            &self.config.generator,
            round_seed(self.session_seed, self.stats.rounds),
        )
    }

    /// Run one round and apply the transition. No-op once halted.
    pub async fn step(&mut self) -> Result<(), HarnessError> {
        if !self.is_running() {
            return Ok(());
        }
        let instance = self.next_instance();
        debug!(
            round = self.stats.rounds,
            seed = ?instance.seed(),
            "round: {}",
            instance.summary()
        );

        let started = Instant::now();
        let outcome = run_round(&self.config, instance).await?;
        self.stats.record(started.elapsed(), outcome.is_match());

        if outcome.is_match() {
            if self.show_progress {
                let mut stdout = std::io::stdout();
                let _ = write!(stdout, ".");
                let _ = stdout.flush();
            }
            let every = self.config.progress_log_interval;
            if every > 0 && self.stats.rounds % every == 0 {
                info!(
                    rounds = self.stats.rounds,
                    avg_round = ?self.stats.avg_round_time(),
                    max_round = ?self.stats.max_round_time,
                    "progress"
                );
            }
        } else {
            warn!(round = self.stats.rounds, "{}", outcome.label());
            self.halt(HaltReason::Finding(outcome));
        }
        Ok(())
    }

    /// Loop until a finding, the round limit, or `shutdown` resolves.
    ///
    /// A round in flight when `shutdown` fires is dropped, which kills both
    /// children.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<&SessionState, HarnessError>
    where
        F: Future<Output = ()>,
    {
        info!(
            session_seed = self.session_seed,
            reference = %self.config.reference.program,
            candidate = %self.config.candidate.program,
            "session started"
        );
        tokio::pin!(shutdown);

        while self.is_running() {
            if let Some(limit) = self.config.max_rounds
                && self.stats.rounds >= limit
            {
                self.halt(HaltReason::RoundLimit);
                break;
            }

            let stepped = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                result = self.step() => Some(result),
            };
            match stepped {
                Some(result) => result?,
                None => self.halt(HaltReason::Interrupted),
            }
        }

        info!(
            rounds = self.stats.rounds,
            matches = self.stats.matches,
            "session finished"
        );
        Ok(&self.state)
    }
}
