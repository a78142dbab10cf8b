//! Input Generator - random matrix-operation problem instances
//!
//! Every instance is a pure function of `(GeneratorConfig, seed)`, so a seed
//! printed next to a finding regenerates the exact bytes that were sent to
//! both executables.
//!
//! # Wire text
//!
//! ```text
//! <domain code>
//! <operation code>
//! <rows>            ┐
//! <cols>            │ once per operand
//! c,c,...,c,        │ `rows` lines of `cols` comma-terminated cells
//! ...               ┘
//! ```

use std::fmt::Write as _;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;
use crate::core_types::{MatrixShape, NumericDomain, Operation};
use crate::error::WireError;
use crate::wire;

/// Decimal places kept for Real cells
pub const REAL_DECIMALS: i32 = 4;
/// Decimal places kept for each part of a Complex cell
pub const COMPLEX_DECIMALS: i32 = 2;

/// How operand shapes of binary operations relate to each other.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ShapePolicy {
    /// Every dimension drawn independently. Most Addition/Multiplication
    /// instances are then dimensionally invalid, which exercises the
    /// executables' own shape validation.
    #[default]
    Independent,
    /// Addition operands share one shape; Multiplication operands satisfy
    /// `cols(lhs) == rows(rhs)`.
    Compatible,
}

/// Same spelling as the `--shape-policy` value and the YAML key.
impl std::fmt::Display for ShapePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Independent => f.write_str("independent"),
            Self::Compatible => f.write_str("compatible"),
        }
    }
}

/// One fully encoded request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemInstance {
    seed: Option<u64>,
    domain: NumericDomain,
    operation: Operation,
    shapes: Vec<MatrixShape>,
    text: String,
}

impl ProblemInstance {
    /// Wrap externally supplied wire text (a saved finding, a hand-written
    /// case). The text is validated but kept byte-for-byte.
    pub fn from_wire(text: impl Into<String>, max_dim: usize) -> Result<Self, WireError> {
        let text = text.into();
        let parsed = wire::parse_instance(&text, max_dim)?;
        Ok(Self {
            seed: None,
            domain: parsed.domain,
            operation: parsed.operation,
            shapes: parsed.operands.iter().map(|m| m.shape).collect(),
            text,
        })
    }

    /// Seed that regenerates this instance; `None` if it was not generated.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn domain(&self) -> NumericDomain {
        self.domain
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn shapes(&self) -> &[MatrixShape] {
        &self.shapes
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Short human label, e.g. `real multiplication 3x4 * 2x2`.
    pub fn summary(&self) -> String {
        let shapes: Vec<String> = self.shapes.iter().map(|s| s.to_string()).collect();
        format!("{} {} {}", self.domain, self.operation, shapes.join(" * "))
    }
}

/// Seeded instance generator.
pub struct InputGenerator<'a> {
    config: &'a GeneratorConfig,
    rng: StdRng,
}

impl<'a> InputGenerator<'a> {
    pub fn new(config: &'a GeneratorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw domain, operation, shapes and cells, in that order.
    pub fn draw(&mut self) -> (NumericDomain, Operation, Vec<MatrixShape>, String) {
        let domain = NumericDomain::ALL[self.rng.gen_range(0..NumericDomain::ALL.len())];
        let operation = Operation::ALL[self.rng.gen_range(0..Operation::ALL.len())];
        let shapes = self.draw_shapes(operation);

        let mut text = String::new();
        let _ = writeln!(text, "{}", domain.code());
        let _ = writeln!(text, "{}", operation.code());
        for shape in &shapes {
            let _ = writeln!(text, "{}", shape.rows());
            let _ = writeln!(text, "{}", shape.cols());
            self.write_body(&mut text, domain, *shape);
        }

        (domain, operation, shapes, text)
    }

    fn draw_dim(&mut self) -> usize {
        self.rng.gen_range(1..=self.config.max_dim)
    }

    fn draw_shape(&mut self) -> MatrixShape {
        let rows = self.draw_dim();
        let cols = self.draw_dim();
        MatrixShape::from_drawn(rows, cols)
    }

    fn draw_shapes(&mut self, operation: Operation) -> Vec<MatrixShape> {
        let lhs = self.draw_shape();
        match (operation, self.config.shape_policy) {
            (Operation::Transpose, _) => vec![lhs],
            (Operation::Addition, ShapePolicy::Compatible) => vec![lhs, lhs],
            (Operation::Multiplication, ShapePolicy::Compatible) => {
                let cols = self.draw_dim();
                vec![lhs, MatrixShape::from_drawn(lhs.cols(), cols)]
            }
            (_, ShapePolicy::Independent) => vec![lhs, self.draw_shape()],
        }
    }

    fn write_body(&mut self, text: &mut String, domain: NumericDomain, shape: MatrixShape) {
        for _ in 0..shape.rows() {
            for _ in 0..shape.cols() {
                let cell = self.draw_cell(domain);
                text.push_str(&cell);
                text.push(',');
            }
            text.push('\n');
        }
    }

    fn draw_cell(&mut self, domain: NumericDomain) -> String {
        let (min, max) = (self.config.min_value, self.config.max_value);
        match domain {
            NumericDomain::Integer => self.rng.gen_range(min..=max).to_string(),
            NumericDomain::Real => {
                let value = self.rng.gen_range(min as f64..=max as f64);
                format_decimal(value, REAL_DECIMALS)
            }
            NumericDomain::Complex => {
                let sign = if self.rng.gen_bool(0.5) { '+' } else { '-' };
                let re = self.rng.gen_range(min as f64..=max as f64);
                let im = self.rng.gen_range(min as f64..=max as f64);
                format!(
                    "{}{}{}i",
                    format_decimal(re, COMPLEX_DECIMALS),
                    sign,
                    format_decimal(im, COMPLEX_DECIMALS)
                )
            }
        }
    }
}

/// Generate the instance identified by `seed`.
pub fn generate_instance(config: &GeneratorConfig, seed: u64) -> ProblemInstance {
    let (domain, operation, shapes, text) = InputGenerator::new(config, seed).draw();
    ProblemInstance {
        seed: Some(seed),
        domain,
        operation,
        shapes,
        text,
    }
}

/// Round to `places` decimals and render the shortest form that reads back
/// to the same value, always with a decimal point (`3.0`, `-0.5`, `7.1234`).
pub fn format_decimal(value: f64, places: i32) -> String {
    let scale = 10f64.powi(places);
    let rounded = (value * scale).round() / scale;
    let mut rendered = rounded.to_string();
    if !rendered.contains('.') {
        rendered.push_str(".0");
    }
    rendered
}
