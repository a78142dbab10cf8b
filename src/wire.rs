//! Wire format checker
//!
//! Parses instance text back into header, shapes and cell tokens, enforcing
//! the exact line layout both executables read positionally: every cell is
//! comma-terminated (the last one too) and every line ends in `\n`.

use crate::core_types::{MatrixShape, NumericDomain, Operation};
use crate::error::WireError;
use crate::generator::{COMPLEX_DECIMALS, REAL_DECIMALS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMatrix {
    pub shape: MatrixShape,
    /// Cell tokens in row-major order, without the trailing commas
    pub cells: Vec<String>,
}

impl ParsedMatrix {
    pub fn row(&self, index: usize) -> &[String] {
        let cols = self.shape.cols();
        &self.cells[index * cols..(index + 1) * cols]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstance {
    pub domain: NumericDomain,
    pub operation: Operation,
    pub operands: Vec<ParsedMatrix>,
}

struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Split<'a, char>>,
    last: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split('\n').enumerate(),
            last: 0,
        }
    }

    /// Next complete line with its 1-based number.
    fn next_line(&mut self, what: &str) -> Result<(usize, &'a str), WireError> {
        match self.inner.next() {
            Some((idx, line)) => {
                self.last = idx + 1;
                Ok((idx + 1, line))
            }
            None => Err(WireError::new(self.last + 1, format!("expected {what}"))),
        }
    }
}

pub fn parse_instance(text: &str, max_dim: usize) -> Result<ParsedInstance, WireError> {
    if !text.is_ascii() {
        return Err(WireError::new(1, "instance text must be ASCII"));
    }
    if !text.ends_with('\n') {
        return Err(WireError::new(
            text.split('\n').count(),
            "last line is not newline-terminated",
        ));
    }

    let mut lines = Lines::new(text);

    let (n, line) = lines.next_line("domain code")?;
    let domain = parse_code(line)
        .and_then(NumericDomain::from_code)
        .ok_or_else(|| WireError::new(n, format!("invalid domain code '{line}'")))?;

    let (n, line) = lines.next_line("operation code")?;
    let operation = parse_code(line)
        .and_then(Operation::from_code)
        .ok_or_else(|| WireError::new(n, format!("invalid operation code '{line}'")))?;

    let mut operands = Vec::with_capacity(operation.operand_count());
    for _ in 0..operation.operand_count() {
        let rows = parse_dim(&mut lines, "row count", max_dim)?;
        let cols = parse_dim(&mut lines, "column count", max_dim)?;
        let shape = MatrixShape::from_drawn(rows, cols);

        let mut cells = Vec::with_capacity(shape.cell_count());
        for _ in 0..rows {
            let (n, line) = lines.next_line("matrix row")?;
            let body = line
                .strip_suffix(',')
                .ok_or_else(|| WireError::new(n, "row is not comma-terminated"))?;
            let tokens: Vec<&str> = body.split(',').collect();
            if tokens.len() != cols {
                return Err(WireError::new(
                    n,
                    format!("expected {} cells, found {}", cols, tokens.len()),
                ));
            }
            for token in tokens {
                if !is_valid_cell(domain, token) {
                    return Err(WireError::new(
                        n,
                        format!("'{token}' is not a valid {domain} cell"),
                    ));
                }
                cells.push(token.to_string());
            }
        }
        operands.push(ParsedMatrix { shape, cells });
    }

    // `split` leaves one empty piece after the final newline
    match lines.next_line("end of input") {
        Ok((_, "")) if lines.inner.next().is_none() => {}
        Ok((n, _)) => return Err(WireError::new(n, "unexpected trailing content")),
        Err(_) => {}
    }

    Ok(ParsedInstance {
        domain,
        operation,
        operands,
    })
}

fn parse_code(line: &str) -> Option<u8> {
    if line.len() == 1 { line.parse().ok() } else { None }
}

fn parse_dim(lines: &mut Lines<'_>, what: &str, max_dim: usize) -> Result<usize, WireError> {
    let (n, line) = lines.next_line(what)?;
    let value: usize = line
        .bytes()
        .all(|b| b.is_ascii_digit())
        .then(|| line.parse().ok())
        .flatten()
        .ok_or_else(|| WireError::new(n, format!("{what} '{line}' is not a positive integer")))?;
    if value == 0 || value > max_dim {
        return Err(WireError::new(
            n,
            format!("{what} {value} outside 1..={max_dim}"),
        ));
    }
    Ok(value)
}

pub fn is_valid_cell(domain: NumericDomain, token: &str) -> bool {
    match domain {
        NumericDomain::Integer => is_integer(token),
        NumericDomain::Real => is_decimal(token, REAL_DECIMALS as usize),
        NumericDomain::Complex => split_complex(token).is_some_and(|(re, im)| {
            is_decimal(re, COMPLEX_DECIMALS as usize) && is_decimal(im, COMPLEX_DECIMALS as usize)
        }),
    }
}

/// Split `<re><+|-><im>i` into its parts. The imaginary part keeps its own
/// sign, so `1.5+-2.25i` yields `("1.5", "-2.25")`.
pub fn split_complex(token: &str) -> Option<(&str, &str)> {
    let body = token.strip_suffix('i')?;
    let sep = body
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '+' || c == '-')
        .map(|(idx, _)| idx)?;
    let (re, rest) = body.split_at(sep);
    Some((re, &rest[1..]))
}

fn is_integer(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `-?digits.digits` with 1..=max_frac fractional digits.
fn is_decimal(token: &str, max_frac: usize) -> bool {
    let unsigned = token.strip_prefix('-').unwrap_or(token);
    let Some((int, frac)) = unsigned.split_once('.') else {
        return false;
    };
    !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && (1..=max_frac).contains(&frac.len())
        && frac.bytes().all(|b| b.is_ascii_digit())
}
