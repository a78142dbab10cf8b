//! Core types used throughout the harness
//!
//! Domain, operation and shape are shared by the generator (which emits them),
//! the wire checker (which parses them back) and the reporter.

use std::fmt;

/// Numeric domain of every cell in a problem instance.
///
/// The discriminant is the code written on the first line of the wire text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericDomain {
    Integer = 1,
    Real = 2,
    Complex = 3,
}

impl NumericDomain {
    pub const ALL: [NumericDomain; 3] = [Self::Integer, Self::Real, Self::Complex];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Integer),
            2 => Some(Self::Real),
            3 => Some(Self::Complex),
            _ => None,
        }
    }
}

impl fmt::Display for NumericDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Complex => "complex",
        };
        f.write_str(name)
    }
}

/// Matrix operation requested from both executables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Addition = 1,
    Multiplication = 2,
    Transpose = 3,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Self::Addition, Self::Multiplication, Self::Transpose];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Addition),
            2 => Some(Self::Multiplication),
            3 => Some(Self::Transpose),
            _ => None,
        }
    }

    /// Number of operand matrices that follow the header.
    pub fn operand_count(self) -> usize {
        match self {
            Self::Addition | Self::Multiplication => 2,
            Self::Transpose => 1,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Addition => "addition",
            Self::Multiplication => "multiplication",
            Self::Transpose => "transpose",
        };
        f.write_str(name)
    }
}

/// Matrix dimensions. Both are always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixShape {
    rows: usize,
    cols: usize,
}

impl MatrixShape {
    /// Returns `None` when either dimension is zero.
    pub fn new(rows: usize, cols: usize) -> Option<Self> {
        (rows >= 1 && cols >= 1).then_some(Self { rows, cols })
    }

    /// For dimensions drawn from `1..=max_dim`.
    pub(crate) fn from_drawn(rows: usize, cols: usize) -> Self {
        debug_assert!(rows >= 1 && cols >= 1);
        Self { rows, cols }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }
}

impl fmt::Display for MatrixShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Which of the two compared executables a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Reference,
    Candidate,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Candidate => f.write_str("candidate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for domain in NumericDomain::ALL {
            assert_eq!(NumericDomain::from_code(domain.code()), Some(domain));
        }
        for op in Operation::ALL {
            assert_eq!(Operation::from_code(op.code()), Some(op));
        }
        assert_eq!(NumericDomain::from_code(0), None);
        assert_eq!(Operation::from_code(4), None);
    }

    #[test]
    fn test_operand_count() {
        assert_eq!(Operation::Addition.operand_count(), 2);
        assert_eq!(Operation::Multiplication.operand_count(), 2);
        assert_eq!(Operation::Transpose.operand_count(), 1);
    }

    #[test]
    fn test_shape_rejects_zero() {
        assert!(MatrixShape::new(0, 3).is_none());
        assert!(MatrixShape::new(3, 0).is_none());
        let shape = MatrixShape::new(2, 5).unwrap();
        assert_eq!(shape.cell_count(), 10);
        assert_eq!(shape.to_string(), "2x5");
    }
}
