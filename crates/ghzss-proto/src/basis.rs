//! Measurement bases and outcome bits.

use std::{fmt, ops::BitXor, str::FromStr};

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::ProtoError;

/// Measurement basis.
///
/// Only the Pauli X and Y observables are legal. A value of any other kind on
/// the wire fails to decode, which the protocol layer treats as a violation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Basis {
    /// Pauli X.
    X = 0,
    /// Pauli Y.
    Y = 1,
}

impl Basis {
    /// Both legal bases, in wire order.
    pub const ALL: [Self; 2] = [Self::X, Self::Y];

    /// True for the Y basis.
    pub fn is_y(self) -> bool {
        matches!(self, Self::Y)
    }
}

impl TryFrom<u8> for Basis {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::X),
            1 => Ok(Self::Y),
            other => Err(ProtoError::InvalidBasis(other.to_string())),
        }
    }
}

impl FromStr for Basis {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "X" | "x" => Ok(Self::X),
            "Y" | "y" => Ok(Self::Y),
            other => Err(ProtoError::InvalidBasis(other.to_string())),
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("X"),
            Self::Y => f.write_str("Y"),
        }
    }
}

/// A single measurement outcome bit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Outcome {
    /// Bit 0, eigenvalue +1.
    Zero = 0,
    /// Bit 1, eigenvalue -1.
    One = 1,
}

impl Outcome {
    /// Build an outcome from a boolean (`true` is 1).
    pub fn from_bool(bit: bool) -> Self {
        if bit { Self::One } else { Self::Zero }
    }

    /// The outcome as a bit.
    pub fn as_bit(self) -> u8 {
        self as u8
    }

    /// The observable's eigenvalue for this outcome: +1 for 0, -1 for 1.
    pub fn eigenvalue(self) -> i8 {
        match self {
            Self::Zero => 1,
            Self::One => -1,
        }
    }

    /// The opposite bit.
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }
}

impl BitXor for Outcome {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Self::from_bool(self != rhs)
    }
}

impl TryFrom<u8> for Outcome {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Zero),
            1 => Ok(Self::One),
            other => Err(ProtoError::InvalidOutcome(other)),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_bit())
    }
}
