//! Movement directions accepted by the gaits

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::GaitError;
use crate::geometry::Vector2D;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const DIAGONAL: f64 = 0.707;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The fixed table of named travel directions.
///
/// Body frame: `+y` is forward and `+x` is to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamedDirection {
    Forward,
    Backward,
    Left,
    Right,
    DiagonalFr,
    DiagonalFl,
    DiagonalBr,
    DiagonalBl,
    Stop,
}

/// A travel direction given either by name or as a raw vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    Named(NamedDirection),
    Vector(Vector2D),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NamedDirection {
    pub const ALL: [NamedDirection; 9] = [
        Self::Forward,
        Self::Backward,
        Self::Left,
        Self::Right,
        Self::DiagonalFr,
        Self::DiagonalFl,
        Self::DiagonalBr,
        Self::DiagonalBl,
        Self::Stop,
    ];

    pub fn as_vector(&self) -> Vector2D {
        match self {
            Self::Forward => Vector2D::new(0.0, 1.0),
            Self::Backward => Vector2D::new(0.0, -1.0),
            Self::Left => Vector2D::new(-1.0, 0.0),
            Self::Right => Vector2D::new(1.0, 0.0),
            Self::DiagonalFr => Vector2D::new(DIAGONAL, DIAGONAL),
            Self::DiagonalFl => Vector2D::new(-DIAGONAL, DIAGONAL),
            Self::DiagonalBr => Vector2D::new(DIAGONAL, -DIAGONAL),
            Self::DiagonalBl => Vector2D::new(-DIAGONAL, -DIAGONAL),
            Self::Stop => Vector2D::zeros(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Left => "left",
            Self::Right => "right",
            Self::DiagonalFr => "diagonal-fr",
            Self::DiagonalFl => "diagonal-fl",
            Self::DiagonalBr => "diagonal-br",
            Self::DiagonalBl => "diagonal-bl",
            Self::Stop => "stop",
        }
    }
}

impl FromStr for NamedDirection {
    type Err = GaitError;

    /// Accepts the table names plus the spoken forms such as `forward right` and `neutral`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(&[' ', '_'][..], "-");

        match key.as_str() {
            "forward" => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "diagonal-fr" | "forward-right" => Ok(Self::DiagonalFr),
            "diagonal-fl" | "forward-left" => Ok(Self::DiagonalFl),
            "diagonal-br" | "backward-right" => Ok(Self::DiagonalBr),
            "diagonal-bl" | "backward-left" => Ok(Self::DiagonalBl),
            "stop" | "neutral" => Ok(Self::Stop),
            _ => Err(GaitError::UnknownDirection(s.into())),
        }
    }
}

impl Direction {
    pub fn as_vector(&self) -> Vector2D {
        match self {
            Self::Named(n) => n.as_vector(),
            Self::Vector(v) => *v,
        }
    }
}

impl FromStr for Direction {
    type Err = GaitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::Named(s.parse()?))
    }
}

impl From<NamedDirection> for Direction {
    fn from(n: NamedDirection) -> Self {
        Self::Named(n)
    }
}

impl From<Vector2D> for Direction {
    fn from(v: Vector2D) -> Self {
        Self::Vector(v)
    }
}

impl From<(f64, f64)> for Direction {
    fn from((x, y): (f64, f64)) -> Self {
        Self::Vector(Vector2D::new(x, y))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_names() -> Result<(), GaitError> {
        for n in NamedDirection::ALL.iter() {
            assert_eq!(n.name().parse::<NamedDirection>()?, *n);
        }

        assert_eq!("Forward Right".parse::<NamedDirection>()?, NamedDirection::DiagonalFr);
        assert_eq!("neutral".parse::<NamedDirection>()?, NamedDirection::Stop);

        assert!(matches!(
            "sideways".parse::<NamedDirection>(),
            Err(GaitError::UnknownDirection(_))
        ));

        Ok(())
    }

    #[test]
    fn test_vectors() {
        assert_eq!(Direction::from(NamedDirection::Forward).as_vector(), Vector2D::new(0.0, 1.0));
        assert_eq!(Direction::from((0.3, -0.4)).as_vector(), Vector2D::new(0.3, -0.4));
        assert_eq!(NamedDirection::Stop.as_vector(), Vector2D::zeros());
    }
}
