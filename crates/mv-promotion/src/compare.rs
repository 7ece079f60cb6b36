use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::PolicyError;

/// How a candidate's metric must relate to the promoted model's metric for
/// the candidate to win: `Smaller` promotes a candidate whose metric is
/// strictly below the promoted one (losses, error rates), `Greater` one that
/// is strictly above it (accuracy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    #[default]
    Smaller,
    SmallerOrEqual,
    Greater,
    GreaterOrEqual,
}

impl ComparisonMode {
    pub const ALL: [ComparisonMode; 4] = [
        ComparisonMode::Smaller,
        ComparisonMode::SmallerOrEqual,
        ComparisonMode::Greater,
        ComparisonMode::GreaterOrEqual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonMode::Smaller => "smaller",
            ComparisonMode::SmallerOrEqual => "smaller_or_equal",
            ComparisonMode::Greater => "greater",
            ComparisonMode::GreaterOrEqual => "greater_or_equal",
        }
    }

    /// `x < y`, `x <= y`, `x > y` or `x >= y`. Unordered values (NaN) never hold.
    pub fn holds<T: PartialOrd + ?Sized>(self, x: &T, y: &T) -> bool {
        match self {
            ComparisonMode::Smaller => x < y,
            ComparisonMode::SmallerOrEqual => x <= y,
            ComparisonMode::Greater => x > y,
            ComparisonMode::GreaterOrEqual => x >= y,
        }
    }
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "smaller" => Ok(ComparisonMode::Smaller),
            "smaller_or_equal" => Ok(ComparisonMode::SmallerOrEqual),
            "greater" => Ok(ComparisonMode::Greater),
            "greater_or_equal" => Ok(ComparisonMode::GreaterOrEqual),
            other => Err(PolicyError::InvalidArgument(format!(
                "there is no comparison named '{other}'. expected one of: \
                smaller | smaller_or_equal | greater | greater_or_equal"
            ))),
        }
    }
}

/// Look up `mode` by name and apply it to `(x, y)`.
pub fn compare<T: PartialOrd>(x: T, y: T, mode: &str) -> Result<bool, PolicyError> {
    let mode: ComparisonMode = mode.parse()?;
    Ok(mode.holds(&x, &y))
}
