//! Quality bridge: evaluation scores (0-100) into SM-2 recall grades (0-5).

use std::fmt;

use crate::error::AppError;

/// SM-2 recall grade. Always within `0..=5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;

    /// Lowest grade that still counts as a successful recall.
    pub const PASS: u8 = 3;

    pub fn new(value: u8) -> Result<Self, AppError> {
        if value > Self::MAX {
            return Err(AppError::InvalidInput(format!(
                "quality must be between 0 and 5, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_pass(self) -> bool {
        self.0 >= Self::PASS
    }
}

impl TryFrom<i64> for Quality {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| {
                AppError::InvalidInput(format!("quality must be between 0 and 5, got {value}"))
            })
            .and_then(Quality::new)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps an overall evaluation score to a recall grade.
///
/// Total over its domain: a missing score is a total failure.
pub fn quality_from_score(score: Option<u32>) -> Quality {
    let Some(score) = score else {
        return Quality(0);
    };

    let grade = match score {
        90.. => 5, // perfect
        80..=89 => 4,
        70..=79 => 3,
        50..=69 => 2, // hesitant
        30..=49 => 1,
        _ => 0,
    };
    Quality(grade)
}

/// Mean of the code and explanation scores, truncated. `None` until both exist.
pub fn overall_score(code: Option<u32>, explanation: Option<u32>) -> Option<u32> {
    match (code, explanation) {
        (Some(c), Some(e)) => Some((c + e) / 2),
        _ => None,
    }
}
