//! Boundary errors.
//!
//! Everything past input validation is recovered by policy (fallback
//! geometry, synthetic bubbles, unanswered/suspect results), so this enum
//! only describes malformed requests.

#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    /// The binary mask has zero width or height.
    EmptyImage,
    /// Question count must be >= 1.
    InvalidQuestionCount(usize),
    /// Alternative count must be in 1..=26.
    InvalidAlternativeCount(usize),
    /// Column count must be >= 1.
    InvalidColumnCount(usize),
    /// Sensitivity must lie strictly inside (0, 1).
    InvalidSensitivity(f64),
    /// The color canvas does not match the mask dimensions.
    DimensionMismatch {
        mask: [u32; 2],
        color: [u32; 2],
    },
    /// More columns requested than there are pixel columns to split.
    TooManyColumns { columns: usize, width: u32 },
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyImage => write!(f, "binary mask is empty"),
            Self::InvalidQuestionCount(n) => {
                write!(f, "question count must be >= 1, got {}", n)
            }
            Self::InvalidAlternativeCount(n) => {
                write!(f, "alternative count must be in 1..=26, got {}", n)
            }
            Self::InvalidColumnCount(n) => write!(f, "column count must be >= 1, got {}", n),
            Self::InvalidSensitivity(s) => {
                write!(f, "sensitivity must be in (0, 1), got {}", s)
            }
            Self::DimensionMismatch { mask, color } => write!(
                f,
                "color image is {}x{} but mask is {}x{}",
                color[0], color[1], mask[0], mask[1]
            ),
            Self::TooManyColumns { columns, width } => write!(
                f,
                "cannot split a {}px wide sheet into {} columns",
                width, columns
            ),
        }
    }
}

impl std::error::Error for ScanError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_offending_value() {
        let msg = ScanError::InvalidSensitivity(1.5).to_string();
        assert!(msg.contains("1.5"));
        let msg = ScanError::DimensionMismatch {
            mask: [10, 20],
            color: [11, 20],
        }
        .to_string();
        assert!(msg.contains("11x20"));
        assert!(msg.contains("10x20"));
    }
}
