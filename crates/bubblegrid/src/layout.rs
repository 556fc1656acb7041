//! Sheet layout: what the scanner should expect on the page.
//!
//! Layout JSON follows the `bubblegrid.sheet.v1` schema:
//!
//! ```json
//! { "schema": "bubblegrid.sheet.v1", "questions": 40, "alternatives": 5,
//!   "columns": 2, "sensitivity": 0.3, "binarize_threshold": 150 }
//! ```
//!
//! `columns` is either a positive count or the string `"auto"`.

use std::path::Path;

use crate::error::ScanError;

const SHEET_SCHEMA_V1: &str = "bubblegrid.sheet.v1";

const DEFAULT_ALTERNATIVES: usize = 5;
const DEFAULT_SENSITIVITY: f64 = 0.3;
const DEFAULT_BINARIZE_THRESHOLD: u8 = 150;
const MAX_ALTERNATIVES: usize = 26;

/// How the sheet is split into question columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "ColumnLayoutRepr", into = "ColumnLayoutRepr")]
pub enum ColumnLayout {
    Fixed(usize),
    /// Estimate the count from the mask (1, 2 or 3).
    Auto,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
enum ColumnLayoutRepr {
    Count(usize),
    Keyword(String),
}

impl TryFrom<ColumnLayoutRepr> for ColumnLayout {
    type Error = String;

    fn try_from(value: ColumnLayoutRepr) -> Result<Self, Self::Error> {
        match value {
            ColumnLayoutRepr::Count(n) => Ok(Self::Fixed(n)),
            ColumnLayoutRepr::Keyword(k) if k.eq_ignore_ascii_case("auto") => Ok(Self::Auto),
            ColumnLayoutRepr::Keyword(k) => Err(format!(
                "columns must be a count or \"auto\", got '{}'",
                k
            )),
        }
    }
}

impl From<ColumnLayout> for ColumnLayoutRepr {
    fn from(value: ColumnLayout) -> Self {
        match value {
            ColumnLayout::Fixed(n) => Self::Count(n),
            ColumnLayout::Auto => Self::Keyword("auto".to_string()),
        }
    }
}

/// Runtime sheet description used by the scanner.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SheetLayout {
    /// Total number of questions on the sheet.
    pub questions: usize,
    /// Choices per question, lettered from `A`.
    pub alternatives: usize,
    pub columns: ColumnLayout,
    /// Fill rate above which a bubble counts as marked; also the floor of
    /// the adaptive answer threshold.
    pub sensitivity: f64,
    /// Gray level for the caller's inverse binarization.
    pub binarize_threshold: u8,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct SheetLayoutSpecV1 {
    schema: String,
    questions: usize,
    #[serde(default = "default_alternatives")]
    alternatives: usize,
    #[serde(default)]
    columns: ColumnLayout,
    #[serde(default = "default_sensitivity")]
    sensitivity: f64,
    #[serde(default = "default_binarize_threshold")]
    binarize_threshold: u8,
}

fn default_alternatives() -> usize {
    DEFAULT_ALTERNATIVES
}

fn default_sensitivity() -> f64 {
    DEFAULT_SENSITIVITY
}

fn default_binarize_threshold() -> u8 {
    DEFAULT_BINARIZE_THRESHOLD
}

impl SheetLayout {
    /// Single-column layout with default choices and sensitivity.
    pub fn new(questions: usize) -> Self {
        Self {
            questions,
            alternatives: DEFAULT_ALTERNATIVES,
            columns: ColumnLayout::default(),
            sensitivity: DEFAULT_SENSITIVITY,
            binarize_threshold: DEFAULT_BINARIZE_THRESHOLD,
        }
    }

    pub fn with_alternatives(mut self, alternatives: usize) -> Self {
        self.alternatives = alternatives;
        self
    }

    pub fn with_columns(mut self, columns: ColumnLayout) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Check the request before any image work.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.questions == 0 {
            return Err(ScanError::InvalidQuestionCount(self.questions));
        }
        if self.alternatives == 0 || self.alternatives > MAX_ALTERNATIVES {
            return Err(ScanError::InvalidAlternativeCount(self.alternatives));
        }
        if let ColumnLayout::Fixed(0) = self.columns {
            return Err(ScanError::InvalidColumnCount(0));
        }
        if !(self.sensitivity > 0.0 && self.sensitivity < 1.0) {
            return Err(ScanError::InvalidSensitivity(self.sensitivity));
        }
        Ok(())
    }

    /// Load a `bubblegrid.sheet.v1` layout file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let spec: SheetLayoutSpecV1 = serde_json::from_str(&data)?;
        Self::from_layout_spec(spec).map_err(Into::into)
    }

    fn from_layout_spec(spec: SheetLayoutSpecV1) -> Result<Self, String> {
        if spec.schema != SHEET_SCHEMA_V1 {
            return Err(format!(
                "unsupported sheet schema '{}' (expected '{}')",
                spec.schema, SHEET_SCHEMA_V1
            ));
        }
        validate_layout_spec(&spec)?;
        Ok(Self {
            questions: spec.questions,
            alternatives: spec.alternatives,
            columns: spec.columns,
            sensitivity: spec.sensitivity,
            binarize_threshold: spec.binarize_threshold,
        })
    }

    /// Serialize as a `bubblegrid.sheet.v1` document.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&SheetLayoutSpecV1 {
            schema: SHEET_SCHEMA_V1.to_string(),
            questions: self.questions,
            alternatives: self.alternatives,
            columns: self.columns,
            sensitivity: self.sensitivity,
            binarize_threshold: self.binarize_threshold,
        })
    }
}

fn validate_layout_spec(spec: &SheetLayoutSpecV1) -> Result<(), String> {
    SheetLayout {
        questions: spec.questions,
        alternatives: spec.alternatives,
        columns: spec.columns,
        sensitivity: spec.sensitivity,
        binarize_threshold: spec.binarize_threshold,
    }
    .validate()
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<SheetLayout, String> {
        let spec: SheetLayoutSpecV1 = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        SheetLayout::from_layout_spec(spec)
    }

    #[test]
    fn minimal_layout_takes_defaults() {
        let layout = parse(r#"{"schema":"bubblegrid.sheet.v1","questions":20}"#).unwrap();
        assert_eq!(layout, SheetLayout::new(20));
    }

    #[test]
    fn columns_accept_count_or_auto() {
        let layout =
            parse(r#"{"schema":"bubblegrid.sheet.v1","questions":20,"columns":"auto"}"#).unwrap();
        assert_eq!(layout.columns, ColumnLayout::Auto);
        let layout =
            parse(r#"{"schema":"bubblegrid.sheet.v1","questions":20,"columns":3}"#).unwrap();
        assert_eq!(layout.columns, ColumnLayout::Fixed(3));
        assert!(parse(r#"{"schema":"bubblegrid.sheet.v1","questions":20,"columns":"many"}"#).is_err());
    }

    #[test]
    fn rejects_other_schema_and_unknown_fields() {
        let err = parse(r#"{"schema":"bubblegrid.sheet.v0","questions":20}"#).unwrap_err();
        assert!(err.contains("unsupported sheet schema"));
        assert!(parse(r#"{"schema":"bubblegrid.sheet.v1","questions":20,"key":"ABCD"}"#).is_err());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(parse(r#"{"schema":"bubblegrid.sheet.v1","questions":0}"#).is_err());
        assert!(parse(r#"{"schema":"bubblegrid.sheet.v1","questions":5,"alternatives":27}"#).is_err());
        assert!(parse(r#"{"schema":"bubblegrid.sheet.v1","questions":5,"sensitivity":1.0}"#).is_err());
        assert_eq!(
            SheetLayout::new(5).with_columns(ColumnLayout::Fixed(0)).validate(),
            Err(ScanError::InvalidColumnCount(0))
        );
    }

    #[test]
    fn written_layout_reads_back() {
        let layout = SheetLayout::new(40)
            .with_columns(ColumnLayout::Auto)
            .with_alternatives(4);
        let json = layout.to_json_string().unwrap();
        let spec: SheetLayoutSpecV1 = serde_json::from_str(&json).unwrap();
        assert_eq!(SheetLayout::from_layout_spec(spec).unwrap(), layout);
    }
}
