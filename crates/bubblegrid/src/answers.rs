//! Per-question result entries.

use std::collections::BTreeMap;
use std::fmt;

/// A selected choice, optionally flagged for manual review.
///
/// Serializes as its display form: `"C"` or `"C?"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerMark {
    /// 0-based choice index (`0` = `A`).
    pub choice: u8,
    pub suspect: bool,
}

impl AnswerMark {
    pub fn new(choice: u8) -> Self {
        Self {
            choice,
            suspect: false,
        }
    }

    pub fn letter(&self) -> char {
        choice_letter(self.choice as usize)
    }

    pub fn as_suspect(self) -> Self {
        Self {
            suspect: true,
            ..self
        }
    }
}

/// Letter for a 0-based choice index (`A`..`Z`).
pub fn choice_letter(choice: usize) -> char {
    (b'A' + (choice.min(25)) as u8) as char
}

impl fmt::Display for AnswerMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.suspect {
            write!(f, "{}?", self.letter())
        } else {
            write!(f, "{}", self.letter())
        }
    }
}

impl std::str::FromStr for AnswerMark {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, suspect) = match s.strip_suffix('?') {
            Some(body) => (body, true),
            None => (s, false),
        };
        let mut chars = body.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_uppercase() => Ok(Self {
                choice: c as u8 - b'A',
                suspect,
            }),
            _ => Err(format!("invalid answer mark '{}'", s)),
        }
    }
}

impl serde::Serialize for AnswerMark {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for AnswerMark {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Answers and confidences keyed by 1-based question number.
///
/// Every question in `1..=questions` has an entry; the default is
/// unanswered with confidence 0.0.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SheetAnswers {
    pub answers: BTreeMap<u32, Option<AnswerMark>>,
    pub confidence: BTreeMap<u32, f64>,
}

impl SheetAnswers {
    pub fn new(questions: usize) -> Self {
        let keys = 1..=questions as u32;
        Self {
            answers: keys.clone().map(|q| (q, None)).collect(),
            confidence: keys.map(|q| (q, 0.0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn set(&mut self, question: u32, mark: Option<AnswerMark>, confidence: f64) {
        self.answers.insert(question, mark);
        self.confidence.insert(question, confidence);
    }

    pub fn mark(&self, question: u32) -> Option<AnswerMark> {
        self.answers.get(&question).copied().flatten()
    }

    pub fn confidence_of(&self, question: u32) -> f64 {
        self.confidence.get(&question).copied().unwrap_or(0.0)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|m| m.is_some()).count()
    }

    pub(crate) fn mark_suspect(&mut self, question: u32) {
        if let Some(Some(mark)) = self.answers.get_mut(&question) {
            mark.suspect = true;
        }
    }

    /// Merge a region's answers, renumbering its questions by `offset`.
    pub fn absorb(&mut self, other: SheetAnswers, offset: u32) {
        for (q, mark) in other.answers {
            let conf = other.confidence.get(&q).copied().unwrap_or(0.0);
            self.set(q + offset, mark, conf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_serialize_as_letters() {
        let plain = AnswerMark::new(2);
        assert_eq!(serde_json::to_string(&plain).unwrap(), "\"C\"");
        let suspect = AnswerMark::new(0).as_suspect();
        assert_eq!(suspect.to_string(), "A?");
        let back: AnswerMark = serde_json::from_str("\"A?\"").unwrap();
        assert_eq!(back, suspect);
        assert!("c".parse::<AnswerMark>().is_err());
        assert!("AB".parse::<AnswerMark>().is_err());
    }

    #[test]
    fn new_sheet_has_every_question_unanswered() {
        let sheet = SheetAnswers::new(4);
        assert_eq!(sheet.answers.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(sheet.answers.values().all(Option::is_none));
        assert!(sheet.confidence.values().all(|&c| c == 0.0));
        assert_eq!(sheet.answered_count(), 0);
    }

    #[test]
    fn absorb_offsets_question_numbers() {
        let mut sheet = SheetAnswers::new(5);
        let mut column = SheetAnswers::new(2);
        column.set(1, Some(AnswerMark::new(1)), 0.9);
        sheet.absorb(column, 3);
        assert_eq!(sheet.mark(4), Some(AnswerMark::new(1)));
        assert_eq!(sheet.confidence_of(4), 0.9);
        assert_eq!(sheet.mark(5), None);
        assert_eq!(sheet.len(), 5);
    }

    #[test]
    fn serialized_sheet_uses_null_for_unanswered() {
        let mut sheet = SheetAnswers::new(2);
        sheet.set(2, Some(AnswerMark::new(3).as_suspect()), 0.1);
        let json = serde_json::to_value(&sheet).unwrap();
        assert!(json["answers"]["1"].is_null());
        assert_eq!(json["answers"]["2"], "D?");
    }
}
