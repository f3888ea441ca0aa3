//! Outcome grading.
//!
//! A probe's expectation is a list of [`ExpectationDescriptor`]s evaluated
//! by one generic algorithm, [`grade`]. The rules, in order:
//!
//! 1. A transport error fails the probe.
//! 2. A status that violates any `ExactStatus`/`StatusSet` fails the probe.
//!    Wrong status is never tolerated.
//! 3. `BodyText` and `FieldMatch` are hard checks: a mismatching value or a
//!    missing required field fails the probe. A missing optional field is
//!    recorded as a note.
//! 4. An `ErrorCodeHint` mismatch never fails the probe; it is recorded as a
//!    note so vocabulary drift stays visible.
//! 5. Otherwise the probe passes. Notes are appended to the pass message so
//!    a soft mismatch shows up in live output, not only in the summary.
//!
//! Grading is pure: the same response and descriptors always produce the
//! same [`Grade`].

use crate::body::{display_value, values_match};
use crate::client::{RawResponse, TransportError};
use crate::models::Verdict;
use serde_json::Value;
use std::fmt;

/// Body fields that may carry the service's error identifier, in lookup order.
pub const ERROR_CODE_FIELDS: [&str; 3] = ["errorCode", "error_code", "error_message"];

/// How strictly an error-code hint is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Identifier must equal the expected code.
    Exact,
    /// Identifier must contain the expected code, ignoring case.
    Substring,
    /// Any identifier (or none) is acceptable.
    Any,
}

impl MatchMode {
    fn matches(self, expected: &str, actual: Option<&str>) -> bool {
        match (self, actual) {
            (MatchMode::Any, _) => true,
            (_, None) => false,
            (MatchMode::Exact, Some(actual)) => actual == expected,
            (MatchMode::Substring, Some(actual)) => {
                actual.to_lowercase().contains(&expected.to_lowercase())
            }
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::Substring => write!(f, "substring"),
            MatchMode::Any => write!(f, "any"),
        }
    }
}

/// One expected property of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectationDescriptor {
    /// Status must equal the code.
    ExactStatus(u16),
    /// Status must be one of the codes.
    StatusSet(Vec<u16>),
    /// Trimmed raw body must equal the text.
    BodyText(String),
    /// A body field must equal a value; absence is tolerated unless required.
    FieldMatch {
        path: String,
        expected: Value,
        required: bool,
    },
    /// The service's self-reported error identifier, compared leniently.
    ErrorCodeHint { expected: String, mode: MatchMode },
}

impl ExpectationDescriptor {
    pub fn exact_status(code: u16) -> Self {
        Self::ExactStatus(code)
    }

    pub fn status_set(codes: impl IntoIterator<Item = u16>) -> Self {
        Self::StatusSet(codes.into_iter().collect())
    }

    pub fn body_text(text: impl Into<String>) -> Self {
        Self::BodyText(text.into())
    }

    /// A field that must be present and equal.
    pub fn required_field(path: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self::FieldMatch {
            path: path.into(),
            expected: expected.into(),
            required: true,
        }
    }

    /// A field that must equal the value when present.
    pub fn optional_field(path: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self::FieldMatch {
            path: path.into(),
            expected: expected.into(),
            required: false,
        }
    }

    pub fn error_code(expected: impl Into<String>, mode: MatchMode) -> Self {
        Self::ErrorCodeHint {
            expected: expected.into(),
            mode,
        }
    }

    /// An error-code hint that accepts any identifier.
    pub fn any_error_code() -> Self {
        Self::ErrorCodeHint {
            expected: String::new(),
            mode: MatchMode::Any,
        }
    }
}

/// Outcome of grading one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    /// PASS or FAIL; grading never skips.
    pub verdict: Verdict,
    pub message: String,
    /// Soft-match annotations.
    pub notes: Vec<String>,
}

impl Grade {
    fn pass(message: impl Into<String>, notes: Vec<String>) -> Self {
        Self {
            verdict: Verdict::Pass,
            message: message.into(),
            notes,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Fail,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Grades an observed outcome against a probe's expectations.
pub fn grade(
    observed: Result<&RawResponse, &TransportError>,
    expectations: &[ExpectationDescriptor],
) -> Grade {
    let response = match observed {
        Ok(response) => response,
        Err(err) => return Grade::fail(format!("transport error: {}", err)),
    };

    if let Some(message) = check_status(response, expectations) {
        return Grade::fail(message);
    }

    let mut notes = Vec::new();

    for descriptor in expectations {
        match descriptor {
            ExpectationDescriptor::BodyText(expected) => {
                let actual = response.raw_body.trim();
                if actual != expected {
                    return Grade::fail(format!(
                        "expected body \"{}\", got \"{}\"",
                        expected,
                        truncate(actual, 80)
                    ));
                }
            }
            ExpectationDescriptor::FieldMatch {
                path,
                expected,
                required,
            } => {
                let actual = response.body.as_ref().and_then(|b| b.get(path));
                match actual {
                    Some(actual) if values_match(expected, actual) => {}
                    Some(actual) => {
                        let mut message = format!(
                            "field '{}' expected {}, got {}",
                            path,
                            display_value(expected),
                            display_value(actual)
                        );
                        if let Some(reason) = error_identifier(response) {
                            message.push_str(&format!(" ({})", truncate(reason, 120)));
                        }
                        return Grade::fail(message);
                    }
                    None if *required => {
                        return Grade::fail(format!("required field '{}' missing", path));
                    }
                    None => notes.push(format!("optional field '{}' absent", path)),
                }
            }
            ExpectationDescriptor::ExactStatus(_)
            | ExpectationDescriptor::StatusSet(_)
            | ExpectationDescriptor::ErrorCodeHint { .. } => {}
        }
    }

    for descriptor in expectations {
        if let ExpectationDescriptor::ErrorCodeHint { expected, mode } = descriptor {
            let actual = error_identifier(response);
            if !mode.matches(expected, actual) {
                notes.push(format!(
                    "error code differs: expected {}, got {}",
                    expected,
                    actual.map_or_else(|| "none".to_string(), |a| truncate(a, 120))
                ));
            }
        }
    }

    let message = annotate(format!("HTTP {} as expected", response.status), &notes);
    Grade::pass(message, notes)
}

/// Appends soft-match notes to a pass message.
pub(crate) fn annotate(message: String, notes: &[String]) -> String {
    if notes.is_empty() {
        message
    } else {
        format!("{} ({})", message, notes.join("; "))
    }
}

/// Returns a failure message if the status violates any status descriptor.
fn check_status(response: &RawResponse, expectations: &[ExpectationDescriptor]) -> Option<String> {
    let status = response.status;
    for descriptor in expectations {
        match descriptor {
            ExpectationDescriptor::ExactStatus(code) if *code != status => {
                return Some(format!("expected {}, got {}", code, status));
            }
            ExpectationDescriptor::StatusSet(codes) if !codes.contains(&status) => {
                let codes: Vec<String> = codes.iter().map(u16::to_string).collect();
                return Some(format!(
                    "expected one of [{}], got {}",
                    codes.join(", "),
                    status
                ));
            }
            _ => {}
        }
    }
    None
}

/// Reads the service's error identifier from the first populated field.
pub fn error_identifier(response: &RawResponse) -> Option<&str> {
    let body = response.body.as_ref()?;
    ERROR_CODE_FIELDS
        .iter()
        .find_map(|field| body.str_field(field).filter(|s| !s.is_empty()))
}

/// Truncates a string to the given length, adding "..." if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        // Back off to a char boundary so multi-byte text never panics.
        let mut boundary = max_len.min(s.len());
        while boundary > 0 && !s.is_char_boundary(boundary) {
            boundary -= 1;
        }
        format!("{}...", &s[..boundary])
    }
}
