//! Data models for the probe harness.
//!
//! This module defines the core data structures shared by the runner, the
//! grader and the reporters: HTTP methods, verdicts and per-probe results.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// HTTP method used by a probe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a probe's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Skip,
}

impl Verdict {
    /// Returns the upper-case label used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Skip => "SKIP",
        }
    }

    /// Returns the emoji shown next to live progress lines.
    pub fn emoji(&self) -> &'static str {
        match self {
            Verdict::Pass => "✅",
            Verdict::Fail => "❌",
            Verdict::Skip => "⏭️",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running a single probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    /// Probe name (e.g., "Account Creation - Success")
    pub name: String,
    /// Group the probe belongs to (e.g., "Accounts")
    pub group: String,
    /// Outcome classification
    pub verdict: Verdict,
    /// Human-readable explanation of the verdict
    pub message: String,
    /// Soft-match annotations recorded on an otherwise passing probe
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// How long the probe took
    #[serde(rename = "duration_secs", with = "duration_serde")]
    pub duration: Duration,
    /// HTTP status of the last response, if one was received
    pub status_code: Option<u16>,
    /// Parsed JSON body of the last response, if it was valid JSON
    pub body: Option<Value>,
}

impl ProbeResult {
    /// Creates a result with no response attached.
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        verdict: Verdict,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            verdict,
            message: message.into(),
            notes: Vec::new(),
            duration: Duration::ZERO,
            status_code: None,
            body: None,
        }
    }

    /// Creates a SKIP result. Skips never take time.
    pub fn skipped(
        name: impl Into<String>,
        group: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(name, group, Verdict::Skip, reason)
    }

    /// Attaches soft-match notes.
    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Sets the elapsed duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Attaches the observed status code and parsed body.
    pub fn with_response(mut self, status_code: u16, body: Option<Value>) -> Self {
        self.status_code = Some(status_code);
        self.body = body;
        self
    }

    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.verdict == Verdict::Fail
    }

    pub fn is_skip(&self) -> bool {
        self.verdict == Verdict::Skip
    }
}

/// Serde helper for Duration serialization.
pub(crate) mod duration_serde {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }

    #[test]
    fn test_skipped_result_has_no_response() {
        let result = ProbeResult::skipped("probe", "Accounts", "no accounts");
        assert!(result.is_skip());
        assert_eq!(result.duration, Duration::ZERO);
        assert!(result.status_code.is_none());
        assert!(result.body.is_none());
    }

    #[test]
    fn test_result_serializes_duration_in_seconds() {
        let result = ProbeResult::new("ping", "Health", Verdict::Pass, "ok")
            .with_duration(Duration::from_millis(1500))
            .with_response(200, None);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["duration_secs"], json!(1.5));
        assert_eq!(value["verdict"], json!("PASS"));
        assert_eq!(value["status_code"], json!(200));
        assert!(value.get("notes").is_none());
    }
}
