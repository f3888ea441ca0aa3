//! Probe definitions and template resolution.
//!
//! A [`ProbeSpec`] is static data: one or more request templates, the
//! expectations their responses are graded against, and the identifiers to
//! capture into [`RunState`]. Templates reference earlier results through
//! placeholders:
//!
//! | Placeholder | Resolves to |
//! |---|---|
//! | `${account[N]}` | the Nth created account (zero-based) |
//! | `${account[N]\|FALLBACK}` | the Nth account, or `FALLBACK` if absent |
//! | `${transaction[N]}` | the Nth created transaction |
//! | `${unique:PREFIX}` | a fresh id, stable within one probe |
//!
//! Resolution fails with [`ResolveError::DependencyUnmet`] when a
//! placeholder without fallback points past the end of [`RunState`].

use crate::body::{as_identifier, lookup};
use crate::client::RawResponse;
use crate::grader::ExpectationDescriptor;
use crate::models::Method;
use crate::state::{IdKind, RunState};
use chrono::Utc;
use rand::Rng;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while resolving a probe against [`RunState`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A referenced identifier has not been created yet.
    #[error("requires {kind} #{needed} but only {available} recorded")]
    DependencyUnmet {
        kind: IdKind,
        needed: usize,
        available: usize,
    },

    /// The probe has no requests to send.
    #[error("probe defines no requests")]
    NoRequests,

    /// The placeholder pattern failed to compile.
    #[error("invalid placeholder pattern: {0}")]
    InvalidPattern(String),
}

impl ResolveError {
    /// True when resolution failed only because an earlier probe has not
    /// created the referenced identifier yet.
    pub fn is_unmet_dependency(&self) -> bool {
        matches!(self, ResolveError::DependencyUnmet { .. })
    }
}

/// How many of a probe's requests must pass for the probe to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quorum {
    #[default]
    All,
    AtLeast(usize),
}

impl Quorum {
    pub fn is_met(self, passed: usize, total: usize) -> bool {
        match self {
            Quorum::All => passed == total,
            Quorum::AtLeast(n) => passed >= n,
        }
    }
}

/// One HTTP request with unresolved placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RequestTemplate {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Where a captured identifier is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// A field of the request body the probe sent.
    RequestField(String),
    /// A field of the response body.
    ResponseField(String),
}

/// An identifier to record into [`RunState`] after a 2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub kind: IdKind,
    pub source: CaptureSource,
}

impl Capture {
    pub fn account_from_request(field: impl Into<String>) -> Self {
        Self {
            kind: IdKind::Account,
            source: CaptureSource::RequestField(field.into()),
        }
    }

    pub fn transaction_from_response(field: impl Into<String>) -> Self {
        Self {
            kind: IdKind::Transaction,
            source: CaptureSource::ResponseField(field.into()),
        }
    }
}

/// Static description of one probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSpec {
    pub name: String,
    pub group: String,
    pub requests: Vec<RequestTemplate>,
    pub expectations: Vec<ExpectationDescriptor>,
    pub quorum: Quorum,
    pub captures: Vec<Capture>,
    /// Probe to run once when this probe's dependencies are unmet.
    pub prerequisite: Option<Box<ProbeSpec>>,
}

impl ProbeSpec {
    /// Creates a probe with a single request and no expectations.
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        method: Method,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            requests: vec![RequestTemplate::new(method, path)],
            expectations: Vec::new(),
            quorum: Quorum::All,
            captures: Vec::new(),
            prerequisite: None,
        }
    }

    /// Sets the body of the most recently added request.
    pub fn with_body(mut self, body: Value) -> Self {
        if let Some(last) = self.requests.last_mut() {
            last.body = Some(body);
        }
        self
    }

    /// Adds another request graded against the same expectations.
    pub fn then_request(mut self, request: RequestTemplate) -> Self {
        self.requests.push(request);
        self
    }

    pub fn expect(mut self, descriptor: ExpectationDescriptor) -> Self {
        self.expectations.push(descriptor);
        self
    }

    pub fn capture(mut self, capture: Capture) -> Self {
        self.captures.push(capture);
        self
    }

    pub fn with_quorum(mut self, quorum: Quorum) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_prerequisite(mut self, prerequisite: ProbeSpec) -> Self {
        self.prerequisite = Some(Box::new(prerequisite));
        self
    }

    /// Resolves all placeholders against the current run state.
    pub fn resolve(&self, state: &RunState) -> Result<ResolvedProbe, ResolveError> {
        if self.requests.is_empty() {
            return Err(ResolveError::NoRequests);
        }
        let mut resolver = Resolver::new(state);

        let requests = self
            .requests
            .iter()
            .map(|request| {
                Ok(ResolvedRequest {
                    method: request.method,
                    path: resolver.resolve_str(&request.path)?,
                    body: request
                        .body
                        .as_ref()
                        .map(|b| resolver.resolve_value(b))
                        .transpose()?,
                })
            })
            .collect::<Result<Vec<_>, ResolveError>>()?;

        let expectations = self
            .expectations
            .iter()
            .map(|descriptor| match descriptor {
                ExpectationDescriptor::FieldMatch {
                    path,
                    expected,
                    required,
                } => Ok(ExpectationDescriptor::FieldMatch {
                    path: path.clone(),
                    expected: resolver.resolve_value(expected)?,
                    required: *required,
                }),
                other => Ok(other.clone()),
            })
            .collect::<Result<Vec<_>, ResolveError>>()?;

        Ok(ResolvedProbe {
            requests,
            expectations,
        })
    }

    /// Identifiers to record for a response to `request`.
    ///
    /// Nothing is captured unless the response status is 2xx.
    pub fn captured_ids(
        &self,
        request: &ResolvedRequest,
        response: &RawResponse,
    ) -> Vec<(IdKind, String)> {
        if !response.is_success() {
            return Vec::new();
        }

        self.captures
            .iter()
            .filter_map(|capture| {
                let value = match &capture.source {
                    CaptureSource::RequestField(field) => {
                        request.body.as_ref().and_then(|b| lookup(b, field))
                    }
                    CaptureSource::ResponseField(field) => {
                        response.body.as_ref().and_then(|b| b.get(field))
                    }
                };
                value
                    .and_then(as_identifier)
                    .map(|id| (capture.kind, id))
            })
            .collect()
    }

    /// Returns true if the name or group contains `pattern`, ignoring case.
    pub fn matches_filter(&self, pattern: &str) -> bool {
        let pattern = pattern.to_lowercase();
        self.name.to_lowercase().contains(&pattern) || self.group.to_lowercase().contains(&pattern)
    }
}

/// A request with every placeholder substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// A probe ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProbe {
    pub requests: Vec<ResolvedRequest>,
    pub expectations: Vec<ExpectationDescriptor>,
}

/// Generates a unique request identifier: `PREFIX_<unix-seconds>_<1000..=9999>`.
pub fn unique_id(prefix: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
    format!("{}_{}_{}", prefix, Utc::now().timestamp(), suffix)
}

const PLACEHOLDER_PATTERN: &str =
    r"\$\{(?:(account|transaction)\[(\d+)\](?:\|([^}]*))?|unique:([A-Za-z0-9_\-]+))\}";

fn placeholder_regex() -> Result<&'static Regex, ResolveError> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN))
        .as_ref()
        .map_err(|e| ResolveError::InvalidPattern(e.to_string()))
}

/// Substitutes placeholders for one probe.
struct Resolver<'a> {
    state: &'a RunState,
    uniques: HashMap<String, String>,
}

impl<'a> Resolver<'a> {
    fn new(state: &'a RunState) -> Self {
        Self {
            state,
            uniques: HashMap::new(),
        }
    }

    fn resolve_str(&mut self, template: &str) -> Result<String, ResolveError> {
        let re = placeholder_regex()?;
        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in re.captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&template[last..whole.start()]);
            out.push_str(&self.substitute(&caps)?);
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }

    fn resolve_value(&mut self, value: &Value) -> Result<Value, ResolveError> {
        Ok(match value {
            Value::String(s) => Value::String(self.resolve_str(s)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_value(item))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve_value(v)?)))
                    .collect::<Result<_, ResolveError>>()?,
            ),
            other => other.clone(),
        })
    }

    fn substitute(&mut self, caps: &Captures<'_>) -> Result<String, ResolveError> {
        if let Some(prefix) = caps.get(4) {
            let prefix = prefix.as_str();
            return Ok(self
                .uniques
                .entry(prefix.to_string())
                .or_insert_with(|| unique_id(prefix))
                .clone());
        }

        let kind = match caps.get(1).map(|m| m.as_str()) {
            Some("account") => IdKind::Account,
            _ => IdKind::Transaction,
        };
        // The pattern only admits digits here; an index too large for usize
        // can never be satisfied, so treat it as unmet.
        let index = caps[2].parse::<usize>().unwrap_or(usize::MAX);

        match (self.state.nth(kind, index), caps.get(3)) {
            (Some(id), _) => Ok(id.to_string()),
            (None, Some(fallback)) => Ok(fallback.as_str().to_string()),
            (None, None) => Err(ResolveError::DependencyUnmet {
                kind,
                needed: index.saturating_add(1),
                available: self.state.count(kind),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grader::MatchMode;
    use serde_json::json;

    fn state_with_accounts(ids: &[&str]) -> RunState {
        let mut state = RunState::new();
        for id in ids {
            state.record_account(*id);
        }
        state
    }

    #[test]
    fn test_resolve_literal_probe() {
        let probe = ProbeSpec::new("ping", "Health", Method::Get, "/test/ping");
        let resolved = probe.resolve(&RunState::new()).unwrap();
        assert_eq!(resolved.requests.len(), 1);
        assert_eq!(resolved.requests[0].path, "/test/ping");
        assert!(resolved.requests[0].body.is_none());
    }

    #[test]
    fn test_resolve_account_placeholder_in_path() {
        let probe = ProbeSpec::new("get", "Accounts", Method::Get, "/accounts/${account[1]}");
        let resolved = probe.resolve(&state_with_accounts(&["A1", "A2"])).unwrap();
        assert_eq!(resolved.requests[0].path, "/accounts/A2");
    }

    #[test]
    fn test_resolve_placeholders_in_body() {
        let probe = ProbeSpec::new("tx", "Transactions", Method::Post, "/transactions").with_body(
            json!({
                "source_account_id": "${account[0]}",
                "destination_account_id": "${account[1]}",
                "amount": 100.25,
                "tags": ["from-${account[0]}"]
            }),
        );
        let resolved = probe.resolve(&state_with_accounts(&["A1", "A2"])).unwrap();
        assert_eq!(
            resolved.requests[0].body,
            Some(json!({
                "source_account_id": "A1",
                "destination_account_id": "A2",
                "amount": 100.25,
                "tags": ["from-A1"]
            }))
        );
    }

    #[test]
    fn test_unmet_dependency_names_missing_identifier() {
        let probe = ProbeSpec::new("tx", "Transactions", Method::Post, "/transactions")
            .with_body(json!({"destination_account_id": "${account[1]}"}));
        let err = probe.resolve(&state_with_accounts(&["A1"])).unwrap_err();
        assert_eq!(
            err,
            ResolveError::DependencyUnmet {
                kind: IdKind::Account,
                needed: 2,
                available: 1
            }
        );
        assert_eq!(err.to_string(), "requires account #2 but only 1 recorded");
    }

    #[test]
    fn test_fallback_used_when_absent() {
        let probe = ProbeSpec::new("dup", "Accounts", Method::Post, "/accounts")
            .with_body(json!({"account_id": "${account[0]|DUPLICATE_TEST}"}));

        let resolved = probe.resolve(&RunState::new()).unwrap();
        assert_eq!(
            resolved.requests[0].body,
            Some(json!({"account_id": "DUPLICATE_TEST"}))
        );

        let resolved = probe.resolve(&state_with_accounts(&["A1"])).unwrap();
        assert_eq!(resolved.requests[0].body, Some(json!({"account_id": "A1"})));
    }

    #[test]
    fn test_transaction_placeholder() {
        let mut state = RunState::new();
        state.record_transaction("T1");
        let probe = ProbeSpec::new("get", "Transactions", Method::Get, "/transactions/${transaction[0]}");
        assert_eq!(probe.resolve(&state).unwrap().requests[0].path, "/transactions/T1");

        let err = probe.resolve(&RunState::new()).unwrap_err();
        assert_eq!(err.to_string(), "requires transaction #1 but only 0 recorded");
    }

    #[test]
    fn test_unique_is_stable_within_probe() {
        let probe = ProbeSpec::new("create", "Accounts", Method::Post, "/accounts")
            .with_body(json!({"account_id": "${unique:TEST_ACC}"}))
            .expect(ExpectationDescriptor::optional_field("account_id", "${unique:TEST_ACC}"));

        let resolved = probe.resolve(&RunState::new()).unwrap();
        let sent = resolved.requests[0].body.as_ref().unwrap()["account_id"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(sent.starts_with("TEST_ACC_"));
        assert_eq!(
            resolved.expectations[0],
            ExpectationDescriptor::optional_field("account_id", sent.as_str())
        );
    }

    #[test]
    fn test_unique_id_shape() {
        let id = unique_id("NON_EXISTENT");
        let parts: Vec<&str> = id.rsplitn(3, '_').collect();
        let suffix: u16 = parts[0].parse().unwrap();
        assert!((1000..=9999).contains(&suffix));
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2], "NON_EXISTENT");
    }

    #[test]
    fn test_non_field_expectations_pass_through() {
        let probe = ProbeSpec::new("neg", "Accounts", Method::Post, "/accounts")
            .expect(ExpectationDescriptor::exact_status(400))
            .expect(ExpectationDescriptor::error_code("${account[5]}", MatchMode::Exact));
        let resolved = probe.resolve(&RunState::new()).unwrap();
        assert_eq!(resolved.expectations, probe.expectations);
    }

    #[test]
    fn test_unknown_placeholder_left_untouched() {
        let probe = ProbeSpec::new("odd", "Accounts", Method::Get, "/accounts/${customer[0]}");
        let resolved = probe.resolve(&RunState::new()).unwrap();
        assert_eq!(resolved.requests[0].path, "/accounts/${customer[0]}");
    }

    #[test]
    fn test_captures_request_and_response_ids_on_success() {
        let probe = ProbeSpec::new("tx", "Transactions", Method::Post, "/transactions")
            .capture(Capture::account_from_request("account_id"))
            .capture(Capture::transaction_from_response("transaction_id"));
        let request = ResolvedRequest {
            method: Method::Post,
            path: "/transactions".to_string(),
            body: Some(json!({"account_id": "A1"})),
        };

        let response = RawResponse::json(200, json!({"transaction_id": "T9"}));
        assert_eq!(
            probe.captured_ids(&request, &response),
            vec![
                (IdKind::Account, "A1".to_string()),
                (IdKind::Transaction, "T9".to_string())
            ]
        );

        let rejected = RawResponse::json(400, json!({"transaction_id": "T9"}));
        assert!(probe.captured_ids(&request, &rejected).is_empty());
    }

    #[test]
    fn test_capture_skips_missing_fields() {
        let probe = ProbeSpec::new("tx", "Transactions", Method::Post, "/transactions")
            .capture(Capture::transaction_from_response("transaction_id"));
        let request = ResolvedRequest {
            method: Method::Post,
            path: "/transactions".to_string(),
            body: None,
        };
        let response = RawResponse::new(200, "not json");
        assert!(probe.captured_ids(&request, &response).is_empty());
    }

    #[test]
    fn test_quorum() {
        assert!(Quorum::All.is_met(2, 2));
        assert!(!Quorum::All.is_met(1, 2));
        assert!(Quorum::AtLeast(1).is_met(1, 2));
        assert!(!Quorum::AtLeast(1).is_met(0, 2));
    }

    #[test]
    fn test_probe_without_requests_does_not_resolve() {
        let mut probe = ProbeSpec::new("empty", "Health", Method::Get, "/test/ping");
        probe.requests.clear();

        let err = probe.resolve(&RunState::new()).unwrap_err();
        assert_eq!(err, ResolveError::NoRequests);
        assert!(!err.is_unmet_dependency());
    }

    #[test]
    fn test_placeholder_pattern_compiles() {
        assert!(placeholder_regex().is_ok());
        assert!(
            !ResolveError::InvalidPattern("unclosed group".to_string()).is_unmet_dependency()
        );
    }

    #[test]
    fn test_matches_filter() {
        let probe = ProbeSpec::new("Account Retrieval - Success", "Accounts", Method::Get, "/");
        assert!(probe.matches_filter("retrieval"));
        assert!(probe.matches_filter("ACCOUNTS"));
        assert!(!probe.matches_filter("transaction"));
    }
}
