//! Identifiers created during a run.
//!
//! Later probes refer to earlier ones positionally ("the first created
//! account"). Lookups return `None` instead of indexing out of range so a
//! probe with an unmet dependency can be skipped.

use serde::Serialize;
use std::fmt;

/// Kind of identifier tracked in [`RunState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Account,
    Transaction,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKind::Account => write!(f, "account"),
            IdKind::Transaction => write!(f, "transaction"),
        }
    }
}

/// Append-only record of created accounts and transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    accounts: Vec<String>,
    transactions: Vec<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_account(&mut self, id: impl Into<String>) {
        self.accounts.push(id.into());
    }

    pub fn record_transaction(&mut self, id: impl Into<String>) {
        self.transactions.push(id.into());
    }

    /// Records an identifier of the given kind.
    pub fn record(&mut self, kind: IdKind, id: impl Into<String>) {
        match kind {
            IdKind::Account => self.record_account(id),
            IdKind::Transaction => self.record_transaction(id),
        }
    }

    /// Returns the `n`th created account (zero-based).
    pub fn nth_account(&self, n: usize) -> Option<&str> {
        self.accounts.get(n).map(String::as_str)
    }

    /// Returns the `n`th created transaction (zero-based).
    pub fn nth_transaction(&self, n: usize) -> Option<&str> {
        self.transactions.get(n).map(String::as_str)
    }

    pub fn nth(&self, kind: IdKind, n: usize) -> Option<&str> {
        match kind {
            IdKind::Account => self.nth_account(n),
            IdKind::Transaction => self.nth_transaction(n),
        }
    }

    pub fn count(&self, kind: IdKind) -> usize {
        match kind {
            IdKind::Account => self.accounts.len(),
            IdKind::Transaction => self.transactions.len(),
        }
    }

    pub fn accounts(&self) -> &[String] {
        &self.accounts
    }

    pub fn transactions(&self) -> &[String] {
        &self.transactions
    }
}
