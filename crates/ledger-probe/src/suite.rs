//! The ledger business-rule probe sequence.
//!
//! Order matters: account creation probes populate [`crate::RunState`]
//! before the retrieval and transaction probes that reference it.

use crate::grader::{ExpectationDescriptor, MatchMode};
use crate::models::Method;
use crate::probe::{Capture, ProbeSpec, Quorum, RequestTemplate};
use serde_json::json;

pub const GROUP_HEALTH: &str = "Health";
pub const GROUP_ACCOUNTS: &str = "Accounts";
pub const GROUP_TRANSACTIONS: &str = "Transactions";
pub const GROUP_BUSINESS_LOGIC: &str = "Business Logic";

const ACCOUNT_CREATION: &str = "Account Creation - Success";

/// Returns the full probe sequence in execution order.
pub fn ledger_suite() -> Vec<ProbeSpec> {
    let mut probes = vec![
        ProbeSpec::new("Service Health Check", GROUP_HEALTH, Method::Get, "/test/ping")
            .expect(ExpectationDescriptor::exact_status(200))
            .expect(ExpectationDescriptor::body_text("pong")),
        create_account(ACCOUNT_CREATION),
        create_account("Account Creation - Second Account"),
        account_rejection(
            "Account Creation - Negative Balance",
            json!({"account_id": "${unique:NEG_BAL}", "initial_balance": -100.0}),
            400,
            Some("VALIDATION_ERROR"),
        ),
        account_rejection(
            "Account Creation - Zero Balance",
            json!({"account_id": "${unique:ZERO_BAL}", "initial_balance": 0.0}),
            400,
            Some("INVALID_BALANCE"),
        ),
        // Any validation error code is acceptable for a missing id.
        account_rejection(
            "Account Creation - Missing Account ID",
            json!({"initial_balance": 100.0}),
            400,
            None,
        ),
        account_rejection(
            "Account Creation - Duplicate Account",
            json!({"account_id": "${account[0]|DUPLICATE_TEST}", "initial_balance": 500.0}),
            409,
            Some("ACCOUNT_ALREADY_EXISTS"),
        ),
        ProbeSpec::new(
            "Account Retrieval - Success",
            GROUP_ACCOUNTS,
            Method::Get,
            "/accounts/${account[0]}",
        )
        .expect(ExpectationDescriptor::exact_status(200))
        .expect(ExpectationDescriptor::required_field("account_id", "${account[0]}")),
        ProbeSpec::new(
            "Account Retrieval - Not Found",
            GROUP_ACCOUNTS,
            Method::Get,
            "/accounts/${unique:NON_EXISTENT}",
        )
        .expect(ExpectationDescriptor::exact_status(404)),
        ProbeSpec::new(
            "Transaction Processing - Success",
            GROUP_TRANSACTIONS,
            Method::Post,
            "/transactions",
        )
        .with_body(transfer("${account[0]}", "${account[1]}", 100.25))
        .expect(ExpectationDescriptor::status_set([200, 201]))
        .expect(ExpectationDescriptor::required_field("status", "COMPLETED"))
        .expect(ExpectationDescriptor::required_field("amount", 100.25))
        .capture(Capture::transaction_from_response("transaction_id"))
        .with_prerequisite(create_account(ACCOUNT_CREATION)),
    ];

    probes.extend([
        transaction_rejection(
            "Transaction - Insufficient Balance",
            transfer("${account[0]}", "${account[1]|DEST_ACC}", 999_999.99),
            "INSUFFICIENT_BALANCE",
        ),
        transaction_rejection(
            "Transaction - Negative Amount",
            transfer("${account[0]}", "${account[1]|DEST_ACC}", -50.0),
            "VALIDATION_ERROR",
        ),
        transaction_rejection(
            "Transaction - Same Account",
            transfer("${account[0]}", "${account[0]}", 50.0),
            "INVALID_TRANSACTION",
        ),
        transaction_rejection(
            "Transaction - Source Account Not Found",
            transfer("${unique:NON_EXISTENT}", "${account[0]}", 50.0),
            "ACCOUNT_NOT_FOUND",
        ),
        ProbeSpec::new(
            "Transaction Retrieval - Success",
            GROUP_TRANSACTIONS,
            Method::Get,
            "/transactions/${transaction[0]}",
        )
        .expect(ExpectationDescriptor::exact_status(200))
        .expect(ExpectationDescriptor::required_field(
            "transaction_id",
            "${transaction[0]}",
        )),
        // 500 is tolerated: some services surface an unknown id as a server error.
        ProbeSpec::new(
            "Transaction Retrieval - Not Found",
            GROUP_TRANSACTIONS,
            Method::Get,
            "/transactions/${unique:NON_EXISTENT}",
        )
        .expect(ExpectationDescriptor::status_set([404, 500])),
        ProbeSpec::new(
            "Business Logic - Multiple Transactions",
            GROUP_BUSINESS_LOGIC,
            Method::Post,
            "/transactions",
        )
        .with_body(transfer("${account[0]}", "${account[1]}", 50.0))
        .then_request(
            RequestTemplate::new(Method::Post, "/transactions")
                .with_body(transfer("${account[0]}", "${account[1]}", 25.0)),
        )
        .expect(ExpectationDescriptor::status_set([200, 201]))
        .with_quorum(Quorum::AtLeast(1))
        .capture(Capture::transaction_from_response("transaction_id")),
    ]);

    probes
}

fn create_account(name: &str) -> ProbeSpec {
    ProbeSpec::new(name, GROUP_ACCOUNTS, Method::Post, "/accounts")
        .with_body(json!({"account_id": "${unique:TEST_ACC}", "initial_balance": 1000.50}))
        .expect(ExpectationDescriptor::exact_status(200))
        .expect(ExpectationDescriptor::optional_field(
            "account_id",
            "${unique:TEST_ACC}",
        ))
        .expect(ExpectationDescriptor::optional_field("initial_balance", 1000.50))
        .capture(Capture::account_from_request("account_id"))
}

fn account_rejection(
    name: &str,
    body: serde_json::Value,
    status: u16,
    error_code: Option<&str>,
) -> ProbeSpec {
    let hint = match error_code {
        Some(code) => ExpectationDescriptor::error_code(code, MatchMode::Exact),
        None => ExpectationDescriptor::any_error_code(),
    };
    ProbeSpec::new(name, GROUP_ACCOUNTS, Method::Post, "/accounts")
        .with_body(body)
        .expect(ExpectationDescriptor::exact_status(status))
        .expect(hint)
}

/// A transfer the service should refuse, either with 400 or with a
/// recorded FAILED transaction.
fn transaction_rejection(name: &str, body: serde_json::Value, error_code: &str) -> ProbeSpec {
    ProbeSpec::new(name, GROUP_TRANSACTIONS, Method::Post, "/transactions")
        .with_body(body)
        .expect(ExpectationDescriptor::status_set([200, 400]))
        .expect(ExpectationDescriptor::optional_field("status", "FAILED"))
        .expect(ExpectationDescriptor::error_code(
            error_code,
            MatchMode::Substring,
        ))
        .capture(Capture::transaction_from_response("transaction_id"))
}

fn transfer(source: &str, destination: &str, amount: f64) -> serde_json::Value {
    json!({
        "source_account_id": source,
        "destination_account_id": destination,
        "amount": amount
    })
}
