// Fee Reconciliation - Core Library
// Exposes all modules for use in the CLI and tests

pub mod config;
pub mod data_quality;
pub mod db;
pub mod entities;
pub mod error;
pub mod identifier;
pub mod import;
pub mod locale;
pub mod matcher;
pub mod money;
pub mod normalize;
pub mod parser;
pub mod reconciliation;
pub mod transaction;

// Re-export commonly used types
pub use config::AppConfig;
pub use data_quality::{ImportQuality, RowIssue, Severity, SkipReason};
pub use db::{
    AuditEvent, AuditKind, ImportRunStats, InsertSummary,
    setup_database, insert_transactions, get_all_transactions,
    insert_payment_matches, get_payment_matches_for_transaction,
    insert_event, get_events_for_run, verify_count,
};
pub use entities::{Child, FeeObligation, ObligationBook, Parent, Roster};
pub use error::{ImportError, ParseError};
pub use identifier::{extract_member_number, resolve_member};
pub use import::{run_import, run_import_into, ImportOutcome};
pub use locale::{parse_amount, parse_date};
pub use matcher::{score_name, MatchBasis, MatchCandidate, PersonMatcher, ACCEPTANCE_THRESHOLD};
pub use money::Money;
pub use normalize::normalize;
pub use parser::{BankParser, CsvExportParser, DecodedStatement};
pub use reconciliation::{
    PaymentMatch, ReconciliationEngine, ReconciliationReport,
    UnappliedCredit, UnresolvedReason, UnresolvedTransaction,
};
pub use transaction::BankTransaction;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
