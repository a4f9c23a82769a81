// 🗄️ Repository - SQLite persistence for imported transactions and matches
//
// Outside the matching core: the core hands over in-memory records and this
// module stores them. Re-importing an overlapping export is harmless, rows
// are keyed by their idempotency hash.

use crate::matcher::MatchBasis;
use crate::money::Money;
use crate::reconciliation::PaymentMatch;
use crate::transaction::BankTransaction;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// AUDIT TRAIL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A statement was decoded, stored and reconciled in one commit
    StatementImported,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::StatementImported => "statement_imported",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "statement_imported" => Some(AuditKind::StatementImported),
            _ => None,
        }
    }
}

/// Figures of one import run, as written to the audit trail
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRunStats {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub matches: usize,
    pub unresolved: usize,
    pub unapplied_credits: usize,
    pub pending: usize,
}

/// One audit trail entry, keyed by the import run that wrote it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub run_id: String,
    pub kind: AuditKind,
    pub recorded_at: DateTime<Utc>,
    pub stats: ImportRunStats,
}

impl AuditEvent {
    pub fn statement_imported(run_id: &str, stats: ImportRunStats) -> Self {
        AuditEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            kind: AuditKind::StatementImported,
            recorded_at: Utc::now(),
            stats,
        }
    }
}

/// Result of storing a batch of transactions
#[derive(Debug, Clone, Default)]
pub struct InsertSummary {
    /// Ids of transactions that were not stored before
    pub inserted_ids: Vec<String>,
    pub duplicates: usize,
}

impl InsertSummary {
    pub fn inserted(&self) -> usize {
        self.inserted_ids.len()
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bank_transactions (
            id TEXT PRIMARY KEY,
            idempotency_hash TEXT UNIQUE NOT NULL,
            booking_date TEXT NOT NULL,
            value_date TEXT NOT NULL,
            payer_name TEXT,
            payer_account TEXT,
            description TEXT,
            amount_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            imported_at TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            occurrence INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payment_matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id TEXT NOT NULL REFERENCES bank_transactions(id),
            obligation_id TEXT NOT NULL,
            child_id TEXT NOT NULL,
            period TEXT NOT NULL,
            amount_minor INTEGER NOT NULL,
            confidence REAL NOT NULL,
            basis TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            run_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            stats TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_booking_date ON bank_transactions(booking_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_matches_transaction ON payment_matches(transaction_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_run ON import_events(run_id)",
        [],
    )?;

    Ok(())
}

/// Store transactions, skipping any whose idempotency hash is already known.
pub fn insert_transactions(conn: &Connection, transactions: &[BankTransaction]) -> Result<InsertSummary> {
    let mut summary = InsertSummary::default();

    for tx in transactions {
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO bank_transactions (
                    id, idempotency_hash, booking_date, value_date, payer_name,
                    payer_account, description, amount_minor, currency, imported_at,
                    line_number, occurrence
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    tx.id,
                    tx.idempotency_hash(),
                    tx.booking_date.format(DATE_FORMAT).to_string(),
                    tx.value_date.format(DATE_FORMAT).to_string(),
                    tx.payer_name,
                    tx.payer_account,
                    tx.description,
                    tx.amount.minor(),
                    tx.currency,
                    tx.imported_at.to_rfc3339(),
                    tx.line_number as i64,
                    tx.occurrence as i64,
                ],
            )
            .with_context(|| format!("Failed to insert transaction from line {}", tx.line_number))?;

        if inserted == 0 {
            summary.duplicates += 1;
        } else {
            summary.inserted_ids.push(tx.id.clone());
        }
    }

    info!(
        inserted = summary.inserted(),
        duplicates = summary.duplicates,
        "stored transactions"
    );

    Ok(summary)
}

fn parse_date_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// All stored transactions, oldest booking date first
pub fn get_all_transactions(conn: &Connection) -> Result<Vec<BankTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_date, value_date, payer_name, payer_account, description,
                amount_minor, currency, imported_at, line_number, occurrence
         FROM bank_transactions
         ORDER BY booking_date ASC, rowid ASC",
    )?;

    let transactions = stmt
        .query_map([], |row| {
            let line_number: i64 = row.get(9)?;
            let occurrence: i64 = row.get(10)?;
            Ok(BankTransaction {
                id: row.get(0)?,
                booking_date: parse_date_column(row, 1)?,
                value_date: parse_date_column(row, 2)?,
                payer_name: row.get(3)?,
                payer_account: row.get(4)?,
                description: row.get(5)?,
                amount: Money::from_minor(row.get(6)?),
                currency: row.get(7)?,
                imported_at: parse_timestamp_column(row, 8)?,
                line_number: line_number as usize,
                occurrence: occurrence as usize,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

pub fn insert_payment_matches(conn: &Connection, matches: &[PaymentMatch]) -> Result<usize> {
    for m in matches {
        conn.execute(
            "INSERT INTO payment_matches (
                transaction_id, obligation_id, child_id, period, amount_minor, confidence, basis
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                m.transaction_id,
                m.obligation_id,
                m.child_id,
                m.period.format(DATE_FORMAT).to_string(),
                m.amount.minor(),
                m.confidence,
                m.basis.as_str(),
            ],
        )
        .with_context(|| format!("Failed to store match for transaction {}", m.transaction_id))?;
    }

    Ok(matches.len())
}

fn parse_basis(raw: &str) -> Option<MatchBasis> {
    match raw {
        "identifier" => Some(MatchBasis::Identifier),
        "direct_name" => Some(MatchBasis::DirectName),
        "parent_name" => Some(MatchBasis::ParentName),
        _ => None,
    }
}

pub fn get_payment_matches_for_transaction(conn: &Connection, transaction_id: &str) -> Result<Vec<PaymentMatch>> {
    let mut stmt = conn.prepare(
        "SELECT transaction_id, obligation_id, child_id, period, amount_minor, confidence, basis
         FROM payment_matches
         WHERE transaction_id = ?1
         ORDER BY id ASC",
    )?;

    let matches = stmt
        .query_map(params![transaction_id], |row| {
            let basis: String = row.get(6)?;
            Ok(PaymentMatch {
                transaction_id: row.get(0)?,
                obligation_id: row.get(1)?,
                child_id: row.get(2)?,
                period: parse_date_column(row, 3)?,
                amount: Money::from_minor(row.get(4)?),
                confidence: row.get(5)?,
                basis: parse_basis(&basis).ok_or(rusqlite::Error::InvalidColumnType(
                    6,
                    "basis".to_string(),
                    Type::Text,
                ))?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(matches)
}

pub fn insert_event(conn: &Connection, event: &AuditEvent) -> Result<()> {
    let stats_json = serde_json::to_string(&event.stats)?;

    conn.execute(
        "INSERT INTO import_events (event_id, run_id, kind, recorded_at, stats)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.event_id,
            event.run_id,
            event.kind.as_str(),
            event.recorded_at.to_rfc3339(),
            stats_json,
        ],
    )
    .with_context(|| format!("Failed to record {} for run {}", event.kind.as_str(), event.run_id))?;

    Ok(())
}

/// Audit entries written by one import run, oldest first
pub fn get_events_for_run(conn: &Connection, run_id: &str) -> Result<Vec<AuditEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, run_id, kind, recorded_at, stats
         FROM import_events
         WHERE run_id = ?1
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![run_id], |row| {
            let kind: String = row.get(2)?;
            let stats_json: String = row.get(4)?;

            Ok(AuditEvent {
                event_id: row.get(0)?,
                run_id: row.get(1)?,
                kind: AuditKind::parse(&kind).ok_or(rusqlite::Error::InvalidColumnType(
                    2,
                    "kind".to_string(),
                    Type::Text,
                ))?,
                recorded_at: parse_timestamp_column(row, 3)?,
                stats: serde_json::from_str(&stats_json)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM bank_transactions", [], |row| row.get(0))?;
    Ok(count)
}
