// COSTA School Administration - Core Library
// Exposes all modules for use in CLI, TUI, API server, and tests

pub mod db;
pub mod entities;
pub mod error;
pub mod similarity;
pub mod ledger;
pub mod report;
pub mod auth;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use db::{insert_event, setup_database, AuditEvent, RecordStore, StoreResult, SYSTEM_ACTOR};
pub use entities::{
    Class, ExpenseRecord, IncomeRecord, LedgerEntry, Student, StudentWithClass, UniformItem,
    MAX_AMOUNT,
};
pub use error::{AuthError, ReportError, StoreError};
pub use similarity::{SimilarMatch, SimilarityEngine};
pub use ledger::{
    build_cashbook, CashbookEntry, CategoryBreakdown, CategoryTotal, DashboardMetrics, EntryKind,
    LedgerAggregator, LedgerSummary, MonthlyTotals,
};
pub use report::{
    format_amount, format_signed_amount, render_report, report_filename, ReportDocument,
    ReportRenderer,
};
pub use auth::{
    AuthenticationPolicy, ExternalIdentityPolicy, FixedCredentialPolicy, IdentityProvider,
    Operator, Session,
};
pub use config::AppConfig;
pub use logging::LogTarget;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
