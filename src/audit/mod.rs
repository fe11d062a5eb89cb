//! Audit trail for authorization decisions.
//!
//! Every decided request is written as one JSON object per line to the
//! configured destination (stdout, local syslog, or an append-only file).
//! The destination is opened lazily on the first record and reused for
//! the process lifetime; opening and writing both happen under a single
//! mutex so concurrent callers never open duplicate handles or interleave
//! partial records.
//!
//! Audit failures are returned to the caller and never influence the
//! decision that was audited.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::authz::{Decision, Request};

mod destination;

pub use destination::{AuditDestination, DEFAULT_AUDIT_LOG_PATH};

use destination::AuditWriter;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure to record an audit entry. Recoverable per call.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The transport handed over no request.
    #[error("authorization request is missing")]
    MissingRequest,

    /// The transport handed over no decision.
    #[error("authorization decision is missing")]
    MissingDecision,

    /// Opening or writing the destination failed.
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The local syslog daemon could not be reached or rejected a write.
    #[error("syslog error: {0}")]
    Syslog(String),

    /// The record could not be encoded.
    #[error("failed to encode audit record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A previous writer panicked while holding the audit lock.
    #[error("audit lock poisoned")]
    LockPoisoned,
}

// ---------------------------------------------------------------------------
// Config and record
// ---------------------------------------------------------------------------

/// Where audit records go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Destination selector.
    pub destination: AuditDestination,
    /// Target file for [`AuditDestination::File`]. Falls back to
    /// [`DEFAULT_AUDIT_LOG_PATH`] when unset.
    pub file_path: Option<PathBuf>,
}

impl AuditConfig {
    /// Effective file path for the file destination.
    pub fn resolved_file_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_LOG_PATH))
    }
}

/// One audit log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// RFC 3339 timestamp of the write.
    pub time: String,
    /// Severity tag, matching the severity the destination writes at.
    pub level: String,
    /// HTTP method of the audited request.
    pub method: String,
    /// Request URI.
    pub uri: String,
    /// Caller identity.
    pub user: String,
    /// Decision outcome.
    pub allow: bool,
    /// Decision message.
    pub msg: String,
    /// Decision error, empty when none.
    pub err: String,
}

impl AuditRecord {
    /// Capture a request/decision pair written at `level`.
    pub fn new(request: &Request, decision: &Decision, level: &str) -> Self {
        Self {
            time: Utc::now().to_rfc3339(),
            level: level.to_owned(),
            method: request.method.clone(),
            uri: request.uri.clone(),
            user: request.user.clone(),
            allow: decision.allow,
            msg: decision.message.clone(),
            err: decision.error.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Auditor seam
// ---------------------------------------------------------------------------

/// Records decisions. Inputs are optional because the transport may fail
/// to produce one of them.
pub trait Auditor: Send + Sync {
    /// Audit a request (client → daemon) and its decision.
    fn audit_request(
        &self,
        request: Option<&Request>,
        decision: Option<&Decision>,
    ) -> Result<(), AuditError>;

    /// Audit a response (daemon → client) and its decision.
    fn audit_response(
        &self,
        request: Option<&Request>,
        decision: Option<&Decision>,
    ) -> Result<(), AuditError>;
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Audit sink writing to a lazily-opened destination.
pub struct AuditSink {
    config: AuditConfig,
    writer: Mutex<Option<AuditWriter>>,
}

impl std::fmt::Debug for AuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuditSink {
    /// Create a sink. Nothing is opened until the first record.
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
        }
    }

    /// Create a sink over an already-open writer.
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            config: AuditConfig::default(),
            writer: Mutex::new(Some(AuditWriter::Stream(writer))),
        }
    }

    /// Record a request and the decision made for it.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::MissingRequest`] or
    /// [`AuditError::MissingDecision`] (nothing written) when an input is
    /// absent, or an I/O/syslog error when the destination fails.
    pub fn record(
        &self,
        request: Option<&Request>,
        decision: Option<&Decision>,
    ) -> Result<(), AuditError> {
        let request = request.ok_or(AuditError::MissingRequest)?;
        let decision = decision.ok_or(AuditError::MissingDecision)?;

        let line = serde_json::to_string(&AuditRecord::new(
            request,
            decision,
            self.config.destination.severity(),
        ))?;

        let mut guard = self.writer.lock().map_err(|_| AuditError::LockPoisoned)?;
        if guard.is_none() {
            *guard = Some(AuditWriter::open(&self.config)?);
            info!(destination = %self.config.destination, "audit destination initialized");
        }
        if let Some(writer) = guard.as_mut() {
            writer.write_line(&line)?;
        }
        Ok(())
    }

    /// Responses are not audited; the request record already covers the
    /// call.
    pub fn record_response(
        &self,
        _request: Option<&Request>,
        _decision: Option<&Decision>,
    ) -> Result<(), AuditError> {
        debug!("response audit skipped");
        Ok(())
    }
}

impl Auditor for AuditSink {
    fn audit_request(
        &self,
        request: Option<&Request>,
        decision: Option<&Decision>,
    ) -> Result<(), AuditError> {
        self.record(request, decision)
    }

    fn audit_response(
        &self,
        request: Option<&Request>,
        decision: Option<&Decision>,
    ) -> Result<(), AuditError> {
        self.record_response(request, decision)
    }
}
