//! Audit destinations and their writers.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;

use serde::Deserialize;
use syslog::{Facility, Formatter3164, Logger, LoggerBackend};

use super::{AuditConfig, AuditError};

/// Audit file used when the file destination has no explicit path.
pub const DEFAULT_AUDIT_LOG_PATH: &str = "/var/log/authgate.log";

/// Process tag attached to syslog entries.
const SYSLOG_TAG: &str = "authgate";

/// Closed set of audit destinations, resolved once at config load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum AuditDestination {
    /// Standard output. Selected by `""` or `"stdout"`.
    #[default]
    Stdout,
    /// Append-only file.
    File,
    /// Local syslog daemon, error severity.
    Syslog,
}

impl FromStr for AuditDestination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "stdout" => Ok(Self::Stdout),
            "file" => Ok(Self::File),
            "syslog" => Ok(Self::Syslog),
            other => Err(format!(
                "unknown audit destination '{other}' (expected \"\", \"stdout\", \"file\" or \"syslog\")"
            )),
        }
    }
}

impl AuditDestination {
    /// Severity records are written at. Syslog entries go out at error
    /// severity; stream destinations are informational.
    pub fn severity(&self) -> &'static str {
        match self {
            Self::Stdout | Self::File => "info",
            Self::Syslog => "error",
        }
    }
}

impl TryFrom<String> for AuditDestination {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AuditDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdout => "stdout",
            Self::File => "file",
            Self::Syslog => "syslog",
        })
    }
}

/// An opened destination.
pub(super) enum AuditWriter {
    /// Line-oriented byte stream (stdout, file, injected writer).
    Stream(Box<dyn Write + Send>),
    /// Local syslog connection.
    Syslog(Logger<LoggerBackend, Formatter3164>),
}

impl AuditWriter {
    /// Open the configured destination.
    pub(super) fn open(config: &AuditConfig) -> Result<Self, AuditError> {
        match config.destination {
            AuditDestination::Stdout => Ok(Self::Stream(Box::new(std::io::stdout()))),
            AuditDestination::File => {
                let path = config.resolved_file_path();
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                Ok(Self::Stream(Box::new(file)))
            }
            AuditDestination::Syslog => {
                let formatter = Formatter3164 {
                    facility: Facility::LOG_DAEMON,
                    hostname: None,
                    process: SYSLOG_TAG.to_owned(),
                    pid: std::process::id(),
                };
                syslog::unix(formatter)
                    .map(Self::Syslog)
                    .map_err(|e| AuditError::Syslog(e.to_string()))
            }
        }
    }

    /// Write one complete record.
    pub(super) fn write_line(&mut self, line: &str) -> Result<(), AuditError> {
        match self {
            Self::Stream(writer) => {
                writeln!(writer, "{line}")?;
                writer.flush()?;
                Ok(())
            }
            Self::Syslog(logger) => logger
                .err(line)
                .map_err(|e| AuditError::Syslog(e.to_string())),
        }
    }
}
