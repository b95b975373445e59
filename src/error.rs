//! Error types for telemetry decoding and command encoding.
//!
//! Every fallible operation in racebridge returns [`Result`] with a [`TelemetryError`].
//! Nothing in the crate aborts the process; callers decide which failures are fatal.
//!
//! ## Error Categories
//!
//! - **Lookup Errors**: an unknown variable name or index (`NotFound`)
//! - **Bounds Errors**: a descriptor that reaches past the end of the frame (`OutOfBounds`)
//! - **Command Errors**: a broadcast kind or argument shape the producer would not accept (`Rejected`)
//! - **Type Conversion Errors**: typed extraction against a different type tag
//! - **Parse Errors**: malformed header records or session YAML
//! - **Connection Errors**: failures reported by the transport collaborator
//!
//! Connection loss and layout changes are *not* errors; they are reported as
//! [`PollResult`](crate::PollResult) values.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use racebridge::TelemetryError;
//!
//! let error = TelemetryError::rejected("PitCommand requires a numeric second argument");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Variable '{variable}' not found in telemetry data")]
    NotFound { variable: String },

    #[error(
        "Variable '{variable}' reads {len} bytes at offset {offset:#x}, beyond frame length {frame_len}"
    )]
    OutOfBounds { variable: String, offset: usize, len: usize, frame_len: usize },

    #[error("Broadcast command rejected: {reason}")]
    Rejected { reason: String },

    #[error("Type conversion error: {details}")]
    TypeConversion { details: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Failed to connect to the simulator: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Buffer operation failed: {context}")]
    Buffer {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::NotFound { .. } => true,
            TelemetryError::Rejected { .. } => true,
            TelemetryError::Connection { .. } => true,
            TelemetryError::Buffer { .. } => true,
            TelemetryError::OutOfBounds { .. } => false,
            TelemetryError::TypeConversion { .. } => false,
            TelemetryError::Parse { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::NotFound { .. } => vec![
                "Check variable name spelling (names are case-sensitive)",
                "Look the variable up again after a layout change",
                "Check the directory before reading optional variables",
            ],
            TelemetryError::OutOfBounds { .. } => vec![
                "Poll until the tracker reports a stable frame before decoding",
                "Verify the descriptor belongs to the current directory generation",
                "Check element index against the descriptor's element count",
            ],
            TelemetryError::Rejected { .. } => vec![
                "Check the broadcast kind is one the simulator recognizes",
                "Supply every argument the command's shape requires",
                "Use numeric arguments that fit the producer's 16-bit fields",
            ],
            TelemetryError::TypeConversion { .. } => vec![
                "Check the variable's type tag in the directory",
                "Use the decoded value form for dynamically typed access",
            ],
            TelemetryError::Parse { .. } => vec![
                "Check data format compatibility",
                "Verify source data integrity",
                "Wait for the next configuration version",
            ],
            TelemetryError::Connection { .. } => vec![
                "Ensure the simulator is running",
                "Check permissions for shared memory access",
                "Keep polling; the tracker reconnects on its own",
            ],
            TelemetryError::Buffer { .. } => vec![
                "Restart the telemetry driver",
                "Check for panics in transport implementations",
            ],
        }
    }

    /// Helper constructor for unknown variable names.
    pub fn not_found(variable: impl Into<String>) -> Self {
        TelemetryError::NotFound { variable: variable.into() }
    }

    /// Helper constructor for out-of-range directory indices.
    pub fn index_not_found(index: usize, count: usize) -> Self {
        TelemetryError::NotFound { variable: format!("#{index} (directory holds {count})") }
    }

    /// Helper constructor for reads that would leave the frame.
    pub fn out_of_bounds(
        variable: impl Into<String>,
        offset: usize,
        len: usize,
        frame_len: usize,
    ) -> Self {
        TelemetryError::OutOfBounds { variable: variable.into(), offset, len, frame_len }
    }

    /// Helper constructor for rejected broadcast commands.
    pub fn rejected(reason: impl Into<String>) -> Self {
        TelemetryError::Rejected { reason: reason.into() }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for buffer operation errors.
    pub fn buffer_operation_error(context: impl Into<String>) -> Self {
        TelemetryError::Buffer { context: context.into(), source: None }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::connection_failed_with_source("transport I/O failure", Box::new(err))
    }
}
