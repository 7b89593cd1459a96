//! Error types for parser lifecycle operations.

use thiserror::Error;

/// Errors that can occur while configuring, starting or stopping a parser.
///
/// Running out of input is not an error: it is reported as `None` from
/// [`InputParser::get_next_example`](crate::InputParser::get_next_example).
#[derive(Debug, Error)]
pub enum ParserError {
    /// `start_parser` was called while a parse thread is already attached.
    #[error("parser thread is already running; multiple parse threads are not supported")]
    AlreadyRunning,

    /// The ring must hold at least one example.
    #[error("invalid ring capacity {capacity} (must be at least 1)")]
    InvalidCapacity {
        /// The rejected capacity.
        capacity: usize,
    },

    /// `init` was called while a parse thread is still attached.
    #[error("parser is busy; end or cancel the parse thread before re-initialising")]
    Busy,

    /// The operating system refused to spawn the parse thread.
    #[error("failed to spawn parse thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The parse thread panicked. Examples parsed before the panic were
    /// still delivered.
    #[error("parse thread panicked")]
    ParseThreadPanicked,
}

impl ParserError {
    /// Returns `true` if the error was caused by calling an operation in the
    /// wrong lifecycle state. The parser itself is unaffected.
    #[inline]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning | Self::InvalidCapacity { .. } | Self::Busy
        )
    }

    /// Returns `true` if the parser cannot be restarted without a fresh `init`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ParseThreadPanicked)
    }
}
