//! Cooperative cancellation for a running parser.

use crate::parser::Shared;
use std::fmt;
use std::sync::Arc;

/// A cloneable handle for cancelling a parser from any thread.
///
/// Cancelling clears the parser's run flag, closes its slot ring and wakes
/// both a consumer blocked in `get_next_example` and a parse thread blocked
/// on a full ring. The parse thread stops at its next loop check; a record
/// read already in progress is allowed to finish.
///
/// Cancelling is idempotent. It does not join the parse thread; the owner of
/// the parser does that with `end_parser` or `exit_parser`.
pub struct CancelHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> CancelHandle<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    /// Requests the parser to stop.
    pub fn cancel(&self) {
        if self.shared.request_stop() {
            tracing::debug!("parse thread cancelled through handle");
        }
    }

    /// Returns `true` once the parser has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_stopped()
    }
}

impl<T> Clone for CancelHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for CancelHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
