use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Attribution and coordination data that accompanies every operation.
///
/// The context replaces any process-wide ambient state: callers build one
/// per request and pass it by reference into dispatch and persistence.
/// The store uses it to fill event metadata the caller left blank, and
/// optimistic-concurrency callers carry their expected sequence number
/// in it.
///
/// Cancellation is cooperative: [`RequestContext::cancel`] flips a shared
/// flag that long-running operations check at their suspension points.
/// Handlers that are already running are allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Identifier of the acting user, stamped onto event metadata.
    pub user_id: String,

    /// Identifier of the owning account.
    pub account_id: String,

    /// Identifier of the application module issuing the change.
    pub module_id: String,

    /// Logical grouping (e.g. tenant or workspace) for the change.
    pub group: String,

    /// Sequence number the caller expects the aggregate to be at.
    ///
    /// When set, the store rejects the write with a stale-sequence error
    /// before any event is recorded if the committed head differs.
    pub expected_sequence_no: Option<i64>,

    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    /// Creates an empty context with no attribution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the acting user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets the owning account.
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Sets the issuing module.
    pub fn with_module(mut self, module_id: impl Into<String>) -> Self {
        self.module_id = module_id.into();
        self
    }

    /// Sets the logical group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Sets the expected aggregate sequence number for the write.
    pub fn expect_sequence(mut self, sequence_no: i64) -> Self {
        self.expected_sequence_no = Some(sequence_no);
        self
    }

    /// Requests cancellation of work carrying this context.
    ///
    /// Clones of the context share the flag, so cancelling one cancels
    /// all of them.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
