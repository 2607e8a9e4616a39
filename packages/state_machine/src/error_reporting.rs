//! Where failed collaborator calls are sent.

use crate::FetchError;

/// Fire-and-forget sink for failures the machine turned into states.
pub trait ErrorReporter: Send + Sync {
    /// Records `error`. Must not block.
    fn report(&self, error: &FetchError);
}

/// Writes failures to the log: bugs at `error`, everything else at
/// `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &FetchError) {
        if error.should_report() {
            log::error!("{error}");
        } else {
            log::warn!("{error}");
        }
    }
}
