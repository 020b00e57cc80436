//! Cooperative cancellation primitive shared by the engine and detectors
//! (spec.md #5).

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How often, in characters scanned, a reference detector re-checks the
/// token mid-scan.
pub const CHECK_INTERVAL_CHARS: usize = 4096;

/// Checked at the stage boundaries of `RedactionEngine::redact` and polled
/// by reference detectors roughly every [`CHECK_INTERVAL_CHARS`] characters,
/// so a long-running scan can still be aborted mid-flight rather than only
/// between stages.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Call from inside a scan loop keyed on the current character offset.
    /// Only actually loads the flag once `position` reaches `*checkpoint`,
    /// then advances `*checkpoint` by [`CHECK_INTERVAL_CHARS`] regardless of
    /// outcome, so the cost of polling stays proportional to document size
    /// rather than match count.
    pub fn poll(&self, checkpoint: &mut usize, position: usize) -> Result<()> {
        if position < *checkpoint {
            return Ok(());
        }
        *checkpoint = position + CHECK_INTERVAL_CHARS;
        if self.is_cancelled() {
            return Err(Error::OperationCancelled("detector scan cancelled mid-flight".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled_and_flips_once() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn poll_is_noop_before_checkpoint() {
        let token = CancellationToken::new();
        token.cancel();
        let mut checkpoint = CHECK_INTERVAL_CHARS;
        assert!(token.poll(&mut checkpoint, 10).is_ok());
        assert_eq!(checkpoint, CHECK_INTERVAL_CHARS);
    }

    #[test]
    fn poll_errors_once_position_reaches_checkpoint() {
        let token = CancellationToken::new();
        token.cancel();
        let mut checkpoint = CHECK_INTERVAL_CHARS;
        assert!(token.poll(&mut checkpoint, CHECK_INTERVAL_CHARS).is_err());
        assert_eq!(checkpoint, CHECK_INTERVAL_CHARS * 2);
    }
}
