//! Progress reporting and cancellation for scans

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Phase of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Walking the source tree
    Discovering,
    /// Processing files
    Processing,
    /// All workers finished
    Complete,
}

impl ScanPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovering => "Discovering files",
            Self::Processing => "Processing",
            Self::Complete => "Complete",
        }
    }
}

/// Progress update passed to the scan callback.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    /// Files finished so far
    pub current: usize,
    /// Files discovered
    pub total: usize,
    /// Bytes of finished top-level files
    pub bytes_done: u64,
    /// Bytes of all discovered files
    pub bytes_total: u64,
    /// File the update is about, relative to the source
    pub current_file: Option<String>,
}

impl ScanProgress {
    #[must_use]
    pub fn new(phase: ScanPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            bytes_done: 0,
            bytes_total: 0,
            current_file: None,
        }
    }

    #[must_use]
    pub fn with_bytes(mut self, done: u64, total: u64) -> Self {
        self.bytes_done = done;
        self.bytes_total = total;
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.current_file = Some(file.into());
        self
    }

    /// Fraction of bytes done (0.0 - 1.0)
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.bytes_total == 0 {
            1.0
        } else {
            self.bytes_done as f32 / self.bytes_total as f32
        }
    }
}

/// Cooperative cancellation flag shared between a scan and its caller.
///
/// Workers check it before taking a file and between nested members.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_percentage() {
        let progress = ScanProgress::new(ScanPhase::Processing, 1, 4).with_bytes(25, 100);
        assert!((progress.percentage() - 0.25).abs() < f32::EPSILON);
        assert!((ScanProgress::new(ScanPhase::Complete, 0, 0).percentage() - 1.0).abs() < f32::EPSILON);
    }
}
