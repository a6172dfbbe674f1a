//! Cooperative cancellation for long-running comparisons.
//!
//! A [`CancellationToken`] is cheap to clone; all clones share the same
//! state. Work checks the token at stage boundaries, between read chunks
//! and inside alignment loops, so no operation blocks past its deadline by
//! more than one unit of work.
use crate::error::{CompareError, Result};
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Size of each read when draining a caller-supplied stream.
const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// Shared cancellation flag with an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// A token that only fires when [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also fires once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A token that also fires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
            }),
        }
    }

    /// Request cancellation. Visible to every clone.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
            || self
                .state
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// `Err(Cancelled)` if the token fired.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CompareError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Drain `reader` in fixed-size chunks, checking the token between reads.
    ///
    /// The reader is consumed and dropped on every exit path.
    pub fn read_to_end<R: Read>(&self, mut reader: R) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        loop {
            self.check()?;
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => data.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(data)
    }
}
