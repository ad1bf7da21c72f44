//! Cancellation token for bounded completion waits.
//!
//! A client blocked in a parked wait checks its token between sleeps and
//! returns `Err(AccelError::Cancelled)` once it fires. Tokens can be linked
//! so that cancelling a parent cancels every child.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token for checking and triggering cancellation.
///
/// Cloning shares the same flag.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Option<Arc<TokenInner>>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    /// Create a new independent token.
    pub fn new() -> Self {
        Self {
            inner: Some(Arc::new(TokenInner::default())),
        }
    }

    /// A token that never fires. Does not allocate.
    pub const fn never() -> Self {
        Self { inner: None }
    }

    /// Create a child token: cancelled when either it or `self` is.
    pub fn child(&self) -> Self {
        Self {
            inner: Some(Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            })),
        }
    }

    /// Check if cancellation was requested here or on any ancestor.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match &self.inner {
            Some(inner) => {
                if inner.cancelled.load(Ordering::Acquire) {
                    return true;
                }
                match &inner.parent {
                    Some(parent) => parent.is_cancelled(),
                    None => false,
                }
            }
            None => false,
        }
    }

    /// Request cancellation. Parents are not affected.
    pub fn cancel(&self) {
        if let Some(inner) = &self.inner {
            inner.cancelled.store(true, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
