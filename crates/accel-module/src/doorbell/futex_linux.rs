//! Linux futex-based doorbell
//!
//! Futex word semantics:
//! - bits 0..31 = pending notification count
//! - bit 31     = stop requested
//!
//! The worker sleeps with FUTEX_WAIT expecting the word to be exactly 0.
//! Any notify or stop changes the word first, so a wake that races with
//! the worker going to sleep makes the wait fail with EAGAIN instead of
//! being lost.

use super::{Wake, WorkSignal};
use crate::futex::{self, Scope};

use accel_core::error::Result;
use accel_core::notifier::Notifier;

use std::sync::atomic::{AtomicU32, Ordering};

const STOP_BIT: u32 = 1 << 31;
const COUNT_MASK: u32 = STOP_BIT - 1;

/// Futex-backed doorbell.
pub struct FutexDoorbell {
    word: AtomicU32,
}

impl FutexDoorbell {
    pub fn new() -> Self {
        Self {
            word: AtomicU32::new(0),
        }
    }
}

impl Default for FutexDoorbell {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for FutexDoorbell {
    fn notify(&self) -> Result<()> {
        // Saturate rather than carry into the stop bit.
        let _ = self.word.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |w| {
            if w & COUNT_MASK == COUNT_MASK {
                None
            } else {
                Some(w + 1)
            }
        });
        futex::wake(&self.word, 1, Scope::Private);
        Ok(())
    }
}

impl WorkSignal for FutexDoorbell {
    fn wait_for_work(&self) -> Wake {
        loop {
            let w = self.word.load(Ordering::Acquire);
            if w & STOP_BIT != 0 {
                return Wake::Stop;
            }
            if w != 0 {
                return Wake::Work;
            }
            futex::wait(&self.word, 0, None, Scope::Private);
        }
    }

    fn finish_pass(&self) {
        let _ = self.word.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |w| {
            if w & COUNT_MASK == 0 {
                None
            } else {
                Some(w - 1)
            }
        });
    }

    fn request_stop(&self) {
        self.word.fetch_or(STOP_BIT, Ordering::AcqRel);
        futex::wake_all(&self.word, Scope::Private);
    }

    fn is_stopping(&self) -> bool {
        self.word.load(Ordering::Acquire) & STOP_BIT != 0
    }

    fn pending(&self) -> u32 {
        self.word.load(Ordering::Relaxed) & COUNT_MASK
    }
}
