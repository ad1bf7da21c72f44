//! Condvar-based doorbell (fallback)
//!
//! Used on platforms without futex support.

use super::{Wake, WorkSignal};

use accel_core::error::Result;
use accel_core::notifier::Notifier;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct State {
    pending: u32,
    stop: bool,
}

/// Mutex + condvar doorbell.
#[derive(Default)]
pub struct CondvarDoorbell {
    state: Mutex<State>,
    condvar: Condvar,
}

impl CondvarDoorbell {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for CondvarDoorbell {
    fn notify(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.pending = state.pending.saturating_add(1);
        }
        self.condvar.notify_one();
        Ok(())
    }
}

impl WorkSignal for CondvarDoorbell {
    fn wait_for_work(&self) -> Wake {
        let mut state = self.state.lock();
        loop {
            if state.stop {
                return Wake::Stop;
            }
            if state.pending > 0 {
                return Wake::Work;
            }
            self.condvar.wait(&mut state);
        }
    }

    fn finish_pass(&self) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(1);
    }

    fn request_stop(&self) {
        self.state.lock().stop = true;
        self.condvar.notify_all();
    }

    fn is_stopping(&self) -> bool {
        self.state.lock().stop
    }

    fn pending(&self) -> u32 {
        self.state.lock().pending
    }
}
