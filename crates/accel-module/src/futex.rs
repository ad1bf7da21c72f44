//! Wait/wake on a 32-bit word.
//!
//! On Linux this is the futex syscall. Two scopes exist:
//!
//! - **private**: the word lives in process-local memory (the doorbell).
//! - **shared**: the word lives in a shared mapping and may be waited on
//!   through one mapping and woken through another (ring sequence words).
//!   The kernel keys these by the backing page, not the virtual address.
//!
//! Elsewhere `wait` degrades to a short sleep and `wake` is a no-op, so
//! callers must always re-check their condition after `wait` returns.

use std::sync::atomic::AtomicU32;
use std::time::Duration;

/// Whether a futex word is process-private or lives in shared memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Private,
    Shared,
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        #[inline]
        fn op(base: libc::c_int, scope: Scope) -> libc::c_int {
            match scope {
                Scope::Private => base | libc::FUTEX_PRIVATE_FLAG,
                Scope::Shared => base,
            }
        }

        /// Sleep while `*word == expected`, up to `timeout`.
        ///
        /// Returns `true` if woken by [`wake`]. Timeouts, value mismatches
        /// and signals return `false`.
        pub fn wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>, scope: Scope) -> bool {
            let timespec = timeout.map(|d| libc::timespec {
                tv_sec: d.as_secs() as libc::time_t,
                tv_nsec: d.subsec_nanos() as libc::c_long,
            });
            let timespec_ptr = match &timespec {
                Some(ts) => ts as *const libc::timespec,
                None => std::ptr::null(),
            };

            // FUTEX_WAIT only reads the word, so a read-only mapping is fine.
            let result = unsafe {
                libc::syscall(
                    libc::SYS_futex,
                    word.as_ptr(),
                    op(libc::FUTEX_WAIT, scope),
                    expected,
                    timespec_ptr,
                    std::ptr::null::<u32>(),
                    0u32,
                )
            };
            result == 0
        }

        /// Wake up to `count` waiters on `word`.
        pub fn wake(word: &AtomicU32, count: i32, scope: Scope) {
            unsafe {
                libc::syscall(
                    libc::SYS_futex,
                    word.as_ptr(),
                    op(libc::FUTEX_WAKE, scope),
                    count,
                    std::ptr::null::<libc::timespec>(),
                    std::ptr::null::<u32>(),
                    0u32,
                );
            }
        }
    } else {
        use std::sync::atomic::Ordering;

        const FALLBACK_SLICE: Duration = Duration::from_micros(50);

        /// Sleep briefly if `*word == expected`. Never reports a wake.
        pub fn wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>, _scope: Scope) -> bool {
            if word.load(Ordering::Acquire) == expected {
                let slice = timeout.map_or(FALLBACK_SLICE, |t| t.min(FALLBACK_SLICE));
                std::thread::sleep(slice);
            }
            false
        }

        /// No-op: fallback waiters poll.
        pub fn wake(_word: &AtomicU32, _count: i32, _scope: Scope) {}
    }
}

/// Wake every waiter on `word`.
#[inline]
pub fn wake_all(word: &AtomicU32, scope: Scope) {
    wake(word, i32::MAX, scope);
}
