// MIT/Apache2 License

//! The wait-token a synchronous `execute` call blocks on.
//!
//! On Linux and Android the token is a futex word. Elsewhere it falls back
//! to a mutex and condition variable with the same wait-until-changed,
//! wake-one behavior.

use crate::ExecError;
use core::sync::atomic::{AtomicU32, Ordering};

const PENDING: u32 = 0;
const COMPLETED: u32 = 1;
const CANCELED: u32 = 2;

pub(crate) struct WaitToken {
    state: AtomicU32,
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    lock: crate::sync::Mutex<()>,
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    cond: crate::sync::Condvar,
}

impl WaitToken {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU32::new(PENDING),
            #[cfg(not(any(target_os = "linux", target_os = "android")))]
            lock: crate::sync::Mutex::new(()),
            #[cfg(not(any(target_os = "linux", target_os = "android")))]
            cond: crate::sync::Condvar::new(),
        }
    }

    /// Block until the token leaves the pending state, and report how it
    /// ended.
    pub(crate) fn wait(&self) -> Result<(), ExecError> {
        let state = self.wait_terminal();
        if state == COMPLETED {
            Ok(())
        } else {
            Err(ExecError::Canceled)
        }
    }

    /// Mark the call as having run to completion and wake the waiter.
    ///
    /// # Safety
    ///
    /// `token` must point to a live token that nobody else finishes. The
    /// token may be freed by its waiter as soon as the state changes, so
    /// nothing behind the pointer is read afterwards.
    pub(crate) unsafe fn complete(token: *const WaitToken) {
        Self::finish(token, COMPLETED)
    }

    /// Mark the call as canceled and wake the waiter.
    ///
    /// # Safety
    ///
    /// Same as [`WaitToken::complete`].
    pub(crate) unsafe fn cancel(token: *const WaitToken) {
        Self::finish(token, CANCELED)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn wait_terminal(&self) -> u32 {
        loop {
            let state = self.state.load(Ordering::Acquire);
            if state != PENDING {
                return state;
            }

            // spurious wakeups and EINTR both land back on the check above
            unsafe {
                libc::syscall(
                    libc::SYS_futex,
                    &self.state as *const AtomicU32,
                    libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                    PENDING,
                    core::ptr::null::<libc::timespec>(),
                );
            }
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    unsafe fn finish(token: *const WaitToken, value: u32) {
        let state: *const AtomicU32 = core::ptr::addr_of!((*token).state);
        (*state).store(value, Ordering::Release);

        // FUTEX_WAKE only hashes the address, so a waiter that already
        // returned and popped its frame is harmless here
        libc::syscall(
            libc::SYS_futex,
            state,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            1,
        );
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn wait_terminal(&self) -> u32 {
        use crate::sync::{cv_wait, mtx_lock};

        let mut guard = mtx_lock(&self.lock);
        loop {
            let state = self.state.load(Ordering::Acquire);
            if state != PENDING {
                return state;
            }
            guard = cv_wait(&self.cond, guard);
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    unsafe fn finish(token: *const WaitToken, value: u32) {
        use crate::sync::mtx_lock;

        // the waiter cannot observe the new state, and return, until the
        // guard is released
        let token = &*token;
        let _guard = mtx_lock(&token.lock);
        token.state.store(value, Ordering::Release);
        token.cond.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::WaitToken;
    use crate::ExecError;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    struct SendPtr(*const WaitToken);
    unsafe impl Send for SendPtr {}

    #[test]
    fn completed_token_publishes_side_effects() {
        let token = WaitToken::new();
        let counter = AtomicUsize::new(0);

        thread::scope(|s| {
            let ptr = SendPtr(&token);
            let counter = &counter;
            s.spawn(move || {
                let ptr = ptr;
                thread::sleep(Duration::from_millis(20));
                counter.fetch_add(1, Ordering::Relaxed);
                unsafe { WaitToken::complete(ptr.0) };
            });

            assert_eq!(token.wait(), Ok(()));
            assert_eq!(counter.load(Ordering::Relaxed), 1);
        });
    }

    #[test]
    fn canceled_token_reports_canceled() {
        let token = WaitToken::new();

        thread::scope(|s| {
            let ptr = SendPtr(&token);
            s.spawn(move || {
                let ptr = ptr;
                unsafe { WaitToken::cancel(ptr.0) };
            });

            assert_eq!(token.wait(), Err(ExecError::Canceled));
        });
    }

    #[test]
    fn finished_token_returns_immediately() {
        let token = WaitToken::new();
        unsafe { WaitToken::complete(&token) };
        assert_eq!(token.wait(), Ok(()));
        assert_eq!(token.wait(), Ok(()));
    }
}
