// MIT/Apache2 License

//! Current synchronization primitives for this crate.

cfg_if::cfg_if! {
    if #[cfg(feature = "pl")] {
        pub(crate) use parking_lot::{Condvar, Mutex, MutexGuard};

        pub(crate) fn mtx_lock<T>(mtx: &Mutex<T>) -> MutexGuard<'_, T> {
            mtx.lock()
        }

        pub(crate) fn cv_wait<'a, T>(
            cv: &Condvar,
            mut guard: MutexGuard<'a, T>,
        ) -> MutexGuard<'a, T> {
            cv.wait(&mut guard);
            guard
        }
    } else {
        pub(crate) use std::sync::{Condvar, Mutex, MutexGuard};
        use std::sync::PoisonError;

        // a panic in a user callback must not wedge the loop's own locks
        pub(crate) fn mtx_lock<T>(mtx: &Mutex<T>) -> MutexGuard<'_, T> {
            mtx.lock().unwrap_or_else(PoisonError::into_inner)
        }

        pub(crate) fn cv_wait<'a, T>(
            cv: &Condvar,
            guard: MutexGuard<'a, T>,
        ) -> MutexGuard<'a, T> {
            cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
        }
    }
}
