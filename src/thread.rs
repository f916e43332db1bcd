// MIT/Apache2 License

//! Clock, thread and semaphore helpers for code that feeds the event loop
//! from other threads.

use crate::sync::{cv_wait, mtx_lock, Condvar, Mutex};
use std::{
    thread::{self, JoinHandle},
    time::Instant,
};

/// The current point on the monotonic clock.
pub fn now() -> Instant {
    Instant::now()
}

/// Sleep until `deadline`. Returns at once if it has already passed.
pub fn sleep_until(deadline: Instant) {
    // `sleep` may wake early on some platforms
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(deadline - now);
    }
}

/// Spawn a thread running `f`.
///
/// Returns `None` if the operating system refused to create it.
pub fn spawn<F, T>(f: F) -> Option<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match thread::Builder::new().spawn(f) {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!("unable to spawn thread: {}", err);
            None
        }
    }
}

/// Wait for a thread to finish and take its result.
///
/// If the thread panicked, the panic is resumed on the calling thread.
pub fn join<T>(handle: JoinHandle<T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// A counting semaphore with an upper bound.
#[derive(Debug)]
pub struct Semaphore {
    count: Mutex<usize>,
    available: Condvar,
    max: usize,
}

impl Semaphore {
    /// Create a semaphore holding `initial` permits, never more than `max`.
    ///
    /// # Panics
    ///
    /// Panics if `initial` is greater than `max`.
    pub fn new(max: usize, initial: usize) -> Self {
        assert!(
            initial <= max,
            "semaphore created with {} permits but a limit of {}",
            initial,
            max
        );

        Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
            max,
        }
    }

    /// Take a permit, blocking until one is available.
    pub fn acquire(&self) {
        let mut count = mtx_lock(&self.count);
        while *count == 0 {
            count = cv_wait(&self.available, count);
        }
        *count -= 1;
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut count = mtx_lock(&self.count);
        if *count == 0 {
            return false;
        }

        *count -= 1;
        true
    }

    /// Return a permit. Returns `false`, and changes nothing, if the
    /// semaphore is already full.
    pub fn release(&self) -> bool {
        let mut count = mtx_lock(&self.count);
        if *count == self.max {
            return false;
        }

        *count += 1;
        drop(count);
        self.available.notify_one();
        true
    }

    /// Permits available right now.
    pub fn available(&self) -> usize {
        *mtx_lock(&self.count)
    }
}
