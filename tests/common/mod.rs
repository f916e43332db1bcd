// MIT/Apache2 License

#![allow(dead_code)]

use breadloop::{Application, HeadlessBackend, HeadlessController, RunResult};
use std::sync::{Mutex, MutexGuard, PoisonError};

// only one loop may run per process
static RUN_LOCK: Mutex<()> = Mutex::new(());

/// Take the lock every test that runs a loop must hold, and set up logging.
pub fn serial() -> MutexGuard<'static, ()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
    RUN_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `app` on a fresh headless backend.
pub fn run_headless<A: Application>(app: A) -> RunResult {
    let backend = HeadlessBackend::new().unwrap();
    breadloop::run_with(move || Ok(backend), app)
}

/// Run `app` on a headless backend whose controller `app` was built with.
pub fn run_headless_with<A, F>(make_app: F) -> RunResult
where
    A: Application,
    F: FnOnce(HeadlessController) -> A,
{
    let backend = HeadlessBackend::new().unwrap();
    let app = make_app(backend.controller());
    breadloop::run_with(move || Ok(backend), app)
}
