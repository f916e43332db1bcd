// MIT/Apache2 License

mod common;

use breadloop::{Application, ExecError, Proxy, Runtime};
use common::{run_headless, serial};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

const WORKERS: usize = 4;
const CALLS_PER_WORKER: usize = 1000;

struct Counting {
    counter: Arc<AtomicUsize>,
    workers: Arc<Mutex<Vec<JoinHandle<(usize, usize)>>>>,
}

impl Application for Counting {
    fn on_start(&mut self, rt: &Runtime) {
        for _ in 0..WORKERS {
            let proxy = rt.proxy();
            let counter = self.counter.clone();

            let worker = thread::spawn(move || {
                assert!(!proxy.is_owner_thread());

                let mut failed = 0;
                let mut canceled = 0;
                for _ in 0..CALLS_PER_WORKER {
                    let mut observed = 0;
                    let counter = &counter;
                    let result = proxy.execute(|rt| {
                        assert!(rt.is_owner_thread());
                        observed = counter.fetch_add(1, Ordering::Relaxed) + 1;
                        if observed == WORKERS * CALLS_PER_WORKER {
                            rt.quit();
                        }
                    });

                    match result {
                        Ok(()) => assert_ne!(observed, 0, "side effect not visible"),
                        Err(ExecError::Failed) => failed += 1,
                        Err(ExecError::Canceled) => canceled += 1,
                    }
                }

                (failed, canceled)
            });
            self.workers.lock().unwrap().push(worker);
        }
    }
}

#[test]
fn four_workers_execute_a_thousand_times_each() {
    let _guard = serial();
    let counter = Arc::new(AtomicUsize::new(0));
    let workers = Arc::new(Mutex::new(Vec::new()));

    let result = run_headless(Counting {
        counter: counter.clone(),
        workers: workers.clone(),
    });
    assert!(result.is_quit(), "{:?}", result);

    let workers: Vec<_> = workers.lock().unwrap().drain(..).collect();
    assert_eq!(workers.len(), WORKERS);
    for worker in workers {
        assert_eq!(worker.join().unwrap(), (0, 0));
    }
    assert_eq!(counter.load(Ordering::Relaxed), WORKERS * CALLS_PER_WORKER);
}

struct Inline {
    depth: Arc<AtomicUsize>,
    max_depth: Arc<AtomicUsize>,
}

impl Application for Inline {
    fn on_start(&mut self, rt: &Runtime) {
        let proxy = rt.proxy();
        assert!(proxy.is_owner_thread());
        assert!(rt.is_owner_thread());

        // an inline call nests inside this one; a queued call would not
        self.depth.fetch_add(1, Ordering::SeqCst);
        let ran = AtomicBool::new(false);
        let result = proxy.execute(|_| {
            let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_depth.fetch_max(depth, Ordering::SeqCst);
            ran.store(true, Ordering::SeqCst);
            self.depth.fetch_sub(1, Ordering::SeqCst);
        });
        assert_eq!(result, Ok(()));
        assert!(ran.load(Ordering::SeqCst));

        assert_eq!(rt.execute(|rt| rt.quit()), Ok(()));
        assert!(rt.quitting());
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

#[test]
fn execute_runs_inline_on_the_owner_thread() {
    let _guard = serial();
    let depth = Arc::new(AtomicUsize::new(0));
    let max_depth = Arc::new(AtomicUsize::new(0));

    let result = run_headless(Inline {
        depth: depth.clone(),
        max_depth: max_depth.clone(),
    });
    assert!(result.is_quit());
    assert_eq!(max_depth.load(Ordering::SeqCst), 2);
}

#[derive(Default)]
struct Deferred {
    order: Arc<Mutex<Vec<usize>>>,
}

impl Application for Deferred {
    fn on_start(&mut self, rt: &Runtime) {
        for i in 0..3 {
            let order = self.order.clone();
            rt.proxy()
                .execute_async(move |_| order.lock().unwrap().push(i))
                .unwrap();
        }
        let order = self.order.clone();
        rt.execute_async(move |rt| {
            order.lock().unwrap().push(3);
            rt.quit();
        })
        .unwrap();

        // nothing has run yet
        assert!(self.order.lock().unwrap().is_empty());
    }
}

#[test]
fn execute_async_never_runs_inline_and_keeps_order() {
    let _guard = serial();
    let app = Deferred::default();
    let order = app.order.clone();

    assert!(run_headless(app).is_quit());
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}

struct Quitter {
    stops: Arc<AtomicUsize>,
}

impl Application for Quitter {
    fn on_start(&mut self, rt: &Runtime) {
        let threads: Vec<_> = (0..3)
            .map(|_| {
                let proxy = rt.proxy();
                thread::spawn(move || {
                    for _ in 0..5 {
                        proxy.quit();
                    }
                    assert!(proxy.quitting());
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        rt.quit();
        rt.proxy().quit();
    }

    fn on_stop(&mut self, rt: &Runtime) {
        assert!(rt.quitting());
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn quit_is_idempotent() {
    let _guard = serial();
    let stops = Arc::new(AtomicUsize::new(0));

    let result = run_headless(Quitter {
        stops: stops.clone(),
    });
    assert!(result.is_quit());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

struct LateSubmitter {
    proxy: Arc<Mutex<Option<Proxy>>>,
    signals: usize,
}

impl Application for LateSubmitter {
    fn on_start(&mut self, rt: &Runtime) {
        rt.quit();
        *self.proxy.lock().unwrap() = Some(rt.proxy());

        assert_eq!(
            rt.execute_async(|_| panic!("ran after quit")),
            Err(ExecError::Canceled)
        );
        rt.signal();

        let proxy = rt.proxy();
        let from_worker = thread::spawn(move || {
            (
                proxy.execute(|_| panic!("ran after quit")),
                proxy.execute_async(|_| panic!("ran after quit")),
            )
        })
        .join()
        .unwrap();
        assert_eq!(
            from_worker,
            (Err(ExecError::Canceled), Err(ExecError::Canceled))
        );
    }

    fn on_signal(&mut self, _rt: &Runtime) {
        self.signals += 1;
    }

    fn on_stop(&mut self, _rt: &Runtime) {
        assert_eq!(self.signals, 0);
    }
}

#[test]
fn submissions_after_quit_are_canceled() {
    let _guard = serial();
    let proxy = Arc::new(Mutex::new(None));

    let result = run_headless(LateSubmitter {
        proxy: proxy.clone(),
        signals: 0,
    });
    assert!(result.is_quit());

    // the proxy outlives its run
    let proxy = proxy.lock().unwrap().take().unwrap();
    assert!(proxy.quitting());
    assert!(!proxy.is_owner_thread());
    assert_eq!(
        proxy.execute(|_| panic!("ran after the run ended")),
        Err(ExecError::Canceled)
    );
}

struct Abandoner {
    ran: Arc<AtomicBool>,
    worker: Arc<Mutex<Option<JoinHandle<Result<(), ExecError>>>>>,
}

impl Application for Abandoner {
    fn on_start(&mut self, rt: &Runtime) {
        let proxy = rt.proxy();
        let ran = self.ran.clone();

        let worker = thread::spawn(move || {
            proxy.execute_async(|rt| rt.quit()).unwrap();
            // queued behind the quit, so it can only be canceled
            proxy.execute(|_| ran.store(true, Ordering::SeqCst))
        });
        *self.worker.lock().unwrap() = Some(worker);
    }
}

#[test]
fn blocked_callers_are_released_at_shutdown() {
    let _guard = serial();
    let ran = Arc::new(AtomicBool::new(false));
    let worker = Arc::new(Mutex::new(None));

    let result = run_headless(Abandoner {
        ran: ran.clone(),
        worker: worker.clone(),
    });
    assert!(result.is_quit());

    let worker = worker.lock().unwrap().take().unwrap();
    assert_eq!(worker.join().unwrap(), Err(ExecError::Canceled));
    assert!(!ran.load(Ordering::SeqCst));
}

struct Signaled {
    signals: Arc<AtomicUsize>,
}

impl Application for Signaled {
    fn on_start(&mut self, rt: &Runtime) {
        rt.signal();
        rt.signal();

        let proxy = rt.proxy();
        thread::spawn(move || {
            for _ in 0..3 {
                proxy.signal();
            }
            // after the signals, in queue order
            proxy.execute_async(|rt| rt.quit()).unwrap();
        })
        .join()
        .unwrap();
    }

    fn on_signal(&mut self, rt: &Runtime) {
        assert!(rt.is_owner_thread());
        self.signals.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn every_signal_invokes_on_signal_once() {
    let _guard = serial();
    let signals = Arc::new(AtomicUsize::new(0));

    let result = run_headless(Signaled {
        signals: signals.clone(),
    });
    assert!(result.is_quit());
    assert_eq!(signals.load(Ordering::SeqCst), 5);
}

const FLOOD: usize = 5000;

struct Flood {
    accepted: usize,
    ran: Arc<AtomicUsize>,
    signals: Arc<AtomicUsize>,
}

impl Application for Flood {
    fn on_start(&mut self, rt: &Runtime) {
        // fill the exec pipe, then signal far more often than it could hold
        loop {
            let ran = self.ran.clone();
            match rt.execute_async(move |_| {
                ran.fetch_add(1, Ordering::SeqCst);
            }) {
                Ok(()) => self.accepted += 1,
                Err(err) => {
                    assert_eq!(err, ExecError::Failed);
                    break;
                }
            }
        }
        assert!(self.accepted < FLOOD);

        for _ in 0..FLOOD {
            rt.signal();
        }
    }

    fn on_signal(&mut self, rt: &Runtime) {
        if self.signals.fetch_add(1, Ordering::SeqCst) + 1 == FLOOD {
            rt.quit();
        }
    }

    fn on_stop(&mut self, _rt: &Runtime) {
        assert_eq!(self.ran.load(Ordering::SeqCst), self.accepted);
    }
}

#[test]
fn signals_survive_a_full_exec_pipe() {
    let _guard = serial();
    let ran = Arc::new(AtomicUsize::new(0));
    let signals = Arc::new(AtomicUsize::new(0));

    let result = run_headless(Flood {
        accepted: 0,
        ran: ran.clone(),
        signals: signals.clone(),
    });
    assert!(result.is_quit());
    assert_eq!(signals.load(Ordering::SeqCst), FLOOD);
    assert!(ran.load(Ordering::SeqCst) > 0);
}

struct PanickingJob {
    ran: Arc<AtomicBool>,
    workers: Arc<Mutex<Vec<JoinHandle<Result<(), ExecError>>>>>,
}

impl Application for PanickingJob {
    fn on_start(&mut self, rt: &Runtime) {
        let proxy = rt.proxy();
        let ran = self.ran.clone();
        let behind = thread::spawn(move || {
            let _ = proxy.execute_async(|_| panic!("job failed"));
            // queued behind the panicking job, so it can only be canceled
            proxy.execute(|_| ran.store(true, Ordering::SeqCst))
        });

        let proxy = rt.proxy();
        let itself = thread::spawn(move || proxy.execute(|_| panic!("job failed")));

        let mut workers = self.workers.lock().unwrap();
        workers.push(behind);
        workers.push(itself);
    }
}

#[test]
fn a_panicking_job_releases_its_waiters() {
    let _guard = serial();
    let ran = Arc::new(AtomicBool::new(false));
    let workers = Arc::new(Mutex::new(Vec::new()));

    let app = PanickingJob {
        ran: ran.clone(),
        workers: workers.clone(),
    };
    let unwound = panic::catch_unwind(AssertUnwindSafe(|| run_headless(app)));
    assert!(unwound.is_err(), "the job's panic did not leave `run`");

    let workers: Vec<_> = workers.lock().unwrap().drain(..).collect();
    assert_eq!(workers.len(), 2);
    for worker in workers {
        assert_eq!(worker.join().unwrap(), Err(ExecError::Canceled));
    }
    assert!(!ran.load(Ordering::SeqCst));

    // the process can run a loop afterwards
    assert!(run_headless(QuitAtOnce).is_quit());
}

struct QuitAtOnce;

impl Application for QuitAtOnce {
    fn on_start(&mut self, rt: &Runtime) {
        rt.quit();
    }
}

struct CrossThreadWindows {
    opened: Arc<AtomicUsize>,
}

impl Application for CrossThreadWindows {
    fn on_start(&mut self, rt: &Runtime) {
        let proxy = rt.proxy();
        let opened = self.opened.clone();

        thread::spawn(move || {
            let mut handle = None;
            proxy
                .execute(|rt| {
                    let window = rt.open_window().unwrap();
                    rt.show_window(window).unwrap();
                    handle = Some(window);
                })
                .unwrap();
            assert!(handle.is_some());

            proxy
                .execute(|rt| {
                    opened.store(rt.window_count(), Ordering::SeqCst);
                    rt.quit();
                })
                .unwrap();
        });
    }
}

#[test]
fn workers_reach_windows_through_execute() {
    let _guard = serial();
    let opened = Arc::new(AtomicUsize::new(0));

    let result = run_headless(CrossThreadWindows {
        opened: opened.clone(),
    });
    assert!(result.is_quit());
    assert_eq!(opened.load(Ordering::SeqCst), 1);
}
