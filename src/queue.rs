// MIT/Apache2 License

//! The exec queue: a pipe that carries fixed-size records from any thread
//! to the thread running the event loop.
//!
//! A record is three machine words. Every record goes into the pipe with a
//! single `write(2)` of fewer than `PIPE_BUF` bytes, which POSIX guarantees
//! is atomic, so records from concurrent producers can never interleave.
//! The pipe itself is first-in first-out, which gives the ordering
//! guarantee across producers for free.

use crate::{sys, token::WaitToken, ExecError, Runtime};
use core::{
    mem,
    ptr::{self, null, null_mut},
    slice,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::{
    io,
    os::unix::io::{AsRawFd, OwnedFd},
};

/// A deferred function, boxed twice so that it fits behind a thin pointer.
pub(crate) type Job = Box<dyn FnOnce(&Runtime) + Send + 'static>;

const WAKE: usize = 0;
const SIGNAL: usize = 1;
const CALL: usize = 2;

/// The unit written to the pipe.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct Record {
    kind: usize,
    job: *mut Job,
    token: *const WaitToken,
}

const RECORD_SIZE: usize = mem::size_of::<Record>();

// POSIX requires PIPE_BUF to be at least 512
const _: () = assert!(RECORD_SIZE <= 512);

// records are read in batches of this many
const BATCH: usize = 64;

/// What a record asks the loop to do once it has been read back.
pub(crate) enum Request {
    /// Nothing; the record only woke the loop up.
    Wake,
    /// Signals were counted; collect them with `take_signals`.
    Signal,
    /// Run a job, then finish its wait-token if it has one.
    Call(Call),
}

/// A dequeued job. Whoever holds it must either run it or cancel it;
/// dropping it cancels.
pub(crate) struct Call {
    job: *mut Job,
    token: *const WaitToken,
}

impl Record {
    fn wake() -> Self {
        Record {
            kind: WAKE,
            job: null_mut(),
            token: null(),
        }
    }

    fn signal() -> Self {
        Record {
            kind: SIGNAL,
            job: null_mut(),
            token: null(),
        }
    }

    fn call(job: Job, token: *const WaitToken) -> Self {
        Record {
            kind: CALL,
            job: Box::into_raw(Box::new(job)),
            token,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self as *const Record as *const u8, RECORD_SIZE) }
    }

    /// Take back ownership of a record that was never sent.
    fn reclaim(self) {
        if self.kind == CALL {
            drop(unsafe { Box::from_raw(self.job) });
        }
    }

    /// # Safety
    ///
    /// The record must have been read back from the pipe exactly once.
    unsafe fn into_request(self) -> Request {
        match self.kind {
            WAKE => Request::Wake,
            SIGNAL => Request::Signal,
            _ => Request::Call(Call {
                job: self.job,
                token: self.token,
            }),
        }
    }
}

impl Call {
    /// Run the job on the owner thread, then mark its caller completed.
    ///
    /// If the job panics the caller is told it was canceled instead.
    pub(crate) fn run(mut self, rt: &Runtime) {
        let job = unsafe { Box::from_raw(mem::replace(&mut self.job, null_mut())) };
        (*job)(rt);

        let token = mem::replace(&mut self.token, null());
        if !token.is_null() {
            unsafe { WaitToken::complete(token) };
        }
    }

    /// Drop the job without running it and tell its caller.
    pub(crate) fn cancel(self) {
        drop(self);
    }
}

impl Drop for Call {
    fn drop(&mut self) {
        // the job goes first: it may borrow from the waiting caller's frame
        if !self.job.is_null() {
            drop(unsafe { Box::from_raw(self.job) });
        }
        if !self.token.is_null() {
            unsafe { WaitToken::cancel(self.token) };
        }
    }
}

/// The shared half of the runtime that every [`Proxy`](crate::Proxy)
/// points to.
pub(crate) struct ExecQueue {
    reader: OwnedFd,
    writer: OwnedFd,
    /// Monotonic false -> true. Also the gate that rejects new work.
    quitting: AtomicBool,
    /// Producers currently between the gate check and their write.
    submitting: AtomicUsize,
    /// Records being written or not yet read. Bounds a drain pass.
    pending: AtomicUsize,
    /// Signals not yet delivered. Only the first one writes a record.
    signals: AtomicUsize,
}

/// Keeps a producer counted in `submitting` for as long as it lives.
struct Submitting<'a>(&'a AtomicUsize);

impl<'a> Submitting<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Submitting(counter)
    }
}

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ExecQueue {
    pub(crate) fn new() -> io::Result<Self> {
        let (reader, writer) = sys::pipe()?;
        Ok(Self {
            reader,
            writer,
            quitting: AtomicBool::new(false),
            submitting: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
            signals: AtomicUsize::new(0),
        })
    }

    pub(crate) fn reader_fd(&self) -> i32 {
        self.reader.as_raw_fd()
    }

    pub(crate) fn quitting(&self) -> bool {
        self.quitting.load(Ordering::Relaxed)
    }

    /// Set the quitting flag. Returns `true` for the call that flipped it.
    pub(crate) fn request_quit(&self, wake: bool) -> bool {
        if self.quitting.swap(true, Ordering::SeqCst) {
            return false;
        }

        tracing::debug!("quit requested");
        if wake {
            // the pipe may be full, in which case the loop is awake anyway
            let _guard = Submitting::enter(&self.submitting);
            self.pending.fetch_add(1, Ordering::AcqRel);
            if self.write_record(&Record::wake()).is_err() {
                self.pending.fetch_sub(1, Ordering::AcqRel);
            }
        }
        true
    }

    /// Ask the loop to invoke `on_signal` once more.
    ///
    /// Never blocks and never loses a signal to a full pipe: a full pipe is
    /// readable, and the count is collected whenever the queue is serviced.
    pub(crate) fn signal(&self) -> Result<(), ExecError> {
        let _guard = Submitting::enter(&self.submitting);
        if self.quitting.load(Ordering::SeqCst) {
            return Err(ExecError::Canceled);
        }

        if self.signals.fetch_add(1, Ordering::AcqRel) != 0 {
            // a wake-up is already on its way
            return Ok(());
        }

        self.pending.fetch_add(1, Ordering::AcqRel);
        match self.write_record(&Record::signal()) {
            Ok(()) => tracing::trace!("queued signal record"),
            Err(err) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                if err.kind() == io::ErrorKind::WouldBlock {
                    tracing::trace!("exec queue full, signal counted");
                } else {
                    tracing::warn!("unable to wake the loop for a signal: {}", err);
                }
            }
        }
        Ok(())
    }

    /// Take every signal counted so far.
    pub(crate) fn take_signals(&self) -> usize {
        self.signals.swap(0, Ordering::AcqRel)
    }

    /// Queue a job that nobody waits for.
    pub(crate) fn submit_async(&self, job: Job, on_owner: bool) -> Result<(), ExecError> {
        self.submit(Record::call(job, null()), on_owner)
    }

    /// Queue a job and block until the loop has run or canceled it.
    ///
    /// Never call this on the owner thread; it would wait for itself.
    pub(crate) fn submit_sync<'a>(
        &self,
        job: Box<dyn FnOnce(&Runtime) + Send + 'a>,
    ) -> Result<(), ExecError> {
        // this frame does not return until the job has been consumed, so
        // the job may borrow from the caller
        let job: Job = unsafe { mem::transmute(job) };
        let token = WaitToken::new();

        self.submit(Record::call(job, &token), false)?;
        token.wait()
    }

    fn submit(&self, record: Record, on_owner: bool) -> Result<(), ExecError> {
        let _guard = Submitting::enter(&self.submitting);

        loop {
            if self.quitting.load(Ordering::SeqCst) {
                record.reclaim();
                return Err(ExecError::Canceled);
            }

            // counted before the write so the reader never sees more
            // records than `pending`
            self.pending.fetch_add(1, Ordering::AcqRel);
            let written = self.write_record(&record);
            if written.is_err() {
                self.pending.fetch_sub(1, Ordering::AcqRel);
            }

            match written {
                Ok(()) => {
                    tracing::trace!(kind = record.kind, "queued exec record");
                    return Ok(());
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock && !on_owner => {
                    // the loop will drain eventually, including during
                    // shutdown, so waiting here cannot deadlock
                    if sys::wait_writable(self.writer.as_raw_fd()).is_err() {
                        record.reclaim();
                        return Err(ExecError::Failed);
                    }
                }
                Err(err) => {
                    tracing::warn!("exec queue rejected a record: {}", err);
                    record.reclaim();
                    return Err(ExecError::Failed);
                }
            }
        }
    }

    fn write_record(&self, record: &Record) -> io::Result<()> {
        let n = sys::write(self.writer.as_raw_fd(), record.as_bytes())?;
        if n == RECORD_SIZE {
            Ok(())
        } else {
            // cannot happen for writes below PIPE_BUF
            Err(io::Error::new(io::ErrorKind::WriteZero, "torn exec record"))
        }
    }

    /// Read back every record that was pending when the pass began and hand
    /// each to `f` in order. Returns the number of records read.
    pub(crate) fn drain(&self, f: impl FnMut(Request)) -> io::Result<usize> {
        let budget = self.pending.load(Ordering::Acquire);
        self.read_records(Some(budget), f)
    }

    fn read_records(&self, budget: Option<usize>, mut f: impl FnMut(Request)) -> io::Result<usize> {
        let mut buf: [mem::MaybeUninit<Record>; BATCH] =
            unsafe { mem::MaybeUninit::uninit().assume_init() };
        let mut total = 0;

        loop {
            let want = match budget {
                Some(budget) => (budget - total).min(BATCH),
                None => BATCH,
            };
            if want == 0 {
                return Ok(total);
            }

            let bytes = unsafe {
                slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut u8, want * RECORD_SIZE)
            };
            let n = match sys::read(self.reader.as_raw_fd(), bytes) {
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(total),
                Err(err) => return Err(err),
            };
            if n == 0 {
                return Ok(total);
            }
            if n % RECORD_SIZE != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "exec queue holds a partial record",
                ));
            }

            let count = n / RECORD_SIZE;
            self.pending.fetch_sub(count, Ordering::AcqRel);
            total += count;

            // decode the whole batch before running any of it, so a
            // panicking job cannot leak the records behind it
            let requests: Vec<Request> = buf[..count]
                .iter()
                .map(|slot| unsafe { ptr::read(slot.as_ptr()).into_request() })
                .collect();
            requests.into_iter().for_each(&mut f);

            if count < want {
                return Ok(total);
            }
        }
    }

    /// Final drain at shutdown. The quitting flag must already be set.
    ///
    /// Cancels every record still in the pipe, and keeps doing so until no
    /// producer is between its gate check and its write. After this returns
    /// no further record can be accepted.
    pub(crate) fn shutdown(&self) {
        debug_assert!(self.quitting.load(Ordering::SeqCst));

        let mut canceled = 0usize;
        let mut cancel = |request: Request| {
            if let Request::Call(call) = request {
                canceled += 1;
                call.cancel();
            }
        };

        loop {
            let idle = self.submitting.load(Ordering::SeqCst) == 0;
            if let Err(err) = self.read_records(None, &mut cancel) {
                tracing::warn!("failed to drain exec queue: {}", err);
                break;
            }
            if idle {
                break;
            }
            std::thread::yield_now();
        }

        if canceled > 0 {
            tracing::debug!(canceled, "canceled pending exec records");
        }
        let dropped = self.take_signals();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped undelivered signals");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecQueue, Record, Request, CALL};
    use crate::ExecError;
    use std::{sync::Arc, thread};

    // records carrying plain integers; never turned into `Call`s that get
    // run or dropped
    fn tagged(producer: usize, seq: usize) -> Record {
        Record {
            kind: CALL,
            job: (producer << 32 | seq) as *mut _,
            token: !(producer << 32 | seq) as *const _,
        }
    }

    fn untag(request: Request) -> (usize, usize) {
        match request {
            Request::Call(call) => {
                let job = call.job as usize;
                let token = call.token as usize;
                core::mem::forget(call);
                assert_eq!(job, !token, "record was torn");
                (job >> 32, job & 0xFFFF_FFFF)
            }
            _ => panic!("unexpected record kind"),
        }
    }

    #[test]
    fn concurrent_producers_never_tear_or_reorder() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 2000;

        let queue = Arc::new(ExecQueue::new().unwrap());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut next = [0usize; PRODUCERS];
                let mut seen = 0;
                while seen < PRODUCERS * PER_PRODUCER {
                    seen += queue
                        .drain(|request| {
                            let (producer, seq) = untag(request);
                            assert_eq!(next[producer], seq, "per-producer order broken");
                            next[producer] += 1;
                        })
                        .unwrap();
                    thread::yield_now();
                }
                next
            })
        };

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        queue.submit(tagged(producer, seq), false).unwrap();
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        let next = consumer.join().unwrap();
        assert!(next.iter().all(|&n| n == PER_PRODUCER));
    }

    #[test]
    fn sequential_records_drain_in_order() {
        let queue = ExecQueue::new().unwrap();
        for seq in 0..10 {
            queue.submit(tagged(0, seq), true).unwrap();
        }
        for _ in 0..3 {
            queue.signal().unwrap();
        }

        let mut order = Vec::new();
        let mut signal_records = 0;
        let read = queue
            .drain(|request| match request {
                Request::Signal => signal_records += 1,
                other => order.push(untag(other).1),
            })
            .unwrap();

        // three signals share one record
        assert_eq!(read, 11);
        assert_eq!(signal_records, 1);
        assert_eq!(queue.take_signals(), 3);
        assert_eq!(queue.take_signals(), 0);
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn quitting_rejects_new_records() {
        let queue = ExecQueue::new().unwrap();
        assert!(queue.request_quit(false));
        assert!(!queue.request_quit(false));
        assert!(queue.quitting());

        assert_eq!(queue.signal(), Err(ExecError::Canceled));
        assert_eq!(queue.take_signals(), 0);
        assert_eq!(
            queue.submit_async(Box::new(|_| unreachable!()), false),
            Err(ExecError::Canceled)
        );
        assert_eq!(
            queue.submit_sync(Box::new(|_| unreachable!())),
            Err(ExecError::Canceled)
        );
    }

    #[test]
    fn shutdown_cancels_blocked_callers() {
        let queue = Arc::new(ExecQueue::new().unwrap());
        let caller = {
            let queue = queue.clone();
            thread::spawn(move || queue.submit_sync(Box::new(|_| unreachable!())))
        };

        // wait for the record to land before shutting down
        while queue.pending.load(core::sync::atomic::Ordering::Acquire) == 0 {
            thread::yield_now();
        }
        queue.request_quit(false);
        queue.shutdown();

        assert_eq!(caller.join().unwrap(), Err(ExecError::Canceled));
    }

    fn fill(queue: &ExecQueue) -> usize {
        let mut accepted = 0usize;
        loop {
            match queue.submit(tagged(0, accepted), true) {
                Ok(()) => accepted += 1,
                Err(err) => {
                    assert_eq!(err, ExecError::Failed);
                    return accepted;
                }
            }
        }
    }

    #[test]
    fn owner_gets_failed_when_pipe_is_full() {
        let queue = ExecQueue::new().unwrap();
        let accepted = fill(&queue);
        assert!(accepted > 0);

        let mut next = 0;
        let read = queue
            .drain(|request| {
                assert_eq!(untag(request).1, next);
                next += 1;
            })
            .unwrap();
        assert_eq!(read, accepted);
    }

    #[test]
    fn signals_beyond_pipe_capacity_are_counted() {
        const SIGNALS: usize = 5000;

        let queue = ExecQueue::new().unwrap();
        let accepted = fill(&queue);
        assert!(accepted < SIGNALS);

        // no room for even one record, and none is needed
        for _ in 0..SIGNALS {
            assert_eq!(queue.signal(), Ok(()));
        }
        let read = queue
            .drain(|request| {
                untag(request);
            })
            .unwrap();
        assert_eq!(read, accepted);
        assert_eq!(queue.take_signals(), SIGNALS);

        // with the count back at zero the next signal writes a record again
        queue.signal().unwrap();
        let mut signal_records = 0;
        queue
            .drain(|request| match request {
                Request::Signal => signal_records += 1,
                other => {
                    untag(other);
                }
            })
            .unwrap();
        assert_eq!(signal_records, 1);
        assert_eq!(queue.take_signals(), 1);
    }
}
