//! Execution confinement
//!
//! [`ConfinedThread`] is a dedicated thread implementing [`UiThread`]: a FIFO
//! queue for posted tasks plus a deadline heap for delayed ones. Hosts that
//! already own a UI thread (an Android looper, a main dispatch queue) provide
//! their own [`UiThread`] instead.
//!
//! The helpers below build the two calling conventions on top of any
//! [`UiThread`]:
//!
//! - [`call_blocking`] posts work and waits a bounded time for its result
//! - [`CompletionGuard`] lets exactly one of several racing paths finish an
//!   asynchronous operation

use std::any::Any;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use adbridge_platform::{PlatformError, Task, UiThread};
use parking_lot::Mutex;

// ============================================================================
// ConfinedThread
// ============================================================================

enum Message {
    Run(Task),
    RunAt(Instant, Task),
    Stop,
}

struct Delayed {
    at: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    // Reversed so the max-heap pops the earliest deadline first
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Dedicated UI thread
///
/// Tasks run one at a time in posting order. A panicking task is logged and
/// the thread keeps going. Dropping the handle stops the thread after the
/// task currently running; queued work is discarded.
pub struct ConfinedThread {
    sender: Sender<Message>,
    thread_id: ThreadId,
    stopped: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConfinedThread {
    /// Spawn the thread
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stopped);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                run_loop(receiver);
                stop_flag.store(true, Ordering::Release);
            })?;

        tracing::debug!("Spawned UI thread {:?}", name);

        Ok(Self {
            sender,
            thread_id: handle.thread().id(),
            stopped,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Wait until everything posted before this call has run
    pub fn flush(&self, timeout: Duration) -> bool {
        if self.is_current() {
            return true;
        }
        call_blocking(self, timeout, || ()).is_some()
    }

    /// Stop the thread and join it. Safe to call more than once.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Message::Stop);
        if self.is_current() {
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::error!("UI thread terminated abnormally");
            }
        }
    }

    fn send(&self, message: Message) -> adbridge_platform::Result<()> {
        self.sender
            .send(message)
            .map_err(|_| PlatformError::ThreadGone("UI thread has stopped".to_string()))
    }
}

impl UiThread for ConfinedThread {
    fn post(&self, task: Task) -> adbridge_platform::Result<()> {
        self.send(Message::Run(task))
    }

    fn post_delayed(&self, delay: Duration, task: Task) -> adbridge_platform::Result<()> {
        self.send(Message::RunAt(Instant::now() + delay, task))
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for ConfinedThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(receiver: Receiver<Message>) {
    let mut delayed: BinaryHeap<Delayed> = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let now = Instant::now();
        while delayed.peek().is_some_and(|next| next.at <= now) {
            if let Some(due) = delayed.pop() {
                run_task(due.task);
            }
        }

        let message = match delayed.peek() {
            Some(next) => match receiver.recv_timeout(next.at.saturating_duration_since(Instant::now())) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match receiver.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        match message {
            Message::Run(task) => run_task(task),
            Message::RunAt(at, task) => {
                seq += 1;
                delayed.push(Delayed { at, seq, task });
            }
            Message::Stop => break,
        }
    }

    if !delayed.is_empty() {
        tracing::debug!("UI thread stopping with {} delayed tasks pending", delayed.len());
    }
}

fn run_task(task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        tracing::error!("UI task panicked: {}", panic_message(payload.as_ref()));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

// ============================================================================
// Calling conventions
// ============================================================================

/// Sending half of a one-shot signal
pub struct Signal<T> {
    sender: SyncSender<T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> Signal<T> {
    /// Deliver the value. Only the first delivery is kept.
    pub fn send(&self, value: T) {
        let _ = self.sender.try_send(value);
    }
}

/// Receiving half of a one-shot signal
pub struct Wait<T> {
    receiver: Receiver<T>,
}

impl<T> Wait<T> {
    /// `None` on timeout or when every [`Signal`] was dropped unsent
    pub fn wait(self, timeout: Duration) -> Option<T> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

/// One-shot signal with a bounded wait
pub fn oneshot<T>() -> (Signal<T>, Wait<T>) {
    let (sender, receiver) = mpsc::sync_channel(1);
    (Signal { sender }, Wait { receiver })
}

/// Run `f` on the UI thread and wait up to `timeout` for its result
///
/// Runs inline when already on the UI thread. On timeout the task stays
/// queued and still runs; its result is discarded.
pub fn call_blocking<U, F, T>(ui: &U, timeout: Duration, f: F) -> Option<T>
where
    U: UiThread + ?Sized,
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    if ui.is_current() {
        return Some(f());
    }

    let (signal, wait) = oneshot();
    let task: Task = Box::new(move || signal.send(f()));
    if let Err(e) = ui.post(task) {
        tracing::warn!("Failed to post blocking call: {}", e);
        return None;
    }

    let result = wait.wait(timeout);
    if result.is_none() {
        tracing::warn!("UI call did not finish within {:?}", timeout);
    }
    result
}

/// First-wins completion flag shared by racing callbacks
#[derive(Clone, Default)]
pub struct CompletionGuard {
    completed: Arc<AtomicBool>,
}

impl CompletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for exactly one caller
    pub fn complete(&self) -> bool {
        self.completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn spawn() -> ConfinedThread {
        ConfinedThread::spawn("adbridge-test-ui").unwrap()
    }

    #[test]
    fn test_tasks_run_in_order_on_the_thread() {
        let ui = spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let thread_id = ui.thread_id();

        for i in 0..5 {
            let seen = Arc::clone(&seen);
            ui.post(Box::new(move || {
                assert_eq!(thread::current().id(), thread_id);
                seen.lock().push(i);
            }))
            .unwrap();
        }

        assert!(ui.flush(Duration::from_secs(1)));
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_delayed_tasks_follow_deadlines() {
        let ui = spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for (label, delay) in [("late", 60u64), ("early", 20u64)] {
            let seen = Arc::clone(&seen);
            ui.post_delayed(
                Duration::from_millis(delay),
                Box::new(move || seen.lock().push(label)),
            )
            .unwrap();
        }
        let now_seen = Arc::clone(&seen);
        ui.post(Box::new(move || now_seen.lock().push("now"))).unwrap();

        thread::sleep(Duration::from_millis(200));
        assert!(ui.flush(Duration::from_secs(1)));
        assert_eq!(*seen.lock(), vec!["now", "early", "late"]);
    }

    #[test]
    fn test_panicking_task_does_not_kill_the_thread() {
        let ui = spawn();
        ui.post(Box::new(|| panic!("boom"))).unwrap();
        assert_eq!(call_blocking(&ui, Duration::from_secs(1), || 7), Some(7));
        assert!(ui.is_running());
    }

    #[test]
    fn test_call_blocking_times_out_but_work_continues() {
        let ui = spawn();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);

        let result = call_blocking(&ui, Duration::from_millis(20), move || {
            thread::sleep(Duration::from_millis(100));
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert_eq!(result, None);
        assert!(ui.flush(Duration::from_secs(1)));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_call_blocking_runs_inline_on_the_thread() {
        let ui = Arc::new(spawn());
        let inner = Arc::clone(&ui);
        let nested = call_blocking(ui.as_ref(), Duration::from_secs(1), move || {
            call_blocking(inner.as_ref(), Duration::from_millis(1), || 42)
        });
        assert_eq!(nested, Some(Some(42)));
    }

    #[test]
    fn test_post_after_shutdown_fails() {
        let ui = spawn();
        ui.shutdown();
        assert!(!ui.is_running());
        assert!(ui.post(Box::new(|| {})).is_err());
    }

    #[test]
    fn test_completion_guard_first_wins() {
        let guard = CompletionGuard::new();
        let other = guard.clone();
        assert!(guard.complete());
        assert!(!other.complete());
        assert!(other.is_complete());
    }
}
