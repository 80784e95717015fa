//! UI thread contract
//!
//! Every mutation of an ad resource or of the host view hierarchy happens on
//! one designated thread. Implementations run posted tasks in FIFO order and
//! delayed tasks once their deadline has passed.

use std::time::Duration;

use crate::error::Result;

/// Unit of work posted to the UI thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Single designated execution context
pub trait UiThread: Send + Sync {
    /// Queue a task behind everything already posted
    fn post(&self, task: Task) -> Result<()>;

    /// Queue a task to run no earlier than `delay` from now
    fn post_delayed(&self, delay: Duration, task: Task) -> Result<()>;

    /// Whether the calling thread is the UI thread
    fn is_current(&self) -> bool;
}
