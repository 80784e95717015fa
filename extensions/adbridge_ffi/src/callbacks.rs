//! C callback adapters
//!
//! Every callback comes with an opaque `context` pointer that is handed back
//! untouched. Callbacks may fire on any thread, so the host must make the
//! context usable from all of them.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::ptr;

use adbridge_core::{BridgeError, EventSink, RewardPayload, SinkError};
use adbridge_runtime::{AutoRewardListener, LoadListener};

/// Receives one serialized event record
pub type EventSinkFn = extern "C" fn(
    context: *mut c_void,
    target: *const c_char,
    method: *const c_char,
    message: *const c_char,
);

/// Receives a load or initialization outcome. `code` and `message` are null
/// on success.
pub type LoadResultFn = extern "C" fn(
    context: *mut c_void,
    success: bool,
    code: *const c_char,
    message: *const c_char,
);

/// Receives auto reward callbacks
///
/// `event` is one of `show`, `close`, `click`, `reward` or `error`.
/// `payload_json` is the reward record for `reward`, `{"code","message"}`
/// for `error` and null otherwise.
pub type AutoRewardFn =
    extern "C" fn(context: *mut c_void, event: *const c_char, payload_json: *const c_char);

#[derive(Clone, Copy)]
pub(crate) struct Context(*mut c_void);

// SAFETY: the host guarantees the pointer is valid on every thread a callback
// may fire on, as documented on each registration function.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Context {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Context(ptr)
    }
}

fn c_string(value: &str) -> Option<CString> {
    match CString::new(value) {
        Ok(s) => Some(s),
        Err(_) => {
            tracing::warn!("Dropping string with interior NUL before crossing the C ABI");
            None
        }
    }
}

fn as_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(ptr::null(), |s| s.as_ptr())
}

// ============================================================================
// Event sink
// ============================================================================

/// [`EventSink`] forwarding to a C function
pub struct FfiEventSink {
    callback: EventSinkFn,
    context: Context,
}

impl FfiEventSink {
    pub fn new(callback: EventSinkFn, context: *mut c_void) -> Self {
        Self {
            callback,
            context: Context::new(context),
        }
    }
}

impl EventSink for FfiEventSink {
    fn deliver(&self, target: &str, method: &str, message: &str) -> Result<(), SinkError> {
        let (Some(target), Some(method), Some(message)) =
            (c_string(target), c_string(method), c_string(message))
        else {
            return Err(SinkError::Rejected("interior NUL in event".to_string()));
        };
        (self.callback)(self.context.0, target.as_ptr(), method.as_ptr(), message.as_ptr());
        Ok(())
    }
}

// ============================================================================
// Load listener
// ============================================================================

pub(crate) struct FfiLoadListener {
    callback: LoadResultFn,
    context: Context,
}

impl FfiLoadListener {
    pub(crate) fn new(callback: LoadResultFn, context: *mut c_void) -> Self {
        Self {
            callback,
            context: Context::new(context),
        }
    }
}

impl LoadListener for FfiLoadListener {
    fn on_success(&self) {
        (self.callback)(self.context.0, true, ptr::null(), ptr::null());
    }

    fn on_error(&self, error: &BridgeError) {
        let code = c_string(&error.code());
        let message = c_string(&error.message());
        (self.callback)(self.context.0, false, as_ptr(&code), as_ptr(&message));
    }
}

// ============================================================================
// Auto reward listener
// ============================================================================

pub(crate) struct FfiAutoRewardListener {
    callback: AutoRewardFn,
    context: Context,
}

impl FfiAutoRewardListener {
    pub(crate) fn new(callback: AutoRewardFn, context: *mut c_void) -> Self {
        Self {
            callback,
            context: Context::new(context),
        }
    }

    fn fire(&self, event: &str, payload: Option<String>) {
        let event = c_string(event);
        let payload = payload.as_deref().and_then(c_string);
        (self.callback)(self.context.0, as_ptr(&event), as_ptr(&payload));
    }
}

impl AutoRewardListener for FfiAutoRewardListener {
    fn on_error(&self, error: &BridgeError) {
        let payload = serde_json::json!({
            "code": error.code(),
            "message": error.message(),
        });
        self.fire("error", Some(payload.to_string()));
    }

    fn on_ad_show(&self) {
        self.fire("show", None);
    }

    fn on_ad_close(&self) {
        self.fire("close", None);
    }

    fn on_reward_verify(&self, reward: &RewardPayload) {
        match serde_json::to_string(reward) {
            Ok(payload) => self.fire("reward", Some(payload)),
            Err(e) => tracing::warn!("Failed to serialize reward payload: {}", e),
        }
    }

    fn on_ad_click(&self) {
        self.fire("click", None);
    }
}
