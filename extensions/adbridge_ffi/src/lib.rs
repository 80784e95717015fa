//! Adbridge C ABI
//!
//! Exposes the [`MediationBridge`] to scripting hosts that can only pass
//! strings and function pointers.
//!
//! # Architecture
//!
//! ```text
//! Scripting host (C#, Lua, ...)
//!              │  adbridge_load_reward_video_ad("{\"space_id\": 1001}", cb, ctx)
//!              ▼
//! adbridge_ffi  ── JSON → ConfigMap, C callbacks → listeners
//!              │
//!              ▼
//! MediationBridge ── UI thread ── MediationSdk (platform glue)
//!              │
//!              ▼
//! FfiEventSink ── event_fn(ctx, "MediationEventReceiver", "OnNativeEvent", json)
//! ```
//!
//! The platform glue owns the SDK and the host view bindings, builds the
//! bridge (usually with an [`FfiEventSink`]) and registers it once with
//! [`install`]. Every export below is a safe no-op returning its default
//! until then.
//!
//! Strings returned by this library must be released with
//! [`adbridge_free_string`].

mod callbacks;

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, OnceLock};

use adbridge_core::{AdKind, BridgeError, ConfigMap};
use adbridge_platform::InitParams;
use adbridge_runtime::{init_logging, AutoRewardListener, LoadListener, MediationBridge};
use serde::Deserialize;

pub use callbacks::{AutoRewardFn, EventSinkFn, FfiEventSink, LoadResultFn};
use callbacks::{FfiAutoRewardListener, FfiLoadListener};

static BRIDGE: OnceLock<MediationBridge> = OnceLock::new();

/// Register the process-wide bridge. Only the first call wins.
pub fn install(bridge: MediationBridge) -> bool {
    let installed = BRIDGE.set(bridge).is_ok();
    if !installed {
        tracing::warn!("A mediation bridge is already installed, ignoring");
    }
    installed
}

fn bridge() -> Option<&'static MediationBridge> {
    let bridge = BRIDGE.get();
    if bridge.is_none() {
        tracing::warn!("adbridge called before a bridge was installed");
    }
    bridge
}

/// Run an export body, turning a panic into `default`
fn guard<T>(name: &str, default: T, f: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            tracing::error!("{} panicked", name);
            default
        }
    }
}

// ============================================================================
// String helpers
// ============================================================================

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!("Ignoring non UTF-8 string: {}", e);
            None
        }
    }
}

/// Parse a JSON object argument. Null or malformed input reads as absent.
unsafe fn read_map(ptr: *const c_char) -> Option<ConfigMap> {
    let json = read_str(ptr)?;
    match ConfigMap::from_json(json) {
        Ok(map) => Some(map),
        Err(e) => {
            tracing::warn!("Ignoring malformed configuration JSON: {}", e);
            None
        }
    }
}

fn into_raw(value: String) -> *mut c_char {
    CString::new(value).map_or(ptr::null_mut(), CString::into_raw)
}

fn load_listener(callback: Option<LoadResultFn>, context: *mut c_void) -> Option<Arc<dyn LoadListener>> {
    callback.map(|callback| Arc::new(FfiLoadListener::new(callback, context)) as Arc<dyn LoadListener>)
}

/// Initialization arguments as JSON
///
/// ```json
/// {"app_id": "1001", "channel": "store", "sub_channel": "beta", "enable_log": true}
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InitArgs {
    app_id: String,
    channel: Option<String>,
    sub_channel: Option<String>,
    enable_log: bool,
    media_name: Option<String>,
    media_key: Option<String>,
    client_id: Option<String>,
    extra_data_json: Option<String>,
    shake_enabled: bool,
}

impl From<InitArgs> for InitParams {
    fn from(args: InitArgs) -> Self {
        InitParams {
            app_id: args.app_id,
            channel: args.channel,
            sub_channel: args.sub_channel,
            enable_log: args.enable_log,
            media_name: args.media_name,
            media_key: args.media_key,
            client_id: args.client_id,
            extra_data_json: args.extra_data_json,
            shake_enabled: args.shake_enabled,
        }
    }
}

unsafe fn read_init(ptr: *const c_char) -> InitParams {
    let Some(json) = read_str(ptr) else {
        return InitParams::default();
    };
    match serde_json::from_str::<InitArgs>(json) {
        Ok(args) => args.into(),
        Err(e) => {
            tracing::warn!("Ignoring malformed initialization JSON: {}", e);
            InitParams::default()
        }
    }
}

// ============================================================================
// Exports
// ============================================================================

/// Install the default `tracing` subscriber
///
/// # Safety
///
/// `filter` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn adbridge_init_logging(filter: *const c_char) {
    let filter = read_str(filter).unwrap_or("info");
    init_logging(filter);
}

/// Blocking initialization, see [`MediationBridge::initialize`]
///
/// # Safety
///
/// `params_json` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn adbridge_initialize(params_json: *const c_char) -> bool {
    let params = read_init(params_json);
    guard("adbridge_initialize", false, || {
        bridge().is_some_and(|bridge| bridge.initialize(&params))
    })
}

/// # Safety
///
/// `params_json` must be null or a NUL-terminated string. `context` must stay
/// valid until `callback` has fired.
#[no_mangle]
pub unsafe extern "C" fn adbridge_initialize_async(
    params_json: *const c_char,
    callback: Option<LoadResultFn>,
    context: *mut c_void,
) {
    let params = read_init(params_json);
    let listener = load_listener(callback, context);
    guard("adbridge_initialize_async", (), || match bridge() {
        Some(bridge) => bridge.initialize_async(params, listener),
        None => report_uninstalled(listener),
    })
}

fn report_uninstalled(listener: Option<Arc<dyn LoadListener>>) {
    if let Some(listener) = listener {
        listener.on_error(&BridgeError::Internal("bridge is not installed".to_string()));
    }
}

/// Load an ad by numeric kind code and return its handle
///
/// Codes: 0 reward video, 1 interstitial, 2 banner, 3 splash. Returns null
/// for an unknown code or when no bridge is installed.
///
/// # Safety
///
/// `extras_json` must be null or a NUL-terminated string. `context` must stay
/// valid until `callback` has fired.
#[no_mangle]
pub unsafe extern "C" fn adbridge_load_ad(
    kind: i32,
    extras_json: *const c_char,
    callback: Option<LoadResultFn>,
    context: *mut c_void,
) -> *mut c_char {
    let extras = read_map(extras_json);
    let listener = load_listener(callback, context);
    guard("adbridge_load_ad", ptr::null_mut(), || {
        let Some(bridge) = bridge() else {
            report_uninstalled(listener);
            return ptr::null_mut();
        };
        let Some(kind) = AdKind::from_code(kind) else {
            if let Some(listener) = listener {
                listener.on_error(&BridgeError::Unsupported(kind.to_string()));
            }
            return ptr::null_mut();
        };
        into_raw(bridge.load_ad(kind, extras.as_ref(), listener))
    })
}

/// # Safety
///
/// See [`adbridge_load_ad`].
#[no_mangle]
pub unsafe extern "C" fn adbridge_load_reward_video_ad(
    extras_json: *const c_char,
    callback: Option<LoadResultFn>,
    context: *mut c_void,
) -> *mut c_char {
    adbridge_load_ad(AdKind::RewardVideo.code(), extras_json, callback, context)
}

/// # Safety
///
/// See [`adbridge_load_ad`].
#[no_mangle]
pub unsafe extern "C" fn adbridge_load_interstitial_ad(
    extras_json: *const c_char,
    callback: Option<LoadResultFn>,
    context: *mut c_void,
) -> *mut c_char {
    adbridge_load_ad(AdKind::Interstitial.code(), extras_json, callback, context)
}

/// # Safety
///
/// See [`adbridge_load_ad`].
#[no_mangle]
pub unsafe extern "C" fn adbridge_load_banner_ad(
    extras_json: *const c_char,
    callback: Option<LoadResultFn>,
    context: *mut c_void,
) -> *mut c_char {
    adbridge_load_ad(AdKind::Banner.code(), extras_json, callback, context)
}

/// # Safety
///
/// See [`adbridge_load_ad`].
#[no_mangle]
pub unsafe extern "C" fn adbridge_load_splash_ad(
    extras_json: *const c_char,
    callback: Option<LoadResultFn>,
    context: *mut c_void,
) -> *mut c_char {
    adbridge_load_ad(AdKind::Splash.code(), extras_json, callback, context)
}

/// # Safety
///
/// `handle` and `options_json` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn adbridge_show_ad(handle: *const c_char, options_json: *const c_char) -> bool {
    let Some(handle) = read_str(handle) else {
        return false;
    };
    let options = read_map(options_json);
    guard("adbridge_show_ad", false, || {
        bridge().is_some_and(|bridge| bridge.show_ad(handle, options.as_ref()))
    })
}

/// # Safety
///
/// `handle` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn adbridge_is_ad_valid(handle: *const c_char) -> bool {
    let Some(handle) = read_str(handle) else {
        return false;
    };
    guard("adbridge_is_ad_valid", false, || {
        bridge().is_some_and(|bridge| bridge.is_ad_valid(handle))
    })
}

/// # Safety
///
/// `handle` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn adbridge_destroy_ad(handle: *const c_char) {
    let Some(handle) = read_str(handle) else {
        return;
    };
    guard("adbridge_destroy_ad", (), || {
        if let Some(bridge) = bridge() {
            bridge.destroy_ad(handle);
        }
    })
}

/// # Safety
///
/// `extras_json` must be null or a NUL-terminated string. `context` must stay
/// valid for as long as the SDK may call back, which for auto reward ads is
/// the lifetime of the process.
#[no_mangle]
pub unsafe extern "C" fn adbridge_show_auto_reward_ad(
    extras_json: *const c_char,
    callback: AutoRewardFn,
    context: *mut c_void,
) {
    let extras = read_map(extras_json);
    let listener: Arc<dyn AutoRewardListener> = Arc::new(FfiAutoRewardListener::new(callback, context));
    guard("adbridge_show_auto_reward_ad", (), || match bridge() {
        Some(bridge) => bridge.show_auto_reward_ad(extras.as_ref(), listener),
        None => listener.on_error(&BridgeError::Internal("bridge is not installed".to_string())),
    })
}

/// SDK version string, to be released with [`adbridge_free_string`]
#[no_mangle]
pub extern "C" fn adbridge_sdk_version() -> *mut c_char {
    guard("adbridge_sdk_version", ptr::null_mut(), || {
        let version = bridge()
            .map(MediationBridge::sdk_version)
            .unwrap_or_else(|| adbridge_runtime::SDK_VERSION_FALLBACK.to_string());
        into_raw(version)
    })
}

#[no_mangle]
pub extern "C" fn adbridge_request_permission_if_needed() {
    guard("adbridge_request_permission_if_needed", (), || {
        if let Some(bridge) = bridge() {
            bridge.request_permission_if_needed();
        }
    })
}

/// Release a string returned by this library
///
/// # Safety
///
/// `ptr` must be null or a pointer returned by this library that was not
/// freed before.
#[no_mangle]
pub unsafe extern "C" fn adbridge_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}
