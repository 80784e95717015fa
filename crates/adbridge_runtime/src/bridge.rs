//! Mediation bridge facade
//!
//! [`MediationBridge`] is the single entry point a scripting host talks to.
//! Callers may sit on any thread; everything that touches the SDK, a loaded
//! ad or the host's views is posted to the bridge's [`UiThread`].
//!
//! Two calling conventions are offered:
//!
//! - listener based (`initialize_async`, `load_*`, `show_auto_reward_ad`):
//!   the call returns at once and the listener hears back later
//! - blocking (`initialize`, `show_ad`): the call waits a bounded time and
//!   falls back to `false` when the UI thread does not answer in time
//!
//! A blocking call that times out does not cancel its work. The posted task
//! still runs and may change entry state after the caller has moved on.
//!
//! # Example
//!
//! ```ignore
//! let bridge = MediationBridge::builder(sdk, host, sink)
//!     .config(BridgeConfig::load_from_dir(&dir)?)
//!     .build()?;
//!
//! let extras = ConfigMap::new().with("space_id", 1001);
//! let handle = bridge.load_reward_video_ad(Some(&extras), Some(listener));
//! bridge.show_ad(&handle, None);
//! bridge.destroy_ad(&handle);
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use adbridge_core::{
    build_request, AdKind, AdRequest, BridgeError, ConfigMap, EventEmitter, EventSink, SPACE_ID,
};
use adbridge_platform::{
    Activity, AdInteractionListener, AdNative, Host, InitCallback, InitParams, LoadCallback,
    MediationSdk, PlatformError, SdkFailure, Task, UiThread,
};
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{BridgeConfig, ConfigError};
use crate::confine::{call_blocking, oneshot, CompletionGuard, ConfinedThread};
use crate::lifecycle;
use crate::listener::{report, AutoRewardListener, AutoRewardRelay, EntryListener, LoadListener};
use crate::registry::{AdEntry, Handle, HandleRegistry, Phase, Slot};

/// Returned by [`MediationBridge::sdk_version`] when the SDK cannot report one
pub const SDK_VERSION_FALLBACK: &str = "native-error";

/// Errors raised while assembling a bridge
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("invalid bridge configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn UI thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Builder for [`MediationBridge`]
pub struct MediationBridgeBuilder {
    sdk: Arc<dyn MediationSdk>,
    host: Arc<dyn Host>,
    sink: Arc<dyn EventSink>,
    ui: Option<Arc<dyn UiThread>>,
    config: BridgeConfig,
}

impl MediationBridgeBuilder {
    /// Use the host's own UI thread instead of spawning a [`ConfinedThread`]
    pub fn ui_thread(mut self, ui: Arc<dyn UiThread>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<MediationBridge, BuildError> {
        self.config.validate()?;

        let ui: Arc<dyn UiThread> = match self.ui {
            Some(ui) => ui,
            None => Arc::new(ConfinedThread::spawn(&self.config.ui_thread_name)?),
        };
        let emitter = EventEmitter::new(self.sink, self.config.sink.clone());

        tracing::debug!(
            "Built mediation bridge (sink {}.{})",
            self.config.sink.target,
            self.config.sink.method
        );

        Ok(MediationBridge {
            inner: Arc::new(BridgeInner {
                sdk: self.sdk,
                host: self.host,
                ui,
                registry: HandleRegistry::new(),
                emitter,
                config: self.config,
                auto_native: OnceLock::new(),
                auto_lock: Mutex::new(()),
            }),
        })
    }
}

struct BridgeInner {
    sdk: Arc<dyn MediationSdk>,
    host: Arc<dyn Host>,
    ui: Arc<dyn UiThread>,
    registry: HandleRegistry,
    emitter: EventEmitter,
    config: BridgeConfig,
    /// Factory reused by every auto-reward call, never torn down
    auto_native: OnceLock<Arc<dyn AdNative>>,
    auto_lock: Mutex<()>,
}

/// The bridge between a scripting host and the mediation SDK
///
/// Cheap to clone; clones share one registry and one UI thread.
#[derive(Clone)]
pub struct MediationBridge {
    inner: Arc<BridgeInner>,
}

impl MediationBridge {
    pub fn builder(
        sdk: Arc<dyn MediationSdk>,
        host: Arc<dyn Host>,
        sink: Arc<dyn EventSink>,
    ) -> MediationBridgeBuilder {
        MediationBridgeBuilder {
            sdk,
            host,
            sink,
            ui: None,
            config: BridgeConfig::default(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Initialize the SDK and wait for the outcome
    ///
    /// Returns `true` only when the SDK reported success within the
    /// configured timeout. Called on the UI thread itself, this cannot wait:
    /// initialization continues asynchronously and `true` is returned.
    pub fn initialize(&self, params: &InitParams) -> bool {
        let inner = &self.inner;
        if inner.ui.is_current() {
            tracing::warn!("initialize called on the UI thread, continuing asynchronously");
            self.initialize_async(params.clone(), None);
            return true;
        }

        let Some(activity) = inner.host.current_activity() else {
            tracing::error!("initialize: {}", BridgeError::activity_null());
            return false;
        };

        let config = params.to_config();
        let sdk = Arc::clone(&inner.sdk);
        let (signal, wait) = oneshot::<Result<(), BridgeError>>();
        let task: Task = Box::new(move || {
            let done = signal.clone();
            let callback: InitCallback =
                Box::new(move |result| done.send(result.map_err(BridgeError::from)));
            if let Err(e) = sdk.init(activity.as_ref(), &config, callback) {
                signal.send(Err(BridgeError::from(e)));
            }
        });

        if let Err(e) = inner.ui.post(task) {
            tracing::error!("initialize: {}", e);
            return false;
        }

        match wait.wait(inner.config.init_timeout()) {
            Some(Ok(())) => {
                tracing::info!("Mediation SDK initialized");
                true
            }
            Some(Err(e)) => {
                tracing::error!("initialize failed: {}", e);
                false
            }
            None => {
                tracing::warn!("initialize timed out waiting for callback");
                false
            }
        }
    }

    /// Initialize the SDK and report the outcome to `listener`
    ///
    /// The listener hears exactly once: success, the SDK's failure, or a
    /// `timeout` error after the configured timeout, whichever comes first.
    pub fn initialize_async(&self, params: InitParams, listener: Option<Arc<dyn LoadListener>>) {
        let inner = &self.inner;
        let Some(activity) = inner.host.current_activity() else {
            report(listener.as_ref(), BridgeError::activity_null());
            return;
        };

        let guard = CompletionGuard::new();

        if let Some(listener) = &listener {
            let guard = guard.clone();
            let listener = Arc::clone(listener);
            let timeout: Task = Box::new(move || {
                if guard.complete() {
                    tracing::warn!("initialize_async timed out waiting for callback");
                    listener.on_error(&BridgeError::Timeout("initialize".to_string()));
                }
            });
            if let Err(e) = inner.ui.post_delayed(inner.config.init_timeout(), timeout) {
                tracing::warn!("Failed to arm initialization timeout: {}", e);
            }
        }

        let finish = Arc::new(move |result: Result<(), BridgeError>| {
            let Some(listener) = &listener else {
                return;
            };
            if !guard.complete() {
                tracing::debug!("Ignoring initialization result after completion");
                return;
            }
            match result {
                Ok(()) => listener.on_success(),
                Err(e) => listener.on_error(&e),
            }
        });

        let sdk = Arc::clone(&inner.sdk);
        let ui = Arc::clone(&inner.ui);
        let task: Task = Box::new(move || {
            let config = params.to_config();
            let done = Arc::clone(&finish);
            let callback: InitCallback = Box::new(move |result| {
                let result = result.map_err(BridgeError::from);
                run_on_ui(ui.as_ref(), Box::new(move || (*done)(result)));
            });
            if let Err(e) = sdk.init(activity.as_ref(), &config, callback) {
                tracing::error!("initialize_async error: {}", e);
                (*finish)(Err(BridgeError::from(e)));
            }
        });

        if let Err(e) = inner.ui.post(task) {
            tracing::error!("initialize_async: {}", e);
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    pub fn load_reward_video_ad(
        &self,
        extras: Option<&ConfigMap>,
        listener: Option<Arc<dyn LoadListener>>,
    ) -> String {
        self.load_ad(AdKind::RewardVideo, extras, listener)
    }

    pub fn load_interstitial_ad(
        &self,
        extras: Option<&ConfigMap>,
        listener: Option<Arc<dyn LoadListener>>,
    ) -> String {
        self.load_ad(AdKind::Interstitial, extras, listener)
    }

    pub fn load_banner_ad(
        &self,
        extras: Option<&ConfigMap>,
        listener: Option<Arc<dyn LoadListener>>,
    ) -> String {
        self.load_ad(AdKind::Banner, extras, listener)
    }

    pub fn load_splash_ad(
        &self,
        extras: Option<&ConfigMap>,
        listener: Option<Arc<dyn LoadListener>>,
    ) -> String {
        self.load_ad(AdKind::Splash, extras, listener)
    }

    /// Load an ad of `kind` and return its handle
    ///
    /// A handle is always returned. It only enters the registry once the
    /// extras validate; until then (and after any load failure raised by the
    /// SDK call itself) lookups on it report "not found".
    pub fn load_ad(
        &self,
        kind: AdKind,
        extras: Option<&ConfigMap>,
        listener: Option<Arc<dyn LoadListener>>,
    ) -> String {
        let handle = Handle::new();
        let inner = &self.inner;

        let Some(activity) = inner.host.current_activity() else {
            report(listener.as_ref(), BridgeError::activity_null());
            return handle.into_string();
        };

        if !kind.is_loadable() {
            report(listener.as_ref(), BridgeError::Unsupported(kind.label().to_string()));
            return handle.into_string();
        }

        let built = match build_request(SPACE_ID, extras) {
            Ok(built) => built,
            Err(e) => {
                report(listener.as_ref(), e);
                return handle.into_string();
            }
        };

        let splash_size = if kind == AdKind::Splash {
            built.express_view_size
        } else {
            None
        };
        let entry = Arc::new(AdEntry::new(handle.clone(), kind).with_splash_size(splash_size));
        inner.registry.insert(Arc::clone(&entry));
        tracing::debug!("Loading {} ad {} (space {})", kind, handle, built.request.space_id);

        let task_inner = Arc::clone(inner);
        let task_listener = listener.clone();
        let request = built.request;
        let task: Task = Box::new(move || {
            task_inner.start_load(&entry, activity.as_ref(), &request, task_listener);
        });

        if let Err(e) = inner.ui.post(task) {
            inner.registry.remove(handle.as_str());
            report(listener.as_ref(), BridgeError::from(e));
        }
        handle.into_string()
    }

    // ========================================================================
    // Show / validity / destroy
    // ========================================================================

    /// Apply `options` and show the ad behind `handle`
    ///
    /// `false` when the handle is unknown, no activity is available, the ad
    /// is not loaded, the show failed or the UI thread did not answer within
    /// the show timeout.
    pub fn show_ad(&self, handle: &str, options: Option<&ConfigMap>) -> bool {
        let inner = &self.inner;
        let Some(entry) = inner.registry.get(handle) else {
            tracing::warn!("show_ad: handle not found {}", handle);
            return false;
        };
        let Some(activity) = inner.host.current_activity() else {
            tracing::warn!("show_ad: activity is null");
            return false;
        };

        let options = options.cloned();
        let result = call_blocking(inner.ui.as_ref(), inner.config.show_timeout(), move || {
            lifecycle::present(&entry, activity.as_ref(), options.as_ref())
        });

        match result {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::warn!("show_ad {} failed: {}", handle, e);
                false
            }
            None => false,
        }
    }

    /// Whether the ad behind `handle` can be shown. Unknown handles are not.
    ///
    /// Answers on the calling thread without waiting for the UI thread. An
    /// ad whose show is still running reports `false`.
    pub fn is_ad_valid(&self, handle: &str) -> bool {
        match self.inner.registry.get(handle) {
            Some(entry) => lifecycle::is_valid(&entry),
            None => {
                tracing::warn!("is_ad_valid: handle not found {}", handle);
                false
            }
        }
    }

    /// Remove `handle` and release its ad. Unknown handles are ignored.
    pub fn destroy_ad(&self, handle: &str) {
        let inner = &self.inner;
        let Some(entry) = inner.registry.remove(handle) else {
            return;
        };

        if inner.ui.is_current() {
            lifecycle::destroy(&entry);
            return;
        }

        let task_entry = Arc::clone(&entry);
        if let Err(e) = inner.ui.post(Box::new(move || lifecycle::destroy(&task_entry))) {
            tracing::warn!("destroy_ad: {}, releasing on the calling thread", e);
            lifecycle::destroy(&entry);
        }
    }

    // ========================================================================
    // Auto reward
    // ========================================================================

    /// Let the SDK load, cache and show a reward video in one go
    ///
    /// All outcomes, errors included, reach `listener`.
    pub fn show_auto_reward_ad(&self, extras: Option<&ConfigMap>, listener: Arc<dyn AutoRewardListener>) {
        let inner = &self.inner;
        let fail = |error: BridgeError| {
            tracing::warn!("show_auto_reward_ad: {} ({})", error, error.code());
            listener.on_error(&error);
        };

        let Some(activity) = inner.host.current_activity() else {
            fail(BridgeError::activity_null());
            return;
        };

        let request = match build_request(SPACE_ID, extras) {
            Ok(built) => built.request,
            Err(e) => {
                fail(e);
                return;
            }
        };

        let task_inner = Arc::clone(inner);
        let task_listener = Arc::clone(&listener);
        let task: Task = Box::new(move || {
            let relay = Arc::new(AutoRewardRelay::new(Arc::clone(&task_listener)));
            let shown = task_inner.auto_native(activity.as_ref()).and_then(|native| {
                native.show_reward_video_auto_ad(&request, activity.as_ref(), relay)
            });
            if let Err(e) = shown {
                tracing::error!("show_auto_reward_ad exception: {}", e);
                task_listener.on_error(&BridgeError::from(e));
            }
        });

        if let Err(e) = inner.ui.post(task) {
            fail(BridgeError::from(e));
        }
    }

    // ========================================================================
    // Misc
    // ========================================================================

    /// SDK version, or [`SDK_VERSION_FALLBACK`] when the SDK fails to report it
    pub fn sdk_version(&self) -> String {
        match self.inner.sdk.version() {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!("sdk_version failed: {}", e);
                SDK_VERSION_FALLBACK.to_string()
            }
        }
    }

    /// Ask the SDK to request its runtime permissions, on the UI thread
    pub fn request_permission_if_needed(&self) {
        let inner = &self.inner;
        let Some(activity) = inner.host.current_activity() else {
            tracing::warn!("request_permission_if_needed: activity is null");
            return;
        };

        let sdk = Arc::clone(&inner.sdk);
        let task: Task = Box::new(move || sdk.request_permission_if_necessary(activity.as_ref()));
        if let Err(e) = inner.ui.post(task) {
            tracing::warn!("request_permission_if_needed: {}", e);
        }
    }

    /// Number of live handles
    pub fn live_handles(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.inner.registry.contains(handle)
    }

    /// Lifecycle phase of a live handle
    pub fn phase(&self, handle: &str) -> Option<Phase> {
        self.inner.registry.get(handle).map(|entry| entry.phase())
    }

    /// Wait until every task posted so far has run on the UI thread
    pub fn flush(&self, timeout: Duration) -> bool {
        call_blocking(self.inner.ui.as_ref(), timeout, || ()).is_some()
    }
}

impl BridgeInner {
    /// Singleton factory for auto-reward ads, created on first use
    fn auto_native(&self, activity: &dyn Activity) -> adbridge_platform::Result<Arc<dyn AdNative>> {
        if let Some(native) = self.auto_native.get() {
            return Ok(Arc::clone(native));
        }

        let _lock = self.auto_lock.lock();
        if let Some(native) = self.auto_native.get() {
            return Ok(Arc::clone(native));
        }

        let native = self.sdk.create_ad_native(activity)?;
        let _ = self.auto_native.set(Arc::clone(&native));
        tracing::debug!("Created shared ad factory for auto reward ads");
        Ok(native)
    }

    /// Runs on the UI thread
    fn start_load(
        self: &Arc<Self>,
        entry: &Arc<AdEntry>,
        activity: &dyn Activity,
        request: &AdRequest,
        listener: Option<Arc<dyn LoadListener>>,
    ) {
        let handle = entry.handle().as_str();
        if !self.registry.contains(handle) {
            report(listener.as_ref(), BridgeError::Destroyed(handle.to_string()));
            return;
        }
        entry.state().phase = Phase::Loading;

        let started = self
            .sdk
            .create_ad_native(activity)
            .and_then(|native| self.dispatch_load(native.as_ref(), entry, request, listener.clone()));

        if let Err(e) = started {
            self.registry.remove(handle);
            tracing::error!("load of {} ad {} failed: {}", entry.kind(), handle, e);
            report(listener.as_ref(), BridgeError::from(e));
        }
    }

    fn dispatch_load(
        self: &Arc<Self>,
        native: &dyn AdNative,
        entry: &Arc<AdEntry>,
        request: &AdRequest,
        listener: Option<Arc<dyn LoadListener>>,
    ) -> adbridge_platform::Result<()> {
        match entry.kind() {
            AdKind::RewardVideo => native.load_reward_video_ad(
                request,
                self.load_callback(entry, listener, Slot::RewardVideo),
            ),
            AdKind::Interstitial => native.load_interstitial_ad(
                request,
                self.load_callback(entry, listener, Slot::Interstitial),
            ),
            AdKind::Banner => {
                native.load_banner_ad(request, self.load_callback(entry, listener, Slot::Banner))
            }
            AdKind::Splash => native.load_splash_ad(
                request,
                self.load_callback(entry, listener, |ad| Slot::Splash { ad, overlay: None }),
            ),
            other => Err(PlatformError::Unsupported(other.label().to_string())),
        }
    }

    /// SDK load callback; the result is handed back to the UI thread
    fn load_callback<A: Send + 'static>(
        self: &Arc<Self>,
        entry: &Arc<AdEntry>,
        listener: Option<Arc<dyn LoadListener>>,
        wrap: fn(A) -> Slot,
    ) -> LoadCallback<A> {
        let inner = Arc::clone(self);
        let entry = Arc::clone(entry);
        Box::new(move |result: Result<A, SdkFailure>| {
            let slot = result.map(wrap);
            let ui = Arc::clone(&inner.ui);
            run_on_ui(
                ui.as_ref(),
                Box::new(move || inner.finish_load(&entry, slot, listener)),
            );
        })
    }

    fn finish_load(
        &self,
        entry: &Arc<AdEntry>,
        slot: Result<Slot, SdkFailure>,
        listener: Option<Arc<dyn LoadListener>>,
    ) {
        let interaction: Arc<dyn AdInteractionListener> = Arc::new(EntryListener::new(
            entry,
            self.emitter.clone(),
            Arc::clone(&self.ui),
        ));

        match lifecycle::install(&self.registry, entry, slot, interaction) {
            Ok(()) => {
                if let Some(listener) = listener {
                    listener.on_success();
                }
            }
            Err(e) => report(listener.as_ref(), e),
        }
    }
}

fn run_on_ui(ui: &dyn UiThread, task: Task) {
    if ui.is_current() {
        task();
    } else if let Err(e) = ui.post(task) {
        tracing::warn!("Dropping SDK callback: {}", e);
    }
}
