//! In-memory doubles for the platform contracts
//!
//! Enabled with the `testing` feature. Every fake records what it was asked
//! to do and lets the test decide when and how the SDK answers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use adbridge_core::{
    AdKind, AdRequest, Arg, ArgKind, EventRecord, EventSink, SetterError, SetterResult,
    SetterTarget, SinkError,
};
use parking_lot::Mutex;

use crate::ad::{
    AdInteractionListener, AdResource, AutoRewardAdListener, BannerAd, BannerAlignment,
    InterstitialAd, RewardVerification, RewardVideoAd, SplashAd,
};
use crate::error::{PlatformError, Result, SdkFailure};
use crate::host::{Activity, Host, Overlay, OverlaySpec};
use crate::sdk::{AdNative, InitCallback, LoadCallback, MediationSdk, SdkConfig};

// ============================================================================
// SDK
// ============================================================================

/// How [`FakeSdk::init`] answers
#[derive(Debug, Clone)]
pub enum InitBehavior {
    /// Callback fires synchronously with success
    Succeed,
    /// Callback fires synchronously with this failure
    Fail(SdkFailure),
    /// Callback is parked until [`FakeSdk::complete_init`]
    Never,
    /// `init` itself returns an error
    Reject(String),
}

/// Scriptable [`MediationSdk`]
pub struct FakeSdk {
    init_behavior: Mutex<InitBehavior>,
    pending_init: Mutex<Vec<InitCallback>>,
    configs: Mutex<Vec<SdkConfig>>,
    native: Arc<FakeAdNative>,
    natives_created: AtomicUsize,
    version: Mutex<Option<String>>,
    permission_requests: Mutex<Vec<ThreadId>>,
}

impl Default for FakeSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSdk {
    pub fn new() -> Self {
        Self {
            init_behavior: Mutex::new(InitBehavior::Succeed),
            pending_init: Mutex::new(Vec::new()),
            configs: Mutex::new(Vec::new()),
            native: Arc::new(FakeAdNative::new()),
            natives_created: AtomicUsize::new(0),
            version: Mutex::new(Some("1.0.0".to_string())),
            permission_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_init(self, behavior: InitBehavior) -> Self {
        *self.init_behavior.lock() = behavior;
        self
    }

    pub fn set_init(&self, behavior: InitBehavior) {
        *self.init_behavior.lock() = behavior;
    }

    /// The loader every `create_ad_native` call hands out
    pub fn native(&self) -> Arc<FakeAdNative> {
        Arc::clone(&self.native)
    }

    pub fn init_calls(&self) -> usize {
        self.configs.lock().len()
    }

    pub fn last_config(&self) -> Option<SdkConfig> {
        self.configs.lock().last().cloned()
    }

    /// Fire the oldest parked init callback. Returns `false` when none is parked.
    pub fn complete_init(&self, result: std::result::Result<(), SdkFailure>) -> bool {
        let next = {
            let mut pending = self.pending_init.lock();
            if pending.is_empty() {
                None
            } else {
                Some(pending.remove(0))
            }
        };
        match next {
            Some(callback) => {
                callback(result);
                true
            }
            None => false,
        }
    }

    pub fn natives_created(&self) -> usize {
        self.natives_created.load(Ordering::SeqCst)
    }

    /// `None` makes [`MediationSdk::version`] fail
    pub fn set_version(&self, version: Option<String>) {
        *self.version.lock() = version;
    }

    /// Threads that requested permissions, in call order
    pub fn permission_requests(&self) -> Vec<ThreadId> {
        self.permission_requests.lock().clone()
    }
}

impl MediationSdk for FakeSdk {
    fn init(&self, _activity: &dyn Activity, config: &SdkConfig, callback: InitCallback) -> Result<()> {
        self.configs.lock().push(config.clone());

        let behavior = self.init_behavior.lock().clone();
        match behavior {
            InitBehavior::Succeed => callback(Ok(())),
            InitBehavior::Fail(failure) => callback(Err(failure)),
            InitBehavior::Never => self.pending_init.lock().push(callback),
            InitBehavior::Reject(message) => return Err(PlatformError::InitFailed(message)),
        }
        Ok(())
    }

    fn create_ad_native(&self, _activity: &dyn Activity) -> Result<Arc<dyn AdNative>> {
        self.natives_created.fetch_add(1, Ordering::SeqCst);
        Ok(self.native() as Arc<dyn AdNative>)
    }

    fn version(&self) -> Result<String> {
        self.version
            .lock()
            .clone()
            .ok_or_else(|| PlatformError::Other("version unavailable".to_string()))
    }

    fn request_permission_if_necessary(&self, _activity: &dyn Activity) {
        self.permission_requests.lock().push(thread::current().id());
    }
}

// ============================================================================
// Loader
// ============================================================================

/// How [`FakeAdNative`] answers load calls
#[derive(Debug, Clone)]
pub enum LoadBehavior {
    /// Callback fires synchronously with a fresh ad
    Succeed,
    /// Callback fires synchronously with this failure
    Fail(SdkFailure),
    /// Callback is parked until [`FakeAdNative::complete_load`]
    Pending,
    /// The load call itself returns an error
    Reject(String),
}

type Completion = Box<dyn FnOnce(std::result::Result<(), SdkFailure>) + Send>;

/// Scriptable [`AdNative`]
pub struct FakeAdNative {
    behavior: Mutex<LoadBehavior>,
    requests: Mutex<Vec<(AdKind, AdRequest)>>,
    load_threads: Mutex<Vec<ThreadId>>,
    pending: Mutex<Vec<Completion>>,
    probes: Arc<Mutex<Vec<Arc<AdProbe>>>>,
    auto: Mutex<Vec<(AdRequest, Arc<dyn AutoRewardAdListener>)>>,
}

impl Default for FakeAdNative {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAdNative {
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(LoadBehavior::Succeed),
            requests: Mutex::new(Vec::new()),
            load_threads: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            probes: Arc::new(Mutex::new(Vec::new())),
            auto: Mutex::new(Vec::new()),
        }
    }

    pub fn set_behavior(&self, behavior: LoadBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Every load request, in call order
    pub fn requests(&self) -> Vec<(AdKind, AdRequest)> {
        self.requests.lock().clone()
    }

    /// Threads load calls arrived on
    pub fn load_threads(&self) -> Vec<ThreadId> {
        self.load_threads.lock().clone()
    }

    pub fn pending_loads(&self) -> usize {
        self.pending.lock().len()
    }

    /// Finish the oldest parked load. Returns `false` when none is parked.
    pub fn complete_load(&self, result: std::result::Result<(), SdkFailure>) -> bool {
        let next = {
            let mut pending = self.pending.lock();
            if pending.is_empty() {
                None
            } else {
                Some(pending.remove(0))
            }
        };
        match next {
            Some(complete) => {
                complete(result);
                true
            }
            None => false,
        }
    }

    /// Probes of every ad handed out, in load order
    pub fn probes(&self) -> Vec<Arc<AdProbe>> {
        self.probes.lock().clone()
    }

    pub fn last_probe(&self) -> Option<Arc<AdProbe>> {
        self.probes.lock().last().cloned()
    }

    /// Auto-reward requests and their listeners
    pub fn auto_requests(&self) -> Vec<(AdRequest, Arc<dyn AutoRewardAdListener>)> {
        self.auto.lock().clone()
    }

    fn load<A: 'static>(
        &self,
        kind: AdKind,
        request: &AdRequest,
        callback: LoadCallback<A>,
        wrap: fn(FakeAd) -> A,
    ) -> Result<()> {
        self.requests.lock().push((kind, request.clone()));
        self.load_threads.lock().push(thread::current().id());

        let probes = Arc::clone(&self.probes);
        let complete = move |result: std::result::Result<(), SdkFailure>| match result {
            Ok(()) => {
                let probe = Arc::new(AdProbe::new(kind));
                probes.lock().push(Arc::clone(&probe));
                callback(Ok(wrap(FakeAd { probe })));
            }
            Err(failure) => callback(Err(failure)),
        };

        let behavior = self.behavior.lock().clone();
        match behavior {
            LoadBehavior::Succeed => complete(Ok(())),
            LoadBehavior::Fail(failure) => complete(Err(failure)),
            LoadBehavior::Pending => self.pending.lock().push(Box::new(complete)),
            LoadBehavior::Reject(message) => return Err(PlatformError::Other(message)),
        }
        Ok(())
    }
}

impl AdNative for FakeAdNative {
    fn load_reward_video_ad(
        &self,
        request: &AdRequest,
        callback: LoadCallback<Box<dyn RewardVideoAd>>,
    ) -> Result<()> {
        self.load(AdKind::RewardVideo, request, callback, |ad| {
            Box::new(ad) as Box<dyn RewardVideoAd>
        })
    }

    fn load_interstitial_ad(
        &self,
        request: &AdRequest,
        callback: LoadCallback<Box<dyn InterstitialAd>>,
    ) -> Result<()> {
        self.load(AdKind::Interstitial, request, callback, |ad| {
            Box::new(ad) as Box<dyn InterstitialAd>
        })
    }

    fn load_banner_ad(&self, request: &AdRequest, callback: LoadCallback<Box<dyn BannerAd>>) -> Result<()> {
        self.load(AdKind::Banner, request, callback, |ad| {
            Box::new(ad) as Box<dyn BannerAd>
        })
    }

    fn load_splash_ad(&self, request: &AdRequest, callback: LoadCallback<Box<dyn SplashAd>>) -> Result<()> {
        self.load(AdKind::Splash, request, callback, |ad| {
            Box::new(ad) as Box<dyn SplashAd>
        })
    }

    fn show_reward_video_auto_ad(
        &self,
        request: &AdRequest,
        _activity: &dyn Activity,
        listener: Arc<dyn AutoRewardAdListener>,
    ) -> Result<()> {
        self.auto.lock().push((request.clone(), listener));
        Ok(())
    }
}

// ============================================================================
// Ads
// ============================================================================

/// Where a fake ad fires its close callback from inside `show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseOnShow {
    /// Close is left to the test
    #[default]
    Never,
    /// Close fires on the thread running `show`
    SameThread,
    /// Close fires on a helper thread that `show` joins before returning
    OtherThread,
}

/// Test-side view of one loaded fake ad
pub struct AdProbe {
    kind: AdKind,
    shows: AtomicUsize,
    destroys: AtomicUsize,
    valid: AtomicBool,
    fail_show: AtomicBool,
    close_on_show: Mutex<CloseOnShow>,
    reward_on_show: Mutex<Option<RewardVerification>>,
    listener: Mutex<Option<Arc<dyn AdInteractionListener>>>,
    options: Mutex<Vec<(String, Arg)>>,
    banner_shows: Mutex<Vec<(BannerAlignment, i32)>>,
    threads: Mutex<Vec<(&'static str, ThreadId)>>,
}

impl AdProbe {
    fn new(kind: AdKind) -> Self {
        Self {
            kind,
            shows: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
            valid: AtomicBool::new(true),
            fail_show: AtomicBool::new(false),
            close_on_show: Mutex::new(CloseOnShow::Never),
            reward_on_show: Mutex::new(None),
            listener: Mutex::new(None),
            options: Mutex::new(Vec::new()),
            banner_shows: Mutex::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
        }
    }

    pub fn kind(&self) -> AdKind {
        self.kind
    }

    pub fn shows(&self) -> usize {
        self.shows.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    /// Make every following show fail
    pub fn set_fail_show(&self, fail: bool) {
        self.fail_show.store(fail, Ordering::SeqCst);
    }

    /// Fire close from inside every following show, before its outcome
    pub fn set_close_on_show(&self, mode: CloseOnShow) {
        *self.close_on_show.lock() = mode;
    }

    /// Fire a reward from inside every following show
    pub fn set_reward_on_show(&self, verification: Option<RewardVerification>) {
        *self.reward_on_show.lock() = verification;
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Show options accepted through `set*` setters
    pub fn options(&self) -> Vec<(String, Arg)> {
        self.options.lock().clone()
    }

    pub fn banner_shows(&self) -> Vec<(BannerAlignment, i32)> {
        self.banner_shows.lock().clone()
    }

    /// `(operation, thread)` for every show and destroy
    pub fn threads(&self) -> Vec<(&'static str, ThreadId)> {
        self.threads.lock().clone()
    }

    fn current_listener(&self) -> Option<Arc<dyn AdInteractionListener>> {
        self.listener.lock().clone()
    }

    pub fn fire_show(&self) {
        if let Some(listener) = self.current_listener() {
            listener.on_ad_show();
        }
    }

    pub fn fire_close(&self) {
        if let Some(listener) = self.current_listener() {
            listener.on_ad_close();
        }
    }

    pub fn fire_click(&self) {
        if let Some(listener) = self.current_listener() {
            listener.on_ad_click();
        }
    }

    pub fn fire_reward(&self, verification: RewardVerification) {
        if let Some(listener) = self.current_listener() {
            listener.on_reward_verify(verification);
        }
    }

    fn record_show(&self) -> Result<()> {
        self.threads.lock().push(("show", thread::current().id()));

        let reward = self.reward_on_show.lock().clone();
        if let Some(verification) = reward {
            self.fire_reward(verification);
        }

        let close = *self.close_on_show.lock();
        match close {
            CloseOnShow::Never => {}
            CloseOnShow::SameThread => self.fire_close(),
            CloseOnShow::OtherThread => {
                if let Some(listener) = self.current_listener() {
                    let closer = thread::spawn(move || listener.on_ad_close());
                    if closer.join().is_err() {
                        return Err(PlatformError::Other("close callback panicked".to_string()));
                    }
                }
            }
        }

        if self.fail_show.load(Ordering::SeqCst) {
            return Err(PlatformError::Other("show failed".to_string()));
        }
        self.shows.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Ad handed out by [`FakeAdNative`], usable as any kind
///
/// Accepts the show options `setMute(bool)`, `setOrientation(i32)` and
/// `setUserData(String)`.
pub struct FakeAd {
    probe: Arc<AdProbe>,
}

impl FakeAd {
    pub fn probe(&self) -> Arc<AdProbe> {
        Arc::clone(&self.probe)
    }
}

impl SetterTarget for FakeAd {
    fn invoke(&mut self, setter: &str, arg: &Arg) -> SetterResult {
        let accepted = matches!(
            (setter, arg.kind()),
            ("setMute", ArgKind::Bool) | ("setOrientation", ArgKind::I32) | ("setUserData", ArgKind::Str)
        );
        if !accepted {
            return Err(SetterError::no_such_setter(setter, arg.kind()));
        }
        self.probe.options.lock().push((setter.to_string(), arg.clone()));
        Ok(())
    }
}

impl AdResource for FakeAd {
    fn destroy(&mut self) {
        self.probe.threads.lock().push(("destroy", thread::current().id()));
        self.probe.destroys.fetch_add(1, Ordering::SeqCst);
        *self.probe.listener.lock() = None;
    }

    fn is_valid(&self) -> bool {
        self.probe.valid.load(Ordering::SeqCst)
    }

    fn set_interaction_listener(&mut self, listener: Option<Arc<dyn AdInteractionListener>>) {
        *self.probe.listener.lock() = listener;
    }
}

impl RewardVideoAd for FakeAd {
    fn show(&mut self, _activity: &dyn Activity) -> Result<()> {
        self.probe.record_show()
    }
}

impl InterstitialAd for FakeAd {
    fn show(&mut self, _activity: &dyn Activity) -> Result<()> {
        self.probe.record_show()
    }
}

impl BannerAd for FakeAd {
    fn show(&mut self, _activity: &dyn Activity, alignment: BannerAlignment, offset: i32) -> Result<()> {
        self.probe.record_show()?;
        self.probe.banner_shows.lock().push((alignment, offset));
        Ok(())
    }
}

impl SplashAd for FakeAd {
    fn show(&mut self, overlay: &mut dyn Overlay) -> Result<()> {
        if !overlay.is_attached() {
            return Err(PlatformError::ViewAttach("overlay is detached".to_string()));
        }
        self.probe.record_show()
    }
}

// ============================================================================
// Host
// ============================================================================

/// [`Host`] with a swappable activity
pub struct FakeHost {
    activity: Mutex<Option<Arc<FakeActivity>>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    /// Host with a foreground activity
    pub fn new() -> Self {
        Self {
            activity: Mutex::new(Some(Arc::new(FakeActivity::new()))),
        }
    }

    pub fn without_activity() -> Self {
        Self {
            activity: Mutex::new(None),
        }
    }

    pub fn activity(&self) -> Option<Arc<FakeActivity>> {
        self.activity.lock().clone()
    }

    pub fn set_activity(&self, activity: Option<Arc<FakeActivity>>) {
        *self.activity.lock() = activity;
    }
}

impl Host for FakeHost {
    fn current_activity(&self) -> Option<Arc<dyn Activity>> {
        self.activity
            .lock()
            .clone()
            .map(|activity| activity as Arc<dyn Activity>)
    }
}

/// [`Activity`] that counts attached overlays
pub struct FakeActivity {
    attached: Arc<AtomicUsize>,
    specs: Mutex<Vec<OverlaySpec>>,
    fail_attach: AtomicBool,
}

impl Default for FakeActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeActivity {
    pub fn new() -> Self {
        Self {
            attached: Arc::new(AtomicUsize::new(0)),
            specs: Mutex::new(Vec::new()),
            fail_attach: AtomicBool::new(false),
        }
    }

    /// Overlays currently attached
    pub fn attached_overlays(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    /// Overlays ever attached
    pub fn total_attached(&self) -> usize {
        self.specs.lock().len()
    }

    pub fn last_spec(&self) -> Option<OverlaySpec> {
        self.specs.lock().last().copied()
    }

    pub fn set_fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }
}

impl Activity for FakeActivity {
    fn attach_overlay(&self, spec: &OverlaySpec) -> Result<Box<dyn Overlay>> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(PlatformError::ViewAttach("content root missing".to_string()));
        }
        self.specs.lock().push(*spec);
        self.attached.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeOverlay {
            attached: Arc::clone(&self.attached),
            live: true,
        }))
    }
}

struct FakeOverlay {
    attached: Arc<AtomicUsize>,
    live: bool,
}

impl Overlay for FakeOverlay {
    fn detach(&mut self) {
        if self.live {
            self.live = false;
            self.attached.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_attached(&self) -> bool {
        self.live
    }
}

// ============================================================================
// Event sink
// ============================================================================

/// [`EventSink`] that keeps every message
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(String, String, String)>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(target, method, message)` triples
    pub fn raw(&self) -> Vec<(String, String, String)> {
        self.messages.lock().clone()
    }

    /// Delivered messages decoded back into records
    pub fn events(&self) -> Vec<EventRecord> {
        self.messages
            .lock()
            .iter()
            .filter_map(|(_, _, message)| serde_json::from_str(message).ok())
            .collect()
    }

    pub fn events_for(&self, handle: &str) -> Vec<EventRecord> {
        self.events()
            .into_iter()
            .filter(|record| record.handle == handle)
            .collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl EventSink for RecordingSink {
    fn deliver(&self, target: &str, method: &str, message: &str) -> std::result::Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("receiver missing".to_string()));
        }
        self.messages
            .lock()
            .push((target.to_string(), method.to_string(), message.to_string()));
        Ok(())
    }
}
