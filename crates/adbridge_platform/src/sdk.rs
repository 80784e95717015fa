//! Mediation SDK contracts
//!
//! [`MediationSdk`] is the process-wide entry point, [`AdNative`] the loader
//! it hands out. Load results arrive through one-shot callbacks on whatever
//! thread the SDK chooses.

use std::sync::Arc;

use adbridge_core::AdRequest;

use crate::ad::{AutoRewardAdListener, BannerAd, InterstitialAd, RewardVideoAd, SplashAd};
use crate::error::{Result, SdkFailure};
use crate::host::Activity;

/// Completion of [`MediationSdk::init`]
pub type InitCallback = Box<dyn FnOnce(std::result::Result<(), SdkFailure>) + Send>;

/// Completion of an `AdNative::load_*` call
pub type LoadCallback<A> = Box<dyn FnOnce(std::result::Result<A, SdkFailure>) + Send>;

/// Process-wide SDK entry point
pub trait MediationSdk: Send + Sync {
    /// Start initialization. `callback` fires once, possibly never.
    fn init(&self, activity: &dyn Activity, config: &SdkConfig, callback: InitCallback) -> Result<()>;

    /// Create an ad loader bound to `activity`
    fn create_ad_native(&self, activity: &dyn Activity) -> Result<Arc<dyn AdNative>>;

    fn version(&self) -> Result<String>;

    /// Prompt for optional runtime permissions. Must run on the UI thread.
    fn request_permission_if_necessary(&self, activity: &dyn Activity);
}

/// Ad loader
pub trait AdNative: Send + Sync {
    fn load_reward_video_ad(
        &self,
        request: &AdRequest,
        callback: LoadCallback<Box<dyn RewardVideoAd>>,
    ) -> Result<()>;

    fn load_interstitial_ad(
        &self,
        request: &AdRequest,
        callback: LoadCallback<Box<dyn InterstitialAd>>,
    ) -> Result<()>;

    fn load_banner_ad(&self, request: &AdRequest, callback: LoadCallback<Box<dyn BannerAd>>)
        -> Result<()>;

    fn load_splash_ad(&self, request: &AdRequest, callback: LoadCallback<Box<dyn SplashAd>>)
        -> Result<()>;

    /// Show a cached reward video or load one and show it. The loader keeps
    /// its own cache, so callers reuse one instance.
    fn show_reward_video_auto_ad(
        &self,
        request: &AdRequest,
        activity: &dyn Activity,
        listener: Arc<dyn AutoRewardAdListener>,
    ) -> Result<()>;
}

// ============================================================================
// Initialization config
// ============================================================================

/// Configuration handed to [`MediationSdk::init`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SdkConfig {
    pub media_id: i64,
    pub channel: Option<String>,
    pub media_name: Option<String>,
    pub media_key: Option<String>,
    pub client_id: Option<String>,
    /// JSON payload forwarded verbatim
    pub data: Option<String>,
    pub enable_log: bool,
    pub shake_enabled: bool,
}

/// Raw initialization arguments as the host supplies them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitParams {
    pub app_id: String,
    pub channel: Option<String>,
    pub sub_channel: Option<String>,
    pub enable_log: bool,
    pub media_name: Option<String>,
    pub media_key: Option<String>,
    pub client_id: Option<String>,
    pub extra_data_json: Option<String>,
    pub shake_enabled: bool,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

impl InitParams {
    /// Resolve the SDK config
    ///
    /// `app_id` is trimmed before parsing, so `" 42 "` is media id 42. A
    /// non-numeric `app_id` becomes media id 0. The data payload is
    /// `extra_data_json` when given, else `{"sub_channel": …}` when a sub
    /// channel is given.
    pub fn to_config(&self) -> SdkConfig {
        let media_id = self.app_id.trim().parse::<i64>().unwrap_or_else(|_| {
            if !self.app_id.is_empty() {
                tracing::warn!("app_id {:?} is not numeric, using media id 0", self.app_id);
            }
            0
        });

        SdkConfig {
            media_id,
            channel: non_empty(&self.channel),
            media_name: non_empty(&self.media_name),
            media_key: non_empty(&self.media_key),
            client_id: non_empty(&self.client_id),
            data: self.data_payload(),
            enable_log: self.enable_log,
            shake_enabled: self.shake_enabled,
        }
    }

    fn data_payload(&self) -> Option<String> {
        if let Some(json) = non_empty(&self.extra_data_json) {
            return Some(json);
        }
        non_empty(&self.sub_channel).map(|sub| serde_json::json!({ "sub_channel": sub }).to_string())
    }
}
