//! Ad resource contracts
//!
//! Loaded ads are owned by the bridge and only touched from the UI thread.
//! Every kind shares [`AdResource`]; show differs per kind.
//!
//! Show options reach a resource through its [`SetterTarget`] impl using
//! `set*` setter names.

use std::sync::Arc;

use adbridge_core::SetterTarget;

use crate::error::{Result, SdkFailure};
use crate::host::{Activity, Overlay};

/// Banner vertical anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BannerAlignment {
    Top = 0,
    #[default]
    Bottom = 1,
}

impl BannerAlignment {
    /// 0 anchors to the top, anything else to the bottom
    pub fn from_baseline(baseline: i32) -> Self {
        if baseline == 0 {
            BannerAlignment::Top
        } else {
            BannerAlignment::Bottom
        }
    }
}

/// Reward verification details from the SDK
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardVerification {
    pub verified: bool,
    pub amount: i32,
    pub name: Option<String>,
    pub code: i32,
    pub message: Option<String>,
}

/// Interaction callbacks, invoked on any thread
pub trait AdInteractionListener: Send + Sync {
    fn on_ad_show(&self);

    fn on_ad_close(&self);

    fn on_ad_click(&self);

    /// Only reward video ads report verification
    fn on_reward_verify(&self, _verification: RewardVerification) {}
}

/// Callbacks for the SDK's load-and-show reward flow
pub trait AutoRewardAdListener: AdInteractionListener {
    fn on_error(&self, failure: SdkFailure);
}

/// Behaviour shared by every loaded ad
pub trait AdResource: SetterTarget + Send {
    /// Release SDK resources. Called at most once.
    fn destroy(&mut self);

    /// Whether the ad can still be shown
    fn is_valid(&self) -> bool {
        true
    }

    /// Replace the interaction listener, `None` clears it
    fn set_interaction_listener(&mut self, listener: Option<Arc<dyn AdInteractionListener>>);
}

/// Full-screen rewarded video
pub trait RewardVideoAd: AdResource {
    fn show(&mut self, activity: &dyn Activity) -> Result<()>;
}

/// Full-screen interstitial
pub trait InterstitialAd: AdResource {
    fn show(&mut self, activity: &dyn Activity) -> Result<()>;
}

/// Anchored banner
pub trait BannerAd: AdResource {
    fn show(&mut self, activity: &dyn Activity, alignment: BannerAlignment, offset: i32) -> Result<()>;
}

/// Splash rendered into a bridge-owned overlay
pub trait SplashAd: AdResource {
    fn show(&mut self, overlay: &mut dyn Overlay) -> Result<()>;
}
