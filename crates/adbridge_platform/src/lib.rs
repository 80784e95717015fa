//! Adbridge Platform Contracts
//!
//! Traits for everything the bridge consumes but does not own:
//!
//! - [`MediationSdk`] / [`AdNative`] - SDK initialization and ad loading
//! - [`RewardVideoAd`], [`InterstitialAd`], [`BannerAd`], [`SplashAd`] - loaded ads
//! - [`Host`] / [`Activity`] / [`Overlay`] - the host application's views
//! - [`UiThread`] - the single thread allowed to touch ads and views
//!
//! Platform glue (JNI, Objective-C, a desktop test harness) implements these;
//! the `testing` feature ships in-memory doubles.

mod ad;
mod error;
mod host;
mod sdk;
mod ui;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use ad::{
    AdInteractionListener, AdResource, AutoRewardAdListener, BannerAd, BannerAlignment,
    InterstitialAd, RewardVerification, RewardVideoAd, SplashAd,
};
pub use error::{PlatformError, Result, SdkFailure};
pub use host::{Activity, Dimension, Host, Overlay, OverlaySpec};
pub use sdk::{AdNative, InitCallback, InitParams, LoadCallback, MediationSdk, SdkConfig};
pub use ui::{Task, UiThread};
