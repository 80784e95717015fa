//! Per-kind ad state machines
//!
//! ```text
//! Pending ─▶ Loading ─┬─▶ Loaded ─▶ Showing ─▶ Shown ─▶ Closed
//!                     └─▶ Failed       ▲               │
//!                                      └───────────────┘ (show again)
//!
//! any non-terminal phase ── destroy ──▶ Destroyed
//! ```
//!
//! Everything here runs on the UI thread.

use std::sync::{Arc, LazyLock};

use adbridge_core::{
    normalize_key, AliasTable, Arg, BridgeError, ConfigMap, ConfigValue, Dispatcher,
    SetterResult, SetterTarget, Verb,
};
use adbridge_platform::{
    Activity, AdInteractionListener, AdResource, BannerAd, BannerAlignment, InterstitialAd,
    Overlay, OverlaySpec, RewardVideoAd, SdkFailure, SplashAd,
};

use crate::registry::{AdEntry, HandleRegistry, Phase, Slot};

/// Option key read by banner show, never dispatched to a setter
pub const BANNER_BASELINE: &str = "banner_baseline";
/// Option key read by banner show, never dispatched to a setter
pub const BANNER_OFFSET: &str = "banner_offset";

const DEFAULT_BANNER_BASELINE: i32 = 1;
const DEFAULT_BANNER_OFFSET: i32 = 0;

static SHOW_DISPATCHER: LazyLock<Dispatcher> =
    LazyLock::new(|| Dispatcher::new(AliasTable::default(), Verb::Set));

// ============================================================================
// Load completion
// ============================================================================

/// Store the outcome of a load on its entry
///
/// A failed load leaves the entry registered in [`Phase::Failed`]. A load
/// that finishes after its handle was destroyed releases the ad right away.
pub(crate) fn install(
    registry: &HandleRegistry,
    entry: &Arc<AdEntry>,
    result: Result<Slot, SdkFailure>,
    listener: Arc<dyn AdInteractionListener>,
) -> Result<(), BridgeError> {
    let mut slot = match result {
        Ok(slot) => slot,
        Err(failure) => {
            let mut state = entry.state();
            if !state.phase.is_terminal() {
                state.phase = Phase::Failed;
            }
            return Err(failure.into());
        }
    };

    if slot.kind() != Some(entry.kind()) {
        let err = BridgeError::Internal(format!("SDK returned {:?} for a {} load", slot, entry.kind()));
        slot.release();
        return Err(err);
    }

    if !registry.contains(entry.handle().as_str()) {
        tracing::debug!("Releasing ad loaded after destroy of {}", entry.handle());
        slot.release();
        return Err(BridgeError::Destroyed(entry.handle().to_string()));
    }

    slot.set_listener(Some(listener));
    if let Err(mut rejected) = entry.install(slot) {
        rejected.release();
        return Err(BridgeError::Destroyed(entry.handle().to_string()));
    }

    tracing::debug!("Loaded {} ad {}", entry.kind(), entry.handle());
    Ok(())
}

// ============================================================================
// Show
// ============================================================================

struct ShowOptions<'a, R: ?Sized>(&'a mut R);

impl<R: AdResource + ?Sized> SetterTarget for ShowOptions<'_, R> {
    fn invoke(&mut self, setter: &str, arg: &Arg) -> SetterResult {
        self.0.invoke(setter, arg)
    }

    fn invoke_pair(&mut self, setter: &str, first: &Arg, second: &Arg) -> SetterResult {
        self.0.invoke_pair(setter, first, second)
    }
}

fn apply_options<R: AdResource + ?Sized>(ad: &mut R, options: &ConfigMap) {
    let mut target = ShowOptions(ad);
    for (key, value) in options.iter() {
        let key = normalize_key(key);
        if key == BANNER_BASELINE || key == BANNER_OFFSET || value.is_empty() {
            continue;
        }
        SHOW_DISPATCHER.apply(&mut target, &key, value);
    }
}

/// Route show options to `set*` setters on the loaded ad
pub fn apply_show_options(slot: &mut Slot, options: &ConfigMap) {
    match slot {
        Slot::Empty => {}
        Slot::RewardVideo(ad) => apply_options(ad.as_mut(), options),
        Slot::Interstitial(ad) => apply_options(ad.as_mut(), options),
        Slot::Banner(ad) => apply_options(ad.as_mut(), options),
        Slot::Splash { ad, .. } => apply_options(ad.as_mut(), options),
    }
}

/// Banner anchor and offset from the show options
pub fn banner_placement(options: &ConfigMap) -> (BannerAlignment, i32) {
    let read = |key: &str, default: i32| {
        options
            .find(key)
            .and_then(ConfigValue::as_i32)
            .unwrap_or(default)
    };
    (
        BannerAlignment::from_baseline(read(BANNER_BASELINE, DEFAULT_BANNER_BASELINE)),
        read(BANNER_OFFSET, DEFAULT_BANNER_OFFSET),
    )
}

fn show_splash(
    ad: &mut dyn SplashAd,
    overlay: &mut Option<Box<dyn Overlay>>,
    activity: &dyn Activity,
    (width, height): (i32, i32),
) -> Result<(), BridgeError> {
    if let Some(mut previous) = overlay.take() {
        previous.detach();
    }
    let attached = overlay.insert(activity.attach_overlay(&OverlaySpec::centered(width, height))?);
    ad.show(attached.as_mut())?;
    Ok(())
}

fn show_slot(
    slot: &mut Slot,
    entry: &AdEntry,
    activity: &dyn Activity,
    options: &ConfigMap,
) -> Result<(), BridgeError> {
    match slot {
        Slot::Empty => Err(BridgeError::Internal(format!(
            "{} ad {} is not loaded",
            entry.kind(),
            entry.handle()
        ))),
        Slot::RewardVideo(ad) => ad.show(activity).map_err(BridgeError::from),
        Slot::Interstitial(ad) => ad.show(activity).map_err(BridgeError::from),
        Slot::Banner(ad) => {
            let (alignment, offset) = banner_placement(options);
            ad.show(activity, alignment, offset).map_err(BridgeError::from)
        }
        Slot::Splash { ad, overlay } => {
            show_splash(ad.as_mut(), overlay, activity, entry.splash_size())
        }
    }
}

/// Show a loaded ad
///
/// Options are copied before the banner keys are dropped from them; the
/// caller's map is never touched. Splash ads get a fresh overlay on every
/// call and lose it again if the show fails.
///
/// The ad leaves the entry for the duration of the SDK call and the entry
/// sits in [`Phase::Showing`], so callbacks fired from inside `show` may
/// close or destroy the entry without waiting on this call.
pub fn present(
    entry: &AdEntry,
    activity: &dyn Activity,
    options: Option<&ConfigMap>,
) -> Result<(), BridgeError> {
    let options = options.cloned().unwrap_or_default();

    let (mut slot, resume) = {
        let mut state = entry.state();
        match state.phase {
            Phase::Destroyed => return Err(BridgeError::Destroyed(entry.handle().to_string())),
            Phase::Showing => {
                return Err(BridgeError::Internal(format!(
                    "{} ad {} is already being shown",
                    entry.kind(),
                    entry.handle()
                )))
            }
            _ => {}
        }
        if !state.slot.is_loaded() {
            return Err(BridgeError::Internal(format!(
                "{} ad {} is not loaded",
                entry.kind(),
                entry.handle()
            )));
        }

        apply_show_options(&mut state.slot, &options);
        let resume = state.phase;
        state.phase = Phase::Showing;
        (std::mem::take(&mut state.slot), resume)
    };

    let result = show_slot(&mut slot, entry, activity, &options);

    let mut state = entry.state();
    match state.phase {
        Phase::Destroyed => {
            tracing::debug!("Releasing {} ad {} destroyed during show", entry.kind(), entry.handle());
            slot.release();
            return Err(BridgeError::Destroyed(entry.handle().to_string()));
        }
        Phase::Showing => {
            state.phase = if result.is_ok() { Phase::Shown } else { resume };
        }
        // Closed from inside show
        _ => {
            slot.detach_overlay();
        }
    }

    if result.is_err() && slot.detach_overlay() {
        tracing::debug!("Detached splash overlay of {} after failed show", entry.handle());
    }
    state.slot = slot;

    if result.is_ok() {
        tracing::debug!("Showed {} ad {}", entry.kind(), entry.handle());
    }
    result
}

// ============================================================================
// Close / validity / destroy
// ============================================================================

/// React to the SDK's close callback
pub fn close(entry: &AdEntry) {
    let mut state = entry.state();
    if state.phase.is_terminal() {
        return;
    }
    if state.slot.detach_overlay() {
        tracing::debug!("Detached splash overlay of {}", entry.handle());
    }
    state.phase = Phase::Closed;
}

/// Reward video and interstitial ask the SDK; banner and splash are valid
/// while loaded. An ad in the middle of a show is not valid.
pub fn is_valid(entry: &AdEntry) -> bool {
    let state = entry.state();
    if state.phase.is_terminal() {
        return false;
    }
    match &state.slot {
        Slot::Empty => false,
        Slot::RewardVideo(ad) => ad.is_valid(),
        Slot::Interstitial(ad) => ad.is_valid(),
        Slot::Banner(_) | Slot::Splash { .. } => true,
    }
}

/// Release everything the entry owns. Idempotent.
pub fn destroy(entry: &AdEntry) {
    let mut state = entry.state();
    if state.phase.is_terminal() {
        return;
    }
    state.slot.release();
    state.phase = Phase::Destroyed;
    tracing::debug!("Destroyed {} ad {}", entry.kind(), entry.handle());
}

#[cfg(test)]
mod tests {
    use super::*;
    use adbridge_core::{AdKind, AdRequest};
    use std::sync::Weak;

    use adbridge_platform::testing::{CloseOnShow, FakeActivity, FakeAdNative};
    use adbridge_platform::AdNative;

    use crate::registry::Handle;

    struct Silent;

    impl AdInteractionListener for Silent {
        fn on_ad_show(&self) {}
        fn on_ad_close(&self) {}
        fn on_ad_click(&self) {}
    }

    /// Closes or destroys its entry right where the SDK reports close
    struct ClosesEntry {
        entry: Weak<AdEntry>,
        destroy: bool,
    }

    impl AdInteractionListener for ClosesEntry {
        fn on_ad_show(&self) {}
        fn on_ad_click(&self) {}

        fn on_ad_close(&self) {
            if let Some(entry) = self.entry.upgrade() {
                if self.destroy {
                    destroy(&entry);
                } else {
                    close(&entry);
                }
            }
        }
    }

    fn closes(entry: &Arc<AdEntry>, destroy: bool) -> Arc<ClosesEntry> {
        Arc::new(ClosesEntry {
            entry: Arc::downgrade(entry),
            destroy,
        })
    }

    fn loaded_banner(native: &FakeAdNative) -> Slot {
        let slot = Arc::new(parking_lot::Mutex::new(None));
        let out = Arc::clone(&slot);
        native
            .load_banner_ad(
                &AdRequest::default(),
                Box::new(move |result: Result<Box<dyn BannerAd>, SdkFailure>| {
                    *out.lock() = result.ok().map(Slot::Banner);
                }),
            )
            .unwrap();
        let loaded = slot.lock().take();
        loaded.unwrap()
    }

    fn loaded_reward(native: &FakeAdNative) -> Slot {
        let slot = Arc::new(parking_lot::Mutex::new(None));
        let out = Arc::clone(&slot);
        native
            .load_reward_video_ad(
                &AdRequest::default(),
                Box::new(move |result: Result<Box<dyn RewardVideoAd>, SdkFailure>| {
                    *out.lock() = result.ok().map(Slot::RewardVideo);
                }),
            )
            .unwrap();
        let loaded = slot.lock().take();
        loaded.unwrap()
    }

    fn registered(registry: &HandleRegistry, kind: AdKind) -> Arc<AdEntry> {
        let entry = Arc::new(AdEntry::new(Handle::new(), kind));
        registry.insert(Arc::clone(&entry));
        entry
    }

    #[test]
    fn test_banner_show_uses_placement_defaults() {
        let native = FakeAdNative::new();
        let registry = HandleRegistry::new();
        let entry = registered(&registry, AdKind::Banner);
        install(&registry, &entry, Ok(loaded_banner(&native)), Arc::new(Silent)).unwrap();

        let activity = FakeActivity::new();
        present(&entry, &activity, None).unwrap();
        let options = ConfigMap::new().with("banner_baseline", 0).with("banner_offset", "24");
        present(&entry, &activity, Some(&options)).unwrap();

        let probe = native.last_probe().unwrap();
        assert_eq!(
            probe.banner_shows(),
            vec![(BannerAlignment::Bottom, 0), (BannerAlignment::Top, 24)]
        );
        assert!(probe.options().is_empty());
        assert_eq!(entry.phase(), Phase::Shown);
    }

    #[test]
    fn test_show_options_reach_set_setters() {
        let native = FakeAdNative::new();
        let registry = HandleRegistry::new();
        let entry = registered(&registry, AdKind::RewardVideo);
        install(&registry, &entry, Ok(loaded_reward(&native)), Arc::new(Silent)).unwrap();

        let options = ConfigMap::new()
            .with("mute", true)
            .with("Orientation", "2")
            .with("user_data", 99)
            .with("unknown_option", 1);
        present(&entry, &FakeActivity::new(), Some(&options)).unwrap();

        let probe = native.last_probe().unwrap();
        assert_eq!(
            probe.options(),
            vec![
                ("setMute".to_string(), Arg::Bool(true)),
                ("setOrientation".to_string(), Arg::I32(2)),
                ("setUserData".to_string(), Arg::Str("99".into())),
            ]
        );
        assert_eq!(options.len(), 4);
    }

    #[test]
    fn test_failed_load_keeps_entry() {
        let registry = HandleRegistry::new();
        let entry = registered(&registry, AdKind::Interstitial);
        let err = install(&registry, &entry, Err(SdkFailure::new(-1, "no fill")), Arc::new(Silent))
            .unwrap_err();
        assert_eq!(err.code(), "-1");
        assert_eq!(entry.phase(), Phase::Failed);
        assert!(registry.contains(entry.handle().as_str()));
        assert!(!is_valid(&entry));
    }

    #[test]
    fn test_late_load_is_released() {
        let native = FakeAdNative::new();
        let registry = HandleRegistry::new();
        let entry = registered(&registry, AdKind::Banner);
        registry.remove(entry.handle().as_str());

        let err = install(&registry, &entry, Ok(loaded_banner(&native)), Arc::new(Silent)).unwrap_err();
        assert_eq!(err.code(), "destroyed");
        assert_eq!(native.last_probe().unwrap().destroys(), 1);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let native = FakeAdNative::new();
        let registry = HandleRegistry::new();
        let entry = registered(&registry, AdKind::RewardVideo);
        install(&registry, &entry, Ok(loaded_reward(&native)), Arc::new(Silent)).unwrap();

        destroy(&entry);
        destroy(&entry);

        let probe = native.last_probe().unwrap();
        assert_eq!(probe.destroys(), 1);
        assert!(!probe.has_listener());
        assert_eq!(entry.phase(), Phase::Destroyed);
        assert!(present(&entry, &FakeActivity::new(), None).is_err());
    }

    #[test]
    fn test_validity_follows_the_sdk() {
        let native = FakeAdNative::new();
        let registry = HandleRegistry::new();
        let entry = registered(&registry, AdKind::RewardVideo);
        install(&registry, &entry, Ok(loaded_reward(&native)), Arc::new(Silent)).unwrap();

        assert!(is_valid(&entry));
        native.last_probe().unwrap().set_valid(false);
        assert!(!is_valid(&entry));
    }

    #[test]
    fn test_close_inside_show_keeps_the_entry_usable() {
        let native = FakeAdNative::new();
        let registry = HandleRegistry::new();
        let entry = registered(&registry, AdKind::RewardVideo);
        install(&registry, &entry, Ok(loaded_reward(&native)), closes(&entry, false)).unwrap();
        let probe = native.last_probe().unwrap();
        probe.set_close_on_show(CloseOnShow::SameThread);

        let activity = FakeActivity::new();
        present(&entry, &activity, None).unwrap();
        assert_eq!(entry.phase(), Phase::Closed);
        assert!(is_valid(&entry));

        probe.set_close_on_show(CloseOnShow::Never);
        present(&entry, &activity, None).unwrap();
        assert_eq!(entry.phase(), Phase::Shown);
        assert_eq!(probe.shows(), 2);
    }

    #[test]
    fn test_destroy_inside_show_releases_the_ad() {
        let native = FakeAdNative::new();
        let registry = HandleRegistry::new();
        let entry = registered(&registry, AdKind::RewardVideo);
        install(&registry, &entry, Ok(loaded_reward(&native)), closes(&entry, true)).unwrap();
        let probe = native.last_probe().unwrap();
        probe.set_close_on_show(CloseOnShow::SameThread);

        let err = present(&entry, &FakeActivity::new(), None).unwrap_err();
        assert_eq!(err.code(), "destroyed");
        assert_eq!(entry.phase(), Phase::Destroyed);
        assert_eq!(probe.destroys(), 1);
        assert!(!probe.has_listener());
    }

    #[test]
    fn test_failed_show_restores_the_previous_phase() {
        let native = FakeAdNative::new();
        let registry = HandleRegistry::new();
        let entry = registered(&registry, AdKind::RewardVideo);
        install(&registry, &entry, Ok(loaded_reward(&native)), Arc::new(Silent)).unwrap();
        native.last_probe().unwrap().set_fail_show(true);

        assert!(present(&entry, &FakeActivity::new(), None).is_err());
        assert_eq!(entry.phase(), Phase::Loaded);
        assert!(entry.state().slot.is_loaded());
    }
}
