//! Handle registry
//!
//! The scripting host only ever sees an opaque string [`Handle`]. The
//! registry maps each live handle to its [`AdEntry`], which owns at most one
//! loaded ad of the kind fixed at creation.
//!
//! The registry map is shared by every thread. Entry state sits behind a
//! per-entry mutex and is only mutated from the UI thread.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use adbridge_core::AdKind;
use adbridge_platform::{
    AdInteractionListener, AdResource, BannerAd, InterstitialAd, Overlay, RewardVideoAd, SplashAd,
};
use parking_lot::{Mutex, MutexGuard, RwLock};
use rustc_hash::FxHashMap;
use uuid::Uuid;

// ============================================================================
// Handle
// ============================================================================

/// Opaque, globally unique ad handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(String);

impl Handle {
    /// Mint a fresh handle
    pub fn new() -> Self {
        Handle(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl Borrow<str> for Handle {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Entry
// ============================================================================

/// Lifecycle phase of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Registered, load not started yet
    Pending,
    /// Load call issued to the SDK
    Loading,
    Loaded,
    /// The ad is out of its slot while the SDK shows it
    Showing,
    Shown,
    Closed,
    /// The SDK reported a load error
    Failed,
    Destroyed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        self == Phase::Destroyed
    }
}

/// The loaded ad, tagged by kind
#[derive(Default)]
pub enum Slot {
    #[default]
    Empty,
    RewardVideo(Box<dyn RewardVideoAd>),
    Interstitial(Box<dyn InterstitialAd>),
    Banner(Box<dyn BannerAd>),
    Splash {
        ad: Box<dyn SplashAd>,
        overlay: Option<Box<dyn Overlay>>,
    },
}

impl Slot {
    pub fn kind(&self) -> Option<AdKind> {
        match self {
            Slot::Empty => None,
            Slot::RewardVideo(_) => Some(AdKind::RewardVideo),
            Slot::Interstitial(_) => Some(AdKind::Interstitial),
            Slot::Banner(_) => Some(AdKind::Banner),
            Slot::Splash { .. } => Some(AdKind::Splash),
        }
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(self, Slot::Empty)
    }

    pub fn set_listener(&mut self, listener: Option<Arc<dyn AdInteractionListener>>) {
        match self {
            Slot::Empty => {}
            Slot::RewardVideo(ad) => ad.set_interaction_listener(listener),
            Slot::Interstitial(ad) => ad.set_interaction_listener(listener),
            Slot::Banner(ad) => ad.set_interaction_listener(listener),
            Slot::Splash { ad, .. } => ad.set_interaction_listener(listener),
        }
    }

    /// Detach the splash overlay if one is attached
    pub fn detach_overlay(&mut self) -> bool {
        match self {
            Slot::Splash { overlay, .. } => match overlay.take() {
                Some(mut attached) => {
                    attached.detach();
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    pub fn has_overlay(&self) -> bool {
        matches!(self, Slot::Splash { overlay: Some(_), .. })
    }

    /// Release the ad and leave the slot empty
    pub fn release(&mut self) {
        self.detach_overlay();
        match std::mem::take(self) {
            Slot::Empty => {}
            Slot::RewardVideo(mut ad) => release_ad(ad.as_mut()),
            Slot::Interstitial(mut ad) => release_ad(ad.as_mut()),
            Slot::Banner(mut ad) => release_ad(ad.as_mut()),
            Slot::Splash { mut ad, .. } => release_ad(ad.as_mut()),
        }
    }
}

fn release_ad<R: AdResource + ?Sized>(ad: &mut R) {
    ad.set_interaction_listener(None);
    ad.destroy();
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "Slot({})", kind),
            None => f.write_str("Slot(empty)"),
        }
    }
}

/// Mutable part of an entry
#[derive(Debug)]
pub struct EntryState {
    pub phase: Phase,
    pub slot: Slot,
}

/// One registered ad
pub struct AdEntry {
    handle: Handle,
    kind: AdKind,
    /// Requested splash slot size, `(-1, -1)` when unspecified
    splash_size: (i32, i32),
    state: Mutex<EntryState>,
}

impl AdEntry {
    pub fn new(handle: Handle, kind: AdKind) -> Self {
        Self {
            handle,
            kind,
            splash_size: (-1, -1),
            state: Mutex::new(EntryState {
                phase: Phase::Pending,
                slot: Slot::Empty,
            }),
        }
    }

    pub fn with_splash_size(mut self, size: Option<(i32, i32)>) -> Self {
        if let Some(size) = size {
            self.splash_size = size;
        }
        self
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn kind(&self) -> AdKind {
        self.kind
    }

    pub fn splash_size(&self) -> (i32, i32) {
        self.splash_size
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn state(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock()
    }

    /// Store a loaded ad. The slot kind must match the entry kind; a
    /// mismatched slot is handed back untouched.
    pub fn install(&self, slot: Slot) -> Result<(), Slot> {
        if slot.kind() != Some(self.kind) {
            return Err(slot);
        }
        let mut state = self.state.lock();
        if state.phase.is_terminal() {
            return Err(slot);
        }
        state.slot = slot;
        state.phase = Phase::Loaded;
        Ok(())
    }
}

impl fmt::Debug for AdEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdEntry")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("phase", &self.state.try_lock().map(|state| state.phase))
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Concurrent handle to entry map
#[derive(Default)]
pub struct HandleRegistry {
    entries: RwLock<FxHashMap<Handle, Arc<AdEntry>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: Arc<AdEntry>) {
        let handle = entry.handle().clone();
        self.entries.write().insert(handle, entry);
    }

    pub fn get(&self, handle: &str) -> Option<Arc<AdEntry>> {
        self.entries.read().get(handle).cloned()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.entries.read().contains_key(handle)
    }

    /// Remove an entry. Only the first removal of a handle returns it.
    pub fn remove(&self, handle: &str) -> Option<Arc<AdEntry>> {
        self.entries.write().remove(handle)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn handles(&self) -> Vec<Handle> {
        self.entries.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_handles_are_unique_uuids() {
        let handles: HashSet<String> = (0..1000).map(|_| Handle::new().into_string()).collect();
        assert_eq!(handles.len(), 1000);
        for handle in handles.iter().take(3) {
            assert!(Uuid::parse_str(handle).is_ok());
        }
    }

    #[test]
    fn test_remove_happens_once() {
        let registry = HandleRegistry::new();
        let entry = Arc::new(AdEntry::new(Handle::new(), AdKind::Banner));
        let handle = entry.handle().to_string();
        registry.insert(entry);

        assert!(registry.contains(&handle));
        assert!(registry.remove(&handle).is_some());
        assert!(registry.remove(&handle).is_none());
        assert!(registry.get(&handle).is_none());
    }

    #[test]
    fn test_concurrent_inserts() {
        let registry = Arc::new(HandleRegistry::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        registry.insert(Arc::new(AdEntry::new(Handle::new(), AdKind::Interstitial)));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(registry.len(), 800);
    }

    #[test]
    fn test_install_rejects_wrong_kind() {
        let entry = AdEntry::new(Handle::new(), AdKind::Banner);
        assert!(entry.install(Slot::Empty).is_err());
        assert_eq!(entry.phase(), Phase::Pending);
    }

    #[test]
    fn test_splash_size_defaults_to_unset() {
        let entry = AdEntry::new(Handle::new(), AdKind::Splash);
        assert_eq!(entry.splash_size(), (-1, -1));
        let entry = AdEntry::new(Handle::new(), AdKind::Splash).with_splash_size(Some((640, -1)));
        assert_eq!(entry.splash_size(), (640, -1));
    }
}
