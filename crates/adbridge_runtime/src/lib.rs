//! Adbridge Runtime
//!
//! The stateful half of the bridge:
//!
//! - [`MediationBridge`]: the facade scripting hosts call into
//! - [`HandleRegistry`]: opaque handles mapped to loaded ads
//! - [`ConfinedThread`]: the UI thread every SDK interaction is confined to
//! - [`BridgeConfig`]: timeouts, event sink address and log filter
//!
//! The bridge never panics or returns errors across its public surface.
//! Failures reach the caller through a [`LoadListener`] or a `false` return.

pub mod bridge;
pub mod config;
pub mod confine;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod registry;

pub use bridge::{BuildError, MediationBridge, MediationBridgeBuilder, SDK_VERSION_FALLBACK};
pub use config::{BridgeConfig, ConfigError, CONFIG_FILE};
pub use confine::{call_blocking, oneshot, CompletionGuard, ConfinedThread, Signal, Wait};
pub use listener::{AutoRewardListener, LoadListener};
pub use logging::init_logging;
pub use registry::{AdEntry, EntryState, Handle, HandleRegistry, Phase, Slot};
