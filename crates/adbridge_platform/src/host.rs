//! Host application contracts
//!
//! The bridge never owns the host's view hierarchy. It asks the [`Host`] for
//! the current [`Activity`] and, for splash ads, attaches an [`Overlay`]
//! described by an [`OverlaySpec`].

use std::sync::Arc;

use crate::error::Result;

/// Host application
pub trait Host: Send + Sync {
    /// The foreground activity, if any
    fn current_activity(&self) -> Option<Arc<dyn Activity>>;
}

/// Foreground activity of the host
pub trait Activity: Send + Sync {
    /// Attach a full-screen overlay to the activity's content root
    ///
    /// Must be called on the UI thread.
    fn attach_overlay(&self, spec: &OverlaySpec) -> Result<Box<dyn Overlay>>;
}

/// An attached overlay. Detaching twice is a no-op.
pub trait Overlay: Send {
    fn detach(&mut self);

    fn is_attached(&self) -> bool;
}

/// One axis of the centred slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    MatchParent,
    Exact(u32),
}

impl Dimension {
    /// Positive sizes are exact, anything else fills the parent
    pub fn from_requested(size: i32) -> Self {
        match u32::try_from(size) {
            Ok(px) if px > 0 => Dimension::Exact(px),
            _ => Dimension::MatchParent,
        }
    }
}

/// Layout of a splash overlay
///
/// The overlay itself always fills the content root; the ad renders into a
/// slot centred inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlaySpec {
    /// ARGB background of the overlay
    pub background: u32,
    /// Swallow touches that miss the slot
    pub clickable: bool,
    pub hardware_layer: bool,
    pub slot_width: Dimension,
    pub slot_height: Dimension,
}

impl OverlaySpec {
    /// Opaque black, clickable overlay with a centred slot
    pub fn centered(width: i32, height: i32) -> Self {
        Self {
            background: 0xFF00_0000,
            clickable: true,
            hardware_layer: true,
            slot_width: Dimension::from_requested(width),
            slot_height: Dimension::from_requested(height),
        }
    }
}
