//! Listener types
//!
//! [`LoadListener`] and [`AutoRewardListener`] are what bridge callers
//! implement. The crate-internal listeners adapt SDK callbacks to events and
//! to those caller listeners.

use std::sync::{Arc, Weak};

use adbridge_core::{AdKind, BridgeError, EventEmitter, EventKind, RewardPayload};
use adbridge_platform::{
    AdInteractionListener, AutoRewardAdListener, RewardVerification, SdkFailure, UiThread,
};

use crate::lifecycle;
use crate::registry::AdEntry;

/// Outcome of an asynchronous load or initialization
///
/// Load results are delivered on the UI thread.
pub trait LoadListener: Send + Sync {
    fn on_success(&self);

    /// `error.code()` and `error.message()` carry the wire representation
    fn on_error(&self, error: &BridgeError);
}

/// Callbacks of [`MediationBridge::show_auto_reward_ad`](crate::MediationBridge::show_auto_reward_ad)
pub trait AutoRewardListener: Send + Sync {
    fn on_error(&self, error: &BridgeError);

    fn on_ad_show(&self);

    fn on_ad_close(&self);

    fn on_reward_verify(&self, reward: &RewardPayload);

    fn on_ad_click(&self);
}

/// Report a failure to an optional listener
pub(crate) fn report(listener: Option<&Arc<dyn LoadListener>>, error: BridgeError) {
    tracing::warn!("{} ({})", error, error.code());
    if let Some(listener) = listener {
        listener.on_error(&error);
    }
}

pub(crate) fn reward_payload(verification: RewardVerification) -> RewardPayload {
    RewardPayload {
        reward_verify: verification.verified,
        reward_amount: verification.amount,
        reward_name: verification.name.unwrap_or_default(),
        code: verification.code,
        message: verification.message.unwrap_or_default(),
    }
}

/// Re-emits SDK interaction callbacks of one entry as host events
pub(crate) struct EntryListener {
    handle: String,
    kind: AdKind,
    entry: Weak<AdEntry>,
    emitter: EventEmitter,
    ui: Arc<dyn UiThread>,
}

impl EntryListener {
    pub(crate) fn new(entry: &Arc<AdEntry>, emitter: EventEmitter, ui: Arc<dyn UiThread>) -> Self {
        Self {
            handle: entry.handle().to_string(),
            kind: entry.kind(),
            entry: Arc::downgrade(entry),
            emitter,
            ui,
        }
    }

    fn emit(&self, kind: EventKind, data: Option<RewardPayload>) {
        self.emitter.emit(&self.handle, kind, self.kind, data);
    }
}

impl AdInteractionListener for EntryListener {
    fn on_ad_show(&self) {
        self.emit(EventKind::Show, None);
    }

    fn on_ad_close(&self) {
        self.emit(EventKind::Close, None);

        // Entry state is only touched on the UI thread
        let entry = self.entry.clone();
        let close = move || {
            if let Some(entry) = entry.upgrade() {
                lifecycle::close(&entry);
            }
        };
        if self.ui.is_current() {
            close();
        } else if let Err(e) = self.ui.post(Box::new(close)) {
            tracing::warn!("Failed to post close of {}: {}", self.handle, e);
        }
    }

    fn on_ad_click(&self) {
        self.emit(EventKind::Click, None);
    }

    fn on_reward_verify(&self, verification: RewardVerification) {
        self.emit(EventKind::Reward, Some(reward_payload(verification)));
    }
}

/// Forwards SDK auto-reward callbacks to the caller's listener
pub(crate) struct AutoRewardRelay {
    listener: Arc<dyn AutoRewardListener>,
}

impl AutoRewardRelay {
    pub(crate) fn new(listener: Arc<dyn AutoRewardListener>) -> Self {
        Self { listener }
    }
}

impl AdInteractionListener for AutoRewardRelay {
    fn on_ad_show(&self) {
        self.listener.on_ad_show();
    }

    fn on_ad_close(&self) {
        self.listener.on_ad_close();
    }

    fn on_ad_click(&self) {
        self.listener.on_ad_click();
    }

    fn on_reward_verify(&self, verification: RewardVerification) {
        self.listener.on_reward_verify(&reward_payload(verification));
    }
}

impl AutoRewardAdListener for AutoRewardRelay {
    fn on_error(&self, failure: SdkFailure) {
        self.listener.on_error(&BridgeError::from(failure));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_payload_fills_missing_text() {
        let payload = reward_payload(RewardVerification {
            verified: true,
            amount: 5,
            name: None,
            code: 0,
            message: None,
        });
        assert!(payload.reward_verify);
        assert_eq!(payload.reward_amount, 5);
        assert_eq!(payload.reward_name, "");
        assert_eq!(payload.message, "");
    }
}
