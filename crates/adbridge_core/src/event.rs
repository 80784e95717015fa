//! Outbound event channel
//!
//! Ad callbacks are re-emitted to the scripting host as one JSON message per
//! event, addressed to a fixed (target, method) pair:
//!
//! ```text
//! {"handle":"…","eventName":"reward","adType":"reward","data":{"rewardVerify":true,…}}
//! ```
//!
//! Emission is synchronous and best-effort. Nothing is queued and a failing
//! sink only produces a warning.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Kinds
// ============================================================================

/// Lifecycle event reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Show,
    Close,
    Click,
    Reward,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Show => "show",
            EventKind::Close => "close",
            EventKind::Click => "click",
            EventKind::Reward => "reward",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource kind tag, fixed when an entry is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdKind {
    #[serde(rename = "reward")]
    RewardVideo,
    Interstitial,
    Banner,
    Splash,
    ExpressFeed,
    NativeFeed,
}

impl AdKind {
    pub const ALL: [AdKind; 6] = [
        AdKind::RewardVideo,
        AdKind::Interstitial,
        AdKind::Banner,
        AdKind::Splash,
        AdKind::ExpressFeed,
        AdKind::NativeFeed,
    ];

    /// Label carried in the `adType` field
    pub fn label(self) -> &'static str {
        match self {
            AdKind::RewardVideo => "reward",
            AdKind::Interstitial => "interstitial",
            AdKind::Banner => "banner",
            AdKind::Splash => "splash",
            AdKind::ExpressFeed => "express_feed",
            AdKind::NativeFeed => "native_feed",
        }
    }

    /// Numeric code used by hosts that select the kind by integer
    pub fn code(self) -> i32 {
        match self {
            AdKind::RewardVideo => 0,
            AdKind::Interstitial => 1,
            AdKind::Banner => 2,
            AdKind::Splash => 3,
            AdKind::ExpressFeed => 4,
            AdKind::NativeFeed => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.label().eq_ignore_ascii_case(label))
    }

    /// Feed kinds have labels but no loader
    pub fn is_loadable(self) -> bool {
        !matches!(self, AdKind::ExpressFeed | AdKind::NativeFeed)
    }
}

impl fmt::Display for AdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Records
// ============================================================================

/// Reward verification details attached to `reward` events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardPayload {
    pub reward_verify: bool,
    pub reward_amount: i32,
    pub reward_name: String,
    pub code: i32,
    pub message: String,
}

/// One message sent to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub handle: String,
    pub event_name: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_type: Option<AdKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RewardPayload>,
}

// ============================================================================
// Sink
// ============================================================================

/// Errors from the host-side sink
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("event sink unavailable: {0}")]
    Unavailable(String),

    #[error("event sink rejected message: {0}")]
    Rejected(String),
}

/// Host-side receiver of serialized events
pub trait EventSink: Send + Sync {
    fn deliver(&self, target: &str, method: &str, message: &str) -> Result<(), SinkError>;
}

/// Fixed (target, method) address of the host receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkAddress {
    pub target: String,
    pub method: String,
}

impl Default for SinkAddress {
    fn default() -> Self {
        Self {
            target: "MediationEventReceiver".to_string(),
            method: "OnNativeEvent".to_string(),
        }
    }
}

/// Serializes events and hands them to the sink
#[derive(Clone)]
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
    address: SinkAddress,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>, address: SinkAddress) -> Self {
        Self { sink, address }
    }

    pub fn address(&self) -> &SinkAddress {
        &self.address
    }

    /// Emit one event. An empty handle is dropped silently.
    pub fn emit(&self, handle: &str, kind: EventKind, ad: AdKind, data: Option<RewardPayload>) {
        if handle.is_empty() {
            return;
        }

        self.emit_record(&EventRecord {
            handle: handle.to_string(),
            event_name: kind,
            ad_type: Some(ad),
            data,
        });
    }

    pub fn emit_record(&self, record: &EventRecord) {
        if record.handle.is_empty() {
            return;
        }

        let message = match serde_json::to_string(record) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Failed to serialize {} event: {}", record.event_name, e);
                return;
            }
        };

        if let Err(e) = self
            .sink
            .deliver(&self.address.target, &self.address.method, &message)
        {
            tracing::warn!("Failed to emit {} event for {}: {}", record.event_name, record.handle, e);
        }
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture {
        messages: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    impl EventSink for Capture {
        fn deliver(&self, target: &str, method: &str, message: &str) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Unavailable("detached".into()));
            }
            self.messages
                .lock()
                .unwrap()
                .push((target.into(), method.into(), message.into()));
            Ok(())
        }
    }

    #[test]
    fn test_emit_plain_event() {
        let sink = Arc::new(Capture::default());
        let emitter = EventEmitter::new(sink.clone(), SinkAddress::default());

        emitter.emit("h1", EventKind::Show, AdKind::Banner, None);

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        let (target, method, message) = &messages[0];
        assert_eq!(target, "MediationEventReceiver");
        assert_eq!(method, "OnNativeEvent");
        assert_eq!(message, r#"{"handle":"h1","eventName":"show","adType":"banner"}"#);
    }

    #[test]
    fn test_emit_reward_payload() {
        let sink = Arc::new(Capture::default());
        let emitter = EventEmitter::new(sink.clone(), SinkAddress::default());

        emitter.emit(
            "h2",
            EventKind::Reward,
            AdKind::RewardVideo,
            Some(RewardPayload {
                reward_verify: true,
                reward_amount: 10,
                reward_name: "coins".into(),
                code: 0,
                message: String::new(),
            }),
        );

        let messages = sink.messages.lock().unwrap();
        let value: serde_json::Value = serde_json::from_str(&messages[0].2).unwrap();
        assert_eq!(value["adType"], "reward");
        assert_eq!(value["eventName"], "reward");
        assert_eq!(value["data"]["rewardVerify"], true);
        assert_eq!(value["data"]["rewardAmount"], 10);
        assert_eq!(value["data"]["rewardName"], "coins");
        assert_eq!(value["data"]["message"], "");
    }

    #[test]
    fn test_empty_handle_is_dropped() {
        let sink = Arc::new(Capture::default());
        let emitter = EventEmitter::new(sink.clone(), SinkAddress::default());
        emitter.emit("", EventKind::Close, AdKind::Splash, None);
        assert!(sink.messages.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        let sink = Arc::new(Capture {
            fail: true,
            ..Capture::default()
        });
        let emitter = EventEmitter::new(sink, SinkAddress::default());
        emitter.emit("h3", EventKind::Click, AdKind::Interstitial, None);
    }

    #[test]
    fn test_ad_kind_labels_and_codes() {
        for kind in AdKind::ALL {
            assert_eq!(AdKind::from_label(kind.label()), Some(kind));
            assert_eq!(AdKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(AdKind::from_label(" Express_Feed "), Some(AdKind::ExpressFeed));
        assert_eq!(AdKind::from_code(9), None);
        assert!(!AdKind::NativeFeed.is_loadable());
        assert!(AdKind::Splash.is_loadable());
    }
}
