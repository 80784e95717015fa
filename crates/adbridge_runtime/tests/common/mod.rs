//! Shared fixture for bridge integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use adbridge_core::{BridgeError, RewardPayload};
use adbridge_platform::testing::{FakeHost, FakeSdk, RecordingSink};
use adbridge_platform::UiThread;
use adbridge_runtime::{AutoRewardListener, BridgeConfig, LoadListener, MediationBridge};
use parking_lot::Mutex;

pub const FLUSH: Duration = Duration::from_secs(2);

pub struct Fixture {
    pub sdk: Arc<FakeSdk>,
    pub host: Arc<FakeHost>,
    pub sink: Arc<RecordingSink>,
    pub bridge: MediationBridge,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(BridgeConfig::default(), None)
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_ui(ui: Arc<dyn UiThread>) -> Self {
        Self::build(BridgeConfig::default(), Some(ui))
    }

    fn build(config: BridgeConfig, ui: Option<Arc<dyn UiThread>>) -> Self {
        let sdk = Arc::new(FakeSdk::new());
        let host = Arc::new(FakeHost::new());
        let sink = Arc::new(RecordingSink::new());

        let mut builder = MediationBridge::builder(sdk.clone(), host.clone(), sink.clone()).config(config);
        if let Some(ui) = ui {
            builder = builder.ui_thread(ui);
        }
        let bridge = builder.build().unwrap();

        Self {
            sdk,
            host,
            sink,
            bridge,
        }
    }

    pub fn flush(&self) {
        assert!(self.bridge.flush(FLUSH), "UI thread did not drain");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success,
    Error { code: String, message: String },
}

#[derive(Default)]
pub struct RecordingListener {
    outcomes: Mutex<Vec<Outcome>>,
    threads: Mutex<Vec<std::thread::ThreadId>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().clone()
    }

    pub fn error_codes(&self) -> Vec<String> {
        self.outcomes()
            .into_iter()
            .filter_map(|outcome| match outcome {
                Outcome::Error { code, .. } => Some(code),
                Outcome::Success => None,
            })
            .collect()
    }

    pub fn threads(&self) -> Vec<std::thread::ThreadId> {
        self.threads.lock().clone()
    }

    pub fn as_listener(self: &Arc<Self>) -> Option<Arc<dyn LoadListener>> {
        Some(self.clone() as Arc<dyn LoadListener>)
    }
}

impl LoadListener for RecordingListener {
    fn on_success(&self) {
        self.threads.lock().push(std::thread::current().id());
        self.outcomes.lock().push(Outcome::Success);
    }

    fn on_error(&self, error: &BridgeError) {
        self.threads.lock().push(std::thread::current().id());
        self.outcomes.lock().push(Outcome::Error {
            code: error.code(),
            message: error.message(),
        });
    }
}

#[derive(Default)]
pub struct AutoRecorder {
    calls: Mutex<Vec<String>>,
}

impl AutoRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl AutoRewardListener for AutoRecorder {
    fn on_error(&self, error: &BridgeError) {
        self.calls.lock().push(format!("error:{}", error.code()));
    }

    fn on_ad_show(&self) {
        self.calls.lock().push("show".to_string());
    }

    fn on_ad_close(&self) {
        self.calls.lock().push("close".to_string());
    }

    fn on_reward_verify(&self, reward: &RewardPayload) {
        self.calls
            .lock()
            .push(format!("reward:{}:{}", reward.reward_amount, reward.reward_name));
    }

    fn on_ad_click(&self) {
        self.calls.lock().push("click".to_string());
    }
}
