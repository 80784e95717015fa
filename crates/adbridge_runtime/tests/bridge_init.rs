//! Initialization, auto reward and misc bridge calls

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use adbridge_core::{AdRequest, ConfigMap};
use adbridge_platform::testing::InitBehavior;
use adbridge_platform::{
    AdInteractionListener, AutoRewardAdListener, InitParams, RewardVerification, SdkFailure,
};
use adbridge_runtime::{call_blocking, BridgeConfig, ConfinedThread, SDK_VERSION_FALLBACK};
use common::{AutoRecorder, Fixture, Outcome, RecordingListener};

fn params() -> InitParams {
    InitParams {
        app_id: "20001".to_string(),
        channel: Some("store".to_string()),
        sub_channel: Some("beta".to_string()),
        enable_log: true,
        ..Default::default()
    }
}

fn quick_init() -> BridgeConfig {
    BridgeConfig {
        init_timeout_ms: 50,
        ..Default::default()
    }
}

#[test]
fn test_initialize_success() {
    let fx = Fixture::new();
    assert!(fx.bridge.initialize(&params()));

    let config = fx.sdk.last_config().unwrap();
    assert_eq!(config.media_id, 20001);
    assert_eq!(config.channel.as_deref(), Some("store"));
    assert_eq!(config.data.as_deref(), Some(r#"{"sub_channel":"beta"}"#));
    assert!(config.enable_log);
}

#[test]
fn test_initialize_failure_and_timeout_return_false() {
    let fx = Fixture::with_config(quick_init());

    fx.sdk.set_init(InitBehavior::Fail(SdkFailure::new(40001, "bad key")));
    assert!(!fx.bridge.initialize(&params()));

    fx.sdk.set_init(InitBehavior::Reject("boom".to_string()));
    assert!(!fx.bridge.initialize(&params()));

    fx.sdk.set_init(InitBehavior::Never);
    assert!(!fx.bridge.initialize(&params()));
    assert_eq!(fx.sdk.init_calls(), 3);
}

#[test]
fn test_initialize_without_activity() {
    let fx = Fixture::new();
    fx.host.set_activity(None);
    assert!(!fx.bridge.initialize(&params()));
    assert_eq!(fx.sdk.init_calls(), 0);

    let listener = RecordingListener::new();
    fx.bridge.initialize_async(params(), listener.as_listener());
    assert_eq!(listener.error_codes(), vec!["activity_null"]);
}

#[test]
fn test_initialize_on_the_ui_thread_goes_async() {
    let ui = Arc::new(ConfinedThread::spawn("adbridge-init-ui").unwrap());
    let fx = Fixture::with_ui(ui.clone());
    fx.sdk.set_init(InitBehavior::Never);

    let bridge = fx.bridge.clone();
    let result = call_blocking(ui.as_ref(), Duration::from_secs(1), move || {
        bridge.initialize(&params())
    });
    fx.flush();

    assert_eq!(result, Some(true));
    assert_eq!(fx.sdk.init_calls(), 1);
}

#[test]
fn test_initialize_async_success() {
    let fx = Fixture::new();
    let listener = RecordingListener::new();
    fx.bridge.initialize_async(params(), listener.as_listener());
    fx.flush();
    assert_eq!(listener.outcomes(), vec![Outcome::Success]);
}

#[test]
fn test_initialize_async_reports_sdk_failure_once() {
    let fx = Fixture::with_config(quick_init());
    fx.sdk.set_init(InitBehavior::Fail(SdkFailure::new(7, "denied")));
    let listener = RecordingListener::new();

    fx.bridge.initialize_async(params(), listener.as_listener());
    thread::sleep(Duration::from_millis(150));
    fx.flush();

    assert_eq!(
        listener.outcomes(),
        vec![Outcome::Error {
            code: "7".to_string(),
            message: "denied".to_string()
        }]
    );
}

#[test]
fn test_initialize_async_timeout_wins_over_late_success() {
    let fx = Fixture::with_config(quick_init());
    fx.sdk.set_init(InitBehavior::Never);
    let listener = RecordingListener::new();

    fx.bridge.initialize_async(params(), listener.as_listener());
    thread::sleep(Duration::from_millis(200));
    fx.flush();
    assert_eq!(listener.error_codes(), vec!["timeout"]);

    assert!(fx.sdk.complete_init(Ok(())));
    fx.flush();
    assert_eq!(listener.outcomes().len(), 1);
}

#[test]
fn test_initialize_async_rejected_init_is_an_exception() {
    let fx = Fixture::new();
    fx.sdk.set_init(InitBehavior::Reject("no context".to_string()));
    let listener = RecordingListener::new();

    fx.bridge.initialize_async(params(), listener.as_listener());
    fx.flush();
    assert_eq!(listener.error_codes(), vec!["exception"]);
}

#[test]
fn test_auto_reward_reuses_one_factory() {
    let fx = Fixture::new();
    let recorder = AutoRecorder::new();
    let extras = ConfigMap::new()
        .with("space_id", 55)
        .with("user_id", "u-1")
        .with("reward_name", "gems");

    fx.bridge.show_auto_reward_ad(Some(&extras), recorder.clone());
    fx.bridge.show_auto_reward_ad(Some(&extras), recorder.clone());
    fx.flush();

    assert_eq!(fx.sdk.natives_created(), 1);
    let requests = fx.sdk.native().auto_requests();
    assert_eq!(requests.len(), 2);

    let expected = AdRequest {
        space_id: 55,
        user_id: Some("u-1".to_string()),
        reward_name: Some("gems".to_string()),
        ..Default::default()
    };
    assert_eq!(requests[0].0, expected);

    let relay = requests[0].1.clone();
    relay.on_ad_show();
    relay.on_reward_verify(RewardVerification {
        verified: true,
        amount: 3,
        name: Some("gems".to_string()),
        code: 0,
        message: None,
    });
    relay.on_ad_click();
    relay.on_ad_close();
    relay.on_error(SdkFailure::new(-9, "render failed"));

    assert_eq!(
        recorder.calls(),
        vec!["show", "reward:3:gems", "click", "close", "error:-9"]
    );
}

#[test]
fn test_auto_reward_validation_errors() {
    let fx = Fixture::new();
    let recorder = AutoRecorder::new();

    fx.bridge.show_auto_reward_ad(None, recorder.clone());
    fx.bridge.show_auto_reward_ad(Some(&ConfigMap::new().with("space_id", 0)), recorder.clone());
    fx.host.set_activity(None);
    fx.bridge.show_auto_reward_ad(Some(&ConfigMap::new().with("space_id", 1)), recorder.clone());
    fx.flush();

    assert_eq!(
        recorder.calls(),
        vec!["error:invalid_request", "error:invalid_space_id", "error:activity_null"]
    );
    assert!(fx.sdk.native().auto_requests().is_empty());
    assert_eq!(fx.sdk.natives_created(), 0);
}

#[test]
fn test_sdk_version_falls_back() {
    let fx = Fixture::new();
    assert_eq!(fx.bridge.sdk_version(), "1.0.0");
    fx.sdk.set_version(None);
    assert_eq!(fx.bridge.sdk_version(), SDK_VERSION_FALLBACK);
}

#[test]
fn test_permission_request_runs_on_the_ui_thread() {
    let ui = Arc::new(ConfinedThread::spawn("adbridge-permission-ui").unwrap());
    let ui_id = ui.thread_id();
    let fx = Fixture::with_ui(ui);

    fx.bridge.request_permission_if_needed();
    fx.flush();
    assert_eq!(fx.sdk.permission_requests(), vec![ui_id]);

    fx.host.set_activity(None);
    fx.bridge.request_permission_if_needed();
    fx.flush();
    assert_eq!(fx.sdk.permission_requests().len(), 1);
}
