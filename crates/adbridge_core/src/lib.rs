//! Adbridge Core
//!
//! Platform-independent pieces of the mediation bridge:
//!
//! - **Values**: untyped configuration scalars and the coercion engine
//! - **Dispatch**: setter tables, alias resolution and the field dispatcher
//! - **Requests**: validated ad request construction from a configuration map
//! - **Events**: the JSON event channel back to the scripting host
//!
//! # Example
//!
//! ```rust
//! use adbridge_core::{build_request, ConfigMap, SPACE_ID};
//!
//! let extras = ConfigMap::from_json(r#"{"space_id": "1001", "user_id": 7}"#).unwrap();
//! let built = build_request(SPACE_ID, Some(&extras)).unwrap();
//!
//! assert_eq!(built.request.space_id, 1001);
//! assert_eq!(built.request.user_id.as_deref(), Some("7"));
//! ```

pub mod dispatch;
pub mod error;
pub mod event;
pub mod request;
pub mod value;

pub use dispatch::{
    to_pascal_case, AliasTable, Dispatcher, SetterError, SetterResult, SetterTable, SetterTarget,
    Verb,
};
pub use error::{BridgeError, Result};
pub use event::{
    AdKind, EventEmitter, EventKind, EventRecord, EventSink, RewardPayload, SinkAddress, SinkError,
};
pub use request::{build_request, AdRequest, AdRequestBuilder, BuiltRequest, SPACE_ID};
pub use value::{candidates, coerce, normalize_key, Arg, ArgKind, ConfigMap, ConfigValue};
