//! Ad request construction
//!
//! Turns a host configuration map into an [`AdRequest`]. The identifying
//! field is validated first, everything else goes through the dispatcher and
//! the express size pairs are buffered until the whole map has been read.

use std::sync::LazyLock;

use crate::dispatch::{AliasTable, Dispatcher, SetterTable, Verb};
use crate::error::{BridgeError, Result};
use crate::value::{normalize_key, ConfigMap, ConfigValue};

/// Identifying field every load request must carry
pub const SPACE_ID: &str = "space_id";

/// Setter receiving the buffered express view size
pub const EXPRESS_VIEW_SETTER: &str = "withExpressViewAcceptedSize";
/// Setter receiving the buffered express image size
pub const EXPRESS_IMAGE_SETTER: &str = "withExpressImageAcceptedSize";

/// Placeholder for the missing half of a size pair
const UNSET_DIMENSION: i32 = -1;

/// A fully built request handed to the SDK
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdRequest {
    pub space_id: i64,
    pub user_id: Option<String>,
    pub reward_name: Option<String>,
    pub reward_amount: Option<i32>,
    pub query: Option<String>,
    pub extra1: Option<String>,
    pub mina_id: Option<String>,
    pub express_view_size: Option<(i32, i32)>,
    pub express_image_size: Option<(i32, i32)>,
}

/// Mutable builder the setter table writes into
#[derive(Debug, Default)]
pub struct AdRequestBuilder {
    request: AdRequest,
}

impl AdRequestBuilder {
    pub fn new(space_id: i64) -> Self {
        Self {
            request: AdRequest {
                space_id,
                ..AdRequest::default()
            },
        }
    }

    pub fn build(self) -> AdRequest {
        self.request
    }
}

static REQUEST_SETTERS: LazyLock<SetterTable<AdRequestBuilder>> = LazyLock::new(|| {
    SetterTable::<AdRequestBuilder>::new()
        .with_i64("withSpaceId", |b, v| {
            b.request.space_id = v;
            Ok(())
        })
        .with_str("withUserId", |b, v| {
            b.request.user_id = Some(v);
            Ok(())
        })
        .with_str("withRewardName", |b, v| {
            b.request.reward_name = Some(v);
            Ok(())
        })
        .with_i32("withRewardAmount", |b, v| {
            b.request.reward_amount = Some(v);
            Ok(())
        })
        .with_str("withQuery", |b, v| {
            b.request.query = Some(v);
            Ok(())
        })
        .with_str("withExtra1", |b, v| {
            b.request.extra1 = Some(v);
            Ok(())
        })
        .with_str("withMinaId", |b, v| {
            b.request.mina_id = Some(v);
            Ok(())
        })
        .with_int_pair(EXPRESS_VIEW_SETTER, |b, w, h| {
            b.request.express_view_size = Some((w, h));
            Ok(())
        })
        .with_int_pair(EXPRESS_IMAGE_SETTER, |b, w, h| {
            b.request.express_image_size = Some((w, h));
            Ok(())
        })
});

static REQUEST_DISPATCHER: LazyLock<Dispatcher> = LazyLock::new(|| {
    Dispatcher::new(
        AliasTable::new(&[
            ("space_id", "withSpaceId"),
            ("extra1", "withExtra1"),
            ("user_id", "withUserId"),
            ("reward_name", "withRewardName"),
            ("reward_amount", "withRewardAmount"),
            ("query", "withQuery"),
            ("express_width", EXPRESS_VIEW_SETTER),
            ("express_height", EXPRESS_VIEW_SETTER),
            ("express_view_width", EXPRESS_VIEW_SETTER),
            ("express_view_height", EXPRESS_VIEW_SETTER),
            ("express_image_width", EXPRESS_IMAGE_SETTER),
            ("express_image_height", EXPRESS_IMAGE_SETTER),
            ("mina_id", "withMinaId"),
        ]),
        Verb::With,
    )
});

/// The dispatcher used for request fields
pub fn request_dispatcher() -> &'static Dispatcher {
    &REQUEST_DISPATCHER
}

/// Result of [`build_request`]
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRequest {
    pub request: AdRequest,
    /// Express view size as applied, remembered by splash entries
    pub express_view_size: Option<(i32, i32)>,
}

#[derive(Default)]
struct SizePair {
    width: Option<i32>,
    height: Option<i32>,
}

impl SizePair {
    fn resolve(&self) -> Option<(i32, i32)> {
        if self.width.is_none() && self.height.is_none() {
            return None;
        }
        Some((
            self.width.unwrap_or(UNSET_DIMENSION),
            self.height.unwrap_or(UNSET_DIMENSION),
        ))
    }
}

/// Build a request from a host configuration map
///
/// `id_field` names the identifying key, normally [`SPACE_ID`]. The map must
/// be present and the id must parse to a positive integer. Unknown keys are
/// dropped with a debug log.
pub fn build_request(id_field: &str, extras: Option<&ConfigMap>) -> Result<BuiltRequest> {
    let extras = extras.ok_or_else(BridgeError::missing_config)?;

    let id_key = normalize_key(id_field);
    let space_id = extras
        .find(&id_key)
        .and_then(ConfigValue::as_i64)
        .filter(|id| *id > 0)
        .ok_or_else(|| BridgeError::invalid_space_id(id_field))?;

    let mut builder = AdRequestBuilder::new(space_id);
    let mut view = SizePair::default();
    let mut image = SizePair::default();
    let dispatcher = request_dispatcher();

    for (key, value) in extras.iter() {
        let key = normalize_key(key);
        if key == id_key || value.is_empty() {
            continue;
        }

        match key.as_str() {
            "express_width" | "express_view_width" => view.width = value.as_i32(),
            "express_height" | "express_view_height" => view.height = value.as_i32(),
            "express_image_width" => image.width = value.as_i32(),
            "express_image_height" => image.height = value.as_i32(),
            _ => {
                dispatcher.apply(&mut REQUEST_SETTERS.bind(&mut builder), &key, value);
            }
        }
    }

    let express_view_size = view.resolve();
    if let Some((w, h)) = express_view_size {
        dispatcher.apply_pair(&mut REQUEST_SETTERS.bind(&mut builder), EXPRESS_VIEW_SETTER, w, h);
    }
    if let Some((w, h)) = image.resolve() {
        dispatcher.apply_pair(&mut REQUEST_SETTERS.bind(&mut builder), EXPRESS_IMAGE_SETTER, w, h);
    }

    tracing::debug!("Built ad request for space {}", space_id);

    Ok(BuiltRequest {
        request: builder.build(),
        express_view_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CODE_INVALID_REQUEST, CODE_INVALID_SPACE_ID};

    fn map(json: &str) -> ConfigMap {
        ConfigMap::from_json(json).unwrap()
    }

    #[test]
    fn test_missing_map_is_invalid_request() {
        let err = build_request(SPACE_ID, None).unwrap_err();
        assert_eq!(err.code(), CODE_INVALID_REQUEST);
    }

    #[test]
    fn test_space_id_validation() {
        for json in [
            r#"{}"#,
            r#"{"space_id": 0}"#,
            r#"{"space_id": -5}"#,
            r#"{"space_id": "abc"}"#,
            r#"{"space_id": null}"#,
        ] {
            let err = build_request(SPACE_ID, Some(&map(json))).unwrap_err();
            assert_eq!(err.code(), CODE_INVALID_SPACE_ID, "{}", json);
        }
    }

    #[test]
    fn test_space_id_accepts_string_and_mixed_case_key() {
        let built = build_request(SPACE_ID, Some(&map(r#"{" Space_Id ": "1001"}"#))).unwrap();
        assert_eq!(built.request.space_id, 1001);
    }

    #[test]
    fn test_fields_are_dispatched() {
        let built = build_request(
            SPACE_ID,
            Some(&map(
                r#"{"space_id": 42, "user_id": 7, "reward_name": "coins", "reward_amount": "50", "query": "", "mystery": 1}"#,
            )),
        )
        .unwrap();

        let request = built.request;
        assert_eq!(request.space_id, 42);
        assert_eq!(request.user_id.as_deref(), Some("7"));
        assert_eq!(request.reward_name.as_deref(), Some("coins"));
        assert_eq!(request.reward_amount, Some(50));
        assert_eq!(request.query, None);
    }

    #[test]
    fn test_express_sizes_are_paired() {
        let built = build_request(
            SPACE_ID,
            Some(&map(
                r#"{"space_id": 1, "express_width": 320, "express_image_height": "90"}"#,
            )),
        )
        .unwrap();

        assert_eq!(built.express_view_size, Some((320, -1)));
        assert_eq!(built.request.express_view_size, Some((320, -1)));
        assert_eq!(built.request.express_image_size, Some((-1, 90)));
    }

    #[test]
    fn test_no_express_keys_leaves_sizes_unset() {
        let built = build_request(SPACE_ID, Some(&map(r#"{"space_id": 1}"#))).unwrap();
        assert_eq!(built.express_view_size, None);
        assert_eq!(built.request.express_image_size, None);
    }
}
