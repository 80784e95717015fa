//! Configuration values and the coercion engine
//!
//! The scripting host hands the bridge flat JSON objects whose values are
//! untyped scalars. [`ConfigValue`] is that scalar, [`ConfigMap`] the ordered
//! object, and [`Arg`] the typed argument a setter actually receives.
//!
//! Coercion never fails loudly: a value that cannot be adapted simply yields
//! no candidates.
//!
//! ```text
//!  "300"  ──candidates──▶ [I32(300), I64(300), Str("300")]
//!  300    ──candidates──▶ [I32(300), I64(300)]
//!  2.5    ──candidates──▶ [F64(2.5), F32(2.5)]
//!  true   ──candidates──▶ [Bool(true)]
//! ```

use indexmap::IndexMap;
use smallvec::{smallvec, SmallVec};
use std::fmt;

// ============================================================================
// ConfigValue
// ============================================================================

/// Untyped scalar supplied by the host
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// JSON null, treated as "not supplied"
    Null,
    Bool(bool),
    /// Integer that fits in 32 bits
    Int(i32),
    /// Integer that needs 64 bits
    Long(i64),
    Double(f64),
    String(String),
}

impl ConfigValue {
    /// Whether the value came from the host as text
    pub fn is_textual(&self) -> bool {
        matches!(self, ConfigValue::String(_))
    }

    /// Null values and blank strings are skipped by the builders
    pub fn is_empty(&self) -> bool {
        match self {
            ConfigValue::Null => true,
            ConfigValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Textual form used for the string-setter retry
    pub fn to_text(&self) -> String {
        match self {
            ConfigValue::Null => "null".to_string(),
            ConfigValue::Bool(v) => v.to_string(),
            ConfigValue::Int(v) => v.to_string(),
            ConfigValue::Long(v) => v.to_string(),
            ConfigValue::Double(v) => format!("{:?}", v),
            ConfigValue::String(s) => s.clone(),
        }
    }

    /// Lenient i32 read used for paired size fields
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            ConfigValue::Long(v) => i32::try_from(*v).ok(),
            ConfigValue::Double(v) if v.is_finite() => Some(v.trunc() as i32),
            ConfigValue::String(s) => s.trim().parse::<i32>().ok(),
            _ => None,
        }
    }

    /// Lenient i64 read used for identifiers such as `space_id`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(i64::from(*v)),
            ConfigValue::Long(v) => Some(*v),
            ConfigValue::Double(v) if v.is_finite() => Some(v.trunc() as i64),
            ConfigValue::String(s) => {
                let trimmed = s.trim();
                trimmed.parse::<i64>().ok().or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|d| d.is_finite())
                        .map(|d| d.trunc() as i64)
                })
            }
            _ => None,
        }
    }

    /// Extract as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get type name for log messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "Null",
            ConfigValue::Bool(_) => "Bool",
            ConfigValue::Int(_) => "Int",
            ConfigValue::Long(_) => "Long",
            ConfigValue::Double(_) => "Double",
            ConfigValue::String(_) => "String",
        }
    }
}

impl From<&serde_json::Value> for ConfigValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => ConfigValue::Int(small),
                        Err(_) => ConfigValue::Long(i),
                    }
                } else {
                    ConfigValue::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => ConfigValue::String(s.clone()),
            // Nested structures travel as their JSON text
            other => ConfigValue::String(other.to_string()),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Long(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Double(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::String(v)
    }
}

// ============================================================================
// ConfigMap
// ============================================================================

/// Trim and lowercase a configuration key
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Ordered key/value blob supplied once per load or show call
///
/// Keys are stored as the host sent them; consumers normalize while reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMap {
    entries: IndexMap<String, ConfigValue>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object. Anything other than an object is rejected.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        match value {
            serde_json::Value::Object(object) => Ok(object
                .iter()
                .map(|(k, v)| (k.clone(), ConfigValue::from(v)))
                .collect()),
            other => Err(serde::de::Error::custom(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Exact-key lookup
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// Lookup comparing normalized keys, first match wins
    pub fn find(&self, normalized: &str) -> Option<&ConfigValue> {
        self.entries
            .iter()
            .find(|(k, _)| normalize_key(k) == normalized)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// Typed setter arguments
// ============================================================================

/// Argument type a setter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    I32,
    I64,
    F32,
    F64,
    Bool,
    Str,
}

/// Typed argument handed to a setter
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
}

impl Arg {
    pub fn kind(&self) -> ArgKind {
        match self {
            Arg::I32(_) => ArgKind::I32,
            Arg::I64(_) => ArgKind::I64,
            Arg::F32(_) => ArgKind::F32,
            Arg::F64(_) => ArgKind::F64,
            Arg::Bool(_) => ArgKind::Bool,
            Arg::Str(_) => ArgKind::Str,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::I32(v) => write!(f, "{}i32", v),
            Arg::I64(v) => write!(f, "{}i64", v),
            Arg::F32(v) => write!(f, "{}f32", v),
            Arg::F64(v) => write!(f, "{}f64", v),
            Arg::Bool(v) => write!(f, "{}", v),
            Arg::Str(v) => write!(f, "{:?}", v),
        }
    }
}

/// Candidate list for one value, most specific first
pub type Candidates = SmallVec<[Arg; 4]>;

// ============================================================================
// Coercion
// ============================================================================

/// Rank every typed representation of `value`
///
/// Strings try i32, then i64, then f64, and always end with the trimmed text;
/// the first numeric parse that succeeds decides the numeric candidates.
/// Numbers offer their own width plus the widened or narrowed alternative,
/// since the receiving setter's exact width is unknown to the caller.
///
/// Narrowing is lossless only: a long outside the i32 range offers no i32
/// candidate, so an int-only setter skips it rather than receiving a
/// truncated value. Doubles never become integers.
pub fn candidates(value: &ConfigValue) -> Candidates {
    match value {
        ConfigValue::Null => SmallVec::new(),
        ConfigValue::Bool(b) => smallvec![Arg::Bool(*b)],
        ConfigValue::Int(i) => smallvec![Arg::I32(*i), Arg::I64(i64::from(*i))],
        ConfigValue::Long(l) => {
            let mut out: Candidates = smallvec![Arg::I64(*l)];
            if let Ok(narrow) = i32::try_from(*l) {
                out.push(Arg::I32(narrow));
            }
            out
        }
        ConfigValue::Double(d) => smallvec![Arg::F64(*d), Arg::F32(*d as f32)],
        ConfigValue::String(s) => {
            let trimmed = s.trim();
            let mut out = Candidates::new();
            if !trimmed.is_empty() {
                if let Ok(i) = trimmed.parse::<i32>() {
                    out.push(Arg::I32(i));
                    out.push(Arg::I64(i64::from(i)));
                } else if let Ok(l) = trimmed.parse::<i64>() {
                    out.push(Arg::I64(l));
                } else if let Some(d) = trimmed.parse::<f64>().ok().filter(|d| d.is_finite()) {
                    out.push(Arg::F64(d));
                    out.push(Arg::F32(d as f32));
                }
            }
            out.push(Arg::Str(trimmed.to_string()));
            out
        }
    }
}

/// First representation of `value` matching one of `kinds`, in `kinds` order
///
/// Follows the narrowing rules of [`candidates`]; `None` when nothing fits.
pub fn coerce(value: &ConfigValue, kinds: &[ArgKind]) -> Option<Arg> {
    let ranked = candidates(value);
    kinds
        .iter()
        .find_map(|kind| ranked.iter().find(|arg| arg.kind() == *kind).cloned())
}
