//! Dynamic setter dispatch
//!
//! Routes a `(field, value)` pair from a configuration map to a typed setter
//! on a strongly-typed target. The target exposes its setters through
//! [`SetterTarget`]; concrete builders usually back that with a
//! [`SetterTable`] of typed closures keyed by setter name and argument kind.
//!
//! # Resolution
//!
//! ```text
//! field ──normalize──▶ alias table ──hit──▶ setter name
//!                          │
//!                         miss
//!                          ▼
//!                 verb + PascalCase(field)
//! ```
//!
//! Every candidate produced by [`candidates`] is offered to the setter in
//! order. A missing signature is skipped quietly, a rejected value is logged
//! and the next candidate is tried.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;

use crate::value::{candidates, normalize_key, Arg, ArgKind, ConfigValue};

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by a single setter invocation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SetterError {
    /// No setter with this name accepts this argument kind
    #[error("no setter {setter}({kind:?})")]
    NoSuchSetter { setter: String, kind: ArgKind },

    /// The setter exists but refused the value
    #[error("{setter} rejected value: {reason}")]
    Rejected { setter: String, reason: String },
}

impl SetterError {
    pub fn no_such_setter(setter: &str, kind: ArgKind) -> Self {
        SetterError::NoSuchSetter {
            setter: setter.to_string(),
            kind,
        }
    }

    pub fn rejected(setter: &str, reason: impl Into<String>) -> Self {
        SetterError::Rejected {
            setter: setter.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result of a setter invocation
pub type SetterResult = Result<(), SetterError>;

// ============================================================================
// SetterTarget
// ============================================================================

/// Anything with named, typed setters
pub trait SetterTarget {
    /// Invoke `setter` with a single argument
    fn invoke(&mut self, setter: &str, arg: &Arg) -> SetterResult;

    /// Invoke a two-argument setter. Both arguments share one kind.
    fn invoke_pair(&mut self, setter: &str, first: &Arg, _second: &Arg) -> SetterResult {
        Err(SetterError::no_such_setter(setter, first.kind()))
    }
}

// ============================================================================
// SetterTable
// ============================================================================

type UnaryFn<T> = Box<dyn Fn(&mut T, &Arg) -> SetterResult + Send + Sync>;
type PairFn<T> = Box<dyn Fn(&mut T, &Arg, &Arg) -> SetterResult + Send + Sync>;

struct Overloads<T> {
    unary: SmallVec<[(ArgKind, UnaryFn<T>); 2]>,
    pair: SmallVec<[(ArgKind, PairFn<T>); 2]>,
}

impl<T> Default for Overloads<T> {
    fn default() -> Self {
        Self {
            unary: SmallVec::new(),
            pair: SmallVec::new(),
        }
    }
}

/// Typed setter registry for a target type
///
/// ```ignore
/// let table = SetterTable::<Builder>::new()
///     .with_i64("withSpaceId", |b, v| { b.space_id = v; Ok(()) })
///     .with_str("withUserId", |b, v| { b.user_id = Some(v); Ok(()) });
///
/// let mut builder = Builder::default();
/// table.bind(&mut builder).invoke("withSpaceId", &Arg::I64(7))?;
/// ```
pub struct SetterTable<T> {
    setters: FxHashMap<&'static str, Overloads<T>>,
}

impl<T> Default for SetterTable<T> {
    fn default() -> Self {
        Self {
            setters: FxHashMap::default(),
        }
    }
}

impl<T> SetterTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn unary(mut self, name: &'static str, kind: ArgKind, f: UnaryFn<T>) -> Self {
        self.setters.entry(name).or_default().unary.push((kind, f));
        self
    }

    fn pair(mut self, name: &'static str, kind: ArgKind, f: PairFn<T>) -> Self {
        self.setters.entry(name).or_default().pair.push((kind, f));
        self
    }

    pub fn with_i32<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut T, i32) -> SetterResult + Send + Sync + 'static,
    {
        self.unary(
            name,
            ArgKind::I32,
            Box::new(move |target, arg| match arg {
                Arg::I32(v) => f(target, *v),
                other => Err(SetterError::no_such_setter(name, other.kind())),
            }),
        )
    }

    pub fn with_i64<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut T, i64) -> SetterResult + Send + Sync + 'static,
    {
        self.unary(
            name,
            ArgKind::I64,
            Box::new(move |target, arg| match arg {
                Arg::I64(v) => f(target, *v),
                other => Err(SetterError::no_such_setter(name, other.kind())),
            }),
        )
    }

    pub fn with_f32<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut T, f32) -> SetterResult + Send + Sync + 'static,
    {
        self.unary(
            name,
            ArgKind::F32,
            Box::new(move |target, arg| match arg {
                Arg::F32(v) => f(target, *v),
                other => Err(SetterError::no_such_setter(name, other.kind())),
            }),
        )
    }

    pub fn with_f64<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut T, f64) -> SetterResult + Send + Sync + 'static,
    {
        self.unary(
            name,
            ArgKind::F64,
            Box::new(move |target, arg| match arg {
                Arg::F64(v) => f(target, *v),
                other => Err(SetterError::no_such_setter(name, other.kind())),
            }),
        )
    }

    pub fn with_bool<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut T, bool) -> SetterResult + Send + Sync + 'static,
    {
        self.unary(
            name,
            ArgKind::Bool,
            Box::new(move |target, arg| match arg {
                Arg::Bool(v) => f(target, *v),
                other => Err(SetterError::no_such_setter(name, other.kind())),
            }),
        )
    }

    pub fn with_str<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut T, String) -> SetterResult + Send + Sync + 'static,
    {
        self.unary(
            name,
            ArgKind::Str,
            Box::new(move |target, arg| match arg {
                Arg::Str(v) => f(target, v.clone()),
                other => Err(SetterError::no_such_setter(name, other.kind())),
            }),
        )
    }

    /// Register an `(i32, i32)` setter
    pub fn with_int_pair<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut T, i32, i32) -> SetterResult + Send + Sync + 'static,
    {
        self.pair(
            name,
            ArgKind::I32,
            Box::new(move |target, first, second| match (first, second) {
                (Arg::I32(a), Arg::I32(b)) => f(target, *a, *b),
                (other, _) => Err(SetterError::no_such_setter(name, other.kind())),
            }),
        )
    }

    /// Register an `(i64, i64)` setter
    pub fn with_long_pair<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut T, i64, i64) -> SetterResult + Send + Sync + 'static,
    {
        self.pair(
            name,
            ArgKind::I64,
            Box::new(move |target, first, second| match (first, second) {
                (Arg::I64(a), Arg::I64(b)) => f(target, *a, *b),
                (other, _) => Err(SetterError::no_such_setter(name, other.kind())),
            }),
        )
    }

    /// Whether any overload with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.setters.contains_key(name)
    }

    /// Borrow `target` as a [`SetterTarget`] driven by this table
    pub fn bind<'a>(&'a self, target: &'a mut T) -> Bound<'a, T> {
        Bound {
            table: self,
            target,
        }
    }

    fn call(&self, target: &mut T, setter: &str, arg: &Arg) -> SetterResult {
        let kind = arg.kind();
        let f = self
            .setters
            .get(setter)
            .and_then(|o| o.unary.iter().find(|(k, _)| *k == kind))
            .map(|(_, f)| f)
            .ok_or_else(|| SetterError::no_such_setter(setter, kind))?;
        f(target, arg)
    }

    fn call_pair(&self, target: &mut T, setter: &str, first: &Arg, second: &Arg) -> SetterResult {
        let kind = first.kind();
        let f = self
            .setters
            .get(setter)
            .and_then(|o| o.pair.iter().find(|(k, _)| *k == kind))
            .map(|(_, f)| f)
            .ok_or_else(|| SetterError::no_such_setter(setter, kind))?;
        f(target, first, second)
    }
}

/// A target paired with its setter table
pub struct Bound<'a, T> {
    table: &'a SetterTable<T>,
    target: &'a mut T,
}

impl<T> SetterTarget for Bound<'_, T> {
    fn invoke(&mut self, setter: &str, arg: &Arg) -> SetterResult {
        self.table.call(self.target, setter, arg)
    }

    fn invoke_pair(&mut self, setter: &str, first: &Arg, second: &Arg) -> SetterResult {
        self.table.call_pair(self.target, setter, first, second)
    }
}

// ============================================================================
// Naming
// ============================================================================

/// Prefix used when a field has no alias
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// `with*` builder setters
    With,
    /// `set*` setters on loaded resources
    Set,
}

impl Verb {
    pub fn prefix(self) -> &'static str {
        match self {
            Verb::With => "with",
            Verb::Set => "set",
        }
    }
}

/// Capitalize the first character of every alphanumeric run and drop the
/// separators: `express_width` becomes `ExpressWidth`.
pub fn to_pascal_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut at_start = true;
    for c in field.chars() {
        if c.is_alphanumeric() {
            if at_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_start = false;
        } else {
            at_start = true;
        }
    }
    out
}

/// Static normalized key to setter name mapping
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: FxHashMap<&'static str, &'static str>,
}

impl AliasTable {
    pub fn new(pairs: &[(&'static str, &'static str)]) -> Self {
        Self {
            aliases: pairs.iter().copied().collect(),
        }
    }

    pub fn resolve(&self, normalized: &str) -> Option<&'static str> {
        self.aliases.get(normalized).copied()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Field to setter router
#[derive(Debug, Clone)]
pub struct Dispatcher {
    aliases: AliasTable,
    verb: Verb,
}

impl Dispatcher {
    pub fn new(aliases: AliasTable, verb: Verb) -> Self {
        Self { aliases, verb }
    }

    /// Setter name for a configuration field. Aliases win over derivation.
    pub fn setter_name(&self, field: &str) -> String {
        let normalized = normalize_key(field);
        match self.aliases.resolve(&normalized) {
            Some(alias) => alias.to_string(),
            None => format!("{}{}", self.verb.prefix(), to_pascal_case(&normalized)),
        }
    }

    /// Apply `value` to the setter derived from `field`
    ///
    /// Returns `false` when no setter accepted any representation of the
    /// value. Never panics and never propagates setter errors.
    pub fn apply(&self, target: &mut dyn SetterTarget, field: &str, value: &ConfigValue) -> bool {
        let setter = self.setter_name(field);

        for arg in candidates(value) {
            match target.invoke(&setter, &arg) {
                Ok(()) => {
                    tracing::trace!("{} <- {}", setter, arg);
                    return true;
                }
                Err(SetterError::NoSuchSetter { .. }) => {}
                Err(err) => tracing::warn!("Failed to apply {}: {}", field, err),
            }
        }

        // Non-text values get one more try through the string setter
        if !value.is_textual() && *value != ConfigValue::Null {
            let text = Arg::Str(value.to_text());
            match target.invoke(&setter, &text) {
                Ok(()) => return true,
                Err(SetterError::NoSuchSetter { .. }) => {}
                Err(err) => tracing::warn!("Failed to apply {}: {}", field, err),
            }
        }

        tracing::debug!("No setter accepted {} ({})", field, value.type_name());
        false
    }

    /// Apply a paired value, trying `(i32, i32)` then the widened `(i64, i64)`
    pub fn apply_pair(
        &self,
        target: &mut dyn SetterTarget,
        setter: &str,
        first: i32,
        second: i32,
    ) -> bool {
        let attempts = [
            (Arg::I32(first), Arg::I32(second)),
            (Arg::I64(i64::from(first)), Arg::I64(i64::from(second))),
        ];

        for (a, b) in attempts.iter() {
            match target.invoke_pair(setter, a, b) {
                Ok(()) => return true,
                Err(SetterError::NoSuchSetter { .. }) => {}
                Err(err) => tracing::warn!("Failed to apply {}: {}", setter, err),
            }
        }

        tracing::debug!("No pair setter {} for ({}, {})", setter, first, second);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Probe {
        count: Option<i32>,
        big: Option<i64>,
        label: Option<String>,
        ratio: Option<f32>,
        size: Option<(i64, i64)>,
        calls: Vec<String>,
    }

    fn table() -> SetterTable<Probe> {
        SetterTable::<Probe>::new()
            .with_i32("withCount", |p, v| {
                p.calls.push("withCount(i32)".into());
                if v < 0 {
                    return Err(SetterError::rejected("withCount", "negative"));
                }
                p.count = Some(v);
                Ok(())
            })
            .with_i64("withCount", |p, v| {
                p.calls.push("withCount(i64)".into());
                p.big = Some(v);
                Ok(())
            })
            .with_i64("withBig", |p, v| {
                p.big = Some(v);
                Ok(())
            })
            .with_str("withLabel", |p, v| {
                p.label = Some(v);
                Ok(())
            })
            .with_f32("withRatio", |p, v| {
                p.ratio = Some(v);
                Ok(())
            })
            .with_long_pair("withSize", |p, a, b| {
                p.size = Some((a, b));
                Ok(())
            })
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(AliasTable::new(&[("total", "withCount")]), Verb::With)
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("express_width"), "ExpressWidth");
        assert_eq!(to_pascal_case("user_id"), "UserId");
        assert_eq!(to_pascal_case("a--b__c"), "ABC");
        assert_eq!(to_pascal_case("extra1"), "Extra1");
        assert_eq!(to_pascal_case(""), "");
    }

    #[test]
    fn test_setter_name_aliases_win() {
        let d = dispatcher();
        assert_eq!(d.setter_name(" Total "), "withCount");
        assert_eq!(d.setter_name("user_id"), "withUserId");

        let set = Dispatcher::new(AliasTable::default(), Verb::Set);
        assert_eq!(set.setter_name("mute"), "setMute");
    }

    #[test]
    fn test_apply_picks_first_matching_signature() {
        let table = table();
        let mut probe = Probe::default();
        assert!(dispatcher().apply(&mut table.bind(&mut probe), "count", &ConfigValue::from("12")));
        assert_eq!(probe.count, Some(12));
        assert_eq!(probe.calls, vec!["withCount(i32)".to_string()]);
    }

    #[test]
    fn test_rejected_value_falls_through() {
        let table = table();
        let mut probe = Probe::default();
        assert!(dispatcher().apply(&mut table.bind(&mut probe), "total", &ConfigValue::Int(-4)));
        assert_eq!(probe.count, None);
        assert_eq!(probe.big, Some(-4));
        assert_eq!(
            probe.calls,
            vec!["withCount(i32)".to_string(), "withCount(i64)".to_string()]
        );
    }

    #[test]
    fn test_numeric_value_retries_as_text() {
        let table = table();
        let mut probe = Probe::default();
        assert!(dispatcher().apply(&mut table.bind(&mut probe), "label", &ConfigValue::Int(300)));
        assert_eq!(probe.label.as_deref(), Some("300"));
    }

    #[test]
    fn test_double_narrows_to_f32() {
        let table = table();
        let mut probe = Probe::default();
        assert!(dispatcher().apply(&mut table.bind(&mut probe), "ratio", &ConfigValue::Double(0.5)));
        assert_eq!(probe.ratio, Some(0.5));
    }

    #[test]
    fn test_unknown_field_is_dropped() {
        let table = table();
        let mut probe = Probe::default();
        assert!(!dispatcher().apply(&mut table.bind(&mut probe), "nope", &ConfigValue::Int(1)));
        assert!(!dispatcher().apply(&mut table.bind(&mut probe), "big", &ConfigValue::Bool(true)));
        assert_eq!(probe.big, None);
    }

    #[test]
    fn test_pair_widens_to_long() {
        let table = table();
        let mut probe = Probe::default();
        assert!(dispatcher().apply_pair(&mut table.bind(&mut probe), "withSize", 320, -1));
        assert_eq!(probe.size, Some((320, -1)));
        assert!(!dispatcher().apply_pair(&mut table.bind(&mut probe), "withMissing", 1, 1));
    }
}
