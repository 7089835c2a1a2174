//! Runtime values.
//!
//! Templates operate on [`Value`]s. Scalars are stored inline; lists and maps
//! are shared handles so that assignments such as `#set(user.name = "x")` or
//! `entry.value = 1` inside a loop are visible through every reference.
//!
//! Host code extends the value space through three traits:
//! [`TemplateObject`] for single objects with fields, [`Iterable`] for
//! collections that hand out fresh iterators, and [`Enumeration`] for
//! one-shot `has_more`/`next_element` sequences.

use std::{
    cmp::Ordering,
    fmt::{self, Write as _},
    iter::Peekable,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::error::EvalResult;

/// A string-keyed variable mapping, as supplied by callers for the root scope
/// and used for engine-wide shared objects.
pub type Vars = IndexMap<String, Value>;

/// A value manipulated by templates.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// A growable list; also used for set-like collections.
    List(List),
    /// A fixed-size array.
    Array(Arc<[Value]>),
    /// An inclusive integer range, produced by `[a..b]`.
    Range(Range),
    /// An insertion-ordered map.
    Map(Map),
    /// A key/value view into a [`Map`], produced when iterating maps.
    Entry(Entry),
    /// A one-shot pull iterator.
    Iter(PullIter),
    /// A host collection that produces fresh iterators.
    Iterable(Arc<dyn Iterable>),
    /// A host `has_more`/`next_element` sequence.
    Enumeration(SharedEnumeration),
    /// Any other host object.
    Object(Arc<dyn TemplateObject>),
}

/// A host object visible to templates.
///
/// Field access (`obj.name`) is routed through [`TemplateObject::field`].
/// Returning `Ok(None)` reports an undefined field.
pub trait TemplateObject: Send + Sync + fmt::Debug {
    /// A short name used in error messages.
    fn type_name(&self) -> &'static str;

    /// Look up a field.
    fn field(&self, name: &str) -> EvalResult<Option<Value>>;

    /// How the object is written by `#(obj)`.
    fn fmt_display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A host collection that can be iterated any number of times.
///
/// The number of elements is intentionally unknown to templates: `for.size`
/// and `for.last` are errors while iterating one.
pub trait Iterable: Send + Sync + fmt::Debug {
    /// Produce a fresh iterator over the elements.
    fn iter(&self) -> Box<dyn Iterator<Item = Value> + Send>;
}

/// A one-shot sequence in the `has_more`/`next_element` style.
///
/// `for` materializes the whole sequence before the first iteration, so its
/// size is known.
pub trait Enumeration: Send + fmt::Debug {
    /// Whether another element is available.
    fn has_more(&mut self) -> bool;

    /// Take the next element.
    fn next_element(&mut self) -> Value;
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A shared, growable list.
#[derive(Debug, Clone, Default)]
pub struct List(Arc<RwLock<Vec<Value>>>);

impl List {
    /// Create a list from its elements.
    pub fn new(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }

    /// Read access to the elements.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        read_lock(&self.0)
    }

    /// Write access to the elements.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
        write_lock(&self.0)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the current elements.
    pub fn snapshot(&self) -> Vec<Value> {
        self.read().clone()
    }

    /// Whether both handles point to the same list.
    pub fn ptr_eq(&self, other: &List) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A shared, insertion-ordered map with string keys.
#[derive(Debug, Clone, Default)]
pub struct Map(Arc<RwLock<IndexMap<String, Value>>>);

impl Map {
    /// Create a map from its entries.
    pub fn new(entries: IndexMap<String, Value>) -> Self {
        Self(Arc::new(RwLock::new(entries)))
    }

    /// Read access to the entries.
    pub fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Value>> {
        read_lock(&self.0)
    }

    /// Write access to the entries.
    pub fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Value>> {
        write_lock(&self.0)
    }

    /// The value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.write().insert(key.into(), value)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Entry views for every key, in insertion order.
    pub fn entries(&self) -> Vec<Entry> {
        self.read()
            .keys()
            .map(|key| Entry {
                map: self.clone(),
                key: Arc::from(key.as_str()),
            })
            .collect()
    }

    /// Whether both handles point to the same map.
    pub fn ptr_eq(&self, other: &Map) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A key/value view into a [`Map`].
///
/// Reading `value` always reflects the map's current content and assigning
/// it writes through to the map.
#[derive(Debug, Clone)]
pub struct Entry {
    map: Map,
    key: Arc<str>,
}

impl Entry {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The current value stored under this entry's key.
    pub fn value(&self) -> Value {
        self.map.get(&self.key).unwrap_or_default()
    }

    /// Replace the value stored under this entry's key.
    pub fn set_value(&self, value: Value) {
        self.map.insert(self.key.as_ref(), value);
    }
}

/// An inclusive integer range. Descends when `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    start: i64,
    end: i64,
}

impl Range {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// Number of elements; a range is never empty. `None` when the count
    /// does not fit in a `usize`, as for `[i64::MIN..i64::MAX]`.
    pub fn len(&self) -> Option<usize> {
        usize::try_from(self.start.abs_diff(self.end))
            .ok()?
            .checked_add(1)
    }

    /// The element at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<i64> {
        let offset = u64::try_from(index).ok()?;
        if offset > self.start.abs_diff(self.end) {
            return None;
        }
        if self.start <= self.end {
            self.start.checked_add_unsigned(offset)
        } else {
            self.start.checked_sub_unsigned(offset)
        }
    }
}

type BoxedIter = Box<dyn Iterator<Item = Value> + Send>;

/// A shared one-shot iterator.
#[derive(Clone)]
pub struct PullIter(Arc<Mutex<Peekable<BoxedIter>>>);

impl PullIter {
    pub fn new(iter: impl Iterator<Item = Value> + Send + 'static) -> Self {
        let boxed: BoxedIter = Box::new(iter);
        Self(Arc::new(Mutex::new(boxed.peekable())))
    }

    /// Pull the next element.
    pub fn next_value(&self) -> Option<Value> {
        lock(&self.0).next()
    }

    /// Whether another element is available, without consuming it.
    pub fn has_next(&self) -> bool {
        lock(&self.0).peek().is_some()
    }

    pub fn ptr_eq(&self, other: &PullIter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PullIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PullIter")
    }
}

/// A shared handle to a host [`Enumeration`].
#[derive(Debug, Clone)]
pub struct SharedEnumeration(Arc<Mutex<Box<dyn Enumeration>>>);

impl SharedEnumeration {
    pub fn new(enumeration: impl Enumeration + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(enumeration))))
    }

    /// Drain the remaining elements.
    pub fn materialize(&self) -> Vec<Value> {
        let mut guard = lock(&self.0);
        let mut items = Vec::new();
        while guard.has_more() {
            items.push(guard.next_element());
        }
        items
    }

    pub fn ptr_eq(&self, other: &SharedEnumeration) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Value {
    /// A string value.
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// A list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(List::new(items.into_iter().collect()))
    }

    /// A map value.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Map::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// A fixed-size array value.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    /// An inclusive range value.
    pub fn range(start: i64, end: i64) -> Self {
        Value::Range(Range::new(start, end))
    }

    /// A one-shot iterator value.
    pub fn iter(iter: impl Iterator<Item = Value> + Send + 'static) -> Self {
        Value::Iter(PullIter::new(iter))
    }

    /// A host iterable value.
    pub fn iterable(iterable: impl Iterable + 'static) -> Self {
        Value::Iterable(Arc::new(iterable))
    }

    /// A host enumeration value.
    pub fn enumeration(enumeration: impl Enumeration + 'static) -> Self {
        Value::Enumeration(SharedEnumeration::new(enumeration))
    }

    /// A host object value.
    pub fn object(object: impl TemplateObject + 'static) -> Self {
        Value::Object(Arc::new(object))
    }

    /// A short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Array(_) => "array",
            Value::Range(_) => "range",
            Value::Map(_) => "map",
            Value::Entry(_) => "entry",
            Value::Iter(_) => "iterator",
            Value::Iterable(_) => "iterable",
            Value::Enumeration(_) => "enumeration",
            Value::Object(object) => object.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness as used by `#if`, `&&`, `||`, `!` and the ternary operator.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(list) => !list.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Range(_) => true,
            Value::Map(map) => !map.is_empty(),
            Value::Iter(iter) => iter.has_next(),
            Value::Entry(_)
            | Value::Iterable(_)
            | Value::Enumeration(_)
            | Value::Object(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; ints widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Identity-first equality.
    ///
    /// Two nulls are equal, handles to the same shared container are equal,
    /// ints and floats compare numerically, and lists, arrays and maps fall
    /// back to element-wise comparison.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.ptr_eq(b) || seq_eq(a.read().iter(), b.read().iter())
            }
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b) || seq_eq(a.iter(), b.iter()),
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.read(), b.read());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.loose_eq(other)))
            }
            (Value::Entry(a), Value::Entry(b)) => a.map.ptr_eq(&b.map) && a.key == b.key,
            (Value::Iter(a), Value::Iter(b)) => a.ptr_eq(b),
            (Value::Iterable(a), Value::Iterable(b)) => Arc::ptr_eq(a, b),
            (Value::Enumeration(a), Value::Enumeration(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering for `<`, `<=`, `>` and `>=`: numbers numerically, strings
    /// lexicographically, booleans with `false < true`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }
}

fn seq_eq<'a>(
    mut a: impl ExactSizeIterator<Item = &'a Value>,
    b: impl ExactSizeIterator<Item = &'a Value>,
) -> bool {
    a.len() == b.len() && b.into_iter().all(|y| a.next().is_some_and(|x| x.loose_eq(y)))
}

/// Write a float so it never reads as an int: `1.0` stays `1.0`.
pub(crate) fn fmt_float(f: &mut dyn fmt::Write, x: f64) -> fmt::Result {
    if x.is_finite() && x.fract() == 0.0 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

fn fmt_seq<'a>(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = &'a Value>) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => fmt_float(f, *x),
            Value::Str(s) => f.write_str(s),
            Value::List(list) => fmt_seq(f, list.read().iter()),
            Value::Array(items) => fmt_seq(f, items.iter()),
            Value::Range(range) => write!(f, "[{}..{}]", range.start, range.end),
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.read().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Entry(entry) => write!(f, "{}={}", entry.key(), entry.value()),
            Value::Iter(_) => f.write_str("<iterator>"),
            Value::Iterable(_) => f.write_str("<iterable>"),
            Value::Enumeration(_) => f.write_str("<enumeration>"),
            Value::Object(object) => object.fmt_display(f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(Value::Float(value as f64), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::str(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(List::new(value))
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Value::Map(Map::new(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any template value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::str(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::from(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut entries = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            entries.insert(key, value);
        }
        Ok(Value::from(entries))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn test_range_walks_from_start_to_end(start in -500i64..500, end in -500i64..500) {
            let range = Range::new(start, end);
            let len = range.len().unwrap_or_default();
            let items: Vec<i64> = (0..len).filter_map(|i| range.get(i)).collect();
            prop_assert_eq!(items.len(), len);
            prop_assert_eq!(items.first().copied(), Some(start));
            prop_assert_eq!(items.last().copied(), Some(end));
            prop_assert!(items.windows(2).all(|w| w[0].abs_diff(w[1]) == 1));
            prop_assert_eq!(range.get(len), None);
        }
    }

    #[derive(Debug)]
    struct Countdown(i64);

    impl Enumeration for Countdown {
        fn has_more(&mut self) -> bool {
            self.0 > 0
        }

        fn next_element(&mut self) -> Value {
            self.0 -= 1;
            Value::Int(self.0 + 1)
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(!Value::list(Vec::new()).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(Value::range(3, 1).is_truthy());
    }

    #[test]
    fn test_iterator_truthiness_does_not_consume() {
        let iter = Value::iter(vec![Value::Int(1)].into_iter());
        assert!(iter.is_truthy());
        assert!(iter.is_truthy());
        let Value::Iter(pull) = iter else {
            unreachable!()
        };
        assert_eq!(pull.next_value().and_then(|v| v.as_int()), Some(1));
        assert!(!pull.has_next());
    }

    #[test]
    fn test_loose_eq_identity_first() {
        assert!(Value::Null.loose_eq(&Value::Null));
        assert!(Value::Int(2).loose_eq(&Value::Float(2.0)));
        assert!(!Value::Int(2).loose_eq(&Value::str("2")));

        let list = Value::list([Value::Int(1), Value::str("a")]);
        assert!(list.loose_eq(&list.clone()));
        assert!(list.loose_eq(&Value::list([Value::Int(1), Value::str("a")])));
        assert!(!list.loose_eq(&Value::list([Value::Int(1)])));
    }

    #[test]
    fn test_entry_writes_through() {
        let map = Map::new(IndexMap::from([("a".to_string(), Value::Int(1))]));
        let entries = map.entries();
        entries[0].set_value(Value::Int(5));
        assert_eq!(map.get("a").and_then(|v| v.as_int()), Some(5));
        assert_eq!(entries[0].value().as_int(), Some(5));
    }

    #[test]
    fn test_range_len_and_get() {
        let up = Range::new(1, 3);
        assert_eq!(up.len(), Some(3));
        assert_eq!(up.get(2), Some(3));
        assert_eq!(up.get(3), None);

        let down = Range::new(3, 1);
        assert_eq!(down.len(), Some(3));
        assert_eq!(down.get(1), Some(2));
    }

    #[test]
    fn test_full_domain_range() {
        let full = Range::new(i64::MIN, i64::MAX);
        assert_eq!(full.len(), None);
        assert_eq!(full.get(0), Some(i64::MIN));
        assert_eq!(full.get(1), Some(i64::MIN + 1));

        let down = Range::new(i64::MAX, i64::MIN);
        assert_eq!(down.len(), None);
        assert_eq!(down.get(1), Some(i64::MAX - 1));

        let top = Range::new(i64::MAX - 1, i64::MAX);
        assert_eq!(top.get(1), Some(i64::MAX));
        assert_eq!(top.get(2), None);
    }

    #[test]
    fn test_enumeration_materialize() {
        let enumeration = SharedEnumeration::new(Countdown(3));
        let items: Vec<_> = enumeration
            .materialize()
            .iter()
            .filter_map(Value::as_int)
            .collect();
        assert_eq!(items, vec![3, 2, 1]);
    }

    #[test]
    fn test_display() {
        let map = Value::map([("a", Value::Int(1)), ("b", Value::list([Value::Bool(true)]))]);
        assert_eq!(map.to_string(), "{a: 1, b: [true]}");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(-0.0).to_string(), "-0.0");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "inf");
        assert_eq!(Value::list([Value::Float(3.0)]).to_string(), "[3.0]");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_compare() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.5)), Some(Ordering::Less));
        assert_eq!(
            Value::str("b").compare(&Value::str("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Int(1).compare(&Value::str("1")), None);
    }
}
