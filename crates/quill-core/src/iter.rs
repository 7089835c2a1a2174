//! Iteration adapters for `#for`.
//!
//! [`ForIter`] turns any [`Value`] into a uniform element stream with an
//! optional known size, and [`LoopStatus`] is the object bound to `for`
//! inside a loop body.

use std::sync::Arc;

use crate::{
    error::{EvalResult, RenderErrorKind},
    value::{PullIter, Range, TemplateObject, Value},
};

/// What a loop walks over.
enum Items {
    Owned(std::vec::IntoIter<Value>),
    Array(Arc<[Value]>, usize),
    Range(Range, usize),
    Pull(PullIter),
    Boxed(Box<dyn Iterator<Item = Value> + Send>),
    Single(Option<Value>),
}

/// A uniform iterator over a loop source.
///
/// | source            | elements                          | size    |
/// |-------------------|-----------------------------------|---------|
/// | null              | none                              | 0       |
/// | list              | snapshot of the items             | known   |
/// | array, range      | walked by index                   | known*  |
/// | map               | entries, writable through `value` | known   |
/// | iterator/iterable | pulled lazily                     | unknown |
/// | enumeration       | drained up front                  | known   |
/// | anything else     | the value itself, once            | 1       |
///
/// *A range too long to count in a `usize` walks normally but has no
/// size.
pub struct ForIter {
    items: Items,
    size: Option<usize>,
    kind: &'static str,
}

impl ForIter {
    pub fn new(source: &Value) -> Self {
        let kind = source.type_name();
        let (items, size) = match source {
            Value::Null => (Items::Owned(Vec::new().into_iter()), Some(0)),
            Value::List(list) => {
                let items = list.snapshot();
                let size = items.len();
                (Items::Owned(items.into_iter()), Some(size))
            }
            Value::Array(items) => (Items::Array(Arc::clone(items), 0), Some(items.len())),
            Value::Range(range) => (Items::Range(*range, 0), range.len()),
            Value::Map(map) => {
                let entries: Vec<Value> = map.entries().into_iter().map(Value::Entry).collect();
                let size = entries.len();
                (Items::Owned(entries.into_iter()), Some(size))
            }
            Value::Iter(iter) => (Items::Pull(iter.clone()), None),
            Value::Iterable(iterable) => (Items::Boxed(iterable.iter()), None),
            Value::Enumeration(enumeration) => {
                let items = enumeration.materialize();
                let size = items.len();
                (Items::Owned(items.into_iter()), Some(size))
            }
            other => (Items::Single(Some(other.clone())), Some(1)),
        };
        Self { items, size, kind }
    }

    /// The number of elements, when it can be known without consuming them.
    pub fn size(&self) -> Option<usize> {
        self.size
    }

    /// The type name of the source, for size errors.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl Iterator for ForIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match &mut self.items {
            Items::Owned(items) => items.next(),
            Items::Array(items, index) => {
                let item = items.get(*index).cloned();
                *index += 1;
                item
            }
            Items::Range(range, index) => {
                let item = range.get(*index).map(Value::Int);
                *index += 1;
                item
            }
            Items::Pull(iter) => iter.next_value(),
            Items::Boxed(iter) => iter.next(),
            Items::Single(item) => item.take(),
        }
    }
}

/// The per-iteration status object bound to `for`.
///
/// `index` is 0-based and `count` 1-based. `odd` and `even` follow `count`,
/// so the first iteration is odd. `size` and `last` are errors when the loop
/// source cannot report its size.
#[derive(Debug)]
pub struct LoopStatus {
    index: usize,
    size: Option<usize>,
    kind: &'static str,
    outer: Value,
}

impl LoopStatus {
    pub fn new(index: usize, size: Option<usize>, kind: &'static str, outer: Value) -> Self {
        Self {
            index,
            size,
            kind,
            outer,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.index + 1
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> EvalResult<bool> {
        Ok(self.count() == self.size()?)
    }

    pub fn is_odd(&self) -> bool {
        self.index % 2 == 0
    }

    pub fn is_even(&self) -> bool {
        !self.is_odd()
    }

    pub fn size(&self) -> EvalResult<usize> {
        self.size.ok_or(RenderErrorKind::UncountableSize(self.kind))
    }

    /// The status of the enclosing loop, or null.
    pub fn outer(&self) -> &Value {
        &self.outer
    }
}

impl TemplateObject for LoopStatus {
    fn type_name(&self) -> &'static str {
        "loop status"
    }

    fn field(&self, name: &str) -> EvalResult<Option<Value>> {
        Ok(Some(match name {
            "index" => Value::from(self.index()),
            "count" => Value::from(self.count()),
            "first" => Value::Bool(self.is_first()),
            "last" => Value::Bool(self.is_last()?),
            "odd" => Value::Bool(self.is_odd()),
            "even" => Value::Bool(self.is_even()),
            "size" => Value::from(self.size()?),
            "outer" => self.outer.clone(),
            _ => return Ok(None),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Vars;

    fn ints(iter: ForIter) -> Vec<i64> {
        iter.filter_map(|v| v.as_int()).collect()
    }

    #[test]
    fn test_null_is_empty() {
        let iter = ForIter::new(&Value::Null);
        assert_eq!(iter.size(), Some(0));
        assert_eq!(iter.count(), 0);
    }

    #[test]
    fn test_scalar_iterates_once() {
        let iter = ForIter::new(&Value::Int(7));
        assert_eq!(iter.size(), Some(1));
        assert_eq!(ints(iter), vec![7]);
    }

    #[test]
    fn test_descending_range() {
        let iter = ForIter::new(&Value::range(3, 1));
        assert_eq!(iter.size(), Some(3));
        assert_eq!(ints(iter), vec![3, 2, 1]);
    }

    #[test]
    fn test_list_snapshot_ignores_later_pushes() {
        let value = Value::list([Value::Int(1), Value::Int(2)]);
        let iter = ForIter::new(&value);
        if let Value::List(list) = &value {
            list.write().push(Value::Int(3));
        }
        assert_eq!(ints(iter), vec![1, 2]);
    }

    #[test]
    fn test_map_entries_write_through() {
        let mut vars = Vars::new();
        vars.insert("a".to_string(), Value::Int(1));
        let value = Value::from(vars);
        for item in ForIter::new(&value) {
            let Value::Entry(entry) = item else {
                panic!("expected entry");
            };
            entry.set_value(Value::Int(10));
        }
        let Value::Map(map) = value else {
            unreachable!()
        };
        assert_eq!(map.get("a").and_then(|v| v.as_int()), Some(10));
    }

    #[test]
    fn test_iterator_has_unknown_size() {
        let iter = ForIter::new(&Value::iter(vec![Value::Int(1)].into_iter()));
        assert_eq!(iter.size(), None);
        assert_eq!(iter.kind(), "iterator");
    }

    #[test]
    fn test_status_fields() {
        let status = LoopStatus::new(0, Some(2), "list", Value::Null);
        assert!(status.is_first());
        assert!(status.is_odd());
        assert!(!status.is_last().unwrap());
        assert_eq!(status.count(), 1);

        let last = LoopStatus::new(1, Some(2), "list", Value::Null);
        assert!(last.is_last().unwrap());
        assert!(last.is_even());
    }

    #[test]
    fn test_status_size_unknown() {
        let status = LoopStatus::new(0, None, "iterator", Value::Null);
        assert!(matches!(
            status.field("size"),
            Err(RenderErrorKind::UncountableSize("iterator"))
        ));
        assert!(status.field("last").is_err());
        assert!(status.field("index").unwrap().is_some());
        assert!(status.field("missing").unwrap().is_none());
    }
}
