//! Method dispatch for `target.name(args)` and shared `name(args)` calls.
//!
//! A [`MethodRegistry`] holds host-registered methods and falls back to a
//! built-in table for collections, strings and numbers. Host methods take
//! precedence over built-ins of the same name.

use std::{fmt, sync::Arc};

use indexmap::IndexMap;

use quill_core::{EvalResult, RenderErrorKind, Value, value::Range};

/// A method callable on any receiver.
pub type MethodFn = dyn Fn(&Value, &[Value]) -> EvalResult<Value> + Send + Sync;

/// A free-standing function callable as `name(args)`.
pub type SharedMethodFn = dyn Fn(&[Value]) -> EvalResult<Value> + Send + Sync;

#[derive(Default, Clone)]
pub struct MethodRegistry {
    methods: IndexMap<String, Arc<MethodFn>>,
    shared: IndexMap<String, Arc<SharedMethodFn>>,
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("shared", &self.shared.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, method: F) -> &mut Self
    where
        F: Fn(&Value, &[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn register_shared<F>(&mut self, name: impl Into<String>, method: F) -> &mut Self
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.shared.insert(name.into(), Arc::new(method));
        self
    }

    /// Call `name` on `target`.
    pub fn call(&self, target: &Value, name: &str, args: &[Value]) -> EvalResult<Value> {
        match self.methods.get(name) {
            Some(method) => method(target, args),
            None => builtin(target, name, args),
        }
    }

    /// Call the shared method `name`.
    pub fn call_shared(&self, name: &str, args: &[Value]) -> EvalResult<Value> {
        let method = self
            .shared
            .get(name)
            .ok_or_else(|| RenderErrorKind::UndefinedFunction(name.to_string()))?;
        method(args)
    }
}

fn expect_args(name: &str, args: &[Value], expected: usize) -> EvalResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(RenderErrorKind::ArityMismatch {
            name: name.to_string(),
            expected,
            found: args.len(),
        })
    }
}

fn undefined(target: &Value, name: &str) -> RenderErrorKind {
    RenderErrorKind::UndefinedMethod {
        name: name.to_string(),
        type_name: target.type_name(),
    }
}

fn int_arg(name: &str, value: &Value) -> EvalResult<i64> {
    value.as_int().ok_or_else(|| {
        RenderErrorKind::type_error(format!(
            "`{name}` expects an int argument, found {}",
            value.type_name()
        ))
    })
}

/// Element count of a sized value.
fn size_of(target: &Value, name: &str) -> EvalResult<usize> {
    Ok(match target {
        Value::List(list) => list.len(),
        Value::Array(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::Range(range) => range.len().ok_or(RenderErrorKind::UncountableSize("range"))?,
        Value::Str(s) => s.chars().count(),
        _ => return Err(undefined(target, name)),
    })
}

fn index_in(len: usize, index: i64) -> EvalResult<usize> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(RenderErrorKind::IndexOutOfRange { index, len })
}

/// The element of `range` at `index`. Works on ranges too long to count.
pub(crate) fn range_item(range: &Range, index: i64) -> EvalResult<Value> {
    usize::try_from(index)
        .ok()
        .and_then(|i| range.get(i))
        .map(Value::Int)
        .ok_or(RenderErrorKind::IndexOutOfRange {
            index,
            len: range.len().unwrap_or(usize::MAX),
        })
}

fn builtin(target: &Value, name: &str, args: &[Value]) -> EvalResult<Value> {
    match name {
        "size" | "length" => {
            expect_args(name, args, 0)?;
            size_of(target, name).map(Value::from)
        }
        "isEmpty" => {
            expect_args(name, args, 0)?;
            Ok(Value::Bool(size_of(target, name)? == 0))
        }
        "contains" => {
            expect_args(name, args, 1)?;
            contains(target, &args[0]).map(Value::Bool)
        }
        "get" => {
            expect_args(name, args, 1)?;
            get(target, &args[0])
        }
        "keys" => {
            expect_args(name, args, 0)?;
            match target {
                Value::Map(map) => Ok(Value::list(map.read().keys().map(Value::str))),
                _ => Err(undefined(target, name)),
            }
        }
        "values" => {
            expect_args(name, args, 0)?;
            match target {
                Value::Map(map) => Ok(Value::list(map.read().values().cloned())),
                _ => Err(undefined(target, name)),
            }
        }
        "add" => {
            expect_args(name, args, 1)?;
            match target {
                Value::List(list) => {
                    list.write().push(args[0].clone());
                    Ok(Value::Null)
                }
                _ => Err(undefined(target, name)),
            }
        }
        "put" => {
            expect_args(name, args, 2)?;
            match target {
                Value::Map(map) => Ok(map
                    .insert(args[0].to_string(), args[1].clone())
                    .unwrap_or_default()),
                _ => Err(undefined(target, name)),
            }
        }
        "indexOf" => {
            expect_args(name, args, 1)?;
            index_of(target, &args[0]).map(|i| Value::Int(i.map_or(-1, |i| i as i64)))
        }
        "abs" => {
            expect_args(name, args, 0)?;
            match target {
                Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(|| {
                    RenderErrorKind::Arithmetic(format!("integer overflow in abs({i})"))
                }),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                _ => Err(undefined(target, name)),
            }
        }
        "toString" => {
            expect_args(name, args, 0)?;
            Ok(Value::str(target.to_string()))
        }
        _ => match target {
            Value::Str(s) => string_method(target, s, name, args),
            _ => Err(undefined(target, name)),
        },
    }
}

fn contains(target: &Value, needle: &Value) -> EvalResult<bool> {
    Ok(match target {
        Value::List(list) => list.read().iter().any(|v| v.loose_eq(needle)),
        Value::Array(items) => items.iter().any(|v| v.loose_eq(needle)),
        Value::Map(map) => map.read().contains_key(needle.to_string().as_str()),
        Value::Range(range) => needle.as_int().is_some_and(|n| {
            let (low, high) = if range.start() <= range.end() {
                (range.start(), range.end())
            } else {
                (range.end(), range.start())
            };
            (low..=high).contains(&n)
        }),
        Value::Str(s) => s.contains(needle.to_string().as_str()),
        _ => return Err(undefined(target, "contains")),
    })
}

fn get(target: &Value, key: &Value) -> EvalResult<Value> {
    match target {
        Value::Map(map) => Ok(map.get(&key.to_string()).unwrap_or_default()),
        Value::List(list) => {
            let items = list.read();
            let i = index_in(items.len(), int_arg("get", key)?)?;
            Ok(items[i].clone())
        }
        Value::Array(items) => {
            let i = index_in(items.len(), int_arg("get", key)?)?;
            Ok(items[i].clone())
        }
        Value::Range(range) => range_item(range, int_arg("get", key)?),
        _ => Err(undefined(target, "get")),
    }
}

fn index_of(target: &Value, needle: &Value) -> EvalResult<Option<usize>> {
    Ok(match target {
        Value::Str(s) => {
            let needle = needle.to_string();
            s.find(needle.as_str()).map(|byte| s[..byte].chars().count())
        }
        Value::List(list) => list.read().iter().position(|v| v.loose_eq(needle)),
        Value::Array(items) => items.iter().position(|v| v.loose_eq(needle)),
        _ => return Err(undefined(target, "indexOf")),
    })
}

fn str_arg<'a>(name: &str, value: &'a Value) -> EvalResult<&'a str> {
    value.as_str().ok_or_else(|| {
        RenderErrorKind::type_error(format!(
            "`{name}` expects a string argument, found {}",
            value.type_name()
        ))
    })
}

fn string_method(target: &Value, s: &str, name: &str, args: &[Value]) -> EvalResult<Value> {
    match name {
        "toUpperCase" => {
            expect_args(name, args, 0)?;
            Ok(Value::str(s.to_uppercase()))
        }
        "toLowerCase" => {
            expect_args(name, args, 0)?;
            Ok(Value::str(s.to_lowercase()))
        }
        "trim" => {
            expect_args(name, args, 0)?;
            Ok(Value::str(s.trim()))
        }
        "startsWith" => {
            expect_args(name, args, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg(name, &args[0])?)))
        }
        "endsWith" => {
            expect_args(name, args, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg(name, &args[0])?)))
        }
        "substring" => substring(s, args),
        "replace" => {
            expect_args(name, args, 2)?;
            Ok(Value::str(s.replace(
                str_arg(name, &args[0])?,
                str_arg(name, &args[1])?,
            )))
        }
        "split" => {
            expect_args(name, args, 1)?;
            let separator = str_arg(name, &args[0])?;
            Ok(Value::list(s.split(separator).map(Value::str)))
        }
        _ => Err(undefined(target, name)),
    }
}

/// `substring(begin)` or `substring(begin, end)` over chars.
fn substring(s: &str, args: &[Value]) -> EvalResult<Value> {
    let len = s.chars().count();
    let (begin, end) = match args {
        [begin] => (int_arg("substring", begin)?, len as i64),
        [begin, end] => (int_arg("substring", begin)?, int_arg("substring", end)?),
        _ => {
            return Err(RenderErrorKind::ArityMismatch {
                name: "substring".to_string(),
                expected: 2,
                found: args.len(),
            });
        }
    };
    let out_of_range = |index| RenderErrorKind::IndexOutOfRange { index, len };
    let end_at = usize::try_from(end)
        .ok()
        .filter(|&e| e <= len)
        .ok_or_else(|| out_of_range(end))?;
    let begin_at = usize::try_from(begin)
        .ok()
        .filter(|&b| b <= end_at)
        .ok_or_else(|| out_of_range(begin))?;
    Ok(Value::str(
        s.chars()
            .skip(begin_at)
            .take(end_at - begin_at)
            .collect::<String>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(target: &Value, name: &str, args: &[Value]) -> EvalResult<Value> {
        MethodRegistry::new().call(target, name, args)
    }

    #[test]
    fn test_collection_methods() {
        let list = Value::list([Value::Int(1), Value::Int(2)]);
        assert_eq!(call(&list, "size", &[]).unwrap().as_int(), Some(2));
        assert_eq!(
            call(&list, "contains", &[Value::Float(2.0)]).unwrap().as_bool(),
            Some(true)
        );
        call(&list, "add", &[Value::Int(3)]).unwrap();
        assert_eq!(call(&list, "get", &[Value::Int(2)]).unwrap().as_int(), Some(3));
        assert!(matches!(
            call(&list, "get", &[Value::Int(5)]),
            Err(RenderErrorKind::IndexOutOfRange { index: 5, len: 3 })
        ));

        let map = Value::map([("a", Value::Int(1))]);
        call(&map, "put", &[Value::str("b"), Value::Int(2)]).unwrap();
        assert_eq!(call(&map, "keys", &[]).unwrap().to_string(), "[a, b]");
        assert_eq!(call(&map, "values", &[]).unwrap().to_string(), "[1, 2]");
        assert_eq!(call(&map, "isEmpty", &[]).unwrap().as_bool(), Some(false));
        assert!(call(&map, "get", &[Value::str("zzz")]).unwrap().is_null());
    }

    #[test]
    fn test_string_methods() {
        let s = Value::str("  Héllo World ");
        assert_eq!(call(&s, "trim", &[]).unwrap().to_string(), "Héllo World");
        assert_eq!(call(&s, "length", &[]).unwrap().as_int(), Some(14));
        assert_eq!(
            call(&s, "indexOf", &[Value::str("World")]).unwrap().as_int(),
            Some(8)
        );
        assert_eq!(
            call(&Value::str("abcdef"), "substring", &[Value::Int(1), Value::Int(3)])
                .unwrap()
                .to_string(),
            "bc"
        );
        assert_eq!(
            call(&Value::str("a,b,c"), "split", &[Value::str(",")])
                .unwrap()
                .to_string(),
            "[a, b, c]"
        );
        assert!(matches!(
            call(&Value::str("abc"), "substring", &[Value::Int(4)]),
            Err(RenderErrorKind::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_number_methods() {
        assert_eq!(call(&Value::Int(-3), "abs", &[]).unwrap().as_int(), Some(3));
        assert!(matches!(
            call(&Value::Int(i64::MIN), "abs", &[]),
            Err(RenderErrorKind::Arithmetic(_))
        ));
        assert_eq!(
            call(&Value::Float(1.5), "toString", &[]).unwrap().to_string(),
            "1.5"
        );
    }

    #[test]
    fn test_unknown_method_names_receiver_type() {
        let err = call(&Value::Int(1), "toUpperCase", &[]).unwrap_err();
        assert_eq!(err.to_string(), "method `toUpperCase` is not defined for int");
    }

    #[test]
    fn test_host_methods_take_precedence() {
        let mut registry = MethodRegistry::new();
        registry.register("size", |_, _| Ok(Value::Int(42)));
        registry.register_shared("twice", |args| {
            Ok(Value::Int(args.first().and_then(Value::as_int).unwrap_or(0) * 2))
        });
        let list = Value::list([]);
        assert_eq!(registry.call(&list, "size", &[]).unwrap().as_int(), Some(42));
        assert_eq!(
            registry.call_shared("twice", &[Value::Int(4)]).unwrap().as_int(),
            Some(8)
        );
        assert!(matches!(
            registry.call_shared("missing", &[]),
            Err(RenderErrorKind::UndefinedFunction(_))
        ));
    }
}
