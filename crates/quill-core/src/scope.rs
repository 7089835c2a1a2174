//! Variable scopes and control state.
//!
//! A [`Scope`] is a stack of frames, each pointing at its parent. Lookups
//! walk the parent chain and fall back to the engine's shared objects.
//! Function calls push an isolated frame whose parent is the root, so a
//! function body sees globals and its own parameters but never the caller's
//! locals.
//!
//! Unqualified assignment updates the innermost frame already binding the
//! name. When no frame binds it, the value lands in the root frame and is
//! visible to the rest of the render.

use std::iter;

use crate::value::{Value, Vars};

/// A pending non-local jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jump {
    #[default]
    None,
    Break,
    Continue,
    Return,
}

/// Where plain `=` assignments are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Assignment {
    /// The innermost frame binding the name, else the root.
    #[default]
    Wisdom,
    /// The current frame.
    Local,
    /// The root frame.
    Global,
}

/// Per-render control state, threaded through statement execution.
#[derive(Debug, Default)]
pub struct Ctrl {
    jump: Jump,
    assignment: Assignment,
}

impl Ctrl {
    pub fn jump(&self) -> Jump {
        self.jump
    }

    pub fn set_jump(&mut self, jump: Jump) {
        self.jump = jump;
    }

    pub fn clear_jump(&mut self) {
        self.jump = Jump::None;
    }

    pub fn is_jump(&self) -> bool {
        self.jump != Jump::None
    }

    pub fn is_break(&self) -> bool {
        self.jump == Jump::Break
    }

    pub fn is_continue(&self) -> bool {
        self.jump == Jump::Continue
    }

    pub fn is_return(&self) -> bool {
        self.jump == Jump::Return
    }

    pub fn assignment(&self) -> Assignment {
        self.assignment
    }

    /// Switch the assignment mode, returning the previous one.
    pub fn set_assignment(&mut self, assignment: Assignment) -> Assignment {
        std::mem::replace(&mut self.assignment, assignment)
    }
}

#[derive(Debug)]
struct Frame {
    vars: Option<Vars>,
    parent: Option<usize>,
}

/// The variable environment of a single render.
#[derive(Debug)]
pub struct Scope<'s> {
    frames: Vec<Frame>,
    shared: Option<&'s Vars>,
    ctrl: Ctrl,
}

impl<'s> Scope<'s> {
    /// A scope whose root frame holds `root`.
    pub fn new(root: Vars, shared: Option<&'s Vars>) -> Self {
        Self {
            frames: vec![Frame {
                vars: Some(root),
                parent: None,
            }],
            shared,
            ctrl: Ctrl::default(),
        }
    }

    pub fn ctrl(&self) -> &Ctrl {
        &self.ctrl
    }

    pub fn ctrl_mut(&mut self) -> &mut Ctrl {
        &mut self.ctrl
    }

    /// Number of frames, the root included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a frame nested in the current one.
    pub fn push(&mut self) {
        let parent = self.current();
        self.frames.push(Frame {
            vars: None,
            parent: Some(parent),
        });
    }

    /// Push a frame whose parent is the root.
    pub fn push_isolated(&mut self) {
        self.frames.push(Frame {
            vars: None,
            parent: Some(0),
        });
    }

    /// Pop the current frame. The root frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Drop every binding of the current frame.
    pub fn clear_locals(&mut self) {
        let current = self.current();
        if let Some(vars) = &mut self.frames[current].vars {
            vars.clear();
        }
    }

    fn current(&self) -> usize {
        self.frames.len() - 1
    }

    fn chain(&self) -> impl Iterator<Item = usize> + '_ {
        iter::successors(Some(self.current()), |&index| self.frames[index].parent)
    }

    fn binding_frame(&self, key: &str) -> Option<usize> {
        self.chain().find(|&index| {
            self.frames[index]
                .vars
                .as_ref()
                .is_some_and(|vars| vars.contains_key(key))
        })
    }

    fn frame_vars(&mut self, index: usize) -> &mut Vars {
        self.frames[index].vars.get_or_insert_with(Vars::new)
    }

    /// Look up `key` along the frame chain, then in the shared objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.chain()
            .find_map(|index| self.frames[index].vars.as_ref()?.get(key))
            .or_else(|| self.get_shared(key))
    }

    /// Bind `key` in the innermost frame that already binds it, else in the
    /// root frame.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let index = self.binding_frame(&key).unwrap_or(0);
        self.frame_vars(index).insert(key, value);
    }

    /// Remove `key` from the innermost frame binding it.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.binding_frame(key)?;
        self.frames[index].vars.as_mut()?.shift_remove(key)
    }

    pub fn get_local(&self, key: &str) -> Option<&Value> {
        self.frames[self.current()].vars.as_ref()?.get(key)
    }

    pub fn set_local(&mut self, key: impl Into<String>, value: Value) {
        let current = self.current();
        self.frame_vars(current).insert(key.into(), value);
    }

    pub fn remove_local(&mut self, key: &str) -> Option<Value> {
        let current = self.current();
        self.frames[current].vars.as_mut()?.shift_remove(key)
    }

    pub fn get_global(&self, key: &str) -> Option<&Value> {
        self.frames[0].vars.as_ref()?.get(key)
    }

    pub fn set_global(&mut self, key: impl Into<String>, value: Value) {
        self.frame_vars(0).insert(key.into(), value);
    }

    pub fn remove_global(&mut self, key: &str) -> Option<Value> {
        self.frames[0].vars.as_mut()?.shift_remove(key)
    }

    pub fn get_shared(&self, key: &str) -> Option<&Value> {
        self.shared?.get(key)
    }

    /// Bind `key` according to the current assignment mode.
    pub fn assign(&mut self, key: impl Into<String>, value: Value) {
        match self.ctrl.assignment {
            Assignment::Wisdom => self.set(key, value),
            Assignment::Local => self.set_local(key, value),
            Assignment::Global => self.set_global(key, value),
        }
    }

    /// Consume the scope, returning the root frame's bindings.
    pub fn into_root(mut self) -> Vars {
        self.frames.truncate(1);
        self.frames
            .pop()
            .and_then(|frame| frame.vars)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(scope: &Scope<'_>, key: &str) -> Option<i64> {
        scope.get(key).and_then(Value::as_int)
    }

    #[test]
    fn test_lookup_walks_parents() {
        let mut scope = Scope::new(Vars::new(), None);
        scope.set_global("a", Value::Int(1));
        scope.push();
        scope.set_local("b", Value::Int(2));
        scope.push();
        assert_eq!(int(&scope, "a"), Some(1));
        assert_eq!(int(&scope, "b"), Some(2));
        scope.pop();
        scope.pop();
        assert_eq!(int(&scope, "b"), None);
    }

    #[test]
    fn test_set_updates_binding_frame() {
        let mut scope = Scope::new(Vars::new(), None);
        scope.push();
        scope.set_local("x", Value::Int(1));
        scope.push();
        scope.set("x", Value::Int(5));
        scope.pop();
        assert_eq!(scope.get_local("x").and_then(Value::as_int), Some(5));
    }

    #[test]
    fn test_unbound_set_lands_in_root() {
        let mut scope = Scope::new(Vars::new(), None);
        scope.push();
        scope.push();
        scope.set("fresh", Value::Int(3));
        scope.pop();
        scope.pop();
        assert_eq!(scope.get_global("fresh").and_then(Value::as_int), Some(3));
    }

    #[test]
    fn test_isolated_frame_hides_caller_locals() {
        let mut scope = Scope::new(Vars::new(), None);
        scope.set_global("g", Value::Int(1));
        scope.push();
        scope.set_local("caller", Value::Int(2));
        scope.push_isolated();
        assert_eq!(int(&scope, "g"), Some(1));
        assert_eq!(int(&scope, "caller"), None);
        scope.pop();
        assert_eq!(int(&scope, "caller"), Some(2));
    }

    #[test]
    fn test_shared_fallback_and_shadowing() {
        let mut shared = Vars::new();
        shared.insert("site".to_string(), Value::str("quill"));
        let mut scope = Scope::new(Vars::new(), Some(&shared));
        assert_eq!(scope.get("site").and_then(Value::as_str), Some("quill"));
        scope.set_global("site", Value::str("local"));
        assert_eq!(scope.get("site").and_then(Value::as_str), Some("local"));
    }

    #[test]
    fn test_assign_follows_mode() {
        let mut scope = Scope::new(Vars::new(), None);
        scope.push();
        let previous = scope.ctrl_mut().set_assignment(Assignment::Local);
        assert_eq!(previous, Assignment::Wisdom);
        scope.assign("x", Value::Int(1));
        scope.ctrl_mut().set_assignment(Assignment::Global);
        scope.assign("y", Value::Int(2));
        assert!(scope.get_local("x").is_some());
        assert!(scope.get_global("y").is_some());
        assert!(scope.get_global("x").is_none());
    }

    #[test]
    fn test_clear_locals_and_remove() {
        let mut scope = Scope::new(Vars::new(), None);
        scope.set_global("keep", Value::Int(1));
        scope.push();
        scope.set_local("a", Value::Int(1));
        scope.clear_locals();
        assert!(scope.get_local("a").is_none());
        assert!(scope.remove("keep").is_some());
        assert!(scope.get("keep").is_none());
    }

    #[test]
    fn test_root_never_popped() {
        let mut scope = Scope::new(Vars::new(), None);
        scope.pop();
        assert_eq!(scope.depth(), 1);
        scope.set("x", Value::Int(1));
        assert_eq!(scope.into_root().len(), 1);
    }
}
