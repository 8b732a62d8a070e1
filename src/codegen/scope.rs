//! Lexically nested variable bindings.
use std::collections::HashMap;

use crate::llir::Value;

/// What a name resolves to inside a function: a pointer-typed slot backing a
/// variable, or a constant value bound directly.
#[derive(Debug, Clone)]
pub enum Binding {
    Slot(Value),
    Constant(Value),
}

/// A stack of name maps; lookups walk from the innermost scope outwards, so
/// inner declarations shadow outer ones and vanish when their scope is
/// popped.
#[derive(Debug, Default)]
pub struct VariableContext {
    scopes: Vec<HashMap<String, Binding>>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Bind a name in the innermost scope; rebinding the same name in the
    /// same scope is refused.
    pub fn add(&mut self, name: impl ToString, binding: Binding) -> Result<(), String> {
        let name = name.to_string();
        let scope = self.scopes.last_mut().expect("no active scope");
        if scope.contains_key(&name) {
            return Err(format!("{name} already defined in current scope"));
        }
        scope.insert(name, binding);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llir::{Type, Value};

    fn slot(name: &str) -> Binding {
        Binding::Slot(Value::Local(name.into(), Type::Int(32).ptr()))
    }

    #[test]
    fn test_add_and_lookup() {
        let mut vars = VariableContext::new();
        vars.add("foo", slot("foo.0")).unwrap();
        assert!(matches!(vars.lookup("foo"), Some(Binding::Slot(_))));
        assert!(vars.lookup("bar").is_none());
    }

    #[test]
    fn test_same_scope_redefinition_refused() {
        let mut vars = VariableContext::new();
        vars.add("foo", slot("foo.0")).unwrap();
        assert!(vars.add("foo", slot("foo.1")).is_err());
    }

    #[test]
    fn test_inner_scope_shadows_and_unwinds() {
        let mut vars = VariableContext::new();
        vars.add("foo", slot("foo.0")).unwrap();

        vars.push();
        vars.add("foo", slot("foo.1")).unwrap();
        let Some(Binding::Slot(Value::Local(name, _))) = vars.lookup("foo") else {
            panic!("expected slot binding");
        };
        assert_eq!(name, "foo.1");

        vars.pop();
        let Some(Binding::Slot(Value::Local(name, _))) = vars.lookup("foo") else {
            panic!("expected slot binding");
        };
        assert_eq!(name, "foo.0");
    }
}
