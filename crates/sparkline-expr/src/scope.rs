//! Variable bindings visible to an expression.

use serde_json::Value as Json;

use crate::value::Value;

/// The complete set of names an expression can resolve.
///
/// There is no fallback lookup: a name that is not bound here does not exist
/// for the evaluator, which is what keeps conditions sandboxed.
///
/// # Example
///
/// ```
/// use sparkline_expr::{Expression, Scope};
/// use serde_json::json;
///
/// let packet = json!({"game_info": {"is_kickoff_pause": true}});
/// let scope = Scope::new().with_json("packet", &packet).with("pid", 7_i64);
///
/// let expr = Expression::compile("packet.game_info.is_kickoff_pause and pid > 0").unwrap();
/// assert!(expr.test(&scope).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scope<'a> {
    bindings: Vec<(&'a str, Value<'a>)>,
}

impl<'a> Scope<'a> {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Binds `name`, replacing any earlier binding of the same name.
    pub fn insert(&mut self, name: &'a str, value: Value<'a>) {
        if let Some(slot) = self.bindings.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.bindings.push((name, value));
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: &'a str, value: impl Into<Value<'a>>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Binds `name` to a JSON document without copying it.
    #[must_use]
    pub fn with_json(self, name: &'a str, json: &'a Json) -> Self {
        self.with(name, Value::from_json(json))
    }

    /// Looks up a root name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value<'a>> {
        self.bindings
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// Iterates over the bound names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.bindings.iter().map(|(n, _)| *n)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_existing_binding() {
        let mut scope = Scope::new().with("x", 1_i64);
        scope.insert("x", Value::Int(2));
        assert_eq!(scope.len(), 1);
        assert_eq!(scope.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn names_in_insertion_order() {
        let scope = Scope::new().with("b", true).with("a", false);
        assert_eq!(scope.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn unbound_name_is_absent() {
        let scope = Scope::new();
        assert!(scope.is_empty());
        assert!(scope.get("packet").is_none());
    }
}
