//! # Sparkline Expr
//!
//! A small, sandboxed expression language for plugin handler conditions.
//!
//! Conditions such as `packet.game_ball.physics.location.z > 300` are
//! compiled once and then evaluated every tick against a [`Scope`] that binds
//! a fixed set of root names. The language is a read-only subset of Python's
//! expression syntax:
//!
//! - literals: integers, floats, strings, `True`, `False`, `None`
//! - attribute access `a.b`, subscripts `a[0]`, `a[-1]`, `a["key"]`
//! - arithmetic `+ - * / // % **`, unary `- + not`
//! - comparisons `< <= > >= == !=`, including chains like `0 < x < 10`
//! - short-circuit `and`/`or` returning the deciding operand
//! - calls to a fixed whitelist of pure [`Builtin`]s
//!
//! There is no assignment, no method call, no lambda and no way to reach any
//! name the embedder did not bind.
//!
//! ## Quick Start
//!
//! ```
//! use sparkline_expr::{Expression, Scope};
//! use serde_json::json;
//!
//! let packet = json!({
//!     "game_ball": {"physics": {"velocity": {"x": 1500.0, "y": 1500.0, "z": 0.0}}}
//! });
//! let scope = Scope::new().with_json("packet", &packet);
//!
//! let fast = Expression::compile(
//!     "(packet.game_ball.physics.velocity.x**2 + packet.game_ball.physics.velocity.y**2)**0.5 > 2000",
//! )
//! .unwrap();
//! assert!(fast.test(&scope).unwrap());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod ast;
pub mod builtins;
pub mod error;
mod eval;
pub mod parser;
pub mod scope;
pub mod token;
pub mod value;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub use builtins::Builtin;
pub use error::{EvalError, ExprError};
pub use scope::Scope;
pub use value::{OwnedValue, Value};

use ast::Node;

/// A compiled condition expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parses `source` into an expression.
    ///
    /// # Errors
    ///
    /// Returns an [`ExprError`] describing the first lexical or syntax error.
    pub fn compile(source: &str) -> Result<Self, ExprError> {
        let root = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Parses `source` and verifies that every root name it references is in
    /// `allowed`.
    ///
    /// Catching unknown names here turns a typo into a load-time error
    /// instead of a failure on every tick.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::UndefinedName`] for the first name outside
    /// `allowed`, or any parse error.
    ///
    /// # Example
    ///
    /// ```
    /// use sparkline_expr::{Expression, ExprError};
    ///
    /// let allowed = ["packet", "pid"];
    /// assert!(Expression::compile_with("packet.game_info.is_overtime", &allowed).is_ok());
    /// assert_eq!(
    ///     Expression::compile_with("os.system", &allowed),
    ///     Err(ExprError::UndefinedName { name: "os".into() })
    /// );
    /// ```
    pub fn compile_with(source: &str, allowed: &[&str]) -> Result<Self, ExprError> {
        let expr = Self::compile(source)?;
        if let Some(name) = expr.variables().into_iter().find(|n| !allowed.contains(n)) {
            return Err(ExprError::UndefinedName {
                name: name.to_string(),
            });
        }
        Ok(expr)
    }

    /// The source text this expression was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The root variable names this expression reads, sorted.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.root.collect_names(&mut names);
        names
    }

    /// Evaluates the expression to a value.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] if a name is unbound, an attribute or index is
    /// missing, or an operation is applied to unsupported operands.
    pub fn evaluate<'s>(&'s self, scope: &Scope<'s>) -> Result<Value<'s>, EvalError> {
        eval::eval(&self.root, scope)
    }

    /// Evaluates the expression and applies Python truthiness.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub fn test(&self, scope: &Scope<'_>) -> Result<bool, EvalError> {
        eval::eval(&self.root, scope).map(|v| v.is_truthy())
    }
}

impl FromStr for Expression {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn eval_str(source: &str) -> Result<OwnedValue, EvalError> {
        let expr = Expression::compile(source).unwrap();
        let scope = Scope::new();
        let result = expr.evaluate(&scope).map(Value::into_owned);
        result
    }

    fn packet() -> serde_json::Value {
        json!({
            "num_cars": 2,
            "game_cars": [
                {"name": "Blue Bot", "team": 0, "boost": 33, "score_info": {"score": 100}},
                {"name": "Orange Bot", "team": 1, "boost": 100, "score_info": {"score": 250}}
            ],
            "game_ball": {
                "physics": {
                    "location": {"x": 0.0, "y": 0.0, "z": 350.0},
                    "velocity": {"x": 1200.0, "y": -1600.0, "z": 0.0}
                }
            },
            "game_info": {"is_kickoff_pause": false, "is_match_ended": false, "seconds_elapsed": 42.5}
        })
    }

    mod arithmetic_tests {
        use super::*;

        #[test]
        fn integer_arithmetic_stays_integral() {
            assert_eq!(eval_str("7 + 3 * 2"), Ok(OwnedValue::Int(13)));
            assert_eq!(eval_str("7 // 2"), Ok(OwnedValue::Int(3)));
            assert_eq!(eval_str("2 ** 10"), Ok(OwnedValue::Int(1024)));
        }

        #[test]
        fn long_sums_fail_to_compile_instead_of_overflowing() {
            let source = format!("1{}", "+1".repeat(200_000));
            assert_eq!(
                Expression::compile(&source),
                Err(ExprError::TooDeep {
                    limit: parser::MAX_DEPTH
                })
            );
            assert_eq!(eval_str(&format!("1{}", "+1".repeat(40))), Ok(OwnedValue::Int(41)));
        }

        #[test]
        fn true_division_is_float() {
            assert_eq!(eval_str("7 / 2"), Ok(OwnedValue::Float(3.5)));
            assert_eq!(eval_str("4 / 2"), Ok(OwnedValue::Float(2.0)));
        }

        #[test]
        fn floor_division_and_modulo_follow_divisor_sign() {
            assert_eq!(eval_str("-7 // 2"), Ok(OwnedValue::Int(-4)));
            assert_eq!(eval_str("-7 % 3"), Ok(OwnedValue::Int(2)));
            assert_eq!(eval_str("7 % -3"), Ok(OwnedValue::Int(-2)));
            assert_eq!(eval_str("-7.5 // 2"), Ok(OwnedValue::Float(-4.0)));
        }

        #[test]
        fn unary_minus_binds_looser_than_power() {
            assert_eq!(eval_str("-2 ** 2"), Ok(OwnedValue::Int(-4)));
            assert_eq!(eval_str("(-2) ** 2"), Ok(OwnedValue::Int(4)));
            assert_eq!(eval_str("2 ** -1"), Ok(OwnedValue::Float(0.5)));
        }

        #[test]
        fn overflow_promotes_to_float() {
            assert_eq!(
                eval_str("9223372036854775807 + 1"),
                Ok(OwnedValue::Float(9_223_372_036_854_775_808.0))
            );
        }

        #[test]
        fn division_by_zero() {
            assert_eq!(eval_str("1 / 0"), Err(EvalError::DivisionByZero));
            assert_eq!(eval_str("1 % 0"), Err(EvalError::DivisionByZero));
            assert_eq!(eval_str("0 ** -1"), Err(EvalError::DivisionByZero));
        }

        #[test]
        fn string_concatenation() {
            assert_eq!(eval_str("'ab' + \"cd\""), Ok(OwnedValue::Str("abcd".into())));
            assert!(matches!(
                eval_str("'ab' + 1"),
                Err(EvalError::TypeMismatch { op: "+", .. })
            ));
        }

        #[test]
        fn booleans_are_numbers() {
            assert_eq!(eval_str("True + True"), Ok(OwnedValue::Int(2)));
        }
    }

    mod logic_tests {
        use super::*;

        #[test]
        fn chained_comparison() {
            assert_eq!(eval_str("1 < 2 < 3"), Ok(OwnedValue::Bool(true)));
            assert_eq!(eval_str("1 < 3 < 2"), Ok(OwnedValue::Bool(false)));
            assert_eq!(eval_str("1 == 1.0 != 2"), Ok(OwnedValue::Bool(true)));
        }

        #[test]
        fn and_or_return_deciding_operand() {
            assert_eq!(eval_str("0 or 5"), Ok(OwnedValue::Int(5)));
            assert_eq!(eval_str("3 and 0"), Ok(OwnedValue::Int(0)));
            assert_eq!(eval_str("None or 'x'"), Ok(OwnedValue::Str("x".into())));
        }

        #[test]
        fn short_circuit_skips_errors() {
            assert_eq!(eval_str("False and 1 / 0"), Ok(OwnedValue::Bool(false)));
            assert_eq!(eval_str("True or missing"), Ok(OwnedValue::Bool(true)));
        }

        #[test]
        fn not_applies_truthiness() {
            assert_eq!(eval_str("not 0"), Ok(OwnedValue::Bool(true)));
            assert_eq!(eval_str("not 'x'"), Ok(OwnedValue::Bool(false)));
        }

        #[test]
        fn ordering_mismatched_types_is_an_error() {
            assert!(matches!(
                eval_str("'a' < 1"),
                Err(EvalError::TypeMismatch { op: "<", .. })
            ));
        }
    }

    mod scope_tests {
        use super::*;

        #[test]
        fn attribute_paths_into_snapshot() {
            let packet = packet();
            let scope = Scope::new().with_json("packet", &packet);

            let high = Expression::compile("packet.game_ball.physics.location.z > 300").unwrap();
            assert!(high.test(&scope).unwrap());

            let kickoff = Expression::compile("packet.game_info.is_kickoff_pause").unwrap();
            assert!(!kickoff.test(&scope).unwrap());
        }

        #[test]
        fn speed_formula_from_vector_components() {
            let packet = packet();
            let scope = Scope::new().with_json("packet", &packet);
            let expr = Expression::compile(
                "(packet.game_ball.physics.velocity.x**2 + packet.game_ball.physics.velocity.y**2 \
                 + packet.game_ball.physics.velocity.z**2)**0.5",
            )
            .unwrap();
            assert_eq!(expr.evaluate(&scope).unwrap(), Value::Float(2000.0));
        }

        #[test]
        fn indexing_cars_by_player_index() {
            let packet = packet();
            let scope = Scope::new()
                .with_json("packet", &packet)
                .with("local_player_index", 1_i64);

            let expr = Expression::compile(
                "packet.game_cars[local_player_index].boost == 100 and packet.game_cars[-1].team == 1",
            )
            .unwrap();
            assert!(expr.test(&scope).unwrap());
        }

        #[test]
        fn builtins_over_snapshot_lists() {
            let packet = packet();
            let scope = Scope::new()
                .with_json("packet", &packet)
                .with("playername", "Blue Bot");

            let expr = Expression::compile(
                "len(packet.game_cars) == packet.num_cars and packet.game_cars[0].name == playername",
            )
            .unwrap();
            assert!(expr.test(&scope).unwrap());
        }

        #[test]
        fn missing_attribute_is_reported() {
            let packet = packet();
            let scope = Scope::new().with_json("packet", &packet);
            let expr = Expression::compile("packet.game_info.no_such_field").unwrap();
            assert_eq!(
                expr.evaluate(&scope),
                Err(EvalError::MissingAttribute {
                    attr: "no_such_field".into(),
                    on: "object"
                })
            );
        }

        #[test]
        fn unbound_names_never_resolve() {
            let expr = Expression::compile("__builtins__").unwrap();
            assert_eq!(
                expr.evaluate(&Scope::new()),
                Err(EvalError::UnknownName("__builtins__".into()))
            );
        }

        #[test]
        fn variables_lists_root_names() {
            let expr =
                Expression::compile("packet.game_cars[local_player_index].team == 0 and abs(pid) > 0")
                    .unwrap();
            let vars: Vec<_> = expr.variables().into_iter().collect();
            assert_eq!(vars, vec!["local_player_index", "packet", "pid"]);
        }

        #[test]
        fn from_str_and_display() {
            let expr: Expression = "packet.game_info.is_overtime".parse().unwrap();
            assert_eq!(expr.to_string(), "packet.game_info.is_overtime");
            assert_eq!(expr.source(), "packet.game_info.is_overtime");
        }
    }

    proptest! {
        #[test]
        fn integer_addition_matches_rust(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let result = eval_str(&format!("{a} + ({b})")).unwrap();
            prop_assert_eq!(result, OwnedValue::Int(a + b));
        }

        #[test]
        fn floor_div_and_mod_reconstruct_dividend(a in -10_000i64..10_000, b in -100i64..100) {
            prop_assume!(b != 0);
            let q = eval_str(&format!("({a}) // ({b})")).unwrap();
            let r = eval_str(&format!("({a}) % ({b})")).unwrap();
            let (OwnedValue::Int(q), OwnedValue::Int(r)) = (q, r) else {
                return Err(TestCaseError::fail("expected integers"));
            };
            prop_assert_eq!(q * b + r, a);
            prop_assert!(r == 0 || (r < 0) == (b < 0));
        }

        #[test]
        fn comparison_matches_rust(a in -1000i64..1000, b in -1000i64..1000) {
            prop_assert_eq!(eval_str(&format!("({a}) < ({b})")).unwrap(), OwnedValue::Bool(a < b));
            prop_assert_eq!(eval_str(&format!("({a}) >= ({b})")).unwrap(), OwnedValue::Bool(a >= b));
        }

        #[test]
        fn lexer_never_panics(source in "\\PC{0,40}") {
            let _ = Expression::compile(&source);
        }
    }
}
