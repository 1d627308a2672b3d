//! Compiled handler conditions.
//!
//! Condition sources are compiled once when a plugin loads. Each tick the host
//! serializes the snapshot into a [`ConditionInputs`] and evaluates every
//! compiled condition against the same read-only [`Scope`].

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value as Json;
use sparkline_expr::{EvalError, ExprError, Expression, Scope};
use tracing::{trace, warn};

use crate::plugin::{ConditionSpec, HandlerParams, PluginId, TickContext};

/// The only names a condition can read.
pub const CONDITION_VARIABLES: [&str; 5] = [
    "packet",
    "local_player_index",
    "playername",
    "field_info",
    "pid",
];

/// A condition ready for per-tick evaluation.
#[derive(Debug)]
pub struct CompiledCondition {
    handler: String,
    params: HandlerParams,
    expression: Expression,
    failing: AtomicBool,
}

impl CompiledCondition {
    /// Compiles `spec`, rejecting names outside [`CONDITION_VARIABLES`].
    ///
    /// # Errors
    ///
    /// Returns the parse error, or [`ExprError::UndefinedName`] for an
    /// unknown variable.
    pub fn compile(spec: &ConditionSpec) -> Result<Self, ExprError> {
        let expression = Expression::compile_with(&spec.expression, &CONDITION_VARIABLES)?;
        Ok(Self {
            handler: spec.handler.to_string(),
            params: spec.params,
            expression,
            failing: AtomicBool::new(false),
        })
    }

    /// Handler invoked when the condition holds.
    #[must_use]
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Context values the handler receives.
    #[must_use]
    pub fn params(&self) -> HandlerParams {
        self.params
    }

    /// The condition source.
    #[must_use]
    pub fn source(&self) -> &str {
        self.expression.source()
    }

    /// Evaluates the condition with Python truthiness.
    ///
    /// # Errors
    ///
    /// Returns the evaluation error unchanged.
    pub fn evaluate(&self, scope: &Scope<'_>) -> Result<bool, EvalError> {
        self.expression.test(scope)
    }

    /// Logs an evaluation failure.
    ///
    /// The first failure after a success is logged at `WARN`, repeats at
    /// `TRACE`, so a condition that breaks every tick does not flood the log.
    pub fn report_failure(&self, plugin: &PluginId, error: &EvalError) {
        if self.failing.swap(true, Ordering::AcqRel) {
            trace!(%plugin, handler = %self.handler, %error, "condition still failing");
        } else {
            warn!(
                %plugin,
                handler = %self.handler,
                condition = self.expression.source(),
                %error,
                "condition failed to evaluate"
            );
        }
    }

    /// Clears the failure state after a successful evaluation.
    pub fn report_success(&self) {
        self.failing.store(false, Ordering::Release);
    }

    /// True while the condition is in a failure streak.
    #[must_use]
    pub fn is_failing(&self) -> bool {
        self.failing.load(Ordering::Acquire)
    }
}

/// JSON views of the tick context, built once per tick.
#[derive(Debug)]
pub struct ConditionInputs {
    packet: Json,
    field_info: Json,
}

impl ConditionInputs {
    /// Serializes the packet and field info of `ctx`.
    ///
    /// A snapshot that fails to serialize becomes `None` to conditions.
    #[must_use]
    pub fn from_context(ctx: &TickContext<'_>) -> Self {
        let packet = serde_json::to_value(ctx.packet).unwrap_or_else(|e| {
            warn!(error = %e, "failed to serialize packet for conditions");
            Json::Null
        });
        let field_info = ctx
            .field_info
            .and_then(|f| serde_json::to_value(f).ok())
            .unwrap_or(Json::Null);
        Self { packet, field_info }
    }

    /// Binds every condition variable.
    #[must_use]
    pub fn scope<'a>(&'a self, ctx: &TickContext<'a>) -> Scope<'a> {
        Scope::new()
            .with_json("packet", &self.packet)
            .with(
                "local_player_index",
                i64::try_from(ctx.local_player_index).unwrap_or(i64::MAX),
            )
            .with("playername", ctx.player_name)
            .with_json("field_info", &self.field_info)
            .with("pid", i64::from(ctx.pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FieldInfo, GameTickPacket, PlayerInfo, Vector3};

    fn packet() -> GameTickPacket {
        let mut packet = GameTickPacket::default();
        packet.push_car(PlayerInfo::named("Blue Bot", 0));
        packet.push_car(PlayerInfo::named("Orange Bot", 1));
        packet.game_ball.physics.location = Vector3::new(0.0, 0.0, 420.0);
        packet
    }

    fn ctx<'a>(packet: &'a GameTickPacket, field: Option<&'a FieldInfo>) -> TickContext<'a> {
        TickContext {
            packet,
            local_player_index: 1,
            player_name: "Orange Bot",
            field_info: field,
            tick: 0,
            pid: 77,
        }
    }

    fn compile(expr: &str) -> Result<CompiledCondition, ExprError> {
        CompiledCondition::compile(&ConditionSpec::new(
            "handler",
            expr.to_string(),
            HandlerParams::PACKET,
        ))
    }

    #[test]
    fn every_variable_resolves() {
        let packet = packet();
        let field = FieldInfo::standard();
        let ctx = ctx(&packet, Some(&field));
        let inputs = ConditionInputs::from_context(&ctx);
        let scope = inputs.scope(&ctx);

        let cond = compile(
            "packet.game_cars[local_player_index].name == playername \
             and field_info.num_goals == 2 and pid == 77",
        )
        .unwrap();
        assert_eq!(cond.evaluate(&scope), Ok(true));
    }

    #[test]
    fn missing_field_info_is_none() {
        let packet = packet();
        let ctx = ctx(&packet, None);
        let inputs = ConditionInputs::from_context(&ctx);
        let scope = inputs.scope(&ctx);

        let cond = compile("field_info == None").unwrap();
        assert_eq!(cond.evaluate(&scope), Ok(true));
    }

    #[test]
    fn unknown_variables_rejected_at_compile_time() {
        assert_eq!(
            compile("time.time() > 0").unwrap_err(),
            ExprError::NotCallable { pos: 9 }
        );
        assert_eq!(
            compile("self.enabled").unwrap_err(),
            ExprError::UndefinedName {
                name: "self".into()
            }
        );
    }

    #[test]
    fn failure_streak_is_tracked() {
        let cond = compile("packet.nope").unwrap();
        let packet = packet();
        let ctx = ctx(&packet, None);
        let inputs = ConditionInputs::from_context(&ctx);
        let scope = inputs.scope(&ctx);

        let err = cond.evaluate(&scope).unwrap_err();
        assert!(!cond.is_failing());
        cond.report_failure(&PluginId::new("p"), &err);
        assert!(cond.is_failing());
        cond.report_failure(&PluginId::new("p"), &err);
        assert!(cond.is_failing());
        cond.report_success();
        assert!(!cond.is_failing());
    }

    #[test]
    fn threshold_condition() {
        let packet = packet();
        let ctx = ctx(&packet, None);
        let inputs = ConditionInputs::from_context(&ctx);
        let scope = inputs.scope(&ctx);
        assert_eq!(
            compile("packet.game_ball.physics.location.z > 300")
                .unwrap()
                .evaluate(&scope),
            Ok(true)
        );
        assert_eq!(
            compile("packet.game_ball.physics.location.z > 500")
                .unwrap()
                .evaluate(&scope),
            Ok(false)
        );
    }
}
