//! Trigger evaluation
//!
//! Evaluation is pure: the same tree, arrived event and cached values always
//! give the same result. `Or` and `And` short-circuit left to right, and the
//! order matters because a skipped comparison can never raise a type error.

use domus_core::{Event, Value};
use domus_event_bus::Bus;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::condition::{CompareOp, Comparison, Expr, Operand, TriggerCondition};
use crate::error::{EvalError, EvalResult};

/// Read access to the latest stable values, keyed by event id
pub trait ValueSource {
    /// Simple value of the latest stable event with this id
    fn latest_value(&self, id: &str) -> Option<Value>;
}

impl ValueSource for Bus {
    fn latest_value(&self, id: &str) -> Option<Value> {
        self.get_latest(id)
            .and_then(|event| event.simple_value().cloned())
    }
}

impl ValueSource for HashMap<String, Value> {
    fn latest_value(&self, id: &str) -> Option<Value> {
        self.get(id).cloned()
    }
}

impl<T: ValueSource + ?Sized> ValueSource for Arc<T> {
    fn latest_value(&self, id: &str) -> Option<Value> {
        (**self).latest_value(id)
    }
}

impl<T: ValueSource + ?Sized> ValueSource for &T {
    fn latest_value(&self, id: &str) -> Option<Value> {
        (**self).latest_value(id)
    }
}

impl TriggerCondition {
    /// Evaluate this condition for an arrived event
    ///
    /// Ids other than the arrived event's are resolved through `values`.
    pub fn eval(&self, event: &Event, values: &dyn ValueSource) -> EvalResult<bool> {
        eval_expr(self.root(), event, values)
    }

    /// Whether an event with this id can change the outcome of the condition
    ///
    /// True when a comparison names the id or a transient token matches it.
    pub fn references(&self, event_id: &str) -> bool {
        references(self.root(), event_id)
    }
}

fn references(expr: &Expr, event_id: &str) -> bool {
    match expr {
        Expr::Or(children) | Expr::And(children) => {
            children.iter().any(|child| references(child, event_id))
        }
        Expr::Not(child) => references(child, event_id),
        Expr::Transient(token) => matches_transient(token, event_id),
        Expr::Compare(cmp) => cmp.id == event_id,
    }
}

fn eval_expr(expr: &Expr, event: &Event, values: &dyn ValueSource) -> EvalResult<bool> {
    match expr {
        Expr::Or(children) => {
            for child in children {
                if eval_expr(child, event, values)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::And(children) => {
            for child in children {
                if !eval_expr(child, event, values)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Not(child) => Ok(!eval_expr(child, event, values)?),
        Expr::Transient(token) => Ok(matches_transient(token, event.id())),
        Expr::Compare(cmp) => eval_comparison(cmp, event, values),
    }
}

/// Structural prefix match: `door` matches `door`, `door.open` and
/// `door(1)`, never `doorbell`
pub fn matches_transient(token: &str, event_id: &str) -> bool {
    match event_id.strip_prefix(token) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('('),
        None => false,
    }
}

fn resolve<'a>(id: &str, event: &'a Event, values: &dyn ValueSource) -> Option<Cow<'a, Value>> {
    if id == event.id() {
        event.simple_value().map(Cow::Borrowed)
    } else {
        values.latest_value(id).map(Cow::Owned)
    }
}

fn eval_comparison(cmp: &Comparison, event: &Event, values: &dyn ValueSource) -> EvalResult<bool> {
    let value = resolve(&cmp.id, event, values);

    let result = match (&cmp.operand, value.as_deref()) {
        (Operand::Unknown, value) => match cmp.op {
            CompareOp::Eq => value.is_none(),
            _ => value.is_some(),
        },
        (_, None) => false,
        (Operand::String(literal), Some(Value::String(v))) => cmp.op.holds(v.as_str(), literal.as_str()),
        (Operand::Number(literal), Some(Value::Number(v))) => cmp.op.holds(v, literal),
        (Operand::Bool(literal), Some(Value::Bool(v))) => cmp.op.holds(v, literal),
        (operand, Some(found)) => {
            return Err(EvalError::TypeMismatch {
                line: cmp.line,
                id: cmp.id.clone(),
                expected: operand
                    .expected_kind()
                    .unwrap_or_else(|| found.kind()),
                found: found.kind(),
            });
        }
    };

    trace!(id = %cmp.id, op = %cmp.op, operand = %cmp.operand, result, "Evaluated comparison");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;
    use domus_core::{Node, ValueKind};

    fn driver() -> Node {
        Node::new("test-driver")
    }

    fn values(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn eval(source: &str, event: &Event, cache: &HashMap<String, Value>) -> EvalResult<bool> {
        compile(source).unwrap().eval(event, cache)
    }

    #[test]
    fn test_structural_match() {
        assert!(matches_transient("door", "door"));
        assert!(matches_transient("door", "door.open"));
        assert!(matches_transient("door", "door(1)"));
        assert!(!matches_transient("door", "doorbell"));
        assert!(!matches_transient("door", "front.door"));
        assert!(!matches_transient("door.open", "door"));
    }

    #[test]
    fn test_transient_token_against_arrived_event() {
        let cache = HashMap::new();
        let event = Event::signal(driver(), "door(1)");
        assert!(eval("door", &event, &cache).unwrap());
        assert!(!eval("doorbell", &event, &cache).unwrap());
        assert!(eval("window | door", &event, &cache).unwrap());
    }

    #[test]
    fn test_arrived_value_preferred_over_cache() {
        let cache = values(&[("zone(2).active", Value::Bool(false))]);
        let event = Event::stable(driver(), "zone(2).active", true);

        assert!(eval("zone(2).active == true", &event, &cache).unwrap());
        // Absent ids compare false without raising
        assert!(!eval("zone(3).active == true", &event, &cache).unwrap());
    }

    #[test]
    fn test_cached_values() {
        let cache = values(&[
            ("temp(1)", Value::Number(21.5)),
            ("mode", Value::from("away")),
            ("armed", Value::Bool(true)),
        ]);
        let event = Event::signal(driver(), "tick");

        assert!(eval("temp(1) > 20", &event, &cache).unwrap());
        assert!(eval("temp(1) <= 21.5", &event, &cache).unwrap());
        assert!(!eval("temp(1) != 21.5", &event, &cache).unwrap());
        assert!(eval("mode == \"away\"", &event, &cache).unwrap());
        assert!(eval("mode > \"alpha\" & mode < \"home\"", &event, &cache).unwrap());
        assert!(eval("armed != false", &event, &cache).unwrap());
        assert!(eval("!(armed == false)", &event, &cache).unwrap());
    }

    #[test]
    fn test_presence_test() {
        let cache = values(&[("alarm.code", Value::from("1234"))]);
        let event = Event::signal(driver(), "tick");

        assert!(eval("alarm.code !=", &event, &cache).unwrap());
        assert!(!eval("alarm.code ==", &event, &cache).unwrap());
        assert!(eval("siren.on == unknown", &event, &cache).unwrap());

        // Presence tests never raise, whatever the value kind
        assert!(eval("alarm.code != & alarm.code == \"1234\"", &event, &cache).unwrap());
        let valueless = Event::signal(driver(), "bell");
        assert!(eval("bell ==", &valueless, &cache).unwrap());
    }

    #[test]
    fn test_type_mismatch() {
        let cache = values(&[("door.lock", Value::Bool(true))]);
        let event = Event::signal(driver(), "tick");

        let err = eval("\ndoor.lock == \"locked\"", &event, &cache).unwrap_err();
        assert_eq!(
            err,
            EvalError::TypeMismatch {
                line: 2,
                id: "door.lock".to_string(),
                expected: ValueKind::String,
                found: ValueKind::Bool,
            }
        );
        assert_eq!(
            err.to_string(),
            "line 2: type error: door.lock is not a string (found boolean)"
        );
    }

    #[test]
    fn test_type_mismatch_propagates_through_not() {
        let cache = values(&[("level", Value::from("high"))]);
        let event = Event::signal(driver(), "tick");
        assert!(eval("!(level > 3)", &event, &cache).is_err());
    }

    #[test]
    fn test_short_circuit_skips_type_errors() {
        let cache = values(&[("door.lock", Value::Bool(true))]);
        let event = Event::signal(driver(), "tick");
        let bad = "door.lock == \"locked\"";

        assert!(!eval(&format!("door.lock == false & {}", bad), &event, &cache).unwrap());
        assert!(eval(&format!("door.lock == true | {}", bad), &event, &cache).unwrap());
        assert!(eval(&format!("tick | {}", bad), &event, &cache).unwrap());

        // Evaluated when not skipped
        assert!(eval(&format!("door.lock == true & {}", bad), &event, &cache).is_err());
        assert!(eval(&format!("{} | tick", bad), &event, &cache).is_err());
    }

    #[test]
    fn test_nan_compares_unequal() {
        let cache = values(&[("reading", Value::Number(f64::NAN))]);
        let event = Event::signal(driver(), "tick");
        assert!(!eval("reading == 0", &event, &cache).unwrap());
        assert!(eval("reading != 0", &event, &cache).unwrap());
        assert!(!eval("reading > 0 | reading <= 0", &event, &cache).unwrap());
    }

    #[test]
    fn test_bus_value_source() {
        let bus = Bus::new();
        bus.post(Event::stable(driver(), "light(4).on", true));
        bus.post(Event::transient(driver(), "light(5).on", true));

        let condition = compile("light(4).on == true & light(5).on ==").unwrap();
        assert!(condition
            .eval(&Event::signal(driver(), "tick"), &bus)
            .unwrap());
    }

    #[test]
    fn test_references() {
        let condition = compile("zone(2).active == true & !(door | alarm.code ==)").unwrap();
        assert!(condition.references("zone(2).active"));
        assert!(condition.references("alarm.code"));
        assert!(condition.references("door(1).open"));
        assert!(!condition.references("zone(2)"));
        assert!(!condition.references("doorbell"));
        assert!(!condition.references("siren.on"));
    }
}
