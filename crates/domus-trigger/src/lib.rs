//! Trigger condition language
//!
//! Rules declare when they fire with a small boolean language over events:
//!
//! ```text
//! zone(2).active == true & (alarm.mode == "away" | temp(1) > 30.5) & !maintenance
//! ```
//!
//! - `id OP literal` compares the current value of a stable event against a
//!   string, number or boolean literal. Comparing against a value of a
//!   different kind is a runtime type error.
//! - `id ==` / `id !=` (or `id == unknown`) tests whether the id has a value.
//! - A bare `id` matches the arrival of that event or of any event below it
//!   (`door` matches `door.open` and `door(1)`, not `doorbell`).
//! - `!`, `&` and `|` combine conditions, in decreasing precedence.
//!
//! Triggers are compiled once with [`compile`] and evaluated many times
//! with [`TriggerCondition::eval`].

pub mod condition;
pub mod error;
mod eval;
mod lexer;
mod parser;

pub use condition::{CompareOp, Comparison, Expr, Operand, TriggerCondition};
pub use error::{CompileError, CompileResult, EvalError, EvalResult};
pub use eval::{matches_transient, ValueSource};
pub use parser::compile;
