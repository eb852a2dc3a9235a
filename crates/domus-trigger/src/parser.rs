//! Recursive-descent compiler from trigger text to [`TriggerCondition`]
//!
//! ```text
//! condition   := orExpr
//! orExpr      := andExpr ( "|" andExpr )*
//! andExpr     := notExpr ( "&" notExpr )*
//! notExpr     := [ "!" ] atom
//! atom        := event | "(" orExpr ")"
//! event       := stableEvent | transientEventToken
//! stableEvent := idToken ( "==" | "!=" | ">" | "<" | ">=" | "<=" ) [ literal ]
//! ```

use crate::condition::{Comparison, Expr, Operand, TriggerCondition};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{Lexer, Token, TokenKind};

/// Deepest allowed nesting of parenthesized groups
pub const MAX_NESTING: usize = 256;

/// Compile trigger source text
pub fn compile(source: &str) -> CompileResult<TriggerCondition> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let root = parser.or_expr()?;
    parser.expect_end()?;
    Ok(TriggerCondition::new(source, root))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open groups around the current position
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn error_at(token: &Token, message: impl Into<String>) -> CompileError {
        CompileError::new(token.line, token.column, message)
    }

    fn expect_end(&self) -> CompileResult<()> {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(Self::error_at(
                token,
                format!("unexpected {}", token.kind.describe()),
            ))
        }
    }

    fn or_expr(&mut self) -> CompileResult<Expr> {
        let mut children = vec![self.and_expr()?];
        while self.peek().kind == TokenKind::Or {
            self.advance();
            children.push(self.and_expr()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            Expr::Or(children)
        })
    }

    fn and_expr(&mut self) -> CompileResult<Expr> {
        let mut children = vec![self.not_expr()?];
        while self.peek().kind == TokenKind::And {
            self.advance();
            children.push(self.not_expr()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            Expr::And(children)
        })
    }

    fn not_expr(&mut self) -> CompileResult<Expr> {
        if self.peek().kind == TokenKind::Not {
            self.advance();
            return Ok(Expr::Not(Box::new(self.atom()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> CompileResult<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::LParen => {
                if self.depth == MAX_NESTING {
                    return Err(Self::error_at(
                        &token,
                        format!("groups nested deeper than {} levels", MAX_NESTING),
                    ));
                }
                self.depth += 1;
                let inner = self.or_expr()?;
                self.depth -= 1;
                let close = self.advance();
                if close.kind != TokenKind::RParen {
                    return Err(Self::error_at(
                        &close,
                        format!("expected ')' but found {}", close.kind.describe()),
                    ));
                }
                Ok(inner)
            }
            TokenKind::Id(id) => self.event(id, token.line),
            ref other => Err(Self::error_at(
                &token,
                format!("expected event id or '(' but found {}", other.describe()),
            )),
        }
    }

    fn event(&mut self, id: String, line: usize) -> CompileResult<Expr> {
        let TokenKind::Op(op) = self.peek().kind else {
            return Ok(Expr::Transient(id));
        };
        let op_token = self.advance();

        let operand = match &self.peek().kind {
            TokenKind::Str(s) => Operand::String(s.clone()),
            TokenKind::Number(n) => Operand::Number(*n),
            TokenKind::Bool(b) => Operand::Bool(*b),
            TokenKind::Unknown => Operand::Unknown,
            // Omitted literal: presence test
            TokenKind::Or | TokenKind::And | TokenKind::RParen | TokenKind::Eof => {
                Operand::Unknown
            }
            other => {
                return Err(Self::error_at(
                    self.peek(),
                    format!("expected literal but found {}", other.describe()),
                ))
            }
        };
        if matches!(
            self.peek().kind,
            TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::Bool(_) | TokenKind::Unknown
        ) {
            self.advance();
        }

        if !op.is_equality() {
            match operand {
                Operand::Bool(_) => {
                    return Err(Self::error_at(
                        &op_token,
                        format!("operator '{}' cannot compare booleans", op),
                    ))
                }
                Operand::Unknown => {
                    return Err(Self::error_at(
                        &op_token,
                        format!("operator '{}' cannot be used in a presence test", op),
                    ))
                }
                _ => {}
            }
        }

        Ok(Expr::Compare(Comparison {
            id,
            op,
            operand,
            line,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::CompareOp;

    fn id(s: &str) -> Expr {
        Expr::Transient(s.to_string())
    }

    #[test]
    fn test_single_transient() {
        let c = compile("door").unwrap();
        assert_eq!(c.root(), &id("door"));
        assert_eq!(c.source(), "door");
    }

    #[test]
    fn test_precedence() {
        let c = compile("a | b & !c").unwrap();
        assert_eq!(
            c.root(),
            &Expr::Or(vec![
                id("a"),
                Expr::And(vec![id("b"), Expr::Not(Box::new(id("c")))]),
            ])
        );

        let c = compile("(a | b) & c").unwrap();
        assert_eq!(
            c.root(),
            &Expr::And(vec![Expr::Or(vec![id("a"), id("b")]), id("c")])
        );
    }

    #[test]
    fn test_comparisons() {
        let c = compile("zone(2).active == true").unwrap();
        assert_eq!(
            c.root(),
            &Expr::Compare(Comparison {
                id: "zone(2).active".to_string(),
                op: CompareOp::Eq,
                operand: Operand::Bool(true),
                line: 1,
            })
        );

        let c = compile("temp(1) >= -2.5").unwrap();
        let Expr::Compare(cmp) = c.root() else {
            panic!("expected comparison");
        };
        assert_eq!(cmp.op, CompareOp::Ge);
        assert_eq!(cmp.operand, Operand::Number(-2.5));

        let c = compile("door.lock != \"locked\"").unwrap();
        let Expr::Compare(cmp) = c.root() else {
            panic!("expected comparison");
        };
        assert_eq!(cmp.operand, Operand::String("locked".to_string()));
    }

    #[test]
    fn test_presence_tests() {
        for source in ["alarm.code ==", "alarm.code == unknown", "(alarm.code ==)"] {
            let c = compile(source).unwrap();
            let Expr::Compare(cmp) = c.root() else {
                panic!("expected comparison for {}", source);
            };
            assert_eq!(cmp.operand, Operand::Unknown, "{}", source);
        }

        let c = compile("a != & b").unwrap();
        let Expr::And(children) = c.root() else {
            panic!("expected and");
        };
        assert!(matches!(
            &children[0],
            Expr::Compare(Comparison { op: CompareOp::Ne, operand: Operand::Unknown, .. })
        ));
    }

    #[test]
    fn test_comparison_line_numbers() {
        let c = compile("a == 1 |\n\n  b == \"x\"").unwrap();
        let Expr::Or(children) = c.root() else {
            panic!("expected or");
        };
        let Expr::Compare(second) = &children[1] else {
            panic!("expected comparison");
        };
        assert_eq!(second.line, 3);
    }

    #[test]
    fn test_syntax_errors() {
        let err = compile("a &").unwrap_err();
        assert_eq!((err.line, err.column), (1, 4));

        let err = compile("(a | b").unwrap_err();
        assert!(err.message.contains("expected ')'"), "{}", err);

        let err = compile("a == 1 b").unwrap_err();
        assert_eq!(err.message, "unexpected event id 'b'");

        let err = compile("a == b").unwrap_err();
        assert!(err.message.starts_with("expected literal"), "{}", err);

        let err = compile("!!a").unwrap_err();
        assert_eq!(err.column, 2);

        let err = compile("").unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |levels: usize| {
            format!("{}door{}", "(".repeat(levels), ")".repeat(levels))
        };

        let condition = compile(&nested(MAX_NESTING)).unwrap();
        assert_eq!(condition.root(), &Expr::Transient("door".to_string()));

        let err = compile(&nested(MAX_NESTING + 1)).unwrap_err();
        assert_eq!((err.line, err.column), (1, MAX_NESTING + 1));
        assert!(err.message.contains("nested deeper"), "{}", err);

        // Far past the limit is still an error, not a crash
        assert!(compile(&nested(20_000)).is_err());
    }

    #[test]
    fn test_ordering_rejected_for_booleans_and_presence() {
        let err = compile("door.open > true").unwrap_err();
        assert_eq!(err.message, "operator '>' cannot compare booleans");

        let err = compile("x\n<= unknown").unwrap_err();
        assert_eq!((err.line, err.column), (2, 1));
    }

    #[test]
    fn test_display_recompiles() {
        let sources = [
            "a | b & !c",
            "(a | b) & c",
            "!(!a)",
            "zone(2).active == true & temp >= 21.5",
            "door.lock != \"lo\\\"cked\" | alarm.code ==",
            "!(x < -3 | y == 'z')",
            "temp > 1e300 & temp < -2.5e-10",
        ];
        for source in sources {
            let first = compile(source).unwrap();
            let second = compile(&first.to_string()).unwrap();
            assert_eq!(first.root(), second.root(), "{}", source);
        }
    }
}
