//! Built-in comparison rule language.
//!
//! Grammar, keywords case-insensitive:
//!
//! ```text
//! expr     := and ( OR and )*
//! and      := unary ( AND unary )*
//! unary    := NOT unary | primary
//! primary  := '(' expr ')' | operand [ cmp operand | IS [NOT] NULL ]
//! operand  := "field" | field | 'text' | number | TRUE | FALSE | NULL
//! cmp      := = | == | != | <> | < | <= | > | >=
//! ```
//!
//! Evaluation is three-valued: a comparison involving NULL is unknown, and a
//! row passes only when the whole rule is true.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::models::{FieldDescriptor, FieldValue, Record};

use super::{RowPredicate, RuleError, RuleEvaluator};

static TOKEN_PATTERN: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)] // literal patterns
fn token_pattern() -> &'static Regex {
    TOKEN_PATTERN.get_or_init(|| {
        Regex::new(
            r#"\A(?:(?P<num>-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)|"(?P<field>(?:[^"]|"")*)"|'(?P<text>(?:[^']|'')*)'|(?P<op><=|>=|<>|!=|==|=|<|>)|(?P<lparen>\()|(?P<rparen>\))|(?P<word>[A-Za-z_][A-Za-z0-9_]*))"#,
        )
        .expect("Invalid rule token pattern")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            "=" | "==" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Field(String),
    Text(String),
    Op(CmpOp),
    LParen,
    RParen,
    Word(String),
}

fn tokenize(rule: &str) -> Result<Vec<(usize, Token)>, RuleError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < rule.len() {
        let rest = &rule[pos..];
        let trimmed = rest.trim_start();
        pos += rest.len() - trimmed.len();
        if trimmed.is_empty() {
            break;
        }

        let Some(caps) = token_pattern().captures(trimmed) else {
            return Err(RuleError::Parse {
                position: pos,
                message: format!(
                    "unexpected character '{}'",
                    trimmed.chars().next().unwrap_or_default()
                ),
            });
        };

        let token = if let Some(m) = caps.name("num") {
            let value = m.as_str().parse::<f64>().map_err(|e| RuleError::Parse {
                position: pos,
                message: format!("invalid number: {}", e),
            })?;
            Token::Number(value)
        } else if let Some(m) = caps.name("field") {
            Token::Field(m.as_str().replace("\"\"", "\""))
        } else if let Some(m) = caps.name("text") {
            Token::Text(m.as_str().replace("''", "'"))
        } else if let Some(op) = caps.name("op").and_then(|m| CmpOp::parse(m.as_str())) {
            Token::Op(op)
        } else if caps.name("lparen").is_some() {
            Token::LParen
        } else if caps.name("rparen").is_some() {
            Token::RParen
        } else {
            Token::Word(caps.name("word").map_or("", |m| m.as_str()).to_string())
        };

        tokens.push((pos, token));
        pos += caps.get(0).map_or(0, |m| m.len()).max(1);
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Field(usize),
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Compare(Operand, CmpOp, Operand),
    IsNull { operand: Operand, negated: bool },
    Truthy(Operand),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// Deepest nesting of parentheses and `NOT` accepted in a rule.
const MAX_RULE_NESTING: usize = 64;

/// Most `AND`/`OR` connectives accepted in a rule.
const MAX_RULE_CONNECTIVES: usize = 1024;

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    end: usize,
    depth: usize,
    connectives: usize,
    schema: &'a [FieldDescriptor],
}

impl<'a> Parser<'a> {
    fn new(rule: &str, schema: &'a [FieldDescriptor]) -> Result<Self, RuleError> {
        Ok(Self {
            tokens: tokenize(rule)?,
            cursor: 0,
            end: rule.len(),
            depth: 0,
            connectives: 0,
            schema,
        })
    }

    fn position(&self) -> usize {
        self.tokens.get(self.cursor).map_or(self.end, |(pos, _)| *pos)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(_, token)| token)
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        RuleError::Parse {
            position: self.position(),
            message: message.into(),
        }
    }

    fn keyword(&mut self, word: &str) -> bool {
        match self.peek() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(word) => {
                self.cursor += 1;
                true
            }
            _ => false,
        }
    }

    fn descend(&mut self) -> Result<(), RuleError> {
        if self.depth >= MAX_RULE_NESTING {
            return Err(self.error("rule nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn connective(&mut self) -> Result<(), RuleError> {
        if self.connectives >= MAX_RULE_CONNECTIVES {
            return Err(self.error("rule has too many AND/OR terms"));
        }
        self.connectives += 1;
        Ok(())
    }

    fn parse(mut self) -> Result<Expr, RuleError> {
        if self.tokens.is_empty() {
            return Err(self.error("empty rule"));
        }
        let expr = self.or()?;
        if self.peek().is_some() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.and()?;
        while self.keyword("OR") {
            self.connective()?;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.unary()?;
        while self.keyword("AND") {
            self.connective()?;
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, RuleError> {
        if self.keyword("NOT") {
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, RuleError> {
        if self.peek() == Some(&Token::LParen) {
            self.descend()?;
            self.cursor += 1;
            let inner = self.or()?;
            if self.peek() != Some(&Token::RParen) {
                return Err(self.error("expected ')'"));
            }
            self.cursor += 1;
            self.depth -= 1;
            return Ok(inner);
        }

        let left = self.operand()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.cursor += 1;
            let right = self.operand()?;
            return Ok(Expr::Compare(left, op, right));
        }
        if self.keyword("IS") {
            let negated = self.keyword("NOT");
            if !self.keyword("NULL") {
                return Err(self.error("expected NULL after IS"));
            }
            return Ok(Expr::IsNull {
                operand: left,
                negated,
            });
        }
        Ok(Expr::Truthy(left))
    }

    fn operand(&mut self) -> Result<Operand, RuleError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("unexpected end of rule"));
        };
        let operand = match token {
            Token::Number(n) => Operand::Number(n),
            Token::Text(t) => Operand::Text(t),
            Token::Field(name) => self.field(&name)?,
            Token::Word(word) => match word.to_ascii_uppercase().as_str() {
                "TRUE" => Operand::Bool(true),
                "FALSE" => Operand::Bool(false),
                "NULL" => Operand::Null,
                "AND" | "OR" | "NOT" | "IS" => {
                    return Err(self.error(format!("unexpected keyword {}", word)));
                }
                _ => self.field(&word)?,
            },
            Token::Op(_) | Token::LParen | Token::RParen => {
                return Err(self.error("expected a field or literal"));
            }
        };
        self.cursor += 1;
        Ok(operand)
    }

    fn field(&self, name: &str) -> Result<Operand, RuleError> {
        self.schema
            .iter()
            .find(|f| f.name == name)
            .map(|f| Operand::Field(f.index))
            .ok_or_else(|| RuleError::UnknownField(name.to_string()))
    }
}

/// Runtime value of an operand.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    fn of(operand: &Operand, record: &Record) -> Self {
        match operand {
            Operand::Field(index) => match record.value(*index) {
                FieldValue::Null => Self::Null,
                FieldValue::Bool(b) => Self::Bool(*b),
                FieldValue::Integer(i) => Self::Number(*i as f64),
                FieldValue::Real(r) => Self::Number(*r),
                FieldValue::Text(t) => Self::Text(t.clone()),
                other => Self::Text(other.display_string()),
            },
            Operand::Text(t) => Self::Text(t.clone()),
            Operand::Number(n) => Self::Number(*n),
            Operand::Bool(b) => Self::Bool(*b),
            Operand::Null => Self::Null,
        }
    }
}

fn as_number(text: &str) -> Result<f64, RuleError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| RuleError::Evaluation(format!("'{}' is not a number", text)))
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> Result<Option<bool>, RuleError> {
    let ordering = match (left, right) {
        (Value::Null, _) | (_, Value::Null) => return Ok(None),
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Number(a), Value::Text(b)) => a.partial_cmp(&as_number(b)?),
        (Value::Text(a), Value::Number(b)) => as_number(a)?.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Number(b)) => f64::from(u8::from(*a)).partial_cmp(b),
        (Value::Number(a), Value::Bool(b)) => a.partial_cmp(&f64::from(u8::from(*b))),
        (Value::Bool(_), Value::Text(_)) | (Value::Text(_), Value::Bool(_)) => {
            return Err(RuleError::Evaluation(
                "cannot compare text with a boolean".to_string(),
            ));
        }
    };
    ordering
        .map(|o| Some(op.holds(o)))
        .ok_or_else(|| RuleError::Evaluation("comparison with NaN".to_string()))
}

fn truthy(value: &Value) -> Result<Option<bool>, RuleError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => Ok(Some(*n != 0.0)),
        Value::Text(t) => as_number(t).map(|n| Some(n != 0.0)),
    }
}

fn eval(expr: &Expr, record: &Record) -> Result<Option<bool>, RuleError> {
    match expr {
        Expr::Compare(left, op, right) => {
            compare(&Value::of(left, record), *op, &Value::of(right, record))
        }
        Expr::IsNull { operand, negated } => {
            let is_null = Value::of(operand, record) == Value::Null;
            Ok(Some(is_null != *negated))
        }
        Expr::Truthy(operand) => truthy(&Value::of(operand, record)),
        Expr::Not(inner) => Ok(eval(inner, record)?.map(|b| !b)),
        Expr::And(left, right) => {
            let l = eval(left, record)?;
            if l == Some(false) {
                return Ok(Some(false));
            }
            let r = eval(right, record)?;
            Ok(match (l, r) {
                (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            })
        }
        Expr::Or(left, right) => {
            let l = eval(left, record)?;
            if l == Some(true) {
                return Ok(Some(true));
            }
            let r = eval(right, record)?;
            Ok(match (l, r) {
                (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            })
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    expr: Expr,
}

impl RowPredicate for CompiledRule {
    fn evaluate(&self, record: &Record) -> Result<bool, RuleError> {
        Ok(eval(&self.expr, record)? == Some(true))
    }
}

/// Evaluator for comparison rules such as `"age" >= 18 AND "name" IS NOT NULL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonRuleEvaluator;

impl RuleEvaluator for ComparisonRuleEvaluator {
    fn compile(
        &self,
        rule: &str,
        schema: &[FieldDescriptor],
    ) -> Result<Box<dyn RowPredicate>, RuleError> {
        let expr = Parser::new(rule, schema)?.parse()?;
        Ok(Box::new(CompiledRule { expr }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldDomain;

    fn schema() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("age", FieldDomain::Numeric, 0),
            FieldDescriptor::new("name", FieldDomain::Text, 1),
            FieldDescriptor::new("active", FieldDomain::Other, 2),
        ]
    }

    fn row(age: FieldValue, name: FieldValue, active: FieldValue) -> Record {
        Record::new(0, vec![age, name, active])
    }

    fn check(rule: &str, record: &Record) -> Result<bool, RuleError> {
        ComparisonRuleEvaluator
            .compile(rule, &schema())
            .unwrap()
            .evaluate(record)
    }

    #[test]
    fn test_numeric_comparisons() {
        let r = row(FieldValue::Integer(25), "Ann".into(), FieldValue::Bool(true));
        assert_eq!(check(r#""age" > 20"#, &r), Ok(true));
        assert_eq!(check(r#""age" <= 20"#, &r), Ok(false));
        assert_eq!(check("age = 25", &r), Ok(true));
        assert_eq!(check(r#""age" <> 25"#, &r), Ok(false));
        assert_eq!(check(r#""age" >= -1.5e1"#, &r), Ok(true));
    }

    #[test]
    fn test_text_and_logic() {
        let r = row(FieldValue::Integer(25), "O'Brien".into(), FieldValue::Bool(false));
        assert_eq!(check(r#""name" = 'O''Brien'"#, &r), Ok(true));
        assert_eq!(
            check(r#""age" > 30 or ("name" != 'x' and not "active")"#, &r),
            Ok(true)
        );
        assert_eq!(check(r#""active" = FALSE"#, &r), Ok(true));
    }

    #[test]
    fn test_null_handling() {
        let r = row(FieldValue::Null, "Ann".into(), FieldValue::Null);
        assert_eq!(check(r#""age" IS NULL"#, &r), Ok(true));
        assert_eq!(check(r#""name" is not null"#, &r), Ok(true));
        assert_eq!(check(r#""age" > 1"#, &r), Ok(false));
        assert_eq!(check(r#"NOT ("age" > 1)"#, &r), Ok(false));
        assert_eq!(check(r#""age" > 1 OR "name" = 'Ann'"#, &r), Ok(true));
    }

    #[test]
    fn test_type_mismatch_is_an_evaluation_error() {
        let r = row("bad".into(), "Ann".into(), FieldValue::Null);
        assert!(matches!(
            check(r#""age" > 20"#, &r),
            Err(RuleError::Evaluation(_))
        ));

        let r = row(" 42 ".into(), "Ann".into(), FieldValue::Null);
        assert_eq!(check(r#""age" > 20"#, &r), Ok(true));
    }

    #[test]
    fn test_parse_errors() {
        let schema = schema();
        let compile = |rule: &str| ComparisonRuleEvaluator.compile(rule, &schema).err();

        assert!(matches!(compile(""), Some(RuleError::Parse { .. })));
        assert!(matches!(compile(r#""age" >"#), Some(RuleError::Parse { .. })));
        assert!(matches!(compile(r#"("age" > 1"#), Some(RuleError::Parse { .. })));
        assert!(matches!(compile(r#""age" > 1 1"#), Some(RuleError::Parse { .. })));
        assert!(matches!(compile(r#""age" ~ 1"#), Some(RuleError::Parse { position: 6, .. })));
        assert_eq!(
            compile(r#""height" > 1"#),
            Some(RuleError::UnknownField("height".to_string()))
        );
    }

    #[test]
    fn test_nesting_limit() {
        let schema = schema();
        let nested = |depth: usize| {
            format!("{}\"age\" > 1{}", "(".repeat(depth), ")".repeat(depth))
        };

        assert!(ComparisonRuleEvaluator
            .compile(&nested(MAX_RULE_NESTING), &schema)
            .is_ok());
        assert!(matches!(
            ComparisonRuleEvaluator.compile(&nested(200_000), &schema).err(),
            Some(RuleError::Parse { position, .. }) if position == MAX_RULE_NESTING
        ));

        let negations = format!("{}\"age\" > 1", "NOT ".repeat(100_000));
        assert!(matches!(
            ComparisonRuleEvaluator.compile(&negations, &schema).err(),
            Some(RuleError::Parse { .. })
        ));
    }

    #[test]
    fn test_connective_limit() {
        let schema = schema();
        let chain = |terms: usize| vec![r#""age" > 1"#; terms].join(" AND ");

        let r = row(FieldValue::Integer(25), "Ann".into(), FieldValue::Null);
        let rule = ComparisonRuleEvaluator
            .compile(&chain(MAX_RULE_CONNECTIVES + 1), &schema)
            .unwrap();
        assert_eq!(rule.evaluate(&r), Ok(true));

        assert!(matches!(
            ComparisonRuleEvaluator
                .compile(&chain(MAX_RULE_CONNECTIVES + 2), &schema)
                .err(),
            Some(RuleError::Parse { .. })
        ));
    }
}
