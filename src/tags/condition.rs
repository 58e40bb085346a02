//! Conditions of `if`, `elsif` and `unless` tags.

use std::cmp::Ordering;

use crate::compile::{Expression, MarkupParser};
use crate::render::Context;
use crate::{Error, Result, Value};

/// A chain of comparisons joined by `and` and `or`.
///
/// The chain groups from the right, `a or b and c` is
/// `a or (b and c)` and `a and b or c` is `a and (b or c)`.
#[derive(Debug)]
pub struct Conditions {
    first: Condition,
    rest: Vec<(Logic, Condition)>,
}

#[derive(Debug)]
struct Condition {
    left: Expression,
    right: Option<(Operator, Expression)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Logic {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
}

impl Conditions {
    /// Parses the whole markup as a condition chain.
    pub fn parse(p: &mut MarkupParser<'_>) -> Result<Self> {
        let first = Condition::parse(p)?;
        let mut rest = Vec::new();
        loop {
            let logic = if p.keyword("and")? {
                Logic::And
            } else if p.keyword("or")? {
                Logic::Or
            } else {
                break;
            };
            rest.push((logic, Condition::parse(p)?));
        }
        p.finish()?;
        Ok(Self { first, rest })
    }

    pub fn evaluate(&self, cx: &mut Context<'_>) -> Result<bool> {
        self.evaluate_from(cx, 0)
    }

    fn evaluate_from(&self, cx: &mut Context<'_>, i: usize) -> Result<bool> {
        let condition = match i {
            0 => &self.first,
            i => &self.rest[i - 1].1,
        };
        let result = condition.evaluate(cx)?;
        match self.rest.get(i) {
            Some((Logic::And, _)) => Ok(result && self.evaluate_from(cx, i + 1)?),
            Some((Logic::Or, _)) => Ok(result || self.evaluate_from(cx, i + 1)?),
            None => Ok(result),
        }
    }
}

impl Condition {
    fn parse(p: &mut MarkupParser<'_>) -> Result<Self> {
        let left = p.expression()?;
        let right = match p.comparison()? {
            Some(op) => Some((Operator::new(op)?, p.expression()?)),
            None => None,
        };
        Ok(Self { left, right })
    }

    fn evaluate(&self, cx: &mut Context<'_>) -> Result<bool> {
        let left = self.left.evaluate(cx)?;
        match &self.right {
            Some((op, right)) => {
                let right = right.evaluate(cx)?;
                compare(&left, *op, &right)
            }
            None => Ok(left.is_truthy()),
        }
    }
}

impl Operator {
    fn new(op: &str) -> Result<Self> {
        match op {
            "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Le),
            ">=" => Ok(Self::Ge),
            "contains" => Ok(Self::Contains),
            op => Err(Error::syntax_msg(format!("Unknown operator {op}"))),
        }
    }
}

fn compare(left: &Value, op: Operator, right: &Value) -> Result<bool> {
    let ordering = |pred: fn(Ordering) -> bool| match order(left, right) {
        Some(ordering) => Ok(pred(ordering)),
        None => Err(Error::render(format!(
            "comparison of {} with {} failed",
            left.human(),
            right.human()
        ))),
    };
    match op {
        Operator::Eq => Ok(equal(left, right)),
        Operator::Ne => Ok(!equal(left, right)),
        Operator::Lt => ordering(Ordering::is_lt),
        Operator::Gt => ordering(Ordering::is_gt),
        Operator::Le => ordering(Ordering::is_le),
        Operator::Ge => ordering(Ordering::is_ge),
        Operator::Contains => Ok(contains(left, right)),
    }
}

/// Equality with numeric coercion, the `empty` literal equals any empty
/// string, list or map.
fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
            *a as f64 == *b
        }
        (Value::String(s), Value::List(l)) | (Value::List(l), Value::String(s)) => {
            s.is_empty() && l.is_empty()
        }
        (Value::String(s), Value::Map(m)) | (Value::Map(m), Value::String(s)) => {
            s.is_empty() && m.is_empty()
        }
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (a, b) => number(a)?.partial_cmp(&number(b)?),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn contains(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (_, Value::Nil) => false,
        (Value::String(s), right) => s.contains(right.to_liquid_string().as_str()),
        (Value::List(list), right) => list.iter().any(|item| equal(item, right)),
        (Value::Map(map), right) => map.contains_key(&right.to_key()),
        (Value::Range(m, n), Value::Integer(i)) => m <= i && i <= n,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::span::Span;
    use crate::{value, Engine};

    fn eval(markup: &str, env: Value) -> Result<bool> {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        cx.push_environment(env)?;
        let mut p = MarkupParser::new(markup, Span::from(0..markup.len()))?;
        Conditions::parse(&mut p)?.evaluate(&mut cx)
    }

    #[test]
    fn comparisons() {
        let env = value! { a: 1, b: 1.5, s: "hello", list: [1, 2], empty_list: [] };
        assert!(eval("a == 1.0", env.clone()).unwrap());
        assert!(eval("a < b", env.clone()).unwrap());
        assert!(eval("a <> b", env.clone()).unwrap());
        assert!(eval("s >= 'hello'", env.clone()).unwrap());
        assert!(eval("s contains 'ell'", env.clone()).unwrap());
        assert!(eval("list contains 2", env.clone()).unwrap());
        assert!(!eval("list contains nil", env.clone()).unwrap());
        assert!(eval("empty_list == empty", env.clone()).unwrap());
        assert!(eval("(1..5) contains 3", env.clone()).unwrap());
        assert!(!eval("missing", env).unwrap());
    }

    #[test]
    fn logic_groups_from_the_right() {
        let env = value! {};
        assert!(eval("true or false and false", env.clone()).unwrap());
        assert!(!eval("false and false or true", env.clone()).unwrap());
        assert!(eval("true and true and 1 == 1", env).unwrap());
    }

    #[test]
    fn comparison_failure() {
        let err = eval("1 < 'a'", value! {}).unwrap_err();
        assert_eq!(err.message(), "comparison of integer with string failed");
    }

    #[test]
    fn trailing_markup() {
        assert!(eval("a b", value! {}).is_err());
    }
}
