//! Sandboxed arithmetic for gate parameters.
//!
//! Expressions are compiled once against an [`ExprScope`] that fixes which
//! parameter names and functions exist, then evaluated any number of times
//! against a set of [`Bindings`]. The grammar is closed: numbers, parameter
//! names, `pi`, `e`, the operators `+ - * / % **`, unary `+`/`-`, parentheses
//! and single-argument calls to whitelisted [`MathFn`]s. Nothing else parses.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use quyaml::{ExprScope, compile, evaluate};
//!
//! let scope = ExprScope::new(["theta"]);
//! let expr = compile("$theta / 2 + pi", &scope).unwrap();
//!
//! let bindings = BTreeMap::from([("theta".to_string(), 1.0)]);
//! let value = evaluate(&expr, &bindings).unwrap();
//! assert!((value - (0.5 + std::f64::consts::PI)).abs() < 1e-12);
//! ```

mod lexer;
mod parser;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, ExprError};

/// A compiled parameter expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Numeric literal, or `pi` / `e`.
    Const(f64),
    /// Reference to a document parameter.
    Name(String),
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        func: MathFn,
        arg: Box<Expr>,
    },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Pos,
}

/// Functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathFn {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sqrt,
    Exp,
    Ln,
    Log10,
    Abs,
}

impl MathFn {
    /// Every supported function.
    pub const ALL: [MathFn; 11] = [
        MathFn::Sin,
        MathFn::Cos,
        MathFn::Tan,
        MathFn::Asin,
        MathFn::Acos,
        MathFn::Atan,
        MathFn::Sqrt,
        MathFn::Exp,
        MathFn::Ln,
        MathFn::Log10,
        MathFn::Abs,
    ];

    /// Name as written in expressions.
    pub fn name(self) -> &'static str {
        match self {
            MathFn::Sin => "sin",
            MathFn::Cos => "cos",
            MathFn::Tan => "tan",
            MathFn::Asin => "asin",
            MathFn::Acos => "acos",
            MathFn::Atan => "atan",
            MathFn::Sqrt => "sqrt",
            MathFn::Exp => "exp",
            MathFn::Ln => "ln",
            MathFn::Log10 => "log10",
            MathFn::Abs => "abs",
        }
    }

    /// Look up a function by its expression name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Apply the function, rejecting arguments outside its real domain.
    pub fn apply(self, x: f64) -> Result<f64, EvalError> {
        let domain = || EvalError::Domain {
            func: self.name(),
            arg: x,
        };
        match self {
            MathFn::Sin => Ok(x.sin()),
            MathFn::Cos => Ok(x.cos()),
            MathFn::Tan => Ok(x.tan()),
            MathFn::Asin | MathFn::Acos if !(-1.0..=1.0).contains(&x) => Err(domain()),
            MathFn::Asin => Ok(x.asin()),
            MathFn::Acos => Ok(x.acos()),
            MathFn::Atan => Ok(x.atan()),
            MathFn::Sqrt if x < 0.0 => Err(domain()),
            MathFn::Sqrt => Ok(x.sqrt()),
            MathFn::Exp => Ok(x.exp()),
            MathFn::Ln | MathFn::Log10 if x <= 0.0 => Err(domain()),
            MathFn::Ln => Ok(x.ln()),
            MathFn::Log10 => Ok(x.log10()),
            MathFn::Abs => Ok(x.abs()),
        }
    }
}

impl fmt::Display for MathFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }

    /// Apply the operator with Python-compatible float semantics.
    pub fn apply(self, a: f64, b: f64) -> Result<f64, EvalError> {
        match self {
            BinOp::Add => Ok(a + b),
            BinOp::Sub => Ok(a - b),
            BinOp::Mul => Ok(a * b),
            BinOp::Div | BinOp::Mod if b == 0.0 => Err(EvalError::DivisionByZero),
            BinOp::Div => Ok(a / b),
            BinOp::Mod => {
                // Floored remainder: the result takes the sign of the divisor.
                let r = a % b;
                if r != 0.0 && (r < 0.0) != (b < 0.0) {
                    Ok(r + b)
                } else {
                    Ok(r)
                }
            }
            BinOp::Pow if a == 0.0 && b < 0.0 => Err(EvalError::DivisionByZero),
            BinOp::Pow if a < 0.0 && b.fract() != 0.0 => Err(EvalError::Domain {
                func: "pow",
                arg: a,
            }),
            BinOp::Pow => Ok(a.powf(b)),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{v}"),
            Expr::Name(name) => write!(f, "${name}"),
            Expr::BinOp { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::UnaryOp { op, operand } => match op {
                UnaryOp::Neg => write!(f, "(-{operand})"),
                UnaryOp::Pos => write!(f, "(+{operand})"),
            },
            Expr::Call { func, arg } => write!(f, "{func}({arg})"),
        }
    }
}

impl Expr {
    /// Parameter names referenced by this expression, in first-use order.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'e>(&'e self, out: &mut Vec<&'e str>) {
        match self {
            Expr::Const(_) => {}
            Expr::Name(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::BinOp { left, right, .. } => {
                left.collect_names(out);
                right.collect_names(out);
            }
            Expr::UnaryOp { operand, .. } => operand.collect_names(out),
            Expr::Call { arg, .. } => arg.collect_names(out),
        }
    }
}

/// The names and functions an expression may use.
#[derive(Debug, Clone)]
pub struct ExprScope<'a> {
    parameters: FxHashSet<&'a str>,
    functions: &'a [MathFn],
}

impl<'a> ExprScope<'a> {
    /// Scope over the given parameter names with every function enabled.
    pub fn new(parameters: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_functions(parameters, &MathFn::ALL)
    }

    /// Scope over the given parameter names and function whitelist.
    pub fn with_functions(
        parameters: impl IntoIterator<Item = &'a str>,
        functions: &'a [MathFn],
    ) -> Self {
        Self {
            parameters: parameters.into_iter().collect(),
            functions,
        }
    }

    /// Whether `name` is a declared parameter.
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains(name)
    }

    /// Enabled functions.
    pub fn functions(&self) -> &[MathFn] {
        self.functions
    }
}

/// Source of parameter values during evaluation.
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<f64>;
}

impl Bindings for BTreeMap<String, f64> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl<S: BuildHasher> Bindings for HashMap<String, f64, S> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

/// Compile expression text against a scope.
pub fn compile(text: &str, scope: &ExprScope<'_>) -> Result<Expr, ExprError> {
    parser::Parser::new(text.trim(), scope)?.parse()
}

/// Evaluate a compiled expression.
///
/// Every intermediate result must be finite.
pub fn evaluate<B: Bindings + ?Sized>(expr: &Expr, bindings: &B) -> Result<f64, EvalError> {
    let value = match expr {
        Expr::Const(v) => *v,
        Expr::Name(name) => bindings
            .lookup(name)
            .ok_or_else(|| EvalError::Unbound(name.clone()))?,
        Expr::BinOp { op, left, right } => {
            let a = evaluate(left, bindings)?;
            let b = evaluate(right, bindings)?;
            op.apply(a, b)?
        }
        Expr::UnaryOp { op, operand } => {
            let v = evaluate(operand, bindings)?;
            match op {
                UnaryOp::Neg => -v,
                UnaryOp::Pos => v,
            }
        }
        Expr::Call { func, arg } => func.apply(evaluate(arg, bindings)?)?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFinite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn eval_str(text: &str, params: &[(&str, f64)]) -> Result<f64, EvalError> {
        let scope = ExprScope::new(params.iter().map(|(k, _)| *k));
        let expr = compile(text, &scope).unwrap();
        let bindings: BTreeMap<String, f64> =
            params.iter().map(|(k, v)| ((*k).to_string(), *v)).collect();
        evaluate(&expr, &bindings)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_precedence() {
        assert!(approx(eval_str("1 + 2 * 3", &[]).unwrap(), 7.0));
        assert!(approx(eval_str("(1 + 2) * 3", &[]).unwrap(), 9.0));
        assert!(approx(eval_str("10 - 4 - 3", &[]).unwrap(), 3.0));
        assert!(approx(eval_str("8 / 4 / 2", &[]).unwrap(), 1.0));
    }

    #[test]
    fn test_power_associativity_and_unary() {
        assert!(approx(eval_str("2 ** 3 ** 2", &[]).unwrap(), 512.0));
        assert!(approx(eval_str("-2 ** 2", &[]).unwrap(), -4.0));
        assert!(approx(eval_str("2 ** -1", &[]).unwrap(), 0.5));
        assert!(approx(eval_str("--3", &[]).unwrap(), 3.0));
    }

    #[test]
    fn test_floored_modulo() {
        assert!(approx(eval_str("7 % 3", &[]).unwrap(), 1.0));
        assert!(approx(eval_str("-7 % 3", &[]).unwrap(), 2.0));
        assert!(approx(eval_str("7 % -3", &[]).unwrap(), -2.0));
    }

    #[test]
    fn test_parameters_and_constants() {
        let v = eval_str("$theta / 2", &[("theta", PI)]).unwrap();
        assert!(approx(v, PI / 2.0));
        let v = eval_str("theta * e", &[("theta", 1.0)]).unwrap();
        assert!(approx(v, std::f64::consts::E));
        assert!(approx(eval_str("pi/4", &[]).unwrap(), PI / 4.0));
    }

    #[test]
    fn test_functions() {
        assert!(approx(eval_str("sqrt(16)", &[]).unwrap(), 4.0));
        assert!(approx(eval_str("cos(0) + abs(-2)", &[]).unwrap(), 3.0));
        assert!(approx(eval_str("log10(1000)", &[]).unwrap(), 3.0));
    }

    #[test]
    fn test_evaluation_errors() {
        assert_eq!(eval_str("1 / 0", &[]), Err(EvalError::DivisionByZero));
        assert_eq!(eval_str("1 % 0", &[]), Err(EvalError::DivisionByZero));
        assert_eq!(eval_str("0 ** -1", &[]), Err(EvalError::DivisionByZero));
        assert!(matches!(
            eval_str("sqrt(-1)", &[]),
            Err(EvalError::Domain { func: "sqrt", .. })
        ));
        assert!(matches!(
            eval_str("ln(0)", &[]),
            Err(EvalError::Domain { func: "ln", .. })
        ));
        assert!(matches!(
            eval_str("asin(2)", &[]),
            Err(EvalError::Domain { func: "asin", .. })
        ));
        assert!(matches!(
            eval_str("(-8) ** 0.5", &[]),
            Err(EvalError::Domain { func: "pow", .. })
        ));
        assert_eq!(eval_str("exp(1000)", &[]), Err(EvalError::NonFinite));
    }

    #[test]
    fn test_unbound_at_evaluation() {
        let scope = ExprScope::new(["a"]);
        let expr = compile("a + 1", &scope).unwrap();
        let empty: BTreeMap<String, f64> = BTreeMap::new();
        assert_eq!(evaluate(&expr, &empty), Err(EvalError::Unbound("a".into())));
    }

    #[test]
    fn test_whitelist_rejections() {
        let scope = ExprScope::new(["a"]);
        let disallowed = [
            "__import__('os')",
            "open(1)",
            "a.real",
            "a[0]",
            "'x'",
            "x + 1",
            "sin(1, 2)",
            "sin(x=1)",
            "a = 1",
            "1, 2",
            "[1]",
        ];
        for text in disallowed {
            assert!(
                matches!(compile(text, &scope), Err(ExprError::Disallowed { .. })),
                "{text} should be disallowed"
            );
        }
    }

    #[test]
    fn test_syntax_errors() {
        let scope = ExprScope::new(["a"]);
        for text in ["", "1 +", "(1", "1 2", "sin()", "1 ; 2", "* 3"] {
            assert!(
                matches!(compile(text, &scope), Err(ExprError::Syntax { .. })),
                "{text} should be a syntax error"
            );
        }
    }

    #[test]
    fn test_undefined_dollar_parameter() {
        let scope = ExprScope::new(["a"]);
        assert_eq!(
            compile("$b * 2", &scope),
            Err(ExprError::UndefinedParameter { name: "b".into() })
        );
    }

    #[test]
    fn test_function_whitelist_is_configurable() {
        let scope = ExprScope::with_functions(std::iter::empty(), &[MathFn::Sin]);
        assert!(compile("sin(1)", &scope).is_ok());
        assert!(matches!(
            compile("cos(1)", &scope),
            Err(ExprError::Disallowed { .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let scope = ExprScope::new(std::iter::empty());
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(
            compile(&deep, &scope),
            Err(ExprError::Syntax { .. })
        ));
        let fine = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert!(compile(&fine, &scope).is_ok());
    }

    #[test]
    fn test_display_reparses() {
        let scope = ExprScope::new(["t"]);
        let expr = compile("-$t * 2 ** 3 + sin(pi / 2) % 4", &scope).unwrap();
        let rendered = expr.to_string();
        assert_eq!(compile(&rendered, &scope).unwrap(), expr);
    }

    #[test]
    fn test_parameter_names() {
        let scope = ExprScope::new(["a", "b"]);
        let expr = compile("a * b + a", &scope).unwrap();
        assert_eq!(expr.parameter_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_mathfn_names_round_trip() {
        for f in MathFn::ALL {
            assert_eq!(MathFn::from_name(f.name()), Some(f));
        }
        assert_eq!(MathFn::from_name("eval"), None);
    }
}
