//! Error types for the QuYAML compiler.

use std::fmt;

use thiserror::Error;

/// A structural feature the safety loader refuses to accept.
///
/// `at` names where the violation was found: `line N` when the marker scan
/// caught it, or a field path when the structural pass did.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SafetyError {
    /// Anchor definition (`&name`).
    #[error("YAML anchors (&name) are not allowed ({at})")]
    Anchor { at: String },

    /// Alias reference (`*name`).
    #[error("YAML aliases (*name) are not allowed ({at})")]
    Alias { at: String },

    /// Custom or core tag (`!tag`, `!!str`).
    #[error("YAML tags (!tag) are not allowed ({at})")]
    Tag { at: String },

    /// Merge key (`<<:`).
    #[error("YAML merge keys (<<) are not allowed ({at})")]
    MergeKey { at: String },

    /// Input exceeds the configured size ceiling.
    #[error("Document too large: {size} bytes exceeds limit of {limit}")]
    InputTooLarge { size: usize, limit: usize },

    /// Nesting exceeds the configured depth ceiling.
    #[error("Document nesting depth {depth} exceeds limit of {limit}")]
    NestingTooDeep { depth: usize, limit: usize },

    /// Mapping key that is a sequence or mapping.
    #[error("Mapping key at '{path}' is not a scalar")]
    NonScalarKey { path: String },

    /// Declared register larger than the configured ceiling.
    #[error("Register '{path}' size {size} exceeds limit of {limit}")]
    RegisterTooLarge { path: String, size: u64, limit: usize },
}

/// Errors from compiling a parameter expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ExprError {
    /// Malformed expression text.
    #[error("Invalid expression syntax in '{expr}': {message}")]
    Syntax { expr: String, message: String },

    /// Identifier, function or construct outside the whitelist.
    #[error("Disallowed construct in '{expr}': {construct}")]
    Disallowed { expr: String, construct: String },

    /// `$name` reference to a parameter that does not exist.
    #[error("Parameter '{name}' not defined in parameters block")]
    UndefinedParameter { name: String },
}

/// Errors from evaluating a compiled expression.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum EvalError {
    /// Division or remainder by zero, or zero raised to a negative power.
    #[error("Division by zero")]
    DivisionByZero,

    /// Argument outside the domain of a function or operator.
    #[error("Math domain error: {func}({arg})")]
    Domain { func: &'static str, arg: f64 },

    /// Result is infinite or NaN.
    #[error("Result is not a finite number")]
    NonFinite,

    /// Name has no binding.
    #[error("No value bound for '{0}'")]
    Unbound(String),
}

/// Errors from parsing a classical condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConditionError {
    /// Blank condition text.
    #[error("Empty condition string")]
    Empty,

    /// Text does not match the condition grammar.
    #[error("Invalid condition '{cond}': {message}")]
    Syntax { cond: String, message: String },

    /// `c[i]` with `i >= bit_count`.
    #[error("Condition references c[{index}] but circuit has {bit_count} bits")]
    BitOutOfRange { index: usize, bit_count: usize },

    /// `c == v` where `v` needs more than `bit_count` bits.
    #[error("Condition value {value} doesn't fit in {bit_count} classical bits")]
    ValueOutOfRange { value: u64, bit_count: usize },

    /// Condition on a circuit without classical bits.
    #[error("Conditions require classical bits; define 'bits: c[n]'")]
    NoClassicalBits,
}

/// Rejection reported by a circuit builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BuilderError(pub String);

impl BuilderError {
    /// Create a builder error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Which register an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Qubit,
    Clbit,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Qubit => write!(f, "Qubit"),
            Register::Clbit => write!(f, "Classical bit"),
        }
    }
}

/// Errors that can occur while parsing or lowering a document.
///
/// Every variant after `Yaml` carries the field path of the offending entry,
/// e.g. `ops[2].if.then[0]`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Disallowed structural feature or exceeded resource ceiling.
    #[error(transparent)]
    Safety(#[from] SafetyError),

    /// Text is not well-formed YAML.
    #[error("Invalid YAML syntax: {0}")]
    Yaml(String),

    /// Missing, extra or mistyped top-level field.
    #[error("Schema error at '{path}': {message}")]
    Schema { path: String, message: String },

    /// Mnemonic not in the gate registry.
    #[error("Unknown gate '{name}' at '{path}'")]
    UnknownGate { path: String, name: String },

    /// Qubit or bit index beyond the declared register size.
    #[error("{register} index {index} out of bounds (circuit has {size}) at '{path}'")]
    IndexOutOfRange {
        path: String,
        register: Register,
        index: usize,
        size: usize,
    },

    /// Expression references an unbound parameter.
    #[error("Parameter '{name}' not defined in parameters block (at '{path}')")]
    UndefinedParameter { path: String, name: String },

    /// Malformed parameter expression.
    #[error("Expression syntax error at '{path}' in '{expr}': {message}")]
    ExpressionSyntax {
        path: String,
        expr: String,
        message: String,
    },

    /// Non-whitelisted operator, function or identifier.
    #[error("Disallowed construct at '{path}' in '{expr}': {construct}")]
    DisallowedConstruct {
        path: String,
        expr: String,
        construct: String,
    },

    /// Malformed or out-of-range classical condition.
    #[error("Condition error at '{path}': {message}")]
    ConditionSyntax { path: String, message: String },

    /// Malformed control block or structured operation.
    #[error("Malformed block at '{path}': {message}")]
    Structural { path: String, message: String },

    /// Shorthand instruction text that cannot be split into parts.
    #[error("Invalid instruction at '{path}': {message}")]
    InvalidInstruction { path: String, message: String },

    /// Wrong number of operands.
    #[error("Gate '{gate}' expects {expected} operands, got {got} (at '{path}')")]
    OperandCount {
        path: String,
        gate: String,
        expected: usize,
        got: usize,
    },

    /// Wrong number of parameters.
    #[error("Gate '{gate}' expects {expected} parameters, got {got} (at '{path}')")]
    ParameterCount {
        path: String,
        gate: String,
        expected: usize,
        got: usize,
    },

    /// Same qubit used twice in one gate.
    #[error("Duplicate qubit {qubit} in gate '{gate}' (at '{path}')")]
    DuplicateQubit {
        path: String,
        gate: String,
        qubit: usize,
    },

    /// Arithmetic failure while evaluating a parameter during lowering.
    #[error("Evaluation failed at '{path}': {source}")]
    Evaluation {
        path: String,
        #[source]
        source: EvalError,
    },

    /// The builder rejected a call during lowering.
    #[error("Builder rejected call at '{path}': {source}")]
    Builder {
        path: String,
        #[source]
        source: BuilderError,
    },

    /// Begin/end calls would not pair up.
    #[error("Unbalanced scope at '{path}': {message}")]
    ScopeMismatch { path: String, message: String },
}

/// Stable category of an [`Error`], used by callers that report errors to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Safety,
    Syntax,
    Schema,
    UnknownGate,
    IndexOutOfRange,
    UndefinedParameter,
    ExpressionSyntax,
    DisallowedConstruct,
    ConditionSyntax,
    Structural,
    Parse,
    Evaluation,
    Lowering,
}

impl ErrorKind {
    /// Name shown to users.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Safety => "SafetyError",
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Schema => "SchemaError",
            ErrorKind::UnknownGate => "UnknownGate",
            ErrorKind::IndexOutOfRange => "IndexOutOfRange",
            ErrorKind::UndefinedParameter => "UndefinedParameter",
            ErrorKind::ExpressionSyntax => "ExpressionSyntaxError",
            ErrorKind::DisallowedConstruct => "DisallowedConstruct",
            ErrorKind::ConditionSyntax => "ConditionSyntaxError",
            ErrorKind::Structural => "StructuralError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Evaluation => "EvalError",
            ErrorKind::Lowering => "LoweringError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Safety(_) => ErrorKind::Safety,
            Error::Yaml(_) => ErrorKind::Syntax,
            Error::Schema { .. } => ErrorKind::Schema,
            Error::UnknownGate { .. } => ErrorKind::UnknownGate,
            Error::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Error::UndefinedParameter { .. } => ErrorKind::UndefinedParameter,
            Error::ExpressionSyntax { .. } => ErrorKind::ExpressionSyntax,
            Error::DisallowedConstruct { .. } => ErrorKind::DisallowedConstruct,
            Error::ConditionSyntax { .. } => ErrorKind::ConditionSyntax,
            Error::Structural { .. } => ErrorKind::Structural,
            Error::InvalidInstruction { .. }
            | Error::OperandCount { .. }
            | Error::ParameterCount { .. }
            | Error::DuplicateQubit { .. } => ErrorKind::Parse,
            Error::Evaluation { .. } => ErrorKind::Evaluation,
            Error::Builder { .. } | Error::ScopeMismatch { .. } => ErrorKind::Lowering,
        }
    }

    /// Attach a field path to an expression compile error.
    pub(crate) fn from_expr(path: &str, err: ExprError) -> Self {
        let path = path.to_string();
        match err {
            ExprError::Syntax { expr, message } => Error::ExpressionSyntax {
                path,
                expr,
                message,
            },
            ExprError::Disallowed { expr, construct } => Error::DisallowedConstruct {
                path,
                expr,
                construct,
            },
            ExprError::UndefinedParameter { name } => Error::UndefinedParameter { path, name },
        }
    }

    /// Attach a field path to a condition parse error.
    pub(crate) fn from_condition(path: &str, err: ConditionError) -> Self {
        match err {
            ConditionError::BitOutOfRange { index, bit_count } => Error::IndexOutOfRange {
                path: path.to_string(),
                register: Register::Clbit,
                index,
                size: bit_count,
            },
            other => Error::ConditionSyntax {
                path: path.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type for QuYAML operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_bit_error_maps_to_index_out_of_range() {
        let err = Error::from_condition(
            "ops[0].if.cond",
            ConditionError::BitOutOfRange {
                index: 1,
                bit_count: 1,
            },
        );
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        assert!(err.to_string().contains("ops[0].if.cond"));
    }

    #[test]
    fn test_expr_errors_keep_their_category() {
        let err = Error::from_expr(
            "ops[1]",
            ExprError::Disallowed {
                expr: "foo(1)".into(),
                construct: "function 'foo'".into(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::DisallowedConstruct);

        let err = Error::from_expr("ops[1]", ExprError::UndefinedParameter { name: "a".into() });
        assert_eq!(err.kind(), ErrorKind::UndefinedParameter);
        assert_eq!(err.kind().as_str(), "UndefinedParameter");
    }

    #[test]
    fn test_safety_error_is_transparent() {
        let err: Error = SafetyError::Anchor {
            at: "line 3".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Safety);
        assert_eq!(
            err.to_string(),
            "YAML anchors (&name) are not allowed (line 3)"
        );
    }
}
