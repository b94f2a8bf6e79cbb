//! QuYAML: a safety-restricted circuit description compiler.
//!
//! This crate reads QuYAML documents, a small YAML dialect for quantum
//! circuits, and lowers them into calls on a [`CircuitBuilder`]. The YAML
//! accepted is deliberately restricted and every embedded language is a
//! closed grammar, so untrusted documents can be compiled without running
//! any of their content.
//!
//! # Pipeline
//!
//! | Stage | Entry point | Output |
//! |-------|-------------|--------|
//! | Safety loading | [`load`] | [`Node`] tree |
//! | Schema + instructions | [`parse`], [`parse_with_config`] | [`Document`] |
//! | Lowering | [`lower`] | calls on a [`CircuitBuilder`] |
//!
//! The loader rejects anchors, aliases, tags and merge keys and bounds input
//! size and nesting. Gate parameters are [`Expr`] trees over a whitelisted
//! arithmetic grammar; classical conditions are [`Condition`] trees.
//!
//! # Example
//!
//! ```rust
//! use quyaml::{BuilderCall, RecordingBuilder, lower, parse};
//!
//! let text = r#"
//! version: 0.4
//! name: bell
//! qubits: q[2]
//! bits: c[2]
//! params: {theta: 0.5}
//! ops:
//!   - h 0
//!   - cx 0 1
//!   - rz($theta * 2) 1
//!   - measure
//! "#;
//!
//! let doc = parse(text).unwrap();
//! assert_eq!(doc.qubit_count, 2);
//!
//! let mut builder = RecordingBuilder::new();
//! let stats = lower(&doc, &mut builder).unwrap();
//! assert_eq!(stats.calls, 5);
//! assert_eq!(
//!     builder.calls()[2],
//!     BuilderCall::AddGate { name: "rz".into(), qubits: vec![1], param: Some(1.0) }
//! );
//! ```
//!
//! # Control flow
//!
//! ```rust
//! use quyaml::{RecordingBuilder, lower, parse};
//!
//! let text = r#"
//! version: 0.4
//! qubits: 1
//! bits: 1
//! ops:
//!   - h 0
//!   - measure 0 0
//!   - if:
//!       cond: c[0] == 1
//!       then: [x 0]
//!       else: [z 0]
//! "#;
//!
//! let doc = parse(text).unwrap();
//! let mut builder = RecordingBuilder::new();
//! lower(&doc, &mut builder).unwrap();
//!
//! let trace: Vec<String> = builder.calls().iter().map(ToString::to_string).collect();
//! assert_eq!(
//!     trace,
//!     ["h 0", "measure 0 -> c[0]", "if c[0] == 1", "x 0", "else", "z 0", "end if"]
//! );
//! ```

pub mod builder;
pub mod condition;
pub mod config;
pub mod document;
pub mod error;
pub mod expr;
pub mod gates;
pub mod instruction;
pub mod loader;
pub mod lower;
pub mod operation;

pub use builder::{BuilderCall, CircuitBuilder, RecordingBuilder};
pub use condition::{Condition, parse_condition};
pub use config::{ConfigError, Limits, ParserConfig};
pub use document::{Document, Version, parse, parse_with_config};
pub use error::{
    BuilderError, ConditionError, Error, ErrorKind, EvalError, ExprError, Register, Result,
    SafetyError,
};
pub use expr::{BinOp, Bindings, Expr, ExprScope, MathFn, UnaryOp, compile, evaluate};
pub use gates::{GateKind, GateSpec};
pub use instruction::{ParseContext, parse_operation, parse_ops};
pub use loader::{Node, load};
pub use lower::{LowerStats, lower};
pub use operation::{ElifBranch, Operation};
