//! Lowering of a parsed document into builder calls.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::builder::CircuitBuilder;
use crate::document::Document;
use crate::error::{BuilderError, Error, Result};
use crate::expr::evaluate;
use crate::operation::Operation;

/// Summary of one lowering run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LowerStats {
    /// Builder calls emitted.
    pub calls: usize,
    /// Deepest control-flow nesting reached.
    pub max_depth: usize,
}

/// Walk the document's operations and drive `builder` with them, in order.
///
/// Parameter expressions are evaluated against the document's parameters
/// immediately before each gate call. The first evaluation failure or builder
/// rejection stops lowering; the builder is then in an unspecified state.
#[instrument(skip_all, fields(circuit = %doc.name))]
pub fn lower<B: CircuitBuilder + ?Sized>(doc: &Document, builder: &mut B) -> Result<LowerStats> {
    let mut lowerer = Lowerer {
        parameters: &doc.parameters,
        builder,
        scopes: Vec::new(),
        stats: LowerStats::default(),
    };
    lowerer.lower_block(&doc.ops, "ops")?;
    lowerer.finish()?;

    debug!(
        calls = lowerer.stats.calls,
        max_depth = lowerer.stats.max_depth,
        "lowered document"
    );
    Ok(lowerer.stats)
}

/// An open control-flow scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    If { else_seen: bool },
    While,
    For,
}

impl Scope {
    fn name(self) -> &'static str {
        match self {
            Scope::If { .. } => "if",
            Scope::While => "while",
            Scope::For => "for",
        }
    }
}

struct Lowerer<'d, 'b, B: ?Sized> {
    parameters: &'d BTreeMap<String, f64>,
    builder: &'b mut B,
    scopes: Vec<Scope>,
    stats: LowerStats,
}

impl<B: CircuitBuilder + ?Sized> Lowerer<'_, '_, B> {
    fn lower_block(&mut self, ops: &[Operation], path: &str) -> Result<()> {
        for (i, op) in ops.iter().enumerate() {
            self.lower_op(op, &format!("{path}[{i}]"))?;
        }
        Ok(())
    }

    fn lower_op(&mut self, op: &Operation, path: &str) -> Result<()> {
        match op {
            Operation::Gate {
                name,
                qubits,
                param,
            } => {
                let value = param
                    .as_ref()
                    .map(|expr| evaluate(expr, self.parameters))
                    .transpose()
                    .map_err(|source| Error::Evaluation {
                        path: path.to_string(),
                        source,
                    })?;
                self.emit(path, name, |b| b.add_gate(name, qubits, value))
            }
            Operation::Measure { qubit, bit } => {
                self.emit(path, "measure", |b| b.measure(*qubit, *bit))
            }
            Operation::Reset { qubit } => self.emit(path, "reset", |b| b.reset(*qubit)),
            Operation::Barrier => self.emit(path, "barrier", CircuitBuilder::barrier),
            Operation::If {
                cond,
                then_ops,
                elif_branches,
                else_ops,
            } => {
                self.open(Scope::If { else_seen: false }, path, |b| b.begin_if(cond))?;
                self.lower_block(then_ops, &format!("{path}.if.then"))?;
                for (k, branch) in elif_branches.iter().enumerate() {
                    let branch_path = format!("{path}.if.elif[{k}]");
                    self.transition(false, &branch_path, |b| b.begin_elif(&branch.cond))?;
                    self.lower_block(&branch.ops, &format!("{branch_path}.then"))?;
                }
                if let Some(else_ops) = else_ops {
                    self.transition(true, &format!("{path}.if.else"), CircuitBuilder::begin_else)?;
                    self.lower_block(else_ops, &format!("{path}.if.else"))?;
                }
                self.close(Scope::If { else_seen: false }, path, CircuitBuilder::end_if)
            }
            Operation::While {
                cond,
                body,
                max_iter,
            } => {
                self.open(Scope::While, path, |b| b.begin_while(cond, *max_iter))?;
                self.lower_block(body, &format!("{path}.while.body"))?;
                self.close(Scope::While, path, CircuitBuilder::end_while)
            }
            Operation::For { start, stop, body } => {
                self.open(Scope::For, path, |b| b.begin_for(*start, *stop))?;
                self.lower_block(body, &format!("{path}.for.body"))?;
                self.close(Scope::For, path, CircuitBuilder::end_for)
            }
        }
    }

    fn emit(
        &mut self,
        path: &str,
        what: &str,
        call: impl FnOnce(&mut B) -> std::result::Result<(), BuilderError>,
    ) -> Result<()> {
        trace!(path, call = what, depth = self.scopes.len(), "builder call");
        call(&mut *self.builder).map_err(|source| Error::Builder {
            path: path.to_string(),
            source,
        })?;
        self.stats.calls += 1;
        Ok(())
    }

    fn open(
        &mut self,
        scope: Scope,
        path: &str,
        call: impl FnOnce(&mut B) -> std::result::Result<(), BuilderError>,
    ) -> Result<()> {
        self.emit(path, scope.name(), call)?;
        self.scopes.push(scope);
        self.stats.max_depth = self.stats.max_depth.max(self.scopes.len());
        Ok(())
    }

    /// `elif` (`to_else == false`) or `else` inside the innermost `if`.
    fn transition(
        &mut self,
        to_else: bool,
        path: &str,
        call: impl FnOnce(&mut B) -> std::result::Result<(), BuilderError>,
    ) -> Result<()> {
        let branch = if to_else { "else" } else { "elif" };
        match self.scopes.last_mut() {
            Some(Scope::If { else_seen }) if !*else_seen => {
                *else_seen = to_else;
            }
            Some(Scope::If { .. }) => {
                return Err(Error::ScopeMismatch {
                    path: path.to_string(),
                    message: format!("'{branch}' after 'else'"),
                });
            }
            Some(other) => {
                return Err(Error::ScopeMismatch {
                    path: path.to_string(),
                    message: format!("'{branch}' inside '{}' scope", other.name()),
                });
            }
            None => {
                return Err(Error::ScopeMismatch {
                    path: path.to_string(),
                    message: format!("'{branch}' outside any 'if'"),
                });
            }
        }
        self.emit(path, branch, call)
    }

    fn close(
        &mut self,
        expected: Scope,
        path: &str,
        call: impl FnOnce(&mut B) -> std::result::Result<(), BuilderError>,
    ) -> Result<()> {
        match self.scopes.pop() {
            Some(scope) if std::mem::discriminant(&scope) == std::mem::discriminant(&expected) => {}
            Some(scope) => {
                return Err(Error::ScopeMismatch {
                    path: path.to_string(),
                    message: format!(
                        "closing '{}' while '{}' is open",
                        expected.name(),
                        scope.name()
                    ),
                });
            }
            None => {
                return Err(Error::ScopeMismatch {
                    path: path.to_string(),
                    message: format!("closing '{}' with no open scope", expected.name()),
                });
            }
        }
        self.emit(path, expected.name(), call)
    }

    fn finish(&self) -> Result<()> {
        match self.scopes.last() {
            None => Ok(()),
            Some(scope) => Err(Error::ScopeMismatch {
                path: "ops".to_string(),
                message: format!("'{}' scope left open", scope.name()),
            }),
        }
    }
}
