//! The circuit-construction collaborator that lowering drives.

use std::fmt;

use serde::Serialize;

use crate::condition::Condition;
use crate::error::BuilderError;

/// Receives lowered operations in program order.
///
/// `begin_*` and `end_*` calls always pair up and nest properly;
/// `begin_elif` and `begin_else` only occur between a `begin_if` and its
/// `end_if`. Returning an error aborts lowering; the builder should then be
/// discarded.
pub trait CircuitBuilder {
    /// Apply a unitary gate. `param` is already evaluated.
    fn add_gate(&mut self, name: &str, qubits: &[usize], param: Option<f64>)
    -> Result<(), BuilderError>;

    fn measure(&mut self, qubit: usize, bit: usize) -> Result<(), BuilderError>;

    fn reset(&mut self, qubit: usize) -> Result<(), BuilderError>;

    fn barrier(&mut self) -> Result<(), BuilderError>;

    fn begin_if(&mut self, cond: &Condition) -> Result<(), BuilderError>;

    fn begin_elif(&mut self, cond: &Condition) -> Result<(), BuilderError>;

    fn begin_else(&mut self) -> Result<(), BuilderError>;

    fn end_if(&mut self) -> Result<(), BuilderError>;

    /// `max_iter` is passed through from the document unchanged.
    fn begin_while(&mut self, cond: &Condition, max_iter: Option<u64>) -> Result<(), BuilderError>;

    fn end_while(&mut self) -> Result<(), BuilderError>;

    /// Loop over `start..stop`.
    fn begin_for(&mut self, start: i64, stop: i64) -> Result<(), BuilderError>;

    fn end_for(&mut self) -> Result<(), BuilderError>;
}

/// One recorded builder call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum BuilderCall {
    AddGate {
        name: String,
        qubits: Vec<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        param: Option<f64>,
    },
    Measure {
        qubit: usize,
        bit: usize,
    },
    Reset {
        qubit: usize,
    },
    Barrier,
    BeginIf {
        cond: String,
    },
    BeginElif {
        cond: String,
    },
    BeginElse,
    EndIf,
    BeginWhile {
        cond: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_iter: Option<u64>,
    },
    EndWhile,
    BeginFor {
        start: i64,
        stop: i64,
    },
    EndFor,
}

impl BuilderCall {
    /// Whether this call opens a scope.
    pub fn is_begin(&self) -> bool {
        matches!(
            self,
            BuilderCall::BeginIf { .. } | BuilderCall::BeginWhile { .. } | BuilderCall::BeginFor { .. }
        )
    }

    /// Whether this call closes a scope.
    pub fn is_end(&self) -> bool {
        matches!(
            self,
            BuilderCall::EndIf | BuilderCall::EndWhile | BuilderCall::EndFor
        )
    }
}

impl fmt::Display for BuilderCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderCall::AddGate {
                name,
                qubits,
                param,
            } => {
                write!(f, "{name}")?;
                if let Some(p) = param {
                    write!(f, "({p})")?;
                }
                for q in qubits {
                    write!(f, " {q}")?;
                }
                Ok(())
            }
            BuilderCall::Measure { qubit, bit } => write!(f, "measure {qubit} -> c[{bit}]"),
            BuilderCall::Reset { qubit } => write!(f, "reset {qubit}"),
            BuilderCall::Barrier => write!(f, "barrier"),
            BuilderCall::BeginIf { cond } => write!(f, "if {cond}"),
            BuilderCall::BeginElif { cond } => write!(f, "elif {cond}"),
            BuilderCall::BeginElse => write!(f, "else"),
            BuilderCall::EndIf => write!(f, "end if"),
            BuilderCall::BeginWhile { cond, max_iter } => {
                write!(f, "while {cond}")?;
                if let Some(n) = max_iter {
                    write!(f, " (max_iter {n})")?;
                }
                Ok(())
            }
            BuilderCall::EndWhile => write!(f, "end while"),
            BuilderCall::BeginFor { start, stop } => write!(f, "for {start}..{stop}"),
            BuilderCall::EndFor => write!(f, "end for"),
        }
    }
}

/// A builder that records every call it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingBuilder {
    calls: Vec<BuilderCall>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> &[BuilderCall] {
        &self.calls
    }

    pub fn into_calls(self) -> Vec<BuilderCall> {
        self.calls
    }

    fn push(&mut self, call: BuilderCall) -> Result<(), BuilderError> {
        self.calls.push(call);
        Ok(())
    }
}

impl CircuitBuilder for RecordingBuilder {
    fn add_gate(
        &mut self,
        name: &str,
        qubits: &[usize],
        param: Option<f64>,
    ) -> Result<(), BuilderError> {
        self.push(BuilderCall::AddGate {
            name: name.to_string(),
            qubits: qubits.to_vec(),
            param,
        })
    }

    fn measure(&mut self, qubit: usize, bit: usize) -> Result<(), BuilderError> {
        self.push(BuilderCall::Measure { qubit, bit })
    }

    fn reset(&mut self, qubit: usize) -> Result<(), BuilderError> {
        self.push(BuilderCall::Reset { qubit })
    }

    fn barrier(&mut self) -> Result<(), BuilderError> {
        self.push(BuilderCall::Barrier)
    }

    fn begin_if(&mut self, cond: &Condition) -> Result<(), BuilderError> {
        self.push(BuilderCall::BeginIf {
            cond: cond.to_string(),
        })
    }

    fn begin_elif(&mut self, cond: &Condition) -> Result<(), BuilderError> {
        self.push(BuilderCall::BeginElif {
            cond: cond.to_string(),
        })
    }

    fn begin_else(&mut self) -> Result<(), BuilderError> {
        self.push(BuilderCall::BeginElse)
    }

    fn end_if(&mut self) -> Result<(), BuilderError> {
        self.push(BuilderCall::EndIf)
    }

    fn begin_while(&mut self, cond: &Condition, max_iter: Option<u64>) -> Result<(), BuilderError> {
        self.push(BuilderCall::BeginWhile {
            cond: cond.to_string(),
            max_iter,
        })
    }

    fn end_while(&mut self) -> Result<(), BuilderError> {
        self.push(BuilderCall::EndWhile)
    }

    fn begin_for(&mut self, start: i64, stop: i64) -> Result<(), BuilderError> {
        self.push(BuilderCall::BeginFor { start, stop })
    }

    fn end_for(&mut self) -> Result<(), BuilderError> {
        self.push(BuilderCall::EndFor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_builder_keeps_order() {
        let mut b = RecordingBuilder::new();
        let cond = Condition::BitEq {
            bit: 0,
            value: true,
        };
        b.begin_if(&cond).unwrap();
        b.add_gate("rx", &[1], Some(0.5)).unwrap();
        b.end_if().unwrap();

        let calls = b.into_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].is_begin());
        assert!(calls[2].is_end());
        assert_eq!(calls[0].to_string(), "if c[0] == 1");
        assert_eq!(calls[1].to_string(), "rx(0.5) 1");
    }

    #[test]
    fn test_call_serialization() {
        let call = BuilderCall::AddGate {
            name: "h".into(),
            qubits: vec![0],
            param: None,
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["call"], "add_gate");
        assert!(json.get("param").is_none());
    }
}
