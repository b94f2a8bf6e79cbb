//! The operation tree of a parsed document.

use serde::Serialize;

use crate::condition::Condition;
use crate::expr::Expr;

/// One node of the operation tree.
///
/// Bodies own their children; the tree is acyclic by construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// A unitary gate. `name` is the canonical registry name.
    Gate {
        name: String,
        qubits: Vec<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        param: Option<Expr>,
    },
    Measure {
        qubit: usize,
        bit: usize,
    },
    Reset {
        qubit: usize,
    },
    Barrier,
    If {
        cond: Condition,
        then_ops: Vec<Operation>,
        elif_branches: Vec<ElifBranch>,
        else_ops: Option<Vec<Operation>>,
    },
    While {
        cond: Condition,
        body: Vec<Operation>,
        max_iter: Option<u64>,
    },
    /// Counted loop over `start..stop` (exclusive upper bound).
    For {
        start: i64,
        stop: i64,
        body: Vec<Operation>,
    },
}

/// An `elif` arm of an [`Operation::If`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElifBranch {
    pub cond: Condition,
    pub ops: Vec<Operation>,
}

impl Operation {
    /// Number of operations in this subtree, counting this one.
    pub fn count(&self) -> usize {
        1 + match self {
            Operation::If {
                then_ops,
                elif_branches,
                else_ops,
                ..
            } => {
                count_all(then_ops)
                    + elif_branches.iter().map(|b| count_all(&b.ops)).sum::<usize>()
                    + else_ops.as_deref().map_or(0, count_all)
            }
            Operation::While { body, .. } | Operation::For { body, .. } => count_all(body),
            _ => 0,
        }
    }

    /// Whether this operation opens a control-flow scope.
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Operation::If { .. } | Operation::While { .. } | Operation::For { .. }
        )
    }
}

/// Total number of operations in a list of subtrees.
pub fn count_all(ops: &[Operation]) -> usize {
    ops.iter().map(Operation::count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(q: usize) -> Operation {
        Operation::Gate {
            name: "h".into(),
            qubits: vec![q],
            param: None,
        }
    }

    #[test]
    fn test_count_nested() {
        let op = Operation::If {
            cond: Condition::RegisterEq { value: 1 },
            then_ops: vec![h(0), h(1)],
            elif_branches: vec![ElifBranch {
                cond: Condition::RegisterEq { value: 2 },
                ops: vec![h(0)],
            }],
            else_ops: Some(vec![Operation::For {
                start: 0,
                stop: 2,
                body: vec![h(0)],
            }]),
        };
        assert_eq!(op.count(), 6);
        assert!(op.is_control_flow());
        assert!(!h(0).is_control_flow());
        assert_eq!(count_all(&[h(0), Operation::Barrier]), 2);
    }
}
