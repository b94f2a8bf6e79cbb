//! Parsing of individual operations, shorthand and structured.
//!
//! Shorthand strings look like `h 0`, `cx 0 1` or `rx($theta / 2) 0`; the
//! legacy operand form `cx q[0], q[1]` is also accepted. Structured
//! operations are single-key mappings: `measure`, `reset`, `if`, `while`
//! and `for`. Control-flow bodies are parsed recursively with the same rules.

use rustc_hash::FxHashSet;

use crate::condition::{Condition, parse_condition};
use crate::error::{Error, Register, Result};
use crate::expr::{ExprScope, compile};
use crate::gates::{self, GateKind, GateSpec};
use crate::loader::Node;
use crate::operation::{ElifBranch, Operation};

/// What an operation is checked against while parsing.
#[derive(Debug, Clone)]
pub struct ParseContext<'a> {
    pub qubit_count: usize,
    pub bit_count: usize,
    /// Parameter names and functions visible to gate expressions.
    pub scope: ExprScope<'a>,
}

/// Parse one entry of an operation list.
///
/// Most entries yield exactly one operation. A bare `measure` expands to one
/// measurement per qubit, `measure i -> c[i]`.
pub fn parse_operation(node: &Node, ctx: &ParseContext<'_>, path: &str) -> Result<Vec<Operation>> {
    match node {
        Node::Str(text) => parse_shorthand(text, ctx, path),
        Node::Map(entries) => parse_structured(entries, ctx, path).map(|op| vec![op]),
        other => Err(Error::InvalidInstruction {
            path: path.to_string(),
            message: format!(
                "expected an instruction string or a single-key mapping, found {}",
                other.kind_name()
            ),
        }),
    }
}

/// Parse an operation list. A null node is an empty list.
pub fn parse_ops(node: &Node, ctx: &ParseContext<'_>, path: &str) -> Result<Vec<Operation>> {
    let items = match node {
        Node::Null => return Ok(Vec::new()),
        Node::Seq(items) => items,
        other => {
            return Err(Error::Structural {
                path: path.to_string(),
                message: format!("expected a list of operations, found {}", other.kind_name()),
            });
        }
    };

    let mut ops = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        ops.extend(parse_operation(item, ctx, &format!("{path}[{i}]"))?);
    }
    Ok(ops)
}

// ---------------------------------------------------------------------------
// Shorthand
// ---------------------------------------------------------------------------

/// A shorthand instruction split into its textual parts.
struct Shorthand<'t> {
    mnemonic: &'t str,
    param: Option<&'t str>,
    operands: Vec<&'t str>,
}

fn split_shorthand<'t>(text: &'t str, path: &str) -> Result<Shorthand<'t>> {
    let invalid = |message: String| Error::InvalidInstruction {
        path: path.to_string(),
        message,
    };

    let text = text.trim();
    let name_end = text
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(text.len());
    let mnemonic = &text[..name_end];
    if mnemonic.is_empty() {
        return Err(invalid(format!("missing gate name in '{text}'")));
    }

    let mut rest = text[name_end..].trim_start();
    let mut param = None;
    if rest.starts_with('(') {
        let close = matching_paren(rest)
            .ok_or_else(|| invalid(format!("unmatched parentheses in '{text}'")))?;
        param = Some(&rest[1..close]);
        rest = &rest[close + 1..];
    }

    let operands = rest
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect();

    Ok(Shorthand {
        mnemonic,
        param,
        operands,
    })
}

/// Byte offset of the `)` closing the `(` at the start of `text`.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// `3` or `q[3]`.
fn parse_index(operand: &str) -> Option<usize> {
    if let Some(open) = operand.find('[') {
        let name = &operand[..open];
        let inner = operand[open + 1..].strip_suffix(']')?;
        let name_ok = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !name_ok {
            return None;
        }
        return parse_digits(inner);
    }
    parse_digits(operand)
}

fn parse_digits(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_shorthand(text: &str, ctx: &ParseContext<'_>, path: &str) -> Result<Vec<Operation>> {
    let parts = split_shorthand(text, path)?;
    let spec = gates::lookup(parts.mnemonic).ok_or_else(|| Error::UnknownGate {
        path: path.to_string(),
        name: parts.mnemonic.to_string(),
    })?;

    let expected_params = usize::from(spec.parametric);
    let got_params = usize::from(parts.param.is_some());
    if expected_params != got_params {
        return Err(Error::ParameterCount {
            path: path.to_string(),
            gate: spec.name.to_string(),
            expected: expected_params,
            got: got_params,
        });
    }

    let indices = parts
        .operands
        .iter()
        .map(|operand| {
            parse_index(operand).ok_or_else(|| Error::InvalidInstruction {
                path: path.to_string(),
                message: format!("invalid operand '{operand}'; use 'n' or 'q[n]'"),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if spec.kind == GateKind::Measure && indices.is_empty() {
        return measure_all(ctx, path);
    }
    check_operand_count(spec, &indices, spec.qubits + spec.clbits, path)?;
    let (qubits, bits) = indices.split_at(spec.qubits);
    for &q in qubits {
        check_index(q, Register::Qubit, ctx.qubit_count, path)?;
    }
    for &b in bits {
        check_index(b, Register::Clbit, ctx.bit_count, path)?;
    }

    match spec.kind {
        GateKind::Measure => Ok(vec![Operation::Measure {
            qubit: qubits[0],
            bit: bits[0],
        }]),
        GateKind::Reset => Ok(vec![Operation::Reset { qubit: qubits[0] }]),
        GateKind::Barrier => Ok(vec![Operation::Barrier]),
        GateKind::Unitary => {
            check_distinct(spec, &indices, path)?;

            let param = parts
                .param
                .map(|text| compile(text, &ctx.scope).map_err(|e| Error::from_expr(path, e)))
                .transpose()?;

            Ok(vec![Operation::Gate {
                name: spec.name.to_string(),
                qubits: indices,
                param,
            }])
        }
    }
}

fn measure_all(ctx: &ParseContext<'_>, path: &str) -> Result<Vec<Operation>> {
    if ctx.bit_count < ctx.qubit_count {
        return Err(Error::IndexOutOfRange {
            path: path.to_string(),
            register: Register::Clbit,
            index: ctx.qubit_count - 1,
            size: ctx.bit_count,
        });
    }
    Ok((0..ctx.qubit_count)
        .map(|i| Operation::Measure { qubit: i, bit: i })
        .collect())
}

fn check_operand_count(spec: &GateSpec, indices: &[usize], expected: usize, path: &str) -> Result<()> {
    if indices.len() == expected {
        Ok(())
    } else {
        Err(Error::OperandCount {
            path: path.to_string(),
            gate: spec.name.to_string(),
            expected,
            got: indices.len(),
        })
    }
}

fn check_index(index: usize, register: Register, size: usize, path: &str) -> Result<usize> {
    if index < size {
        Ok(index)
    } else {
        Err(Error::IndexOutOfRange {
            path: path.to_string(),
            register,
            index,
            size,
        })
    }
}

fn check_distinct(spec: &GateSpec, qubits: &[usize], path: &str) -> Result<()> {
    let mut seen = FxHashSet::default();
    for &q in qubits {
        if !seen.insert(q) {
            return Err(Error::DuplicateQubit {
                path: path.to_string(),
                gate: spec.name.to_string(),
                qubit: q,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Structured forms
// ---------------------------------------------------------------------------

/// Field access on the mapping body of a structured operation.
struct Fields<'n> {
    path: String,
    entries: &'n [(String, Node)],
}

impl<'n> Fields<'n> {
    fn new(node: &'n Node, path: String, allowed: &[&str]) -> Result<Self> {
        let Some(entries) = node.as_map() else {
            return Err(Error::Structural {
                path,
                message: format!("expected a mapping, found {}", node.kind_name()),
            });
        };
        if let Some((key, _)) = entries.iter().find(|(k, _)| !allowed.contains(&k.as_str())) {
            return Err(Error::Structural {
                path,
                message: format!(
                    "unknown field '{key}' (expected one of: {})",
                    allowed.join(", ")
                ),
            });
        }
        Ok(Self { path, entries })
    }

    fn path_of(&self, field: &str) -> String {
        format!("{}.{field}", self.path)
    }

    fn optional(&self, field: &str) -> Option<&'n Node> {
        self.entries.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    fn require(&self, field: &str) -> Result<&'n Node> {
        self.optional(field).ok_or_else(|| Error::Structural {
            path: self.path.clone(),
            message: format!("missing required field '{field}'"),
        })
    }

    fn condition(&self, field: &str, ctx: &ParseContext<'_>) -> Result<Condition> {
        let path = self.path_of(field);
        let text = self.require(field)?.scalar_text().ok_or_else(|| Error::Structural {
            path: path.clone(),
            message: "condition must be a string".to_string(),
        })?;
        parse_condition(&text, ctx.bit_count).map_err(|e| Error::from_condition(&path, e))
    }

    fn index(&self, field: &str, register: Register, size: usize) -> Result<usize> {
        let path = self.path_of(field);
        let node = self.require(field)?;
        let index = match node {
            Node::Int(v) => usize::try_from(*v).ok(),
            Node::Str(s) => parse_index(s.trim()),
            _ => None,
        }
        .ok_or_else(|| Error::Structural {
            path: path.clone(),
            message: format!("expected a non-negative index, found {}", node.kind_name()),
        })?;
        check_index(index, register, size, &path)
    }
}

fn parse_structured(
    entries: &[(String, Node)],
    ctx: &ParseContext<'_>,
    path: &str,
) -> Result<Operation> {
    let [(key, body)] = entries else {
        return Err(Error::Structural {
            path: path.to_string(),
            message: format!(
                "structured operation must have exactly one key, found {}",
                entries.len()
            ),
        });
    };
    let form_path = format!("{path}.{key}");

    match key.as_str() {
        "measure" => {
            let fields = Fields::new(body, form_path, &["q", "c"])?;
            Ok(Operation::Measure {
                qubit: fields.index("q", Register::Qubit, ctx.qubit_count)?,
                bit: fields.index("c", Register::Clbit, ctx.bit_count)?,
            })
        }
        "reset" => {
            let fields = Fields::new(body, form_path, &["q"])?;
            Ok(Operation::Reset {
                qubit: fields.index("q", Register::Qubit, ctx.qubit_count)?,
            })
        }
        "if" => parse_if(body, ctx, form_path),
        "while" => parse_while(body, ctx, form_path),
        "for" => parse_for(body, ctx, form_path),
        other => Err(Error::Structural {
            path: path.to_string(),
            message: format!(
                "unknown structured operation '{other}' (expected measure, reset, if, while or for)"
            ),
        }),
    }
}

fn parse_if(body: &Node, ctx: &ParseContext<'_>, path: String) -> Result<Operation> {
    let fields = Fields::new(body, path, &["cond", "then", "elif", "else"])?;
    let cond = fields.condition("cond", ctx)?;
    let then_ops = parse_ops(fields.require("then")?, ctx, &fields.path_of("then"))?;

    let mut elif_branches = Vec::new();
    if let Some(node) = fields.optional("elif") {
        let elif_path = fields.path_of("elif");
        let arms = match node {
            Node::Null => &[][..],
            Node::Seq(items) => items.as_slice(),
            other => {
                return Err(Error::Structural {
                    path: elif_path,
                    message: format!("expected a list of branches, found {}", other.kind_name()),
                });
            }
        };
        for (i, arm) in arms.iter().enumerate() {
            let arm = Fields::new(arm, format!("{elif_path}[{i}]"), &["cond", "then"])?;
            elif_branches.push(ElifBranch {
                cond: arm.condition("cond", ctx)?,
                ops: parse_ops(arm.require("then")?, ctx, &arm.path_of("then"))?,
            });
        }
    }

    let else_ops = match fields.optional("else") {
        None | Some(Node::Null) => None,
        Some(node) => Some(parse_ops(node, ctx, &fields.path_of("else"))?),
    };

    Ok(Operation::If {
        cond,
        then_ops,
        elif_branches,
        else_ops,
    })
}

fn parse_while(body: &Node, ctx: &ParseContext<'_>, path: String) -> Result<Operation> {
    let fields = Fields::new(body, path, &["cond", "body", "max_iter"])?;
    let cond = fields.condition("cond", ctx)?;
    let ops = parse_ops(fields.require("body")?, ctx, &fields.path_of("body"))?;

    let max_iter = match fields.optional("max_iter") {
        None | Some(Node::Null) => None,
        Some(Node::Int(v)) if *v >= 0 => Some(v.unsigned_abs()),
        Some(other) => {
            return Err(Error::Structural {
                path: fields.path_of("max_iter"),
                message: format!(
                    "max_iter must be a non-negative integer, found {}",
                    other.scalar_text().unwrap_or_else(|| other.kind_name().to_string())
                ),
            });
        }
    };

    Ok(Operation::While {
        cond,
        body: ops,
        max_iter,
    })
}

fn parse_for(body: &Node, ctx: &ParseContext<'_>, path: String) -> Result<Operation> {
    let fields = Fields::new(body, path, &["range", "body"])?;
    let range_path = fields.path_of("range");
    let (start, stop) = match fields.require("range")?.as_seq() {
        Some([Node::Int(start), Node::Int(stop)]) => (*start, *stop),
        _ => {
            return Err(Error::Structural {
                path: range_path,
                message: "range must be a list of two integers [start, stop]".to_string(),
            });
        }
    };
    let ops = parse_ops(fields.require("body")?, ctx, &fields.path_of("body"))?;

    Ok(Operation::For {
        start,
        stop,
        body: ops,
    })
}
