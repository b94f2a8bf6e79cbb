//! Top-level document schema.
//!
//! A document is either a plain circuit:
//!
//! ```yaml
//! version: 0.4
//! name: bell
//! qubits: q[2]
//! bits: c[2]
//! ops:
//!   - h 0
//!   - cx 0 1
//!   - measure
//! ```
//!
//! or a job manifest whose `circuit` key holds those fields as a mapping,
//! next to `metadata`, `execution` and `post_processing`. Every circuit field
//! has a verbose and a short spelling (`qreg`/`qubits`, `instructions`/`ops`,
//! ...); a document may use either, but not both for the same field.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use tracing::{debug, instrument, warn};

use crate::config::ParserConfig;
use crate::error::{Error, Result, SafetyError};
use crate::expr::ExprScope;
use crate::instruction::{ParseContext, parse_ops};
use crate::loader::{Node, load};
use crate::operation::{Operation, count_all};

const DEFAULT_NAME: &str = "my_circuit";

/// `(verbose, short)` spellings of each circuit field.
const NAME: (&str, &str) = ("circuit", "name");
const QUBITS: (&str, &str) = ("qreg", "qubits");
const BITS: (&str, &str) = ("creg", "bits");
const PARAMETERS: (&str, &str) = ("parameters", "params");
const OPS: (&str, &str) = ("instructions", "ops");

const CIRCUIT_KEYS: &[&str] = &[
    "circuit",
    "name",
    "qreg",
    "qubits",
    "creg",
    "bits",
    "parameters",
    "params",
    "instructions",
    "ops",
];
const MANIFEST_KEYS: &[&str] = &["version", "circuit", "metadata", "execution", "post_processing"];

/// Document format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    V0_2,
    V0_3,
    V0_4,
}

impl Version {
    /// The current version.
    pub const CURRENT: Version = Version::V0_4;

    pub fn as_str(self) -> &'static str {
        match self {
            Version::V0_2 => "0.2",
            Version::V0_3 => "0.3",
            Version::V0_4 => "0.4",
        }
    }

    /// Whether this version is only accepted in legacy mode.
    pub fn is_legacy(self) -> bool {
        self != Self::CURRENT
    }

    fn from_text(text: &str) -> Option<Self> {
        match text.trim() {
            "0.2" => Some(Version::V0_2),
            "0.3" => Some(Version::V0_3),
            "0.4" => Some(Version::V0_4),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A validated circuit document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub version: Version,
    pub name: String,
    pub qubit_count: usize,
    pub bit_count: usize,
    pub parameters: BTreeMap<String, f64>,
    pub ops: Vec<Operation>,
    /// Scalar entries of a job manifest's `metadata` block.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Number of operations in the whole tree, including nested bodies.
    pub fn total_operations(&self) -> usize {
        count_all(&self.ops)
    }
}

/// Parse a document with the default configuration.
pub fn parse(text: &str) -> Result<Document> {
    parse_with_config(text, &ParserConfig::default())
}

/// Parse a document.
#[instrument(skip_all, fields(bytes = text.len()))]
pub fn parse_with_config(text: &str, config: &ParserConfig) -> Result<Document> {
    let root = load(text, &config.limits)?;
    if root.as_map().is_none() {
        return Err(schema(
            "",
            format!("top level must be a mapping, found {}", root.kind_name()),
        ));
    }

    let manifest = matches!(root.get("circuit"), Some(Node::Map(_)));
    let (circuit, prefix) = if manifest {
        check_keys(&root, "", MANIFEST_KEYS)?;
        let circuit = root.get("circuit").unwrap_or(&Node::Null);
        check_keys(circuit, "circuit", CIRCUIT_KEYS)?;
        (circuit, "circuit.")
    } else {
        let allowed: Vec<&str> = std::iter::once("version")
            .chain(CIRCUIT_KEYS.iter().copied())
            .collect();
        check_keys(&root, "", &allowed)?;
        (&root, "")
    };

    let version = parse_version(root.get("version"), config)?;

    let mut metadata = BTreeMap::new();
    if manifest {
        metadata = parse_metadata(root.get("metadata"))?;
        for ignored in ["execution", "post_processing"] {
            if root.get(ignored).is_some() {
                debug!(field = ignored, "ignoring execution-only manifest field");
            }
        }
    }

    let name = match synonym(circuit, NAME, prefix)? {
        Some((_, node)) => node
            .scalar_text()
            .ok_or_else(|| schema(&format!("{prefix}name"), "circuit name must be a string"))?,
        None => metadata
            .get("name")
            .cloned()
            .unwrap_or_else(|| DEFAULT_NAME.to_string()),
    };

    let qubit_count = match synonym(circuit, QUBITS, prefix)? {
        Some((key, node)) => {
            register_size(node, &format!("{prefix}{key}"), config.limits.max_register_size)?
        }
        None => return Err(schema(prefix.trim_end_matches('.'), "missing required field 'qubits'")),
    };
    if qubit_count == 0 {
        return Err(schema(
            &format!("{prefix}qubits"),
            "circuit must define at least one qubit",
        ));
    }

    let bit_count = match synonym(circuit, BITS, prefix)? {
        Some((key, node)) => {
            register_size(node, &format!("{prefix}{key}"), config.limits.max_register_size)?
        }
        None => 0,
    };

    let parameters = match synonym(circuit, PARAMETERS, prefix)? {
        Some((key, node)) => parse_parameters(node, &format!("{prefix}{key}"))?,
        None => BTreeMap::new(),
    };

    let ctx = ParseContext {
        qubit_count,
        bit_count,
        scope: ExprScope::with_functions(parameters.keys().map(String::as_str), &config.functions),
    };
    let ops = match synonym(circuit, OPS, prefix)? {
        Some((key, node @ (Node::Seq(_) | Node::Null))) => {
            parse_ops(node, &ctx, &format!("{prefix}{key}"))?
        }
        Some((key, node)) => {
            return Err(schema(
                &format!("{prefix}{key}"),
                format!("operations must be a list, found {}", node.kind_name()),
            ));
        }
        None => return Err(schema(prefix.trim_end_matches('.'), "missing required field 'ops'")),
    };

    let doc = Document {
        version,
        name,
        qubit_count,
        bit_count,
        parameters,
        ops,
        metadata,
    };
    debug!(
        name = %doc.name,
        qubits = doc.qubit_count,
        bits = doc.bit_count,
        ops = doc.total_operations(),
        "parsed document"
    );
    Ok(doc)
}

fn schema(path: &str, message: impl Into<String>) -> Error {
    Error::Schema {
        path: path.to_string(),
        message: message.into(),
    }
}

fn check_keys(node: &Node, path: &str, allowed: &[&str]) -> Result<()> {
    let entries = node.as_map().unwrap_or_default();
    if let Some((key, _)) = entries.iter().find(|(k, _)| !allowed.contains(&k.as_str())) {
        let path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        return Err(schema(&path, format!("unknown field '{key}'")));
    }
    Ok(())
}

/// Find a field under either spelling; both present is an error.
fn synonym<'n>(
    node: &'n Node,
    (verbose, short): (&'static str, &'static str),
    prefix: &str,
) -> Result<Option<(&'static str, &'n Node)>> {
    match (node.get(verbose), node.get(short)) {
        (Some(_), Some(_)) => Err(schema(
            &format!("{prefix}{short}"),
            format!("both '{verbose}' and '{short}' given; use one"),
        )),
        (Some(v), None) => Ok(Some((verbose, v))),
        (None, Some(v)) => Ok(Some((short, v))),
        (None, None) => Ok(None),
    }
}

fn parse_version(node: Option<&Node>, config: &ParserConfig) -> Result<Version> {
    let Some(node) = node else {
        return Err(schema("version", "missing required field 'version' (expected '0.4')"));
    };
    let text = node.scalar_text().unwrap_or_default();
    let supported = if config.allow_legacy_versions {
        "0.4, 0.2, 0.3 (legacy)"
    } else {
        "0.4"
    };

    match Version::from_text(&text) {
        Some(v) if !v.is_legacy() => Ok(v),
        Some(v) if config.allow_legacy_versions => {
            warn!(version = %v, "accepting legacy document version");
            Ok(v)
        }
        _ => Err(schema(
            "version",
            format!("unsupported version '{text}'; supported: {supported}"),
        )),
    }
}

/// `q[N]`, `N` as a string, or a plain integer, at most `limit`.
fn register_size(node: &Node, path: &str, limit: usize) -> Result<usize> {
    let size: Option<u64> = match node {
        Node::Int(v) => u64::try_from(*v).ok(),
        Node::Str(s) => {
            let s = s.trim();
            match s.find('[') {
                Some(open) if is_identifier(&s[..open]) => s[open + 1..]
                    .strip_suffix(']')
                    .and_then(|n| n.parse().ok()),
                Some(_) => None,
                None => s.parse().ok(),
            }
        }
        _ => None,
    };
    let size = size.ok_or_else(|| {
        schema(
            path,
            format!(
                "register size must be written 'q[N]' or as a non-negative integer, found {}",
                node.scalar_text().unwrap_or_else(|| node.kind_name().to_string())
            ),
        )
    })?;
    match usize::try_from(size) {
        Ok(size) if size <= limit => Ok(size),
        _ => Err(SafetyError::RegisterTooLarge {
            path: path.to_string(),
            size,
            limit,
        }
        .into()),
    }
}

fn is_identifier(s: &str) -> bool {
    s.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_parameters(node: &Node, path: &str) -> Result<BTreeMap<String, f64>> {
    let entries = match node {
        Node::Null => return Ok(BTreeMap::new()),
        Node::Map(entries) => entries,
        other => {
            return Err(schema(
                path,
                format!("parameters must be a mapping, found {}", other.kind_name()),
            ));
        }
    };

    let mut parameters = BTreeMap::new();
    for (name, value) in entries {
        let field = format!("{path}.{name}");
        if !is_identifier(name) {
            return Err(schema(&field, format!("'{name}' is not a valid parameter name")));
        }
        if name == "pi" || name == "e" {
            return Err(schema(&field, format!("parameter '{name}' shadows a constant")));
        }
        let value = value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| schema(&field, "parameter value must be a finite number"))?;
        parameters.insert(name.clone(), value);
    }
    Ok(parameters)
}

fn parse_metadata(node: Option<&Node>) -> Result<BTreeMap<String, String>> {
    let entries = match node {
        None | Some(Node::Null) => return Ok(BTreeMap::new()),
        Some(Node::Map(entries)) => entries,
        Some(other) => {
            return Err(schema(
                "metadata",
                format!("metadata must be a mapping, found {}", other.kind_name()),
            ));
        }
    };

    let mut metadata = BTreeMap::new();
    for (key, value) in entries {
        match value.scalar_text() {
            Some(text) => {
                metadata.insert(key.clone(), text);
            }
            None => debug!(key = %key, "skipping non-scalar metadata entry"),
        }
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::error::ErrorKind;

    const BELL: &str = "\
version: 0.4
name: bell
qubits: q[2]
bits: c[2]
ops:
  - h 0
  - cx 0 1
  - measure
";

    #[test]
    fn test_parse_bell() {
        let doc = parse(BELL).unwrap();
        assert_eq!(doc.version, Version::V0_4);
        assert_eq!(doc.name, "bell");
        assert_eq!(doc.qubit_count, 2);
        assert_eq!(doc.bit_count, 2);
        assert_eq!(doc.ops.len(), 4);
        assert_eq!(doc.total_operations(), 4);
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn test_verbose_spellings() {
        let text = "\
version: '0.4'
circuit: ghz
qreg: 3
creg: c[3]
parameters: {theta: 0.5}
instructions:
  - rx($theta) 0
";
        let doc = parse(text).unwrap();
        assert_eq!(doc.name, "ghz");
        assert_eq!(doc.qubit_count, 3);
        assert_eq!(doc.parameters.get("theta"), Some(&0.5));
    }

    #[test]
    fn test_both_spellings_is_schema_error() {
        let text = "version: 0.4\nqubits: 1\nqreg: 1\nops: []\n";
        let err = parse(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("'qreg' and 'qubits'"));
    }

    #[test]
    fn test_required_fields() {
        let kind = |text: &str| parse(text).unwrap_err().kind();
        assert_eq!(kind("qubits: 1\nops: []\n"), ErrorKind::Schema);
        assert_eq!(kind("version: 0.4\nops: []\n"), ErrorKind::Schema);
        assert_eq!(kind("version: 0.4\nqubits: 1\n"), ErrorKind::Schema);
        assert_eq!(kind("version: 0.4\nqubits: q[0]\nops: []\n"), ErrorKind::Schema);
        assert_eq!(kind("- h 0\n"), ErrorKind::Schema);
    }

    #[test]
    fn test_unknown_top_level_key() {
        let err = parse("version: 0.4\nqubits: 1\nops: []\nshots: 10\n").unwrap_err();
        assert!(matches!(err, Error::Schema { path, .. } if path == "shots"));
    }

    #[test]
    fn test_versions() {
        let doc = parse("version: 0.3\nqubits: 1\nops: []\n").unwrap();
        assert_eq!(doc.version, Version::V0_3);

        let strict = ParserConfig {
            allow_legacy_versions: false,
            ..ParserConfig::default()
        };
        let err = parse_with_config("version: 0.3\nqubits: 1\nops: []\n", &strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);

        let err = parse("version: 1.0\nqubits: 1\nops: []\n").unwrap_err();
        assert!(err.to_string().contains("unsupported version '1'"));
    }

    #[test]
    fn test_parameter_validation() {
        let kind = |params: &str| {
            parse(&format!("version: 0.4\nqubits: 1\nparams: {params}\nops: []\n"))
                .unwrap_err()
                .kind()
        };
        assert_eq!(kind("{pi: 1.0}"), ErrorKind::Schema);
        assert_eq!(kind("{theta: abc}"), ErrorKind::Schema);
        assert_eq!(kind("{theta: .nan}"), ErrorKind::Schema);
        assert_eq!(kind("{'a b': 1}"), ErrorKind::Schema);
        assert_eq!(kind("[1, 2]"), ErrorKind::Schema);
    }

    #[test]
    fn test_job_manifest() {
        let text = "\
version: 0.4
metadata:
  name: sweep
  owner: lab
execution:
  shots: 100
post_processing: []
circuit:
  qubits: q[1]
  bits: c[1]
  ops:
    - h 0
    - measure 0 0
";
        let doc = parse(text).unwrap();
        assert_eq!(doc.name, "sweep");
        assert_eq!(doc.metadata.get("owner").map(String::as_str), Some("lab"));
        assert_eq!(doc.ops.len(), 2);

        let err = parse("version: 0.4\ncircuit:\n  qubits: 1\n  ops: []\n  shots: 3\n").unwrap_err();
        assert!(matches!(err, Error::Schema { path, .. } if path == "circuit.shots"));
    }

    #[test]
    fn test_register_size_ceiling() {
        let err = parse("version: 0.4\nqubits: 9223372036854775807\nops: [measure]\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Safety);
        assert!(matches!(
            err,
            Error::Safety(SafetyError::RegisterTooLarge { size: 9_223_372_036_854_775_807, limit: 4096, .. })
        ));

        let err = parse("version: 0.4\nqubits: 1\nbits: c[5000]\nops: []\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Safety(SafetyError::RegisterTooLarge { path, size: 5000, .. }) if path == "bits"
        ));

        let mut config = ParserConfig::default();
        config.limits.max_register_size = 4;
        assert!(parse_with_config("version: 0.4\nqubits: 4\nops: [measure]\n", &config).is_ok());
        let err = parse_with_config("version: 0.4\nqubits: q[5]\nops: []\n", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Safety);
    }

    #[test]
    fn test_conditions_may_span_lines() {
        let text = "\
version: 0.4
qubits: 2
bits: 2
ops:
  - if:
      cond: c[0] == 1
        && c[1] == 0
      then: [x 0]
  - while:
      cond: c[0] == 1
        || c[1] == 1
      max_iter: 2
      body: [h 0]
";
        let doc = parse(text).unwrap();
        assert!(matches!(&doc.ops[0], Operation::If { cond: Condition::And(..), .. }));
        assert!(matches!(&doc.ops[1], Operation::While { cond: Condition::Or(..), .. }));
    }

    #[test]
    fn test_manifest_execution_block_does_not_bind_parameters() {
        let text = "\
version: 0.4
execution:
  shots: 10
  parameter_sweep:
    theta: [0.1, 0.2, 0.3]
circuit:
  qubits: 1
  params:
    theta: 0.5
  ops:
    - rx($theta) 0
";
        let doc = parse(text).unwrap();
        assert_eq!(doc.parameters.get("theta"), Some(&0.5));
        assert_eq!(doc.ops.len(), 1);
    }

    #[test]
    fn test_op_paths_follow_the_key_used() {
        let err = parse("version: 0.4\nqubits: 1\ninstructions:\n  - h 0\n  - h 3\n").unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { path, .. } if path == "instructions[1]"));
    }

    #[test]
    fn test_serializes_to_json() {
        let doc = parse(BELL).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["version"], "0.4");
        assert_eq!(json["ops"][0]["op"], "gate");
        assert!(json.get("metadata").is_none());
    }
}
