//! Closed registry of instruction mnemonics.

use serde::Serialize;

/// What a registry entry lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// A unitary gate passed to `add_gate`.
    Unitary,
    Measure,
    Reset,
    Barrier,
}

/// Static description of one mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateSpec {
    /// Canonical lowercase name, passed to the builder.
    pub name: &'static str,
    /// Number of qubit operands.
    pub qubits: usize,
    /// Number of classical-bit operands.
    pub clbits: usize,
    /// Whether the gate takes exactly one parameter expression.
    pub parametric: bool,
    pub kind: GateKind,
}

const fn unitary(name: &'static str, qubits: usize, parametric: bool) -> GateSpec {
    GateSpec {
        name,
        qubits,
        clbits: 0,
        parametric,
        kind: GateKind::Unitary,
    }
}

static GATES: &[GateSpec] = &[
    // Single-qubit
    unitary("id", 1, false),
    unitary("x", 1, false),
    unitary("y", 1, false),
    unitary("z", 1, false),
    unitary("h", 1, false),
    unitary("s", 1, false),
    unitary("sdg", 1, false),
    unitary("t", 1, false),
    unitary("tdg", 1, false),
    unitary("sx", 1, false),
    unitary("sxdg", 1, false),
    // Single-qubit rotations
    unitary("rx", 1, true),
    unitary("ry", 1, true),
    unitary("rz", 1, true),
    unitary("p", 1, true),
    // Two-qubit
    unitary("cx", 2, false),
    unitary("cy", 2, false),
    unitary("cz", 2, false),
    unitary("ch", 2, false),
    unitary("swap", 2, false),
    unitary("iswap", 2, false),
    // Two-qubit rotations
    unitary("crx", 2, true),
    unitary("cry", 2, true),
    unitary("crz", 2, true),
    unitary("cp", 2, true),
    unitary("rxx", 2, true),
    unitary("ryy", 2, true),
    unitary("rzz", 2, true),
    // Three-qubit
    unitary("ccx", 3, false),
    unitary("cswap", 3, false),
    // Directives
    GateSpec {
        name: "measure",
        qubits: 1,
        clbits: 1,
        parametric: false,
        kind: GateKind::Measure,
    },
    GateSpec {
        name: "reset",
        qubits: 1,
        clbits: 0,
        parametric: false,
        kind: GateKind::Reset,
    },
    GateSpec {
        name: "barrier",
        qubits: 0,
        clbits: 0,
        parametric: false,
        kind: GateKind::Barrier,
    },
];

/// Alternative spellings and the canonical name they resolve to.
static ALIASES: &[(&str, &str)] = &[
    ("i", "id"),
    ("cnot", "cx"),
    ("phase", "p"),
    ("cphase", "cp"),
    ("toffoli", "ccx"),
    ("fredkin", "cswap"),
];

/// Look up a mnemonic, case-insensitively, resolving aliases.
pub fn lookup(mnemonic: &str) -> Option<&'static GateSpec> {
    let lower = mnemonic.to_ascii_lowercase();
    let name = ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map_or(lower.as_str(), |&(_, canonical)| canonical);
    GATES.iter().find(|g| g.name == name)
}

/// Every registry entry, in table order.
pub fn all() -> &'static [GateSpec] {
    GATES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("H").map(|g| g.name), Some("h"));
        assert_eq!(lookup("CX").map(|g| g.qubits), Some(2));
        assert!(lookup("u3").is_none());
    }

    #[test]
    fn test_aliases_resolve_to_canonical() {
        assert_eq!(lookup("cnot").map(|g| g.name), Some("cx"));
        assert_eq!(lookup("CPhase").map(|g| g.name), Some("cp"));
        assert_eq!(lookup("toffoli").map(|g| g.qubits), Some(3));
        assert_eq!(lookup("fredkin").map(|g| g.name), Some("cswap"));
    }

    #[test]
    fn test_arities() {
        let rx = lookup("rx").unwrap();
        assert!(rx.parametric);
        assert_eq!(rx.qubits, 1);

        let measure = lookup("measure").unwrap();
        assert_eq!((measure.qubits, measure.clbits), (1, 1));
        assert_eq!(measure.kind, GateKind::Measure);

        assert_eq!(lookup("barrier").unwrap().qubits, 0);
    }

    #[test]
    fn test_names_are_unique_and_lowercase() {
        let gates = all();
        for (i, g) in gates.iter().enumerate() {
            assert_eq!(g.name, g.name.to_ascii_lowercase());
            assert!(gates[i + 1..].iter().all(|other| other.name != g.name));
        }
        for (alias, canonical) in ALIASES {
            assert!(lookup(canonical).is_some());
            assert!(gates.iter().all(|g| g.name != *alias));
        }
    }
}
