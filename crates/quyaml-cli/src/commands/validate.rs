//! Validate command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;
use quyaml::{Document, ParserConfig};

use super::common::load_document;

/// Execute the validate command.
pub fn execute(file: &Path, json: bool, config: &ParserConfig) -> Result<()> {
    let doc = load_document(file, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!(
        "{} {} is valid",
        style("✓").green().bold(),
        style(file.display()).green()
    );
    print!("{}", summary(&doc));
    Ok(())
}

/// Human-readable description of a document.
fn summary(doc: &Document) -> String {
    let mut lines = vec![
        format!("  Name:       {}", doc.name),
        format!("  Version:    {}", doc.version),
        format!("  Qubits:     {}", doc.qubit_count),
        format!("  Bits:       {}", doc.bit_count),
        format!("  Operations: {}", doc.total_operations()),
    ];
    if !doc.parameters.is_empty() {
        let params: Vec<String> = doc
            .parameters
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        lines.push(format!("  Parameters: {}", params.join(", ")));
    }
    for (key, value) in &doc.metadata {
        lines.push(format!("  Metadata:   {key}: {value}"));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let doc = quyaml::parse(
            "version: 0.4\nname: ansatz\nqubits: 2\nbits: 2\nparams: {theta: 0.5}\nops:\n  - ry($theta) 0\n  - if: {cond: c == 1, then: [x 1]}\n",
        )
        .unwrap();

        let text = summary(&doc);
        assert!(text.contains("Name:       ansatz"));
        assert!(text.contains("Version:    0.4"));
        assert!(text.contains("Operations: 3"));
        assert!(text.contains("Parameters: theta=0.5"));
        assert!(!text.contains("Metadata"));
    }

    #[test]
    fn test_summary_includes_manifest_metadata() {
        let doc = quyaml::parse(
            "version: 0.4\ncircuit:\n  qubits: 1\n  ops: [h 0]\nmetadata:\n  author: lab\n",
        )
        .unwrap();

        let text = summary(&doc);
        assert!(text.contains("Metadata:   author: lab"));
        assert!(text.contains("Name:       my_circuit"));
    }
}
