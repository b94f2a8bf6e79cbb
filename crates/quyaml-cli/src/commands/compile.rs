//! Compile command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;
use quyaml::{BuilderCall, ParserConfig, RecordingBuilder, lower};
use serde_json::json;

use super::common::load_document;
use crate::OutputFormat;

/// Execute the compile command.
pub fn execute(file: &Path, format: OutputFormat, config: &ParserConfig) -> Result<()> {
    let doc = load_document(file, config)?;

    let mut builder = RecordingBuilder::new();
    let stats = lower(&doc, &mut builder)?;

    match format {
        OutputFormat::Json => {
            let report = json!({
                "name": doc.name,
                "qubits": doc.qubit_count,
                "bits": doc.bit_count,
                "stats": stats,
                "calls": builder.calls(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!(
                "{} Compiled {} ({} qubits, {} bits)",
                style("→").cyan().bold(),
                style(&doc.name).green(),
                doc.qubit_count,
                doc.bit_count
            );
            print!("{}", render_trace(builder.calls()));
            println!(
                "{} {} builder calls, nesting depth {}",
                style("✓").green().bold(),
                stats.calls,
                stats.max_depth
            );
        }
    }
    Ok(())
}

/// One call per line, indented by scope depth.
fn render_trace(calls: &[BuilderCall]) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for call in calls {
        let indent = match call {
            BuilderCall::BeginElif { .. } | BuilderCall::BeginElse => depth.saturating_sub(1),
            _ if call.is_end() => {
                depth = depth.saturating_sub(1);
                depth
            }
            _ => depth,
        };
        out.push_str(&"  ".repeat(indent + 1));
        out.push_str(&call.to_string());
        out.push('\n');
        if call.is_begin() {
            depth += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(text: &str) -> String {
        let doc = quyaml::parse(text).unwrap();
        let mut builder = RecordingBuilder::new();
        lower(&doc, &mut builder).unwrap();
        render_trace(builder.calls())
    }

    #[test]
    fn test_flat_trace() {
        let text = trace("version: 0.4\nqubits: 2\nbits: 2\nops: [h 0, cx 0 1, measure]\n");
        assert_eq!(
            text,
            "  h 0\n  cx 0 1\n  measure 0 -> c[0]\n  measure 1 -> c[1]\n"
        );
    }

    #[test]
    fn test_nested_trace_indentation() {
        let text = trace(
            "\
version: 0.4
qubits: 1
bits: 1
ops:
  - for:
      range: [0, 2]
      body:
        - if:
            cond: c[0] == 1
            then: [x 0]
            else: [z 0]
",
        );
        assert_eq!(
            text,
            "  for 0..2\n    if c[0] == 1\n      x 0\n    else\n      z 0\n    end if\n  end for\n"
        );
    }
}
