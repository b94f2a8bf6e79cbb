//! Line scanner that rejects forbidden YAML markers before any tree is built.
//!
//! The scanner understands just enough YAML to tell where a node may start:
//! quoted scalars (which may span lines), comments, block scalars and flow
//! collections. At every node start it rejects `&`, `*`, `!` and `<<:`.
//! Markers inside quoted text, comments, block scalars, the middle of a
//! plain scalar (`rx($a*2) 0`) or its continuation lines are ordinary
//! characters.

use crate::error::SafetyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Single,
    Double,
}

/// A block collection opened at some column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Map(usize),
    Seq(usize),
}

impl Level {
    fn col(self) -> usize {
        match self {
            Level::Map(col) | Level::Seq(col) => col,
        }
    }
}

struct Scanner {
    quote: Option<Quote>,
    flow_depth: usize,
    /// Whether the next flow token starts a node, carried across lines.
    flow_node_start: bool,
    levels: Vec<Level>,
    /// Indentation a line must exceed to belong to the open block scalar.
    block_parent: Option<usize>,
    /// Indentation a line must exceed to continue the open plain scalar.
    plain_parent: Option<usize>,
    max_depth: usize,
}

/// Scan `text` for anchors, aliases, tags and merge keys, and bound nesting.
///
/// Depth here is a lower bound on the real nesting (block levels by
/// indentation, item mappings, compact sequences and open flow brackets);
/// the exact check happens during tree conversion.
pub(super) fn scan(text: &str, max_depth: usize) -> Result<(), SafetyError> {
    let mut scanner = Scanner {
        quote: None,
        flow_depth: 0,
        flow_node_start: true,
        levels: Vec::new(),
        block_parent: None,
        plain_parent: None,
        max_depth,
    };

    for (idx, line) in text.lines().enumerate() {
        scanner.scan_line(line, idx + 1)?;
    }
    Ok(())
}

impl Scanner {
    fn check_depth(&self, inline: usize) -> Result<(), SafetyError> {
        let depth = self.levels.len() + inline + self.flow_depth;
        if depth > self.max_depth {
            return Err(SafetyError::NestingTooDeep {
                depth,
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    /// Update the open block levels for a line starting at `indent`.
    fn open_line(&mut self, indent: usize, is_item: bool) {
        while self.levels.last().is_some_and(|top| top.col() > indent) {
            self.levels.pop();
        }
        if !is_item && self.levels.last() == Some(&Level::Seq(indent)) {
            // A key at the column of a compact sequence closes that sequence.
            self.levels.pop();
        }
        let level = if is_item {
            Level::Seq(indent)
        } else {
            Level::Map(indent)
        };
        if self.levels.last() != Some(&level) {
            self.levels.push(level);
        }
    }

    /// Record the mapping opened by `- key:` at `col`.
    fn open_item_map(&mut self, col: usize) {
        if self.levels.last().is_some_and(|top| top.col() < col) {
            self.levels.push(Level::Map(col));
        }
    }

    #[allow(clippy::too_many_lines)]
    fn scan_line(&mut self, line: &str, number: usize) -> Result<(), SafetyError> {
        let bytes = line.as_bytes();
        let indent = bytes.iter().take_while(|&&b| b == b' ').count();
        let blank = line.trim().is_empty();

        if let Some(parent) = self.block_parent {
            if blank || indent > parent {
                return Ok(());
            }
            self.block_parent = None;
        }

        if let Some(parent) = self.plain_parent {
            if blank {
                return Ok(());
            }
            if indent > parent && !line[indent..].starts_with('#') {
                return Ok(());
            }
            self.plain_parent = None;
        }

        let mut i = 0;
        let block_line = self.quote.is_none() && self.flow_depth == 0;
        if block_line {
            let rest = &line[indent..];
            if rest.is_empty() || rest.starts_with('#') {
                return Ok(());
            }
            if indent == 0 && (rest.starts_with('%') || rest == "---" || rest == "...") {
                return Ok(());
            }
            if indent == 0 && rest.starts_with("--- ") {
                i = 4;
            } else {
                let is_item = rest == "-" || rest.starts_with("- ");
                self.open_line(indent, is_item);
                self.check_depth(0)?;
                i = indent;
            }
        }

        let at = || format!("line {number}");
        let mut node_start = if self.flow_depth > 0 && self.quote.is_none() {
            self.flow_node_start
        } else {
            true
        };
        let mut plain = false;
        let mut dashes = 0;
        let mut dash_col = indent;
        let mut key_col: Option<usize> = None;
        let mut key_seen = false;

        while i < bytes.len() {
            let b = bytes[i];

            match self.quote {
                Some(Quote::Double) => {
                    match b {
                        b'\\' => i += 1,
                        b'"' => {
                            self.quote = None;
                            node_start = false;
                        }
                        _ => {}
                    }
                    i += 1;
                    continue;
                }
                Some(Quote::Single) => {
                    if b == b'\'' {
                        if bytes.get(i + 1) == Some(&b'\'') {
                            i += 1;
                        } else {
                            self.quote = None;
                            node_start = false;
                        }
                    }
                    i += 1;
                    continue;
                }
                None => {}
            }

            if b == b' ' || b == b'\t' {
                i += 1;
                continue;
            }
            let prev_blank = i == 0 || matches!(bytes[i - 1], b' ' | b'\t');
            if b == b'#' && prev_blank {
                plain = false;
                break;
            }
            let next = bytes.get(i + 1).copied();
            let next_blank = matches!(next, None | Some(b' ' | b'\t'));

            if node_start {
                match b {
                    b'&' => return Err(SafetyError::Anchor { at: at() }),
                    b'*' => return Err(SafetyError::Alias { at: at() }),
                    b'!' => return Err(SafetyError::Tag { at: at() }),
                    b'<' if line[i..].starts_with("<<")
                        && line[i + 2..].trim_start().starts_with(':') =>
                    {
                        return Err(SafetyError::MergeKey { at: at() });
                    }
                    b'"' => {
                        self.quote = Some(Quote::Double);
                        key_col.get_or_insert(i);
                    }
                    b'\'' => {
                        self.quote = Some(Quote::Single);
                        key_col.get_or_insert(i);
                    }
                    b'|' | b'>' if self.flow_depth == 0 => {
                        self.block_parent = Some(if key_seen {
                            key_col.unwrap_or(dash_col)
                        } else {
                            dash_col
                        });
                        return Ok(());
                    }
                    b'-' if next_blank && self.flow_depth == 0 => {
                        dashes += 1;
                        dash_col = i;
                        self.check_depth(dashes - 1)?;
                    }
                    b'?' if next_blank => {}
                    b':' => {}
                    b',' if self.flow_depth > 0 => {}
                    b'[' | b'{' => {
                        self.flow_depth += 1;
                        self.check_depth(dashes.saturating_sub(1))?;
                    }
                    b']' | b'}' => {
                        self.flow_depth = self.flow_depth.saturating_sub(1);
                        node_start = false;
                    }
                    _ => {
                        key_col.get_or_insert(i);
                        node_start = false;
                        plain = self.flow_depth == 0;
                    }
                }
                i += 1;
                continue;
            }

            match b {
                b':' if next_blank || self.flow_depth > 0 => {
                    node_start = true;
                    plain = false;
                    if self.flow_depth == 0 && !key_seen {
                        key_seen = true;
                        if dashes > 0 {
                            if let Some(col) = key_col {
                                self.open_item_map(col);
                                self.check_depth(dashes - 1)?;
                            }
                        }
                    }
                }
                b',' if self.flow_depth > 0 => node_start = true,
                b'[' | b'{' if self.flow_depth > 0 => {
                    self.flow_depth += 1;
                    self.check_depth(dashes.saturating_sub(1))?;
                    node_start = true;
                }
                b']' | b'}' if self.flow_depth > 0 => {
                    self.flow_depth -= 1;
                }
                _ => {}
            }
            i += 1;
        }

        if self.flow_depth > 0 {
            self.flow_node_start = node_start;
        } else {
            self.flow_node_start = true;
            if plain && self.quote.is_none() {
                // The value may continue on more-indented lines.
                self.plain_parent = Some(if key_seen {
                    key_col.unwrap_or(dash_col)
                } else if dashes > 0 {
                    dash_col
                } else {
                    indent.saturating_sub(1)
                });
            }
        }

        Ok(())
    }
}
