//! Segmentation of raw assistant replies into typed content blocks.
//!
//! A reply is scanned line by line and split into plain text, fenced code
//! and math blocks. The scan is total: malformed markers degrade to literal
//! text, never to an error.

use serde::{Deserialize, Serialize};

/// One typed unit of a structured chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain prose. Never emitted with empty content.
    Text { content: String },
    /// Fenced code with an optional language tag (empty when none was given).
    Code {
        #[serde(default)]
        language: String,
        content: String,
    },
    /// Inline (`$...$`) or display (`$$...$$`) math.
    Math { display: bool, content: String },
}

/// A content block as supplied by the client.
///
/// Inbound blocks are duck-typed: `code` and `math` are recognized, any other
/// `type` is carried as plain text. [`flatten`] is the single place this
/// polymorphism is resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub display: Option<bool>,
    #[serde(default)]
    pub content: String,
}

/// Parse a raw reply into an ordered block sequence.
///
/// Pure and deterministic. Prose lines re-join with single spaces, fenced
/// code keeps its lines verbatim, math spans must open and close on the same
/// line. Content of a fence still open at end of input is dropped.
pub fn parse(raw: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut text = String::new();
    let mut fence: Option<(String, Vec<&str>)> = None;

    for line in raw.lines() {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("```") {
            match fence.take() {
                None => {
                    flush_text(&mut blocks, &mut text);
                    fence = Some((rest.trim().to_string(), Vec::new()));
                }
                Some((language, lines)) => {
                    blocks.push(ContentBlock::Code {
                        language,
                        content: lines.join("\n"),
                    });
                }
            }
            continue;
        }

        if let Some((_, lines)) = fence.as_mut() {
            lines.push(line);
            continue;
        }

        scan_prose_line(trimmed, &mut blocks, &mut text);
    }

    flush_text(&mut blocks, &mut text);
    blocks
}

/// Flatten client-supplied blocks back to plain text, the inverse of
/// [`parse`]: code is re-fenced with its language tag, math re-wrapped in its
/// dollar delimiters, anything else passed through. Segments join with
/// single spaces.
pub fn flatten(blocks: &[InboundBlock]) -> String {
    let parts: Vec<String> = blocks
        .iter()
        .map(|block| match block.kind.as_str() {
            "code" => format!(
                "```{}\n{}\n```",
                block.language.as_deref().unwrap_or_default(),
                block.content
            ),
            "math" => {
                if block.display.unwrap_or(false) {
                    format!("$${}$$", block.content)
                } else {
                    format!("${}$", block.content)
                }
            }
            _ => block.content.clone(),
        })
        .filter(|part| !part.is_empty())
        .collect();
    parts.join(" ")
}

/// Render a parsed block sequence back to plain text, for prompt history.
pub fn render(blocks: &[ContentBlock]) -> String {
    let parts: Vec<String> = blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text { content } => content.clone(),
            ContentBlock::Code { language, content } => {
                format!("```{language}\n{content}\n```")
            }
            ContentBlock::Math { display: true, content } => format!("$${content}$$"),
            ContentBlock::Math { display: false, content } => format!("${content}$"),
        })
        .filter(|part| !part.is_empty())
        .collect();
    parts.join(" ")
}

fn flush_text(blocks: &mut Vec<ContentBlock>, text: &mut String) {
    if !text.is_empty() {
        blocks.push(ContentBlock::Text {
            content: std::mem::take(text),
        });
    }
}

/// Scan one prose line for math delimiters, left to right, non-overlapping.
fn scan_prose_line(line: &str, blocks: &mut Vec<ContentBlock>, text: &mut String) {
    let bytes = line.as_bytes();
    let mut joined = false;
    let mut seg_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' || is_escaped(bytes, i) {
            i += 1;
            continue;
        }

        if i + 1 < bytes.len() && bytes[i + 1] == b'$' {
            // Display math must close on the same line; an unclosed `$$`
            // stays literal and scanning resumes past both markers.
            match find_double_dollar(bytes, i + 2) {
                Some(close) => {
                    append_segment(text, &line[seg_start..i], &mut joined);
                    flush_text(blocks, text);
                    blocks.push(ContentBlock::Math {
                        display: true,
                        content: line[i + 2..close].trim().to_string(),
                    });
                    i = close + 2;
                    seg_start = i;
                }
                None => i += 2,
            }
            continue;
        }

        // Inline math: the closer is the next unescaped `$`, and the span
        // must be non-empty.
        match find_single_dollar(bytes, i + 1) {
            Some(close) if close > i + 1 => {
                append_segment(text, &line[seg_start..i], &mut joined);
                flush_text(blocks, text);
                blocks.push(ContentBlock::Math {
                    display: false,
                    content: line[i + 1..close].trim().to_string(),
                });
                i = close + 1;
                seg_start = i;
            }
            _ => i += 1,
        }
    }

    append_segment(text, &line[seg_start..], &mut joined);
}

/// Append a text segment, inserting the line-join space before the first
/// segment a line contributes to a non-empty buffer.
fn append_segment(text: &mut String, segment: &str, joined: &mut bool) {
    if segment.is_empty() {
        return;
    }
    if !*joined && !text.is_empty() {
        text.push(' ');
    }
    *joined = true;
    text.push_str(segment);
}

fn is_escaped(bytes: &[u8], i: usize) -> bool {
    i > 0 && bytes[i - 1] == b'\\'
}

fn find_double_dollar(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'$' && !is_escaped(bytes, i) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn find_single_dollar(bytes: &[u8], from: usize) -> Option<usize> {
    (from..bytes.len()).find(|&i| bytes[i] == b'$' && !is_escaped(bytes, i))
}
