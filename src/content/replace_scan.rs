//! Byte-preserving content-stream scanner for text replacement.
//!
//! Unlike `content::parser`, which builds a full operator AST for text
//! extraction, this module is a narrow filter: it claims only `Tf`, `Tm`,
//! `Tj`, and `TJ`, and leaves every other byte — operators it doesn't
//! understand, comments, inline images — untouched so the content stream can
//! be reproduced exactly when nothing is rewritten.

use crate::fonts::cmap::CMap;
use std::collections::HashMap;
use std::ops::Range;

/// A text-showing operator variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOp {
    /// `(string) Tj`
    Tj,
    /// `[(string) num (string) ...] TJ`
    TJ,
}

/// A decoded occurrence of a text-showing operator.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Which show operator produced this run.
    pub operator: ShowOp,
    /// The font alias selected at the time this run was emitted (the most
    /// recent `Tf` in document order), if any `Tf` preceded it.
    pub font_alias: Option<String>,
    /// Byte range of the whole operator, from the first operand through the
    /// operator keyword, inclusive of both.
    pub raw_span: Range<usize>,
    /// Decoded Unicode text (concatenation of string elements for `TJ`).
    pub decoded: String,
    /// Unescaped raw bytes underlying `decoded`, one byte per decoded
    /// scalar (single-byte encodings only), in the same order.
    pub raw_bytes: Vec<u8>,
    /// Byte ranges (including the enclosing parentheses) of each literal
    /// string operand, in order.
    pub string_spans: Vec<Range<usize>>,
}

/// One item of the tokenized content stream.
#[derive(Debug, Clone)]
pub enum Token {
    /// Raw bytes copied verbatim on reassembly.
    Passthrough(Range<usize>),
    /// `/Name size Tf`
    FontSelect {
        /// Font alias (without the leading `/`).
        name: String,
        /// Font size operand.
        size: f64,
        /// Byte range of the whole operator.
        span: Range<usize>,
    },
    /// `a b c d e f Tm`
    TextMatrix {
        /// The six matrix operands in PDF order.
        matrix: [f64; 6],
        /// Byte range of the whole operator.
        span: Range<usize>,
    },
    /// A decoded text-showing operator.
    Show(TextRun),
}

impl Token {
    /// The byte range this token occupies in the source content stream.
    pub fn span(&self) -> Range<usize> {
        match self {
            Token::Passthrough(r) => r.clone(),
            Token::FontSelect { span, .. } => span.clone(),
            Token::TextMatrix { span, .. } => span.clone(),
            Token::Show(run) => run.raw_span.clone(),
        }
    }
}

#[derive(Debug)]
enum Operand {
    Number { span: Range<usize>, value: f64 },
    Name { span: Range<usize>, name: String },
    Str { span: Range<usize>, raw: Vec<u8> },
    Array { span: Range<usize>, items: Vec<ArrayItem> },
    Other { span: Range<usize> },
}

impl Operand {
    fn start(&self) -> usize {
        match self {
            Operand::Number { span, .. }
            | Operand::Name { span, .. }
            | Operand::Str { span, .. }
            | Operand::Array { span, .. }
            | Operand::Other { span } => span.start,
        }
    }
}

/// One element of a `TJ` array: either a literal string or a numeric
/// kerning adjustment.
#[derive(Debug, Clone)]
enum ArrayItem {
    Str { span: Range<usize>, raw: Vec<u8> },
    Number,
}

fn is_pdf_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

fn is_pdf_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_pdf_whitespace(b) && !is_pdf_delimiter(b)
}

/// Scan a content stream, decoding show-operator runs using each font
/// alias's CMap (looked up by the `Tf` cursor active at the time).
///
/// `cmaps` maps font alias -> decode CMap (ToUnicode, or a synthesized
/// default). A byte with no entry in the active font's CMap decodes as
/// U+003F `?`, matching §4.3's "unmapped bytes become `?`" rule. A run with
/// no active font (no preceding `Tf`) decodes every byte as `?`.
pub fn scan(data: &[u8], cmaps: &HashMap<String, CMap>) -> Vec<Token> {
    let len = data.len();
    let mut pos = 0usize;
    let mut last_emitted_end = 0usize;
    let mut current_font: Option<String> = None;
    let mut stack: Vec<Operand> = Vec::new();
    let mut tokens: Vec<Token> = Vec::new();

    macro_rules! flush_to {
        ($end:expr) => {
            if last_emitted_end < $end {
                tokens.push(Token::Passthrough(last_emitted_end..$end));
            }
        };
    }

    while pos < len {
        let b = data[pos];

        if is_pdf_whitespace(b) {
            pos += 1;
            continue;
        }
        if b == b'%' {
            while pos < len && data[pos] != b'\n' && data[pos] != b'\r' {
                pos += 1;
            }
            continue;
        }
        if b == b'(' {
            let start = pos;
            let (raw, end) = read_literal_string(data, pos);
            pos = end;
            stack.push(Operand::Str { span: start..end, raw });
            continue;
        }
        if b == b'[' {
            let start = pos;
            let (items, end) = read_array(data, pos);
            pos = end;
            stack.push(Operand::Array { span: start..end, items });
            continue;
        }
        if b == b'<' {
            if pos + 1 < len && data[pos + 1] == b'<' {
                let end = skip_dict(data, pos);
                pos = end;
                stack.clear();
                continue;
            }
            let start = pos;
            let end = read_hex_string(data, pos);
            pos = end;
            stack.push(Operand::Other { span: start..end });
            continue;
        }
        if b == b'/' {
            let start = pos;
            let (name, end) = read_name(data, pos);
            pos = end;
            stack.push(Operand::Name { span: start..end, name });
            continue;
        }
        if b == b'-' || b == b'+' || b == b'.' || b.is_ascii_digit() {
            let start = pos;
            let (value, end) = read_number(data, pos);
            pos = end;
            stack.push(Operand::Number { span: start..end, value });
            continue;
        }
        if is_regular(b) {
            // Could be a bare keyword (operator) or the start of `BI`.
            if data[pos..].starts_with(b"BI")
                && (pos + 2 >= len || !is_regular(data[pos + 2]))
            {
                let end = skip_inline_image(data, pos);
                pos = end;
                stack.clear();
                continue;
            }

            let start = pos;
            let end = read_keyword_end(data, pos);
            let keyword = std::str::from_utf8(&data[start..end]).unwrap_or("");

            match keyword {
                "Tf" => {
                    if stack.len() >= 2 {
                        let n = stack.len();
                        if let (Operand::Name { name, .. }, Operand::Number { value, .. }) =
                            (&stack[n - 2], &stack[n - 1])
                        {
                            let op_start = stack[n - 2].start();
                            flush_to!(op_start);
                            current_font = Some(name.clone());
                            tokens.push(Token::FontSelect {
                                name: name.clone(),
                                size: *value,
                                span: op_start..end,
                            });
                            last_emitted_end = end;
                        }
                    }
                },
                "Tm" => {
                    if stack.len() >= 6 {
                        let n = stack.len();
                        let tail = &stack[n - 6..];
                        if tail.iter().all(|o| matches!(o, Operand::Number { .. })) {
                            let mut matrix = [0.0f64; 6];
                            for (i, o) in tail.iter().enumerate() {
                                if let Operand::Number { value, .. } = o {
                                    matrix[i] = *value;
                                }
                            }
                            let op_start = tail[0].start();
                            flush_to!(op_start);
                            tokens.push(Token::TextMatrix { matrix, span: op_start..end });
                            last_emitted_end = end;
                        }
                    }
                },
                "Tj" => {
                    if let Some(Operand::Str { span, raw }) = stack.last() {
                        let op_start = span.start;
                        let string_span = span.clone();
                        flush_to!(op_start);
                        let unescaped = unescape_literal(raw);
                        let decoded = decode_bytes(&unescaped, current_font.as_deref(), cmaps);
                        tokens.push(Token::Show(TextRun {
                            operator: ShowOp::Tj,
                            font_alias: current_font.clone(),
                            raw_span: op_start..end,
                            decoded,
                            raw_bytes: unescaped,
                            string_spans: vec![string_span],
                        }));
                        last_emitted_end = end;
                    }
                },
                "TJ" => {
                    if let Some(Operand::Array { span, items }) = stack.last() {
                        let op_start = span.start;
                        flush_to!(op_start);
                        let mut decoded = String::new();
                        let mut raw_bytes = Vec::new();
                        let mut string_spans = Vec::new();
                        for item in items {
                            if let ArrayItem::Str { span, raw } = item {
                                let unescaped = unescape_literal(raw);
                                decoded
                                    .push_str(&decode_bytes(&unescaped, current_font.as_deref(), cmaps));
                                raw_bytes.extend_from_slice(&unescaped);
                                string_spans.push(span.clone());
                            }
                        }
                        tokens.push(Token::Show(TextRun {
                            operator: ShowOp::TJ,
                            font_alias: current_font.clone(),
                            raw_span: op_start..end,
                            decoded,
                            raw_bytes,
                            string_spans,
                        }));
                        last_emitted_end = end;
                    }
                },
                _ => {},
            }

            stack.clear();
            pos = end;
            continue;
        }

        // Stray delimiter byte (unbalanced `)`/`]`/`>` etc.) - just advance.
        pos += 1;
    }

    flush_to!(len);
    tokens
}

fn decode_bytes(bytes: &[u8], font: Option<&str>, cmaps: &HashMap<String, CMap>) -> String {
    let cmap = font.and_then(|alias| cmaps.get(alias));
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        let ch = cmap
            .and_then(|c| c.get(&(byte as u32)))
            .and_then(|s| s.chars().next())
            .unwrap_or('?');
        out.push(ch);
    }
    out
}

/// Read a balanced literal string starting at `(` (position `start`).
///
/// Returns the raw bytes between the parentheses (escapes not yet
/// processed) and the index just past the closing `)`.
fn read_literal_string(data: &[u8], start: usize) -> (Vec<u8>, usize) {
    let len = data.len();
    let mut pos = start + 1;
    let mut depth = 1i32;
    let content_start = pos;

    while pos < len && depth > 0 {
        match data[pos] {
            b'\\' => {
                pos += 1;
                if pos < len {
                    pos += 1;
                }
            },
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    let content_end = if pos > content_start { pos - 1 } else { content_start };
    (data[content_start..content_end].to_vec(), pos)
}

/// Unescape a PDF literal-string body per ISO 32000-1:2008 §7.3.4.2.
pub fn unescape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let next = bytes[i + 1];
            match next {
                b'n' => {
                    out.push(b'\n');
                    i += 2;
                },
                b'r' => {
                    out.push(b'\r');
                    i += 2;
                },
                b't' => {
                    out.push(b'\t');
                    i += 2;
                },
                b'b' => {
                    out.push(0x08);
                    i += 2;
                },
                b'f' => {
                    out.push(0x0C);
                    i += 2;
                },
                b'(' => {
                    out.push(b'(');
                    i += 2;
                },
                b')' => {
                    out.push(b')');
                    i += 2;
                },
                b'\\' => {
                    out.push(b'\\');
                    i += 2;
                },
                b'\r' => {
                    // Line continuation; also swallow a following \n
                    i += 2;
                    if i < bytes.len() && bytes[i] == b'\n' {
                        i += 1;
                    }
                },
                b'\n' => {
                    i += 2;
                },
                b'0'..=b'7' => {
                    let mut val: u32 = 0;
                    let mut digits = 0;
                    let mut j = i + 1;
                    while digits < 3 && j < bytes.len() && (b'0'..=b'7').contains(&bytes[j]) {
                        val = val * 8 + (bytes[j] - b'0') as u32;
                        j += 1;
                        digits += 1;
                    }
                    out.push((val & 0xFF) as u8);
                    i = j;
                },
                other => {
                    out.push(other);
                    i += 2;
                },
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

/// Re-escape raw bytes for a PDF literal string, producing the bytes that
/// belong between the enclosing parentheses (not included here).
pub fn escape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x00..=0x1F | 0x7F => {
                out.extend_from_slice(format!("\\{:03o}", b).as_bytes());
            },
            _ => out.push(b),
        }
    }
    out
}

fn read_array(data: &[u8], start: usize) -> (Vec<ArrayItem>, usize) {
    let len = data.len();
    let mut pos = start + 1;
    let mut items = Vec::new();

    loop {
        while pos < len && is_pdf_whitespace(data[pos]) {
            pos += 1;
        }
        if pos >= len || data[pos] == b']' {
            pos = (pos + 1).min(len);
            break;
        }
        match data[pos] {
            b'(' => {
                let str_start = pos;
                let (raw, end) = read_literal_string(data, pos);
                items.push(ArrayItem::Str { span: str_start..end, raw });
                pos = end;
            },
            b'-' | b'+' | b'.' | b'0'..=b'9' => {
                let (_, end) = read_number(data, pos);
                items.push(ArrayItem::Number);
                pos = end;
            },
            b'<' => {
                pos = read_hex_string(data, pos);
            },
            _ => {
                pos += 1;
            },
        }
    }

    (items, pos)
}

fn read_name(data: &[u8], start: usize) -> (String, usize) {
    let len = data.len();
    let mut pos = start + 1;
    let mut name = String::new();
    while pos < len && is_regular(data[pos]) {
        if data[pos] == b'#' && pos + 2 < len {
            if let Ok(code) = u8::from_str_radix(
                std::str::from_utf8(&data[pos + 1..pos + 3]).unwrap_or(""),
                16,
            ) {
                name.push(code as char);
                pos += 3;
                continue;
            }
        }
        name.push(data[pos] as char);
        pos += 1;
    }
    (name, pos)
}

fn read_number(data: &[u8], start: usize) -> (f64, usize) {
    let len = data.len();
    let mut pos = start;
    if pos < len && (data[pos] == b'-' || data[pos] == b'+') {
        pos += 1;
    }
    while pos < len && (data[pos].is_ascii_digit() || data[pos] == b'.') {
        pos += 1;
    }
    let value = std::str::from_utf8(&data[start..pos]).unwrap_or("0").parse().unwrap_or(0.0);
    (value, pos)
}

fn read_hex_string(data: &[u8], start: usize) -> usize {
    let len = data.len();
    let mut pos = start + 1;
    while pos < len && data[pos] != b'>' {
        pos += 1;
    }
    (pos + 1).min(len)
}

fn skip_dict(data: &[u8], start: usize) -> usize {
    let len = data.len();
    let mut pos = start + 2;
    let mut depth = 1i32;
    while pos < len && depth > 0 {
        if data[pos] == b'<' && pos + 1 < len && data[pos + 1] == b'<' {
            depth += 1;
            pos += 2;
        } else if data[pos] == b'>' && pos + 1 < len && data[pos + 1] == b'>' {
            depth -= 1;
            pos += 2;
        } else if data[pos] == b'(' {
            let (_, end) = read_literal_string(data, pos);
            pos = end;
        } else {
            pos += 1;
        }
    }
    pos
}

fn read_keyword_end(data: &[u8], start: usize) -> usize {
    let len = data.len();
    let mut pos = start;
    while pos < len && is_regular(data[pos]) {
        pos += 1;
    }
    pos
}

/// Skip over an inline image (`BI ... ID ... EI`), returning the index just
/// past the closing `EI`. Binary image payload between `ID` and `EI` is
/// never interpreted as operators, per §9's required exception.
fn skip_inline_image(data: &[u8], start: usize) -> usize {
    let len = data.len();
    let mut pos = start + 2;

    // Find "ID" keyword marking start of binary data.
    while pos + 1 < len && !(data[pos] == b'I' && data[pos + 1] == b'D') {
        pos += 1;
    }
    pos += 2;
    // A single whitespace byte follows ID before the raw data per spec.
    if pos < len && is_pdf_whitespace(data[pos]) {
        pos += 1;
    }

    // Scan for "EI" preceded/followed by whitespace (heuristic matching
    // real-world content streams; the binary payload is not otherwise
    // delimited).
    while pos + 1 < len {
        if data[pos] == b'E'
            && data[pos + 1] == b'I'
            && (pos == 0 || is_pdf_whitespace(data[pos - 1]))
            && (pos + 2 >= len || is_pdf_whitespace(data[pos + 2]) || is_pdf_delimiter(data[pos + 2]))
        {
            return pos + 2;
        }
        pos += 1;
    }
    len
}

/// Rebuild content-stream bytes from a set of edits over the original data.
///
/// `edits` are `(span, replacement_bytes)` pairs; spans must not overlap.
/// Bytes outside any edited span are copied verbatim.
pub fn reassemble(data: &[u8], edits: &[(Range<usize>, Vec<u8>)]) -> Vec<u8> {
    let mut sorted: Vec<&(Range<usize>, Vec<u8>)> = edits.iter().collect();
    sorted.sort_by_key(|(span, _)| span.start);

    let mut out = Vec::with_capacity(data.len());
    let mut cursor = 0usize;
    for (span, replacement) in sorted {
        if span.start > cursor {
            out.extend_from_slice(&data[cursor..span.start]);
        }
        out.extend_from_slice(replacement);
        cursor = span.end;
    }
    if cursor < data.len() {
        out.extend_from_slice(&data[cursor..]);
    }
    out
}

/// Render a `Tj` or `TJ` operator showing exactly `new_text_bytes`,
/// discarding any original `TJ` kerning adjustments (§4.5.5's intentional
/// simplification).
pub fn render_show(operator: ShowOp, new_bytes: &[u8]) -> Vec<u8> {
    let escaped = escape_literal(new_bytes);
    match operator {
        ShowOp::Tj => {
            let mut out = Vec::with_capacity(escaped.len() + 5);
            out.push(b'(');
            out.extend_from_slice(&escaped);
            out.extend_from_slice(b")Tj");
            out
        },
        ShowOp::TJ => {
            let mut out = Vec::with_capacity(escaped.len() + 7);
            out.extend_from_slice(b"[(");
            out.extend_from_slice(&escaped);
            out.extend_from_slice(b")]TJ");
            out
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::cmap::synthesize_winansi;

    fn ascii_cmaps() -> HashMap<String, CMap> {
        let mut m = HashMap::new();
        m.insert("TT0".to_string(), synthesize_winansi());
        m
    }

    #[test]
    fn scans_simple_tj() {
        let data = b"/TT0 12 Tf (Hello) Tj";
        let tokens = scan(data, &ascii_cmaps());
        let show = tokens.iter().find_map(|t| match t {
            Token::Show(run) => Some(run),
            _ => None,
        });
        let run = show.expect("expected a Show token");
        assert_eq!(run.decoded, "Hello");
        assert_eq!(run.operator, ShowOp::Tj);
        assert_eq!(run.font_alias.as_deref(), Some("TT0"));
    }

    #[test]
    fn scans_tj_array_with_kerning() {
        let data = b"/TT0 12 Tf [(A) -20 (B)] TJ";
        let tokens = scan(data, &ascii_cmaps());
        let show = tokens.iter().find_map(|t| match t {
            Token::Show(run) => Some(run),
            _ => None,
        });
        let run = show.expect("expected a Show token");
        assert_eq!(run.decoded, "AB");
        assert_eq!(run.operator, ShowOp::TJ);
    }

    #[test]
    fn preserves_passthrough_bytes() {
        let data = b"q 1 0 0 1 0 0 cm /TT0 12 Tf (Hi) Tj Q";
        let tokens = scan(data, &ascii_cmaps());
        let mut edits = Vec::new();
        for tok in &tokens {
            if let Token::Passthrough(span) = tok {
                edits.push((span.clone(), data[span.clone()].to_vec()));
            } else {
                edits.push((tok.span(), data[tok.span()].to_vec()));
            }
        }
        let rebuilt = reassemble(data, &edits);
        assert_eq!(rebuilt, data.to_vec());
    }

    #[test]
    fn unescape_handles_escapes() {
        assert_eq!(unescape_literal(b"He\\(llo\\)"), b"He(llo)".to_vec());
        assert_eq!(unescape_literal(b"a\\101b"), b"aAb".to_vec());
        assert_eq!(unescape_literal(b"tab\\t"), b"tab\t".to_vec());
    }

    #[test]
    fn escape_round_trips_parens() {
        let escaped = escape_literal(b"a(b)c");
        assert_eq!(escaped, b"a\\(b\\)c".to_vec());
        assert_eq!(unescape_literal(&escaped), b"a(b)c".to_vec());
    }

    #[test]
    fn render_show_drops_kerning() {
        let out = render_show(ShowOp::TJ, b"CD");
        assert_eq!(out, b"[(CD)]TJ".to_vec());
    }

    #[test]
    fn skips_inline_image_payload() {
        let data = b"BI /W 1 /H 1 ID \x01\x02(Tj)EI Q";
        let tokens = scan(data, &ascii_cmaps());
        // No show token should be produced from the inline image bytes.
        assert!(tokens.iter().all(|t| !matches!(t, Token::Show(_))));
    }
}
