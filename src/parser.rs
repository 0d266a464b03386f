//! Streaming graphics sequence parser.
//!
//! Extracts `ESC _ G ... ESC \` frames from a terminal text stream that
//! may arrive in arbitrary chunks. The parser carries exactly one piece of
//! state across calls - the pending partial-frame buffer - held in an
//! explicit [`StreamParser`] value owned by the caller, so independent
//! terminal sessions can never share a buffer by accident.
//!
//! Two stateless cleanup passes accompany frame extraction and run on
//! every chunk regardless of frame content:
//!
//! - **Echo stripping**: terminal drivers sometimes reflect a partially
//!   eaten protocol response back into the stream (the PTY consumes the
//!   introducer and leaves `i=4;OK` behind). All observed shapes are
//!   recognized and removed.
//! - **Placeholder stripping**: a multiplexer doing passthrough may
//!   substitute invisible Unicode placeholder glyphs for image cells.
//!   Images here render out-of-band, so the placeholders are dropped.

use crate::command::{Command, FRAME_END, FRAME_START};

/// Start of a tmux passthrough wrapper.
const TMUX_START: &str = "\x1bPtmux;";

/// Safety cap on the pending buffer; a frame that never terminates is
/// discarded rather than accumulated forever.
const MAX_PENDING_LEN: usize = 16 * 1024 * 1024;

/// Unicode placeholder glyph used by multiplexers for image cells.
const PLACEHOLDER: char = '\u{10EEEE}';

/// One extracted frame with its byte offsets in the working text.
#[derive(Debug, Clone)]
pub struct ParsedFrame {
    pub command: Command,
    /// Offset of the frame introducer.
    pub start: usize,
    /// Offset just past the terminator.
    pub end: usize,
}

/// Result of feeding one chunk through the parser.
#[derive(Debug)]
pub struct ParseResult {
    /// All literal text with frames removed, in original order. Excludes
    /// any retained partial frame.
    pub cleaned: String,
    /// Frames in stream order, offsets relative to `text`.
    pub frames: Vec<ParsedFrame>,
    /// The full working text (pending prefix + chunk, passthrough
    /// unwrapped). Callers slice literal runs out of this by offset.
    pub text: String,
    /// Where the retained partial frame begins in `text`, if any.
    pub pending_start: Option<usize>,
}

impl ParseResult {
    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }
}

/// Chunk-boundary-safe frame extractor.
#[derive(Debug, Default)]
pub struct StreamParser {
    pending: String,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a partial frame or wrapper is buffered from an earlier
    /// chunk.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop any buffered partial frame.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Feed one chunk; returns the cleaned literal text and any complete
    /// frames. An unterminated frame (or passthrough wrapper) is buffered
    /// and resumes on the next call.
    pub fn parse(&mut self, chunk: &str) -> ParseResult {
        let mut working = std::mem::take(&mut self.pending);
        working.push_str(chunk);

        let (mut text, tail) = unwrap_passthrough(working);
        let scan_limit = text.len();
        if let Some(tail) = &tail {
            text.push_str(tail);
        }
        let mut pending_start = (scan_limit < text.len()).then_some(scan_limit);

        let mut cleaned = String::new();
        let mut frames = Vec::new();
        let mut pos = 0;
        while pos < scan_limit {
            let Some(rel) = text[pos..scan_limit].find(FRAME_START) else {
                cleaned.push_str(&text[pos..scan_limit]);
                break;
            };
            let start = pos + rel;
            cleaned.push_str(&text[pos..start]);
            let interior_start = start + FRAME_START.len();
            match text[interior_start..scan_limit].find(FRAME_END) {
                None => {
                    // Frame spans a future chunk: buffer from the
                    // introducer onward and stop scanning. Never emit a
                    // half-received frame as literal text.
                    pending_start = Some(start);
                    break;
                }
                Some(rel_end) => {
                    let interior_end = interior_start + rel_end;
                    let end = interior_end + FRAME_END.len();
                    frames.push(ParsedFrame {
                        command: Command::parse(&text[interior_start..interior_end]),
                        start,
                        end,
                    });
                    pos = end;
                }
            }
        }

        // A chunk can end mid-introducer; hold the fragment back so the
        // next chunk can complete it instead of flushing ESC as literal.
        if pending_start.is_none() {
            let frag = if text.ends_with("\x1b_") {
                2
            } else if text.ends_with('\x1b') {
                1
            } else {
                0
            };
            if frag > 0 {
                cleaned.truncate(cleaned.len() - frag);
                pending_start = Some(text.len() - frag);
            }
        }

        if let Some(start) = pending_start {
            if text.len() - start > MAX_PENDING_LEN {
                log::warn!(
                    "discarding oversized partial graphics frame ({} bytes)",
                    text.len() - start
                );
                pending_start = None;
            } else {
                self.pending = text[start..].to_string();
            }
        }

        ParseResult {
            cleaned,
            frames,
            text,
            pending_start,
        }
    }
}

/// Unwrap tmux passthrough wrappers: `ESC P tmux ; <inner> ESC \` where
/// every escape inside `<inner>` is doubled except the terminator.
///
/// Returns the unwrapped text plus an optional unfinished tail (a wrapper
/// whose terminator has not arrived yet), left untouched for re-scanning.
fn unwrap_passthrough(text: String) -> (String, Option<String>) {
    if !text.contains(TMUX_START) {
        return (text, None);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    loop {
        let Some(pos) = rest.find(TMUX_START) else {
            out.push_str(rest);
            return (out, None);
        };
        out.push_str(&rest[..pos]);
        let inner_start = pos + TMUX_START.len();
        match find_passthrough_end(&rest[inner_start..]) {
            None => return (out, Some(rest[pos..].to_string())),
            Some(end) => {
                let inner = &rest[inner_start..inner_start + end];
                out.push_str(&inner.replace("\x1b\x1b", "\x1b"));
                rest = &rest[inner_start + end + FRAME_END.len()..];
            }
        }
    }
}

/// Find the un-doubled `ESC \` terminating a passthrough wrapper. Doubled
/// escapes are literal data and skipped as pairs.
fn find_passthrough_end(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0x1b {
            match bytes.get(i + 1) {
                // Trailing lone ESC: cannot decide until more data comes.
                None => return None,
                Some(0x1b) => i += 2,
                Some(b'\\') => return Some(i),
                Some(_) => i += 1,
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Remove echoed protocol responses from a chunk.
///
/// Recognized shapes: the full response frame, the frame without its
/// leading escape, the content without the introducer, the bare
/// `i=N[,p=M];status` body (with or without terminator), and a
/// cursor-positioning-wrapped variant. For the last one, a trailing
/// erase-to-end-of-line is legitimate terminal output and is preserved.
pub fn strip_echoes(text: &str) -> String {
    // Every echo shape contains "i=".
    if !text.contains("i=") {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        // A real frame (one the echo matcher rejects) is opaque: copied
        // verbatim through its terminator so the bare matcher can never
        // fire on a payload that happens to look response-shaped.
        if rest.starts_with(FRAME_START) {
            if let Some(skip) = match_echo(rest) {
                rest = &rest[skip..];
                continue;
            }
            if let Some(end) = rest[FRAME_START.len()..].find(FRAME_END) {
                let frame_end = FRAME_START.len() + end + FRAME_END.len();
                out.push_str(&rest[..frame_end]);
                rest = &rest[frame_end..];
            } else {
                // Unterminated frame: the stream parser will buffer it.
                out.push_str(rest);
                rest = "";
            }
            continue;
        }
        let trigger = matches!(rest.as_bytes()[0], 0x1b | b'_' | b'G' | b'i');
        if trigger {
            if let Some(skip) = match_echo(rest) {
                rest = &rest[skip..];
                continue;
            }
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Try to match one echoed response at the start of `s`; returns how many
/// bytes to remove.
fn match_echo(s: &str) -> Option<usize> {
    if let Some(len) = match_cup_wrapped(s) {
        return Some(len);
    }
    let prefix = response_prefix_len(s);
    // Only the intact full-frame shape is held to the strict rule; the
    // mangled shapes have no legitimate reading and match leniently.
    let strict = prefix == FRAME_START.len();
    match_response_body(&s[prefix..], strict).map(|len| prefix + len)
}

/// Length of an optional response prefix: `ESC _ G`, `_G`, or `G`.
fn response_prefix_len(s: &str) -> usize {
    if s.starts_with(FRAME_START) {
        FRAME_START.len()
    } else if s.starts_with("_G") {
        2
    } else if s.starts_with('G') {
        1
    } else {
        0
    }
}

/// Match `i=<digits>[,p=<digits>];<OK|Exxx[:msg]>` with an optional
/// trailing terminator.
///
/// In strict mode (intact full-frame shape) the status must be followed
/// directly by the terminator - an intact frame with trailing payload
/// text is a genuine command, not an echo. The mangled shapes match
/// leniently, terminator or not.
fn match_response_body(s: &str, strict: bool) -> Option<usize> {
    let rest = s.strip_prefix("i=")?;
    let id_len = leading_digits(rest);
    if id_len == 0 {
        return None;
    }
    let mut idx = 2 + id_len;
    if let Some(after) = s[idx..].strip_prefix(",p=") {
        let p_len = leading_digits(after);
        if p_len == 0 {
            return None;
        }
        idx += 3 + p_len;
    }
    if !s[idx..].starts_with(';') {
        return None;
    }
    idx += 1;

    if s[idx..].starts_with("OK") {
        idx += 2;
        if s[idx..].starts_with(FRAME_END) {
            return Some(idx + FRAME_END.len());
        }
        if strict {
            return None;
        }
        Some(idx)
    } else {
        // Error status, e.g. "ENOENT:no such image".
        let body = &s[idx..];
        let mut chars = body.chars();
        if chars.next() != Some('E') || !chars.next().is_some_and(|c| c.is_ascii_uppercase()) {
            return None;
        }
        if let Some(end) = body.find(FRAME_END) {
            // A stray ESC before the terminator means this is not an echo.
            if body[..end].contains('\x1b') {
                return None;
            }
            return Some(idx + end + FRAME_END.len());
        }
        if strict {
            return None;
        }
        // Unterminated bare error: bounded by the next control character.
        let end = body
            .find(|c: char| c.is_control())
            .unwrap_or(body.len());
        Some(idx + end)
    }
}

/// Match `ESC [ <row> ; <col> H` followed by a response; the cursor
/// positioning and the response are stripped together. A trailing
/// `ESC [ K` is deliberately not consumed.
fn match_cup_wrapped(s: &str) -> Option<usize> {
    let rest = s.strip_prefix("\x1b[")?;
    let row_len = leading_digits(rest);
    if row_len == 0 {
        return None;
    }
    let rest = rest[row_len..].strip_prefix(';')?;
    let col_len = leading_digits(rest);
    if col_len == 0 || !rest[col_len..].starts_with('H') {
        return None;
    }
    let cup_len = 2 + row_len + 1 + col_len + 1;
    let inner = &s[cup_len..];
    let prefix = response_prefix_len(inner);
    let strict = prefix == FRAME_START.len();
    let body_len = match_response_body(&inner[prefix..], strict)?;
    Some(cup_len + prefix + body_len)
}

fn leading_digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

/// Remove Unicode placeholder glyphs and their row/column diacritics.
pub fn strip_placeholders(text: &str) -> String {
    if !text.contains(PLACEHOLDER) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == PLACEHOLDER {
            while chars.peek().is_some_and(|&next| is_row_col_diacritic(next)) {
                chars.next();
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Combining diacritical marks used to encode placeholder row/column.
fn is_row_col_diacritic(c: char) -> bool {
    matches!(
        u32::from(c),
        0x0300..=0x036F
            | 0x0483..=0x0489
            | 0x1AB0..=0x1AFF
            | 0x1DC0..=0x1DFF
            | 0x20D0..=0x20FF
            | 0xFE20..=0xFE2F
    )
}
