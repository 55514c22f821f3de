//! Shell-integration OSC scanner.
//!
//! Recognises two independent sequence families inside decoded pane text:
//!
//! - command markers: `ESC ] 133 ; <letter> [ ; <payload> ] (BEL | ESC \)`
//!   (`633` is accepted as an alias prefix)
//! - cwd announcements: `ESC ] 7 ; <uri-or-path> (BEL | ESC \)`
//!
//! Matching is per fragment. A sequence whose terminator arrives in a later
//! fragment is not seen here; see [`unterminated_tail`] for the opt-in
//! carry-over used by the registry.

use std::ops::Range;

use crate::cwd::decode_cwd_value;

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;
const OSC_INTRO: &str = "\x1b]";

/// Structured event derived from one recognised sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// `B`: the user finished typing, the command is about to run.
    CommandStart,
    /// `C`: command output begins.
    CommandExecute,
    /// `D[;payload]`: command finished, payload optionally carries the exit code.
    CommandFinish { payload: Option<String> },
    /// `P;key=value`.
    PropertyUpdate { key: String, value: String },
    /// OSC 7, already percent/URL decoded.
    CwdChange(String),
}

/// One raw match before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RawSequence<'a> {
    Marker { letter: char, payload: Option<&'a str> },
    Cwd(&'a str),
}

/// Stateless scanner; per-pane state lives in the registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellProtocolParser;

impl ShellProtocolParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse every complete sequence in `text`, left to right.
    ///
    /// Unknown marker letters and undecodable cwd values are logged and
    /// skipped without affecting later matches.
    pub fn parse(&self, text: &str) -> Vec<ProtocolEvent> {
        scan(text)
            .into_iter()
            .filter_map(|(_, raw)| interpret(raw))
            .collect()
    }

    /// Remove every recognised sequence from `text`.
    pub fn strip_sequences(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (range, _) in scan(text) {
            out.push_str(&text[last..range.start]);
            last = range.end;
        }
        out.push_str(&text[last..]);
        out
    }

    /// Whether `text` contains at least one command marker.
    pub fn contains_shell_integration(&self, text: &str) -> bool {
        scan(text)
            .iter()
            .any(|(_, raw)| matches!(raw, RawSequence::Marker { .. }))
    }
}

fn interpret(raw: RawSequence<'_>) -> Option<ProtocolEvent> {
    match raw {
        RawSequence::Marker { letter, payload } => match letter.to_ascii_uppercase() {
            'A' => None,
            'B' => Some(ProtocolEvent::CommandStart),
            'C' => Some(ProtocolEvent::CommandExecute),
            'D' => Some(ProtocolEvent::CommandFinish {
                payload: payload.map(str::to_string),
            }),
            'P' => {
                let Some((key, value)) = payload.and_then(|p| p.split_once('=')) else {
                    tracing::debug!("ignoring property marker without key=value: {payload:?}");
                    return None;
                };
                Some(ProtocolEvent::PropertyUpdate {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
            other => {
                tracing::debug!("ignoring shell marker {other}");
                None
            }
        },
        RawSequence::Cwd(value) => match decode_cwd_value(value) {
            Ok(path) => Some(ProtocolEvent::CwdChange(path)),
            Err(e) => {
                tracing::warn!("skipping undecodable cwd announcement {value:?}: {e}");
                None
            }
        },
    }
}

/// Find every complete family A/B sequence with its byte range.
fn scan(text: &str) -> Vec<(Range<usize>, RawSequence<'_>)> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(off) = text[pos..].find(OSC_INTRO) {
        let start = pos + off;
        let body_start = start + OSC_INTRO.len();

        let Some((content_end, seq_end)) = find_terminator(bytes, body_start) else {
            pos = body_start;
            continue;
        };
        let body = &text[body_start..content_end];

        match classify(body) {
            Some(raw) => {
                found.push((start..seq_end, raw));
                pos = seq_end;
            }
            None => pos = body_start,
        }
    }

    found
}

/// Locate `BEL` or `ESC \` after `from`. The body may not contain either
/// control byte, so a bare `ESC` ends the search without a match.
fn find_terminator(bytes: &[u8], from: usize) -> Option<(usize, usize)> {
    let rel = bytes[from..].iter().position(|&b| b == BEL || b == ESC)?;
    let at = from + rel;
    match bytes[at] {
        BEL => Some((at, at + 1)),
        _ if bytes.get(at + 1) == Some(&b'\\') => Some((at, at + 2)),
        _ => None,
    }
}

fn classify(body: &str) -> Option<RawSequence<'_>> {
    let (number, rest) = body.split_once(';')?;
    match number {
        "133" | "633" => {
            let mut chars = rest.chars();
            let letter = chars.next().filter(char::is_ascii_alphabetic)?;
            let after = chars.as_str();
            let payload = if after.is_empty() {
                None
            } else {
                Some(after.strip_prefix(';')?)
            };
            Some(RawSequence::Marker { letter, payload })
        }
        "7" => Some(RawSequence::Cwd(rest)),
        _ => None,
    }
}

/// Byte offset where an unterminated, possibly-ours OSC sequence begins at
/// the end of `text`, if any.
///
/// Used to carry a split sequence over to the next fragment. Tails that
/// cannot become a command marker or cwd announcement are not reported.
pub fn unterminated_tail(text: &str) -> Option<usize> {
    // A trailing bare ESC is either the first half of an ST terminator
    // (carry the whole open sequence) or the start of a new one.
    if let Some(before) = text.strip_suffix('\x1b') {
        return Some(open_sequence_start(before).unwrap_or(before.len()));
    }
    open_sequence_start(text)
}

/// Start of a plausible family A/B sequence left open at the end of `text`.
fn open_sequence_start(text: &str) -> Option<usize> {
    let start = text.rfind(OSC_INTRO)?;
    let body = &text[start + OSC_INTRO.len()..];
    if body.bytes().any(|b| b == BEL || b == ESC) {
        return None;
    }
    let number = body.split(';').next().unwrap_or_default();
    let complete_prefix = body.contains(';');
    let plausible = ["133", "633", "7"].iter().any(|family| {
        if complete_prefix {
            number == *family
        } else {
            family.starts_with(number)
        }
    });
    plausible.then_some(start)
}
