// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Line-ending normalization of streamed command output.
//!
//! Output arrives in arbitrary chunks, so a `\r` at the end of one chunk
//! may be the first half of a `\r\n` split across two. The normalizer
//! holds such a byte back until the next chunk (or the end of the stream)
//! decides what it was.

use cs_core::LineEnding;

/// How output must be rewritten for the local side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    None,
    CrlfToLf,
    LfToCrlf,
}

impl Conversion {
    /// The conversion from text produced with `remote` line endings to
    /// text read with `local` ones.
    pub fn between(remote: LineEnding, local: LineEnding) -> Self {
        match (remote, local) {
            (LineEnding::Crlf, LineEnding::Lf) => Conversion::CrlfToLf,
            (LineEnding::Lf, LineEnding::Crlf) => Conversion::LfToCrlf,
            _ => Conversion::None,
        }
    }
}

/// Rewrites one output stream chunk by chunk.
#[derive(Debug, Clone)]
pub struct LineNormalizer {
    conversion: Conversion,
    /// A trailing `\r` not yet emitted (CRLF to LF).
    held_cr: bool,
    /// The last byte emitted was `\r` (LF to CRLF).
    after_cr: bool,
}

impl LineNormalizer {
    pub fn new(conversion: Conversion) -> Self {
        LineNormalizer {
            conversion,
            held_cr: false,
            after_cr: false,
        }
    }

    /// Converts a chunk. The result may be empty when the chunk only
    /// contained a held-back `\r`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        match self.conversion {
            Conversion::None => chunk.to_vec(),
            Conversion::CrlfToLf => self.crlf_to_lf(chunk),
            Conversion::LfToCrlf => self.lf_to_crlf(chunk),
        }
    }

    /// Flushes whatever was held back at the end of the stream.
    pub fn finish(&mut self) -> Vec<u8> {
        if std::mem::take(&mut self.held_cr) {
            vec![b'\r']
        } else {
            Vec::new()
        }
    }

    fn crlf_to_lf(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + 1);
        if chunk.is_empty() {
            return Vec::new();
        }
        let mut bytes = chunk.iter().copied().peekable();
        if std::mem::take(&mut self.held_cr) && bytes.peek() != Some(&b'\n') {
            out.push(b'\r');
        }
        while let Some(byte) = bytes.next() {
            if byte != b'\r' {
                out.push(byte);
                continue;
            }
            match bytes.peek() {
                Some(b'\n') => {}
                Some(_) => out.push(b'\r'),
                None => self.held_cr = true,
            }
        }
        out
    }

    fn lf_to_crlf(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + chunk.len() / 8);
        for &byte in chunk {
            if byte == b'\n' && !self.after_cr {
                out.push(b'\r');
            }
            out.push(byte);
            self.after_cr = byte == b'\r';
        }
        out
    }
}

/// Converts a complete text in one go.
pub fn normalize(text: &[u8], conversion: Conversion) -> Vec<u8> {
    let mut normalizer = LineNormalizer::new(conversion);
    let mut out = normalizer.push(text);
    out.extend(normalizer.finish());
    out
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
