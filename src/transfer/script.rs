//! Reconstruction Script Assembly
//!
//! Wraps the chunk sequence into the literal text fragments transmitted to
//! the destination. Text payloads need no reconstruction program; they are
//! re-chunked to a transmission-safe size and sent verbatim. Archive
//! payloads are wrapped in a small destination-side script that decodes
//! every chunk and appends it to a timestamped output file.
//!
//! The destination is assumed to be a shell that executes each typed line
//! as it is completed, so the archive script text must be reproduced
//! byte-for-byte: the decode loop on the far side parses exactly this
//! shape.

use crate::transfer::chunk::Chunk;
use crate::transfer::error::Result;
use chrono::{DateTime, Utc};
use std::iter::Peekable;

/// Application name baked into the destination-side output file name
pub const APP_NAME: &str = "KeyCourier";

/// Quote character used for destination-side string literals.
///
/// The keystroke variant uses double quotes; the serial variant uses single
/// quotes because the microcontroller firmware forwards the script to a
/// host shell that treats `"` specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `"` literals (keystroke channel)
    Double,
    /// `'` literals (serial channel)
    Single,
}

impl QuoteStyle {
    fn ch(self) -> char {
        match self {
            QuoteStyle::Double => '"',
            QuoteStyle::Single => '\'',
        }
    }
}

/// One literal text fragment of the transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Literal text to emit
    pub text: String,
    /// Sequence number of the chunk this fragment carries, if any
    pub chunk: Option<u32>,
}

impl Fragment {
    fn literal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunk: None,
        }
    }
}

/// Destination-side output file name: timestamped and collision-resistant.
///
/// Format: `<AppName>-Transfer-<UTC yyyyMMddHHmmssff>Z.zip` where `ff` is
/// hundredths of a second.
pub fn output_file_name(now: DateTime<Utc>) -> String {
    format!(
        "{}-Transfer-{}{:02}Z.zip",
        APP_NAME,
        now.format("%Y%m%d%H%M%S"),
        now.timestamp_subsec_millis() / 10,
    )
}

/// Builds the fragment sequence for a payload kind.
#[derive(Debug, Clone, Copy)]
pub struct ScriptAssembler {
    quote: QuoteStyle,
}

impl ScriptAssembler {
    /// Create an assembler emitting literals in the given quote style
    pub fn new(quote: QuoteStyle) -> Self {
        Self { quote }
    }

    /// Fragments for a text payload: the text itself, split into
    /// `max_bytes`-sized pieces on char boundaries.
    pub fn text_fragments(&self, text: &str, max_bytes: usize) -> Vec<Fragment> {
        let max_bytes = max_bytes.max(1);
        let mut fragments = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            let mut end = max_bytes.min(rest.len());
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            if end == 0 {
                // A single char wider than the limit still goes out whole
                end = rest.chars().next().map(char::len_utf8).unwrap_or(1);
            }
            fragments.push(Fragment::literal(&rest[..end]));
            rest = &rest[end..];
        }
        fragments
    }

    /// Fragments for an archive payload: the reconstruction script wrapped
    /// around the live chunk sequence.
    pub fn archive_fragments<I>(&self, chunks: I, now: DateTime<Utc>) -> ArchiveScript<I>
    where
        I: Iterator<Item = Result<Chunk>>,
    {
        ArchiveScript {
            chunks: chunks.peekable(),
            stage: Stage::ArrayOpen,
            quote: self.quote,
            file_name: output_file_name(now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ArrayOpen,
    Chunks,
    FileOpen,
    FileName,
    DecodeLoop,
    Terminator,
    Done,
}

/// Lazy fragment sequence for the archive reconstruction script.
///
/// Emits, in order: the array-literal opener, one quoted literal per chunk
/// (with a `,` separator except after the last), the output-file opener,
/// the quoted output file name, the decode-and-append loop, and a final
/// carriage return that makes the destination shell execute the line.
pub struct ArchiveScript<I: Iterator<Item = Result<Chunk>>> {
    chunks: Peekable<I>,
    stage: Stage,
    quote: QuoteStyle,
    file_name: String,
}

impl<I: Iterator<Item = Result<Chunk>>> Iterator for ArchiveScript<I> {
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        let q = self.quote.ch();
        loop {
            match self.stage {
                Stage::ArrayOpen => {
                    self.stage = Stage::Chunks;
                    return Some(Ok(Fragment::literal("$b=@(")));
                }
                Stage::Chunks => match self.chunks.next() {
                    Some(Ok(chunk)) => {
                        let separator = if self.chunks.peek().is_some() { "," } else { "" };
                        return Some(Ok(Fragment {
                            text: format!("{q}{}{q}{separator}", chunk.text),
                            chunk: Some(chunk.sequence),
                        }));
                    }
                    Some(Err(e)) => {
                        self.stage = Stage::Done;
                        return Some(Err(e));
                    }
                    None => {
                        self.stage = Stage::FileOpen;
                    }
                },
                Stage::FileOpen => {
                    self.stage = Stage::FileName;
                    return Some(Ok(Fragment::literal(
                        ");$fs=[System.IO.File]::OpenWrite((Join-Path (Get-Location).Path ",
                    )));
                }
                Stage::FileName => {
                    self.stage = Stage::DecodeLoop;
                    return Some(Ok(Fragment::literal(format!(
                        "{q}{}{q}));",
                        self.file_name
                    ))));
                }
                Stage::DecodeLoop => {
                    self.stage = Stage::Terminator;
                    return Some(Ok(Fragment::literal(
                        "$b | % { $bytes=[Convert]::FromBase64String($_);\
                         $fs.Write($bytes,0,$bytes.Length) }; $fs.Close()",
                    )));
                }
                Stage::Terminator => {
                    self.stage = Stage::Done;
                    return Some(Ok(Fragment::literal("\r")));
                }
                Stage::Done => return None,
            }
        }
    }
}
