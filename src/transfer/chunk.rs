//! Chunk Encoding
//!
//! Splits a payload byte stream into fixed-size binary blocks and encodes
//! each block as base64 text. Chunks are produced on demand so peak memory
//! stays bounded by the block size, not the payload size.

use crate::transfer::error::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::Read;

/// One text-safe encoded fragment of a payload block.
///
/// Concatenating the decoded bytes of all chunks in sequence order
/// reproduces the original payload exactly. The encoded text is plain
/// base64 (ASCII, no quote or newline characters), safe for both output
/// channels without further escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based, contiguous sequence number
    pub sequence: u32,
    /// Base64 text of the block
    pub text: String,
    /// Number of payload bytes this chunk decodes to
    pub decoded_len: u32,
}

/// Base64 output length for `payload_len` bytes, including padding.
pub fn encoded_len(payload_len: u64) -> u64 {
    payload_len.div_ceil(3) * 4
}

/// Streaming block-wise base64 encoder.
///
/// Reads `block_size` bytes per chunk from the underlying source. A block
/// size that is a multiple of 3 keeps every chunk padding-free except the
/// last; any positive size is accepted and the final block is padded per
/// the standard base64 rule.
pub struct ChunkEncoder<R> {
    reader: R,
    block: Vec<u8>,
    next_sequence: u32,
    finished: bool,
}

impl<R: Read> ChunkEncoder<R> {
    /// Create an encoder reading blocks of `block_size` bytes.
    pub fn new(reader: R, block_size: usize) -> Self {
        Self {
            reader,
            block: vec![0u8; block_size.max(1)],
            next_sequence: 0,
            finished: false,
        }
    }

    fn fill_block(&mut self) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < self.block.len() {
            match self.reader.read(&mut self.block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for ChunkEncoder<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let filled = match self.fill_block() {
            Ok(n) => n,
            Err(e) => {
                // No partial chunk is emitted for an incomplete read
                self.finished = true;
                return Some(Err(e.into()));
            }
        };

        if filled == 0 {
            self.finished = true;
            return None;
        }

        let chunk = Chunk {
            sequence: self.next_sequence,
            text: STANDARD.encode(&self.block[..filled]),
            decoded_len: filled as u32,
        };
        self.next_sequence += 1;

        if filled < self.block.len() {
            // Short read means the source is drained
            self.finished = true;
        }

        Some(Ok(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn encode_all(bytes: &[u8], block_size: usize) -> Vec<Chunk> {
        ChunkEncoder::new(Cursor::new(bytes.to_vec()), block_size)
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_single_block_exact() {
        // One 3-byte block with block_size=3: exactly one chunk, 4 base64
        // chars, no padding
        let chunks = encode_all(b"Man", 3);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence, 0);
        assert_eq!(chunks[0].text, "TWFu");
        assert_eq!(chunks[0].decoded_len, 3);
    }

    #[test]
    fn test_final_block_padded() {
        let chunks = encode_all(b"Ma", 3);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "TWE=");
        assert_eq!(chunks[0].decoded_len, 2);
    }

    #[test]
    fn test_sequence_contiguous() {
        let chunks = encode_all(&[0xAB; 100], 9);
        assert_eq!(chunks.len(), 12);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence, i as u32);
        }
        assert_eq!(chunks.last().unwrap().decoded_len, 1);
    }

    #[test]
    fn test_empty_source() {
        let chunks = encode_all(b"", 192);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_text_is_ascii_safe() {
        let chunks = encode_all(&(0u8..=255).collect::<Vec<_>>(), 48);
        for chunk in &chunks {
            assert!(chunk.text.is_ascii());
            assert!(!chunk.text.contains('"'));
            assert!(!chunk.text.contains('\''));
            assert!(!chunk.text.contains('\n'));
        }
    }

    #[test]
    fn test_read_error_surfaces() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            }
        }

        let mut encoder = ChunkEncoder::new(FailingReader, 3);
        assert!(encoder.next().unwrap().is_err());
        assert!(encoder.next().is_none());
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(0), 0);
        assert_eq!(encoded_len(3), 4);
        assert_eq!(encoded_len(4), 8);
        assert_eq!(encoded_len(300), 400);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..2048), block in 1usize..64) {
            let chunks = encode_all(&payload, block);
            let mut decoded = Vec::new();
            for chunk in &chunks {
                let bytes = STANDARD.decode(&chunk.text).unwrap();
                prop_assert_eq!(bytes.len() as u32, chunk.decoded_len);
                decoded.extend_from_slice(&bytes);
            }
            prop_assert_eq!(decoded, payload);
        }
    }
}
