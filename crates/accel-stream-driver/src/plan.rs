//! Chunk geometry for one transfer
//!
//! Splits `length` elements into `chunk_size` pieces: `full_chunks` whole
//! chunks covering `body_length` elements, then at most one short chunk of
//! `remainder` elements.

use crate::error::{Result, StreamError};
use std::ops::Range;

/// A contiguous slice of the buffer moved by one device operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Element offset into the buffer
    pub offset: usize,
    /// Element count
    pub len: usize,
}

impl Chunk {
    /// Create a chunk
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Buffer index range covered by this chunk
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    /// End offset (exclusive)
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Validated transfer geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    length: usize,
    chunk_size: usize,
    remainder: usize,
    body_length: usize,
}

impl ChunkPlan {
    /// Create a plan for `length` elements in `chunk_size` pieces
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if either value is zero.
    pub fn new(length: usize, chunk_size: usize) -> Result<Self> {
        if length == 0 {
            return Err(StreamError::invalid_argument("length must be > 0"));
        }
        if chunk_size == 0 {
            return Err(StreamError::invalid_argument("chunk size must be > 0"));
        }

        let remainder = length % chunk_size;
        Ok(Self {
            length,
            chunk_size,
            remainder,
            body_length: length - remainder,
        })
    }

    /// Total elements
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Elements per full chunk
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Elements in the final short chunk (0 if none)
    pub const fn remainder(&self) -> usize {
        self.remainder
    }

    /// Elements covered by full chunks
    pub const fn body_length(&self) -> usize {
        self.body_length
    }

    /// Number of full chunks
    pub const fn full_chunks(&self) -> usize {
        self.body_length / self.chunk_size
    }

    /// Device operations per side
    pub const fn op_count(&self) -> usize {
        self.full_chunks() + if self.remainder == 0 { 0 } else { 1 }
    }

    /// Whether `chunk` is the short remainder chunk
    pub const fn is_short(&self, chunk: &Chunk) -> bool {
        chunk.len < self.chunk_size
    }

    /// Chunks in transfer order: full chunks, then the remainder
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        let full = (0..self.body_length)
            .step_by(self.chunk_size)
            .map(|offset| Chunk::new(offset, self.chunk_size));
        let tail = (self.remainder != 0).then(|| Chunk::new(self.body_length, self.remainder));
        full.chain(tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_with_remainder() {
        let plan = ChunkPlan::new(100, 40).unwrap();
        assert_eq!(plan.remainder(), 20);
        assert_eq!(plan.body_length(), 80);
        assert_eq!(plan.full_chunks(), 2);
        assert_eq!(plan.op_count(), 3);

        let chunks: Vec<_> = plan.chunks().collect();
        assert_eq!(
            chunks,
            vec![Chunk::new(0, 40), Chunk::new(40, 40), Chunk::new(80, 20)]
        );
        assert!(plan.is_short(&chunks[2]));
        assert!(!plan.is_short(&chunks[0]));
    }

    #[test]
    fn test_plan_exact_multiple() {
        let plan = ChunkPlan::new(128, 32).unwrap();
        assert_eq!(plan.remainder(), 0);
        assert_eq!(plan.op_count(), 4);
        assert!(plan.chunks().all(|c| c.len == 32));
    }

    #[test]
    fn test_chunk_larger_than_length() {
        let plan = ChunkPlan::new(10, 16).unwrap();
        assert_eq!(plan.body_length(), 0);
        assert_eq!(plan.full_chunks(), 0);
        assert_eq!(plan.chunks().collect::<Vec<_>>(), vec![Chunk::new(0, 10)]);
    }

    #[test]
    fn test_zero_inputs_rejected() {
        assert!(matches!(
            ChunkPlan::new(0, 16),
            Err(StreamError::InvalidArgument { .. })
        ));
        assert!(matches!(
            ChunkPlan::new(16, 0),
            Err(StreamError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_chunks_tile_the_buffer() {
        for length in 1..=50 {
            for chunk_size in 1..=60 {
                let plan = ChunkPlan::new(length, chunk_size).unwrap();
                let mut expected = 0;
                for chunk in plan.chunks() {
                    assert_eq!(chunk.offset, expected);
                    expected = chunk.end();
                }
                assert_eq!(expected, length, "length={length} chunk={chunk_size}");
            }
        }
    }
}
