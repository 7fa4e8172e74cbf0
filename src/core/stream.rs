use super::base_stream::BaseStream;
use super::error::{PDFError, PDFResult};
use std::sync::Arc;

/// In-memory byte stream.
///
/// The buffer is shared through an `Arc`, so sub-streams over a scanned file
/// (one per object body) and the page content buffer never copy data.
pub struct Stream {
    bytes: Arc<Vec<u8>>,
    pos: usize,
    start: usize,
    /// Length of accessible data from `start`
    length: usize,
}

impl Stream {
    /// Creates a stream over `bytes[start..start + length]` of a shared buffer.
    ///
    /// The window is clamped to the buffer so a bad length from a damaged
    /// file can never index out of bounds.
    pub fn from_shared(bytes: Arc<Vec<u8>>, start: usize, length: usize) -> Self {
        let start = start.min(bytes.len());
        let length = length.min(bytes.len() - start);
        Stream {
            bytes,
            pos: start,
            start,
            length,
        }
    }

    /// Creates a stream owning the given bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let length = bytes.len();
        Self::from_shared(Arc::new(bytes), 0, length)
    }

    /// Returns the bytes visible through this stream's window.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.start..self.start + self.length]
    }

    fn end(&self) -> usize {
        self.start + self.length
    }
}

impl BaseStream for Stream {
    fn length(&self) -> usize {
        self.length
    }

    fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn set_pos(&mut self, pos: usize) -> PDFResult<()> {
        if pos < self.start || pos > self.end() {
            return Err(PDFError::InvalidPosition {
                pos,
                length: self.length,
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn get_byte(&mut self) -> PDFResult<u8> {
        if self.pos >= self.end() {
            return Err(PDFError::UnexpectedEndOfStream);
        }
        let byte = self.bytes[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn get_bytes(&mut self, length: usize) -> PDFResult<Vec<u8>> {
        let end_pos = self.pos + length;
        if end_pos > self.end() {
            return Err(PDFError::UnexpectedEndOfStream);
        }
        let bytes = self.bytes[self.pos..end_pos].to_vec();
        self.pos = end_pos;
        Ok(bytes)
    }

    fn reset(&mut self) -> PDFResult<()> {
        self.pos = self.start;
        Ok(())
    }

    fn make_sub_stream(&self, start: usize, length: usize) -> PDFResult<Box<dyn BaseStream>> {
        if start < self.start || start + length > self.end() {
            return Err(PDFError::InvalidByteRange {
                begin: start,
                end: start + length,
            });
        }
        Ok(Box::new(Stream::from_shared(
            Arc::clone(&self.bytes),
            start,
            length,
        )))
    }
}
