use super::error::PDFResult;

/// Byte source consumed by the [`Lexer`](super::lexer::Lexer).
///
/// Content streams are always fully materialized before tokenizing (decoded
/// and concatenated), so implementations only need cheap random access over
/// an in-memory buffer. Object bodies found while scanning a file use the
/// same interface through sub-streams that share the file buffer.
pub trait BaseStream {
    /// Returns the total length of the stream in bytes.
    fn length(&self) -> usize;

    /// Returns true if the stream contains no data.
    fn is_empty(&self) -> bool;

    /// Returns the current absolute position in the underlying buffer.
    fn pos(&self) -> usize;

    /// Sets the current absolute position.
    fn set_pos(&mut self, pos: usize) -> PDFResult<()>;

    /// Reads a single byte, advancing the position.
    ///
    /// Returns [`PDFError::UnexpectedEndOfStream`](super::PDFError) past the end.
    fn get_byte(&mut self) -> PDFResult<u8>;

    /// Reads `length` bytes, advancing the position.
    fn get_bytes(&mut self, length: usize) -> PDFResult<Vec<u8>>;

    /// Rewinds to the start of the stream.
    fn reset(&mut self) -> PDFResult<()>;

    /// Creates a sub-stream over `start..start + length` sharing this stream's buffer.
    fn make_sub_stream(&self, start: usize, length: usize) -> PDFResult<Box<dyn BaseStream>>;

    /// Reads a single byte without advancing the position.
    fn peek_byte(&mut self) -> PDFResult<u8> {
        let current_pos = self.pos();
        let byte = self.get_byte()?;
        self.set_pos(current_pos)?;
        Ok(byte)
    }

    /// Skips `n` bytes.
    fn skip(&mut self, n: usize) -> PDFResult<()> {
        self.set_pos(self.pos() + n)
    }
}
