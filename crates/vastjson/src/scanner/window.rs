use crate::{error::SourceError, source::ByteSource};

/// A sliding view over a [`ByteSource`], refilled one window at a time.
///
/// The scanner walks forward byte by byte; this keeps the per-byte cost a
/// bounds check instead of a source read.
#[derive(Debug)]
pub(crate) struct Window {
    buf: Vec<u8>,
    start: usize,
    size: usize,
}

impl Window {
    pub fn new(size: usize) -> Self {
        Self {
            buf: Vec::new(),
            start: 0,
            size: size.max(1),
        }
    }

    /// The byte at absolute offset `pos`, or `None` at end of source.
    #[inline]
    pub fn byte_at(&mut self, src: &mut dyn ByteSource, pos: usize) -> Result<Option<u8>, SourceError> {
        if let Some(b) = pos.checked_sub(self.start).and_then(|i| self.buf.get(i)) {
            return Ok(Some(*b));
        }
        let len = src.len();
        if pos >= len {
            return Ok(None);
        }
        self.refill(src, pos, len)?;
        Ok(self.buf.first().copied())
    }

    fn refill(&mut self, src: &mut dyn ByteSource, pos: usize, len: usize) -> Result<(), SourceError> {
        let n = self.size.min(len - pos);
        let bytes = src.read(pos, n)?;
        self.buf.clear();
        self.buf.extend_from_slice(&bytes);
        self.start = pos;
        Ok(())
    }

    /// Drops the buffered bytes, releasing the scratch allocation.
    pub fn clear(&mut self) {
        self.buf = Vec::new();
        self.start = 0;
    }
}
