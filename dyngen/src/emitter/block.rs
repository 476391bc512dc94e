use super::{EmitError, SourceWriter};
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// Closes the block opened by [`SourceWriter::scoped_block`] when dropped.
///
/// The guard derefs to the writer, so the block body is written through it.
/// If the block was already closed by hand, the guard leaves the enclosing
/// blocks alone.
pub struct BlockGuard<'w> {
    writer: &'w mut SourceWriter,
    depth: usize,
    trailing: Option<String>,
    closed: bool,
}

impl<'w> BlockGuard<'w> {
    pub(super) fn new(writer: &'w mut SourceWriter) -> Self {
        let depth = writer.indentation_level();
        Self {
            writer,
            depth,
            trailing: None,
            closed: false,
        }
    }

    /// Text appended right after the closing delimiter, e.g. `;`.
    pub fn with_trailing(mut self, trailing: &str) -> Self {
        self.trailing = Some(trailing.to_string());
        self
    }

    /// Close the block now and surface any imbalance.
    pub fn close(mut self) -> Result<(), EmitError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), EmitError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.writer.indentation_level() < self.depth {
            return Err(EmitError::CloseWithoutOpen);
        }
        self.writer.finish_block(self.trailing.as_deref())
    }
}

impl Deref for BlockGuard<'_> {
    type Target = SourceWriter;

    fn deref(&self) -> &SourceWriter {
        &*self.writer
    }
}

impl DerefMut for BlockGuard<'_> {
    fn deref_mut(&mut self) -> &mut SourceWriter {
        &mut *self.writer
    }
}

impl Drop for BlockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Scoped block at depth {} was already closed: {}", self.depth, e);
        }
    }
}
