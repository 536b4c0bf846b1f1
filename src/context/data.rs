/*!
 * Payload Access
 * Bounds-checked read/write operations on tracked blocks
 */

use super::MemContext;
use crate::types::*;
use log::debug;

impl MemContext {
    /// Write bytes into a block's payload at `offset`.
    ///
    /// The range must lie inside the payload; guard regions are never
    /// reachable through this surface.
    pub fn write(&self, block: BlockId, offset: Size, bytes: &[u8]) -> TrackResult<()> {
        let Some(mut entry) = self.core.blocks.get_mut(&block) else {
            let err = self.classify_missing(block);
            return Err(self.reject(err));
        };

        let size = entry.size;
        let end = match offset.checked_add(bytes.len()) {
            Some(end) if end <= size => end,
            _ => {
                return Err(TrackError::OutOfBounds {
                    block,
                    offset,
                    len: bytes.len(),
                    size,
                })
            }
        };

        entry.payload_mut()[offset..end].copy_from_slice(bytes);

        debug!("Wrote {} bytes to {} at offset {}", bytes.len(), block, offset);
        Ok(())
    }

    /// Read `len` bytes from a block's payload at `offset`.
    ///
    /// Bytes that were never written still carry the init fill pattern.
    pub fn read(&self, block: BlockId, offset: Size, len: Size) -> TrackResult<Vec<u8>> {
        let Some(entry) = self.core.blocks.get(&block) else {
            let err = self.classify_missing(block);
            return Err(self.reject(err));
        };

        let size = entry.size;
        let end = match offset.checked_add(len) {
            Some(end) if end <= size => end,
            _ => {
                return Err(TrackError::OutOfBounds {
                    block,
                    offset,
                    len,
                    size,
                })
            }
        };

        let data = entry.payload()[offset..end].to_vec();

        debug!("Read {} bytes from {} at offset {}", len, block, offset);
        Ok(data)
    }
}
