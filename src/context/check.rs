/*!
 * Block Validation
 * Canary and size-agreement checks over tracked blocks
 */

use super::{MemContext, TrackedBlock, FOOTER_CANARY, GUARD_SIZE, HEADER_CANARY};
use crate::types::*;

impl TrackedBlock {
    /// Validate the guard canaries and the stored-size/layout agreement
    pub(crate) fn check(&self) -> Result<(), BlockFault> {
        if self.data[..GUARD_SIZE] != HEADER_CANARY[..] {
            return Err(BlockFault::HeaderCanary);
        }

        // Header intact, so the stored size is trustworthy for locating the
        // footer region
        if self.data[self.data.len() - GUARD_SIZE..] != FOOTER_CANARY[..] {
            return Err(BlockFault::FooterCanary);
        }

        let actual = self.data.len() - 2 * GUARD_SIZE;
        if actual != self.size {
            return Err(BlockFault::SizeMismatch {
                stored: self.size,
                actual,
            });
        }

        Ok(())
    }
}

impl MemContext {
    /// Validate one block. Corruption is a contract violation and escalates
    /// in strict mode.
    pub fn check(&self, block: BlockId) -> TrackResult<()> {
        let Some(entry) = self.core.blocks.get(&block) else {
            let err = self.classify_missing(block);
            return Err(self.reject(err));
        };

        if let Err(fault) = entry.check() {
            drop(entry);
            return Err(self.reject(TrackError::Corruption { block, fault }));
        }
        Ok(())
    }

    /// Validate every live block; bails on the first fault
    pub fn check_all(&self) -> TrackResult<()> {
        let mut faulted = None;
        for entry in self.core.blocks.iter() {
            if let Err(fault) = entry.check() {
                faulted = Some((*entry.key(), fault));
                break;
            }
        }

        match faulted {
            Some((block, fault)) => Err(self.reject(TrackError::Corruption { block, fault })),
            None => Ok(()),
        }
    }
}
