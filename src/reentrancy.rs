//! Iteration lock.
//!
//! Single-threaded reentrancy guard that keeps a table structurally stable
//! while a walk is handing entries to user code. While active, every
//! mutating entry point asks the lock first; the only structural change it
//! lets through is unlinking the entry the walk is currently visiting.
//!
//! Unlike a debug assertion, the lock is always on: a rejected call gets
//! `TableError::Locked` back in every build profile.

use crate::error::TableError;
use slotmap::DefaultKey;

/// Per-table walk state. Embed this in the table and consult it at the top
/// of every mutating method.
#[derive(Debug, Default)]
pub(crate) struct IterationLock {
    active: bool,
    current: Option<DefaultKey>,
}

impl IterationLock {
    pub(crate) const fn new() -> Self {
        Self {
            active: false,
            current: None,
        }
    }

    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    /// Start a walk. Fails if one is already running.
    pub(crate) fn begin(&mut self) -> Result<(), TableError> {
        if self.active {
            return Err(TableError::Locked);
        }
        self.active = true;
        self.current = None;
        Ok(())
    }

    /// Record the entry about to be handed to the visitor.
    #[inline]
    pub(crate) fn visit(&mut self, slot: DefaultKey) {
        debug_assert!(self.active);
        self.current = Some(slot);
    }

    pub(crate) fn end(&mut self) {
        self.active = false;
        self.current = None;
    }

    /// Insert, upsert and nested bulk operations: refused during a walk.
    #[inline]
    pub(crate) fn check_mutation(&self) -> Result<(), TableError> {
        if self.active {
            Err(TableError::Locked)
        } else {
            Ok(())
        }
    }

    /// Removal of `slot`: refused during a walk unless it is the visited entry.
    #[inline]
    pub(crate) fn check_removal(&self, slot: DefaultKey) -> Result<(), TableError> {
        if self.active && self.current != Some(slot) {
            Err(TableError::Locked)
        } else {
            Ok(())
        }
    }
}
