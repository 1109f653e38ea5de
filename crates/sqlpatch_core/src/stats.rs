//! Apply statistics.

use sqlpatch_codec::InstructionKind;

/// Counters produced by one apply run.
///
/// Returned by every successful apply, including dry runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Table blocks that carried at least one instruction.
    pub tables: u64,
    /// Insert instructions executed.
    pub inserts: u64,
    /// Update instructions executed.
    pub updates: u64,
    /// Delete instructions executed.
    pub deletes: u64,
    /// Rows changed, as reported by the store.
    pub rows_affected: u64,
}

impl ApplyStats {
    /// Total number of instructions executed.
    #[must_use]
    pub const fn instructions(&self) -> u64 {
        self.inserts + self.updates + self.deletes
    }

    pub(crate) fn record(&mut self, kind: InstructionKind, rows: usize) {
        match kind {
            InstructionKind::Insert => self.inserts += 1,
            InstructionKind::Update => self.updates += 1,
            InstructionKind::Delete => self.deletes += 1,
        }
        self.rows_affected += rows as u64;
    }
}
