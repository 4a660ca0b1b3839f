// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transaction mode selection.
//!
//! Reads and short writes start deferred so the write lock is only taken if
//! a write actually happens. Bulk writes start immediate: two deferred
//! transactions that both read and then try to upgrade to a writer deadlock,
//! and the engine resolves that by failing one of them with `SQLITE_BUSY`.

use litesafe_core::{OperationKind, TransactionMode};
use rusqlite::TransactionBehavior;

/// Maps an [`OperationKind`] to a [`TransactionMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteModeSelector {
    prefer_deferred: bool,
}

impl Default for WriteModeSelector {
    fn default() -> Self {
        Self {
            prefer_deferred: true,
        }
    }
}

impl WriteModeSelector {
    pub fn new(prefer_deferred: bool) -> Self {
        Self { prefer_deferred }
    }

    pub fn prefers_deferred(&self) -> bool {
        self.prefer_deferred
    }

    pub fn select_mode(&self, kind: OperationKind) -> TransactionMode {
        match kind {
            OperationKind::Read => TransactionMode::Deferred,
            OperationKind::ShortWrite if self.prefer_deferred => TransactionMode::Deferred,
            OperationKind::ShortWrite | OperationKind::BulkWrite => TransactionMode::Immediate,
            OperationKind::Schema => TransactionMode::Exclusive,
        }
    }

    /// Mode used by transactions that do not name an operation kind.
    pub fn connection_default(&self) -> TransactionMode {
        if self.prefer_deferred {
            TransactionMode::Deferred
        } else {
            TransactionMode::Immediate
        }
    }
}

pub fn to_behavior(mode: TransactionMode) -> TransactionBehavior {
    match mode {
        TransactionMode::Deferred => TransactionBehavior::Deferred,
        TransactionMode::Immediate => TransactionBehavior::Immediate,
        TransactionMode::Exclusive => TransactionBehavior::Exclusive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selector_defers_short_work() {
        let selector = WriteModeSelector::default();
        assert_eq!(selector.select_mode(OperationKind::Read), TransactionMode::Deferred);
        assert_eq!(selector.select_mode(OperationKind::ShortWrite), TransactionMode::Deferred);
        assert_eq!(selector.select_mode(OperationKind::BulkWrite), TransactionMode::Immediate);
        assert_eq!(selector.select_mode(OperationKind::Schema), TransactionMode::Exclusive);
        assert_eq!(selector.connection_default(), TransactionMode::Deferred);
    }

    #[test]
    fn without_preference_short_writes_are_immediate() {
        let selector = WriteModeSelector::new(false);
        assert_eq!(selector.select_mode(OperationKind::Read), TransactionMode::Deferred);
        assert_eq!(selector.select_mode(OperationKind::ShortWrite), TransactionMode::Immediate);
        assert_eq!(selector.connection_default(), TransactionMode::Immediate);
    }

    #[test]
    fn behaviors_match_modes() {
        assert!(matches!(to_behavior(TransactionMode::Deferred), TransactionBehavior::Deferred));
        assert!(matches!(to_behavior(TransactionMode::Immediate), TransactionBehavior::Immediate));
        assert!(matches!(to_behavior(TransactionMode::Exclusive), TransactionBehavior::Exclusive));
    }
}
