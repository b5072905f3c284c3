//! Per-tab cursor persistence (spec.md §3, §4.2): the page-bridge is the
//! single writer; the interaction engine reports positions, navigation
//! never wipes the store.

use std::collections::HashMap;

use engine::click::CursorState;

/// Maps tab id to its last-known cursor position, surviving the
/// content-script instance being replaced by navigation.
#[derive(Debug, Default)]
pub struct CursorStore {
    positions: HashMap<i64, CursorState>,
}

impl CursorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `cursor.reportPosition`.
    pub fn report(&mut self, tab_id: i64, position: CursorState) {
        self.positions.insert(tab_id, position);
    }

    /// `cursor.getPosition`. A tab with no prior report starts at the
    /// viewport origin, matching a freshly loaded page's natural "nothing
    /// has moved yet" state.
    #[must_use]
    pub fn get(&self, tab_id: i64) -> CursorState {
        self.positions
            .get(&tab_id)
            .copied()
            .unwrap_or(CursorState { x: 0.0, y: 0.0 })
    }

    /// Drop a tab's stored position entirely (tab closed).
    pub fn forget(&mut self, tab_id: i64) {
        self.positions.remove(&tab_id);
    }
}
