//! Transaction wrapping with nested-call flattening.

use std::cell::Cell;
use std::rc::Rc;

use crate::backend::Database;
use crate::error::QueryError;

/// "Is a transaction open" flag for one physical connection.
///
/// Clones share the flag, so the connection and every wrapper around it
/// observe the same state.
#[derive(Debug, Clone, Default)]
pub struct TransactionState(Rc<Cell<bool>>);

impl TransactionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.0.get()
    }

    pub fn enter(&self) {
        self.0.set(true);
    }

    pub fn leave(&self) {
        self.0.set(false);
    }
}

/// Run `body` inside a transaction on `db`.
///
/// When a transaction is already open the body runs inline, with no nested
/// BEGIN/COMMIT. Errors are returned as-is and leave the state active;
/// rolling back and resetting is the caller's job (see `Resilient`).
pub fn run<DB, T, F>(db: &mut DB, body: &mut F) -> Result<T, QueryError>
where
    DB: Database + ?Sized,
    F: FnMut(&mut DB) -> Result<T, QueryError>,
{
    let state = db.transaction_state();
    if state.is_active() {
        return body(db);
    }

    state.enter();
    db.begin_transaction()?;
    let value = body(db)?;
    db.commit()?;
    state.leave();
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let state = TransactionState::new();
        let shared = state.clone();
        state.enter();
        assert!(shared.is_active());
        shared.leave();
        assert!(!state.is_active());
    }
}
