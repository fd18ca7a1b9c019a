//! Row-by-row access to an executed SELECT.

use crate::driver::{DriverFailure, FailureKind, ResultSet};
use crate::error::{Origin, QueryError};
use crate::transaction::TransactionState;
use crate::value::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Unopened,
    Open,
    /// `fetch` returned `None`; the handle is still held until cleared.
    Exhausted,
    Closed,
}

/// Stateful handle over an open result set.
///
/// The driver handle is freed exactly once: by [`SelectCursor::clear`], by
/// re-opening, or when the cursor is dropped.
pub struct SelectCursor {
    state: CursorState,
    handle: Option<Box<dyn ResultSet>>,
    classifier: Option<Classifier>,
}

/// Where fetch failures are reported, and whether they happen inside a
/// transaction that will rerun.
struct Classifier {
    origin: Origin,
    transaction: TransactionState,
}

impl Classifier {
    fn classify(&self, failure: DriverFailure) -> QueryError {
        let origin = self.origin;
        match failure.kind {
            FailureKind::Statement => QueryError::Driver { origin, source: failure },
            _ if self.transaction.is_active() => QueryError::Raw(failure),
            FailureKind::Deadlock => QueryError::Lock { origin, source: failure },
            FailureKind::ConnectionLost => QueryError::Connection { origin, source: failure },
        }
    }
}

impl SelectCursor {
    pub fn new() -> Self {
        Self {
            state: CursorState::Unopened,
            handle: None,
            classifier: None,
        }
    }

    pub fn opened(handle: Box<dyn ResultSet>) -> Self {
        let mut cursor = Self::new();
        cursor.open(handle);
        cursor
    }

    /// Attach a fresh result set, releasing any previous one first.
    pub fn open(&mut self, handle: Box<dyn ResultSet>) {
        self.clear();
        self.handle = Some(handle);
        self.state = CursorState::Open;
    }

    /// Report fetch failures as classified errors at `origin`.
    ///
    /// A deadlock or lost connection while `transaction` is active stays raw,
    /// so the enclosing transaction reruns its body.
    pub(crate) fn classified(mut self, origin: Origin, transaction: TransactionState) -> Self {
        self.classifier = Some(Classifier { origin, transaction });
        self
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Next row, or `None` once the result set is exhausted or the cursor closed.
    pub fn fetch(&mut self) -> Result<Option<Row>, QueryError> {
        if self.state != CursorState::Open {
            return Ok(None);
        }
        let Some(handle) = self.handle.as_mut() else {
            return Ok(None);
        };
        let next = handle.fetch_one().map_err(|failure| match &self.classifier {
            Some(classifier) => classifier.classify(failure),
            None => QueryError::Raw(failure),
        })?;
        match next {
            Some(row) => Ok(Some(row)),
            None => {
                self.state = CursorState::Exhausted;
                Ok(None)
            }
        }
    }

    /// All remaining rows.
    pub fn fetch_all(&mut self) -> Result<Vec<Row>, QueryError> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Rows reported by the driver for this statement.
    pub fn row_count(&self) -> u64 {
        self.handle.as_ref().map_or(0, |h| h.row_count())
    }

    /// Release the driver handle. Safe to call any number of times.
    pub fn clear(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.free();
        }
        if self.state != CursorState::Unopened {
            self.state = CursorState::Closed;
        }
    }
}

impl Default for SelectCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SelectCursor {
    fn drop(&mut self) {
        self.clear();
    }
}

impl Iterator for SelectCursor {
    type Item = Result<Row, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch().transpose()
    }
}

impl std::fmt::Debug for SelectCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectCursor")
            .field("state", &self.state)
            .field("open_handle", &self.handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{BufferedResult, DriverFailure};
    use crate::value::Value;
    use rstest::rstest;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Result set that counts how often it is freed.
    struct Counted {
        inner: BufferedResult,
        frees: Rc<Cell<u32>>,
    }

    impl ResultSet for Counted {
        fn fetch_one(&mut self) -> Result<Option<Row>, DriverFailure> {
            self.inner.fetch_one()
        }

        fn row_count(&self) -> u64 {
            self.inner.row_count()
        }

        fn free(&mut self) {
            self.frees.set(self.frees.get() + 1);
        }
    }

    fn counted(ids: &[i64]) -> (Box<dyn ResultSet>, Rc<Cell<u32>>) {
        let frees = Rc::new(Cell::new(0));
        let rows = ids.iter().map(|id| Row::new().with("id", *id)).collect();
        let handle = Counted {
            inner: BufferedResult::rows(rows),
            frees: Rc::clone(&frees),
        };
        (Box::new(handle), frees)
    }

    #[rstest]
    fn test_fetch_until_exhausted() {
        let (handle, _) = counted(&[1, 2]);
        let mut cursor = SelectCursor::opened(handle);
        assert_eq!(cursor.state(), CursorState::Open);
        assert_eq!(cursor.fetch().unwrap().unwrap().get("id"), Some(&Value::Int(1)));
        assert_eq!(cursor.fetch().unwrap().unwrap().get("id"), Some(&Value::Int(2)));
        assert!(cursor.fetch().unwrap().is_none());
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert!(cursor.fetch().unwrap().is_none());
    }

    #[rstest]
    fn test_clear_twice_frees_once() {
        let (handle, frees) = counted(&[1]);
        let mut cursor = SelectCursor::opened(handle);
        cursor.clear();
        cursor.clear();
        assert_eq!(frees.get(), 1);
        assert_eq!(cursor.state(), CursorState::Closed);
        drop(cursor);
        assert_eq!(frees.get(), 1);
    }

    #[rstest]
    fn test_clear_after_exhaustion() {
        let (handle, frees) = counted(&[]);
        let mut cursor = SelectCursor::opened(handle);
        assert!(cursor.fetch().unwrap().is_none());
        cursor.clear();
        cursor.clear();
        assert_eq!(frees.get(), 1);
    }

    #[rstest]
    fn test_drop_frees_open_handle() {
        let (handle, frees) = counted(&[1, 2]);
        {
            let mut cursor = SelectCursor::opened(handle);
            cursor.fetch().unwrap();
        }
        assert_eq!(frees.get(), 1);
    }

    #[rstest]
    fn test_reopen_clears_previous_handle() {
        let (first, first_frees) = counted(&[1]);
        let (second, second_frees) = counted(&[7]);
        let mut cursor = SelectCursor::opened(first);
        cursor.open(second);
        assert_eq!(first_frees.get(), 1);
        assert_eq!(second_frees.get(), 0);
        assert_eq!(cursor.fetch().unwrap().unwrap().get("id"), Some(&Value::Int(7)));
    }

    #[rstest]
    fn test_unopened_cursor() {
        let mut cursor = SelectCursor::new();
        assert!(cursor.fetch().unwrap().is_none());
        cursor.clear();
        assert_eq!(cursor.state(), CursorState::Unopened);
    }

    #[rstest]
    fn test_iterator() {
        let (handle, _) = counted(&[1, 2, 3]);
        let ids: Vec<i64> = SelectCursor::opened(handle)
            .map(|row| row.unwrap().get("id").and_then(Value::as_i64).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
