//! Shared test utilities.
//!
//! [`MockDriver`] is a scripted in-memory [`Driver`]: tests queue the results
//! its statements should produce, run code against it, and then inspect the
//! calls it received. Clones share one script and one call log, so a test can
//! hand a clone to a `Connection` and keep another for assertions.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::dialect::{Dialect, SqlDialect};
use crate::driver::{BufferedResult, Driver, DriverFailure, ResultSet};
use crate::retry::Sleeper;
use crate::value::{Row, Value};

/// A call received by [`MockDriver`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Execute { sql: String, params: Vec<Value> },
    Begin,
    Commit,
    Rollback,
    Reconnect,
    LastInsertId,
}

enum Response {
    Rows(Vec<Row>),
    /// Rows followed by a failure on the next fetch.
    Stream(Vec<Row>, DriverFailure),
    Affected(u64),
    Fail(DriverFailure),
}

#[derive(Default)]
struct Script {
    dialect: Option<Dialect>,
    version: Option<String>,
    responses: VecDeque<Response>,
    begin_failures: VecDeque<DriverFailure>,
    commit_failures: VecDeque<DriverFailure>,
    rollback_failures: VecDeque<DriverFailure>,
    reconnect_failures: VecDeque<DriverFailure>,
    last_insert_id: Option<String>,
    calls: Vec<Call>,
    frees: u32,
}

#[derive(Clone)]
pub struct MockDriver {
    script: Rc<RefCell<Script>>,
}

impl MockDriver {
    pub fn new(dialect: Dialect) -> Self {
        let script = Script {
            dialect: Some(dialect),
            ..Script::default()
        };
        Self {
            script: Rc::new(RefCell::new(script)),
        }
    }

    /// Answer the dialect's version probe with `version`.
    pub fn with_version(self, version: &str) -> Self {
        self.script.borrow_mut().version = Some(version.to_string());
        self
    }

    /// Next statement returns these rows.
    pub fn push_rows(&self, rows: Vec<Row>) -> &Self {
        self.script.borrow_mut().responses.push_back(Response::Rows(rows));
        self
    }

    /// Next statement streams `rows`, then fails while fetching.
    pub fn push_rows_then_failure(&self, rows: Vec<Row>, failure: DriverFailure) -> &Self {
        self.script
            .borrow_mut()
            .responses
            .push_back(Response::Stream(rows, failure));
        self
    }

    /// Next statement reports `affected` changed rows.
    pub fn push_affected(&self, affected: u64) -> &Self {
        self.script
            .borrow_mut()
            .responses
            .push_back(Response::Affected(affected));
        self
    }

    /// Next statement fails.
    pub fn push_failure(&self, failure: DriverFailure) -> &Self {
        self.script.borrow_mut().responses.push_back(Response::Fail(failure));
        self
    }

    pub fn fail_begin(&self, failure: DriverFailure) -> &Self {
        self.script.borrow_mut().begin_failures.push_back(failure);
        self
    }

    pub fn fail_commit(&self, failure: DriverFailure) -> &Self {
        self.script.borrow_mut().commit_failures.push_back(failure);
        self
    }

    pub fn fail_rollback(&self, failure: DriverFailure) -> &Self {
        self.script.borrow_mut().rollback_failures.push_back(failure);
        self
    }

    pub fn fail_reconnect(&self, failure: DriverFailure) -> &Self {
        self.script.borrow_mut().reconnect_failures.push_back(failure);
        self
    }

    pub fn set_last_insert_id(&self, id: &str) -> &Self {
        self.script.borrow_mut().last_insert_id = Some(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.borrow().calls.clone()
    }

    /// SQL of every executed statement, in order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.script
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Execute { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.script.borrow().calls.iter().filter(|c| *c == call).count()
    }

    /// Number of result sets released so far.
    pub fn frees(&self) -> u32 {
        self.script.borrow().frees
    }

    pub fn clear_calls(&self) {
        self.script.borrow_mut().calls.clear();
    }

    fn record(&self, call: Call) {
        self.script.borrow_mut().calls.push(call);
    }

    fn pop_failure(&self, pick: impl FnOnce(&mut Script) -> &mut VecDeque<DriverFailure>) -> Result<(), DriverFailure> {
        match pick(&mut self.script.borrow_mut()).pop_front() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

struct MockResult {
    inner: BufferedResult,
    trailing_failure: Option<DriverFailure>,
    script: Rc<RefCell<Script>>,
}

impl ResultSet for MockResult {
    fn fetch_one(&mut self) -> Result<Option<Row>, DriverFailure> {
        match self.inner.fetch_one()? {
            Some(row) => Ok(Some(row)),
            None => match self.trailing_failure.take() {
                Some(failure) => Err(failure),
                None => Ok(None),
            },
        }
    }

    fn row_count(&self) -> u64 {
        self.inner.row_count()
    }

    fn free(&mut self) {
        self.inner.free();
        self.script.borrow_mut().frees += 1;
    }
}

impl Driver for MockDriver {
    fn dialect(&self) -> Dialect {
        self.script.borrow().dialect.unwrap_or_else(Dialect::sqlite)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Box<dyn ResultSet>, DriverFailure> {
        self.record(Call::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        let probe = self.dialect().version_probe();
        let version = self.script.borrow().version.clone();
        let (inner, trailing_failure) = match (probe, version) {
            (Some(probe), Some(version)) if probe == sql => {
                (BufferedResult::rows(vec![Row::new().with(probe, version)]), None)
            }
            _ => match self.script.borrow_mut().responses.pop_front() {
                Some(Response::Rows(rows)) => (BufferedResult::rows(rows), None),
                Some(Response::Stream(rows, failure)) => (BufferedResult::rows(rows), Some(failure)),
                Some(Response::Affected(n)) => (BufferedResult::affected(n), None),
                Some(Response::Fail(failure)) => return Err(failure),
                None => (BufferedResult::affected(0), None),
            },
        };

        Ok(Box::new(MockResult {
            inner,
            trailing_failure,
            script: Rc::clone(&self.script),
        }))
    }

    fn last_insert_id(&mut self) -> Result<Option<String>, DriverFailure> {
        self.record(Call::LastInsertId);
        Ok(self.script.borrow().last_insert_id.clone())
    }

    fn begin_transaction(&mut self) -> Result<(), DriverFailure> {
        self.record(Call::Begin);
        self.pop_failure(|s| &mut s.begin_failures)
    }

    fn commit(&mut self) -> Result<(), DriverFailure> {
        self.record(Call::Commit);
        self.pop_failure(|s| &mut s.commit_failures)
    }

    fn rollback(&mut self) -> Result<(), DriverFailure> {
        self.record(Call::Rollback);
        self.pop_failure(|s| &mut s.rollback_failures)
    }

    fn reconnect(&mut self) -> Result<(), DriverFailure> {
        self.record(Call::Reconnect);
        self.pop_failure(|s| &mut s.reconnect_failures)
    }
}

/// [`Sleeper`] that records requested waits instead of blocking.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    slept: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}
