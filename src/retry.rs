//! Error classification and retry around any [`Database`].
//!
//! [`Resilient`] forwards every operation to the wrapped database and turns
//! raw driver failures into the public error taxonomy:
//!
//! - deadlocks and lock-wait timeouts are retried on the lock schedule, then
//!   surface as [`QueryError::Lock`]
//! - lost connections are reconnected on the connection schedule and the
//!   operation is run again; exhaustion surfaces as [`QueryError::Connection`]
//! - any other driver failure surfaces as [`QueryError::Driver`] immediately
//!
//! Errors that are not driver failures pass through untouched.
//!
//! Inside an open transaction, single statements are never retried: their
//! deadlock and connection failures propagate raw so that the enclosing
//! [`Database::transaction`] call reruns the whole body.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::Database;
use crate::cursor::SelectCursor;
use crate::dialect::Dialect;
use crate::driver::{DriverFailure, FailureKind};
use crate::error::{Origin, QueryError};
use crate::query::{Assignment, Condition, Query};
use crate::transaction::{self, TransactionState};
use crate::value::{Row, Value};

/// Waits before successive retries. Its length is the retry limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule(Vec<Duration>);

impl RetrySchedule {
    pub fn new(waits: Vec<Duration>) -> Self {
        Self(waits)
    }

    /// Schedule from microsecond waits, the unit used in configuration.
    pub fn from_micros(waits: &[u64]) -> Self {
        Self(waits.iter().copied().map(Duration::from_micros).collect())
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, attempt: usize) -> Option<Duration> {
        self.0.get(attempt).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Longest time the schedule can spend sleeping.
    pub fn total(&self) -> Duration {
        self.0.iter().sum()
    }
}

impl Default for RetrySchedule {
    /// 1ms growing to 7s, about 28s in total.
    fn default() -> Self {
        Self::from_micros(&[
            1_000, 10_000, 100_000, 1_000_000, 2_000_000, 3_000_000, 4_000_000, 5_000_000, 6_000_000,
            7_000_000,
        ])
    }
}

/// Blocks between retries.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retrying, error-classifying wrapper around a [`Database`].
pub struct Resilient<DB: Database> {
    inner: DB,
    connection_retries: RetrySchedule,
    lock_retries: RetrySchedule,
    sleeper: Box<dyn Sleeper>,
}

impl<DB: Database> Resilient<DB> {
    pub fn new(inner: DB) -> Self {
        Self {
            inner,
            connection_retries: RetrySchedule::default(),
            lock_retries: RetrySchedule::default(),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn set_connection_retries(&mut self, schedule: RetrySchedule) {
        self.connection_retries = schedule;
    }

    pub fn set_lock_retries(&mut self, schedule: RetrySchedule) {
        self.lock_retries = schedule;
    }

    pub fn connection_retries(&self) -> &RetrySchedule {
        &self.connection_retries
    }

    pub fn lock_retries(&self) -> &RetrySchedule {
        &self.lock_retries
    }

    pub fn inner(&self) -> &DB {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut DB {
        &mut self.inner
    }

    pub fn into_inner(self) -> DB {
        self.inner
    }

    /// Run `op`, retrying transient failures until a schedule runs out.
    fn with_retries<T>(
        &mut self,
        origin: Origin,
        mut op: impl FnMut(&mut Self) -> Result<T, QueryError>,
    ) -> Result<T, QueryError> {
        let mut lock_attempt = 0;
        let mut connection_attempt = 0;

        loop {
            let failure = match op(self) {
                Err(QueryError::Raw(failure)) => failure,
                other => return other,
            };

            match failure.kind {
                FailureKind::Statement => {
                    return Err(QueryError::Driver {
                        origin,
                        source: failure,
                    });
                }
                FailureKind::Deadlock => {
                    let Some(wait) = self.lock_retries.get(lock_attempt) else {
                        return Err(QueryError::Lock {
                            origin,
                            source: failure,
                        });
                    };
                    lock_attempt += 1;
                    warn!(
                        %origin,
                        attempt = lock_attempt,
                        wait_us = wait.as_micros() as u64,
                        error = %failure,
                        "lock conflict, retrying"
                    );
                    self.sleeper.sleep(wait);
                }
                FailureKind::ConnectionLost => {
                    self.reconnect_after(origin, failure, &mut connection_attempt)?;
                }
            }
        }
    }

    /// Sleep and reconnect until the session is back or the connection
    /// schedule is exhausted. `attempt` carries over between calls so that
    /// one operation never uses more than the whole schedule.
    fn reconnect_after(
        &mut self,
        origin: Origin,
        mut failure: DriverFailure,
        attempt: &mut usize,
    ) -> Result<(), QueryError> {
        loop {
            let Some(wait) = self.connection_retries.get(*attempt) else {
                return Err(QueryError::Connection {
                    origin,
                    source: failure,
                });
            };
            *attempt += 1;
            warn!(
                %origin,
                attempt = *attempt,
                wait_us = wait.as_micros() as u64,
                error = %failure,
                "connection lost, reconnecting"
            );
            self.sleeper.sleep(wait);

            match self.inner.reconnect() {
                Ok(()) => {
                    info!(%origin, attempt = *attempt, "reconnected");
                    return Ok(());
                }
                Err(QueryError::Raw(next)) if next.kind == FailureKind::ConnectionLost => failure = next,
                Err(QueryError::Raw(next)) => {
                    return Err(QueryError::Connection {
                        origin,
                        source: next,
                    });
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Best-effort rollback after a failed operation; leaves the flag idle.
    fn abandon_transaction(&mut self) {
        if let Err(err) = self.inner.rollback() {
            debug!(error = %err, "rollback after failure failed");
        }
        self.inner.transaction_state().leave();
    }

    /// Forward a single statement.
    fn statement<T>(
        &mut self,
        origin: Origin,
        mut op: impl FnMut(&mut DB) -> Result<T, QueryError>,
    ) -> Result<T, QueryError> {
        if self.inner.transaction_state().is_active() {
            return op(&mut self.inner).map_err(|err| match err {
                QueryError::Raw(failure) if failure.kind == FailureKind::Statement => QueryError::Driver {
                    origin,
                    source: failure,
                },
                other => other,
            });
        }

        self.with_retries(origin, |db| {
            let outcome = op(&mut db.inner);
            if outcome.is_err() && db.inner.transaction_state().is_active() {
                db.abandon_transaction();
            }
            outcome
        })
    }
}

const fn origin(operation: &'static str) -> Origin {
    Origin::new("Resilient", operation)
}

impl<DB: Database> Database for Resilient<DB> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    fn transaction_state(&self) -> TransactionState {
        self.inner.transaction_state()
    }

    fn select(&mut self, query: &Query) -> Result<SelectCursor, QueryError> {
        let cursor = self.statement(origin("select"), |db| db.select(query))?;
        Ok(cursor.classified(origin("fetch"), self.inner.transaction_state()))
    }

    fn fetch_one(&mut self, query: &Query) -> Result<Option<Row>, QueryError> {
        self.statement(origin("fetch_one"), |db| db.fetch_one(query))
    }

    fn fetch_all(&mut self, query: &Query) -> Result<Vec<Row>, QueryError> {
        self.statement(origin("fetch_all"), |db| db.fetch_all(query))
    }

    fn fetch_all_and_flatten(&mut self, query: &Query) -> Result<Vec<Value>, QueryError> {
        self.statement(origin("fetch_all_and_flatten"), |db| db.fetch_all_and_flatten(query))
    }

    fn insert(&mut self, table: &str, row: &Row, autoincrement: Option<&str>) -> Result<Option<String>, QueryError> {
        self.statement(origin("insert"), |db| db.insert(table, row, autoincrement))
    }

    fn update(&mut self, table: &str, changes: &[Assignment], conditions: &[Condition]) -> Result<u64, QueryError> {
        self.statement(origin("update"), |db| db.update(table, changes, conditions))
    }

    fn delete(&mut self, table: &str, conditions: &[Condition]) -> Result<u64, QueryError> {
        self.statement(origin("delete"), |db| db.delete(table, conditions))
    }

    fn insert_or_update(
        &mut self,
        table: &str,
        row: &Row,
        index: &[&str],
        updates: Option<&[Assignment]>,
    ) -> Result<u64, QueryError> {
        self.statement(origin("insert_or_update"), |db| {
            db.insert_or_update(table, row, index, updates)
        })
    }

    fn change(&mut self, sql: &str, params: &[Value]) -> Result<u64, QueryError> {
        self.statement(origin("change"), |db| db.change(sql, params))
    }

    fn begin_transaction(&mut self) -> Result<(), QueryError> {
        self.statement(origin("begin_transaction"), |db| db.begin_transaction())
    }

    fn commit(&mut self) -> Result<(), QueryError> {
        self.statement(origin("commit"), |db| db.commit())
    }

    fn rollback(&mut self) -> Result<(), QueryError> {
        self.statement(origin("rollback"), |db| db.rollback())
    }

    fn reconnect(&mut self) -> Result<(), QueryError> {
        self.statement(origin("reconnect"), |db| db.reconnect())
    }

    /// Run `body` in a transaction, rerunning it from the start after a
    /// deadlock or a lost connection.
    ///
    /// The body may run several times and must not leave side effects
    /// outside the database behind on failure. Nested calls run inline.
    fn transaction<T, F>(&mut self, mut body: F) -> Result<T, QueryError>
    where
        Self: Sized,
        F: FnMut(&mut Self) -> Result<T, QueryError>,
    {
        if self.transaction_state().is_active() {
            return body(self);
        }

        self.with_retries(origin("transaction"), |db| {
            let outcome = transaction::run(db, &mut body);
            if outcome.is_err() {
                db.abandon_transaction();
            }
            outcome
        })
    }
}
