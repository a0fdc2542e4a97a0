use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// A single step of a window transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOp {
    /// Delete every element with `min <= score <= max`.
    RemoveRange { min: f64, max: f64 },
    /// Read every remaining element in ascending score order.
    ReadAll,
    /// Add `member` with `score`. An existing equal member is overwritten.
    Insert { score: f64, member: String },
    /// Expire the whole key after `ttl` without further writes.
    SetExpiry(Duration),
}

/// An ordered list of [`WindowOp`]s scoped to one key.
///
/// A store must apply all of them as one indivisible unit relative to any other
/// transaction against the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    key: String,
    ops: Vec<WindowOp>,
}

impl Transaction {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ops: Vec::with_capacity(4),
        }
    }

    pub fn remove_range(mut self, min: f64, max: f64) -> Self {
        self.ops.push(WindowOp::RemoveRange { min, max });
        self
    }

    pub fn read_all(mut self) -> Self {
        self.ops.push(WindowOp::ReadAll);
        self
    }

    /// Insert a timestamp whose member is the timestamp itself.
    ///
    /// Two inserts of the same value collapse into one element.
    pub fn insert(mut self, score: f64) -> Self {
        self.ops.push(WindowOp::Insert {
            score,
            member: member_for(score),
        });
        self
    }

    pub fn set_expiry(mut self, ttl: Duration) -> Self {
        self.ops.push(WindowOp::SetExpiry(ttl));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ops(&self) -> &[WindowOp] {
        &self.ops
    }
}

/// The member string stored for a timestamp.
pub fn member_for(score: f64) -> String {
    format!("{score}")
}

/// The outcome of a committed [`Transaction`].
///
/// Holds one entry per [`WindowOp::ReadAll`], in transaction order. Read
/// results are only reachable once the store reports the commit succeeded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Committed {
    reads: Vec<Vec<f64>>,
}

impl Committed {
    pub fn new(reads: Vec<Vec<f64>>) -> Self {
        Self { reads }
    }

    /// The elements returned by the `index`th read of the transaction.
    pub fn read(&self, index: usize) -> Option<&[f64]> {
        self.reads.get(index).map(Vec::as_slice)
    }
}

/// A key-addressed ordered set of timestamps shared between processes.
///
/// Implementations provide the isolation the limiter depends on: for a fixed
/// key, commits are totally ordered and no caller observes a partially applied
/// transaction.
#[async_trait]
pub trait TimestampStore: Debug + Send + Sync {
    /// Apply every operation of `tx` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached or rejects the
    /// transaction. Nothing is applied in that case.
    async fn commit(&self, tx: Transaction) -> Result<Committed, StoreError>;

    /// Drop the window for `key` out of band. Returns whether a live window
    /// existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}
