use std::time::Duration;

use async_trait::async_trait;
use redis::Client;
use redis::RedisError;
use redis::aio::ConnectionManager;

use crate::error::StoreError;
use crate::store::Committed;
use crate::store::TimestampStore;
use crate::store::Transaction;
use crate::store::WindowOp;

/// A [`TimestampStore`] backed by Redis sorted sets.
///
/// A transaction becomes a single `MULTI`/`EXEC` pipeline:
///
/// | operation      | command                              |
/// |----------------|--------------------------------------|
/// | `RemoveRange`  | `ZREMRANGEBYSCORE key min max`       |
/// | `ReadAll`      | `ZRANGE key 0 -1`                    |
/// | `Insert`       | `ZADD key score member`              |
/// | `SetExpiry`    | `PEXPIRE key ttl_ms`                 |
///
/// Read replies are only decoded once `EXEC` returns, so no result is ever
/// taken from a queued command.
///
/// Use a [`ConnectionManager`] so dropped connections are re-established.
#[derive(Clone, Debug)]
pub struct RedisStore {
    connection_manager: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection_manager: ConnectionManager) -> Self {
        Self { connection_manager }
    }

    /// Connect to the Redis server at `url`.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        Ok(Self::new(client.get_connection_manager().await?))
    }
}

#[async_trait]
impl TimestampStore for RedisStore {
    async fn commit(&self, tx: Transaction) -> Result<Committed, StoreError> {
        let key = tx.key();
        let mut pipe = redis::pipe();
        pipe.atomic();

        for op in tx.ops() {
            match op {
                WindowOp::RemoveRange { min, max } => {
                    pipe.zrembyscore(key, *min, *max).ignore();
                }
                WindowOp::ReadAll => {
                    pipe.zrange(key, 0, -1);
                }
                WindowOp::Insert { score, member } => {
                    pipe.zadd(key, member, *score).ignore();
                }
                WindowOp::SetExpiry(ttl) => {
                    pipe.pexpire(key, ttl_millis(*ttl)).ignore();
                }
            }
        }

        let mut connection_manager = self.connection_manager.clone();
        let replies: Vec<Vec<String>> = pipe.query_async(&mut connection_manager).await?;

        let reads: Vec<Vec<f64>> = replies
            .into_iter()
            .map(|members| {
                members
                    .iter()
                    .map(|member| parse_member(member))
                    .collect::<Result<Vec<f64>, StoreError>>()
            })
            .collect::<Result<_, _>>()?;

        Ok(Committed::new(reads))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut connection_manager = self.connection_manager.clone();
        let removed: usize = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut connection_manager)
            .await?;
        Ok(removed > 0)
    }
}

fn parse_member(member: &str) -> Result<f64, StoreError> {
    member
        .parse()
        .map_err(|err| StoreError::Protocol(format!("non-numeric member `{member}`: {err}")))
}

/// Redis rejects a zero TTL, so anything below a millisecond is rounded up.
fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal()
        {
            StoreError::Transport(err.to_string())
        } else {
            StoreError::Protocol(err.to_string())
        }
    }
}
