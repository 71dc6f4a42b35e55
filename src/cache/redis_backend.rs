//! Redis-backed cache backend.
//!
//! The multiplexed connection is opened on first use and shared by every
//! caller. A connection-level failure drops it so the next call reconnects.
//!
//! Each call gets one deadline covering the wait for the connection slot,
//! the connect itself and the command. After a failed or abandoned connect,
//! calls fail fast until the reconnect backoff has passed.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::backend::{CacheBackend, ScanPage};
use super::config::Ttl;
use super::error::{BackendError, BackendOp};

/// Minimum pause between connect attempts.
const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Slot {
    conn: Option<MultiplexedConnection>,
    /// Start of the last connect that did not produce a connection.
    last_attempt: Option<Instant>,
}

/// Redis [`CacheBackend`].
pub struct RedisBackend {
    client: Client,
    /// `host:port/db`, without credentials.
    address: String,
    slot: Mutex<Slot>,
    op_timeout: Duration,
    reconnect_backoff: Duration,
}

impl RedisBackend {
    /// Parse the connection string. Does not connect.
    pub fn new(
        url: &str,
        address: impl Into<String>,
        op_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            address: address.into(),
            slot: Mutex::new(Slot::default()),
            op_timeout,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn connection(&self) -> Result<MultiplexedConnection, BackendError> {
        let mut slot = self.slot.lock().await;
        if let Some(conn) = slot.conn.as_ref() {
            return Ok(conn.clone());
        }
        if let Some(at) = slot.last_attempt {
            if at.elapsed() < self.reconnect_backoff {
                return Err(BackendError::Unavailable(format!(
                    "{} unreachable, retrying in {:?}",
                    self.address,
                    self.reconnect_backoff.saturating_sub(at.elapsed())
                )));
            }
        }

        // Set before connecting: a connect dropped at the caller's deadline
        // must still arm the backoff.
        slot.last_attempt = Some(Instant::now());
        let conn = self.client.get_multiplexed_async_connection().await?;

        info!(address = %self.address, "Redis connected");
        slot.last_attempt = None;
        slot.conn = Some(conn.clone());
        Ok(conn)
    }

    /// Run one command. The whole call, connection included, shares a
    /// single `op_timeout` deadline.
    async fn run<T, F, Fut>(&self, op: BackendOp, command: F) -> Result<T, BackendError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = Result<T, RedisError>>,
    {
        let call = async {
            let conn = self.connection().await?;
            command(conn).await.map_err(BackendError::from)
        };
        match timeout(self.op_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(BackendError::Redis(err))) => {
                if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
                    self.drop_connection(op).await;
                }
                Err(BackendError::Redis(err))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(BackendError::Timeout {
                op,
                after: self.op_timeout,
            }),
        }
    }

    async fn drop_connection(&self, op: BackendOp) {
        if self.slot.lock().await.conn.take().is_some() {
            warn!(address = %self.address, %op, "Dropping Redis connection after I/O failure");
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.run(BackendOp::Get, |mut conn| async move {
            let value: Option<Vec<u8>> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Ttl) -> Result<(), BackendError> {
        self.run(BackendOp::Set, |mut conn| async move {
            let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, BackendError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run(BackendOp::Delete, |mut conn| async move {
            let removed: u64 = conn.del(keys).await?;
            Ok(removed)
        })
        .await
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, BackendError> {
        self.run(BackendOp::Scan, |mut conn| async move {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count)
                .query_async(&mut conn)
                .await?;
            Ok(ScanPage { cursor: next, keys })
        })
        .await
    }

    async fn close(&self) {
        if self.slot.lock().await.conn.take().is_some() {
            debug!(address = %self.address, "Redis connection released");
        }
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("address", &self.address)
            .field("op_timeout", &self.op_timeout)
            .field("reconnect_backoff", &self.reconnect_backoff)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn construction_does_not_connect() {
        // Port 1 is never a Redis server; building the backend must still succeed.
        let backend = RedisBackend::new(
            "redis://127.0.0.1:1/0",
            "127.0.0.1:1/0",
            Duration::from_millis(50),
        )
        .unwrap();
        assert_eq!(backend.address(), "127.0.0.1:1/0");
        assert!(backend.slot.lock().await.conn.is_none());
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error_not_a_panic() {
        let backend = RedisBackend::new(
            "redis://127.0.0.1:1/0",
            "127.0.0.1:1/0",
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(backend.get("song:1").await.is_err());
        assert!(backend.slot.lock().await.conn.is_none());
    }

    /// Accepts connections and never writes a byte back.
    async fn silent_server() -> (u16, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        (port, handle)
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_deadline_when_the_server_hangs() {
        let (port, server) = silent_server().await;
        let op_timeout = Duration::from_millis(200);
        let backend = RedisBackend::new(
            &format!("redis://127.0.0.1:{port}/3"),
            format!("127.0.0.1:{port}/3"),
            op_timeout,
        )
        .unwrap();

        let started = Instant::now();
        let results = join_all((0..5).map(|_| backend.get("song:1"))).await;
        let waited = started.elapsed();

        assert!(results.iter().all(Result::is_err));
        assert!(waited < op_timeout * 2, "slowest caller waited {waited:?}");
        server.abort();
    }

    #[tokio::test]
    async fn failed_connect_backs_off_before_retrying() {
        let (port, server) = silent_server().await;
        let mut backend = RedisBackend::new(
            &format!("redis://127.0.0.1:{port}/3"),
            format!("127.0.0.1:{port}/3"),
            Duration::from_millis(100),
        )
        .unwrap();
        backend.reconnect_backoff = Duration::from_secs(30);

        assert!(matches!(
            backend.get("song:1").await,
            Err(BackendError::Timeout { .. })
        ));

        let started = Instant::now();
        assert!(matches!(
            backend.get("song:1").await,
            Err(BackendError::Unavailable(_))
        ));
        assert!(started.elapsed() < Duration::from_millis(50));
        server.abort();
    }

    #[test]
    fn rejects_non_redis_urls() {
        let backend = RedisBackend::new("http://localhost", "localhost", Duration::from_millis(1));
        assert!(backend.is_err());
    }
}
