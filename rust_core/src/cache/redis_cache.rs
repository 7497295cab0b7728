//! Redis-backed cache store

use async_trait::async_trait;
use redis::aio::Connection;
use redis::Client;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::CacheStore;
use crate::error::PipelineError;

/// Default bound on connect, PING and each write
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RedisCache {
    connection: Mutex<Connection>,
    op_timeout: Duration,
    /// Set once a command timed out; its reply may still be in flight, so the
    /// connection cannot be reused.
    abandoned: AtomicBool,
}

impl RedisCache {
    /// Connect and verify the server answers PING.
    ///
    /// Any failure here means the cache is unusable for the whole invocation.
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::open(redis_url)
            .map_err(|e| PipelineError::Configuration(format!("invalid cache Redis URL: {}", e)))?;

        let mut connection = tokio::time::timeout(timeout, client.get_async_connection())
            .await
            .map_err(|_| {
                PipelineError::CacheUnavailable(format!("connect timed out after {:?}", timeout))
            })?
            .map_err(|e| PipelineError::CacheUnavailable(e.to_string()))?;

        tokio::time::timeout(
            timeout,
            redis::cmd("PING").query_async::<_, String>(&mut connection),
        )
        .await
        .map_err(|_| PipelineError::CacheUnavailable(format!("PING timed out after {:?}", timeout)))?
        .map_err(|e| PipelineError::CacheUnavailable(format!("PING failed: {}", e)))?;

        debug!("Connected to cache");
        Ok(Self {
            connection: Mutex::new(connection),
            op_timeout: timeout,
            abandoned: AtomicBool::new(false),
        })
    }

    async fn bounded<T, F>(&self, key: &str, op: F) -> Result<T, PipelineError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        if self.abandoned.load(Ordering::Acquire) {
            return Err(PipelineError::CacheWrite {
                key: key.to_string(),
                reason: "connection abandoned after an earlier timeout".to_string(),
            });
        }
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(PipelineError::CacheWrite {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => {
                self.abandoned.store(true, Ordering::Release);
                warn!(key, "Cache command timed out, abandoning connection");
                Err(PipelineError::CacheWrite {
                    key: key.to_string(),
                    reason: format!("timed out after {:?}", self.op_timeout),
                })
            }
        }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), PipelineError> {
        let mut conn = self.connection.lock().await;
        let cmd = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs())
            .arg(value)
            .to_owned();
        self.bounded(key, cmd.query_async::<_, ()>(&mut *conn)).await
    }

    async fn add_to_set_with_expiry(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), PipelineError> {
        let mut conn = self.connection.lock().await;
        let pipe = redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(key)
            .arg(member)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .ignore()
            .to_owned();
        self.bounded(key, pipe.query_async::<_, ()>(&mut *conn)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    /// Minimal RESP server that answers every command except `SETEX`, which
    /// it never replies to.
    async fn server_stalling_on_setex() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            loop {
                let n = match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                let chunk = String::from_utf8_lossy(&buf[..n]).to_string();
                if chunk.contains("SETEX") {
                    continue;
                }
                let commands = chunk.split("\r\n").filter(|l| l.starts_with('*')).count();
                for _ in 0..commands {
                    if socket.write_all(b"+PONG\r\n").await.is_err() {
                        return;
                    }
                }
            }
        });
        format!("redis://{}", addr)
    }

    #[tokio::test]
    async fn test_timed_out_connection_is_not_reused() {
        let url = server_stalling_on_setex().await;
        let cache = RedisCache::connect(&url, Duration::from_millis(200)).await.unwrap();
        let ttl = Duration::from_secs(60);

        let first = cache.set_with_expiry("pe:latest:X", "{}", ttl).await.unwrap_err();
        assert!(matches!(first, PipelineError::CacheWrite { ref reason, .. } if reason.contains("timed out")));

        let started = Instant::now();
        let second = cache.add_to_set_with_expiry("pe:symbols", "X", ttl).await.unwrap_err();
        assert!(matches!(second, PipelineError::CacheWrite { ref reason, .. } if reason.contains("abandoned")));
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_invalid_url_is_configuration_fault() {
        let err = RedisCache::connect("not a url", Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let err = RedisCache::connect("redis://127.0.0.1:9", Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::CacheUnavailable(_)));
    }
}
