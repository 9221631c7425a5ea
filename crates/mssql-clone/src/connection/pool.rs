//! bb8 pool of Tiberius clients scoped to one database.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::error::{CloneError, Result};

/// Connection acquisition timeout from pool (30 seconds).
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connection timeout (5 minutes).
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: Config,
}

impl TiberiusConnectionManager {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.config.clone();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Pool of connections to a single database, used for concurrent table reads.
pub struct DatabasePool {
    database: String,
    pool: Pool<TiberiusConnectionManager>,
}

impl DatabasePool {
    /// Build a pool from a driver config already scoped to `database`.
    pub async fn new(database: &str, config: Config, max_size: u32) -> Result<Self> {
        let manager = TiberiusConnectionManager::new(config);
        let pool = Pool::builder()
            .max_size(max_size.max(1))
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .test_on_check_out(true)
            .build(manager)
            .await
            .map_err(|e| CloneError::pool(e, format!("creating connection pool for {}", database)))?;

        debug!("Opened connection pool for {} (max_size={})", database, max_size);

        Ok(Self {
            database: database.to_string(),
            pool,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Get a pooled connection.
    pub async fn get(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| CloneError::pool(e, format!("getting connection to {}", self.database)))
    }
}
