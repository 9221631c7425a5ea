//! Connection Resolver.
//!
//! Builds connection strings for the source server and for each clone
//! database, checks reachability before any work starts, and opens clients.

mod ado;
mod pool;

pub use ado::{
    derive_clone_connection_string, ensure_placeholder, parse_config, redact_connection_string,
};
pub use pool::{DatabasePool, TiberiusConnectionManager};

use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, error, info};

use crate::error::{CloneError, Result};

/// A Tiberius client over a Tokio TCP stream.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Open one client for an ADO connection string.
pub async fn connect(connection_string: &str) -> Result<MssqlClient> {
    connect_with(parse_config(connection_string)?).await
}

/// Open one client for a Tiberius config.
pub async fn connect_with(config: Config) -> Result<MssqlClient> {
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true).ok();
    Ok(Client::connect(config, tcp.compat_write()).await?)
}

/// Resolves connection strings from the configured template.
#[derive(Clone)]
pub struct ConnectionResolver {
    template: String,
    placeholder: String,
}

impl std::fmt::Debug for ConnectionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionResolver")
            .field("template", &redact_connection_string(&self.template))
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

impl ConnectionResolver {
    pub fn new(template: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            placeholder: placeholder.into(),
        }
    }

    pub fn from_config(config: &crate::Config) -> Self {
        Self::new(
            config.connection_string.clone(),
            config.clone.default_database.clone(),
        )
    }

    /// The template, which targets the placeholder database.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Open and immediately close a diagnostic connection.
    ///
    /// Never errors: any connectivity problem yields `false`.
    pub async fn validate(&self, connection_string: &str) -> bool {
        let redacted = redact_connection_string(connection_string);
        match connect(connection_string).await {
            Ok(client) => {
                if let Err(e) = client.close().await {
                    debug!("Closing diagnostic connection failed: {}", e);
                }
                info!("Connection validated: {}", redacted);
                true
            }
            Err(e) => {
                error!(
                    "Cannot initialize a SQL Server connection using the given connection string {}: {}",
                    redacted, e
                );
                false
            }
        }
    }

    /// Connection string scoped to `database`.
    pub fn derive_clone_connection_string(&self, database: &str) -> Result<String> {
        derive_clone_connection_string(&self.template, &self.placeholder, database)
    }

    /// Open the run-long server connection on the template's database.
    pub async fn open_server(&self) -> Result<ServerConnection> {
        let client = connect(&self.template).await?;
        info!(
            "Using the Connection String: {}",
            redact_connection_string(&self.template)
        );
        Ok(ServerConnection {
            connection_string: self.template.clone(),
            client,
        })
    }

    /// Driver config for the template, scoped to `database`.
    pub fn database_config(&self, database: &str) -> Result<Config> {
        let mut config = parse_config(&self.template)?;
        config.database(database);
        Ok(config)
    }

    /// Open a single client scoped to `database`.
    pub async fn connect_to(&self, database: &str) -> Result<MssqlClient> {
        let connection_string = self.derive_clone_connection_string(database)?;
        debug!(
            "Opening connection to {}: {}",
            database,
            redact_connection_string(&connection_string)
        );
        connect_with(self.database_config(database)?).await
    }

    /// Build a pool scoped to `database`.
    pub async fn database_pool(&self, database: &str, max_size: u32) -> Result<DatabasePool> {
        let config = self.database_config(database)?;
        DatabasePool::new(database, config, max_size).await
    }
}

/// The validated server connection, owned by the orchestrator for the whole run.
pub struct ServerConnection {
    connection_string: String,
    client: MssqlClient,
}

impl ServerConnection {
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn client(&mut self) -> &mut MssqlClient {
        &mut self.client
    }

    /// Close the underlying client.
    pub async fn close(self) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| CloneError::pool(e, "closing server connection"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_debug_redacts() {
        let resolver = ConnectionResolver::new("Server=db;Database=master;Password=hunter2", "master");
        let text = format!("{:?}", resolver);
        assert!(text.contains("*****"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_resolver_derives_from_template() {
        let resolver = ConnectionResolver::new("Server=db;Database=master;User Id=sa", "master");
        let derived = resolver.derive_clone_connection_string("Sales_x").unwrap();
        assert!(derived.contains("database=Sales_x"));
        assert!(derived.contains("user id=sa"));
    }

    #[test]
    fn test_database_config_rejects_malformed_template() {
        let resolver = ConnectionResolver::new("Server=db;Database=master;Password=a=b", "master");
        assert!(matches!(
            resolver.database_config("Sales_x"),
            Err(CloneError::Config(_))
        ));
        let resolver = ConnectionResolver::new("Server=db;Database=master", "master");
        assert!(resolver.database_config("Sales_x").is_ok());
    }

    #[tokio::test]
    async fn test_validate_unreachable_is_false() {
        // Port 1 on localhost refuses connections.
        let resolver = ConnectionResolver::new(
            "Server=tcp:127.0.0.1,1;Database=master;User Id=sa;Password=pw",
            "master",
        );
        assert!(!resolver.validate(resolver.template()).await);
    }

    #[tokio::test]
    async fn test_validate_malformed_is_false() {
        let resolver = ConnectionResolver::new("this is not a connection string", "master");
        assert!(!resolver.validate(resolver.template()).await);
    }
}
