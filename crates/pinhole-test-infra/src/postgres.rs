use crate::Result;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const POSTGRES_PORT: u16 = 5432;

/// Logged by the temporary server that runs the init scripts and again by
/// the final server.
const READY_MESSAGE: &str = "database system is ready to accept connections";

#[derive(Debug, TypedBuilder)]
pub struct PostgresConfig {
    #[builder(default = "pinhole".to_string())]
    database: String,
    #[builder(default = "pinhole".to_string())]
    username: String,
    #[builder(default = "pinhole".to_string())]
    password: String,
    #[builder(default = "17-alpine".to_string())]
    tag: String,
    /// Upper bound on pulling the image and waiting for readiness.
    #[builder(default = Duration::from_secs(120))]
    startup_timeout: Duration,
}

/// Test fixture for a disposable PostgreSQL server.
///
/// [`PostgresServer::new`] returns once the final server (not the one the
/// image runs during initialization) accepts connections.
pub struct PostgresServer {
    container: ContainerAsync<GenericImage>,
    config: PostgresConfig,
}

impl PostgresServer {
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        let container = GenericImage::new("postgres", config.tag.as_str())
            .with_exposed_port(POSTGRES_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout(READY_MESSAGE))
            .with_wait_for(WaitFor::message_on_stderr(READY_MESSAGE))
            .with_env_var("POSTGRES_DB", config.database.as_str())
            .with_env_var("POSTGRES_USER", config.username.as_str())
            .with_env_var("POSTGRES_PASSWORD", config.password.as_str())
            .with_startup_timeout(config.startup_timeout)
            .start()
            .await?;

        Ok(Self { container, config })
    }

    pub async fn host(&self) -> Result<String> {
        Ok(self.container.get_host().await?.to_string())
    }

    pub async fn port(&self) -> Result<u16> {
        Ok(self.container.get_host_port_ipv4(POSTGRES_PORT).await?)
    }

    /// Connection string for the configured database, in the form accepted
    /// by `DATABASE_DSN`.
    pub async fn database_url(&self) -> Result<String> {
        let host = self.host().await?;
        let port = self.port().await?;
        Ok(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.config.username, self.config.password, host, port, self.config.database
        ))
    }

    pub fn container(&self) -> &ContainerAsync<GenericImage> {
        &self.container
    }
}
