//! Database connections split between a read replica and a writable primary.

use sea_orm::{Database, DatabaseConnection, DbErr};

use crate::config::Config;

#[derive(Clone, Debug)]
pub struct Session {
    pub reader: DatabaseConnection,
    pub writer: DatabaseConnection,
}

impl Session {
    /// Opens one connection pool per configured host.
    #[tracing::instrument(skip(config))]
    pub async fn connect(config: &Config) -> Result<Self, DbErr> {
        let writer = Database::connect(config.writer_connection_string()).await?;
        let reader = if config.postgres_host_reader == config.postgres_host_writer {
            writer.clone()
        } else {
            Database::connect(config.reader_connection_string()).await?
        };
        tracing::info!(
            reader = %config.postgres_host_reader,
            writer = %config.postgres_host_writer,
            "Database connections established"
        );
        Ok(Self { reader, writer })
    }

    /// Uses the same connection for reads and writes.
    pub fn single(db: DatabaseConnection) -> Self {
        Self {
            reader: db.clone(),
            writer: db,
        }
    }
}
