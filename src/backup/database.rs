use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::run_config::DatabaseConfig;
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};
use tracing::debug;

pub trait DatabaseConnector {
    fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn TableLister>>;
}

pub trait TableLister {
    /// Every table in the connected schema, in the order the server reports them.
    fn list_tables(&mut self) -> Result<Vec<String>>;
}

/// Connects with the `mysql` client library. A host that is an absolute path
/// is treated as a Unix socket.
#[derive(Clone, Debug, Default)]
pub struct MysqlConnector;

impl MysqlConnector {
    fn opts(config: &DatabaseConfig) -> OptsBuilder {
        let builder = if config.host().starts_with('/') {
            OptsBuilder::new().socket(Some(config.host().as_str()))
        } else {
            OptsBuilder::new()
                .ip_or_hostname(Some(config.host().as_str()))
                .tcp_port(*config.port())
        };

        builder
            .user(Some(config.username().as_str()))
            .pass(Some(config.password().inner().as_str()))
            .db_name(Some(config.database().as_str()))
    }
}

impl DatabaseConnector for MysqlConnector {
    fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn TableLister>> {
        debug!(
            "  connecting to {}@{}:{}/{} (password: {})",
            config.username(),
            config.host(),
            config.port(),
            config.database(),
            config.password().masked()
        );

        let conn = Conn::new(Self::opts(config))
            .map_err(|e| Error::database_connection(e.to_string()))?;
        Ok(Box::new(MysqlTableLister { conn }))
    }
}

struct MysqlTableLister {
    conn: Conn,
}

impl TableLister for MysqlTableLister {
    fn list_tables(&mut self) -> Result<Vec<String>> {
        Ok(self.conn.query::<String, _>("SHOW TABLES")?)
    }
}
