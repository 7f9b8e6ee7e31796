use crate::config::Connection;
use crate::error::{ProvisionError, Result};
use log::debug;
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};

/// Something that can run statements for the engine.
///
/// Implemented by [`DbConnection`] for a live server; tests plug in a recorder.
pub trait Executor {
    /// Run a single statement. The error is the server's message.
    fn execute(&mut self, sql: &str) -> std::result::Result<(), String>;

    fn commit(&mut self) -> std::result::Result<(), String>;
}

/// Opens one fresh [`Executor`] per project.
pub trait Connector {
    type Conn: Executor;

    fn connect(&self) -> Result<Self::Conn>;
}

pub struct DbConnection {
    address: String,
    conn: Conn,
}

impl DbConnection {
    /// Connect with the admin account. With `enterprise_auth` the client is allowed to
    /// send the password with `mysql_clear_password`, as LDAP/PAM accounts require.
    pub fn connect(config: &Connection) -> Result<Self> {
        let address = config.address();

        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .tcp_connect_timeout(Some(config.timeout()))
            .prefer_socket(false)
            .enable_cleartext_plugin(config.enterprise_auth);

        let conn = Conn::new(opts).map_err(|e| ProvisionError::Connection {
            address: address.clone(),
            message: e.to_string(),
        })?;

        debug!("connected to {} as {}", address, config.user);

        Ok(Self { address, conn })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Ping the server
    pub fn ping(&mut self) -> Result<()> {
        self.conn
            .query_drop("SELECT 1")
            .map_err(|e| ProvisionError::Connection {
                address: self.address.clone(),
                message: e.to_string(),
            })
    }
}

impl Executor for DbConnection {
    fn execute(&mut self, sql: &str) -> std::result::Result<(), String> {
        self.conn.query_drop(sql).map_err(|e| e.to_string())
    }

    fn commit(&mut self) -> std::result::Result<(), String> {
        self.conn.query_drop("COMMIT").map_err(|e| e.to_string())
    }
}

impl Connector for Connection {
    type Conn = DbConnection;

    fn connect(&self) -> Result<DbConnection> {
        DbConnection::connect(self)
    }
}
