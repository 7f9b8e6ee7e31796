use crate::error::{ProvisionError, Result};
use envmnt::{ExpandOptions, ExpansionType};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Connection configuration section.
/// The admin account on the connection must be allowed to create databases and users and
/// to grant privileges.
///
/// For example:
/// ```yaml
/// connection:
///   host: db.internal
///   port: 3306
///   user: j.smith
///   password: ${MYSQL_ADMIN_PASSWORD}
///   connect_timeout: 10
///   enterprise_auth: true
/// ```
///
/// `enterprise_auth` switches the admin login to the `mysql_clear_password` plugin, which
/// LDAP/PAM backed accounts need. It says nothing about the provisioned accounts.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Connection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Seconds
    pub connect_timeout: u64,
    pub enterprise_auth: bool,
}

impl Connection {
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ProvisionError::Config("connection.host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(ProvisionError::Config("connection.port must be > 0".to_string()));
        }
        if self.connect_timeout == 0 {
            return Err(ProvisionError::Config(
                "connection.connect_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// `host:port`, as written to the master report.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    // Expand environment variables in `host`, `user` and `password`.
    // For example: password: ${MYSQL_ADMIN_PASSWORD}
    pub fn expand_env_vars(&self) -> Result<Self> {
        let mut connection = self.clone();

        let options = || ExpandOptions {
            expansion_type: Some(ExpansionType::UnixBracketsWithDefaults),
            default_to_empty: false,
        };

        connection.host = envmnt::expand(&self.host, Some(options()));
        connection.user = envmnt::expand(&self.user, Some(options()));
        connection.password = envmnt::expand(&self.password, Some(options()));

        // Most likely, the user forgot to export the environment variables.
        for (field, value) in [
            ("host", &connection.host),
            ("user", &connection.user),
            ("password", &connection.password),
        ] {
            if value.contains("${") {
                warn!(
                    "The connection {} may not have fully expanded environment variables",
                    field
                );
            }
        }

        Ok(connection)
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            connect_timeout: 10,
            enterprise_auth: false,
        }
    }
}

// The admin password must never reach the logs.
impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"********")
            .field("connect_timeout", &self.connect_timeout)
            .field("enterprise_auth", &self.enterprise_auth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_validate() {
        let connection = Connection::default();
        assert!(connection.validate().is_ok());

        let connection = Connection {
            port: 0,
            ..Connection::default()
        };
        assert!(connection.validate().is_err());

        let connection = Connection {
            connect_timeout: 0,
            ..Connection::default()
        };
        assert!(connection.validate().is_err());
    }

    #[test]
    fn test_connection_address() {
        let connection = Connection {
            host: "db.internal".to_string(),
            port: 3307,
            ..Connection::default()
        };
        assert_eq!(connection.address(), "db.internal:3307");
    }

    #[test]
    fn test_connection_expand_env_vars() {
        envmnt::set("PROVISION_TEST_ADMIN_PASSWORD", "s3cret");

        let connection = Connection {
            password: "${PROVISION_TEST_ADMIN_PASSWORD}".to_string(),
            user: "${PROVISION_TEST_ADMIN_USER:admin}".to_string(),
            ..Connection::default()
        };
        let expanded = connection.expand_env_vars().unwrap();

        assert_eq!(expanded.password, "s3cret");
        assert_eq!(expanded.user, "admin");

        envmnt::remove("PROVISION_TEST_ADMIN_PASSWORD");
    }

    #[test]
    fn test_connection_debug_hides_password() {
        let connection = Connection {
            password: "hunter2".to_string(),
            ..Connection::default()
        };
        assert!(!format!("{:?}", connection).contains("hunter2"));
    }
}
