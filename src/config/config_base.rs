use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{fmt, fs};

pub use super::connection::Connection;
pub use super::output::Output;

/// Configuration contains everything a run needs besides the manifest:
///  - `connection`: how to reach the MySQL server with the admin account.
///  - `output`: where artifacts and the audit log go, and the password length.
///
/// For example:
///
/// ```yaml
/// connection:
///   host: localhost
///   port: 3306
///   user: admin
///   password: ${MYSQL_ADMIN_PASSWORD}
///   connect_timeout: 10
///   enterprise_auth: false
///
/// output:
///   dir: DIST_TEMP
///   audit_log: audit_log.txt
///   password_length: 20
/// ```
///
/// Both sections are optional, every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub connection: Connection,
    pub output: Output,
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "connection: {}@{} (timeout {}s, enterprise auth: {})",
            self.connection.user,
            self.connection.address(),
            self.connection.connect_timeout,
            self.connection.enterprise_auth
        )?;
        write!(
            f,
            "output: {} (audit log: {}, password length: {})",
            self.output.dir.display(),
            self.output.audit_log.display(),
            self.output.password_length
        )
    }
}

impl std::str::FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(s)?;

        // Validate
        config.validate()?;

        Ok(config)
    }
}

impl Config {
    pub fn new(config_path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;
        let config: Config = serde_yaml::from_str(&config_str)?;

        // expand env variables
        let config = config.expand_env_vars()?;

        config.validate()?;

        Ok(config)
    }

    /// Load from `path`, or fall back to the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::new(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        self.output.validate()?;

        Ok(())
    }

    // Expand env variables in config
    fn expand_env_vars(&self) -> Result<Self> {
        let mut config = self.clone();

        config.connection = config.connection.expand_env_vars()?;

        Ok(config)
    }
}
