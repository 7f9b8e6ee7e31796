use thiserror::Error;

/// Failures raised by the provisioning engine.
///
/// Row-scoped variants (`InvalidIdentifier`, `UsernameTooLong`, `DuplicateProject`) skip
/// one manifest row. Project-scoped variants (`Connection`, `SqlExecution`) fail one
/// project. `ManifestFormat` aborts the whole run before any SQL is issued.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid identifier '{0}': only alphanumeric characters and underscores are allowed")]
    InvalidIdentifier(String),

    #[error("username '{0}' is longer than {max} characters", max = crate::batch::MAX_USERNAME_LEN)]
    UsernameTooLong(String),

    #[error("duplicate project/environment '{0}' in manifest")]
    DuplicateProject(String),

    #[error("could not connect to {address}: {message}")]
    Connection { address: String, message: String },

    #[error("statement failed: {statement} -> {message}")]
    SqlExecution { statement: String, message: String },

    #[error("manifest error: {0}")]
    ManifestFormat(String),

    #[error("password length {0} cannot hold 1 lowercase, 1 uppercase and 3 digits")]
    UnsatisfiablePasswordPolicy(usize),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
