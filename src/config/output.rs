use crate::error::{ProvisionError, Result};
use crate::gen::{PasswordPolicy, DEFAULT_PASSWORD_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output configuration section.
///
/// ```yaml
/// output:
///   dir: DIST_TEMP
///   audit_log: audit_log.txt
///   password_length: 20
/// ```
///
/// `dir` is wiped at the start of every run. The audit log lives outside of it and is
/// only ever appended to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Output {
    pub dir: PathBuf,
    pub audit_log: PathBuf,
    pub password_length: usize,
}

impl Output {
    pub fn validate(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(ProvisionError::Config("output.dir is empty".to_string()));
        }
        if resolve(&self.audit_log)?.starts_with(resolve(&self.dir)?) {
            return Err(ProvisionError::Config(
                "output.audit_log must not live inside output.dir".to_string(),
            ));
        }

        self.password_policy()?;

        Ok(())
    }

    pub fn password_policy(&self) -> Result<PasswordPolicy> {
        PasswordPolicy::new(self.password_length)
    }
}

/// Absolute form of `path` with symlinks resolved in its existing part.
///
/// Components that do not exist yet are appended to the canonical existing ancestor, so
/// paths can be compared before the run creates them.
fn resolve(path: &Path) -> Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = path.as_path();
    let mut missing = vec![];
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            // `..` or the root itself; nothing left to resolve against
            _ => return Ok(path.clone()),
        }
    }

    let mut resolved = existing.canonicalize()?;
    resolved.extend(missing.iter().rev());

    Ok(resolved)
}

impl Default for Output {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("DIST_TEMP"),
            audit_log: PathBuf::from("audit_log.txt"),
            password_length: DEFAULT_PASSWORD_LENGTH,
        }
    }
}
