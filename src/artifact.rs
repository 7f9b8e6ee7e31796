use crate::batch::{database_name, ProvisionedUser};
use crate::config::Connection;
use crate::error::{ProvisionError, Result};
use crate::identifier::Identifier;
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{AesMode, CompressionMethod, ZipWriter};

pub const ENV_FILE: &str = ".env";
pub const MASTER_REPORT_CSV: &str = "MASTER_PASSWORDS_SECURE.csv";
pub const MASTER_REPORT_ZIP: &str = "MASTER_PASSWORDS_SECURE.zip";

/// One row of the master credential report.
///
/// This is the only artifact that carries every plaintext password of a run. Whoever
/// distributes the credentials is expected to delete it afterwards.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MasterRecord {
    #[serde(rename = "Project")]
    pub project: String,
    #[serde(rename = "Environment")]
    pub environment: String,
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Privileges")]
    pub privileges: String,
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Pass")]
    pub pass: String,
    /// `host:port`
    #[serde(rename = "Host")]
    pub host: String,
}

impl MasterRecord {
    pub fn from_users(
        project: &Identifier,
        environment: &Identifier,
        users: &[ProvisionedUser],
        connection: &Connection,
    ) -> Vec<Self> {
        users
            .iter()
            .map(|u| Self {
                project: project.to_string(),
                environment: environment.to_string(),
                role: u.role.to_string(),
                privileges: u.privileges.to_string(),
                user: u.username.to_string(),
                pass: u.password.expose().to_string(),
                host: connection.address(),
            })
            .collect()
    }
}

/// Writes everything a run produces under one working directory.
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    /// Delete `root` with everything from previous runs and recreate it empty.
    pub fn prepare(root: &Path) -> Result<Self> {
        check_wipe_target(root)?;

        if root.exists() {
            debug!("removing previous artifacts in {}", root.display());
            fs::remove_dir_all(root)?;
        }
        fs::create_dir_all(root)?;

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `<Project>_<Environment>/.env`.
    ///
    /// The directory is filled in a staging directory next to it and renamed into place,
    /// so an interrupted run never leaves a half-written project directory behind.
    pub fn write_project_files(
        &self,
        project: &Identifier,
        environment: &Identifier,
        users: &[ProvisionedUser],
        connection: &Connection,
    ) -> Result<PathBuf> {
        let target = self.root.join(format!("{}_{}", project, environment));

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;
        let content = render_env(project, environment, users, connection);
        fs::write(staging.path().join(ENV_FILE), content)?;

        if target.exists() {
            fs::remove_dir_all(&target)?;
        }
        fs::rename(staging.path(), &target)?;
        // The staging path is gone now, dropping the guard has nothing left to remove.
        drop(staging);

        debug!("wrote {}", target.join(ENV_FILE).display());

        Ok(target)
    }

    /// Write the master report as CSV, or as an AES-256 encrypted zip holding that CSV
    /// when a passphrase is given. The plaintext CSV does not survive the encryption.
    pub fn write_master_report(
        &self,
        records: &[MasterRecord],
        passphrase: Option<&str>,
    ) -> Result<PathBuf> {
        let mut writer = csv::Writer::from_writer(vec![]);
        for record in records {
            writer.serialize(record)?;
        }
        let data = writer.into_inner().map_err(|e| {
            ProvisionError::Io(std::io::Error::new(e.error().kind(), e.to_string()))
        })?;

        match passphrase {
            Some(passphrase) if !passphrase.is_empty() => {
                let path = self.root.join(MASTER_REPORT_ZIP);
                let plain = self.root.join(MASTER_REPORT_CSV);

                let mut zip = ZipWriter::new(fs::File::create(&path)?);
                let options = FileOptions::<()>::default()
                    .compression_method(CompressionMethod::Deflated)
                    .with_aes_encryption(AesMode::Aes256, passphrase);
                zip.start_file(MASTER_REPORT_CSV, options)?;
                zip.write_all(&data)?;
                zip.finish()?;

                if plain.exists() {
                    fs::remove_file(&plain)?;
                }

                info!("Encrypted master report written to {}", path.display());
                Ok(path)
            }
            Some(_) => Err(ProvisionError::Config(
                "master report passphrase is empty".to_string(),
            )),
            None => {
                let path = self.root.join(MASTER_REPORT_CSV);
                fs::write(&path, data)?;

                warn!(
                    "{} contains PLAINTEXT passwords. Delete it after secure distribution!",
                    path.display()
                );
                Ok(path)
            }
        }
    }
}

/// Render the per-project `.env` file.
pub fn render_env(
    project: &Identifier,
    environment: &Identifier,
    users: &[ProvisionedUser],
    connection: &Connection,
) -> String {
    let mut content = format!("# Auto-generated config for {} ({})\n", project, environment);
    content += &format!(
        "# Generated on: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    content += &format!("DB_HOST={}\n", connection.host);
    content += &format!("DB_PORT={}\n", connection.port);
    content += &format!("DB_NAME={}\n\n", database_name(project, environment));

    for user in users {
        content += &format!("# Role: {} (Privileges: {})\n", user.role, user.privileges);
        content += &format!("DB_USER_{}={}\n", user.role, user.username);
        content += &format!("DB_PASS_{}={}\n", user.role, user.password.expose());
    }

    content
}

/// Refuse to wipe a filesystem root, the current directory or one of its ancestors.
fn check_wipe_target(root: &Path) -> Result<()> {
    let refuse = || {
        ProvisionError::Config(format!(
            "refusing to use {} as output directory",
            root.display()
        ))
    };

    if root.as_os_str().is_empty() || root.parent().is_none() {
        return Err(refuse());
    }

    if root.exists() {
        let root = root.canonicalize()?;
        let cwd = std::env::current_dir()?.canonicalize()?;
        if root.parent().is_none() || cwd.starts_with(&root) {
            return Err(refuse());
        }
    }

    Ok(())
}
