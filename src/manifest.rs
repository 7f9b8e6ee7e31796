use crate::batch::{database_name, username, MAX_USERNAME_LEN};
use crate::error::{ProvisionError, Result};
use crate::identifier::{Identifier, Role};
use log::debug;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

pub const REQUIRED_COLUMNS: &[&str] = &["Project_Name", "Environment", "Roles"];

/// A manifest record as read from disk, before any validation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ManifestRow {
    #[serde(skip)]
    pub line: usize,
    #[serde(rename = "Project_Name")]
    pub project: String,
    #[serde(rename = "Environment")]
    pub environment: String,
    /// Comma-separated role tokens, e.g. `app, batch, dbo, read`.
    #[serde(rename = "Roles")]
    pub roles: String,
}

/// A validated manifest row; every field is safe to use in SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRow {
    pub line: usize,
    pub project: Identifier,
    pub environment: Identifier,
    pub roles: Vec<Role>,
}

impl ManifestRow {
    /// Validate project, environment and every role token.
    ///
    /// Repeated roles (case-insensitive) keep their first occurrence. Derived usernames
    /// must fit the MySQL account-name limit.
    pub fn validate(&self) -> Result<ProjectRow> {
        let project = Identifier::parse(&self.project)?;
        let environment = Identifier::parse(&self.environment)?;

        let mut seen = HashSet::new();
        let mut roles = vec![];
        for token in self.roles.split(',') {
            let role = Role::parse(token)?;
            if seen.insert(role.clone()) {
                roles.push(role);
            }
        }

        for role in &roles {
            let user = username(&project, &environment, role);
            if user.len() > MAX_USERNAME_LEN {
                return Err(ProvisionError::UsernameTooLong(user.to_string()));
            }
        }

        Ok(ProjectRow {
            line: self.line,
            project,
            environment,
            roles,
        })
    }
}

/// Parsed manifest. Rows are kept raw so that one bad row does not hide the others.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub rows: Vec<ManifestRow>,
}

impl Manifest {
    pub fn new(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            ProvisionError::ManifestFormat(format!("could not read `{}`: {}", path.display(), e))
        })?;

        Self::from_reader(file)
    }

    /// Read CSV with a header row. Required columns are checked up front; extra columns
    /// are ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| ProvisionError::ManifestFormat(e.to_string()))?
            .clone();

        let missing = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !headers.iter().any(|h| h == **c))
            .copied()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(ProvisionError::ManifestFormat(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        }

        let mut rows = vec![];
        for (idx, record) in reader.deserialize::<ManifestRow>().enumerate() {
            let mut row =
                record.map_err(|e| ProvisionError::ManifestFormat(format!("row {}: {}", idx + 1, e)))?;
            row.line = idx + 1;
            rows.push(row);
        }

        debug!("manifest: {} row(s)", rows.len());

        Ok(Self { rows })
    }

    /// Validate every row in manifest order.
    ///
    /// A row whose database name (`lower(project)_lower(environment)`) repeats an earlier
    /// valid row is a `DuplicateProject`, so the first occurrence wins.
    pub fn validate_rows(&self) -> Vec<(&ManifestRow, Result<ProjectRow>)> {
        let mut seen = HashSet::new();

        self.rows
            .iter()
            .map(|raw| {
                let row = raw.validate().and_then(|row| {
                    let database = database_name(&row.project, &row.environment);
                    if seen.insert(database.clone()) {
                        Ok(row)
                    } else {
                        Err(ProvisionError::DuplicateProject(database.to_string()))
                    }
                });
                (raw, row)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
