use crate::gen::{PasswordPolicy, Secret};
use crate::identifier::{Identifier, Role};
use crate::manifest::ProjectRow;
use crate::rbac::{privileges_for, Privileges};
use std::fmt;

/// MySQL account names are limited to 32 characters.
pub const MAX_USERNAME_LEN: usize = 32;

const REDACTED: &str = "********";

/// One DDL/DCL statement of a project batch.
///
/// Every name is an [`Identifier`], so [`Statement::to_sql`] never interpolates an
/// unchecked string. `Display` renders the same text with passwords masked and is what
/// goes to logs and error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateDatabase {
        database: Identifier,
    },
    CreateUser {
        user: Identifier,
        password: Secret,
    },
    AlterUser {
        user: Identifier,
        password: Secret,
    },
    Grant {
        privileges: Privileges,
        database: Identifier,
        user: Identifier,
    },
    FlushPrivileges,
}

impl Statement {
    pub fn to_sql(&self) -> String {
        self.render(false)
    }

    fn render(&self, redact: bool) -> String {
        let secret = |p: &Secret| {
            if redact {
                REDACTED.to_string()
            } else {
                p.expose().to_string()
            }
        };

        match self {
            Statement::CreateDatabase { database } => {
                format!("CREATE DATABASE IF NOT EXISTS {} CHARACTER SET utf8mb4;", database)
            }
            Statement::CreateUser { user, password } => format!(
                "CREATE USER IF NOT EXISTS '{}'@'%' IDENTIFIED BY '{}';",
                user,
                secret(password)
            ),
            Statement::AlterUser { user, password } => format!(
                "ALTER USER '{}'@'%' IDENTIFIED BY '{}';",
                user,
                secret(password)
            ),
            Statement::Grant {
                privileges,
                database,
                user,
            } => format!("GRANT {} ON {}.* TO '{}'@'%';", privileges, database, user),
            Statement::FlushPrivileges => "FLUSH PRIVILEGES;".to_string(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render(true))
    }
}

/// The ordered statements for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlBatch {
    pub database: Identifier,
    pub statements: Vec<Statement>,
}

impl SqlBatch {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn to_sql(&self) -> Vec<String> {
        self.statements.iter().map(|s| s.to_sql()).collect()
    }
}

/// A service account created for one role of a project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedUser {
    pub role: Role,
    pub username: Identifier,
    pub password: Secret,
    pub privileges: Privileges,
}

/// `lower(project)_lower(environment)`
pub fn database_name(project: &Identifier, environment: &Identifier) -> Identifier {
    Identifier::join_lower(&[project, environment])
}

/// `lower(project)_lower(environment)_lower(role)`
pub fn username(project: &Identifier, environment: &Identifier, role: &Role) -> Identifier {
    Identifier::join_lower(&[project, environment, role.identifier()])
}

/// Build the idempotent batch and the user records for one validated row.
///
/// For each role: `CREATE USER IF NOT EXISTS`, then `ALTER USER` to force the fresh
/// password even when the account already existed, then `GRANT`. The database is created
/// first and `FLUSH PRIVILEGES` closes the batch. No I/O happens here.
pub fn build(row: &ProjectRow, policy: &PasswordPolicy) -> (SqlBatch, Vec<ProvisionedUser>) {
    let database = database_name(&row.project, &row.environment);

    let mut statements = vec![Statement::CreateDatabase {
        database: database.clone(),
    }];
    let mut users = Vec::with_capacity(row.roles.len());

    for role in &row.roles {
        let user = username(&row.project, &row.environment, role);
        let password = policy.generate();
        let privileges = privileges_for(role.as_str());

        statements.push(Statement::CreateUser {
            user: user.clone(),
            password: password.clone(),
        });
        statements.push(Statement::AlterUser {
            user: user.clone(),
            password: password.clone(),
        });
        statements.push(Statement::Grant {
            privileges,
            database: database.clone(),
            user: user.clone(),
        });

        users.push(ProvisionedUser {
            role: role.clone(),
            username: user,
            password,
            privileges,
        });
    }

    statements.push(Statement::FlushPrivileges);

    (
        SqlBatch {
            database,
            statements,
        },
        users,
    )
}
