use std::fmt;

/// Privilege clause granted on `<db>.*`.
///
/// This table is the only place privilege strings are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privileges {
    /// Owners, admins and migrators.
    All,
    /// Reporting and analytics accounts.
    ReadOnly,
    /// Application and batch accounts: data manipulation, no DDL.
    Standard,
}

const ALL_ROLES: &[&str] = &["DBO", "ADMIN", "OWNER", "MIGRATOR"];
const READ_ONLY_ROLES: &[&str] = &["READ", "READER", "RO", "REPORT", "ANALYTICS"];

impl Privileges {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Privileges::All => "ALL PRIVILEGES",
            Privileges::ReadOnly => "SELECT",
            Privileges::Standard => "SELECT, INSERT, UPDATE, DELETE, EXECUTE, SHOW VIEW",
        }
    }
}

impl fmt::Display for Privileges {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Map a role token to its privilege clause. Case-insensitive and total: unknown roles
/// get the standard application set.
pub fn privileges_for(role: &str) -> Privileges {
    let role = role.trim().to_uppercase();

    if ALL_ROLES.contains(&role.as_str()) {
        Privileges::All
    } else if READ_ONLY_ROLES.contains(&role.as_str()) {
        Privileges::ReadOnly
    } else {
        Privileges::Standard
    }
}
