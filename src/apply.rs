use crate::artifact::{ArtifactWriter, MasterRecord};
use crate::audit::AuditLog;
use crate::batch::{build, ProvisionedUser};
use crate::config::Config;
use crate::connection::{Connector, Executor};
use crate::engine::{self, ExecutionOutcome};
use crate::error::ProvisionError;
use crate::manifest::Manifest;
use ansi_term::Colour::{Green, Red, Yellow};
use anyhow::{anyhow, Context, Result};
use ascii_table::AsciiTable;
use log::{error, info};
use std::path::{Path, PathBuf};

/// Per-run switches that are not part of the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Build and log the batches, send nothing to the server.
    pub dryrun: bool,
    /// Encrypt the master report into an AES zip with this passphrase.
    pub passphrase: Option<String>,
}

impl RunOptions {
    /// An empty passphrase is refused rather than silently producing a plaintext report.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.passphrase.as_deref() == Some("") {
            return Err(ProvisionError::Config(
                "master report passphrase is empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Outcome of one manifest row.
#[derive(Debug, Clone)]
pub struct ProvisioningResult {
    pub line: usize,
    pub project: String,
    pub environment: String,
    pub succeeded: bool,
    /// Some statements ran before the failure; the server must be inspected before a
    /// retry is assumed to start from scratch.
    pub partially_applied: bool,
    pub detail: String,
    pub users: Vec<ProvisionedUser>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// At least one row was skipped or failed.
    Partial,
}

#[derive(Debug)]
pub struct RunReport {
    pub results: Vec<ProvisioningResult>,
    pub master_report: Option<PathBuf>,
    pub connection_failures: usize,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.results.iter().all(|r| r.succeeded) {
            RunStatus::Success
        } else {
            RunStatus::Partial
        }
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded).count()
    }
}

/// Read the manifest at `manifest_path` and provision it against the configured server.
/// If the dryrun flag is set, nothing is sent to the server.
pub fn apply(manifest_path: &Path, config: &Config, options: &RunOptions) -> Result<RunReport> {
    if manifest_path.is_dir() {
        return Err(anyhow!(
            "manifest {} is a directory",
            manifest_path.display()
        ));
    }

    // Structural problems abort before any SQL is attempted.
    let manifest = Manifest::new(manifest_path)?;

    info!("Applying configuration:\n{}", config);
    info!(
        "Manifest {} ({} row(s), dry-run = {})",
        manifest_path.display(),
        manifest.len(),
        options.dryrun
    );

    let audit = AuditLog::open(&config.output.audit_log).with_context(|| {
        format!(
            "could not open audit log {}",
            config.output.audit_log.display()
        )
    })?;

    let report = provision(&manifest, config, options, &config.connection, &audit)?;
    print_summary(&report);

    Ok(report)
}

/// Provision every manifest row in order.
///
/// Validation and execution failures are recorded in the returned report and the audit
/// log, and processing moves on to the next row. Only run-level problems are returned as
/// errors: invalid run options, an unreachable server during the preflight of a live run,
/// an output directory that cannot be prepared, or a master report that cannot be written.
/// A project whose files cannot be written fails on its own.
pub fn provision<C: Connector>(
    manifest: &Manifest,
    config: &Config,
    options: &RunOptions,
    connector: &C,
    audit: &AuditLog,
) -> Result<RunReport> {
    options.validate()?;
    let policy = config.output.password_policy()?;

    if !options.dryrun {
        preflight(connector).map_err(|e| {
            audit.error(&format!("aborting run: {}", e));
            anyhow!(e).context("cannot connect with the admin credentials")
        })?;
    }

    let writer = ArtifactWriter::prepare(&config.output.dir).with_context(|| {
        format!(
            "could not prepare output directory {}",
            config.output.dir.display()
        )
    })?;

    audit.info(&format!(
        "run started: {} row(s), dry-run = {}",
        manifest.len(),
        options.dryrun
    ));

    let mut results = vec![];
    let mut records = vec![];
    let mut connection_failures = 0;

    for (raw, row) in manifest.validate_rows() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                audit.error(&format!("row {}: skipped: {}", raw.line, e));
                results.push(ProvisioningResult {
                    line: raw.line,
                    project: raw.project.trim().to_string(),
                    environment: raw.environment.trim().to_string(),
                    succeeded: false,
                    partially_applied: false,
                    detail: format!("skipped: {}", e),
                    users: vec![],
                });
                continue;
            }
        };

        let (batch, users) = build(&row, &policy);
        info!(
            ">>> Project: {} [{}] | Database: {}",
            row.project, row.environment, batch.database
        );

        let outcome = if options.dryrun {
            engine::simulate(&batch)
        } else {
            match connector.connect() {
                Ok(mut conn) => engine::apply(&batch, &mut conn),
                Err(error) => {
                    connection_failures += 1;
                    ExecutionOutcome::Failed { applied: 0, error }
                }
            }
        };

        let mut detail = match &outcome {
            ExecutionOutcome::Simulated { statements } => {
                format!("simulation OK ({} commands prepared)", statements)
            }
            ExecutionOutcome::Applied { statements } => format!(
                "configured on {} ({} commands)",
                config.connection.address(),
                statements
            ),
            ExecutionOutcome::Failed { applied: 0, error } => error.to_string(),
            ExecutionOutcome::Failed { applied, error } => format!(
                "{}; {} command(s) already applied, inspect server state before retrying",
                error, applied
            ),
        };

        let mut succeeded = outcome.succeeded();
        let mut partially_applied = outcome.may_be_partially_applied();

        if outcome.credentials_issued() {
            // The master report still carries these credentials when the files fail.
            records.extend(MasterRecord::from_users(
                &row.project,
                &row.environment,
                &users,
                &config.connection,
            ));

            if let Err(e) = writer.write_project_files(
                &row.project,
                &row.environment,
                &users,
                &config.connection,
            ) {
                detail = format!("{}; could not write project files: {}", detail, e);
                partially_applied |= matches!(outcome, ExecutionOutcome::Applied { .. });
                succeeded = false;
            }
        }

        let message = format!(
            "row {}: {} [{}]: {}",
            row.line, row.project, row.environment, detail
        );
        if succeeded {
            audit.info(&message);
        } else {
            audit.error(&message);
        }

        results.push(ProvisioningResult {
            line: row.line,
            project: row.project.to_string(),
            environment: row.environment.to_string(),
            succeeded,
            partially_applied,
            detail,
            users,
        });
    }

    let master_report = if records.is_empty() {
        None
    } else {
        let path = writer
            .write_master_report(&records, options.passphrase.as_deref())
            .context("could not write master report")?;
        let message = format!(
            "master report with {} credential(s) written to {}",
            records.len(),
            path.display()
        );
        if options.passphrase.is_some() {
            audit.info(&message);
        } else {
            audit.warning(&format!("{} (plaintext, delete after distribution)", message));
        }
        Some(path)
    };

    if connection_failures > 0 {
        audit.error(&format!(
            "{} project(s) could not connect to {}; check the server and admin credentials",
            connection_failures,
            config.connection.address()
        ));
    }

    let report = RunReport {
        results,
        master_report,
        connection_failures,
    };
    audit.info(&format!(
        "run finished: {} row(s), {} failed",
        report.results.len(),
        report.failed()
    ));

    Ok(report)
}

/// Connect once with the admin account before touching any project.
fn preflight<C: Connector>(connector: &C) -> Result<(), ProvisionError> {
    let mut conn = connector.connect()?;
    conn.execute("SELECT 1")
        .map_err(|message| ProvisionError::SqlExecution {
            statement: "SELECT 1".to_string(),
            message,
        })
}

/// Print summary table
fn print_summary(report: &RunReport) {
    let mut summary = vec![vec![
        "Row".to_string(),
        "Project".to_string(),
        "Environment".to_string(),
        "Status".to_string(),
        "Detail".to_string(),
    ]];
    summary.push(vec!["---".to_string(); 5]);

    for result in &report.results {
        let status = if result.succeeded {
            Green.paint("ok").to_string()
        } else if result.partially_applied {
            Yellow.paint("partial").to_string()
        } else {
            Red.paint("failed").to_string()
        };

        summary.push(vec![
            result.line.to_string(),
            result.project.clone(),
            result.environment.clone(),
            status,
            result.detail.clone(),
        ]);
    }

    let term_width = term_size::dimensions().map(|(w, _)| w).unwrap_or(120);
    let mut ascii_table = AsciiTable::default();
    ascii_table.set_max_width(term_width.saturating_sub(5).max(40));

    info!("Summary:\n{}", ascii_table.format(summary));

    if let Some(path) = &report.master_report {
        info!("Master report: {}", path.display());
    }
    if report.connection_failures > 0 {
        error!(
            "{} project(s) failed to connect, the admin credentials or server may be misconfigured",
            report.connection_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Output;
    use crate::engine::tests::Recorder;
    use indoc::indoc;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::rc::Rc;

    /// Hands out recorders that share one statement log.
    #[derive(Default)]
    struct FakeServer {
        executed: Rc<RefCell<Vec<String>>>,
        connects: Cell<usize>,
        refuse: bool,
        /// Refuse only this connection attempt; attempt 0 is the preflight.
        refuse_attempt: Option<usize>,
        fail_statement_containing: Option<&'static str>,
        /// Once its parent exists, put a plain file at this path on connect.
        occupy: Option<PathBuf>,
    }

    struct FakeConn {
        executed: Rc<RefCell<Vec<String>>>,
        fail_statement_containing: Option<&'static str>,
    }

    impl Executor for FakeConn {
        fn execute(&mut self, sql: &str) -> std::result::Result<(), String> {
            if let Some(pattern) = self.fail_statement_containing {
                if sql.contains(pattern) {
                    return Err("ERROR 1044 (42000): Access denied".to_string());
                }
            }
            self.executed.borrow_mut().push(sql.to_string());
            Ok(())
        }

        fn commit(&mut self) -> std::result::Result<(), String> {
            Ok(())
        }
    }

    impl Connector for FakeServer {
        type Conn = FakeConn;

        fn connect(&self) -> crate::error::Result<FakeConn> {
            let attempt = self.connects.get();
            self.connects.set(attempt + 1);

            if let Some(path) = &self.occupy {
                if path.parent().map_or(false, Path::is_dir) && !path.exists() {
                    fs::write(path, "not a directory")?;
                }
            }

            if self.refuse || self.refuse_attempt == Some(attempt) {
                return Err(ProvisionError::Connection {
                    address: "localhost:3306".to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Ok(FakeConn {
                executed: self.executed.clone(),
                fail_statement_containing: self.fail_statement_containing,
            })
        }
    }

    // The recorder from the engine tests works as a connector too.
    impl Connector for RefCell<Option<Recorder>> {
        type Conn = Recorder;

        fn connect(&self) -> crate::error::Result<Recorder> {
            Ok(self.borrow_mut().take().unwrap_or_default())
        }
    }

    fn setup(dir: &Path) -> (Config, AuditLog) {
        let config = Config {
            output: Output {
                dir: dir.join("DIST_TEMP"),
                audit_log: dir.join("audit_log.txt"),
                ..Output::default()
            },
            ..Config::default()
        };
        let audit = AuditLog::open(&config.output.audit_log).unwrap();
        (config, audit)
    }

    fn manifest() -> Manifest {
        let text = indoc! {r#"
            Project_Name,Environment,Roles
            Billing,Prod,"dbo, read"
            Bad Name!,Prod,app
            Crm,Dev,app
        "#};
        Manifest::from_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_dry_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (config, audit) = setup(dir.path());
        let server = FakeServer::default();
        let options = RunOptions {
            dryrun: true,
            passphrase: None,
        };

        let report = provision(&manifest(), &config, &options, &server, &audit).unwrap();

        assert!(server.executed.borrow().is_empty());
        assert_eq!(report.status(), RunStatus::Partial);
        assert_eq!(report.results.len(), 3);

        let billing = &report.results[0];
        assert!(billing.succeeded);
        assert_eq!(
            billing
                .users
                .iter()
                .map(|u| (u.username.as_str(), u.privileges.as_sql()))
                .collect::<Vec<_>>(),
            vec![
                ("billing_prod_dbo", "ALL PRIVILEGES"),
                ("billing_prod_read", "SELECT")
            ]
        );

        let bad = &report.results[1];
        assert!(!bad.succeeded);
        assert_eq!(bad.line, 2);
        assert!(bad.detail.contains("invalid identifier 'Bad Name!'"));
        assert!(bad.users.is_empty());

        assert!(report.results[2].succeeded);

        let master = fs::read_to_string(report.master_report.unwrap()).unwrap();
        assert_eq!(master.lines().count(), 1 + 3);
        assert_eq!(master.lines().filter(|l| l.starts_with("Billing,Prod")).count(), 2);

        let root = config.output.dir;
        assert!(root.join("Billing_Prod").join(".env").exists());
        assert!(root.join("Crm_Dev").join(".env").exists());
        assert!(!root.join("Bad Name!_Prod").exists());

        let log = fs::read_to_string(&config.output.audit_log).unwrap();
        assert!(log.contains("ERROR - row 2: skipped: invalid identifier"));
        assert!(log.contains("INFO - row 1: Billing [Prod]: simulation OK (8 commands prepared)"));
    }

    #[test]
    fn test_live_run_executes_every_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (config, audit) = setup(dir.path());
        let server = FakeServer::default();
        let options = RunOptions {
            dryrun: false,
            passphrase: Some("s3cret".to_string()),
        };

        let report = provision(&manifest(), &config, &options, &server, &audit).unwrap();

        let executed = server.executed.borrow();
        // preflight + Billing (8) + Crm (5); nothing for the invalid row
        assert_eq!(executed.len(), 1 + 8 + 5);
        assert_eq!(executed[0], "SELECT 1");
        assert_eq!(
            executed[1],
            "CREATE DATABASE IF NOT EXISTS billing_prod CHARACTER SET utf8mb4;"
        );
        assert!(!executed.iter().any(|s| s.contains("Bad Name")));

        let password = report.results[0].users[0].password.expose();
        assert!(executed[2].contains(password));

        assert_eq!(
            report.master_report.unwrap(),
            config.output.dir.join(crate::artifact::MASTER_REPORT_ZIP)
        );
    }

    #[test]
    fn test_dry_run_and_live_run_build_the_same_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (config, audit) = setup(dir.path());
        let text = "Project_Name,Environment,Roles\nBilling,Prod,\"dbo, read\"\n";
        let manifest = Manifest::from_reader(text.as_bytes()).unwrap();

        let dry = provision(
            &manifest,
            &config,
            &RunOptions {
                dryrun: true,
                passphrase: None,
            },
            &FakeServer::default(),
            &audit,
        )
        .unwrap();

        let connector = RefCell::new(Some(Recorder::default()));
        let live = provision(
            &manifest,
            &config,
            &RunOptions::default(),
            &connector,
            &audit,
        )
        .unwrap();

        let shape = |r: &RunReport| {
            r.results[0]
                .users
                .iter()
                .map(|u| (u.role.clone(), u.username.clone(), u.privileges))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&dry), shape(&live));
    }

    #[test]
    fn test_sql_failure_is_project_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let (config, audit) = setup(dir.path());
        let server = FakeServer {
            fail_statement_containing: Some("GRANT ALL PRIVILEGES ON billing_prod"),
            ..FakeServer::default()
        };

        let report =
            provision(&manifest(), &config, &RunOptions::default(), &server, &audit).unwrap();

        let billing = &report.results[0];
        assert!(!billing.succeeded);
        assert!(billing.partially_applied);
        assert!(billing.detail.contains("inspect server state"));
        assert!(!billing.detail.contains(billing.users[0].password.expose()));

        // Credentials may be live, so the files are still written.
        assert!(config.output.dir.join("Billing_Prod").exists());

        assert!(report.results[2].succeeded);
        assert_eq!(report.connection_failures, 0);
    }

    #[test]
    fn test_preflight_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let (config, audit) = setup(dir.path());
        let server = FakeServer {
            refuse: true,
            ..FakeServer::default()
        };

        let err =
            provision(&manifest(), &config, &RunOptions::default(), &server, &audit).unwrap_err();

        assert!(err.to_string().contains("admin credentials"));
        assert!(!config.output.dir.exists());
    }

    #[test]
    fn test_empty_passphrase_rejected_before_any_sql() {
        let dir = tempfile::tempdir().unwrap();
        let (config, audit) = setup(dir.path());
        let server = FakeServer::default();
        let options = RunOptions {
            dryrun: false,
            passphrase: Some(String::new()),
        };

        let err = provision(&manifest(), &config, &options, &server, &audit).unwrap_err();

        assert!(err.to_string().contains("master report passphrase is empty"));
        assert_eq!(server.connects.get(), 0);
        assert!(server.executed.borrow().is_empty());
        assert!(!config.output.dir.exists());
    }

    #[test]
    fn test_connection_failure_after_preflight_is_project_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let (config, audit) = setup(dir.path());
        // 0 is the preflight, 1 is Billing, 2 is Crm
        let server = FakeServer {
            refuse_attempt: Some(1),
            ..FakeServer::default()
        };

        let report =
            provision(&manifest(), &config, &RunOptions::default(), &server, &audit).unwrap();

        let billing = &report.results[0];
        assert!(!billing.succeeded);
        assert!(!billing.partially_applied);
        assert!(billing.detail.contains("connection refused"));
        assert!(!config.output.dir.join("Billing_Prod").exists());

        let crm = &report.results[2];
        assert!(crm.succeeded);
        assert!(config.output.dir.join("Crm_Dev").join(".env").exists());

        assert_eq!(report.connection_failures, 1);
        assert_eq!(report.status(), RunStatus::Partial);
        // preflight + Crm (5)
        assert_eq!(server.executed.borrow().len(), 1 + 5);

        let master = fs::read_to_string(report.master_report.unwrap()).unwrap();
        assert!(!master.contains("billing_prod"));
        assert!(master.contains("crm_dev_app"));

        let log = fs::read_to_string(&config.output.audit_log).unwrap();
        assert!(log.contains("ERROR - row 1: Billing [Prod]: could not connect"));
        assert!(log.contains("1 project(s) could not connect to localhost:3306"));
    }

    #[test]
    fn test_artifact_write_failure_is_project_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let (config, audit) = setup(dir.path());
        let server = FakeServer {
            occupy: Some(config.output.dir.join("Billing_Prod")),
            ..FakeServer::default()
        };

        let report =
            provision(&manifest(), &config, &RunOptions::default(), &server, &audit).unwrap();

        let billing = &report.results[0];
        assert!(!billing.succeeded);
        assert!(billing.partially_applied);
        assert!(billing.detail.contains("configured on localhost:3306"));
        assert!(billing.detail.contains("could not write project files"));
        assert!(config.output.dir.join("Billing_Prod").is_file());

        assert!(report.results[2].succeeded);
        assert!(config.output.dir.join("Crm_Dev").join(".env").exists());

        // The accounts exist on the server, so their passwords are still reported.
        let master = fs::read_to_string(report.master_report.unwrap()).unwrap();
        assert_eq!(master.lines().count(), 1 + 3);
        assert!(master.contains(billing.users[0].password.expose()));

        let log = fs::read_to_string(&config.output.audit_log).unwrap();
        assert!(log.contains("ERROR - row 1: Billing [Prod]: configured on"));
        assert!(log.contains("could not write project files"));
        assert!(log.contains("run finished: 3 row(s), 2 failed"));
    }

    #[test]
    fn test_duplicate_project_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (config, audit) = setup(dir.path());
        let text = indoc! {"
            Project_Name,Environment,Roles
            Billing,Prod,dbo
            billing,PROD,read
        "};
        let manifest = Manifest::from_reader(text.as_bytes()).unwrap();
        let options = RunOptions {
            dryrun: true,
            passphrase: None,
        };

        let report =
            provision(&manifest, &config, &options, &FakeServer::default(), &audit).unwrap();

        assert!(report.results[0].succeeded);
        assert!(!report.results[1].succeeded);
        assert!(report.results[1].detail.contains("duplicate"));
    }

    #[test]
    fn test_empty_manifest_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (config, audit) = setup(dir.path());
        let manifest = Manifest::from_reader("Project_Name,Environment,Roles\n".as_bytes()).unwrap();
        let options = RunOptions {
            dryrun: true,
            passphrase: None,
        };

        let report =
            provision(&manifest, &config, &options, &FakeServer::default(), &audit).unwrap();

        assert_eq!(report.status(), RunStatus::Success);
        assert!(report.master_report.is_none());
    }
}
