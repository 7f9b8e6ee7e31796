//! Runs a project batch against a server, or pretends to.
//!
//! Statements run one by one in batch order and a single `COMMIT` follows the last one.
//! MySQL commits DDL and account statements implicitly, so a failure halfway through
//! leaves everything before it in place: the engine does not undo earlier statements.
//! [`ExecutionOutcome::may_be_partially_applied`] reports that case, and callers should
//! treat it as "inspect the server before retrying", never as "nothing happened".
//! Retrying the whole project is safe because every statement is re-runnable.

use crate::batch::SqlBatch;
use crate::connection::Executor;
use crate::error::ProvisionError;
use ansi_term::Colour::{Green, Purple, Red};
use log::{error, info};

#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Dry-run: nothing was sent.
    Simulated { statements: usize },
    Applied { statements: usize },
    /// `applied` statements ran before `error`.
    Failed {
        applied: usize,
        error: ProvisionError,
    },
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, ExecutionOutcome::Failed { .. })
    }

    pub fn may_be_partially_applied(&self) -> bool {
        matches!(self, ExecutionOutcome::Failed { applied, .. } if *applied > 0)
    }

    /// Whether the generated credentials may be live (or would be, for a dry-run).
    pub fn credentials_issued(&self) -> bool {
        self.succeeded() || self.may_be_partially_applied()
    }
}

/// Dry-run: log every statement, send none.
pub fn simulate(batch: &SqlBatch) -> ExecutionOutcome {
    for statement in &batch.statements {
        info!("{}: {}", Purple.paint("Dry-run"), statement);
    }

    ExecutionOutcome::Simulated {
        statements: batch.len(),
    }
}

/// Execute every statement in order on `conn`, then commit once.
pub fn apply<E: Executor>(batch: &SqlBatch, conn: &mut E) -> ExecutionOutcome {
    for (applied, statement) in batch.statements.iter().enumerate() {
        if let Err(message) = conn.execute(&statement.to_sql()) {
            error!("{}: {}", Red.paint("Error"), statement);
            error!("  -> {}: {}", Red.paint("Error details"), message);

            return ExecutionOutcome::Failed {
                applied,
                error: ProvisionError::SqlExecution {
                    statement: statement.to_string(),
                    message,
                },
            };
        }

        info!("{}: {}", Green.paint("Success"), statement);
    }

    if let Err(message) = conn.commit() {
        error!("{}: COMMIT -> {}", Red.paint("Error"), message);

        return ExecutionOutcome::Failed {
            applied: batch.len(),
            error: ProvisionError::SqlExecution {
                statement: "COMMIT".to_string(),
                message,
            },
        };
    }

    ExecutionOutcome::Applied {
        statements: batch.len(),
    }
}
