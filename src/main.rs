use anyhow::Result;
use env_logger::Env;
use log::info;
use provision::apply::{self, RunOptions, RunStatus};
use provision::cli::{self, Command};
use provision::config::Config;
use provision::connection::DbConnection;
use provision::gen::gen_password;
use provision::validate::validate_file;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match cli::parse().cmd {
        Command::Apply {
            file,
            config,
            dryrun,
            out,
            audit_log,
            passphrase,
        } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(out) = out {
                config.output.dir = out;
            }
            if let Some(audit_log) = audit_log {
                config.output.audit_log = audit_log;
            }
            config.validate()?;

            let options = RunOptions { dryrun, passphrase };
            options.validate()?;
            let report = apply::apply(&file, &config, &options)?;

            if report.status() == RunStatus::Partial {
                eprintln!(
                    "{} of {} row(s) failed, see the audit log {}",
                    report.failed(),
                    report.results.len(),
                    config.output.audit_log.display()
                );
                std::process::exit(2);
            }
        }

        Command::Validate { file } => {
            validate_file(&file)?;
        }

        Command::GenPass { length } => {
            let password = gen_password(length)?;
            println!("Generated password: {}", password.expose());
        }

        Command::Ping { config } => {
            let config = Config::load(config.as_deref())?;
            let mut conn = DbConnection::connect(&config.connection)?;
            conn.ping()?;
            info!(
                "Connected to {} as {} successfully",
                conn.address(),
                config.connection.user
            );
        }
    }

    Ok(())
}
