use std::path::PathBuf;
use structopt::StructOpt;

/// Provision MySQL databases, service accounts and least-privilege grants from a
/// project manifest
#[derive(Debug, StructOpt)]
pub struct Cli {
    #[structopt(subcommand)]
    pub cmd: Command,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Provision every project in the manifest
    Apply {
        /// The manifest (CSV with Project_Name, Environment, Roles columns)
        #[structopt(short, long, parse(from_os_str))]
        file: PathBuf,

        /// The config file (connection and output settings)
        #[structopt(short, long, parse(from_os_str))]
        config: Option<PathBuf>,

        /// Dry run, build everything but send nothing to the server
        #[structopt(short, long)]
        dryrun: bool,

        /// Output directory, overrides `output.dir`. Wiped at the start of the run
        #[structopt(short, long, parse(from_os_str))]
        out: Option<PathBuf>,

        /// Audit log file, overrides `output.audit_log`
        #[structopt(long, parse(from_os_str))]
        audit_log: Option<PathBuf>,

        /// Encrypt the master report into an AES zip with this passphrase
        #[structopt(long, env = "PROVISION_REPORT_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,
    },

    /// Validate a manifest without touching the server
    Validate {
        /// The manifest to check
        #[structopt(short, long, parse(from_os_str))]
        file: PathBuf,
    },

    /// Generate random password
    GenPass {
        /// The password length
        #[structopt(short, long, default_value = "20")]
        length: usize,
    },

    /// Test the admin connection
    Ping {
        /// The config file (connection settings)
        #[structopt(short, long, parse(from_os_str))]
        config: Option<PathBuf>,
    },
}

// Parse the command line arguments
pub fn parse() -> Cli {
    Cli::from_args()
}
