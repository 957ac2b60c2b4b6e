use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table};
use const_format::concatcp;
use eyre::{bail, Report as EyreReport, Result as EyreResult, WrapErr};
use merklesync_config::ConfigFile;
use merklesync_service::journal::Journal;
use merklesync_service::MerkleService;
use serde::{Serialize, Serializer};
use thiserror::Error as ThisError;

use crate::defaults;
use crate::output::{Format, Output, Report};

mod diff;
mod init;
mod prove;
mod root;
mod submit;
mod verify;

use diff::DiffCommand;
use init::InitCommand;
use prove::ProveCommand;
use root::RootInfoCommand;
use submit::SubmitCommand;
use verify::VerifyCommand;

pub const EXAMPLES: &str = r"
  # Initialize a node home
  $ merklesync --home data/ init

  # Record a block
  $ merklesync --home data/ submit --id 1 --table orders --data 'hello'

  # Show the current root
  $ merklesync --home data/ root --table orders

  # Prove two blocks and verify the bundle elsewhere
  $ merklesync --home data/ prove 1 2 --out bundle.json
  $ merklesync verify bundle.json --root <ROOT_HASH>

  # Compare against a peer's journal
  $ merklesync --home data/ diff peer/blocks.jsonl
";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = concatcp!(
    "Environment variables:\n",
    "  MERKLESYNC_HOME    Directory for config and data\n\n",
    "Examples:",
    EXAMPLES
))]
pub struct RootCommand {
    #[command(flatten)]
    pub args: RootArgs,

    #[command(subcommand)]
    pub action: SubCommands,
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    Init(InitCommand),
    #[command(alias = "put")]
    Submit(SubmitCommand),
    Root(RootInfoCommand),
    Prove(ProveCommand),
    Verify(VerifyCommand),
    Diff(DiffCommand),
}

#[derive(Debug, Parser)]
pub struct RootArgs {
    /// Directory for config and data
    #[arg(long, value_name = "PATH", default_value_t = defaults::default_node_dir())]
    #[arg(env = "MERKLESYNC_HOME", hide_env_values = true)]
    pub home: Utf8PathBuf,

    #[arg(long, value_name = "FORMAT", default_value_t, value_enum)]
    pub output_format: Format,
}

impl RootArgs {
    /// Open the service for the node at `home`, replaying its journal.
    pub fn open_service(&self) -> EyreResult<MerkleService> {
        if !ConfigFile::exists(&self.home) {
            bail!(
                "Node is not initialized in {:?}, run `merklesync init` first",
                self.home
            );
        }

        let config = ConfigFile::load(&self.home)?;
        let path = config.journal_path(&self.home);

        let journal = Journal::open(path.clone())
            .wrap_err_with(|| format!("failed to open block journal {path:?}"))?;

        MerkleService::open(config.server, journal)
            .wrap_err_with(|| format!("failed to replay block journal {path:?}"))
    }
}

impl RootCommand {
    pub fn run(self) -> Result<(), CliError> {
        let output = Output::new(self.args.output_format);

        let result = match self.action {
            SubCommands::Init(init) => init.run(&self.args, &output),
            SubCommands::Submit(submit) => submit.run(&self.args, &output),
            SubCommands::Root(root) => root.run(&self.args, &output),
            SubCommands::Prove(prove) => prove.run(&self.args, &output),
            SubCommands::Verify(verify) => verify.run(&output),
            SubCommands::Diff(diff) => diff.run(&self.args, &output),
        };

        if let Err(err) = result {
            let err = match err.downcast::<ProofRejected>() {
                Ok(err) => CliError::ProofRejected(err),
                Err(err) => CliError::Other(err),
            };

            output.write(&err);
            return Err(err);
        }

        Ok(())
    }
}

/// A well-formed proof that does not lead to the trusted root.
#[derive(Debug, Serialize, ThisError)]
#[error("proof does not match root {root_hash}")]
pub struct ProofRejected {
    pub root_hash: String,
}

#[derive(Debug, Serialize, ThisError)]
pub enum CliError {
    #[error(transparent)]
    ProofRejected(#[from] ProofRejected),

    #[error(transparent)]
    Other(
        #[from]
        #[serde(serialize_with = "serialize_eyre_report")]
        EyreReport,
    ),
}

impl From<CliError> for ExitCode {
    fn from(error: CliError) -> Self {
        match error {
            CliError::ProofRejected(_) => Self::from(2),
            CliError::Other(_) => Self::FAILURE,
        }
    }
}

impl Report for CliError {
    fn report(&self) {
        let mut table = Table::new();
        let _ = table.set_header(vec![Cell::new("ERROR").fg(Color::Red)]);
        let _ = table.add_row(vec![match self {
            Self::ProofRejected(err) => format!("Rejected: {err}"),
            Self::Other(err) => format!("Error: {err:?}"),
        }]);
        println!("{table}");
    }
}

fn serialize_eyre_report<S>(report: &EyreReport, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(report.chain().map(ToString::to_string))
}
