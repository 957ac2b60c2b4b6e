use std::fs::create_dir_all;

use clap::Parser;
use eyre::{bail, Result as EyreResult, WrapErr};
use merklesync_config::{ConfigFile, JournalConfig};
use merklesync_service::journal::Journal;
use merklesync_service::{ServiceConfig, DEFAULT_MAX_PROOF_LEAVES};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::RootArgs;
use crate::output::{InfoLine, Output, Report};

/// Initialize node configuration
#[derive(Debug, Parser)]
pub struct InitCommand {
    /// Largest number of leaves a single proof may cover
    #[clap(long, value_name = "COUNT")]
    #[clap(default_value_t = DEFAULT_MAX_PROOF_LEAVES)]
    pub max_proof_leaves: usize,

    /// Force initialization even if the directory already exists
    #[clap(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct Initialized {
    home: String,
    journal: String,
}

impl Report for Initialized {
    fn report(&self) {
        InfoLine(&format!("Initialized node in {}", self.home)).report();
        InfoLine(&format!("Block journal at {}", self.journal)).report();
    }
}

impl InitCommand {
    pub fn run(self, root_args: &RootArgs, output: &Output) -> EyreResult<()> {
        let path = &root_args.home;

        if !path.exists() {
            create_dir_all(path)
                .wrap_err_with(|| format!("failed to create directory {path:?}"))?;
        }

        if ConfigFile::exists(path) {
            if let Err(err) = ConfigFile::load(path) {
                if self.force {
                    warn!("Failed to load existing configuration, overwriting: {err}");
                } else {
                    bail!("Failed to load existing configuration: {err}");
                }
            }

            if !self.force {
                bail!("Node is already initialized in {path:?}");
            }
        }

        if self.max_proof_leaves == 0 {
            bail!("--max-proof-leaves must be at least 1");
        }

        let config = ConfigFile::new(
            ServiceConfig::new(self.max_proof_leaves),
            JournalConfig::default(),
        );

        config.save(path)?;

        let journal = Journal::open(config.journal_path(path))?;

        info!(home = %path, journal = %journal.path(), "Initialized node");

        output.write(&Initialized {
            home: path.to_string(),
            journal: journal.path().to_string(),
        });

        Ok(())
    }
}
