use camino::Utf8PathBuf;
use clap::Parser;
use eyre::{Result as EyreResult, WrapErr};
use merklesync_merkle::MerkleTree;
use merklesync_service::journal::read_blocks;

use crate::cli::RootArgs;
use crate::output::Output;

/// Compare the local tree against one rebuilt from another journal
#[derive(Debug, Parser)]
pub struct DiffCommand {
    /// Block journal of the remote side
    #[clap(value_name = "JOURNAL")]
    pub journal: Utf8PathBuf,
}

impl DiffCommand {
    pub fn run(self, root_args: &RootArgs, output: &Output) -> EyreResult<()> {
        let service = root_args.open_service()?;

        let blocks = read_blocks(&self.journal)
            .wrap_err_with(|| format!("failed to load remote journal {:?}", self.journal))?;
        let remote = MerkleTree::from_blocks(&blocks);

        output.write(&service.diff(&remote));

        Ok(())
    }
}
