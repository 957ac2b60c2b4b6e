use std::fs::write;
use std::str::FromStr;

use camino::Utf8PathBuf;
use clap::Parser;
use eyre::{Result as EyreResult, WrapErr};
use merklesync_primitives::block::BlockId;

use crate::cli::RootArgs;
use crate::output::Output;

/// Generate a proof bundle for one or more blocks
#[derive(Debug, Parser)]
pub struct ProveCommand {
    /// Blocks to prove
    #[clap(value_name = "ID", required = true, value_parser = BlockId::from_str)]
    pub ids: Vec<BlockId>,

    /// Write the bundle to this file instead of stdout
    #[clap(long, value_name = "FILE")]
    pub out: Option<Utf8PathBuf>,
}

impl ProveCommand {
    pub fn run(self, root_args: &RootArgs, output: &Output) -> EyreResult<()> {
        let service = root_args.open_service()?;
        let bundle = service.prove_bundle(&self.ids)?;

        let Some(path) = self.out else {
            println!("{}", serde_json::to_string_pretty(&bundle)?);
            return Ok(());
        };

        write(&path, serde_json::to_vec_pretty(&bundle)?)
            .wrap_err_with(|| format!("failed to write proof bundle to {path:?}"))?;

        output.write(&bundle);

        Ok(())
    }
}
