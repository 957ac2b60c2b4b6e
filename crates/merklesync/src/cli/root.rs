use clap::Parser;
use eyre::Result as EyreResult;

use crate::cli::RootArgs;
use crate::output::Output;

/// Show the current root hash
#[derive(Debug, Parser)]
pub struct RootInfoCommand {
    /// Count only blocks recorded for this table
    #[clap(long, value_name = "TABLE")]
    pub table: Option<String>,
}

impl RootInfoCommand {
    pub fn run(self, root_args: &RootArgs, output: &Output) -> EyreResult<()> {
        let service = root_args.open_service()?;

        output.write(&service.root(self.table.as_deref()));

        Ok(())
    }
}
