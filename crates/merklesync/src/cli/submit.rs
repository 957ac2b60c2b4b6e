use std::fs::read;
use std::str::FromStr;

use camino::Utf8PathBuf;
use chrono::Utc;
use clap::Parser;
use eyre::{Result as EyreResult, WrapErr};
use merklesync_primitives::block::{BlockId, DataBlock};

use crate::cli::RootArgs;
use crate::output::Output;

/// Record a data block and rebuild the tree
#[derive(Debug, Parser)]
pub struct SubmitCommand {
    /// Unique identifier of the block
    #[clap(long, value_name = "ID", value_parser = BlockId::from_str)]
    pub id: BlockId,

    /// Source table of the block
    #[clap(long, value_name = "TABLE", default_value = "")]
    pub table: String,

    /// Change operation that produced the block
    #[clap(long, value_name = "OP", default_value = "")]
    pub operation: String,

    /// Metadata entry, used as the payload when none is given
    #[clap(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,

    /// Payload as a UTF-8 string
    #[clap(long, value_name = "DATA", conflicts_with = "file")]
    pub data: Option<String>,

    /// Read the payload from a file
    #[clap(long, value_name = "PATH")]
    pub file: Option<Utf8PathBuf>,
}

fn parse_key_value(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got {input:?}")),
    }
}

impl SubmitCommand {
    pub fn run(self, root_args: &RootArgs, output: &Output) -> EyreResult<()> {
        let payload = match (self.data, &self.file) {
            (Some(data), _) => data.into_bytes(),
            (None, Some(path)) => {
                read(path).wrap_err_with(|| format!("failed to read payload from {path:?}"))?
            }
            (None, None) => Vec::new(),
        };

        let block = self
            .metadata
            .into_iter()
            .fold(DataBlock::new(self.id, payload), |block, (key, value)| {
                block.with_metadata(key, value)
            })
            .with_table(self.table)
            .with_operation(self.operation)
            .with_timestamp(Utc::now().timestamp());

        let service = root_args.open_service()?;

        output.write(&service.submit(block)?);

        Ok(())
    }
}
