use std::fs::read_to_string;

use camino::Utf8PathBuf;
use clap::Parser;
use eyre::{Result as EyreResult, WrapErr};
use merklesync_merkle::{Hash, ProofBundle};
use serde::Serialize;

use crate::cli::ProofRejected;
use crate::output::{InfoLine, Output, Report};

/// Verify a proof bundle
#[derive(Debug, Parser)]
pub struct VerifyCommand {
    /// Bundle produced by `prove`
    #[clap(value_name = "BUNDLE")]
    pub bundle: Utf8PathBuf,

    /// Trusted root to check against instead of the one in the bundle
    #[clap(long, value_name = "HASH")]
    pub root: Option<Hash>,
}

#[derive(Debug, Serialize)]
struct Verified {
    root_hash: Hash,
    leaves: usize,
}

impl Report for Verified {
    fn report(&self) {
        InfoLine(&format!(
            "Proof of {} leaves is valid for root {}",
            self.leaves, self.root_hash
        ))
        .report();
    }
}

impl VerifyCommand {
    pub fn run(self, output: &Output) -> EyreResult<()> {
        let content = read_to_string(&self.bundle)
            .wrap_err_with(|| format!("failed to read proof bundle {:?}", self.bundle))?;

        let bundle: ProofBundle = serde_json::from_str(&content)
            .wrap_err_with(|| format!("invalid proof bundle {:?}", self.bundle))?;

        let root_hash = self.root.unwrap_or(bundle.root_hash);

        let valid = bundle
            .verify_against(&root_hash)
            .wrap_err("proof bundle is malformed")?;

        if !valid {
            return Err(ProofRejected {
                root_hash: root_hash.to_string(),
            }
            .into());
        }

        output.write(&Verified {
            root_hash,
            leaves: bundle.leaves.len(),
        });

        Ok(())
    }
}
