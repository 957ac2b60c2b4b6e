use clap::ValueEnum;
use color_eyre::owo_colors::OwoColorize;
use comfy_table::{Cell, Color, Table};
use merklesync_merkle::{DiffSide, ProofBundle, TreeDiff};
use merklesync_service::{RootInfo, SubmitReceipt};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum Format {
    Json,
    #[default]
    PlainText,
}

#[derive(Debug, Default)]
pub struct Output {
    format: Format,
}

pub trait Report {
    fn report(&self);
}

impl Output {
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    pub fn write<T: Serialize + Report>(&self, value: &T) {
        match self.format {
            Format::Json => match serde_json::to_string(&value) {
                Ok(json) => println!("{json}"),
                Err(err) => eprintln!("Failed to serialize to JSON: {err}"),
            },
            Format::PlainText => value.report(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct InfoLine<'a>(pub &'a str);

impl Report for InfoLine<'_> {
    fn report(&self) {
        println!("{} {}", "[INFO]".green(), self.0);
    }
}

fn header(table: &mut Table, columns: &[&str]) {
    let _ = table.set_header(
        columns
            .iter()
            .map(|column| Cell::new(column).fg(Color::Blue))
            .collect::<Vec<_>>(),
    );
}

fn or_none<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "<none>".to_owned(), |value| value.to_string())
}

impl Report for SubmitReceipt {
    fn report(&self) {
        let mut table = Table::new();
        header(&mut table, &["Root Hash", "Leaf Hash", "Leaves"]);
        let _ = table.add_row(vec![
            self.root_hash.to_string(),
            self.leaf_hash.to_string(),
            self.leaf_count.to_string(),
        ]);
        println!("{table}");
    }
}

impl Report for RootInfo {
    fn report(&self) {
        let mut table = Table::new();
        header(
            &mut table,
            &["Root Hash", "Leaves", "Blocks", "Generation", "Built At"],
        );
        let _ = table.add_row(vec![
            or_none(self.root_hash),
            self.leaf_count.to_string(),
            self.block_count.to_string(),
            self.generation.to_string(),
            self.built_at.to_rfc3339(),
        ]);
        println!("{table}");
    }
}

impl Report for ProofBundle {
    fn report(&self) {
        let mut table = Table::new();
        header(&mut table, &["Root Hash", "Leaves", "Levels", "Supplied Hashes"]);
        let _ = table.add_row(vec![
            self.root_hash.to_string(),
            self.leaves.len().to_string(),
            self.proof.levels.len().to_string(),
            self.proof.supplied_count().to_string(),
        ]);
        println!("{table}");

        for leaf in &self.leaves {
            println!("  {}", leaf.id);
        }
    }
}

impl Report for TreeDiff {
    fn report(&self) {
        if self.is_empty() {
            println!("{} Trees are identical", "[INFO]".green());
            return;
        }

        let mut table = Table::new();
        header(&mut table, &["Side", "Position", "Block ID", "Leaf Hash"]);

        for entry in self.entries() {
            let side = match entry.side {
                DiffSide::Local => Cell::new("local").fg(Color::Yellow),
                DiffSide::Remote => Cell::new("remote").fg(Color::Cyan),
            };

            let _ = table.add_row(vec![
                side,
                Cell::new(entry.position),
                Cell::new(&entry.id),
                Cell::new(entry.hash),
            ]);
        }

        println!("{table}");
    }
}
