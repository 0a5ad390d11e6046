use std::fmt;

use clap::Args;
use comfy_table::Table;

use pathfs_daemon::{FileKind, FileRecord, FsError};

use crate::cli::op::{Op, OpContext};

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Directory to list (defaults to the root)
    #[arg(default_value = "/")]
    pub dir: String,
}

#[derive(Debug)]
pub struct LsOutput {
    pub items: Vec<(String, FileRecord)>,
}

impl fmt::Display for LsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return write!(f, "No items found");
        }

        let mut table = Table::new();
        table.set_header(vec!["TYPE", "MODE", "LINKS", "SIZE", "NAME"]);
        for (name, record) in &self.items {
            let name = match record.kind {
                FileKind::Directory => format!("{name}/"),
                _ => name.clone(),
            };
            table.add_row(vec![
                record.kind.to_string(),
                format!("{:o}", record.permissions()),
                record.nlink.to_string(),
                record.size.to_string(),
                name,
            ]);
        }
        write!(f, "{table}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Fs(#[from] FsError),
}

#[async_trait::async_trait]
impl Op for Ls {
    type Error = LsError;
    type Output = LsOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let translator = ctx.translator().await?;
        let entries = translator.readdir(&self.dir).await?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.name == "." || entry.name == ".." {
                continue;
            }
            let record = translator.getattr(&entry.path).await?;
            items.push((entry.name, record));
        }

        Ok(LsOutput { items })
    }
}

impl fmt::Display for Ls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ls {}", self.dir)
    }
}
