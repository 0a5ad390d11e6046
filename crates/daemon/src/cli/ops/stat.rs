use std::fmt;

use clap::Args;
use time::format_description::well_known::Rfc3339;

use pathfs_daemon::{FileRecord, FsError};

use crate::cli::op::{Op, OpContext};

#[derive(Args, Debug, Clone)]
pub struct Stat {
    /// Path inside the filesystem, e.g. /docs/a.txt
    pub path: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug)]
pub enum StatOutput {
    Json(String),
    Text(Box<FileRecord>),
}

fn timestamp(t: &time::OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.to_string())
}

impl fmt::Display for StatOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = match self {
            StatOutput::Json(json) => return write!(f, "{json}"),
            StatOutput::Text(record) => record,
        };

        writeln!(f, "  Path: {}", record.path)?;
        writeln!(f, "  Kind: {}", record.kind)?;
        writeln!(f, "  Size: {}", record.size)?;
        writeln!(
            f,
            "  Mode: {:o}  Links: {}  Uid: {}  Gid: {}",
            record.mode, record.nlink, record.uid, record.gid
        )?;
        if let Some(target_id) = record.target_id {
            writeln!(f, "Target: record {}", target_id)?;
        }
        writeln!(f, "Access: {}", timestamp(&record.atime))?;
        writeln!(f, "Modify: {}", timestamp(&record.mtime))?;
        writeln!(f, "Change: {}", timestamp(&record.ctime))?;
        write!(f, " Birth: {}", timestamp(&record.created_at))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl Op for Stat {
    type Error = StatError;
    type Output = StatOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let translator = ctx.translator().await?;
        let record = translator.getattr(&self.path).await?;

        if self.json {
            return Ok(StatOutput::Json(serde_json::to_string_pretty(&record)?));
        }
        Ok(StatOutput::Text(Box::new(record)))
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stat {}", self.path)
    }
}
