use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

/// Route tracing output to a file inside the history directory. The
/// terminal itself belongs to the TUI, so nothing may write to stderr.
pub fn init(dir: &Path) -> Result<()> {
    let path = dir.join("charla.log");
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("could not open log file at {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .init();

    Ok(())
}
