//! Archive file source
//!
//! An archive is a sequence of length-prefixed bincode timeslices.

use std::path::{Path, PathBuf};

use contracts::{wire, ContractError, Timeslice, TimesliceSource};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, instrument};

/// Reads timeslices from one archive file
pub struct ArchiveSource {
    name: String,
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl ArchiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("archive:{}", path.display()),
            path,
            reader: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TimesliceSource for ArchiveSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "archive_connect", skip(self), fields(path = %self.path.display()))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| ContractError::source(&self.name, format!("cannot open: {e}")))?;
        self.reader = Some(BufReader::new(file));
        debug!(source = %self.name, "archive opened");
        Ok(())
    }

    async fn next_timeslice(&mut self) -> Result<Option<Timeslice>, ContractError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| ContractError::source(&self.name, "archive not opened"))?;

        match wire::read_frame(reader).await? {
            Some(frame) => Ok(Some(wire::decode_timeslice(&frame)?)),
            None => Ok(None),
        }
    }
}

/// Files in `dir` matching the wildcard `pattern`, sorted by path
pub fn resolve_file_set(dir: &str, pattern: &str) -> Result<Vec<PathBuf>, ContractError> {
    let full = Path::new(dir).join(pattern).to_string_lossy().into_owned();
    let paths = glob::glob(&full).map_err(|e| {
        ContractError::source(&full, format!("invalid wildcard pattern: {e}"))
    })?;

    let mut files: Vec<PathBuf> = paths
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ContractError::source(&full, "no file matches the pattern"));
    }
    Ok(files)
}

/// Write timeslices as an archive file
pub async fn write_archive(path: &Path, timeslices: &[Timeslice]) -> Result<(), ContractError> {
    let file = File::create(path).await?;
    let mut writer = BufWriter::new(file);
    for ts in timeslices {
        let payload = wire::encode_timeslice(ts)?;
        wire::write_frame(&mut writer, &payload).await?;
    }
    writer.flush().await?;
    Ok(())
}
