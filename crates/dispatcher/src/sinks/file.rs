//! FileSink - a JSON record and an annotated PNG per snapshot
//!
//! Layout under `base_path`, both named by snapshot sequence:
//! - `records/{sequence}.json`
//! - `frames/{sequence}.png`, only with `annotate` on

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{AnalysisSnapshot, ContractError, ResultSink};
use tracing::{debug, instrument, warn};

use super::annotate::annotate_frame;
use super::param;

#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    pub base_path: PathBuf,
    /// Render track overlays into `frames/`
    pub annotate: bool,
}

impl FileSinkConfig {
    /// Read `base_path` (default `./output`) and `annotate` (default on)
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ContractError> {
        Ok(Self {
            base_path: param(params, "base_path")?.unwrap_or_else(|| PathBuf::from("./output")),
            annotate: param(params, "annotate")?.unwrap_or(true),
        })
    }
}

pub struct FileSink {
    name: String,
    base_path: PathBuf,
    records_dir: PathBuf,
    /// `None` when annotation is off
    frames_dir: Option<PathBuf>,
}

impl FileSink {
    /// Create the output directories up front so a bad path fails at startup
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> io::Result<Self> {
        let records_dir = config.base_path.join("records");
        fs::create_dir_all(&records_dir)?;

        let frames_dir = if config.annotate {
            let dir = config.base_path.join("frames");
            fs::create_dir_all(&dir)?;
            Some(dir)
        } else {
            None
        };

        Ok(Self {
            name: name.into(),
            base_path: config.base_path,
            records_dir,
            frames_dir,
        })
    }

    /// Build from a blueprint sink's params
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let config = FileSinkConfig::from_params(params)?;
        Ok(Self::new(name, config)?)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn save_record(&self, snapshot: &AnalysisSnapshot) -> io::Result<()> {
        let path = self.records_dir.join(format!("{}.json", snapshot.sequence));
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &snapshot.to_record())?;
        writer.flush()
    }

    fn save_frame(&self, dir: &Path, snapshot: &AnalysisSnapshot) -> io::Result<()> {
        match annotate_frame(snapshot) {
            Some(image) => image
                .save(dir.join(format!("{}.png", snapshot.sequence)))
                .map_err(io::Error::other),
            None => {
                warn!(
                    sink = %self.name,
                    sequence = snapshot.sequence,
                    "pixel buffer does not match the frame size, frame skipped"
                );
                Ok(())
            }
        }
    }
}

impl ResultSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, snapshot),
        fields(sink = %self.name, sequence = snapshot.sequence)
    )]
    async fn write(&mut self, snapshot: &AnalysisSnapshot) -> Result<(), ContractError> {
        self.save_record(snapshot)
            .and_then(|()| match &self.frames_dir {
                Some(dir) => self.save_frame(dir, snapshot),
                None => Ok(()),
            })
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, path = %self.base_path.display(), "FileSink closed");
        Ok(())
    }
}
