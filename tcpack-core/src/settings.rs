use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::{normalize_extension, Extensions};
use crate::error::Result;

/// Engine configuration shared by every operation.
///
/// Loaded from a JSON file when the caller has one; any missing field takes
/// its default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input_extension: String,
    pub output_extension: String,
    pub include_input: bool,
    pub include_output: bool,
    /// Explicit problem name; overrides the inferred/declared one.
    pub problem_name: Option<String>,
    /// Where archives (and unpacked problems) are written.
    pub output_dir: PathBuf,
    /// Minimum delay between two forwarded progress reports.
    pub progress_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_extension: "inp".to_string(),
            output_extension: "out".to_string(),
            include_input: true,
            include_output: true,
            problem_name: None,
            output_dir: PathBuf::from("output").join("formatter"),
            progress_interval_ms: 200,
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&text).map_err(std::io::Error::from)?;
        Ok(settings.normalized())
    }

    /// Trim and lowercase extensions, trim the problem name (empty → none).
    pub fn normalized(mut self) -> Self {
        self.input_extension = normalize_extension(&self.input_extension);
        self.output_extension = normalize_extension(&self.output_extension);
        self.problem_name = self
            .problem_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self
    }

    pub fn extensions(&self) -> Extensions {
        Extensions::new(&self.input_extension, &self.output_extension)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}
