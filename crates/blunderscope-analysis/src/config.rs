//! Operational settings loaded from JSON.
//!
//! Only knobs that do not change results live here; clustering and model
//! hyperparameters are constants.
//!
//! ```
//! use blunderscope_analysis::config::AnalysisSettings;
//!
//! let settings: AnalysisSettings = serde_json::from_str(
//!     r#"{ "engine": { "movetime_ms": 500 }, "pipeline": { "feedback_retry": { "max_attempts": 5 } } }"#,
//! )
//! .unwrap();
//! assert_eq!(settings.engine.program, "stockfish");
//! assert_eq!(settings.pipeline.feedback_retry.max_attempts, 5);
//! assert_eq!(settings.pipeline.feedback_retry.initial_backoff_ms, 1000);
//! ```

use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use blunderscope_evaluator::uci::UciEngineConfig;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("failed to open settings file {}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[display("failed to parse settings file {}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub feedback_retry: RetryPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub engine: UciEngineConfig,
    pub pipeline: PipelineConfig,
}

impl AnalysisSettings {
    pub fn from_json_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Open {
            path: path.to_owned(),
            source,
        })?;
        let settings = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            ConfigError::Parse {
                path: path.to_owned(),
                source,
            }
        })?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }
}
