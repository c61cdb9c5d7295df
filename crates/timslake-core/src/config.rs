use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{LakeError, Result};
use crate::layout::{LakeLayout, LAKE_DIR};
use crate::retention::DEFAULT_WINDOW;

const LAST_RUN_FILE: &str = "last_run.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LakeConfig {
    pub root: PathBuf,
    pub retention_window: usize,
    pub last_run_file: PathBuf,
}

/// On-disk shape; every key is optional and falls back to the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LakeConfigFile {
    root: Option<PathBuf>,
    retention_window: Option<usize>,
    last_run_file: Option<PathBuf>,
}

impl LakeConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            last_run_file: default_last_run_file(&root),
            retention_window: DEFAULT_WINDOW,
            root,
        }
    }

    pub fn from_toml_str(raw: &str, base: &Path) -> Result<Self> {
        let file: LakeConfigFile = toml::from_str(raw)?;
        let root = file.root.unwrap_or_else(|| base.to_path_buf());
        let mut config = Self::new(root);
        if let Some(window) = file.retention_window {
            config.retention_window = window;
        }
        if let Some(last_run) = file.last_run_file {
            config.last_run_file = last_run;
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file. Without a `root` key the file's directory is used.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| LakeError::io(path, source))?;
        let base = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&raw, base)
    }

    /// Moves the root and, unless it was set explicitly, the last-run file with it.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if self.last_run_file == default_last_run_file(&self.root) {
            self.last_run_file = default_last_run_file(&root);
        }
        self.root = root;
        self
    }

    pub fn with_retention_window(mut self, window: usize) -> Self {
        self.retention_window = window;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(LakeError::Config("root path cannot be empty".into()));
        }
        if self.last_run_file.as_os_str().is_empty() {
            return Err(LakeError::Config("last_run_file cannot be empty".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> LakeLayout {
        LakeLayout::new(&self.root)
    }
}

fn default_last_run_file(root: &Path) -> PathBuf {
    root.join(LAKE_DIR).join(LAST_RUN_FILE)
}
