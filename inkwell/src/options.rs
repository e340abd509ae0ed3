use std::path::{Path, PathBuf};

use pulldown_cmark::Options;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid parser options: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Markdown extensions consulted before each parse.
///
/// Changing options while a parse is running is not supported; the parser
/// copies them when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    pub tables: bool,
    pub strikethrough: bool,
    pub task_lists: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            tables: true,
            strikethrough: true,
            task_lists: true,
        }
    }
}

/// On-disk shape of an options file. `github_extensions` is applied first so
/// the individual toggles can override it.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct OptionsFile {
    github_extensions: Option<bool>,
    tables: Option<bool>,
    strikethrough: Option<bool>,
    task_lists: Option<bool>,
}

impl ParserOptions {
    /// Everything off: plain CommonMark.
    pub fn commonmark() -> Self {
        ParserOptions {
            tables: false,
            strikethrough: false,
            task_lists: false,
        }
    }

    pub fn enable_tables(&mut self, enable: bool) -> &mut Self {
        self.tables = enable;
        self
    }

    pub fn enable_strikethrough(&mut self, enable: bool) -> &mut Self {
        self.strikethrough = enable;
        self
    }

    /// Toggle the GitHub bundle: tables, strikethrough and task lists.
    pub fn enable_github_extensions(&mut self, enable: bool) -> &mut Self {
        self.tables = enable;
        self.strikethrough = enable;
        self.task_lists = enable;
        self
    }

    pub fn github_extensions(&self) -> bool {
        self.tables && self.strikethrough && self.task_lists
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: OptionsFile = toml::from_str(source)?;
        let mut options = ParserOptions::default();
        if let Some(gfm) = file.github_extensions {
            options.enable_github_extensions(gfm);
        }
        if let Some(tables) = file.tables {
            options.tables = tables;
        }
        if let Some(strikethrough) = file.strikethrough {
            options.strikethrough = strikethrough;
        }
        if let Some(task_lists) = file.task_lists {
            options.task_lists = task_lists;
        }
        Ok(options)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub(crate) fn to_cmark(self) -> Options {
        let mut options = Options::empty();
        if self.tables {
            options.insert(Options::ENABLE_TABLES);
        }
        if self.strikethrough {
            options.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.task_lists {
            options.insert(Options::ENABLE_TASKLISTS);
        }
        options
    }
}
