//! Dataset configuration: YAML schema, validation and compiled process plans.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use mp_table::CompiledExpr;
use serde::Deserialize;

use crate::error::{DatasetError, Result};

/// Number of folds events are split into.
pub const FOLD_COUNT: u64 = 2;

/// Dataset description as written in the YAML config.
///
/// Every field except `merge_command` is required; keys not listed here are
/// ignored so one config file can also drive training.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    /// Directory holding the primary source files.
    pub base_path: PathBuf,
    /// Directories holding friend sources, same file names as `base_path`.
    pub friend_dirs: Vec<PathBuf>,
    /// One alias per friend directory.
    pub friend_aliases: Vec<String>,
    /// Table name inside every source file.
    pub tree_path: String,
    /// Output directory.
    pub output_path: PathBuf,
    /// File name suffix of merged outputs.
    pub output_filename: String,
    /// Integer column used for fold assignment.
    pub event_branch: String,
    /// Name of the injected training weight column.
    pub training_weight_branch: String,
    /// Processes in processing order.
    pub processes: IndexMap<String, ProcessSpec>,
    /// External merge command (e.g. `["hadd", "-f"]`); native merge if absent.
    #[serde(default)]
    pub merge_command: Option<Vec<String>>,
}

/// One physics process.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSpec {
    /// File names relative to every source directory.
    pub files: Vec<String>,
    /// Selection; may reference friend columns as `alias.column`.
    pub cut_string: String,
    /// Training weight formula over primary-source columns.
    pub weight_string: String,
    /// Output table name (class label).
    #[serde(rename = "class")]
    pub class_name: String,
}

/// One source directory: the base (index 0) or a friend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDir {
    /// Position in `[base_path] + friend_dirs`.
    pub index: usize,
    /// Friend alias; `None` for the base.
    pub alias: Option<String>,
    /// Directory path.
    pub dir: PathBuf,
}

impl SourceDir {
    /// Whether this is the primary source.
    pub fn is_base(&self) -> bool {
        self.index == 0
    }

    /// Label for logs and errors.
    pub fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or("base")
    }
}

/// A process with its expressions compiled.
#[derive(Debug, Clone)]
pub struct ProcessPlan {
    /// Process key from the config.
    pub name: String,
    /// Files relative to each source directory.
    pub files: Vec<String>,
    /// Output table name.
    pub class_name: String,
    /// Compiled selection.
    pub cut: CompiledExpr,
    /// Compiled training weight formula.
    pub weight: CompiledExpr,
}

/// Validated config with compiled process plans.
#[derive(Debug, Clone)]
pub struct DatasetPlan {
    /// Raw config.
    pub config: DatasetConfig,
    /// Processes in config order.
    pub processes: Vec<ProcessPlan>,
}

impl DatasetConfig {
    /// Parse a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "load YAML config");
        let bytes = std::fs::read(path)
            .map_err(|source| DatasetError::Io { path: path.to_path_buf(), source })?;
        serde_yaml_ng::from_slice(&bytes)
            .map_err(|source| DatasetError::Yaml { path: path.to_path_buf(), source })
    }

    /// Parse config YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text)
            .map_err(|source| DatasetError::Yaml { path: PathBuf::from("<string>"), source })
    }

    /// Base source followed by friends.
    pub fn sources(&self) -> Vec<SourceDir> {
        std::iter::once(SourceDir { index: 0, alias: None, dir: self.base_path.clone() })
            .chain(self.friend_dirs.iter().zip(&self.friend_aliases).enumerate().map(
                |(i, (dir, alias))| SourceDir {
                    index: i + 1,
                    alias: Some(alias.clone()),
                    dir: dir.clone(),
                },
            ))
            .collect()
    }

    /// Structural checks that need no file access.
    pub fn validate(&self) -> Result<()> {
        if self.friend_aliases.len() != self.friend_dirs.len() {
            return Err(DatasetError::Config(format!(
                "friend_aliases has {} entries but friend_dirs has {}",
                self.friend_aliases.len(),
                self.friend_dirs.len()
            )));
        }
        let mut seen = HashSet::new();
        for alias in &self.friend_aliases {
            if !is_identifier(alias) {
                return Err(DatasetError::Config(format!(
                    "friend alias '{alias}' is not a valid identifier"
                )));
            }
            if !seen.insert(alias.as_str()) {
                return Err(DatasetError::Config(format!("duplicate friend alias '{alias}'")));
            }
        }
        for (key, value) in [
            ("tree_path", &self.tree_path),
            ("output_filename", &self.output_filename),
            ("event_branch", &self.event_branch),
            ("training_weight_branch", &self.training_weight_branch),
        ] {
            if value.trim().is_empty() {
                return Err(DatasetError::Config(format!("'{key}' must not be empty")));
            }
        }
        if self.processes.is_empty() {
            return Err(DatasetError::Config("no processes configured".into()));
        }
        for (name, p) in &self.processes {
            if p.files.is_empty() {
                return Err(DatasetError::Config(format!("process '{name}' lists no files")));
            }
            if p.class_name.trim().is_empty() {
                return Err(DatasetError::Config(format!("process '{name}' has an empty class")));
            }
        }
        if let Some(cmd) = &self.merge_command {
            if cmd.is_empty() || cmd[0].trim().is_empty() {
                return Err(DatasetError::Config("merge_command must name a program".into()));
            }
        }
        Ok(())
    }

    /// Check that every declared file exists in every source directory.
    ///
    /// Each missing path is logged; the error lists all of them.
    pub fn check_source_files(&self) -> Result<()> {
        let mut missing = Vec::new();
        for source in self.sources() {
            for (process, spec) in &self.processes {
                for file in &spec.files {
                    let path = source.dir.join(file);
                    if !path.is_file() {
                        tracing::error!(
                            path = %path.display(),
                            process = %process,
                            source = source.label(),
                            "file does not exist"
                        );
                        missing.push(path);
                    }
                }
            }
        }
        if missing.is_empty() { Ok(()) } else { Err(DatasetError::MissingSourceFiles(missing)) }
    }
}

impl DatasetPlan {
    /// Validate `config` and compile every expression.
    pub fn from_config(config: DatasetConfig) -> Result<Self> {
        config.validate()?;
        let aliases: HashSet<&str> = config.friend_aliases.iter().map(String::as_str).collect();

        let mut processes = Vec::with_capacity(config.processes.len());
        for (name, spec) in &config.processes {
            let cut = CompiledExpr::compile(&spec.cut_string).map_err(|e| {
                DatasetError::Config(format!("process '{name}': invalid cut_string: {e}"))
            })?;
            if let Some(q) = cut.qualifiers().into_iter().find(|q| !aliases.contains(q)) {
                return Err(DatasetError::Config(format!(
                    "process '{name}': cut_string references unknown friend alias '{q}'"
                )));
            }
            let weight = CompiledExpr::compile(&spec.weight_string).map_err(|e| {
                DatasetError::Config(format!("process '{name}': invalid weight_string: {e}"))
            })?;
            if let Some(q) = weight.qualifiers().first() {
                return Err(DatasetError::Config(format!(
                    "process '{name}': weight_string may only use primary-source columns, found '{q}.'"
                )));
            }
            processes.push(ProcessPlan {
                name: name.clone(),
                files: spec.files.clone(),
                class_name: spec.class_name.clone(),
                cut,
                weight,
            });
        }
        Ok(Self { config, processes })
    }

    /// Load, validate and compile a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_config(DatasetConfig::load(path)?)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
