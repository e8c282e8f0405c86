//! Finding and stacking config files.
//!
//! Two layers are looked for, lowest precedence first:
//!
//! | layer   | file                                                   |
//! |---------|--------------------------------------------------------|
//! | user    | `$CONDUIT_CONFIG_DIR/config.toml`, else the platform config dir + `conduit/config.toml` |
//! | project | `conduit.toml` in the working (or given) directory      |
//!
//! Command-line overrides go on top afterwards. Passing `--config <path>`
//! loads that single file as the [`Layer::Explicit`] layer instead.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{ConduitConfig, ConfigError, Result};

const PROJECT_FILE: &str = "conduit.toml";
const USER_FILE: &str = "config.toml";
const USER_DIR_NAME: &str = "conduit";
const CONFIG_DIR_ENV: &str = "CONDUIT_CONFIG_DIR";

/// Which layer a config file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    User,
    Project,
    /// Named on the command line; replaces discovery.
    Explicit,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Layer::User => "user",
            Layer::Project => "project",
            Layer::Explicit => "explicit",
        })
    }
}

/// One file that was looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub layer: Layer,
    pub path: PathBuf,
    /// False when the file is absent or failed to parse.
    pub loaded: bool,
}

/// The stacked config plus a record of how it was put together.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ConduitConfig,
    /// Every candidate file, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Non-fatal problems: unreadable layers, plaintext keys.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Files that actually contributed values.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Discover and stack the user and project layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], with the user config directory pinned.
///
/// Tests use this to stay away from the real home directory.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut candidates = Vec::with_capacity(2);
    let user_dir = config_dir.map(Path::to_path_buf).or_else(xdg_config_dir);
    if let Some(dir) = user_dir {
        candidates.push((Layer::User, dir.join(USER_FILE)));
    }
    let project_path = project_dir.map_or_else(|| PathBuf::from(PROJECT_FILE), |d| d.join(PROJECT_FILE));
    candidates.push((Layer::Project, project_path));

    let mut loaded = LoadedConfig {
        config: ConduitConfig::new(),
        sources: Vec::with_capacity(candidates.len()),
        warnings: Vec::new(),
    };
    for (layer, path) in candidates {
        let source = stack_layer(&mut loaded, layer, path);
        loaded.sources.push(source);
    }
    warn_on_plaintext_key(&loaded.config, &mut loaded.warnings);
    Ok(loaded)
}

/// Load a single file named by the user.
///
/// There is nothing to fall back to, so a missing or malformed file is an
/// error rather than a warning.
pub fn load_explicit(path: &Path) -> Result<LoadedConfig> {
    let config = load_config_file(path)?;
    let mut warnings = Vec::new();
    warn_on_plaintext_key(&config, &mut warnings);
    Ok(LoadedConfig {
        config,
        sources: vec![ConfigSource {
            layer: Layer::Explicit,
            path: path.to_path_buf(),
            loaded: true,
        }],
        warnings,
    })
}

/// Read and parse one TOML file.
pub fn load_config_file(path: &Path) -> Result<ConduitConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    ConduitConfig::from_toml(&text)
}

/// Where the user layer lives, whether or not it exists.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|dir| dir.join(USER_FILE))
}

/// Directory of the user layer: `CONDUIT_CONFIG_DIR` when non-empty,
/// otherwise `conduit/` under the platform config directory.
pub fn xdg_config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|base| base.join(USER_DIR_NAME)),
    }
}

fn stack_layer(loaded: &mut LoadedConfig, layer: Layer, path: PathBuf) -> ConfigSource {
    let mut source = ConfigSource {
        layer,
        path,
        loaded: false,
    };
    if !source.path.is_file() {
        return source;
    }
    match load_config_file(&source.path) {
        Ok(values) => {
            loaded.config.merge(values);
            source.loaded = true;
        }
        Err(e) => loaded.warnings.push(format!(
            "skipping {} config {}: {}",
            layer,
            source.path.display(),
            e
        )),
    }
    source
}

fn warn_on_plaintext_key(config: &ConduitConfig, warnings: &mut Vec<String>) {
    if config.model.as_ref().is_some_and(|m| m.has_plaintext_api_key()) {
        warnings.push(format!(
            "[model] contains a plaintext API key; prefer the {} environment variable",
            crate::secrets::API_KEY_ENV
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
