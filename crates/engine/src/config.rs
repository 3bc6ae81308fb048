// CppStep - C++ Step Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration
//!
//! Read from `~/.cppstep.toml` unless a path is given. Missing files and
//! missing keys fall back to the defaults.

use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::{eyre, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::shim::session::DEFAULT_HEAP_DEPTH;

/// Name of the configuration file in the home directory.
pub const CONFIG_FILE_NAME: &str = ".cppstep.toml";

/// Toolchain and runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Compiler executable.
    pub compiler: String,
    /// Flags passed before anything else.
    pub flags: Vec<String>,
    /// WASI sysroot, if the compiler does not know its own.
    pub sysroot: Option<PathBuf>,
    /// How deep the shim follows pointers when rendering heap objects.
    pub heap_depth_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compiler: "clang++".to_string(),
            flags: [
                "--target=wasm32-wasi",
                "-std=c++17",
                "-O0",
                "-fno-exceptions",
                "-Wl,--allow-undefined",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            sysroot: None,
            heap_depth_limit: DEFAULT_HEAP_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Default location of the configuration file.
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| eyre!("Unable to determine home directory"))?;
        Ok(home.join(CONFIG_FILE_NAME))
    }

    /// Loads the configuration from `path`, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {} as TOML", path.display()))?;

        debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    /// Writes the configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        debug!(path = %path.display(), "saved configuration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cppstep.toml");
        fs::write(&path, "compiler = \"/opt/wasi-sdk/bin/clang++\"\nheap_depth_limit = 8\n").unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.compiler, "/opt/wasi-sdk/bin/clang++");
        assert_eq!(config.heap_depth_limit, 8);
        assert_eq!(config.flags, EngineConfig::default().flags);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cppstep.toml");
        let config = EngineConfig { sysroot: Some("/opt/wasi-sysroot".into()), ..Default::default() };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cppstep.toml");
        fs::write(&path, "heap_depth_limit = \"deep\"").unwrap();
        assert!(EngineConfig::load(Some(&path)).is_err());
    }
}
