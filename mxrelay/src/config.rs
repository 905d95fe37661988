use std::path::{Path, PathBuf};

use anyhow::Context;
use mxrelay_delivery::RelayConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MXRELAY_CONFIG";

/// Configuration file looked for in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "./mxrelay.config.ron";

/// Find the configuration file using the following precedence:
/// 1. `explicit`, from `--config`
/// 2. `from_env`, the value of `MXRELAY_CONFIG`
/// 3. `fallback`, normally `./mxrelay.config.ron`
///
/// A path given explicitly or through the environment must exist. A missing
/// fallback just means the built-in defaults apply.
///
/// # Errors
///
/// Returns an error if an explicit or environment path does not exist.
pub fn find_config_file(
    explicit: Option<PathBuf>,
    from_env: Option<PathBuf>,
    fallback: &Path,
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        anyhow::ensure!(path.exists(), "Config file {} does not exist", path.display());
        return Ok(Some(path));
    }

    if let Some(path) = from_env {
        anyhow::ensure!(
            path.exists(),
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
        return Ok(Some(path));
    }

    Ok(fallback.exists().then(|| fallback.to_path_buf()))
}

/// Reads a RON [`RelayConfig`], or the defaults when there is no file.
///
/// # Errors
///
/// Returns an error if the file can't be read or parsed.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RelayConfig> {
    let Some(path) = path else {
        return Ok(RelayConfig::default());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    ron_options()
        .from_str(&content)
        .with_context(|| format!("Invalid config in {}", path.display()))
}

/// RON as written by hand: optional fields take bare values.
pub(crate) fn ron_options() -> ron::Options {
    ron::Options::default().with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
}
