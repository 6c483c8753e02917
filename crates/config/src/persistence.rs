//! Reading and creating the config file
//!
//! The file is only ever created, never rewritten in place: `config init`
//! writes a complete file through a temporary file and refuses to replace
//! one that already exists, so a hand-edited config is never clobbered.

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Reads the config at `path`
///
/// A missing file yields the defaults. Fields absent from the file take
/// their defaults; out-of-range values only produce warnings so a bad edit
/// can still be inspected with `config show`.
pub(crate) fn read(path: &Path) -> ConfigResult<Config> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if contents.trim().is_empty() {
        return Err(ConfigError::Empty {
            path: path.to_path_buf(),
        });
    }

    let mut config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if config.version != CONFIG_VERSION {
        log::warn!(
            "{} has config version {}, reading it as version {}",
            path.display(),
            config.version,
            CONFIG_VERSION
        );
        config.version = CONFIG_VERSION;
    }

    if let Err(errors) = config.validate() {
        for error in errors {
            log::warn!("{}: {}", path.display(), error);
        }
    }

    Ok(config)
}

/// Writes `config` to `path` unless a file is already there
///
/// Returns false when the file exists. The content lands through a
/// temporary file in the same directory so readers never see half of it.
pub(crate) fn create(path: &Path, config: &Config) -> ConfigResult<bool> {
    config.validate().map_err(ConfigError::Invalid)?;
    let rendered = config.to_toml_string()?;

    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut staged = NamedTempFile::new_in(dir).map_err(write_err)?;
    staged.write_all(rendered.as_bytes()).map_err(write_err)?;
    staged.as_file().sync_all().map_err(write_err)?;

    match staged.persist_noclobber(path) {
        Ok(_) => {
            log::info!("Wrote config to {}", path.display());
            Ok(true)
        }
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(write_err(e.error)),
    }
}
