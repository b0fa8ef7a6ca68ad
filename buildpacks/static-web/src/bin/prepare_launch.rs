//! exec.d program that runs before the web server starts.
//!
//! Exported image files carry a normalized modification time of 1980-01-01T00:00:01Z. nginx
//! derives `Last-Modified` from the modification time, so every response would carry that fixed
//! date. Files in the document root that still have the normalized time are touched with the
//! container start time instead.
//!
//! The nginx config written during the build listens on the build time port. Platforms pass the
//! port to listen on as `PORT` when starting the container, the config nginx is started with is a
//! copy of the build config with that port applied.

#[path = "../launch.rs"]
mod launch;

use crate::launch::{
    parse_port, DOCUMENT_ROOT_ENV_VAR, LAUNCH_NGINX_CONF, NGINX_CONF_ENV_VAR, PORT_ENV_VAR,
};
use libcnb::data::exec_d::ExecDProgramOutputKey;
use libcnb::exec_d::write_exec_d_program_output;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

// Suppress warnings due to the `unused_crate_dependencies` lint, these are used by the buildpack binary.
use indoc as _;
use libherokubuildpack as _;
use serde as _;
use serde_json as _;
use sha2 as _;
use tempfile as _;
use toml as _;
#[cfg(test)]
use libcnb_test as _;
#[cfg(test)]
use ureq as _;

// 1980-01-01T00:00:01Z
const NORMALIZED_MTIME: Duration = Duration::from_secs(315_532_801);

#[derive(thiserror::Error, Debug)]
enum LaunchConfigError {
    #[error("Invalid value for PORT: {0:?} is not a port number between 1 and 65535")]
    InvalidPort(String),
    #[error("Could not read nginx config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("nginx config {0} has no listen directive")]
    MissingListenDirective(PathBuf),
    #[error("Could not write nginx config {path}: {source}")]
    WriteConfig {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn main() {
    if let Some(document_root) = std::env::var_os(DOCUMENT_ROOT_ENV_VAR) {
        let failures = restore_mtimes(Path::new(&document_root), SystemTime::now());

        for failure in failures {
            eprintln!("prepare-launch: {failure}");
        }
    }

    // Without a usable config nginx cannot start, failing here stops the launch.
    if let Some(build_config) = std::env::var_os(NGINX_CONF_ENV_VAR) {
        let port =
            std::env::var_os(PORT_ENV_VAR).map(|value| value.to_string_lossy().into_owned());

        if let Err(error) = write_launch_config(
            Path::new(&build_config),
            port.as_deref(),
            Path::new(LAUNCH_NGINX_CONF),
        ) {
            eprintln!("prepare-launch: {error}");
            std::process::exit(1);
        }
    }

    write_exec_d_program_output(HashMap::<ExecDProgramOutputKey, String>::new());
}

/// Sets the modification time of all regular files below `document_root` that carry the
/// normalized modification time to `now`. Returns descriptions of the files that failed.
fn restore_mtimes(document_root: &Path, now: SystemTime) -> Vec<String> {
    let normalized = SystemTime::UNIX_EPOCH + NORMALIZED_MTIME;
    let mut failures = Vec::new();

    for entry in WalkDir::new(document_root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                failures.push(error.to_string());
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let is_normalized = entry
            .metadata()
            .ok()
            .and_then(|metadata| metadata.modified().ok())
            .is_some_and(|modified| modified == normalized);

        if is_normalized {
            if let Err(error) = File::open(entry.path()).and_then(|file| file.set_modified(now)) {
                failures.push(format!("{}: {error}", entry.path().display()));
            }
        }
    }

    failures
}

/// Writes the config nginx is started with to `destination`. Without a `port`, the build config
/// is copied unchanged.
fn write_launch_config(
    build_config: &Path,
    port: Option<&str>,
    destination: &Path,
) -> Result<(), LaunchConfigError> {
    let port = port
        .map(|value| {
            parse_port(value).ok_or_else(|| LaunchConfigError::InvalidPort(String::from(value)))
        })
        .transpose()?;

    let contents =
        fs::read_to_string(build_config).map_err(|source| LaunchConfigError::ReadConfig {
            path: build_config.to_path_buf(),
            source,
        })?;

    let contents = match port {
        None => contents,
        Some(port) => with_listen_port(&contents, port).ok_or_else(|| {
            LaunchConfigError::MissingListenDirective(build_config.to_path_buf())
        })?,
    };

    let write_error = |source| LaunchConfigError::WriteConfig {
        path: destination.to_path_buf(),
        source,
    };

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(destination, contents).map_err(write_error)
}

// Replaces the port of the first `listen` directive, keeping everything else byte for byte.
fn with_listen_port(config: &str, port: u16) -> Option<String> {
    let mut rewritten = String::with_capacity(config.len());
    let mut replaced = false;

    for line in config.split_inclusive('\n') {
        let directive = line.trim_start();

        if !replaced && directive.starts_with("listen ") {
            let indent = &line[..line.len() - directive.len()];
            rewritten.push_str(&format!("{indent}listen {port};\n"));
            replaced = true;
        } else {
            rewritten.push_str(line);
        }
    }

    replaced.then_some(rewritten)
}
