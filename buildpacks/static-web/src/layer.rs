use crate::launch::{DOCUMENT_ROOT_ENV_VAR, NGINX_CONF_ENV_VAR};
use crate::nginx::ServerConfig;
use crate::{StaticWebBuildpack, StaticWebBuildpackError};
use libcnb::additional_buildpack_binary_path;
use libcnb::build::BuildContext;
use libcnb::data::layer_name;
use libcnb::layer::{
    CachedLayerDefinition, InvalidMetadataAction, LayerState, RestoredLayerAction,
};
use libcnb::layer_env::{LayerEnv, ModificationBehavior, Scope};
use libherokubuildpack::log::log_info;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const NGINX_CONF_FILE: &str = "nginx.conf";
const DOCUMENT_ROOT_FILE: &str = "document-root";

/// Metadata stored alongside the layer. A restored layer is only reused if it is equal to the
/// metadata of the current build.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct WebServerLayerMetadata {
    pub(crate) config_digest: String,
    pub(crate) document_root: PathBuf,
    pub(crate) version: String,
}

impl WebServerLayerMetadata {
    pub(crate) fn new(server_config: &ServerConfig, document_root: &Path) -> Self {
        Self {
            config_digest: server_config.digest(),
            document_root: document_root.to_path_buf(),
            version: String::from(env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ContributionError {
    #[error("Could not create a temporary file in {path}: {source}")]
    CreateTempFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not move the written file into place at {path}: {source}")]
    PersistFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Contributes the `web-server` layer holding the nginx config and a pointer to the document root.
///
/// Returns the path of the layer.
pub(crate) fn contribute(
    context: &BuildContext<StaticWebBuildpack>,
    server_config: &ServerConfig,
    document_root: &Path,
) -> libcnb::Result<PathBuf, StaticWebBuildpackError> {
    let metadata = WebServerLayerMetadata::new(server_config, document_root);

    let layer_ref = context.cached_layer(
        layer_name!("web-server"),
        CachedLayerDefinition {
            build: true,
            launch: true,
            invalid_metadata_action: &|_| InvalidMetadataAction::DeleteLayer,
            restored_layer_action: &|restored: &WebServerLayerMetadata, _| {
                restored_layer_action(restored, &metadata)
            },
        },
    )?;

    match layer_ref.state {
        LayerState::Restored { .. } => {
            log_info("Reusing cached nginx config");
        }
        LayerState::Empty { .. } => {
            log_info("Writing nginx config");

            let layer_path = layer_ref.path();
            write_layer_files(&layer_path, server_config, document_root)
                .map_err(StaticWebBuildpackError::Contribution)?;

            layer_ref.write_env(launch_env(&layer_path, document_root))?;

            layer_ref.write_exec_d_programs([(
                "prepare-launch",
                additional_buildpack_binary_path!("prepare-launch"),
            )])?;

            // Written last, a layer without valid metadata is discarded by the next build.
            layer_ref.write_metadata(metadata)?;
        }
    }

    Ok(layer_ref.path())
}

/// Env the `prepare-launch` exec.d program reads at container start.
pub(crate) fn launch_env(layer_dir: &Path, document_root: &Path) -> LayerEnv {
    LayerEnv::new()
        .chainable_insert(
            Scope::Launch,
            ModificationBehavior::Override,
            DOCUMENT_ROOT_ENV_VAR,
            document_root,
        )
        .chainable_insert(
            Scope::Launch,
            ModificationBehavior::Override,
            NGINX_CONF_ENV_VAR,
            layer_dir.join(NGINX_CONF_FILE),
        )
}

pub(crate) fn restored_layer_action(
    restored: &WebServerLayerMetadata,
    expected: &WebServerLayerMetadata,
) -> RestoredLayerAction {
    if restored == expected {
        RestoredLayerAction::KeepLayer
    } else {
        RestoredLayerAction::DeleteLayer
    }
}

/// Writes the layer files. Every file is written to a temporary file in the layer directory first
/// and then renamed, readers never observe a partially written file.
pub(crate) fn write_layer_files(
    layer_dir: &Path,
    server_config: &ServerConfig,
    document_root: &Path,
) -> Result<(), ContributionError> {
    write_atomically(&layer_dir.join(NGINX_CONF_FILE), server_config.as_str())?;
    write_atomically(
        &layer_dir.join(DOCUMENT_ROOT_FILE),
        &format!("{}\n", document_root.display()),
    )
}

fn write_atomically(path: &Path, contents: &str) -> Result<(), ContributionError> {
    let dir = path.parent().unwrap_or(Path::new("."));

    let mut temp_file =
        NamedTempFile::new_in(dir).map_err(|source| ContributionError::CreateTempFile {
            path: dir.to_path_buf(),
            source,
        })?;

    temp_file
        .write_all(contents.as_bytes())
        .and_then(|()| temp_file.as_file().sync_all())
        .map_err(|source| ContributionError::WriteFile {
            path: temp_file.path().to_path_buf(),
            source,
        })?;

    temp_file
        .persist(path)
        .map(|_| ())
        .map_err(|error| ContributionError::PersistFile {
            path: path.to_path_buf(),
            source: error.error,
        })
}
