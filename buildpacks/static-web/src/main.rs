mod build_plan;
mod config;
mod errors;
mod launch;
mod layer;
mod layout;
mod nginx;

use crate::config::{ServerSettings, StaticWebBuildpackMetadata};
use crate::errors::{on_error, StaticWebBuildpackError};
use crate::launch::LAUNCH_NGINX_CONF;
use crate::layout::{classify, AppLayout, ClassificationError};
use crate::nginx::{synthesize, CACHE_POLICY};
use libcnb::build::{BuildContext, BuildResult, BuildResultBuilder};
use libcnb::data::launch::{LaunchBuilder, ProcessBuilder};
use libcnb::data::process_type;
use libcnb::detect::{DetectContext, DetectResult, DetectResultBuilder};
use libcnb::generic::GenericPlatform;
use libcnb::{buildpack_main, Buildpack, Platform};
use libherokubuildpack::log::{log_header, log_info, log_warning};

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use libcnb_test as _;
#[cfg(test)]
use ureq as _;
// Only used by the `prepare-launch` exec.d binary.
use walkdir as _;

pub(crate) struct StaticWebBuildpack;

impl Buildpack for StaticWebBuildpack {
    type Platform = GenericPlatform;
    type Metadata = StaticWebBuildpackMetadata;
    type Error = StaticWebBuildpackError;

    fn detect(&self, context: DetectContext<Self>) -> libcnb::Result<DetectResult, Self::Error> {
        match classify(&context.app_dir) {
            Ok(layout) => DetectResultBuilder::pass()
                .build_plan(build_plan::build_plan(
                    &layout,
                    &context.buildpack_descriptor.metadata.capabilities,
                ))
                .build(),
            Err(ClassificationError::NoSupportedLayout) => {
                log_info(
                    "No index.html, public/index.html or package.json found, skipping static web buildpack",
                );
                DetectResultBuilder::fail().build()
            }
            Err(error) => {
                log_warning("Static web buildpack skipped", error.to_string());
                DetectResultBuilder::fail().build()
            }
        }
    }

    fn build(&self, context: BuildContext<Self>) -> libcnb::Result<BuildResult, Self::Error> {
        log_header("Static Web");

        let layout = classify(&context.app_dir).map_err(StaticWebBuildpackError::Classification)?;
        let document_root = layout.document_root(&context.app_dir);

        log_info(format!(
            "Detected {} layout, serving {}",
            layout.name(),
            document_root.display()
        ));

        let settings = ServerSettings::from_env(context.platform.env())
            .map_err(|error| StaticWebBuildpackError::ConfigSynthesis(error.into()))?;

        let server_config = synthesize(&layout, &document_root, &settings, &CACHE_POLICY)
            .map_err(StaticWebBuildpackError::ConfigSynthesis)?;

        if !document_root.join("index.html").is_file() {
            log_warning(
                "No index.html in document root",
                format!(
                    "{} does not contain an index.html, requests for / will return 404.",
                    document_root.display()
                ),
            );
        }

        if let AppLayout::BuiltOutput { output_dir } = &layout {
            log_info(format!("Using build output from {}", output_dir.display()));
        }

        let layer_path = layer::contribute(&context, &server_config, &document_root)?;

        log_info(format!(
            "Listening on port {}, a PORT set when the container starts takes precedence",
            settings.port
        ));

        BuildResultBuilder::new()
            .launch(
                LaunchBuilder::new()
                    .process(
                        ProcessBuilder::new(process_type!("web"), ["nginx"])
                            .args([
                                String::from("-p"),
                                layer_path.to_string_lossy().to_string(),
                                String::from("-c"),
                                String::from(LAUNCH_NGINX_CONF),
                            ])
                            .default(true)
                            .build(),
                    )
                    .build(),
            )
            .build()
    }

    fn on_error(&self, error: libcnb::Error<Self::Error>) {
        on_error(error);
    }
}

buildpack_main!(StaticWebBuildpack);
