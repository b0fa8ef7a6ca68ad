use crate::layer::ContributionError;
use crate::layout::ClassificationError;
use crate::nginx::ConfigSynthesisError;
use indoc::formatdoc;
use libherokubuildpack::log::log_error;

#[derive(Debug)]
pub(crate) enum StaticWebBuildpackError {
    Classification(ClassificationError),
    ConfigSynthesis(ConfigSynthesisError),
    Contribution(ContributionError),
}

impl From<StaticWebBuildpackError> for libcnb::Error<StaticWebBuildpackError> {
    fn from(error: StaticWebBuildpackError) -> Self {
        Self::BuildpackError(error)
    }
}

pub(crate) fn on_error(error: libcnb::Error<StaticWebBuildpackError>) {
    libherokubuildpack::error::on_error(on_buildpack_error, error);
}

fn on_buildpack_error(error: StaticWebBuildpackError) {
    match error {
        StaticWebBuildpackError::Classification(error) => log_error(
            "Unsupported app layout",
            formatdoc! {"
                The app layout changed between detect and build: {error}

                Supported layouts are an index.html at the root of the app, a public/index.html
                or a package.json whose build writes the site to the build directory (or the
                directory set in config.outputDir).
            "},
        ),
        StaticWebBuildpackError::ConfigSynthesis(ConfigSynthesisError::MissingDocumentRoot(
            path,
        )) => log_error(
            "Document root not found",
            formatdoc! {"
                The directory {path} that should be served does not exist.

                For apps with a package.json, the document root is created by the build script
                of the app. Make sure the build tool buildpack runs before this buildpack and that
                the build writes its output to {path}.
            ", path = path.display()},
        ),
        StaticWebBuildpackError::ConfigSynthesis(error) => {
            log_error("Could not generate the nginx config", error.to_string());
        }
        StaticWebBuildpackError::Contribution(error) => {
            log_error("Could not write the web server layer", error.to_string());
        }
    }
}
