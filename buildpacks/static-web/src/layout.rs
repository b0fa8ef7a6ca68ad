use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// File that marks an app as a front-end project that needs to be built before serving.
pub(crate) const PROJECT_MARKER: &str = "package.json";

/// Build output directory used when `package.json` does not declare `config.outputDir`.
pub(crate) const DEFAULT_OUTPUT_DIR: &str = "build";

const INDEX_FILE: &str = "index.html";
const PUBLIC_DIR: &str = "public";

/// The supported app layouts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum AppLayout {
    /// `index.html` at the root of the app, served as-is.
    RootIndex,
    /// `public/index.html`, the `public` directory is served.
    PublicDir,
    /// A front-end project whose build step writes the servable files to `output_dir`.
    BuiltOutput { output_dir: PathBuf },
}

impl AppLayout {
    /// The directory, relative to the app directory, that is served.
    pub(crate) fn relative_document_root(&self) -> &Path {
        match self {
            AppLayout::RootIndex => Path::new(""),
            AppLayout::PublicDir => Path::new(PUBLIC_DIR),
            AppLayout::BuiltOutput { output_dir } => output_dir,
        }
    }

    /// Resolves the document root for an app. For [`AppLayout::BuiltOutput`], the returned path
    /// usually does not exist before the build tool ran.
    pub(crate) fn document_root(&self, app_dir: &Path) -> PathBuf {
        match self {
            AppLayout::RootIndex => app_dir.to_path_buf(),
            _ => app_dir.join(self.relative_document_root()),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            AppLayout::RootIndex => "root-index",
            AppLayout::PublicDir => "public-dir",
            AppLayout::BuiltOutput { .. } => "built-output",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ClassificationError {
    #[error("no supported layout detected")]
    NoSupportedLayout,
    #[error("Could not read project marker {path}: {source}")]
    UnreadableProjectMarker {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not parse project marker {path}: {source}")]
    InvalidProjectMarker {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid build output directory {output_dir:?} declared in {path}: it must be a relative path inside the app")]
    InvalidOutputDir { path: PathBuf, output_dir: String },
}

type Rule = fn(&Path) -> Result<Option<AppLayout>, ClassificationError>;

// Evaluated top to bottom, the first rule that matches decides the layout.
const RULES: [Rule; 3] = [built_output_rule, public_dir_rule, root_index_rule];

/// Determines the layout of the app in `app_dir`. The app directory is only read, never written.
pub(crate) fn classify(app_dir: &Path) -> Result<AppLayout, ClassificationError> {
    for rule in RULES {
        if let Some(layout) = rule(app_dir)? {
            return Ok(layout);
        }
    }

    Err(ClassificationError::NoSupportedLayout)
}

fn built_output_rule(app_dir: &Path) -> Result<Option<AppLayout>, ClassificationError> {
    let marker_path = app_dir.join(PROJECT_MARKER);

    if !marker_path.is_file() {
        return Ok(None);
    }

    let output_dir = declared_output_dir(&marker_path)?;

    Ok(Some(AppLayout::BuiltOutput { output_dir }))
}

#[allow(clippy::unnecessary_wraps)]
fn public_dir_rule(app_dir: &Path) -> Result<Option<AppLayout>, ClassificationError> {
    Ok(app_dir
        .join(PUBLIC_DIR)
        .join(INDEX_FILE)
        .is_file()
        .then_some(AppLayout::PublicDir))
}

#[allow(clippy::unnecessary_wraps)]
fn root_index_rule(app_dir: &Path) -> Result<Option<AppLayout>, ClassificationError> {
    Ok(app_dir
        .join(INDEX_FILE)
        .is_file()
        .then_some(AppLayout::RootIndex))
}

#[derive(Deserialize, Default)]
struct PackageJson {
    #[serde(default)]
    config: PackageJsonConfig,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PackageJsonConfig {
    output_dir: Option<String>,
}

fn declared_output_dir(marker_path: &Path) -> Result<PathBuf, ClassificationError> {
    let contents = fs::read_to_string(marker_path).map_err(|source| {
        ClassificationError::UnreadableProjectMarker {
            path: marker_path.to_path_buf(),
            source,
        }
    })?;

    let package_json: PackageJson = serde_json::from_str(&contents).map_err(|source| {
        ClassificationError::InvalidProjectMarker {
            path: marker_path.to_path_buf(),
            source,
        }
    })?;

    match package_json.config.output_dir {
        None => Ok(PathBuf::from(DEFAULT_OUTPUT_DIR)),
        Some(output_dir) => validate_output_dir(&output_dir).ok_or_else(|| {
            ClassificationError::InvalidOutputDir {
                path: marker_path.to_path_buf(),
                output_dir,
            }
        }),
    }
}

// Only plain relative paths are accepted so the document root can never escape the app directory.
fn validate_output_dir(output_dir: &str) -> Option<PathBuf> {
    let path = Path::new(output_dir.trim());

    let mut components = path.components().peekable();
    components.peek()?;

    components
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        .then(|| {
            path.components()
                .filter(|component| matches!(component, Component::Normal(_)))
                .collect::<PathBuf>()
        })
        .filter(|normalized| normalized.components().next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn app_with_files(files: &[(&str, &str)]) -> TempDir {
        let app_dir = tempfile::tempdir().unwrap();

        for (path, contents) in files {
            let path = app_dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        app_dir
    }

    #[test]
    fn root_index() {
        let app_dir = app_with_files(&[("index.html", "<h1>hello</h1>")]);

        let layout = classify(app_dir.path()).unwrap();
        assert_eq!(layout, AppLayout::RootIndex);
        assert_eq!(layout.document_root(app_dir.path()), app_dir.path());
    }

    #[test]
    fn public_dir() {
        let app_dir = app_with_files(&[("public/index.html", "<h1>hello</h1>")]);

        let layout = classify(app_dir.path()).unwrap();
        assert_eq!(layout, AppLayout::PublicDir);
        assert_eq!(
            layout.document_root(app_dir.path()),
            app_dir.path().join("public")
        );
    }

    #[test]
    fn public_dir_takes_precedence_over_root_index() {
        let app_dir = app_with_files(&[
            ("index.html", "root"),
            ("public/index.html", "public"),
        ]);

        assert_eq!(classify(app_dir.path()).unwrap(), AppLayout::PublicDir);
    }

    #[test]
    fn built_output_with_default_output_dir() {
        let app_dir = app_with_files(&[
            ("package.json", r#"{"name": "react-app", "scripts": {"build": "react-scripts build"}}"#),
            ("src/index.js", ""),
        ]);

        let layout = classify(app_dir.path()).unwrap();
        assert_eq!(
            layout,
            AppLayout::BuiltOutput {
                output_dir: PathBuf::from("build")
            }
        );
        assert_eq!(
            layout.document_root(app_dir.path()),
            app_dir.path().join("build")
        );
    }

    #[test]
    fn built_output_with_declared_output_dir() {
        let app_dir = app_with_files(&[(
            "package.json",
            r#"{"name": "vite-app", "config": {"outputDir": "./dist/site"}}"#,
        )]);

        assert_eq!(
            classify(app_dir.path()).unwrap(),
            AppLayout::BuiltOutput {
                output_dir: PathBuf::from("dist/site")
            }
        );
    }

    #[test]
    fn built_output_takes_precedence_over_everything_else() {
        let app_dir = app_with_files(&[
            ("package.json", "{}"),
            ("index.html", "root"),
            ("public/index.html", "public"),
        ]);

        assert!(matches!(
            classify(app_dir.path()).unwrap(),
            AppLayout::BuiltOutput { .. }
        ));
    }

    #[test]
    fn directory_named_index_html_is_ignored() {
        let app_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(app_dir.path().join("index.html")).unwrap();

        assert!(matches!(
            classify(app_dir.path()),
            Err(ClassificationError::NoSupportedLayout)
        ));
    }

    #[test]
    fn unsupported_tree() {
        let app_dir = app_with_files(&[("README.md", "# hello"), ("public/style.css", "")]);

        let error = classify(app_dir.path()).unwrap_err();
        assert!(matches!(error, ClassificationError::NoSupportedLayout));
        assert_eq!(error.to_string(), "no supported layout detected");
    }

    #[test]
    fn classification_does_not_modify_the_app() {
        let app_dir = app_with_files(&[("package.json", "{}")]);

        classify(app_dir.path()).unwrap();

        let entries = fs::read_dir(app_dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn invalid_package_json() {
        let app_dir = app_with_files(&[("package.json", "{ not json"), ("index.html", "")]);

        assert!(matches!(
            classify(app_dir.path()),
            Err(ClassificationError::InvalidProjectMarker { .. })
        ));
    }

    #[test]
    fn unreadable_package_json() {
        let app_dir = app_with_files(&[("index.html", "")]);
        let marker_path = app_dir.path().join("package.json");
        fs::write(&marker_path, [0xff, 0xfe, b'{', b'}']).unwrap();

        assert!(matches!(
            classify(app_dir.path()),
            Err(ClassificationError::UnreadableProjectMarker { path, .. }) if path == marker_path
        ));
    }

    #[test]
    fn output_dir_escaping_the_app() {
        for output_dir in ["../outside", "/var/www", "dist/../../etc", "", "  ", "."] {
            let package_json = format!(r#"{{"config": {{"outputDir": "{output_dir}"}}}}"#);
            let app_dir = app_with_files(&[("package.json", package_json.as_str())]);

            assert!(
                matches!(
                    classify(app_dir.path()),
                    Err(ClassificationError::InvalidOutputDir { .. })
                ),
                "{output_dir:?} should be rejected"
            );
        }
    }
}
