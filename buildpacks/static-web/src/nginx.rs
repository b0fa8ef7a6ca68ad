//! Generates the nginx configuration that serves the document root.

use crate::config::ServerSettings;
use crate::layout::AppLayout;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Caching headers sent with every response.
///
/// `Last-Modified` always reflects the modification time of the served file on disk, clients
/// are allowed to cache but have to revalidate with a conditional GET. `ETag`s are not sent.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct CachePolicy {
    pub(crate) cache_control: &'static str,
    pub(crate) etag: bool,
}

pub(crate) const CACHE_POLICY: CachePolicy = CachePolicy {
    cache_control: "public, max-age=0, must-revalidate",
    etag: false,
};

/// A rendered `nginx.conf`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct ServerConfig {
    contents: String,
}

impl ServerConfig {
    pub(crate) fn as_str(&self) -> &str {
        &self.contents
    }

    /// Hex encoded SHA-256 of the config contents.
    pub(crate) fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.contents.as_bytes()))
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ConfigSynthesisError {
    #[error("Document root {0} does not exist")]
    MissingDocumentRoot(PathBuf),
    #[error("Document root {0} is not a directory")]
    DocumentRootNotADirectory(PathBuf),
    #[error("Could not inspect document root {0}: {1}")]
    CannotReadDocumentRoot(PathBuf, std::io::Error),
    #[error("Document root {0} contains characters that cannot be used in an nginx config")]
    UnsupportedDocumentRoot(PathBuf),
    #[error(transparent)]
    InvalidSettings(#[from] crate::config::SettingsError),
}

/// Renders the nginx config for the given inputs.
///
/// The output only depends on the arguments, rendering twice yields byte-identical configs.
pub(crate) fn synthesize(
    layout: &AppLayout,
    document_root: &Path,
    settings: &ServerSettings,
    cache_policy: &CachePolicy,
) -> Result<ServerConfig, ConfigSynthesisError> {
    match fs::metadata(document_root) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(ConfigSynthesisError::DocumentRootNotADirectory(
                document_root.to_path_buf(),
            ))
        }
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(ConfigSynthesisError::MissingDocumentRoot(
                document_root.to_path_buf(),
            ))
        }
        Err(error) => {
            return Err(ConfigSynthesisError::CannotReadDocumentRoot(
                document_root.to_path_buf(),
                error,
            ))
        }
    }

    let root = nginx_string(document_root)
        .ok_or_else(|| ConfigSynthesisError::UnsupportedDocumentRoot(document_root.to_path_buf()))?;

    let fallback = match layout {
        // Client side routing in built single page apps relies on unknown paths serving the index.
        AppLayout::BuiltOutput { .. } => "/index.html",
        AppLayout::RootIndex | AppLayout::PublicDir => "=404",
    };

    let etag = if cache_policy.etag { "on" } else { "off" };

    Ok(ServerConfig {
        contents: format!(
            r#"# Generated by the static web buildpack, layout: {layout_name}
daemon off;
worker_processes auto;
pid /tmp/nginx.pid;
error_log stderr;

events {{
    worker_connections 1024;
}}

http {{
    access_log /dev/stdout;
    client_body_temp_path /tmp/nginx-client-body;
    proxy_temp_path /tmp/nginx-proxy;
    fastcgi_temp_path /tmp/nginx-fastcgi;
    uwsgi_temp_path /tmp/nginx-uwsgi;
    scgi_temp_path /tmp/nginx-scgi;

{types}
    default_type application/octet-stream;
    charset utf-8;
    sendfile on;
    server_tokens off;

    etag {etag};
    if_modified_since exact;

    server {{
        listen {port};
        root {root};
        index index.html;

        location / {{
            add_header Cache-Control "{cache_control}" always;
            try_files $uri $uri/ {fallback};
        }}
    }}
}}
"#,
            layout_name = layout.name(),
            types = types_block(),
            port = settings.port,
            cache_control = cache_policy.cache_control,
        ),
    })
}

// Sorted by MIME type so the rendered block is stable.
const MIME_TYPES: &[(&str, &[&str])] = &[
    ("application/javascript", &["js", "mjs"]),
    ("application/json", &["json", "map"]),
    ("application/manifest+json", &["webmanifest"]),
    ("application/pdf", &["pdf"]),
    ("application/wasm", &["wasm"]),
    ("application/xml", &["xml"]),
    ("application/zip", &["zip"]),
    ("audio/mpeg", &["mp3"]),
    ("audio/ogg", &["ogg"]),
    ("font/otf", &["otf"]),
    ("font/ttf", &["ttf"]),
    ("font/woff", &["woff"]),
    ("font/woff2", &["woff2"]),
    ("image/avif", &["avif"]),
    ("image/gif", &["gif"]),
    ("image/jpeg", &["jpeg", "jpg"]),
    ("image/png", &["png"]),
    ("image/svg+xml", &["svg", "svgz"]),
    ("image/vnd.microsoft.icon", &["ico"]),
    ("image/webp", &["webp"]),
    ("text/css", &["css"]),
    ("text/csv", &["csv"]),
    ("text/html", &["html", "htm"]),
    ("text/markdown", &["md"]),
    ("text/plain", &["txt"]),
    ("video/mp4", &["mp4"]),
    ("video/webm", &["webm"]),
];

fn types_block() -> String {
    let entries = MIME_TYPES
        .iter()
        .map(|(mime_type, extensions)| format!("        {mime_type} {};\n", extensions.join(" ")))
        .collect::<String>();

    format!("    types {{\n{entries}    }}")
}

// Quotes a path for use in the nginx config. nginx has no escape for `$`, paths containing it (or
// quotes, backslashes or control characters) are refused.
fn nginx_string(path: &Path) -> Option<String> {
    let path = path.to_str()?;

    if path
        .chars()
        .any(|char| matches!(char, '$' | '"' | '\\') || char.is_control())
    {
        None
    } else {
        Some(format!("\"{path}\""))
    }
}
