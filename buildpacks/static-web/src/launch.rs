//! Names and parsing shared by the buildpack and the `prepare-launch` exec.d program.

/// Launch env var holding the directory nginx serves.
pub(crate) const DOCUMENT_ROOT_ENV_VAR: &str = "STATIC_WEB_DOCUMENT_ROOT";

/// Launch env var holding the path of the nginx config written during the build.
pub(crate) const NGINX_CONF_ENV_VAR: &str = "STATIC_WEB_NGINX_CONF";

/// The config the `web` process starts nginx with. Written by `prepare-launch` from the build
/// config, with the `PORT` of the running container applied.
pub(crate) const LAUNCH_NGINX_CONF: &str = "/tmp/static-web/nginx.conf";

pub(crate) const PORT_ENV_VAR: &str = "PORT";

/// Parses a `PORT` value. Zero is not a port nginx can listen on.
pub(crate) fn parse_port(value: &str) -> Option<u16> {
    value.trim().parse::<u16>().ok().filter(|port| *port != 0)
}
