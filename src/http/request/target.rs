// Proxy target parsing: only absolute `http://<host><path>` targets are served.

use url::Url;

use super::ParseError;

/// Where a cache miss is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginTarget {
    pub host: String,
    /// Path plus query, never empty.
    pub path: String,
}

impl OriginTarget {
    /// HTTP/1.0 request sent to the origin for this target.
    pub fn request(&self) -> String {
        format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.path, self.host
        )
    }
}

/// Splits an absolute `http` URL into origin host and path.
/// The host comes out lowercased; the path is forwarded verbatim.
/// Other schemes and explicit non-default ports are rejected.
pub fn parse_target(target: &str) -> Result<OriginTarget, ParseError> {
    let invalid = |reason: &str| ParseError::InvalidTarget {
        target: target.to_owned(),
        reason: reason.to_owned(),
    };

    let url = Url::parse(target).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid("scheme must be http"));
    }
    if url.port().is_some() {
        return Err(invalid("explicit ports are not supported"));
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host"))?;

    Ok(OriginTarget {
        host: host.to_owned(),
        path: raw_path(target),
    })
}

/// Path and query exactly as the client wrote them, without the fragment.
/// Dot segments and percent-encoding are left untouched.
fn raw_path(target: &str) -> String {
    let rest = target.split_once("://").map_or(target, |(_, rest)| rest);
    let rest = rest.split('#').next().unwrap_or_default();
    match rest.find(|c: char| c == '/' || c == '?') {
        Some(at) if rest[at..].starts_with('?') => format!("/{}", &rest[at..]),
        Some(at) => rest[at..].to_owned(),
        None => "/".to_owned(),
    }
}
