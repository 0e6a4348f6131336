//! Translation of HTTP service URLs into the peer address format used by the
//! clustering backend.

use url::{Host, Url};

use crate::AddressError;

/// Convert an `http`/`https` URL into `/{ip4|dns4}/{host}/tcp/{port}/{scheme}{path}`.
///
/// The host segment keeps the URL's explicit port (`10.0.0.1:9094`), so the port
/// shows up twice in the result. Downstream consumers have always received this
/// shape; do not strip it here.
///
/// IPv6 hosts are rejected with [`AddressError::Ipv6Unsupported`].
pub fn url_to_peer_address(raw: &str) -> Result<String, AddressError> {
    let url = Url::parse(raw).map_err(|e| AddressError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    let default_port = match url.scheme() {
        "https" => 443,
        "http" => 80,
        other => return Err(AddressError::UnsupportedProtocol(other.to_string())),
    };

    let (proto, host) = match url.host() {
        Some(Host::Ipv4(addr)) => ("ip4", addr.to_string()),
        Some(Host::Domain(domain)) => ("dns4", domain.to_string()),
        Some(Host::Ipv6(addr)) => return Err(AddressError::Ipv6Unsupported(addr.to_string())),
        None => {
            return Err(AddressError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }
    };

    // `Url::port` is `None` when the port is absent or equal to the scheme default.
    let (host, port) = match url.port() {
        Some(port) => (format!("{host}:{port}"), port),
        None => (host, default_port),
    };

    Ok(format!(
        "/{proto}/{host}/tcp/{port}/{}{}",
        url.scheme(),
        url.path()
    ))
}
