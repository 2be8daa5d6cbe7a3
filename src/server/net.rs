//! Address helpers: LAN address discovery and public origin resolution

use crate::config::ServerOptions;
use axum::http::{HeaderMap, Uri, header};
use std::net::IpAddr;

/// First non-loopback IPv4 address among the host's network interfaces.
pub fn detect_lan_ip() -> Option<IpAddr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(err) => {
            tracing::debug!(error = %err, "Failed to list network interfaces");
            return None;
        }
    };
    select_lan_ip(interfaces.iter().map(|iface| iface.ip()))
}

/// Pick the address other devices can reach: the first IPv4 address that is
/// neither loopback nor unspecified.
pub fn select_lan_ip<I>(addrs: I) -> Option<IpAddr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs.into_iter().find(|ip| match ip {
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_unspecified(),
        IpAddr::V6(_) => false,
    })
}

/// Base URLs to announce on startup: local first, then the LAN address.
pub fn announce_urls(port: u16) -> (String, String) {
    base_urls(port, detect_lan_ip())
}

fn base_urls(port: u16, lan_ip: Option<IpAddr>) -> (String, String) {
    let local = format!("http://localhost:{port}");
    let network = match lan_ip {
        Some(ip) => format!("http://{ip}:{port}"),
        None => local.clone(),
    };
    (local, network)
}

/// Origin (`scheme://host`) clients should use to reach this server.
///
/// A configured `public_url` always wins. Otherwise the `Host` header is used,
/// or the forwarded headers when the server sits behind a trusted proxy.
pub fn request_origin(
    options: &ServerOptions,
    headers: &HeaderMap,
    uri: &Uri,
    fallback_host: &str,
) -> String {
    if let Some(url) = options.public_url.as_deref() {
        return url.trim_end_matches('/').to_string();
    }

    let forwarded = |name: &str| {
        if !options.trust_forwarded_headers {
            return None;
        }
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let scheme = forwarded("x-forwarded-proto").unwrap_or("http");
    let host = forwarded("x-forwarded-host")
        .or_else(|| headers.get(header::HOST).and_then(|v| v.to_str().ok()))
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or(fallback_host);

    format!("{scheme}://{host}")
}
