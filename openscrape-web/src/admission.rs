//! URL admission gate against server-side request forgery.
//!
//! [`assess`] decides, from the URL string alone, whether a page may be
//! fetched. It never resolves DNS: a public name that resolves to a private
//! address is not caught here.

use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;
use url::Url;

/// Schemes rejected up front with a specific reason.
const BLOCKED_SCHEMES: &[&str] = &["file", "ftp", "sftp", "smb", "nfs"];

/// The only schemes that may be fetched.
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

const BLOCKED_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

const PRIVATE_RANGES: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "::/128",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
    "::ffff:0:0/96",
];

static PRIVATE_NETS: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    PRIVATE_RANGES
        .iter()
        .map(|cidr| cidr.parse().expect("private range literal is valid CIDR"))
        .collect()
});

/// Why a URL was refused. The [`as_str`](DenialReason::as_str) forms are
/// stable and meant for matching by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenialReason {
    InvalidFormat,
    BlockedProtocol,
    BlockedDomain,
    PrivateAddress,
}

impl DenialReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenialReason::InvalidFormat => "InvalidFormat",
            DenialReason::BlockedProtocol => "BlockedProtocol",
            DenialReason::BlockedDomain => "BlockedDomain",
            DenialReason::PrivateAddress => "PrivateAddress",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionVerdict {
    Allowed,
    Denied(DenialReason),
}

/// Decide whether `url` may be fetched. Checks run in order and the first
/// failing check determines the reason.
///
/// ```
/// use openscrape_web::admission::{assess, AdmissionVerdict, DenialReason};
///
/// assert_eq!(assess("https://example.com/page"), AdmissionVerdict::Allowed);
/// assert_eq!(
///     assess("http://192.168.1.1/admin"),
///     AdmissionVerdict::Denied(DenialReason::PrivateAddress)
/// );
/// ```
pub fn assess(url: &str) -> AdmissionVerdict {
    let Ok(parsed) = Url::parse(url) else {
        return AdmissionVerdict::Denied(DenialReason::InvalidFormat);
    };

    let scheme = parsed.scheme().to_ascii_lowercase();
    if BLOCKED_SCHEMES.contains(&scheme.as_str()) {
        return AdmissionVerdict::Denied(DenialReason::BlockedProtocol);
    }

    if let Some(host) = normalized_host(&parsed) {
        if BLOCKED_HOSTS.contains(&host.as_str()) {
            return AdmissionVerdict::Denied(DenialReason::BlockedDomain);
        }
        if is_private_address(&host) {
            return AdmissionVerdict::Denied(DenialReason::PrivateAddress);
        }
    }

    // Re-checked against the allow-list so unknown schemes fail closed.
    if !ALLOWED_SCHEMES.contains(&scheme.as_str()) {
        return AdmissionVerdict::Denied(DenialReason::BlockedProtocol);
    }

    AdmissionVerdict::Allowed
}

/// Lower-cased host without IPv6 brackets or a trailing root dot.
fn normalized_host(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    let host = host.strip_suffix('.').unwrap_or(host);
    Some(host.to_ascii_lowercase())
}

fn is_private_address(host: &str) -> bool {
    match host.parse::<IpAddr>() {
        Ok(ip) => PRIVATE_NETS.iter().any(|net| net.contains(&ip)),
        Err(_) => false,
    }
}
