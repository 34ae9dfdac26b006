//! Registrable-domain (eTLD+1) reduction over a compact suffix table.
//!
//! Every final label counts as a public suffix. The table below only lists
//! multi-label suffixes (country second-level registries and a handful of
//! well-known private registries) that must not be treated as a site on
//! their own.

use std::net::Ipv4Addr;

const MULTI_LABEL_SUFFIXES: &[&str] = &[
    // Country second-level registries.
    "ac.jp", "ac.uk", "co.in", "co.jp", "co.kr", "co.nz", "co.uk", "co.za", "com.au", "com.br",
    "com.cn", "com.mx", "com.sg", "com.tr", "com.tw", "edu.au", "gov.au", "gov.uk", "ltd.uk",
    "me.uk", "ne.jp", "net.au", "net.cn", "net.uk", "or.jp", "org.au", "org.cn", "org.nz",
    "org.uk", "plc.uk",
    // Private registries.
    "appspot.com", "azurewebsites.net", "blogspot.com", "cloudfront.net", "github.io",
    "herokuapp.com", "netlify.app", "pages.dev", "s3.amazonaws.com", "vercel.app",
];

/// Registrable domain of `host`, as a suffix slice of it.
///
/// Returns `None` for IP literals, single-label hosts, hosts with empty
/// labels, and hosts that are themselves a public suffix. Callers keep the
/// full host in those cases.
pub(crate) fn registrable_domain(host: &str) -> Option<&str> {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.starts_with('[') || host.parse::<Ipv4Addr>().is_ok() {
        return None;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.iter().any(|l| l.is_empty()) {
        return None;
    }

    let suffix_labels = MULTI_LABEL_SUFFIXES
        .iter()
        .filter(|s| is_dotted_suffix(host, s))
        .map(|s| s.split('.').count())
        .max()
        .unwrap_or(1);
    if labels.len() <= suffix_labels {
        return None;
    }

    let skip = labels.len() - suffix_labels - 1;
    let start: usize = labels[..skip].iter().map(|l| l.len() + 1).sum();
    Some(&host[start..])
}

/// `host == suffix` or `host` ends with `.suffix`.
fn is_dotted_suffix(host: &str, suffix: &str) -> bool {
    host.strip_suffix(suffix)
        .is_some_and(|rest| rest.is_empty() || rest.ends_with('.'))
}
