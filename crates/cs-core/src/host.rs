//! Host utilities: normalization, extraction and same-site checks
//!
//! Everything that stores or compares a site goes through [`normalize_host`],
//! so the allowlist never holds raw URLs.

// =============================================================================
// Scheme / Host Extraction
// =============================================================================

/// Get the position after "://", if the string starts with a scheme.
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    // Find ':'
    let colon_pos = bytes.iter().position(|&b| b == b':')?;
    if colon_pos == 0 || !bytes[..colon_pos].iter().all(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'-' || *b == b'.') {
        return None;
    }

    // Check for "://"
    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

/// Fast host extraction without allocations.
/// Returns a slice into the original URL.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    // Skip userinfo
    let mut host_start = scheme_end;
    for (i, &b) in bytes.iter().enumerate().skip(scheme_end) {
        if b == b'@' {
            host_start = i + 1;
            break;
        }
        if b == b'/' {
            break;
        }
    }

    // Find host end
    let mut host_end = bytes.len();
    for (i, &b) in bytes.iter().enumerate().skip(host_start) {
        if b == b'/' || b == b'?' || b == b'#' || b == b':' {
            host_end = i;
            break;
        }
    }

    Some(&url[host_start..host_end])
}

// =============================================================================
// Normalization
// =============================================================================

/// Normalize a site for storage and comparison: scheme stripped, path
/// stripped, lower-cased.
///
/// ```
/// use cs_core::host::normalize_host;
///
/// assert_eq!(normalize_host("HTTPS://Example.COM/path"), "example.com");
/// assert_eq!(normalize_host("ads.example"), "ads.example");
/// ```
pub fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim();
    let rest = match get_scheme_end(trimmed) {
        Some(pos) => &trimmed[pos..],
        None => trimmed,
    };

    let end = rest
        .find(|c: char| c == '/' || c == '?' || c == '#')
        .unwrap_or(rest.len());

    rest[..end].trim_end_matches('.').to_ascii_lowercase()
}

/// Normalize every entry, drop empties and keep the first occurrence of each
/// domain.
pub fn normalize_allowlist<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for entry in entries {
        let host = normalize_host(entry.as_ref());
        if host.is_empty() || out.contains(&host) {
            continue;
        }
        out.push(host);
    }
    out
}

// =============================================================================
// Same-Site Checks
// =============================================================================

/// Common two-part TLDs for the registrable-domain heuristic.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Registrable domain (eTLD+1) by heuristic.
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').collect();
    let n = labels.len();
    if n <= 2 {
        return labels.join(".");
    }

    let last_two = format!("{}.{}", labels[n - 2], labels[n - 1]);
    if COMMON_TWO_PART_TLDS.contains(&last_two.as_str()) {
        return labels[n - 3..].join(".");
    }

    labels[n - 2..].join(".")
}

/// Check if a request is third-party relative to the initiating site.
pub fn is_third_party(site_host: &str, req_host: &str) -> bool {
    let site = registrable_domain(site_host);
    !site.is_empty() && site != registrable_domain(req_host)
}

/// True when `host` is `domain` or one of its subdomains.
pub fn host_matches_domain(host: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    let host = host.trim_end_matches('.').as_bytes();
    let domain = domain.as_bytes();
    if host.len() == domain.len() {
        return host.eq_ignore_ascii_case(domain);
    }
    host.len() > domain.len()
        && host[host.len() - domain.len() - 1] == b'.'
        && host[host.len() - domain.len()..].eq_ignore_ascii_case(domain)
}
