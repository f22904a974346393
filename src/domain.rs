/// Domain normalization and matching for StoicFocus rules
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static SCHEME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9+.\-]*://").expect("scheme pattern is valid"));

static WWW_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^www\.").expect("www pattern is valid"));

/// Normalize a user- or browser-supplied domain value into a bare hostname
///
/// Algorithm:
/// 1. Trim whitespace; blank input stays empty
/// 2. If the value looks like a full URL, take its parsed hostname
/// 3. Lowercase, then strip any leftover scheme and a leading "www."
/// 4. Cut everything from the first '/', '?' or '#' (path, query, fragment)
/// 5. Drop a trailing ":port"
///
/// Examples:
/// - https://www.example.com/ → example.com
/// - http://mail.google.com/inbox → mail.google.com
/// - HTTPS://WWW.EXAMPLE.COM → example.com
/// - localhost:3000 → localhost
pub fn normalize_domain(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut host = if trimmed.contains("://") {
        Url::parse(trimmed)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| trimmed.to_string())
    } else {
        trimmed.to_string()
    };

    host = host.to_lowercase();
    host = SCHEME_PREFIX.replace(&host, "").into_owned();
    host = WWW_PREFIX.replace(&host, "").into_owned();

    if let Some(end) = host.find(['/', '?', '#']) {
        host.truncate(end);
    }

    // Keep bracketed IPv6 literals intact
    if !host.starts_with('[') {
        if let Some(colon) = host.rfind(':') {
            if host[colon + 1..].chars().all(|c| c.is_ascii_digit()) {
                host.truncate(colon);
            }
        }
    }

    host
}

/// Host of a navigated URL, normalized
///
/// Malformed URLs never fail: the raw string is treated as the domain.
pub fn host_of(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => normalize_domain(host),
            None => normalize_domain(url),
        },
        Err(_) => normalize_domain(url),
    }
}

/// Decide whether a candidate host matches a rule domain
///
/// Matches on equality or when either side is a strict subdomain of the
/// other. The reverse direction is intentional: a stored "a.b.com" also
/// catches a visit to "b.com".
pub fn domains_match(candidate: &str, rule: &str) -> bool {
    let candidate = normalize_domain(candidate);
    let rule = normalize_domain(rule);
    if candidate.is_empty() || rule.is_empty() {
        return false;
    }

    candidate == rule || is_subdomain_of(&candidate, &rule) || is_subdomain_of(&rule, &candidate)
}

fn is_subdomain_of(host: &str, parent: &str) -> bool {
    host.len() > parent.len() + 1
        && host.ends_with(parent)
        && host.as_bytes()[host.len() - parent.len() - 1] == b'.'
}

/// Check if a URL points at a browser-internal page the extension must ignore
pub fn is_internal_page(url: &str) -> bool {
    let url = url.trim_start();
    ["chrome://", "chrome-extension://", "edge://", "about:", "moz-extension://"]
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_protocol_www_and_slashes() {
        assert_eq!(normalize_domain("https://www.example.com/"), "example.com");
        assert_eq!(normalize_domain("http://example.com//"), "example.com");
    }

    #[test]
    fn test_normalize_extracts_hostname_from_url() {
        assert_eq!(normalize_domain("https://calendar.google.com/"), "calendar.google.com");
        assert_eq!(normalize_domain("http://mail.google.com/inbox"), "mail.google.com");
    }

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(normalize_domain("HTTPS://WWW.EXAMPLE.COM"), "example.com");
        assert_eq!(normalize_domain("Reddit.COM"), "reddit.com");
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize_domain(""), "");
        assert_eq!(normalize_domain("   "), "");
    }

    #[test]
    fn test_normalize_strips_port_and_path_without_scheme() {
        assert_eq!(normalize_domain("localhost:3000"), "localhost");
        assert_eq!(normalize_domain("www.news.ycombinator.com/item?id=1"), "news.ycombinator.com");
    }

    #[test]
    fn test_host_of_urls() {
        assert_eq!(host_of("https://www.youtube.com/watch?v=abc"), "youtube.com");
        assert_eq!(host_of("https://old.reddit.com/r/rust"), "old.reddit.com");
        assert_eq!(host_of("http://127.0.0.1:8080/"), "127.0.0.1");
    }

    #[test]
    fn test_host_of_malformed_falls_back_to_raw() {
        assert_eq!(host_of("not a url"), "not a url");
        assert_eq!(host_of("reddit.com"), "reddit.com");
    }

    #[test]
    fn test_domains_match_exact() {
        assert!(domains_match("reddit.com", "reddit.com"));
        assert!(domains_match("www.reddit.com", "reddit.com"));
        assert!(!domains_match("reddit.com", "redd.it"));
    }

    #[test]
    fn test_domains_match_both_subdomain_directions() {
        assert!(domains_match("a.b.com", "b.com"));
        assert!(domains_match("b.com", "a.b.com"));
    }

    #[test]
    fn test_domains_match_requires_label_boundary() {
        assert!(!domains_match("notreddit.com", "reddit.com"));
        assert!(!domains_match("reddit.com", "notreddit.com"));
    }

    #[test]
    fn test_domains_match_empty_never_matches() {
        assert!(!domains_match("", "reddit.com"));
        assert!(!domains_match("reddit.com", "  "));
    }

    #[test]
    fn test_is_internal_page() {
        assert!(is_internal_page("chrome://extensions"));
        assert!(is_internal_page("chrome-extension://abc/blocked.html"));
        assert!(!is_internal_page("https://chrome.google.com"));
    }
}
