use url::Url;

/// Whether `candidate` is an absolute `http` or `https` URL with a host
pub fn is_valid_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()))
}
