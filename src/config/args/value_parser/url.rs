use url::Url;

const INVALID_SCHEME: &str = "URL scheme must be https:// or http://";
const MISSING_HOST: &str = "URL must name a host";

/// Accept an http(s) service URL and drop any trailing slash, so paths can
/// be appended with a single `/`.
pub fn check_service_url(url: &str) -> Result<String, String> {
    let parsed = Url::parse(url).map_err(|e| e.to_string())?;

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(INVALID_SCHEME.to_string());
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(MISSING_HOST.to_string());
    }

    Ok(url.trim_end_matches('/').to_string())
}
