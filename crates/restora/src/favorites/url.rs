use reqwest::Url;

/// Reduces a media URL to scheme, host, port and path.
///
/// Signed URLs for the same object differ only in their query, so two
/// favorites with equal normalized URLs reference the same media. Strings
/// that do not parse as absolute URLs just lose their query and fragment.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() => {
            let mut out = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or_default());
            if let Some(port) = parsed.port() {
                out.push(':');
                out.push_str(&port.to_string());
            }
            out.push_str(parsed.path());
            out
        }
        _ => trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or(trimmed)
            .to_string(),
    }
}
