use std::io;
use std::path::Path;

/// Get standard user agent string
pub fn get_user_agent() -> &'static str {
    "SpriteFetch"
}

/// Download `url` into `target`, failing on any non-success status
pub async fn download_file(client: &reqwest::Client, url: &str, target: &Path) -> io::Result<()> {
    let response = client
        .get(url)
        .header("User-Agent", get_user_agent())
        .send()
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("HTTP request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("HTTP {} for URL: {}", response.status(), url),
        ));
    }

    let bytes = response.bytes().await.map_err(|e| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to read response bytes: {}", e),
        )
    })?;

    tokio::fs::write(target, &bytes).await.map_err(|e| {
        io::Error::new(io::ErrorKind::Other, format!("Failed to write file: {}", e))
    })
}
