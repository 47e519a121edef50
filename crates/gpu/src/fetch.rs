//! Fetching encoded image bytes.

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::debug;
use url::Url;

/// Source of encoded image bytes for URL texture loads.
///
/// Fetching touches no GL state; the texture manager only needs the bytes.
pub trait ImageFetcher {
    fn fetch(&self, source: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, String>>;
}

/// `http(s)://` through `reqwest`, `file://` URLs and bare paths through the
/// filesystem.
#[derive(Clone, Default)]
pub struct DefaultFetcher {
    client: reqwest::Client,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ImageFetcher for DefaultFetcher {
    fn fetch(&self, source: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, String>> {
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let client = self.client.clone();
                async move {
                    debug!(%url, "fetching image");
                    let response = client
                        .get(url)
                        .send()
                        .await
                        .and_then(|r| r.error_for_status())
                        .map_err(|e| e.to_string())?;
                    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
                    Ok(bytes.to_vec())
                }
                .boxed_local()
            }
            Ok(url) if url.scheme() == "file" => futures::future::ready(read_file_url(&url)).boxed_local(),
            // single-letter schemes are Windows drive letters
            Ok(url) if url.scheme().len() > 1 => {
                let scheme = url.scheme().to_string();
                futures::future::ready(Err(format!("unsupported scheme: {scheme}"))).boxed_local()
            }
            _ => {
                let result = std::fs::read(source).map_err(|e| e.to_string());
                futures::future::ready(result).boxed_local()
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn read_file_url(url: &Url) -> Result<Vec<u8>, String> {
    let path = url
        .to_file_path()
        .map_err(|_| format!("invalid file URL: {url}"))?;
    std::fs::read(path).map_err(|e| e.to_string())
}

#[cfg(target_arch = "wasm32")]
fn read_file_url(url: &Url) -> Result<Vec<u8>, String> {
    Err(format!("file URLs are not readable in the browser: {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_plain_paths() {
        let path = std::env::temp_dir().join("tinyui_fetch_test.bin");
        std::fs::write(&path, b"abc").unwrap();
        let bytes = futures::executor::block_on(DefaultFetcher::new().fetch(path.to_str().unwrap()));
        assert_eq!(bytes.unwrap(), b"abc");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let result = futures::executor::block_on(DefaultFetcher::new().fetch("ftp://example.com/a.png"));
        assert!(result.unwrap_err().contains("unsupported scheme"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = futures::executor::block_on(DefaultFetcher::new().fetch("/definitely/not/here.png"));
        assert!(result.is_err());
    }
}
