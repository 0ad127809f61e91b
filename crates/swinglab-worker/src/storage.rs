//! Locating and fetching uploaded videos.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{WorkerError, WorkerResult};
use crate::job::JobRequest;

const STORAGE_PREFIX: &str = "/api/storage/";
const DEFAULT_FILENAME: &str = "video.mp4";

/// Absolute download URL for a job's video.
///
/// `videoPath` wins over `videoUrl`. A `videoUrl` under `/api/storage/` is
/// taken relative to the storage server; anything else must be absolute.
pub fn resolve_video_url(storage_base: &str, request: &JobRequest) -> WorkerResult<Url> {
    let base = storage_base.trim_end_matches('/');
    let path = request.video_path.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let url = request.video_url.as_deref().map(str::trim).filter(|u| !u.is_empty());

    let resolved = match (path, url) {
        (Some(path), _) => format!("{base}{STORAGE_PREFIX}{}", path.trim_start_matches('/')),
        (None, Some(url)) if url.starts_with(STORAGE_PREFIX) => format!("{base}{url}"),
        (None, Some(url)) => url.to_string(),
        (None, None) => return Err(WorkerError::invalid_job("Missing videoUrl or videoPath")),
    };

    let parsed = Url::parse(&resolved)
        .map_err(|e| WorkerError::invalid_job(format!("Bad video URL {resolved}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(WorkerError::invalid_job(format!("Unsupported URL scheme: {other}"))),
    }
}

/// File name used for the temp file and reported back in the callback.
pub fn video_filename(request: &JobRequest, resolved: &Url) -> String {
    let from_path = request
        .video_path
        .as_deref()
        .and_then(|p| Path::new(p).file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty());

    let from_url = || {
        resolved
            .path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|n| Path::new(n).extension().is_some())
    };

    from_path
        .or_else(from_url)
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// GET the video bytes.
pub async fn download_video(client: &Client, url: &Url, timeout: Duration) -> WorkerResult<Vec<u8>> {
    debug!(url = %url, "Downloading video");

    let response = client.get(url.clone()).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(WorkerError::DownloadStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| WorkerError::download_failed(e.to_string()))?;
    if bytes.is_empty() {
        return Err(WorkerError::download_failed(format!("Empty body from {url}")));
    }
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(url: Option<&str>, path: Option<&str>) -> JobRequest {
        JobRequest {
            video_url: url.map(str::to_string),
            video_path: path.map(str::to_string),
            callback_url: "http://cb".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_path_wins() {
        let req = request(Some("https://cdn/x.mp4"), Some("user1/swing.mov"));
        let url = resolve_video_url("http://localhost:5003/", &req).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5003/api/storage/user1/swing.mov");
    }

    #[test]
    fn test_resolve_relative_storage_url() {
        let req = request(Some("/api/storage/u/a.mp4"), None);
        let url = resolve_video_url("http://storage:5003", &req).unwrap();
        assert_eq!(url.as_str(), "http://storage:5003/api/storage/u/a.mp4");
    }

    #[test]
    fn test_resolve_absolute_and_invalid() {
        let req = request(Some("https://cdn.example.com/v/a.mp4"), None);
        assert_eq!(
            resolve_video_url("http://s", &req).unwrap().as_str(),
            "https://cdn.example.com/v/a.mp4"
        );

        assert!(resolve_video_url("http://s", &request(Some("videos/a.mp4"), None)).is_err());
        assert!(resolve_video_url("http://s", &request(Some("ftp://h/a.mp4"), None)).is_err());
        assert!(resolve_video_url("http://s", &request(None, None)).is_err());
    }

    #[test]
    fn test_filename() {
        let req = request(None, Some("u/clip.mov"));
        let url = resolve_video_url("http://s", &req).unwrap();
        assert_eq!(video_filename(&req, &url), "clip.mov");

        let req = request(Some("https://cdn/v/swing.webm?sig=1"), None);
        let url = resolve_video_url("http://s", &req).unwrap();
        assert_eq!(video_filename(&req, &url), "swing.webm");

        let req = request(Some("https://cdn/v/stream"), None);
        let url = resolve_video_url("http://s", &req).unwrap();
        assert_eq!(video_filename(&req, &url), "video.mp4");
    }

    #[tokio::test]
    async fn test_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/storage/a.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/storage/missing.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = Client::new();
        let ok = Url::parse(&format!("{}/api/storage/a.mp4", server.uri())).unwrap();
        assert_eq!(
            download_video(&client, &ok, Duration::from_secs(5)).await.unwrap(),
            vec![1, 2, 3]
        );

        let missing = Url::parse(&format!("{}/api/storage/missing.mp4", server.uri())).unwrap();
        match download_video(&client, &missing, Duration::from_secs(5)).await {
            Err(WorkerError::DownloadStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
