use std::path::{Path, PathBuf};

use anyhow::Context;
use reqwest::multipart::{Form, Part};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/upload";
pub const OUTPUT_FILE: &str = "measurements.csv";

pub const MSG_MISSING_IMAGES: &str = "Please upload both images.";
pub const MSG_SUCCESS: &str = "Measurements downloaded successfully!";
pub const MSG_REJECTED: &str = "Error uploading images.";
pub const MSG_FAILED: &str = "An error occurred. Please try again.";

/// What a submission attempt produced: the short user-facing message, and
/// the path of the downloaded CSV when the request succeeded.
#[derive(Debug)]
pub struct UploadOutcome {
    pub message: String,
    pub saved_to: Option<PathBuf>,
}

enum SubmitError {
    /// The backend answered with a non-success status.
    Rejected,
    /// The request never completed or a local read/write failed.
    Failed(anyhow::Error),
}

/// Posts a front and a side photograph to the measurement backend as one
/// multipart request and saves the CSV response body. One request per
/// submission; no retry, no partial success.
pub struct MeasurementClient {
    endpoint: String,
    output_dir: PathBuf,
    client: reqwest::Client,
}

impl MeasurementClient {
    pub fn new(endpoint: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            output_dir: output_dir.into(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn submit(&self, front: Option<&Path>, side: Option<&Path>) -> UploadOutcome {
        let (Some(front), Some(side)) = (front, side) else {
            return UploadOutcome {
                message: MSG_MISSING_IMAGES.to_string(),
                saved_to: None,
            };
        };

        match self.try_submit(front, side).await {
            Ok(saved_to) => UploadOutcome {
                message: MSG_SUCCESS.to_string(),
                saved_to: Some(saved_to),
            },
            Err(SubmitError::Rejected) => UploadOutcome {
                message: MSG_REJECTED.to_string(),
                saved_to: None,
            },
            Err(SubmitError::Failed(error)) => {
                log::error!("Measurement upload failed: {error:#}");
                UploadOutcome {
                    message: MSG_FAILED.to_string(),
                    saved_to: None,
                }
            }
        }
    }

    async fn try_submit(&self, front: &Path, side: &Path) -> Result<PathBuf, SubmitError> {
        let form = Form::new()
            .part("front_image", part_from_file(front).map_err(SubmitError::Failed)?)
            .part("side_image", part_from_file(side).map_err(SubmitError::Failed)?);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|error| SubmitError::Failed(error.into()))?;

        if !response.status().is_success() {
            return Err(SubmitError::Rejected);
        }

        let body = response
            .bytes()
            .await
            .map_err(|error| SubmitError::Failed(error.into()))?;

        let output_path = self.output_dir.join(OUTPUT_FILE);
        std::fs::write(&output_path, &body)
            .with_context(|| format!("Failed to write {}", output_path.display()))
            .map_err(SubmitError::Failed)?;

        Ok(output_path)
    }
}

fn part_from_file(path: &Path) -> anyhow::Result<Part> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    Ok(Part::bytes(bytes).file_name(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server: accepts a single connection, reads the full
    /// request, and answers with the given status line and body.
    async fn one_shot_server(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];

            // Read headers, then the declared body length.
            let header_end = loop {
                let read = stream.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..read]);
                if let Some(position) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break position + 4;
                }
            };

            let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
            let content_length: usize = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(0);

            while request.len() - header_end < content_length {
                let read = stream.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..read]);
            }

            let response = format!(
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.write_all(body).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        format!("http://{address}/upload")
    }

    fn write_image(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"not really a jpeg").unwrap();
        path
    }

    #[tokio::test]
    async fn missing_images_short_circuit_without_a_request() {
        let dir = tempfile::tempdir().unwrap();
        let front = write_image(dir.path(), "front.jpg");

        // Unroutable endpoint: any attempted request would error loudly
        // rather than produce the missing-images message.
        let client = MeasurementClient::new("http://127.0.0.1:1/upload", dir.path());

        for (front, side) in [
            (None, None),
            (Some(front.as_path()), None),
            (None, Some(front.as_path())),
        ] {
            let outcome = client.submit(front, side).await;
            assert_eq!(outcome.message, MSG_MISSING_IMAGES);
            assert!(outcome.saved_to.is_none());
        }

        assert!(!dir.path().join(OUTPUT_FILE).exists());
    }

    #[tokio::test]
    async fn successful_upload_downloads_one_csv() {
        let dir = tempfile::tempdir().unwrap();
        let front = write_image(dir.path(), "front.jpg");
        let side = write_image(dir.path(), "side.jpg");

        let endpoint = one_shot_server("HTTP/1.1 200 OK", b"waist,92\nchest,101\n").await;
        let client = MeasurementClient::new(endpoint, dir.path());

        let outcome = client.submit(Some(&front), Some(&side)).await;
        assert_eq!(outcome.message, MSG_SUCCESS);

        let saved_to = outcome.saved_to.expect("a CSV should have been saved");
        assert_eq!(saved_to, dir.path().join(OUTPUT_FILE));
        assert_eq!(
            std::fs::read(&saved_to).unwrap(),
            b"waist,92\nchest,101\n".to_vec()
        );
    }

    #[tokio::test]
    async fn rejected_upload_reports_error_message() {
        let dir = tempfile::tempdir().unwrap();
        let front = write_image(dir.path(), "front.jpg");
        let side = write_image(dir.path(), "side.jpg");

        let endpoint = one_shot_server("HTTP/1.1 500 Internal Server Error", b"").await;
        let client = MeasurementClient::new(endpoint, dir.path());

        let outcome = client.submit(Some(&front), Some(&side)).await;
        assert_eq!(outcome.message, MSG_REJECTED);
        assert!(outcome.saved_to.is_none());
        assert!(!dir.path().join(OUTPUT_FILE).exists());
    }

    #[tokio::test]
    async fn unreachable_backend_reports_generic_failure() {
        let dir = tempfile::tempdir().unwrap();
        let front = write_image(dir.path(), "front.jpg");
        let side = write_image(dir.path(), "side.jpg");

        let client = MeasurementClient::new("http://127.0.0.1:1/upload", dir.path());

        let outcome = client.submit(Some(&front), Some(&side)).await;
        assert_eq!(outcome.message, MSG_FAILED);
        assert!(outcome.saved_to.is_none());
    }
}
