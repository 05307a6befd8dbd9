//! Fire-and-forget upload to a Carriots-style stream endpoint.
//!
//! One JSON document per measurement cycle. Failures are reported to the
//! caller, which logs and moves on; a missed upload costs one data point on
//! a dashboard, not a reading in the local table.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

const DEFAULT_ENDPOINT: &str = "http://api.carriots.com/streams";
const CONTENT_TYPE: &str = "application/vnd.carriots.api.v2+json";
const USER_AGENT: &str = "Raspberry-Carriots";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not read api key from {path}: {source}")]
    ApiKey {
        path: String,
        source: std::io::Error,
    },
    #[error("endpoint answered {status}")]
    Status { status: reqwest::StatusCode },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Stream document wire format.
#[derive(Serialize)]
struct Stream<'a> {
    protocol: &'static str,
    device: &'a str,
    at: i64,
    data: &'a serde_json::Value,
}

pub struct Client {
    device_id: String,
    api_key: String,
    endpoint: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(device_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Build a client with the key read from a dotfile (first line, trailing
    /// newline trimmed).
    pub fn from_key_file(device_id: impl Into<String>, path: &Path) -> Result<Self, UploadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| UploadError::ApiKey {
            path: path.display().to_string(),
            source,
        })?;
        let key = contents.lines().next().unwrap_or("").trim();
        Ok(Self::new(device_id, key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Post one data document, stamped with the current unix time.
    pub async fn upload(&self, data: &serde_json::Value) -> Result<(), UploadError> {
        let stream = Stream {
            protocol: "v2",
            device: &self.device_id,
            at: Utc::now().timestamp(),
            data,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", CONTENT_TYPE)
            .header("Accept", CONTENT_TYPE)
            .header("Carriots.apikey", &self.api_key)
            .json(&stream)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(UploadError::Status {
                status: response.status(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_document_shape() {
        let data = json!({"Temperature": 72.5, "Status": "OK"});
        let stream = Stream {
            protocol: "v2",
            device: "shed@example",
            at: 1_400_000_000,
            data: &data,
        };
        let value = serde_json::to_value(&stream).unwrap();
        assert_eq!(value["protocol"], "v2");
        assert_eq!(value["device"], "shed@example");
        assert_eq!(value["at"], 1_400_000_000);
        assert_eq!(value["data"]["Status"], "OK");
    }

    #[test]
    fn key_file_trims_trailing_newline() {
        let dir = std::env::temp_dir().join("home-monitor-telemetry-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("key-{}", std::process::id()));
        std::fs::write(&path, "abcdef123456\n").unwrap();

        let client = Client::from_key_file("dev@example", &path).unwrap();
        assert_eq!(client.api_key, "abcdef123456");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_key_file_is_a_config_error() {
        let err = Client::from_key_file("dev@example", Path::new("/nonexistent/.api_key"));
        assert!(matches!(err, Err(UploadError::ApiKey { .. })));
    }
}
