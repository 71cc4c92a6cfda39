//! HTTP platform backend.
//!
//! Talks to the platform's v1.1 REST, upload and streaming resources. Requests
//! carry the configured access token as a bearer credential; request signing
//! is left to a fronting proxy when the platform demands it.

use super::types::{MediaId, StreamMessage, Tweet, User};
use super::{PlatformApi, PlatformError};
use crate::config::{ApiEndpoints, CredentialSet};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Deserialize;
use std::thread;

/// Async client for the platform endpoints.
#[derive(Clone)]
pub struct PlatformClient {
    endpoints: ApiEndpoints,
    token: String,
    client: reqwest::Client,
    // The stream stays open indefinitely, so it gets a client without a
    // request timeout.
    stream_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    media_id_string: String,
}

impl PlatformClient {
    /// Create a client authenticating with one credential set.
    pub fn new(endpoints: ApiEndpoints, credentials: &CredentialSet) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Ok(Self {
            endpoints,
            token: credentials.access_token.clone(),
            client,
            stream_client,
        })
    }

    fn rest_url(&self, resource: &str) -> String {
        format!("{}/{}", self.endpoints.rest_base.trim_end_matches('/'), resource)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        match status.as_u16() {
            401 | 403 => Err(PlatformError::Auth(message)),
            404 => Err(PlatformError::NotFound(message)),
            code => Err(PlatformError::Server {
                status: code,
                message,
            }),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        let response = self
            .client
            .get(self.rest_url(resource))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }

    pub async fn verify_credentials(&self) -> Result<(), PlatformError> {
        self.get_json::<User>("account/verify_credentials.json", &[])
            .await
            .map(|_| ())
    }

    pub async fn lookup_user(&self, screen_name: &str) -> Result<User, PlatformError> {
        self.get_json("users/show.json", &[("screen_name", screen_name)])
            .await
    }

    pub async fn user_timeline(
        &self,
        screen_name: &str,
        count: u32,
    ) -> Result<Vec<Tweet>, PlatformError> {
        let count = count.to_string();
        self.get_json(
            "statuses/user_timeline.json",
            &[
                ("screen_name", screen_name),
                ("count", count.as_str()),
                ("exclude_replies", "false"),
                ("include_rts", "true"),
            ],
        )
        .await
    }

    pub async fn upload_media(&self, bytes: &[u8]) -> Result<MediaId, PlatformError> {
        let url = format!(
            "{}/media/upload.json",
            self.endpoints.upload_base.trim_end_matches('/')
        );
        let form = reqwest::multipart::Form::new()
            .part("media", reqwest::multipart::Part::bytes(bytes.to_vec()));

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let upload: UploadResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;
        Ok(MediaId(upload.media_id_string))
    }

    pub async fn post_status(&self, text: &str, media: &[MediaId]) -> Result<(), PlatformError> {
        let media_ids = media
            .iter()
            .map(|m| m.0.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .post(self.rest_url("statuses/update.json"))
            .bearer_auth(&self.token)
            .form(&[("status", text), ("media_ids", media_ids.as_str())])
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Self::check(response).await.map(|_| ())
    }

    /// Read the filtered stream for `user_id`, forwarding every complete
    /// newline-delimited message to `sender` until either side goes away.
    pub async fn pump_stream(
        &self,
        user_id: &str,
        sender: Sender<StreamMessage>,
    ) -> Result<(), PlatformError> {
        let url = format!(
            "{}/statuses/filter.json",
            self.endpoints.stream_base.trim_end_matches('/')
        );
        let mut response = self
            .stream_client
            .post(url)
            .bearer_auth(&self.token)
            .form(&[("follow", user_id), ("filter_level", "none")])
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        response = Self::check(response).await?;

        let mut pending: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?
        {
            pending.extend_from_slice(&chunk);
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                // Keep-alive newlines carry no payload.
                if line.is_empty() {
                    continue;
                }
                match StreamMessage::from_json(line) {
                    Ok(message) => {
                        if sender.send(message).is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => tracing::warn!("undecodable stream message: {e}"),
                }
            }
        }
        Ok(())
    }
}

/// Blocking platform backend for the synchronous pipeline.
pub struct HttpPlatform {
    inner: PlatformClient,
    runtime: tokio::runtime::Runtime,
}

impl HttpPlatform {
    /// Create a blocking backend authenticating with one credential set.
    pub fn new(endpoints: ApiEndpoints, credentials: &CredentialSet) -> Result<Self, PlatformError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            inner: PlatformClient::new(endpoints, credentials)?,
            runtime,
        })
    }
}

impl PlatformApi for HttpPlatform {
    fn verify_credentials(&self) -> Result<(), PlatformError> {
        self.runtime.block_on(self.inner.verify_credentials())
    }

    fn lookup_user(&self, screen_name: &str) -> Result<User, PlatformError> {
        self.runtime.block_on(self.inner.lookup_user(screen_name))
    }

    fn user_timeline(&self, screen_name: &str, count: u32) -> Result<Vec<Tweet>, PlatformError> {
        self.runtime
            .block_on(self.inner.user_timeline(screen_name, count))
    }

    fn open_stream(&self, user_id: &str) -> Result<Receiver<StreamMessage>, PlatformError> {
        let (sender, receiver) = unbounded();
        let client = self.inner.clone();
        let user_id = user_id.to_string();

        thread::Builder::new()
            .name("platform-stream".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("could not start stream runtime: {e}");
                        return;
                    }
                };
                if let Err(e) = runtime.block_on(client.pump_stream(&user_id, sender)) {
                    tracing::error!("stream ended: {e}");
                }
            })?;

        Ok(receiver)
    }

    fn upload_media(&self, bytes: &[u8]) -> Result<MediaId, PlatformError> {
        self.runtime.block_on(self.inner.upload_media(bytes))
    }

    fn post_status(&self, text: &str, media: &[MediaId]) -> Result<(), PlatformError> {
        self.runtime.block_on(self.inner.post_status(text, media))
    }
}
