//! Clients for the extension manager and app manager APIs.

use crate::config::ServiceUrls;
use crate::constants::DEVELOP_TAG;
use crate::error::{CliError, CliResult};
use crate::manifest::CanonicalName;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// API version prefix.
const API_PREFIX: &str = "/v1";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Upload progress callback: `(bytes_sent, total_bytes)`.
pub type UploadProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Outcome of an existence probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

/// The developer owning the current token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Developer {
    /// Developer id.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Developer name, the prefix of every canonical name.
    pub name: String,
}

/// Extension record as stored by the extension manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteExtension {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub version: String,
    /// `develop` until the version is published.
    #[serde(default)]
    pub tag: Option<String>,
}

/// Result of publishing an extension version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishedExtension {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub version: String,
}

/// Binding of an extension version to an app.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Installation {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Id of the installed extension version.
    #[serde(deserialize_with = "string_or_number")]
    pub extension: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
}

#[derive(Debug, Serialize)]
struct InstallationRequest<'a> {
    extension: &'a str,
}

/// Operations on the extension registry.
#[async_trait]
pub trait ExtensionRegistry: Send + Sync {
    /// Return the developer owning the current token, `NotFound` when the
    /// account has no developer yet.
    async fn get_developer(&self) -> CliResult<Lookup<Developer>>;

    /// Register a developer for the current account.
    async fn create_developer(&self, name: &str) -> CliResult<Developer>;

    /// Upload an extension archive and return the id the server assigned to it.
    async fn upload_extension(
        &self,
        canonical: &CanonicalName,
        archive: &Path,
        on_progress: Option<UploadProgress>,
    ) -> CliResult<String>;

    /// Look up an extension by canonical name or id.
    async fn get_extension(&self, name_or_id: &str) -> CliResult<Lookup<RemoteExtension>>;

    /// Mark an uploaded extension version as published.
    async fn publish_extension(&self, canonical: &CanonicalName) -> CliResult<PublishedExtension>;

    /// Whether this exact version may still be published.
    ///
    /// True when nothing is recorded under the name or the record is still a
    /// `develop` upload.
    async fn can_publish(&self, canonical: &CanonicalName) -> CliResult<bool> {
        Ok(match self.get_extension(&canonical.to_string()).await? {
            Lookup::NotFound => true,
            Lookup::Found(ext) => ext.tag.as_deref() == Some(DEVELOP_TAG),
        })
    }
}

/// Operations on app installations.
#[async_trait]
pub trait AppRegistry: Send + Sync {
    /// Look up the installation of an extension in an app.
    async fn get_installation(
        &self,
        app_id: &str,
        canonical: &str,
    ) -> CliResult<Lookup<Installation>>;

    /// Install an extension version into an app.
    async fn install_extension(&self, app_id: &str, extension_id: &str) -> CliResult<()>;

    /// Point an existing installation at another extension version.
    async fn update_installation(
        &self,
        app_id: &str,
        installation_id: &str,
        extension_id: &str,
    ) -> CliResult<()>;
}

/// Client for the extension manager.
#[derive(Debug, Clone)]
pub struct ExtensionManagerClient {
    url: String,
    token: Option<String>,
    http: Client,
}

/// Client for the app manager.
#[derive(Debug, Clone)]
pub struct AppManagerClient {
    url: String,
    token: Option<String>,
    http: Client,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExtensionManagerClient {
    /// Create a client for the given service URLs.
    pub fn new(services: &ServiceUrls) -> CliResult<Self> {
        Ok(Self {
            url: services.extension_manager.trim_end_matches('/').to_string(),
            token: None,
            http: http_client()?,
        })
    }

    /// Set the authentication token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, name_or_id: &str) -> String {
        format!(
            "{}{}/extensions/{}",
            self.url,
            API_PREFIX,
            urlencoding::encode(name_or_id)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> CliResult<RequestBuilder> {
        let token = self.token.as_ref().ok_or(CliError::NotLoggedIn)?;
        Ok(request.bearer_auth(token))
    }
}

#[async_trait]
impl ExtensionRegistry for ExtensionManagerClient {
    async fn get_developer(&self) -> CliResult<Lookup<Developer>> {
        let url = format!("{}{}/devs/me", self.url, API_PREFIX);
        let response = self.authorized(self.http.get(&url))?.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Lookup::NotFound);
        }

        let response = check_status(response, "Fetch developer").await?;
        Ok(Lookup::Found(parse_resource(response.json().await?)?))
    }

    async fn create_developer(&self, name: &str) -> CliResult<Developer> {
        let url = format!("{}{}/devs", self.url, API_PREFIX);
        let response = self
            .authorized(self.http.post(&url))?
            .json(&serde_json::json!({
                "data": {
                    "type": "shoutem.core.developers",
                    "attributes": { "name": name },
                }
            }))
            .send()
            .await?;
        let response = check_status(response, "Create developer").await?;
        parse_resource(response.json().await?)
    }

    async fn upload_extension(
        &self,
        canonical: &CanonicalName,
        archive: &Path,
        on_progress: Option<UploadProgress>,
    ) -> CliResult<String> {
        // Forces the access token to refresh before a long upload.
        if let Lookup::NotFound = self.get_developer().await? {
            tracing::debug!("no developer registered yet, uploading anyway");
        }

        let file = tokio::fs::File::open(archive).await?;
        let size = file.metadata().await?.len();

        let progress = on_progress.clone();
        let mut sent = 0u64;
        let stream = ReaderStream::new(file).inspect_ok(move |chunk| {
            sent += chunk.len() as u64;
            if let Some(cb) = &progress {
                cb(sent, size);
            }
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), size)
            .file_name("extension.tgz")
            .mime_str("application/gzip")?;
        let form = Form::new().part("extension", part);

        let url = self.endpoint(&canonical.to_string());
        tracing::debug!("uploading {} ({} bytes) to {}", archive.display(), size, url);

        let response = self
            .authorized(self.http.put(&url))?
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response, "Upload").await?;

        if let Some(cb) = &on_progress {
            cb(size, size);
        }

        let uploaded: UploadResponse = parse_resource(response.json().await?)?;
        Ok(uploaded.id)
    }

    async fn get_extension(&self, name_or_id: &str) -> CliResult<Lookup<RemoteExtension>> {
        let response = self
            .authorized(self.http.get(self.endpoint(name_or_id)))?
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Lookup::NotFound);
        }

        let response = check_status(response, "Fetch extension").await?;
        Ok(Lookup::Found(parse_resource(response.json().await?)?))
    }

    async fn publish_extension(&self, canonical: &CanonicalName) -> CliResult<PublishedExtension> {
        let url = format!("{}/publish", self.endpoint(&canonical.to_string()));
        let response = self.authorized(self.http.post(&url))?.send().await?;
        let response = check_status(response, "Publish").await?;
        parse_resource(response.json().await?)
    }
}

impl AppManagerClient {
    /// Create a client for the given service URLs.
    pub fn new(services: &ServiceUrls) -> CliResult<Self> {
        Ok(Self {
            url: services.app_manager.trim_end_matches('/').to_string(),
            token: None,
            http: http_client()?,
        })
    }

    /// Set the authentication token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn installations(&self, app_id: &str) -> String {
        format!(
            "{}{}/apps/{}/installations",
            self.url,
            API_PREFIX,
            urlencoding::encode(app_id)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> CliResult<RequestBuilder> {
        let token = self.token.as_ref().ok_or(CliError::NotLoggedIn)?;
        Ok(request.bearer_auth(token))
    }
}

#[async_trait]
impl AppRegistry for AppManagerClient {
    async fn get_installation(
        &self,
        app_id: &str,
        canonical: &str,
    ) -> CliResult<Lookup<Installation>> {
        let url = format!(
            "{}/{}",
            self.installations(app_id),
            urlencoding::encode(canonical)
        );
        let response = self.authorized(self.http.get(&url))?.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Lookup::NotFound);
        }

        let response = check_status(response, "Fetch installation").await?;
        Ok(Lookup::Found(parse_resource(response.json().await?)?))
    }

    async fn install_extension(&self, app_id: &str, extension_id: &str) -> CliResult<()> {
        let response = self
            .authorized(self.http.post(self.installations(app_id)))?
            .json(&InstallationRequest {
                extension: extension_id,
            })
            .send()
            .await?;
        check_status(response, "Install extension").await?;
        Ok(())
    }

    async fn update_installation(
        &self,
        app_id: &str,
        installation_id: &str,
        extension_id: &str,
    ) -> CliResult<()> {
        let url = format!(
            "{}/{}",
            self.installations(app_id),
            urlencoding::encode(installation_id)
        );
        let response = self
            .authorized(self.http.patch(&url))?
            .json(&InstallationRequest {
                extension: extension_id,
            })
            .send()
            .await?;
        check_status(response, "Update installation").await?;
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn http_client() -> CliResult<Client> {
    Ok(Client::builder()
        .user_agent(concat!("shoutem-cli/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Turn a non-success response into `CliError::Remote`.
async fn check_status(response: Response, operation: &str) -> CliResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!("{} failed ({}): {}", operation, status, body);

    Err(CliError::Remote {
        operation: operation.to_string(),
        status: status.as_u16(),
        message: error_message(&body).unwrap_or(body),
    })
}

/// Extract a readable message from a JSON or JSON:API error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    if let Some(errors) = value.get("errors").and_then(|e| e.as_array()) {
        let messages: Vec<String> = errors
            .iter()
            .filter_map(|e| {
                e.get("detail")
                    .or_else(|| e.get("title"))
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .collect();
        if !messages.is_empty() {
            return Some(messages.join(", "));
        }
    }

    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(String::from)
}

/// Flatten a JSON:API resource object into a plain object.
///
/// `{ id, attributes: {..}, relationships: { x: { data: { id } } } }` becomes
/// `{ id, .., x: id }`. Plain objects pass through unchanged.
fn flatten_resource(value: serde_json::Value) -> serde_json::Value {
    let serde_json::Value::Object(mut obj) = value else {
        return value;
    };

    let Some(serde_json::Value::Object(attributes)) = obj.remove("attributes") else {
        return serde_json::Value::Object(obj);
    };

    let mut flat = serde_json::Map::new();
    if let Some(id) = obj.remove("id") {
        flat.insert("id".to_string(), id);
    }
    flat.extend(attributes);

    if let Some(serde_json::Value::Object(relationships)) = obj.remove("relationships") {
        for (key, rel) in relationships {
            if let Some(id) = rel.get("data").and_then(|d| d.get("id")) {
                flat.entry(key).or_insert_with(|| id.clone());
            }
        }
    }

    serde_json::Value::Object(flat)
}

fn parse_resource<T: DeserializeOwned>(mut value: serde_json::Value) -> CliResult<T> {
    if let Some(data) = value.get_mut("data")
        && data.is_object()
    {
        value = data.take();
    }
    Ok(serde_json::from_value(flatten_resource(value))?)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
