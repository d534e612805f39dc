//! Single-request dispatch.
//!
//! [`Transport::send`] adds the account key, command name and response
//! format to the parameters, signs them and issues exactly one HTTP call.
//! Retries live in [`crate::retry`].

use crate::envelope;
use crate::error::{KcpsError, Result};
use crate::params::ParameterSet;
use crate::signer::{Credentials, Method, SignedRequest};
use crate::types::ApiErrorBody;
use reqwest::Client as HttpClient;
use serde_json::Value;
use tracing::debug;

/// Commands sent as a form POST so large payloads (user data) fit.
pub const POST_COMMANDS: &[&str] = &["deployVirtualMachine", "updateVirtualMachine"];

/// Signs and sends requests against one endpoint.
#[derive(Clone)]
pub struct Transport {
    http: HttpClient,
    base_url: String,
    credentials: Credentials,
    http_get_only: bool,
}

impl Transport {
    /// Create a transport over an existing HTTP client.
    ///
    /// With `http_get_only` every command is sent as GET.
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        credentials: Credentials,
        http_get_only: bool,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
            http_get_only,
        }
    }

    /// Get the API endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the credentials requests are signed with.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// HTTP method used for `command`.
    pub fn method_for(&self, command: &str) -> Method {
        if !self.http_get_only && POST_COMMANDS.contains(&command) {
            Method::Post
        } else {
            Method::Get
        }
    }

    /// Build the signed request for `command`.
    pub fn prepare(&self, command: &str, params: &ParameterSet) -> SignedRequest {
        let mut params = params.clone();
        params
            .set("apiKey", self.credentials.api_key())
            .set("command", command)
            .set("response", "json");
        SignedRequest::new(self.method_for(command), params, &self.credentials)
    }

    /// Issue one call and return the unwrapped payload.
    pub async fn send(&self, command: &str, params: &ParameterSet) -> Result<Value> {
        let request = self.prepare(command, params);
        debug!(command, method = ?request.method, "sending request");

        let response = match request.method {
            Method::Post => {
                self.http
                    .post(&self.base_url)
                    .form(&request.form())
                    .send()
                    .await?
            }
            Method::Get => self.http.get(request.url(&self.base_url)).send().await?,
        };

        let status = response.status();
        let body = response.bytes().await?;
        debug!(command, status = status.as_u16(), bytes = body.len(), "received response");

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        envelope::unwrap_bytes(&body)
    }
}

/// Build an API error from a non-2xx body, enveloped or bare.
fn api_error(http_status: u16, body: &[u8]) -> KcpsError {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let error_body = parsed.and_then(|value| {
        let candidate = match envelope::unwrap(value.clone()) {
            Ok(inner) if inner.get("errortext").is_some() || inner.get("errorcode").is_some() => {
                inner
            }
            _ => value,
        };
        serde_json::from_value::<ApiErrorBody>(candidate).ok()
    });

    match error_body {
        Some(e) => KcpsError::Api {
            http_status,
            error_code: e.errorcode,
            cs_error_code: e.cserrorcode,
            error_text: e.errortext,
        },
        None => KcpsError::Api {
            http_status,
            error_code: i64::from(http_status),
            cs_error_code: 0,
            error_text: String::from_utf8_lossy(body).into_owned(),
        },
    }
}
