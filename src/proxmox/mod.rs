//! Minimal blocking client for the Proxmox VE JSON API
//!
//! Supports password login (ticket cookie) and API tokens. Every response
//! body is an envelope `{"data": ...}`; [`ProxmoxApi::get`] hands back the
//! inner `data` value.

pub mod error;

pub use error::ApiError;

use crate::config::Settings;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{AUTHORIZATION, COOKIE};
use serde::Deserialize;
use serde_json::Value;

/// Read access to the API, keyed by path relative to `/api2/json`
pub trait ProxmoxApi {
    fn get(&self, path: &str) -> Result<Value, ApiError>;
}

#[derive(Debug, Clone)]
enum Auth {
    /// `PVEAuthCookie` ticket from `/access/ticket`
    Ticket(String),
    /// Full `Authorization` header value for an API token
    Token(String),
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TicketData {
    ticket: Option<String>,
}

pub struct ProxmoxClient {
    http: Client,
    base_url: String,
    user: String,
    auth: Auth,
}

impl ProxmoxClient {
    /// Connect to `https://{host}:{port}/api2/json` and verify the credentials
    pub fn connect(settings: &Settings) -> Result<Self, ApiError> {
        Self::connect_with_base_url(&api_base_url(&settings.host, settings.port), settings)
    }

    /// Connect to an explicit API base URL (everything up to and including
    /// `/api2/json`)
    pub fn connect_with_base_url(base_url: &str, settings: &Settings) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .user_agent(concat!("proxmox-node-source/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let auth = if settings.user.contains('!') {
            tracing::debug!("Using API token authentication for {}", settings.user);
            Auth::Token(format!(
                "PVEAPIToken={}={}",
                settings.user, settings.password
            ))
        } else {
            Auth::Ticket(request_ticket(
                &http,
                &base_url,
                &settings.user,
                &settings.password,
            )?)
        };

        let client = ProxmoxClient {
            http,
            base_url,
            user: settings.user.clone(),
            auth,
        };

        let version = client.get("/version")?;
        let release = version
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("(unknown version)");
        tracing::info!("Connected to Proxmox VE {} at {}", release, client.base_url);

        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Ticket(ticket) => request.header(COOKIE, format!("PVEAuthCookie={ticket}")),
            Auth::Token(header) => request.header(AUTHORIZATION, header),
        }
    }
}

impl ProxmoxApi for ProxmoxClient {
    fn get(&self, path: &str) -> Result<Value, ApiError> {
        tracing::debug!("GET {}", path);
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .authorize(self.http.get(&url))
            .send()
            .map_err(|source| ApiError::Transport {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Authentication {
                user: self.user.clone(),
                reason: format!("{path} returned HTTP 401"),
            });
        }
        if !status.is_success() {
            let message = response
                .text()
                .ok()
                .map(|body| body.trim().to_string())
                .filter(|body| !body.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<Value> = response.json().map_err(|e| ApiError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        Ok(envelope.data.unwrap_or(Value::Null))
    }
}

/// Build the API base URL, bracketing bare IPv6 literals
pub fn api_base_url(host: &str, port: u16) -> String {
    let host = host.trim();
    if host.contains(':') && !host.starts_with('[') {
        format!("https://[{host}]:{port}/api2/json")
    } else {
        format!("https://{host}:{port}/api2/json")
    }
}

fn request_ticket(
    http: &Client,
    base_url: &str,
    user: &str,
    password: &str,
) -> Result<String, ApiError> {
    const PATH: &str = "/access/ticket";

    let response = http
        .post(format!("{base_url}{PATH}"))
        .form(&[("username", user), ("password", password)])
        .send()
        .map_err(|source| ApiError::Transport {
            path: PATH.to_string(),
            source,
        })?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::Authentication {
            user: user.to_string(),
            reason: "invalid username or password".to_string(),
        });
    }
    if !status.is_success() {
        return Err(ApiError::Status {
            path: PATH.to_string(),
            status: status.as_u16(),
            message: response.text().unwrap_or_default().trim().to_string(),
        });
    }

    let envelope: Envelope<TicketData> = response.json().map_err(|e| ApiError::Decode {
        path: PATH.to_string(),
        reason: e.to_string(),
    })?;

    envelope
        .data
        .and_then(|data| data.ticket)
        .ok_or_else(|| ApiError::Authentication {
            user: user.to_string(),
            reason: "no ticket in login response".to_string(),
        })
}

/// Log the usual causes of an authentication failure
pub fn log_auth_hints(settings: &Settings) {
    tracing::error!("Troubleshooting authentication issues:");
    tracing::error!("1. Verify the username includes the realm (e.g. root@pam or root@pve)");
    tracing::error!("2. Check that the password or token secret is correct");
    tracing::error!("3. Ensure the user has API access enabled in Proxmox");
    tracing::error!("4. If 2FA is enabled, use an API token (user@realm!tokenid) instead");
    tracing::error!("5. Verify the user exists and has the required permissions");
    tracing::error!(
        "6. Test manually: curl -k -d 'username={}&password=***' https://{}:{}/api2/json/access/ticket",
        settings.user,
        settings.host,
        settings.port
    );
}
