//! The remote directory client.
//!
//! [`DirectoryClient`] is the seam the reconciliation engine depends on;
//! [`HttpDirectoryClient`] is the blocking HTTP implementation.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::Serialize;

use roster_core::{settings::RemoteSettings, RemoteId};

use crate::error::RemoteError;
use crate::update::SparseUpdate;
use crate::wire::{
    ApiResponse, CreateIdentityPayload, GroupList, GroupPayload, GroupUpdate, RemoteGroup,
    RemoteIdentity, SingleIdentity,
};

/// Operations on remote identities and groups.
///
/// Calls are blocking and never retried here; retry policy belongs to the
/// caller (the next reconciliation pass).
pub trait DirectoryClient {
    /// Create a user. A success response may still carry no usable id.
    fn create_identity(&self, payload: &CreateIdentityPayload) -> Result<ApiResponse, RemoteError>;

    fn update_identity(&self, id: RemoteId, update: &SparseUpdate) -> Result<(), RemoteError>;

    fn delete_identity(&self, id: RemoteId) -> Result<(), RemoteError>;

    /// Fetch a user; `RemoteError::NotFound` if it does not exist.
    fn get_identity(&self, id: RemoteId) -> Result<RemoteIdentity, RemoteError>;

    fn create_group(&self, payload: &GroupPayload) -> Result<ApiResponse, RemoteError>;

    fn update_group(&self, id: RemoteId, update: &GroupUpdate) -> Result<(), RemoteError>;

    fn list_groups(&self) -> Result<Vec<RemoteGroup>, RemoteError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Basic-auth JSON client over `ureq`.
pub struct HttpDirectoryClient {
    agent: ureq::Agent,
    base_url: String,
    authorization: String,
}

impl HttpDirectoryClient {
    pub fn new(settings: &RemoteSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build();
        let credentials = STANDARD.encode(format!("{}:{}", settings.username, settings.password));
        Self {
            agent,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            authorization: format!("Basic {credentials}"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: &'static str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &self.authorization)
            .set("Accept", "application/json")
    }

    fn send<B: Serialize>(
        &self,
        method: &'static str,
        path: &str,
        body: Option<&B>,
    ) -> Result<(String, String), RemoteError> {
        let url = self.url(path);
        let request = self.request(method, &url);
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        match result {
            Ok(response) => {
                tracing::debug!(method, url = %url, status = response.status(), "remote call succeeded");
                let text = response.into_string().map_err(|e| RemoteError::Transport {
                    method,
                    url: url.clone(),
                    message: e.to_string(),
                })?;
                Ok((url, text))
            }
            Err(ureq::Error::Status(404, _)) => Err(RemoteError::NotFound { url }),
            Err(ureq::Error::Status(status, response)) => {
                let reason = response.status_text().to_string();
                tracing::warn!(method, url = %url, status, reason = %reason, "remote call failed");
                Err(RemoteError::Status {
                    method,
                    url,
                    status,
                    reason,
                })
            }
            Err(ureq::Error::Transport(transport)) => Err(RemoteError::Transport {
                method,
                url,
                message: transport.to_string(),
            }),
        }
    }
}

/// Blank bodies decode to the default value.
fn decode<T: DeserializeOwned + Default>(url: String, body: &str) -> Result<T, RemoteError> {
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(body).map_err(|source| RemoteError::Decode { url, source })
}

impl DirectoryClient for HttpDirectoryClient {
    fn create_identity(&self, payload: &CreateIdentityPayload) -> Result<ApiResponse, RemoteError> {
        let (url, body) = self.send("POST", "users", Some(payload))?;
        decode(url, &body)
    }

    fn update_identity(&self, id: RemoteId, update: &SparseUpdate) -> Result<(), RemoteError> {
        self.send("PUT", &format!("users/{id}"), Some(update))?;
        Ok(())
    }

    fn delete_identity(&self, id: RemoteId) -> Result<(), RemoteError> {
        self.send::<()>("DELETE", &format!("users/{id}"), None)?;
        Ok(())
    }

    fn get_identity(&self, id: RemoteId) -> Result<RemoteIdentity, RemoteError> {
        let (url, body) = self.send::<()>("GET", &format!("users/{id}"), None)?;
        let single: Option<SingleIdentity> = decode(url.clone(), &body)?;
        single
            .and_then(|s| s.user)
            .ok_or(RemoteError::NotFound { url })
    }

    fn create_group(&self, payload: &GroupPayload) -> Result<ApiResponse, RemoteError> {
        let (url, body) = self.send("POST", "users/groups", Some(payload))?;
        decode(url, &body)
    }

    fn update_group(&self, id: RemoteId, update: &GroupUpdate) -> Result<(), RemoteError> {
        self.send("PUT", &format!("users/groups/{id}"), Some(update))?;
        Ok(())
    }

    fn list_groups(&self) -> Result<Vec<RemoteGroup>, RemoteError> {
        let (url, body) = self.send::<()>("GET", "users/groups", None)?;
        let list: Option<GroupList> = decode(url, &body)?;
        Ok(list.map(|l| l.groups).unwrap_or_default())
    }
}
