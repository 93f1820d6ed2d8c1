//! HTTP implementation of the forge API.
//!
//! Thin, retry-aware facade over the forge REST endpoints. Every
//! listing paginates with page size 100 until an empty page comes
//! back; every mutating call is followed by the pacing delay,
//! successful or not.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::ForgeApi;
use crate::error::{ForgeError, ForgeResult};
use crate::pacer::Pacer;
use crate::types::{
    CreateUserPayload, ForgeGroup, ForgeMember, ForgeSshKey, ForgeUser, UpdateUserPayload,
};

/// Listing page size.
const PAGE_SIZE: u32 = 100;

/// Maximum retry attempts for transient HTTP failures.
const MAX_RETRIES: u32 = 3;

/// Base backoff between retries, multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Client for one forge instance.
pub struct ForgeClient {
    base_url: String,
    token: String,
    client: Client,
    pacer: Pacer,
    debug: bool,
}

impl std::fmt::Debug for ForgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForgeClient")
            .field("base_url", &self.base_url)
            .field("token", &"***")
            .finish()
    }
}

impl ForgeClient {
    /// Build a client for the given instance URL and access token.
    pub fn new(base_url: &str, token: &str, debug: bool) -> ForgeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ForgeError::transport("failed to build HTTP client", e))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
            pacer: Pacer::default(),
            debug,
        })
    }

    /// Replace the pacer (shortened delays in tests).
    #[must_use]
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url, path)
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> ForgeResult<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut request = self
                .client
                .request(method.clone(), url)
                .header("PRIVATE-TOKEN", &self.token);
            if let Some(json_body) = body {
                request = request.json(json_body);
            }

            if self.debug {
                debug!(url = %url, method = %method, attempt, "sending forge request");
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if self.debug {
                        debug!(url = %url, status = %status, "received forge response");
                    }
                    if should_retry(status) && attempt <= MAX_RETRIES {
                        let backoff = RETRY_BACKOFF * attempt;
                        warn!(
                            url = %url,
                            status = %status,
                            attempt,
                            wait_ms = backoff.as_millis() as u64,
                            "transient forge error, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    if attempt <= MAX_RETRIES {
                        let backoff = RETRY_BACKOFF * attempt;
                        warn!(
                            url = %url,
                            error = %e,
                            attempt,
                            wait_ms = backoff.as_millis() as u64,
                            "forge request failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    return Err(ForgeError::transport(
                        format!("request failed after {attempt} attempts: {url}"),
                        e,
                    ));
                }
            }
        }
    }

    /// Turn a non-success response into a classified error.
    async fn check(response: Response) -> ForgeResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ForgeError::from_status(
            status.as_u16(),
            extract_message(&body),
        ))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ForgeResult<T> {
        response
            .json()
            .await
            .map_err(|e| ForgeError::invalid_response(format!("failed to decode response: {e}")))
    }

    /// Collect every page of a listing endpoint.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        extra_query: &str,
    ) -> ForgeResult<Vec<T>> {
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}?page={page}&per_page={PAGE_SIZE}{extra_query}",
                self.url(path)
            );
            let response = self.send_with_retry(Method::GET, &url, None).await?;
            let response = Self::check(response).await?;
            let items: Vec<T> = Self::decode(response).await?;
            if items.is_empty() {
                break;
            }
            all.extend(items);
            page += 1;
        }
        Ok(all)
    }

    /// Count entries on the first page of a listing (zero vs non-zero
    /// is all callers need).
    async fn first_page_count(&self, path: &str) -> ForgeResult<usize> {
        let url = format!("{}?page=1&per_page=1", self.url(path));
        let response = self.send_with_retry(Method::GET, &url, None).await?;
        let response = Self::check(response).await?;
        let items: Vec<Value> = Self::decode(response).await?;
        Ok(items.len())
    }

    /// Issue a mutating call and pace afterwards regardless of outcome.
    async fn mutate(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ForgeResult<Response> {
        let url = self.url(path);
        let outcome = self.send_with_retry(method, &url, body.as_ref()).await;
        self.pacer.pace().await;
        Self::check(outcome?).await
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::BAD_GATEWAY
        || status == StatusCode::SERVICE_UNAVAILABLE
        || status == StatusCode::GATEWAY_TIMEOUT
}

/// Extract a human-readable message from a forge error body.
///
/// Bodies are usually `{"message": ...}` where the value may be a
/// string, a list, or a field-to-errors object.
fn extract_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    match value.get("message").or_else(|| value.get("error")) {
        Some(Value::String(message)) => message.clone(),
        Some(other) => flatten_message(other),
        None => body.to_string(),
    }
}

fn flatten_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_message)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(map) => map
            .iter()
            .map(|(field, errors)| format!("{field} {}", flatten_message(errors)))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

#[async_trait]
impl ForgeApi for ForgeClient {
    async fn list_users(&self, blocked_only: bool) -> ForgeResult<Vec<ForgeUser>> {
        let extra = if blocked_only { "&blocked=true" } else { "" };
        self.get_paged("/users", extra).await
    }

    async fn list_user_keys(&self, user_id: u64) -> ForgeResult<Vec<ForgeSshKey>> {
        self.get_paged(&format!("/users/{user_id}/keys"), "").await
    }

    async fn create_user(&self, payload: &CreateUserPayload) -> ForgeResult<ForgeUser> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ForgeError::invalid_response(format!("unserializable payload: {e}")))?;
        let response = self.mutate(Method::POST, "/users", Some(body)).await?;
        Self::decode(response).await
    }

    async fn update_user(&self, user_id: u64, payload: &UpdateUserPayload) -> ForgeResult<()> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ForgeError::invalid_response(format!("unserializable payload: {e}")))?;
        self.mutate(Method::PUT, &format!("/users/{user_id}"), Some(body))
            .await?;
        Ok(())
    }

    async fn block_user(&self, user_id: u64) -> ForgeResult<()> {
        self.mutate(Method::POST, &format!("/users/{user_id}/block"), None)
            .await?;
        Ok(())
    }

    async fn unblock_user(&self, user_id: u64) -> ForgeResult<()> {
        self.mutate(Method::POST, &format!("/users/{user_id}/unblock"), None)
            .await?;
        Ok(())
    }

    async fn delete_user(&self, user_id: u64) -> ForgeResult<()> {
        self.mutate(Method::DELETE, &format!("/users/{user_id}"), None)
            .await?;
        Ok(())
    }

    async fn add_user_key(&self, user_id: u64, title: &str, key: &str) -> ForgeResult<()> {
        let body = json!({ "title": title, "key": key });
        self.mutate(Method::POST, &format!("/users/{user_id}/keys"), Some(body))
            .await?;
        Ok(())
    }

    async fn remove_user_key(&self, user_id: u64, key_id: u64) -> ForgeResult<()> {
        self.mutate(
            Method::DELETE,
            &format!("/users/{user_id}/keys/{key_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_groups(&self) -> ForgeResult<Vec<ForgeGroup>> {
        self.get_paged("/groups", "&all_available=true").await
    }

    async fn create_group(
        &self,
        name: &str,
        path: &str,
        parent_id: Option<u64>,
    ) -> ForgeResult<ForgeGroup> {
        let mut body = json!({
            "name": name,
            "path": path,
            "visibility": "private",
        });
        if let Some(parent) = parent_id {
            body["parent_id"] = json!(parent);
        }
        let response = self.mutate(Method::POST, "/groups", Some(body)).await?;
        Self::decode(response).await
    }

    async fn delete_group(&self, group_id: u64) -> ForgeResult<()> {
        self.mutate(Method::DELETE, &format!("/groups/{group_id}"), None)
            .await?;
        Ok(())
    }

    async fn group_project_count(&self, group_id: u64) -> ForgeResult<usize> {
        self.first_page_count(&format!("/groups/{group_id}/projects"))
            .await
    }

    async fn group_subgroup_count(&self, group_id: u64) -> ForgeResult<usize> {
        self.first_page_count(&format!("/groups/{group_id}/subgroups"))
            .await
    }

    async fn list_group_members(&self, group_id: u64) -> ForgeResult<Vec<ForgeMember>> {
        self.get_paged(&format!("/groups/{group_id}/members"), "")
            .await
    }

    async fn add_group_member(
        &self,
        group_id: u64,
        user_id: u64,
        access_level: u32,
    ) -> ForgeResult<()> {
        let body = json!({ "user_id": user_id, "access_level": access_level });
        self.mutate(
            Method::POST,
            &format!("/groups/{group_id}/members"),
            Some(body),
        )
        .await?;
        Ok(())
    }

    async fn remove_group_member(&self, group_id: u64, user_id: u64) -> ForgeResult<()> {
        self.mutate(
            Method::DELETE,
            &format!("/groups/{group_id}/members/{user_id}"),
            None,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_message_handles_shapes() {
        assert_eq!(
            extract_message(r#"{"message": "Email has already been taken"}"#),
            "Email has already been taken"
        );
        assert_eq!(
            extract_message(r#"{"message": {"email": ["has already been taken"]}}"#),
            "email has already been taken"
        );
        assert_eq!(extract_message("plain text"), "plain text");
        assert_eq!(extract_message(r#"{"error": "forbidden"}"#), "forbidden");
    }

    #[test]
    fn retry_statuses() {
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!should_retry(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!should_retry(StatusCode::NOT_FOUND));
        assert!(!should_retry(StatusCode::OK));
    }
}
