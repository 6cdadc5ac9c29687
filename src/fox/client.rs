use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::Client;
use serde_json::Value;

use super::error::FoxError;
use super::types::{
    parse_chess, parse_chess_list, parse_uid, ListingEntry, LIST_ENDPOINT,
    RECORD_ENDPOINT, USER_INFO_ENDPOINT,
};
use crate::retry::{self, RetryAction, RetryConfig};
use crate::sync::{ListingSource, PlayerLookup, RecordSource};
use crate::types::{PlayerId, RecordId};

const CHESSBOOK_URL: &str = "https://newframe.foxwq.com/chessbook";
const CGI_URL: &str = "https://newframe.foxwq.com/cgi";

/// FoxWQ only answers clients that look like its Unity desktop app.
const UNITY_USER_AGENT: &str = "UnityPlayer/2022.1.16f1 (UnityWebRequest/1.0, libcurl/7.84.0-DEV)";
const UNITY_VERSION: &str = "2022.1.16f1";

/// Session values issued to the account that performs the download.
/// Obtained out of band (the FoxWQ app); this crate never logs in.
#[derive(Clone)]
pub struct Credentials {
    pub srcuid: String,
    pub token: String,
    pub session: String,
    pub time_stamp: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("srcuid", &self.srcuid)
            .field("token", &"<redacted>")
            .field("session", &"<redacted>")
            .field("time_stamp", &self.time_stamp)
            .finish()
    }
}

/// HTTP client for the FoxWQ chessbook API.
///
/// Implements the listing, record and player-lookup collaborators used by
/// the sync engine. Transient failures are retried here; callers see only
/// the final outcome of each request.
#[derive(Debug, Clone)]
pub struct FoxClient {
    client: Client,
    credentials: Credentials,
    retry: RetryConfig,
}

impl FoxClient {
    pub fn new(
        credentials: Credentials,
        retry: RetryConfig,
        timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(UNITY_USER_AGENT));
        headers.insert(REFERER, HeaderValue::from_static("http://www.qq.com"));
        headers.insert("X-Unity-Version", HeaderValue::from_static(UNITY_VERSION));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            credentials,
            retry,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    async fn get_json(
        &self,
        endpoint: &'static str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Value, FoxError> {
        retry::retry_with_backoff(
            &self.retry,
            endpoint,
            |e: &FoxError| {
                if e.is_retryable() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            || self.get_json_once(endpoint, url, params),
        )
        .await
    }

    async fn get_json_once(
        &self,
        endpoint: &'static str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Value, FoxError> {
        tracing::debug!(endpoint, "GET {}", url);
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|source| FoxError::Http { endpoint, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FoxError::HttpStatus {
                endpoint,
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|source| FoxError::Http { endpoint, source })
    }
}

#[async_trait]
impl ListingSource for FoxClient {
    async fn list_page(
        &self,
        player: &PlayerId,
        cursor: Option<&RecordId>,
        page_size: Option<u32>,
    ) -> Result<Vec<ListingEntry>, FoxError> {
        let creds = &self.credentials;
        let mut params = vec![
            ("type", "1".to_string()),
            ("fetchnum", page_size.map(|n| n.to_string()).unwrap_or_default()),
            ("dstuid", player.to_string()),
            ("srcuid", creds.srcuid.clone()),
            ("time", creds.time_stamp.clone()),
            ("token", creds.token.clone()),
            ("session", creds.session.clone()),
        ];
        if let Some(cursor) = cursor {
            params.push(("lastCode", cursor.to_string()));
        }

        let url = format!("{}/{}", CHESSBOOK_URL, LIST_ENDPOINT);
        let response = self.get_json(LIST_ENDPOINT, &url, &params).await?;
        parse_chess_list(response)
    }
}

#[async_trait]
impl RecordSource for FoxClient {
    async fn fetch_record(&self, id: &RecordId, _player: &PlayerId) -> Result<String, FoxError> {
        let creds = &self.credentials;
        let params = [
            ("chessid", id.to_string()),
            ("trans", id.to_string()),
            ("srcuid", creds.srcuid.clone()),
            ("time", creds.time_stamp.clone()),
            ("token", creds.token.clone()),
            ("session", creds.session.clone()),
        ];

        let url = format!("{}/{}", CHESSBOOK_URL, RECORD_ENDPOINT);
        let response = self.get_json(RECORD_ENDPOINT, &url, &params).await?;
        parse_chess(response, id)
    }
}

#[async_trait]
impl PlayerLookup for FoxClient {
    async fn resolve_player(&self, username: &str) -> Result<PlayerId, FoxError> {
        let creds = &self.credentials;
        let params = [
            ("srcuid", creds.srcuid.clone()),
            ("username", username.to_string()),
            ("time_stamp", creds.time_stamp.clone()),
        ];

        let url = format!("{}/{}", CGI_URL, USER_INFO_ENDPOINT);
        let response = self.get_json(USER_INFO_ENDPOINT, &url, &params).await?;
        let uid = parse_uid(&response, username)?;
        tracing::info!(username, uid = %uid, "Resolved player");
        Ok(uid)
    }
}
