//! X/Twitter v2 REST transport.
//!
//! Search uses the app bearer token against `tweets/search/recent`; posting
//! uses a user-context access token against `tweets`. Authors and places
//! arrive as expansions and are joined back onto each status here.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Response, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::channels::StatusTransport;
use crate::config::TwitterConfig;
use crate::error::TransportError;
use crate::pipeline::types::{Coordinates, PostedStatus, SearchCandidate};

/// Twitter v2 transport.
pub struct TwitterTransport {
    config: TwitterConfig,
    client: reqwest::Client,
}

impl TwitterTransport {
    pub fn new(config: TwitterConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/2/{path}", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl StatusTransport for TwitterTransport {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, TransportError> {
        let max_results = self.config.max_results.to_string();
        let resp = self
            .client
            .get(self.api_url("tweets/search/recent"))
            .bearer_auth(self.config.bearer_token.expose_secret())
            .query(&[
                ("query", query),
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at,geo,author_id"),
                ("expansions", "author_id,geo.place_id"),
                ("user.fields", "username"),
                ("place.fields", "full_name"),
            ])
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed {
                operation: "search".into(),
                reason: e.to_string(),
            })?;

        let resp = check_status("search", resp).await?;
        let body: SearchResponse =
            resp.json()
                .await
                .map_err(|e| TransportError::InvalidResponse {
                    operation: "search".into(),
                    reason: e.to_string(),
                })?;

        let candidates = body.into_candidates();
        debug!(query, count = candidates.len(), "Search returned candidates");
        Ok(candidates)
    }

    async fn post(
        &self,
        text: &str,
        in_reply_to: Option<&str>,
    ) -> Result<PostedStatus, TransportError> {
        let resp = self
            .client
            .post(self.api_url("tweets"))
            .bearer_auth(self.config.user_token.expose_secret())
            .json(&post_body(text, in_reply_to))
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed {
                operation: "post".into(),
                reason: e.to_string(),
            })?;

        let resp = check_status("post", resp).await?;
        let body: PostResponse = resp
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse {
                operation: "post".into(),
                reason: e.to_string(),
            })?;

        Ok(PostedStatus {
            id: body.data.id,
            text: body.data.text,
        })
    }
}

/// JSON body for `POST /2/tweets`.
fn post_body(text: &str, in_reply_to: Option<&str>) -> serde_json::Value {
    match in_reply_to {
        Some(id) => serde_json::json!({
            "text": text,
            "reply": { "in_reply_to_tweet_id": id }
        }),
        None => serde_json::json!({ "text": text }),
    }
}

/// Map non-success statuses to transport errors.
async fn check_status(operation: &str, resp: Response) -> Result<Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TransportError::AuthFailed {
            operation: operation.into(),
        }),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = resp
                .headers()
                .get("x-rate-limit-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok())
                .map(|reset| {
                    let secs = (reset - Utc::now().timestamp()).max(0) as u64;
                    Duration::from_secs(secs)
                });
            Err(TransportError::RateLimited {
                operation: operation.into(),
                retry_after,
            })
        }
        _ => {
            let body = resp.text().await.unwrap_or_default();
            Err(TransportError::RequestFailed {
                operation: operation.into(),
                reason: format!("HTTP {status}: {body}"),
            })
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    author_id: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    geo: Option<Geo>,
}

#[derive(Debug, Deserialize)]
struct Geo {
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    coordinates: Option<Point>,
}

/// GeoJSON point: `[longitude, latitude]`.
#[derive(Debug, Deserialize)]
struct Point {
    coordinates: [f64; 2],
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Place {
    id: String,
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    data: PostedTweet,
}

#[derive(Debug, Deserialize)]
struct PostedTweet {
    id: String,
    text: String,
}

impl SearchResponse {
    /// Join expansions onto statuses. Statuses whose author is missing
    /// from `includes` are dropped.
    fn into_candidates(self) -> Vec<SearchCandidate> {
        let users: HashMap<String, String> = self
            .includes
            .users
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();
        let places: HashMap<String, String> = self
            .includes
            .places
            .into_iter()
            .map(|p| (p.id, p.full_name))
            .collect();

        self.data
            .into_iter()
            .filter_map(|tweet| {
                let Some(author_handle) = users.get(&tweet.author_id).cloned() else {
                    warn!(status = %tweet.id, "Dropping status with unresolved author");
                    return None;
                };
                let place = tweet
                    .geo
                    .as_ref()
                    .and_then(|g| g.place_id.as_ref())
                    .and_then(|id| places.get(id).cloned());
                let coordinates = tweet
                    .geo
                    .as_ref()
                    .and_then(|g| g.coordinates.as_ref())
                    .map(|p| Coordinates {
                        longitude: p.coordinates[0],
                        latitude: p.coordinates[1],
                    });
                Some(SearchCandidate {
                    id: tweet.id,
                    author_handle,
                    text: tweet.text,
                    created_at: tweet.created_at,
                    place,
                    coordinates,
                })
            })
            .collect()
    }
}
