// Payloads returned by the Reel backend

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Account profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `GET /auth/me`
#[derive(Debug, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// `GET /dashboard`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardPage {
    pub videos: Vec<Video>,
    pub pagination: Pagination,
}

/// `GET /video/{id}/stream`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStream {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub playback_token: String,
    pub embed_url: String,
}

/// `POST /video/verify-token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackVerification {
    pub valid: bool,
    pub video_id: String,
}

/// The backend emits naive UTC timestamps; accept RFC 3339 as well
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_datetime(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse datetime from ISO 8601 with or without an offset
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("Failed to parse datetime {}: {}", s, e))
}
