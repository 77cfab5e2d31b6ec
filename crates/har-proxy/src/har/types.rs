//! HAR 1.2 document types.
//!
//! Only the subset of the archive format the proxy produces is modelled.
//! Fields prefixed with `_` are custom fields, which HAR allows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HAR_VERSION: &str = "1.2";

/// Top-level HAR document: `{ "log": { ... } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Har {
    pub log: HarLogData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarLogData {
    pub version: String,
    pub creator: HarCreator,
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarCreator {
    pub name: String,
    pub version: String,
}

impl Default for HarCreator {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Har {
    pub fn from_entries(entries: Vec<HarEntry>) -> Self {
        Self {
            log: HarLogData {
                version: HAR_VERSION.to_string(),
                creator: HarCreator::default(),
                entries,
            },
        }
    }

    pub fn entries(&self) -> &[HarEntry] {
        &self.log.entries
    }
}

/// One recorded transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    pub started_date_time: DateTime<Utc>,
    /// Total elapsed time in milliseconds
    pub time: i64,
    pub request: HarRequest,
    pub response: HarResponse,
    #[serde(default)]
    pub cache: HarCache,
    pub timings: HarTimings,
    #[serde(rename = "serverIPAddress", default)]
    pub server_ip_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    pub http_version: String,
    pub headers: Vec<HarHeader>,
    pub query_string: Vec<HarQueryParam>,
    pub headers_size: i64,
    /// Body size in bytes, -1 when unknown
    pub body_size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<HarPostData>,
    #[serde(rename = "_truncated", default, skip_serializing_if = "is_false")]
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    /// HTTP status, 0 when the round trip failed
    pub status: u16,
    pub status_text: String,
    pub http_version: String,
    pub headers: Vec<HarHeader>,
    pub content: HarContent,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    pub headers_size: i64,
    pub body_size: i64,
    #[serde(rename = "_error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "_truncated", default, skip_serializing_if = "is_false")]
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarQueryParam {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPostData {
    pub mime_type: String,
    pub text: String,
    #[serde(rename = "_encoding", default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    pub size: i64,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarCache {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarTimings {
    pub send: i64,
    pub wait: i64,
    pub receive: i64,
}

fn is_false(value: &bool) -> bool {
    !*value
}
