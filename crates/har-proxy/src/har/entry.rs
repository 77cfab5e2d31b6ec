//! Building HAR entries from captured transactions.

use super::types::{
    HarCache, HarContent, HarEntry, HarHeader, HarPostData, HarQueryParam, HarRequest,
    HarResponse, HarTimings,
};
use crate::capture::{CapturedBody, RequestSnapshot, ResponseSnapshot, Transaction};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hyper::header::{CONTENT_TYPE, LOCATION};
use hyper::{HeaderMap, Version};

impl HarEntry {
    /// Build an entry from a transaction. `server_ip` may be empty.
    pub fn from_transaction(transaction: &Transaction, server_ip: String) -> Self {
        let wait = (transaction.response_start - transaction.start)
            .num_milliseconds()
            .max(0);
        let receive = (transaction.end - transaction.response_start)
            .num_milliseconds()
            .max(0);

        Self {
            started_date_time: transaction.start,
            time: transaction.elapsed_ms(),
            request: har_request(&transaction.request),
            response: match &transaction.response {
                Ok(response) => har_response(response),
                Err(error) => failed_response(error),
            },
            cache: HarCache::default(),
            timings: HarTimings {
                send: 0,
                wait,
                receive,
            },
            server_ip_address: server_ip,
        }
    }
}

fn har_request(request: &RequestSnapshot) -> HarRequest {
    let post_data = if request.body.bytes.is_empty() {
        None
    } else {
        let (text, encoding) = encode_body(&request.body);
        Some(HarPostData {
            mime_type: mime_type(&request.headers),
            text,
            encoding,
        })
    };

    HarRequest {
        method: request.method.to_string(),
        url: request.uri.to_string(),
        http_version: http_version(request.version),
        headers: har_headers(&request.headers),
        query_string: query_params(request.uri.query()),
        headers_size: -1,
        body_size: body_size(&request.body),
        post_data,
        truncated: request.body.truncated,
    }
}

fn har_response(response: &ResponseSnapshot) -> HarResponse {
    let (text, encoding) = if response.body.bytes.is_empty() {
        (None, None)
    } else {
        let (text, encoding) = encode_body(&response.body);
        (Some(text), encoding)
    };

    HarResponse {
        status: response.status.as_u16(),
        status_text: response
            .status
            .canonical_reason()
            .unwrap_or_default()
            .to_string(),
        http_version: http_version(response.version),
        headers: har_headers(&response.headers),
        content: HarContent {
            size: body_size(&response.body),
            mime_type: mime_type(&response.headers),
            text,
            encoding,
        },
        redirect_url: response
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        headers_size: -1,
        body_size: body_size(&response.body),
        error: None,
        truncated: response.body.truncated,
    }
}

fn failed_response(error: &str) -> HarResponse {
    HarResponse {
        status: 0,
        status_text: error.to_string(),
        http_version: String::new(),
        headers: vec![],
        content: HarContent {
            size: 0,
            ..Default::default()
        },
        redirect_url: String::new(),
        headers_size: -1,
        body_size: -1,
        error: Some(error.to_string()),
        truncated: false,
    }
}

fn har_headers(headers: &HeaderMap) -> Vec<HarHeader> {
    headers
        .iter()
        .map(|(name, value)| HarHeader {
            name: name.as_str().to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
        .collect()
}

fn query_params(query: Option<&str>) -> Vec<HarQueryParam> {
    query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            HarQueryParam {
                name: decode_component(name),
                value: decode_component(value),
            }
        })
        .collect()
}

/// Percent-decode, keeping the raw text when it does not decode to UTF-8.
fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn mime_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn body_size(body: &CapturedBody) -> i64 {
    body.size
        .and_then(|size| i64::try_from(size).ok())
        .unwrap_or(-1)
}

/// UTF-8 bodies are stored as text, anything else base64 encoded.
fn encode_body(body: &CapturedBody) -> (String, Option<String>) {
    match std::str::from_utf8(&body.bytes) {
        Ok(text) => (text.to_string(), None),
        Err(_) => (BASE64.encode(&body.bytes), Some("base64".to_string())),
    }
}

fn http_version(version: Version) -> String {
    format!("{version:?}")
}
