//! Request metadata: correlation ids and coarse caller location.
//!
//! Location and timezone come from edge-network headers (Vercel's naming).
//! Missing or unreadable values are simply absent; nothing here can fail a request.

use axum::http::HeaderMap;
use concierge_core::persona::CallerContext;
use uuid::Uuid;

const REQUEST_ID_HEADERS: &[&str] = &["x-vercel-id", "x-request-id"];

const CITY_HEADER: &str = "x-vercel-ip-city";
const REGION_HEADER: &str = "x-vercel-ip-country-region";
const COUNTRY_HEADER: &str = "x-vercel-ip-country";
const TIMEZONE_HEADER: &str = "x-vercel-ip-timezone";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Correlation id for log lines, taken from the edge when available.
pub fn request_id(headers: &HeaderMap) -> String {
    REQUEST_ID_HEADERS
        .iter()
        .find_map(|name| header(headers, name))
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Builds the caller context from edge headers.
pub fn caller_context(headers: &HeaderMap) -> CallerContext {
    // The edge percent-encodes city names ("S%C3%A3o%20Paulo").
    let city = header(headers, CITY_HEADER).map(|raw| {
        urlencoding::decode(&raw)
            .map(|decoded| decoded.into_owned())
            .unwrap_or(raw)
    });

    CallerContext {
        city,
        region: header(headers, REGION_HEADER),
        country: header(headers, COUNTRY_HEADER),
        timezone: header(headers, TIMEZONE_HEADER),
    }
}
