//! System persona rendering.
//!
//! The persona is a template loaded at startup with two placeholders,
//! `{location}` and `{time}`, filled in per request from caller metadata.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Location used when the caller's city, region or country is unknown.
pub const UNKNOWN_LOCATION: &str = "unknown";

/// Coarse, best-effort metadata about the caller, usually taken from edge headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub timezone: Option<String>,
}

impl CallerContext {
    /// `"city, region, country"` when all three are present, otherwise `"unknown"`.
    pub fn location(&self) -> String {
        match (&self.city, &self.region, &self.country) {
            (Some(city), Some(region), Some(country))
                if !city.is_empty() && !region.is_empty() && !country.is_empty() =>
            {
                format!("{}, {}, {}", city, region, country)
            }
            _ => UNKNOWN_LOCATION.to_string(),
        }
    }

    /// Formats `now` in the caller's timezone, falling back to UTC.
    ///
    /// The format mirrors an en-US locale string, e.g. `10/18/2026, 3:04:05 PM`.
    pub fn local_time(&self, now: DateTime<Utc>) -> String {
        const FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";
        match self.timezone.as_deref().and_then(|tz| tz.parse::<Tz>().ok()) {
            Some(tz) => now.with_timezone(&tz).format(FORMAT).to_string(),
            None => now.format(FORMAT).to_string(),
        }
    }
}

/// The assistant's system instructions.
#[derive(Debug, Clone)]
pub struct Persona {
    template: String,
}

impl Persona {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Renders the template for one request. Never fails.
    pub fn render(&self, caller: &CallerContext, now: DateTime<Utc>) -> String {
        self.template
            .replace("{location}", &caller.location())
            .replace("{time}", &caller.local_time(now))
    }
}
