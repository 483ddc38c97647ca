//! Cookie core type and `Set-Cookie` parsing.
//!
//! Parsing follows the subset of RFC 6265 that matters to a client replaying
//! gateway affinity cookies: `Domain`, `Path`, `Expires`, `Max-Age`,
//! `Secure`, `HttpOnly` and `SameSite` are understood, anything else is
//! ignored. Server output is untrusted, so every failure is reported as a
//! [`CookieError`] rather than a panic.

use crate::errors::CookieError;
use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use url::Url;

const DATE_SPACED: &[BorrowedFormatItem<'static>] = format_description!(
    "[day] [month repr:short case_sensitive:false] [year] [hour]:[minute]:[second]"
);
const DATE_DASHED: &[BorrowedFormatItem<'static>] = format_description!(
    "[day]-[month repr:short case_sensitive:false]-[year] [hour]:[minute]:[second]"
);
// Unpadded day and hour, e.g. `1 Oct 2025 7:28:00`.
const DATE_SPACED_LOOSE: &[BorrowedFormatItem<'static>] = format_description!(
    "[day padding:none] [month repr:short case_sensitive:false] [year] [hour padding:none]:[minute]:[second]"
);
const DATE_DASHED_LOOSE: &[BorrowedFormatItem<'static>] = format_description!(
    "[day padding:none]-[month repr:short case_sensitive:false]-[year] [hour padding:none]:[minute]:[second]"
);

/// A cookie as held by the jar.
///
/// `domain` and `path` are always resolved at parse time: a cookie without a
/// `Domain` attribute is *host-only* and bound to the exact request host, a
/// cookie without a `Path` attribute gets the default path of the request URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,

    /// Raw cookie value (not URL-decoded).
    pub value: String,

    /// Domain the cookie is scoped to, without a leading dot.
    pub domain: String,

    /// When `true`, only `domain` itself matches (no subdomains).
    pub host_only: bool,

    /// Path scoping (e.g., `"/"`).
    pub path: String,

    /// Expiration instant. Session cookies have `None`.
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires: Option<OffsetDateTime>,

    /// If `true`, cookie is sent only over HTTPS.
    pub secure: bool,

    /// If `true`, cookie is hidden from client-side scripts.
    pub http_only: bool,

    /// SameSite policy (`"Strict"`, `"Lax"`, or `"None"`).
    pub same_site: Option<String>,
}

impl Cookie {
    /// Parses one `Set-Cookie` header value received in response to `request_url`.
    pub fn parse(header: &str, request_url: &Url, now: OffsetDateTime) -> Result<Cookie, CookieError> {
        let malformed = || CookieError::MalformedCookieHeader(header.to_string());

        let mut parts = header.split(';');
        let pair = parts.next().unwrap_or_default().trim();
        let (name, value) = pair.split_once('=').ok_or_else(malformed)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(malformed());
        }

        let host = request_url.host_str().ok_or_else(malformed)?.to_ascii_lowercase();

        let mut domain_attr: Option<String> = None;
        let mut path_attr: Option<String> = None;
        let mut expires_attr: Option<OffsetDateTime> = None;
        let mut max_age: Option<i64> = None;
        let mut secure = false;
        let mut http_only = false;
        let mut same_site = None;

        for part in parts {
            let part = part.trim();
            let (key, val) = part.split_once('=').map_or((part, ""), |(k, v)| (k.trim(), v.trim()));

            match key.to_ascii_lowercase().as_str() {
                "domain" => {
                    let d = val.trim_start_matches('.').to_ascii_lowercase();
                    if !d.is_empty() {
                        domain_attr = Some(d);
                    }
                }
                "path" => {
                    if val.starts_with('/') {
                        path_attr = Some(val.to_string());
                    }
                }
                // Unparseable dates and ages are ignored, as browsers do.
                "expires" => expires_attr = parse_cookie_date(val).or(expires_attr),
                "max-age" => max_age = val.parse().ok().or(max_age),
                "secure" => secure = true,
                "httponly" => http_only = true,
                "samesite" => {
                    same_site = Some(if val.eq_ignore_ascii_case("lax") {
                        "Lax".to_string()
                    } else if val.eq_ignore_ascii_case("strict") {
                        "Strict".to_string()
                    } else if val.eq_ignore_ascii_case("none") {
                        "None".to_string()
                    } else {
                        val.to_string()
                    });
                }
                _ => {}
            }
        }

        let (domain, host_only) = match domain_attr {
            Some(d) if domain_matches(&host, &d) => (d, false),
            Some(d) => return Err(CookieError::ForeignDomain { domain: d, host }),
            None => (host, true),
        };

        // Max-Age wins over Expires.
        let expires = match max_age {
            Some(secs) if secs <= 0 => Some(OffsetDateTime::UNIX_EPOCH),
            Some(secs) => now.checked_add(time::Duration::seconds(secs)),
            None => expires_attr,
        };

        Ok(Cookie {
            name: name.to_string(),
            value: value.trim().to_string(),
            domain,
            host_only,
            path: path_attr.unwrap_or_else(|| default_path(request_url).to_string()),
            expires,
            secure,
            http_only,
            same_site,
        })
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// True when this cookie should be sent with a request to `url` at `now`.
    pub fn matches(&self, url: &Url, now: OffsetDateTime) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(&host, &self.domain)
        };

        domain_ok
            && path_matches(url.path(), &self.path)
            && (!self.secure || url.scheme() == "https")
            && !self.is_expired(now)
    }

    /// Same name, domain and path: a later cookie replaces an earlier one.
    pub fn same_identity(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

fn default_path(url: &Url) -> &str {
    url.path()
        .rsplit_once('/')
        .map_or("/", |(a, _)| if a.is_empty() { "/" } else { a })
}

/// Parses the date formats seen in `Expires` attributes, e.g.
/// `Wed, 21 Oct 2015 07:28:00 GMT` and `Wed, 21-Oct-2015 07:28:00 GMT`.
fn parse_cookie_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    let raw = raw.split_once(',').map_or(raw, |(_, rest)| rest).trim();
    let raw = raw
        .strip_suffix("GMT")
        .or_else(|| raw.strip_suffix("UTC"))
        .unwrap_or(raw)
        .trim();

    [DATE_SPACED, DATE_DASHED, DATE_SPACED_LOOSE, DATE_DASHED_LOOSE]
        .into_iter()
        .find_map(|format| PrimitiveDateTime::parse(raw, format).ok())
        .map(PrimitiveDateTime::assume_utc)
}
