//! In-memory cookie jar.
//!
//! A jar belongs to exactly one transport. It is mutated only by merging
//! `Set-Cookie` response headers and read when composing the `Cookie` request
//! header. This type is **not** internally synchronized; share it through a
//! [`CookieJarHandle`], taking the write lock for the whole merge of a
//! response so concurrent responses never interleave.

use crate::cookies::Cookie;
use crate::errors::CookieError;
use http::header::SET_COOKIE;
use http::HeaderMap;
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;
use url::Url;

/// Reference-counted, read/write-locked jar.
pub type CookieJarHandle = Arc<RwLock<CookieJar>>;

#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    /// Cookies in the order they were first set.
    entries: Vec<Cookie>,
}

impl CookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_handle(self) -> CookieJarHandle {
        Arc::new(RwLock::new(self))
    }

    /// Inserts `cookie`, replacing any cookie with the same name, domain and
    /// path. A cookie that is already expired deletes its counterpart instead.
    pub fn store(&mut self, cookie: Cookie, now: OffsetDateTime) {
        let existing = self.entries.iter().position(|c| c.same_identity(&cookie));

        match (existing, cookie.is_expired(now)) {
            (Some(idx), true) => {
                self.entries.remove(idx);
            }
            (Some(idx), false) => self.entries[idx] = cookie,
            (None, true) => {}
            (None, false) => self.entries.push(cookie),
        }
    }

    /// Parses one raw `Set-Cookie` value received from `url` and stores it.
    pub fn store_set_cookie(&mut self, url: &Url, raw: &str, now: OffsetDateTime) -> Result<(), CookieError> {
        let cookie = Cookie::parse(raw, url, now)?;
        self.store(cookie, now);
        Ok(())
    }

    /// Applies **every** `Set-Cookie` header in `headers`.
    ///
    /// Headers that cannot be parsed are skipped; their errors are returned
    /// so the caller can report them.
    pub fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap, now: OffsetDateTime) -> Vec<CookieError> {
        let mut errors = Vec::new();

        for header in headers.get_all(SET_COOKIE) {
            let result = header
                .to_str()
                .map_err(|_| CookieError::NotUtf8)
                .and_then(|raw| self.store_set_cookie(url, raw, now));
            if let Err(e) = result {
                errors.push(e);
            }
        }

        errors
    }

    /// Returns the `(name, value)` pairs to send to `url`, longest path first.
    pub fn request_cookies(&self, url: &Url, now: OffsetDateTime) -> Vec<(String, String)> {
        let mut matching: Vec<&Cookie> = self.entries.iter().filter(|c| c.matches(url, now)).collect();
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

        matching
            .into_iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }

    /// Returns the `Cookie` request header value to send for `url`, if any.
    pub fn get_request_cookies(&self, url: &Url, now: OffsetDateTime) -> Option<String> {
        let header = self
            .request_cookies(url, now)
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }

    /// All cookies currently held, including ones that have expired since being set.
    pub fn cookies(&self) -> &[Cookie] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all cookies from the jar.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
