//! RFC 6265 cookie store.
//!
//! The jar is shared between the async and blocking front-ends, so all
//! access goes through a mutex. A jar built disabled is inert: writes are
//! dropped and reads return nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use url::Url;

use crate::error::{Error, Result};

/// A single cookie with its scoping attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
}

impl Cookie {
    /// Create a session cookie scoped to a domain.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(&domain.into()),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            same_site: None,
            expires: None,
            max_age: None,
        }
    }

    /// Parse a `Set-Cookie` header value received for `request_url`.
    pub fn parse_set_cookie(header: &str, request_url: &Url) -> Result<Self> {
        let request_domain = request_url
            .host_str()
            .ok_or_else(|| Error::CookieParse("no host in URL".to_string()))?;

        let mut parts = header.split(';').map(str::trim);
        let pair = parts
            .next()
            .ok_or_else(|| Error::CookieParse("empty header".to_string()))?;
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::CookieParse("no = in cookie pair".to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::CookieParse("empty cookie name".to_string()));
        }

        let mut cookie = Cookie::new(name, value.trim(), request_domain);

        for attr in parts {
            if attr.eq_ignore_ascii_case("secure") {
                cookie.secure = true;
            } else if attr.eq_ignore_ascii_case("httponly") {
                cookie.http_only = true;
            } else if let Some((key, val)) = attr.split_once('=') {
                match key.trim().to_ascii_lowercase().as_str() {
                    "domain" => cookie.domain = normalize_domain(val.trim()),
                    "path" => cookie.path = val.trim().to_string(),
                    "expires" => cookie.expires = parse_cookie_date(val.trim()),
                    "max-age" => {
                        cookie.max_age = val.trim().parse().ok();
                        if let Some(secs) = cookie.max_age {
                            cookie.expires = Some(Utc::now() + chrono::Duration::seconds(secs));
                        }
                    }
                    "samesite" => cookie.same_site = Some(val.trim().to_string()),
                    _ => {}
                }
            }
        }
        Ok(cookie)
    }

    /// Whether this cookie has passed its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires.map(|e| e < Utc::now()).unwrap_or(false)
    }

    /// Whether this cookie applies to a request URL (domain-suffix,
    /// path-prefix and secure-scheme rules).
    pub fn matches_url(&self, url: &Url) -> bool {
        let Some(request_domain) = url.host_str().map(str::to_ascii_lowercase) else {
            return false;
        };
        if self.secure && url.scheme() != "https" && url.scheme() != "wss" {
            return false;
        }
        if self.is_expired() {
            return false;
        }

        let cookie_domain = self.domain.to_ascii_lowercase();
        if request_domain != cookie_domain
            && !request_domain.ends_with(&format!(".{cookie_domain}"))
        {
            return false;
        }

        let request_path = url.path();
        request_path == self.path
            || request_path.starts_with(&format!("{}/", self.path.trim_end_matches('/')))
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Domain/path scoped cookie jar.
#[derive(Debug, Default)]
pub struct Jar {
    enabled: bool,
    cookies: Mutex<HashMap<String, HashMap<String, Cookie>>>,
}

impl Jar {
    /// Create a jar. A disabled jar drops writes and returns empty reads.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            cookies: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the jar persists cookies.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Store a cookie.
    pub fn set(&self, cookie: Cookie) {
        if !self.enabled {
            return;
        }
        let mut map = self.cookies.lock().unwrap();
        map.entry(cookie.domain.clone())
            .or_default()
            .insert(cookie.name.clone(), cookie);
    }

    /// Store a raw `name=value` pair scoped to a URL.
    pub fn add_cookie_str(&self, raw: &str, url: &Url) -> Result<()> {
        let cookie = Cookie::parse_set_cookie(raw, url)?;
        self.set(cookie);
        Ok(())
    }

    /// Record every `Set-Cookie` value observed on a response.
    pub(crate) fn store_response_cookies<'a>(
        &self,
        set_cookie_values: impl Iterator<Item = &'a str>,
        url: &Url,
    ) {
        if !self.enabled {
            return;
        }
        for value in set_cookie_values {
            if let Ok(cookie) = Cookie::parse_set_cookie(value, url) {
                self.set(cookie);
            }
        }
    }

    /// Cookies applicable to a URL, longest path first.
    ///
    /// Expired cookies under the touched domain keys are purged as a side
    /// effect.
    pub fn cookies_for_url(&self, url: &Url) -> Vec<Cookie> {
        if !self.enabled {
            return Vec::new();
        }
        let mut map = self.cookies.lock().unwrap();
        for cookies in map.values_mut() {
            cookies.retain(|_, c| !c.is_expired());
        }

        let mut matched: Vec<Cookie> = map
            .values()
            .flat_map(|m| m.values())
            .filter(|c| c.matches_url(url))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        matched
    }

    /// Build a `Cookie` request header value for a URL, if any apply.
    pub(crate) fn cookie_header(&self, url: &Url) -> Option<String> {
        let cookies = self.cookies_for_url(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Look up one cookie by domain and name.
    pub fn get(&self, domain: &str, name: &str) -> Option<Cookie> {
        let map = self.cookies.lock().unwrap();
        map.get(&normalize_domain(domain))?.get(name).cloned()
    }

    /// Remove one cookie, returning it.
    pub fn remove(&self, domain: &str, name: &str) -> Option<Cookie> {
        let mut map = self.cookies.lock().unwrap();
        map.get_mut(&normalize_domain(domain))?.remove(name)
    }

    /// Drop every stored cookie.
    pub fn clear(&self) {
        self.cookies.lock().unwrap().clear();
    }

    /// Number of stored cookies.
    pub fn len(&self) -> usize {
        self.cookies.lock().unwrap().values().map(HashMap::len).sum()
    }

    /// Whether the jar holds no cookies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.strip_prefix('.').unwrap_or(domain).to_ascii_lowercase()
}

fn parse_cookie_date(date_str: &str) -> Option<DateTime<Utc>> {
    for fmt in [
        "%a, %d %b %Y %H:%M:%S GMT",
        "%a, %d-%b-%y %H:%M:%S GMT",
        "%Y-%m-%dT%H:%M:%SZ",
    ] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date_str, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    date_str
        .parse::<i64>()
        .ok()
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn set_cookie_round_trip() {
        let jar = Jar::new(true);
        let target = url("https://a.example.com/account");
        jar.add_cookie_str("sid=abc123; Path=/; Secure", &target).unwrap();

        let got = jar.cookies_for_url(&target);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name, "sid");
        assert_eq!(got[0].value, "abc123");
    }

    #[test]
    fn sibling_subdomains_are_isolated() {
        let jar = Jar::new(true);
        jar.add_cookie_str("sid=abc", &url("https://a.example.com/")).unwrap();

        assert!(jar.cookies_for_url(&url("https://b.example.com/")).is_empty());
        assert_eq!(jar.cookies_for_url(&url("https://a.example.com/")).len(), 1);
    }

    #[test]
    fn parent_domain_cookie_covers_subdomains() {
        let jar = Jar::new(true);
        jar.add_cookie_str(
            "sid=abc; Domain=.example.com",
            &url("https://www.example.com/"),
        )
        .unwrap();
        assert_eq!(jar.cookies_for_url(&url("https://api.example.com/")).len(), 1);
    }

    #[test]
    fn secure_cookie_not_sent_over_http() {
        let jar = Jar::new(true);
        jar.add_cookie_str("sid=abc; Secure", &url("https://example.com/")).unwrap();
        assert!(jar.cookies_for_url(&url("http://example.com/")).is_empty());
    }

    #[test]
    fn path_prefix_matching() {
        let jar = Jar::new(true);
        jar.add_cookie_str("sid=abc; Path=/app", &url("https://example.com/app")).unwrap();
        assert_eq!(jar.cookies_for_url(&url("https://example.com/app/page")).len(), 1);
        assert!(jar.cookies_for_url(&url("https://example.com/other")).is_empty());
    }

    #[test]
    fn expired_cookies_are_purged_lazily() {
        let jar = Jar::new(true);
        jar.add_cookie_str("sid=abc; Max-Age=0", &url("https://example.com/")).unwrap();
        assert!(jar.cookies_for_url(&url("https://example.com/")).is_empty());
        assert_eq!(jar.len(), 0);
    }

    #[test]
    fn disabled_jar_is_inert() {
        let jar = Jar::new(false);
        jar.add_cookie_str("sid=abc", &url("https://example.com/")).unwrap();
        assert!(jar.cookies_for_url(&url("https://example.com/")).is_empty());
        assert!(jar.is_empty());
    }

    #[test]
    fn cookie_header_joins_pairs() {
        let jar = Jar::new(true);
        let target = url("https://example.com/");
        jar.add_cookie_str("a=1", &target).unwrap();
        jar.add_cookie_str("b=2", &target).unwrap();
        let header = jar.cookie_header(&target).unwrap();
        assert!(header.contains("a=1"));
        assert!(header.contains("b=2"));
        assert!(header.contains("; "));
    }
}
