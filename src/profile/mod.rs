//! Impersonation profile store.
//!
//! A profile bundles everything that makes a connection look like a given
//! browser: TLS ClientHello parameters, HTTP/2 SETTINGS and header layout,
//! and the ordered default header set. Profiles are immutable catalog data;
//! a session that changes its selector only affects connections established
//! afterwards.

pub mod headers;
pub mod http2;
pub mod tls;

pub use http2::{H2Profile, PseudoOrder};
pub use tls::{CertCompression, TlsProfile};

use std::str::FromStr;

use crate::error::{Error, Result};

/// Browser family and version selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Impersonate {
    Chrome120,
    Chrome124,
    #[default]
    Chrome131,
    Edge131,
    Firefox128,
    Firefox133,
    Safari17_5,
    Safari18,
    OkHttp4_12,
}

/// Operating system selector.
///
/// Varies the User-Agent and client-hint platform headers; the TLS and
/// HTTP/2 fingerprints are per browser version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ImpersonateOs {
    Windows,
    MacOs,
    Linux,
    Android,
    Ios,
}

impl Impersonate {
    /// The OS a profile defaults to when none is selected.
    pub fn default_os(&self) -> ImpersonateOs {
        match self {
            Self::OkHttp4_12 => ImpersonateOs::Android,
            _ => ImpersonateOs::MacOs,
        }
    }

    fn supports_os(&self, os: ImpersonateOs) -> bool {
        use ImpersonateOs::*;
        match self {
            Self::Safari17_5 | Self::Safari18 => matches!(os, MacOs | Ios),
            Self::OkHttp4_12 => matches!(os, Android | Linux),
            // No iOS builds of Blink/Gecko ship their own network stack.
            _ => !matches!(os, Ios),
        }
    }
}

impl FromStr for Impersonate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chrome_120" | "chrome120" => Ok(Self::Chrome120),
            "chrome_124" | "chrome124" => Ok(Self::Chrome124),
            "chrome_131" | "chrome131" => Ok(Self::Chrome131),
            "edge_131" | "edge131" => Ok(Self::Edge131),
            "firefox_128" | "firefox128" => Ok(Self::Firefox128),
            "firefox_133" | "firefox133" => Ok(Self::Firefox133),
            "safari_17_5" | "safari17.5" => Ok(Self::Safari17_5),
            "safari_18" | "safari18" => Ok(Self::Safari18),
            "okhttp_4_12" | "okhttp4.12" => Ok(Self::OkHttp4_12),
            other => Err(Error::UnknownProfile(other.to_string())),
        }
    }
}

impl FromStr for ImpersonateOs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(Self::Windows),
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            other => Err(Error::UnknownProfile(format!("os: {other}"))),
        }
    }
}

/// A resolved impersonation profile.
///
/// Fully determined by the (browser, version, OS) selector; never partially
/// applied. The TLS and HTTP/2 tables are `'static` catalog entries.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    pub impersonate: Impersonate,
    pub os: ImpersonateOs,
    pub tls: &'static TlsProfile,
    pub http2: &'static H2Profile,
}

impl Profile {
    /// Look up the catalog entry for a selector.
    ///
    /// Fails with [`Error::UnknownProfile`] when the browser does not ship
    /// on the requested OS.
    pub fn lookup(imp: Impersonate, os: Option<ImpersonateOs>) -> Result<Self> {
        let os = os.unwrap_or_else(|| imp.default_os());
        if !imp.supports_os(os) {
            return Err(Error::UnknownProfile(format!("{imp:?} on {os:?}")));
        }

        use Impersonate::*;
        let (tls, http2) = match imp {
            Chrome120 => (&tls::CHROME_120_TLS, &http2::CHROME_H2),
            Chrome124 => (&tls::CHROME_124_TLS, &http2::CHROME_H2),
            Chrome131 | Edge131 => (&tls::CHROME_131_TLS, &http2::CHROME_H2),
            Firefox128 => (&tls::FIREFOX_128_TLS, &http2::FIREFOX_H2),
            Firefox133 => (&tls::FIREFOX_133_TLS, &http2::FIREFOX_H2),
            Safari17_5 | Safari18 => (&tls::SAFARI_TLS, &http2::SAFARI_H2),
            OkHttp4_12 => (&tls::OKHTTP_TLS, &http2::OKHTTP_H2),
        };

        Ok(Self {
            impersonate: imp,
            os,
            tls,
            http2,
        })
    }

    /// The profile's User-Agent string.
    pub fn user_agent(&self) -> String {
        headers::user_agent(self.impersonate, self.os)
    }

    /// The profile's default headers in emission order.
    pub fn default_headers(&self) -> Vec<(&'static str, String)> {
        headers::default_headers(self.impersonate, self.os)
    }
}
