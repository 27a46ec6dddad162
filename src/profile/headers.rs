//! Default header sets per profile.
//!
//! Header order is part of the fingerprint: each builder returns headers in
//! the exact order the browser emits them for a top-level navigation.

use super::{Impersonate, ImpersonateOs};

const CHROME_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const FIREFOX_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/png,image/svg+xml,*/*;q=0.8";
const SAFARI_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// User-Agent string for a (browser, OS) pair.
pub fn user_agent(imp: Impersonate, os: ImpersonateOs) -> String {
    use Impersonate::*;
    match imp {
        Chrome120 => chromium_ua(os, "120", None),
        Chrome124 => chromium_ua(os, "124", None),
        Chrome131 => chromium_ua(os, "131", None),
        Edge131 => chromium_ua(os, "131", Some("Edg/131.0.0.0")),
        Firefox128 => firefox_ua(os, "128"),
        Firefox133 => firefox_ua(os, "133"),
        Safari17_5 => safari_ua(os, "17.5"),
        Safari18 => safari_ua(os, "18.1"),
        OkHttp4_12 => "okhttp/4.12.0".to_string(),
    }
}

fn chromium_platform(os: ImpersonateOs) -> &'static str {
    match os {
        ImpersonateOs::Windows => "Windows NT 10.0; Win64; x64",
        ImpersonateOs::MacOs => "Macintosh; Intel Mac OS X 10_15_7",
        ImpersonateOs::Linux => "X11; Linux x86_64",
        ImpersonateOs::Android => "Linux; Android 10; K",
        ImpersonateOs::Ios => "iPhone; CPU iPhone OS 17_5 like Mac OS X",
    }
}

fn chromium_ua(os: ImpersonateOs, major: &str, brand_suffix: Option<&str>) -> String {
    let mobile = if os == ImpersonateOs::Android {
        "Mobile "
    } else {
        ""
    };
    let mut ua = format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 {}Safari/537.36",
        chromium_platform(os),
        major,
        mobile
    );
    if let Some(suffix) = brand_suffix {
        ua.push(' ');
        ua.push_str(suffix);
    }
    ua
}

fn firefox_ua(os: ImpersonateOs, major: &str) -> String {
    let platform = match os {
        ImpersonateOs::Windows => format!("Windows NT 10.0; Win64; x64; rv:{major}.0"),
        ImpersonateOs::MacOs => format!("Macintosh; Intel Mac OS X 10.15; rv:{major}.0"),
        ImpersonateOs::Linux => format!("X11; Linux x86_64; rv:{major}.0"),
        ImpersonateOs::Android => format!("Android 10; Mobile; rv:{major}.0"),
        ImpersonateOs::Ios => format!("iPhone; CPU iPhone OS 17_5 like Mac OS X; rv:{major}.0"),
    };
    format!("Mozilla/5.0 ({platform}) Gecko/20100101 Firefox/{major}.0")
}

fn safari_ua(os: ImpersonateOs, version: &str) -> String {
    match os {
        ImpersonateOs::Ios => format!(
            "Mozilla/5.0 (iPhone; CPU iPhone OS {} like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{} Mobile/15E148 Safari/604.1",
            version.replace('.', "_"),
            version
        ),
        _ => format!(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{} Safari/605.1.15",
            version
        ),
    }
}

fn sec_ch_ua(imp: Impersonate) -> Option<String> {
    let (major, brand) = match imp {
        Impersonate::Chrome120 => ("120", "Google Chrome"),
        Impersonate::Chrome124 => ("124", "Google Chrome"),
        Impersonate::Chrome131 => ("131", "Google Chrome"),
        Impersonate::Edge131 => ("131", "Microsoft Edge"),
        _ => return None,
    };
    Some(format!(
        r#""{brand}";v="{major}", "Chromium";v="{major}", "Not_A Brand";v="24""#
    ))
}

fn sec_ch_platform(os: ImpersonateOs) -> &'static str {
    match os {
        ImpersonateOs::Windows => "\"Windows\"",
        ImpersonateOs::MacOs => "\"macOS\"",
        ImpersonateOs::Linux => "\"Linux\"",
        ImpersonateOs::Android => "\"Android\"",
        ImpersonateOs::Ios => "\"iOS\"",
    }
}

/// Default headers in emission order for a (browser, OS) pair.
///
/// The `Host` header is not included; the transport writes it first from
/// the target URL.
pub fn default_headers(imp: Impersonate, os: ImpersonateOs) -> Vec<(&'static str, String)> {
    use Impersonate::*;
    match imp {
        Chrome120 | Chrome124 | Chrome131 | Edge131 => {
            let mobile = if os == ImpersonateOs::Android {
                "?1"
            } else {
                "?0"
            };
            vec![
                ("Connection", "keep-alive".into()),
                ("sec-ch-ua", sec_ch_ua(imp).unwrap_or_default()),
                ("sec-ch-ua-mobile", mobile.into()),
                ("sec-ch-ua-platform", sec_ch_platform(os).into()),
                ("Upgrade-Insecure-Requests", "1".into()),
                ("User-Agent", user_agent(imp, os)),
                ("Accept", CHROME_ACCEPT.into()),
                ("Sec-Fetch-Site", "none".into()),
                ("Sec-Fetch-Mode", "navigate".into()),
                ("Sec-Fetch-User", "?1".into()),
                ("Sec-Fetch-Dest", "document".into()),
                ("Accept-Encoding", "gzip, deflate, br, zstd".into()),
                ("Accept-Language", "en-US,en;q=0.9".into()),
            ]
        }
        Firefox128 | Firefox133 => vec![
            ("User-Agent", user_agent(imp, os)),
            ("Accept", FIREFOX_ACCEPT.into()),
            ("Accept-Language", "en-US,en;q=0.5".into()),
            ("Accept-Encoding", "gzip, deflate, br, zstd".into()),
            ("Connection", "keep-alive".into()),
            ("Upgrade-Insecure-Requests", "1".into()),
            ("Sec-Fetch-Dest", "document".into()),
            ("Sec-Fetch-Mode", "navigate".into()),
            ("Sec-Fetch-Site", "none".into()),
            ("Sec-Fetch-User", "?1".into()),
            ("Priority", "u=0, i".into()),
        ],
        Safari17_5 | Safari18 => vec![
            ("Accept", SAFARI_ACCEPT.into()),
            ("Sec-Fetch-Site", "none".into()),
            ("Accept-Encoding", "gzip, deflate, br".into()),
            ("Sec-Fetch-Mode", "navigate".into()),
            ("User-Agent", user_agent(imp, os)),
            ("Accept-Language", "en-US,en;q=0.9".into()),
            ("Sec-Fetch-Dest", "document".into()),
            ("Connection", "keep-alive".into()),
        ],
        OkHttp4_12 => vec![
            ("Connection", "Keep-Alive".into()),
            ("Accept-Encoding", "gzip".into()),
            ("User-Agent", user_agent(imp, os)),
        ],
    }
}
