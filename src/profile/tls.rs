//! TLS fingerprint catalog data.
//!
//! Cipher, curve and signature-algorithm orderings per browser family.
//! These parameterize the BoringSSL connector; the extension id lists are
//! the canonical ClientHello layout each family advertises.

/// Certificate compression algorithm advertised in the ClientHello.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertCompression {
    /// No compress_certificate extension.
    None,
    /// Brotli (Chromium family).
    Brotli,
    /// Zlib (Safari).
    Zlib,
}

/// TLS fingerprint parameters for one browser family/version.
#[derive(Debug, PartialEq, Eq)]
pub struct TlsProfile {
    /// Cipher suites in advertised order.
    pub ciphers: &'static [&'static str],
    /// Signature algorithms in advertised order.
    pub sigalgs: &'static [&'static str],
    /// Supported groups in advertised order.
    pub curves: &'static [&'static str],
    /// Hybrid post-quantum group prepended to `curves` when set.
    pub post_quantum: Option<&'static str>,
    /// Canonical extension ids in advertised order.
    pub extensions: &'static [u16],
    /// ALPN protocols in advertised order.
    pub alpn: &'static [&'static str],
    /// GREASE values in ciphers/extensions/groups.
    pub grease: bool,
    /// ClientHello extension order shuffled per connection (Chrome 110+,
    /// Firefox 135+).
    pub permute_extensions: bool,
    /// compress_certificate algorithm.
    pub cert_compression: CertCompression,
}

const CHROME_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
    "TLS_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_RSA_WITH_AES_128_CBC_SHA",
    "TLS_RSA_WITH_AES_256_CBC_SHA",
];

const CHROME_SIGALGS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "rsa_pss_rsae_sha256",
    "rsa_pkcs1_sha256",
    "ecdsa_secp384r1_sha384",
    "rsa_pss_rsae_sha384",
    "rsa_pkcs1_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha512",
];

const CHROME_CURVES: &[&str] = &["x25519", "P-256", "P-384"];

const CHROME_EXTENSIONS: &[u16] = &[0, 23, 65281, 10, 11, 35, 16, 5, 13, 18, 51, 45, 43, 27, 21];

const FIREFOX_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
    "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
    "TLS_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_RSA_WITH_AES_128_CBC_SHA",
    "TLS_RSA_WITH_AES_256_CBC_SHA",
];

const FIREFOX_SIGALGS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "ecdsa_secp384r1_sha384",
    "ecdsa_secp521r1_sha512",
    "rsa_pss_rsae_sha256",
    "rsa_pss_rsae_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha256",
    "rsa_pkcs1_sha384",
    "rsa_pkcs1_sha512",
];

const FIREFOX_CURVES: &[&str] = &["x25519", "P-256", "P-384", "P-521"];

const FIREFOX_EXTENSIONS: &[u16] = &[0, 23, 65281, 10, 11, 35, 16, 5, 34, 51, 43, 13, 45, 28, 21];

const SAFARI_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
    "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
    "TLS_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_RSA_WITH_AES_256_CBC_SHA",
    "TLS_RSA_WITH_AES_128_CBC_SHA",
];

const SAFARI_SIGALGS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "rsa_pss_rsae_sha256",
    "rsa_pkcs1_sha256",
    "ecdsa_secp384r1_sha384",
    "rsa_pss_rsae_sha384",
    "rsa_pkcs1_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha512",
];

const SAFARI_CURVES: &[&str] = &["x25519", "P-256", "P-384", "P-521"];

const SAFARI_EXTENSIONS: &[u16] = &[0, 23, 65281, 10, 11, 16, 5, 13, 18, 51, 45, 43, 27, 21];

const OKHTTP_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_RSA_WITH_AES_256_GCM_SHA384",
];

const OKHTTP_CURVES: &[&str] = &["x25519", "P-256", "P-384"];

const OKHTTP_EXTENSIONS: &[u16] = &[0, 23, 65281, 10, 11, 35, 16, 5, 13, 51, 45, 43, 21];

const fn chrome_tls(post_quantum: Option<&'static str>) -> TlsProfile {
    TlsProfile {
        ciphers: CHROME_CIPHERS,
        sigalgs: CHROME_SIGALGS,
        curves: CHROME_CURVES,
        post_quantum,
        extensions: CHROME_EXTENSIONS,
        alpn: &["h2", "http/1.1"],
        grease: true,
        permute_extensions: true,
        cert_compression: CertCompression::Brotli,
    }
}

pub(crate) static CHROME_120_TLS: TlsProfile = chrome_tls(None);

pub(crate) static CHROME_124_TLS: TlsProfile = chrome_tls(Some("X25519Kyber768Draft00"));

pub(crate) static CHROME_131_TLS: TlsProfile = chrome_tls(Some("X25519MLKEM768"));

pub(crate) static FIREFOX_128_TLS: TlsProfile = TlsProfile {
    ciphers: FIREFOX_CIPHERS,
    sigalgs: FIREFOX_SIGALGS,
    curves: FIREFOX_CURVES,
    post_quantum: None,
    extensions: FIREFOX_EXTENSIONS,
    alpn: &["h2", "http/1.1"],
    grease: false,
    permute_extensions: false,
    cert_compression: CertCompression::None,
};

pub(crate) static FIREFOX_133_TLS: TlsProfile = TlsProfile {
    ciphers: FIREFOX_CIPHERS,
    sigalgs: FIREFOX_SIGALGS,
    curves: FIREFOX_CURVES,
    post_quantum: Some("X25519MLKEM768"),
    extensions: FIREFOX_EXTENSIONS,
    alpn: &["h2", "http/1.1"],
    grease: false,
    permute_extensions: false,
    cert_compression: CertCompression::None,
};

pub(crate) static SAFARI_TLS: TlsProfile = TlsProfile {
    ciphers: SAFARI_CIPHERS,
    sigalgs: SAFARI_SIGALGS,
    curves: SAFARI_CURVES,
    post_quantum: None,
    extensions: SAFARI_EXTENSIONS,
    alpn: &["h2", "http/1.1"],
    grease: true,
    permute_extensions: false,
    cert_compression: CertCompression::Zlib,
};

pub(crate) static OKHTTP_TLS: TlsProfile = TlsProfile {
    ciphers: OKHTTP_CIPHERS,
    sigalgs: CHROME_SIGALGS,
    curves: OKHTTP_CURVES,
    post_quantum: None,
    extensions: OKHTTP_EXTENSIONS,
    alpn: &["h2", "http/1.1"],
    grease: false,
    permute_extensions: false,
    cert_compression: CertCompression::None,
};
