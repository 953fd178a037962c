//! Protocol and TLS classification.
//!
//! Maps negotiated protocol versions and IANA TLS codes to the labels shown
//! to users. Unrecognized codes render as `Unknown (0x....)`.

use hyper::Version;

/// TLS 1.0 version code
pub const TLS_1_0: u16 = 0x0301;
/// TLS 1.1 version code
pub const TLS_1_1: u16 = 0x0302;
/// TLS 1.2 version code
pub const TLS_1_2: u16 = 0x0303;
/// TLS 1.3 version code
pub const TLS_1_3: u16 = 0x0304;

/// Cipher suites with a known label.
const CIPHER_SUITES: &[(u16, &str)] = &[
    (0xc02f, "ECDHE-RSA-AES128-GCM-SHA256"),
    (0xc030, "ECDHE-RSA-AES256-GCM-SHA384"),
    (0xc02b, "ECDHE-ECDSA-AES128-GCM-SHA256"),
    (0xc02c, "ECDHE-ECDSA-AES256-GCM-SHA384"),
    (0x009c, "RSA-AES128-GCM-SHA256"),
    (0x009d, "RSA-AES256-GCM-SHA384"),
    (0x1301, "TLS13-AES-128-GCM-SHA256"),
    (0x1302, "TLS13-AES-256-GCM-SHA384"),
    (0x1303, "TLS13-CHACHA20-POLY1305-SHA256"),
];

fn unknown(code: u16) -> String {
    format!("Unknown (0x{code:04x})")
}

/// Label for the application protocol of a response.
///
/// HTTP/2 and HTTP/3 are named by version; HTTP/1.x is "HTTPS" over TLS and
/// "HTTP" otherwise.
pub fn classify_protocol(version: Version, tls: bool) -> &'static str {
    match version {
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ if tls => "HTTPS",
        _ => "HTTP",
    }
}

/// Version string as it appears on the status line, e.g. "HTTP/1.1".
pub fn http_version_label(version: Version) -> String {
    format!("{version:?}")
}

/// Human label for a TLS protocol version code.
pub fn tls_version_name(code: u16) -> String {
    match code {
        TLS_1_0 => "TLS 1.0".to_string(),
        TLS_1_1 => "TLS 1.1".to_string(),
        TLS_1_2 => "TLS 1.2".to_string(),
        TLS_1_3 => "TLS 1.3".to_string(),
        other => unknown(other),
    }
}

/// Human label for an IANA cipher suite code.
pub fn cipher_suite_name(code: u16) -> String {
    CIPHER_SUITES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| unknown(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tls_version_names() {
        assert_eq!(tls_version_name(0x0301), "TLS 1.0");
        assert_eq!(tls_version_name(0x0302), "TLS 1.1");
        assert_eq!(tls_version_name(0x0303), "TLS 1.2");
        assert_eq!(tls_version_name(0x0304), "TLS 1.3");
    }

    #[test]
    fn test_tls_version_unknown() {
        assert_eq!(tls_version_name(0x9999), "Unknown (0x9999)");
        assert_eq!(tls_version_name(0x0300), "Unknown (0x0300)");
        assert_eq!(tls_version_name(0x0a), "Unknown (0x000a)");
    }

    #[test]
    fn test_cipher_suite_names() {
        assert_eq!(cipher_suite_name(0xc02f), "ECDHE-RSA-AES128-GCM-SHA256");
        assert_eq!(cipher_suite_name(0x1303), "TLS13-CHACHA20-POLY1305-SHA256");
        assert_eq!(cipher_suite_name(0x009d), "RSA-AES256-GCM-SHA384");
        assert_eq!(cipher_suite_name(0xabcd), "Unknown (0xabcd)");
    }

    #[test]
    fn test_cipher_table_has_nine_distinct_entries() {
        let codes: std::collections::HashSet<u16> =
            CIPHER_SUITES.iter().map(|(code, _)| *code).collect();
        assert_eq!(codes.len(), 9);
    }

    #[test]
    fn test_classify_protocol() {
        assert_eq!(classify_protocol(Version::HTTP_2, true), "HTTP/2");
        assert_eq!(classify_protocol(Version::HTTP_2, false), "HTTP/2");
        assert_eq!(classify_protocol(Version::HTTP_3, true), "HTTP/3");
        assert_eq!(classify_protocol(Version::HTTP_11, true), "HTTPS");
        assert_eq!(classify_protocol(Version::HTTP_10, true), "HTTPS");
        assert_eq!(classify_protocol(Version::HTTP_11, false), "HTTP");
    }

    #[test]
    fn test_http_version_label() {
        assert_eq!(http_version_label(Version::HTTP_11), "HTTP/1.1");
        assert_eq!(http_version_label(Version::HTTP_10), "HTTP/1.0");
    }

    proptest! {
        #[test]
        fn test_tls_version_name_total(code in any::<u16>()) {
            let name = tls_version_name(code);
            if (TLS_1_0..=TLS_1_3).contains(&code) {
                prop_assert!(name.starts_with("TLS 1."));
            } else {
                prop_assert_eq!(name, format!("Unknown (0x{:04x})", code));
            }
        }

        #[test]
        fn test_cipher_suite_name_total(code in any::<u16>()) {
            let name = cipher_suite_name(code);
            let known = CIPHER_SUITES.iter().any(|(c, _)| *c == code);
            prop_assert_eq!(known, !name.starts_with("Unknown"));
        }
    }
}
