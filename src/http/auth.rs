// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Authentication helpers

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// `Authorization` value for HTTP basic authentication.
///
/// Non-strict encoding is MIME style: a newline after every 60 characters
/// and at the end. Header values may not contain newlines, so only the
/// strict form can be sent as an `Authorization` header; the non-strict
/// form is for bodies and logs.
pub fn basic_authentication(user: &str, password: &str, strict: bool) -> String {
    let encoded = STANDARD.encode(format!("{}:{}", user, password));
    if strict {
        return format!("Basic {}", encoded);
    }
    let mut seed = String::from("Basic ");
    for line in encoded.as_bytes().chunks(MIME_LINE) {
        seed.push_str(&String::from_utf8_lossy(line));
        seed.push('\n');
    }
    seed
}

const MIME_LINE: usize = 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_authentication() {
        assert_eq!(
            basic_authentication("Aladdin", "open sesame", true),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
        assert_eq!(
            basic_authentication("Aladdin", "open sesame", false),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==\n"
        );
    }

    #[test]
    fn test_long_credentials_wrapped() {
        let seed = basic_authentication(&"u".repeat(40), &"p".repeat(40), false);
        let lines: Vec<_> = seed.trim_start_matches("Basic ").lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 60);
        assert!(seed.ends_with('\n'));
    }

    #[test]
    fn test_only_strict_form_is_a_header_value() {
        let strict = basic_authentication("Aladdin", "open sesame", true);
        let wrapped = basic_authentication("Aladdin", "open sesame", false);
        assert!(reqwest::header::HeaderValue::from_str(&strict).is_ok());
        assert!(reqwest::header::HeaderValue::from_str(&wrapped).is_err());
    }
}
