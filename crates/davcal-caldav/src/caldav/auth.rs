//! HTTP authentication for CalDAV requests.
//!
//! Basic (RFC 7617) and Digest (RFC 7616, MD5) schemes, chosen from the
//! server's `WWW-Authenticate` challenge.

use std::collections::HashMap;

use base64::Engine;
use rand::Rng;

/// Username and password pair.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value for a Basic `Authorization` header.
    pub fn basic_header(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", encoded)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The scheme a server asked for in its 401 response.
#[derive(Debug, Clone)]
pub enum Challenge {
    Basic,
    Digest(DigestAuth),
}

impl Challenge {
    /// Reads a `WWW-Authenticate` header value.
    ///
    /// Digest wins when the header is well formed; anything else that names
    /// Basic falls back to it.
    pub fn parse(header: &str) -> Option<Self> {
        let trimmed = header.trim();
        if let Some(digest) = DigestAuth::parse(trimmed) {
            return Some(Self::Digest(digest));
        }
        if trimmed.to_ascii_lowercase().contains("basic") {
            return Some(Self::Basic);
        }
        None
    }
}

/// Digest authentication state for one server challenge.
///
/// Keeps the nonce count so consecutive requests reuse the same nonce.
#[derive(Debug, Clone)]
pub struct DigestAuth {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    /// Offered quality-of-protection values, e.g. `auth,auth-int`.
    pub qop: Option<String>,
    pub algorithm: String,
    nonce_count: u32,
}

impl DigestAuth {
    /// Parses a `Digest ...` challenge; `None` for other schemes or when
    /// `realm`/`nonce` are missing.
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, rest) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let mut params = parse_auth_params(rest);

        Some(Self {
            realm: params.remove("realm")?,
            nonce: params.remove("nonce")?,
            opaque: params.remove("opaque"),
            qop: params.remove("qop"),
            algorithm: params
                .remove("algorithm")
                .unwrap_or_else(|| "MD5".to_string()),
            nonce_count: 0,
        })
    }

    fn supports_qop_auth(&self) -> bool {
        self.qop
            .as_deref()
            .is_some_and(|qop| qop.split(',').any(|v| v.trim() == "auth"))
    }

    /// Builds the `Authorization` header for one request.
    pub fn authorize(&mut self, method: &str, uri: &str, credentials: &Credentials) -> String {
        self.nonce_count += 1;
        let nc = format!("{:08x}", self.nonce_count);
        let cnonce = client_nonce();

        let ha1 = md5_hex(&format!(
            "{}:{}:{}",
            credentials.username, self.realm, credentials.password
        ));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));

        let use_qop = self.supports_qop_auth();
        let response = if use_qop {
            md5_hex(&format!("{}:{}:{}:{}:auth:{}", ha1, self.nonce, nc, cnonce, ha2))
        } else {
            md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        };

        let mut parts = vec![
            format!("username=\"{}\"", credentials.username),
            format!("realm=\"{}\"", self.realm),
            format!("nonce=\"{}\"", self.nonce),
            format!("uri=\"{}\"", uri),
            format!("response=\"{}\"", response),
            format!("algorithm={}", self.algorithm),
        ];
        if use_qop {
            parts.push("qop=auth".to_string());
            parts.push(format!("nc={}", nc));
            parts.push(format!("cnonce=\"{}\"", cnonce));
        }
        if let Some(ref opaque) = self.opaque {
            parts.push(format!("opaque=\"{}\"", opaque));
        }

        format!("Digest {}", parts.join(", "))
    }
}

/// Splits `key=value, key="quoted value"` pairs. Keys are lowercased.
fn parse_auth_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        let Some((key, after_key)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().to_lowercase();

        let (value, remaining) = if let Some(quoted) = after_key.strip_prefix('"') {
            let mut value = String::new();
            let mut escaped = false;
            let mut end = quoted.len();
            for (idx, c) in quoted.char_indices() {
                if escaped {
                    value.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    end = idx + 1;
                    break;
                } else {
                    value.push(c);
                }
            }
            (value, &quoted[end.min(quoted.len())..])
        } else {
            let end = after_key.find(',').unwrap_or(after_key.len());
            (after_key[..end].trim().to_string(), &after_key[end..])
        };

        if !key.is_empty() {
            params.insert(key, value);
        }
        rest = remaining;
    }

    params
}

fn client_nonce() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("alice", "s3cret")
    }

    #[test]
    fn parse_digest_challenge() {
        let header = r#"Digest realm="dav@example.com", nonce="abc123", qop="auth,auth-int", algorithm=MD5"#;
        let auth = DigestAuth::parse(header).unwrap();

        assert_eq!(auth.realm, "dav@example.com");
        assert_eq!(auth.nonce, "abc123");
        assert_eq!(auth.qop.as_deref(), Some("auth,auth-int"));
        assert_eq!(auth.algorithm, "MD5");
        assert!(auth.supports_qop_auth());
    }

    #[test]
    fn parse_digest_with_opaque_and_commas_in_quotes() {
        let header = r#"Digest realm="Sabre, DAV", nonce="xyz", opaque="op""#;
        let auth = DigestAuth::parse(header).unwrap();

        assert_eq!(auth.realm, "Sabre, DAV");
        assert_eq!(auth.opaque.as_deref(), Some("op"));
        assert!(auth.qop.is_none());
    }

    #[test]
    fn parse_digest_requires_nonce() {
        assert!(DigestAuth::parse(r#"Digest realm="x""#).is_none());
        assert!(DigestAuth::parse(r#"Basic realm="x""#).is_none());
    }

    #[test]
    fn challenge_selection() {
        assert!(matches!(
            Challenge::parse(r#"Basic realm="Nextcloud""#),
            Some(Challenge::Basic)
        ));
        assert!(matches!(
            Challenge::parse(r#"Digest realm="r", nonce="n""#),
            Some(Challenge::Digest(_))
        ));
        assert!(Challenge::parse("Bearer").is_none());
    }

    #[test]
    fn digest_authorize_counts_nonces() {
        let mut auth = DigestAuth::parse(r#"Digest realm="r", nonce="n", qop="auth""#).unwrap();

        let first = auth.authorize("PROPFIND", "/dav/", &creds());
        let second = auth.authorize("REPORT", "/dav/cal/", &creds());

        assert!(first.starts_with("Digest "));
        assert!(first.contains("username=\"alice\""));
        assert!(first.contains("uri=\"/dav/\""));
        assert!(first.contains("nc=00000001"));
        assert!(second.contains("nc=00000002"));
        assert!(!first.contains("s3cret"));
    }

    #[test]
    fn digest_without_qop_omits_nonce_count() {
        let mut auth = DigestAuth::parse(r#"Digest realm="r", nonce="n""#).unwrap();
        let header = auth.authorize("GET", "/", &creds());

        // RFC 2069 form: MD5(HA1:nonce:HA2)
        let ha1 = md5_hex("alice:r:s3cret");
        let ha2 = md5_hex("GET:/");
        let expected = md5_hex(&format!("{}:n:{}", ha1, ha2));
        assert!(header.contains(&format!("response=\"{}\"", expected)));
        assert!(!header.contains("nc="));
    }

    #[test]
    fn basic_header_encoding() {
        // base64("user:password")
        let header = Credentials::new("user", "password").basic_header();
        assert_eq!(header, "Basic dXNlcjpwYXNzd29yZA==");
    }

    #[test]
    fn debug_redacts_password() {
        let debug = format!("{:?}", creds());
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn md5_hex_computation() {
        assert_eq!(md5_hex("hello"), "5d41402abc4b2a76b9719d911017c592");
    }
}
