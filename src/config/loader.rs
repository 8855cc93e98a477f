//! Configuration loading from raw bytes.

use std::str::FromStr;

use axum::http::uri::{Authority, Scheme};
use axum::http::HeaderValue;
use thiserror::Error;
use url::{Position, Url};

use crate::config::duration::parse_duration;
use crate::config::schema::{FlushPolicy, PluginDocument, TargetConfig};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid target URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported target scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),

    #[error("TLS client setup failed: {0}")]
    Tls(String),

    #[error("Invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },
}

/// Parse a configuration document. JSON when it starts with `{`, YAML otherwise.
pub fn parse_document(raw: &[u8]) -> Result<PluginDocument, ConfigError> {
    let first = raw.iter().find(|b| !b.is_ascii_whitespace());
    if first == Some(&b'{') {
        serde_json::from_slice(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    } else {
        serde_yaml::from_slice(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Parse and validate a configuration document.
pub fn load_target(raw: &[u8]) -> Result<TargetConfig, ConfigError> {
    let document = parse_document(raw)?;
    TargetConfig::try_from(document)
}

impl TryFrom<PluginDocument> for TargetConfig {
    type Error = ConfigError;

    fn try_from(doc: PluginDocument) -> Result<Self, Self::Error> {
        let invalid = |reason: String| ConfigError::InvalidUrl {
            url: doc.url.clone(),
            reason,
        };

        let url = Url::parse(doc.url.trim()).map_err(|e| invalid(e.to_string()))?;
        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };
        if url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        let host_port = &url[Position::BeforeHost..Position::AfterPort];
        let authority = Authority::from_str(host_port).map_err(|e| invalid(e.to_string()))?;
        let host_header = HeaderValue::from_str(host_port).map_err(|e| invalid(e.to_string()))?;

        let flush = match parse_duration(&doc.flush_interval) {
            Some(d) if d.negative => FlushPolicy::Immediate,
            Some(d) if d.is_zero() => FlushPolicy::Buffered,
            Some(d) => FlushPolicy::Periodic(d.magnitude),
            None => {
                return Err(ConfigError::InvalidDuration {
                    field: "flush_interval",
                    value: doc.flush_interval,
                })
            }
        };

        let timeout = match parse_duration(&doc.timeout) {
            Some(d) if d.negative || d.is_zero() => None,
            Some(d) => Some(d.magnitude),
            None => {
                return Err(ConfigError::InvalidDuration {
                    field: "timeout",
                    value: doc.timeout,
                })
            }
        };

        Ok(TargetConfig {
            scheme,
            authority,
            host_header,
            proxy_path: doc.proxy_path.trim_end_matches('/').to_string(),
            preserve_internal_headers: doc.preserve_internal_headers,
            flush,
            timeout,
            pass_unmatched: doc.pass_unmatched,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn yaml(url: &str, proxy_path: &str) -> Vec<u8> {
        format!("---\nurl: {}\nproxy_path: {}\n", url, proxy_path).into_bytes()
    }

    #[test]
    fn test_yaml_document() {
        let config = load_target(&yaml("http://127.0.0.1:8080/zero", "/first/")).unwrap();
        assert_eq!(config.authority().as_str(), "127.0.0.1:8080");
        assert_eq!(config.base_path(), "/zero");
        assert_eq!(config.proxy_path(), "/first");
        assert!(!config.preserve_internal_headers());
        assert_eq!(config.flush_policy(), FlushPolicy::Buffered);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_json_document() {
        let raw = br#"{"url": "http://example.com", "preserve_internal_headers": true, "flush_interval": "100ms", "timeout": "5s"}"#;
        let config = load_target(raw).unwrap();
        assert_eq!(config.authority().as_str(), "example.com");
        assert_eq!(config.proxy_path(), "");
        assert!(config.preserve_internal_headers());
        assert_eq!(
            config.flush_policy(),
            FlushPolicy::Periodic(Duration::from_millis(100))
        );
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_negative_flush_interval_is_immediate() {
        let raw = br#"{"url": "http://example.com", "flush_interval": "-1"}"#;
        let config = load_target(raw).unwrap();
        assert_eq!(config.flush_policy(), FlushPolicy::Immediate);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = load_target(b"&asdINVALID_YAML:^HERE").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_url() {
        let err = load_target(br#"{"url": "::INVALID::URL", "proxy_path": "/"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_missing_url() {
        let err = load_target(b"proxy_path: /first\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_https_target() {
        let config = load_target(b"url: https://example.com/zero\nproxy_path: /first\n").unwrap();
        assert_eq!(config.scheme(), &Scheme::HTTPS);
        assert_eq!(config.authority().as_str(), "example.com");
        assert_eq!(config.base_path(), "/zero");
        assert_eq!(config.proxy_path(), "/first");
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = load_target(&yaml("ftp://example.com/files", "")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_invalid_duration() {
        let raw = br#"{"url": "http://example.com", "flush_interval": "soon"}"#;
        let err = load_target(raw).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration { field: "flush_interval", .. }
        ));
    }
}
