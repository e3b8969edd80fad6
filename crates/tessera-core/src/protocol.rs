//! Protocol resolution from URIs.
//!
//! Dispatch needs a protocol token for every location. [`ProtocolResolver`]
//! derives it from the URI scheme so callers never pass it explicitly:
//!
//! | URI | Token |
//! |-----|-------|
//! | `/tmp/data`, `C:\data`, `file:///tmp/data` | `file` |
//! | `s3://bucket/key`, `s3a://bucket/key` | `s3` |
//! | `gs://bucket/key`, `gcs://bucket/key` | `gs` |
//! | `abfs://container/key`, `abfss://...`, `az://...` | `abfs` |
//! | `weird://x` | `weird` |
//!
//! Resolution is total: unknown schemes yield their own lowercased name, and
//! the "no handler" failure surfaces later at registry lookup.

use std::collections::HashMap;

/// Local filesystem protocol token.
pub const LOCAL: &str = "file";
/// Amazon S3 (and compatible) protocol token.
pub const S3: &str = "s3";
/// Google Cloud Storage protocol token.
pub const GCS: &str = "gs";
/// Azure Blob / Data Lake protocol token.
pub const ABFS: &str = "abfs";
/// In-process memory protocol token.
pub const MEMORY: &str = "memory";

const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("local", LOCAL),
    ("s3a", S3),
    ("s3n", S3),
    ("gcs", GCS),
    ("abfss", ABFS),
    ("az", ABFS),
    ("adl", ABFS),
    ("mem", MEMORY),
];

/// Maps URI schemes and alias tokens to canonical protocol tokens.
#[derive(Debug, Clone)]
pub struct ProtocolResolver {
    aliases: HashMap<String, String>,
    default_protocol: String,
}

impl Default for ProtocolResolver {
    fn default() -> Self {
        Self {
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(alias, canonical)| ((*alias).to_string(), (*canonical).to_string()))
                .collect(),
            default_protocol: LOCAL.to_string(),
        }
    }
}

impl ProtocolResolver {
    /// Creates a resolver with the built-in alias table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `protocol` for URIs without a scheme.
    #[must_use]
    pub fn with_default_protocol(mut self, protocol: &str) -> Self {
        self.default_protocol = self.canonical(protocol);
        self
    }

    /// Makes `alias` dispatch like `canonical`.
    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        let canonical = self.canonical(canonical);
        self.aliases
            .insert(alias.trim().to_ascii_lowercase(), canonical);
    }

    /// Returns the token used for scheme-less URIs.
    #[must_use]
    pub fn default_protocol(&self) -> &str {
        &self.default_protocol
    }

    /// Canonicalizes a protocol token: lowercase, then alias lookup.
    #[must_use]
    pub fn canonical(&self, token: &str) -> String {
        let token = token.trim().to_ascii_lowercase();
        match self.aliases.get(&token) {
            Some(canonical) => canonical.clone(),
            None => token,
        }
    }

    /// Derives the protocol token of `uri`. Never fails.
    #[must_use]
    pub fn protocol_of(&self, uri: &str) -> String {
        match scheme(uri) {
            Some(scheme) => self.canonical(scheme),
            None => self.default_protocol.clone(),
        }
    }
}

/// Extracts the scheme of `<scheme>://...`, rejecting anything that is not a
/// valid RFC 3986 scheme (which also excludes Windows drive letters).
fn scheme(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.trim().split_once("://")?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() || scheme.len() < 2 {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(scheme)
}

/// A URI split into dispatch-relevant parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Canonical protocol token.
    pub protocol: String,
    /// Bucket or container; empty for local paths.
    pub bucket: String,
    /// Object path without leading or trailing slashes.
    pub path: String,
}

impl Location {
    /// Splits `uri`. Never fails; scheme-less input is a local path.
    #[must_use]
    pub fn parse(uri: &str, resolver: &ProtocolResolver) -> Self {
        let uri = uri.trim();
        let protocol = resolver.protocol_of(uri);
        let rest = match (scheme(uri), uri.split_once("://")) {
            (Some(_), Some((_, rest))) => rest,
            _ => uri,
        };

        let (bucket, path) = if protocol == LOCAL {
            ("", rest)
        } else {
            rest.split_once('/').unwrap_or((rest, ""))
        };

        Self {
            protocol,
            bucket: bucket.to_string(),
            path: path.trim_matches('/').to_string(),
        }
    }

    /// Joins a child segment onto the path.
    #[must_use]
    pub fn child(&self, segment: &str) -> String {
        let segment = segment.trim_matches('/');
        if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{segment}", self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_less_paths_are_local() {
        let resolver = ProtocolResolver::new();
        assert_eq!(resolver.protocol_of("/tmp/data"), LOCAL);
        assert_eq!(resolver.protocol_of("relative/dir"), LOCAL);
        assert_eq!(resolver.protocol_of(r"C:\data\x.parquet"), LOCAL);
        assert_eq!(resolver.protocol_of("c://data"), LOCAL);
        assert_eq!(resolver.protocol_of(""), LOCAL);
        assert_eq!(resolver.protocol_of("file:///tmp/data"), LOCAL);
    }

    #[test]
    fn object_store_schemes_are_canonicalized() {
        let resolver = ProtocolResolver::new();
        assert_eq!(resolver.protocol_of("s3://b/k"), S3);
        assert_eq!(resolver.protocol_of("S3A://b/k"), S3);
        assert_eq!(resolver.protocol_of("gs://b/k"), GCS);
        assert_eq!(resolver.protocol_of("gcs://b/k"), GCS);
        assert_eq!(resolver.protocol_of("abfss://c@acct/k"), ABFS);
        assert_eq!(resolver.protocol_of("az://c/k"), ABFS);
    }

    #[test]
    fn unknown_scheme_yields_best_effort_token() {
        let resolver = ProtocolResolver::new();
        assert_eq!(resolver.protocol_of("HDFS://nn/path"), "hdfs");
    }

    #[test]
    fn custom_alias_and_default() {
        let mut resolver = ProtocolResolver::new().with_default_protocol("s3a");
        resolver.add_alias("wasbs", "abfss");
        assert_eq!(resolver.default_protocol(), S3);
        assert_eq!(resolver.protocol_of("no/scheme"), S3);
        assert_eq!(resolver.protocol_of("wasbs://c/k"), ABFS);
    }

    #[test]
    fn location_splits_bucket_and_path() {
        let resolver = ProtocolResolver::new();

        let s3 = Location::parse("s3a://bucket/raw/01j/", &resolver);
        assert_eq!(s3.protocol, S3);
        assert_eq!(s3.bucket, "bucket");
        assert_eq!(s3.path, "raw/01j");
        assert_eq!(s3.child("part-0.parquet"), "raw/01j/part-0.parquet");

        let local = Location::parse("file:///tmp/out", &resolver);
        assert_eq!(local.protocol, LOCAL);
        assert_eq!(local.bucket, "");
        assert_eq!(local.path, "tmp/out");

        let bare = Location::parse("gs://bucket", &resolver);
        assert_eq!(bare.path, "");
        assert_eq!(bare.child("x"), "x");
    }
}
