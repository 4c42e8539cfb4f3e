//! Configuration loading and resolution.
//!
//! The configuration file is a JSON or YAML document deserialized into
//! [`ConfigDocument`] and then resolved into immutable [`Settings`]:
//! credentials are validated into a closed [`CredentialsSource`], the
//! effective region is derived from an explicit region, a well-known
//! endpoint hostname, or neither, and the endpoint URL is built from
//! host, port, and scheme.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::endpoints;
use crate::errors::BlobstoreError;

/// Signing region handed to the SDK when no region can be resolved.
///
/// S3-compatible servers accept it, and the SDK rejects blank regions.
pub const UNSPECIFIED_SIGNING_REGION: &str = "us-east-1";

/// Raw configuration document as found on disk.
///
/// Every field is optional at this stage; [`resolve`] enforces what is
/// required. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfigDocument {
    /// Target bucket.
    #[serde(default)]
    pub bucket_name: Option<String>,

    /// `static`, `none`, `env_or_profile`, or empty.
    #[serde(default)]
    pub credentials_source: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Custom endpoint host (S3-compatible servers or a default AWS hostname).
    #[serde(default)]
    pub host: Option<String>,

    /// Custom endpoint port. `0` means "not set".
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default = "default_true")]
    pub use_ssl: bool,

    #[serde(default = "default_true")]
    pub ssl_verify_peer: bool,

    #[serde(default)]
    pub use_v2_signing_method: bool,

    /// `2` or `4`; accepted as a number or a numeric string.
    #[serde(default, deserialize_with = "deserialize_signature_version")]
    pub signature_version: Option<u8>,

    /// Server-side encryption algorithm, e.g. `AES256` or `aws:kms`.
    #[serde(default)]
    pub server_side_encryption: Option<String>,

    #[serde(default)]
    pub sse_kms_key_id: Option<String>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            bucket_name: None,
            credentials_source: None,
            access_key_id: None,
            secret_access_key: None,
            host: None,
            port: None,
            region: None,
            use_ssl: default_true(),
            ssl_verify_peer: default_true(),
            use_v2_signing_method: false,
            signature_version: None,
            server_side_encryption: None,
            sse_kms_key_id: None,
        }
    }
}

/// Where request credentials come from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    /// Access key pair taken from the configuration document.
    Static {
        access_key_id: String,
        secret_access_key: String,
    },
    /// Unsigned requests; the blobstore is read-only.
    Anonymous,
    /// The SDK default chain (environment, profile, instance metadata).
    DefaultChain,
}

impl std::fmt::Debug for CredentialsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialsSource::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"** redacted **")
                .finish(),
            CredentialsSource::Anonymous => f.write_str("Anonymous"),
            CredentialsSource::DefaultChain => f.write_str("DefaultChain"),
        }
    }
}

/// Region the client signs requests for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveRegion {
    /// Explicitly configured, or mapped from a well-known endpoint.
    Named(String),
    /// Nothing resolvable: S3-compatible endpoint or SDK defaults.
    Unspecified,
}

impl EffectiveRegion {
    /// Region string handed to the SDK.
    pub fn signing_region(&self) -> &str {
        match self {
            EffectiveRegion::Named(region) => region,
            EffectiveRegion::Unspecified => UNSPECIFIED_SIGNING_REGION,
        }
    }
}

/// Validated, immutable settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bucket_name: String,
    pub credentials: CredentialsSource,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub region: Option<String>,
    pub use_ssl: bool,
    pub ssl_verify_peer: bool,
    pub use_v2_signing_method: bool,
    pub signature_version: Option<u8>,
    pub server_side_encryption: Option<String>,
    pub sse_kms_key_id: Option<String>,
    /// Region derived from `region`, `host`, or neither.
    pub effective_region: EffectiveRegion,
    /// `scheme://host[:port]` when a host is configured.
    pub endpoint_url: Option<String>,
}

impl Settings {
    /// Mutating operations are forbidden without credentials.
    pub fn is_read_only(&self) -> bool {
        self.credentials == CredentialsSource::Anonymous
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

// -- Loader ------------------------------------------------------------------

/// Load, parse, and resolve the configuration file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings, BlobstoreError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        BlobstoreError::config(format!("cannot read {}: {e}", path.display()))
    })?;
    parse_config(&contents)
}

/// Parse a JSON or YAML document and resolve it.
pub fn parse_config(contents: &str) -> Result<Settings, BlobstoreError> {
    let document: ConfigDocument = serde_yaml::from_str(contents)
        .map_err(|e| BlobstoreError::config(format!("cannot parse document: {e}")))?;
    resolve(document)
}

/// Validate a document and derive the effective region and endpoint.
pub fn resolve(document: ConfigDocument) -> Result<Settings, BlobstoreError> {
    let bucket_name = non_empty(document.bucket_name)
        .ok_or_else(|| BlobstoreError::config("bucket_name must be set"))?;

    let credentials = resolve_credentials(
        non_empty(document.credentials_source).as_deref(),
        non_empty(document.access_key_id),
        non_empty(document.secret_access_key),
    )?;

    let use_v2_signing_method = match document.signature_version {
        Some(2) => true,
        Some(4) => false,
        Some(other) => {
            return Err(BlobstoreError::config(format!(
                "signature_version must be 2 or 4, got {other}"
            )))
        }
        None => document.use_v2_signing_method,
    };

    if use_v2_signing_method && credentials == CredentialsSource::DefaultChain {
        return Err(BlobstoreError::config(
            "V2 signing requires credentials_source 'static'",
        ));
    }

    let host = non_empty(document.host);
    let port = document.port.filter(|p| *p != 0);
    let region = non_empty(document.region);

    let effective_region = match (&region, &host) {
        (Some(region), _) => EffectiveRegion::Named(region.clone()),
        (None, Some(host)) => match endpoints::region_for_host(host) {
            Some(mapped) => EffectiveRegion::Named(mapped.to_string()),
            None => EffectiveRegion::Unspecified,
        },
        (None, None) => EffectiveRegion::Unspecified,
    };

    let endpoint_url = host
        .as_deref()
        .map(|h| endpoint_url(h, port, document.use_ssl));

    Ok(Settings {
        bucket_name,
        credentials,
        host,
        port,
        region,
        use_ssl: document.use_ssl,
        ssl_verify_peer: document.ssl_verify_peer,
        use_v2_signing_method,
        signature_version: document.signature_version,
        server_side_encryption: non_empty(document.server_side_encryption),
        sse_kms_key_id: non_empty(document.sse_kms_key_id),
        effective_region,
        endpoint_url,
    })
}

/// Build `scheme://host[:port]`, omitting the conventional port.
///
/// A host that already carries a scheme is kept as is.
pub fn endpoint_url(host: &str, port: Option<u16>, use_ssl: bool) -> String {
    let (scheme, default_port) = if use_ssl { ("https", 443) } else { ("http", 80) };
    let base = if host.contains("://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("{scheme}://{host}")
    };
    match port {
        Some(p) if p != default_port => format!("{base}:{p}"),
        _ => base,
    }
}

fn resolve_credentials(
    source: Option<&str>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
) -> Result<CredentialsSource, BlobstoreError> {
    let has_keys = access_key_id.is_some() || secret_access_key.is_some();
    match source {
        Some("static") => static_credentials(access_key_id, secret_access_key),
        Some("none") if has_keys => Err(keys_not_allowed("none")),
        Some("none") => Ok(CredentialsSource::Anonymous),
        Some("env_or_profile") if has_keys => Err(keys_not_allowed("env_or_profile")),
        Some("env_or_profile") => Ok(CredentialsSource::DefaultChain),
        Some(other) => Err(BlobstoreError::config(format!(
            "invalid credentials_source: {other}"
        ))),
        None if has_keys => static_credentials(access_key_id, secret_access_key),
        None => Ok(CredentialsSource::Anonymous),
    }
}

fn static_credentials(
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
) -> Result<CredentialsSource, BlobstoreError> {
    match (access_key_id, secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(CredentialsSource::Static {
            access_key_id,
            secret_access_key,
        }),
        _ => Err(BlobstoreError::config(
            "access_key_id and secret_access_key must be provided",
        )),
    }
}

fn keys_not_allowed(source: &str) -> BlobstoreError {
    BlobstoreError::config(format!(
        "Can't use {source} credentials_source with access_key_id and secret_access_key"
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn deserialize_signature_version<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => u8::try_from(n)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("signature_version out of range: {n}"))),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse::<u8>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("signature_version is not a number: {s}"))),
    }
}
