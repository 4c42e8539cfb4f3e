//! AWS Signature Version 2 request signing.
//!
//! Older S3-compatible servers only understand the V2 scheme, which the
//! SDK no longer ships. [`SigV2Interceptor`] runs after the SDK has built
//! (and V4-signed) a request and replaces its `Authorization` header:
//!
//! ```text
//! StringToSign = HTTP-Verb + "\n" +
//!                Content-MD5 + "\n" +
//!                Content-Type + "\n" +
//!                Date + "\n" +
//!                CanonicalizedAmzHeaders +
//!                CanonicalizedResource
//! Authorization = "AWS " + AccessKeyId + ":" + Base64(HMAC-SHA1(Secret, StringToSign))
//! ```

use std::collections::BTreeMap;
use std::time::SystemTime;

use aws_smithy_runtime_api::box_error::BoxError;
use aws_smithy_runtime_api::client::interceptors::context::BeforeTransmitInterceptorContextMut;
use aws_smithy_runtime_api::client::interceptors::Intercept;
use aws_smithy_runtime_api::client::runtime_components::RuntimeComponents;
use aws_smithy_types::config_bag::ConfigBag;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::trace;

type HmacSha1 = Hmac<Sha1>;

/// Query parameters that belong to the canonical resource.
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "cors",
    "delete",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
    "response-content-language",
    "response-content-type",
    "response-expires",
    "tagging",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

// ── String to sign ──────────────────────────────────────────────────

/// Build the `CanonicalizedAmzHeaders` element.
///
/// `x-amz-*` headers are lowercased, sorted, values trimmed, repeated
/// headers joined with `,`, each line terminated by `\n`.
pub fn canonical_amz_headers<'a>(
    headers: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> String {
    let mut amz: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        if name.starts_with("x-amz-") {
            amz.entry(name).or_default().push(value.trim().to_string());
        }
    }

    let mut canonical = String::new();
    for (name, values) in amz {
        canonical.push_str(&name);
        canonical.push(':');
        canonical.push_str(&values.join(","));
        canonical.push('\n');
    }
    canonical
}

/// Build the `CanonicalizedResource` element from a path-style request.
///
/// Only recognised sub-resources survive from the query string, sorted
/// by name; SDK bookkeeping parameters such as `x-id` are dropped.
pub fn canonical_resource(path: &str, query: Option<&str>) -> String {
    let mut resource = if path.is_empty() { "/".to_string() } else { path.to_string() };

    let mut params: Vec<(&str, Option<&str>)> = query
        .unwrap_or("")
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (part, None),
        })
        .filter(|(k, _)| SUB_RESOURCES.contains(k))
        .collect();
    params.sort();

    for (idx, (name, value)) in params.iter().enumerate() {
        resource.push(if idx == 0 { '?' } else { '&' });
        resource.push_str(name);
        if let Some(value) = value {
            resource.push('=');
            resource.push_str(value);
        }
    }
    resource
}

/// Assemble the V2 string to sign.
pub fn build_string_to_sign(
    method: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    amz_headers: &str,
    resource: &str,
) -> String {
    format!("{method}\n{content_md5}\n{content_type}\n{date}\n{amz_headers}{resource}")
}

/// Compute `Base64(HMAC-SHA1(secret, string_to_sign))`.
pub fn compute_signature(secret_access_key: &str, string_to_sign: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(secret_access_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

// ── Interceptor ─────────────────────────────────────────────────────

/// Re-signs every outgoing request with AWS Signature Version 2.
#[derive(Clone)]
pub struct SigV2Interceptor {
    access_key_id: String,
    secret_access_key: String,
}

impl std::fmt::Debug for SigV2Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigV2Interceptor")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl SigV2Interceptor {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Compute the `Authorization` header value for a request.
    pub fn authorization(
        &self,
        method: &str,
        uri: &str,
        headers: &[(String, String)],
    ) -> Result<String, BoxError> {
        let uri: http::Uri = uri.parse()?;
        let header = |name: &str| {
            headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.trim())
                .unwrap_or("")
        };

        // x-amz-date, when present, replaces the Date line.
        let date = if headers.iter().any(|(n, _)| n.eq_ignore_ascii_case("x-amz-date")) {
            ""
        } else {
            header("date")
        };

        let string_to_sign = build_string_to_sign(
            method,
            header("content-md5"),
            header("content-type"),
            date,
            &canonical_amz_headers(headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))),
            &canonical_resource(uri.path(), uri.query()),
        );
        trace!("SigV2 string to sign: {:?}", string_to_sign);

        let signature = compute_signature(&self.secret_access_key, &string_to_sign);
        Ok(format!("AWS {}:{}", self.access_key_id, signature))
    }
}

impl Intercept for SigV2Interceptor {
    fn name(&self) -> &'static str {
        "SigV2Interceptor"
    }

    fn modify_before_transmit(
        &self,
        context: &mut BeforeTransmitInterceptorContextMut<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let request = context.request_mut();

        // V2 servers expect an HTTP date, not the V4 basic format.
        request
            .headers_mut()
            .insert("x-amz-date", httpdate::fmt_http_date(SystemTime::now()));

        let headers: Vec<(String, String)> = request
            .headers()
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        let authorization = self.authorization(request.method(), request.uri(), &headers)?;

        request.headers_mut().insert("authorization", authorization);
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
