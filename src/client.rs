//! S3 client construction.
//!
//! [`client_options`] maps resolved [`Settings`] to the options the SDK
//! client is built with; [`build_client`] applies them. Building a client
//! sends no request: connection, TLS, and credential failures surface on
//! the first operation.

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{
    Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::Client;
use aws_smithy_http_client::hyper_014::HyperClientBuilder;
use aws_smithy_runtime_api::client::http::SharedHttpClient;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::config::{CredentialsSource, Settings};
use crate::endpoints;
use crate::errors::BlobstoreError;
use crate::signing::SigV2Interceptor;

/// Options the SDK client is configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Region requests are signed for.
    pub region: String,
    /// Custom endpoint; `None` leaves endpoint resolution to the SDK.
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    /// `false` installs a connector that accepts any server certificate.
    pub verify_peer: bool,
    pub credentials: CredentialsSource,
    /// Re-sign requests with Signature Version 2.
    pub v2_signing: bool,
    /// Only send checksums when an operation requires them.
    pub checksums_when_required: bool,
}

/// Derive client options from settings.
pub fn client_options(settings: &Settings) -> ClientOptions {
    // Servers outside the endpoint table may not speak aws-chunked uploads.
    let checksums_when_required = settings
        .host
        .as_deref()
        .is_some_and(|host| endpoints::region_for_host(host).is_none());

    ClientOptions {
        region: settings.effective_region.signing_region().to_string(),
        endpoint_url: settings.endpoint_url.clone(),
        force_path_style: true,
        verify_peer: settings.ssl_verify_peer,
        credentials: settings.credentials.clone(),
        v2_signing: settings.use_v2_signing_method
            && settings.credentials != CredentialsSource::Anonymous,
        checksums_when_required,
    }
}

/// Build the SDK client for `settings`.
pub async fn build_client(settings: &Settings) -> Result<Client, BlobstoreError> {
    let options = client_options(settings);
    debug!("Building S3 client: {:?}", options);

    let mut config_loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(options.region.clone()));

    if let Some(ref endpoint) = options.endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    config_loader = match &options.credentials {
        CredentialsSource::Static {
            access_key_id,
            secret_access_key,
        } => config_loader.credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key,
            None, // session_token
            None, // expiry
            "s3blob-config",
        )),
        CredentialsSource::Anonymous => config_loader.no_credentials(),
        CredentialsSource::DefaultChain => config_loader,
    };

    if !options.verify_peer {
        warn!("ssl_verify_peer is false: server certificates will not be verified");
        config_loader = config_loader.http_client(insecure_http_client());
    }

    let sdk_config = config_loader.load().await;

    let mut s3_config_builder =
        aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(options.force_path_style);

    if options.checksums_when_required {
        s3_config_builder = s3_config_builder
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired);
    }

    if options.v2_signing {
        if let CredentialsSource::Static {
            access_key_id,
            secret_access_key,
        } = &options.credentials
        {
            s3_config_builder = s3_config_builder
                .interceptor(SigV2Interceptor::new(access_key_id, secret_access_key));
        }
    }

    Ok(Client::from_conf(s3_config_builder.build()))
}

/// HTTP client whose TLS layer accepts any server certificate.
fn insecure_http_client() -> SharedHttpClient {
    let mut tls_config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(rustls::RootCertStore::empty())
        .with_no_client_auth();
    tls_config
        .dangerous()
        .set_certificate_verifier(Arc::new(AcceptAnyServerCert));

    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .build();

    HyperClientBuilder::new().build(connector)
}

/// Certificate verifier used when `ssl_verify_peer` is false.
struct AcceptAnyServerCert;

impl rustls::client::ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}
