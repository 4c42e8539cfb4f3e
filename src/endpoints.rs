//! Well-known S3 endpoint hostnames and the region each one serves.

/// Default S3 hostnames mapped to their region codes.
const ENDPOINT_REGIONS: &[(&str, &str)] = &[
    ("s3.amazonaws.com", "us-east-1"),
    ("s3-external-1.amazonaws.com", "us-east-1"),
    ("s3-us-west-1.amazonaws.com", "us-west-1"),
    ("s3-us-west-2.amazonaws.com", "us-west-2"),
    ("s3-eu-west-1.amazonaws.com", "eu-west-1"),
    ("s3.eu-central-1.amazonaws.com", "eu-central-1"),
    ("s3-eu-central-1.amazonaws.com", "eu-central-1"),
    ("s3-ap-southeast-1.amazonaws.com", "ap-southeast-1"),
    ("s3-ap-southeast-2.amazonaws.com", "ap-southeast-2"),
    ("s3-ap-northeast-1.amazonaws.com", "ap-northeast-1"),
    ("s3.ap-northeast-2.amazonaws.com", "ap-northeast-2"),
    ("s3-ap-northeast-2.amazonaws.com", "ap-northeast-2"),
    ("s3-sa-east-1.amazonaws.com", "sa-east-1"),
];

/// Look up the region served by a default S3 hostname.
///
/// Matching is exact and case-insensitive; a port suffix is not stripped.
pub fn region_for_host(host: &str) -> Option<&'static str> {
    ENDPOINT_REGIONS
        .iter()
        .find(|(endpoint, _)| endpoint.eq_ignore_ascii_case(host))
        .map(|(_, region)| *region)
}
