pub mod certificate;
pub mod site;

/// Template parameter carrying the looked-up hosted zone id. The lookup
/// happens at deploy time so synthesis stays offline.
pub const HOSTED_ZONE_ID_PARAM: &str = "HostedZoneId";

/// Template parameter on the site stack carrying the certificate ARN from
/// the us-east-1 certificate stack. CloudFormation cannot import values
/// across regions, so the ARN travels through stack outputs instead.
pub const CERT_ARN_PARAM: &str = "CertificateArn";

pub const OUT_CERTIFICATE_ARN: &str = "CertificateArn";
pub const OUT_WEBSITE_URL: &str = "WebsiteUrl";
pub const OUT_DISTRIBUTION_ID: &str = "DistributionId";
pub const OUT_BUCKET_NAME: &str = "BucketName";
