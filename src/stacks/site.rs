use serde::Serialize;
use serde_json::Value;

use crate::config::SiteConfig;
use crate::error::Result;
use crate::template::{get_att, get_ref, sub, Template};

use super::{
    CERT_ARN_PARAM, HOSTED_ZONE_ID_PARAM, OUT_BUCKET_NAME, OUT_DISTRIBUTION_ID, OUT_WEBSITE_URL,
};

pub const LOGICAL_BUCKET_NAME: &str = "OriginBucket";
pub const LOGICAL_BUCKET_POLICY_NAME: &str = "OriginBucketPolicy";
pub const LOGICAL_OAC_NAME: &str = "OriginAccessControl";
pub const LOGICAL_DISTR_NAME: &str = "SiteDistribution";
pub const LOGICAL_RECORD_NAME: &str = "AliasRecord";

pub const DEFAULT_ROOT_OBJECT: &str = "index.html";

/// The managed CachingOptimized cache policy.
/// https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-cache-policies.html#managed-cache-caching-optimized
const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

/// Fixed hosted zone id every CloudFront distribution's alias target uses.
const CLOUDFRONT_ALIAS_ZONE_ID: &str = "Z2FDTNDATAQYW2";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Bucket {
    public_access_block_configuration: PublicAccessBlockConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PublicAccessBlockConfiguration {
    block_public_acls: bool,
    block_public_policy: bool,
    ignore_public_acls: bool,
    restrict_public_buckets: bool,
}

impl PublicAccessBlockConfiguration {
    fn block_all() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct BucketPolicy {
    bucket: Value,
    policy_document: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct OriginAccessControl {
    origin_access_control_config: OriginAccessControlConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct OriginAccessControlConfig {
    name: String,
    origin_access_control_origin_type: String,
    signing_behavior: String,
    signing_protocol: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Distribution {
    distribution_config: DistributionConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DistributionConfig {
    aliases: Vec<String>,
    default_root_object: String,
    enabled: bool,
    http_version: String,
    origins: Vec<Origin>,
    default_cache_behavior: DefaultCacheBehavior,
    viewer_certificate: ViewerCertificate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Origin {
    id: String,
    domain_name: Value,
    origin_access_control_id: Value,
    s3_origin_config: S3OriginConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct S3OriginConfig {
    // must be present and empty when access goes through an origin access
    // control instead of a legacy origin access identity
    origin_access_identity: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DefaultCacheBehavior {
    cache_policy_id: String,
    target_origin_id: String,
    viewer_protocol_policy: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ViewerCertificate {
    acm_certificate_arn: Value,
    ssl_support_method: String,
    minimum_protocol_version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RecordSet {
    name: String,
    #[serde(rename = "Type")]
    ty: String,
    hosted_zone_id: Value,
    alias_target: AliasTarget,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AliasTarget {
    #[serde(rename = "DNSName")]
    dns_name: Value,
    hosted_zone_id: String,
}

/// Only the distribution may read the origin bucket: the bucket keeps all
/// public access blocked, and this policy grants GetObject to the CloudFront
/// service principal scoped to this one distribution's ARN.
fn distribution_read_policy() -> Value {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "cloudfront.amazonaws.com" },
            "Action": "s3:GetObject",
            "Resource": sub(&format!("arn:aws:s3:::${{{LOGICAL_BUCKET_NAME}}}/*")),
            "Condition": {
                "StringEquals": {
                    "AWS:SourceArn": sub(&format!(
                        "arn:aws:cloudfront::${{AWS::AccountId}}:distribution/${{{LOGICAL_DISTR_NAME}}}"
                    ))
                }
            }
        }]
    })
}

/// Synthesizes the site stack: private origin bucket, distribution fronting
/// it through an origin access control, alias record, and the deployment
/// outputs. Resource ordering is implied by the Ref/GetAtt edges.
pub fn synth(cfg: &SiteConfig) -> Result<Template> {
    let full_domain = cfg.full_domain();
    let mut template = Template::new(&format!("CDN-backed static site for {full_domain}"));
    template.parameter(
        HOSTED_ZONE_ID_PARAM,
        "Id of the pre-existing hosted zone the alias record goes into",
    );
    template.parameter(
        CERT_ARN_PARAM,
        "ARN of the issued us-east-1 certificate for the site domain",
    );

    let bucket = Bucket {
        public_access_block_configuration: PublicAccessBlockConfiguration::block_all(),
    };
    template.resource(LOGICAL_BUCKET_NAME, "AWS::S3::Bucket", bucket)?;

    let oac = OriginAccessControl {
        origin_access_control_config: OriginAccessControlConfig {
            name: format!("{}-oac", cfg.site_stack_name()),
            origin_access_control_origin_type: "s3".to_string(),
            signing_behavior: "always".to_string(),
            signing_protocol: "sigv4".to_string(),
        },
    };
    template.resource(LOGICAL_OAC_NAME, "AWS::CloudFront::OriginAccessControl", oac)?;

    let origin_id = "origin0";
    let distribution = Distribution {
        distribution_config: DistributionConfig {
            aliases: vec![full_domain.clone()],
            default_root_object: DEFAULT_ROOT_OBJECT.to_string(),
            enabled: true,
            http_version: "http2".to_string(),
            origins: vec![Origin {
                id: origin_id.to_string(),
                domain_name: get_att(LOGICAL_BUCKET_NAME, "RegionalDomainName"),
                origin_access_control_id: get_ref(LOGICAL_OAC_NAME),
                s3_origin_config: S3OriginConfig {
                    origin_access_identity: String::new(),
                },
            }],
            default_cache_behavior: DefaultCacheBehavior {
                cache_policy_id: CACHING_OPTIMIZED_POLICY_ID.to_string(),
                target_origin_id: origin_id.to_string(),
                viewer_protocol_policy: "redirect-to-https".to_string(),
            },
            viewer_certificate: ViewerCertificate {
                acm_certificate_arn: get_ref(CERT_ARN_PARAM),
                ssl_support_method: "sni-only".to_string(),
                minimum_protocol_version: "TLSv1.2_2021".to_string(),
            },
        },
    };
    template.resource(LOGICAL_DISTR_NAME, "AWS::CloudFront::Distribution", distribution)?;

    let policy = BucketPolicy {
        bucket: get_ref(LOGICAL_BUCKET_NAME),
        policy_document: distribution_read_policy(),
    };
    template.resource(LOGICAL_BUCKET_POLICY_NAME, "AWS::S3::BucketPolicy", policy)?;

    let record = RecordSet {
        // record set names are fully qualified and dot-terminated
        name: format!("{full_domain}."),
        ty: "A".to_string(),
        hosted_zone_id: get_ref(HOSTED_ZONE_ID_PARAM),
        alias_target: AliasTarget {
            dns_name: get_att(LOGICAL_DISTR_NAME, "DomainName"),
            hosted_zone_id: CLOUDFRONT_ALIAS_ZONE_ID.to_string(),
        },
    };
    template.resource(LOGICAL_RECORD_NAME, "AWS::Route53::RecordSet", record)?;

    template.output(
        OUT_WEBSITE_URL,
        "Public URL the site is served on",
        Value::String(cfg.website_url()),
    );
    template.output(
        OUT_DISTRIBUTION_ID,
        "Id of the CloudFront distribution",
        get_ref(LOGICAL_DISTR_NAME),
    );
    template.output(
        OUT_BUCKET_NAME,
        "Name of the origin bucket assets are uploaded to",
        get_ref(LOGICAL_BUCKET_NAME),
    );
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_template() -> serde_json::Value {
        let cfg = SiteConfig::new("example.com", "demo", "eu-west-1", None).unwrap();
        let t = synth(&cfg).unwrap();
        serde_json::from_str(&t.to_json().unwrap()).unwrap()
    }

    #[test]
    fn bucket_blocks_all_public_access() {
        let v = demo_template();
        let block = &v["Resources"][LOGICAL_BUCKET_NAME]["Properties"]["PublicAccessBlockConfiguration"];
        for flag in [
            "BlockPublicAcls",
            "BlockPublicPolicy",
            "IgnorePublicAcls",
            "RestrictPublicBuckets",
        ] {
            assert_eq!(block[flag], true, "{flag} must be true");
        }
    }

    #[test]
    fn bucket_policy_only_admits_this_distribution() {
        let v = demo_template();
        let statement = &v["Resources"][LOGICAL_BUCKET_POLICY_NAME]["Properties"]["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Principal"]["Service"], "cloudfront.amazonaws.com");
        assert_eq!(statement["Action"], "s3:GetObject");
        assert_eq!(
            statement["Condition"]["StringEquals"]["AWS:SourceArn"],
            serde_json::json!({"Fn::Sub": "arn:aws:cloudfront::${AWS::AccountId}:distribution/${SiteDistribution}"})
        );
    }

    #[test]
    fn distribution_alias_list_is_exactly_the_full_domain() {
        let v = demo_template();
        let config = &v["Resources"][LOGICAL_DISTR_NAME]["Properties"]["DistributionConfig"];
        assert_eq!(config["Aliases"], serde_json::json!(["demo.example.com"]));
    }

    #[test]
    fn distribution_redirects_http_to_https() {
        let v = demo_template();
        let config = &v["Resources"][LOGICAL_DISTR_NAME]["Properties"]["DistributionConfig"];
        assert_eq!(config["DefaultCacheBehavior"]["ViewerProtocolPolicy"], "redirect-to-https");
        assert_eq!(config["DefaultRootObject"], "index.html");
    }

    #[test]
    fn origin_reads_the_bucket_through_the_access_control() {
        let v = demo_template();
        let origin = &v["Resources"][LOGICAL_DISTR_NAME]["Properties"]["DistributionConfig"]["Origins"][0];
        assert_eq!(
            origin["DomainName"],
            serde_json::json!({"Fn::GetAtt": [LOGICAL_BUCKET_NAME, "RegionalDomainName"]})
        );
        assert_eq!(origin["OriginAccessControlId"], serde_json::json!({"Ref": LOGICAL_OAC_NAME}));
        assert_eq!(origin["S3OriginConfig"]["OriginAccessIdentity"], "");
    }

    #[test]
    fn distribution_binds_the_certificate_parameter() {
        let v = demo_template();
        let cert = &v["Resources"][LOGICAL_DISTR_NAME]["Properties"]["DistributionConfig"]["ViewerCertificate"];
        assert_eq!(cert["AcmCertificateArn"], serde_json::json!({"Ref": CERT_ARN_PARAM}));
        assert_eq!(cert["SslSupportMethod"], "sni-only");
    }

    #[test]
    fn alias_record_points_the_subdomain_at_the_distribution() {
        let v = demo_template();
        let props = &v["Resources"][LOGICAL_RECORD_NAME]["Properties"];
        assert_eq!(props["Name"], "demo.example.com.");
        assert_eq!(props["Type"], "A");
        assert_eq!(
            props["AliasTarget"]["DNSName"],
            serde_json::json!({"Fn::GetAtt": [LOGICAL_DISTR_NAME, "DomainName"]})
        );
        assert_eq!(props["AliasTarget"]["HostedZoneId"], CLOUDFRONT_ALIAS_ZONE_ID);
    }

    #[test]
    fn outputs_expose_url_distribution_and_bucket() {
        let v = demo_template();
        assert_eq!(v["Outputs"][OUT_WEBSITE_URL]["Value"], "https://demo.example.com");
        assert_eq!(
            v["Outputs"][OUT_DISTRIBUTION_ID]["Value"],
            serde_json::json!({"Ref": LOGICAL_DISTR_NAME})
        );
        assert_eq!(
            v["Outputs"][OUT_BUCKET_NAME]["Value"],
            serde_json::json!({"Ref": LOGICAL_BUCKET_NAME})
        );
    }
}
