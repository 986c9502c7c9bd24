use serde::Serialize;
use serde_json::Value;

use crate::config::SiteConfig;
use crate::error::Result;
use crate::template::{get_ref, Template};

use super::{HOSTED_ZONE_ID_PARAM, OUT_CERTIFICATE_ARN};

pub const LOGICAL_CERT_NAME: &str = "SiteCertificate";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Certificate {
    domain_name: String,
    validation_method: String,
    domain_validation_options: Vec<DomainValidationOption>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DomainValidationOption {
    domain_name: String,
    hosted_zone_id: Value,
}

/// Synthesizes the certificate stack: a single DNS-validated ACM certificate
/// for the site's fully-qualified domain. Binding the hosted zone in the
/// validation options lets the provider create and resolve the validation
/// record without manual action; stack creation settles only once the
/// certificate is issued.
pub fn synth(cfg: &SiteConfig) -> Result<Template> {
    let full_domain = cfg.full_domain();
    let mut template = Template::new(&format!("TLS certificate for {full_domain}"));
    template.parameter(
        HOSTED_ZONE_ID_PARAM,
        "Id of the pre-existing hosted zone the validation record goes into",
    );
    let cert = Certificate {
        domain_name: full_domain.clone(),
        validation_method: "DNS".to_string(),
        domain_validation_options: vec![DomainValidationOption {
            domain_name: full_domain,
            hosted_zone_id: get_ref(HOSTED_ZONE_ID_PARAM),
        }],
    };
    template.resource(LOGICAL_CERT_NAME, "AWS::CertificateManager::Certificate", cert)?;
    template.output(
        OUT_CERTIFICATE_ARN,
        "ARN of the issued certificate, consumed by the site stack",
        get_ref(LOGICAL_CERT_NAME),
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
    fn cert_domain_is_exactly_subdomain_dot_domain() {
        let v = demo_template();
        let props = &v["Resources"][LOGICAL_CERT_NAME]["Properties"];
        assert_eq!(props["DomainName"], "demo.example.com");
    }

    #[test]
    fn cert_uses_dns_validation_against_the_zone_parameter() {
        let v = demo_template();
        let props = &v["Resources"][LOGICAL_CERT_NAME]["Properties"];
        assert_eq!(props["ValidationMethod"], "DNS");
        assert_eq!(
            props["DomainValidationOptions"][0]["HostedZoneId"],
            serde_json::json!({"Ref": HOSTED_ZONE_ID_PARAM})
        );
        assert_eq!(props["DomainValidationOptions"][0]["DomainName"], "demo.example.com");
    }

    #[test]
    fn cert_arn_is_exported_for_the_site_stack() {
        let v = demo_template();
        assert_eq!(
            v["Outputs"][OUT_CERTIFICATE_ARN]["Value"],
            serde_json::json!({"Ref": LOGICAL_CERT_NAME})
        );
    }
}
