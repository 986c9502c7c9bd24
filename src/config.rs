use crate::error::{Error, Result};
use crate::template::validate_stack_name;

/// The certificate bound to a CloudFront distribution must live in us-east-1
/// regardless of where the rest of the stack deploys.
pub const CERT_REGION: &str = "us-east-1";

/// Parameters for one site: the pre-existing hosted zone's domain, the
/// subdomain to serve under, and where the site stack deploys.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub domain: String,
    pub subdomain: String,
    pub region: String,
    pub stack_prefix: String,
}

impl SiteConfig {
    pub fn new(domain: &str, subdomain: &str, region: &str, stack_prefix: Option<&str>) -> Result<Self> {
        validate_domain_part(domain)?;
        validate_domain_part(subdomain)?;
        let prefix = match stack_prefix {
            Some(p) => p.to_string(),
            // demo.example.com -> demo-example-com
            None => format!("{subdomain}.{domain}").replace('.', "-"),
        };
        let stack_prefix = validate_stack_name(&prefix)?;
        Ok(Self {
            domain: domain.to_string(),
            subdomain: subdomain.to_string(),
            region: region.to_string(),
            stack_prefix,
        })
    }

    /// The fully-qualified domain the site is served on.
    pub fn full_domain(&self) -> String {
        format!("{}.{}", self.subdomain, self.domain)
    }

    pub fn website_url(&self) -> String {
        format!("https://{}", self.full_domain())
    }

    pub fn cert_stack_name(&self) -> String {
        format!("{}-cert", self.stack_prefix)
    }

    pub fn site_stack_name(&self) -> String {
        format!("{}-site", self.stack_prefix)
    }
}

fn validate_domain_part(part: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidDomain {
        domain: part.to_string(),
        reason: reason.to_string(),
    };
    if part.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if part.contains('*') {
        // a wildcard cert is of no use here: the alias record needs a
        // concrete name
        return Err(invalid("wildcards are not supported"));
    }
    if part.starts_with('.') || part.ends_with('.') {
        return Err(invalid("must not start or end with a dot"));
    }
    if part.contains("..") || part.chars().any(|c| c.is_whitespace()) {
        return Err(invalid("must be a valid dns name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> SiteConfig {
        SiteConfig::new("example.com", "demo", "eu-west-1", None).unwrap()
    }

    #[test]
    fn full_domain_joins_subdomain_and_domain() {
        assert_eq!(demo().full_domain(), "demo.example.com");
        assert_eq!(demo().website_url(), "https://demo.example.com");
    }

    #[test]
    fn stack_names_derive_from_full_domain() {
        assert_eq!(demo().cert_stack_name(), "demo-example-com-cert");
        assert_eq!(demo().site_stack_name(), "demo-example-com-site");
    }

    #[test]
    fn explicit_prefix_wins() {
        let cfg = SiteConfig::new("example.com", "demo", "eu-west-1", Some("frontend")).unwrap();
        assert_eq!(cfg.cert_stack_name(), "frontend-cert");
    }

    #[test]
    fn rejects_wildcards_and_trailing_dots() {
        assert!(SiteConfig::new("*.example.com", "demo", "eu-west-1", None).is_err());
        assert!(SiteConfig::new("example.com.", "demo", "eu-west-1", None).is_err());
        assert!(SiteConfig::new("example.com", "", "eu-west-1", None).is_err());
    }

    #[test]
    fn nested_subdomains_are_allowed() {
        let cfg = SiteConfig::new("example.com", "multiple.sub.domains", "eu-west-1", None).unwrap();
        assert_eq!(cfg.full_domain(), "multiple.sub.domains.example.com");
    }
}
