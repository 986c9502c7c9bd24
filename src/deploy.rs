use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use aws_sdk_cloudformation::types::{OnFailure, Parameter, Stack, StackStatus};
use tracing::{debug, info};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Loads ambient credentials and pins the client region. Region handling is
/// the only local configuration; everything else is pass-through.
pub async fn sdk_config(region: &str) -> aws_config::SdkConfig {
    let region = aws_sdk_cloudformation::config::Region::new(region.to_string());
    aws_config::from_env().region(region).load().await
}

/// Resolves the pre-existing hosted zone for the base domain. The zone is
/// looked up, never created: a missing zone aborts the deployment.
pub async fn lookup_hosted_zone(conf: &aws_config::SdkConfig, domain: &str) -> Result<String> {
    let client = aws_sdk_route53::Client::new(conf);
    let resp = client
        .list_hosted_zones_by_name()
        .dns_name(domain)
        .send()
        .await
        .map_err(Error::aws)?;
    let mut zones = vec![];
    for zone in resp.hosted_zones().unwrap_or_default() {
        match (zone.name(), zone.id()) {
            (Some(name), Some(id)) => zones.push((name.to_string(), id.to_string())),
            _ => {}
        }
    }
    match match_zone(&zones, domain) {
        Some(id) => {
            info!(domain, zone_id = %id, "resolved hosted zone");
            Ok(id)
        }
        None => Err(Error::ZoneNotFound(domain.to_string())),
    }
}

/// Picks the zone whose name matches the domain exactly (zone names come
/// back dot-terminated) and strips the `/hostedzone/` id prefix.
fn match_zone(zones: &[(String, String)], domain: &str) -> Option<String> {
    let want = format!("{domain}.");
    for (name, id) in zones {
        if name == &want || name == domain {
            let id = id.strip_prefix("/hostedzone/").unwrap_or(id);
            return Some(id.to_string());
        }
    }
    None
}

enum Disposition {
    Settled,
    InProgress,
    Failed,
}

fn disposition(status: &StackStatus) -> Disposition {
    match status {
        StackStatus::CreateComplete
        | StackStatus::UpdateComplete
        | StackStatus::UpdateRollbackComplete
        | StackStatus::DeleteComplete
        | StackStatus::ImportComplete
        | StackStatus::ImportRollbackComplete => Disposition::Settled,

        StackStatus::CreateInProgress
        | StackStatus::DeleteInProgress
        | StackStatus::ImportInProgress
        | StackStatus::ImportRollbackInProgress
        | StackStatus::ReviewInProgress
        | StackStatus::RollbackInProgress
        | StackStatus::UpdateCompleteCleanupInProgress
        | StackStatus::UpdateInProgress
        | StackStatus::UpdateRollbackCompleteCleanupInProgress
        | StackStatus::UpdateRollbackInProgress => Disposition::InProgress,

        // CreateFailed, RollbackComplete, DeleteFailed, the rollback-failed
        // family, and anything the SDK grows later
        _ => Disposition::Failed,
    }
}

pub struct StackDriver {
    client: aws_sdk_cloudformation::Client,
}

impl StackDriver {
    pub fn new(conf: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudformation::Client::new(conf),
        }
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        match self.client.describe_stacks().stack_name(name).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let e_str = format!("{:#?}", e);
                // the service reports a missing stack as a ValidationError,
                // not a typed variant
                if e_str.contains("does not exist") {
                    return Ok(false);
                }
                Err(Error::Aws(e_str))
            }
        }
    }

    /// One describe round: `Some(stack)` once the stack settled, `None`
    /// while the provider is still working, an error if it settled in a
    /// failure state (with the provider's reason).
    async fn describe_settled(&self, name: &str) -> Result<Option<Stack>> {
        let resp = self
            .client
            .describe_stacks()
            .stack_name(name)
            .send()
            .await
            .map_err(Error::aws)?;
        let stack = resp
            .stacks()
            .unwrap_or_default()
            .first()
            .cloned()
            .ok_or_else(|| Error::Aws(format!("stack {name} not found")))?;
        let status = match stack.stack_status() {
            Some(s) => s.clone(),
            None => return Err(Error::Aws(format!("stack {name} has no status"))),
        };
        match disposition(&status) {
            Disposition::Settled => Ok(Some(stack)),
            Disposition::InProgress => Ok(None),
            Disposition::Failed => Err(Error::StackFailed {
                name: name.to_string(),
                reason: stack
                    .stack_status_reason()
                    .unwrap_or_else(|| status.as_str())
                    .to_string(),
            }),
        }
    }

    /// Creates the stack, or updates it in place if it already exists.
    /// Failed creations delete themselves so a rerun starts clean.
    pub async fn create_or_update(
        &self,
        name: &str,
        template_body: &str,
        parameters: &[(&str, &str)],
    ) -> Result<()> {
        let params: Vec<Parameter> = parameters
            .iter()
            .map(|(k, v)| {
                Parameter::builder()
                    .parameter_key(*k)
                    .parameter_value(*v)
                    .build()
            })
            .collect();
        if self.exists(name).await? {
            print!("Updating {name} ...");
            let _ = std::io::stdout().flush();
            match self
                .client
                .update_stack()
                .stack_name(name)
                .template_body(template_body)
                .set_parameters(Some(params))
                .send()
                .await
            {
                Ok(_) => {}
                Err(e) => {
                    let e_str = format!("{:#?}", e);
                    if e_str.contains("No updates are to be performed") {
                        debug!(stack = name, "already up to date");
                        println!(" no changes");
                        return Ok(());
                    }
                    return Err(Error::Aws(e_str));
                }
            }
        } else {
            print!("Creating {name} ...");
            let _ = std::io::stdout().flush();
            self.client
                .create_stack()
                .on_failure(OnFailure::Delete)
                .stack_name(name)
                .template_body(template_body)
                .set_parameters(Some(params))
                .send()
                .await
                .map_err(Error::aws)?;
        }
        Ok(())
    }

    /// Polls until the stack settles and returns its outputs as a map.
    pub async fn wait_for_outputs(&self, name: &str) -> Result<HashMap<String, String>> {
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            match self.describe_settled(name).await? {
                Some(stack) => {
                    println!();
                    let mut out = HashMap::new();
                    for output in stack.outputs().unwrap_or_default() {
                        match (output.output_key(), output.output_value()) {
                            (Some(key), Some(val)) => {
                                out.insert(key.to_string(), val.to_string());
                            }
                            _ => {}
                        }
                    }
                    return Ok(out);
                }
                None => {
                    print!(".");
                    let _ = std::io::stdout().flush();
                }
            }
        }
    }

    /// Deletes the stack and waits until the provider reports it gone.
    /// A stack that never existed is a no-op.
    pub async fn delete(&self, name: &str) -> Result<()> {
        if !self.exists(name).await? {
            info!(stack = name, "nothing to delete");
            return Ok(());
        }
        print!("Deleting {name} ...");
        let _ = std::io::stdout().flush();
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(Error::aws)?;
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            if !self.exists(name).await? {
                break;
            }
            match self.describe_settled(name).await {
                // DeleteComplete, or already gone between the probes
                Ok(Some(_)) => break,
                Ok(None) => {
                    print!(".");
                    let _ = std::io::stdout().flush();
                }
                Err(Error::Aws(e)) if e.contains("does not exist") => break,
                Err(e) => return Err(e),
            }
        }
        println!();
        Ok(())
    }
}

/// Reads one expected output out of a settled stack's output map.
pub fn required_output(outputs: &HashMap<String, String>, stack: &str, key: &str) -> Result<String> {
    outputs.get(key).cloned().ok_or_else(|| Error::MissingOutput {
        stack: stack.to_string(),
        key: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_match_requires_the_exact_domain() {
        let zones = vec![
            ("other-example.com.".to_string(), "/hostedzone/ZAAA".to_string()),
            ("example.com.".to_string(), "/hostedzone/ZBBB".to_string()),
        ];
        assert_eq!(match_zone(&zones, "example.com").as_deref(), Some("ZBBB"));
        assert_eq!(match_zone(&zones, "missing.com"), None);
    }

    #[test]
    fn zone_match_strips_the_id_prefix_only_when_present() {
        let zones = vec![("example.com.".to_string(), "ZCCC".to_string())];
        assert_eq!(match_zone(&zones, "example.com").as_deref(), Some("ZCCC"));
    }

    #[test]
    fn rollback_complete_counts_as_failed() {
        assert!(matches!(
            disposition(&StackStatus::RollbackComplete),
            Disposition::Failed
        ));
        assert!(matches!(
            disposition(&StackStatus::CreateComplete),
            Disposition::Settled
        ));
        assert!(matches!(
            disposition(&StackStatus::UpdateInProgress),
            Disposition::InProgress
        ));
    }

    #[test]
    fn required_output_reports_the_missing_key() {
        let mut outputs = HashMap::new();
        outputs.insert("BucketName".to_string(), "b".to_string());
        assert_eq!(required_output(&outputs, "s", "BucketName").unwrap(), "b");
        let err = required_output(&outputs, "demo-site", "DistributionId").unwrap_err();
        assert!(err.to_string().contains("DistributionId"));
        assert!(err.to_string().contains("demo-site"));
    }
}
