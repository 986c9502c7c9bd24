use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use site_deploy::assets;
use site_deploy::config::CERT_REGION;
use site_deploy::deploy::{self, required_output, StackDriver};
use site_deploy::stacks::{
    self, CERT_ARN_PARAM, HOSTED_ZONE_ID_PARAM, OUT_BUCKET_NAME, OUT_CERTIFICATE_ARN,
    OUT_DISTRIBUTION_ID, OUT_WEBSITE_URL,
};
use site_deploy::SiteConfig;

#[derive(Parser)]
#[command(name = "site-deploy", version, about = "Deploys a CDN-backed static website behind an existing hosted zone")]
struct Cli {
    /// Base domain of the pre-existing hosted zone, e.g. example.com
    #[arg(long, env = "SITE_DOMAIN")]
    domain: String,

    /// Subdomain the site is served under, e.g. demo
    #[arg(long, env = "SITE_SUBDOMAIN")]
    subdomain: String,

    /// Region the site stack deploys to. The certificate stack always
    /// deploys to us-east-1.
    #[arg(long, env = "SITE_REGION", default_value = "eu-west-1")]
    region: String,

    /// Prefix for the stack names; derived from the full domain by default
    #[arg(long, env = "SITE_STACK_PREFIX")]
    stack_prefix: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the synthesized CloudFormation templates without deploying
    Synth,
    /// Deploy the certificate and site stacks, upload assets, invalidate
    /// the distribution cache, and print the deployment outputs
    Deploy {
        /// Local directory of site assets; the upload is skipped when omitted
        #[arg(long, env = "SITE_ASSETS")]
        assets: Option<PathBuf>,
    },
    /// Empty the origin bucket and delete both stacks
    Destroy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("site_deploy=info".parse()?))
        .init();

    let cli = Cli::parse();
    let cfg = SiteConfig::new(&cli.domain, &cli.subdomain, &cli.region, cli.stack_prefix.as_deref())?;

    match cli.command {
        Command::Synth => synth(&cfg)?,
        Command::Deploy { assets } => deploy_site(&cfg, assets.as_deref()).await?,
        Command::Destroy => destroy_site(&cfg).await?,
    }
    Ok(())
}

fn synth(cfg: &SiteConfig) -> site_deploy::Result<()> {
    println!("--- {} ({}) ---", cfg.cert_stack_name(), CERT_REGION);
    println!("{}", stacks::certificate::synth(cfg)?.to_json_pretty()?);
    println!("--- {} ({}) ---", cfg.site_stack_name(), cfg.region);
    println!("{}", stacks::site::synth(cfg)?.to_json_pretty()?);
    Ok(())
}

/// Certificate first, then the site stack that binds it, then assets, then
/// the invalidation. Each step settles before the next starts; the in-stack
/// ordering (bucket before distribution before record) is the provider's.
async fn deploy_site(cfg: &SiteConfig, assets_dir: Option<&Path>) -> site_deploy::Result<()> {
    let cert_conf = deploy::sdk_config(CERT_REGION).await;
    let zone_id = deploy::lookup_hosted_zone(&cert_conf, &cfg.domain).await?;

    let cert_stack = cfg.cert_stack_name();
    let cert_driver = StackDriver::new(&cert_conf);
    let cert_template = stacks::certificate::synth(cfg)?.to_json()?;
    cert_driver
        .create_or_update(&cert_stack, &cert_template, &[(HOSTED_ZONE_ID_PARAM, &zone_id)])
        .await?;
    let cert_outputs = cert_driver.wait_for_outputs(&cert_stack).await?;
    let cert_arn = required_output(&cert_outputs, &cert_stack, OUT_CERTIFICATE_ARN)?;

    let site_conf = deploy::sdk_config(&cfg.region).await;
    let site_stack = cfg.site_stack_name();
    let site_driver = StackDriver::new(&site_conf);
    let site_template = stacks::site::synth(cfg)?.to_json()?;
    site_driver
        .create_or_update(
            &site_stack,
            &site_template,
            &[(HOSTED_ZONE_ID_PARAM, &zone_id), (CERT_ARN_PARAM, &cert_arn)],
        )
        .await?;
    let outputs = site_driver.wait_for_outputs(&site_stack).await?;
    let url = required_output(&outputs, &site_stack, OUT_WEBSITE_URL)?;
    let distribution_id = required_output(&outputs, &site_stack, OUT_DISTRIBUTION_ID)?;
    let bucket = required_output(&outputs, &site_stack, OUT_BUCKET_NAME)?;

    if let Some(dir) = assets_dir {
        assets::upload_assets(&site_conf, &bucket, dir).await?;
        // the CloudFront control plane is global; reuse the us-east-1 config
        assets::invalidate_all(&cert_conf, &distribution_id).await?;
    }

    println!("{OUT_WEBSITE_URL}: {url}");
    println!("{OUT_DISTRIBUTION_ID}: {distribution_id}");
    println!("{OUT_BUCKET_NAME}: {bucket}");
    Ok(())
}

/// Teardown in reverse order. The bucket is emptied first: deleting a stack
/// with a non-empty bucket fails at the provider.
async fn destroy_site(cfg: &SiteConfig) -> site_deploy::Result<()> {
    let site_conf = deploy::sdk_config(&cfg.region).await;
    let site_stack = cfg.site_stack_name();
    let site_driver = StackDriver::new(&site_conf);
    if site_driver.exists(&site_stack).await? {
        match site_driver.wait_for_outputs(&site_stack).await {
            Ok(outputs) => {
                if let Ok(bucket) = required_output(&outputs, &site_stack, OUT_BUCKET_NAME) {
                    if let Err(e) = assets::empty_bucket(&site_conf, &bucket).await {
                        warn!(error = %e, "could not empty the bucket; stack deletion may fail");
                    }
                }
            }
            Err(e) => warn!(error = %e, "stack is not settled; deleting anyway"),
        }
        site_driver.delete(&site_stack).await?;
    }

    let cert_conf = deploy::sdk_config(CERT_REGION).await;
    let cert_driver = StackDriver::new(&cert_conf);
    cert_driver.delete(&cfg.cert_stack_name()).await?;
    Ok(())
}
