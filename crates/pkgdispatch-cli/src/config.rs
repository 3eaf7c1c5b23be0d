use anyhow::Context;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_sqs::config::Credentials;
use clap::{Parser, ValueEnum};
use pkgdispatch::{BatchPolicy, DispatchQueue, OverlapPolicy};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

#[derive(Debug, Parser)]
#[command(name = "pkgdispatch")]
#[command(about = "republishes every package row to an AWS SQS queue once a day", long_about = None)]
pub struct Cli {
    /// Connection string of the packages database
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// URL of the SQS queue receiving the packages
    #[arg(long, env = "PACKAGEBUG_SQS_ENDPOINT")]
    pub queue_url: String,

    #[arg(long, env = "PACKAGEBUG_SQS_REGION")]
    pub region: String,

    /// Override the SQS service endpoint, e.g. http://localhost:4566 for LocalStack
    #[arg(long, env = "PACKAGEBUG_SQS_ENDPOINT_OVERRIDE")]
    pub endpoint: Option<String>,

    /// Use static LocalStack credentials instead of the default provider chain
    #[arg(long, action)]
    pub local: bool,

    #[arg(long, value_enum, env = "PACKAGEBUG_BATCH_POLICY", default_value_t = BatchPolicyArg::Parity)]
    pub batch_policy: BatchPolicyArg,

    /// Behaviour when a cycle is still running at the next tick
    #[arg(long, value_enum, env = "PACKAGEBUG_OVERLAP", default_value_t = OverlapArg::Allow)]
    pub overlap: OverlapArg,

    /// Run a single dispatch cycle now, print its outcome as JSON and exit
    #[arg(long, action)]
    pub once: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BatchPolicyArg {
    /// Seal only full batches under the byte limit and drop the trailing batch
    Parity,
    /// Seal on either limit, skip records that can never fit, send the trailing batch
    Strict,
}

impl From<BatchPolicyArg> for BatchPolicy {
    fn from(value: BatchPolicyArg) -> Self {
        match value {
            BatchPolicyArg::Parity => BatchPolicy::parity(),
            BatchPolicyArg::Strict => BatchPolicy::strict(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverlapArg {
    Allow,
    Skip,
}

impl From<OverlapArg> for OverlapPolicy {
    fn from(value: OverlapArg) -> Self {
        match value {
            OverlapArg::Allow => OverlapPolicy::Allow,
            OverlapArg::Skip => OverlapPolicy::SkipIfRunning,
        }
    }
}

impl Cli {
    /// Opens the pool; fails if the database cannot be reached.
    pub async fn connect_database(&self) -> anyhow::Result<AnyPool> {
        sqlx::any::install_default_drivers();

        AnyPoolOptions::new()
            .max_connections(5)
            .connect(&self.database_url)
            .await
            .context("failed to connect to the database")
    }

    /// Loads the AWS configuration and makes sure credentials can be resolved.
    pub async fn connect_queue(&self) -> anyhow::Result<DispatchQueue> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()));

        if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if self.local {
            loader = loader.credentials_provider(Credentials::new(
                "test", "test", None, None, "static",
            ));
        }

        let config = loader.load().await;

        config
            .credentials_provider()
            .context("no AWS credentials provider configured")?
            .provide_credentials()
            .await
            .context("failed to resolve AWS credentials")?;

        Ok(DispatchQueue::from_config(config, self.queue_url.clone()))
    }
}
