//! Cloudroast - functional regression harness CLI
//!
//! Operational helpers around the library: authenticate, wait for an
//! instance, upload a large object, sign a TempURL, predict a listing and
//! check a configuration file.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use cloudroast::auth::keystone::{authenticator_for, credentials_for};
use cloudroast::auth::AccessInfo;
use cloudroast::config::{Config, LoggingConfig};
use cloudroast::dbaas::{DbaasClient, InstancePoller, InstanceStatus};
use cloudroast::storage::listing::{expected_listing, ListingParams};
use cloudroast::storage::tempurl::{expires_in, Digest, TempUrlOptions, TempUrlSigner};
use cloudroast::storage::{
    LargeObject, ObjectHeaders, ObjectStorageClient, SegmentPlan, SegmentSource,
};
use cloudroast::telemetry::init_subscriber;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Cloudroast - regression harness for DBaaS and object storage APIs
#[derive(Parser, Debug)]
#[command(name = "cloudroast")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "CLOUDROAST_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error); overrides logging.level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Write Prometheus metrics to this file when the command finishes
    #[arg(long, global = true)]
    metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authenticate and show the tenant, roles and catalog
    Auth,

    /// Wait for a DBaaS instance to reach a status
    WaitInstance {
        /// Instance id
        id: String,

        /// Target status; DELETED waits until the instance is gone
        #[arg(long, default_value = "ACTIVE")]
        status: String,

        /// Override dbaas.poll.timeout_secs
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Override dbaas.poll.interval_secs
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Upload a generated segmented object
    UploadLarge {
        #[arg(long)]
        container: String,

        #[arg(long)]
        object: String,

        /// Total size in bytes
        #[arg(long)]
        size: u64,

        /// Segment size in bytes; defaults to object_storage.segment_size
        #[arg(long)]
        segment_size: Option<u64>,

        /// Use a static (SLO) manifest instead of a dynamic one
        #[arg(long = "static")]
        static_manifest: bool,

        /// Seed for the generated content
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Sign a TempURL (offline)
    TempUrl {
        /// Object path, e.g. /v1/AUTH_account/container/object
        #[arg(long)]
        path: String,

        #[arg(long, default_value = "GET")]
        method: String,

        /// Seconds until the URL expires
        #[arg(long, default_value_t = 3600)]
        expires_in: u64,

        /// TempURL key; defaults to object_storage.tempurl_key
        #[arg(long, env = "CLOUDROAST_TEMPURL_KEY")]
        key: Option<String>,

        /// sha1, sha256 or sha512; defaults to object_storage.tempurl_digest
        #[arg(long)]
        digest: Option<String>,

        /// Scheme and host to prefix, e.g. https://storage.example.com
        #[arg(long, default_value = "")]
        origin: String,

        /// Sign for every object under this prefix of the container
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Print the listing the object store should return (offline)
    ExpectListing {
        /// Object names, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        names: Vec<String>,

        #[arg(long)]
        prefix: Option<String>,

        #[arg(long)]
        delimiter: Option<String>,

        #[arg(long)]
        marker: Option<String>,

        #[arg(long)]
        end_marker: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        path: Option<String>,
    },

    /// Validate a configuration file and print it with secrets redacted
    ConfigCheck,
}

impl Command {
    fn needs_config(&self) -> bool {
        !matches!(self, Command::TempUrl { .. } | Command::ExpectListing { .. })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Some(
            Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        ),
        None if args.command.needs_config() => {
            bail!("this command needs --config (or CLOUDROAST_CONFIG)")
        }
        None => None,
    };

    let mut logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(LoggingConfig::default);
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }
    init_subscriber(&logging)?;

    info!("Starting Cloudroast v{}", cloudroast::VERSION);

    run(args.command, config.as_ref()).await?;

    let metrics_out = args.metrics_out.clone().or_else(|| {
        config
            .as_ref()
            .filter(|c| c.metrics.enabled)
            .and_then(|c| c.metrics.output.clone().map(PathBuf::from))
    });
    if let Some(path) = metrics_out {
        std::fs::write(&path, cloudroast::metrics::render())
            .with_context(|| format!("writing metrics to {}", path.display()))?;
        info!("Wrote metrics to {:?}", path);
    }

    Ok(())
}

async fn run(command: Command, config: Option<&Config>) -> anyhow::Result<()> {
    match command {
        Command::Auth => {
            let config = require(config)?;
            let access = authenticate(config).await?;
            println!("user:     {}", access.username);
            println!(
                "tenant:   {} ({})",
                access.tenant_name.as_deref().unwrap_or("-"),
                access.tenant_id.as_deref().unwrap_or("-")
            );
            println!("roles:    {}", access.roles.join(", "));
            if let Some(expires) = access.expires {
                println!("expires:  {}", expires.to_rfc3339());
            }
            println!("services: {}", access.catalog.service_types().join(", "));
        }

        Command::WaitInstance {
            id,
            status,
            timeout_secs,
            interval_secs,
        } => {
            let config = require(config)?;
            let access = authenticate(config).await?;
            let client =
                DbaasClient::from_access(&access, &config.dbaas, config.identity.region.as_deref())?;

            let mut poll = config.dbaas.poll.clone();
            if let Some(timeout) = timeout_secs {
                poll.timeout_secs = timeout;
            }
            if let Some(interval) = interval_secs {
                poll.interval_secs = interval;
            }
            let poller = InstancePoller::from_config(client, &poll);

            let target = InstanceStatus::parse(&status);
            let outcome = if target == InstanceStatus::Deleted {
                poller.wait_for_deletion(&id).await?
            } else {
                poller.wait_for_status(&id, &target).await?
            };

            let observed: Vec<String> = outcome.observed.iter().map(|s| s.to_string()).collect();
            println!(
                "{} reached {} after {:.1}s ({} checks): {}",
                id,
                target,
                outcome.elapsed.as_secs_f64(),
                outcome.attempts,
                observed.join(" -> ")
            );
        }

        Command::UploadLarge {
            container,
            object,
            size,
            segment_size,
            static_manifest,
            seed,
        } => {
            let config = require(config)?;
            let access = authenticate(config).await?;
            let client = ObjectStorageClient::from_access(
                &access,
                &config.object_storage,
                config.identity.region.as_deref(),
            )?;

            let segment_size = segment_size.unwrap_or(config.object_storage.segment_size as u64);
            let plan = SegmentPlan::new(size, segment_size)?;
            let large = LargeObject::generate(&container, &object, plan, SegmentSource::Random { seed })?;

            let created = client.create_container(&container, &ObjectHeaders::new()).await?;
            if !created.is_success() {
                bail!(
                    "creating container {} returned {}",
                    container,
                    created.status_code()
                );
            }

            let report = if static_manifest {
                large.upload_static(&client).await?
            } else {
                large.upload_dynamic(&client).await?
            };

            if let Some(failed) = &report.failed_segment {
                bail!(
                    "segment {} ({}) failed with {} after {} segments: {}",
                    failed.index,
                    failed.name,
                    failed.status,
                    report.segments_uploaded,
                    failed.body
                );
            }
            let status = report.manifest.as_ref().map(|m| m.status_code()).unwrap_or(0);
            if !report.is_complete() {
                bail!("manifest upload returned {}", status);
            }

            println!(
                "uploaded {}/{}: {} bytes in {} segments, etag {}",
                container,
                object,
                large.total_len(),
                report.segments_uploaded,
                large.etag()
            );
        }

        Command::TempUrl {
            path,
            method,
            expires_in: ttl,
            key,
            digest,
            origin,
            prefix,
        } => {
            let storage = config.map(|c| &c.object_storage);
            let key = key
                .or_else(|| storage.and_then(|s| s.tempurl_key.clone()))
                .context("no TempURL key: pass --key or set object_storage.tempurl_key")?;
            let digest: Digest = digest
                .or_else(|| storage.map(|s| s.tempurl_digest.clone()))
                .unwrap_or_else(|| "sha1".to_string())
                .parse()?;

            let signer = TempUrlSigner::new(key, digest);
            let options = TempUrlOptions {
                prefix,
                ..Default::default()
            };
            let url = signer.temp_url(
                &origin,
                &path,
                &method,
                expires_in(Duration::from_secs(ttl)),
                &options,
            )?;
            println!("{}", url);
        }

        Command::ExpectListing {
            names,
            prefix,
            delimiter,
            marker,
            end_marker,
            limit,
            path,
        } => {
            let params = ListingParams {
                prefix,
                delimiter,
                marker,
                end_marker,
                limit,
                path,
                ..Default::default()
            };
            for entry in expected_listing(&names, &params) {
                println!("{}", entry.name());
            }
        }

        Command::ConfigCheck => {
            let config = require(config)?;
            print!("{}", config.to_redacted_yaml()?);
        }
    }

    Ok(())
}

fn require(config: Option<&Config>) -> anyhow::Result<&Config> {
    config.context("this command needs --config (or CLOUDROAST_CONFIG)")
}

async fn authenticate(config: &Config) -> anyhow::Result<AccessInfo> {
    let authenticator = authenticator_for(&config.identity)?;
    let credentials = credentials_for(&config.identity)?;
    let access = authenticator
        .authenticate(&credentials)
        .await
        .context("authentication failed")?;
    Ok(access)
}
