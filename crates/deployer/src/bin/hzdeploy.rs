//! hzdeploy CLI - Hazelcast cluster provisioning on EC2.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hzdeploy::{Arch, DeployConfig, DeployError, Orchestrator};
use hzdeploy_cloud::aws::{Aws, Credentials};

/// hzdeploy - provision, configure and tear down a Hazelcast cluster.
#[derive(Parser)]
#[command(name = "hzdeploy")]
#[command(about = "Provision a Hazelcast cluster on EC2", version)]
struct Cli {
    /// Deploy configuration file (YAML).
    #[arg(long, env = "HZDEPLOY_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    credentials: CredentialArgs,

    /// AWS region (overrides the config file).
    #[arg(long)]
    region: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where AWS credentials come from.
#[derive(Args)]
struct CredentialArgs {
    /// AWS access key id (or set `AWS_ACCESS_KEY_ID` env var).
    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    access_key_id: Option<String>,

    /// AWS secret access key (or set `AWS_SECRET_ACCESS_KEY` env var).
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_access_key: Option<String>,

    /// AWS session token (or set `AWS_SESSION_TOKEN` env var).
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    session_token: Option<String>,

    /// Properties file with `accessKey` and `secretKey` entries. Takes
    /// precedence over the key flags.
    #[arg(long)]
    credentials_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish the package, launch the master, publish its config, launch workers.
    Deploy {
        /// Total number of instances (1 master + N-1 workers).
        #[arg(long, short = 'n')]
        count: Option<u32>,

        /// Instance type (e.g., m1.small).
        #[arg(long)]
        instance_type: Option<String>,

        /// Image architecture (i386 or x86_64).
        #[arg(long)]
        arch: Option<Arch>,

        /// Explicit image id (overrides --arch).
        #[arg(long)]
        image: Option<String>,

        /// Do not upload the package; assume it is already published.
        #[arg(long, default_value = "false")]
        skip_package: bool,
    },

    /// Terminate every running instance.
    Terminate,

    /// Reboot every running instance.
    Reboot,

    /// List running instances.
    List {
        /// Print as JSON.
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Print the membership config for a master address (no AWS calls).
    RenderConfig {
        /// Master private address.
        #[arg(long)]
        master: String,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: Option<&Path>, region: Option<String>) -> Result<DeployConfig> {
    let mut config = match path {
        Some(path) => DeployConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DeployConfig::default(),
    };
    if let Some(region) = region {
        config.region = region;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn load_credentials(args: &CredentialArgs) -> Result<Credentials> {
    if let Some(path) = &args.credentials_file {
        return Credentials::from_properties_file(path)
            .await
            .with_context(|| format!("Failed to read credentials from {}", path.display()));
    }

    let (Some(access_key_id), Some(secret_access_key)) =
        (&args.access_key_id, &args.secret_access_key)
    else {
        bail!(
            "AWS credentials required: set --access-key-id/--secret-access-key \
             (or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY) or --credentials-file"
        );
    };

    let mut credentials = Credentials::new(access_key_id, secret_access_key);
    if let Some(token) = &args.session_token {
        credentials = credentials.with_session_token(token);
    }
    Ok(credentials)
}

async fn connect(args: &CredentialArgs, config: DeployConfig) -> Result<Orchestrator> {
    let credentials = load_credentials(args).await?;
    let mut aws = Aws::new(credentials, &config.region).context("Failed to create AWS client")?;
    if let Some(endpoint) = &config.endpoints.ec2 {
        aws = aws.with_ec2_endpoint(endpoint);
    }
    if let Some(endpoint) = &config.endpoints.s3 {
        aws = aws.with_s3_endpoint(endpoint);
    }
    info!(region = %aws.region(), "AWS client ready");

    let aws = Arc::new(aws);
    Ok(Orchestrator::new(config, aws.clone(), aws))
}

/// Print the error chain and any provider diagnostics once.
fn report(err: &anyhow::Error) {
    eprintln!("\n❌ {err}");
    for cause in err.chain().skip(1) {
        eprintln!("   caused by: {cause}");
    }

    if let Some(deploy) = err.chain().find_map(|e| e.downcast_ref::<DeployError>()) {
        if let Some(status) = deploy.status_code() {
            eprintln!("   status code: {status}");
        }
        if let Some(code) = deploy.error_code() {
            eprintln!("   error code:  {code}");
        }
        if let Some(request_id) = deploy.request_id() {
            eprintln!("   request id:  {request_id}");
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    if let Err(err) = run(cli).await {
        report(&err);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), cli.region)?;

    match cli.command {
        Commands::RenderConfig { master } => {
            print!("{}", config.membership.render(&master));
        }

        Commands::Deploy {
            count,
            instance_type,
            arch,
            image,
            skip_package,
        } => {
            let mut orchestrator = connect(&cli.credentials, config).await?;
            let config = orchestrator.config();
            let count = count.unwrap_or(config.instance_count);
            let instance_type = instance_type.unwrap_or_else(|| config.instance_type.clone());
            let image =
                image.unwrap_or_else(|| config.image_for(arch.unwrap_or(config.arch)).to_string());

            println!("\n🚀 Deploying {count} node cluster ({instance_type}, {image})");

            if !skip_package {
                orchestrator
                    .restore_package()
                    .await
                    .context("Failed to publish package")?;
            }
            let deployment = orchestrator
                .launch_and_store_config(count, &instance_type, &image)
                .await
                .context("Failed to launch cluster")?;

            println!("\n✅ Cluster launched!");
            println!("  Master:  {}", deployment.master.id);
            println!(
                "  Address: {}",
                deployment.master.private_address().unwrap_or_default()
            );
            if !deployment.worker_ids.is_empty() {
                println!("  Workers: {}", deployment.worker_ids.join(", "));
            }
        }

        Commands::Terminate => {
            let mut orchestrator = connect(&cli.credentials, config).await?;
            let ids = orchestrator
                .terminate()
                .await
                .context("Failed to terminate instances")?;
            if ids.is_empty() {
                println!("\nNo running instances");
            } else {
                println!("\n✅ Terminated: {}", ids.join(", "));
            }
        }

        Commands::Reboot => {
            let mut orchestrator = connect(&cli.credentials, config).await?;
            let ids = orchestrator
                .reboot()
                .await
                .context("Failed to reboot instances")?;
            if ids.is_empty() {
                println!("\nNo running instances");
            } else {
                println!("\n✅ Rebooted: {}", ids.join(", "));
            }
        }

        Commands::List { json } => {
            let orchestrator = connect(&cli.credentials, config).await?;
            let instances = orchestrator
                .running_instances()
                .await
                .context("Failed to list instances")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&instances)?);
            } else {
                println!(
                    "\n{:<20} {:<12} {:<10} {:<40}",
                    "ID", "TYPE", "STATE", "PRIVATE ADDRESS"
                );
                println!("{}", "-".repeat(84));
                for instance in instances {
                    println!(
                        "{:<20} {:<12} {:<10} {:<40}",
                        instance.id,
                        instance.instance_type,
                        instance.state.as_str(),
                        instance.private_address().unwrap_or_default()
                    );
                }
            }
        }
    }

    Ok(())
}
