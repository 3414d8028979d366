use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use fleetplane::authz::AllowAll;
use fleetplane::config::{FleetConfig, ProvisionerBackend, StoreBackend};
use fleetplane::connectivity::KubeconfigValidator;
use fleetplane::manager::FleetManager;
use fleetplane::provisioner::{KamajiProvisioner, NoopProvisioner, TenantProvisioner};
use fleetplane::store::{
    CredentialStore, MemoryCredentialStore, ResourceCredentialStore, SecretCredentialStore,
};
use fleetplane::Error;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the REST API
    Run(RunArgs),
    /// Show version and build information
    Version,
    /// List registered management clusters
    Info(InfoArgs),
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings shared by every command that touches the fleet
#[derive(Parser, Debug)]
struct FleetArgs {
    /// TOML configuration file; flags and environment override it
    #[arg(long, env = "FLEETPLANE_CONFIG")]
    config: Option<PathBuf>,

    /// Namespace holding management-cluster registrations
    #[arg(long, env = "FLEETPLANE_REGISTRATION_NAMESPACE")]
    registration_namespace: Option<String>,

    /// Namespace of tenant control planes inside management clusters
    #[arg(long, env = "FLEETPLANE_TENANT_NAMESPACE")]
    tenant_namespace: Option<String>,

    /// Bound on every call to a management cluster, in seconds
    #[arg(long, env = "FLEETPLANE_BACKEND_TIMEOUT_SECS")]
    backend_timeout_secs: Option<u64>,

    /// Lowest accepted tenant control-plane version
    #[arg(long, env = "FLEETPLANE_MIN_CONTROL_PLANE_VERSION")]
    min_control_plane_version: Option<String>,

    #[arg(long, env = "FLEETPLANE_STORE", value_enum)]
    store: Option<StoreBackend>,

    #[arg(long, env = "FLEETPLANE_PROVISIONER", value_enum)]
    provisioner: Option<ProvisionerBackend>,

    #[arg(long, env = "FLEETPLANE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    fleet: FleetArgs,

    /// Address the REST API listens on
    #[arg(long, env = "FLEETPLANE_LISTEN_ADDR")]
    listen_addr: Option<SocketAddr>,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    #[command(flatten)]
    fleet: FleetArgs,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("fleetplane v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Info(info_args) => run_info(info_args).await,
        Commands::Run(run_args) => run_service(run_args).await,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// File configuration with flag and environment overrides applied
fn load_config(args: &FleetArgs) -> Result<FleetConfig, Error> {
    let mut config = match &args.config {
        Some(path) => FleetConfig::from_file(path)?,
        None => FleetConfig::default(),
    };

    if let Some(ns) = &args.registration_namespace {
        config.registration_namespace = ns.clone();
    }
    if let Some(ns) = &args.tenant_namespace {
        config.tenant_namespace = ns.clone();
    }
    if let Some(secs) = args.backend_timeout_secs {
        config.backend_timeout_secs = secs;
    }
    if let Some(version) = &args.min_control_plane_version {
        config.min_control_plane_version = version.clone();
    }
    if let Some(store) = args.store {
        config.store = store;
    }
    if let Some(provisioner) = args.provisioner {
        config.provisioner = provisioner;
    }

    config.validate()?;
    Ok(config)
}

async fn build_store(config: &FleetConfig) -> Result<Arc<dyn CredentialStore>, Error> {
    if config.store == StoreBackend::Memory {
        warn!("Using the in-memory store: registrations are lost on restart");
        return Ok(Arc::new(MemoryCredentialStore::new()));
    }

    let client = kube::Client::try_default()
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to create Kubernetes client: {}", e)))?;
    info!("Connected to Kubernetes cluster");

    let namespace = &config.registration_namespace;
    let timeout = config.backend_timeout();
    let store: Arc<dyn CredentialStore> = match config.store {
        StoreBackend::Resource => {
            Arc::new(ResourceCredentialStore::new(client, namespace, timeout))
        }
        _ => Arc::new(SecretCredentialStore::new(client, namespace, timeout)),
    };
    Ok(store)
}

fn build_manager(
    config: &FleetConfig,
    store: Arc<dyn CredentialStore>,
) -> Result<FleetManager, Error> {
    let min_version = config.min_version()?;
    let provisioner: Arc<dyn TenantProvisioner> = match config.provisioner {
        ProvisionerBackend::Kamaji => Arc::new(KamajiProvisioner::new(
            &config.tenant_namespace,
            min_version,
        )),
        ProvisionerBackend::Noop => Arc::new(NoopProvisioner::new(min_version)),
    };
    let validator = Arc::new(KubeconfigValidator::new(
        &config.tenant_namespace,
        config.backend_timeout(),
    ));

    Ok(FleetManager::new(
        store,
        validator,
        Arc::new(AllowAll),
        provisioner,
    ))
}

async fn run_info(args: InfoArgs) -> Result<(), Error> {
    init_tracing(args.fleet.log_format);
    let config = load_config(&args.fleet)?;
    let store = build_store(&config).await?;

    let mut registrations = store.list().await?;
    registrations.sort_by(|a, b| a.region.cmp(&b.region));

    println!("Registered management clusters: {}", registrations.len());
    for r in registrations {
        println!("  {:<20} {:<12} {}", r.region, r.id, r.name);
    }
    Ok(())
}

async fn run_service(args: RunArgs) -> Result<(), Error> {
    init_tracing(args.fleet.log_format);
    let mut config = load_config(&args.fleet)?;
    if let Some(addr) = args.listen_addr {
        config.listen_addr = addr;
    }

    info!("Starting fleetplane v{}", env!("CARGO_PKG_VERSION"));
    info!(
        store = ?config.store,
        provisioner = ?config.provisioner,
        tenant_namespace = %config.tenant_namespace,
        "Configuration loaded"
    );

    let store = build_store(&config).await?;
    let manager = Arc::new(build_manager(&config, store)?);

    serve(manager, config.listen_addr).await
}

#[cfg(feature = "rest-api")]
async fn serve(manager: Arc<FleetManager>, addr: SocketAddr) -> Result<(), Error> {
    fleetplane::rest_api::run_server(manager, addr).await
}

#[cfg(not(feature = "rest-api"))]
async fn serve(_manager: Arc<FleetManager>, _addr: SocketAddr) -> Result<(), Error> {
    Err(Error::ConfigError(
        "fleetplane was built without the rest-api feature".to_string(),
    ))
}
