use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dockhand::auth::{CredentialHasher, generate_password};
use dockhand::config::ServerConfig;
use dockhand::exposure::{
    ChallengeDir, CommandDispatcher, CommandProvisioner, ExposureManager, HttpChallengeProbe,
    ProcessTransport, ProxyWriter,
};
use dockhand::rbac::Evaluator;
use dockhand::registry::{RegistrySigner, TokenIssuer};
use dockhand::server::{AppState, create_router};
use dockhand::store::{SqliteStore, Store};
use dockhand::types::{Id, Organization, Resource, ResourceType, User};

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(about = "Deployment platform control plane", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Path to the TOML configuration file
        #[arg(long, short, default_value = "./dockhand.toml")]
        config: String,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, site-admin organization and user)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Name of the site-admin organization
        #[arg(long, default_value = "site_admins")]
        site_admin_org: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

fn run_init(data_dir: String, site_admin_org: String, non_interactive: bool) -> anyhow::Result<()> {
    let data_path: PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let db_path = data_path.join("dockhand.db");
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    if store.get_organization_by_name(&site_admin_org)?.is_some() {
        bail!("Server already initialized: organization '{site_admin_org}' exists");
    }

    let username = if non_interactive {
        "admin".to_string()
    } else {
        inquire::Text::new("Site admin username:")
            .with_default("admin")
            .with_validator(|input: &str| {
                if input.trim().is_empty() {
                    Err("Username cannot be empty".into())
                } else if input.contains(char::is_whitespace) {
                    Err("Username cannot contain whitespace".into())
                } else {
                    Ok(inquire::validator::Validation::Valid)
                }
            })
            .prompt()?
    };

    let now = Utc::now();
    let org = Organization {
        id: Id::generate(),
        name: site_admin_org.clone(),
        created_at: now,
    };
    store.create_organization(&org)?;
    store.create_resource(&Resource {
        id: Id::generate(),
        name: site_admin_org.clone(),
        resource_type: ResourceType::Organization,
        created_at: now,
    })?;

    let password = generate_password();
    let user = User {
        id: Id::generate(),
        username: username.clone(),
        password_hash: CredentialHasher::new().hash(&password)?,
        created_at: now,
    };
    store.create_user(&user)?;
    store.add_organization_member(&user.id, &org.id)?;

    let credentials_file = data_path.join(".admin_credentials");
    fs::write(
        &credentials_file,
        format!("principal_id={}\nusername={username}\npassword={password}\n", user.id),
    )?;

    #[cfg(unix)]
    set_restrictive_permissions(&credentials_file);

    println!();
    println!("========================================");
    println!("Site admin '{username}' created (save this, it won't be shown again):");
    println!();
    println!("  principal id: {}", user.id);
    println!("  password:     {password}");
    println!();
    println!("Credentials also written to: {}", credentials_file.display());
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(config_path: String) -> anyhow::Result<()> {
    let config = ServerConfig::load(std::path::Path::new(&config_path))?;

    let store = Arc::new(SqliteStore::new(config.db_path())?);
    store.initialize()?;

    let site_admin = match store.get_organization_by_name(&config.site_admin_org)? {
        Some(org) => org,
        None => bail!(
            "Server not initialized. Run 'dockhand admin init' first to create the site-admin organization."
        ),
    };

    let private_key = fs::read(&config.registry.private_key_path)?;
    let public_key_der = fs::read(&config.registry.public_key_der_path)?;
    let signer = RegistrySigner::new(
        &private_key,
        &public_key_der,
        config.registry.issuer.clone(),
        config.registry.service.clone(),
    )?;
    info!("Registry signing key loaded, kid {}", signer.kid());

    let evaluator = Arc::new(Evaluator::new(store.clone(), site_admin.id));

    let transport = Arc::new(ProcessTransport::new(
        config.exposure.proxy_reload_command.clone(),
        config.exposure.deploy_command.clone(),
    ));
    let dispatcher = Arc::new(CommandDispatcher::new(transport));
    let exposure = Arc::new(ExposureManager::new(
        store.clone(),
        ChallengeDir::new(&config.exposure.webroot),
        Arc::new(HttpChallengeProbe::new(Duration::from_secs(
            config.exposure.verify_timeout_secs,
        ))?),
        Arc::new(CommandProvisioner::new(
            config.exposure.cert_issue_command.clone(),
            config.exposure.cert_revoke_command.clone(),
        )),
        ProxyWriter::new(&config.exposure.proxy_conf_dir),
        dispatcher.clone(),
    ));
    let issuer = Arc::new(TokenIssuer::new(store.clone(), evaluator.clone(), signer));

    let state = Arc::new(AppState {
        store,
        evaluator,
        exposure: exposure.clone(),
        issuer,
        dispatcher,
        site_admin_resource: config.site_admin_org.clone(),
    });

    // Domains can be left Verified-but-not-Published by a crash mid-sequence;
    // retry on startup and on an interval.
    let reconcile_interval = Duration::from_secs(config.exposure.reconcile_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(reconcile_interval);
        loop {
            interval.tick().await;
            match exposure.reconcile_unpublished().await {
                Ok(0) => {}
                Ok(n) => info!("Reconciled {n} unpublished domain(s)"),
                Err(e) => tracing::warn!("Reconcile pass failed: {e}"),
            }
        }
    });

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dockhand=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                site_admin_org,
                non_interactive,
            } => {
                run_init(data_dir, site_admin_org, non_interactive)?;
            }
        },
        Commands::Serve { config } => {
            run_serve(config).await?;
        }
    }

    Ok(())
}
