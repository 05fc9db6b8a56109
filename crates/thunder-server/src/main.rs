//! Thunder identity platform server binary.
//!
//! Initialisation order (§9): config -> crypto keys -> registries -> session
//! store -> HTTP mux. Exit code 1 if the listener cannot bind; exit code 0
//! on clean shutdown (§6 "CLI surface").

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::Level;

use thunder_crypto::SigningKey;
use thunder_executor::ExecutorRegistry;
use thunder_executors::{
    AuthAssertExecutor, CredentialsExecutor, FederatedExecutor, FederatedKind, HttpRequestExecutor,
    ProvisioningExecutor, RelyingPartyConfig, SmsOtpExecutor, UserTypeResolverExecutor, WebauthnExecutor,
};
use thunder_flow::{FlowEngine, InMemorySessionStore};
use thunder_server::collaborators::{
    AttributeMatchAuthnProvider, CollaboratorSeed, InMemoryApplications, InMemoryCredentialStore, InMemoryIdps,
    InMemoryOus, InMemoryUsers, LoggingNotificationSender,
};
use thunder_server::config::ThunderConfig;
use thunder_server::state::AppState;
use thunder_server::{auth_code_store::AuthCodeStore, build_router};
use thunder_token::{GlobalTokenConfig, TokenBuilder};

/// Thunder: flow-driven authentication/registration engine and OAuth2/OIDC
/// token service.
#[derive(Parser, Debug)]
#[command(name = "thunder-server", version, about)]
struct Cli {
    /// Runtime home directory: `thunder.toml`, `<security.crypto_file>`,
    /// `flows/*.json`, and `collaborators.json` are all resolved under it.
    #[arg(long = "thunderHome", env = "THUNDER_HOME", default_value = ".")]
    thunder_home: PathBuf,

    /// Overrides `log.level` from the command line.
    #[arg(long = "log-level")]
    log_level: Option<String>,
}

fn init_tracing(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();
}

fn log_level(cli: &Cli, configured: &str) -> Level {
    cli.log_level.as_deref().or(Some(configured)).and_then(|l| l.parse().ok()).unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ThunderConfig::load(&cli.thunder_home) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(log_level(&cli, &config.log.level));

    let signing_key_path = cli.thunder_home.join(&config.security.crypto_file);
    let signing_key = match SigningKey::load_from_pem_file(&signing_key_path, "thunder-signing-key") {
        Ok(k) => Arc::new(k),
        Err(e) => {
            tracing::error!(error = %e, path = %signing_key_path.display(), "failed to load signing key");
            std::process::exit(1);
        }
    };

    let public_key_path = signing_key_path.with_extension("pub.pem");
    let decoding_key =
        match thunder_crypto::load_public_decoding_key(&public_key_path, signing_key.algorithm) {
            Ok(k) => Arc::new(k),
            Err(e) => {
                tracing::error!(error = %e, path = %public_key_path.display(), "failed to load public verification key");
                std::process::exit(1);
            }
        };

    let public_key_pem = match std::fs::read_to_string(&public_key_path) {
        Ok(pem) => pem,
        Err(e) => {
            tracing::error!(error = %e, path = %public_key_path.display(), "failed to read public key pem");
            std::process::exit(1);
        }
    };
    let jwks_document =
        match thunder_crypto::public_jwk_from_pem(&public_key_pem, signing_key.algorithm, "thunder-signing-key") {
            Ok(jwk) => Arc::new(serde_json::json!({ "keys": [jwk] })),
            Err(e) => {
                tracing::error!(error = %e, "failed to build jwks document");
                std::process::exit(1);
            }
        };

    let seed = match CollaboratorSeed::load(&cli.thunder_home) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to load collaborator seed");
            std::process::exit(1);
        }
    };
    let users = Arc::new(InMemoryUsers::new(seed.users));
    let applications = Arc::new(InMemoryApplications::new(seed.applications));
    let idps = Arc::new(InMemoryIdps::new(seed.idps));
    let ous = Arc::new(InMemoryOus::new(seed.organization_units));
    let notification_sender = Arc::new(LoggingNotificationSender);
    let authn_provider = Arc::new(AttributeMatchAuthnProvider::new(users.clone()));

    let mut executors = ExecutorRegistry::new();
    executors.register(Arc::new(CredentialsExecutor::new(authn_provider.clone())));
    executors.register(Arc::new(ProvisioningExecutor::new(users.clone())));
    executors.register(Arc::new(SmsOtpExecutor::new(notification_sender.clone())));
    executors.register(Arc::new(UserTypeResolverExecutor));
    executors.register(Arc::new(HttpRequestExecutor::default()));
    executors.register(Arc::new(AuthAssertExecutor::new(signing_key.clone(), config.jwt.issuer.clone())));
    executors.register(Arc::new(FederatedExecutor::new(FederatedKind::Oidc, "FederatedGoogle", idps.clone())));
    executors.register(Arc::new(FederatedExecutor::new(FederatedKind::OAuth, "FederatedGitHub", idps.clone())));
    executors.register(Arc::new(WebauthnExecutor::new(
        RelyingPartyConfig {
            rp_id: config.webauthn.rp_id.clone(),
            rp_name: config.webauthn.rp_name.clone(),
            allowed_origins: config.webauthn.allowed_origins.clone(),
        },
        Arc::new(InMemoryCredentialStore::new()),
    )));

    let flow_definitions = match thunder_server::flow_defs::load_all(&cli.thunder_home) {
        Ok(defs) => defs,
        Err(e) => {
            tracing::error!(error = %e, "failed to load flow definitions");
            std::process::exit(1);
        }
    };
    let session_store = Arc::new(InMemorySessionStore::new());
    let flow_engine = match FlowEngine::new(flow_definitions, Arc::new(executors), session_store) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!(error = %e, "failed to validate flow definitions");
            std::process::exit(1);
        }
    };

    let token_builder = Arc::new(TokenBuilder::new(
        signing_key.clone(),
        GlobalTokenConfig {
            issuer: config.jwt.issuer.clone(),
            access_token_validity: config.jwt.validity_period,
            id_token_validity: config.jwt.validity_period,
            refresh_token_validity: config.oauth.refresh_token.validity_period,
        },
    ));

    let bind_address = format!("{}:{}", config.server.bind_address, config.server.port);
    let state = AppState {
        flow_engine,
        token_builder,
        signing_key,
        decoding_key,
        jwks_document,
        applications,
        ous,
        auth_codes: Arc::new(AuthCodeStore::new()),
        config: Arc::new(config),
    };
    let router = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, address = %bind_address, "failed to bind listener");
            std::process::exit(1);
        }
    };
    tracing::info!(address = %bind_address, "thunder-server listening");

    if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await {
        tracing::error!(error = %e, "server exited with an error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
