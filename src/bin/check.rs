//! Preflight checks for an Atticus install.
//!
//! Verifies configuration, durable storage, and credential availability
//! without calling the remote service. Run after editing `config.toml` or
//! moving the data directory.
//!
//! Diagnostic output goes to stderr; findings go to stdout.

use atticus::app_dirs;
use atticus::config::AppConfig;
use atticus::credentials::CredentialRef;
use atticus::store::{JsonStateStore, StateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut failures = 0usize;

    let config_path = app_dirs::config_file();
    let config = match AppConfig::load_or_default() {
        Ok(config) => {
            if config_path.is_file() {
                println!("config: loaded {}", config_path.display());
            } else {
                println!("config: defaults ({} not present)", config_path.display());
            }
            config
        }
        Err(e) => {
            println!("config: FAILED to load {}: {e}", config_path.display());
            failures += 1;
            AppConfig::default()
        }
    };
    println!("  gateway url: {}", config.gateway.api_url);
    println!("  chat model:  {}", config.gateway.chat_model);
    println!("  tts model:   {}", config.gateway.tts_model);

    let data_dir = config.data_dir();
    match JsonStateStore::new(&data_dir) {
        Ok(store) => {
            println!("storage: {}", data_dir.display());
            match store.load_documents().await {
                Ok(documents) => {
                    println!("  documents record: {} document(s)", documents.len());
                }
                Err(e) => {
                    println!("  documents record: FAILED: {e}");
                    failures += 1;
                }
            }
            match store.load_history().await {
                Ok(sessions) => println!("  history record: {} session(s)", sessions.len()),
                Err(e) => {
                    println!("  history record: FAILED: {e}");
                    failures += 1;
                }
            }
        }
        Err(e) => {
            println!("storage: FAILED to open {}: {e}", data_dir.display());
            failures += 1;
        }
    }

    // A missing credential is expected on first run, not a failure; the
    // engine tolerates keys arriving later.
    match config.gateway.api_key.resolve() {
        Ok(Some(_)) => println!(
            "credential: available ({})",
            describe(&config.gateway.api_key)
        ),
        Ok(None) => println!(
            "credential: not set ({}); request features stay disabled",
            describe(&config.gateway.api_key)
        ),
        Err(e) => {
            println!("credential: FAILED: {e}");
            failures += 1;
        }
    }

    if failures == 0 {
        println!("all checks passed");
        Ok(())
    } else {
        anyhow::bail!("{failures} check(s) failed");
    }
}

fn describe(key: &CredentialRef) -> String {
    match key {
        CredentialRef::Env { var } => format!("environment variable {var}"),
        CredentialRef::Keychain { service, account } => format!("keychain {service}/{account}"),
        CredentialRef::Literal { .. } => "inline config value".to_owned(),
        CredentialRef::None => "none configured".to_owned(),
    }
}
