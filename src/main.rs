#![cfg_attr(not(test), deny(clippy::panic))]

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use clap::Parser;
use meme_arena_server::config;
use meme_arena_server::engine::GameEngine;
use meme_arena_server::logging;
use meme_arena_server::security::{ClientCertificateFingerprint, CLIENT_FINGERPRINT_HEADER_CANDIDATES};
use meme_arena_server::websocket;
use std::{convert::Infallible, net::SocketAddr, sync::Arc};

/// Meme Arena -- real-time backend for a multi-player meme-caption card game
#[derive(Parser, Debug)]
#[command(name = "meme-arena-server")]
#[command(about = "A real-time backend for a multi-player meme-caption card game")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json if present; otherwise use code defaults.
    let cfg = config::load();

    // Handle --print-config: output the loaded configuration as JSON
    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // Validate configuration security. config::load() already logs problems to
    // stderr and continues; here we capture the result so --validate-config and
    // normal startup can both fail fast on inconsistent setups.
    let validation_result = config::validate_config_security(&cfg);

    // Handle --validate-config: exit after validation
    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Storage backend: InMemory");
                println!("  TLS enabled: {}", cfg.security.transport.tls.enabled);
                println!(
                    "  Metrics auth required: {}",
                    cfg.security.require_metrics_auth
                );
                println!("  Websocket auth required: {}", cfg.security.require_auth);
                println!("  Max players per room: {}", cfg.rooms.max_capacity);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    // In normal operation, propagate validation errors
    validation_result?;

    // Initialize logging from config.
    logging::init_with_config(&cfg.logging);

    let port: u16 = cfg.port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let cors_origins = cfg.security.cors_origins.clone();
    let tls = cfg.security.transport.tls.clone();

    tracing::info!(%addr, "Starting Meme Arena server");

    let engine = GameEngine::new(cfg);

    // Re-derive deadline timers for any round left in-flight by a previous
    // process lifetime, then start the periodic housekeeping sweep (§5).
    engine.resume_in_progress_timers().await;
    engine.spawn_maintenance();

    let router = websocket::create_router(&cors_origins)
        .layer(middleware::from_fn(capture_client_fingerprint))
        .with_state(engine);

    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    #[cfg(feature = "tls")]
    if tls.enabled {
        let tls_config = meme_arena_server::security::build_rustls_config(&tls)
            .map_err(|err| anyhow::anyhow!("failed to initialize TLS configuration: {err}"))?;

        tracing::info!(%addr, "Server started over HTTPS with TLS enabled");

        axum_server::bind_rustls(addr, tls_config)
            .serve(make_service)
            .await?;

        return Ok(());
    }

    // Start the server over plain TCP (typically behind a reverse proxy).
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, cors_origins = %cors_origins, "Server started over HTTP");

    axum::serve(listener, make_service).await?;

    Ok(())
}

async fn capture_client_fingerprint(mut req: Request, next: Next) -> Result<Response, Infallible> {
    if let Some(fingerprint) = extract_client_fingerprint(req.headers()) {
        req.extensions_mut().insert(fingerprint);
    }

    Ok(next.run(req).await)
}

fn extract_client_fingerprint(headers: &HeaderMap) -> Option<ClientCertificateFingerprint> {
    for header_name in CLIENT_FINGERPRINT_HEADER_CANDIDATES {
        if let Some(value) = headers
            .get(*header_name)
            .and_then(|value| value.to_str().ok())
        {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(ClientCertificateFingerprint {
                fingerprint: Arc::<str>::from(trimmed.to_owned()),
                source_header: header_name,
            });
        }
    }

    None
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["meme-arena-server"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_long() {
        let cli = Cli::try_parse_from(["meme-arena-server", "--validate-config"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_short() {
        let cli = Cli::try_parse_from(["meme-arena-server", "-c"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_print_config() {
        let cli = Cli::try_parse_from(["meme-arena-server", "--print-config"]).unwrap();
        assert!(!cli.validate_config);
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_validate_and_print_config_conflict() {
        let result =
            Cli::try_parse_from(["meme-arena-server", "--validate-config", "--print-config"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cannot be used with"));
    }

    #[test]
    fn test_cli_help_contains_flags() {
        let result = Cli::try_parse_from(["meme-arena-server", "--help"]);
        assert!(result.is_err()); // --help causes early exit which is an "error"
        let err = result.unwrap_err();
        let help_text = err.to_string();
        assert!(help_text.contains("--validate-config"));
        assert!(help_text.contains("--print-config"));
        assert!(help_text.contains("-c"));
    }

    #[test]
    fn test_cli_version() {
        let result = Cli::try_parse_from(["meme-arena-server", "--version"]);
        assert!(result.is_err()); // --version causes early exit
    }
}
