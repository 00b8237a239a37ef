use std::io::{self, BufRead, Write};
use std::sync::Arc;

use reqwest::Url;

use super::{Cli, Commands, ServeArgs, StatusArgs};
use crate::auth::{AuthError, AuthService, CallbackParams};
use crate::config::{ClientConfig, EnvSecretSource, Settings, TokenDisplay};
use crate::error::{DeskError, Result};
use crate::inspect::{Audience, DecodedJwt};
use crate::server::{self, AppState};
use crate::status::StatusPresenter;

/// Loads settings and secrets, then runs the selected subcommand.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let config = ClientConfig::from_secrets(&EnvSecretSource::new())?;
    let service = Arc::new(AuthService::from_settings(&settings, config)?);
    let session = cli
        .session
        .clone()
        .unwrap_or_else(|| settings.default_session.clone());

    match cli.command {
        Commands::Serve(args) => handle_serve(service, &settings, &session, args).await,
        Commands::Status(args) => handle_status(&service, &settings, &session, args).await,
        Commands::Login => handle_login(&service, &session).await,
        Commands::Refresh => handle_refresh(&service, &session).await,
        Commands::Clear => handle_clear(&service, &session),
        Commands::Inspect => handle_inspect(&service, &session).await,
    }
}

async fn handle_serve(
    service: Arc<AuthService>,
    settings: &Settings,
    session: &str,
    args: ServeArgs,
) -> Result<()> {
    let bind = args.bind.unwrap_or_else(|| settings.bind.clone());
    let callback_path = service.client().config().callback_path().to_string();
    if server::RESERVED_PATHS.contains(&callback_path.as_str()) {
        return Err(DeskError::config(format!(
            "OAUTH_REDIRECT_URI path {callback_path} collides with a built-in route"
        )));
    }
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| DeskError::Server(format!("cannot bind {bind}: {e}")))?;

    println!("Serving on http://{bind}/ (callback {callback_path})");
    let state = AppState::new(service, StatusPresenter::new(settings.token_display))
        .with_default_session(session);
    server::serve(listener, server::build_router(state, &callback_path)).await
}

async fn handle_status(
    service: &AuthService,
    settings: &Settings,
    session: &str,
    args: StatusArgs,
) -> Result<()> {
    let display = if args.reveal {
        TokenDisplay::Full
    } else {
        settings.token_display
    };
    println!("{}", status_text(service, session, display).await?);
    Ok(())
}

/// The callback cannot reach this process, so no sign-in link is offered.
async fn status_text(
    service: &AuthService,
    session: &str,
    display: TokenDisplay,
) -> Result<String> {
    let summary = service
        .status_without_link(session, &StatusPresenter::new(display))
        .await?;
    Ok(summary.to_string())
}

async fn handle_login(service: &AuthService, session: &str) -> Result<()> {
    let url = service.begin_authorization(session);
    println!("Visit: {url}");
    println!("After authorizing, paste the redirect URL (or just the code) below:");
    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    if input.trim().is_empty() {
        return Err(AuthError::MissingCode.into());
    }

    let params = with_issued_state(CallbackParams::from_redirect(&input), &url);
    let record = service.handle_callback(session, &params).await?;
    println!("Authorized ({} token stored).", record.token_type);
    Ok(())
}

/// A bare pasted code carries no state; reuse the one this process issued.
fn with_issued_state(mut params: CallbackParams, issued: &Url) -> CallbackParams {
    if params.state.is_none() && params.error.is_none() {
        params.state = issued
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned());
    }
    params
}

async fn handle_refresh(service: &AuthService, session: &str) -> Result<()> {
    let record = service.refresh(session).await?;
    match record.expires_at {
        Some(at) => println!("Access token refreshed; expires at {at}."),
        None => println!("Access token refreshed; expiry unknown."),
    }
    Ok(())
}

fn handle_clear(service: &AuthService, session: &str) -> Result<()> {
    service.clear(session)?;
    println!("OAuth tokens have been cleared.");
    Ok(())
}

async fn handle_inspect(service: &AuthService, session: &str) -> Result<()> {
    let decoded = service.inspect(session).await?;
    println!("{}", inspect_report(&decoded));
    Ok(())
}

fn inspect_report(decoded: &DecodedJwt) -> String {
    let pretty = |map: &serde_json::Map<String, serde_json::Value>| {
        serde_json::to_string_pretty(map).unwrap_or_default()
    };
    let claims = decoded.claims();
    let dash = || "-".to_string();
    [
        format!("=== JWT Header ===\n{}", pretty(&decoded.header)),
        format!("=== JWT Payload ===\n{}", pretty(&decoded.payload)),
        format!("iss: {}", claims.iss.unwrap_or_else(dash)),
        format!(
            "aud: {}",
            claims.aud.as_ref().map(Audience::to_string).unwrap_or_else(dash)
        ),
        format!("exp: {}", claims.exp.map(|t| t.to_rfc3339()).unwrap_or_else(dash)),
        format!("sub: {}", claims.sub.unwrap_or_else(dash)),
    ]
    .join("\n")
}
