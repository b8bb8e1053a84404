use anyhow::{Context, Result};
use dialoguer::Password;
use serde::Serialize;
use std::sync::Arc;

use reel_client::config::{self, Command};
use reel_client::store::FileStore;
use reel_client::transport::HttpTransport;
use reel_client::{AuthOutcome, Session};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let (config, command) = config::Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!(
        api_url = %config.api_url,
        credentials_file = %config.credentials_file.display(),
        "Configuration loaded"
    );

    let transport = Arc::new(HttpTransport::new(
        &config.api_url,
        config.http_max_connections,
        config.http_connect_timeout,
        config.http_request_timeout,
    )?);
    let store = Arc::new(FileStore::new(config.credentials_file.clone()));
    let session = Session::new(transport, store);

    run(&session, command).await
}

async fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Signup {
            name,
            email,
            password,
        } => {
            let password = password_or_prompt(password)?;
            report(session.signup(&name, &email, &password).await)
        }

        Command::Login { email, password } => {
            let password = password_or_prompt(password)?;
            report(session.login(&email, &password).await)
        }

        Command::Logout => {
            session.logout().await;
            println!("Signed out");
            Ok(())
        }

        Command::Me => {
            let user = session
                .restore()
                .await
                .context("Not signed in (run `reel-client login`)")?;
            print_json(&user)
        }

        Command::Dashboard { page, limit } => {
            let dashboard = session
                .dashboard(page, limit)
                .await
                .context("Failed to load dashboard")?;
            print_json(&dashboard)
        }

        Command::Stream { video_id } => {
            let stream = session
                .video_stream(&video_id)
                .await
                .context("Failed to load video")?;
            print_json(&stream)
        }

        Command::Verify { playback_token } => {
            let verification = session
                .verify_playback_token(&playback_token)
                .await
                .context("Failed to verify playback token")?;
            print_json(&verification)
        }
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password"),
    }
}

fn report(outcome: AuthOutcome) -> Result<()> {
    match outcome {
        AuthOutcome::Success { user } => {
            match user {
                Some(user) => println!("Signed in as {} <{}>", user.name, user.email),
                None => println!("Signed in"),
            }
            Ok(())
        }
        AuthOutcome::Failure { message } => anyhow::bail!(message),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to format output")?;
    println!("{}", json);
    Ok(())
}
