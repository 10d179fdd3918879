//! Backer CLI - sign in to the backer crowdfunding platform from a terminal.
//!
//! Plays the part of a page: on start it consumes an OAuth redirect URL if
//! one was passed, then reads commands from stdin against a single in-memory
//! session.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use backer_core::{
    AuthError, AuthSessionManager, BackendAuthClient, Config, OAuthCallbackHandler, OAuthProvider,
    QueryParams, SessionState,
};

/// Directory for a rolling log file, in addition to stderr
const ENV_LOG_DIR: &str = "BACKER_LOG_DIR";

const HELP: &str = "\
Commands:
  status              Show whether you are signed in
  providers           List the sign-in providers the server offers
  login [email]       Sign in with email and password
  oauth <provider>    Start signing in with google or facebook
  callback <url>      Finish an OAuth sign-in from the redirect URL
  logout              Sign out
  help                Show this help
  quit                Exit";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "backer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();
    info!("Backer CLI starting");

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    config.apply_env();

    let api = BackendAuthClient::new(&config).context("Invalid backend configuration")?;
    let mut manager = AuthSessionManager::new(api);
    let handler = OAuthCallbackHandler::new();

    // A redirect URL on the command line is the page load after an OAuth round-trip
    if let Some(url) = std::env::args().nth(1) {
        complete_redirect(&handler, &mut manager, &url).await;
    }

    print_status(&mut manager);
    println!("Type 'help' for commands.");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let arg = parts.next();

        match command {
            "status" => print_status(&mut manager),
            "providers" => {
                let status = manager.provider_status().await;
                let available = status.available();
                if available.is_empty() {
                    println!("Only email and password sign-in is available.");
                } else {
                    for provider in available {
                        println!("  {}", provider);
                    }
                }
            }
            "login" => login(&mut manager, &mut config, arg).await?,
            "oauth" => match arg.and_then(OAuthProvider::parse) {
                Some(provider) => {
                    let url = manager.begin_oauth(provider);
                    manager.mark_oauth_pending(provider);
                    println!("Redirecting to {}...", provider);
                    println!("Open this URL in your browser, then paste the address you land on with 'callback':");
                    println!("  {}", url);
                }
                None => println!("Usage: oauth <google|facebook>"),
            },
            "callback" => match arg {
                Some(url) => complete_redirect(&handler, &mut manager, url).await,
                None => println!("Usage: callback <url>"),
            },
            "logout" => {
                manager.logout().await;
                println!("Signed out.");
            }
            "help" => println!("{}", HELP),
            "quit" | "exit" => break,
            other => println!("Unknown command '{}'. Type 'help' for commands.", other),
        }
    }

    info!("Backer CLI shutting down");
    Ok(())
}

fn print_status(manager: &mut AuthSessionManager) {
    match manager.state() {
        SessionState::Authenticated => {
            if let Some(credential) = manager.credential() {
                println!(
                    "Signed in as {} <{}> via {} ({} role, {} min left)",
                    credential.profile.name,
                    credential.profile.email,
                    credential.method(),
                    credential.role,
                    credential.minutes_until_expiry()
                );
            }
        }
        SessionState::OAuthPending(provider) => {
            println!("Waiting for {} to redirect back...", provider)
        }
        SessionState::Anonymous => println!("Not signed in."),
    }
}

/// Report the outcome of a login that the backend accepted. The issued
/// token may still be unusable, in which case the session stays anonymous.
fn report_signed_in(manager: &mut AuthSessionManager) {
    let reason = match manager.token_expiry() {
        Some(Err(e)) => Some(e),
        _ => None,
    };
    if manager.is_authenticated() {
        print_status(manager);
    } else {
        println!("{}", unusable_token_message(reason.as_ref()));
    }
}

fn unusable_token_message(reason: Option<&AuthError>) -> String {
    match reason {
        Some(e) => format!(
            "The server accepted the sign-in but issued an unusable token ({}). Please try again.",
            e
        ),
        None => "The server accepted the sign-in but issued a token that has already expired. Please try again."
            .to_string(),
    }
}

async fn complete_redirect(
    handler: &OAuthCallbackHandler,
    manager: &mut AuthSessionManager,
    url: &str,
) {
    let mut params = match QueryParams::from_url(url) {
        Ok(params) => params,
        Err(e) => {
            println!("That does not look like a URL: {}", e);
            return;
        }
    };

    match handler.handle(&mut params, manager).await {
        Some(Ok(())) => report_signed_in(manager),
        Some(Err(e)) => println!("{}", e.user_message()),
        None => println!("No sign-in result found in that URL."),
    }
}

async fn login(
    manager: &mut AuthSessionManager,
    config: &mut Config,
    email_arg: Option<&str>,
) -> Result<()> {
    let email = match email_arg {
        Some(email) => email.to_string(),
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    if email.is_empty() || password.is_empty() {
        println!("Email and password required.");
        return Ok(());
    }

    match manager.login_with_password(&email, &password).await {
        Ok(()) => {
            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            report_signed_in(manager);
        }
        Err(e) => println!("{}", e.user_message()),
    }
    Ok(())
}

fn prompt_email(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim();

    Ok(match (email.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => email.to_string(),
    })
}
