//! Application startup and command dispatch.
//!
//! Wires the credential store, the auth API, the session and the client
//! together from a config, then runs one command against them.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::api::{AuthApi, HttpAuthApi};
use crate::client::{AuthClient, SilentList};
use crate::collaborators::LogNavigator;
use crate::config::ConfigV1;
use crate::error::SessionError;
use crate::guards::{GuardOutcome, GuestOnly, RequireAuthenticated};
use crate::session::Session;
use crate::state::AppState;
use crate::store::create_store;

/// Build the application state from config, talking to the configured backend.
pub fn build(config: Arc<ConfigV1>) -> Result<AppState, SessionError> {
    let api = Arc::new(HttpAuthApi::new(&config.api)?);
    build_with_api(config, api)
}

/// Build the application state around a caller-supplied [`AuthApi`].
pub fn build_with_api(
    config: Arc<ConfigV1>,
    api: Arc<dyn AuthApi>,
) -> Result<AppState, SessionError> {
    let store = create_store(&config.store);
    info!("Using auth API '{}'", api.get_name());
    let session = Arc::new(Session::new(store, api));
    let client = Arc::new(AuthClient::new(
        &config.api,
        session.clone(),
        SilentList::new(config.silent_endpoints.clone()),
    )?);
    let navigator = Arc::new(LogNavigator);
    let require_authenticated = Arc::new(RequireAuthenticated::new(
        config.guards.clone(),
        navigator.clone(),
    ));
    let guest_only = Arc::new(GuestOnly::new(config.guards.clone(), navigator));
    Ok(AppState {
        config,
        session,
        client,
        require_authenticated,
        guest_only,
    })
}

#[derive(Parser, Debug)]
#[command(name = "authsession", about = "Client-side auth session for a token-protected API")]
pub struct Cli {
    /// Configuration file, `./config.yaml` when omitted.
    #[arg(long, env = "AUTHSESSION_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the session state.
    Status,
    Login {
        username: String,
        password: String,
    },
    Logout,
    /// GET a path through the authenticated client.
    Get {
        path: String,
    },
    /// Fetch the identity again from the server.
    Whoami,
    /// Evaluate the route guards for a location.
    Guard {
        location: String,
        /// Use the guest-only guard instead of the authenticated one.
        #[arg(long)]
        guest: bool,
    },
    /// Print the configuration JSON schema.
    Schema,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize the session and run one command against it.
///
/// # Errors
///
/// Returns the first failure the command ran into. Auth failures have
/// already ended the session by the time they are returned.
pub async fn run(state: &AppState, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    if command == Command::Schema {
        return Ok(crate::config::print_schema()?);
    }

    state.session.initialize().await;

    match command {
        Command::Status => print_json(&state.session.snapshot()),
        Command::Login { username, password } => {
            let identity = state.session.sign_in(&username, &password).await?;
            print_json(&identity)
        }
        Command::Logout => {
            let ended = state.session.sign_out().await;
            println!("{}", if ended { "logged out" } else { "not logged in" });
            Ok(())
        }
        Command::Get { path } => {
            let response = state.client.get(&path).await?;
            print_json(&response.body)
        }
        Command::Whoami => {
            let identity = state.session.reload_user().await?;
            print_json(&identity)
        }
        Command::Guard { location, guest } => {
            let outcome = if guest {
                state.guest_only.settle(&state.session).await
            } else {
                state.require_authenticated.settle(&state.session, &location).await
            };
            match outcome {
                GuardOutcome::Pending => println!("pending"),
                GuardOutcome::Redirect(target) => println!("redirect {}", target),
                GuardOutcome::Render => println!("render {}", location),
            }
            Ok(())
        }
        Command::Schema => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        let cli = Cli::try_parse_from(["authsession", "status"]).expect("status parses");
        assert_eq!(cli.command, Command::Status);
        assert_eq!(cli.config, None);

        let cli = Cli::try_parse_from(["authsession", "--config", "dev.yaml", "login", "ada", "pw"])
            .expect("login parses");
        assert_eq!(cli.config.as_deref(), Some("dev.yaml"));
        assert_eq!(
            cli.command,
            Command::Login {
                username: "ada".to_string(),
                password: "pw".to_string()
            }
        );

        let cli = Cli::try_parse_from(["authsession", "guard", "/reports", "--guest"])
            .expect("guard parses");
        assert_eq!(
            cli.command,
            Command::Guard {
                location: "/reports".to_string(),
                guest: true
            }
        );
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(Cli::try_parse_from(["authsession"]).is_err());
        assert!(Cli::try_parse_from(["authsession", "login", "ada"]).is_err());
        assert!(Cli::try_parse_from(["authsession", "launch"]).is_err());
        assert!(Cli::try_parse_from(["authsession", "--config"]).is_err());
    }

    #[tokio::test]
    async fn guards_follow_configured_paths() {
        let mut config = ConfigV1::for_base_url("http://127.0.0.1:9");
        config.guards.login_path = "/signin".to_string();
        let state = build(Arc::new(config)).expect("state should build");

        let outcome = state.require_authenticated.settle(&state.session, "/reports").await;
        assert_eq!(
            outcome,
            GuardOutcome::Redirect("/signin?redirect=%2Freports".to_string())
        );
        assert_eq!(state.guest_only.settle(&state.session).await, GuardOutcome::Render);
    }

    #[tokio::test]
    async fn build_wires_client_to_session() {
        let config = Arc::new(ConfigV1::for_base_url("http://127.0.0.1:9"));
        let state = build(config).expect("state should build");
        assert!(Arc::ptr_eq(state.client.session(), &state.session));
        assert!(!state.session.is_authenticated());
    }
}
