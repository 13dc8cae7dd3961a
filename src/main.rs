//! OPAC Portal - command-line client
//!
//! Restores the stored session, then runs one command against it.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use opac_portal::{
    api::HttpAuthApi,
    config::{AppConfig, LoggingConfig},
    models::RegistrationFields,
    services::{default_route_for, visible_menu, FileSessionStore},
    PortalContext,
};

const USAGE: &str = "\
Usage: opac-portal <command>

Commands:
  whoami                                   Show the signed-in user
  login <email> <password>                 Sign in
  register <email> <username> <full name> <password>
                                           Create a student account and sign in
  logout                                   Sign out
  visit <path>                             Show the access decision for a page
  menu                                     List the navigation visible to you";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);
    tracing::info!("Starting OPAC Portal v{}", env!("CARGO_PKG_VERSION"));

    let store_path = config
        .session
        .store_path
        .clone()
        .or_else(FileSessionStore::default_path)
        .context("Could not determine where to keep the session, set session.store_path")?;
    tracing::debug!("Session file: {:?}", store_path);

    let api = HttpAuthApi::new(&config.api).context("Failed to create API client")?;
    let portal = PortalContext::new(config, Arc::new(api), Arc::new(FileSessionStore::new(store_path)));

    portal.session.bootstrap().await;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] | ["whoami"] => match portal.session.identity() {
            Some(identity) => println!(
                "{} <{}> signed in as {}",
                identity.name(),
                identity.email,
                identity.role
            ),
            None => println!("Not signed in"),
        },
        ["login", email, password] => {
            let identity = portal.session.login(email, password).await?;
            println!("Welcome, {}", identity.name());
            println!("Continue at {}", default_route_for(Some(identity.role)));
        }
        ["register", email, username, full_name, password] => {
            if !portal.config.features.enable_registration {
                anyhow::bail!("Registration is disabled");
            }
            let fields = RegistrationFields {
                email: email.to_string(),
                username: username.to_string(),
                full_name: full_name.to_string(),
                password: password.to_string(),
                password_confirm: password.to_string(),
            };
            let identity = portal.session.register(&fields).await?;
            println!("Account created for {}", identity.name());
            println!("Continue at {}", default_route_for(Some(identity.role)));
        }
        ["logout"] => {
            portal.session.logout().await;
            println!("Signed out");
        }
        ["visit", path] => {
            let navigation = portal.navigate(path);
            println!("{}", serde_json::to_string_pretty(&navigation.outcome)?);
        }
        ["menu"] => match portal.session.state().role() {
            Some(role) => {
                println!("{} Menu", role.label());
                for item in visible_menu(role) {
                    println!("  {:<22} {}", item.name, item.path);
                }
            }
            None => println!("Sign in to see your menu"),
        },
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Logs go to stderr so command output stays clean
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("opac_portal={}", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}
