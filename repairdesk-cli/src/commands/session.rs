use std::{
    io::{self, Write},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use client::{ApiClient, FileStorage, RehydrateOutcome, SessionEvent, SessionStore};
use rpassword::prompt_password;
use shared::{config::client::Config, models::UserProfile};
use tokio::sync::broadcast;
use tracing::debug;

const SIGN_IN_HINT: &str = "run `repairdesk login` to sign in again";

/// Client wiring shared by every command that talks to the backend.
#[derive(Debug)]
pub struct App {
    pub client: ApiClient,
    events: broadcast::Receiver<SessionEvent>,
}

impl App {
    /// Build the session store over the configured file and the API client on top.
    pub fn connect(config: &Config) -> Result<Self> {
        let storage = Arc::new(FileStorage::new(config.session.storage_path.clone()));
        let session = Arc::new(SessionStore::new(storage));
        let events = session.subscribe();
        let client =
            ApiClient::from_config(config, session).context("failed to build HTTP client")?;
        debug!(base_url = %client.base_url(), policy = %client.refresh_policy(), "client ready");
        Ok(Self { client, events })
    }

    /// Restore the stored session, failing when there is none left afterwards.
    pub async fn require_session(&self) -> Result<UserProfile> {
        match self.client.rehydrate().await {
            RehydrateOutcome::Restored | RehydrateOutcome::Refreshed => self
                .client
                .session()
                .user()
                .context("session ended while it was being restored"),
            RehydrateOutcome::Anonymous => {
                bail!("no active session found; run `repairdesk login` first")
            }
            RehydrateOutcome::LoggedOut | RehydrateOutcome::Superseded => {
                bail!("session expired; {SIGN_IN_HINT}")
            }
        }
    }

    /// Print a notice for session events published while the command ran.
    pub fn report_session_events(mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SessionEvent::LoggedOut => eprintln!("Signed out; {SIGN_IN_HINT}."),
                SessionEvent::TokenRefreshed => debug!("access token refreshed"),
                SessionEvent::LoggedIn { username } => debug!(%username, "signed in"),
            }
        }
    }
}

pub async fn login(app: &App, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = prompt_password("Password: ")?;
    if password.trim().is_empty() {
        bail!("password must not be empty");
    }

    let user = app
        .client
        .login(&username, &password)
        .await
        .context("login failed")?;
    print_profile(&user);
    Ok(())
}

pub async fn logout(app: &App) -> Result<()> {
    if app.client.rehydrate().await == RehydrateOutcome::Anonymous {
        println!("No active session found.");
        return Ok(());
    }
    if !app.client.logout().await {
        println!("Stored session was no longer valid and has been removed.");
    }
    Ok(())
}

pub async fn me(app: &App) -> Result<()> {
    let user = app.require_session().await?;
    print_profile(&user);
    Ok(())
}

pub(crate) fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush().ok();
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim().to_string();
    if trimmed.is_empty() {
        bail!("input must not be empty");
    }
    Ok(trimmed)
}

fn print_profile(user: &UserProfile) {
    println!("Logged in as {} (id {})", user.username, user.id);
    println!("role: {}", user.role());
    if !user.email.is_empty() {
        println!("email: {}", user.email);
    }
    if !user.phone.is_empty() {
        println!("phone: {}", user.phone);
    }
    if !user.address.is_empty() {
        println!("address: {}", user.address);
    }
}
