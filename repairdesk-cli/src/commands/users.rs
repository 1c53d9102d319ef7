use anyhow::{Context, Result};
use shared::models::UserProfile;

use super::session::App;

pub async fn customers(app: &App) -> Result<()> {
    app.require_session().await?;
    let users = app
        .client
        .list_customers()
        .await
        .context("failed to fetch customers")?;
    print_users(&users);
    Ok(())
}

pub async fn staff(app: &App) -> Result<()> {
    app.require_session().await?;
    let users = app
        .client
        .list_staff()
        .await
        .context("failed to fetch staff")?;
    print_users(&users);
    Ok(())
}

fn print_users(users: &[UserProfile]) {
    if users.is_empty() {
        println!("No accounts found.");
        return;
    }
    println!("{:<6} {:<20} {:<30} PHONE", "ID", "USERNAME", "EMAIL");
    for user in users {
        println!(
            "{:<6} {:<20} {:<30} {}",
            user.id,
            user.username,
            user.email,
            if user.phone.is_empty() {
                "-"
            } else {
                user.phone.as_str()
            },
        );
    }
}
