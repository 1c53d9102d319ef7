use anyhow::{Context, Result, bail};
use rpassword::prompt_password;
use shared::models::{RegisterRequest, ResetPasswordRequest};

use super::session::App;

pub async fn register(
    app: &App,
    username: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
) -> Result<()> {
    let password = prompt_password("Password: ")?;
    let confirm = prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("passwords do not match");
    }

    let created = app
        .client
        .register(&RegisterRequest {
            username,
            email,
            password,
            phone,
            address,
        })
        .await
        .context("registration failed")?;

    println!("Account created for {} <{}>", created.username, created.email);
    println!("Run `repairdesk login --username {}` to sign in.", created.username);
    Ok(())
}

pub async fn forgot_password(app: &App, email: &str) -> Result<()> {
    let response = app
        .client
        .forgot_password(email)
        .await
        .context("password reset request failed")?;
    println!(
        "{}",
        response
            .message
            .unwrap_or_else(|| format!("Password reset instructions sent to {email}."))
    );
    Ok(())
}

pub async fn reset_password(app: &App, uid: &str, token: &str) -> Result<()> {
    let request = ResetPasswordRequest {
        new_password: prompt_password("New password: ")?,
        confirm_password: prompt_password("Confirm new password: ")?,
    };

    let response = app
        .client
        .reset_password(uid, token, &request)
        .await
        .context("password reset failed")?;
    println!(
        "{}",
        response
            .message
            .unwrap_or_else(|| "Password has been reset.".to_string())
    );
    Ok(())
}
