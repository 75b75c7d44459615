//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! DISLION_PASSWORD=... dislion login -i admin@dislion.co
//! dislion whoami
//! dislion logout
//! ```

use secrecy::SecretString;

use super::{CliError, Context, output};

/// Sign in and store the issued session.
pub async fn login(
    ctx: &Context,
    identifier: &str,
    password: SecretString,
) -> Result<(), CliError> {
    let user = ctx.session.sign_in(identifier, &password).await?;
    output(format_args!(
        "Signed in as {} ({})",
        user.email.as_deref().unwrap_or(identifier),
        user.role
    ));
    if !user.is_admin() {
        tracing::warn!("Account is not an admin, back-office commands will be refused");
    }
    Ok(())
}

/// Sign out, waiting briefly for the backend to revoke the refresh token.
pub async fn logout(ctx: &Context) {
    let was_signed_in = ctx.session.is_authenticated();
    let route = ctx.session.sign_out().await;
    if was_signed_in {
        output(format_args!("Signed out, continue at {route}"));
    } else {
        output("Not signed in");
    }
}

pub fn whoami(ctx: &Context) {
    match ctx.session.user() {
        Some(user) => output(format_args!(
            "{} {} ({})",
            user.id,
            user.email.as_deref().unwrap_or("-"),
            user.role
        )),
        None if ctx.session.is_authenticated() => output("Signed in (no profile stored)"),
        None => output(format_args!("Not signed in to {}", ctx.config.api_url)),
    }
}

pub async fn change_password(
    ctx: &Context,
    current: SecretString,
    new: SecretString,
) -> Result<(), CliError> {
    ctx.session.change_password(&current, &new).await?;
    output("Password changed");
    Ok(())
}
