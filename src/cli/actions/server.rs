use crate::api;
use crate::cli::actions::Action;
use crate::token::TokenKey;
use anyhow::{Context, Result};
use url::Url;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            token_secret,
        } => {
            // Reject malformed DSNs before handing them to the pool.
            let dsn = Url::parse(&dsn).context("invalid database DSN")?;

            api::serve(port, dsn.to_string(), TokenKey::new(token_secret)).await?;
        }
    }

    Ok(())
}
