//! Walks one session through its lifecycle against the configured backends.
//!
//! $ JWT_SECRET=dev cargo run --bin token_demo -- --settings=settings/dev.toml

use courtside::application_port::*;
use courtside::domain_model::Role;
use courtside::logger::*;
use courtside::server::Server;
use courtside::settings::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger = Logger::new_bootstrap();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let server = Server::try_new(&project_settings).await?;
    let auth = server.auth_service.clone();

    let email = format!("demo-{}@courtside.local", uuid::Uuid::new_v4().simple());
    let user_id = auth
        .register(RegisterInput {
            email: email.clone(),
            password: "pick-and-roll".to_string(),
            role: Role::Coach,
        })
        .await?;
    info!(%user_id, "registered");

    let login = auth
        .login(LoginInput {
            email,
            password: "pick-and-roll".to_string(),
        })
        .await?;
    let principal = auth.verify_access(&login.tokens.access_token.0).await?;
    info!(?principal, "access token verified");

    let rotated = auth.refresh(&login.tokens.refresh_token.0).await?;
    info!(
        expires_at = %rotated.access_token_expires_at,
        "refresh rotated the pair"
    );
    match auth.refresh(&login.tokens.refresh_token.0).await {
        Err(e) => info!(error = %e, "replayed refresh token rejected"),
        Ok(_) => warn!("replayed refresh token was accepted"),
    }

    auth.revoke(&rotated.access_token.0).await?;
    match auth.verify_access(&rotated.access_token.0).await {
        Err(e) => info!(error = %e, "revoked access token rejected"),
        Ok(_) => warn!("revoked access token still verifies"),
    }

    server.shutdown().await;
    Ok(())
}
