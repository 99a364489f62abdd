use auth_kv_adapter::{
    AccountType, AdapterAccount, AdapterConfig, AdapterSession, AdapterUser, AuthAdapter,
    KvAdapter, RedisKvStore, SessionUpdate, VerificationToken,
};
use chrono::{Duration, Utc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("auth_kv_adapter=debug,{}=debug,info", env!("CARGO_CRATE_NAME")).into()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Walks one user through sign-up, account linking, an email sign-in and a
/// session, then deletes everything again.
async fn run_lifecycle(adapter: &dyn AuthAdapter) -> Result<(), Box<dyn std::error::Error>> {
    let mut user = AdapterUser::new("", "demo@example.com");
    user.name = Some("Demo User".to_string());
    let user = adapter.create_user(user).await?;
    tracing::info!("Created user: {}", serde_json::to_string_pretty(&user)?);

    let mut account = AdapterAccount::new(&user.id, AccountType::Oauth, "github", "1234567");
    account.access_token = Some("gho_demo".to_string());
    account.token_type = Some("bearer".to_string());
    let account = adapter.link_account(account).await?;
    let by_account = adapter.get_user_by_account(&account.account_ref()).await?;
    tracing::info!(
        "User found by account: {}",
        by_account.is_some_and(|u| u.id == user.id)
    );

    let expires = Utc::now() + Duration::hours(24);
    let token = VerificationToken::new(&user.email, "d3m0-t0k3n", expires);
    adapter.create_verification_token(token).await?;
    let used = adapter
        .use_verification_token(&user.email, "d3m0-t0k3n")
        .await?;
    let reused = adapter
        .use_verification_token(&user.email, "d3m0-t0k3n")
        .await?;
    tracing::info!(
        "Verification token used: {}, usable again: {}",
        used.is_some(),
        reused.is_some()
    );

    let session = AdapterSession::new("demo-session", &user.id, Utc::now() + Duration::days(30));
    adapter.create_session(session).await?;
    let extended = adapter
        .update_session(
            SessionUpdate::new("demo-session").expires(Utc::now() + Duration::days(60)),
        )
        .await?;
    tracing::info!("Extended session: {}", serde_json::to_string_pretty(&extended)?);
    if let Some(found) = adapter.get_session_and_user("demo-session").await? {
        tracing::info!("Session belongs to {}", found.user.email);
    }

    adapter.delete_session("demo-session").await?;
    adapter.unlink_account(&account.account_ref()).await?;
    adapter.delete_user(&user.id).await?;
    tracing::info!(
        "User still present after delete: {}",
        adapter.get_user(&user.id).await?.is_some()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let url = std::env::var("AUTH_KV_REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());
    let client = redis::Client::open(url.as_str())?;
    let store = RedisKvStore::new(client);
    store.init().await?;
    tracing::info!("Connected to Redis");

    let adapter = KvAdapter::with_config(store, AdapterConfig::from_env()?)?;

    let pending = adapter.pending_user_deletions().await?;
    for user_id in pending {
        tracing::warn!("Finishing interrupted deletion of user {}", user_id);
        adapter.resume_user_deletion(&user_id).await?;
    }

    run_lifecycle(&adapter).await
}
