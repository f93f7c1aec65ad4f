use tracing::info;

use zentask::config::AppConfig;
use zentask::settings::SettingsStore;
use zentask::state::AppState;
use zentask::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    telemetry::init(&config)?;
    telemetry::install_panic_hook();

    let state = match AppState::open(&config).await {
        Ok(state) => state,
        Err(e) => {
            telemetry::report(&e, "open database");
            return Err(e.into());
        }
    };
    state.store.health_check().await?;

    let settings = SettingsStore::load(&config.settings_path);
    info!(
        theme = %settings.theme(),
        auto_save = settings.auto_save(),
        "settings loaded from {}",
        settings.path().display()
    );

    let accounts = state.users.count().await?;
    info!(
        accounts,
        authenticated = state.session.is_authenticated(),
        "zentask core ready on {}",
        config.database_url
    );

    state.store.close().await;
    Ok(())
}

