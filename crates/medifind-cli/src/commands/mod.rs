pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod search;

use std::path::PathBuf;

use anyhow::{Context, Result};
use medifind_core::{Config, MediFind, SupabaseClient, UserIdentity};

const DATA_DIR: &str = "medifind";
const SESSION_DB: &str = "session.db";

/// Session database under the user's data directory.
fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(DATA_DIR).join(SESSION_DB))
}

pub fn load_config() -> Result<Config> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if config.database_path.is_none() {
        config.database_path = default_database_path();
    }
    Ok(config)
}

/// Connect and settle the saved session before a command runs.
pub async fn connect(config: &Config) -> Result<MediFind<SupabaseClient>> {
    let app = MediFind::connect(config).context("Failed to open session storage")?;
    app.auth.initialize().await;
    app.auth.wait_idle().await;
    Ok(app)
}

/// The signed-in user, or an error telling them to sign in.
pub fn require_user(app: &MediFind<SupabaseClient>) -> Result<UserIdentity> {
    app.auth
        .snapshot()
        .user
        .context("Not signed in. Run `medifind login` first.")
}
