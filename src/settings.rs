use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub listen: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Auth {
    pub session_ttl_hours: i64,
    pub otp_ttl_minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct Seed {
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub http: Http,
    pub auth: Auth,
    pub seed: Seed,
}

fn default_max_connections() -> u32 {
    5
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("MINTED").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
