use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub fares: FareRules,
    pub seed: SeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

/// Business rates, in whole currency units.
#[derive(Debug, Deserialize, Clone)]
pub struct FareRules {
    pub meal_rate: i64,
    pub baggage_rate: i64,
    pub default_customer_balance: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedConfig {
    pub enabled: bool,
    pub admin_username: String,
    pub admin_password: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of SWIFTAIR)
            // Eg.. `SWIFTAIR__SERVER__PORT=9000` would set the server port
            .add_source(config::Environment::with_prefix("SWIFTAIR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
