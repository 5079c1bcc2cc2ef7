//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_DYNAMODB_ENDPOINT: &str = "http://localhost:8000";
    pub const DEV_DYNAMODB_REGION: &str = "us-east-1";
    pub const DEV_DYNAMODB_ACCESS_KEY: &str = "local";
    pub const DEV_DYNAMODB_SECRET_KEY: &str = "local";

    pub const VERSION_TABLE: &str = "MigrationVersion";
    pub const VERSIONS_DIR: &str = "./migrations/versions";
    pub const TEMPLATE_PATH: &str = "./migrations/version_template.txt";
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// Check if this is a development environment.
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Check if this is a production environment.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// DynamoDB connection settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Endpoint URL (for DynamoDB Local or compatible services)
    pub endpoint: Option<String>,
    /// AWS region
    pub region: String,
    /// Access key ID
    pub access_key: String,
    /// Secret access key
    pub secret_key: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// DynamoDB connection settings
    pub store: StoreSettings,
    /// Table holding the current version record
    pub version_table: String,
    /// Directory containing `<version>_<slug>.rs` migration files
    pub versions_dir: PathBuf,
    /// Template rendered by `revision`
    pub template_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In development mode (RUST_ENV=development) every variable has a
    /// default pointing at DynamoDB Local. In production mode the endpoint
    /// defaults to the regional AWS endpoint and development credentials
    /// are refused.
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production) - REQUIRED
    /// - `DYNAMODB_ENDPOINT`: Endpoint URL override
    /// - `DYNAMODB_REGION`: AWS region (default: us-east-1)
    /// - `DYNAMODB_ACCESS_KEY`: Access key ID
    /// - `DYNAMODB_SECRET_KEY`: Secret access key
    /// - `MIGRATE_VERSION_TABLE`: Version table name (default: MigrationVersion)
    /// - `MIGRATE_VERSIONS_DIR`: Migration directory (default: ./migrations/versions)
    /// - `MIGRATE_TEMPLATE`: Revision template (default: ./migrations/version_template.txt)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Parse environment - required
        let env_str = env::var("RUST_ENV").map_err(|_| ConfigError::MissingEnvVar("RUST_ENV"))?;

        let environment = Environment::parse(&env_str).ok_or(ConfigError::InvalidValue(
            "RUST_ENV must be 'development' or 'production'",
        ))?;

        let store = StoreSettings {
            endpoint: env::var("DYNAMODB_ENDPOINT").ok().or_else(|| {
                if environment.is_development() {
                    Some(defaults::DEV_DYNAMODB_ENDPOINT.to_string())
                } else {
                    None
                }
            }),
            region: env::var("DYNAMODB_REGION")
                .unwrap_or_else(|_| defaults::DEV_DYNAMODB_REGION.to_string()),
            access_key: env::var("DYNAMODB_ACCESS_KEY")
                .unwrap_or_else(|_| defaults::DEV_DYNAMODB_ACCESS_KEY.to_string()),
            secret_key: env::var("DYNAMODB_SECRET_KEY")
                .unwrap_or_else(|_| defaults::DEV_DYNAMODB_SECRET_KEY.to_string()),
        };

        let version_table = env::var("MIGRATE_VERSION_TABLE")
            .unwrap_or_else(|_| defaults::VERSION_TABLE.to_string());
        if version_table.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "MIGRATE_VERSION_TABLE must not be empty",
            ));
        }

        let versions_dir = env::var("MIGRATE_VERSIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::VERSIONS_DIR));

        let template_path = env::var("MIGRATE_TEMPLATE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::TEMPLATE_PATH));

        let config = Config {
            environment,
            store,
            version_table,
            versions_dir,
            template_path,
        };

        // Validate production configuration
        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Validate that production configuration does not use development defaults.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.store.access_key == defaults::DEV_DYNAMODB_ACCESS_KEY
            || self.store.secret_key == defaults::DEV_DYNAMODB_SECRET_KEY
        {
            errors.push(
                "DYNAMODB_ACCESS_KEY/DYNAMODB_SECRET_KEY are using development defaults. Set production credentials."
                    .to_string(),
            );
        }

        if self.store.endpoint.as_deref() == Some(defaults::DEV_DYNAMODB_ENDPOINT) {
            errors.push(format!(
                "DYNAMODB_ENDPOINT is using development default '{}'.",
                defaults::DEV_DYNAMODB_ENDPOINT
            ));
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}
