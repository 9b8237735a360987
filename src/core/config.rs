use std::env;

use thiserror::Error;

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:3000",
    "http://localhost:8080",
];

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    server: ServerSettings,
    runtime: RuntimeSettings,
    api: ApiSettings,
    idp: IdpSettings,
    cors: CorsSettings,
    database: DatabaseSettings,
    generator: GeneratorSettings,
    email: EmailSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    host: ServerHost,
    port: ServerPort,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
}

/// External identity provider: token verification plus the admin API used
/// for provisioning candidate identities.
#[derive(Debug, Clone)]
pub(crate) struct IdpSettings {
    pub(crate) issuer: String,
    pub(crate) audience: String,
    pub(crate) jwks_url: String,
    pub(crate) admin_base_url: String,
    pub(crate) admin_api_key: String,
    pub(crate) default_password: String,
    pub(crate) admin_email_domain: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) postgres_server: String,
    pub(crate) postgres_port: u16,
    pub(crate) postgres_user: String,
    pub(crate) postgres_password: String,
    pub(crate) postgres_db: String,
    pub(crate) database_url: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct GeneratorSettings {
    pub(crate) url: String,
    pub(crate) timeout_seconds: u64,
    pub(crate) batch_size: u32,
    pub(crate) max_attempts: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct EmailSettings {
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) from_address: String,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        }
    }

    fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServerHost(String);

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPort(u16);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid server host: {0}")]
    InvalidHost(String),
    #[error("invalid server port: {0}")]
    InvalidPort(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("PORTAL_HOST", "0.0.0.0");
        let port = env_or_default("PORTAL_PORT", "8000");

        let environment =
            parse_environment(env_optional("PORTAL_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("PORTAL_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Certification Portal API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));

        let idp_issuer = env_or_default("IDP_ISSUER", "");
        let idp_audience = env_or_default("IDP_AUDIENCE", "");
        let idp_jwks_url = match env_optional("IDP_JWKS_URL") {
            Some(url) => url,
            None if !idp_issuer.is_empty() => {
                format!("{}/.well-known/jwks.json", idp_issuer.trim_end_matches('/'))
            }
            None => String::new(),
        };
        let idp_admin_base_url = env_or_default("IDP_ADMIN_BASE_URL", "");
        let idp_admin_api_key = env_or_default("IDP_ADMIN_API_KEY", "");
        let default_password = env_or_default("DEFAULT_PASSWORD", "");
        let admin_email_domain =
            env_or_default("ADMIN_EMAIL_DOMAIN", "nmkglobalinc.com").to_ascii_lowercase();

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "certportal");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "certportal_db");
        let database_url = env_optional("DATABASE_URL");

        let generator_url = env_or_default("GENERATOR_API_URL", "");
        let generator_timeout_seconds = parse_u64(
            "GENERATOR_TIMEOUT_SECONDS",
            env_or_default("GENERATOR_TIMEOUT_SECONDS", "90"),
        )?;
        let generator_batch_size =
            parse_u32("GENERATOR_BATCH_SIZE", env_or_default("GENERATOR_BATCH_SIZE", "10"))?;
        let generator_max_attempts =
            parse_u32("GENERATOR_MAX_ATTEMPTS", env_or_default("GENERATOR_MAX_ATTEMPTS", "30"))?;

        let email_base_url = env_or_default("EMAIL_API_URL", "");
        let email_api_key = env_or_default("EMAIL_API_KEY", "");
        let email_from = env_or_default("EMAIL_FROM_ADDRESS", "no-reply@certportal.local");

        let log_level = env_or_default("PORTAL_LOG_LEVEL", "info");
        let json = env_optional("PORTAL_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version },
            idp: IdpSettings {
                issuer: idp_issuer,
                audience: idp_audience,
                jwks_url: idp_jwks_url,
                admin_base_url: idp_admin_base_url,
                admin_api_key: idp_admin_api_key,
                default_password,
                admin_email_domain,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            generator: GeneratorSettings {
                url: generator_url,
                timeout_seconds: generator_timeout_seconds,
                batch_size: generator_batch_size,
                max_attempts: generator_max_attempts,
            },
            email: EmailSettings {
                base_url: email_base_url,
                api_key: email_api_key,
                from_address: email_from,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn idp(&self) -> &IdpSettings {
        &self.idp
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn generator(&self) -> &GeneratorSettings {
        &self.generator
    }

    pub(crate) fn email(&self) -> &EmailSettings {
        &self.email
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.generator.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GENERATOR_BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        if self.generator.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GENERATOR_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if self.generator.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GENERATOR_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.idp.admin_email_domain.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ADMIN_EMAIL_DOMAIN",
                value: String::from("<empty>"),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        if self.idp.issuer.is_empty() {
            return Err(ConfigError::MissingSecret("IDP_ISSUER"));
        }

        if self.idp.audience.is_empty() {
            return Err(ConfigError::MissingSecret("IDP_AUDIENCE"));
        }

        if self.idp.jwks_url.is_empty() {
            return Err(ConfigError::MissingSecret("IDP_JWKS_URL"));
        }

        if self.idp.admin_base_url.is_empty() {
            return Err(ConfigError::MissingSecret("IDP_ADMIN_BASE_URL"));
        }

        if self.idp.default_password.is_empty() {
            return Err(ConfigError::MissingSecret("DEFAULT_PASSWORD"));
        }

        if self.generator.url.is_empty() {
            return Err(ConfigError::MissingSecret("GENERATOR_API_URL"));
        }

        if self.email.base_url.is_empty() {
            return Err(ConfigError::MissingSecret("EMAIL_API_URL"));
        }

        Ok(())
    }
}

impl DatabaseSettings {
    pub(crate) fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_server,
            self.postgres_port,
            self.postgres_db
        )
    }
}

impl ServerHost {
    fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }
        Ok(Self(value))
    }
}

impl ServerPort {
    fn parse(value: String) -> Result<Self, ConfigError> {
        let parsed: u16 = value.parse().map_err(|_| ConfigError::InvalidPort(value.clone()))?;
        if parsed == 0 {
            return Err(ConfigError::InvalidPort(value));
        }
        Ok(Self(parsed))
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = value else {
        return Ok(default_cors_origins());
    };

    if raw.trim().is_empty() {
        return Ok(default_cors_origins());
    }

    if raw.trim_start().starts_with('[') {
        let parsed: Vec<String> =
            serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?;
        if parsed.is_empty() {
            return Ok(default_cors_origins());
        }
        return Ok(parsed);
    }

    let items: Vec<String> = raw
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        return Ok(default_cors_origins());
    }

    Ok(items)
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|val| val.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cors_origins_json() {
        let raw = "[\"http://a\",\"http://b\"]".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors json");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_csv() {
        let raw = "http://a, http://b".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors csv");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_defaults_on_empty() {
        let parsed = parse_cors_origins(Some(" ".to_string())).expect("cors empty");
        assert_eq!(parsed, default_cors_origins());
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn parse_environment_variants() {
        assert_eq!(parse_environment(Some("prod".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("production".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("staging".to_string())), Environment::Staging);
        assert_eq!(parse_environment(Some("testing".to_string())), Environment::Test);
        assert_eq!(parse_environment(None), Environment::Development);
    }
}
