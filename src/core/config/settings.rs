use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_f64,
    parse_u16, parse_u32, parse_u64, parse_usize,
};
use super::types::{
    AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, GradingSettings,
    RedisSettings, RuntimeSettings, ServerHost, ServerPort, ServerSettings, Settings,
    TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("AUTOGRADE_HOST", "0.0.0.0");
        let port = env_or_default("AUTOGRADE_PORT", "8000");

        let environment = parse_environment(
            env_optional("AUTOGRADE_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("AUTOGRADE_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Autograde API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "autograde");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "autograde_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let openai_api_key = env_or_default("OPENAI_API_KEY", "");
        let openai_base_url = env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1");
        let ai_model = env_or_default("AI_MODEL", "gpt-4o");
        let ai_max_tokens = parse_u32("AI_MAX_TOKENS", env_or_default("AI_MAX_TOKENS", "1024"))?;
        let ai_temperature =
            parse_f64("AI_TEMPERATURE", env_or_default("AI_TEMPERATURE", "0.0"))?;
        let ai_request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "60"))?;
        let ai_connect_timeout =
            parse_u64("AI_CONNECT_TIMEOUT", env_or_default("AI_CONNECT_TIMEOUT", "10"))?;

        let confidence_threshold = parse_f64(
            "GRADING_CONFIDENCE_THRESHOLD",
            env_or_default("GRADING_CONFIDENCE_THRESHOLD", "0.80"),
        )?;
        let max_retries =
            parse_u32("GRADING_MAX_RETRIES", env_or_default("GRADING_MAX_RETRIES", "3"))?;
        let retry_base_delay_ms = parse_u64(
            "GRADING_RETRY_BASE_DELAY_MS",
            env_or_default("GRADING_RETRY_BASE_DELAY_MS", "1000"),
        )?;
        let queue_enabled =
            env_optional("GRADING_QUEUE_ENABLED").map(|value| parse_bool(&value)).unwrap_or(true);
        let queue_name = env_or_default("GRADING_QUEUE_NAME", "autograde:grading_jobs");
        let worker_concurrency = parse_usize(
            "GRADING_WORKER_CONCURRENCY",
            env_or_default("GRADING_WORKER_CONCURRENCY", "3"),
        )?;
        let stale_after_minutes = parse_u64(
            "GRADING_STALE_AFTER_MINUTES",
            env_or_default("GRADING_STALE_AFTER_MINUTES", "30"),
        )?;
        let heartbeat_seconds = parse_u64(
            "GRADING_HEARTBEAT_SECONDS",
            env_or_default("GRADING_HEARTBEAT_SECONDS", "15"),
        )?;

        let log_level = env_or_default("AUTOGRADE_LOG_LEVEL", "info");
        let json = env_optional("AUTOGRADE_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            ai: AiSettings {
                openai_api_key,
                openai_base_url,
                ai_model,
                ai_max_tokens,
                ai_temperature,
                ai_request_timeout,
                ai_connect_timeout,
            },
            grading: GradingSettings {
                confidence_threshold,
                max_retries,
                retry_base_delay_ms,
                queue_enabled,
                queue_name,
                worker_concurrency,
                stale_after_minutes,
                heartbeat_seconds,
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

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grading.queue_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_QUEUE_NAME",
                value: String::from("<empty>"),
            });
        }

        if self.grading.heartbeat_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_HEARTBEAT_SECONDS",
                value: String::from("0"),
            });
        }

        // Recovery must miss several heartbeats before it takes an attempt over.
        if self.grading.stale_after_minutes.saturating_mul(60)
            < self.grading.heartbeat_seconds.saturating_mul(4)
        {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_STALE_AFTER_MINUTES",
                value: self.grading.stale_after_minutes.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        if self.ai.openai_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }

        if self.ai.openai_base_url.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_BASE_URL"));
        }

        Ok(())
    }
}
