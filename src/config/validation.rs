use super::{AppConfig, BackendConfig, ConfigError};

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "TRACE", "DISABLED",
];

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_backend(&config.backend)?;
    validate_models(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    if server.cors_allow_origin.trim().is_empty() {
        return Err(validation_err("server.cors_allow_origin cannot be empty"));
    }
    if http::HeaderValue::from_str(&server.cors_allow_origin).is_err() {
        return Err(validation_err(
            "server.cors_allow_origin is not a valid header value",
        ));
    }
    Ok(())
}

fn validate_backend(backend: &BackendConfig) -> Result<(), ConfigError> {
    let kind = backend.kind_name();
    let base_url = backend.base_url();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(validation_err(format!(
            "backend ({kind}): base_url must start with http:// or https://"
        )));
    }
    if url::Url::parse(base_url).is_err() {
        return Err(validation_err(format!(
            "backend ({kind}): base_url '{base_url}' is not a valid URL"
        )));
    }

    match backend {
        BackendConfig::Completion { api_key, .. } => {
            // Empty means every client must send its own key.
            if api_key.chars().any(char::is_whitespace) {
                return Err(validation_err(
                    "backend (completion): api_key cannot contain whitespace",
                ));
            }
        }
        BackendConfig::CumulativeSse {
            channel_id,
            access_token,
            ..
        } => {
            if channel_id.trim().is_empty() {
                return Err(validation_err(
                    "backend (cumulative_sse): channel_id cannot be empty",
                ));
            }
            if access_token.trim().is_empty() {
                return Err(validation_err(
                    "backend (cumulative_sse): access_token cannot be empty",
                ));
            }
        }
        BackendConfig::Push { token, bot, .. } => {
            if token.trim().is_empty() {
                return Err(validation_err("backend (push): token cannot be empty"));
            }
            if bot.trim().is_empty() {
                return Err(validation_err("backend (push): bot cannot be empty"));
            }
        }
    }

    validate_proxy_url(kind, backend.proxy())
}

fn validate_proxy_url(kind: &str, proxy: Option<&str>) -> Result<(), ConfigError> {
    let Some(proxy) = proxy else {
        return Ok(());
    };
    let parsed = url::Url::parse(proxy).map_err(|err| {
        validation_err(format!(
            "backend ({kind}): proxy '{proxy}' is not a valid URL: {err}"
        ))
    })?;
    match parsed.scheme() {
        "http" | "https" | "socks5" | "socks5h" => Ok(()),
        other => Err(validation_err(format!(
            "backend ({kind}): proxy scheme '{other}' is not supported"
        ))),
    }
}

fn validate_models(config: &AppConfig) -> Result<(), ConfigError> {
    if config.models.fallback.trim().is_empty() {
        return Err(validation_err("models.fallback cannot be empty"));
    }
    for (canonical, backend) in &config.models.map {
        if canonical.trim().is_empty() || backend.trim().is_empty() {
            return Err(validation_err(format!(
                "models.map entry '{canonical}' -> '{backend}' has an empty side"
            )));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "features.log_level '{}' is not one of: {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}
