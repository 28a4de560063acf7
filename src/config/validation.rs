use url::Url;

use super::{ConfigError, ProviderConfig};

/// Validate a loaded configuration.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] for unusable endpoints, zero limits,
/// or out-of-range temperatures.
pub fn validate_config(config: &ProviderConfig) -> Result<(), ConfigError> {
    validate_http_url("api.base_url", &config.api.base_url)?;
    validate_http_url("api.model_details_url", &config.api.model_details_url)?;

    if config.api.timeout == 0 {
        return Err(ConfigError::Validation(
            "api.timeout must be greater than zero".to_string(),
        ));
    }
    if config.defaults.context_length == 0 {
        return Err(ConfigError::Validation(
            "defaults.context_length must be greater than zero".to_string(),
        ));
    }
    if config.defaults.max_output_tokens == 0 {
        return Err(ConfigError::Validation(
            "defaults.max_output_tokens must be greater than zero".to_string(),
        ));
    }

    validate_temperature("defaults.temperature", config.defaults.temperature)?;
    for (model_id, temperature) in &config.model_temperatures {
        validate_temperature(&format!("model_temperatures.{model_id}"), *temperature)?;
    }

    Ok(())
}

fn validate_http_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|err| ConfigError::Validation(format!("{field} is not a valid URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "{field} must use http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(())
}

fn validate_temperature(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&value) || value.is_nan() {
        return Err(ConfigError::Validation(format!(
            "{field} must be between 0 and 2, got {value}"
        )));
    }
    Ok(())
}
