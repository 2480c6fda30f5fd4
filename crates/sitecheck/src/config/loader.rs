use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.storage_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "storage_directory must not be empty".to_string(),
        });
    }

    let upload = &config.upload;
    if upload.max_dimension == 0 {
        return Err(ConfigError::Validation {
            message: "upload.max_dimension must be greater than zero".to_string(),
        });
    }
    if !(1..=100).contains(&upload.jpeg_quality) {
        return Err(ConfigError::Validation {
            message: format!("upload.jpeg_quality must be 1..=100, got {}", upload.jpeg_quality),
        });
    }
    if upload.timeout_secs == 0 || upload.max_concurrent == 0 {
        return Err(ConfigError::Validation {
            message: "upload.timeout_secs and upload.max_concurrent must be greater than zero"
                .to_string(),
        });
    }
    if config.notifications.channel_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "notifications.channel_capacity must be greater than zero".to_string(),
        });
    }

    // Builds the catalog once to surface table errors at load time.
    config.catalog()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "storage_directory": "/srv/photos",
            "database_path": "/srv/sitecheck.db",
            "upload": {
                "max_dimension": 1280,
                "jpeg_quality": 70,
                "timeout_secs": 15,
                "max_concurrent": 2
            },
            "notifications": { "channel_capacity": 256 },
            "logging": { "level": "sitecheck=debug", "json": true }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.storage_directory, "/srv/photos");
        assert_eq!(config.upload.max_dimension, 1280);
        assert_eq!(config.upload.jpeg_quality, 70);
        assert_eq!(config.notifications.channel_capacity, 256);
        assert_eq!(config.logging.level, "sitecheck=debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_config_with_feature_table() {
        let config_json = r#"
        {
            "version": "1.0",
            "storage_directory": "/srv/photos",
            "features": [
                {
                    "key": "fireplace",
                    "label": "Fireplace",
                    "compare": { "key": "fireplace", "label": "Fireplace" }
                },
                {
                    "key": "patio",
                    "label": "Patio",
                    "general": { "key": "patio_area", "label": "Patio" }
                }
            ]
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.features().len(), 2);
        assert!(catalog.is_known("fireplace"));
        assert!(!catalog.is_known("dishwasher"));
        assert!(catalog.is_general_key("patio_area"));
    }

    #[test]
    fn test_missing_required_field() {
        let result = load_config_from_str(r#"{ "version": "1.0" }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "storage_directory": "/p", "workers": 3 }"#,
        );
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_quality_out_of_range_rejected_by_schema() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "storage_directory": "/p", "upload": { "jpeg_quality": 0 } }"#,
        );
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0", "storage_directory": "/p" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_reserved_feature_category_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "storage_directory": "/p",
            "features": [
                { "key": "oven", "label": "Oven", "compare": { "key": "stove", "label": "Stove" } }
            ]
        }
        "#;
        let result = load_config_from_str(config_json);
        assert!(matches!(result, Err(ConfigError::InvalidFeature { .. })));
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "storage_directory": "/p",
            "features": [
                { "key": "patio", "label": "Patio" },
                { "key": "patio", "label": "Patio again" }
            ]
        }
        "#;
        let result = load_config_from_str(config_json);
        assert!(matches!(result, Err(ConfigError::InvalidFeature { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sitecheck.json");
        std::fs::write(&path, r#"{ "version": "1.0", "storage_directory": "/p" }"#).unwrap();
        assert!(load_config(&path).is_ok());

        let missing = load_config(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ConfigError::ReadFile { .. })));
    }
}
