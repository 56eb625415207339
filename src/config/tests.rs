#[cfg(test)]
mod config_tests {
    use crate::config::{
        default_carts_table, default_host, default_log_level, default_max_request_size,
        default_port, default_products_table, default_region, default_service_name,
        default_timeout, default_users_table, Config, ConfigError, DatabaseConfig,
        ObservabilityConfig, ServerConfig,
    };
    use std::time::Duration;

    fn vars(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::from_vars(vars(&[])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout_seconds, 30);
        assert_eq!(config.max_request_size, 1024 * 1024);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_server_config_from_vars() {
        let config = ServerConfig::from_vars(vars(&[
            ("SHOPCART_HOST", "127.0.0.1"),
            ("SHOPCART_PORT", "5000"),
            ("SHOPCART_REQUEST_TIMEOUT_SECONDS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:5000");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_database_config_from_vars() {
        let config = DatabaseConfig::from_vars(vars(&[
            ("SHOPCART_PRODUCTS_TABLE_NAME", "TestProducts"),
            ("SHOPCART_CARTS_TABLE_NAME", "TestCarts"),
            ("SHOPCART_USERS_TABLE_NAME", "TestUsers"),
            ("SHOPCART_REGION", "eu-west-1"),
            ("SHOPCART_ENDPOINT_URL", "http://localhost:8000"),
            ("SHOPCART_AUTO_CREATE_TABLES", "true"),
        ]))
        .unwrap();

        assert_eq!(config.products_table_name, "TestProducts");
        assert_eq!(config.carts_table_name, "TestCarts");
        assert_eq!(config.users_table_name, "TestUsers");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:8000"));
        assert!(config.auto_create_tables);
    }

    #[test]
    fn test_database_config_defaults() {
        let config = DatabaseConfig::from_vars(vars(&[])).unwrap();

        assert_eq!(config.products_table_name, "ShopProducts");
        assert!(config.endpoint_url.is_none());
        assert!(!config.auto_create_tables);
    }

    #[test]
    fn test_observability_config_from_vars() {
        let config = ObservabilityConfig::from_vars(vars(&[
            ("SHOPCART_SERVICE_NAME", "test-service"),
            ("SHOPCART_SERVICE_VERSION", "1.0.0"),
            ("SHOPCART_OTLP_ENDPOINT", "http://test:4317"),
            ("SHOPCART_LOG_LEVEL", "debug"),
            ("SHOPCART_ENABLE_JSON_LOGGING", "true"),
        ]))
        .unwrap();

        assert_eq!(config.service_name, "test-service");
        assert_eq!(config.service_version, "1.0.0");
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://test:4317"));
        assert_eq!(config.log_level, "debug");
        assert!(config.enable_json_logging);
    }

    #[test]
    fn test_invalid_port_is_load_error() {
        let result = ServerConfig::from_vars(vars(&[("SHOPCART_PORT", "not-a-port")]));
        assert!(matches!(result, Err(ConfigError::LoadError { .. })));
    }

    #[test]
    fn test_validation_rejects_zero_port_and_empty_tables() {
        let mut server = ServerConfig::from_vars(vars(&[])).unwrap();
        let mut database = DatabaseConfig::from_vars(vars(&[])).unwrap();
        assert!(Config::validate_sections(&server, &database).is_ok());

        server.port = 0;
        assert!(Config::validate_sections(&server, &database).is_err());

        server.port = 8080;
        database.users_table_name = " ".to_string();
        match Config::validate_sections(&server, &database) {
            Err(ConfigError::ValidationError { message }) => {
                assert_eq!(message, "Users table name cannot be empty");
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::ValidationError {
            message: "Invalid configuration".to_string(),
        };
        assert_eq!(error.to_string(), "Validation error: Invalid configuration");
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_host(), "0.0.0.0");
        assert_eq!(default_port(), 8080);
        assert_eq!(default_timeout(), 30);
        assert_eq!(default_max_request_size(), 1024 * 1024);
        assert_eq!(default_products_table(), "ShopProducts");
        assert_eq!(default_carts_table(), "ShopCarts");
        assert_eq!(default_users_table(), "ShopUsers");
        assert_eq!(default_region(), "us-east-1");
        assert_eq!(default_service_name(), "shopcart-rs");
        assert_eq!(default_log_level(), "info");
    }
}
