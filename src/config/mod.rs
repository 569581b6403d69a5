pub mod schema;

pub use schema::Config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reexported_config_default_is_constructible() {
        let config = Config::default();
        assert!(!config.api_url.is_empty());
        assert!(config.request_timeout_secs > 0);
    }
}
