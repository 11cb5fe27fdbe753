use learnsphere_api::config::{Config, StorageBackend};
use serial_test::serial;

fn clear_env() {
    for key in [
        "APP_ENV",
        "JWT_SECRET",
        "MONGO_URI",
        "APP__AUTH__JWT_SECRET",
        "APP__STORAGE__BACKEND",
        "APP__AUTH__SUPER_ADMIN_EMAIL",
    ] {
        std::env::remove_var(key);
    }
    std::env::set_var("SKIP_ROOT_ENV", "1");
}

#[test]
#[serial]
fn test_environment_overrides_defaults() {
    clear_env();
    std::env::set_var("APP__STORAGE__BACKEND", "memory");
    std::env::set_var("APP__AUTH__SUPER_ADMIN_EMAIL", " Root@Example.com ");
    std::env::set_var("MONGO_URI", "mongodb://db:27017/?replicaSet=rs0");

    let config = Config::load().unwrap();
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.storage.mongo_uri, "mongodb://db:27017/?replicaSet=rs0");
    assert_eq!(config.auth.super_admin_email.as_deref(), Some("root@example.com"));
    assert_eq!(config.text_generation.timeout_secs, 60);

    clear_env();
}

#[test]
#[serial]
fn test_production_requires_jwt_secret() {
    clear_env();
    std::env::set_var("APP_ENV", "prod");

    assert!(Config::load().is_err());

    std::env::set_var("JWT_SECRET", "a-real-secret");
    let config = Config::load().unwrap();
    assert_eq!(config.auth.jwt_secret, "a-real-secret");

    clear_env();
}
