//! Settings file persistence: path resolution, permissions and round trips.

mod common;

use common::sample_config;
use femsq_db_core::config::store::{APP_DIR_NAME, CONFIG_PATH_ENV, SETTINGS_FILE_NAME};
use femsq_db_core::config::{ConfigStore, SettingsDocument};
use femsq_db_core::{AuthMode, ConfigValidator, ConnectionConfiguration, SecretString};
use proptest::prelude::*;
use std::path::PathBuf;

#[test]
fn test_path_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let from_env = dir.path().join("env.properties");

    temp_env::with_var(CONFIG_PATH_ENV, Some(&from_env), || {
        assert_eq!(ConfigStore::new().resolve_path(), from_env);
    });
}

#[test]
fn test_path_override_beats_environment() {
    let dir = tempfile::tempdir().unwrap();
    let from_env = dir.path().join("env.properties");
    let explicit = dir.path().join("explicit.properties");

    temp_env::with_var(CONFIG_PATH_ENV, Some(&from_env), || {
        let store = ConfigStore::with_path_override(&explicit);
        assert_eq!(store.resolve_path(), explicit);
    });
}

#[cfg(unix)]
#[test]
fn test_path_defaults_to_home_directory() {
    let home = tempfile::tempdir().unwrap();

    temp_env::with_vars(
        [
            (CONFIG_PATH_ENV, Some(std::ffi::OsStr::new(""))),
            ("HOME", Some(home.path().as_os_str())),
        ],
        || {
            let expected: PathBuf = home.path().join(APP_DIR_NAME).join(SETTINGS_FILE_NAME);
            assert_eq!(ConfigStore::new().resolve_path(), expected);
        },
    );
}

#[test]
fn test_resolve_path_has_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::with_path_override(dir.path().join("a/b/database.properties"));

    store.resolve_path();
    assert!(!dir.path().join("a").exists());

    store.ensure_directory().unwrap();
    store.ensure_directory().unwrap();
    assert!(dir.path().join("a/b").is_dir());
}

#[cfg(unix)]
#[test]
fn test_save_restricts_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let settings_dir = dir.path().join(APP_DIR_NAME);
    let path = settings_dir.join(SETTINGS_FILE_NAME);
    let store = ConfigStore::with_path_override(&path);

    store.save(&SettingsDocument::from(&sample_config("db.local"))).unwrap();

    let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    let dir_mode = std::fs::metadata(&settings_dir).unwrap().permissions().mode() & 0o777;
    assert_eq!(file_mode, 0o600);
    assert_eq!(dir_mode, 0o700);
}

#[cfg(unix)]
#[test]
fn test_save_keeps_existing_shared_directory_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("shared");
    std::fs::create_dir(&shared).unwrap();
    std::fs::set_permissions(&shared, std::fs::Permissions::from_mode(0o755)).unwrap();

    let path = shared.join("db.properties");
    let store = ConfigStore::with_path_override(&path);
    store.save(&SettingsDocument::from(&sample_config("db.local"))).unwrap();

    let dir_mode = std::fs::metadata(&shared).unwrap().permissions().mode() & 0o777;
    let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(dir_mode, 0o755);
    assert_eq!(file_mode, 0o600);
}

#[cfg(unix)]
#[test]
fn test_environment_directory_is_not_tightened() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o751)).unwrap();
    let path = dir.path().join("db.properties");

    temp_env::with_var(CONFIG_PATH_ENV, Some(&path), || {
        ConfigStore::new().ensure_directory().unwrap();
    });

    let dir_mode = std::fs::metadata(dir.path()).unwrap().permissions().mode() & 0o777;
    assert_eq!(dir_mode, 0o751);
}

#[cfg(unix)]
#[test]
fn test_default_directory_is_tightened() {
    use std::os::unix::fs::PermissionsExt;

    let home = tempfile::tempdir().unwrap();
    let settings_dir = home.path().join(APP_DIR_NAME);
    std::fs::create_dir(&settings_dir).unwrap();
    std::fs::set_permissions(&settings_dir, std::fs::Permissions::from_mode(0o755)).unwrap();

    temp_env::with_vars(
        [
            (CONFIG_PATH_ENV, None),
            ("HOME", Some(home.path().as_os_str())),
        ],
        || {
            ConfigStore::new().ensure_directory().unwrap();
        },
    );

    let dir_mode = std::fs::metadata(&settings_dir).unwrap().permissions().mode() & 0o777;
    assert_eq!(dir_mode, 0o700);
}

#[cfg(unix)]
#[test]
fn test_save_tightens_existing_loose_file() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE_NAME);
    std::fs::write(&path, "host=old\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

    let store = ConfigStore::with_path_override(&path);
    store.save(&SettingsDocument::from(&sample_config("db.local"))).unwrap();

    let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(file_mode, 0o600);
    assert_eq!(store.load().unwrap().get("host"), Some("db.local"));
}

#[test]
fn test_file_has_header_and_expected_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE_NAME);
    let store = ConfigStore::with_path_override(&path);

    store.save(&SettingsDocument::from(&sample_config("db.local"))).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();

    assert!(text.starts_with("# FEMSQ database connection settings\n"));
    for line in ["host=db.local", "port=1433", "database=femsq", "username=femsq_app", "authMode=credentials"] {
        assert!(text.lines().any(|l| l == line), "missing line {line}");
    }
    assert!(text.lines().any(|l| l.starts_with("password=")));
    assert_eq!(store.load().unwrap().get("password"), Some("Pa55word!"));
}

fn auth_mode() -> impl Strategy<Value = AuthMode> {
    prop_oneof![
        Just(AuthMode::Credentials),
        Just(AuthMode::WindowsIntegrated),
        Just(AuthMode::Kerberos),
    ]
}

/// Printable ASCII, accented Latin and Cyrillic.
const TEXT_40: &str = "[ -~\u{c0}-\u{17f}\u{410}-\u{44f}]{1,40}";
const TEXT_255: &str = "[ -~\u{c0}-\u{17f}\u{410}-\u{44f}]{1,255}";

fn non_blank(pattern: &'static str) -> impl Strategy<Value = String> {
    pattern.prop_filter("must not be blank", |s: &String| !s.trim().is_empty())
}

prop_compose! {
    fn valid_config()(
        host in "[A-Za-z0-9._-]{1,40}",
        port in 1..=65535i32,
        database in non_blank(TEXT_40),
        schema in proptest::option::of("[A-Za-z0-9_]{1,128}"),
        username in proptest::option::of(non_blank(TEXT_255)),
        password in proptest::option::of(TEXT_255),
        auth_mode in auth_mode(),
        realm in proptest::option::of("[A-Z0-9._-]{1,30}"),
    ) -> ConnectionConfiguration {
        ConnectionConfiguration {
            host,
            port: Some(port),
            database,
            schema,
            username,
            password: password.map(SecretString::from),
            auth_mode,
            realm,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_save_load_map_round_trip(config in valid_config()) {
        let validator = ConfigValidator::new();
        prop_assume!(validator.validate(&config).is_ok());

        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path_override(dir.path().join(SETTINGS_FILE_NAME));
        store.save(&SettingsDocument::from(&config)).unwrap();

        let loaded = validator.map(&store.load().unwrap()).unwrap();
        prop_assert_eq!(loaded, config);
    }
}
