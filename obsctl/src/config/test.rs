use chrono::{Duration, TimeZone, Utc};
use rstest::rstest;
use tempfile::TempDir;
use tracing::Span;
use url::Url;

use super::*;
use crate::error::Error;

fn url(value: &str) -> Url {
    Url::parse(value).unwrap()
}

fn oidc_with_token() -> OidcConfig {
    OidcConfig {
        issuer_url: "https://idp.example/".into(),
        client_id: "cid".into(),
        client_secret: "secret".into(),
        audience: "aud".into(),
        token: Some(Token {
            access_token: "abc".into(),
            token_type: "Bearer".into(),
            expiry: Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()),
        }),
    }
}

/// Two APIs, three tenants, `o.example/acme` selected.
fn populated_config() -> Config {
    let mut config = Config::default();
    config
        .add_api("o.example".into(), url("https://o.example/"))
        .unwrap();
    config
        .add_api("staging".into(), url("https://staging.o.example/api"))
        .unwrap();
    for (api, tenant) in [("o.example", "acme"), ("o.example", "globex"), ("staging", "acme")] {
        let context = TenantContext::new(
            tenant.into(),
            Some(oidc_with_token()),
            Some(b"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n".to_vec()),
        );
        config.add_tenant(tenant.into(), api, context).unwrap();
    }
    config
        .set_current(&ContextRef::new("o.example", "acme"))
        .unwrap();
    config
}

fn store_in(dir: &TempDir) -> ConfigStore {
    ConfigStore::load(dir.path().join("obsctl").join("config.json"), Span::none()).unwrap()
}

#[test]
fn test_load_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    assert_eq!(store.config(), &Config::default());
    assert!(!store.path().exists());
}

#[test]
fn test_save_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);
    let config = populated_config();

    store.save(config.clone()).unwrap();

    let loaded = ConfigStore::read(store.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_save_leaves_no_temporary_files() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);

    store.save(populated_config()).unwrap();

    let entries: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("config.json")]);
}

#[test]
fn test_failed_save_keeps_previous_state() {
    let dir = TempDir::new().unwrap();
    // A directory where the file should be makes the final rename fail.
    let path = dir.path().join("config.json");
    std::fs::create_dir(&path).unwrap();
    let mut store = ConfigStore::load(dir.path().join("other.json"), Span::none()).unwrap();
    store.path = path.clone();

    let result = store.save(populated_config());

    assert!(matches!(result, Err(Error::Io { .. })));
    assert_eq!(store.config(), &Config::default());
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 1, "temporary file must be cleaned up");
    assert!(path.is_dir());
}

#[test]
fn test_load_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let result = ConfigStore::load(&path, Span::none());

    assert!(matches!(result, Err(Error::Parse { .. })));
}

#[test]
fn test_load_rejects_mismatched_tenant_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"apis":{"o.example":{"url":"https://o.example/","contexts":{"acme":{"tenant":"globex"}}}}}"#,
    )
    .unwrap();

    let result = ConfigStore::load(&path, Span::none());

    assert!(matches!(result, Err(Error::Validation { .. })));
}

#[test]
fn test_reads_document_written_by_go_tool() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
  "apis": {
    "o.example": {
      "url": "https://o.example/",
      "contexts": {
        "acme": {
          "tenant": "acme",
          "oidc": {
            "issuerURL": "https://idp.example/",
            "clientID": "cid",
            "clientSecret": "secret",
            "audience": "aud",
            "token": {"accessToken": "abc", "tokenType": "Bearer", "expiry": "2030-01-02T03:04:05Z"}
          },
          "caFile": "cGVt"
        }
      }
    }
  },
  "current": {"api": "", "tenant": ""}
}"#,
    )
    .unwrap();

    let config = ConfigStore::read(&path).unwrap();

    assert!(config.current.is_unset());
    let tenant = config.tenant("o.example", "acme").unwrap();
    assert_eq!(tenant.ca_file.as_deref(), Some(&b"pem"[..]));
    assert_eq!(tenant.oidc, Some(oidc_with_token()));
}

#[test]
fn test_add_api_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);

    store
        .add_api("o.example".into(), url("https://o.example/"))
        .unwrap();
    store
        .add_api("o.example".into(), url("https://o.example/"))
        .unwrap();

    assert_eq!(store.config().apis.len(), 1);
}

#[test]
fn test_add_api_conflicting_url_fails() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);
    store
        .add_api("o.example".into(), url("https://o.example/"))
        .unwrap();
    let before = std::fs::read(store.path()).unwrap();

    let result = store.add_api("o.example".into(), url("https://other.example/"));

    assert!(matches!(result, Err(Error::Validation { .. })));
    assert_eq!(
        store.config().api("o.example").unwrap().url,
        url("https://o.example/")
    );
    assert_eq!(std::fs::read(store.path()).unwrap(), before);
}

#[rstest]
#[case("", "https://o.example/")]
#[case("o.example", "mailto:ops@o.example")]
fn test_add_api_rejects_invalid_input(#[case] name: &str, #[case] value: &str) {
    let mut config = Config::default();

    let result = config.add_api(name.into(), url(value));

    assert!(matches!(result, Err(Error::Validation { .. })));
    assert!(config.apis.is_empty());
}

#[test]
fn test_add_tenant_requires_api() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);

    let result = store.add_tenant("acme".into(), &"o.example".into(), None, None);

    assert!(matches!(result, Err(Error::NotFound { kind: "api", .. })));
    assert!(!store.path().exists());
}

#[test]
fn test_add_tenant_upserts() {
    let mut config = populated_config();
    let replacement = OidcConfig {
        client_id: "other".into(),
        ..oidc_with_token()
    };

    config
        .add_tenant(
            "acme".into(),
            "o.example",
            TenantContext::new("ignored".into(), Some(replacement.clone()), None),
        )
        .unwrap();

    let tenant = config.tenant("o.example", "acme").unwrap();
    assert_eq!(tenant.tenant.as_str(), "acme");
    assert_eq!(tenant.oidc, Some(replacement));
    assert_eq!(config.api("o.example").unwrap().contexts.len(), 2);
}

#[test]
fn test_remove_tenant_unknown() {
    let mut config = populated_config();

    assert!(matches!(
        config.remove_tenant("initech", "o.example"),
        Err(Error::NotFound { kind: "tenant", .. })
    ));
    assert!(matches!(
        config.remove_tenant("acme", "nope"),
        Err(Error::NotFound { kind: "api", .. })
    ));
}

#[test]
fn test_remove_current_tenant_clears_current() {
    let mut config = populated_config();

    config.remove_tenant("acme", "o.example").unwrap();

    assert!(config.current.is_unset());
    assert!(matches!(config.get_current(), Err(Error::NoCurrentContext)));
}

#[test]
fn test_remove_other_tenant_keeps_current() {
    let mut config = populated_config();

    config.remove_tenant("globex", "o.example").unwrap();
    // same tenant name under a different API is a different context
    config.remove_tenant("acme", "staging").unwrap();

    let (selected, _, _) = config.get_current().unwrap();
    assert_eq!(selected, ContextRef::new("o.example", "acme"));
}

#[test]
fn test_remove_current_api_clears_current() {
    let mut config = populated_config();

    config.remove_api("staging").unwrap();
    assert!(!config.current.is_unset());

    config.remove_api("o.example").unwrap();
    assert!(config.current.is_unset());
}

#[test]
fn test_set_current_to_missing_context_fails() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);
    store.save(populated_config()).unwrap();

    for selected in [
        ContextRef::new("nope", "acme"),
        ContextRef::new("staging", "globex"),
    ] {
        let result = store.set_current(&selected);
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    let (selected, _, _) = store.get_current().unwrap();
    assert_eq!(selected, ContextRef::new("o.example", "acme"));
    assert_eq!(
        ConfigStore::read(store.path()).unwrap().current,
        populated_config().current
    );
}

#[test]
fn test_set_current_persists() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);
    store.save(populated_config()).unwrap();

    store
        .set_current(&ContextRef::new("staging", "acme"))
        .unwrap();

    let reloaded = ConfigStore::read(store.path()).unwrap();
    let (selected, api, _) = reloaded.get_current().unwrap();
    assert_eq!(selected.to_string(), "staging/acme");
    assert_eq!(api.url, url("https://staging.o.example/api"));
}

#[test]
fn test_get_current_distinguishes_unset_from_dangling() {
    let mut config = populated_config();
    assert!(matches!(
        Config::default().get_current(),
        Err(Error::NoCurrentContext)
    ));

    // hand-edited file pointing at a tenant that no longer exists
    config.current.tenant = Some("initech".into());
    assert!(matches!(
        config.get_current(),
        Err(Error::InvalidContext(ctx)) if ctx == "o.example/initech"
    ));

    config.current.tenant = None;
    assert!(matches!(config.get_current(), Err(Error::InvalidContext(_))));
}

#[test]
fn test_update_token() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);
    store.save(populated_config()).unwrap();
    let token = Token {
        access_token: "fresh".into(),
        token_type: "Bearer".into(),
        expiry: Some(Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap()),
    };

    store
        .update_token(&ContextRef::new("staging", "acme"), token.clone())
        .unwrap();

    let reloaded = ConfigStore::read(store.path()).unwrap();
    let tenant = reloaded.tenant("staging", "acme").unwrap();
    assert_eq!(tenant.oidc.as_ref().unwrap().token, Some(token));
}

#[test]
fn test_failed_update_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let mut store = store_in(&dir);
    store.save(populated_config()).unwrap();
    let before = std::fs::read(store.path()).unwrap();

    let result = store.update(|config| {
        config.remove_tenant("globex", "o.example")?;
        config.remove_tenant("globex", "o.example")
    });

    assert!(result.is_err());
    assert_eq!(store.config(), &populated_config());
    assert_eq!(std::fs::read(store.path()).unwrap(), before);
}

#[rstest]
#[case("o.example/acme", Some(("o.example", "acme")))]
#[case("o.example/team/a", Some(("o.example", "team/a")))]
#[case("o.example", None)]
#[case("/acme", None)]
#[case("o.example/", None)]
fn test_parse_context_ref(#[case] input: &str, #[case] expected: Option<(&str, &str)>) {
    let parsed = input.parse::<ContextRef>().ok();
    assert_eq!(
        parsed,
        expected.map(|(api, tenant)| ContextRef::new(api, tenant))
    );
}

#[rstest]
#[case(Some(Duration::hours(1)), true)]
#[case(Some(Duration::seconds(31)), true)]
#[case(Some(Duration::seconds(30)), false)]
#[case(Some(Duration::seconds(-1)), false)]
#[case(None, true)]
fn test_token_validity(#[case] remaining: Option<Duration>, #[case] valid: bool) {
    let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
    let token = Token {
        access_token: "abc".into(),
        token_type: "Bearer".into(),
        expiry: remaining.map(|remaining| now + remaining),
    };

    assert_eq!(token.is_valid_at(now, Duration::seconds(30)), valid);
}

#[test]
fn test_incomplete_oidc_config() {
    let oidc = OidcConfig {
        client_secret: String::new(),
        ..oidc_with_token()
    };

    assert!(matches!(
        oidc.ensure_complete(),
        Err(crate::error::AuthError::IncompleteCredentials("client secret"))
    ));
    assert!(oidc_with_token().ensure_complete().is_ok());
}
