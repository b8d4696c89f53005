use std::fs;
use std::path::Path;
use std::time::Duration;

use accswap_vault::{FileSecretStore, Platform};
use tempfile::tempdir;

use super::*;

fn switcher(home: &Path) -> AccountSwitcher {
    let paths = SwitcherPaths::under_home(home);
    let vault = Box::new(FileSecretStore::new(
        paths.live_credentials_path(),
        paths.credentials_dir.clone(),
    ));
    AccountSwitcher::with_vault(paths, Platform::Linux, vault)
        .with_lock_timeout(Duration::from_millis(300))
}

fn write_live(home: &Path, email: &str, uuid: &str, credentials: &str) {
    let claude_dir = home.join(".claude");
    fs::create_dir_all(&claude_dir).unwrap();
    let config = serde_json::json!({
        "oauthAccount": { "emailAddress": email, "accountUuid": uuid },
        "theme": "dark",
    });
    fs::write(
        claude_dir.join(".claude.json"),
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();
    fs::write(claude_dir.join(".credentials.json"), credentials).unwrap();
}

fn live_credentials(home: &Path) -> String {
    fs::read_to_string(home.join(".claude").join(".credentials.json")).unwrap()
}

fn live_email(home: &Path) -> String {
    let text = fs::read_to_string(home.join(".claude").join(".claude.json")).unwrap();
    let document: serde_json::Value = serde_json::from_str(&text).unwrap();
    document["oauthAccount"]["emailAddress"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn email_shape_accepts_plausible_addresses_only() {
    assert!(is_email_shaped("a@example.com"));
    assert!(is_email_shaped("first.last+tag@sub.example.co"));
    assert!(!is_email_shaped("not-an-email"));
    assert!(!is_email_shaped("missing@tld"));
    assert!(!is_email_shaped("@example.com"));
    assert!(!is_email_shaped(""));
}

#[test]
fn slot_numbers_are_never_reused() {
    let mut registry = SequenceRegistry::empty("t0".to_string());
    assert_eq!(registry.next_account_number(), 1);
    registry.insert_account(
        1,
        AccountRecord {
            email: "a@example.com".to_string(),
            uuid: String::new(),
            added: "t0".to_string(),
        },
        "t0".to_string(),
    );
    registry.insert_account(
        2,
        AccountRecord {
            email: "b@example.com".to_string(),
            uuid: String::new(),
            added: "t1".to_string(),
        },
        "t1".to_string(),
    );
    registry.remove_account(1, "t2".to_string());
    assert_eq!(registry.next_account_number(), 3);
    assert!(registry.invariants_hold());
}

#[test]
fn removing_the_active_slot_clears_the_marker() {
    let mut registry = SequenceRegistry::empty("t0".to_string());
    registry.insert_account(
        1,
        AccountRecord {
            email: "a@example.com".to_string(),
            uuid: String::new(),
            added: "t0".to_string(),
        },
        "t0".to_string(),
    );
    assert_eq!(registry.active_account_number, Some(1));
    registry.remove_account(1, "t1".to_string());
    assert_eq!(registry.active_account_number, None);
    assert!(registry.invariants_hold());
}

#[test]
fn registry_document_uses_camel_case_field_names() {
    let mut registry = SequenceRegistry::empty("2026-01-01T00:00:00Z".to_string());
    registry.insert_account(
        1,
        AccountRecord {
            email: "a@example.com".to_string(),
            uuid: "uuid-1".to_string(),
            added: "2026-01-01T00:00:00Z".to_string(),
        },
        "2026-01-01T00:00:00Z".to_string(),
    );
    let value = serde_json::to_value(&registry).unwrap();
    assert!(value.get("activeAccountNumber").is_some());
    assert!(value.get("lastUpdated").is_some());
    assert!(value.get("sequence").is_some());
    assert!(value["accounts"]["1"]["email"].is_string());

    let decoded: SequenceRegistry = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, registry);
}

#[test]
fn rotation_order_is_cyclic() {
    let mut registry = SequenceRegistry::empty("t0".to_string());
    for (slot, email) in [(1, "a@example.com"), (2, "b@example.com"), (3, "c@example.com")] {
        registry.insert_account(
            slot,
            AccountRecord {
                email: email.to_string(),
                uuid: String::new(),
                added: "t0".to_string(),
            },
            "t0".to_string(),
        );
    }
    registry.active_account_number = Some(1);
    assert_eq!(registry.next_in_rotation(), Some(2));
    registry.active_account_number = Some(2);
    assert_eq!(registry.next_in_rotation(), Some(3));
    registry.active_account_number = Some(3);
    assert_eq!(registry.next_in_rotation(), Some(1));
}

#[test]
fn add_backs_up_the_live_account_once() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    assert!(!switcher.registry_exists());

    let outcome = switcher.add_current_account().unwrap();
    assert_eq!(
        outcome,
        AddOutcome::Added {
            number: 1,
            email: "a@example.com".to_string()
        }
    );
    assert!(switcher.registry_exists());

    let again = switcher.add_current_account().unwrap();
    assert_eq!(
        again,
        AddOutcome::AlreadyManaged {
            email: "a@example.com".to_string()
        }
    );

    let listings = switcher.list_accounts().unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].number, 1);
    assert!(listings[0].is_active);
}

#[test]
fn resolve_rejects_malformed_identifiers() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    switcher.add_current_account().unwrap();

    assert!(matches!(
        switcher.resolve_account("not an email"),
        Err(SwapError::Validation(_))
    ));
    assert!(matches!(
        switcher.resolve_account("7"),
        Err(SwapError::NotFound(_))
    ));
    assert!(matches!(
        switcher.resolve_account("b@example.com"),
        Err(SwapError::NotFound(_))
    ));
    let found = switcher.resolve_account("1").unwrap();
    assert_eq!(found.email, "a@example.com");
}

#[test]
fn rotate_with_a_single_account_is_a_no_op() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    switcher.add_current_account().unwrap();

    let outcome = switcher.rotate_next().unwrap();
    assert_eq!(outcome, RotateOutcome::NothingToRotate { managed: 1 });
}

#[test]
fn rotate_adopts_an_unmanaged_live_account() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    switcher.add_current_account().unwrap();

    write_live(home.path(), "c@example.com", "uuid-c", "secret-c");
    let outcome = switcher.rotate_next().unwrap();
    assert_eq!(
        outcome,
        RotateOutcome::AdoptedCurrent {
            number: 2,
            email: "c@example.com".to_string()
        }
    );
}

#[test]
fn switch_installs_the_target_account_end_to_end() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    switcher.add_current_account().unwrap();

    write_live(home.path(), "b@example.com", "uuid-b", "secret-b");
    switcher.add_current_account().unwrap();

    let listings = switcher.list_accounts().unwrap();
    assert_eq!(
        listings.iter().map(|entry| entry.number).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let switched = switcher.switch_to("1").unwrap();
    assert_eq!(switched.number, 1);
    assert_eq!(switched.email, "a@example.com");
    assert_eq!(live_email(home.path()), "a@example.com");
    assert_eq!(live_credentials(home.path()), "secret-a");

    // Fields outside the account section survive the switch.
    let text = fs::read_to_string(home.path().join(".claude").join(".claude.json")).unwrap();
    let document: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(document["theme"], "dark");

    let removed = switcher.remove_account("2").unwrap();
    assert_eq!(removed.number, 2);
    assert!(!removed.was_active);
    assert_eq!(switcher.list_accounts().unwrap().len(), 1);
}

#[test]
fn rotate_cycles_through_all_accounts() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    switcher.add_current_account().unwrap();
    write_live(home.path(), "b@example.com", "uuid-b", "secret-b");
    switcher.add_current_account().unwrap();

    // Active is slot 2; rotation wraps to slot 1, then back to slot 2.
    let first = switcher.rotate_next().unwrap();
    assert_eq!(
        first,
        RotateOutcome::Switched(SwitchedAccount {
            number: 1,
            email: "a@example.com".to_string()
        })
    );
    assert_eq!(live_credentials(home.path()), "secret-a");

    let second = switcher.rotate_next().unwrap();
    assert_eq!(
        second,
        RotateOutcome::Switched(SwitchedAccount {
            number: 2,
            email: "b@example.com".to_string()
        })
    );
    assert_eq!(live_credentials(home.path()), "secret-b");
}

#[test]
fn switching_to_the_active_slot_is_allowed() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    switcher.add_current_account().unwrap();
    write_live(home.path(), "b@example.com", "uuid-b", "secret-b");
    switcher.add_current_account().unwrap();

    let switched = switcher.switch_to("b@example.com").unwrap();
    assert_eq!(switched.number, 2);
    assert_eq!(live_credentials(home.path()), "secret-b");
}

#[test]
fn switch_aborts_before_mutating_when_backups_are_missing() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    switcher.add_current_account().unwrap();
    write_live(home.path(), "b@example.com", "uuid-b", "secret-b");
    switcher.add_current_account().unwrap();

    fs::remove_file(
        switcher
            .paths()
            .credentials_dir
            .join("creds-1-a@example.com.enc"),
    )
    .unwrap();

    let error = switcher.switch_to("1").unwrap_err();
    assert!(matches!(error, SwapError::SwitchAborted { slot: 1, .. }));
    assert!(error.to_string().contains("no live state was modified"));
    assert_eq!(live_credentials(home.path()), "secret-b");
    assert_eq!(live_email(home.path()), "b@example.com");
}

#[test]
fn failed_switch_rolls_back_installed_credentials() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    switcher.add_current_account().unwrap();
    write_live(home.path(), "b@example.com", "uuid-b", "secret-b");
    switcher.add_current_account().unwrap();

    // A backup configuration without an account section makes the switch
    // fail after the target credentials are already live.
    fs::write(
        switcher
            .paths()
            .configs_dir
            .join("config-1-a@example.com.json"),
        "{}",
    )
    .unwrap();

    let error = switcher.switch_to("1").unwrap_err();
    assert!(matches!(
        error,
        SwapError::Switch {
            slot: 1,
            rolled_back: true,
            ..
        }
    ));
    assert_eq!(live_credentials(home.path()), "secret-b");
    assert_eq!(live_email(home.path()), "b@example.com");
}

#[test]
fn switch_lock_excludes_a_second_holder_until_released() {
    let home = tempdir().unwrap();
    let lock_path = home.path().join(".accswap-backup").join(".lock");

    let guard = acquire_switch_lock(&lock_path, Duration::from_millis(200)).unwrap();
    let contended = acquire_switch_lock(&lock_path, Duration::from_millis(250));
    assert!(matches!(contended, Err(SwapError::Lock { .. })));

    drop(guard);
    let reacquired = acquire_switch_lock(&lock_path, Duration::from_millis(200));
    assert!(reacquired.is_ok());
}

#[test]
fn status_reports_managed_and_unmanaged_accounts() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    switcher.add_current_account().unwrap();

    let managed = switcher.status().unwrap();
    assert_eq!(managed.active_email.as_deref(), Some("a@example.com"));
    assert_eq!(managed.managed_number, Some(1));
    assert_eq!(managed.total_managed, 1);

    write_live(home.path(), "c@example.com", "uuid-c", "secret-c");
    let unmanaged = switcher.status().unwrap();
    assert_eq!(unmanaged.active_email.as_deref(), Some("c@example.com"));
    assert_eq!(unmanaged.managed_number, None);
    assert_eq!(unmanaged.total_managed, 1);
}

#[test]
fn purge_removes_the_backup_directory_and_slot_backups() {
    let home = tempdir().unwrap();
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    let switcher = switcher(home.path());
    switcher.add_current_account().unwrap();
    assert!(switcher.paths().backup_dir.exists());

    let report = switcher.purge().unwrap();
    assert!(!report.removed.is_empty());
    assert!(!switcher.paths().backup_dir.exists());
    // Live state is untouched by a purge.
    assert_eq!(live_credentials(home.path()), "secret-a");
}

#[test]
fn live_config_path_falls_back_without_an_account_section() {
    let home = tempdir().unwrap();
    let switcher = switcher(home.path());

    // No primary document at all.
    fs::write(home.path().join(".claude.json"), "{}").unwrap();
    assert_eq!(
        switcher.live_config_path(),
        home.path().join(".claude.json")
    );

    // Primary exists but has no account section.
    let claude_dir = home.path().join(".claude");
    fs::create_dir_all(&claude_dir).unwrap();
    fs::write(claude_dir.join(".claude.json"), r#"{"theme":"dark"}"#).unwrap();
    assert_eq!(
        switcher.live_config_path(),
        home.path().join(".claude.json")
    );

    // Primary with an account section wins.
    write_live(home.path(), "a@example.com", "uuid-a", "secret-a");
    assert_eq!(
        switcher.live_config_path(),
        claude_dir.join(".claude.json")
    );
}
