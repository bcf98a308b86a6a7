use rusqlite::Connection;

use coffer_core::crypto::value;
use coffer_core::distributor::WRAPPED_KEY_PREF;
use coffer_core::{
    CofferError, EncryptedTable, KeyDistributor, KeyPairService, MemoryPrefStore, SessionContext,
    SystemKey, UserPrefStore,
};

fn registry() -> Vec<EncryptedTable> {
    vec![EncryptedTable {
        table: "settings".to_string(),
        primary_key: "name".to_string(),
        columns: vec!["value".to_string()],
    }]
}

fn setup_columns(key: &SystemKey) -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch("CREATE TABLE settings (name TEXT PRIMARY KEY, value TEXT);")
        .expect("create table");
    for (name, plain) in [("smtp_password", "mail-secret"), ("api_token", "tok-123")] {
        conn.execute(
            "INSERT INTO settings (name, value) VALUES (?1, ?2)",
            [name, &value::encrypt(plain, key).expect("encrypt")],
        )
        .expect("insert");
    }
    conn
}

#[test]
fn test_two_member_rotation_scenario() {
    let store = MemoryPrefStore::default();
    let keys = KeyPairService::new(&store);
    let dist = KeyDistributor::new(&store, &store);

    // Bootstrap: members A and B share system key K.
    let old_key = SystemKey::generate().expect("generate key");
    dist.publish_self_check(&old_key).expect("publish");
    dist.enroll_member(&keys, "alice", "alice-password", &old_key)
        .expect("enroll alice");
    dist.enroll_member(&keys, "bob", "bob-password-1", &old_key)
        .expect("enroll bob");

    let mut conn = setup_columns(&old_key);

    // A third party captured alice's wrapped copy of K before the rotation.
    let stale_wrapped = store
        .get("alice", WRAPPED_KEY_PREF)
        .expect("store read")
        .expect("wrapped key present");

    // Rotate K -> K'.
    let new_key = SystemKey::generate().expect("generate key");
    let members = store.logins_with("publickey").expect("membership");
    assert_eq!(members, ["alice", "bob"]);
    let report = dist
        .rotate_system_key(&old_key, &new_key, &members, &mut conn, &registry())
        .expect("rotation");
    assert_eq!(report.members_rewrapped, 2);
    assert_eq!(report.reencrypted.values, 2);

    // Both members recover K' through their own sessions and can read
    // every previously-encrypted column.
    for (login, pass) in [("alice", "alice-password"), ("bob", "bob-password-1")] {
        let session = dist
            .establish_session(&keys, login, pass)
            .expect("session after rotation");
        let unwrapped = session.system_key().expect("system key cached");
        assert_eq!(unwrapped, &new_key);

        let stored: String = conn
            .query_row(
                "SELECT value FROM settings WHERE name = 'smtp_password'",
                [],
                |row| row.get(0),
            )
            .expect("select");
        assert_eq!(value::decrypt(&stored, unwrapped).unwrap(), "mail-secret");
    }

    // The old key no longer verifies, and the stale wrapped copy only ever
    // yields the old key; it is no path to the replacement.
    assert!(!dist.verify_system_key(&old_key).expect("verify"));

    let handle = keys
        .load_private_key("alice", "alice-password")
        .expect("load key");
    UserPrefStore::set(&store, "alice", WRAPPED_KEY_PREF, &stale_wrapped).expect("restore blob");
    let mut session = SessionContext::new("alice");
    session.set_private_key(handle);
    let stale = dist
        .unwrap_system_key("alice", &session)
        .expect("stale blob unwraps");
    assert_eq!(stale, old_key);
    assert_ne!(stale, new_key);
    assert!(!dist.verify_system_key(&stale).expect("verify"));
}

#[test]
fn test_failed_rotation_leaves_old_key_authoritative() {
    let store = MemoryPrefStore::default();
    let keys = KeyPairService::new(&store);
    let dist = KeyDistributor::new(&store, &store);

    let old_key = SystemKey::generate().expect("generate key");
    dist.publish_self_check(&old_key).expect("publish");
    dist.enroll_member(&keys, "alice", "alice-password", &old_key)
        .expect("enroll alice");

    let mut conn = setup_columns(&old_key);

    // "mallory" is in the operator's member list but holds no key pair.
    let members = vec!["alice".to_string(), "mallory".to_string()];
    let new_key = SystemKey::generate().expect("generate key");
    let err = dist
        .rotate_system_key(&old_key, &new_key, &members, &mut conn, &registry())
        .expect_err("rotation must fail");
    assert!(matches!(err, CofferError::Rotation(_)));
    assert!(err.to_string().contains("mallory"));

    // The old key stays authoritative: self-check unchanged, columns still
    // open under it.
    assert!(dist.verify_system_key(&old_key).expect("verify"));
    assert!(!dist.verify_system_key(&new_key).expect("verify"));
    let stored: String = conn
        .query_row(
            "SELECT value FROM settings WHERE name = 'api_token'",
            [],
            |row| row.get(0),
        )
        .expect("select");
    assert_eq!(value::decrypt(&stored, &old_key).unwrap(), "tok-123");
}

#[test]
fn test_rotation_rejects_empty_replacement_key() {
    let store = MemoryPrefStore::default();
    let dist = KeyDistributor::new(&store, &store);
    let mut conn = Connection::open_in_memory().expect("open db");

    let result = dist.rotate_system_key(
        &SystemKey::new("old-key"),
        &SystemKey::empty(),
        &[],
        &mut conn,
        &[],
    );
    assert!(matches!(result, Err(CofferError::InvalidInput(_))));
}
