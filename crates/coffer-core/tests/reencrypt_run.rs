use rusqlite::{params, Connection};

use coffer_core::crypto::value;
use coffer_core::{reencrypt, CofferError, EncryptedTable, SystemKey};

fn registry() -> Vec<EncryptedTable> {
    vec![
        EncryptedTable {
            table: "bank_details".to_string(),
            primary_key: "id".to_string(),
            columns: vec!["account".to_string(), "iban".to_string()],
        },
        EncryptedTable {
            table: "credentials".to_string(),
            primary_key: "id".to_string(),
            columns: vec!["secret".to_string()],
        },
    ]
}

fn setup_db(key: &SystemKey) -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(
        r#"
        CREATE TABLE bank_details (
            id INTEGER PRIMARY KEY,
            owner TEXT NOT NULL,
            account TEXT,
            iban TEXT
        );

        CREATE TABLE credentials (
            id INTEGER PRIMARY KEY,
            secret TEXT
        );
        "#,
    )
    .expect("create tables");

    for (id, owner, account, iban) in [
        (1, "alice", Some("12-3456-789"), Some("DE02 1203 0000 0000 2020 51")),
        (2, "bob", Some("98-7654-321"), None),
        (3, "carol", None, Some("FR14 2004 1010 0505 0001 3M02 606")),
    ] {
        let account = account
            .map(|v| value::encrypt(v, key).expect("encrypt account"));
        let iban = iban.map(|v| value::encrypt(v, key).expect("encrypt iban"));
        conn.execute(
            "INSERT INTO bank_details (id, owner, account, iban) VALUES (?1, ?2, ?3, ?4)",
            params![id, owner, account, iban],
        )
        .expect("insert row");
    }

    conn.execute(
        "INSERT INTO credentials (id, secret) VALUES (1, ?1)",
        [value::encrypt("hunter2-but-longer", key).expect("encrypt secret")],
    )
    .expect("insert credential");

    conn
}

fn column(conn: &Connection, table: &str, column: &str, id: i64) -> Option<String> {
    conn.query_row(
        &format!("SELECT {} FROM {} WHERE id = ?1", column, table),
        [id],
        |row| row.get(0),
    )
    .expect("select column")
}

#[test]
fn test_successful_run_maps_every_value_to_the_new_key() {
    let old_key = SystemKey::new("old-system-key");
    let new_key = SystemKey::new("new-system-key");
    let mut conn = setup_db(&old_key);

    let report = reencrypt::run(&mut conn, &registry(), &old_key, &new_key)
        .expect("re-encryption should succeed");

    assert_eq!(report.tables, 2);
    assert_eq!(report.rows, 4);
    assert_eq!(report.values, 5);

    let account = column(&conn, "bank_details", "account", 1).expect("value present");
    assert_eq!(value::decrypt(&account, &new_key).unwrap(), "12-3456-789");
    assert!(value::decrypt(&account, &old_key).is_err());

    let secret = column(&conn, "credentials", "secret", 1).expect("value present");
    assert_eq!(
        value::decrypt(&secret, &new_key).unwrap(),
        "hunter2-but-longer"
    );
}

#[test]
fn test_null_values_pass_through_untouched() {
    let old_key = SystemKey::new("old-system-key");
    let new_key = SystemKey::new("new-system-key");
    let mut conn = setup_db(&old_key);

    reencrypt::run(&mut conn, &registry(), &old_key, &new_key).expect("run");

    assert_eq!(column(&conn, "bank_details", "iban", 2), None);
    assert_eq!(column(&conn, "bank_details", "account", 3), None);
}

#[test]
fn test_unconfigured_install_upgrade_encrypts_plaintext_rows() {
    // With an empty old key (the no-encryption escape hatch) a rotation
    // encrypts previously-plaintext rows.
    let empty = SystemKey::empty();
    let new_key = SystemKey::new("first-real-key");
    let mut conn = setup_db(&empty);

    reencrypt::run(&mut conn, &registry(), &empty, &new_key).expect("run");

    let account = column(&conn, "bank_details", "account", 1).expect("value present");
    assert_ne!(account, "12-3456-789");
    assert_eq!(value::decrypt(&account, &new_key).unwrap(), "12-3456-789");
}

#[test]
fn test_one_bad_value_aborts_without_mixed_state() {
    let old_key = SystemKey::new("old-system-key");
    let new_key = SystemKey::new("new-system-key");
    let mut conn = setup_db(&old_key);

    // Row 2 carries a value no key can open.
    conn.execute(
        "UPDATE bank_details SET account = 'legacy plaintext row' WHERE id = 2",
        [],
    )
    .expect("corrupt row");

    let result = reencrypt::run(&mut conn, &registry(), &old_key, &new_key);
    let err = result.expect_err("run must abort");
    assert!(matches!(err, CofferError::Rotation(_)));
    assert!(err.to_string().contains("bank_details"));

    // Nothing was committed: every surviving value still opens under the
    // old key and the bad row is untouched.
    let account = column(&conn, "bank_details", "account", 1).expect("value present");
    assert_eq!(value::decrypt(&account, &old_key).unwrap(), "12-3456-789");
    assert_eq!(
        column(&conn, "bank_details", "account", 2).as_deref(),
        Some("legacy plaintext row")
    );
    let secret = column(&conn, "credentials", "secret", 1).expect("value present");
    assert_eq!(
        value::decrypt(&secret, &old_key).unwrap(),
        "hunter2-but-longer"
    );
}

#[test]
fn test_lock_released_after_failure() {
    let old_key = SystemKey::new("old-system-key");
    let mut conn = setup_db(&old_key);
    conn.execute(
        "UPDATE credentials SET secret = 'not an envelope' WHERE id = 1",
        [],
    )
    .expect("corrupt row");

    reencrypt::run(
        &mut conn,
        &registry(),
        &old_key,
        &SystemKey::new("new-system-key"),
    )
    .expect_err("run must abort");

    // The exclusive lock is gone: the connection accepts writes again.
    conn.execute("INSERT INTO credentials (id, secret) VALUES (2, 'x')", [])
        .expect("write after failed run");
}

#[test]
fn test_malicious_registry_identifier_rejected() {
    let old_key = SystemKey::new("old-system-key");
    let mut conn = setup_db(&old_key);

    let bad = vec![EncryptedTable {
        table: "bank_details; DROP TABLE credentials".to_string(),
        primary_key: "id".to_string(),
        columns: vec!["account".to_string()],
    }];
    let result = reencrypt::run(&mut conn, &bad, &old_key, &SystemKey::new("new-key"));
    assert!(matches!(result, Err(CofferError::InvalidInput(_))));
}
