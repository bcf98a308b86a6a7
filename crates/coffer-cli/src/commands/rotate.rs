use rusqlite::Connection;

use coffer_core::{KeyDistributor, KeyPairService, SystemKey};

use crate::app::AppContext;
use crate::cli::RotateArgs;
use crate::helpers::{prompt_password, system_key_from_env, NEW_SYSTEM_KEY_ENV};

pub fn handle_rotate(ctx: &AppContext, args: &RotateArgs) -> anyhow::Result<()> {
    let (store, config) = ctx.open_store()?;
    let keys = KeyPairService::new(&store);
    let distributor = KeyDistributor::new(&store, &store);

    let password = prompt_password(&format!("Password for {}", args.by))?;
    let mut session = distributor.establish_session(&keys, &args.by, &password)?;
    let old_key = session
        .system_key()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Session holds no system key"))?;

    let new_key = match system_key_from_env(NEW_SYSTEM_KEY_ENV) {
        Some(key) => key,
        None => SystemKey::generate()?,
    };
    let members = distributor.members()?;

    // The column pass runs on its own connection; the wrapped-key writes
    // above-the-line go through the store's connection and are committed
    // before the exclusive transaction starts.
    let mut conn = Connection::open(config.database_path())
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;
    let result = distributor.rotate_system_key(&old_key, &new_key, &members, &mut conn, &config.tables);
    session.clear();

    match result {
        Ok(report) => {
            if !ctx.quiet() {
                println!("Rotation complete");
                println!("- members re-wrapped: {}", report.members_rewrapped);
                println!("- tables re-encrypted: {}", report.reencrypted.tables);
                println!("- rows updated: {}", report.reencrypted.rows);
                println!("- values re-encrypted: {}", report.reencrypted.values);
            }
            Ok(())
        }
        Err(err) => {
            eprintln!("Rotation: FAILED");
            eprintln!("- error: {}", err);
            eprintln!("Hint: The old key stays authoritative. Retry with the full membership.");
            Err(anyhow::anyhow!("Rotation failed"))
        }
    }
}
