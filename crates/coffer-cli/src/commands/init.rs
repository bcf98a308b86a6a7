use coffer_core::{KeyDistributor, KeyPairService, SqlitePrefStore, SystemKey};

use crate::app::{resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{default_database_path, write_config, CofferConfig};
use crate::helpers::{prompt_new_password, system_key_from_env, SYSTEM_KEY_ENV};

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = resolve_config_path(ctx.cli())?;
    if config_path.exists() {
        return Err(anyhow::anyhow!(
            "Config already exists at {}. Remove it to re-initialize.",
            config_path.display()
        ));
    }

    let database_path = match args.database {
        Some(ref value) => std::path::PathBuf::from(value),
        None => default_database_path()?,
    };
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create database directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }

    // Operator-chosen key from the environment, or a fresh random one.
    let system_key = match system_key_from_env(SYSTEM_KEY_ENV) {
        Some(key) => key,
        None => SystemKey::generate()?,
    };
    let password = prompt_new_password(&format!("Password for {}", args.login))?;

    let store = SqlitePrefStore::open(&database_path)
        .map_err(|e| anyhow::anyhow!("Failed to create database: {}", e))?;
    let keys = KeyPairService::new(&store);
    let distributor = KeyDistributor::new(&store, &store);

    distributor.publish_self_check(&system_key)?;
    distributor.enroll_member(&keys, &args.login, &password, &system_key)?;

    let config = CofferConfig::new(database_path.clone());
    write_config(&config_path, &config)?;

    if !ctx.quiet() {
        println!("Initialized coffer at {}", database_path.display());
        println!("Config written to {}", config_path.display());
        println!("Enrolled {}", args.login);
        println!();
        println!("Register encrypted columns under [[tables]] in the config.");
    }
    Ok(())
}
