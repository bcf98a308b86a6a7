use coffer_core::{KeyDistributor, KeyPairService};

use crate::app::AppContext;
use crate::cli::PasswdArgs;
use crate::helpers::{prompt_new_password, prompt_password};

pub fn handle_passwd(ctx: &AppContext, args: &PasswdArgs) -> anyhow::Result<()> {
    let (store, _config) = ctx.open_store()?;
    let keys = KeyPairService::new(&store);
    let distributor = KeyDistributor::new(&store, &store);

    let old_password = prompt_password(&format!("Current password for {}", args.login))?;
    let new_password = prompt_new_password("New password")?;

    distributor.rewrap_after_password_change(&keys, &args.login, &old_password, &new_password)?;

    if !ctx.quiet() {
        println!("Key pair regenerated for {}", args.login);
    }
    Ok(())
}
