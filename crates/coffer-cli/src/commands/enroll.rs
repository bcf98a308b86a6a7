use coffer_core::{KeyDistributor, KeyPairService};

use crate::app::AppContext;
use crate::cli::EnrollArgs;
use crate::helpers::{prompt_new_password, prompt_password};

pub fn handle_enroll(ctx: &AppContext, args: &EnrollArgs) -> anyhow::Result<()> {
    let (store, _config) = ctx.open_store()?;
    let keys = KeyPairService::new(&store);
    let distributor = KeyDistributor::new(&store, &store);

    // An existing member proves they hold the system key before sharing it.
    let by_password = prompt_password(&format!("Password for {}", args.by))?;
    let mut session = distributor.establish_session(&keys, &args.by, &by_password)?;
    let system_key = session
        .system_key()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Session holds no system key"))?;

    let password = prompt_new_password(&format!("Password for {}", args.login))?;
    let result = distributor.enroll_member(&keys, &args.login, &password, &system_key);
    session.clear();
    result?;

    if !ctx.quiet() {
        println!("Enrolled {}", args.login);
    }
    Ok(())
}
