use coffer_core::{KeyDistributor, KeyPairService};

use crate::app::AppContext;
use crate::cli::CheckArgs;
use crate::helpers::prompt_password;

pub fn handle_check(ctx: &AppContext, args: &CheckArgs) -> anyhow::Result<()> {
    let (store, _config) = ctx.open_store()?;
    let keys = KeyPairService::new(&store);
    let distributor = KeyDistributor::new(&store, &store);

    let password = prompt_password(&format!("Password for {}", args.login))?;
    match distributor.establish_session(&keys, &args.login, &password) {
        Ok(mut session) => {
            session.clear();
            if !ctx.quiet() {
                println!("Key check: OK");
                println!("- private key: OK");
                println!("- wrapped key: OK");
                println!("- self-check: OK");
            }
            Ok(())
        }
        Err(err) => {
            eprintln!("Key check: FAILED");
            eprintln!("- error: {}", err);
            Err(anyhow::anyhow!("Key check failed"))
        }
    }
}
