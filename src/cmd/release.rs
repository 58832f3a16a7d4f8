use crate::bundle::Bundle;
use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use dragonfly_datamanager::{DataManager, DataStore, ManagerConfig, ReleaseOutcome};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Bundle of templates, pools, node objects and requests (YAML)
    #[arg(short, long)]
    pub bundle: PathBuf,
}

pub async fn run(args: ReleaseArgs, config: ManagerConfig) -> Result<()> {
    let store = Bundle::load(&args.bundle)?.into_store().await?;
    let manager = DataManager::new(store.clone(), store.clone()).with_config(config);

    for request in store.list_requests().await? {
        let name = format!("{}/{}", request.namespace(), request.name());
        let outcome = manager
            .release(&request)
            .await
            .wrap_err_with(|| format!("releasing {}", name))?;
        match outcome {
            ReleaseOutcome::Released => println!("{}: released", name),
            ReleaseOutcome::Retry => println!("{}: pool changed, retry", name),
        }
    }

    for pool in store.list_pools()? {
        let claims: Vec<&str> = pool
            .metadata
            .owner_references
            .iter()
            .map(|owner| owner.name.as_str())
            .collect();
        println!(
            "{}/{}: claims [{}]",
            pool.metadata.namespace(),
            pool.metadata.name,
            claims.join(", ")
        );
    }
    Ok(())
}
