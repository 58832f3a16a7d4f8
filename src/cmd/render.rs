use crate::bundle::Bundle;
use clap::Args;
use color_eyre::eyre::{eyre, Result, WrapErr};
use dragonfly_datamanager::{DataManager, DataStore, ManagerConfig, ReconcileOutcome};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Bundle of templates, pools, node objects and requests (YAML)
    #[arg(short, long)]
    pub bundle: PathBuf,

    /// Also write each document payload to this directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: RenderArgs, config: ManagerConfig) -> Result<()> {
    let store = Bundle::load(&args.bundle)?.into_store().await?;
    let manager = DataManager::new(store.clone(), store.clone()).with_config(config);

    let mut failed = 0;
    for mut request in store.list_requests().await? {
        let name = format!("{}/{}", request.namespace(), request.name());
        match manager.reconcile(&mut request).await {
            Ok(ReconcileOutcome::Ready) => println!("{}: ready", name),
            Ok(ReconcileOutcome::RequeueAfter(delay)) => {
                println!("{}: waiting, retry in {}s", name, delay.as_secs())
            }
            Err(e) if e.is_terminal() => {
                failed += 1;
                println!("{}: failed: {}", name, e);
            }
            Err(e) => return Err(e).wrap_err_with(|| format!("reconciling {}", name)),
        }
        store.put_request(&request).await?;
    }

    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
    }

    for document in store.list_documents()? {
        for (key, payload) in &document.data {
            println!(
                "--- {}/{} ({}) ---",
                document.metadata.namespace(),
                document.metadata.name,
                key
            );
            print!("{}", payload);

            if let Some(dir) = &args.output {
                let path = dir.join(format!("{}.yaml", document.metadata.name));
                std::fs::write(&path, payload)
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "Wrote document");
            }
        }
    }

    if failed > 0 {
        return Err(eyre!("{} request(s) failed", failed));
    }
    Ok(())
}
