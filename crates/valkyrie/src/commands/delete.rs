//! `valk delete`

use valkyrie_core::ProjectStore;

use crate::context::Session;

pub async fn handle(env: Option<String>, profile: Option<&str>, yes: bool) -> anyhow::Result<()> {
    let store = ProjectStore::discover()?;
    let mut config = store.load().await?;
    if let Some(env) = &env {
        config.environment(env)?;
    }

    let region = config.project.region.clone();
    let session = Session::open(store, &region, profile, true).await?;

    match env {
        Some(env) => {
            session
                .orchestrator
                .delete_environment(&mut config, &env, yes)
                .await?;
        }
        None => {
            session.orchestrator.delete_project(&mut config, yes).await?;
        }
    }
    Ok(())
}
