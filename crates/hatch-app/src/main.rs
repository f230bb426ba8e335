//! `hatch` binary: wires the registry, database, and stdio boundary
//! together. All collaborators are constructed here and passed down
//! explicitly; nothing reaches for a global.

use std::sync::Arc;

use hatch_app::bridge::Bridge;
use hatch_app::collab::{self, HeadlessPicker};
use hatch_app::server;
use hatch_pty::{RegistryConfig, SessionRegistry};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let home = collab::home_dir().ok_or("HOME is not set")?;
    let data_dir = home.join(".hatch");
    std::fs::create_dir_all(&data_dir)?;
    let db = hatch_db::open(&data_dir.join("hatch.db"))?;

    let registry = SessionRegistry::new(RegistryConfig::default());
    let bridge = Arc::new(Bridge::new(
        Arc::clone(&registry),
        db,
        Box::new(HeadlessPicker),
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(server::run(bridge, Arc::clone(&registry)));

    // Sessions never outlive the host process.
    registry.kill_all();
    result?;
    Ok(())
}
