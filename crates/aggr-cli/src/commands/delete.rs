use tracing::info;

use super::open_store;

pub fn delete_system(config: &str, key: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    match store.delete_compute_system(key) {
        Ok(report) => {
            info!(%key, removed = report.removed.len(), "system deleted");
            println!("✓ Deleted {key}");
            for record in &report.removed {
                println!("  {}", record.address());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Delete failed: {e}");
            Err(e.into())
        }
    }
}
