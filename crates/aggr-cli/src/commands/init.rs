use std::path::Path;

use aggr_core::AggrConfig;
use anyhow::bail;

pub fn init_config(config: &str, data_dir: &str, schema: &str) -> anyhow::Result<()> {
    let output = Path::new(config);
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    let scaffold = AggrConfig::scaffold(Path::new(data_dir), Path::new(schema));
    std::fs::write(output, scaffold.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}
