use crate::infrastructure::{CliError, Result};
use cocommand_core::schema::wire_schemas;
use std::fs;
use std::path::{Path, PathBuf};

/// Write one `<name>.schema.json` file per wire type into `out_dir`
pub fn write_schemas(out_dir: &Path) -> Result<Vec<PathBuf>> {
    if out_dir.exists() && !out_dir.is_dir() {
        return Err(CliError::invalid_directory(out_dir.to_path_buf()));
    }
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::new();
    for (name, schema) in wire_schemas() {
        let json = serde_json::to_string_pretty(&schema)
            .map_err(|e| CliError::SchemaGeneration(format!("{}: {}", name, e)))?;

        let path = out_dir.join(format!("{}.schema.json", name));
        fs::write(&path, json)?;
        tracing::debug!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}
