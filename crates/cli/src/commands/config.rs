//! `config init`: write a starter configuration file

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::args::{ConfigArgs, ConfigCommands};
use crate::config::AppConfig;

pub fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => {
            write_example(&path, force)?;
            eprintln!(
                "Wrote {}; set source.base_url to your proxy, then run 'luckydraw draw --bvid <id>'",
                path.display()
            );
            Ok(())
        }
    }
}

/// Write the example config to `path`. Without `force` an existing file is
/// an error, checked atomically at open time.
fn write_example(path: &Path, force: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(path).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => anyhow::anyhow!(
            "Config file already exists: {} (pass --force to overwrite)",
            path.display()
        ),
        _ => anyhow::Error::new(e).context(format!("Failed to open {}", path.display())),
    })?;

    file.write_all(AppConfig::example_toml().as_bytes())
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}
