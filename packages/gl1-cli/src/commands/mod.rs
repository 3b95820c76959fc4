pub mod describe;
pub mod replay;
pub mod synth;
pub mod validate;

use crate::cli::{PoolArgs, SourceArgs};
use gl1_rs::{FileListSource, Gl1TriggerInput, PoolConfig};

/// Resolve pool settings: config file first, then command-line overrides.
pub fn resolve_config(args: &PoolArgs) -> Result<PoolConfig, String> {
    let mut config = match args.config {
        Some(ref path) => PoolConfig::from_json_file(path)
            .map_err(|e| format!("Failed to load config '{}': {}", path.display(), e))?,
        None => PoolConfig::default(),
    };

    if let Some(ref name) = args.name {
        config.name = name.clone();
    }
    if let Some(verbosity) = args.verbosity {
        config.verbosity = verbosity;
    }
    if let Some(packet_id) = args.packet_id {
        config.packet_id = packet_id;
    }
    if let Some(min_keep) = args.min_keep {
        config.min_keep = min_keep;
    }
    if args.dump {
        config.dump_packets = true;
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Build an input over the segment files selected on the command line.
pub fn open_input(
    source: &SourceArgs,
    pool: &PoolArgs,
) -> Result<Gl1TriggerInput<FileListSource>, String> {
    let config = resolve_config(pool)?;
    let source =
        FileListSource::from_config(source.to_source_config()).map_err(|e| e.to_string())?;
    log::info!(
        "Pool '{}' over {} segment(s), min_keep {}",
        config.name,
        source.remaining_segments(),
        config.min_keep
    );
    Ok(Gl1TriggerInput::new(config, source))
}
