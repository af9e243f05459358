use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use std::sync::Arc;

use tracing::level_filters::LevelFilter;
use tracing_flame::FlameLayer;
use tracing_subscriber::prelude::*;

/// Keeps the optional flame-profiling layer flushing; hold it for the life of
/// the program when profiling layout passes.
pub struct TraceGuard {
    _flame: Option<tracing_flame::FlushGuard<BufWriter<File>>>,
}

/// Install the crate's tracing subscriber: pretty INFO output on stdout, an
/// optional full-verbosity log file, and an optional folded-stack flame file
/// for profiling layout passes.
///
/// Opt-in; library consumers with their own subscriber should skip this.
pub fn init_tracing(log_file: Option<&Path>, flame_file: Option<&Path>) -> io::Result<TraceGuard> {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(LevelFilter::INFO);

    let debug_log = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(tracing_subscriber::fmt::layer().with_writer(Arc::new(file)))
        }
        None => None,
    };

    let (flame_log, flame_guard) = match flame_file {
        Some(path) => {
            let (layer, guard) = FlameLayer::with_file(path).map_err(io::Error::other)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .with(flame_log)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(TraceGuard {
        _flame: flame_guard,
    })
}
