// trimsaw-cli/src/logging.rs
//
// Logging setup. Console-only runs go through env_logger so RUST_LOG
// keeps working; runs with a log directory use fern to tee the same
// records into a timestamped per-run file.

use std::io;
use std::path::Path;

use log::LevelFilter;

use trimsaw_core::error::CoreResult;

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS",
/// used for per-run log file names.
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Maps `-v` counts onto log levels.
pub fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initializes the global logger. RUST_LOG overrides the verbosity-derived
/// level in the console-only configuration.
pub fn init(verbose: u8, log_dir: Option<&Path>) -> CoreResult<()> {
    let level = level_from_verbosity(verbose);
    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let log_path = dir.join(format!("trimsaw_trim_{}.log", get_timestamp()));
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} {:<5} {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        message
                    ))
                })
                .level(level)
                .chain(io::stderr())
                .chain(fern::log_file(&log_path)?)
                .apply()
                .map_err(io::Error::other)?;
            log::info!("logging to {}", log_path.display());
        }
        None => {
            env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or(level.as_str()),
            )
            .init();
        }
    }
    Ok(())
}
