//! Implementation of the 'trim' subcommand.
//!
//! Builds the core configuration from the parsed arguments, opens the
//! filesystem-backed store and record, and hands the run to the pipeline.

use std::fs;

use log::debug;

use trimsaw_core::config::{CoreConfig, LengthUnit};
use trimsaw_core::error::{CoreError, CoreResult};
use trimsaw_core::pipeline::TrimPipeline;
use trimsaw_core::probe::FfprobeProber;
use trimsaw_core::store::{FsDestinationStore, FsSourceRecord};

use crate::cli::TrimArgs;
use crate::progress::TerminalProgress;
use crate::terminal;

pub fn run_trim(args: TrimArgs) -> CoreResult<()> {
    let input = args.input.canonicalize().map_err(|e| {
        CoreError::Store(format!(
            "invalid input path '{}': {e}",
            args.input.display()
        ))
    })?;
    fs::create_dir_all(&args.output)?;
    let config = build_config(&args)?;
    config.validate()?;

    terminal::print_section("Trim");
    terminal::print_status("Input", &input.display().to_string());
    terminal::print_status("Output", &args.output.display().to_string());
    terminal::print_status("Method", config.method.as_str());

    let mut record = FsSourceRecord::open(&input)?;
    let store = FsDestinationStore::new(&args.output);
    let prober = FfprobeProber::new(config.probe_auth_token.clone());
    let transcoder = config.method.build(&config);

    let mut progress = TerminalProgress::new();
    let outcome = TrimPipeline::new(&config, &mut record, &store, &prober, &*transcoder)
        .run(&mut progress);
    progress.finish();
    let outcome = outcome?;

    terminal::print_section("Result");
    terminal::print_status("Status", outcome.state.as_str());
    terminal::print_status(
        "Segments",
        &format!(
            "{} planned, {} reused, {} encoded",
            outcome.planned, outcome.reused, outcome.encoded
        ),
    );
    terminal::print_status("Uploaded", &outcome.uploaded.to_string());
    terminal::print_status("Report", &outcome.report_name);
    terminal::print_status("Destination", &outcome.destination_dir);
    if outcome.verified {
        terminal::print_success("every expected segment verified");
    } else {
        terminal::print_error("verification failed, see the error report");
    }
    Ok(())
}

fn build_config(args: &TrimArgs) -> CoreResult<CoreConfig> {
    let mut config = CoreConfig::new();
    config.segment_length = args.length;
    config.before_overlap = args.before_overlap;
    config.after_overlap = args.after_overlap;
    config.length_unit = if args.seconds {
        LengthUnit::Seconds
    } else {
        LengthUnit::Frames
    };
    config.method = args.method.parse()?;
    if let Some(converter) = &args.opencv_converter {
        config.opencv_converter = converter.clone();
    }
    config.output_extension = args.extension.clone();
    config.main_dir = args.main_dir.clone();
    if let Some(attempts) = args.retries {
        config.retry.max_attempts = attempts;
    }
    config.probe_auth_token = args.probe_token.clone();
    config.temp_dir = args.temp_dir.clone();
    debug!("configuration: {config:?}");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use trimsaw_core::transcode::ConversionMethod;

    fn base_args() -> TrimArgs {
        TrimArgs {
            input: PathBuf::from("movie.mp4"),
            output: PathBuf::from("out"),
            length: 300.0,
            seconds: false,
            before_overlap: 0.0,
            after_overlap: 0.0,
            method: "ffmpeg".to_string(),
            opencv_converter: None,
            extension: "webm".to_string(),
            main_dir: None,
            log_dir: None,
            temp_dir: None,
            retries: None,
            probe_token: None,
        }
    }

    #[test]
    fn defaults_map_onto_the_core_config() {
        let config = build_config(&base_args()).unwrap();
        assert_eq!(config.segment_length, 300.0);
        assert_eq!(config.length_unit, LengthUnit::Frames);
        assert_eq!(config.method, ConversionMethod::Ffmpeg);
        assert_eq!(config.output_extension, "webm");
        assert!(config.main_dir.is_none());
    }

    #[test]
    fn seconds_flag_switches_the_unit() {
        let mut args = base_args();
        args.seconds = true;
        args.length = 10.0;
        let config = build_config(&args).unwrap();
        assert_eq!(config.length_unit, LengthUnit::Seconds);
        assert_eq!(config.segment_length, 10.0);
    }

    #[test]
    fn retries_override_the_policy() {
        let mut args = base_args();
        args.retries = Some(5);
        let config = build_config(&args).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let mut args = base_args();
        args.method = "magick".to_string();
        let err = build_config(&args).unwrap_err();
        assert!(matches!(err, CoreError::Unsupported(_)));
    }
}
