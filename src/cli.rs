use crate::engine::Emulator;
use crate::logging::LOG_DIR_ENV;
use crate::model::{InputKind, LaunchOptions, OutputKind, StopCondition};
use crate::orchestrator;
use crate::session::Session;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "vemulator-cli",
    version,
    about = "Command line launcher for the VE.Direct protocol emulator"
)]
pub struct Cli {
    /// If set, logs are displayed on standard error as well as stored in log files.
    /// If not set, logs are only stored in log files
    #[arg(long, global = true)]
    pub verbose: bool,

    /// If set, logs include debug information
    #[arg(long, global = true)]
    pub debug: bool,

    /// Directory the log files are written to
    #[arg(long, global = true, env = LOG_DIR_ENV)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the emulator with the given parameters
    Emulate(EmulateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct EmulateArgs {
    /// The config file to be used by the emulator
    #[arg(long, value_parser = existing_readable_file)]
    pub config: PathBuf,

    /// The input path or serial port from which hex requests are read
    #[arg(long)]
    pub input: Option<String>,

    /// The type of input source provided
    #[arg(long, value_enum, default_value_t = InputKind::Serial)]
    pub input_type: InputKind,

    /// The output path or serial port to which the emulator output is written
    #[arg(long)]
    pub output: Option<String>,

    /// The type of output destination provided
    #[arg(long, value_enum, default_value_t = OutputKind::Serial)]
    pub output_type: OutputKind,

    /// The delay in seconds between text protocol messages
    #[arg(long, default_value_t = 1.0, value_parser = non_negative_seconds)]
    pub delay: f64,

    /// Determine when the emulation process terminates
    #[arg(long, value_enum, default_value_t = StopCondition::Text)]
    pub stop_condition: StopCondition,

    /// The bit error rate for text protocol messages, between 0.0 and 1.0
    #[arg(long, default_value_t = 0.0, value_parser = unit_interval)]
    pub bit_error_rate: f64,

    /// Generate scenario values on the intervals set in the config file, each
    /// scenario independently. Value order is then no longer deterministic
    #[arg(long)]
    pub timed: bool,
}

fn existing_readable_file(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if !path.is_file() {
        return Err(format!("file '{s}' does not exist"));
    }
    File::open(&path).map_err(|e| format!("file '{s}' is not readable: {e}"))?;
    Ok(path)
}

fn parse_float(s: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .map_err(|_| format!("'{s}' is not a valid floating point number"))
}

fn non_negative_seconds(s: &str) -> Result<f64, String> {
    let v = parse_float(s)?;
    Duration::try_from_secs_f64(v)
        .map_err(|_| format!("{s} is not a non-negative number of seconds"))?;
    Ok(v)
}

fn unit_interval(s: &str) -> Result<f64, String> {
    let v = parse_float(s)?;
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("{s} is not in the range 0.0 to 1.0"));
    }
    Ok(v)
}

/// Build `LaunchOptions` from `emulate` arguments.
pub fn build_launch_options(args: &EmulateArgs) -> LaunchOptions {
    LaunchOptions {
        config_path: args.config.clone(),
        input_locator: args.input.clone(),
        input_kind: args.input_type,
        output_locator: args.output.clone(),
        output_kind: args.output_type,
        message_delay: args.delay,
        stop_condition: args.stop_condition,
        bit_error_rate: args.bit_error_rate,
        timed: args.timed,
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let session = Session::initialize(module_path!(), args.verbose, args.debug, args.log_dir.clone());

    match &args.command {
        Command::Emulate(emulate) => {
            let options = build_launch_options(emulate);
            let mut engine = Emulator::new();
            if let Err(e) = orchestrator::launch(&session, options, &mut engine).await {
                let e = anyhow::Error::new(e);
                tracing::error!("emulation aborted: {e:#}");
                return Err(e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use proptest::prelude::*;

    fn parse(config: &tempfile::NamedTempFile, extra: &[&str]) -> Result<Cli, clap::Error> {
        let config = config.path().to_str().unwrap().to_string();
        let mut argv = vec!["vemulator-cli", "emulate", "--config", config.as_str()];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv)
    }

    fn emulate(cli: Cli) -> EmulateArgs {
        match cli.command {
            Command::Emulate(args) => args,
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = tempfile::NamedTempFile::new().unwrap();
        let cli = parse(&config, &[]).unwrap();
        assert!(!cli.verbose);
        assert!(!cli.debug);

        let opts = build_launch_options(&emulate(cli));
        assert_eq!(opts.config_path, config.path());
        assert_eq!(opts.input_kind, InputKind::Serial);
        assert_eq!(opts.output_kind, OutputKind::Serial);
        assert_eq!(opts.input_locator, None);
        assert_eq!(opts.output_locator, None);
        assert_eq!(opts.message_delay, 1.0);
        assert_eq!(opts.stop_condition, StopCondition::Text);
        assert_eq!(opts.bit_error_rate, 0.0);
        assert!(!opts.timed);
    }

    #[test]
    fn translates_every_option() {
        let config = tempfile::NamedTempFile::new().unwrap();
        let cli = parse(
            &config,
            &[
                "--input-type",
                "file",
                "--input",
                "in.txt",
                "--output-type",
                "standard",
                "--delay",
                "0.1",
                "--stop-condition",
                "text-hex",
                "--bit-error-rate",
                "0.04",
                "--timed",
            ],
        )
        .unwrap();

        let opts = build_launch_options(&emulate(cli));
        assert_eq!(opts.input_kind, InputKind::File);
        assert_eq!(opts.input_locator.as_deref(), Some("in.txt"));
        assert_eq!(opts.output_kind, OutputKind::Standard);
        assert_eq!(opts.message_delay, 0.1);
        assert_eq!(opts.stop_condition, StopCondition::TextHex);
        assert_eq!(opts.bit_error_rate, 0.04);
        assert!(opts.timed);
    }

    #[test]
    fn global_flags_are_accepted_on_either_side() {
        let config = tempfile::NamedTempFile::new().unwrap();
        let path = config.path().to_str().unwrap();

        let before = Cli::try_parse_from([
            "vemulator-cli", "--verbose", "--debug", "emulate", "--config", path,
        ])
        .unwrap();
        assert!(before.verbose && before.debug);

        let after =
            Cli::try_parse_from(["vemulator-cli", "emulate", "--config", path, "--verbose"]).unwrap();
        assert!(after.verbose && !after.debug);
    }

    #[test]
    fn config_is_required_and_must_exist() {
        let missing = Cli::try_parse_from(["vemulator-cli", "emulate"]).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::MissingRequiredArgument);

        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.yaml");
        let err = Cli::try_parse_from([
            "vemulator-cli",
            "emulate",
            "--config",
            absent.to_str().unwrap(),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);

        let err = Cli::try_parse_from([
            "vemulator-cli",
            "emulate",
            "--config",
            dir.path().to_str().unwrap(),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn unknown_choices_are_rejected() {
        let config = tempfile::NamedTempFile::new().unwrap();
        for extra in [
            ["--input-type", "standard"],
            ["--output-type", "socket"],
            ["--stop-condition", "never"],
        ] {
            let err = parse(&config, &extra).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidValue, "{extra:?}");
        }
    }

    #[test]
    fn negative_delay_is_rejected() {
        let config = tempfile::NamedTempFile::new().unwrap();
        let err = parse(&config, &["--delay=-1"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(parse(&config, &["--delay", "0"]).is_ok());
    }

    #[test]
    fn delay_beyond_duration_range_is_rejected() {
        let config = tempfile::NamedTempFile::new().unwrap();
        for delay in ["1e300", "inf", "NaN"] {
            let err = parse(&config, &["--delay", delay]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "{delay}");
        }
        let cli = parse(&config, &["--delay", "1e19"]).unwrap();
        assert_eq!(emulate(cli).delay, 1e19);
    }

    proptest! {
        #[test]
        fn bit_error_rate_inside_unit_interval_is_accepted(rate in 0.0f64..=1.0) {
            let config = tempfile::NamedTempFile::new().unwrap();
            let arg = format!("--bit-error-rate={rate}");
            let cli = parse(&config, &[arg.as_str()]).unwrap();
            prop_assert_eq!(emulate(cli).bit_error_rate, rate);
        }

        #[test]
        fn bit_error_rate_outside_unit_interval_is_rejected(
            rate in prop_oneof![-1.0e6f64..-1.0e-9, 1.000_001f64..1.0e6]
        ) {
            let config = tempfile::NamedTempFile::new().unwrap();
            let arg = format!("--bit-error-rate={rate}");
            let err = parse(&config, &[arg.as_str()]).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::ValueValidation);
        }
    }
}
