use crate::engine::{ConfigFileError, EmulationEngine, EmulatorConfig, EngineError, ScenarioError};
use crate::model::{InputKind, LaunchOptions, OutputKind};
use crate::session::Session;
use crate::transport::{Input, Output, DEFAULT_OUTPUT_FILE};
use std::time::Duration;
use thiserror::Error;

const BANNER: &str = r"
 __   _____ __  __ _   _ _      _ _____ ___  ___
 \ \ / / __|  \/  | | | | |    /_\_   _/ _ \| _ \
  \ V /| _|| |\/| | |_| | |__ / _ \| || (_) |   /
   \_/ |___|_|  |_|\___/|____/_/ \_\_| \___/|_|_\
";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(
        "No serial port provided. Provide a serial port using the `--output` argument or use a \
         different output type using `--output-type`. Run `vemulator-cli emulate --help` for \
         more information."
    )]
    MissingSerialOutput,
    #[error(transparent)]
    Config(#[from] ConfigFileError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("{0} is not a valid message delay in seconds")]
    InvalidDelay(f64),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub fn resolve_input(kind: InputKind, locator: Option<String>) -> Input {
    match kind {
        InputKind::Serial => Input::Serial(locator),
        InputKind::File => Input::File(locator),
    }
}

/// A serial port has no sensible default, unlike files and standard output.
pub fn resolve_output(kind: OutputKind, locator: Option<String>) -> Result<Output, LaunchError> {
    match (kind, locator) {
        (OutputKind::Serial, None) => Err(LaunchError::MissingSerialOutput),
        (OutputKind::Serial, Some(port)) => Ok(Output::Serial(port)),
        (OutputKind::File, path) => Ok(Output::File(
            path.unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string()),
        )),
        (OutputKind::Standard, _) => Ok(Output::Standard),
    }
}

/// Build the emulator configuration from `options` and run `engine` to completion.
pub async fn launch<E: EmulationEngine>(
    session: &Session,
    options: LaunchOptions,
    engine: &mut E,
) -> Result<(), LaunchError> {
    tracing::info!("{BANNER}");
    tracing::info!("Started");
    tracing::debug!(
        logger = session.logger().target(),
        log_file = ?session.logger().log_file(),
        verbose = session.verbose(),
        debug = session.debug(),
        "session"
    );

    let mut config = EmulatorConfig::new();
    tracing::info!("Parsing config");
    config.set_config_file(&options.config_path)?;

    config.set_input(resolve_input(options.input_kind, options.input_locator));
    config.set_output(resolve_output(options.output_kind, options.output_locator)?);

    let delay = Duration::try_from_secs_f64(options.message_delay)
        .map_err(|_| LaunchError::InvalidDelay(options.message_delay))?;
    config.set_delay(delay);
    config.set_stop_condition(options.stop_condition);
    config.set_bit_error_rate(options.bit_error_rate);
    config.set_timed(options.timed);

    if tracing::enabled!(tracing::Level::DEBUG) {
        match serde_json::to_string(&config.fields()) {
            Ok(fields) => tracing::debug!("Config parsed, fields: {fields}"),
            Err(e) => tracing::debug!(error = %e, "Config parsed, fields not serializable"),
        }
    }

    tracing::info!("Creating scenarios");
    config.create_scenarios()?;
    tracing::info!(count = config.scenarios().len(), "Scenarios created");

    tracing::info!("Emulation phase");
    engine.run(config).await?;
    tracing::info!("Finished");
    Ok(())
}
