mod config;
mod frame;
mod scenario;

pub use config::{ConfigFileError, EmulatorConfig, Protocol};
pub use scenario::{Scenario, ScenarioError};

use crate::model::StopCondition;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no output configured")]
    MissingOutput,
    #[error("failed to open {endpoint}")]
    Open {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write protocol message")]
    Write(#[source] io::Error),
    #[error("failed to start input reader")]
    InputReader(#[source] io::Error),
}

/// Runs an emulation to completion.
#[allow(async_fn_in_trait)]
pub trait EmulationEngine {
    /// Consume `config` and run until its stop condition is met.
    async fn run(&mut self, config: EmulatorConfig) -> Result<(), EngineError>;
}

/// Default engine writing text protocol messages and answering hex requests.
#[derive(Debug, Default)]
pub struct Emulator {
    seed: Option<u64>,
}

impl Emulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a deterministic bit error pattern.
    #[cfg(test)]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl EmulationEngine for Emulator {
    async fn run(&mut self, config: EmulatorConfig) -> Result<(), EngineError> {
        let output = config.output().ok_or(EngineError::MissingOutput)?;
        let writer = output.open().map_err(|source| EngineError::Open {
            endpoint: output.to_string(),
            source,
        })?;

        let mut requests = None;
        if let Some(input) = config.input() {
            let reader = input.open().map_err(|source| EngineError::Open {
                endpoint: input.to_string(),
                source,
            })?;
            match reader {
                Some(reader) => {
                    requests = Some(spawn_input_reader(reader).map_err(EngineError::InputReader)?)
                }
                None => tracing::warn!(%input, "no input locator given, hex requests are not read"),
            }
        }

        tracing::info!(
            %output,
            timed = config.timed(),
            stop_condition = ?config.stop_condition(),
            delay = %humantime::format_duration(config.delay()),
            "emulation started"
        );

        let mut emulation = Emulation {
            writer,
            rng: match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
            bit_error_rate: config.bit_error_rate(),
            delay: config.delay(),
            stop: config.stop_condition(),
            requests,
            messages_sent: 0,
        };
        let timed = config.timed();
        let (text, hex): (Vec<_>, Vec<_>) = config
            .into_scenarios()
            .into_iter()
            .partition(|s| s.protocol() == Protocol::Text);

        let result = if timed {
            emulation.run_timed(text, hex).await
        } else {
            emulation.run_sequential(text, hex).await
        };
        tracing::info!(messages = emulation.messages_sent, "emulation stopped");
        result
    }
}

/// Read request lines on a dedicated thread; blocking reads on serial devices
/// cannot be cancelled, so the thread is detached.
fn spawn_input_reader(
    reader: Box<dyn BufRead + Send>,
) -> io::Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("vemulator-input".into())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "reading input failed");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// Sleeps longer than this are treated as never waking up.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Instant `period` from now, saturating far in the future.
fn deadline_after(period: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(period)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

fn all_exhausted(scenarios: &[Scenario]) -> bool {
    scenarios.iter().all(Scenario::is_exhausted)
}

fn lock_scenarios(scenarios: &Mutex<Vec<Scenario>>) -> std::sync::MutexGuard<'_, Vec<Scenario>> {
    scenarios.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Emulation {
    writer: Box<dyn Write + Send>,
    rng: StdRng,
    bit_error_rate: f64,
    delay: Duration,
    stop: StopCondition,
    requests: Option<mpsc::UnboundedReceiver<String>>,
    messages_sent: u64,
}

impl Emulation {
    /// Every text scenario advances once per message; hex scenarios advance per request.
    async fn run_sequential(
        &mut self,
        mut text: Vec<Scenario>,
        mut hex: Vec<Scenario>,
    ) -> Result<(), EngineError> {
        loop {
            if !text.is_empty() {
                let values: Vec<_> = text
                    .iter_mut()
                    .map(|s| (s.label().to_owned(), s.next_value().to_owned()))
                    .collect();
                self.send_text(&values)?;
            }
            if self.stop.is_met(all_exhausted(&text), all_exhausted(&hex)) {
                break;
            }

            let deadline = deadline_after(self.delay);
            while let Some(request) = self.next_request_until(deadline).await {
                self.answer(&request, &mut hex, true)?;
                if self.stop.is_met(all_exhausted(&text), all_exhausted(&hex)) {
                    return Ok(());
                }
            }
            if self.stop.is_met(all_exhausted(&text), all_exhausted(&hex)) {
                break;
            }
            if self.requests.is_none() && self.stop.waits_for_hex() && !all_exhausted(&hex) {
                tracing::warn!("no hex requests can arrive anymore, stopping before hex values are exhausted");
                break;
            }
        }
        Ok(())
    }

    /// Every scenario advances on its own interval; messages and responses report
    /// the latest values.
    async fn run_timed(&mut self, text: Vec<Scenario>, hex: Vec<Scenario>) -> Result<(), EngineError> {
        let text = Arc::new(Mutex::new(text));
        let hex = Arc::new(Mutex::new(hex));
        let mut tickers = spawn_tickers(&text);
        tickers.extend(spawn_tickers(&hex));

        let result = self.timed_loop(&text, &hex).await;

        // Dropping a JoinHandle does not cancel the task.
        for ticker in tickers {
            ticker.abort();
        }
        result
    }

    async fn timed_loop(
        &mut self,
        text: &Mutex<Vec<Scenario>>,
        hex: &Mutex<Vec<Scenario>>,
    ) -> Result<(), EngineError> {
        loop {
            let deadline = deadline_after(self.delay);
            let (values, text_done) = {
                let guard = lock_scenarios(text);
                let values: Vec<_> = guard
                    .iter()
                    .map(|s| (s.label().to_owned(), s.current().to_owned()))
                    .collect();
                (values, all_exhausted(&guard))
            };
            if !values.is_empty() {
                self.send_text(&values)?;
            }
            if self.stop.is_met(text_done, all_exhausted(&lock_scenarios(hex))) {
                break;
            }

            while let Some(request) = self.next_request_until(deadline).await {
                let hex_done = {
                    let mut guard = lock_scenarios(hex);
                    self.answer(&request, &mut guard, false)?;
                    all_exhausted(&guard)
                };
                if self.stop.is_met(all_exhausted(&lock_scenarios(text)), hex_done) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Wait for the next hex request, giving up at `deadline`.
    async fn next_request_until(&mut self, deadline: Instant) -> Option<String> {
        let request = match self.requests.as_mut() {
            Some(rx) => tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return None,
                request = rx.recv() => request,
            },
            None => {
                tokio::time::sleep_until(deadline).await;
                return None;
            }
        };
        if request.is_none() {
            tracing::info!("input closed");
            self.requests = None;
            tokio::time::sleep_until(deadline).await;
        }
        request
    }

    fn send_text(&mut self, values: &[(String, String)]) -> Result<(), EngineError> {
        let mut message = frame::text_message(values.iter().map(|(l, v)| (l.as_str(), v.as_str())));
        let flipped = frame::inject_bit_errors(&mut message, self.bit_error_rate, &mut self.rng);
        self.write(&message)?;
        self.messages_sent += 1;
        tracing::debug!(
            message = self.messages_sent,
            bytes = message.len(),
            flipped_bits = flipped,
            "text message sent"
        );
        Ok(())
    }

    fn answer(&mut self, request: &str, hex: &mut [Scenario], advance: bool) -> Result<(), EngineError> {
        let register = request.trim().trim_start_matches(':');
        if register.is_empty() {
            return Ok(());
        }
        let Some(scenario) = hex
            .iter_mut()
            .find(|s| s.label().eq_ignore_ascii_case(register))
        else {
            tracing::debug!(request, "ignoring request for unknown register");
            return Ok(());
        };

        let value = if advance {
            scenario.next_value().to_owned()
        } else {
            scenario.current().to_owned()
        };
        let response = frame::hex_response(scenario.label(), &value);
        self.write(response.as_bytes())?;
        tracing::debug!(register = scenario.label(), %value, "hex response sent");
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        self.writer
            .write_all(bytes)
            .and_then(|_| self.writer.flush())
            .map_err(EngineError::Write)
    }
}

fn spawn_tickers(scenarios: &Arc<Mutex<Vec<Scenario>>>) -> Vec<JoinHandle<()>> {
    let periods: Vec<Duration> = lock_scenarios(scenarios)
        .iter()
        .map(Scenario::interval)
        .collect();

    periods
        .into_iter()
        .enumerate()
        .map(|(idx, period)| {
            let scenarios = Arc::clone(scenarios);
            tokio::spawn(async move {
                let mut next_tick = Instant::now();
                loop {
                    tokio::time::sleep_until(next_tick).await;
                    next_tick = deadline_after(period);
                    let mut guard = lock_scenarios(&scenarios);
                    let scenario = &mut guard[idx];
                    scenario.next_value();
                    tracing::trace!(label = scenario.label(), value = scenario.current(), "value generated");
                    if scenario.is_exhausted() {
                        break;
                    }
                }
            })
        })
        .collect()
}
