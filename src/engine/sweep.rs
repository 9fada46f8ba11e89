use chrono::Local;
use std::time::Duration;

use super::session::{SupplySlot, SweepSession};
use super::state::SweepState;
use crate::config::{SweepConfig, SweepPlan};
use crate::core::{decode_trace, CurrentMapper, DriveCurrents, SParameter, SeriesAccumulator};
use crate::error::{Result, SweepError};
use crate::observability::Reporter;
use crate::storage::{DataSink, MeasurementMetadata, SeriesTarget};

/// Result of a completed sweep
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub steps: u32,
    pub series: [SeriesAccumulator; 4],
}

impl SweepOutcome {
    pub fn series(&self, param: SParameter) -> &SeriesAccumulator {
        &self.series[param.index()]
    }
}

/// Runs one field sweep on the instruments of a [`SweepSession`].
///
/// Whatever happens inside the step loop, every supply that was driven is set back to zero and the
/// instruments are released before [`run`](Self::run) returns.
pub struct SweepController {
    session: SweepSession,
    sink: Box<dyn DataSink>,
    mapper: CurrentMapper,
    reporter: Reporter,
    state: SweepState,
}

impl SweepController {
    pub fn new(session: SweepSession, sink: Box<dyn DataSink>, reporter: &Reporter) -> Self {
        Self {
            session,
            sink,
            mapper: CurrentMapper::default(),
            reporter: reporter.scoped("sweep"),
            state: SweepState::Idle,
        }
    }

    /// Replace the calibration constants
    pub fn with_mapper(mut self, mapper: CurrentMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn state(&self) -> &SweepState {
        &self.state
    }

    pub fn session(&self) -> &SweepSession {
        &self.session
    }

    /// Transition to a new state with validation
    fn transition_to(&mut self, new_state: SweepState) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(SweepError::InvalidTransition {
                from: self.state.name().to_string(),
                to: new_state.name().to_string(),
            });
        }
        self.reporter
            .debug(format_args!("State {} -> {}", self.state.name(), new_state.name()));
        self.state = new_state;
        Ok(())
    }

    /// Run the sweep described by `config`. A controller runs a single sweep.
    pub async fn run(&mut self, config: &SweepConfig) -> Result<SweepOutcome> {
        self.transition_to(SweepState::Configuring)?;
        self.reporter.info(format_args!(
            "Starting measurement {} for {}/{}",
            config.measurement_name, config.user_name, config.sample_name
        ));

        let mut series = SeriesAccumulator::for_all();
        let result = self.execute(config, &mut series).await;

        match result {
            Ok(steps) => match self.finalize().await {
                Ok(()) => {
                    self.transition_to(SweepState::Completed { steps })?;
                    self.reporter
                        .info(format_args!("Measurement complete after {} steps", steps));
                    Ok(SweepOutcome { steps, series })
                }
                Err(error) => {
                    self.reporter
                        .error(format_args!("Failed to zero currents after sweep: {}", error));
                    self.transition_to(SweepState::Aborting {
                        error_msg: error.to_string(),
                    })?;
                    self.transition_to(SweepState::Failed {
                        error_msg: error.to_string(),
                    })?;
                    Err(error)
                }
            },
            Err(error) => {
                self.reporter.error(format_args!("Measurement aborted: {}", error));
                self.transition_to(SweepState::Aborting {
                    error_msg: error.to_string(),
                })?;
                if let Err(finalize_error) = self.finalize().await {
                    self.reporter.error(format_args!(
                        "Zeroing currents after abort also failed: {}",
                        finalize_error
                    ));
                }
                self.transition_to(SweepState::Failed {
                    error_msg: error.to_string(),
                })?;
                Err(error)
            }
        }
    }

    async fn execute(
        &mut self,
        config: &SweepConfig,
        series: &mut [SeriesAccumulator; 4],
    ) -> Result<u32> {
        let plan = self.configure(config).await?;
        let metadata = MeasurementMetadata::new(config, &plan, Local::now());
        let targets = SParameter::ALL.map(|param| {
            SeriesTarget::new(
                &config.user_name,
                &config.sample_name,
                &config.measurement_name,
                param,
            )
        });
        let settling = config.timing.settling();
        let total = plan.steps.len();

        for step in &plan.steps {
            self.transition_to(SweepState::Stepping { index: step.index })?;

            let currents = self.mapper.map(step.field_mt, plan.angle_deg, plan.mode);
            self.reporter.info(format_args!(
                "Step {}/{}: field {} mT, currents {:?}",
                step.index + 1,
                total,
                step.field_mt,
                currents
            ));
            self.apply_currents(&currents).await?;
            self.settle(settling).await;

            let metrics = self.reporter.metrics().clone();
            let started = metrics.start_acquisition();
            let raw = self.session.analyzer_mut().acquire(plan.averages).await?;
            metrics.finish_acquisition(started);

            let traces = decode_trace(&raw)?;
            for (param, trace) in traces.iter() {
                series[param.index()].append(step.field_mt, &currents, trace);
            }

            self.persist(&targets, series, &metadata)?;
            metrics.record_step_completed();
        }

        Ok(total as u32)
    }

    /// Validate, check the supplies, configure the analyzer, optionally demagnetize
    async fn configure(&mut self, config: &SweepConfig) -> Result<SweepPlan> {
        let plan = config.validate()?;
        self.session.require(plan.mode)?;

        self.reporter.info(format_args!(
            "{} mode, {} field steps, {} averages",
            plan.mode,
            plan.steps.len(),
            plan.averages
        ));
        self.session
            .analyzer_mut()
            .apply_configuration(&config.vna)
            .await?;

        if config.demagnetize {
            for &slot in SupplySlot::required(plan.mode) {
                self.session.demagnetize(slot).await?;
            }
        }

        Ok(plan)
    }

    /// A rejected over-limit request leaves the previous current in place and the sweep goes on
    async fn apply_currents(&mut self, currents: &DriveCurrents) -> Result<()> {
        let targets = [
            (SupplySlot::Primary, Some(currents.primary)),
            (SupplySlot::Secondary, currents.secondary),
        ];

        for (slot, amps) in targets {
            let Some(amps) = amps else {
                continue;
            };
            match self.session.set_current(slot, amps).await {
                Ok(()) => {}
                Err(error) if !error.is_fatal() => {
                    self.reporter.warn(format_args!(
                        "{:?} supply kept its previous current: {}",
                        slot, error
                    ));
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    async fn settle(&self, settling: Duration) {
        if !settling.is_zero() {
            tokio::time::sleep(settling).await;
        }
    }

    /// Rewrite the full history of every parameter, each with its own metadata
    fn persist(
        &mut self,
        targets: &[SeriesTarget; 4],
        series: &[SeriesAccumulator; 4],
        metadata: &MeasurementMetadata,
    ) -> Result<()> {
        for (target, history) in targets.iter().zip(series.iter()) {
            self.sink.save_series(target, history)?;
            self.sink.save_metadata(&metadata.for_parameter(target.param))?;
            self.reporter.metrics().record_series_write();
        }

        self.reporter.info(format_args!(
            "Data saved: {} steps, {} rows per parameter",
            series[0].steps(),
            series[0].rows()
        ));
        Ok(())
    }

    /// Zero every driven supply, then release the instruments
    async fn finalize(&mut self) -> Result<()> {
        let zeroed = self.session.zero_energized().await;
        let closed = self.session.close().await;
        zeroed.and(closed)
    }
}
