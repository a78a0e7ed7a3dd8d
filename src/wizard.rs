//! Model-training wizard as an explicit finite-state machine.
//!
//! ```text
//! SelectDataset(1) -> SelectAlgorithm(2) -> ConfigureParameters(3) -> ShowResults(4)
//! ```
//!
//! Forward moves are guarded by [`transition`]; the only way into
//! `ShowResults` is a successful training dispatch. Back moves never clear
//! entered data, restart clears everything.

use crate::config::{Algorithm, AnalysisConfig, Hyperparameters, ModelConfig, DEFAULT_TEST_SIZE};
use crate::dataset::Dataset;
use crate::dispatch::{AnalysisDispatcher, AnalysisTransport};
use crate::error::AnalysisError;
use crate::registry::AnalysisKind;
use crate::result::{AnalysisResult, TrainingResult};
use async_stream::stream;
use futures::stream::Stream;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WizardStep {
    SelectDataset = 1,
    SelectAlgorithm = 2,
    ConfigureParameters = 3,
    ShowResults = 4,
}

impl WizardStep {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::SelectDataset => "Select dataset",
            WizardStep::SelectAlgorithm => "Select algorithm",
            WizardStep::ConfigureParameters => "Configure parameters",
            WizardStep::ShowResults => "Results",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title(), self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardEvent {
    Next,
    Back,
    TrainingSucceeded,
    Restart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardError {
    /// Operation belongs to another step
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },
    /// Forward move attempted before a required selection was made
    MissingSelection(&'static str),
    /// Jump over an intermediate step
    SkipAhead { from: WizardStep, to: WizardStep },
    /// Event has no transition from the current step
    IllegalTransition { from: WizardStep, event: WizardEvent },
    UnknownColumn(String),
    TargetInFeatures(String),
    UnknownHyperparameter(String),
    InvalidHyperparameter { name: String, value: f64 },
    InvalidTestSize(f64),
    /// Training dispatch failed; the wizard stays where it was
    Training(AnalysisError),
}

impl fmt::Display for WizardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardError::WrongStep { expected, actual } => {
                write!(f, "Operation requires step {}, wizard is at {}", expected, actual)
            }
            WizardError::MissingSelection(what) => write!(f, "No {} selected", what),
            WizardError::SkipAhead { from, to } => {
                write!(f, "Cannot skip from {} to {}", from, to)
            }
            WizardError::IllegalTransition { from, event } => {
                write!(f, "No transition from {} on {:?}", from, event)
            }
            WizardError::UnknownColumn(column) => {
                write!(f, "Column '{}' is not in the selected dataset", column)
            }
            WizardError::TargetInFeatures(column) => {
                write!(f, "Target column '{}' cannot also be a feature", column)
            }
            WizardError::UnknownHyperparameter(name) => {
                write!(f, "Unknown hyperparameter '{}'", name)
            }
            WizardError::InvalidHyperparameter { name, value } => {
                write!(f, "Invalid value {} for hyperparameter '{}'", value, name)
            }
            WizardError::InvalidTestSize(value) => {
                write!(f, "Test size must lie strictly between 0 and 1, got {}", value)
            }
            WizardError::Training(error) => write!(f, "Training failed: {}", error),
        }
    }
}

impl std::error::Error for WizardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WizardError::Training(error) => Some(error),
            _ => None,
        }
    }
}

impl From<AnalysisError> for WizardError {
    fn from(error: AnalysisError) -> Self {
        WizardError::Training(error)
    }
}

/// Everything entered in the wizard so far.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSession {
    pub dataset: Option<Dataset>,
    pub target_column: Option<String>,
    /// Empty means "every other column"
    pub feature_columns: Vec<String>,
    pub algorithm: Option<Algorithm>,
    pub hyperparameters: Hyperparameters,
    pub test_size: f64,
    pub result: Option<TrainingResult>,
}

impl Default for TrainingSession {
    fn default() -> Self {
        TrainingSession {
            dataset: None,
            target_column: None,
            feature_columns: Vec::new(),
            algorithm: None,
            hyperparameters: Hyperparameters::new(),
            test_size: DEFAULT_TEST_SIZE,
            result: None,
        }
    }
}

impl TrainingSession {
    /// Builds the model config from the current selections.
    ///
    /// # Errors
    /// `MissingSelection` for the first of dataset, target or algorithm that
    /// has not been chosen.
    pub fn model_config(&self) -> Result<ModelConfig, WizardError> {
        if self.dataset.is_none() {
            return Err(WizardError::MissingSelection("dataset"));
        }
        let target_column = self
            .target_column
            .clone()
            .ok_or(WizardError::MissingSelection("target column"))?;
        let algorithm = self
            .algorithm
            .ok_or(WizardError::MissingSelection("algorithm"))?;

        Ok(ModelConfig {
            target_column,
            feature_columns: self.feature_columns.clone(),
            algorithm,
            test_size: self.test_size,
            hyperparameters: self.hyperparameters.clone(),
        })
    }
}

/// The transition table.
///
/// Returns the next step, or why the event is not allowed from `step`.
pub fn transition(
    step: WizardStep,
    event: WizardEvent,
    session: &TrainingSession,
) -> Result<WizardStep, WizardError> {
    use WizardEvent::*;
    use WizardStep::*;

    match (step, event) {
        (SelectDataset, Next) => {
            if session.dataset.is_none() {
                Err(WizardError::MissingSelection("dataset"))
            } else if session.target_column.is_none() {
                Err(WizardError::MissingSelection("target column"))
            } else {
                Ok(SelectAlgorithm)
            }
        }
        (SelectAlgorithm, Next) => match session.algorithm {
            Some(_) => Ok(ConfigureParameters),
            None => Err(WizardError::MissingSelection("algorithm")),
        },
        (ConfigureParameters, TrainingSucceeded) => match session.result {
            Some(_) => Ok(ShowResults),
            None => Err(WizardError::MissingSelection("training result")),
        },
        (SelectAlgorithm, Back) => Ok(SelectDataset),
        (ConfigureParameters, Back) => Ok(SelectAlgorithm),
        (_, Restart) => Ok(SelectDataset),
        (from, event) => Err(WizardError::IllegalTransition { from, event }),
    }
}

/// Drives a [`TrainingSession`] through the wizard steps.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingWizard {
    step: WizardStep,
    session: TrainingSession,
}

impl Default for TrainingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingWizard {
    pub fn new() -> Self {
        TrainingWizard {
            step: WizardStep::SelectDataset,
            session: TrainingSession::default(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn session(&self) -> &TrainingSession {
        &self.session
    }

    pub fn result(&self) -> Option<&TrainingResult> {
        self.session.result.as_ref()
    }

    /// Complete only at `ShowResults` with a result in hand.
    pub fn is_complete(&self) -> bool {
        self.step == WizardStep::ShowResults && self.session.result.is_some()
    }

    fn require_step(&self, expected: WizardStep) -> Result<(), WizardError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(WizardError::WrongStep {
                expected,
                actual: self.step,
            })
        }
    }

    fn apply(&mut self, event: WizardEvent) -> Result<WizardStep, WizardError> {
        let next = transition(self.step, event, &self.session)?;
        info!(from = self.step.number(), to = next.number(), ?event, "wizard transition");
        self.step = next;
        Ok(next)
    }

    /// Selects the dataset. Target and features are column names of the
    /// previous dataset, so a different dataset clears them.
    pub fn select_dataset(&mut self, dataset: Dataset) -> Result<(), WizardError> {
        self.require_step(WizardStep::SelectDataset)?;
        let changed = self
            .session
            .dataset
            .as_ref()
            .map_or(true, |current| current.id != dataset.id);
        if changed {
            self.session.target_column = None;
            self.session.feature_columns.clear();
        }
        self.session.dataset = Some(dataset);
        Ok(())
    }

    fn check_column(&self, column: &str) -> Result<(), WizardError> {
        let dataset = self
            .session
            .dataset
            .as_ref()
            .ok_or(WizardError::MissingSelection("dataset"))?;
        if dataset.has_column(column) {
            Ok(())
        } else {
            Err(WizardError::UnknownColumn(column.to_string()))
        }
    }

    /// Sets the target column and drops it from the feature list.
    pub fn set_target(&mut self, column: &str) -> Result<(), WizardError> {
        self.require_step(WizardStep::SelectDataset)?;
        self.check_column(column)?;
        self.session.feature_columns.retain(|feature| feature != column);
        self.session.target_column = Some(column.to_string());
        Ok(())
    }

    pub fn set_features(&mut self, columns: Vec<String>) -> Result<(), WizardError> {
        self.require_step(WizardStep::SelectDataset)?;
        for column in &columns {
            self.check_column(column)?;
            if self.session.target_column.as_deref() == Some(column.as_str()) {
                return Err(WizardError::TargetInFeatures(column.clone()));
            }
        }
        self.session.feature_columns = columns;
        Ok(())
    }

    /// Chooses the algorithm and seeds its default hyperparameters.
    ///
    /// Re-choosing the same algorithm keeps edited hyperparameters.
    pub fn choose_algorithm(&mut self, algorithm: Algorithm) -> Result<(), WizardError> {
        self.require_step(WizardStep::SelectAlgorithm)?;
        if self.session.algorithm != Some(algorithm) {
            self.session.hyperparameters = algorithm.default_hyperparameters();
            self.session.algorithm = Some(algorithm);
        }
        Ok(())
    }

    /// Overrides one of the chosen algorithm's hyperparameters.
    pub fn set_hyperparameter(&mut self, name: &str, value: f64) -> Result<(), WizardError> {
        self.require_step(WizardStep::ConfigureParameters)?;
        if !value.is_finite() || value < 0.0 {
            return Err(WizardError::InvalidHyperparameter {
                name: name.to_string(),
                value,
            });
        }
        match self.session.hyperparameters.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(WizardError::UnknownHyperparameter(name.to_string())),
        }
    }

    pub fn set_test_size(&mut self, test_size: f64) -> Result<(), WizardError> {
        self.require_step(WizardStep::ConfigureParameters)?;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(WizardError::InvalidTestSize(test_size));
        }
        self.session.test_size = test_size;
        Ok(())
    }

    /// Moves one step forward.
    ///
    /// From `ConfigureParameters` this always fails: only [`Self::train`]
    /// reaches the results.
    pub fn next(&mut self) -> Result<WizardStep, WizardError> {
        self.apply(WizardEvent::Next)
    }

    /// Moves one step back, keeping everything entered so far.
    pub fn back(&mut self) -> Result<WizardStep, WizardError> {
        self.apply(WizardEvent::Back)
    }

    /// Navigates to `target` by single steps.
    ///
    /// Backward targets are reached by repeated back moves; forward targets
    /// must be adjacent, so there is no way to skip a step.
    pub fn go_to(&mut self, target: WizardStep) -> Result<WizardStep, WizardError> {
        if target == self.step {
            return Ok(self.step);
        }
        if target < self.step {
            while self.step > target {
                self.back()?;
            }
            return Ok(self.step);
        }
        if target.number() - self.step.number() > 1 {
            return Err(WizardError::SkipAhead {
                from: self.step,
                to: target,
            });
        }
        self.next()
    }

    /// Discards the session, including any trained result, and returns to
    /// the first step.
    pub fn restart(&mut self) {
        info!(from = self.step.number(), "wizard restarted");
        self.step = WizardStep::SelectDataset;
        self.session = TrainingSession::default();
    }

    /// Dispatches the training request and moves to the results on success.
    ///
    /// # Errors
    /// `WrongStep` outside `ConfigureParameters`; `Training` when the
    /// dispatch fails, in which case step and session are left untouched.
    pub async fn train<T: AnalysisTransport>(
        &mut self,
        dispatcher: &AnalysisDispatcher<T>,
    ) -> Result<&TrainingResult, WizardError> {
        self.require_step(WizardStep::ConfigureParameters)?;
        let config = AnalysisConfig::MlModel(self.session.model_config()?);
        let dataset_id = match &self.session.dataset {
            Some(dataset) => dataset.id.clone(),
            None => return Err(WizardError::MissingSelection("dataset")),
        };

        let outcome = dispatcher
            .dispatch(AnalysisKind::MlModel, &config, &dataset_id)
            .await;
        let result = match outcome {
            Ok(AnalysisResult::MlModel(result)) => result,
            Ok(other) => {
                return Err(WizardError::Training(AnalysisError::server(format!(
                    "training returned a {} result",
                    other.kind()
                ))))
            }
            Err(error) => {
                warn!(%error, "training dispatch failed");
                return Err(WizardError::Training(error));
            }
        };

        self.session.result = Some(result);
        self.apply(WizardEvent::TrainingSucceeded)?;
        self.session
            .result
            .as_ref()
            .ok_or(WizardError::MissingSelection("training result"))
    }
}

/// Local, non-authoritative progress percentage shown while training runs.
///
/// Advances on a timer and never reaches 100 until the caller signals that
/// the dispatch has settled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedProgress {
    pub period: Duration,
    pub increment: u8,
    /// Highest value shown before settling
    pub cap: u8,
}

impl Default for SimulatedProgress {
    fn default() -> Self {
        SimulatedProgress {
            period: Duration::from_millis(500),
            increment: 5,
            cap: 95,
        }
    }
}

impl SimulatedProgress {
    pub fn new(period: Duration, increment: u8, cap: u8) -> Self {
        SimulatedProgress {
            period,
            increment,
            cap: cap.min(99),
        }
    }

    /// Yields 0, then increasing percentages up to `cap`, then 100 once
    /// `settled` turns true or its sender is dropped.
    pub fn stream(&self, mut settled: watch::Receiver<bool>) -> impl Stream<Item = u8> {
        let SimulatedProgress {
            period,
            increment,
            cap,
        } = *self;

        stream! {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            let mut percent = 0u8;
            yield percent;

            loop {
                if *settled.borrow() {
                    break;
                }
                let ticked = tokio::select! {
                    _ = ticker.tick() => true,
                    changed = settled.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        false
                    }
                };
                if !ticked {
                    continue;
                }
                let advanced = percent.saturating_add(increment).min(cap);
                if advanced != percent {
                    percent = advanced;
                    yield percent;
                }
            }
            yield 100;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::TransportResponse;
    use crate::testing::{other_dataset, survey_dataset};
    use futures::StreamExt;
    use serde_json::Value;

    struct FixedTransport(TransportResponse);

    impl AnalysisTransport for FixedTransport {
        async fn post_json(
            &self,
            _endpoint: &str,
            _body: &Value,
        ) -> Result<TransportResponse, AnalysisError> {
            Ok(self.0.clone())
        }
    }

    fn trained_response() -> TransportResponse {
        TransportResponse::ok(
            r#"{"metrics": {"accuracy": 0.9}, "feature_importance": [{"feature": "Consumption", "importance": 0.7}]}"#,
        )
    }

    fn wizard_at_parameters() -> TrainingWizard {
        let mut wizard = TrainingWizard::new();
        wizard.select_dataset(survey_dataset()).unwrap();
        wizard.set_target("poverty").unwrap();
        wizard.next().unwrap();
        wizard.choose_algorithm(Algorithm::RandomForest).unwrap();
        wizard.next().unwrap();
        wizard
    }

    #[test]
    fn test_starts_at_select_dataset() {
        let wizard = TrainingWizard::new();
        assert_eq!(wizard.step(), WizardStep::SelectDataset);
        assert_eq!(wizard.step().number(), 1);
        assert!(!wizard.is_complete());
    }

    #[test]
    fn test_next_requires_dataset_and_target() {
        let mut wizard = TrainingWizard::new();
        assert_eq!(wizard.next(), Err(WizardError::MissingSelection("dataset")));
        wizard.select_dataset(survey_dataset()).unwrap();
        assert_eq!(
            wizard.next(),
            Err(WizardError::MissingSelection("target column"))
        );
        wizard.set_target("poverty").unwrap();
        assert_eq!(wizard.next(), Ok(WizardStep::SelectAlgorithm));
    }

    #[test]
    fn test_cannot_skip_from_first_to_third_step() {
        let mut wizard = TrainingWizard::new();
        wizard.select_dataset(survey_dataset()).unwrap();
        wizard.set_target("poverty").unwrap();
        let err = wizard.go_to(WizardStep::ConfigureParameters).unwrap_err();
        assert!(matches!(err, WizardError::SkipAhead { .. }));
        assert_eq!(wizard.step(), WizardStep::SelectDataset);
    }

    #[test]
    fn test_next_from_parameters_needs_training() {
        let mut wizard = wizard_at_parameters();
        let err = wizard.next().unwrap_err();
        assert!(matches!(err, WizardError::IllegalTransition { .. }));
        assert_eq!(wizard.step(), WizardStep::ConfigureParameters);
    }

    #[test]
    fn test_back_keeps_entered_data() {
        let mut wizard = wizard_at_parameters();
        wizard.set_test_size(0.3).unwrap();
        assert_eq!(wizard.go_to(WizardStep::SelectDataset), Ok(WizardStep::SelectDataset));
        assert_eq!(wizard.session().target_column.as_deref(), Some("poverty"));
        assert_eq!(wizard.session().algorithm, Some(Algorithm::RandomForest));
        assert_eq!(wizard.session().test_size, 0.3);
    }

    #[test]
    fn test_back_from_first_step_is_illegal() {
        let mut wizard = TrainingWizard::new();
        assert!(matches!(
            wizard.back(),
            Err(WizardError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn test_changing_dataset_clears_column_choices() {
        let mut wizard = TrainingWizard::new();
        wizard.select_dataset(survey_dataset()).unwrap();
        wizard.set_target("poverty").unwrap();
        wizard
            .set_features(vec!["province".into(), "Consumption".into()])
            .unwrap();

        wizard.select_dataset(survey_dataset()).unwrap();
        assert_eq!(wizard.session().feature_columns.len(), 2);

        wizard.select_dataset(other_dataset()).unwrap();
        assert!(wizard.session().target_column.is_none());
        assert!(wizard.session().feature_columns.is_empty());
    }

    #[test]
    fn test_target_cannot_be_feature() {
        let mut wizard = TrainingWizard::new();
        wizard.select_dataset(survey_dataset()).unwrap();
        wizard.set_target("poverty").unwrap();
        assert_eq!(
            wizard.set_features(vec!["poverty".into()]),
            Err(WizardError::TargetInFeatures("poverty".into()))
        );
        assert_eq!(
            wizard.set_features(vec!["income".into()]),
            Err(WizardError::UnknownColumn("income".into()))
        );
    }

    #[test]
    fn test_algorithm_seeds_hyperparameters() {
        let mut wizard = wizard_at_parameters();
        assert_eq!(wizard.session().hyperparameters["n_estimators"], 100.0);
        wizard.set_hyperparameter("max_depth", 4.0).unwrap();
        assert_eq!(
            wizard.set_hyperparameter("learning_rate", 0.5),
            Err(WizardError::UnknownHyperparameter("learning_rate".into()))
        );

        wizard.back().unwrap();
        wizard.choose_algorithm(Algorithm::RandomForest).unwrap();
        assert_eq!(wizard.session().hyperparameters["max_depth"], 4.0);
        wizard.choose_algorithm(Algorithm::GradientBoosting).unwrap();
        assert_eq!(wizard.session().hyperparameters["learning_rate"], 0.1);
    }

    #[test]
    fn test_test_size_bounds() {
        let mut wizard = wizard_at_parameters();
        assert_eq!(wizard.set_test_size(0.0), Err(WizardError::InvalidTestSize(0.0)));
        assert_eq!(wizard.set_test_size(1.0), Err(WizardError::InvalidTestSize(1.0)));
        assert!(wizard.set_test_size(0.25).is_ok());
    }

    #[test]
    fn test_operations_are_bound_to_their_step() {
        let mut wizard = TrainingWizard::new();
        assert_eq!(
            wizard.choose_algorithm(Algorithm::DecisionTree),
            Err(WizardError::WrongStep {
                expected: WizardStep::SelectAlgorithm,
                actual: WizardStep::SelectDataset,
            })
        );
    }

    #[tokio::test]
    async fn test_successful_training_shows_results() {
        let dispatcher = AnalysisDispatcher::new(FixedTransport(trained_response()));
        let mut wizard = wizard_at_parameters();

        let result = wizard.train(&dispatcher).await.unwrap();
        assert_eq!(result.metrics["accuracy"], 0.9);
        assert_eq!(wizard.step(), WizardStep::ShowResults);
        assert!(wizard.is_complete());
    }

    #[tokio::test]
    async fn test_failed_training_leaves_state_untouched() {
        let dispatcher = AnalysisDispatcher::new(FixedTransport(TransportResponse::new(
            500,
            r#"{"error": "target has a single class"}"#,
        )));
        let mut wizard = wizard_at_parameters();
        let before = wizard.clone();

        let err = wizard.train(&dispatcher).await.unwrap_err();
        assert!(matches!(err, WizardError::Training(_)));
        assert_eq!(wizard, before);
    }

    #[tokio::test]
    async fn test_restart_discards_result() {
        let dispatcher = AnalysisDispatcher::new(FixedTransport(trained_response()));
        let mut wizard = wizard_at_parameters();
        wizard.train(&dispatcher).await.unwrap();

        wizard.restart();
        assert_eq!(wizard.step(), WizardStep::SelectDataset);
        assert_eq!(wizard.session(), &TrainingSession::default());
        assert!(wizard.result().is_none());
    }

    #[tokio::test]
    async fn test_progress_caps_until_settled() {
        let (settled, receiver) = watch::channel(false);
        let progress = SimulatedProgress::new(Duration::from_millis(1), 40, 95);
        let mut stream = Box::pin(progress.stream(receiver));

        assert_eq!(stream.next().await, Some(0));
        assert_eq!(stream.next().await, Some(40));
        assert_eq!(stream.next().await, Some(80));
        assert_eq!(stream.next().await, Some(95));

        settled.send(true).unwrap();
        assert_eq!(stream.next().await, Some(100));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_progress_completes_when_sender_dropped() {
        let (settled, receiver) = watch::channel(false);
        let progress = SimulatedProgress::new(Duration::from_secs(60), 5, 95);
        let mut stream = Box::pin(progress.stream(receiver));

        assert_eq!(stream.next().await, Some(0));
        drop(settled);
        assert_eq!(stream.next().await, Some(100));
    }
}
