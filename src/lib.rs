pub mod dataset;
pub mod registry;
pub mod config;
pub mod builder;
pub mod error;
pub mod result;
pub mod dispatch;
pub mod transform;
pub mod render;
pub mod wizard;
pub mod export;
pub mod history;

#[cfg(test)]
mod testing;

pub use dataset::{CleanedSummary, Column, ColumnType, Dataset, DatasetId, DatasetIdError, DatasetSummary};
pub use registry::{
    AnalysisKind, AnalysisTypeRegistry, ConfigSchema, FieldKind, FieldSpec, KindDefinition, ResultShape,
};
pub use config::{
    Aggregation, Algorithm, AnalysisConfig, ComparisonConfig, CrosstabConfig, FieldValue,
    GroupedStatsConfig, Hyperparameters, ModelConfig, Normalize, TopNConfig, DEFAULT_TEST_SIZE,
};
pub use builder::ConfigurationBuilder;
pub use error::{AnalysisError, ConfigError, ErrorKind, RegistryError};
pub use result::{
    AnalysisResult, CategoryMean, ChartDatum, ChartValue, ComparisonResult, CrosstabResult,
    FeatureImportance, GroupStat, GroupedStatsResult, LabelValue, TopNResult, TrainingResult,
};
pub use dispatch::{
    AnalysisDispatcher, AnalysisRequest, AnalysisTransport, BatchEntry, BatchOutcome, DispatchToken,
    HttpTransport, ServiceConfig, SessionGuard, TransportResponse,
};
pub use transform::{to_chart_data, TransformError};
pub use render::{render, render_outcome, VisualizationSpec};
pub use wizard::{SimulatedProgress, TrainingSession, TrainingWizard, WizardError, WizardEvent, WizardStep};
pub use export::{ExportEncoder, ExportError, ExportFile, ExportFormat};
pub use history::{HistoryCache, HistoryEntry, HistoryError, HistoryFilter, HistoryStore, SqliteHistoryStore};
