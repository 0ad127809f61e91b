//! Training drills for SwingLab.
//!
//! - A bundled starter catalog
//! - A repository seam with an in-memory store
//! - Search and correction-driven recommendations
//! - Aggregation of bat-sensor metrics and pairing with pose metrics

pub mod catalog;
pub mod error;
pub mod recommend;
pub mod repository;
pub mod sensor_metrics;
pub mod service;

pub use catalog::seed_drills;
pub use error::{DrillError, DrillResult};
pub use recommend::{analyze_metrics, score_drill, SwingMetricsInput};
pub use repository::{DrillQuery, DrillRepository, InMemoryDrillRepository};
pub use sensor_metrics::{
    aggregate_metrics, combine_metrics, extract_sensor_metrics, CombinedMetrics, MetricSummary,
    SensorMetrics,
};
pub use service::DrillService;
