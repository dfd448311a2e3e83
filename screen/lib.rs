#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod columns;
pub mod config;
pub mod data;
pub mod filter;
pub mod pairs;
pub mod pipeline;
pub mod progress;
pub mod rank;
pub mod ratio;
pub mod types;

pub use columns::compute_column_group_auc;
pub use pipeline::{DEFAULT_BATCH_SIZE, PairScreen, ScreenSummary, screen_paired_feature_auc};
pub use types::{GroupLabels, PairIndex, ResultRecord, ScreenError, ScreenTable};
