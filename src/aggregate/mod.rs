pub mod fanout;
pub mod predict;

pub use fanout::{CornerOutcome, DayLatest, Fanout, FanoutSummary, Job};
pub use predict::{Confidence, Prediction, PredictionRow, predict};
