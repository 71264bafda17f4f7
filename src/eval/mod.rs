//! Replay harness for generated datasets.
//!
//! Records are sent one at a time to a [`Predictor`] (usually an
//! [`HttpPredictor`] pointed at the system under test), and the answers are
//! scored with [`compute_metrics`].

pub mod metrics;
pub mod predictor;
pub mod runner;

pub use metrics::{compute_metrics, render_markdown, EvalMetrics, DEFAULT_TOP_K};
pub use predictor::{prediction_from_json, HttpPredictor, Prediction, Predictor, DEFAULT_PREDICT_TIMEOUT};
pub use runner::{read_predictions, EvalRunner, PredictionRow};
