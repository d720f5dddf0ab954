use std::sync::Arc;

use crate::data::preprocessor::Preprocessor;
use crate::domain::traits::ImageClassifier;
use crate::infra::telemetry::ServiceMetrics;

/// Everything a handler needs, built once at startup and shared by
/// every request through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub classifier:   Arc<dyn ImageClassifier>,
    pub preprocessor: Preprocessor,
    pub metrics:      Arc<ServiceMetrics>,
}

impl AppState {
    /// The preprocessor is sized from the classifier so the two can never disagree.
    pub fn new(classifier: Arc<dyn ImageClassifier>, metrics: Arc<ServiceMetrics>) -> Self {
        let preprocessor = Preprocessor::new(classifier.image_size());
        Self { classifier, preprocessor, metrics }
    }
}
