use crate::{
    backend::InferenceBackend,
    classify::{self, Prediction},
    error::{PipelineError, WorkerError},
    response::WorkerResponse,
    session::{SessionCache, SessionError},
    status::{StatusChange, StatusTracker, TransitionError},
    trigger::Trigger,
};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use preprocess::ImagePreprocessor;
use std::sync::Arc;
use std::time::Instant;
use storage::{ImageRecord, ImageStatus, ObjectStore, RecordStore, StoreError};

/// How an invocation that did not escalate ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Prediction),
    Failure(String),
    /// The record was already terminal; its stored outcome is reported again
    /// and nothing is written.
    Replayed(ImageRecord),
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Failure(_) => "failure",
            Outcome::Replayed(_) => "replayed",
        }
    }

    pub fn to_response(&self) -> WorkerResponse {
        match self {
            Outcome::Success(prediction) => WorkerResponse::success(prediction.class_index),
            Outcome::Failure(message) => WorkerResponse::failure(message.clone()),
            Outcome::Replayed(record) => match (record.status, record.result) {
                (ImageStatus::Success, Some(class_index)) => WorkerResponse::success(class_index),
                _ => WorkerResponse::failure(record.error_message.clone().unwrap_or_default()),
            },
        }
    }
}

struct WorkerMetrics {
    invocations: Counter<u64>,
    duration: Histogram<f64>,
}

impl WorkerMetrics {
    fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.5, 5.0,
        ];
        let duration = meter
            .f64_histogram("worker_invocation_duration_seconds")
            .with_description("Time to handle one trigger (fetch + preprocess + infer + persist)")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build();
        let invocations = meter
            .u64_counter("worker_invocations_total")
            .with_description("Triggers handled, by outcome")
            .build();

        Self {
            invocations,
            duration,
        }
    }

    fn record(&self, outcome: &'static str, elapsed: f64) {
        let attributes = [KeyValue::new("outcome", outcome)];
        self.invocations.add(1, &attributes);
        self.duration.record(elapsed, &attributes);
    }
}

/// The inference worker: one trigger in, one status transition sequence and a
/// structured response out.
///
/// Stateless across invocations apart from the cached model session, so a
/// single instance behind an `Arc` serves concurrent triggers.
pub struct Worker<B: InferenceBackend> {
    objects: Arc<dyn ObjectStore>,
    tracker: StatusTracker,
    sessions: SessionCache<B>,
    preprocessor: ImagePreprocessor,
    metrics: WorkerMetrics,
}

impl<B: InferenceBackend> Worker<B> {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        sessions: SessionCache<B>,
        preprocessor: ImagePreprocessor,
    ) -> Self {
        Self {
            objects,
            tracker: StatusTracker::new(records),
            sessions,
            preprocessor,
            metrics: WorkerMetrics::new("worker"),
        }
    }

    /// Loads the model session ahead of the first trigger.
    pub fn warm_up(&self) -> Result<(), SessionError> {
        self.sessions.get_session().map(|_| ())
    }

    pub fn is_ready(&self) -> bool {
        self.sessions.is_loaded()
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        self.tracker.records()
    }

    /// Entrypoint: parses `payload`, runs the pipeline and always produces a
    /// response. 500 only for a malformed trigger, an unavailable model or a
    /// failed status write.
    pub fn handle(&self, payload: &str) -> WorkerResponse {
        let start = Instant::now();

        let result = Trigger::parse(payload).and_then(|trigger| self.process(&trigger));

        let (label, response) = match result {
            Ok(outcome) => (outcome.label(), outcome.to_response()),
            Err(e) => {
                tracing::error!(error = %e, kind = e.kind(), "Invocation failed");
                (e.kind(), WorkerResponse::internal_error(e.to_string()))
            }
        };

        self.metrics.record(label, start.elapsed().as_secs_f64());
        response
    }

    /// Runs one trigger through the pipeline and drives its record's status.
    #[tracing::instrument(skip_all, fields(image_id = %trigger.image_id))]
    pub fn process(&self, trigger: &Trigger) -> Result<Outcome, WorkerError> {
        let image_id = trigger.image_id.as_str();

        // Model first: an unavailable model must not leave the record behind
        let session = self.sessions.get_session()?;

        match self.tracker.transition(image_id, StatusChange::InProgress) {
            Ok(_) => {}
            Err(TransitionError::Illegal { from, .. }) if from.is_terminal() => {
                let record = self
                    .records()
                    .get(image_id)
                    .map_err(TransitionError::from)?
                    .ok_or_else(|| StoreError::RecordNotFound(image_id.to_string()))
                    .map_err(TransitionError::from)?;
                tracing::info!(status = %record.status, "Record already terminal, replaying outcome");
                return Ok(Outcome::Replayed(record));
            }
            Err(e) => return Err(e.into()),
        }

        match self.run_pipeline(trigger, session) {
            Ok(prediction) => {
                self.tracker.transition(
                    image_id,
                    StatusChange::Success {
                        class_index: prediction.class_index,
                    },
                )?;
                tracing::info!(
                    class_index = prediction.class_index,
                    score = prediction.score,
                    "Image classified"
                );
                Ok(Outcome::Success(prediction))
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(error = %message, "Pipeline failed");
                self.tracker.transition(
                    image_id,
                    StatusChange::Failure {
                        message: message.clone(),
                    },
                )?;
                Ok(Outcome::Failure(message))
            }
        }
    }

    fn run_pipeline(&self, trigger: &Trigger, session: &B) -> Result<Prediction, PipelineError> {
        let raw = {
            let _s = tracing::info_span!("fetch_image").entered();
            self.objects
                .get(&trigger.bucket, &trigger.object_key)
                .map_err(PipelineError::Fetch)?
        };

        let tensor = self.preprocessor.preprocess(&raw)?;

        let _s = tracing::info_span!("model_inference").entered();
        classify::infer(session, &tensor).map_err(PipelineError::Inference)
    }
}
