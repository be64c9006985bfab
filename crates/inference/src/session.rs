use crate::backend::InferenceBackend;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use storage::{ArtifactLocation, ArtifactSource, StoreError};
use thiserror::Error;

type Loader<B> = Box<dyn Fn(&Path) -> anyhow::Result<B> + Send + Sync>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to fetch model artifact: {0}")]
    Fetch(#[from] StoreError),

    #[error("Failed to load model: {0:#}")]
    Load(anyhow::Error),

    #[error("Session cache lock poisoned")]
    Poisoned,
}

/// Process-wide, lazily constructed model handle.
///
/// The first [`get_session`](Self::get_session) stages the artifact locally
/// (unless a file already sits at the staging path) and loads it; every later
/// call returns the same handle. Initialization is serialized, reads after it
/// are lock-free. Failures are not cached, but nothing retries on its own.
pub struct SessionCache<B: InferenceBackend> {
    source: Arc<dyn ArtifactSource>,
    location: ArtifactLocation,
    staging_path: PathBuf,
    loader: Loader<B>,
    handle: OnceLock<B>,
    init_lock: Mutex<()>,
}

impl<B: InferenceBackend + 'static> SessionCache<B> {
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        location: ArtifactLocation,
        staging_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            location,
            staging_path: staging_path.into(),
            loader: Box::new(|path| B::load_model(path)),
            handle: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Replaces the default [`InferenceBackend::load_model`] constructor,
    /// e.g. to pick an execution provider.
    pub fn with_loader<F>(mut self, loader: F) -> Self
    where
        F: Fn(&Path) -> anyhow::Result<B> + Send + Sync + 'static,
    {
        self.loader = Box::new(loader);
        self
    }
}

impl<B: InferenceBackend> SessionCache<B> {
    pub fn get_session(&self) -> Result<&B, SessionError> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle);
        }

        let _guard = self.init_lock.lock().map_err(|_| SessionError::Poisoned)?;

        // Another caller may have finished while we waited for the lock
        if let Some(handle) = self.handle.get() {
            return Ok(handle);
        }

        let path = self.stage()?;
        let backend = (self.loader)(&path).map_err(SessionError::Load)?;
        tracing::info!(path = %path.display(), "Model session ready");

        Ok(self.handle.get_or_init(|| backend))
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    fn stage(&self) -> Result<PathBuf, SessionError> {
        if self.staging_path.is_file() {
            tracing::info!(
                path = %self.staging_path.display(),
                "Using already staged model artifact"
            );
            return Ok(self.staging_path.clone());
        }

        tracing::info!(
            bucket = %self.location.bucket,
            key = %self.location.key,
            "Fetching model artifact"
        );
        Ok(self.source.fetch(&self.location, &self.staging_path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, MockModel};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use storage::{MemoryObjectStore, ObjectArtifactSource, ObjectStore};

    struct CountingSource {
        inner: ObjectArtifactSource,
        fetches: AtomicUsize,
    }

    impl ArtifactSource for CountingSource {
        fn fetch(&self, location: &ArtifactLocation, dest: &Path) -> Result<PathBuf, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(location, dest)
        }
    }

    fn counting_source(model: Option<&MockModel>) -> Arc<CountingSource> {
        let store = MemoryObjectStore::new();
        if let Some(model) = model {
            store.put("models", "model.json", &model.to_bytes()).unwrap();
        }
        Arc::new(CountingSource {
            inner: ObjectArtifactSource::new(Arc::new(store)),
            fetches: AtomicUsize::new(0),
        })
    }

    fn location() -> ArtifactLocation {
        ArtifactLocation::new("models", "model.json")
    }

    fn scores() -> MockModel {
        MockModel::Scores {
            scores: vec![0.1, 0.9],
        }
    }

    #[test]
    fn first_call_fetches_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let source = counting_source(Some(&scores()));
        let cache: SessionCache<MockBackend> =
            SessionCache::new(source.clone(), location(), dir.path().join("model.json"));

        assert!(!cache.is_loaded());
        cache.get_session().unwrap();
        assert!(cache.is_loaded());
        assert!(cache.staging_path().is_file());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn later_calls_reuse_the_handle() {
        let dir = tempfile::tempdir().unwrap();
        let source = counting_source(Some(&scores()));
        let cache: SessionCache<MockBackend> =
            SessionCache::new(source.clone(), location(), dir.path().join("model.json"));

        let first = cache.get_session().unwrap() as *const MockBackend;
        let second = cache.get_session().unwrap() as *const MockBackend;

        assert_eq!(first, second);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_touch_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = counting_source(Some(&scores()));
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let cache: SessionCache<MockBackend> =
            SessionCache::new(source.clone(), location(), dir.path().join("model.json"))
                .with_loader(move |path| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    MockBackend::load_model(path)
                });

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| cache.get_session().unwrap());
            }
        });

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pre_staged_artifact_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("model.json");
        std::fs::write(&staged, scores().to_bytes()).unwrap();

        // Source is empty: any fetch would fail
        let source = counting_source(None);
        let cache: SessionCache<MockBackend> =
            SessionCache::new(source.clone(), location(), &staged);

        cache.get_session().unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fetch_failure_is_reported_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let source = counting_source(None);
        let cache: SessionCache<MockBackend> =
            SessionCache::new(source.clone(), location(), dir.path().join("model.json"));

        let err = cache.get_session().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Fetch(StoreError::ObjectNotFound { .. })
        ));
        assert!(!cache.is_loaded());
        assert!(!cache.staging_path().exists());
    }

    #[test]
    fn load_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("model.json");
        std::fs::write(&staged, b"not a model").unwrap();

        let cache: SessionCache<MockBackend> =
            SessionCache::new(counting_source(None), location(), &staged);

        let err = cache.get_session().unwrap_err();
        assert!(matches!(err, SessionError::Load(_)));
        assert!(err.to_string().starts_with("Failed to load model"));
    }
}
