//! Fakes shared by the enrichment and http tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
        mpsc::Sender,
    },
    thread::JoinHandle,
};

use rouille::{Request, Response};

use super::{
    EnrichmentQuery,
    provider::{MetadataProvider, ProviderError, ProviderResult},
};

pub(crate) fn found(cover_art_url: &str, sound_clip_url: &str) -> ProviderResult {
    ProviderResult::new(
        "stub",
        Some(cover_art_url.to_string()),
        Some(sound_clip_url.to_string()),
        Some(1),
    )
}

/// Provider answering every search the same way and counting calls.
///
/// Clones share the counters.
#[derive(Clone)]
pub(crate) struct StubProvider {
    answer: Result<Option<ProviderResult>, ProviderError>,
    queries: Arc<Mutex<Vec<EnrichmentQuery>>>,
    calls: Arc<AtomicUsize>,
}

impl StubProvider {
    fn with_answer(answer: Result<Option<ProviderResult>, ProviderError>) -> Self {
        Self {
            answer,
            queries: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn answering(result: ProviderResult) -> Self {
        Self::with_answer(Ok(Some(result)))
    }

    pub fn empty() -> Self {
        Self::with_answer(Ok(None))
    }

    pub fn failing(err: ProviderError) -> Self {
        Self::with_answer(Err(err))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<EnrichmentQuery> {
        self.queries.lock().unwrap().clone()
    }
}

impl MetadataProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn search(&self, query: &EnrichmentQuery) -> Result<Option<ProviderResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        self.answer.clone()
    }
}

/// Loopback HTTP server standing in for a provider API.
///
/// Stops when dropped.
pub(crate) struct StubServer {
    base_url: String,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StubServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Send + Sync + 'static + Fn(&Request) -> Response,
    {
        let server = rouille::Server::new("127.0.0.1:0", handler).expect("bind stub server");
        let base_url = format!("http://{}", server.server_addr());
        let (handle, stop) = server.stoppable();

        Self {
            base_url,
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Counts requests reaching a [`StubServer`] handler.
#[derive(Clone, Default)]
pub(crate) struct HitCounter(Arc<AtomicUsize>);

impl HitCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
