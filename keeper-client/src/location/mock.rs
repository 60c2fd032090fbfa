//! Mock location provider for testing.
//!
//! Allows queueing readings and failures, and counts requests for verification.

use super::{LocationError, LocationProvider, PositionOptions};
use async_trait::async_trait;
use keeper_types::Coordinate;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock location provider for testing.
///
/// Queued results are returned in order. Once the queue is empty the
/// standing reading (if any) is returned. Clones share state, so a test can
/// keep one clone and hand the other to the code under test.
#[derive(Debug, Default)]
pub struct MockLocation {
    inner: Arc<Mutex<MockLocationInner>>,
}

#[derive(Debug, Default)]
struct MockLocationInner {
    standing: Option<Coordinate>,
    queue: VecDeque<Result<Coordinate, LocationError>>,
    delay: Option<Duration>,
    requests: Vec<PositionOptions>,
}

impl MockLocation {
    /// Create a mock with no readings (every request fails as unavailable).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that always reports `coordinate`.
    pub fn fixed(coordinate: Coordinate) -> Self {
        let mock = Self::new();
        mock.set_standing(coordinate);
        mock
    }

    /// Reading returned whenever the queue is empty.
    pub fn set_standing(&self, coordinate: Coordinate) {
        let mut inner = self.inner.lock().unwrap();
        inner.standing = Some(coordinate);
    }

    /// Queue a reading for the next request.
    pub fn queue_reading(&self, coordinate: Coordinate) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.push_back(Ok(coordinate));
    }

    /// Cause the next request to fail with the given error.
    pub fn fail_next(&self, error: LocationError) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.push_back(Err(error));
    }

    /// Make every request take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.delay = Some(delay);
    }

    /// Number of requests made so far.
    pub fn request_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.requests.len()
    }

    /// Options passed to the most recent request.
    pub fn last_options(&self) -> Option<PositionOptions> {
        let inner = self.inner.lock().unwrap();
        inner.requests.last().copied()
    }
}

impl Clone for MockLocation {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl LocationProvider for MockLocation {
    async fn locate(&self, options: &PositionOptions) -> Result<Coordinate, LocationError> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(*options);
            inner.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        match inner.queue.pop_front() {
            Some(result) => result,
            None => inner
                .standing
                .ok_or_else(|| LocationError::PositionUnavailable("no reading queued".into())),
        }
    }
}
