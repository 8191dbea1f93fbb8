use super::{Blob, BlobTransport, TransportError, WriteCondition};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    blobs: BTreeMap<String, (Vec<u8>, u64)>,
    generation: u64,
    failures: BTreeMap<String, TransportError>,
    puts: Vec<String>,
}

/// In-process blob store.
///
/// Every write bumps a generation counter that doubles as the version tag, so
/// conditional writes behave like a real container. Failures can be injected
/// per blob name.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a blob without recording it as a put.
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        state.generation += 1;
        let generation = state.generation;
        state.blobs.insert(name.into(), (bytes.into(), generation));
    }

    /// Makes every subsequent call touching `name` fail with `error`.
    pub fn fail_with(&self, name: impl Into<String>, error: TransportError) {
        self.lock().failures.insert(name.into(), error);
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self, name: &str) {
        self.lock().failures.remove(name);
    }

    /// Current contents of a blob.
    #[must_use]
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(name).map(|(bytes, _)| bytes.clone())
    }

    /// Names passed to successful puts, in order.
    #[must_use]
    pub fn puts(&self) -> Vec<String> {
        self.lock().puts.clone()
    }
}

impl BlobTransport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, name: &str) -> Result<Blob, TransportError> {
        let state = self.lock();
        if let Some(error) = state.failures.get(name) {
            return Err(error.clone());
        }
        state
            .blobs
            .get(name)
            .map(|(bytes, generation)| Blob::new(bytes.clone()).with_etag(generation.to_string()))
            .ok_or(TransportError::NotFound)
    }

    fn put(
        &self,
        name: &str,
        bytes: &[u8],
        condition: &WriteCondition,
    ) -> Result<Option<String>, TransportError> {
        let mut state = self.lock();
        if let Some(error) = state.failures.get(name) {
            return Err(error.clone());
        }

        let current = state.blobs.get(name).map(|(_, generation)| generation.to_string());
        match (condition, current) {
            (WriteCondition::IfAbsent, Some(_)) => return Err(TransportError::PreconditionFailed),
            (WriteCondition::IfMatch(expected), Some(actual)) if *expected != actual => {
                return Err(TransportError::PreconditionFailed);
            }
            (WriteCondition::IfMatch(_), None) => return Err(TransportError::PreconditionFailed),
            _ => {}
        }

        state.generation += 1;
        let generation = state.generation;
        state
            .blobs
            .insert(name.to_string(), (bytes.to_vec(), generation));
        state.puts.push(name.to_string());
        Ok(Some(generation.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_blob_is_not_found() {
        let transport = MemoryTransport::new();
        assert_eq!(transport.get("nope"), Err(TransportError::NotFound));
    }

    #[test]
    fn test_put_then_get() {
        let transport = MemoryTransport::new();
        let etag = transport.put("a", b"one", &WriteCondition::None).unwrap();
        let blob = transport.get("a").unwrap();
        assert_eq!(blob.bytes, b"one");
        assert_eq!(blob.etag, etag);
        assert_eq!(transport.puts(), vec!["a".to_string()]);
    }

    #[test]
    fn test_if_match_rejects_stale_tag() {
        let transport = MemoryTransport::new();
        let first = transport.put("a", b"one", &WriteCondition::None).unwrap().unwrap();
        transport.put("a", b"two", &WriteCondition::None).unwrap();
        assert_eq!(
            transport.put("a", b"three", &WriteCondition::IfMatch(first)),
            Err(TransportError::PreconditionFailed)
        );
        assert_eq!(transport.contents("a").unwrap(), b"two");
    }

    #[test]
    fn test_if_absent() {
        let transport = MemoryTransport::new();
        transport.put("a", b"one", &WriteCondition::IfAbsent).unwrap();
        assert_eq!(
            transport.put("a", b"two", &WriteCondition::IfAbsent),
            Err(TransportError::PreconditionFailed)
        );
    }

    #[test]
    fn test_injected_failure() {
        let transport = MemoryTransport::new();
        transport.insert("a", b"one".to_vec());
        transport.fail_with("a", TransportError::Unavailable("HTTP 403".to_string()));
        assert!(matches!(
            transport.get("a"),
            Err(TransportError::Unavailable(_))
        ));
        transport.clear_failure("a");
        assert!(transport.get("a").is_ok());
    }
}
