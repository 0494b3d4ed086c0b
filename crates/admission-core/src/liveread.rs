//! On cache miss, perform a direct read against the origin; on miss-again,
//! report not-found. Errors other than not-found propagate unchanged
//! (spec §4.2).

use std::sync::Arc;

use crate::error::PortError;
use crate::model::ObjectRef;
use crate::ports::LiveReadClient;

/// Wraps a [`LiveReadClient`] with the not-found-is-not-an-error contract
/// callers actually want: a transport error is a [`PortError`], but a
/// genuine absence is just `Ok(None)`.
#[derive(Clone)]
pub struct LiveReadFallback {
    client: Arc<dyn LiveReadClient>,
}

impl LiveReadFallback {
    pub fn new(client: Arc<dyn LiveReadClient>) -> Self {
        Self { client }
    }

    pub fn read(&self, reference: &ObjectRef) -> Result<Option<serde_json::Value>, PortError> {
        self.client.read(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysMiss;
    impl LiveReadClient for AlwaysMiss {
        fn read(&self, _reference: &ObjectRef) -> Result<Option<serde_json::Value>, PortError> {
            Ok(None)
        }
    }

    struct AlwaysError;
    impl LiveReadClient for AlwaysError {
        fn read(&self, reference: &ObjectRef) -> Result<Option<serde_json::Value>, PortError> {
            Err(PortError::Transport {
                reference: reference.to_string(),
                source: "boom".into(),
            })
        }
    }

    #[test]
    fn miss_is_ok_none() {
        let fallback = LiveReadFallback::new(Arc::new(AlwaysMiss));
        let reference = ObjectRef::namespaced("v1", "Secret", "ns", "name");
        assert!(fallback.read(&reference).unwrap().is_none());
    }

    #[test]
    fn transport_error_propagates() {
        let fallback = LiveReadFallback::new(Arc::new(AlwaysError));
        let reference = ObjectRef::namespaced("v1", "Secret", "ns", "name");
        assert!(fallback.read(&reference).is_err());
    }
}
