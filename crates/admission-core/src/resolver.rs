//! For a given reference, returns found / not-found / forbidden-to-read
//! using the cache, the live-read fallback, and the authorizer (spec §4.5).

use std::sync::Arc;

use crate::cache::CacheIndex;
use crate::error::Forbid;
use crate::liveread::LiveReadFallback;
use crate::model::{ObjectRef, ProviderType, UserInfo};
use crate::ports::{AuthDecision, Authorizer, Verb};

/// The three-way outcome of resolving a reference, matching §4.5 literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Found(T),
    NotFound,
    Forbidden,
}

/// Resolves references through cache-first / live-read-fallback, then an
/// authorizer check, per §4.5. Generic over the cached value type `K` so
/// each sub-validator can resolve into its own concrete model type.
pub struct ReferenceResolver<K> {
    cache: Arc<dyn CacheIndex<K>>,
    live_read: Option<LiveReadFallback>,
    authorizer: Arc<dyn Authorizer>,
}

impl<K: Clone> ReferenceResolver<K> {
    pub fn new(cache: Arc<dyn CacheIndex<K>>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            cache,
            live_read: None,
            authorizer,
        }
    }

    pub fn with_live_read(mut self, live_read: LiveReadFallback) -> Self {
        self.live_read = Some(live_read);
        self
    }

    /// `resolve(ref, user) → {Found, NotFound, Forbidden}`.
    ///
    /// Looks up the cache first; on a miss, if a live-read fallback is
    /// configured, consults it. Then asks the authorizer whether the
    /// subject may read the reference; a deny overrides a cache/live-read
    /// hit with `Forbidden`.
    ///
    /// `decode`: since the live-read client returns untyped JSON, the
    /// caller supplies how to turn that JSON into `K` (or `None` if it
    /// doesn't decode, which is treated the same as not-found).
    pub fn resolve(
        &self,
        reference: &ObjectRef,
        user: &UserInfo,
        decode: impl FnOnce(serde_json::Value) -> Option<K>,
    ) -> Result<Resolution<K>, Forbid> {
        let found = match self.cache.get(&reference.namespace, &reference.name) {
            Some(value) => Some(value),
            None => match &self.live_read {
                Some(live_read) => live_read
                    .read(reference)?
                    .and_then(decode),
                None => None,
            },
        };

        let Some(value) = found else {
            return Ok(Resolution::NotFound);
        };

        match self.authorizer.authorize(user, Verb::Get, reference) {
            AuthDecision::Allow | AuthDecision::NoOpinion => Ok(Resolution::Found(value)),
            AuthDecision::Deny => Ok(Resolution::Forbidden),
        }
    }

    /// Same lookup as [`resolve`](Self::resolve) but skips the authorizer
    /// call entirely. Used where the caller has already established that
    /// the reference is unchanged from a prior, already-authorized Update
    /// (§4.7.1 check 4 / 7, §4.7.2 check 3): users need not re-prove read
    /// rights for references they didn't touch.
    pub fn resolve_existence(
        &self,
        reference: &ObjectRef,
        decode: impl FnOnce(serde_json::Value) -> Option<K>,
    ) -> Result<Option<K>, Forbid> {
        let found = match self.cache.get(&reference.namespace, &reference.name) {
            Some(value) => Some(value),
            None => match &self.live_read {
                Some(live_read) => live_read.read(reference)?.and_then(decode),
                None => None,
            },
        };
        Ok(found)
    }
}

/// `resolve-only-if-spec-changed`: skips resolution entirely when the
/// referenced field is unchanged between new and old, so users need not
/// re-prove read rights for references they didn't touch during Update.
pub fn resolve_only_if_changed<T: PartialEq>(new: &T, old: Option<&T>) -> bool {
    match old {
        Some(old) => new != old,
        None => true,
    }
}

/// An `Unmanaged` or null provider-type is treated as "no reference" and
/// skipped by the resolver (§4.5 edge case).
pub fn is_reference_present(provider_type: &ProviderType) -> bool {
    provider_type.is_managed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FakeIndex;

    struct AllowAll;
    impl Authorizer for AllowAll {
        fn authorize(&self, _user: &UserInfo, _verb: Verb, _reference: &ObjectRef) -> AuthDecision {
            AuthDecision::Allow
        }
    }

    struct DenyAll;
    impl Authorizer for DenyAll {
        fn authorize(&self, _user: &UserInfo, _verb: Verb, _reference: &ObjectRef) -> AuthDecision {
            AuthDecision::Deny
        }
    }

    #[test]
    fn cache_hit_with_allow_is_found() {
        let cache = Arc::new(FakeIndex::<i32>::new());
        cache.insert("ns", "name", 7);
        let resolver = ReferenceResolver::new(cache, Arc::new(AllowAll));
        let reference = ObjectRef::namespaced("v1", "Secret", "ns", "name");
        let result = resolver.resolve(&reference, &UserInfo::default(), |_| None).unwrap();
        assert_eq!(result, Resolution::Found(7));
    }

    #[test]
    fn cache_miss_with_no_live_read_is_not_found() {
        let cache = Arc::new(FakeIndex::<i32>::new());
        let resolver = ReferenceResolver::new(cache, Arc::new(AllowAll));
        let reference = ObjectRef::namespaced("v1", "Secret", "ns", "name");
        let result = resolver.resolve(&reference, &UserInfo::default(), |_| None).unwrap();
        assert_eq!(result, Resolution::NotFound);
    }

    #[test]
    fn deny_overrides_hit() {
        let cache = Arc::new(FakeIndex::<i32>::new());
        cache.insert("ns", "name", 7);
        let resolver = ReferenceResolver::new(cache, Arc::new(DenyAll));
        let reference = ObjectRef::namespaced("v1", "Secret", "ns", "name");
        let result = resolver.resolve(&reference, &UserInfo::default(), |_| None).unwrap();
        assert_eq!(result, Resolution::Forbidden);
    }

    #[test]
    fn unchanged_field_skips_resolution() {
        assert!(!resolve_only_if_changed(&"same".to_string(), Some(&"same".to_string())));
        assert!(resolve_only_if_changed(&"new".to_string(), Some(&"old".to_string())));
        assert!(resolve_only_if_changed(&"new".to_string(), None));
    }

    #[test]
    fn unmanaged_provider_type_is_not_present() {
        assert!(!is_reference_present(&ProviderType::Unmanaged));
        assert!(is_reference_present(&ProviderType::Named("aws".into())));
    }
}
