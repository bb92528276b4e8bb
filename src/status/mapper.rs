//! Domain error to status code translation.
//!
//! # Responsibilities
//! - Hold an ordered set of rules: error identity -> status code
//! - Translate any error into a `Status`, falling back to a default code
//!
//! # Design Decisions
//! - An identity matches when any error in the `source()` chain is equal to a
//!   registered sentinel value, or is of a registered type
//! - Rules are scanned from most recently registered to oldest; re-registering
//!   an identity moves it to the front
//! - `RwLock`: concurrent `map` calls share the read side, `with` takes the
//!   write side

use std::any::{Any, TypeId};
use std::error::Error as StdError;
use std::sync::{PoisonError, RwLock};

use crate::context::ContextError;
use crate::status::{Code, Status};

type Probe = fn(&(dyn StdError + 'static), Option<&(dyn Any + Send + Sync)>) -> bool;
type SentinelEq = fn(&(dyn Any + Send + Sync), &(dyn Any + Send + Sync)) -> bool;

/// Something an error can "be": either a specific sentinel value or any value
/// of a given error type.
pub struct Identity {
    type_id: TypeId,
    type_name: &'static str,
    sentinel: Option<Box<dyn Any + Send + Sync>>,
    probe: Probe,
    same: SentinelEq,
}

impl Identity {
    /// Matches errors equal to `sentinel`.
    pub fn value<E>(sentinel: E) -> Self
    where
        E: StdError + PartialEq + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            sentinel: Some(Box::new(sentinel)),
            probe: probe_value::<E>,
            same: same_value::<E>,
        }
    }

    /// Matches every error of type `E`.
    pub fn of<E: StdError + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            sentinel: None,
            probe: probe_type::<E>,
            same: |_, _| false,
        }
    }

    /// True when `err` or anything it wraps matches this identity.
    pub fn matches(&self, err: &(dyn StdError + 'static)) -> bool {
        std::iter::successors(Some(err), |e| (*e).source())
            .any(|e| (self.probe)(e, self.sentinel.as_deref()))
    }

    fn same_key(&self, other: &Identity) -> bool {
        if self.type_id != other.type_id {
            return false;
        }
        match (self.sentinel.as_deref(), other.sentinel.as_deref()) {
            (None, None) => true,
            (Some(a), Some(b)) => (self.same)(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("type", &self.type_name)
            .field("sentinel", &self.sentinel.is_some())
            .finish()
    }
}

impl<E> From<E> for Identity
where
    E: StdError + PartialEq + Send + Sync + 'static,
{
    fn from(sentinel: E) -> Self {
        Identity::value(sentinel)
    }
}

fn probe_value<E: StdError + PartialEq + 'static>(
    err: &(dyn StdError + 'static),
    sentinel: Option<&(dyn Any + Send + Sync)>,
) -> bool {
    match (err.downcast_ref::<E>(), sentinel.and_then(|s| s.downcast_ref::<E>())) {
        (Some(e), Some(s)) => e == s,
        _ => false,
    }
}

fn probe_type<E: StdError + 'static>(
    err: &(dyn StdError + 'static),
    _: Option<&(dyn Any + Send + Sync)>,
) -> bool {
    err.is::<E>()
}

fn same_value<E: PartialEq + 'static>(
    a: &(dyn Any + Send + Sync),
    b: &(dyn Any + Send + Sync),
) -> bool {
    match (a.downcast_ref::<E>(), b.downcast_ref::<E>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Maps errors to `Status` values.
///
/// Safe to share across tasks; typically built once at startup and wrapped in
/// an `Arc`.
#[derive(Debug)]
pub struct ErrorMapper {
    rules: RwLock<Vec<(Identity, Code)>>,
    default_code: Code,
}

impl ErrorMapper {
    /// Create an empty mapper. `default_code` is used when no rule matches.
    pub fn new(default_code: Code) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            default_code,
        }
    }

    /// Same as [`ErrorMapper::new`] with cancellation and deadline rules
    /// already registered:
    ///
    /// - `ContextError::Cancelled` to `Code::Cancelled`
    /// - `ContextError::DeadlineExceeded` and `tokio::time::error::Elapsed` to
    ///   `Code::DeadlineExceeded`
    pub fn base(default_code: Code) -> Self {
        let mapper = Self::new(default_code);
        mapper
            .with(Code::Cancelled, [ContextError::Cancelled])
            .with(
                Code::DeadlineExceeded,
                [
                    Identity::value(ContextError::DeadlineExceeded),
                    Identity::of::<tokio::time::error::Elapsed>(),
                ],
            );
        mapper
    }

    pub fn default_code(&self) -> Code {
        self.default_code
    }

    /// Register `identities` to `code`. An identity registered before is
    /// overwritten and becomes the most recent rule.
    pub fn with<I>(&self, code: Code, identities: I) -> &Self
    where
        I: IntoIterator,
        I::Item: Into<Identity>,
    {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        for identity in identities {
            let identity = identity.into();
            rules.retain(|(existing, _)| !existing.same_key(&identity));
            rules.push((identity, code));
        }
        self
    }

    /// Translate `err` into a status. `None` maps to `None`.
    pub fn map(&self, err: Option<&(dyn StdError + 'static)>) -> Option<Status> {
        err.map(|e| self.map_err(e))
    }

    /// Translate a present error into a status carrying the error's message.
    pub fn map_err(&self, err: &(dyn StdError + 'static)) -> Status {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let code = rules
            .iter()
            .rev()
            .find(|(identity, _)| identity.matches(err))
            .map(|(_, code)| *code)
            .unwrap_or(self.default_code);

        Status::new(code, err.to_string())
    }

    /// Map the error side of `result`, leaving values untouched.
    pub fn map_result<T, E>(&self, result: Result<T, E>) -> Result<T, Status>
    where
        E: StdError + 'static,
    {
        result.map_err(|e| self.map_err(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Error)]
    enum Dummy {
        #[error("dummy one")]
        One,
        #[error("dummy two")]
        Two,
        #[error("dummy three")]
        Three,
        #[error("dummy four")]
        Four,
    }

    #[derive(Debug, Error)]
    #[error("loading user: {source}")]
    struct Wrapped {
        #[source]
        source: Dummy,
    }

    #[derive(Debug, Error)]
    #[error("unrelated")]
    struct Unrelated;

    #[test]
    fn test_registered_codes() {
        let em = ErrorMapper::new(Code::Unknown);
        em.with(Code::Cancelled, [ContextError::Cancelled])
            .with(Code::DeadlineExceeded, [ContextError::DeadlineExceeded])
            .with(Code::InvalidArgument, [Dummy::One])
            .with(Code::PermissionDenied, [Dummy::Two])
            .with(Code::NotFound, [Dummy::Three, Dummy::Four]);

        assert_eq!(em.map_err(&ContextError::Cancelled).code(), Code::Cancelled);
        assert_eq!(em.map_err(&ContextError::DeadlineExceeded).code(), Code::DeadlineExceeded);
        assert_eq!(em.map_err(&Dummy::One).code(), Code::InvalidArgument);
        assert_eq!(em.map_err(&Dummy::Two).code(), Code::PermissionDenied);
        assert_eq!(em.map_err(&Dummy::Three).code(), Code::NotFound);
        assert_eq!(em.map_err(&Dummy::Four).code(), Code::NotFound);
    }

    #[test]
    fn test_base_mapper() {
        let em = ErrorMapper::base(Code::Unknown);

        assert_eq!(em.map_err(&ContextError::Cancelled).code(), Code::Cancelled);
        assert_eq!(em.map_err(&ContextError::DeadlineExceeded).code(), Code::DeadlineExceeded);
        assert_eq!(em.map_err(&Dummy::One).code(), Code::Unknown);
    }

    #[test]
    fn test_map_none() {
        let em = ErrorMapper::new(Code::Internal);
        assert!(em.map(None).is_none());
    }

    #[test]
    fn test_wrapped_error_keeps_message() {
        let em = ErrorMapper::new(Code::Unknown);
        em.with(Code::NotFound, [Dummy::Three]);

        let err = Wrapped { source: Dummy::Three };
        let st = em.map(Some(&err)).unwrap();
        assert_eq!(st.code(), Code::NotFound);
        assert_eq!(st.message(), "loading user: dummy three");
    }

    #[test]
    fn test_map_result() {
        let em = ErrorMapper::new(Code::Internal);
        em.with(Code::InvalidArgument, [Dummy::One]);

        assert_eq!(em.map_result(Ok::<u32, Dummy>(3)), Ok(3));

        let st = em.map_result(Err::<u32, _>(Dummy::One)).unwrap_err();
        assert_eq!(st.code(), Code::InvalidArgument);
        assert_eq!(st.message(), "dummy one");

        let st = em.map_result(Err::<u32, _>(Wrapped { source: Dummy::Two })).unwrap_err();
        assert_eq!(st.code(), Code::Internal);
    }

    #[test]
    fn test_type_identity() {
        let em = ErrorMapper::new(Code::Unknown);
        em.with(Code::FailedPrecondition, [Identity::of::<Dummy>()]);

        assert_eq!(em.map_err(&Dummy::Two).code(), Code::FailedPrecondition);
        assert_eq!(em.map_err(&Wrapped { source: Dummy::One }).code(), Code::FailedPrecondition);
        assert_eq!(em.map_err(&Unrelated).code(), Code::Unknown);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let em = ErrorMapper::new(Code::Unknown);
        em.with(Code::InvalidArgument, [Dummy::One]);
        em.with(Code::AlreadyExists, [Dummy::One]);

        assert_eq!(em.map_err(&Dummy::One).code(), Code::AlreadyExists);
    }

    #[test]
    fn test_most_recent_rule_wins() {
        let em = ErrorMapper::new(Code::Unknown);
        em.with(Code::InvalidArgument, [Identity::of::<Dummy>()]);
        em.with(Code::NotFound, [Dummy::Three]);

        let err = Wrapped { source: Dummy::Three };
        assert_eq!(em.map_err(&err).code(), Code::NotFound);

        // re-registering the type rule moves it ahead again
        em.with(Code::Aborted, [Identity::of::<Dummy>()]);
        assert_eq!(em.map_err(&err).code(), Code::Aborted);
    }

    #[test]
    fn test_concurrent_map_and_with() {
        let em = Arc::new(ErrorMapper::base(Code::Unknown));
        let mut handles = Vec::new();

        for i in 0..8 {
            let em = em.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    if i % 2 == 0 {
                        em.with(Code::NotFound, [Dummy::Three]);
                    } else {
                        let code = em.map_err(&ContextError::Cancelled).code();
                        assert_eq!(code, Code::Cancelled);
                    }
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(em.map_err(&Dummy::Three).code(), Code::NotFound);
    }
}
