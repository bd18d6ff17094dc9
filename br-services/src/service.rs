//! Repository lifecycle.
//!
//! [`AppContext`](crate::context::AppContext) brings every repository up and
//! down through this trait.

use br_core::error::BrResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Running,
    Stopped,
}

pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> ServiceState;

    /// Called once by `AppContext::bootstrap`.
    fn init(&mut self) -> BrResult<()>;

    fn shutdown(&mut self) -> BrResult<()>;

    /// A repository is healthy while it is running.
    fn is_healthy(&self) -> bool {
        self.state() == ServiceState::Running
    }
}

/// Implements [`Service`] for a repository with a `state` field.
macro_rules! impl_service {
    ($ty:ty, $name:literal) => {
        impl $crate::service::Service for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn state(&self) -> $crate::service::ServiceState {
                self.state
            }

            fn init(&mut self) -> br_core::error::BrResult<()> {
                self.state = $crate::service::ServiceState::Running;
                tracing::info!("{} repository initialized", $name);
                Ok(())
            }

            fn shutdown(&mut self) -> br_core::error::BrResult<()> {
                self.state = $crate::service::ServiceState::Stopped;
                tracing::debug!("{} repository stopped", $name);
                Ok(())
            }
        }
    };
}

pub(crate) use impl_service;

#[cfg(test)]
mod tests {
    use super::*;

    struct TestService {
        state: ServiceState,
    }

    impl_service!(TestService, "test");

    #[test]
    fn test_service_lifecycle() {
        let mut svc = TestService { state: ServiceState::Created };
        assert!(!svc.is_healthy());
        svc.init().unwrap();
        assert!(svc.is_healthy());
        svc.shutdown().unwrap();
        assert!(!svc.is_healthy());
        assert_eq!(svc.name(), "test");
    }
}
