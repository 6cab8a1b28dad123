//! Per-test setup and teardown.
//!
//! [`RbacTestLifecycle::run`] puts the worker on its baseline role, runs the
//! test body, and afterwards restores the baseline and drains the cleanup
//! stack no matter how the body ended, panics included. The next test
//! therefore always starts on the baseline role.

use futures::future::BoxFuture;
use futures::FutureExt;
use gatecheck_policy::Role;
use gatecheck_roles::{Credentials, RoleError, RoleSwitcher};
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{Classify, ClassifiedResultExt};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("cleanup '{label}' failed: {message}")]
pub struct CleanupFailure {
    pub label: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to restore baseline role: {0}")]
    RoleRestore(#[source] RoleError),
    #[error("{} cleanup action(s) failed: {}", .0.len(), join_failures(.0))]
    Cleanup(Vec<CleanupFailure>),
}

fn join_failures(failures: &[CleanupFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of [`RbacTestLifecycle::run`]: the body's own error, or a
/// teardown failure.
#[derive(Debug, Error)]
pub enum TestError<E> {
    #[error("{0}")]
    Body(E),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

struct Cleanup {
    label: String,
    action: BoxFuture<'static, Result<(), String>>,
}

/// LIFO stack of deferred cleanup actions.
#[derive(Default)]
pub struct Cleanups {
    stack: Vec<Cleanup>,
}

impl Cleanups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer `action` until the end of the test. A `NotFound` result counts
    /// as success.
    pub fn push<Fut, E>(&mut self, label: impl Into<String>, action: Fut)
    where
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Classify + Display + Send + 'static,
    {
        let label = label.into();
        let tag = label.clone();
        let action = async move {
            match action.await.ignore_not_found() {
                Ok(Some(())) => Ok(()),
                Ok(None) => {
                    debug!("Cleanup {}: resource already gone", tag);
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            }
        }
        .boxed();
        self.stack.push(Cleanup { label, action });
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Run every pending action, most recent first. Failures are collected
    /// and the remaining actions still run.
    pub async fn run(&mut self) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        while let Some(cleanup) = self.stack.pop() {
            match cleanup.action.await {
                Ok(()) => debug!("Cleanup {} done", cleanup.label),
                Err(message) => {
                    warn!("Cleanup {} failed: {}", cleanup.label, message);
                    failures.push(CleanupFailure {
                        label: cleanup.label,
                        message,
                    });
                }
            }
        }
        failures
    }

    fn abandon(&mut self) {
        for cleanup in self.stack.drain(..) {
            warn!("Skipping cleanup {}: not acting as baseline", cleanup.label);
        }
    }
}

impl std::fmt::Debug for Cleanups {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleanups")
            .field(
                "pending",
                &self.stack.iter().map(|c| c.label.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// What a test body gets to work with.
#[derive(Debug)]
pub struct TestScope<C> {
    switcher: RoleSwitcher<C>,
    cleanups: Cleanups,
}

impl<C: Credentials> TestScope<C> {
    pub async fn switch_role(&mut self, to_probed: bool) -> Result<(), RoleError> {
        self.switcher.switch_role(to_probed).await
    }

    pub fn probed_role(&self) -> &Role {
        self.switcher.probed_role()
    }

    pub fn baseline_role(&self) -> &Role {
        self.switcher.baseline_role()
    }

    pub fn current_role(&self) -> &Role {
        self.switcher.current_role()
    }

    pub fn add_cleanup<Fut, E>(&mut self, label: impl Into<String>, action: Fut)
    where
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Classify + Display + Send + 'static,
    {
        self.cleanups.push(label, action);
    }

    pub fn pending_cleanups(&self) -> usize {
        self.cleanups.len()
    }
}

/// Runs RBAC test bodies for one worker.
#[derive(Debug)]
pub struct RbacTestLifecycle<C> {
    scope: TestScope<C>,
}

impl<C: Credentials> RbacTestLifecycle<C> {
    pub fn new(switcher: RoleSwitcher<C>) -> Self {
        Self {
            scope: TestScope {
                switcher,
                cleanups: Cleanups::new(),
            },
        }
    }

    pub fn switcher(&self) -> &RoleSwitcher<C> {
        &self.scope.switcher
    }

    /// Run one test body.
    ///
    /// The body is not run if the worker cannot be put on its baseline role.
    /// After the body, a failed baseline restore takes precedence over the
    /// body's own error, which takes precedence over cleanup failures. A
    /// panicking body is resumed once teardown is done.
    pub async fn run<T, E, F>(&mut self, name: &str, body: F) -> Result<T, TestError<E>>
    where
        F: for<'s> FnOnce(&'s mut TestScope<C>) -> BoxFuture<'s, Result<T, E>>,
    {
        if let Err(e) = self.scope.switcher.switch_role(false).await {
            error!("{}: cannot reset to baseline role: {}", name, e);
            return Err(LifecycleError::RoleRestore(e).into());
        }
        info!(
            "{}: starting as {} (probing {})",
            name,
            self.scope.switcher.baseline_role(),
            self.scope.switcher.probed_role()
        );

        let outcome = AssertUnwindSafe(body(&mut self.scope)).catch_unwind().await;

        let restore = self.scope.switcher.switch_role(false).await;
        let cleanup_failures = match &restore {
            Ok(()) => self.scope.cleanups.run().await,
            Err(e) => {
                error!("{}: failed to restore baseline role: {}", name, e);
                self.scope.cleanups.abandon();
                Vec::new()
            }
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!("{}: test body panicked", name);
                std::panic::resume_unwind(panic);
            }
        };

        if let Err(e) = restore {
            return Err(LifecycleError::RoleRestore(e).into());
        }
        match outcome {
            Err(e) => {
                if !cleanup_failures.is_empty() {
                    warn!(
                        "{}: {} cleanup failure(s) masked by test error",
                        name,
                        cleanup_failures.len()
                    );
                }
                Err(TestError::Body(e))
            }
            Ok(_) if !cleanup_failures.is_empty() => {
                Err(LifecycleError::Cleanup(cleanup_failures).into())
            }
            Ok(value) => {
                debug!("{}: finished", name);
                Ok(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use gatecheck_roles::{MockCredentials, SessionCredentials, SessionView};
    use mockall::predicate::eq;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq)]
    struct Failure(ErrorKind);

    impl Classify for Failure {
        fn error_kind(&self) -> ErrorKind {
            self.0
        }
    }

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "api error: {}", self.0)
        }
    }

    fn admin() -> Role {
        Role::new("admin")
    }

    fn member() -> Role {
        Role::new("member")
    }

    async fn session_lifecycle(
        initial: Role,
    ) -> (SessionView, RbacTestLifecycle<SessionCredentials>) {
        let session = SessionCredentials::new(initial);
        let view = session.view();
        let switcher = RoleSwitcher::new(session, admin(), member())
            .await
            .unwrap();
        (view, RbacTestLifecycle::new(switcher))
    }

    #[tokio::test]
    async fn starts_on_baseline_even_if_worker_was_left_probed() {
        let (_session, mut lifecycle) = session_lifecycle(member()).await;
        let seen = lifecycle
            .run("starts_on_baseline", |scope| {
                async move { Ok::<_, Failure>(scope.current_role().clone()) }.boxed()
            })
            .await
            .unwrap();
        assert_eq!(seen, admin());
    }

    #[tokio::test]
    async fn panicking_body_still_restores_baseline() {
        let (session, mut lifecycle) = session_lifecycle(admin()).await;

        let panicked = AssertUnwindSafe(lifecycle.run("panics", |scope| {
            async move {
                scope.switch_role(true).await.unwrap();
                if scope.current_role() == &member() {
                    panic!("boom");
                }
                Ok::<(), Failure>(())
            }
            .boxed()
        }))
        .catch_unwind()
        .await;

        assert!(panicked.is_err());
        assert_eq!(session.role().await, admin());
        assert!(lifecycle.switcher().is_baseline());

        let next = lifecycle
            .run("next", |scope| {
                async move { Ok::<_, Failure>(scope.current_role().clone()) }.boxed()
            })
            .await
            .unwrap();
        assert_eq!(next, admin());
    }

    #[tokio::test]
    async fn failing_body_restores_baseline_and_reports_body_error() {
        let (session, mut lifecycle) = session_lifecycle(admin()).await;
        let err = lifecycle
            .run("fails", |scope| {
                async move {
                    scope.switch_role(true).await.unwrap();
                    Err::<(), _>(Failure(ErrorKind::Conflict))
                }
                .boxed()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TestError::Body(Failure(ErrorKind::Conflict))));
        assert_eq!(session.role().await, admin());
    }

    #[tokio::test]
    async fn cleanups_run_last_in_first_out_as_baseline() {
        let (session, mut lifecycle) = session_lifecycle(admin()).await;
        let log = Arc::new(Mutex::new(Vec::new()));

        let body_log = log.clone();
        let body_session = session.clone();
        lifecycle
            .run("cleanup_order", move |scope| {
                async move {
                    for step in ["server", "port"] {
                        let log = body_log.clone();
                        let session = body_session.clone();
                        scope.add_cleanup(step, async move {
                            let role = session.role().await;
                            log.lock().unwrap().push((step, role));
                            Ok::<(), Failure>(())
                        });
                    }
                    scope.switch_role(true).await.unwrap();
                    assert_eq!(scope.pending_cleanups(), 2);
                    Ok::<(), Failure>(())
                }
                .boxed()
            })
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![("port", admin()), ("server", admin())]
        );
    }

    #[tokio::test]
    async fn cleanup_tolerates_already_gone() {
        let (_session, mut lifecycle) = session_lifecycle(admin()).await;
        let result = lifecycle
            .run("already_gone", |scope| {
                async move {
                    scope.add_cleanup("port", async { Err::<(), _>(Failure(ErrorKind::NotFound)) });
                    Ok::<_, Failure>(42)
                }
                .boxed()
            })
            .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn cleanup_failure_is_reported_after_all_cleanups_ran() {
        let (_session, mut lifecycle) = session_lifecycle(admin()).await;
        let ran = Arc::new(Mutex::new(0));
        let counter = ran.clone();
        let err = lifecycle
            .run("cleanup_conflict", move |scope| {
                async move {
                    let c = counter.clone();
                    scope.add_cleanup("aggregate", async move {
                        *c.lock().unwrap() += 1;
                        Ok::<(), Failure>(())
                    });
                    scope.add_cleanup("server", async {
                        Err::<(), _>(Failure(ErrorKind::Conflict))
                    });
                    Ok::<(), Failure>(())
                }
                .boxed()
            })
            .await
            .unwrap_err();

        match err {
            TestError::Lifecycle(LifecycleError::Cleanup(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].label, "server");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*ran.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn body_error_takes_precedence_over_cleanup_failure() {
        let (_session, mut lifecycle) = session_lifecycle(admin()).await;
        let err = lifecycle
            .run("both_fail", |scope| {
                async move {
                    scope.add_cleanup("server", async {
                        Err::<(), _>(Failure(ErrorKind::ServerFault))
                    });
                    Err::<(), _>(Failure(ErrorKind::BadRequest))
                }
                .boxed()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Body(Failure(ErrorKind::BadRequest))));
    }

    #[tokio::test]
    async fn restore_failure_is_escalated() {
        let live = Arc::new(Mutex::new(admin()));
        let mut creds = MockCredentials::new();
        let read = live.clone();
        creds
            .expect_current_role()
            .returning(move || Ok(read.lock().unwrap().clone()));
        let write = live.clone();
        creds
            .expect_set_current_role()
            .with(eq(Role::new("member")))
            .returning(move |role| {
                *write.lock().unwrap() = role.clone();
                Ok(())
            });
        creds
            .expect_set_current_role()
            .with(eq(Role::new("admin")))
            .returning(|role| {
                Err(RoleError::Switch {
                    role: role.clone(),
                    reason: "token revoked".to_string(),
                })
            });

        let switcher = RoleSwitcher::new(creds, admin(), member()).await.unwrap();
        let mut lifecycle = RbacTestLifecycle::new(switcher);
        let err = lifecycle
            .run("restore_fails", |scope| {
                async move {
                    scope.switch_role(true).await.unwrap();
                    scope.add_cleanup("server", async { Ok::<(), Failure>(()) });
                    Err::<(), _>(Failure(ErrorKind::Conflict))
                }
                .boxed()
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TestError::Lifecycle(LifecycleError::RoleRestore(RoleError::Switch { .. }))
        ));
        assert_eq!(lifecycle.switcher().current_role(), &member());
    }

    #[tokio::test]
    async fn body_is_skipped_when_baseline_cannot_be_reached() {
        let mut creds = MockCredentials::new();
        creds.expect_current_role().returning(|| Ok(Role::new("member")));
        creds.expect_set_current_role().returning(|role| {
            Err(RoleError::Switch {
                role: role.clone(),
                reason: "identity service down".to_string(),
            })
        });

        let switcher = RoleSwitcher::new(creds, admin(), member()).await.unwrap();
        let mut lifecycle = RbacTestLifecycle::new(switcher);
        let ran = Arc::new(Mutex::new(false));
        let flag = ran.clone();
        let err = lifecycle
            .run("unreachable_baseline", move |_scope| {
                async move {
                    *flag.lock().unwrap() = true;
                    Ok::<(), Failure>(())
                }
                .boxed()
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TestError::Lifecycle(LifecycleError::RoleRestore(_))
        ));
        assert!(!*ran.lock().unwrap());
    }
}
