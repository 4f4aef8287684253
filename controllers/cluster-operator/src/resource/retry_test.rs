//! Unit tests for the retry decorator and chain runners

#[cfg(test)]
mod tests {
    use super::super::{run_create_chain, run_delete_chain, Flow, Resource, RetryPolicy, RetryResource, TickOutcome};
    use crate::context::TickContext;
    use crate::error::ControllerError;
    use crate::test_utils::create_test_cluster;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Resource that fails a fixed number of times, then returns `outcome`
    struct Scripted {
        name: String,
        failures: u32,
        error: fn() -> ControllerError,
        outcome: Flow,
        calls: AtomicU32,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                failures: 0,
                error: || ControllerError::Allocation("transient".to_string()),
                outcome: Flow::Continue,
                calls: AtomicU32::new(0),
                log: log.clone(),
            }
        }

        fn step(&self, kind: &str) -> Result<Flow, ControllerError> {
            self.log.lock().unwrap().push(format!("{}:{}", kind, self.name));
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)());
            }
            Ok(self.outcome.clone())
        }
    }

    #[async_trait::async_trait]
    impl Resource for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn ensure_created(&self, _ctx: &mut TickContext) -> Result<Flow, ControllerError> {
            self.step("create")
        }

        async fn ensure_deleted(&self, _ctx: &mut TickContext) -> Result<Flow, ControllerError> {
            self.step("delete")
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn context() -> TickContext {
        TickContext::new(&create_test_cluster("alpha", "default", None)).unwrap()
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut flaky = Scripted::new("flaky", &log);
        flaky.failures = 2;
        let resource = RetryResource::new(flaky, fast_policy(3));

        let flow = resource.ensure_created(&mut context()).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut flaky = Scripted::new("flaky", &log);
        flaky.failures = 5;
        let resource = RetryResource::new(flaky, fast_policy(3));

        let err = resource.ensure_deleted(&mut context()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Allocation(_)));
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_not_retried() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut exhausted = Scripted::new("network", &log);
        exhausted.failures = 1;
        exhausted.error = || ControllerError::Exhausted("no free /24 block left".to_string());
        let resource = RetryResource::new(exhausted, fast_policy(5));

        let err = resource.ensure_created(&mut context()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Exhausted(_)));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_passes_through() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut waiting = Scripted::new("stack", &log);
        waiting.outcome = Flow::cancel("stack is transitioning");
        let resource = RetryResource::new(waiting, fast_policy(3));

        let flow = resource.ensure_created(&mut context()).await.unwrap();
        assert_eq!(flow, Flow::Cancel("stack is transitioning".to_string()));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_chain_stops_at_cancel() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut role = Scripted::new("peer-role", &log);
        role.outcome = Flow::cancel("role missing");
        let chain: Vec<Box<dyn Resource>> = vec![
            Box::new(Scripted::new("network", &log)),
            Box::new(role),
            Box::new(Scripted::new("stack", &log)),
        ];

        let outcome = run_create_chain(&chain, &mut context()).await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Cancelled {
                resource: "peer-role".to_string(),
                reason: "role missing".to_string(),
            }
        );
        assert_eq!(*log.lock().unwrap(), vec!["create:network", "create:peer-role"]);
    }

    #[tokio::test]
    async fn test_delete_chain_runs_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<Box<dyn Resource>> = vec![
            Box::new(Scripted::new("network", &log)),
            Box::new(Scripted::new("encryption", &log)),
            Box::new(Scripted::new("stack", &log)),
        ];

        let outcome = run_delete_chain(&chain, &mut context()).await.unwrap();
        assert_eq!(outcome, TickOutcome::Completed);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["delete:stack", "delete:encryption", "delete:network"]
        );
    }
}
