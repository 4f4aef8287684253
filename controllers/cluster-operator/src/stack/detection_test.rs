//! Unit tests for stack detection

#[cfg(test)]
mod tests {
    use super::super::detection::{decide, should_scale, should_update, DecisionOutcome};
    use super::super::observed::{ObservedStackState, StackOutputs};
    use crate::error::ControllerError;
    use crate::test_utils::{create_test_cluster, stable_outputs};
    use cloud_client::{AutoScalingGroup, Stack, StackStatus};
    use crds::TenantCluster;

    /// Observed state of a settled stack that matches `cluster`
    fn settled(cluster: &TenantCluster) -> ObservedStackState {
        let stack = Stack {
            name: "cluster-a1b2c-tccp".to_string(),
            status: StackStatus::UpdateComplete,
            outputs: stable_outputs(cluster, "0a1b2c3d"),
            termination_protection: true,
            last_updated: None,
        };
        ObservedStackState {
            status: Some(stack.status),
            is_transitioning: false,
            outputs: Some(StackOutputs::from_stack(&stack).unwrap()),
            worker_asg: Some(AutoScalingGroup {
                name: "cluster-a1b2c-workers".to_string(),
                min_size: 3,
                max_size: 5,
                desired_capacity: 4,
            }),
        }
    }

    #[test]
    fn test_matching_stack_is_noop() {
        let cluster = create_test_cluster("alpha", "default", Some("10.1.4.0/24"));
        let observed = settled(&cluster);
        assert!(!should_update(&cluster.spec, &observed).unwrap());
        assert!(!should_scale(&cluster.spec, &observed));
        assert_eq!(decide(&cluster.spec, &observed).unwrap(), DecisionOutcome::Noop);
    }

    #[test]
    fn test_each_update_field_triggers_update() {
        let cluster = create_test_cluster("alpha", "default", Some("10.1.4.0/24"));
        let observed = settled(&cluster);

        let mut spec = cluster.spec.clone();
        spec.master.instance_type = "m5.2xlarge".to_string();
        assert!(should_update(&spec, &observed).unwrap());

        let mut spec = cluster.spec.clone();
        spec.worker.docker_volume_size_gb = 200;
        assert!(should_update(&spec, &observed).unwrap());

        let mut spec = cluster.spec.clone();
        spec.worker.instance_type = "c5.large".to_string();
        assert!(should_update(&spec, &observed).unwrap());

        let mut spec = cluster.spec.clone();
        spec.release_version = "11.4.0".to_string();
        assert!(should_update(&spec, &observed).unwrap());
    }

    #[test]
    fn test_image_change_alone_is_not_an_update() {
        let cluster = create_test_cluster("alpha", "default", Some("10.1.4.0/24"));
        let observed = settled(&cluster);

        let mut spec = cluster.spec.clone();
        spec.master.image_id = "ami-new".to_string();
        assert!(!should_update(&spec, &observed).unwrap());
    }

    #[test]
    fn test_scaling_bounds_trigger_scale() {
        let cluster = create_test_cluster("alpha", "default", Some("10.1.4.0/24"));
        let observed = settled(&cluster);

        let mut spec = cluster.spec.clone();
        spec.worker.scaling.max = 8;
        assert!(should_scale(&spec, &observed));
        assert_eq!(decide(&spec, &observed).unwrap(), DecisionOutcome::ShouldScale);

        let mut spec = cluster.spec.clone();
        spec.worker.scaling.min = 1;
        assert!(should_scale(&spec, &observed));
    }

    #[test]
    fn test_update_wins_over_scale() {
        let cluster = create_test_cluster("alpha", "default", Some("10.1.4.0/24"));
        let observed = settled(&cluster);

        let mut spec = cluster.spec.clone();
        spec.worker.scaling.max = 8;
        spec.release_version = "11.4.0".to_string();
        assert_eq!(decide(&spec, &observed).unwrap(), DecisionOutcome::ShouldUpdate);
    }

    #[test]
    fn test_no_worker_group_never_scales() {
        let cluster = create_test_cluster("alpha", "default", Some("10.1.4.0/24"));
        let mut observed = settled(&cluster);
        observed.worker_asg = None;

        let mut spec = cluster.spec.clone();
        spec.worker.scaling.max = 8;
        assert!(!should_scale(&spec, &observed));
    }

    #[test]
    fn test_missing_outputs_is_an_error() {
        let cluster = create_test_cluster("alpha", "default", Some("10.1.4.0/24"));
        let err = should_update(&cluster.spec, &ObservedStackState::default()).unwrap_err();
        assert!(matches!(err, ControllerError::Detection(_)));
    }
}
