//! Unit tests for the reserved-range collector

#[cfg(test)]
mod tests {
    use super::super::collector::{canonicalize, ReservedRangeCollector};
    use crate::config::INSTALLATION_TAG;
    use crate::error::ControllerError;
    use crate::test_utils::InMemoryClusterStore;
    use cloud_client::{MockCloudProvider, Vpc};
    use ipnet::Ipv4Net;
    use std::sync::Arc;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    fn vpc(id: &str, cidr: &str, installation: &str) -> Vpc {
        Vpc {
            id: id.to_string(),
            cidr: cidr.to_string(),
            tags: [(INSTALLATION_TAG.to_string(), installation.to_string())].into_iter().collect(),
        }
    }

    fn collector(cloud: &Arc<MockCloudProvider>, store: &Arc<InMemoryClusterStore>) -> ReservedRangeCollector {
        ReservedRangeCollector::new(cloud.clone(), store.clone(), "gauss".to_string())
    }

    #[tokio::test]
    async fn test_merges_all_sources() {
        let cloud = Arc::new(MockCloudProvider::new());
        cloud.add_vpc(vpc("vpc-1", "10.1.0.0/24", "gauss"));
        cloud.add_vpc(vpc("vpc-2", "10.1.9.0/24", "other"));
        let store = Arc::new(InMemoryClusterStore::with_cidrs(&["10.1.2.0/24", "10.1.0.0/24"], &["10.1.1.0/24"]));

        let ranges = collector(&cloud, &store).collect(net("10.1.0.0/16")).await.unwrap();
        assert_eq!(ranges, vec![net("10.1.0.0/24"), net("10.1.1.0/24"), net("10.1.2.0/24")]);
    }

    #[tokio::test]
    async fn test_store_failure_fails_collection() {
        let cloud = Arc::new(MockCloudProvider::new());
        cloud.add_vpc(vpc("vpc-1", "10.1.0.0/24", "gauss"));
        let store = Arc::new(InMemoryClusterStore::new());
        store.fail_with(Some("list TenantCluster: connection refused"));

        let err = collector(&cloud, &store).collect(net("10.1.0.0/16")).await.unwrap_err();
        assert!(matches!(err, ControllerError::Allocation(msg) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_cloud_failure_fails_collection() {
        let cloud = Arc::new(MockCloudProvider::new());
        cloud.fail_operation("describe_vpcs", "throttled");
        let store = Arc::new(InMemoryClusterStore::with_cidrs(&["10.1.2.0/24"], &[]));

        let err = collector(&cloud, &store).collect(net("10.1.0.0/16")).await.unwrap_err();
        assert!(matches!(err, ControllerError::Cloud(_)));
    }

    #[tokio::test]
    async fn test_invalid_range_fails_collection() {
        let cloud = Arc::new(MockCloudProvider::new());
        let store = Arc::new(InMemoryClusterStore::with_cidrs(&["not-a-cidr"], &[]));

        let err = collector(&cloud, &store).collect(net("10.1.0.0/16")).await.unwrap_err();
        assert!(matches!(err, ControllerError::Allocation(_)));
    }

    #[test]
    fn test_canonicalize() {
        let ranges = vec![
            net("10.1.4.9/24"),
            net("10.1.4.0/24"),
            net("10.2.0.0/24"),
            net("10.0.0.0/8"),
            net("10.1.1.0/24"),
        ];
        assert_eq!(
            canonicalize(net("10.1.0.0/16"), ranges),
            vec![net("10.0.0.0/8"), net("10.1.1.0/24"), net("10.1.4.0/24")]
        );
    }
}
