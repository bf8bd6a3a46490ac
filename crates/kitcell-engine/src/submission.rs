//! [`SubmissionRouter`] – destination lookup for shipment submission.
//!
//! Each destination (an AGV for kitting, a station for assembly) is served by
//! one registered [`SubmissionClient`].  Submission is selected by lookup,
//! not by a chain of per-destination conditionals, so adding `agv5` is a
//! registration call rather than new code.

use std::collections::HashMap;
use std::sync::Arc;

use kitcell_middleware::clients::SubmissionClient;
use kitcell_types::WorkcellError;
use tracing::debug;

/// Maps destination ids to their submission capability.
#[derive(Default)]
pub struct SubmissionRouter {
    clients: HashMap<String, Arc<dyn SubmissionClient>>,
}

impl SubmissionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` for `destination_id`.  A previous registration for
    /// the same destination is replaced.
    pub fn register(
        mut self,
        destination_id: impl Into<String>,
        client: Arc<dyn SubmissionClient>,
    ) -> Self {
        self.clients.insert(destination_id.into(), client);
        self
    }

    /// Registered destination ids, for diagnostics.
    pub fn destinations(&self) -> Vec<&str> {
        self.clients.keys().map(String::as_str).collect()
    }

    /// Submit `shipment_type` through the client registered for
    /// `destination_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkcellError::UnknownDestination`] when no client is
    /// registered, or the client's own failure.
    pub async fn submit(
        &self,
        shipment_type: &str,
        destination_id: &str,
    ) -> Result<(), WorkcellError> {
        let client = self
            .clients
            .get(destination_id)
            .ok_or_else(|| WorkcellError::UnknownDestination(destination_id.to_string()))?;
        debug!(shipment_type, destination_id, "routing submission");
        client.submit(shipment_type, destination_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitcell_middleware::sim::SimSubmissionClient;

    #[tokio::test]
    async fn submit_routes_to_the_registered_client() {
        let agv_client = Arc::new(SimSubmissionClient::new());
        let station_client = Arc::new(SimSubmissionClient::new());
        let router = SubmissionRouter::new()
            .register("agv1", agv_client.clone())
            .register("as1", station_client.clone());

        router.submit("k0", "agv1").await.unwrap();

        assert_eq!(
            agv_client.submissions(),
            vec![("k0".to_string(), "agv1".to_string())]
        );
        assert!(station_client.submissions().is_empty());
    }

    #[tokio::test]
    async fn unknown_destination_is_an_error() {
        let router = SubmissionRouter::new();
        let err = router.submit("k0", "agv9").await.unwrap_err();
        assert!(matches!(err, WorkcellError::UnknownDestination(id) if id == "agv9"));
    }

    #[tokio::test]
    async fn one_client_may_serve_many_destinations() {
        let client = Arc::new(SimSubmissionClient::new());
        let router = SubmissionRouter::new()
            .register("agv1", client.clone())
            .register("agv2", client.clone());

        router.submit("k0", "agv1").await.unwrap();
        router.submit("k1", "agv2").await.unwrap();
        assert_eq!(client.submissions().len(), 2);
    }

    #[tokio::test]
    async fn client_failure_propagates() {
        let client = Arc::new(SimSubmissionClient::failing_first(1));
        let router = SubmissionRouter::new().register("agv1", client);
        let err = router.submit("k0", "agv1").await.unwrap_err();
        assert!(matches!(err, WorkcellError::SubmissionFailure { .. }));
    }
}
