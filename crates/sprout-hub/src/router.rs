use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use sprout_services::Services;

use crate::error::HubError;
use crate::topics::{
    BREADCRUMB_TOPIC, BreadcrumbTopic, PROVISION_TOPIC, ProvisionTopic, TopicHandler,
};

/// Exact-match topic table. Messages are never retried: whatever happens to
/// one message is final for it.
pub struct MessageRouter {
    routes: HashMap<&'static str, Arc<dyn TopicHandler>>,
}

impl MessageRouter {
    pub fn new(routes: impl IntoIterator<Item = (&'static str, Arc<dyn TopicHandler>)>) -> Self {
        Self {
            routes: routes.into_iter().collect(),
        }
    }

    /// The production table: provisioning completion and breadcrumbs.
    pub fn for_services(services: &Services) -> Self {
        Self::new([
            (
                PROVISION_TOPIC,
                Arc::new(ProvisionTopic::new(services.provisioning.clone())) as Arc<dyn TopicHandler>,
            ),
            (
                BREADCRUMB_TOPIC,
                Arc::new(BreadcrumbTopic::new(services.telemetry.clone())) as Arc<dyn TopicHandler>,
            ),
        ])
    }

    /// Topics to subscribe to, sorted for stable subscription order.
    pub fn topics(&self) -> Vec<&'static str> {
        let mut topics: Vec<_> = self.routes.keys().copied().collect();
        topics.sort_unstable();
        topics
    }

    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> Result<(), HubError> {
        let handler = self
            .routes
            .get(topic)
            .ok_or_else(|| HubError::UnknownTopic(topic.to_string()))?;
        handler.invoke(payload).await
    }

    /// Dispatch and swallow the outcome; failures only reach the log.
    pub async fn route(&self, topic: &str, payload: &[u8]) {
        debug!(topic, bytes = payload.len(), "bus message received");

        match self.dispatch(topic, payload).await {
            Ok(()) => {}
            Err(HubError::UnknownTopic(_)) => info!(topic, "topic not recognized, dropping message"),
            Err(e) => warn!(topic, "dropping message: {:#}", anyhow::Error::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sprout_db::{Database, SeriesStore};
    use sprout_services::{AuthConfig, CurrentUser, LogMailer, Templates};
    use sprout_types::models::Breadcrumb;

    fn services() -> Services {
        Services::new(
            Arc::new(Database::open_in_memory().unwrap()),
            Arc::new(SeriesStore::open_in_memory().unwrap()),
            Arc::new(LogMailer),
            Arc::new(Templates::new().unwrap()),
            AuthConfig::default(),
        )
    }

    async fn staged_device(services: &Services) -> (CurrentUser, String) {
        let user = services
            .sessions
            .create_user("ann@example.com", "pw", "Ann")
            .await
            .unwrap();
        let who = CurrentUser(user);
        let contract = services
            .provisioning
            .create_device_provision(&who, "Fern")
            .await
            .unwrap();
        (who, contract)
    }

    fn bytes(v: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    #[tokio::test]
    async fn provision_then_breadcrumb() {
        let services = services();
        let router = MessageRouter::for_services(&services);
        let (who, contract) = staged_device(&services).await;

        router
            .dispatch(PROVISION_TOPIC, &bytes(json!({ "MacAddr": "AA:BB", "Contract": contract })))
            .await
            .unwrap();
        router
            .dispatch(
                BREADCRUMB_TOPIC,
                &bytes(json!({ "MacAddr": "AA:BB", "Capacitance": 1234, "Temperature": 69 })),
            )
            .await
            .unwrap();

        let device = &services.provisioning.get_user_devices(&who).await.unwrap()[0];
        assert_eq!(device.mac_addr.as_deref(), Some("AA:BB"));
        assert_eq!(
            services.telemetry.get_latest_breadcrumb(device.id).await.unwrap(),
            Breadcrumb {
                capacitance: 1234,
                temperature: 69
            }
        );
    }

    #[tokio::test]
    async fn unknown_topic_is_reported() {
        let router = MessageRouter::for_services(&services());
        let err = router.dispatch("Weather", b"{}").await.unwrap_err();
        assert!(matches!(err, HubError::UnknownTopic(t) if t == "Weather"));

        // matching is exact
        let err = router.dispatch("breadcrumb", b"{}").await.unwrap_err();
        assert!(matches!(err, HubError::UnknownTopic(_)));
    }

    #[tokio::test]
    async fn malformed_payload_is_a_decode_error() {
        let router = MessageRouter::for_services(&services());
        let err = router
            .dispatch(BREADCRUMB_TOPIC, b"{\"MacAddr\": 12")
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Decode { topic: BREADCRUMB_TOPIC, .. }));
    }

    #[tokio::test]
    async fn service_failures_surface_as_handler_errors() {
        let router = MessageRouter::for_services(&services());
        let err = router
            .dispatch(
                BREADCRUMB_TOPIC,
                &bytes(json!({ "MacAddr": "nope", "Capacitance": 1, "Temperature": 2 })),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::Handler {
                source: sprout_services::Error::NoDevice(_),
                ..
            }
        ));

        let err = router
            .dispatch(PROVISION_TOPIC, &bytes(json!({ "MacAddr": "AA", "Contract": "bogus" })))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::Handler {
                source: sprout_services::Error::NotFound(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn route_swallows_failures() {
        let router = MessageRouter::for_services(&services());
        router.route("Weather", b"{}").await;
        router.route(BREADCRUMB_TOPIC, b"garbage").await;
    }

    #[test]
    fn production_table_topics() {
        let router = MessageRouter::for_services(&services());
        assert_eq!(router.topics(), vec![BREADCRUMB_TOPIC, PROVISION_TOPIC]);
    }
}
