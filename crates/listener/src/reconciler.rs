use crate::config::{ClusterConfig, WebhookSettings};
use crate::error::Result;
use crate::http::{ApiRequest, RequestExecutor};
use crate::models::event::EventType;
use crate::models::webhook::{
    SubscriptionState, Webhook, WebhookList, WebhookListRequest, WebhookRequest,
    WebhookRequestMetadata, WebhookResources, WebhookSpec,
};
use log::{error, info, warn};
use reqwest::Method;
use std::collections::HashSet;
use std::hash::Hash;
use std::net::{IpAddr, SocketAddr};

/// Drops repeated items, keeping the first occurrence of each in order.
pub fn remove_duplicates<T: Eq + Hash + Clone>(list: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(list.len());
    list.iter()
        .filter(|item| seen.insert((*item).clone()))
        .cloned()
        .collect()
}

/// Keeps the backend subscription of this listener in line with the events
/// it wants to receive.
///
/// A listener owns the subscription whose callback URL is exactly its own
/// `http://{local_ip}:{port}{callback_path}`. Listeners on other ports or
/// hosts own other subscriptions and are never touched.
pub struct WebhookReconciler {
    executor: RequestExecutor,
    cluster: ClusterConfig,
    settings: WebhookSettings,
    local_ip: IpAddr,
    listen_port: u16,
}

impl WebhookReconciler {
    pub fn new(
        executor: RequestExecutor,
        cluster: ClusterConfig,
        settings: WebhookSettings,
        local_ip: IpAddr,
        listen_port: u16,
    ) -> Self {
        Self {
            executor,
            cluster,
            settings,
            local_ip,
            listen_port,
        }
    }

    pub fn callback_url(&self) -> String {
        format!(
            "http://{}{}",
            SocketAddr::new(self.local_ip, self.listen_port),
            self.settings.callback_path
        )
    }

    pub fn webhook_name(&self) -> String {
        format!("{}{}", self.settings.name_prefix, self.local_ip)
    }

    pub async fn list_subscriptions(&self) -> Result<WebhookList> {
        let request = ApiRequest::new(Method::POST, self.cluster.url(&self.settings.list_path))
            .with_json(&WebhookListRequest {
                kind: self.settings.kind.clone(),
            })?;
        let response = self.executor.execute(request).await.map_err(|e| {
            error!("Failed to get webhooks: {e}");
            e
        })?;
        let list: WebhookList = response.json().map_err(|e| {
            error!("Failed to parse current webhooks: {e}");
            e
        })?;
        info!("Total existing webhooks: {}", list.metadata.total_matches);
        Ok(list)
    }

    /// Subscription owned by this listener, matched on the exact callback URL.
    pub async fn find_subscription(&self) -> Result<Option<Webhook>> {
        let callback_url = self.callback_url();
        info!("Looking for webhook with url {callback_url}");
        let list = self.list_subscriptions().await?;
        Ok(list
            .entities
            .into_iter()
            .find(|webhook| webhook.post_url() == callback_url))
    }

    /// Creates the subscription, or merges `desired_events` into the one that
    /// already exists. Re-running with the same events leaves the filter as is.
    pub async fn ensure_subscription(&self, desired_events: &[EventType]) -> Result<Webhook> {
        let desired: Vec<String> = desired_events
            .iter()
            .map(|event_type| event_type.as_str().to_string())
            .collect();
        info!("Registering for events {desired:?}");

        let existing = self.find_subscription().await?;
        let owned = existing
            .as_ref()
            .and_then(|webhook| webhook.uuid().map(|uuid| (uuid, webhook)));

        let (method, url, events, spec_version) = match owned {
            None => {
                info!("No existing webhook found, creating new webhook");
                (
                    Method::POST,
                    self.cluster.url(&self.settings.create_path),
                    remove_duplicates(&desired),
                    0,
                )
            }
            Some((uuid, webhook)) => {
                info!("Found matching webhook {uuid}, updating");
                let mut merged = webhook.events().to_vec();
                merged.extend(desired);
                (
                    Method::PUT,
                    self.cluster.url(&self.settings.update_path_for(uuid)),
                    remove_duplicates(&merged),
                    webhook.metadata.spec_version,
                )
            }
        };

        let body = WebhookRequest {
            metadata: WebhookRequestMetadata {
                kind: self.settings.kind.clone(),
                spec_version,
            },
            spec: WebhookSpec {
                name: self.webhook_name(),
                resources: WebhookResources {
                    post_url: self.callback_url(),
                    events_filter_list: events,
                },
                description: String::new(),
            },
            api_version: self.settings.api_version.clone(),
        };

        let response = self
            .executor
            .execute(ApiRequest::new(method, url).with_json(&body)?)
            .await
            .map_err(|e| {
                error!("Failed to perform webhook operation: {e}");
                e
            })?;
        let webhook: Webhook = response.json().map_err(|e| {
            error!("Failed to parse webhook operation response: {e}");
            e
        })?;

        if response.is_accepted() && webhook.state() == SubscriptionState::Pending {
            self.confirm_pending(&webhook).await;
        }

        info!("Successfully completed webhook operation");
        Ok(webhook)
    }

    // One follow-up read; a subscription still pending afterwards is only logged.
    async fn confirm_pending(&self, webhook: &Webhook) {
        let Some(uuid) = webhook.uuid() else {
            warn!("Webhook operation is pending but the response carries no uuid");
            return;
        };

        let url = self.cluster.url(&self.settings.get_path_for(uuid));
        let request = ApiRequest::new(Method::GET, url);
        match self.executor.execute(request).await {
            Ok(response) => match response.json::<Webhook>() {
                Ok(current) if current.state() == SubscriptionState::Complete => {
                    info!("Webhook registration complete");
                }
                Ok(current) => {
                    info!(
                        "Webhook {uuid} still in state {:?} after confirmation check",
                        current.state()
                    );
                }
                Err(e) => warn!("Failed to parse webhook {uuid} status: {e}"),
            },
            Err(e) => warn!("Failed to confirm webhook {uuid} status: {e}"),
        }
    }

    /// Removes this listener's subscription. Returns `false` if there was none.
    pub async fn delete_subscription(&self) -> Result<bool> {
        let Some(webhook) = self.find_subscription().await? else {
            info!("No webhook registered for {}", self.callback_url());
            return Ok(false);
        };
        let Some(uuid) = webhook.uuid() else {
            warn!("Matching webhook has no uuid, nothing to delete");
            return Ok(false);
        };

        let request = ApiRequest::new(
            Method::DELETE,
            self.cluster.url(&self.settings.delete_path_for(uuid)),
        );
        self.executor.execute(request).await?;
        info!("Deleted webhook {uuid}");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::error::ListenerError;
    use anyhow::Result;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use std::time::Duration;

    const LIST_PATH: &str = "/api/nutanix/v3/webhooks/list";
    const CREATE_PATH: &str = "/api/nutanix/v3/webhooks";

    fn reconciler(server: &ServerGuard, listen_port: u16) -> WebhookReconciler {
        let addr = server.socket_address();
        let mut cluster = ClusterConfig::new(
            addr.ip().to_string(),
            addr.port(),
            Credentials::new("admin", "pw"),
        );
        cluster.scheme = "http".to_string();
        let executor =
            RequestExecutor::new(cluster.credentials.clone(), Duration::from_secs(5)).unwrap();
        WebhookReconciler::new(
            executor,
            cluster,
            WebhookSettings::default(),
            IpAddr::from([10, 0, 0, 2]),
            listen_port,
        )
    }

    fn webhook_json(
        uuid: &str,
        post_url: &str,
        events: &[&str],
        spec_version: u64,
        state: &str,
    ) -> serde_json::Value {
        json!({
            "status": { "state": state },
            "spec": {
                "name": "Nutanix_Listener_Webhook_10.0.0.2",
                "resources": { "post_url": post_url, "events_filter_list": events }
            },
            "api_version": "3.0",
            "metadata": { "kind": "webhook", "uuid": uuid, "spec_version": spec_version }
        })
    }

    fn list_json(entities: Vec<serde_json::Value>) -> String {
        json!({
            "api_version": "3.0",
            "metadata": {
                "total_matches": entities.len(),
                "kind": "webhook",
                "length": entities.len(),
                "offset": 0
            },
            "entities": entities
        })
        .to_string()
    }

    fn request_json(post_url: &str, events: &[&str], spec_version: u64) -> serde_json::Value {
        json!({
            "metadata": { "kind": "webhook", "spec_version": spec_version },
            "spec": {
                "name": "Nutanix_Listener_Webhook_10.0.0.2",
                "resources": { "post_url": post_url, "events_filter_list": events }
            },
            "api_version": "3.0"
        })
    }

    #[test]
    fn test_remove_duplicates_preserves_first_seen_order() {
        let input = ["Unit", "Testing", "Unit", "Testing"].map(String::from);
        assert_eq!(remove_duplicates(&input), vec!["Unit", "Testing"]);
        assert!(remove_duplicates::<String>(&[]).is_empty());
    }

    #[test]
    fn test_callback_url_and_name() {
        let server = mockito::Server::new();
        let reconciler = reconciler(&server, 8080);
        assert_eq!(
            reconciler.callback_url(),
            "http://10.0.0.2:8080/listener/callback"
        );
        assert_eq!(reconciler.webhook_name(), "Nutanix_Listener_Webhook_10.0.0.2");
    }

    #[tokio::test]
    async fn test_creates_webhook_when_none_exists() -> Result<()> {
        let mut server = Server::new_async().await;
        let list = server
            .mock("POST", LIST_PATH)
            .match_body(Matcher::Json(json!({ "kind": "webhook" })))
            .with_status(200)
            .with_body(list_json(vec![]))
            .create_async()
            .await;
        let create = server
            .mock("POST", CREATE_PATH)
            .match_body(Matcher::Json(request_json(
                "http://10.0.0.2:8080/listener/callback",
                &["VM.ON", "VM.OFF"],
                0,
            )))
            .with_status(200)
            .with_body(
                webhook_json(
                    "uuid-1",
                    "http://10.0.0.2:8080/listener/callback",
                    &["VM.ON", "VM.OFF"],
                    0,
                    "COMPLETE",
                )
                .to_string(),
            )
            .create_async()
            .await;

        let webhook = reconciler(&server, 8080)
            .ensure_subscription(&[EventType::VmOn, EventType::VmOff, EventType::VmOn])
            .await?;

        assert_eq!(webhook.uuid(), Some("uuid-1"));
        list.assert_async().await;
        create.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_update_merges_existing_events() -> Result<()> {
        let mut server = Server::new_async().await;
        let callback = "http://10.0.0.2:8080/listener/callback";
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![webhook_json("uuid-1", callback, &["VM.ON"], 4, "COMPLETE")]))
            .create_async()
            .await;
        let update = server
            .mock("PUT", "/api/nutanix/v3/webhooks/uuid-1")
            .match_body(Matcher::Json(request_json(callback, &["VM.ON", "VM.OFF"], 4)))
            .with_status(200)
            .with_body(
                webhook_json("uuid-1", callback, &["VM.ON", "VM.OFF"], 5, "COMPLETE").to_string(),
            )
            .create_async()
            .await;
        let create = server.mock("POST", CREATE_PATH).expect(0).create_async().await;

        let webhook = reconciler(&server, 8080)
            .ensure_subscription(&[EventType::VmOff, EventType::VmOn])
            .await?;

        assert_eq!(webhook.events(), ["VM.ON".to_string(), "VM.OFF".to_string()]);
        update.assert_async().await;
        create.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_reregistering_same_events_is_idempotent() -> Result<()> {
        let callback = "http://10.0.0.2:8080/listener/callback";

        // First registration against an empty backend.
        let mut before = Server::new_async().await;
        let _empty_list = before
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![]))
            .create_async()
            .await;
        let create = before
            .mock("POST", CREATE_PATH)
            .match_body(Matcher::Json(request_json(callback, &["VM.ON", "VM.OFF"], 0)))
            .with_status(200)
            .with_body(
                webhook_json("uuid-1", callback, &["VM.ON", "VM.OFF"], 0, "COMPLETE").to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        reconciler(&before, 8080)
            .ensure_subscription(&[EventType::VmOn, EventType::VmOff])
            .await?;
        create.assert_async().await;

        // Second registration against a backend holding the subscription created above.
        let mut after = Server::new_async().await;
        let _populated_list = after
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![webhook_json(
                "uuid-1",
                callback,
                &["VM.ON", "VM.OFF"],
                0,
                "COMPLETE",
            )]))
            .create_async()
            .await;
        let second_create = after.mock("POST", CREATE_PATH).expect(0).create_async().await;
        let update = after
            .mock("PUT", "/api/nutanix/v3/webhooks/uuid-1")
            .match_body(Matcher::Json(request_json(callback, &["VM.ON", "VM.OFF"], 0)))
            .with_status(200)
            .with_body(
                webhook_json("uuid-1", callback, &["VM.ON", "VM.OFF"], 1, "COMPLETE").to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let webhook = reconciler(&after, 8080)
            .ensure_subscription(&[EventType::VmOn, EventType::VmOff])
            .await?;

        assert_eq!(webhook.events(), ["VM.ON".to_string(), "VM.OFF".to_string()]);
        update.assert_async().await;
        second_create.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_does_not_touch_webhook_of_other_listener() -> Result<()> {
        let mut server = Server::new_async().await;
        let other = "http://10.0.0.2:9090/listener/callback";
        let ours = "http://10.0.0.2:8080/listener/callback";
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![webhook_json(
                "uuid-other",
                other,
                &["VM.ON"],
                2,
                "COMPLETE",
            )]))
            .create_async()
            .await;
        let update_other = server
            .mock("PUT", "/api/nutanix/v3/webhooks/uuid-other")
            .expect(0)
            .create_async()
            .await;
        let create = server
            .mock("POST", CREATE_PATH)
            .match_body(Matcher::Json(request_json(ours, &["VM.ON"], 0)))
            .with_status(200)
            .with_body(webhook_json("uuid-ours", ours, &["VM.ON"], 0, "COMPLETE").to_string())
            .create_async()
            .await;

        let webhook = reconciler(&server, 8080)
            .ensure_subscription(&[EventType::VmOn])
            .await?;

        assert_eq!(webhook.uuid(), Some("uuid-ours"));
        create.assert_async().await;
        update_other.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_foreign_webhook_with_null_fields_does_not_block_update() -> Result<()> {
        let mut server = Server::new_async().await;
        let callback = "http://10.0.0.2:8080/listener/callback";
        let foreign = json!({
            "status": { "state": "COMPLETE" },
            "spec": {
                "name": "backup-tool-hook",
                "description": null,
                "resources": { "post_url": "http://10.9.9.9/hook", "events_filter_list": null }
            },
            "metadata": { "kind": "webhook", "uuid": "uuid-foreign", "spec_version": 7 }
        });
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![
                foreign,
                webhook_json("uuid-1", callback, &["VM.ON"], 2, "COMPLETE"),
            ]))
            .create_async()
            .await;
        let update = server
            .mock("PUT", "/api/nutanix/v3/webhooks/uuid-1")
            .match_body(Matcher::Json(request_json(callback, &["VM.ON", "VM.OFF"], 2)))
            .with_status(200)
            .with_body(
                webhook_json("uuid-1", callback, &["VM.ON", "VM.OFF"], 3, "COMPLETE").to_string(),
            )
            .create_async()
            .await;
        let update_foreign = server
            .mock("PUT", "/api/nutanix/v3/webhooks/uuid-foreign")
            .expect(0)
            .create_async()
            .await;

        let webhook = reconciler(&server, 8080)
            .ensure_subscription(&[EventType::VmOff])
            .await?;

        assert_eq!(webhook.events(), ["VM.ON".to_string(), "VM.OFF".to_string()]);
        update.assert_async().await;
        update_foreign.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_pending_response_triggers_single_confirmation() -> Result<()> {
        let mut server = Server::new_async().await;
        let callback = "http://10.0.0.2:8080/listener/callback";
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![]))
            .create_async()
            .await;
        let _create = server
            .mock("POST", CREATE_PATH)
            .with_status(202)
            .with_body(webhook_json("uuid-1", callback, &["VM.ON"], 0, "PENDING").to_string())
            .create_async()
            .await;
        let confirm = server
            .mock("GET", "/api/nutanix/v3/webhooks/uuid-1")
            .with_status(200)
            .with_body(webhook_json("uuid-1", callback, &["VM.ON"], 0, "PENDING").to_string())
            .expect(1)
            .create_async()
            .await;

        let webhook = reconciler(&server, 8080)
            .ensure_subscription(&[EventType::VmOn])
            .await?;

        assert_eq!(webhook.state(), SubscriptionState::Pending);
        confirm.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_confirmation_failure_does_not_fail_registration() -> Result<()> {
        let mut server = Server::new_async().await;
        let callback = "http://10.0.0.2:8080/listener/callback";
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![]))
            .create_async()
            .await;
        let _create = server
            .mock("POST", CREATE_PATH)
            .with_status(202)
            .with_body(webhook_json("uuid-1", callback, &["VM.ON"], 0, "PENDING").to_string())
            .create_async()
            .await;
        let confirm = server
            .mock("GET", "/api/nutanix/v3/webhooks/uuid-1")
            .with_status(500)
            .with_body("internal error")
            .expect(1)
            .create_async()
            .await;

        let result = reconciler(&server, 8080)
            .ensure_subscription(&[EventType::VmOn])
            .await;

        assert!(result.is_ok());
        confirm.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_completed_response_skips_confirmation() -> Result<()> {
        let mut server = Server::new_async().await;
        let callback = "http://10.0.0.2:8080/listener/callback";
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![]))
            .create_async()
            .await;
        let _create = server
            .mock("POST", CREATE_PATH)
            .with_status(202)
            .with_body(webhook_json("uuid-1", callback, &["VM.ON"], 0, "COMPLETE").to_string())
            .create_async()
            .await;
        let confirm = server
            .mock("GET", "/api/nutanix/v3/webhooks/uuid-1")
            .expect(0)
            .create_async()
            .await;

        reconciler(&server, 8080)
            .ensure_subscription(&[EventType::VmOn])
            .await?;

        confirm.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_list_failure_aborts() -> Result<()> {
        let mut server = Server::new_async().await;
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;
        let create = server.mock("POST", CREATE_PATH).expect(0).create_async().await;

        let result = reconciler(&server, 8080)
            .ensure_subscription(&[EventType::VmOn])
            .await;

        assert!(matches!(result, Err(ListenerError::Request { status: 401, .. })));
        create.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_list_body_aborts() -> Result<()> {
        let mut server = Server::new_async().await;
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let result = reconciler(&server, 8080)
            .ensure_subscription(&[EventType::VmOn])
            .await;

        assert!(matches!(result, Err(ListenerError::Serialization(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_failure_aborts() -> Result<()> {
        let mut server = Server::new_async().await;
        let callback = "http://10.0.0.2:8080/listener/callback";
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![webhook_json("uuid-1", callback, &["VM.ON"], 7, "COMPLETE")]))
            .create_async()
            .await;
        let _update = server
            .mock("PUT", "/api/nutanix/v3/webhooks/uuid-1")
            .with_status(409)
            .with_body("spec_version mismatch")
            .create_async()
            .await;

        let result = reconciler(&server, 8080)
            .ensure_subscription(&[EventType::VmOff])
            .await;

        assert!(matches!(result, Err(ListenerError::Request { status: 409, .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_subscription() -> Result<()> {
        let mut server = Server::new_async().await;
        let callback = "http://10.0.0.2:8080/listener/callback";
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![webhook_json("uuid-1", callback, &["VM.ON"], 1, "COMPLETE")]))
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/api/nutanix/v3/webhooks/uuid-1")
            .with_status(202)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        assert!(reconciler(&server, 8080).delete_subscription().await?);
        delete.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_without_subscription() -> Result<()> {
        let mut server = Server::new_async().await;
        let _list = server
            .mock("POST", LIST_PATH)
            .with_status(200)
            .with_body(list_json(vec![]))
            .create_async()
            .await;

        assert!(!reconciler(&server, 8080).delete_subscription().await?);
        Ok(())
    }
}
