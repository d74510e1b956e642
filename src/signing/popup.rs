//! Approval popup channel
//!
//! Signing requests are handed to the UI as [`PendingApproval`] items on an
//! mpsc queue. Each carries a oneshot responder, so the reply is correlated
//! with the request that produced it and a late reply to an abandoned
//! request goes nowhere.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::blockchains::Blockchain;
use crate::signing::SignPayload;

/// Event name approval requests are dispatched under
pub const POPOUT_EVENT: &str = "popout";

/// Kind of popup being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    Sign,
}

/// Request shown to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupRequest {
    pub payload: SignPayload,
    pub origin: String,
    pub blockchain: Blockchain,
    pub required_fields: Map<String, Value>,
    #[serde(rename = "type")]
    pub kind: RequestType,
    pub id: u64,
}

/// Decision carried back from the popup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopupResult {
    #[serde(default)]
    pub accepted: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Popup reply, `{result: {accepted, ...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopupResponse {
    #[serde(default)]
    pub result: Option<PopupResult>,
}

impl PopupResponse {
    pub fn accepted() -> Self {
        Self::decided(true)
    }

    pub fn rejected() -> Self {
        Self::decided(false)
    }

    /// A reply without a result
    pub fn empty() -> Self {
        Self { result: None }
    }

    fn decided(accepted: bool) -> Self {
        Self {
            result: Some(PopupResult {
                accepted,
                extra: Map::new(),
            }),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.result.as_ref().map(|r| r.accepted).unwrap_or(false)
    }
}

/// Outbound channel to whatever renders approval popups
#[async_trait]
pub trait ApprovalChannel: Send + Sync {
    /// Dispatch `request` under `event` and wait for the correlated reply
    async fn request(&self, event: &str, request: PopupRequest) -> PopupResponse;
}

/// A request waiting for the user
#[derive(Debug)]
pub struct PendingApproval {
    pub event: String,
    pub request: PopupRequest,
    responder: oneshot::Sender<PopupResponse>,
}

impl PendingApproval {
    /// Reply to the request. Returns false if the requester is gone.
    pub fn respond(self, response: PopupResponse) -> bool {
        let id = self.request.id;
        let delivered = self.responder.send(response).is_ok();
        if !delivered {
            debug!("Dropping late popup response for request {}", id);
        }
        delivered
    }

    pub fn accept(self) -> bool {
        self.respond(PopupResponse::accepted())
    }

    pub fn reject(self) -> bool {
        self.respond(PopupResponse::rejected())
    }
}

/// Approval channel backed by an in-process queue
#[derive(Clone)]
pub struct PopupBridge {
    sender: mpsc::Sender<PendingApproval>,
}

/// UI end of a [`PopupBridge`]
pub struct PopupReceiver {
    receiver: mpsc::Receiver<PendingApproval>,
}

impl PopupBridge {
    /// Create a bridge with room for `capacity` undelivered requests
    pub fn channel(capacity: usize) -> (PopupBridge, PopupReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (PopupBridge { sender }, PopupReceiver { receiver })
    }
}

impl PopupReceiver {
    pub async fn recv(&mut self) -> Option<PendingApproval> {
        self.receiver.recv().await
    }
}

#[async_trait]
impl ApprovalChannel for PopupBridge {
    async fn request(&self, event: &str, request: PopupRequest) -> PopupResponse {
        let id = request.id;
        let (responder, reply) = oneshot::channel();
        let pending = PendingApproval {
            event: event.to_string(),
            request,
            responder,
        };

        if self.sender.send(pending).await.is_err() {
            warn!("Popup receiver closed, request {} cannot be shown", id);
            return PopupResponse::empty();
        }

        match reply.await {
            Ok(response) => response,
            Err(_) => {
                warn!("Popup for request {} closed without a response", id);
                PopupResponse::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: u64) -> PopupRequest {
        PopupRequest {
            payload: SignPayload::default(),
            origin: "test".to_string(),
            blockchain: Blockchain::PPY,
            required_fields: Map::new(),
            kind: RequestType::Sign,
            id,
        }
    }

    #[test]
    fn test_response_parsing() {
        let accepted: PopupResponse =
            serde_json::from_str(r#"{"result":{"accepted":true,"note":"ok"}}"#).unwrap();
        assert!(accepted.is_accepted());
        assert_eq!(accepted.result.unwrap().extra["note"], "ok");

        let missing_flag: PopupResponse = serde_json::from_str(r#"{"result":{}}"#).unwrap();
        assert!(!missing_flag.is_accepted());

        let missing_result: PopupResponse = serde_json::from_str("{}").unwrap();
        assert!(!missing_result.is_accepted());
    }

    #[test]
    fn test_request_wire_shape() {
        let json = serde_json::to_value(request(7)).unwrap();
        assert_eq!(json["type"], "SIGN");
        assert_eq!(json["id"], 7);
        assert_eq!(json["blockchain"], "ppy");
        assert_eq!(json["requiredFields"], serde_json::json!({}));
        assert_eq!(json["origin"], "test");
        assert!(json.get("payload").is_some());
    }

    #[tokio::test]
    async fn test_out_of_order_replies_are_correlated() {
        let (bridge, mut ui) = PopupBridge::channel(4);

        let first = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.request(POPOUT_EVENT, request(1)).await }
        });
        let a = ui.recv().await.unwrap();

        let second = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.request(POPOUT_EVENT, request(2)).await }
        });
        let b = ui.recv().await.unwrap();

        assert_eq!(a.event, POPOUT_EVENT);
        assert_eq!((a.request.id, b.request.id), (1, 2));
        assert!(b.reject());
        assert!(a.accept());

        assert!(first.await.unwrap().is_accepted());
        assert!(!second.await.unwrap().is_accepted());
    }

    #[tokio::test]
    async fn test_dropped_popup_counts_as_empty() {
        let (bridge, mut ui) = PopupBridge::channel(1);
        let waiting = tokio::spawn(async move { bridge.request(POPOUT_EVENT, request(3)).await });

        drop(ui.recv().await.unwrap());
        assert_eq!(waiting.await.unwrap(), PopupResponse::empty());
    }

    #[tokio::test]
    async fn test_closed_receiver() {
        let (bridge, ui) = PopupBridge::channel(1);
        drop(ui);
        assert_eq!(bridge.request(POPOUT_EVENT, request(4)).await, PopupResponse::empty());
    }

    #[tokio::test]
    async fn test_late_reply_after_abandon() {
        let (bridge, mut ui) = PopupBridge::channel(1);
        let waiting = tokio::spawn(async move { bridge.request(POPOUT_EVENT, request(5)).await });

        let pending = ui.recv().await.unwrap();
        waiting.abort();
        let _ = waiting.await;

        assert!(!pending.accept());
    }
}
