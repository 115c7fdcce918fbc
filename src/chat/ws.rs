use std::{sync::Arc, time::Duration};

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{AppState, db::Store};

use super::{
    ClientEvent, ConnId, Hub, OUTBOX_CAPACITY, ServerEvent,
    journal::{Journal, Write},
};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[debug_handler(state = AppState)]
pub async fn chat_ws(
    State(hub): State<Arc<Hub>>,
    State(store): State<Store>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(async move |stream| serve(hub, store, stream).await)
}

async fn serve(hub: Arc<Hub>, store: Store, stream: WebSocket) {
    let conn: ConnId = Uuid::now_v7();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOX_CAPACITY);
    hub.connect(conn, tx);
    let (journal, _writer) = Journal::spawn(store);

    let (mut sender, mut receiver) = stream.split();

    let mut outbox_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(%conn, error = %e, "unserializable event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => handle_event(&hub, &journal, conn, event).await,
            Err(e) => {
                debug!(%conn, error = %e, "malformed frame");
                hub.send_to(
                    conn,
                    ServerEvent::Error {
                        reason: format!("malformed event: {e}"),
                    },
                );
            }
        }
    }

    handle_disconnect(&hub, &journal, conn).await;

    // the hub dropped our outbox, so the task ends once it has flushed
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut outbox_task).await.is_err() {
        outbox_task.abort();
    }
}

/// Runs one client event against the hub. Refusals go back to the sender as
/// a single event; storage writes are queued on the connection's journal and
/// never hold up delivery.
pub async fn handle_event(hub: &Hub, journal: &Journal, conn: ConnId, event: ClientEvent) {
    let result = match event {
        ClientEvent::Join(request) => match hub.join(conn, request) {
            Ok(participant) => {
                journal.record(Write::Profile(participant)).await;
                Ok(())
            }
            Err(e) => Err(e),
        },
        ClientEvent::FindPartner { desired_filter } => hub.find_partner(conn, desired_filter).map(drop),
        ClientEvent::CancelSearch => {
            hub.cancel_search(conn);
            Ok(())
        }
        ClientEvent::SendMessage(message) => match hub.send_message(conn, message) {
            Ok(delivery) => {
                journal.record(Write::Message(delivery)).await;
                Ok(())
            }
            Err(e) => Err(e),
        },
        ClientEvent::Leave => hub.leave(conn).map(drop),
        ClientEvent::StartChat { target_id } => hub.start_chat(conn, target_id).map(drop),
        ClientEvent::RequestUsers => hub.request_users(conn),
    };

    if let Err(e) = result {
        debug!(%conn, code = e.code(), error = %e, "request refused");
        hub.send_to(conn, e.into());
    }
}

/// Tears down whatever `conn` held and queues the offline mark behind its
/// earlier writes.
pub async fn handle_disconnect(hub: &Hub, journal: &Journal, conn: ConnId) {
    if let Some(participant) = hub.disconnect(conn) {
        journal.record(Write::Offline(participant)).await;
    }
}
