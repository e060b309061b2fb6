//! Server push channel
//!
//! The backend pushes `task_stats_update` and `system_status_update` over
//! Socket.IO to clients that have sent `subscribe_task_updates` and
//! `subscribe_system_status`. Decoded events land on the same
//! [`UpdateBus`] the pollers publish to, so views do not care where an
//! update came from. When the channel cannot be opened the pollers keep
//! everything current on their own.

use futures::FutureExt;
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::Payload;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::events::{UpdateBus, UpdateEvent, SYSTEM_STATUS_UPDATE, TASK_STATS_UPDATE};

pub const SUBSCRIBE_TASK_UPDATES: &str = "subscribe_task_updates";
pub const SUBSCRIBE_SYSTEM_STATUS: &str = "subscribe_system_status";

/// Turn one pushed message into an update; unknown or malformed ones yield `None`
pub fn decode(name: &str, payload: Payload) -> Option<UpdateEvent> {
    let value = match payload {
        Payload::Text(values) => values.into_iter().next()?,
        _ => {
            debug!(event = name, "ignoring non-JSON push payload");
            return None;
        }
    };
    match UpdateEvent::from_named(name, value) {
        Ok(event) => event,
        Err(e) => {
            warn!(event = name, error = %e, "malformed push event");
            None
        }
    }
}

/// Decode and publish; returns whether anything reached the bus
pub fn relay(bus: &UpdateBus, name: &str, payload: Payload) -> bool {
    match decode(name, payload) {
        Some(event) => {
            bus.publish(event);
            true
        }
        None => false,
    }
}

async fn connect(api: &ApiClient, bus: &UpdateBus) -> Result<Client, rust_socketio::Error> {
    let mut builder = ClientBuilder::new(api.base_url().as_str());
    if let Some(cookie) = api.session_cookie() {
        builder = builder.opening_header("Cookie", cookie);
    }

    for name in [TASK_STATS_UPDATE, SYSTEM_STATUS_UPDATE] {
        let bus = bus.clone();
        builder = builder.on(name, move |payload: Payload, _: Client| {
            relay(&bus, name, payload);
            async {}.boxed()
        });
    }

    let client = builder
        .on("error", |err: Payload, _: Client| {
            async move { warn!(error = ?err, "push channel error") }.boxed()
        })
        .on("close", |_: Payload, _: Client| {
            async move { info!("push channel closed") }.boxed()
        })
        .connect()
        .await?;

    // The subscribe handlers take no arguments
    for event in [SUBSCRIBE_TASK_UPDATES, SUBSCRIBE_SYSTEM_STATUS] {
        client.emit(event, Payload::Text(Vec::new())).await?;
    }
    Ok(client)
}

/// Open the push channel in the background. The connection lives as long as
/// the returned task; aborting it closes the socket.
pub fn spawn_listener(api: ApiClient, bus: UpdateBus) -> JoinHandle<()> {
    tokio::spawn(async move {
        match connect(&api, &bus).await {
            Ok(_client) => {
                info!(server = %api.base_url(), "push channel subscribed");
                std::future::pending::<()>().await;
            }
            Err(e) => warn!(error = %e, "push channel unavailable, polling only"),
        }
    })
}
