//! Group broadcast of relay messages.
//!
//! A message from a connection is delivered, unmodified, to every member of
//! the opposite class. Pushes to different recipients are independent: one
//! failing recipient never stops delivery to the rest.
//!
//! Relaying counts as activity: the sender and every recipient that was
//! delivered to have their registry expiry pushed out.
use crate::registry::Registry;
use crate::relay::Settings;
use crate::transport::{PushError, Transport};
use entity_api::{connection_class::ConnectionClass, ConnectionId};
use futures::stream::{self, StreamExt};
use log::*;

/// What happened to one relay message. Only used for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// `None` when the sender is not in the registry or could not be read.
    pub sender_class: Option<ConnectionClass>,
    pub recipients: usize,
    pub delivered: usize,
    pub stale: usize,
    pub failed: usize,
    /// Stale recipients removed from the registry afterwards.
    pub pruned: usize,
}

pub async fn dispatch(
    registry: &dyn Registry,
    transport: &dyn Transport,
    settings: &Settings,
    sender_id: &str,
    payload: &str,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    let sender_class = match registry.get(sender_id).await {
        Ok(Some(entry)) => entry.class,
        Ok(None) => {
            debug!("Dropping message from unregistered connection {sender_id}");
            return report;
        }
        Err(err) => {
            warn!("Could not resolve the class of {sender_id}, dropping message: {err}");
            return report;
        }
    };
    report.sender_class = Some(sender_class);

    if !sender_class.is_assigned() {
        debug!("Dropping message from unidentified connection {sender_id}");
        return report;
    }
    let target_class = sender_class.opposite();

    let recipients = match registry.list_by_class(target_class).await {
        Ok(recipients) => recipients,
        Err(err) => {
            warn!("Could not list {target_class} connections, dropping message: {err}");
            return report;
        }
    };
    report.recipients = recipients.len();

    let results: Vec<(ConnectionId, Result<(), PushError>)> = stream::iter(recipients)
        .map(|recipient| async move {
            let result = transport.push(&recipient.id, payload).await;
            (recipient.id, result)
        })
        .buffer_unordered(settings.max_fanout.max(1))
        .collect()
        .await;

    let mut stale = Vec::new();
    let mut active = vec![sender_id.to_string()];
    for (recipient_id, result) in results {
        match result {
            Ok(()) => {
                report.delivered += 1;
                active.push(recipient_id);
            }
            Err(err) if err.is_stale() => {
                warn!("Recipient {recipient_id} is gone: {err}");
                report.stale += 1;
                stale.push(recipient_id);
            }
            Err(err) => {
                warn!("Failed to deliver to {recipient_id}: {err}");
                report.failed += 1;
            }
        }
    }

    if settings.prune_stale {
        for recipient_id in stale {
            match registry.delete(&recipient_id).await {
                Ok(()) => report.pruned += 1,
                Err(err) => warn!("Could not prune stale connection {recipient_id}: {err}"),
            }
        }
    }

    stream::iter(active)
        .for_each_concurrent(settings.max_fanout.max(1), |id| async move {
            if let Err(err) = registry.refresh(&id).await {
                warn!("Could not refresh expiry of connection {id}: {err}");
            }
        })
        .await;

    debug!("Relayed message from {sender_id} ({sender_class}) to {target_class}: {report:?}");
    report
}
