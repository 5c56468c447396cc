use super::authority::{Applied, Effect};
use super::relay::Route;
use super::session::Session;
use crate::protocol::ServerMessage;
use crate::transport::Transport;
use crate::types::ConnectionId;

/// Push the effects of an accepted operation, in order.
///
/// Must be called while the session lock is held so every member sees the
/// same order. The snapshot is taken after the mutation.
pub fn deliver(transport: &dyn Transport, session: &Session, applied: Applied) {
    let members: Vec<ConnectionId> = session.members().cloned().collect();

    for effect in applied.effects {
        match effect {
            Effect::Snapshot => {
                let message = ServerMessage::SessionState {
                    session: session.snapshot(),
                };
                transport.broadcast(&members, &message, None);
            }
            Effect::Notify { to, message } => {
                transport.send(&to, message);
            }
            Effect::Announce(message) => {
                transport.broadcast(&members, &message, None);
            }
        }
    }
}

/// Forward a relayed message; unreachable targets are dropped silently
pub fn deliver_route(transport: &dyn Transport, route: Route, message: ServerMessage) {
    match route {
        Route::Direct(to) => {
            if !transport.send(&to, message) {
                tracing::debug!(target = %to, "Signaling target unreachable, dropped");
            }
        }
        Route::Flood(recipients) => {
            transport.broadcast(&recipients, &message, None);
        }
        Route::Unroutable => {
            tracing::debug!("Signaling envelope has no target, dropped");
        }
    }
}
