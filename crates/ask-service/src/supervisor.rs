//! Connection lifecycle loop.
//!
//! Connect, drain lifecycle events until the socket closes, then either stop
//! (logged out), or back off and reconnect while the policy allows it.

use std::sync::Arc;

use ask_core::messaging::{ConnectionUpdate, DisconnectReason, LifecycleEvent, OutboundImage};
use ask_core::reconnect::ReconnectPolicy;
use tracing::{debug, error, info, warn};

use crate::context::AppContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    LoggedOut,
    Exhausted { attempts: u32 },
}

struct SessionEnd {
    reason: DisconnectReason,
    opened: bool,
}

pub async fn run_supervisor(ctx: Arc<AppContext>, policy: ReconnectPolicy) -> SupervisorExit {
    let mut attempt: u32 = 0;
    loop {
        let creds = match ctx.store.read_creds() {
            Ok(creds) => creds,
            Err(err) => {
                warn!(error = %err, "stored credentials unreadable, connecting without them");
                None
            }
        };

        match ctx.client.connect(creds).await {
            Ok(()) => {
                let end = drive_session(&ctx).await;
                if end.opened {
                    attempt = 0;
                }
                if end.reason.is_terminal() {
                    info!("logged out, not reconnecting");
                    return SupervisorExit::LoggedOut;
                }
                info!(reason = ?end.reason, "connection closed");
            }
            Err(err) => warn!(error = %err, "connect failed"),
        }

        attempt += 1;
        let Some(delay) = policy.next_delay(attempt) else {
            error!(attempts = attempt - 1, "reconnect budget exhausted");
            return SupervisorExit::Exhausted {
                attempts: attempt - 1,
            };
        };
        ctx.status.lock().reconnect_attempts = attempt;
        info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
        tokio::time::sleep(delay).await;
    }
}

async fn drive_session(ctx: &AppContext) -> SessionEnd {
    let mut opened = false;
    loop {
        let Some(event) = ctx.client.next_event().await else {
            ctx.status.lock().mark_closed();
            return SessionEnd {
                reason: DisconnectReason::ConnectionLost,
                opened,
            };
        };
        match event {
            LifecycleEvent::Connection(ConnectionUpdate::Connecting) => {
                debug!("connecting");
            }
            LifecycleEvent::Connection(ConnectionUpdate::Open { user_id }) => {
                opened = true;
                ctx.status.lock().mark_open(&user_id);
                info!(user = %user_id, "connected successfully");
                send_welcome(ctx, &user_id).await;
            }
            LifecycleEvent::Connection(ConnectionUpdate::Close { reason }) => {
                ctx.status.lock().mark_closed();
                return SessionEnd { reason, opened };
            }
            LifecycleEvent::CredsUpdate(creds) => {
                if let Err(err) = ctx.store.save_creds(&creds) {
                    error!(error = %err, "failed to save updated credentials");
                }
            }
        }
    }
}

async fn send_welcome(ctx: &AppContext, user_id: &str) {
    if user_id.is_empty() {
        return;
    }
    let message = OutboundImage {
        to: user_id.to_string(),
        image_url: ctx.settings.welcome_image_url.clone(),
        caption: ctx.settings.welcome_caption(),
    };
    if let Err(err) = ctx.client.send_image(&message).await {
        warn!(error = %err, "welcome message not sent");
    }
}
