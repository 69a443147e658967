//! The kiosk's main loop: frames in, side effects out, reconnect on drop.

use crate::{
    config::Config,
    console::{Console, HeadlessPlayer},
};
use anyhow::Context;
use kiosk_core::{Collaborators, Session, SessionOptions};
use kiosk_realtime::{Backoff, ConnectionManager, ConnectionOptions, ConnectionState, FrameReceiver};
use std::{future::Future, pin::Pin, sync::Arc, time::Duration};
use tokio::time::{Sleep, sleep, timeout};
use tracing::{Instrument, debug, info, info_span, warn};

/// How long shutdown waits for queued playback to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// A headless kiosk: one backend connection driving one session.
pub struct Kiosk {
    connection: ConnectionManager,
    frames: FrameReceiver,
    session: Session,
    backoff: Backoff,
    console: Arc<Console>,
}

impl Kiosk {
    /// Builds the kiosk. Must be called from within a Tokio runtime.
    pub fn new(config: &Config) -> Self {
        let (connection, frames) = ConnectionManager::new(ConnectionOptions {
            keepalive: config.keepalive,
        });
        let console = Arc::new(Console::new());
        let player = Arc::new(HeadlessPlayer::new());
        let io = Collaborators {
            microphone: console.clone(),
            subtitle: console.clone(),
            config: console.clone(),
            playback: player.clone(),
            interrupter: player,
            notifier: console.clone(),
            history: console.clone(),
            advertisements: console.clone(),
            video: console.clone(),
            outbound: Arc::new(connection.clone()),
        };
        let session = Session::new(
            SessionOptions {
                base_url: config.base_url.clone(),
                auto_start_mic_on_conversation_end: config.auto_start_mic_on_conversation_end,
            },
            io,
        );
        Self {
            connection,
            frames,
            session,
            backoff: Backoff::new(config.reconnect_initial, config.reconnect_max),
            console,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Connects to `address` and runs until `shutdown` resolves.
    ///
    /// Dropped connections are retried with exponential backoff. On shutdown
    /// queued playback gets a bounded grace period before the socket is closed.
    pub async fn run<F>(mut self, address: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        // Subscribe first so a dial that fails right away is still observed.
        let mut states = self.connection.subscribe_state();
        self.connection
            .connect(address)
            .context("Failed to start backend connection")?;
        let mut retry: Option<Pin<Box<Sleep>>> = None;
        tokio::pin!(shutdown);

        let span = info_span!("kiosk_session", %address);
        async {
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Shutdown requested.");
                        break;
                    }
                    frame = self.frames.recv() => match frame {
                        Some(raw) => {
                            self.session.handle_frame(&raw);
                            let applied = self.session.tick();
                            if applied > 0 {
                                debug!(applied, "Applied staged model info.");
                            }
                        }
                        None => {
                            warn!("Frame stream ended.");
                            break;
                        }
                    },
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *states.borrow_and_update();
                        match state {
                            ConnectionState::Open => {
                                info!("Backend connection open.");
                                self.backoff.reset();
                                retry = None;
                            }
                            ConnectionState::Closed if retry.is_none() => {
                                let delay = self.backoff.next_delay();
                                warn!(delay_ms = delay.as_millis() as u64, "Backend connection closed; scheduling reconnect.");
                                retry = Some(Box::pin(sleep(delay)));
                            }
                            _ => debug!(%state, "Connection state changed."),
                        }
                    }
                    _ = next_retry(&mut retry) => {
                        retry = None;
                        self.connection.reconnect();
                    }
                }
            }
        }
        .instrument(span)
        .await;

        if timeout(DRAIN_TIMEOUT, self.session.wait_idle()).await.is_err() {
            warn!("Playback did not drain before shutdown.");
        }
        self.connection.disconnect();
        if timeout(
            CLOSE_TIMEOUT,
            states.wait_for(|state| *state == ConnectionState::Closed),
        )
        .await
        .is_err()
        {
            warn!("Backend connection did not close cleanly.");
        }
        info!("Kiosk stopped.");
        Ok(())
    }
}

async fn next_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(delay) => delay.as_mut().await,
        None => std::future::pending().await,
    }
}
