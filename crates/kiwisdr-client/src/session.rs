//! KiwiSDR WebSocket session.
//!
//! [`Session`] owns one connection to a KiwiSDR: it dials the server, starts
//! the background receive task, logs in, and then exposes the inbound event
//! queue and a send operation for further commands.
//!
//! The receive task is the only reader of the transport. It publishes a
//! [`SessionEvent`] for every frame on a bounded queue, folds MSG parameters
//! into the session's [`Info`] table, and ends the session when the server
//! reports a terminal condition. All writes (handshake, keepalives, hang-up
//! and the teardown close) go through one async mutex.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use kiwisdr_core::{
    Error, FrameReader, FrameWriter, Result, SessionConfig, SessionEvent, Tag, Tuning,
};

use crate::codec;
use crate::dialer::Dialer;
use crate::info::Info;
use crate::ws;

/// Capacity of the inbound event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 100;

type SharedWriter = Arc<Mutex<Box<dyn FrameWriter>>>;

/// A logged-in connection to a KiwiSDR.
///
/// The session is safe to share across tasks (`Arc<Session>`); sends are
/// serialized internally. Its event queue has exactly one consumer, taken
/// with [`take_events()`](Session::take_events).
pub struct Session {
    id: i64,
    config: SessionConfig,
    tuning: Tuning,

    /// Server-reported key/value table, written by the receive task.
    info: Arc<Mutex<Info>>,

    /// Write half of the transport; the lock is the session's send lock.
    writer: SharedWriter,

    /// Inbound events until a consumer takes them.
    events: Mutex<Option<mpsc::Receiver<SessionEvent>>>,

    /// Background receive task handle.
    receive_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Dial the server named in `config` and log in.
    ///
    /// The attempt runs under the dialer's lock, so concurrent connects
    /// through the same [`Dialer`] are spaced apart. A failed dial is
    /// returned as-is; nothing is retried.
    pub async fn connect(dialer: &Dialer, config: SessionConfig, tuning: Tuning) -> Result<Self> {
        dialer
            .serialize(async {
                let id = dialer.ids().next_id();
                let host = codec::normalize_server_host(&config.server_host);
                let url = codec::session_url(&host, id, config.kind)?;
                let (reader, writer) = ws::connect(&url).await?;
                Session::from_transport(id, config, tuning, Box::new(reader), Box::new(writer))
                    .await
            })
            .await
    }

    /// Start a session over an already-open transport.
    ///
    /// Spawns the receive task, then sends the login handshake. If any
    /// handshake command fails to send, the receive task is stopped and the
    /// error returned.
    pub async fn from_transport(
        id: i64,
        config: SessionConfig,
        tuning: Tuning,
        reader: Box<dyn FrameReader>,
        writer: Box<dyn FrameWriter>,
    ) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let info = Arc::new(Mutex::new(Info::new()));
        let writer: SharedWriter = Arc::new(Mutex::new(writer));

        let receive_handle = {
            let info = Arc::clone(&info);
            let writer = Arc::clone(&writer);
            tokio::spawn(async move {
                receive_loop(id, reader, info, event_tx, writer).await;
            })
        };

        let session = Session {
            id,
            config,
            tuning,
            info,
            writer,
            events: Mutex::new(Some(event_rx)),
            receive_handle: Mutex::new(Some(receive_handle)),
        };

        for command in codec::handshake_commands(&session.config, &session.tuning) {
            if let Err(e) = session.send(&command).await {
                tracing::debug!(session = id, error = %e, "Handshake failed");
                session.abort().await;
                return Err(e);
            }
        }

        tracing::debug!(
            session = id,
            kind = %session.config.kind,
            freq_hz = session.tuning.freq_hz,
            mode = session.tuning.mode.name,
            "KiwiSDR session started"
        );
        Ok(session)
    }

    /// Send one text command.
    pub async fn send(&self, command: &str) -> Result<()> {
        tracing::trace!(session = self.id, command = %command, "Sending command");
        let mut writer = self.writer.lock().await;
        writer.send_text(command).await
    }

    /// Ask the server to close the connection.
    ///
    /// Failures are logged and swallowed, including writing to a connection
    /// the server has already closed.
    pub async fn hang_up(&self) {
        tracing::debug!(session = self.id, "Hanging up");
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.close().await {
            tracing::warn!(session = self.id, error = %e, "Hang-up close failed");
        }
    }

    /// Take the inbound event queue.
    ///
    /// The queue has a single consumer: the second call fails with
    /// [`Error::StreamClosed`].
    pub async fn take_events(&self) -> Result<mpsc::Receiver<SessionEvent>> {
        self.events.lock().await.take().ok_or(Error::StreamClosed)
    }

    /// Snapshot of the server-reported information table.
    pub async fn info(&self) -> Info {
        self.info.lock().await.clone()
    }

    /// A single server-reported value.
    pub async fn info_value(&self, key: &str) -> Option<String> {
        self.info.lock().await.get(key).map(str::to_string)
    }

    /// Wait for the receive task to finish its teardown.
    pub async fn closed(&self) {
        let handle = self.receive_handle.lock().await.take();
        if let Some(h) = handle {
            let _ = h.await;
        }
    }

    /// Session id used in the connection path.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    async fn abort(&self) {
        if let Some(h) = self.receive_handle.lock().await.take() {
            h.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Receive task
// ---------------------------------------------------------------------------

/// Background task: read frames until the session ends, then tear down.
///
/// Teardown closes the event queue (by dropping the sender) before the
/// best-effort close frame is written.
async fn receive_loop(
    id: i64,
    mut reader: Box<dyn FrameReader>,
    info: Arc<Mutex<Info>>,
    events: mpsc::Sender<SessionEvent>,
    writer: SharedWriter,
) {
    match receive_frames(reader.as_mut(), &info, &events).await {
        Ok(()) => tracing::debug!(session = id, "Event consumer gone, stopping receive"),
        Err(e) => {
            tracing::debug!(session = id, error = %e, "Session ended");
            let _ = events.send(SessionEvent::Error(e)).await;
        }
    }
    drop(events);

    let mut w = writer.lock().await;
    if let Err(e) = w.close().await {
        tracing::debug!(session = id, error = %e, "Teardown close failed");
    }
}

/// Read and dispatch frames.
///
/// Returns `Ok` when the consumer dropped the queue and `Err` with the
/// terminal error otherwise.
async fn receive_frames(
    reader: &mut dyn FrameReader,
    info: &Mutex<Info>,
    events: &mpsc::Sender<SessionEvent>,
) -> Result<()> {
    loop {
        let raw = reader.read_frame().await?;
        if raw.len() < 64 {
            tracing::trace!(raw = ?raw, "Frame received");
        }

        let frame = codec::split_frame(raw)?;
        let msg_payload = (frame.tag == Tag::MSG).then(|| frame.payload.clone());

        if events.send(SessionEvent::Frame(frame)).await.is_err() {
            return Ok(());
        }

        if let Some(payload) = msg_payload {
            let params = codec::parse_msg(&payload);
            let mut info = info.lock().await;
            info.apply(&params);
            if let Some(e) = info.terminal_error() {
                return Err(e);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
