//! Audio streaming pipeline.
//!
//! [`AudioStream`] consumes a session's event queue on a background task,
//! decodes every SND frame into an [`AudioPacket`], and keeps the server
//! from timing out the session with a keepalive once per second. The
//! stream ends when the requested duration has elapsed (the session is
//! hung up), when the session reports a terminal error (delivered as the
//! last item), or when the event queue closes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use kiwisdr_core::{Result, SessionEvent, Tag};

use crate::audio::{AudioPacket, AudioPacketDecoder};
use crate::codec::CMD_KEEPALIVE;
use crate::session::Session;

/// Interval between keepalive commands.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Decoded packets buffered ahead of the consumer.
pub const AUDIO_QUEUE_CAPACITY: usize = 500;

/// Decoded audio from one session.
///
/// Items are `Ok` packets, `Err` for a packet that failed to decode (the
/// stream continues), and finally the session's terminal error if it ended
/// on one. Dropping the stream hangs up the session.
pub struct AudioStream {
    rx: mpsc::Receiver<Result<AudioPacket>>,
    driver: JoinHandle<()>,
}

impl AudioStream {
    /// Start streaming audio from `session` for `duration`.
    ///
    /// A session can be streamed once; a second call fails with
    /// [`Error::StreamClosed`](kiwisdr_core::Error::StreamClosed).
    pub async fn start(session: Arc<Session>, duration: Duration) -> Result<Self> {
        let events = session.take_events().await?;
        let decoder = AudioPacketDecoder::new(session.config().compression);
        let (tx, rx) = mpsc::channel(AUDIO_QUEUE_CAPACITY);

        tracing::debug!(
            session = session.id(),
            duration_ms = duration.as_millis() as u64,
            compressed = decoder.is_compressed(),
            "Audio stream started"
        );

        let driver = tokio::spawn(drive(session, events, decoder, tx, duration));
        Ok(AudioStream { rx, driver })
    }

    /// Next item, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Result<AudioPacket>> {
        self.rx.recv().await
    }

    /// Wait for the driver task to finish after the stream has ended.
    pub async fn finished(self) {
        let _ = self.driver.await;
    }
}

impl Stream for AudioStream {
    type Item = Result<AudioPacket>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ---------------------------------------------------------------------------
// Driver task
// ---------------------------------------------------------------------------

async fn drive(
    session: Arc<Session>,
    mut events: mpsc::Receiver<SessionEvent>,
    mut decoder: AudioPacketDecoder,
    tx: mpsc::Sender<Result<AudioPacket>>,
    duration: Duration,
) {
    let id = session.id();
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    let mut keepalive =
        tokio::time::interval_at(Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = &mut deadline => {
                tracing::debug!(session = id, "Stream duration elapsed");
                session.hang_up().await;
                break;
            }

            _ = tx.closed() => {
                tracing::debug!(session = id, "Audio consumer gone");
                session.hang_up().await;
                break;
            }

            _ = keepalive.tick() => {
                if let Err(e) = session.send(CMD_KEEPALIVE).await {
                    tracing::trace!(session = id, error = %e, "Keepalive failed");
                }
            }

            event = events.recv() => match event {
                Some(SessionEvent::Frame(frame)) if frame.tag == Tag::SND => {
                    let item = decoder.decode(&frame.payload);
                    if let Err(e) = &item {
                        tracing::debug!(session = id, error = %e, "Dropping undecodable packet");
                    }
                    if tx.send(item).await.is_err() {
                        session.hang_up().await;
                        break;
                    }
                }
                Some(SessionEvent::Frame(_)) => {}
                Some(SessionEvent::Error(e)) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
                None => break,
            },
        }
    }

    tracing::debug!(session = id, "Audio stream ended");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use kiwisdr_core::{Error, SessionConfig, Tuning};
    use kiwisdr_test_harness::{MockKiwi, Outbound};

    async fn session_with(mock: &MockKiwi, config: SessionConfig) -> Arc<Session> {
        let (reader, writer) = mock.transport();
        let session =
            Session::from_transport(7, config, Tuning::default(), Box::new(reader), Box::new(writer))
                .await
                .unwrap();
        Arc::new(session)
    }

    fn snd(sequence: i32, samples: &[u8]) -> Vec<u8> {
        let mut payload = vec![0u8];
        payload.extend_from_slice(&sequence.to_le_bytes());
        payload.extend_from_slice(&[0x00, 0x20]);
        payload.extend_from_slice(samples);
        payload
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalives_then_hang_up() {
        let mock = MockKiwi::new();
        let session = session_with(&mock, SessionConfig::default()).await;
        let handshake = mock.outbound().len();

        let mut stream = AudioStream::start(Arc::clone(&session), Duration::from_secs(3))
            .await
            .unwrap();
        assert!(stream.recv().await.is_none());

        let keepalives = mock.count_sent(CMD_KEEPALIVE);
        assert!((2..=3).contains(&keepalives), "sent {keepalives} keepalives");

        let tail = mock.outbound().split_off(handshake);
        assert_eq!(tail.len(), keepalives + 1);
        assert!(tail[..keepalives].iter().all(|o| matches!(o, Outbound::Text(_))));
        assert_eq!(tail[keepalives], Outbound::Close);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_independent_of_traffic() {
        let mock = MockKiwi::new();
        let session = session_with(&mock, SessionConfig::default()).await;
        for i in 0..50 {
            mock.push_snd(&snd(i, &[0, 1]));
        }

        let mut stream = AudioStream::start(session, Duration::from_millis(2500))
            .await
            .unwrap();
        let mut packets = 0;
        while let Some(item) = stream.recv().await {
            item.unwrap();
            packets += 1;
        }
        assert_eq!(packets, 50);
        assert_eq!(mock.count_sent(CMD_KEEPALIVE), 2);
    }

    #[tokio::test]
    async fn test_decode_error_does_not_end_stream() {
        let mock = MockKiwi::new();
        let session = session_with(&mock, SessionConfig::default()).await;
        mock.push_snd(&snd(1, &[0x00, 0x10]));
        mock.push_snd(&[0x00, 0x01, 0x02]);
        mock.push_snd(&snd(2, &[0xFF, 0xFE]));
        mock.disconnect();

        let mut stream = AudioStream::start(session, Duration::from_secs(60))
            .await
            .unwrap();

        let first = stream.recv().await.unwrap().unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.smeter, 0x0020);
        assert_eq!(first.samples, vec![0x0010]);

        assert!(matches!(stream.recv().await, Some(Err(Error::Decode(_)))));

        let third = stream.recv().await.unwrap().unwrap();
        assert_eq!(third.samples, vec![-2]);

        assert!(matches!(stream.recv().await, Some(Err(Error::ConnectionLost))));
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_terminal_error_is_last_item() {
        let mock = MockKiwi::new();
        let session = session_with(&mock, SessionConfig::default()).await;
        mock.push_msg("audio_init=0");
        mock.push_frame(b"W_F\x01\x02");
        mock.push_msg("too_busy=1");

        let mut stream = AudioStream::start(session, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(stream.recv().await, Some(Err(Error::ServerTooBusy))));
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_compressed_stream_uses_adpcm() {
        let mock = MockKiwi::new();
        let config = SessionConfig {
            compression: true,
            ..SessionConfig::default()
        };
        let session = session_with(&mock, config).await;
        assert!(mock.sent_texts().contains(&"SET compression=1".to_string()));

        mock.push_snd(&snd(1, &[0x07]));
        mock.push_snd(&snd(2, &[0x8C]));
        mock.disconnect();

        let stream = AudioStream::start(session, Duration::from_secs(60))
            .await
            .unwrap();
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().samples, vec![11, 13]);
        assert_eq!(items[1].as_ref().unwrap().samples, vec![-2, -4]);
        assert!(matches!(items[2], Err(Error::ConnectionLost)));
    }

    #[tokio::test]
    async fn test_second_stream_is_rejected() {
        let mock = MockKiwi::new();
        let session = session_with(&mock, SessionConfig::default()).await;
        let _first = AudioStream::start(Arc::clone(&session), Duration::from_secs(60))
            .await
            .unwrap();
        let second = AudioStream::start(session, Duration::from_secs(60)).await;
        assert!(matches!(second, Err(Error::StreamClosed)));
    }

    #[tokio::test]
    async fn test_dropping_stream_hangs_up() {
        let mock = MockKiwi::new();
        let session = session_with(&mock, SessionConfig::default()).await;
        let stream = AudioStream::start(Arc::clone(&session), Duration::from_secs(60))
            .await
            .unwrap();
        drop(stream);

        tokio::time::timeout(Duration::from_secs(2), session.closed())
            .await
            .unwrap();
        assert_eq!(mock.close_count(), 1);
    }
}
