//! WebSocket frame transport built on `tokio-tungstenite`.
//!
//! Binary and text messages are both delivered as raw frames; ping/pong is
//! answered by tungstenite itself and never surfaces. A close message from
//! the server ends the read side with [`Error::ConnectionLost`].

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use kiwisdr_core::{Error, FrameReader, FrameWriter, Result};

/// Read half of a WebSocket connection.
pub struct WsFrameReader<S = MaybeTlsStream<TcpStream>> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Write half of a WebSocket connection.
pub struct WsFrameWriter<S = MaybeTlsStream<TcpStream>> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

/// Open a WebSocket to `url` and split it into frame reader and writer.
pub async fn connect(url: &Url) -> Result<(WsFrameReader, WsFrameWriter)> {
    tracing::debug!(url = %url, "Connecting to KiwiSDR");
    let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::Transport(format!("WebSocket connect to {url} failed: {e}")))?;
    Ok(split(ws))
}

/// Split an established WebSocket into frame reader and writer.
pub fn split<S>(ws: WebSocketStream<S>) -> (WsFrameReader<S>, WsFrameWriter<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = ws.split();
    (WsFrameReader { stream }, WsFrameWriter { sink })
}

#[async_trait]
impl<S> FrameReader for WsFrameReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Text(text))) => return Ok(Bytes::copy_from_slice(text.as_bytes())),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(frame = ?frame, "WebSocket closed by server");
                    return Err(Error::ConnectionLost);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(Error::Transport(format!("WebSocket read failed: {e}")));
                }
                None => return Err(Error::ConnectionLost),
            }
        }
    }
}

#[async_trait]
impl<S> FrameWriter for WsFrameWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(Message::text(text.to_owned()))
            .await
            .map_err(|e| Error::Transport(format!("WebSocket write failed: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: String::new().into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| Error::Transport(format!("WebSocket close failed: {e}")))
    }
}
