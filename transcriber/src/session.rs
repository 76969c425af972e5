use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use shared_protocol::{AuthRequest, BlockKind, ModelSelection, SelectionError, TranscriptBlock};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::info;
use uuid::Uuid;

use crate::config::ModelRegistry;
use crate::model::TranscriptionModel;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

macro_rules! bail {
    ($ws_sender:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        let _ = $ws_sender.send(Message::Text(msg.clone())).await;
        let _ = $ws_sender.send(Message::Close(None)).await;
        return Err(anyhow::anyhow!(msg));
    }};
}

/// One accepted connection, start to finish: authenticate, negotiate a
/// model, then stream audio in and transcript blocks out until the client
/// disconnects or an error ends the session.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<ModelRegistry>,
    expected_api_key: String,
) -> Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let session_id = Uuid::new_v4();

    // The first message must authenticate the client:
    let auth: AuthRequest = match receive_json(&mut ws_receiver).await {
        Ok(auth) => auth,
        Err(e) => bail!(ws_sender, "Authentication Failed: {e}"),
    };
    if auth.api_key != expected_api_key {
        bail!(ws_sender, "Authentication Failed: Invalid key");
    }

    // Then the client picks one of the offered models:
    let options = serde_json::to_string(&registry.options())?;
    ws_sender.send(Message::Text(options)).await?;

    let selection: ModelSelection = match receive_json(&mut ws_receiver).await {
        Ok(selection) => selection,
        Err(e) => {
            let msg = format!("Model Selection Failed: {e}");
            return Err(reject_selection(&mut ws_sender, msg).await);
        }
    };
    let model = match registry.build(&selection.model_key) {
        Ok(model) => model,
        Err(_) => {
            let msg = format!(
                "Model Selection Failed: Invalid model_key {}",
                selection.model_key
            );
            return Err(reject_selection(&mut ws_sender, msg).await);
        }
    };

    info!(
        "session {session_id}: streaming with model {}",
        selection.model_key
    );
    let result = serve_transcription(ws_sender, ws_receiver, model).await;
    info!("session {session_id}: ended");
    result
}

/// Runs the audio loop for an already-negotiated model. `unload` runs
/// exactly once on every exit path after a successful `load`.
pub async fn serve_transcription<S>(
    mut ws_sender: SplitSink<WebSocketStream<S>, Message>,
    mut ws_receiver: SplitStream<WebSocketStream<S>>,
    mut model: Box<dyn TranscriptionModel>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = model.load() {
        bail!(ws_sender, "Transcription error: {e}");
    }

    let result = pump_audio(&mut ws_sender, &mut ws_receiver, model.as_mut()).await;
    model.unload();

    match result {
        Ok(()) => {
            let _ = ws_sender.send(Message::Close(None)).await;
            Ok(())
        }
        Err(e) => bail!(ws_sender, "Transcription error: {e}"),
    }
}

async fn pump_audio<S>(
    ws_sender: &mut SplitSink<WebSocketStream<S>, Message>,
    ws_receiver: &mut SplitStream<WebSocketStream<S>>,
    model: &mut dyn TranscriptionModel,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = ws_receiver.next().await {
        match frame? {
            Message::Binary(data) => {
                for block in model.queue_chunk(&data)? {
                    log_block(&block);
                    ws_sender
                        .send(Message::Text(serde_json::to_string(&block)?))
                        .await?;
                }
            }
            Message::Ping(data) => ws_sender.send(Message::Pong(data)).await?,
            Message::Pong(_) | Message::Frame(_) => {}
            Message::Text(_) => {
                anyhow::bail!("unexpected text message during audio streaming")
            }
            Message::Close(_) => return Ok(()),
        }
    }
    Ok(())
}

/// One JSON text frame within the handshake timeout, or an error naming
/// what went wrong.
async fn receive_json<T, S>(ws_receiver: &mut SplitStream<WebSocketStream<S>>) -> Result<T>
where
    T: DeserializeOwned,
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(HANDSHAKE_TIMEOUT, ws_receiver.next()).await {
        Err(_) => Err(anyhow::anyhow!("no message received in time")),
        Ok(None) => Err(anyhow::anyhow!("connection closed")),
        Ok(Some(Ok(Message::Text(text)))) => Ok(serde_json::from_str(&text)?),
        Ok(Some(Ok(_))) => Err(anyhow::anyhow!("expected a JSON text message")),
        Ok(Some(Err(e))) => Err(e.into()),
    }
}

/// Sends the structured selection error and closes; the returned error
/// ends the session.
async fn reject_selection<S>(
    ws_sender: &mut SplitSink<WebSocketStream<S>, Message>,
    msg: String,
) -> anyhow::Error
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let payload =
        serde_json::to_string(&SelectionError::new(msg.clone())).unwrap_or_else(|_| msg.clone());
    let _ = ws_sender.send(Message::Text(payload)).await;
    let _ = ws_sender.send(Message::Close(None)).await;
    anyhow::anyhow!(msg)
}

fn log_block(block: &TranscriptBlock) {
    match block.kind {
        BlockKind::Final => info!(
            "[{:6.2} - {:6.2}] Final      : {}",
            block.start, block.end, block.text
        ),
        BlockKind::InProgress => info!(
            "[{:6.2} - {:6.2}] In Progress: {}",
            block.start, block.end, block.text
        ),
    }
}
