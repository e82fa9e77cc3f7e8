//! Credit-gated streaming relay.
//!
//! Runs from the moment credits are deducted: opens the upstream
//! stream (falling back to the direct transport if the primary dies
//! before its first chunk), normalizes and forwards events as they
//! arrive, and closes out with exactly one transaction log call plus
//! message persistence. After the first event has been sent, every
//! failure is delivered in-band as an `error` event — the response
//! headers are already committed by then.

pub mod normalize;
pub mod repair;

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clients::engine::{EngineChunk, EngineError, EngineStream, UpstreamEngine};
use crate::clients::ledger::CreditLedger;
use crate::history::MessageStore;
use crate::models::billing::{TransactionRecord, TransactionStatus};
use crate::models::chat::PredictionRequest;
use self::normalize::{StreamEvent, normalize_chunk};

/// Bounded forwarding channel: backpressure against slow clients, and
/// a dropped receiver stops upstream pulls at the next send.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Client-facing stream events, serialized as newline-delimited JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum RelayEvent {
    /// Always the first event of a stream.
    Session { session_id: String },
    Token { data: String },
    Metadata { data: serde_json::Value },
    /// Synthetic terminal event for failures after streaming started.
    Error { message: String },
    End,
}

/// A relay run for one admitted prediction.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub user_id: String,
    pub prediction: PredictionRequest,
    /// Cost already deducted by the credit gate; echoed into the
    /// transaction log entry.
    pub cost: i64,
}

/// What a finished stream accumulated.
#[derive(Debug, Default)]
struct StreamOutcome {
    content: String,
    metadata: Vec<serde_json::Value>,
    delivered: usize,
}

/// Streams upstream output to one client per request.
#[derive(Clone)]
pub struct StreamRelay {
    engine: Arc<dyn UpstreamEngine>,
    ledger: Arc<dyn CreditLedger>,
    history: Arc<dyn MessageStore>,
}

impl StreamRelay {
    pub fn new(
        engine: Arc<dyn UpstreamEngine>,
        ledger: Arc<dyn CreditLedger>,
        history: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            engine,
            ledger,
            history,
        }
    }

    /// Start relaying. Events arrive on the returned channel as they
    /// are produced; the worker runs to its terminal state even if the
    /// receiver is dropped, so the transaction is always logged.
    pub fn stream(&self, request: RelayRequest) -> mpsc::Receiver<RelayEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let relay = self.clone();
        tokio::spawn(async move {
            relay.run(request, tx).await;
        });
        rx
    }

    async fn run(&self, request: RelayRequest, tx: mpsc::Sender<RelayEvent>) {
        let mut outcome = StreamOutcome::default();

        if tx
            .send(RelayEvent::Session {
                session_id: request.prediction.session_id.clone(),
            })
            .await
            .is_err()
        {
            self.finish(&request, &outcome, TransactionStatus::Failed, Some("client disconnected".into()))
                .await;
            return;
        }

        let mut chunks = match self.open_with_fallback(&request.prediction).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(flow_id = %request.prediction.flow_id, error = %e, "both engine transports failed");
                let _ = tx
                    .send(RelayEvent::Error {
                        message: "Upstream engine unavailable".into(),
                    })
                    .await;
                self.finish(&request, &outcome, TransactionStatus::Failed, Some(e.to_string()))
                    .await;
                return;
            }
        };

        let mut client_gone = false;
        let mut stream_error: Option<String> = None;
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => match normalize_chunk(chunk) {
                    None => debug!("dropped malformed upstream fragment"),
                    Some(StreamEvent::End) => break,
                    Some(StreamEvent::Token(data)) => {
                        outcome.content.push_str(&data);
                        outcome.delivered += 1;
                        if tx.send(RelayEvent::Token { data }).await.is_err() {
                            client_gone = true;
                            break;
                        }
                    }
                    Some(StreamEvent::Metadata(value)) => {
                        outcome.metadata.push(value.clone());
                        outcome.delivered += 1;
                        if tx.send(RelayEvent::Metadata { data: value }).await.is_err() {
                            client_gone = true;
                            break;
                        }
                    }
                },
                Err(e) => {
                    stream_error = Some(e.to_string());
                    break;
                }
            }
        }

        if client_gone {
            info!(
                session_id = %request.prediction.session_id,
                delivered = outcome.delivered,
                "client disconnected mid-stream"
            );
            self.finish(&request, &outcome, TransactionStatus::Failed, Some("client disconnected".into()))
                .await;
        } else if let Some(message) = stream_error {
            warn!(session_id = %request.prediction.session_id, error = %message, "upstream stream failed");
            let _ = tx
                .send(RelayEvent::Error {
                    message: "Upstream stream failed".into(),
                })
                .await;
            self.finish(&request, &outcome, TransactionStatus::Failed, Some(message))
                .await;
        } else {
            let _ = tx.send(RelayEvent::End).await;
            self.finish(&request, &outcome, TransactionStatus::Success, None)
                .await;
        }
    }

    /// Open the primary streaming transport; if it fails to yield even
    /// a first chunk, retry the same logical request over the direct
    /// transport. Invisible to the client except for latency.
    async fn open_with_fallback(
        &self,
        prediction: &PredictionRequest,
    ) -> Result<EngineStream, EngineError> {
        match self.engine.stream_prediction(prediction).await {
            Ok(mut stream) => match stream.next().await {
                Some(Ok(first)) => {
                    let replayed = futures_util::stream::iter([Ok(first)]).chain(stream);
                    Ok(Box::pin(replayed) as EngineStream)
                }
                Some(Err(e)) => {
                    warn!(error = %e, "primary transport failed before first chunk, using direct transport");
                    self.direct_stream(prediction).await
                }
                None => {
                    warn!("primary transport closed before first chunk, using direct transport");
                    self.direct_stream(prediction).await
                }
            },
            Err(e) => {
                warn!(error = %e, "primary transport failed to open, using direct transport");
                self.direct_stream(prediction).await
            }
        }
    }

    async fn direct_stream(
        &self,
        prediction: &PredictionRequest,
    ) -> Result<EngineStream, EngineError> {
        let value = self.engine.direct_prediction(prediction).await?;
        Ok(Box::pin(futures_util::stream::iter([Ok(
            EngineChunk::Parsed(value),
        )])))
    }

    /// Terminal bookkeeping: exactly one transaction log call per run,
    /// success and failure alike; log failures are swallowed. Persist
    /// the merged message on success, or whatever partial content was
    /// streamed before a failure.
    async fn finish(
        &self,
        request: &RelayRequest,
        outcome: &StreamOutcome,
        status: TransactionStatus,
        detail: Option<String>,
    ) {
        let record = TransactionRecord::new(
            &request.user_id,
            &request.prediction.flow_id,
            &request.prediction.session_id,
            request.cost,
            status,
            detail,
        );
        if let Err(e) = self.ledger.log_transaction(&record).await {
            warn!(error = %e, "failed to log transaction");
        }

        if status == TransactionStatus::Success || !outcome.content.is_empty() {
            if let Err(e) = self
                .history
                .append_assistant_message(
                    &request.user_id,
                    &request.prediction.session_id,
                    &outcome.content,
                    &outcome.metadata,
                )
                .await
            {
                warn!(error = %e, "failed to persist assistant message");
            }
        }
    }
}
