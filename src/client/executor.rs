//! Request lifecycle management.
//!
//! A [`RequestExecutor`] owns the observable [`RequestState`] of one logical
//! query. Every `execute` call gets a fresh [`RequestToken`]; a completion
//! only reaches the state if its token is still the current one, so the most
//! recently issued request always wins regardless of network ordering.
//! Superseded transport calls are not aborted, their results are dropped on
//! arrival.

use crate::client::transport::{RawResponse, Transport};
use crate::error::{ErrorInfo, Result, TrendsError};
use crate::models::RequestDescriptor;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Identifies one issued request within an executor. Strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable lifecycle of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState<T> {
    Idle,
    Loading,
    Success(T),
    Error(ErrorInfo),
}

impl<T> RequestState<T> {
    pub fn is_idle(&self) -> bool {
        matches!(self, RequestState::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            RequestState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            RequestState::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            RequestState::Idle => "idle",
            RequestState::Loading => "loading",
            RequestState::Success(_) => "success",
            RequestState::Error(_) => "error",
        }
    }
}

/// How an issued request ended from the executor's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The result became the visible state.
    Applied,
    /// A newer request or a reset superseded this one; the result was dropped.
    Discarded,
}

/// Converts a successful response body into the executor's data type.
pub type Decoder<T> = Arc<dyn Fn(&RequestDescriptor, Value) -> Result<T> + Send + Sync>;

#[derive(Debug)]
struct Slot<T> {
    issued: u64,
    current: Option<RequestToken>,
    state: RequestState<T>,
}

/// Drives the idle → loading → success/error lifecycle of one query.
pub struct RequestExecutor<T> {
    transport: Arc<dyn Transport>,
    decoder: Decoder<T>,
    slot: Arc<watch::Sender<Slot<T>>>,
}

impl<T> Clone for RequestExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            decoder: Arc::clone(&self.decoder),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl RequestExecutor<Value> {
    /// Executor whose success data is the raw JSON body.
    pub fn raw(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, |_, body| Ok(body))
    }
}

impl<T> RequestExecutor<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F>(transport: Arc<dyn Transport>, decoder: F) -> Self
    where
        F: Fn(&RequestDescriptor, Value) -> Result<T> + Send + Sync + 'static,
    {
        let (slot, _) = watch::channel(Slot {
            issued: 0,
            current: None,
            state: RequestState::Idle,
        });

        Self {
            transport,
            decoder: Arc::new(decoder),
            slot: Arc::new(slot),
        }
    }

    /// Issue a request. The state is `Loading` when this returns.
    ///
    /// Invalid descriptors fail immediately with a user input error and leave
    /// the state untouched. Must be called from within a tokio runtime.
    pub fn execute(&self, descriptor: RequestDescriptor) -> Result<PendingRequest> {
        descriptor.validate()?;

        let mut token = RequestToken(0);
        self.slot.send_modify(|slot| {
            slot.issued += 1;
            token = RequestToken(slot.issued);
            slot.current = Some(token);
            slot.state = RequestState::Loading;
        });

        info!("Issuing {} request {}", descriptor.endpoint(), token);

        let transport = Arc::clone(&self.transport);
        let decoder = Arc::clone(&self.decoder);
        let slot = Arc::clone(&self.slot);

        let handle = tokio::spawn(async move {
            let outcome = resolve(transport.as_ref(), &decoder, &descriptor).await;
            complete(&slot, token, outcome)
        });

        Ok(PendingRequest { token, handle })
    }

    /// Return to `Idle`, invalidating any request still in flight.
    pub fn reset(&self) {
        self.slot.send_modify(|slot| {
            if let Some(token) = slot.current.take() {
                debug!("Reset invalidates request {}", token);
            }
            slot.state = RequestState::Idle;
        });
    }

    /// Snapshot of the visible state.
    pub fn state(&self) -> RequestState<T> {
        self.slot.borrow().state.clone()
    }

    /// Token of the request allowed to update the state, if any.
    pub fn current_token(&self) -> Option<RequestToken> {
        self.slot.borrow().current
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> StateWatcher<T> {
        StateWatcher {
            rx: self.slot.subscribe(),
        }
    }
}

fn complete<T>(
    slot: &watch::Sender<Slot<T>>,
    token: RequestToken,
    outcome: Result<T>,
) -> Completion {
    let applied = slot.send_if_modified(|slot| {
        if slot.current != Some(token) {
            return false;
        }
        slot.state = match outcome {
            Ok(data) => RequestState::Success(data),
            Err(err) => {
                warn!("Request {} failed: {}", token, err);
                RequestState::Error(ErrorInfo::from(&err))
            }
        };
        true
    });

    if applied {
        debug!("Request {} applied", token);
        Completion::Applied
    } else {
        debug!("Request {} superseded, result discarded", token);
        Completion::Discarded
    }
}

async fn resolve<T>(
    transport: &dyn Transport,
    decoder: &Decoder<T>,
    descriptor: &RequestDescriptor,
) -> Result<T> {
    let response = transport.fetch(descriptor).await?;
    let body = check_response(response)?;
    decoder(descriptor, body)
}

/// Classify a raw response: non-success status is a network error, an
/// `error` field in the body is an API error, anything else is data.
pub fn check_response(response: RawResponse) -> Result<Value> {
    if !response.is_success() {
        let detail = error_field(&response.body).unwrap_or_else(|| {
            if response.status_text.is_empty() {
                format!("HTTP {}", response.status)
            } else {
                response.status_text.clone()
            }
        });
        return Err(TrendsError::network(
            format!("API request failed: {}", detail),
            Some(response.status),
        ));
    }

    if let Some(message) = error_field(&response.body) {
        return Err(TrendsError::api(message));
    }

    Ok(response.body)
}

fn error_field(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Handle to an issued request. Awaiting it yields its [`Completion`];
/// dropping it does not cancel anything.
#[derive(Debug)]
pub struct PendingRequest {
    token: RequestToken,
    handle: JoinHandle<Completion>,
}

impl PendingRequest {
    pub fn token(&self) -> RequestToken {
        self.token
    }
}

impl Future for PendingRequest {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.handle.poll_unpin(cx) {
            Poll::Ready(Ok(completion)) => Poll::Ready(completion),
            Poll::Ready(Err(e)) => {
                warn!("Request {} task ended abnormally: {}", self.token, e);
                Poll::Ready(Completion::Discarded)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Receives state changes of one executor.
pub struct StateWatcher<T> {
    rx: watch::Receiver<Slot<T>>,
}

impl<T: Clone> StateWatcher<T> {
    pub fn current(&self) -> RequestState<T> {
        self.rx.borrow().state.clone()
    }

    /// Wait for the next state change. `None` once the executor is gone.
    pub async fn changed(&mut self) -> Option<RequestState<T>> {
        self.rx.changed().await.ok()?;
        let state = self.rx.borrow_and_update().state.clone();
        Some(state)
    }
}
