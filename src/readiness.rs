//! Host-side frame readiness detection.
//!
//! A parent document cannot reliably observe when a cross-origin frame finishes
//! loading, so readiness is taken from whichever of four independent signals fires
//! first:
//!
//! 1. the element's load event ([`ReadinessDetector::notify_load`])
//! 2. a `frame-ready` message whose source is the frame's content window
//! 3. polling the content document; `Complete` counts, and so does a cross-origin
//!    access refusal, since the browser only refuses once the frame has navigated
//! 4. a fallback timeout
//!
//! The flag is set once. Later signals are ignored and the race task exits as soon as
//! any producer wins or the detector is dropped.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ReadinessConfig;
use crate::frame::{DocumentState, FrameElement};
use crate::transport::MessageEvent;
use crate::types::{Message, MessageKind};

/// The signal that made a frame ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySignal {
    Load,
    FrameReady,
    DocumentComplete,
    CrossOrigin,
    Timeout,
}

impl fmt::Display for ReadySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadySignal::Load => "load event",
            ReadySignal::FrameReady => "frame-ready message",
            ReadySignal::DocumentComplete => "document poll",
            ReadySignal::CrossOrigin => "cross-origin poll",
            ReadySignal::Timeout => "fallback timeout",
        };
        f.write_str(name)
    }
}

/// Timing for the polling and fallback producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessTiming {
    pub poll_interval: Duration,
    pub fallback_timeout: Duration,
}

impl Default for ReadinessTiming {
    fn default() -> Self {
        ReadinessTiming::from(&ReadinessConfig::default())
    }
}

impl From<&ReadinessConfig> for ReadinessTiming {
    fn from(config: &ReadinessConfig) -> Self {
        Self { poll_interval: config.poll_interval(), fallback_timeout: config.fallback_timeout() }
    }
}

/// Set-once readiness flag shared by every producer.
#[derive(Clone)]
struct ReadyFlag {
    tx: Arc<watch::Sender<Option<ReadySignal>>>,
}

impl ReadyFlag {
    fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Returns true only for the call that actually set the flag.
    fn set(&self, signal: ReadySignal) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(signal);
            true
        })
    }

    fn get(&self) -> Option<ReadySignal> {
        *self.tx.borrow()
    }
}

/// Races readiness signals for one frame element.
pub struct ReadinessDetector {
    flag: ReadyFlag,
    cancel: CancellationToken,
}

impl ReadinessDetector {
    /// Start racing. `events` is the host's validated event feed, used to spot
    /// `frame-ready` from this frame.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        frame: Arc<dyn FrameElement>,
        events: broadcast::Receiver<MessageEvent>,
        timing: ReadinessTiming,
    ) -> Self {
        let flag = ReadyFlag::new();
        let cancel = CancellationToken::new();

        tokio::spawn(race(frame, events, timing, flag.clone(), cancel.clone()));

        Self { flag, cancel }
    }

    /// The element's load event fired.
    pub fn notify_load(&self) -> bool {
        self.mark_ready(ReadySignal::Load)
    }

    /// Set readiness from `signal` unless already set. Returns whether this call won.
    pub fn mark_ready(&self, signal: ReadySignal) -> bool {
        let won = self.flag.set(signal);
        if won {
            debug!("Frame ready via {}", signal);
        } else {
            trace!("Ignoring {}: frame already ready", signal);
        }
        won
    }

    pub fn is_ready(&self) -> bool {
        self.flag.get().is_some()
    }

    /// The winning signal, if any.
    pub fn signal(&self) -> Option<ReadySignal> {
        self.flag.get()
    }

    /// Wait until ready. Returns `None` if the detector is torn down first.
    pub async fn wait_ready(&self) -> Option<ReadySignal> {
        let mut rx = self.flag.tx.subscribe();
        tokio::select! {
            _ = self.cancel.cancelled() => self.flag.get(),
            result = rx.wait_for(Option::is_some) => result.ok().and_then(|state| *state),
        }
    }

    /// Stop all pending timers and listeners.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ReadinessDetector {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Direct document check, shared by the immediate probe and the poll.
fn probe(frame: &dyn FrameElement) -> Option<ReadySignal> {
    match frame.document_state() {
        Ok(DocumentState::Complete) => Some(ReadySignal::DocumentComplete),
        Ok(_) => None,
        Err(e) => {
            trace!("Document probe refused ({}), treating frame as ready", e);
            Some(ReadySignal::CrossOrigin)
        }
    }
}

fn is_frame_ready_from(event: &MessageEvent, frame: &dyn FrameElement) -> bool {
    let Some(window) = frame.content_window() else {
        return false;
    };
    if event.source != Some(window.id()) {
        return false;
    }
    Message::from_event_data(&event.data).is_some_and(|m| m.kind == MessageKind::FrameReady)
}

/// Next event from the feed; pends forever once the feed is gone.
async fn next_event(events: &mut Option<broadcast::Receiver<MessageEvent>>) -> Option<MessageEvent> {
    let Some(rx) = events.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Readiness detector lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

async fn race(
    frame: Arc<dyn FrameElement>,
    events: broadcast::Receiver<MessageEvent>,
    timing: ReadinessTiming,
    flag: ReadyFlag,
    cancel: CancellationToken,
) {
    let finish = |signal: ReadySignal| {
        if flag.set(signal) {
            debug!("Frame ready via {}", signal);
        }
    };

    if let Some(signal) = probe(frame.as_ref()) {
        finish(signal);
        return;
    }

    let period = timing.poll_interval.max(Duration::from_millis(1));
    let mut poll = interval_at(Instant::now() + period, period);
    let fallback = tokio::time::sleep(timing.fallback_timeout);
    tokio::pin!(fallback);

    let mut events = Some(events);
    let mut state = flag.tx.subscribe();

    loop {
        if flag.get().is_some() {
            trace!("Readiness already decided, race ends");
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                trace!("Readiness detection cancelled");
                return;
            }
            _ = state.changed() => {}
            _ = poll.tick() => {
                if let Some(signal) = probe(frame.as_ref()) {
                    finish(signal);
                    return;
                }
            }
            event = next_event(&mut events) => match event {
                Some(event) => {
                    if is_frame_ready_from(&event, frame.as_ref()) {
                        finish(ReadySignal::FrameReady);
                        return;
                    }
                }
                None => {
                    debug!("Host event feed closed, frame-ready signal unavailable");
                    events = None;
                }
            },
            _ = &mut fallback => {
                finish(ReadySignal::Timeout);
                return;
            }
        }
    }
}
