//! Signals the controller emits for its host to render.

use tokio::sync::mpsc;

use crate::breakdown::BreakdownProposal;
use crate::context_switch::ContextSwitchDecision;
use crate::flow::FlowStage;
use crate::session::SessionHandle;
use crate::task::TaskId;

#[derive(Debug, Clone, PartialEq)]
pub enum FlowSignal {
    Loading(bool),
    Error(String),
    StageChanged(FlowStage),
    TaskCreated(TaskId),
    BreakdownProposed(BreakdownProposal),
    /// `None` when nothing significant was detected (or evaluation failed).
    SwitchDecision(Option<ContextSwitchDecision>),
    SessionLaunched(SessionHandle),
}

/// Sending half held by the controller. A gone host is not an error.
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: mpsc::UnboundedSender<FlowSignal>,
}

impl SignalSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FlowSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, signal: FlowSignal) {
        let _ = self.tx.send(signal);
    }
}

/// Drain whatever is queued without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<FlowSignal>) -> Vec<FlowSignal> {
    let mut out = Vec::new();
    while let Ok(sig) = rx.try_recv() {
        out.push(sig);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_after_receiver_dropped_is_silent() {
        let (sink, rx) = SignalSink::channel();
        drop(rx);
        sink.emit(FlowSignal::Loading(true));
    }

    #[test]
    fn drain_returns_in_order() {
        let (sink, mut rx) = SignalSink::channel();
        sink.emit(FlowSignal::Loading(true));
        sink.emit(FlowSignal::TaskCreated(TaskId(3)));
        assert_eq!(
            drain(&mut rx),
            vec![FlowSignal::Loading(true), FlowSignal::TaskCreated(TaskId(3))]
        );
        assert!(drain(&mut rx).is_empty());
    }
}
