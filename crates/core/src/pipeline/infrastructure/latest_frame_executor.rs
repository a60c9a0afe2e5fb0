use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::pipeline::redact_frame_use_case::{RedactFrameUseCase, RedactedFrame};
use crate::shared::error::FrameError;
use crate::shared::frame::Frame;

/// Result for one frame that reached the worker.
#[derive(Debug)]
pub struct FrameOutcome {
    pub index: usize,
    pub result: Result<RedactedFrame, FrameError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutorStats {
    pub processed: usize,
    pub dropped: usize,
}

/// Runs a [`RedactFrameUseCase`] on a worker thread, always processing the
/// newest submitted frame.
///
/// Layout: `submit → [1 pending slot] → worker → results`
///
/// At most one frame waits while the worker is busy. Submitting another
/// replaces it, and the replaced frame is counted as dropped. Frames reach
/// the worker in submission order, so tracker state stays consistent.
pub struct LatestFrameExecutor {
    frame_tx: Option<Sender<Frame>>,
    // Second handle on the slot, used to evict a stale frame
    slot_rx: Receiver<Frame>,
    results_rx: Receiver<FrameOutcome>,
    worker: Option<JoinHandle<usize>>,
    dropped: usize,
}

impl LatestFrameExecutor {
    pub fn spawn(mut use_case: RedactFrameUseCase) -> Self {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(1);
        let (results_tx, results_rx) = crossbeam_channel::unbounded::<FrameOutcome>();
        let slot_rx = frame_rx.clone();

        let worker = std::thread::spawn(move || {
            let mut processed = 0;
            for frame in frame_rx {
                let index = frame.index();
                let result = use_case.process(frame);
                processed += 1;
                if results_tx.send(FrameOutcome { index, result }).is_err() {
                    break;
                }
            }
            use_case.log_summary();
            processed
        });

        Self {
            frame_tx: Some(frame_tx),
            slot_rx,
            results_rx,
            worker: Some(worker),
            dropped: 0,
        }
    }

    /// Hand a frame to the worker without blocking.
    pub fn submit(&mut self, frame: Frame) -> Result<(), Box<dyn std::error::Error>> {
        let tx = self.frame_tx.as_ref().ok_or("executor already finished")?;
        match tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(frame)) => {
                // The worker may take the pending frame first; then nothing is dropped
                if let Ok(stale) = self.slot_rx.try_recv() {
                    self.dropped += 1;
                    log::debug!("Dropping frame {} for frame {}", stale.index(), frame.index());
                }
                // Only this side sends, so the slot is free now
                tx.try_send(frame)
                    .map_err(|_| "frame slot still occupied".into())
            }
            Err(TrySendError::Disconnected(_)) => Err("pipeline worker stopped".into()),
        }
    }

    /// Handle for receiving results as they are produced. Keeps working
    /// after [`finish`](Self::finish).
    pub fn results(&self) -> Receiver<FrameOutcome> {
        self.results_rx.clone()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Stop accepting frames, let the worker finish the pending one, and
    /// join it.
    pub fn finish(mut self) -> Result<ExecutorStats, Box<dyn std::error::Error>> {
        self.frame_tx.take();
        let processed = match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| "pipeline worker panicked")?,
            None => 0,
        };
        Ok(ExecutorStats {
            processed,
            dropped: self.dropped,
        })
    }
}

impl Drop for LatestFrameExecutor {
    fn drop(&mut self) {
        self.frame_tx.take();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
