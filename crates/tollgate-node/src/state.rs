//! Shared node state for cross-task communication.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tollgate_ledger::{InternalTransferPort, Ledger};

use crate::commands::NodeCommand;

/// Shared state for the running node, accessible from HTTP handlers.
///
/// Handlers read the ledger directly; every mutation goes through
/// `command_tx` to the sequencer.
pub struct NodeState {
    /// When the node started.
    pub start_time: Instant,
    pub ledger: Arc<Ledger>,
    /// Backing token of the ledger.
    pub token: Arc<InternalTransferPort>,
    /// Channel to send commands to the sequencer.
    pub command_tx: mpsc::Sender<NodeCommand>,
}

impl NodeState {
    pub fn new(
        ledger: Arc<Ledger>,
        token: Arc<InternalTransferPort>,
        command_tx: mpsc::Sender<NodeCommand>,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            ledger,
            token,
            command_tx,
        }
    }
}
