//! The Tollgate node orchestrator.
//!
//! Owns the ledger, its internal backing token and persistent storage.
//! Runs the HTTP API in a background task and applies every mutating
//! request in the sequencer loop, persisting the result before replying.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use tollgate_core::{Address, LedgerConfig};
use tollgate_crypto::keccak256;
use tollgate_ledger::{authorize, InternalTransferPort, Ledger, LedgerError, Role, SystemClock};

use crate::commands::NodeCommand;
use crate::config::NodeConfig;
use crate::state::NodeState;
use crate::storage::Storage;

const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Account that holds the internal token's custody balance.
pub fn custody_account() -> Address {
    let hash = keccak256(b"tollgate.custody");
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address(bytes)
}

/// Applies commands to the ledger one at a time.
pub struct Sequencer {
    ledger: Arc<Ledger>,
    token: Arc<InternalTransferPort>,
    storage: Option<Arc<Storage>>,
}

impl Sequencer {
    pub fn new(
        ledger: Arc<Ledger>,
        token: Arc<InternalTransferPort>,
        storage: Option<Arc<Storage>>,
    ) -> Self {
        Self {
            ledger,
            token,
            storage,
        }
    }

    /// Drain `command_rx` until every sender is gone.
    pub async fn run(&self, mut command_rx: mpsc::Receiver<NodeCommand>) {
        tracing::info!("sequencer started");
        while let Some(cmd) = command_rx.recv().await {
            self.handle(cmd).await;
        }
        tracing::info!("command channel closed, sequencer stopped");
    }

    /// Apply one command, persist on success, then reply.
    pub async fn handle(&self, cmd: NodeCommand) {
        let name = cmd.name();
        tracing::debug!(command = name, "applying command");
        let ledger = &self.ledger;

        match cmd {
            NodeCommand::Deposit {
                caller,
                amount,
                reply,
            } => {
                let result = ledger.deposit(caller, amount).await;
                self.finish(name, reply, result).await;
            }
            NodeCommand::RequestWithdraw { caller, reply } => {
                let result = ledger.request_withdraw(caller).await;
                self.finish(name, reply, result).await;
            }
            NodeCommand::Withdraw { caller, reply } => {
                let result = ledger.withdraw(caller).await;
                self.finish(name, reply, result).await;
            }
            NodeCommand::SetHoldTime {
                caller,
                seconds,
                reply,
            } => {
                let result = ledger.set_withdraw_hold_time(caller, seconds).await;
                self.finish(name, reply, result).await;
            }
            NodeCommand::TransferAdmin {
                caller,
                new_admin,
                reply,
            } => {
                let result = ledger.transfer_admin(caller, new_admin).await;
                self.finish(name, reply, result).await;
            }
            NodeCommand::ClaimFunds {
                caller,
                claims,
                reply,
            } => {
                let result = ledger.claim_funds(caller, &claims).await;
                self.finish(name, reply, result).await;
            }
            NodeCommand::AddHost {
                caller,
                url,
                operator,
                weight,
                reply,
            } => {
                let result = ledger.add_host(caller, url, operator, weight).await;
                self.finish(name, reply, result).await;
            }
            NodeCommand::RemoveHost {
                caller,
                operator,
                reply,
            } => {
                let result = ledger.remove_host(caller, operator).await;
                self.finish(name, reply, result).await;
            }
            NodeCommand::Pause { caller, reply } => {
                let result = ledger.pause(caller).await;
                self.finish(name, reply, result).await;
            }
            NodeCommand::Unpause { caller, reply } => {
                let result = ledger.unpause(caller).await;
                self.finish(name, reply, result).await;
            }
            NodeCommand::Mint {
                caller,
                account,
                amount,
                reply,
            } => {
                let config = ledger.config().await;
                let result = authorize(&config, &caller, Role::Admin)
                    .and_then(|()| self.token.mint(account, amount));
                self.finish(name, reply, result).await;
            }
        }
    }

    /// A success is only reported once it is on disk. When the write fails
    /// the caller gets an error; the change stays in memory and is carried by
    /// the next snapshot that does get written.
    async fn finish<T>(
        &self,
        command: &'static str,
        reply: tokio::sync::oneshot::Sender<Result<T, LedgerError>>,
        result: Result<T, LedgerError>,
    ) {
        let result = match result {
            Ok(value) => match self.persist().await {
                Ok(()) => Ok(value),
                Err(e) => {
                    tracing::error!(command, error = %e, "failed to persist ledger state");
                    Err(LedgerError::Internal(format!("state not persisted: {}", e)))
                }
            },
            Err(e) => {
                tracing::debug!(command, error = %e, "command rejected");
                Err(e)
            }
        };
        if reply.send(result).is_err() {
            tracing::warn!(command, "caller dropped the reply channel");
        }
    }

    /// Write the current snapshot and token holdings.
    async fn persist(&self) -> Result<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let snapshot = self.ledger.snapshot().await;
        storage.put_state(&snapshot, &self.token.holdings())
    }
}

/// The Tollgate node.
pub struct TollgateNode {
    /// Node configuration.
    config: NodeConfig,
    ledger: Arc<Ledger>,
    token: Arc<InternalTransferPort>,
    /// Persistent storage.
    storage: Option<Arc<Storage>>,
    /// Shared state accessible from HTTP handlers.
    node_state: Option<Arc<NodeState>>,
    /// Receives commands from the HTTP API.
    command_rx: Option<mpsc::Receiver<NodeCommand>>,
}

impl TollgateNode {
    /// Open storage and restore (or create) the ledger.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config.storage.data_dir)?);
        tracing::info!(path = %config.storage.data_dir.display(), "storage initialized");

        let token = Arc::new(InternalTransferPort::with_holdings(
            custody_account(),
            storage.get_holdings()?,
        ));

        let ledger = match storage.get_snapshot()? {
            Some(mut snapshot) => {
                snapshot.state.config = merge_ledger_config(&snapshot.state.config, &config.ledger);
                Ledger::restore(snapshot, token.clone(), Arc::new(SystemClock))
            }
            None => {
                tracing::info!("no snapshot found, starting empty ledger");
                Ledger::new(config.ledger.clone(), token.clone(), Arc::new(SystemClock))
            }
        };

        if config.ledger.admin.is_zero() {
            tracing::warn!("no admin configured, admin operations will be rejected");
        }

        Ok(Self {
            config,
            ledger: Arc::new(ledger),
            token,
            storage: Some(storage),
            node_state: None,
            command_rx: None,
        })
    }

    /// Start the HTTP API.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting Tollgate node");

        // Create the NodeCommand channel (HTTP API → sequencer)
        let (command_tx, command_rx) = mpsc::channel::<NodeCommand>(COMMAND_CHANNEL_CAPACITY);

        let node_state = Arc::new(NodeState::new(
            self.ledger.clone(),
            self.token.clone(),
            command_tx,
        ));

        let api_addr: SocketAddr = self.config.api_addr().parse()?;
        let api_state = node_state.clone();
        tokio::spawn(async move {
            if let Err(e) = crate::api::start_api_server(api_addr, api_state).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        });

        self.node_state = Some(node_state);
        self.command_rx = Some(command_rx);
        Ok(())
    }

    /// Run the sequencer until the command channel closes.
    pub async fn run(&mut self) -> Result<()> {
        let command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;

        let sequencer = Sequencer::new(self.ledger.clone(), self.token.clone(), self.storage.clone());
        sequencer.run(command_rx).await;
        Ok(())
    }

    /// Persist a final snapshot and close storage.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down Tollgate node");
        self.node_state = None;

        if let Some(storage) = self.storage.take() {
            storage.put_state(&self.ledger.snapshot().await, &self.token.holdings())?;
            drop(storage);
            tracing::info!("storage closed");
        }

        tracing::info!("Tollgate node shut down");
        Ok(())
    }
}

/// Admin and hold time changed at runtime survive restarts; claim accounting
/// and payout are deployment settings and always come from the file.
fn merge_ledger_config(persisted: &LedgerConfig, file: &LedgerConfig) -> LedgerConfig {
    if persisted.admin != file.admin && !file.admin.is_zero() {
        tracing::info!(
            persisted = %persisted.admin,
            configured = %file.admin,
            "keeping persisted admin"
        );
    }
    LedgerConfig {
        admin: if persisted.admin.is_zero() {
            file.admin
        } else {
            persisted.admin
        },
        withdraw_hold_secs: persisted.withdraw_hold_secs,
        claim_accounting: file.claim_accounting,
        claim_payout: file.claim_payout,
    }
}
