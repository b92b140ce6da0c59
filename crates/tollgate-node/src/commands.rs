//! Commands dispatched from the HTTP API to the node's sequencer.

use tokio::sync::oneshot;
use tollgate_core::{Address, HostEntry, TokenAmount, WithdrawalRequest};
use tollgate_ledger::{ClaimReport, LedgerError, SignedClaim};

pub type Reply<T> = oneshot::Sender<Result<T, LedgerError>>;

/// A state-changing request, applied by the sequencer one at a time.
pub enum NodeCommand {
    Deposit {
        caller: Address,
        amount: TokenAmount,
        reply: Reply<TokenAmount>,
    },
    RequestWithdraw {
        caller: Address,
        reply: Reply<WithdrawalRequest>,
    },
    Withdraw {
        caller: Address,
        reply: Reply<TokenAmount>,
    },
    SetHoldTime {
        caller: Address,
        seconds: u64,
        reply: Reply<()>,
    },
    TransferAdmin {
        caller: Address,
        new_admin: Address,
        reply: Reply<()>,
    },
    ClaimFunds {
        caller: Address,
        claims: Vec<SignedClaim>,
        reply: Reply<ClaimReport>,
    },
    AddHost {
        caller: Address,
        url: String,
        operator: Address,
        weight: u64,
        reply: Reply<HostEntry>,
    },
    RemoveHost {
        caller: Address,
        operator: Address,
        reply: Reply<HostEntry>,
    },
    Pause {
        caller: Address,
        reply: Reply<HostEntry>,
    },
    Unpause {
        caller: Address,
        reply: Reply<HostEntry>,
    },
    /// Admin only. Credit the node's internal token.
    Mint {
        caller: Address,
        account: Address,
        amount: TokenAmount,
        reply: Reply<TokenAmount>,
    },
}

impl NodeCommand {
    pub fn name(&self) -> &'static str {
        match self {
            NodeCommand::Deposit { .. } => "deposit",
            NodeCommand::RequestWithdraw { .. } => "request_withdraw",
            NodeCommand::Withdraw { .. } => "withdraw",
            NodeCommand::SetHoldTime { .. } => "set_hold_time",
            NodeCommand::TransferAdmin { .. } => "transfer_admin",
            NodeCommand::ClaimFunds { .. } => "claim_funds",
            NodeCommand::AddHost { .. } => "add_host",
            NodeCommand::RemoveHost { .. } => "remove_host",
            NodeCommand::Pause { .. } => "pause",
            NodeCommand::Unpause { .. } => "unpause",
            NodeCommand::Mint { .. } => "mint",
        }
    }
}
