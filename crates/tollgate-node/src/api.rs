//! HTTP API server for the Tollgate node.
//!
//! Queries read the ledger directly. Mutations are sent to the sequencer and
//! answered once it has applied and persisted them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tollgate_core::{Address, ClaimAccounting, ClaimPayout, HostEntry, PaymentRecord, TokenAmount};
use tollgate_ledger::{ClaimReport, LedgerError, SignedClaim};

use crate::commands::NodeCommand;
use crate::state::NodeState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

// --- Request types ---

#[derive(Deserialize)]
pub struct CallerRequest {
    pub caller: Address,
}

#[derive(Deserialize)]
pub struct DepositRequest {
    pub caller: Address,
    pub amount: TokenAmount,
}

#[derive(Deserialize)]
pub struct HoldTimeRequest {
    pub caller: Address,
    pub seconds: u64,
}

#[derive(Deserialize)]
pub struct TransferAdminRequest {
    pub caller: Address,
    pub new_admin: Address,
}

#[derive(Deserialize)]
pub struct ClaimsRequest {
    pub caller: Address,
    pub records: Vec<PaymentRecord>,
    pub amounts: Vec<TokenAmount>,
    /// 65-byte signatures, hex encoded.
    pub signatures: Vec<String>,
}

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    pub record: PaymentRecord,
    pub signature: String,
}

#[derive(Deserialize)]
pub struct AddHostRequest {
    pub caller: Address,
    pub url: String,
    pub operator: Address,
    pub weight: u64,
}

#[derive(Deserialize)]
pub struct CallerQuery {
    pub caller: Address,
}

#[derive(Deserialize)]
pub struct MintRequest {
    pub caller: Address,
    pub account: Address,
    pub amount: TokenAmount,
}

// --- Response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub admin: Address,
    pub withdraw_hold_secs: u64,
    pub claim_accounting: ClaimAccounting,
    pub claim_payout: ClaimPayout,
    pub total_balances: TokenAmount,
    pub custody_balance: TokenAmount,
    pub hosts: usize,
    pub active_hosts: usize,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub account: Address,
    pub balance: TokenAmount,
}

#[derive(Serialize)]
pub struct WithdrawalResponse {
    pub account: Address,
    pub pending: bool,
    pub ready_at: u64,
}

#[derive(Serialize)]
pub struct WithdrawResponse {
    pub account: Address,
    pub amount: TokenAmount,
}

#[derive(Serialize)]
pub struct HoldTimeResponse {
    pub seconds: u64,
}

#[derive(Serialize)]
pub struct AdminResponse {
    pub admin: Address,
}

#[derive(Serialize)]
pub struct VerifyPaymentResponse {
    pub valid: bool,
}

#[derive(Serialize)]
pub struct HostsResponse {
    pub hosts: Vec<HostEntry>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::NotReady { .. }
        | LedgerError::InsufficientFunds { .. }
        | LedgerError::InvalidAmount(_)
        | LedgerError::LengthMismatch { .. }
        | LedgerError::InvalidSignature
        | LedgerError::NotReceiver { .. }
        | LedgerError::Core(_) => StatusCode::BAD_REQUEST,
        LedgerError::Unauthorized(_) => StatusCode::FORBIDDEN,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ledger_error(e: LedgerError) -> (StatusCode, Json<ErrorResponse>) {
    (
        error_status(&e),
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn internal_error(msg: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: msg.into() }),
    )
}

fn decode_signature(hex_str: &str) -> Option<Vec<u8>> {
    let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(trimmed).ok()
}

/// Send a command to the sequencer and wait for its reply.
async fn send_command_and_await<T>(
    state: &NodeState,
    cmd: NodeCommand,
    reply_rx: oneshot::Receiver<Result<T, LedgerError>>,
) -> Result<T, (StatusCode, Json<ErrorResponse>)> {
    state
        .command_tx
        .send(cmd)
        .await
        .map_err(|_| internal_error("sequencer not running"))?;

    match reply_rx.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ledger_error(e)),
        Err(_) => Err(internal_error("sequencer dropped the reply channel")),
    }
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn handle_status(State(state): State<Arc<NodeState>>) -> ApiResult<StatusResponse> {
    let ledger = &state.ledger;
    let config = ledger.config().await;
    let total_balances = ledger.total_balances().await.map_err(ledger_error)?;
    let custody_balance = ledger.port().custody_balance().await.map_err(ledger_error)?;
    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        admin: config.admin,
        withdraw_hold_secs: config.withdraw_hold_secs,
        claim_accounting: config.claim_accounting,
        claim_payout: config.claim_payout,
        total_balances,
        custody_balance,
        hosts: ledger.get_hosts().await.len(),
        active_hosts: ledger.get_active_hosts().await.len(),
    }))
}

async fn handle_balance(
    State(state): State<Arc<NodeState>>,
    Path(account): Path<Address>,
) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        account,
        balance: state.ledger.balances(&account).await,
    })
}

async fn handle_withdrawal(
    State(state): State<Arc<NodeState>>,
    Path(account): Path<Address>,
) -> Json<WithdrawalResponse> {
    let request = state.ledger.withdrawal_request(&account).await;
    Json(WithdrawalResponse {
        account,
        pending: request.pending,
        ready_at: request.ready_at,
    })
}

async fn handle_deposit(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<BalanceResponse> {
    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::Deposit {
        caller: req.caller,
        amount: req.amount,
        reply,
    };
    let balance = send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(BalanceResponse {
        account: req.caller,
        balance,
    }))
}

async fn handle_request_withdraw(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<WithdrawalResponse> {
    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::RequestWithdraw {
        caller: req.caller,
        reply,
    };
    let request = send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(WithdrawalResponse {
        account: req.caller,
        pending: request.pending,
        ready_at: request.ready_at,
    }))
}

async fn handle_withdraw(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<WithdrawResponse> {
    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::Withdraw {
        caller: req.caller,
        reply,
    };
    let amount = send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(WithdrawResponse {
        account: req.caller,
        amount,
    }))
}

async fn handle_set_hold_time(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<HoldTimeRequest>,
) -> ApiResult<HoldTimeResponse> {
    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::SetHoldTime {
        caller: req.caller,
        seconds: req.seconds,
        reply,
    };
    send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(HoldTimeResponse {
        seconds: req.seconds,
    }))
}

async fn handle_transfer_admin(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<TransferAdminRequest>,
) -> ApiResult<AdminResponse> {
    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::TransferAdmin {
        caller: req.caller,
        new_admin: req.new_admin,
        reply,
    };
    send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(AdminResponse {
        admin: req.new_admin,
    }))
}

async fn handle_claims(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<ClaimsRequest>,
) -> ApiResult<ClaimReport> {
    for record in &req.records {
        record
            .validate()
            .map_err(|e| ledger_error(LedgerError::from(e)))?;
    }
    let signatures = req
        .signatures
        .iter()
        .map(String::as_str)
        .map(decode_signature)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ledger_error(LedgerError::InvalidSignature))?;
    let claims =
        SignedClaim::zip(&req.records, &req.amounts, &signatures).map_err(ledger_error)?;

    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::ClaimFunds {
        caller: req.caller,
        claims,
        reply,
    };
    let report = send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(report))
}

async fn handle_verify_payment(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<VerifyPaymentRequest>,
) -> ApiResult<VerifyPaymentResponse> {
    req.record
        .validate()
        .map_err(|e| ledger_error(LedgerError::from(e)))?;
    let result = match decode_signature(&req.signature) {
        Some(sig) => state.ledger.verify_payment(&req.record, &sig),
        None => Err(LedgerError::InvalidSignature),
    };
    match result {
        Ok(()) => Ok(Json(VerifyPaymentResponse { valid: true })),
        Err(LedgerError::InvalidSignature) => Ok(Json(VerifyPaymentResponse { valid: false })),
        Err(e) => Err(ledger_error(e)),
    }
}

async fn handle_hosts(State(state): State<Arc<NodeState>>) -> Json<HostsResponse> {
    let hosts = state.ledger.get_hosts().await;
    let count = hosts.len();
    Json(HostsResponse { hosts, count })
}

async fn handle_active_hosts(State(state): State<Arc<NodeState>>) -> Json<HostsResponse> {
    let hosts = state.ledger.get_active_hosts().await;
    let count = hosts.len();
    Json(HostsResponse { hosts, count })
}

async fn handle_get_host(
    State(state): State<Arc<NodeState>>,
    Path(operator): Path<Address>,
) -> ApiResult<HostEntry> {
    let host = state.ledger.get_host(&operator).await.map_err(ledger_error)?;
    Ok(Json(host))
}

async fn handle_add_host(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<AddHostRequest>,
) -> ApiResult<HostEntry> {
    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::AddHost {
        caller: req.caller,
        url: req.url,
        operator: req.operator,
        weight: req.weight,
        reply,
    };
    let host = send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(host))
}

async fn handle_remove_host(
    State(state): State<Arc<NodeState>>,
    Path(operator): Path<Address>,
    Query(query): Query<CallerQuery>,
) -> ApiResult<HostEntry> {
    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::RemoveHost {
        caller: query.caller,
        operator,
        reply,
    };
    let host = send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(host))
}

async fn handle_pause(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<HostEntry> {
    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::Pause {
        caller: req.caller,
        reply,
    };
    let host = send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(host))
}

async fn handle_unpause(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<HostEntry> {
    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::Unpause {
        caller: req.caller,
        reply,
    };
    let host = send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(host))
}

async fn handle_mint(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<MintRequest>,
) -> ApiResult<BalanceResponse> {
    let (reply, reply_rx) = oneshot::channel();
    let cmd = NodeCommand::Mint {
        caller: req.caller,
        account: req.account,
        amount: req.amount,
        reply,
    };
    let balance = send_command_and_await(&state, cmd, reply_rx).await?;
    Ok(Json(BalanceResponse {
        account: req.account,
        balance,
    }))
}

async fn handle_token_balance(
    State(state): State<Arc<NodeState>>,
    Path(account): Path<Address>,
) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        account,
        balance: state.token.balance_of(&account),
    })
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/balances/{account}", get(handle_balance))
        .route("/api/v1/withdrawals/{account}", get(handle_withdrawal))
        .route("/api/v1/deposit", post(handle_deposit))
        .route("/api/v1/withdraw/request", post(handle_request_withdraw))
        .route("/api/v1/withdraw", post(handle_withdraw))
        .route("/api/v1/admin/hold-time", post(handle_set_hold_time))
        .route("/api/v1/admin/transfer", post(handle_transfer_admin))
        .route("/api/v1/claims", post(handle_claims))
        .route("/api/v1/payments/verify", post(handle_verify_payment))
        .route("/api/v1/hosts", get(handle_hosts).post(handle_add_host))
        .route("/api/v1/hosts/active", get(handle_active_hosts))
        .route("/api/v1/hosts/pause", post(handle_pause))
        .route("/api/v1/hosts/unpause", post(handle_unpause))
        .route(
            "/api/v1/hosts/{operator}",
            get(handle_get_host).delete(handle_remove_host),
        )
        .route("/api/v1/token/mint", post(handle_mint))
        .route("/api/v1/token/{account}", get(handle_token_balance))
        .with_state(state)
}

pub async fn start_api_server(listen_addr: SocketAddr, state: Arc<NodeState>) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
