use std::collections::{HashMap, VecDeque};

use chrono::NaiveDateTime;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;
use crate::service::cart::CartService;
use crate::types::local_now;

/// What happened to one scanned code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanOutcome {
    Added {
        product_id: i64,
        product: String,
        quantity: i64,
    },
    UnknownCode,
    StockLimit {
        product: String,
        max: i64,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEvent {
    pub code: String,
    pub scanned_at: NaiveDateTime,
    #[serde(flatten)]
    pub outcome: ScanOutcome,
}

#[derive(Debug)]
pub enum ScanActorMessage {
    /// A code pushed by a scanner on behalf of `user_id`.
    Scan { user_id: i64, code: String },
    /// Take every retained outcome for the user, oldest first.
    Drain(i64, RpcReplyPort<Vec<ScanEvent>>),
}

/// Handle for interacting with the scan actor.
#[derive(Clone)]
pub struct ScannerHandle {
    actor: ActorRef<ScanActorMessage>,
}

impl ScannerHandle {
    /// Fire-and-forget; scans are processed in arrival order.
    pub fn submit(&self, user_id: i64, code: impl Into<String>) -> Result<(), InvenError> {
        ractor::cast!(
            self.actor,
            ScanActorMessage::Scan {
                user_id,
                code: code.into()
            }
        )
        .map_err(|e| InvenError::RactorError(format!("Scan cast failed: {e}")))
    }

    pub async fn drain(&self, user_id: i64) -> Result<Vec<ScanEvent>, InvenError> {
        ractor::call!(self.actor, ScanActorMessage::Drain, user_id)
            .map_err(|e| InvenError::RactorError(format!("Drain RPC failed: {e}")))
    }
}

pub struct ScanActorArgs {
    pub storage: InventoryStorage,
    pub carts: CartService,
    pub queue_capacity: usize,
}

struct ScanActorState {
    storage: InventoryStorage,
    carts: CartService,
    queue_capacity: usize,
    outcomes: HashMap<i64, VecDeque<ScanEvent>>,
}

struct ScanActor;

#[ractor::async_trait]
impl Actor for ScanActor {
    type Msg = ScanActorMessage;
    type State = ScanActorState;
    type Arguments = ScanActorArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(queue_capacity = args.queue_capacity, "ScanActor started");
        Ok(ScanActorState {
            storage: args.storage,
            carts: args.carts,
            queue_capacity: args.queue_capacity.max(1),
            outcomes: HashMap::new(),
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ScanActorMessage::Scan { user_id, code } => {
                let outcome = self.resolve_scan(state, user_id, &code).await;
                debug!(user_id, code = %code, ?outcome, "scan processed");
                let ring = state.outcomes.entry(user_id).or_default();
                if ring.len() >= state.queue_capacity {
                    ring.pop_front();
                }
                ring.push_back(ScanEvent {
                    code,
                    scanned_at: local_now(),
                    outcome,
                });
            }
            ScanActorMessage::Drain(user_id, reply_port) => {
                let events = state
                    .outcomes
                    .remove(&user_id)
                    .map(Vec::from)
                    .unwrap_or_default();
                let _ = reply_port.send(events);
            }
        }
        Ok(())
    }
}

impl ScanActor {
    async fn resolve_scan(&self, state: &ScanActorState, user_id: i64, code: &str) -> ScanOutcome {
        let product = match state.storage.find_product_by_barcode(code).await {
            Ok(Some(p)) => p,
            Ok(None) => return ScanOutcome::UnknownCode,
            Err(e) => {
                warn!(user_id, code, error = %e, "barcode lookup failed");
                return ScanOutcome::Failed {
                    message: e.client_message(),
                };
            }
        };
        match state.carts.add(user_id, product.id).await {
            Ok(added) => ScanOutcome::Added {
                product_id: added.product.id,
                product: added.product.name,
                quantity: added.quantity,
            },
            Err(InvenError::InsufficientStock { product, available }) => ScanOutcome::StockLimit {
                product,
                max: available,
            },
            Err(e) => {
                warn!(user_id, code, error = %e, "adding scanned product failed");
                ScanOutcome::Failed {
                    message: e.client_message(),
                }
            }
        }
    }
}

/// Spawn an unnamed scan actor and return its handle.
pub async fn spawn(args: ScanActorArgs) -> Result<ScannerHandle, InvenError> {
    let (actor, _jh) = Actor::spawn(None, ScanActor, args)
        .await
        .map_err(|e| InvenError::RactorError(format!("failed to spawn ScanActor: {e}")))?;
    Ok(ScannerHandle { actor })
}
