use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::branches::BranchDirectory;
use crate::db::DbPool;
use crate::entities::{
    branch_stock::{self, Entity as BranchStockRows},
    product::Entity as Products,
    stock_movement::MovementType,
    stock_transfer::{self, Entity as StockTransfers, TransferStatus},
    stock_transfer_item::{self, Entity as TransferItems},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics::{TRANSFERS_SHIPPED, TRANSFER_FAILURES};
use crate::services::product_catalog::Actor;
use crate::services::stock_ledger::{record_movement, NewMovement};

/// One requested product line of a transfer.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct TransferItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

/// Input for creating a stock transfer.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateTransferInput {
    pub source_branch_id: Uuid,
    pub destination_branch_id: Uuid,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<TransferItemInput>,
    pub notes: Option<String>,
}

/// A transfer with its item lines.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponse {
    #[serde(flatten)]
    pub transfer: stock_transfer::Model,
    pub items: Vec<stock_transfer_item::Model>,
}

/// Coordinates multi-step stock transfers between branches. Stock leaves the
/// source branch at `ship` time, inside the same transaction that re-checks
/// availability, which is what prevents two transfers from double-allocating
/// the same units.
#[derive(Clone)]
pub struct StockTransferService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    branches: BranchDirectory,
}

impl StockTransferService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, branches: BranchDirectory) -> Self {
        Self {
            db,
            event_sender,
            branches,
        }
    }

    /// Create a transfer request. Quantities are validated against current
    /// source stock as a courtesy to the requester, but nothing is reserved
    /// until `ship`.
    #[instrument(skip(self, input, user), fields(source = %input.source_branch_id, destination = %input.destination_branch_id))]
    pub async fn create(
        &self,
        input: CreateTransferInput,
        user: Actor,
    ) -> Result<TransferResponse, ServiceError> {
        input.validate()?;
        for item in &input.items {
            item.validate()?;
        }

        if input.source_branch_id == input.destination_branch_id {
            TRANSFER_FAILURES.with_label_values(&["validation_error"]).inc();
            return Err(ServiceError::ValidationError(
                "source and destination branch must differ".to_string(),
            ));
        }

        let source = self.branches.require(input.source_branch_id)?.clone();
        let destination = self.branches.require(input.destination_branch_id)?.clone();

        let transfer_id = Uuid::new_v4();
        let transfer_number = format!(
            "TRF-{}",
            transfer_id.simple().to_string()[..8].to_uppercase()
        );
        let requested_by = user.id;
        let requested_by_name = user.name;

        let response = self
            .db
            .transaction::<_, TransferResponse, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut item_rows = Vec::with_capacity(input.items.len());

                    for item in &input.items {
                        let product = Products::find_by_id(item.product_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Product {} not found",
                                    item.product_id
                                ))
                            })?;

                        let source_row = BranchStockRows::find()
                            .filter(branch_stock::Column::ProductId.eq(item.product_id))
                            .filter(branch_stock::Column::BranchId.eq(source.id))
                            .one(txn)
                            .await?;
                        let available = source_row.map(|r| r.current_stock).unwrap_or(0);

                        if item.quantity > available {
                            return Err(ServiceError::InsufficientStock(format!(
                                "{}: available at {} is {}, requested {}",
                                product.name, source.name, available, item.quantity
                            )));
                        }

                        item_rows.push(stock_transfer_item::Model {
                            id: Uuid::new_v4(),
                            transfer_id,
                            product_id: item.product_id,
                            product_name: product.name,
                            quantity: item.quantity,
                            unit_price: product.selling_price,
                            stock_at_request: available,
                        });
                    }

                    let transfer = stock_transfer::Model {
                        id: transfer_id,
                        transfer_number,
                        source_branch_id: source.id,
                        source_branch_name: source.name,
                        destination_branch_id: destination.id,
                        destination_branch_name: destination.name,
                        status: TransferStatus::Pending,
                        requested_by,
                        requested_by_name,
                        approved_by: None,
                        received_by: None,
                        notes: input.notes,
                        cancellation_reason: None,
                        created_at: Utc::now(),
                        approved_at: None,
                        shipped_at: None,
                        completed_at: None,
                        cancelled_at: None,
                        version: 1,
                    };

                    let active: stock_transfer::ActiveModel = transfer.clone().into();
                    active.insert(txn).await?;

                    for item in &item_rows {
                        let active: stock_transfer_item::ActiveModel = item.clone().into();
                        active.insert(txn).await?;
                    }

                    Ok(TransferResponse {
                        transfer,
                        items: item_rows,
                    })
                })
            })
            .await
            .map_err(unwrap_txn_err)
            .map_err(|e| {
                TRANSFER_FAILURES.with_label_values(&["create_error"]).inc();
                e
            })?;

        self.event_sender
            .send_or_log(Event::TransferCreated(transfer_id))
            .await;

        info!(
            transfer = %response.transfer.transfer_number,
            items = response.items.len(),
            "Transfer requested"
        );
        Ok(response)
    }

    /// Approve a pending transfer.
    #[instrument(skip(self, user))]
    pub async fn approve(
        &self,
        transfer_id: Uuid,
        user: Actor,
    ) -> Result<TransferResponse, ServiceError> {
        let approver = user.id;

        let response = self
            .db
            .transaction::<_, TransferResponse, ServiceError>(move |txn| {
                Box::pin(async move {
                    let (transfer, items) = load_transfer(txn, transfer_id).await?;
                    let before_version = transfer.version;

                    let mut updated = transfer.clone();
                    updated.approve(approver)?;

                    let mut active: stock_transfer::ActiveModel = transfer.into();
                    active.status = Set(updated.status);
                    active.approved_by = Set(updated.approved_by);
                    active.approved_at = Set(updated.approved_at);
                    active.version = Set(updated.version);
                    persist_transition(txn, active, before_version, transfer_id).await?;

                    Ok(TransferResponse {
                        transfer: updated,
                        items,
                    })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.event_sender
            .send_or_log(Event::TransferApproved(transfer_id))
            .await;

        info!(transfer = %response.transfer.transfer_number, "Transfer approved");
        Ok(response)
    }

    /// Dispatch an approved transfer. Re-validates every item against the
    /// source branch's current stock and decrements it, all inside the same
    /// transaction as the status change; two transfers racing for the same
    /// units resolve to exactly one winner.
    #[instrument(skip(self, user))]
    pub async fn ship(
        &self,
        transfer_id: Uuid,
        user: Actor,
    ) -> Result<TransferResponse, ServiceError> {
        let actor = user;

        let response = self
            .db
            .transaction::<_, TransferResponse, ServiceError>(move |txn| {
                Box::pin(async move {
                    let (transfer, mut items) = load_transfer(txn, transfer_id).await?;
                    let before_version = transfer.version;

                    let mut updated = transfer.clone();
                    updated.ship()?;

                    // Deterministic processing order keeps concurrent ships
                    // of overlapping product sets from deadlocking.
                    items.sort_by_key(|i| i.product_id);

                    for item in &items {
                        let row = BranchStockRows::find()
                            .filter(branch_stock::Column::ProductId.eq(item.product_id))
                            .filter(
                                branch_stock::Column::BranchId.eq(transfer.source_branch_id),
                            )
                            .one(txn)
                            .await?;

                        let row = row.ok_or_else(|| {
                            ServiceError::InsufficientStock(format!(
                                "{}: no stock at {}",
                                item.product_name, transfer.source_branch_name
                            ))
                        })?;

                        if item.quantity > row.current_stock {
                            return Err(ServiceError::InsufficientStock(format!(
                                "{}: available at {} is {}, requested {}",
                                item.product_name,
                                transfer.source_branch_name,
                                row.current_stock,
                                item.quantity
                            )));
                        }

                        let previous = row.current_stock;
                        let mut active: branch_stock::ActiveModel = row.into();
                        active.current_stock = Set(previous - item.quantity);
                        active.updated_at = Set(Utc::now());
                        active.update(txn).await?;

                        record_movement(
                            txn,
                            NewMovement {
                                product_id: item.product_id,
                                product_name: item.product_name.clone(),
                                branch_id: transfer.source_branch_id,
                                branch_name: transfer.source_branch_name.clone(),
                                movement_type: MovementType::Out,
                                quantity: item.quantity,
                                reason: format!(
                                    "Transfer {} dispatched",
                                    transfer.transfer_number
                                ),
                                notes: None,
                                previous_stock: previous,
                                new_stock: previous - item.quantity,
                                recorded_by: actor.id,
                                recorded_by_name: actor.name.clone(),
                            },
                        )
                        .await?;
                    }

                    let mut active: stock_transfer::ActiveModel = transfer.into();
                    active.status = Set(updated.status);
                    active.shipped_at = Set(updated.shipped_at);
                    active.version = Set(updated.version);
                    persist_transition(txn, active, before_version, transfer_id).await?;

                    Ok(TransferResponse {
                        transfer: updated,
                        items,
                    })
                })
            })
            .await
            .map_err(unwrap_txn_err)
            .map_err(|e| {
                TRANSFER_FAILURES.with_label_values(&["ship_error"]).inc();
                e
            })?;

        TRANSFERS_SHIPPED.inc();
        self.event_sender
            .send_or_log(Event::TransferShipped(transfer_id))
            .await;

        info!(transfer = %response.transfer.transfer_number, "Transfer dispatched");
        Ok(response)
    }

    /// Receive an in-transit transfer at the destination branch.
    #[instrument(skip(self, user))]
    pub async fn receive(
        &self,
        transfer_id: Uuid,
        user: Actor,
    ) -> Result<TransferResponse, ServiceError> {
        let actor = user;

        let response = self
            .db
            .transaction::<_, TransferResponse, ServiceError>(move |txn| {
                Box::pin(async move {
                    let (transfer, mut items) = load_transfer(txn, transfer_id).await?;
                    let before_version = transfer.version;

                    let mut updated = transfer.clone();
                    updated.receive(actor.id)?;

                    items.sort_by_key(|i| i.product_id);

                    for item in &items {
                        let row = BranchStockRows::find()
                            .filter(branch_stock::Column::ProductId.eq(item.product_id))
                            .filter(
                                branch_stock::Column::BranchId
                                    .eq(transfer.destination_branch_id),
                            )
                            .one(txn)
                            .await?;

                        let previous = match row {
                            Some(row) => {
                                let previous = row.current_stock;
                                let mut active: branch_stock::ActiveModel = row.into();
                                active.current_stock = Set(previous + item.quantity);
                                active.updated_at = Set(Utc::now());
                                active.update(txn).await?;
                                previous
                            }
                            None => {
                                // Product predates the destination branch;
                                // back-fill the row like the sync job would.
                                let product =
                                    Products::find_by_id(item.product_id).one(txn).await?;
                                let (min, max) = product
                                    .map(|p| (p.min_stock_level, p.max_stock_level))
                                    .unwrap_or((0, 1));
                                branch_stock::ActiveModel {
                                    id: Set(Uuid::new_v4()),
                                    product_id: Set(item.product_id),
                                    branch_id: Set(transfer.destination_branch_id),
                                    branch_name: Set(transfer.destination_branch_name.clone()),
                                    current_stock: Set(item.quantity),
                                    min_stock_level: Set(min),
                                    max_stock_level: Set(max),
                                    updated_at: Set(Utc::now()),
                                }
                                .insert(txn)
                                .await?;
                                0
                            }
                        };

                        record_movement(
                            txn,
                            NewMovement {
                                product_id: item.product_id,
                                product_name: item.product_name.clone(),
                                branch_id: transfer.destination_branch_id,
                                branch_name: transfer.destination_branch_name.clone(),
                                movement_type: MovementType::In,
                                quantity: item.quantity,
                                reason: format!(
                                    "Transfer {} received",
                                    transfer.transfer_number
                                ),
                                notes: None,
                                previous_stock: previous,
                                new_stock: previous + item.quantity,
                                recorded_by: actor.id,
                                recorded_by_name: actor.name.clone(),
                            },
                        )
                        .await?;
                    }

                    let mut active: stock_transfer::ActiveModel = transfer.into();
                    active.status = Set(updated.status);
                    active.received_by = Set(updated.received_by);
                    active.completed_at = Set(updated.completed_at);
                    active.version = Set(updated.version);
                    persist_transition(txn, active, before_version, transfer_id).await?;

                    Ok(TransferResponse {
                        transfer: updated,
                        items,
                    })
                })
            })
            .await
            .map_err(unwrap_txn_err)
            .map_err(|e| {
                TRANSFER_FAILURES.with_label_values(&["receive_error"]).inc();
                e
            })?;

        self.event_sender
            .send_or_log(Event::TransferReceived(transfer_id))
            .await;

        info!(transfer = %response.transfer.transfer_number, "Transfer received");
        Ok(response)
    }

    /// Cancel a transfer that has not shipped. No stock has moved by then, so
    /// there is nothing to compensate.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        transfer_id: Uuid,
        reason: String,
    ) -> Result<TransferResponse, ServiceError> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "a cancellation reason is required".to_string(),
            ));
        }

        let response = self
            .db
            .transaction::<_, TransferResponse, ServiceError>(move |txn| {
                Box::pin(async move {
                    let (transfer, items) = load_transfer(txn, transfer_id).await?;
                    let before_version = transfer.version;

                    let mut updated = transfer.clone();
                    updated.cancel(reason)?;

                    let mut active: stock_transfer::ActiveModel = transfer.into();
                    active.status = Set(updated.status);
                    active.cancellation_reason = Set(updated.cancellation_reason.clone());
                    active.cancelled_at = Set(updated.cancelled_at);
                    active.version = Set(updated.version);
                    persist_transition(txn, active, before_version, transfer_id).await?;

                    Ok(TransferResponse {
                        transfer: updated,
                        items,
                    })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.event_sender
            .send_or_log(Event::TransferCancelled(transfer_id))
            .await;

        info!(transfer = %response.transfer.transfer_number, "Transfer cancelled");
        Ok(response)
    }

    /// List transfers, newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        status: Option<TransferStatus>,
    ) -> Result<Vec<stock_transfer::Model>, ServiceError> {
        let mut query = StockTransfers::find().order_by_desc(stock_transfer::Column::CreatedAt);

        if let Some(status) = status {
            query = query.filter(stock_transfer::Column::Status.eq(status));
        }

        query.all(&*self.db).await.map_err(Into::into)
    }

    /// Get a transfer with its item lines.
    #[instrument(skip(self))]
    pub async fn get(&self, transfer_id: Uuid) -> Result<TransferResponse, ServiceError> {
        let transfer = StockTransfers::find_by_id(transfer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Transfer {} not found", transfer_id))
            })?;

        let items = TransferItems::find()
            .filter(stock_transfer_item::Column::TransferId.eq(transfer_id))
            .all(&*self.db)
            .await?;

        Ok(TransferResponse { transfer, items })
    }
}

async fn load_transfer(
    txn: &DatabaseTransaction,
    transfer_id: Uuid,
) -> Result<(stock_transfer::Model, Vec<stock_transfer_item::Model>), ServiceError> {
    let transfer = StockTransfers::find_by_id(transfer_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", transfer_id)))?;

    let items = TransferItems::find()
        .filter(stock_transfer_item::Column::TransferId.eq(transfer_id))
        .all(txn)
        .await?;

    Ok((transfer, items))
}

/// Writes a status transition guarded by the version read at the start of the
/// transaction, so two concurrent transitions of the same transfer cannot
/// both commit.
async fn persist_transition(
    txn: &DatabaseTransaction,
    active: stock_transfer::ActiveModel,
    expected_version: i32,
    transfer_id: Uuid,
) -> Result<(), ServiceError> {
    StockTransfers::update(active)
        .filter(stock_transfer::Column::Version.eq(expected_version))
        .exec(txn)
        .await
        .map(|_| ())
        .map_err(|e| match e {
            DbErr::RecordNotUpdated => ServiceError::Conflict(format!(
                "Transfer {} was modified concurrently; refresh and retry",
                transfer_id
            )),
            other => ServiceError::DatabaseError(other),
        })
}

fn unwrap_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
