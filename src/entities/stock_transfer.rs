use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::fmt;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Transfer lifecycle status.
///
/// Transfers advance monotonically: `pending → approved → in_transit →
/// completed`, with `pending|approved → cancelled` as the only other edge.
/// Nothing leaves `completed` or `cancelled`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "pending"),
            TransferStatus::Approved => write!(f, "approved"),
            TransferStatus::InTransit => write!(f, "in_transit"),
            TransferStatus::Completed => write!(f, "completed"),
            TransferStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Stock transfer entity model.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "stock_transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub transfer_number: String,
    pub source_branch_id: Uuid,
    pub source_branch_name: String,
    pub destination_branch_id: Uuid,
    pub destination_branch_name: String,
    pub status: TransferStatus,
    pub requested_by: Uuid,
    pub requested_by_name: String,
    pub approved_by: Option<Uuid>,
    pub received_by: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_transfer_item::Entity")]
    Items,
}

impl Related<super::stock_transfer_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Approve a pending transfer.
    pub fn approve(&mut self, approved_by: Uuid) -> Result<(), ServiceError> {
        if self.status != TransferStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "Transfer {} cannot be approved from {} status",
                self.transfer_number, self.status
            )));
        }

        self.status = TransferStatus::Approved;
        self.approved_by = Some(approved_by);
        self.approved_at = Some(Utc::now());
        self.version += 1;
        Ok(())
    }

    /// Mark an approved transfer as dispatched. The caller is responsible for
    /// decrementing source stock in the same transaction.
    pub fn ship(&mut self) -> Result<(), ServiceError> {
        if self.status != TransferStatus::Approved {
            return Err(ServiceError::InvalidOperation(format!(
                "Transfer {} cannot be shipped from {} status",
                self.transfer_number, self.status
            )));
        }

        self.status = TransferStatus::InTransit;
        self.shipped_at = Some(Utc::now());
        self.version += 1;
        Ok(())
    }

    /// Complete an in-transit transfer. The caller is responsible for
    /// incrementing destination stock in the same transaction.
    pub fn receive(&mut self, received_by: Uuid) -> Result<(), ServiceError> {
        if self.status != TransferStatus::InTransit {
            return Err(ServiceError::InvalidOperation(format!(
                "Transfer {} cannot be received from {} status",
                self.transfer_number, self.status
            )));
        }

        self.status = TransferStatus::Completed;
        self.received_by = Some(received_by);
        self.completed_at = Some(Utc::now());
        self.version += 1;
        Ok(())
    }

    /// Cancel a transfer that has not yet shipped. Once stock has left the
    /// source branch the transfer can only complete.
    pub fn cancel(&mut self, reason: String) -> Result<(), ServiceError> {
        if self.status != TransferStatus::Pending && self.status != TransferStatus::Approved {
            return Err(ServiceError::InvalidOperation(format!(
                "Transfer {} cannot be cancelled from {} status",
                self.transfer_number, self.status
            )));
        }

        self.status = TransferStatus::Cancelled;
        self.cancellation_reason = Some(reason);
        self.cancelled_at = Some(Utc::now());
        self.version += 1;
        Ok(())
    }
}
