use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr, TransactionError, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::branches::{Branch, BranchDirectory};
use crate::db::DbPool;
use crate::entities::{
    branch_stock::{self, Entity as BranchStockRows},
    product::{self, Entity as Products},
    product_variant::{self, Entity as ProductVariants},
    stock_movement::MovementType,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics::{STOCK_ADJUSTMENTS, STOCK_ADJUSTMENT_FAILURES};
use crate::services::stock_ledger::{record_movement, NewMovement};
use crate::services::sales_guard;

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

/// Longest barcode the store's handheld scanners read reliably.
const SCANNER_BARCODE_MAX_LEN: usize = 40;

/// Catalog service: products, variants, and the per-branch stock rows that
/// back every stock figure this API reports.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    branches: BranchDirectory,
}

/// Input for creating a product
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateProductInput {
    /// Generated from a timestamp when omitted
    pub product_code: Option<String>,
    /// Generated from a timestamp when omitted
    pub barcode: Option<String>,
    #[validate(length(min = 2, message = "name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 2, message = "brand must be at least 2 characters"))]
    pub brand: String,
    pub model_name: Option<String>,
    #[validate(length(min = 1, message = "fabric must not be empty"))]
    pub fabric: String,
    #[validate(length(min = 2, message = "color must be at least 2 characters"))]
    pub color: String,
    #[validate(length(min = 1, message = "sizes must not be empty"))]
    pub sizes: String,
    pub style: Option<String>,
    pub occasion: Option<String>,
    pub embellishments: Option<String>,
    pub category_id: Option<Uuid>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub current_stock: i32,
    #[serde(default)]
    pub min_stock_level: i32,
    #[serde(default = "default_max_stock_level")]
    pub max_stock_level: i32,
    pub stock_location: Option<String>,
    pub description: Option<String>,
}

fn default_max_stock_level() -> i32 {
    1
}

/// Input for updating a product. Every field is re-validated as on create;
/// stock is never touched here, `adjust_stock` is the only correction path.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    pub product_code: String,
    pub barcode: String,
    #[validate(length(min = 2, message = "name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 2, message = "brand must be at least 2 characters"))]
    pub brand: String,
    pub model_name: Option<String>,
    #[validate(length(min = 1, message = "fabric must not be empty"))]
    pub fabric: String,
    #[validate(length(min = 2, message = "color must be at least 2 characters"))]
    pub color: String,
    #[validate(length(min = 1, message = "sizes must not be empty"))]
    pub sizes: String,
    pub style: Option<String>,
    pub occasion: Option<String>,
    pub embellishments: Option<String>,
    pub category_id: Option<Uuid>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
    pub is_active: bool,
    pub stock_location: Option<String>,
    pub description: Option<String>,
}

/// One variant line of a `create_with_variants` request.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct VariantInput {
    #[validate(length(min = 2, message = "variant color must be at least 2 characters"))]
    pub color: String,
    #[validate(length(min = 1, message = "variant sizes must not be empty"))]
    pub sizes: String,
    #[serde(default)]
    pub current_stock: i32,
    #[serde(default)]
    pub min_stock_level: i32,
    #[serde(default = "default_max_stock_level")]
    pub max_stock_level: i32,
    /// Derived from the product code when omitted
    pub barcode: Option<String>,
    pub price: Option<Decimal>,
}

/// Input for creating a product together with its variants.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateWithVariantsInput {
    #[validate(length(min = 2, message = "name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 2, message = "brand must be at least 2 characters"))]
    pub brand: String,
    pub model_name: Option<String>,
    #[validate(length(min = 1, message = "fabric must not be empty"))]
    pub fabric: String,
    #[validate(length(min = 2, message = "color must be at least 2 characters"))]
    pub color: String,
    #[validate(length(min = 1, message = "sizes must not be empty"))]
    pub sizes: String,
    pub style: Option<String>,
    pub occasion: Option<String>,
    pub embellishments: Option<String>,
    pub category_id: Option<Uuid>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub min_stock_level: i32,
    #[serde(default = "default_max_stock_level")]
    pub max_stock_level: i32,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "at least one variant is required"))]
    pub variants: Vec<VariantInput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateWithVariantsResult {
    pub product_id: Uuid,
    pub variant_count: usize,
    pub total_stock: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdjustStockResult {
    pub product_id: Uuid,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub delta: i32,
    /// Absent when the adjustment was a no-op (zero delta)
    pub movement_id: Option<Uuid>,
}

/// Per-branch slice of a product response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BranchStockEntry {
    pub branch_id: Uuid,
    pub branch_name: String,
    pub current_stock: i32,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
}

/// A product with its derived aggregate and per-branch breakdown.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: product::Model,
    pub current_stock: i32,
    pub branch_stock: Vec<BranchStockEntry>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProductFilters {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    /// Restrict to products with stock on hand at this branch
    pub branch_id: Option<Uuid>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductPage {
    pub products: Vec<ProductResponse>,
    pub total: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VariantHit {
    pub variant: product_variant::Model,
    pub product_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResult {
    pub products: Vec<ProductResponse>,
    pub variants: Vec<VariantHit>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogStats {
    pub total_products: u64,
    pub active_products: u64,
    pub total_units: i64,
    pub inventory_cost_value: Decimal,
    pub low_stock_products: u64,
    pub out_of_stock_products: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncReport {
    pub branch_rows_created: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BoxAssignmentReport {
    pub distinct_groups: u64,
    pub products_labeled: u64,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, branches: BranchDirectory) -> Self {
        Self {
            db,
            event_sender,
            branches,
        }
    }

    /// Create a new product. The entire initial stock lands on the default
    /// branch; every other branch starts at zero. The initial-stock movement
    /// commits in the same transaction as the product itself.
    #[instrument(skip(self, input, user), fields(name = %input.name))]
    pub async fn create(
        &self,
        mut input: CreateProductInput,
        user: Actor,
    ) -> Result<Uuid, ServiceError> {
        normalize_create(&mut input);
        input.validate()?;
        validate_pricing(input.cost_price, input.selling_price)?;
        validate_stock_bounds(input.min_stock_level, input.max_stock_level)?;
        if input.current_stock < 0 {
            return Err(ServiceError::ValidationError(
                "initial stock cannot be negative".to_string(),
            ));
        }

        let product_id = Uuid::new_v4();
        let (product_code, barcode) = resolve_codes(input.product_code.take(), input.barcode.take());
        let branch_list: Vec<Branch> = self.branches.all().to_vec();
        let default_branch_id = self.branches.default_branch().id;

        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    ensure_unique_codes(txn, &product_code, &barcode, None).await?;

                    let now = Utc::now();
                    let product_name = input.name.clone();
                    product::ActiveModel {
                        id: Set(product_id),
                        product_code: Set(product_code.clone()),
                        barcode: Set(barcode.clone()),
                        name: Set(input.name),
                        brand: Set(input.brand),
                        model_name: Set(input.model_name),
                        fabric: Set(input.fabric),
                        color: Set(input.color),
                        sizes: Set(input.sizes),
                        style: Set(input.style),
                        occasion: Set(input.occasion),
                        embellishments: Set(input.embellishments),
                        category_id: Set(input.category_id),
                        cost_price: Set(input.cost_price),
                        selling_price: Set(input.selling_price),
                        min_stock_level: Set(input.min_stock_level),
                        max_stock_level: Set(input.max_stock_level),
                        is_active: Set(true),
                        stock_location: Set(input.stock_location),
                        description: Set(input.description),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(|e| map_unique_violation(e, "product code or barcode"))?;

                    let mut default_branch_name = String::new();
                    for branch in &branch_list {
                        let stock = if branch.id == default_branch_id {
                            default_branch_name = branch.name.clone();
                            input.current_stock
                        } else {
                            0
                        };
                        branch_stock::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            product_id: Set(product_id),
                            branch_id: Set(branch.id),
                            branch_name: Set(branch.name.clone()),
                            current_stock: Set(stock),
                            min_stock_level: Set(input.min_stock_level),
                            max_stock_level: Set(input.max_stock_level),
                            updated_at: Set(now),
                        }
                        .insert(txn)
                        .await?;
                    }

                    if input.current_stock > 0 {
                        record_movement(
                            txn,
                            NewMovement {
                                product_id,
                                product_name,
                                branch_id: default_branch_id,
                                branch_name: default_branch_name,
                                movement_type: MovementType::In,
                                quantity: input.current_stock,
                                reason: "Initial Stock".to_string(),
                                notes: None,
                                previous_stock: 0,
                                new_stock: input.current_stock,
                                recorded_by: user.id,
                                recorded_by_name: user.name,
                            },
                        )
                        .await?;
                    }

                    Ok(())
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        info!("Created product: {}", product_id);
        Ok(product_id)
    }

    /// Create a base product plus one sub-record per color/size variant.
    /// Variant stock aggregates onto the default branch of the base product
    /// and one consolidated initial-stock movement is written.
    #[instrument(skip(self, input, user), fields(name = %input.name, variants = input.variants.len()))]
    pub async fn create_with_variants(
        &self,
        mut input: CreateWithVariantsInput,
        user: Actor,
    ) -> Result<CreateWithVariantsResult, ServiceError> {
        normalize_create_with_variants(&mut input);
        input.validate()?;
        validate_pricing(input.cost_price, input.selling_price)?;
        validate_stock_bounds(input.min_stock_level, input.max_stock_level)?;
        for variant in &input.variants {
            variant.validate()?;
            validate_stock_bounds(variant.min_stock_level, variant.max_stock_level)?;
            if variant.current_stock < 0 {
                return Err(ServiceError::ValidationError(
                    "variant stock cannot be negative".to_string(),
                ));
            }
        }

        let product_id = Uuid::new_v4();
        let (product_code, barcode) = resolve_codes(None, None);
        let total_stock: i32 = input.variants.iter().map(|v| v.current_stock).sum();
        let variant_count = input.variants.len();
        let branch_list: Vec<Branch> = self.branches.all().to_vec();
        let default_branch_id = self.branches.default_branch().id;

        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    ensure_unique_codes(txn, &product_code, &barcode, None).await?;

                    let now = Utc::now();
                    let product_name = input.name.clone();
                    product::ActiveModel {
                        id: Set(product_id),
                        product_code: Set(product_code.clone()),
                        barcode: Set(barcode.clone()),
                        name: Set(input.name),
                        brand: Set(input.brand),
                        model_name: Set(input.model_name),
                        fabric: Set(input.fabric),
                        color: Set(input.color),
                        sizes: Set(input.sizes),
                        style: Set(input.style),
                        occasion: Set(input.occasion),
                        embellishments: Set(input.embellishments),
                        category_id: Set(input.category_id),
                        cost_price: Set(input.cost_price),
                        selling_price: Set(input.selling_price),
                        min_stock_level: Set(input.min_stock_level),
                        max_stock_level: Set(input.max_stock_level),
                        is_active: Set(true),
                        stock_location: Set(None),
                        description: Set(input.description),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(|e| map_unique_violation(e, "product code or barcode"))?;

                    for (index, variant) in input.variants.into_iter().enumerate() {
                        let variant_barcode = match variant.barcode {
                            Some(explicit) => explicit,
                            None => derive_variant_barcode(
                                &product_code,
                                &variant.color,
                                &variant.sizes,
                                index,
                            ),
                        };
                        ensure_unique_variant_barcode(txn, &variant_barcode).await?;

                        product_variant::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            product_id: Set(product_id),
                            color: Set(variant.color),
                            sizes: Set(variant.sizes),
                            variant_code: Set(format!("{}-V{}", product_code, index + 1)),
                            variant_barcode: Set(variant_barcode),
                            current_stock: Set(variant.current_stock),
                            min_stock_level: Set(variant.min_stock_level),
                            max_stock_level: Set(variant.max_stock_level),
                            price: Set(variant.price),
                            is_active: Set(true),
                            created_at: Set(now),
                            updated_at: Set(now),
                        }
                        .insert(txn)
                        .await
                        .map_err(|e| map_unique_violation(e, "variant barcode"))?;
                    }

                    let mut default_branch_name = String::new();
                    for branch in &branch_list {
                        let stock = if branch.id == default_branch_id {
                            default_branch_name = branch.name.clone();
                            total_stock
                        } else {
                            0
                        };
                        branch_stock::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            product_id: Set(product_id),
                            branch_id: Set(branch.id),
                            branch_name: Set(branch.name.clone()),
                            current_stock: Set(stock),
                            min_stock_level: Set(input.min_stock_level),
                            max_stock_level: Set(input.max_stock_level),
                            updated_at: Set(now),
                        }
                        .insert(txn)
                        .await?;
                    }

                    if total_stock > 0 {
                        record_movement(
                            txn,
                            NewMovement {
                                product_id,
                                product_name,
                                branch_id: default_branch_id,
                                branch_name: default_branch_name,
                                movement_type: MovementType::In,
                                quantity: total_stock,
                                reason: "Initial Stock".to_string(),
                                notes: Some(format!("{} variants", variant_count)),
                                previous_stock: 0,
                                new_stock: total_stock,
                                recorded_by: user.id,
                                recorded_by_name: user.name,
                            },
                        )
                        .await?;
                    }

                    Ok(())
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        info!(
            "Created product {} with {} variants, total stock {}",
            product_id, variant_count, total_stock
        );

        Ok(CreateWithVariantsResult {
            product_id,
            variant_count,
            total_stock,
        })
    }

    /// Update a product. When the stock bounds change, the new bounds are
    /// propagated to every branch row without touching any branch's count.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        product_id: Uuid,
        mut input: UpdateProductInput,
    ) -> Result<Uuid, ServiceError> {
        normalize_update(&mut input);
        input.validate()?;
        validate_pricing(input.cost_price, input.selling_price)?;
        validate_stock_bounds(input.min_stock_level, input.max_stock_level)?;

        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = Products::find_by_id(product_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Product {} not found", product_id))
                        })?;

                    ensure_unique_codes(txn, &input.product_code, &input.barcode, Some(product_id))
                        .await?;

                    let bounds_changed = existing.min_stock_level != input.min_stock_level
                        || existing.max_stock_level != input.max_stock_level;

                    let mut active: product::ActiveModel = existing.into();
                    active.product_code = Set(input.product_code);
                    active.barcode = Set(input.barcode);
                    active.name = Set(input.name);
                    active.brand = Set(input.brand);
                    active.model_name = Set(input.model_name);
                    active.fabric = Set(input.fabric);
                    active.color = Set(input.color);
                    active.sizes = Set(input.sizes);
                    active.style = Set(input.style);
                    active.occasion = Set(input.occasion);
                    active.embellishments = Set(input.embellishments);
                    active.category_id = Set(input.category_id);
                    active.cost_price = Set(input.cost_price);
                    active.selling_price = Set(input.selling_price);
                    active.min_stock_level = Set(input.min_stock_level);
                    active.max_stock_level = Set(input.max_stock_level);
                    active.is_active = Set(input.is_active);
                    active.stock_location = Set(input.stock_location);
                    active.description = Set(input.description);
                    active.updated_at = Set(Utc::now());
                    active
                        .update(txn)
                        .await
                        .map_err(|e| map_unique_violation(e, "product code or barcode"))?;

                    if bounds_changed {
                        BranchStockRows::update_many()
                            .col_expr(
                                branch_stock::Column::MinStockLevel,
                                Expr::value(input.min_stock_level),
                            )
                            .col_expr(
                                branch_stock::Column::MaxStockLevel,
                                Expr::value(input.max_stock_level),
                            )
                            .col_expr(branch_stock::Column::UpdatedAt, Expr::value(Utc::now()))
                            .filter(branch_stock::Column::ProductId.eq(product_id))
                            .exec(txn)
                            .await?;
                    }

                    Ok(())
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        info!("Updated product: {}", product_id);
        Ok(product_id)
    }

    /// The sole sanctioned path for out-of-sale stock corrections. Sets the
    /// product's aggregate stock to `new_stock` by applying the whole delta
    /// to the default branch, and appends the matching movement in the same
    /// transaction. A zero delta writes nothing.
    #[instrument(skip(self, user))]
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        new_stock: i32,
        reason: String,
        notes: Option<String>,
        user: Actor,
    ) -> Result<AdjustStockResult, ServiceError> {
        if new_stock < 0 {
            STOCK_ADJUSTMENT_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            return Err(ServiceError::ValidationError(
                "stock cannot be set to a negative value".to_string(),
            ));
        }
        if reason.trim().is_empty() {
            STOCK_ADJUSTMENT_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            return Err(ServiceError::ValidationError(
                "a reason is required for stock adjustments".to_string(),
            ));
        }

        let default_branch = self.branches.default_branch().clone();
        let event_reason = reason.clone();

        let result = self
            .db
            .transaction::<_, AdjustStockResult, ServiceError>(move |txn| {
                Box::pin(async move {
                    let product = Products::find_by_id(product_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Product {} not found", product_id))
                        })?;

                    let rows = BranchStockRows::find()
                        .filter(branch_stock::Column::ProductId.eq(product_id))
                        .all(txn)
                        .await?;

                    let aggregate: i32 = rows.iter().map(|r| r.current_stock).sum();
                    let delta = new_stock - aggregate;

                    if delta == 0 {
                        return Ok(AdjustStockResult {
                            product_id,
                            previous_stock: aggregate,
                            new_stock,
                            delta: 0,
                            movement_id: None,
                        });
                    }

                    let default_row = rows
                        .into_iter()
                        .find(|r| r.branch_id == default_branch.id);

                    let (previous_default, row_id) = match default_row {
                        Some(row) => (row.current_stock, row.id),
                        None => {
                            // A product created before this branch joined the
                            // directory; back-fill the row as the sync job
                            // would.
                            let row = branch_stock::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                product_id: Set(product_id),
                                branch_id: Set(default_branch.id),
                                branch_name: Set(default_branch.name.clone()),
                                current_stock: Set(0),
                                min_stock_level: Set(product.min_stock_level),
                                max_stock_level: Set(product.max_stock_level),
                                updated_at: Set(Utc::now()),
                            }
                            .insert(txn)
                            .await?;
                            (0, row.id)
                        }
                    };

                    let new_default = previous_default + delta;
                    if new_default < 0 {
                        return Err(ServiceError::InvalidOperation(format!(
                            "adjustment would drive branch {} to {} (stock at other branches cannot be corrected from here)",
                            default_branch.name, new_default
                        )));
                    }

                    let mut row: branch_stock::ActiveModel = Default::default();
                    row.id = Set(row_id);
                    row.current_stock = Set(new_default);
                    row.updated_at = Set(Utc::now());
                    BranchStockRows::update(row).exec(txn).await?;

                    let movement = record_movement(
                        txn,
                        NewMovement {
                            product_id,
                            product_name: product.name.clone(),
                            branch_id: default_branch.id,
                            branch_name: default_branch.name.clone(),
                            movement_type: if delta > 0 {
                                MovementType::In
                            } else {
                                MovementType::Out
                            },
                            quantity: delta.abs(),
                            reason,
                            notes,
                            previous_stock: previous_default,
                            new_stock: new_default,
                            recorded_by: user.id,
                            recorded_by_name: user.name,
                        },
                    )
                    .await?;

                    Ok(AdjustStockResult {
                        product_id,
                        previous_stock: aggregate,
                        new_stock,
                        delta,
                        movement_id: Some(movement.id),
                    })
                })
            })
            .await
            .map_err(unwrap_txn_err)
            .map_err(|e| {
                STOCK_ADJUSTMENT_FAILURES
                    .with_label_values(&["adjustment_error"])
                    .inc();
                e
            })?;

        if result.delta != 0 {
            STOCK_ADJUSTMENTS.inc();
            self.event_sender
                .send_or_log(Event::StockAdjusted {
                    product_id,
                    branch_id: self.branches.default_branch().id,
                    previous_stock: result.previous_stock,
                    new_stock: result.new_stock,
                    reason: event_reason,
                })
                .await;
        }

        info!(
            product_id = %product_id,
            previous_stock = result.previous_stock,
            new_stock = result.new_stock,
            delta = result.delta,
            "Stock adjusted"
        );

        Ok(result)
    }

    /// Permanently delete a product. Fails while any sale references it;
    /// movements are retained since they carry denormalized names.
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: Uuid) -> Result<Uuid, ServiceError> {
        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    Products::find_by_id(product_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Product {} not found", product_id))
                        })?;

                    let references = sales_guard::sale_reference_count(txn, product_id).await?;
                    if references > 0 {
                        return Err(ServiceError::InvalidOperation(format!(
                            "Cannot delete product {}: referenced by {} sale item(s)",
                            product_id, references
                        )));
                    }

                    ProductVariants::delete_many()
                        .filter(product_variant::Column::ProductId.eq(product_id))
                        .exec(txn)
                        .await?;
                    BranchStockRows::delete_many()
                        .filter(branch_stock::Column::ProductId.eq(product_id))
                        .exec(txn)
                        .await?;
                    Products::delete_by_id(product_id).exec(txn).await?;

                    Ok(())
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        info!("Deleted product: {}", product_id);
        Ok(product_id)
    }

    /// Get a product by id with its per-branch breakdown.
    #[instrument(skip(self))]
    pub async fn get(&self, product_id: Uuid) -> Result<ProductResponse, ServiceError> {
        let product = Products::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let rows = BranchStockRows::find()
            .filter(branch_stock::Column::ProductId.eq(product_id))
            .all(&*self.db)
            .await?;

        Ok(to_response(product, rows))
    }

    /// Barcode lookup used by the POS scanner; checks product barcodes first,
    /// then variant barcodes (resolving to the parent product).
    #[instrument(skip(self))]
    pub async fn get_by_barcode(&self, barcode: &str) -> Result<ProductResponse, ServiceError> {
        let product = Products::find()
            .filter(product::Column::Barcode.eq(barcode))
            .one(&*self.db)
            .await?;

        let product = match product {
            Some(p) => p,
            None => {
                let variant = ProductVariants::find()
                    .filter(product_variant::Column::VariantBarcode.eq(barcode))
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("No product with barcode {}", barcode))
                    })?;
                Products::find_by_id(variant.product_id)
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("No product with barcode {}", barcode))
                    })?
            }
        };

        let rows = BranchStockRows::find()
            .filter(branch_stock::Column::ProductId.eq(product.id))
            .all(&*self.db)
            .await?;

        Ok(to_response(product, rows))
    }

    /// List products with optional search and active filters.
    #[instrument(skip(self))]
    pub async fn list(&self, filters: ProductFilters) -> Result<ProductPage, ServiceError> {
        let mut query = Products::find();

        if let Some(search) = &filters.search {
            query = query.filter(
                product::Column::Name
                    .contains(search)
                    .or(product::Column::ProductCode.contains(search))
                    .or(product::Column::Barcode.contains(search)),
            );
        }
        if let Some(is_active) = filters.is_active {
            query = query.filter(product::Column::IsActive.eq(is_active));
        }
        if let Some(branch_id) = filters.branch_id {
            let stocked: Vec<Uuid> = BranchStockRows::find()
                .filter(branch_stock::Column::BranchId.eq(branch_id))
                .filter(branch_stock::Column::CurrentStock.gt(0))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|row| row.product_id)
                .collect();
            query = query.filter(product::Column::Id.is_in(stocked));
        }

        let total = query.clone().count(&*self.db).await?;

        let limit = filters.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = filters.offset.unwrap_or(0);

        let products = query
            .order_by_desc(product::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?;

        let responses = self.attach_branch_stock(products).await?;

        Ok(ProductPage {
            products: responses,
            total,
        })
    }

    /// Active products only, for storefront pickers.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<ProductResponse>, ServiceError> {
        let products = Products::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?;

        self.attach_branch_stock(products).await
    }

    /// Search products and variants in one pass.
    #[instrument(skip(self))]
    pub async fn search_with_variants(&self, term: &str) -> Result<SearchResult, ServiceError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(SearchResult {
                products: Vec::new(),
                variants: Vec::new(),
            });
        }

        let products = Products::find()
            .filter(
                product::Column::Name
                    .contains(term)
                    .or(product::Column::ProductCode.contains(term))
                    .or(product::Column::Barcode.contains(term))
                    .or(product::Column::Color.contains(term)),
            )
            .order_by_asc(product::Column::Name)
            .limit(MAX_LIMIT)
            .all(&*self.db)
            .await?;

        let variants = ProductVariants::find()
            .filter(
                product_variant::Column::Color
                    .contains(term)
                    .or(product_variant::Column::VariantCode.contains(term))
                    .or(product_variant::Column::VariantBarcode.contains(term)),
            )
            .limit(MAX_LIMIT)
            .all(&*self.db)
            .await?;

        let parent_ids: Vec<Uuid> = variants.iter().map(|v| v.product_id).collect();
        let parents: HashMap<Uuid, String> = if parent_ids.is_empty() {
            HashMap::new()
        } else {
            Products::find()
                .filter(product::Column::Id.is_in(parent_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p.name))
                .collect()
        };

        let variant_hits = variants
            .into_iter()
            .map(|variant| {
                let product_name = parents
                    .get(&variant.product_id)
                    .cloned()
                    .unwrap_or_default();
                VariantHit {
                    variant,
                    product_name,
                }
            })
            .collect();

        let products = self.attach_branch_stock(products).await?;

        Ok(SearchResult {
            products,
            variants: variant_hits,
        })
    }

    /// Catalog-wide stats for the dashboard.
    #[instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<CatalogStats, ServiceError> {
        let products = Products::find().all(&*self.db).await?;
        let rows = BranchStockRows::find().all(&*self.db).await?;

        let mut per_product: HashMap<Uuid, i32> = HashMap::new();
        for row in &rows {
            *per_product.entry(row.product_id).or_insert(0) += row.current_stock;
        }

        let mut total_units: i64 = 0;
        let mut inventory_cost_value = Decimal::ZERO;
        let mut low_stock_products = 0u64;
        let mut out_of_stock_products = 0u64;
        let mut active_products = 0u64;

        for product in &products {
            let aggregate = per_product.get(&product.id).copied().unwrap_or(0);
            total_units += aggregate as i64;
            inventory_cost_value += product.cost_price * Decimal::from(aggregate);
            if product.is_active {
                active_products += 1;
            }
            if aggregate == 0 {
                out_of_stock_products += 1;
            } else if aggregate <= product.min_stock_level {
                low_stock_products += 1;
            }
        }

        Ok(CatalogStats {
            total_products: products.len() as u64,
            active_products,
            total_units,
            inventory_cost_value,
            low_stock_products,
            out_of_stock_products,
        })
    }

    /// Idempotent repair job: back-fill zeroed branch rows for products that
    /// predate a branch joining the directory. Existing rows are never
    /// touched.
    #[instrument(skip(self))]
    pub async fn sync_branch_stock(&self) -> Result<SyncReport, ServiceError> {
        let branch_list: Vec<Branch> = self.branches.all().to_vec();

        let created = self
            .db
            .transaction::<_, u64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let products = Products::find().all(txn).await?;
                    let rows = BranchStockRows::find().all(txn).await?;

                    let mut existing: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
                    for row in rows {
                        existing.entry(row.product_id).or_default().push(row.branch_id);
                    }

                    let mut created = 0u64;
                    let now = Utc::now();
                    for product in products {
                        let have = existing.remove(&product.id).unwrap_or_default();
                        for branch in &branch_list {
                            if have.contains(&branch.id) {
                                continue;
                            }
                            branch_stock::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                product_id: Set(product.id),
                                branch_id: Set(branch.id),
                                branch_name: Set(branch.name.clone()),
                                current_stock: Set(0),
                                min_stock_level: Set(product.min_stock_level),
                                max_stock_level: Set(product.max_stock_level),
                                updated_at: Set(now),
                            }
                            .insert(txn)
                            .await?;
                            created += 1;
                        }
                    }

                    Ok(created)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!("Branch stock sync created {} rows", created);
        Ok(SyncReport {
            branch_rows_created: created,
        })
    }

    /// Group products by (category, selling price, fabric, embellishments)
    /// and write a sequential `BOX-n` label to each product's stock location.
    /// Labels are assigned over the sorted distinct keys, so repeated runs
    /// produce identical output.
    #[instrument(skip(self))]
    pub async fn auto_assign_box_numbers(&self) -> Result<BoxAssignmentReport, ServiceError> {
        let report = self
            .db
            .transaction::<_, BoxAssignmentReport, ServiceError>(move |txn| {
                Box::pin(async move {
                    let products = Products::find().all(txn).await?;

                    let keyed: Vec<(Uuid, BoxGroupKey)> = products
                        .iter()
                        .map(|p| (p.id, BoxGroupKey::of(p)))
                        .collect();
                    let assignments = assign_box_labels(&keyed);
                    let distinct_groups = assignments
                        .values()
                        .collect::<std::collections::HashSet<_>>()
                        .len() as u64;

                    let mut by_label: BTreeMap<String, Vec<Uuid>> = BTreeMap::new();
                    for (product_id, label) in &assignments {
                        by_label.entry(label.clone()).or_default().push(*product_id);
                    }

                    for (label, ids) in by_label {
                        Products::update_many()
                            .col_expr(product::Column::StockLocation, Expr::value(label.clone()))
                            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
                            .filter(product::Column::Id.is_in(ids))
                            .exec(txn)
                            .await?;
                    }

                    Ok(BoxAssignmentReport {
                        distinct_groups,
                        products_labeled: assignments.len() as u64,
                    })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            "Assigned {} box labels across {} groups",
            report.products_labeled, report.distinct_groups
        );
        Ok(report)
    }

    async fn attach_branch_stock(
        &self,
        products: Vec<product::Model>,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let rows = BranchStockRows::find()
            .filter(branch_stock::Column::ProductId.is_in(ids))
            .all(&*self.db)
            .await?;

        let mut grouped: HashMap<Uuid, Vec<branch_stock::Model>> = HashMap::new();
        for row in rows {
            grouped.entry(row.product_id).or_default().push(row);
        }

        Ok(products
            .into_iter()
            .map(|product| {
                let rows = grouped.remove(&product.id).unwrap_or_default();
                to_response(product, rows)
            })
            .collect())
    }
}

/// The acting user, resolved from the caller's identity token.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
}

impl From<crate::auth::AuthenticatedUser> for Actor {
    fn from(user: crate::auth::AuthenticatedUser) -> Self {
        Self {
            id: user.user_id,
            name: user.name,
        }
    }
}

/// Grouping key for box-number assignment. `Ord` drives deterministic label
/// order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct BoxGroupKey {
    category: String,
    price: String,
    fabric: String,
    embellishments: String,
}

impl BoxGroupKey {
    fn of(product: &product::Model) -> Self {
        Self {
            category: product
                .category_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            price: product.selling_price.normalize().to_string(),
            fabric: product.fabric.trim().to_lowercase(),
            embellishments: product
                .embellishments
                .as_deref()
                .unwrap_or("")
                .trim()
                .to_lowercase(),
        }
    }
}

/// Assigns `BOX-n` labels over the sorted distinct keys.
pub(crate) fn assign_box_labels(products: &[(Uuid, BoxGroupKey)]) -> HashMap<Uuid, String> {
    let mut groups: BTreeMap<&BoxGroupKey, Vec<Uuid>> = BTreeMap::new();
    for (id, key) in products {
        groups.entry(key).or_default().push(*id);
    }

    let mut labels = HashMap::new();
    for (index, (_, ids)) in groups.into_iter().enumerate() {
        let label = format!("BOX-{}", index + 1);
        for id in ids {
            labels.insert(id, label.clone());
        }
    }
    labels
}

fn to_response(product: product::Model, rows: Vec<branch_stock::Model>) -> ProductResponse {
    let current_stock = rows.iter().map(|r| r.current_stock).sum();
    let branch_stock = rows
        .into_iter()
        .map(|row| BranchStockEntry {
            branch_id: row.branch_id,
            branch_name: row.branch_name,
            current_stock: row.current_stock,
            min_stock_level: row.min_stock_level,
            max_stock_level: row.max_stock_level,
        })
        .collect();

    ProductResponse {
        product,
        current_stock,
        branch_stock,
    }
}

fn resolve_codes(product_code: Option<String>, barcode: Option<String>) -> (String, String) {
    // Timestamp for operator readability, uuid suffix so two creates in the
    // same millisecond cannot collide on the unique indexes.
    let millis = Utc::now().timestamp_millis();
    let disambiguator = Uuid::new_v4().simple().to_string();
    let code = match product_code {
        Some(code) if !code.is_empty() => code,
        _ => format!("PRD-{}-{}", millis, &disambiguator[..4].to_uppercase()),
    };
    let barcode = match barcode {
        Some(barcode) if !barcode.is_empty() => barcode,
        _ => format!("{}{}", millis, &disambiguator[4..10]),
    };
    (code, barcode)
}

/// Derives a scanner-friendly variant barcode: `{base}-{COLOR}-{SIZE}-{n}`,
/// truncated so the whole code stays within scanner length, keeping the index
/// suffix that makes it unique.
pub(crate) fn derive_variant_barcode(
    base: &str,
    color: &str,
    sizes: &str,
    index: usize,
) -> String {
    let color: String = color
        .split_whitespace()
        .collect::<String>()
        .to_uppercase();
    let first_size = sizes
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .to_uppercase();

    let suffix = format!("-{}", index + 1);
    let mut code = format!("{}-{}-{}", base, color, first_size);

    let mut max = SCANNER_BARCODE_MAX_LEN.saturating_sub(suffix.len());
    if code.len() > max {
        while max > 0 && !code.is_char_boundary(max) {
            max -= 1;
        }
        code.truncate(max);
    }
    code.push_str(&suffix);
    code
}

async fn ensure_unique_codes(
    txn: &DatabaseTransaction,
    product_code: &str,
    barcode: &str,
    exclude_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut code_query = Products::find().filter(product::Column::ProductCode.eq(product_code));
    let mut barcode_query = Products::find().filter(product::Column::Barcode.eq(barcode));
    if let Some(id) = exclude_id {
        code_query = code_query.filter(product::Column::Id.ne(id));
        barcode_query = barcode_query.filter(product::Column::Id.ne(id));
    }

    if code_query.one(txn).await?.is_some() {
        return Err(ServiceError::ValidationError(format!(
            "Product code {} already exists",
            product_code
        )));
    }
    if barcode_query.one(txn).await?.is_some() {
        return Err(ServiceError::ValidationError(format!(
            "Barcode {} already exists",
            barcode
        )));
    }

    Ok(())
}

async fn ensure_unique_variant_barcode(
    txn: &DatabaseTransaction,
    barcode: &str,
) -> Result<(), ServiceError> {
    let exists = ProductVariants::find()
        .filter(product_variant::Column::VariantBarcode.eq(barcode))
        .one(txn)
        .await?
        .is_some();

    if exists {
        return Err(ServiceError::ValidationError(format!(
            "Variant barcode {} already exists",
            barcode
        )));
    }
    Ok(())
}

/// Maps a unique-index violation to a conflict: under a create/create race
/// the pre-check can pass for both writers, the index decides the winner.
fn map_unique_violation(e: DbErr, what: &str) -> ServiceError {
    if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        ServiceError::Conflict(format!("{} already exists", what))
    } else {
        ServiceError::DatabaseError(e)
    }
}

fn unwrap_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

fn validate_pricing(cost_price: Decimal, selling_price: Decimal) -> Result<(), ServiceError> {
    if selling_price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "selling price must be greater than zero".to_string(),
        ));
    }
    if cost_price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "cost price cannot be negative".to_string(),
        ));
    }
    if cost_price > selling_price {
        return Err(ServiceError::ValidationError(
            "cost price cannot exceed selling price".to_string(),
        ));
    }
    Ok(())
}

fn validate_stock_bounds(min: i32, max: i32) -> Result<(), ServiceError> {
    if min < 0 {
        return Err(ServiceError::ValidationError(
            "minimum stock level cannot be negative".to_string(),
        ));
    }
    if max < 1 {
        return Err(ServiceError::ValidationError(
            "maximum stock level must be at least 1".to_string(),
        ));
    }
    if min > max {
        return Err(ServiceError::ValidationError(
            "minimum stock level cannot exceed maximum stock level".to_string(),
        ));
    }
    Ok(())
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn trim_opt(value: &mut Option<String>) {
    if let Some(v) = value {
        trim_in_place(v);
        if v.is_empty() {
            *value = None;
        }
    }
}

fn normalize_create(input: &mut CreateProductInput) {
    trim_opt(&mut input.product_code);
    trim_opt(&mut input.barcode);
    trim_in_place(&mut input.name);
    trim_in_place(&mut input.brand);
    trim_in_place(&mut input.fabric);
    trim_in_place(&mut input.color);
    trim_in_place(&mut input.sizes);
    trim_opt(&mut input.model_name);
    trim_opt(&mut input.style);
    trim_opt(&mut input.occasion);
    trim_opt(&mut input.embellishments);
    trim_opt(&mut input.stock_location);
    trim_opt(&mut input.description);
}

fn normalize_update(input: &mut UpdateProductInput) {
    trim_in_place(&mut input.product_code);
    trim_in_place(&mut input.barcode);
    trim_in_place(&mut input.name);
    trim_in_place(&mut input.brand);
    trim_in_place(&mut input.fabric);
    trim_in_place(&mut input.color);
    trim_in_place(&mut input.sizes);
    trim_opt(&mut input.model_name);
    trim_opt(&mut input.style);
    trim_opt(&mut input.occasion);
    trim_opt(&mut input.embellishments);
    trim_opt(&mut input.stock_location);
    trim_opt(&mut input.description);
}

fn normalize_create_with_variants(input: &mut CreateWithVariantsInput) {
    trim_in_place(&mut input.name);
    trim_in_place(&mut input.brand);
    trim_in_place(&mut input.fabric);
    trim_in_place(&mut input.color);
    trim_in_place(&mut input.sizes);
    trim_opt(&mut input.model_name);
    trim_opt(&mut input.style);
    trim_opt(&mut input.occasion);
    trim_opt(&mut input.embellishments);
    trim_opt(&mut input.description);
    for variant in &mut input.variants {
        trim_in_place(&mut variant.color);
        trim_in_place(&mut variant.sizes);
        trim_opt(&mut variant.barcode);
    }
}
