mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use stockroom_api::entities::{
    branch_stock, product_variant, sale_item, stock_movement::MovementType,
};
use stockroom_api::errors::ServiceError;
use stockroom_api::services::product_catalog::{CreateWithVariantsInput, VariantInput};

use common::{actor, product_input, setup};

#[tokio::test]
async fn create_concentrates_stock_on_default_branch() {
    let ctx = setup().await;

    let id = ctx
        .catalog
        .create(product_input("Evening Gown", 20), actor())
        .await
        .expect("create");

    let product = ctx.catalog.get(id).await.expect("get");
    assert_eq!(product.current_stock, 20);
    assert_eq!(product.branch_stock.len(), 2);

    let main = product
        .branch_stock
        .iter()
        .find(|b| b.branch_id == ctx.main_branch)
        .expect("main branch row");
    let second = product
        .branch_stock
        .iter()
        .find(|b| b.branch_id == ctx.second_branch)
        .expect("second branch row");
    assert_eq!(main.current_stock, 20);
    assert_eq!(second.current_stock, 0);

    let movements = ctx.ledger.query(Some(id), None).await.expect("ledger");
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, MovementType::In);
    assert_eq!(movements[0].quantity, 20);
    assert_eq!(movements[0].reason, "Initial Stock");
    assert_eq!(movements[0].previous_stock, 0);
    assert_eq!(movements[0].new_stock, 20);
    assert_eq!(movements[0].branch_id, ctx.main_branch);
}

#[tokio::test]
async fn adjust_stock_writes_one_movement_and_repeats_are_noops() {
    let ctx = setup().await;
    let id = ctx
        .catalog
        .create(product_input("Kaftan", 20), actor())
        .await
        .unwrap();

    let result = ctx
        .catalog
        .adjust_stock(id, 15, "Damage".to_string(), None, actor())
        .await
        .expect("adjust");
    assert_eq!(result.previous_stock, 20);
    assert_eq!(result.new_stock, 15);
    assert_eq!(result.delta, -5);
    assert!(result.movement_id.is_some());

    let movements = ctx.ledger.query(Some(id), None).await.unwrap();
    assert_eq!(movements.len(), 2);
    let adjustment = movements
        .iter()
        .find(|m| m.reason == "Damage")
        .expect("adjustment movement");
    assert_eq!(adjustment.movement_type, MovementType::Out);
    assert_eq!(adjustment.quantity, 5);
    assert_eq!(adjustment.previous_stock, 20);
    assert_eq!(adjustment.new_stock, 15);

    // Second identical call: zero delta, no new movement.
    let repeat = ctx
        .catalog
        .adjust_stock(id, 15, "Damage".to_string(), None, actor())
        .await
        .expect("repeat adjust");
    assert_eq!(repeat.delta, 0);
    assert!(repeat.movement_id.is_none());

    let movements = ctx.ledger.query(Some(id), None).await.unwrap();
    assert_eq!(movements.len(), 2);

    let product = ctx.catalog.get(id).await.unwrap();
    assert_eq!(product.current_stock, 15);
}

#[tokio::test]
async fn adjust_stock_rejects_negative_target() {
    let ctx = setup().await;
    let id = ctx
        .catalog
        .create(product_input("Shawl", 5), actor())
        .await
        .unwrap();

    let err = ctx
        .catalog
        .adjust_stock(id, -1, "Count".to_string(), None, actor())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let movements = ctx.ledger.query(Some(id), None).await.unwrap();
    assert_eq!(movements.len(), 1);
}

#[tokio::test]
async fn duplicate_codes_fail_with_zero_writes() {
    let ctx = setup().await;

    let mut first = product_input("Abaya", 3);
    first.product_code = Some("PRD-FIXED".to_string());
    first.barcode = Some("4006381333931".to_string());
    ctx.catalog.create(first, actor()).await.expect("first");

    let mut duplicate_code = product_input("Abaya Copy", 3);
    duplicate_code.product_code = Some("PRD-FIXED".to_string());
    duplicate_code.barcode = Some("4006381333932".to_string());
    let err = ctx
        .catalog
        .create(duplicate_code, actor())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let mut duplicate_barcode = product_input("Abaya Copy 2", 3);
    duplicate_barcode.product_code = Some("PRD-OTHER".to_string());
    duplicate_barcode.barcode = Some("4006381333931".to_string());
    let err = ctx
        .catalog
        .create(duplicate_barcode, actor())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let page = ctx
        .catalog
        .list(stockroom_api::services::product_catalog::ProductFilters {
            search: None,
            is_active: None,
            branch_id: None,
            limit: None,
            offset: None,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    // Only the surviving product's initial movement exists.
    let movements = ctx.ledger.query(None, None).await.unwrap();
    assert_eq!(movements.len(), 1);
}

#[tokio::test]
async fn create_rejects_invalid_fields_without_writes() {
    let ctx = setup().await;

    let mut bad_price = product_input("Hijab", 1);
    bad_price.selling_price = dec!(0);
    assert!(ctx.catalog.create(bad_price, actor()).await.is_err());

    let mut cost_above_selling = product_input("Hijab", 1);
    cost_above_selling.cost_price = dec!(1000);
    assert!(ctx
        .catalog
        .create(cost_above_selling, actor())
        .await
        .is_err());

    let mut bad_bounds = product_input("Hijab", 1);
    bad_bounds.min_stock_level = 10;
    bad_bounds.max_stock_level = 5;
    assert!(ctx.catalog.create(bad_bounds, actor()).await.is_err());

    let mut short_name = product_input("H", 1);
    short_name.name = "H".to_string();
    assert!(ctx.catalog.create(short_name, actor()).await.is_err());

    let movements = ctx.ledger.query(None, None).await.unwrap();
    assert!(movements.is_empty());
}

#[tokio::test]
async fn remove_is_blocked_by_sale_references() {
    let ctx = setup().await;
    let id = ctx
        .catalog
        .create(product_input("Clutch", 4), actor())
        .await
        .unwrap();

    sale_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        sale_id: Set(Uuid::new_v4()),
        product_id: Set(id),
        quantity: Set(1),
        unit_price: Set(dec!(900)),
        created_at: Set(Utc::now()),
    }
    .insert(&*ctx.db)
    .await
    .expect("seed sale item");

    let err = ctx.catalog.remove(id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
    assert!(ctx.catalog.get(id).await.is_ok());

    sale_item::Entity::delete_many()
        .filter(sale_item::Column::ProductId.eq(id))
        .exec(&*ctx.db)
        .await
        .unwrap();

    ctx.catalog.remove(id).await.expect("remove");
    assert!(matches!(
        ctx.catalog.get(id).await.unwrap_err(),
        ServiceError::NotFound(_)
    ));

    // Branch rows are gone too; the ledger is permanent.
    let rows = branch_stock::Entity::find()
        .filter(branch_stock::Column::ProductId.eq(id))
        .all(&*ctx.db)
        .await
        .unwrap();
    assert!(rows.is_empty());
    let movements = ctx.ledger.query(Some(id), None).await.unwrap();
    assert_eq!(movements.len(), 1);
}

#[tokio::test]
async fn create_with_variants_aggregates_stock() {
    let ctx = setup().await;

    let input = CreateWithVariantsInput {
        name: "Party Dress".to_string(),
        brand: "Aziza".to_string(),
        model_name: None,
        fabric: "chiffon".to_string(),
        color: "Assorted".to_string(),
        sizes: "S,M,L".to_string(),
        style: None,
        occasion: Some("Wedding".to_string()),
        embellishments: Some("Sequins".to_string()),
        category_id: None,
        cost_price: dec!(300),
        selling_price: dec!(750),
        min_stock_level: 1,
        max_stock_level: 30,
        description: None,
        variants: vec![
            VariantInput {
                color: "Red".to_string(),
                sizes: "S,M".to_string(),
                current_stock: 3,
                min_stock_level: 1,
                max_stock_level: 10,
                barcode: None,
                price: None,
            },
            VariantInput {
                color: "Navy Blue".to_string(),
                sizes: "L".to_string(),
                current_stock: 4,
                min_stock_level: 1,
                max_stock_level: 10,
                barcode: None,
                price: Some(dec!(800)),
            },
        ],
    };

    let result = ctx
        .catalog
        .create_with_variants(input, actor())
        .await
        .expect("create with variants");
    assert_eq!(result.variant_count, 2);
    assert_eq!(result.total_stock, 7);

    let product = ctx.catalog.get(result.product_id).await.unwrap();
    assert_eq!(product.current_stock, 7);
    let main = product
        .branch_stock
        .iter()
        .find(|b| b.branch_id == ctx.main_branch)
        .unwrap();
    assert_eq!(main.current_stock, 7);

    let variants = product_variant::Entity::find()
        .filter(product_variant::Column::ProductId.eq(result.product_id))
        .all(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(variants.len(), 2);
    assert_ne!(variants[0].variant_barcode, variants[1].variant_barcode);
    for variant in &variants {
        assert!(variant.variant_barcode.starts_with(&product.product.product_code));
        assert!(variant.variant_barcode.len() <= 40);
    }

    // One consolidated initial movement.
    let movements = ctx.ledger.query(Some(result.product_id), None).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].quantity, 7);

    // A variant barcode resolves to the parent product.
    let by_barcode = ctx
        .catalog
        .get_by_barcode(&variants[0].variant_barcode)
        .await
        .expect("variant barcode lookup");
    assert_eq!(by_barcode.product.id, result.product_id);
}

#[tokio::test]
async fn update_propagates_bounds_without_touching_stock() {
    let ctx = setup().await;
    let id = ctx
        .catalog
        .create(product_input("Scarf", 12), actor())
        .await
        .unwrap();
    let before = ctx.catalog.get(id).await.unwrap();

    let input = stockroom_api::services::product_catalog::UpdateProductInput {
        product_code: before.product.product_code.clone(),
        barcode: before.product.barcode.clone(),
        name: "Silk Scarf".to_string(),
        brand: before.product.brand.clone(),
        model_name: None,
        fabric: before.product.fabric.clone(),
        color: before.product.color.clone(),
        sizes: before.product.sizes.clone(),
        style: None,
        occasion: None,
        embellishments: None,
        category_id: None,
        cost_price: before.product.cost_price,
        selling_price: before.product.selling_price,
        min_stock_level: 4,
        max_stock_level: 80,
        is_active: true,
        stock_location: None,
        description: None,
    };

    ctx.catalog.update(id, input).await.expect("update");

    let after = ctx.catalog.get(id).await.unwrap();
    assert_eq!(after.product.name, "Silk Scarf");
    assert_eq!(after.current_stock, 12);
    for row in &after.branch_stock {
        assert_eq!(row.min_stock_level, 4);
        assert_eq!(row.max_stock_level, 80);
    }
    let main = after
        .branch_stock
        .iter()
        .find(|b| b.branch_id == ctx.main_branch)
        .unwrap();
    assert_eq!(main.current_stock, 12);
}

#[tokio::test]
async fn sync_branch_stock_backfills_only_missing_rows() {
    let ctx = setup().await;
    let id = ctx
        .catalog
        .create(product_input("Belt", 6), actor())
        .await
        .unwrap();

    // Nothing missing right after create.
    let report = ctx.catalog.sync_branch_stock().await.unwrap();
    assert_eq!(report.branch_rows_created, 0);

    // Simulate a product that predates the second branch.
    branch_stock::Entity::delete_many()
        .filter(branch_stock::Column::ProductId.eq(id))
        .filter(branch_stock::Column::BranchId.eq(ctx.second_branch))
        .exec(&*ctx.db)
        .await
        .unwrap();

    let report = ctx.catalog.sync_branch_stock().await.unwrap();
    assert_eq!(report.branch_rows_created, 1);

    let product = ctx.catalog.get(id).await.unwrap();
    assert_eq!(product.current_stock, 6);
    let restored = product
        .branch_stock
        .iter()
        .find(|b| b.branch_id == ctx.second_branch)
        .expect("backfilled row");
    assert_eq!(restored.current_stock, 0);

    // Idempotent.
    let report = ctx.catalog.sync_branch_stock().await.unwrap();
    assert_eq!(report.branch_rows_created, 0);
}

#[tokio::test]
async fn box_numbers_group_by_key_and_are_deterministic() {
    let ctx = setup().await;

    let mut a = product_input("Gown A", 1);
    a.embellishments = Some("Sequins".to_string());
    let mut b = product_input("Gown B", 1);
    b.embellishments = Some("Sequins".to_string());
    let mut c = product_input("Gown C", 1);
    c.selling_price = dec!(1200);
    c.embellishments = Some("Beads".to_string());

    let id_a = ctx.catalog.create(a, actor()).await.unwrap();
    let id_b = ctx.catalog.create(b, actor()).await.unwrap();
    let id_c = ctx.catalog.create(c, actor()).await.unwrap();

    let report = ctx.catalog.auto_assign_box_numbers().await.unwrap();
    assert_eq!(report.distinct_groups, 2);
    assert_eq!(report.products_labeled, 3);

    let label_a = stock_location(&ctx, id_a).await;
    let label_b = stock_location(&ctx, id_b).await;
    let label_c = stock_location(&ctx, id_c).await;

    assert_eq!(label_a, label_b);
    assert_ne!(label_a, label_c);
    assert!(label_a.starts_with("BOX-"));

    // Re-running yields identical labels.
    ctx.catalog.auto_assign_box_numbers().await.unwrap();
    assert_eq!(stock_location(&ctx, id_a).await, label_a);
    assert_eq!(stock_location(&ctx, id_c).await, label_c);
}

async fn stock_location(ctx: &common::TestContext, id: Uuid) -> String {
    ctx.catalog
        .get(id)
        .await
        .unwrap()
        .product
        .stock_location
        .expect("label assigned")
}

#[tokio::test]
async fn list_can_filter_by_branch_with_stock() {
    let ctx = setup().await;
    let stocked = ctx
        .catalog
        .create(product_input("Stocked Gown", 9), actor())
        .await
        .unwrap();
    ctx.catalog
        .create(product_input("Empty Gown", 0), actor())
        .await
        .unwrap();

    let filters = |branch| stockroom_api::services::product_catalog::ProductFilters {
        search: None,
        is_active: None,
        branch_id: Some(branch),
        limit: None,
        offset: None,
    };

    // All initial stock sits on the default branch.
    let page = ctx.catalog.list(filters(ctx.main_branch)).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.products[0].product.id, stocked);

    let page = ctx.catalog.list(filters(ctx.second_branch)).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn low_stock_report_classifies_products() {
    let ctx = setup().await;

    let mut low = product_input("Low Stock Gown", 2);
    low.min_stock_level = 2;
    let low_id = ctx.catalog.create(low, actor()).await.unwrap();

    let mut out = product_input("Out Of Stock Gown", 0);
    out.min_stock_level = 1;
    let out_id = ctx.catalog.create(out, actor()).await.unwrap();

    let healthy = product_input("Healthy Gown", 40);
    let healthy_id = ctx.catalog.create(healthy, actor()).await.unwrap();

    let report = ctx.low_stock.report().await.unwrap();
    assert!(report.low_stock.iter().any(|p| p.product_id == low_id));
    assert!(report.out_of_stock.iter().any(|p| p.product_id == out_id));
    assert!(!report
        .low_stock
        .iter()
        .chain(report.out_of_stock.iter())
        .any(|p| p.product_id == healthy_id));
}
