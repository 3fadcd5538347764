mod common;

use stockroom_api::entities::stock_movement::MovementType;

use common::{actor, product_input, setup};

#[tokio::test]
async fn query_filters_by_product_and_respects_limit() {
    let ctx = setup().await;

    let first = ctx
        .catalog
        .create(product_input("Gown", 5), actor())
        .await
        .unwrap();
    let second = ctx
        .catalog
        .create(product_input("Kaftan", 7), actor())
        .await
        .unwrap();

    ctx.catalog
        .adjust_stock(first, 8, "Found".to_string(), None, actor())
        .await
        .unwrap();
    ctx.catalog
        .adjust_stock(first, 6, "Damage".to_string(), None, actor())
        .await
        .unwrap();

    let all_first = ctx.ledger.query(Some(first), None).await.unwrap();
    assert_eq!(all_first.len(), 3);
    assert!(all_first.iter().all(|m| m.product_id == first));

    let limited = ctx.ledger.query(Some(first), Some(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
    // Newest first: the "Damage" adjustment is the latest write.
    assert_eq!(limited[0].reason, "Damage");
    assert_eq!(limited[0].movement_type, MovementType::Out);
    assert_eq!(limited[0].previous_stock, 8);
    assert_eq!(limited[0].new_stock, 6);

    let unfiltered = ctx.ledger.query(None, None).await.unwrap();
    assert_eq!(unfiltered.len(), 4);
    assert!(unfiltered.iter().any(|m| m.product_id == second));
}

#[tokio::test]
async fn movements_attribute_the_acting_user() {
    let ctx = setup().await;

    let clerk = common::actor();
    let id = ctx
        .catalog
        .create(product_input("Shawl", 3), clerk.clone())
        .await
        .unwrap();

    let movements = ctx.ledger.query(Some(id), None).await.unwrap();
    assert_eq!(movements[0].recorded_by, clerk.id);
    assert_eq!(movements[0].recorded_by_name, clerk.name);
}
