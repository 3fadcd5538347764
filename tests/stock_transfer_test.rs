mod common;

use stockroom_api::entities::stock_movement::MovementType;
use stockroom_api::entities::stock_transfer::TransferStatus;
use stockroom_api::errors::ServiceError;
use stockroom_api::services::stock_transfers::{CreateTransferInput, TransferItemInput};

use common::{actor, product_input, setup};

fn transfer_input(
    source: uuid::Uuid,
    destination: uuid::Uuid,
    product_id: uuid::Uuid,
    quantity: i32,
) -> CreateTransferInput {
    CreateTransferInput {
        source_branch_id: source,
        destination_branch_id: destination,
        items: vec![TransferItemInput {
            product_id,
            quantity,
        }],
        notes: None,
    }
}

/// The full acceptance walkthrough: create a product with 20 units on Main,
/// adjust to 15, transfer 5 to Branch2 through the whole lifecycle, checking
/// stock and ledger at each step.
#[tokio::test]
async fn full_transfer_lifecycle() {
    let ctx = setup().await;
    let product_id = ctx
        .catalog
        .create(product_input("Evening Gown", 20), actor())
        .await
        .unwrap();

    ctx.catalog
        .adjust_stock(product_id, 15, "Damage".to_string(), None, actor())
        .await
        .unwrap();

    let transfer = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 5),
            actor(),
        )
        .await
        .expect("create transfer");
    assert_eq!(transfer.transfer.status, TransferStatus::Pending);
    assert_eq!(transfer.items.len(), 1);
    assert_eq!(transfer.items[0].stock_at_request, 15);
    assert!(transfer.transfer.transfer_number.starts_with("TRF-"));

    let transfer_id = transfer.transfer.id;

    let approved = ctx.transfers.approve(transfer_id, actor()).await.unwrap();
    assert_eq!(approved.transfer.status, TransferStatus::Approved);
    assert!(approved.transfer.approved_at.is_some());

    // Nothing has moved yet.
    let product = ctx.catalog.get(product_id).await.unwrap();
    assert_eq!(product.current_stock, 15);

    let shipped = ctx.transfers.ship(transfer_id, actor()).await.unwrap();
    assert_eq!(shipped.transfer.status, TransferStatus::InTransit);

    let product = ctx.catalog.get(product_id).await.unwrap();
    assert_eq!(product.current_stock, 10);
    let main = product
        .branch_stock
        .iter()
        .find(|b| b.branch_id == ctx.main_branch)
        .unwrap();
    assert_eq!(main.current_stock, 10);

    let received = ctx.transfers.receive(transfer_id, actor()).await.unwrap();
    assert_eq!(received.transfer.status, TransferStatus::Completed);
    assert!(received.transfer.completed_at.is_some());

    let product = ctx.catalog.get(product_id).await.unwrap();
    assert_eq!(product.current_stock, 15);
    let second = product
        .branch_stock
        .iter()
        .find(|b| b.branch_id == ctx.second_branch)
        .unwrap();
    assert_eq!(second.current_stock, 5);

    // Ledger: initial in(20), adjust out(5), dispatch out(5), receive in(5);
    // the Main-branch chain is contiguous.
    let movements = ctx.ledger.query(Some(product_id), None).await.unwrap();
    assert_eq!(movements.len(), 4);

    let mut main_chain: Vec<_> = movements
        .iter()
        .filter(|m| m.branch_id == ctx.main_branch)
        .collect();
    main_chain.sort_by_key(|m| m.new_stock); // 10, 15, 20 → order by effect
    let pairs: Vec<(i32, i32)> = main_chain
        .iter()
        .map(|m| (m.previous_stock, m.new_stock))
        .collect();
    assert!(pairs.contains(&(0, 20)));
    assert!(pairs.contains(&(20, 15)));
    assert!(pairs.contains(&(15, 10)));

    let receive_movement = movements
        .iter()
        .find(|m| m.branch_id == ctx.second_branch)
        .expect("destination movement");
    assert_eq!(receive_movement.movement_type, MovementType::In);
    assert_eq!(receive_movement.quantity, 5);
    assert_eq!(receive_movement.previous_stock, 0);
    assert_eq!(receive_movement.new_stock, 5);
}

#[tokio::test]
async fn transitions_out_of_order_are_rejected_without_side_effects() {
    let ctx = setup().await;
    let product_id = ctx
        .catalog
        .create(product_input("Kaftan", 10), actor())
        .await
        .unwrap();

    let transfer = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 3),
            actor(),
        )
        .await
        .unwrap();
    let id = transfer.transfer.id;

    // Ship before approve: rejected, still pending, stock untouched.
    let err = ctx.transfers.ship(id, actor()).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
    assert_eq!(
        ctx.transfers.get(id).await.unwrap().transfer.status,
        TransferStatus::Pending
    );
    assert_eq!(ctx.catalog.get(product_id).await.unwrap().current_stock, 10);

    // Receive before ship: rejected.
    let err = ctx.transfers.receive(id, actor()).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    // Approve twice: second is rejected.
    ctx.transfers.approve(id, actor()).await.unwrap();
    let err = ctx.transfers.approve(id, actor()).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    // Only the initial movement exists.
    let movements = ctx.ledger.query(Some(product_id), None).await.unwrap();
    assert_eq!(movements.len(), 1);
}

#[tokio::test]
async fn cancel_is_allowed_until_ship_only() {
    let ctx = setup().await;
    let product_id = ctx
        .catalog
        .create(product_input("Scarf", 10), actor())
        .await
        .unwrap();

    // Cancel from pending.
    let pending = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 2),
            actor(),
        )
        .await
        .unwrap();
    let cancelled = ctx
        .transfers
        .cancel(pending.transfer.id, "requested in error".to_string())
        .await
        .unwrap();
    assert_eq!(cancelled.transfer.status, TransferStatus::Cancelled);
    assert_eq!(
        cancelled.transfer.cancellation_reason.as_deref(),
        Some("requested in error")
    );

    // Cancel from approved.
    let approved = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 2),
            actor(),
        )
        .await
        .unwrap();
    ctx.transfers
        .approve(approved.transfer.id, actor())
        .await
        .unwrap();
    ctx.transfers
        .cancel(approved.transfer.id, "no longer needed".to_string())
        .await
        .unwrap();

    // Cancel from in_transit: rejected, because stock already left.
    let in_transit = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 2),
            actor(),
        )
        .await
        .unwrap();
    ctx.transfers
        .approve(in_transit.transfer.id, actor())
        .await
        .unwrap();
    ctx.transfers
        .ship(in_transit.transfer.id, actor())
        .await
        .unwrap();
    let err = ctx
        .transfers
        .cancel(in_transit.transfer.id, "too late".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    // Cancelled transfers never moved stock; only the shipped one did.
    assert_eq!(ctx.catalog.get(product_id).await.unwrap().current_stock, 8);
}

#[tokio::test]
async fn create_validations() {
    let ctx = setup().await;
    let product_id = ctx
        .catalog
        .create(product_input("Belt", 5), actor())
        .await
        .unwrap();

    // Same source and destination.
    let err = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.main_branch, product_id, 1),
            actor(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // More than available at request time.
    let err = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 6),
            actor(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // Zero quantity.
    let err = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 0),
            actor(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // Empty item list.
    let err = ctx
        .transfers
        .create(
            CreateTransferInput {
                source_branch_id: ctx.main_branch,
                destination_branch_id: ctx.second_branch,
                items: vec![],
                notes: None,
            },
            actor(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn ship_revalidates_current_stock_not_snapshot() {
    let ctx = setup().await;
    let product_id = ctx
        .catalog
        .create(product_input("Clutch", 10), actor())
        .await
        .unwrap();

    let first = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 8),
            actor(),
        )
        .await
        .unwrap();
    let second = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 8),
            actor(),
        )
        .await
        .unwrap();

    ctx.transfers.approve(first.transfer.id, actor()).await.unwrap();
    ctx.transfers.approve(second.transfer.id, actor()).await.unwrap();

    ctx.transfers.ship(first.transfer.id, actor()).await.unwrap();

    // The second transfer passed its create-time check against 10 units, but
    // only 2 remain now.
    let err = ctx
        .transfers
        .ship(second.transfer.id, actor())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // The loser is untouched and the source branch kept its remaining units.
    assert_eq!(
        ctx.transfers.get(second.transfer.id).await.unwrap().transfer.status,
        TransferStatus::Approved
    );
    let product = ctx.catalog.get(product_id).await.unwrap();
    let main = product
        .branch_stock
        .iter()
        .find(|b| b.branch_id == ctx.main_branch)
        .unwrap();
    assert_eq!(main.current_stock, 2);
}

#[tokio::test]
async fn concurrent_ships_allocate_stock_exactly_once() {
    let ctx = setup().await;
    let product_id = ctx
        .catalog
        .create(product_input("Limited Gown", 10), actor())
        .await
        .unwrap();

    let first = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 8),
            actor(),
        )
        .await
        .unwrap();
    let second = ctx
        .transfers
        .create(
            transfer_input(ctx.main_branch, ctx.second_branch, product_id, 8),
            actor(),
        )
        .await
        .unwrap();
    ctx.transfers.approve(first.transfer.id, actor()).await.unwrap();
    ctx.transfers.approve(second.transfer.id, actor()).await.unwrap();

    let svc_a = ctx.transfers.clone();
    let svc_b = ctx.transfers.clone();
    let id_a = first.transfer.id;
    let id_b = second.transfer.id;

    let task_a = tokio::spawn(async move { svc_a.ship(id_a, actor()).await });
    let task_b = tokio::spawn(async move { svc_b.ship(id_b, actor()).await });

    let result_a = task_a.await.unwrap();
    let result_b = task_b.await.unwrap();

    let successes = [&result_a, &result_b]
        .iter()
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(
        successes, 1,
        "exactly one of two competing ships may succeed"
    );

    let failure = if result_a.is_err() { result_a } else { result_b };
    assert!(matches!(
        failure.unwrap_err(),
        ServiceError::InsufficientStock(_)
    ));

    // 10 - 8 = 2 units remain at the source; one transfer is in transit.
    let product = ctx.catalog.get(product_id).await.unwrap();
    let main = product
        .branch_stock
        .iter()
        .find(|b| b.branch_id == ctx.main_branch)
        .unwrap();
    assert_eq!(main.current_stock, 2);

    let mut in_transit = 0;
    for id in [id_a, id_b] {
        if ctx.transfers.get(id).await.unwrap().transfer.status == TransferStatus::InTransit {
            in_transit += 1;
        }
    }
    assert_eq!(in_transit, 1);
}
