//! Integration tests for coupon booking, usage limits and finalization

use std::{path::Path, sync::Arc};

use mockall::predicate::eq;
use serde_json::json;
use testresult::TestResult;

use pos_rewards::{
    catalog::ProgramCatalog,
    config::EngineSettings,
    engine::RewardEngine,
    ids::{CouponId, OrderId, ProductId, ProgramId, SessionId},
    ledger::{Booking, CouponError},
    order::{Order, OrderLine},
    reasons::Reason,
    service::{
        CouponService, CouponState, GeneratedCoupons, MockCouponService, ScanOutcome,
        ServiceError,
    },
};

const PEN: u64 = 1;
const NOTEBOOK: u64 = 2;

fn engine_with(catalog: ProgramCatalog, service: MockCouponService) -> RewardEngine {
    let service: Arc<dyn CouponService> = Arc::new(service);

    RewardEngine::new(
        Arc::new(catalog),
        service,
        EngineSettings::new(SessionId::new(7)),
    )
}

fn engine(service: MockCouponService) -> TestResult<RewardEngine> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/catalog.yaml");

    Ok(engine_with(ProgramCatalog::load(&path)?, service))
}

fn order(engine: &RewardEngine, lines: &[(u64, u32)]) -> TestResult<Order> {
    let mut order = engine.new_order();

    for &(product, quantity) in lines {
        let product = engine
            .catalog()
            .product(ProductId::new(product))
            .ok_or("unknown product")?;

        order.push_line(OrderLine::new(
            product.id,
            quantity,
            product.lst_price,
            product.taxes.clone(),
        ))?;
    }

    Ok(order)
}

fn accept_coupon_1234(service: &mut MockCouponService) {
    service
        .expect_scan_code()
        .withf(|request| request.code == "1234" && request.session == SessionId::new(7))
        .once()
        .returning(|_| {
            Ok(ScanOutcome::Accepted {
                program: ProgramId::new(4),
                coupon: CouponId::new(50),
            })
        });
}

#[tokio::test]
async fn coupon_code_books_once() -> TestResult {
    let mut service = MockCouponService::new();
    accept_coupon_1234(&mut service);

    let engine = engine(service)?;
    let sync = engine.open_order(order(&engine, &[(NOTEBOOK, 9)])?).await;

    let outcome = sync.update_rewards(Some("1234")).await?;
    let report = outcome.report().ok_or("expected an applied update")?;

    assert!(matches!(
        report.booking,
        Some(Ok(Booking::CouponBooked { coupon, .. })) if coupon == CouponId::new(50)
    ));

    let first: Vec<OrderLine> = sync.order().await.reward_lines().cloned().collect();

    assert_eq!(first.len(), 1);
    assert_eq!(first.first().map(|line| line.quantity), Some(2));
    assert_eq!(
        first.first().and_then(OrderLine::coupon),
        Some(CouponId::new(50))
    );

    let outcome = sync.update_rewards(Some("1234")).await?;
    let report = outcome.report().ok_or("expected an applied update")?;

    assert!(matches!(
        &report.booking,
        Some(Err(error @ CouponError::AlreadyScanned(_)))
            if error.to_string() == "That coupon code has been scanned and activated."
    ));

    let second: Vec<OrderLine> = sync.order().await.reward_lines().cloned().collect();

    assert_eq!(first, second);

    Ok(())
}

#[tokio::test]
async fn rejected_coupon_keeps_the_server_message() -> TestResult {
    let mut service = MockCouponService::new();
    service.expect_scan_code().once().returning(|_| {
        Ok(ScanOutcome::Rejected {
            message: "This coupon has already been used.".to_string(),
        })
    });

    let engine = engine(service)?;
    let sync = engine.open_order(order(&engine, &[(PEN, 1)])?).await;

    let outcome = sync.update_rewards(Some("USED")).await?;
    let report = outcome.report().ok_or("expected an applied update")?;

    assert!(matches!(
        &report.booking,
        Some(Err(error)) if error.to_string() == "This coupon has already been used."
    ));
    assert!(sync.order().await.ledger().booked().is_empty());

    Ok(())
}

#[tokio::test]
async fn removing_a_coupon_reward_releases_the_coupon() -> TestResult {
    let mut service = MockCouponService::new();
    accept_coupon_1234(&mut service);
    service
        .expect_set_coupon_state()
        .with(eq(vec![CouponId::new(50)]), eq(CouponState::New))
        .once()
        .returning(|_, _| Ok(()));

    let engine = engine(service)?;
    let sync = engine.open_order(order(&engine, &[(NOTEBOOK, 9)])?).await;

    sync.update_rewards(Some("1234")).await?;

    let removal = sync.remove_line(1).await?;

    assert_eq!(
        removal.deactivated.map(|deactivated| deactivated.to_string()),
        Some("Coupon (1234) has been deactivated.".to_string())
    );
    assert!(sync.order().await.ledger().booked().is_empty());
    assert_eq!(sync.order().await.reward_lines().count(), 0);

    Ok(())
}

#[tokio::test]
async fn coupon_without_reward_line_is_reported_unused() -> TestResult {
    let mut service = MockCouponService::new();
    accept_coupon_1234(&mut service);
    service
        .expect_validate_coupon_programs()
        .withf(|request| {
            request.orders == vec![OrderId::new(99)]
                && request.programs_to_generate.is_empty()
                && request.unused_coupons == vec![CouponId::new(50)]
        })
        .once()
        .returning(|_| Ok(GeneratedCoupons(json!([]))));

    let engine = engine(service)?;
    let sync = engine.open_order(order(&engine, &[(NOTEBOOK, 9)])?).await;

    sync.update_rewards(Some("1234")).await?;
    assert_eq!(sync.order().await.reward_lines().count(), 1);

    // Without the notebooks the coupon program no longer applies.
    sync.order().await.remove_line(0)?;
    sync.update_rewards(None).await?;

    {
        let order = sync.order().await;

        assert_eq!(order.reward_lines().count(), 0);
        assert!(order.non_generating().iter().any(|entry| {
            entry.coupon == Some(CouponId::new(50))
                && entry.reason == Reason::MinimumQuantityNotReached
        }));
    }

    let mut order = sync.into_order();
    let report = engine
        .lifecycle()
        .on_order_finalized(&mut order, vec![OrderId::new(99)])
        .await?;

    assert_eq!(report.unused_coupons, vec![CouponId::new(50)]);
    assert_eq!(order.generated_coupons(), Some(&GeneratedCoupons(json!([]))));

    Ok(())
}

#[tokio::test]
async fn qualifying_order_generates_next_order_coupon() -> TestResult {
    let mut service = MockCouponService::new();
    service
        .expect_validate_coupon_programs()
        .withf(|request| request.programs_to_generate == vec![ProgramId::new(5)])
        .once()
        .returning(|_| Ok(GeneratedCoupons(json!([{"code": "044a-1b2c"}]))));

    let engine = engine(service)?;
    let sync = engine.open_order(order(&engine, &[(NOTEBOOK, 3)])?).await;

    sync.update_rewards(None).await?;

    let mut order = sync.into_order();
    let report = engine
        .lifecycle()
        .on_order_finalized(&mut order, vec![OrderId::new(1)])
        .await?;

    assert_eq!(report.programs_to_generate, vec![ProgramId::new(5)]);
    assert!(report.unused_coupons.is_empty());
    assert!(report.generated.is_some());

    Ok(())
}

const LIMITED: &str = r#"
currency: USD
products:
  - id: 1
    name: Pen
    lst_price: "2.88"
  - id: 900
    name: Discount
    lst_price: "0.00"
programs:
  - id: 1
    name: Limited offer
    program_type: promotion_program
    maximum_use_number: 5
    reward_type: discount
    discount_type: percentage
    discount_percentage: "10%"
    discount_apply_on: on_order
    discount_line_product_id: 900
"#;

#[tokio::test]
async fn usage_cap_makes_program_ineligible() -> TestResult {
    let mut service = MockCouponService::new();
    service
        .expect_program_usage_count()
        .with(eq(ProgramId::new(1)))
        .once()
        .returning(|_| Ok(5));

    let engine = engine_with(ProgramCatalog::from_yaml_str(LIMITED)?, service);
    let sync = engine.open_order(order(&engine, &[(PEN, 1)])?).await;

    sync.update_rewards(None).await?;

    let order = sync.order().await;
    let entry = order.non_generating().first().ok_or("expected an entry")?;

    assert_eq!(entry.reason, Reason::UsageLimitReached);
    assert!(
        entry
            .reason
            .as_str()
            .ends_with("maximum number of usage has been reached.")
    );

    Ok(())
}

#[tokio::test]
async fn unreachable_usage_count_fails_closed() -> TestResult {
    let mut service = MockCouponService::new();
    service
        .expect_program_usage_count()
        .once()
        .returning(|_| Err(ServiceError::UnexpectedResponse("timeout".to_string())));

    let engine = engine_with(ProgramCatalog::from_yaml_str(LIMITED)?, service);
    let sync = engine.open_order(order(&engine, &[(PEN, 1)])?).await;

    sync.update_rewards(None).await?;

    let order = sync.order().await;

    assert_eq!(order.reward_lines().count(), 0);
    assert_eq!(
        order.non_generating().first().map(|entry| entry.reason.as_str()),
        Some("Unable to get the number of usage of the program.")
    );

    Ok(())
}
