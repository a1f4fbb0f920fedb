use alloy_primitives::I256;
use rai_sim::controller::{ControllerState, RateController};
use rai_sim::error::ControllerError;
use rai_sim::fixed::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn raw(s: &str) -> I256 {
    I256::from_dec_str(s).unwrap()
}

fn ray(s: &str) -> Ray {
    parse_ray(s).unwrap()
}

fn wad(s: &str) -> Wad {
    parse_wad(s).unwrap()
}

/// Controller at price 1.00, neutral rate, given gains and decay.
fn controller(kp: &str, ki: &str, alpha: &str, start: u64) -> RateController {
    RateController::new(ControllerState::new(
        RAY,
        RAY,
        start,
        wad(kp),
        wad(ki),
        ray(alpha),
    ))
    .unwrap()
}

// ─── Concrete scenario: zero gains, 5% below peg ────────────────────────

#[test]
fn test_zero_gain_deviation() {
    let mut ctrl = controller("0", "0", "1", 0);

    let snap = ctrl.process(ray("0.95"), 3600).unwrap();

    assert_eq!(snap.timestamp, 3600);
    assert_eq!(snap.kp_rate, I256::ZERO);
    assert_eq!(snap.ki_rate, I256::ZERO);
    assert_eq!(snap.redemption_rate, RAY);
    assert_eq!(snap.redemption_price, RAY);
    assert_eq!(snap.market_price, ray("0.95"));

    let state = ctrl.state();
    // error = 5% in ray units, carried as the next trapezoid edge
    assert_eq!(state.prop_term, ray("0.05"));
    // (0.05 + 0) / 2 * 3600 with alpha = 1 (no decay)
    assert_eq!(state.integral_term, ray("90"));
    assert_eq!(state.last_update_time, 3600);
}

// ─── Golden sequence against exact integer arithmetic ──────────────────

#[test]
fn test_golden_sequence() {
    let state = ControllerState::new(
        ray("3.14"),
        RAY,
        1000,
        wad("0.000000075"),
        wad("0.000000000000024"),
        ray("0.9999997112"),
    );
    let mut ctrl = RateController::new(state).unwrap();

    let expected = [
        (
            "3.00",
            4600u64,
            "1000000003345875159235668789",
            "3343949044585987261",
            "1926114649681528",
            "3140000000000000000000000000",
        ),
        (
            "3.05",
            8200,
            "1000000002155647966221802968",
            "2150559016431501999",
            "5088949790300969",
            "3140037822000522114503385220",
        ),
        (
            "3.20",
            11800,
            "999999998573890538680495802",
            "-1431607239202865442",
            "5497777883361244",
            "3140062189833168449845902229",
        ),
        (
            "3.14",
            15400,
            "1000000000005768446572038988",
            "1100353614971256",
            "4668092957067732",
            "3140046068813906608856967832",
        ),
    ];

    for (market, ts, rate, kp_rate, ki_rate, rp) in expected {
        let snap = ctrl.process(ray(market), ts).unwrap();
        assert_eq!(snap.redemption_rate, raw(rate), "rate at {}", ts);
        assert_eq!(snap.kp_rate, raw(kp_rate), "kp_rate at {}", ts);
        assert_eq!(snap.ki_rate, raw(ki_rate), "ki_rate at {}", ts);
        assert_eq!(snap.redemption_price, raw(rp), "redemption price at {}", ts);
    }

    assert_eq!(
        ctrl.state().integral_term,
        raw("194503873211155502134449995905")
    );
    assert_eq!(ctrl.state().prop_term, raw("14671381532950083640970"));
}

// ─── Failure semantics ──────────────────────────────────────────────────

#[test]
fn test_out_of_order_rejected() {
    let mut ctrl = controller("0.000000075", "0.000000000000024", "0.9999997112", 1000);
    let before = ctrl.state().clone();

    let err = ctrl.process(ray("1.01"), 999).unwrap_err();

    assert_eq!(
        err,
        ControllerError::OutOfOrderUpdate {
            last_update_time: 1000,
            timestamp: 999
        }
    );
    assert_eq!(ctrl.state(), &before);
}

#[test]
fn test_non_positive_price_rejected() {
    let mut ctrl = controller("0.000000075", "0.000000000000024", "0.9999997112", 0);
    let before = ctrl.state().clone();

    for price in [I256::ZERO, -RAY] {
        let err = ctrl.process(price, 60).unwrap_err();
        assert_eq!(err, ControllerError::InvalidPrice { price });
        assert_eq!(ctrl.state(), &before);
    }
}

#[test]
fn test_overflow_surfaces_and_preserves_state() {
    let state = ControllerState::new(RAY, RAY, 0, WAD, WAD, RAY)
        .with_terms(I256::ZERO, I256::MAX / int(2));
    let mut ctrl = RateController::new(state).unwrap();
    let before = ctrl.state().clone();

    let err = ctrl.process(RAY, 10).unwrap_err();

    assert!(matches!(err, ControllerError::ArithmeticOverflow { .. }));
    assert_eq!(ctrl.state(), &before);
}

#[test]
fn test_construction_validation() {
    let base = ControllerState::new(RAY, RAY, 0, I256::ZERO, I256::ZERO, RAY);

    let mut zero_price = base.clone();
    zero_price.redemption_price = I256::ZERO;
    assert!(matches!(
        RateController::new(zero_price),
        Err(ControllerError::InvalidPrice { .. })
    ));

    let inverted = base.clone().with_bounds(ray("1.1"), ray("0.9"));
    assert!(matches!(
        RateController::new(inverted),
        Err(ControllerError::InvalidParameter { name: "rate_upper_bound", .. })
    ));

    let mut fast = base.clone();
    fast.redemption_rate = ray("1.01");
    assert!(matches!(
        RateController::new(fast),
        Err(ControllerError::InvalidParameter { name: "redemption_rate", .. })
    ));

    let mut negative_alpha = base.clone();
    negative_alpha.alpha = -RAY;
    assert!(matches!(
        RateController::new(negative_alpha),
        Err(ControllerError::InvalidParameter { name: "alpha", .. })
    ));

    let zero_floor = base.with_bounds(I256::ZERO, RAY);
    assert!(matches!(
        RateController::new(zero_floor),
        Err(ControllerError::InvalidParameter { name: "rate_lower_bound", .. })
    ));
}

// ─── Zero elapsed time ──────────────────────────────────────────────────

#[test]
fn test_zero_elapsed_keeps_price_and_integral() {
    let mut ctrl = controller("0.00000005", "0.000000000001", "0.9999", 0);

    let first = ctrl.process(ray("0.95"), 3600).unwrap();
    assert_eq!(first.redemption_rate, raw("1000000002590000000000000000"));
    let integral = ctrl.state().integral_term;
    assert_eq!(integral, ray("90"));

    let second = ctrl.process(ray("0.97"), 3600).unwrap();

    assert_eq!(second.redemption_price, first.redemption_price);
    assert_eq!(ctrl.state().integral_term, integral);
    assert_eq!(ctrl.state().prop_term, ray("0.03"));
    assert_eq!(second.kp_rate, raw("1500000000000000000"));
    assert_eq!(second.ki_rate, first.ki_rate);
    assert_eq!(second.redemption_rate, raw("1000000001590000000000000000"));
}

// ─── Integral accumulation ──────────────────────────────────────────────

#[test]
fn test_integral_truncates_once() {
    // 3 * 0.5 + (1 + 0) * 1 / 2 = 2 exactly; truncating each half separately gives 1.
    let state = ControllerState::new(RAY, RAY, 0, I256::ZERO, I256::ZERO, ray("0.5"))
        .with_terms(I256::ZERO, raw("3"));
    let mut ctrl = RateController::new(state).unwrap();

    ctrl.process(RAY - raw("1"), 1).unwrap();

    assert_eq!(ctrl.state().prop_term, raw("1"));
    assert_eq!(ctrl.state().integral_term, raw("2"));
}

// ─── Neutral equilibrium and decay ──────────────────────────────────────

#[test]
fn test_at_peg_stays_neutral() {
    let mut ctrl = controller("0.000000075", "0.000000000000024", "0.9999997112", 0);

    for i in 1..=50u64 {
        let snap = ctrl.process(RAY, i * 3600).unwrap();
        assert_eq!(snap.kp_rate, I256::ZERO);
        assert_eq!(snap.ki_rate, I256::ZERO);
        assert_eq!(snap.redemption_rate, RAY);
        assert_eq!(snap.redemption_price, RAY);
    }
}

#[test]
fn test_rate_converges_to_neutral_with_leaky_integral() {
    let state = ControllerState::new(
        RAY,
        RAY,
        0,
        wad("0.000000075"),
        wad("0.000000000001"),
        ray("0.9999"),
    )
    .with_terms(I256::ZERO, ray("10000"));
    let mut ctrl = RateController::new(state).unwrap();

    let mut prev_gap = None;
    for i in 1..=100u64 {
        let ts = i * 3600;
        // Market tracks the compounded target, so the error stays zero.
        let market = ctrl.redemption_price_at(ts).unwrap();
        let snap = ctrl.process(market, ts).unwrap();
        assert_eq!(snap.kp_rate, I256::ZERO);

        let gap = (snap.redemption_rate - RAY).unsigned_abs();
        if let Some(prev) = prev_gap {
            assert!(gap <= prev, "rate gap grew at tick {}", i);
        }
        prev_gap = Some(gap);
    }

    let final_gap = prev_gap.unwrap();
    assert!(
        final_gap < alloy_primitives::U256::from(1_000_000u64),
        "rate still {} ulps from neutral",
        final_gap
    );
}

#[test]
fn test_integral_decays_monotonically() {
    for initial in [ray("1000"), ray("-1000")] {
        let state = ControllerState::new(RAY, RAY, 0, I256::ZERO, I256::ZERO, ray("0.999"))
            .with_terms(I256::ZERO, initial);
        let mut ctrl = RateController::new(state).unwrap();

        let mut prev = initial.unsigned_abs();
        for i in 1..=200u64 {
            ctrl.process(RAY, i * 100).unwrap();
            let current = ctrl.state().integral_term;
            assert_eq!(current.is_negative(), initial.is_negative() && !current.is_zero());
            let magnitude = current.unsigned_abs();
            assert!(
                magnitude < prev || prev.is_zero(),
                "integral magnitude did not shrink at tick {}",
                i
            );
            prev = magnitude;
        }
        assert!(prev < initial.unsigned_abs() / alloy_primitives::U256::from(1_000_000u64));
    }
}

// ─── Clamping ───────────────────────────────────────────────────────────

#[test]
fn test_clamped_to_bounds() {
    let mut ctrl = controller("1", "0.001", "0.9999997112", 0);

    let low = ctrl.process(ray("2"), 60).unwrap();
    assert_eq!(low.redemption_rate, DEFAULT_RATE_LOWER_BOUND);

    let high = ctrl.process(ray("0.1"), 120).unwrap();
    assert_eq!(high.redemption_rate, DEFAULT_RATE_UPPER_BOUND);
}

#[test]
fn test_random_inputs_respect_bounds() {
    let mut rng = StdRng::seed_from_u64(42);
    let milli = ray("0.001");

    for _ in 0..20 {
        let lower = ray("0.99999");
        let upper = ray("1.00001");
        let state = ControllerState::new(
            int(rng.gen_range(100..10_000)) * milli,
            RAY,
            0,
            int(rng.gen_range(0..1_000_000_000_000)),
            int(rng.gen_range(0..1_000_000_000)),
            RAY - int(rng.gen_range(0..1_000_000_000_000_000_000)),
        )
        .with_bounds(lower, upper);
        let mut ctrl = RateController::new(state).unwrap();

        let mut ts = 0u64;
        for _ in 0..50 {
            ts += rng.gen_range(0..20_000);
            let market = int(rng.gen_range(1..20_000)) * milli;
            let snap = ctrl.process(market, ts).unwrap();
            assert!(snap.redemption_rate >= lower && snap.redemption_rate <= upper);
            assert!(snap.redemption_price.is_positive());
        }
    }
}

// ─── Projection and deviation ───────────────────────────────────────────

#[test]
fn test_redemption_price_projection() {
    let state = ControllerState::new(RAY, ray("1.000000001"), 0, I256::ZERO, I256::ZERO, RAY);
    let ctrl = RateController::new(state).unwrap();
    let before = ctrl.state().clone();

    assert_eq!(
        ctrl.redemption_price_at(3600).unwrap(),
        raw("1000003600006478207769528177")
    );
    assert_eq!(ctrl.redemption_price_at(0).unwrap(), RAY);
    assert_eq!(ctrl.state(), &before);

    let state = ControllerState::new(RAY, RAY, 100, I256::ZERO, I256::ZERO, RAY);
    let ctrl = RateController::new(state).unwrap();
    assert!(matches!(
        ctrl.redemption_price_at(50),
        Err(ControllerError::OutOfOrderUpdate { .. })
    ));
}

#[test]
fn test_projection_matches_process() {
    let state = ControllerState::new(ray("3.14"), ray("1.00000002"), 0, I256::ZERO, I256::ZERO, RAY);
    let mut ctrl = RateController::new(state).unwrap();

    let projected = ctrl.redemption_price_at(86_400).unwrap();
    let snap = ctrl.process(ray("3.14"), 86_400).unwrap();
    assert_eq!(snap.redemption_price, projected);
}

#[test]
fn test_deviation_sign() {
    let ctrl = controller("0", "0", "1", 0);
    assert_eq!(ctrl.deviation(ray("0.95")).unwrap(), ray("0.05"));
    assert_eq!(ctrl.deviation(ray("1.10")).unwrap(), ray("-0.1"));
    assert_eq!(ctrl.deviation(RAY).unwrap(), I256::ZERO);
}
