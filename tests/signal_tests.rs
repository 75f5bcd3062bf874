use proptest::prelude::*;
use signal_robot::indicator::ReadySnapshot;
use signal_robot::model::candle::Candle;
use signal_robot::model::order::OrderDirection;
use signal_robot::model::signal::Signal;
use signal_robot::strategy::sma_rsi::{evaluate_signal, SignalThresholds, SmaRsiStrategy};

fn snap(sma_short: f64, sma_long: f64, rsi: f64) -> ReadySnapshot {
    ReadySnapshot {
        timestamp: 1_700_000_000,
        close: 1.1,
        sma_short,
        sma_long,
        rsi,
    }
}

fn candles_from(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle::from_close(1_700_000_000 + i as i64 * 60, c))
        .collect()
}

/// Rally to 145 then a 14-candle pullback: long trend still up, RSI oversold.
fn pullback_in_uptrend() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..46).map(|i| 100.0 + i as f64).collect();
    closes.extend((1..=14).map(|k| 145.0 - 1.5 * k as f64));
    closes
}

/// Mirror image of [`pullback_in_uptrend`].
fn bounce_in_downtrend() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..46).map(|i| 200.0 - i as f64).collect();
    closes.extend((1..=14).map(|k| 155.0 + 1.5 * k as f64));
    closes
}

#[test]
fn rsi_on_oversold_boundary_is_not_a_buy() {
    let t = SignalThresholds::default();
    assert_eq!(evaluate_signal(&snap(1.2, 1.1, 30.0), &t), Signal::Hold);
    assert_eq!(evaluate_signal(&snap(1.2, 1.1, 29.999), &t), Signal::Buy);
}

#[test]
fn rsi_on_overbought_boundary_is_not_a_sell() {
    let t = SignalThresholds::default();
    assert_eq!(evaluate_signal(&snap(1.0, 1.1, 70.0), &t), Signal::Hold);
    assert_eq!(evaluate_signal(&snap(1.0, 1.1, 70.001), &t), Signal::Sell);
}

#[test]
fn equal_smas_never_trade() {
    let t = SignalThresholds::default();
    assert_eq!(evaluate_signal(&snap(1.1, 1.1, 5.0), &t), Signal::Hold);
    assert_eq!(evaluate_signal(&snap(1.1, 1.1, 95.0), &t), Signal::Hold);
}

#[test]
fn signal_maps_to_order_direction() {
    assert_eq!(Signal::Buy.direction(), Some(OrderDirection::Call));
    assert_eq!(Signal::Sell.direction(), Some(OrderDirection::Put));
    assert_eq!(Signal::Hold.direction(), None);
    assert_eq!(Signal::Hold.to_string(), "NONE");
}

#[test]
fn pullback_in_uptrend_buys() {
    let report = SmaRsiStrategy::default()
        .analyze(&candles_from(&pullback_in_uptrend()))
        .unwrap();
    assert!(report.sma_short > report.sma_long);
    assert!(report.rsi < 30.0);
    assert_eq!(report.signal, Signal::Buy);
    assert!((report.last_close - 124.0).abs() < 1e-9);
}

#[test]
fn bounce_in_downtrend_sells() {
    let report = SmaRsiStrategy::default()
        .analyze(&candles_from(&bounce_in_downtrend()))
        .unwrap();
    assert!(report.sma_short < report.sma_long);
    assert!(report.rsi > 70.0);
    assert_eq!(report.signal, Signal::Sell);
}

#[test]
fn steady_uptrend_is_overbought_not_oversold() {
    let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
    let report = SmaRsiStrategy::default()
        .analyze(&candles_from(&closes))
        .unwrap();
    assert_eq!(report.signal, Signal::Hold);
}

#[test]
fn custom_thresholds_are_honoured() {
    let mut strategy = SmaRsiStrategy::default();
    strategy.thresholds = SignalThresholds {
        oversold: 20.0,
        overbought: 80.0,
    };
    // RSI of the pullback fixture sits near 26: oversold at 30, not at 20.
    let report = strategy
        .analyze(&candles_from(&pullback_in_uptrend()))
        .unwrap();
    assert_eq!(report.signal, Signal::Hold);
}

proptest! {
    #[test]
    fn evaluation_is_pure(
        short in 0.5f64..2.0,
        long in 0.5f64..2.0,
        rsi in 0.0f64..=100.0,
    ) {
        let t = SignalThresholds::default();
        let s = snap(short, long, rsi);
        prop_assert_eq!(evaluate_signal(&s, &t), evaluate_signal(&s, &t));
    }

    #[test]
    fn buy_and_sell_require_their_trend(
        short in 0.5f64..2.0,
        long in 0.5f64..2.0,
        rsi in 0.0f64..=100.0,
    ) {
        let t = SignalThresholds::default();
        match evaluate_signal(&snap(short, long, rsi), &t) {
            Signal::Buy => prop_assert!(short > long && rsi < t.oversold),
            Signal::Sell => prop_assert!(short < long && rsi > t.overbought),
            Signal::Hold => prop_assert!(
                !(short > long && rsi < t.oversold) && !(short < long && rsi > t.overbought)
            ),
        }
    }
}
