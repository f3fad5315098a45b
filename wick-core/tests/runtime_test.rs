//! Reference runtime: predicate evaluation, risk exits and session replay.

use wick_core::compiler::Predicate;
use wick_core::config::CompilerConfig;
use wick_core::data::read_csv;
use wick_core::domain::NodeId;
use wick_core::runtime::{replay, Decision, SeriesError, SeriesSet, Session};
use wick_core::{compile, CompiledStrategy, Graph};

// ── Helpers ──────────────────────────────────────────────────────────

fn strategy(json: &str) -> CompiledStrategy {
    let graph = Graph::from_json(json).expect("test graph parses");
    compile(&graph, &CompilerConfig::default())
        .expect("graph compiles")
        .strategy
}

fn closes(values: &[f64]) -> SeriesSet {
    let mut series = SeriesSet::new();
    series.insert("close", values.to_vec());
    series
}

fn close_condition(comparison: &str, value: f64, lookback: usize) -> CompiledStrategy {
    strategy(&format!(
        r#"{{
            "nodes": [
                {{"id": "c", "kind": "price", "field": "close",
                  "condition": {{"comparison": "{comparison}", "compare_value": {value},
                                 "lookback": {lookback}}}}},
                {{"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"}}
            ],
            "edges": [{{"id": "e1", "source": "c", "target": "buy"}}]
        }}"#
    ))
}

fn entry_predicate(strategy: &CompiledStrategy) -> &Predicate {
    &strategy.actions()[0].predicate
}

fn enter(id: &str) -> Decision {
    Decision::Enter {
        rule: NodeId::new(id),
    }
}

// ── Predicate semantics ──────────────────────────────────────────────

#[test]
fn crosses_above_on_literal_series() {
    let strategy = close_condition("crosses_above", 30.0, 0);
    let series = closes(&[35.0, 28.0, 32.0]);
    let predicate = entry_predicate(&strategy);

    // bar 0 has no previous bar; bar 1 is at or below; bar 2 crosses.
    let fired: Vec<bool> = (0..3).map(|t| predicate.evaluate(&series, t)).collect();
    assert_eq!(fired, vec![false, false, true]);

    let decisions = replay(&strategy, &series).unwrap();
    assert_eq!(decisions, vec![Decision::Hold, Decision::Hold, enter("buy")]);
}

#[test]
fn crosses_below_needs_previous_at_or_above() {
    let strategy = close_condition("crosses_below", 30.0, 0);
    let series = closes(&[30.0, 29.0, 28.0, 31.0, 20.0]);
    let predicate = entry_predicate(&strategy);
    let fired: Vec<bool> = (0..5).map(|t| predicate.evaluate(&series, t)).collect();
    assert_eq!(fired, vec![false, true, false, false, true]);
}

#[test]
fn lookback_three_holds_for_three_bars() {
    let wrapped = close_condition("<", 30.0, 3);
    let base = close_condition("<", 30.0, 0);
    let series = closes(&[20.0, 40.0, 40.0, 40.0, 25.0, 40.0]);

    let fired: Vec<bool> = (0..6)
        .map(|t| entry_predicate(&wrapped).evaluate(&series, t))
        .collect();
    assert_eq!(fired, vec![true, true, true, false, true, true]);

    for t in 0..6 {
        let expected = (0..3)
            .filter(|s| *s <= t)
            .any(|s| entry_predicate(&base).evaluate(&series, t - s));
        assert_eq!(entry_predicate(&wrapped).evaluate(&series, t), expected, "bar {t}");
    }
}

#[test]
fn missing_indicator_values_are_false() {
    let strategy = strategy(
        r#"{
            "nodes": [
                {"id": "rsi", "kind": "indicator", "indicator": "rsi", "params": {"period": 2},
                 "condition": {"comparison": "<", "compare_value": 30}},
                {"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"}
            ],
            "edges": [{"id": "e1", "source": "rsi", "target": "buy"}]
        }"#,
    );
    let mut series = closes(&[10.0, 9.0, 8.0]);
    series.insert("rsi_2", vec![f64::NAN, f64::NAN, 12.0]);
    let decisions = replay(&strategy, &series).unwrap();
    assert_eq!(decisions, vec![Decision::Hold, Decision::Hold, enter("buy")]);
}

// ── Sessions ─────────────────────────────────────────────────────────

const BREAKOUT: &str = r#"{
    "nodes": [
        {"id": "up", "kind": "price", "field": "close", "condition": {"compare_value": 100}},
        {"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"},
        {"id": "down", "kind": "price", "field": "close",
         "condition": {"comparison": "<", "compare_value": 90}},
        {"id": "sell", "kind": "action", "side": "sell", "sizing": "all_available"},
        {"id": "sl", "kind": "exit", "exit": "stop_loss", "basis": "percent", "magnitude": 5}
    ],
    "edges": [
        {"id": "e1", "source": "up", "target": "buy"},
        {"id": "e2", "source": "down", "target": "sell"}
    ]
}"#;

#[test]
fn session_enters_exits_and_reenters() {
    let strategy = strategy(BREAKOUT);
    let series = closes(&[95.0, 101.0, 99.0, 95.0, 102.0, 89.0]);
    let decisions = replay(&strategy, &series).unwrap();
    let risk = Decision::RiskExit {
        rule: NodeId::new("sl"),
    };
    assert_eq!(
        decisions,
        vec![
            Decision::Hold,
            enter("buy"),
            Decision::Hold,
            // 95 <= 101 * 0.95
            risk.clone(),
            enter("buy"),
            // Risk exits win over the sell rule that also fires here.
            risk,
        ]
    );
}

#[test]
fn zero_sized_entry_falls_through_to_next_rule() {
    let strategy = strategy(
        r#"{
            "nodes": [
                {"id": "dip", "kind": "price", "field": "close",
                 "condition": {"comparison": "<", "compare_value": 100}},
                {"id": "none", "kind": "action", "side": "buy",
                 "sizing": "percent_of_equity", "amount": 0},
                {"id": "cash", "kind": "action", "side": "buy",
                 "sizing": "fixed_cash", "amount": 1000}
            ],
            "edges": [
                {"id": "e1", "source": "dip", "target": "none"},
                {"id": "e2", "source": "dip", "target": "cash"}
            ]
        }"#,
    );
    let decisions = replay(&strategy, &closes(&[120.0, 99.0])).unwrap();
    assert_eq!(decisions, vec![Decision::Hold, enter("cash")]);
}

#[test]
fn sell_rule_closes_when_no_risk_exit_fires() {
    let strategy = strategy(&BREAKOUT.replace(r#""magnitude": 5"#, r#""magnitude": 50"#));
    let series = closes(&[101.0, 89.0, 101.0]);
    let decisions = replay(&strategy, &series).unwrap();
    assert_eq!(
        decisions,
        vec![
            enter("buy"),
            Decision::Exit {
                rule: NodeId::new("sell")
            },
            enter("buy"),
        ]
    );
}

#[test]
fn session_tracks_entry_price() {
    let strategy = strategy(BREAKOUT);
    let series = closes(&[101.0, 103.0]);
    let mut session = Session::new(&strategy);
    assert!(!session.is_holding());
    assert_eq!(session.on_bar(&series, 0), enter("buy"));
    assert!(session.is_holding());
    assert_eq!(session.entry_price(), Some(101.0));
    assert_eq!(session.on_bar(&series, 1), Decision::Hold);
    assert_eq!(session.entry_price(), Some(101.0));
}

#[test]
fn atr_trailing_stop_uses_supplied_series() {
    let strategy = strategy(
        r#"{
            "nodes": [
                {"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"},
                {"id": "ts", "kind": "exit", "exit": "trailing_stop", "basis": "atr_multiple",
                 "magnitude": 2, "atr_period": 5}
            ]
        }"#,
    );
    let mut series = closes(&[100.0, 110.0, 106.0, 105.0]);
    series.insert("atr_5", vec![f64::NAN, 2.0, 2.0, 2.0]);

    let mut session = Session::new(&strategy);
    assert_eq!(session.on_bar(&series, 0), enter("buy"));
    let id = NodeId::new("ts");
    assert_eq!(session.on_bar(&series, 1), Decision::Hold);
    assert_eq!(session.exit_state().trailing_level(&id), Some(106.0));
    assert_eq!(
        session.on_bar(&series, 2),
        Decision::RiskExit { rule: id.clone() }
    );
    // Fresh entry on the next bar; the ratchet starts over.
    assert_eq!(session.on_bar(&series, 3), enter("buy"));
    assert_eq!(session.exit_state().trailing_level(&id), None);
}

#[test]
fn replay_reports_missing_series() {
    let strategy = strategy(
        r#"{
            "nodes": [
                {"id": "ema", "kind": "indicator", "indicator": "ema", "params": {"period": 9},
                 "condition": {"compare_value": 1}},
                {"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"},
                {"id": "sl", "kind": "exit", "exit": "stop_loss", "basis": "atr_multiple",
                 "magnitude": 1, "atr_period": 14}
            ],
            "edges": [{"id": "e1", "source": "ema", "target": "buy"}]
        }"#,
    );
    let err = replay(&strategy, &closes(&[1.0])).unwrap_err();
    assert_eq!(
        err,
        SeriesError::Missing(vec!["ema_9".to_string(), "atr_14".to_string()])
    );
}

#[test]
fn replay_from_csv_with_indicator_columns() {
    let csv = "date,open,high,low,close,volume,sma_3\n\
               2024-01-02,10,10,10,10,100,\n\
               2024-01-03,11,11,11,11,100,\n\
               2024-01-04,12,12,12,12,100,11\n\
               2024-01-05,10,10,10,10,100,11\n";
    let history = read_csv(csv.as_bytes()).unwrap();
    let strategy = strategy(
        r#"{
            "nodes": [
                {"id": "c", "kind": "price", "field": "close",
                 "condition": {"comparison": "crosses_above"}},
                {"id": "sma", "kind": "indicator", "indicator": "sma", "params": {"period": 3}},
                {"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"},
                {"id": "c2", "kind": "price", "field": "close",
                 "condition": {"comparison": "crosses_below"}},
                {"id": "sell", "kind": "action", "side": "sell", "sizing": "all_available"}
            ],
            "edges": [
                {"id": "e1", "source": "c", "target": "buy"},
                {"id": "e2", "source": "sma", "target": "c", "role": "compare_input"},
                {"id": "e3", "source": "c2", "target": "sell"},
                {"id": "e4", "source": "sma", "target": "c2", "role": "compare_input"}
            ]
        }"#,
    );
    let decisions = replay(&strategy, &history.series).unwrap();
    // The SMA starts on the third bar with close already above it; the drop
    // below it on the fourth bar is a sell signal while flat.
    assert_eq!(decisions.iter().filter(|d| !d.is_hold()).count(), 0);
    assert_eq!(history.bars.len(), 4);
}
