//! Structural validation through the JSON graph format.

use wick_core::domain::{EdgeId, NodeId};
use wick_core::graph::{validate, Graph, GraphError, MAX_OFFSET};
use wick_core::{compile, CompilerConfig};

fn check(json: &str) -> Result<(), GraphError> {
    let graph = Graph::from_json(json).expect("test graph parses");
    validate(&graph).map(|_| ())
}

#[test]
fn zero_actions_is_rejected() {
    let err = check(
        r#"{"nodes": [{"id": "c", "kind": "price", "field": "close"}], "edges": []}"#,
    )
    .unwrap_err();
    assert_eq!(err, GraphError::NoActionNodes);
}

#[test]
fn missing_actions_is_reported_before_dangling_edges() {
    let err = check(
        r#"{
            "nodes": [{"id": "c", "kind": "price", "field": "close"}],
            "edges": [{"id": "e1", "source": "c", "target": "ghost"}]
        }"#,
    )
    .unwrap_err();
    assert_eq!(err, GraphError::NoActionNodes);
}

#[test]
fn dangling_edge_names_the_edge() {
    let err = check(
        r#"{
            "nodes": [{"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"}],
            "edges": [{"id": "e1", "source": "ghost", "target": "buy"}]
        }"#,
    )
    .unwrap_err();
    assert_eq!(err, GraphError::DanglingEdge(EdgeId::new("e1")));
}

#[test]
fn second_compare_input_is_rejected() {
    let err = check(
        r#"{
            "nodes": [
                {"id": "c", "kind": "price", "field": "close"},
                {"id": "sma", "kind": "indicator", "indicator": "sma"},
                {"id": "ema", "kind": "indicator", "indicator": "ema"},
                {"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"}
            ],
            "edges": [
                {"id": "e1", "source": "c", "target": "buy"},
                {"id": "e2", "source": "sma", "target": "c", "role": "compare_input"},
                {"id": "e3", "source": "ema", "target": "c", "role": "compare_input"}
            ]
        }"#,
    )
    .unwrap_err();
    assert_eq!(err, GraphError::DuplicateCompareInput(NodeId::new("c")));
}

#[test]
fn cycle_between_chained_conditions_is_rejected() {
    // A -> B -> A, both feeding an AND that feeds a Buy.
    let err = check(
        r#"{
            "nodes": [
                {"id": "a", "kind": "price", "field": "close", "condition": {"compare_value": 1}},
                {"id": "b", "kind": "price", "field": "open", "condition": {"compare_value": 1}},
                {"id": "and", "kind": "logic", "op": "and"},
                {"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"}
            ],
            "edges": [
                {"id": "e1", "source": "a", "target": "b"},
                {"id": "e2", "source": "b", "target": "a"},
                {"id": "e3", "source": "a", "target": "and"},
                {"id": "e4", "source": "b", "target": "and"},
                {"id": "e5", "source": "and", "target": "buy"}
            ]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected(_)), "{err}");
}

#[test]
fn not_gate_needs_exactly_one_input() {
    let graph = |edges: &str| {
        format!(
            r#"{{
                "nodes": [
                    {{"id": "a", "kind": "price", "field": "close"}},
                    {{"id": "b", "kind": "price", "field": "open"}},
                    {{"id": "not", "kind": "logic", "op": "not"}},
                    {{"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"}}
                ],
                "edges": [{edges}]
            }}"#
        )
    };

    let none = check(&graph(r#"{"id": "e1", "source": "not", "target": "buy"}"#)).unwrap_err();
    assert_eq!(
        none,
        GraphError::NotArity {
            node: NodeId::new("not"),
            inputs: 0
        }
    );

    let two = check(&graph(
        r#"{"id": "e1", "source": "a", "target": "not"},
           {"id": "e2", "source": "b", "target": "not"},
           {"id": "e3", "source": "not", "target": "buy"}"#,
    ))
    .unwrap_err();
    assert_eq!(
        two,
        GraphError::NotArity {
            node: NodeId::new("not"),
            inputs: 2
        }
    );

    assert!(check(&graph(
        r#"{"id": "e1", "source": "a", "target": "not"},
           {"id": "e2", "source": "not", "target": "buy"}"#,
    ))
    .is_ok());
}

#[test]
fn exit_nodes_take_no_edges() {
    let err = check(
        r#"{
            "nodes": [
                {"id": "c", "kind": "price", "field": "close"},
                {"id": "sl", "kind": "exit", "exit": "stop_loss", "basis": "percent", "magnitude": 5},
                {"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"}
            ],
            "edges": [{"id": "e1", "source": "c", "target": "sl"}]
        }"#,
    )
    .unwrap_err();
    assert!(
        matches!(&err, GraphError::InvalidEdge { edge, .. } if edge.0 == "e1"),
        "{err}"
    );
}

#[test]
fn fractional_period_is_invalid() {
    let err = check(
        r#"{
            "nodes": [
                {"id": "rsi", "kind": "indicator", "indicator": "rsi", "params": {"period": 14.5}},
                {"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"}
            ],
            "edges": [{"id": "e1", "source": "rsi", "target": "buy"}]
        }"#,
    )
    .unwrap_err();
    assert!(
        matches!(&err, GraphError::InvalidParameter { param, .. } if param == "period"),
        "{err}"
    );
}

#[test]
fn percent_sizing_above_100_is_invalid() {
    let err = check(
        r#"{
            "nodes": [{"id": "buy", "kind": "action", "side": "buy",
                       "sizing": "percent_of_equity", "amount": 150}],
            "edges": []
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, GraphError::InvalidSizing { .. }), "{err}");
}

#[test]
fn unknown_indicator_fails_to_parse() {
    let json = r#"{
        "nodes": [{"id": "x", "kind": "indicator", "indicator": "vwap"}],
        "edges": []
    }"#;
    assert!(Graph::from_json(json).is_err());
}

fn close_condition(condition: &str) -> String {
    format!(
        r#"{{
            "nodes": [
                {{"id": "c", "kind": "price", "field": "close", "condition": {condition}}},
                {{"id": "buy", "kind": "action", "side": "buy", "sizing": "all_available"}}
            ],
            "edges": [{{"id": "e1", "source": "c", "target": "buy"}}]
        }}"#
    )
}

#[test]
fn offset_beyond_limit_is_invalid() {
    let err = check(&close_condition(
        r#"{"comparison": "crosses_above", "compare_value": 1, "offset": 18446744073709551615}"#,
    ))
    .unwrap_err();
    assert!(
        matches!(&err, GraphError::InvalidParameter { node, param, .. }
            if node == &NodeId::new("c") && param == "offset"),
        "{err}"
    );
}

#[test]
fn lookback_beyond_limit_is_invalid() {
    let err = check(&close_condition(
        r#"{"comparison": ">", "compare_value": 1, "lookback": 1000000000}"#,
    ))
    .unwrap_err();
    assert!(
        matches!(&err, GraphError::InvalidParameter { param, .. } if param == "lookback"),
        "{err}"
    );
}

#[test]
fn offset_and_lookback_at_limit_compile_and_render() {
    let json = close_condition(&format!(
        r#"{{"comparison": "crosses_above", "compare_value": 1, "offset": {MAX_OFFSET}, "lookback": 2}}"#
    ));
    let graph = Graph::from_json(&json).expect("test graph parses");
    let compiled = compile(&graph, &CompilerConfig::default()).unwrap();
    let strategy = &compiled.strategy;
    // Deepest read: offset + (lookback - 1) shift + 1 crossover bar.
    assert_eq!(strategy.history_required(), MAX_OFFSET + 3);
    let rendered = strategy.actions()[0].predicate.to_string();
    assert!(rendered.contains("Close[-10003]"), "{rendered}");
}
