//! Constraint satisfaction over sampled configurations and paths.

mod common;

use std::time::Duration;

use streamplan_core::{Fact, Term, Value};
use streamplan_planner::AStarPlanner;
use streamplan_search::{constraint_satisfaction, GoalTerm, SolveConfig};
use streamplan_state::SolveStatus;
use streamplan_stream::{from_fn, from_function, from_list_fn, from_test, Stream, StreamInfo};

use common::init_tracing;

fn streams() -> Vec<Stream> {
    let conf = Stream::builder("sample-conf")
        .inputs(["?r"])
        .domain(Fact::new("region", ["?r"]))
        .outputs(["?q"])
        .certified(Fact::new("conf", ["?r", "?q"]))
        .certified(Fact::new("config", ["?q"]))
        .procedure(from_list_fn(|inputs: &[Value]| {
            vec![vec![Value::from(format!("{}-q", inputs[0]))]]
        }))
        .build()
        .unwrap();
    let path = Stream::builder("plan-path")
        .inputs(["?a", "?b"])
        .domain(Fact::new("config", ["?a"]))
        .domain(Fact::new("config", ["?b"]))
        .outputs(["?t"])
        .certified(Fact::new("path", ["?a", "?b", "?t"]))
        .procedure(from_fn(|inputs: &[Value]| Some(vec![Value::List(inputs.to_vec())])))
        .build()
        .unwrap();
    let distinct = Stream::builder("test-distinct")
        .inputs(["?a", "?b"])
        .domain(Fact::new("config", ["?a"]))
        .domain(Fact::new("config", ["?b"]))
        .certified(Fact::new("distinct", ["?a", "?b"]))
        .procedure(from_test(|inputs: &[Value]| inputs[0] != inputs[1]))
        .build()
        .unwrap();
    let length = Stream::builder("length")
        .inputs(["?t"])
        .domain(Fact::new("trajectory", ["?t"]))
        .procedure(from_function(|_: &[Value]| 4.0))
        .info(StreamInfo::default().with_opt_value(2.0))
        .build()
        .unwrap();
    vec![conf, path, distinct, length]
}

fn init() -> Vec<Fact> {
    vec![Fact::new("region", ["kitchen"]), Fact::new("region", ["garage"])]
}

#[tokio::test]
async fn test_binds_chained_parameters() {
    init_tracing();
    let terms = vec![
        GoalTerm::Fact(Fact::new("conf", ["kitchen", "?a"])),
        GoalTerm::Fact(Fact::new("conf", ["garage", "?b"])),
        GoalTerm::Fact(Fact::new("distinct", ["?a", "?b"])),
        GoalTerm::Fact(Fact::new("path", ["?a", "?b", "?t"])),
    ];
    let planner = AStarPlanner::new();
    let solution = constraint_satisfaction(terms, init(), streams(), &planner, &SolveConfig::default())
        .await
        .unwrap();

    assert!(solution.is_solved());
    assert_eq!(solution.cost, 0.0);
    let a = Value::from("kitchen-q");
    let b = Value::from("garage-q");
    assert_eq!(solution.binding("?a"), Some(&a));
    assert_eq!(solution.binding("?b"), Some(&b));
    assert_eq!(solution.binding("?t"), Some(&Value::List(vec![a.clone(), b.clone()])));
    assert!(solution.facts.contains(&Fact::new(
        "distinct",
        [Term::Value(a), Term::Value(b)]
    )));
}

#[tokio::test]
async fn test_failing_constraint_is_infeasible() {
    init_tracing();
    // Both configurations come from the same region, so they are equal.
    let terms = vec![
        GoalTerm::Fact(Fact::new("conf", ["kitchen", "?a"])),
        GoalTerm::Fact(Fact::new("conf", ["kitchen", "?b"])),
        GoalTerm::Fact(Fact::new("distinct", ["?a", "?b"])),
    ];
    let planner = AStarPlanner::new();
    let config = SolveConfig::default().with_max_time(Duration::from_secs(10));
    let solution = constraint_satisfaction(terms, init(), streams(), &planner, &config)
        .await
        .unwrap();

    assert_eq!(solution.status, SolveStatus::Infeasible);
    assert!(solution.bindings.is_none());
}

#[tokio::test]
async fn test_already_satisfied_terms() {
    init_tracing();
    let terms = vec![GoalTerm::Fact(Fact::new("region", ["kitchen"]))];
    let planner = AStarPlanner::new();
    let solution = constraint_satisfaction(terms, init(), streams(), &planner, &SolveConfig::default())
        .await
        .unwrap();
    assert!(solution.is_solved());
    assert_eq!(solution.bindings.map(|b| b.len()), Some(0));
}

#[tokio::test]
async fn test_realized_function_cost() {
    init_tracing();
    let terms = vec![
        GoalTerm::Fact(Fact::new("trajectory-of", ["?t"])),
        GoalTerm::Minimize(Fact::new("length", ["?t"])),
    ];
    let trajectory = Stream::builder("sample-trajectory")
        .outputs(["?t"])
        .certified(Fact::new("trajectory-of", ["?t"]))
        .certified(Fact::new("trajectory", ["?t"]))
        .procedure(from_list_fn(|_: &[Value]| vec![vec![Value::from("t0")]]))
        .build()
        .unwrap();
    let mut streams = streams();
    streams.push(trajectory);

    let planner = AStarPlanner::new();
    let solution = constraint_satisfaction(terms, Vec::new(), streams, &planner, &SolveConfig::default())
        .await
        .unwrap();
    assert!(solution.is_solved());
    assert_eq!(solution.binding("?t"), Some(&Value::from("t0")));
    assert_eq!(solution.cost, 4.0);
}
