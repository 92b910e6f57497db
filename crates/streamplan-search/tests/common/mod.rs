#![allow(dead_code)]

use streamplan_core::{Fact, Value};
use streamplan_planner::{ActionSchema, Domain, Literal};
use streamplan_search::Problem;
use streamplan_stream::{from_list_fn, from_test, Stream};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn blocksworld() -> Problem {
    let pick = ActionSchema::new("pick", ["?b"])
        .precondition(Fact::new("clear", ["?b"]))
        .precondition(Fact::new("on-table", ["?b"]))
        .precondition(Fact::atom("arm-empty"))
        .adds(Fact::new("holding", ["?b"]))
        .deletes(Fact::new("clear", ["?b"]))
        .deletes(Fact::new("on-table", ["?b"]))
        .deletes(Fact::atom("arm-empty"))
        .with_cost(5.0);
    let stack = ActionSchema::new("stack", ["?b", "?c"])
        .precondition(Fact::new("holding", ["?b"]))
        .precondition(Fact::new("clear", ["?c"]))
        .adds(Fact::new("on", ["?b", "?c"]))
        .adds(Fact::new("clear", ["?b"]))
        .adds(Fact::atom("arm-empty"))
        .deletes(Fact::new("holding", ["?b"]))
        .deletes(Fact::new("clear", ["?c"]))
        .with_cost(5.0);
    Problem::new(
        Domain::new(vec![pick, stack]),
        vec![
            Fact::new("clear", ["A"]),
            Fact::new("clear", ["B"]),
            Fact::new("on-table", ["A"]),
            Fact::new("on-table", ["B"]),
            Fact::atom("arm-empty"),
        ],
        vec![Literal::pos(Fact::new("on", ["A", "B"]))],
        Vec::new(),
    )
}

/// Blocks need a sampled grasp that passes a reachability test to be
/// placed. Placing a light block is cheap, dragging any block is not.
pub fn grasping(unreachable: &'static [&'static str]) -> Problem {
    let grasp = Stream::builder("sample-grasp")
        .inputs(["?b"])
        .domain(Fact::new("block", ["?b"]))
        .outputs(["?g"])
        .certified(Fact::new("grasp", ["?b", "?g"]))
        .procedure(from_list_fn(|inputs: &[Value]| {
            vec![vec![Value::from(format!("grasp-{}", inputs[0]))]]
        }))
        .build()
        .unwrap();
    let reachable = Stream::builder("test-reachable")
        .inputs(["?b", "?g"])
        .domain(Fact::new("grasp", ["?b", "?g"]))
        .certified(Fact::new("reachable", ["?b", "?g"]))
        .procedure(from_test(move |inputs: &[Value]| {
            !unreachable.iter().any(|b| inputs[0] == Value::from(*b))
        }))
        .build()
        .unwrap();

    let place = ActionSchema::new("place", ["?b", "?g"])
        .precondition(Fact::new("light", ["?b"]))
        .precondition(Fact::new("grasp", ["?b", "?g"]))
        .precondition(Fact::new("reachable", ["?b", "?g"]))
        .adds(Fact::atom("placed"))
        .with_cost(1.0);
    let drag = ActionSchema::new("drag", ["?b", "?g"])
        .precondition(Fact::new("block", ["?b"]))
        .precondition(Fact::new("grasp", ["?b", "?g"]))
        .precondition(Fact::new("reachable", ["?b", "?g"]))
        .adds(Fact::atom("placed"))
        .with_cost(10.0);

    Problem::new(
        Domain::new(vec![place, drag]),
        vec![
            Fact::new("block", ["A"]),
            Fact::new("block", ["B"]),
            Fact::new("light", ["A"]),
        ],
        vec![Literal::pos(Fact::atom("placed"))],
        vec![grasp, reachable],
    )
}
