#![no_main]

//! Fuzz target for alias resolution
//!
//! Applies single and bulk alias insertions over a small name space and
//! checks that the graph stays fully resolved and acyclic, and that rejected
//! insertions leave it untouched.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use service_locator::{AliasGraph, DiError};

/// Names are drawn from a tiny pool so cycles are common
fn name(id: u8) -> String {
    format!("n{}", id % 8)
}

#[derive(Debug, Arbitrary)]
enum AliasOp {
    Add(u8, u8),
    Extend(Vec<(u8, u8)>),
    Resolve(u8),
}

fn snapshot(graph: &AliasGraph) -> Vec<(String, String)> {
    let mut pairs: Vec<_> = graph
        .iter()
        .map(|(a, t)| (a.to_owned(), t.to_owned()))
        .collect();
    pairs.sort();
    pairs
}

fn check_resolved(graph: &AliasGraph) {
    for (alias, target) in graph.iter() {
        assert_ne!(alias, target, "self alias stored");
        assert!(!graph.contains(target), "{alias} -> {target} is not terminal");
        assert_eq!(graph.resolve(alias).unwrap(), target);
    }
}

fuzz_target!(|ops: Vec<AliasOp>| {
    let mut graph = AliasGraph::new();

    for op in ops {
        match op {
            AliasOp::Add(alias, target) => {
                let before = snapshot(&graph);
                match graph.add(&name(alias), &name(target)) {
                    Ok(()) => {}
                    Err(DiError::CyclicAlias { cycle }) => {
                        assert!(cycle.len() >= 2);
                        assert_eq!(cycle.first(), cycle.last());
                        assert_eq!(before, snapshot(&graph));
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            AliasOp::Extend(pairs) => {
                let before = snapshot(&graph);
                let batch = pairs.into_iter().map(|(a, t)| (name(a), name(t)));
                match graph.extend(batch) {
                    Ok(()) => {}
                    Err(DiError::CyclicAlias { cycle }) => {
                        assert_eq!(cycle.first(), cycle.last());
                        assert_eq!(before, snapshot(&graph));
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            AliasOp::Resolve(id) => {
                let name = name(id);
                let resolved = graph.resolve(&name).unwrap();
                assert!(!graph.contains(resolved));
            }
        }
        check_resolved(&graph);
    }
});
