// Property tests for the quantified invariants of the pipeline.
use motly_core::evaluate;
use motly_core::tree::{Node, Scalar, Slot, Value};
use proptest::prelude::*;

fn run(input: &str) -> Node {
    let outcome = evaluate(input, Node::new());
    assert!(
        outcome.diagnostics.is_empty(),
        "diagnostics for {input:?}: {:?}",
        outcome.diagnostics
    );
    outcome.value
}

fn scalar_at<'a>(root: &'a Node, name: &str) -> &'a Scalar {
    match root.property(name).and_then(Slot::as_node).map(|n| &n.value) {
        Some(Some(Value::Scalar(s))) => s,
        other => panic!("expected scalar at {name}, got {other:?}"),
    }
}

fn bare_ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}"
}

fn quoted(text: &str) -> String {
    let mut out = String::from("\"");
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

proptest! {
    // Parsing `name = v` yields a node whose value slot equals v.
    #[test]
    fn roundtrip_number(n in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
        let root = run(&format!("n = {n:?}"));
        prop_assert_eq!(scalar_at(&root, "n"), &Scalar::Num(n));
    }

    #[test]
    fn roundtrip_quoted_string(s in "[ -~]{0,24}") {
        let root = run(&format!("s = {}", quoted(&s)));
        prop_assert_eq!(scalar_at(&root, "s"), &Scalar::Str(s));
    }

    #[test]
    fn roundtrip_bare_string(s in "[a-z_][a-z0-9_]{0,15}") {
        let root = run(&format!("s = {s}"));
        prop_assert_eq!(scalar_at(&root, "s"), &Scalar::Str(s));
    }

    #[test]
    fn roundtrip_boolean(b in any::<bool>()) {
        let root = run(&format!("b = @{b}"));
        prop_assert_eq!(scalar_at(&root, "b"), &Scalar::Bool(b));
    }

    // Applying `-...` twice yields the same tree as applying it once.
    #[test]
    fn clear_all_idempotent(keys in proptest::collection::hash_set(bare_ident(), 1..6)) {
        let mut body = String::new();
        for (i, key) in keys.iter().enumerate() {
            body.push_str(&format!("{key} = {i}\n"));
        }
        let once = run(&format!("{body}-..."));
        let twice = run(&format!("{body}-...\n-..."));
        prop_assert_eq!(once, twice);
    }

    // Disjoint statements commute.
    #[test]
    fn order_independence(keys in proptest::collection::hash_set(bare_ident(), 2..6)) {
        let keys: Vec<_> = keys.into_iter().collect();
        let forward: String = keys
            .iter()
            .enumerate()
            .map(|(i, k)| format!("{k} = {i}\n"))
            .collect();
        let backward: String = keys
            .iter()
            .enumerate()
            .rev()
            .map(|(i, k)| format!("{k} = {i}\n"))
            .collect();
        prop_assert_eq!(run(&forward), run(&backward));
    }

    // On an empty target, merge blocks and replace blocks agree.
    #[test]
    fn merge_is_replace_on_empty(keys in proptest::collection::hash_set(bare_ident(), 1..5)) {
        let body: String = keys
            .iter()
            .enumerate()
            .map(|(i, k)| format!("{k} = {i}, "))
            .collect();
        let merged = run(&format!("scope {{ {body} }}"));
        let replaced = run(&format!("scope: {{ {body} }}"));
        prop_assert_eq!(merged, replaced);
    }

    // A clone is a snapshot: mutating the source afterwards never
    // changes the clone.
    #[test]
    fn clone_detachment(
        keys in proptest::collection::hash_set(bare_ident(), 1..5),
        new_value in 1000u32..2000,
    ) {
        let keys: Vec<_> = keys.into_iter().collect();
        let mut body = String::new();
        for (i, key) in keys.iter().enumerate() {
            body.push_str(&format!("{key} = {i}, "));
        }
        let before = run(&format!("base: {{ {body} }}\ncopy := $base"));
        let snapshot = before.property("copy").cloned();

        let mutated = run(&format!(
            "base: {{ {body} }}\ncopy := $base\nbase.{} = {new_value}",
            keys[0]
        ));
        prop_assert_eq!(mutated.property("copy").cloned(), snapshot);
    }
}
