use motly_core::resolver::validate_references;
use motly_core::tree::Node;
use motly_core::{evaluate, SemanticError};

fn check(input: &str) -> Vec<SemanticError> {
    let outcome = evaluate(input, Node::new());
    assert!(
        outcome.diagnostics.is_empty(),
        "unexpected parse diagnostics: {:?}",
        outcome.diagnostics
    );
    validate_references(&outcome.value)
}

fn codes_and_paths(errors: &[SemanticError]) -> Vec<(String, Vec<String>)> {
    let mut out: Vec<_> = errors
        .iter()
        .map(|e| (e.code().to_string(), e.path().to_vec()))
        .collect();
    out.sort();
    out
}

#[test]
fn test_all_references_resolve() {
    let errors = check(
        "config: { host = localhost }\n\
         alias = $config.host\n\
         whole = $config",
    );
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn test_unresolved_reference() {
    let errors = check("ref = $missing");
    assert_eq!(
        codes_and_paths(&errors),
        vec![("unresolved-reference".to_string(), vec!["ref".to_string()])]
    );
}

#[test]
fn test_unresolved_deep_segment() {
    let errors = check("a: { b = 1 }\nref = $a.c");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("\"c\""));
}

#[test]
fn test_relative_reference() {
    // $^sibling from outer.inner.ref starts at outer.
    let errors = check("outer: { sibling = 1, inner: { ref = $^sibling } }");
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn test_top_level_up_is_root() {
    // The root is its own enclosing scope: $^x at the top level is $x.
    let errors = check("x = 1\nref = $^x");
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn test_ups_beyond_root() {
    let errors = check("x = 1\nref = $^^^x");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), "unresolved-reference");
    assert!(errors[0].to_string().contains("level(s) up"));
}

#[test]
fn test_cannot_follow_through_a_link() {
    let errors = check("real: { x = 1 }\nalias = $real\nbad = $alias.x");
    assert_eq!(
        codes_and_paths(&errors),
        vec![("unresolved-reference".to_string(), vec!["bad".to_string()])]
    );
    assert!(errors[0].to_string().contains("through a link"));
}

#[test]
fn test_link_to_link_is_unresolved() {
    let errors = check("target = 1\nfirst = $target\nsecond = $first");
    assert_eq!(
        codes_and_paths(&errors),
        vec![(
            "unresolved-reference".to_string(),
            vec!["second".to_string()]
        )]
    );
}

#[test]
fn test_array_index_resolution() {
    let errors = check("items = [a, b]\nref = $items[1]");
    assert!(errors.is_empty(), "{errors:?}");

    let errors = check("items = [a, b]\nref = $items[5]");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("out of bounds"));
}

#[test]
fn test_index_on_non_array() {
    let errors = check("scalar = 1\nref = $scalar[0]");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("non-array"));
}

#[test]
fn test_link_inside_array_is_checked() {
    let errors = check("items = [$missing]");
    assert_eq!(
        codes_and_paths(&errors),
        vec![(
            "unresolved-reference".to_string(),
            vec!["items".to_string(), "[0]".to_string()]
        )]
    );
}

#[test]
fn test_relative_link_inside_array_element() {
    let errors = check("other = 1\nlist = [{ ref = $^^other }]");
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn test_multiple_errors_accumulate() {
    let errors = check("a = $nope\nb: { c = $missing.too }");
    assert_eq!(errors.len(), 2);
    let paths: Vec<_> = errors.iter().map(|e| e.path().join(".")).collect();
    assert!(paths.contains(&"a".to_string()));
    assert!(paths.contains(&"b.c".to_string()));
}

#[test]
fn test_reference_to_array_element_property() {
    let errors = check("servers = [{ host = h }]\nref = $servers[0].host");
    assert!(errors.is_empty(), "{errors:?}");
}
