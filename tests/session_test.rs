use motly_core::serialization::to_json;
use motly_core::{Session, SessionError};

#[test]
fn test_statements_accumulate_across_parses() {
    let mut session = Session::new();
    assert!(session.parse("a = 1").unwrap().is_empty());
    assert!(session.parse("b = 2").unwrap().is_empty());

    let v: serde_json::Value =
        serde_json::from_str(&to_json(&session.value().unwrap()).unwrap()).unwrap();
    assert_eq!(v["properties"]["a"]["eq"], 1);
    assert_eq!(v["properties"]["b"]["eq"], 2);
}

#[test]
fn test_syntax_error_is_a_single_diagnostic_and_leaves_tree_untouched() {
    let mut session = Session::new();
    session.parse("a = 1").unwrap();

    let diagnostics = session.parse("b = [").unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code(), "tag-parse-syntax-error");

    let v: serde_json::Value =
        serde_json::from_str(&to_json(&session.value().unwrap()).unwrap()).unwrap();
    assert_eq!(v["properties"]["a"]["eq"], 1);
    assert!(v["properties"].get("b").is_none());
}

#[test]
fn test_reset_keeps_schema() {
    let mut session = Session::new();
    session
        .parse_schema("Required: { name = string }")
        .unwrap();
    session.parse("name = 1").unwrap();
    assert_eq!(session.validate_schema().unwrap().len(), 1);

    session.reset().unwrap();
    // The tree is empty again, so `name` is missing.
    let errors = session.validate_schema().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), "missing-required");

    session.parse("name = ok").unwrap();
    assert!(session.validate_schema().unwrap().is_empty());
}

#[test]
fn test_parse_schema_replaces_previous() {
    let mut session = Session::new();
    session
        .parse_schema("Required: { old = string }")
        .unwrap();
    session
        .parse_schema("Required: { new = string }")
        .unwrap();
    session.parse("new = x").unwrap();
    assert!(session.validate_schema().unwrap().is_empty());
}

#[test]
fn test_validate_schema_without_schema_is_empty() {
    let mut session = Session::new();
    session.parse("anything = 1").unwrap();
    assert!(session.validate_schema().unwrap().is_empty());
}

#[test]
fn test_validate_references_surface() {
    let mut session = Session::new();
    session.parse("ref = $missing").unwrap();
    let errors = session.validate_references().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), "unresolved-reference");
    assert_eq!(errors[0].path(), ["ref"]);
}

#[test]
fn test_value_returns_a_deep_copy() {
    let mut session = Session::new();
    session.parse("a = 1").unwrap();

    let mut copy = session.value().unwrap();
    copy.properties_mut().clear();

    let v: serde_json::Value =
        serde_json::from_str(&to_json(&session.value().unwrap()).unwrap()).unwrap();
    assert_eq!(v["properties"]["a"]["eq"], 1);
}

#[test]
fn test_dispose_is_idempotent_and_blocks_further_use() {
    let mut session = Session::new();
    session.parse("a = 1").unwrap();
    session.dispose();
    session.dispose();

    assert_eq!(session.parse("b = 2"), Err(SessionError::Disposed));
    assert_eq!(session.parse_schema("x = 1"), Err(SessionError::Disposed));
    assert_eq!(session.reset(), Err(SessionError::Disposed));
    assert_eq!(session.value(), Err(SessionError::Disposed));
    assert_eq!(session.validate_schema(), Err(SessionError::Disposed));
    assert_eq!(session.validate_references(), Err(SessionError::Disposed));
}

#[test]
fn test_interpreter_diagnostics_flow_through_parse() {
    let mut session = Session::new();
    let diagnostics = session.parse("a = $target { x = 1 }").unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code(), "ref-with-properties");
}
