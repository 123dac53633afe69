//! Statement execution against a mutable tree.
//!
//! Statements are applied in source order. Intermediate path segments
//! auto-vivify as empty nodes; a link occupying an intermediate slot is
//! replaced with an empty node, since links are opaque and cannot be
//! mutated through. Execution never aborts: every problem becomes an
//! accumulated [`SemanticError`] and the tree is left in a well-defined
//! state.

use crate::ast::{link_text, ArrayItem, ParsedValue, ScalarValue, Segment, Statement};
use crate::error::SemanticError;
use crate::tree::{Link, Node, Scalar, Slot, Value};
use indexmap::IndexMap;

/// Execute statements against `root`, mutating it in place and
/// returning the accumulated non-fatal errors.
pub fn execute(statements: &[Statement], root: &mut Node) -> Vec<SemanticError> {
    let mut errors = Vec::new();
    let mut prefix = Vec::new();
    for stmt in statements {
        run_statement(stmt, root, &mut prefix, &mut errors);
    }
    errors
}

/// `prefix` is the property path of `scope` from the execution root,
/// used to anchor diagnostics produced inside nested blocks.
fn run_statement(
    stmt: &Statement,
    scope: &mut Node,
    prefix: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    match stmt {
        Statement::SetValue {
            path,
            value,
            properties,
        } => run_set_value(scope, path, value, properties.as_deref(), prefix, errors),
        Statement::AssignBoth {
            path,
            value,
            properties,
        } => run_assign_both(scope, path, value, properties.as_deref(), prefix, errors),
        Statement::ReplaceProperties { path, properties } => {
            run_replace_properties(scope, path, properties, prefix, errors);
        }
        Statement::MergeProperties { path, properties } => {
            run_merge_properties(scope, path, properties, prefix, errors);
        }
        Statement::Define { path, deleted } => run_define(scope, path, *deleted),
        Statement::ClearAll => {
            scope.value = None;
            scope.properties = Some(IndexMap::new());
        }
    }
}

/// `name = value`: write the value slot, keep existing properties;
/// an optional block merges. `name = $ref` installs a bare link; a
/// block after a link is a non-fatal `ref-with-properties` error and
/// the block is ignored.
fn run_set_value(
    scope: &mut Node,
    path: &[String],
    value: &ParsedValue,
    properties: Option<&[Statement]>,
    prefix: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    if let ParsedValue::Scalar(ScalarValue::Link { ups, segments }) = value {
        if properties.is_some() {
            errors.push(SemanticError::RefWithProperties {
                path: joined_path(prefix, path),
            });
        }
        let (key, parent) = descend(scope, path);
        parent.properties_mut().insert(
            key,
            Slot::Link(Link {
                target: link_text(*ups, segments),
            }),
        );
        return;
    }

    let (key, parent) = descend(scope, path);
    let slot = parent
        .properties_mut()
        .entry(key)
        .or_insert_with(|| Slot::Node(Node::new()));
    let node = slot.make_node();
    node.deleted = false;

    let base = prefix.len();
    prefix.extend_from_slice(path);
    write_value(node, value, prefix, errors);
    if let Some(block) = properties {
        for stmt in block {
            run_statement(stmt, node, prefix, errors);
        }
    }
    prefix.truncate(base);
}

/// `name := value`: fresh node from the value and optional block,
/// replacing the slot. `name := $ref`: clone semantics.
fn run_assign_both(
    scope: &mut Node,
    path: &[String],
    value: &ParsedValue,
    properties: Option<&[Statement]>,
    prefix: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    if let ParsedValue::Scalar(ScalarValue::Link { ups, segments }) = value {
        let reference = link_text(*ups, segments);
        match resolve_clone(scope, path, *ups, segments, &reference, prefix) {
            Ok(mut clone) => {
                let base = prefix.len();
                prefix.extend_from_slice(path);
                sanitize_clone(&mut clone, 0, prefix, errors);
                if let Some(block) = properties {
                    for stmt in block {
                        run_statement(stmt, &mut clone, prefix, errors);
                    }
                }
                prefix.truncate(base);
                let (key, parent) = descend(scope, path);
                parent.properties_mut().insert(key, Slot::Node(clone));
            }
            Err(err) => {
                // Failed clone: record the error and leave an empty
                // node where the clone would have been.
                errors.push(err);
                let (key, parent) = descend(scope, path);
                parent.properties_mut().insert(key, Slot::Node(Node::new()));
            }
        }
        return;
    }

    let mut fresh = Node::new();
    let base = prefix.len();
    prefix.extend_from_slice(path);
    write_value(&mut fresh, value, prefix, errors);
    if let Some(block) = properties {
        for stmt in block {
            run_statement(stmt, &mut fresh, prefix, errors);
        }
    }
    prefix.truncate(base);

    let (key, parent) = descend(scope, path);
    parent.properties_mut().insert(key, Slot::Node(fresh));
}

/// `name: { props }`: fresh properties from the block, keeping the
/// existing value slot (only when the current occupant is a node).
fn run_replace_properties(
    scope: &mut Node,
    path: &[String],
    properties: &[Statement],
    prefix: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    let (key, parent) = descend(scope, path);

    let mut fresh = Node::new();
    let props = parent.properties_mut();
    if let Some(Slot::Node(existing)) = props.get(&key) {
        fresh.value = existing.value.clone();
    }

    let base = prefix.len();
    prefix.extend_from_slice(path);
    for stmt in properties {
        run_statement(stmt, &mut fresh, prefix, errors);
    }
    prefix.truncate(base);

    props.insert(key, Slot::Node(fresh));
}

/// `name { props }`: merge the block into the existing node.
fn run_merge_properties(
    scope: &mut Node,
    path: &[String],
    properties: &[Statement],
    prefix: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    let (key, parent) = descend(scope, path);
    let slot = parent
        .properties_mut()
        .entry(key)
        .or_insert_with(|| Slot::Node(Node::new()));
    let node = slot.make_node();
    node.deleted = false;

    let base = prefix.len();
    prefix.extend_from_slice(path);
    for stmt in properties {
        run_statement(stmt, node, prefix, errors);
    }
    prefix.truncate(base);
}

fn run_define(scope: &mut Node, path: &[String], deleted: bool) {
    let (key, parent) = descend(scope, path);
    if deleted {
        parent
            .properties_mut()
            .insert(key, Slot::Node(Node::tombstone()));
    } else {
        // Get-or-create: an existing node is left untouched.
        parent
            .properties_mut()
            .entry(key)
            .or_insert_with(|| Slot::Node(Node::new()));
    }
}

/// Navigate to the parent of the final path segment, auto-vivifying
/// intermediate nodes. Returns `(final_key, parent)`.
fn descend<'a>(scope: &'a mut Node, path: &[String]) -> (String, &'a mut Node) {
    let (last, init) = path
        .split_last()
        .expect("statement path must not be empty");
    let mut current = scope;
    for segment in init {
        let slot = current
            .properties_mut()
            .entry(segment.clone())
            .or_insert_with(|| Slot::Node(Node::new()));
        current = slot.make_node();
    }
    (last.clone(), current)
}

/// Write a non-link parsed value into the node's value slot.
fn write_value(
    node: &mut Node,
    value: &ParsedValue,
    prefix: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    match value {
        ParsedValue::Array(items) => {
            node.value = Some(Value::Array(build_array(items, prefix, errors)));
        }
        ParsedValue::Scalar(scalar) => match scalar {
            ScalarValue::Str(s) => node.value = Some(Value::Scalar(Scalar::Str(s.clone()))),
            ScalarValue::Num(n) => node.value = Some(Value::Scalar(Scalar::Num(*n))),
            ScalarValue::Bool(b) => node.value = Some(Value::Scalar(Scalar::Bool(*b))),
            ScalarValue::Date(d) => node.value = Some(Value::Scalar(Scalar::Date(d.clone()))),
            ScalarValue::Env(name) => node.value = Some(Value::Env(name.clone())),
            ScalarValue::Empty => node.value = None,
            ScalarValue::Link { .. } => {
                unreachable!("link values are handled before the value slot is written")
            }
        },
    }
}

fn build_array(
    items: &[ArrayItem],
    prefix: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) -> Vec<Slot> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            prefix.push(format!("[{i}]"));
            let slot = build_array_item(item, prefix, errors);
            prefix.pop();
            slot
        })
        .collect()
}

fn build_array_item(
    item: &ArrayItem,
    prefix: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) -> Slot {
    if let Some(ParsedValue::Scalar(ScalarValue::Link { ups, segments })) = &item.value {
        if item.properties.is_some() {
            errors.push(SemanticError::RefWithProperties {
                path: prefix.clone(),
            });
        }
        return Slot::Link(Link {
            target: link_text(*ups, segments),
        });
    }

    let mut node = Node::new();
    if let Some(value) = &item.value {
        write_value(&mut node, value, prefix, errors);
    }
    if let Some(block) = &item.properties {
        for stmt in block {
            run_statement(stmt, &mut node, prefix, errors);
        }
    }
    Slot::Node(node)
}

fn joined_path(prefix: &[String], path: &[String]) -> Vec<String> {
    prefix.iter().chain(path.iter()).cloned().collect()
}

// === Clone-by-reference ===

/// Resolve a clone reference and deep-copy the target. Absolute
/// references start at the scope node; relative ones start `ups`
/// levels above the parent of the write key.
fn resolve_clone(
    scope: &Node,
    stmt_path: &[String],
    ups: usize,
    segments: &[Segment],
    reference: &str,
    prefix: &[String],
) -> Result<Node, SemanticError> {
    let fail = |reason: String| SemanticError::UnresolvedClone {
        reference: reference.to_string(),
        reason,
        path: joined_path(prefix, stmt_path),
    };

    let start = if ups == 0 {
        scope
    } else {
        // The statement path names the write key; its parent is the
        // context the reference is issued from.
        let keep = match stmt_path.len().checked_sub(1 + ups) {
            Some(n) => n,
            None => {
                return Err(fail(format!(
                    "goes {} level(s) up but only {} ancestor(s) are available",
                    ups,
                    stmt_path.len() - 1
                )));
            }
        };
        let mut current = scope;
        for segment in &stmt_path[..keep] {
            match current.property(segment) {
                Some(Slot::Node(child)) => current = child,
                Some(Slot::Link(_)) => {
                    return Err(fail(format!("path segment {segment:?} is a link")));
                }
                None => {
                    return Err(fail(format!("path segment {segment:?} not found")));
                }
            }
        }
        current
    };

    let mut current = start;
    for segment in segments {
        match segment {
            Segment::Name(name) => match current.property(name) {
                Some(Slot::Node(child)) => current = child,
                Some(Slot::Link(_)) => {
                    return Err(fail(format!("property {name:?} is a link")));
                }
                None => {
                    return Err(fail(format!("property {name:?} not found")));
                }
            },
            Segment::Index(idx) => match &current.value {
                Some(Value::Array(items)) => match items.get(*idx) {
                    Some(Slot::Node(child)) => current = child,
                    Some(Slot::Link(_)) => {
                        return Err(fail(format!("index [{idx}] is a link")));
                    }
                    None => {
                        return Err(fail(format!(
                            "index [{idx}] is out of bounds (array length {})",
                            items.len()
                        )));
                    }
                },
                _ => {
                    return Err(fail(format!("index [{idx}] used on a non-array value")));
                }
            },
        }
    }

    Ok(current.clone())
}

/// Walk a cloned subtree and erase relative links that escape the
/// clone boundary: a link at depth `d` with `ups > d` would bind to
/// something unrelated after the clone, so its slot becomes an empty
/// node and a `clone-reference-out-of-scope` error is recorded.
/// Absolute links are kept as-is.
fn sanitize_clone(
    node: &mut Node,
    depth: usize,
    prefix: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    if let Some(Value::Array(items)) = &mut node.value {
        for (i, slot) in items.iter_mut().enumerate() {
            prefix.push(format!("[{i}]"));
            sanitize_slot(slot, depth + 1, prefix, errors);
            prefix.pop();
        }
    }
    if let Some(props) = &mut node.properties {
        for (key, slot) in props.iter_mut() {
            prefix.push(key.clone());
            sanitize_slot(slot, depth + 1, prefix, errors);
            prefix.pop();
        }
    }
}

fn sanitize_slot(
    slot: &mut Slot,
    depth: usize,
    prefix: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    match slot {
        Slot::Link(link) => {
            let ups = leading_ups(&link.target);
            if ups > depth {
                errors.push(SemanticError::CloneOutOfScope {
                    reference: link.target.clone(),
                    ups,
                    depth,
                    path: prefix.clone(),
                });
                *slot = Slot::Node(Node::new());
            }
        }
        Slot::Node(node) => sanitize_clone(node, depth, prefix, errors),
    }
}

/// The `^` count at the front of a canonical link string.
fn leading_ups(target: &str) -> usize {
    target
        .strip_prefix('$')
        .map_or(0, |rest| rest.chars().take_while(|&c| c == '^').count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(input: &str) -> (Node, Vec<SemanticError>) {
        let stmts = parse(input).expect("parse should succeed");
        let mut root = Node::new();
        let errors = execute(&stmts, &mut root);
        (root, errors)
    }

    fn node_at<'a>(root: &'a Node, path: &[&str]) -> &'a Node {
        let mut current = root;
        for seg in path {
            current = current
                .property(seg)
                .and_then(Slot::as_node)
                .unwrap_or_else(|| panic!("no node at {seg}"));
        }
        current
    }

    #[test]
    fn test_set_preserves_properties() {
        let (root, errors) = run("server = webhost { port = 8080 }\nserver = apphost");
        assert!(errors.is_empty());
        let server = node_at(&root, &["server"]);
        assert_eq!(
            server.value,
            Some(Value::Scalar(Scalar::Str("apphost".into())))
        );
        assert_eq!(
            node_at(&root, &["server", "port"]).value,
            Some(Value::Scalar(Scalar::Num(8080.0)))
        );
    }

    #[test]
    fn test_assign_both_replaces_properties() {
        let (root, _) = run("server = webhost { port = 8080 }\nserver := apphost");
        let server = node_at(&root, &["server"]);
        assert_eq!(
            server.value,
            Some(Value::Scalar(Scalar::Str("apphost".into())))
        );
        assert!(server.property("port").is_none());
    }

    #[test]
    fn test_auto_vivify_deep_path() {
        let (root, errors) = run("a.b.c = 1");
        assert!(errors.is_empty());
        assert_eq!(
            node_at(&root, &["a", "b", "c"]).value,
            Some(Value::Scalar(Scalar::Num(1.0)))
        );
    }

    #[test]
    fn test_set_through_link_replaces_it() {
        let (root, errors) = run("a = $target\na.b = 1");
        assert!(errors.is_empty());
        assert_eq!(
            node_at(&root, &["a", "b"]).value,
            Some(Value::Scalar(Scalar::Num(1.0)))
        );
    }

    #[test]
    fn test_ref_with_properties_is_non_fatal() {
        let (root, errors) = run("a = $target { x = 1 }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "ref-with-properties");
        assert_eq!(errors[0].path(), ["a"]);
        // The link is still installed; the block is dropped.
        assert_eq!(
            root.property("a").and_then(Slot::as_link).unwrap().target,
            "$target"
        );
    }

    #[test]
    fn test_tombstone_and_overwrite() {
        let (root, _) = run("-gone");
        assert!(node_at(&root, &["gone"]).deleted);
        let (root, _) = run("-gone\ngone = 1");
        let gone = node_at(&root, &["gone"]);
        assert!(!gone.deleted);
        assert_eq!(gone.value, Some(Value::Scalar(Scalar::Num(1.0))));
    }

    #[test]
    fn test_clear_all_scoped() {
        let (root, _) = run("a = 1\nouter { x = 1, -... , y = 2 }");
        assert_eq!(
            node_at(&root, &["a"]).value,
            Some(Value::Scalar(Scalar::Num(1.0)))
        );
        let outer = node_at(&root, &["outer"]);
        assert!(outer.property("x").is_none());
        assert!(outer.property("y").is_some());
    }

    #[test]
    fn test_none_clears_value_only() {
        let (root, _) = run("a = 1 { b = 2 }\na = @none");
        let a = node_at(&root, &["a"]);
        assert_eq!(a.value, None);
        assert!(a.property("b").is_some());
    }

    #[test]
    fn test_env_value_is_opaque() {
        let (root, _) = run("home = @env.HOME");
        assert_eq!(
            node_at(&root, &["home"]).value,
            Some(Value::Env("HOME".into()))
        );
    }

    #[test]
    fn test_clone_is_detached() {
        let (root, errors) = run("base: { x = 1 }\ncopy := $base\nbase.x = 2");
        assert!(errors.is_empty());
        assert_eq!(
            node_at(&root, &["copy", "x"]).value,
            Some(Value::Scalar(Scalar::Num(1.0)))
        );
        assert_eq!(
            node_at(&root, &["base", "x"]).value,
            Some(Value::Scalar(Scalar::Num(2.0)))
        );
    }

    #[test]
    fn test_clone_block_merges_over_clone() {
        let (root, errors) =
            run("base: { shared = x, inner: { host = h } }\ncopy := $base { inner { host = H } }");
        assert!(errors.is_empty());
        assert_eq!(
            node_at(&root, &["copy", "shared"]).value,
            Some(Value::Scalar(Scalar::Str("x".into())))
        );
        assert_eq!(
            node_at(&root, &["copy", "inner", "host"]).value,
            Some(Value::Scalar(Scalar::Str("H".into())))
        );
    }

    #[test]
    fn test_failed_clone_leaves_empty_node() {
        let (root, errors) = run("copy := $missing");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "unresolved-clone-reference");
        let copy = node_at(&root, &["copy"]);
        assert_eq!(copy.value, None);
        assert!(copy.properties.is_none());
    }

    #[test]
    fn test_clone_through_link_fails() {
        let (_, errors) = run("real: { x = 1 }\nalias = $real\ncopy := $alias.x");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "unresolved-clone-reference");
    }

    #[test]
    fn test_clone_array_index() {
        let (root, errors) = run("items = [{ n = 1 }, { n = 2 }]\npicked := $items[1]");
        assert!(errors.is_empty());
        assert_eq!(
            node_at(&root, &["picked", "n"]).value,
            Some(Value::Scalar(Scalar::Num(2.0)))
        );
    }

    #[test]
    fn test_relative_clone() {
        // $^base from a.b.copy starts one level above b, i.e. at a.
        let (root, errors) = run("a: { base: { x = 1 } }\na.b.copy := $^base");
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(
            node_at(&root, &["a", "b", "copy", "x"]).value,
            Some(Value::Scalar(Scalar::Num(1.0)))
        );
    }

    #[test]
    fn test_clone_ups_beyond_scope() {
        let (_, errors) = run("outer { copy := $^base }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "unresolved-clone-reference");
        assert_eq!(errors[0].path(), ["outer", "copy"]);
    }

    #[test]
    fn test_clone_boundary_violation() {
        let (root, errors) =
            run("root_setting = important\nother: { val = $^^root_setting }\ncopy := $other");
        let escapes: Vec<_> = errors
            .iter()
            .filter(|e| e.code() == "clone-reference-out-of-scope")
            .collect();
        assert_eq!(escapes.len(), 1);
        assert_eq!(escapes[0].path(), ["copy", "val"]);
        let val = node_at(&root, &["copy", "val"]);
        assert_eq!(val.value, None);
        assert!(val.properties.is_none());
        // The source of the clone is untouched.
        assert!(node_at(&root, &["other"])
            .property("val")
            .unwrap()
            .as_link()
            .is_some());
    }

    #[test]
    fn test_clone_boundary_keeps_internal_relative_links() {
        // $^x at depth 1 stays inside the clone boundary.
        let (root, errors) = run("tpl: { x = 1, y = $^x }\ncopy := $tpl");
        assert!(errors.is_empty(), "{errors:?}");
        assert!(node_at(&root, &["copy"])
            .property("y")
            .unwrap()
            .as_link()
            .is_some());
    }

    #[test]
    fn test_array_element_properties() {
        let (root, _) = run("items = [a { note = n }, b]");
        let items = match &node_at(&root, &["items"]).value {
            Some(Value::Array(items)) => items,
            other => panic!("expected array, got {other:?}"),
        };
        let first = items[0].as_node().unwrap();
        assert_eq!(first.value, Some(Value::Scalar(Scalar::Str("a".into()))));
        assert!(first.property("note").is_some());
    }

    #[test]
    fn test_later_statement_wins() {
        let (root, _) = run("a = 1\na = 2");
        assert_eq!(
            node_at(&root, &["a"]).value,
            Some(Value::Scalar(Scalar::Num(2.0)))
        );
    }

    #[test]
    fn test_insertion_order_kept_on_rewrite() {
        let (root, _) = run("a = 1\nb = 2\na = 3");
        let keys: Vec<_> = root
            .properties
            .as_ref()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, ["a", "b"]);
    }
}
