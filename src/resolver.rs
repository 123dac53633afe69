//! Reference resolution over a finished tree.
//!
//! A post-pass that walks the tree in preorder with an ancestor stack
//! and checks that every link resolves. Links are never substituted,
//! and they are leaves of the traversal: a path may neither route
//! *through* a link nor terminate on one: every link must reach a
//! non-link node.

use crate::ast::Segment;
use crate::error::SemanticError;
use crate::tree::{Link, Node, Slot, Value};

/// Check that every link in the tree resolves to a non-link node.
/// Returns an empty vec when all references are valid.
pub fn validate_references(root: &Node) -> Vec<SemanticError> {
    let mut errors = Vec::new();
    let mut path = Vec::new();
    let mut ancestors: Vec<&Node> = vec![root];
    walk(root, &mut path, &mut ancestors, root, &mut errors);
    errors
}

/// `ancestors` holds the chain from the root down to the parent of
/// `node`, root first; the root is seeded twice-over by construction
/// (once at init, once when entering each of its children), which is
/// what makes `$^name` at the top level equivalent to `$name`.
fn walk<'a>(
    node: &'a Node,
    path: &mut Vec<String>,
    ancestors: &mut Vec<&'a Node>,
    root: &'a Node,
    errors: &mut Vec<SemanticError>,
) {
    if let Some(Value::Array(items)) = &node.value {
        for (i, slot) in items.iter().enumerate() {
            path.push(format!("[{i}]"));
            check_slot(slot, node, path, ancestors, root, errors);
            path.pop();
        }
    }

    if let Some(props) = &node.properties {
        for (key, slot) in props {
            path.push(key.clone());
            check_slot(slot, node, path, ancestors, root, errors);
            path.pop();
        }
    }
}

fn check_slot<'a>(
    slot: &'a Slot,
    parent: &'a Node,
    path: &mut Vec<String>,
    ancestors: &mut Vec<&'a Node>,
    root: &'a Node,
    errors: &mut Vec<SemanticError>,
) {
    match slot {
        Slot::Link(link) => {
            if let Err(reason) = check_link(link, ancestors, root) {
                errors.push(SemanticError::UnresolvedReference {
                    reference: link.target.clone(),
                    reason,
                    path: path.clone(),
                });
            }
        }
        Slot::Node(child) => {
            ancestors.push(parent);
            walk(child, path, ancestors, root, errors);
            ancestors.pop();
        }
    }
}

/// Resolve a single link against the ancestor stack. Returns the
/// failure reason when it does not reach a non-link node.
fn check_link(link: &Link, ancestors: &[&Node], root: &Node) -> Result<(), String> {
    let (ups, segments) = parse_link_target(&link.target);
    if segments.is_empty() {
        return Err("reference has no path segments".to_string());
    }

    let start = if ups == 0 {
        root
    } else {
        match ancestors
            .len()
            .checked_sub(ups)
            .and_then(|idx| ancestors.get(idx))
        {
            Some(node) => *node,
            None => return Err(out_of_range(ups, ancestors.len())),
        }
    };

    follow(start, &segments)
}

fn out_of_range(ups: usize, available: usize) -> String {
    format!("goes {ups} level(s) up but only {available} ancestor(s) are available")
}

enum Reached<'a> {
    Node(&'a Node),
    Link,
}

fn follow(start: &Node, segments: &[Segment]) -> Result<(), String> {
    let mut current = Reached::Node(start);

    for segment in segments {
        let node = match current {
            Reached::Node(node) => node,
            Reached::Link => {
                return Err("cannot follow a path through a link".to_string());
            }
        };
        match segment {
            Segment::Name(name) => match node.property(name) {
                Some(Slot::Node(child)) => current = Reached::Node(child),
                Some(Slot::Link(_)) => current = Reached::Link,
                None => {
                    return Err(format!("property {name:?} not found"));
                }
            },
            Segment::Index(idx) => match &node.value {
                Some(Value::Array(items)) => match items.get(*idx) {
                    Some(Slot::Node(child)) => current = Reached::Node(child),
                    Some(Slot::Link(_)) => current = Reached::Link,
                    None => {
                        return Err(format!(
                            "index [{idx}] is out of bounds (array length {})",
                            items.len()
                        ));
                    }
                },
                _ => {
                    return Err(format!("index [{idx}] used on a non-array value"));
                }
            },
        }
    }

    match current {
        Reached::Node(_) => Ok(()),
        Reached::Link => Err("target is itself a link".to_string()),
    }
}

/// Parse a canonical link string like `$^^items[0].name` into
/// `(ups, segments)`. The parser only stores canonical text, so this
/// is lenient; anything unexpected just yields fewer segments.
fn parse_link_target(target: &str) -> (usize, Vec<Segment>) {
    let mut rest = target.strip_prefix('$').unwrap_or(target);
    let ups = rest.chars().take_while(|&c| c == '^').count();
    rest = &rest[ups..];

    let mut segments = Vec::new();
    let mut name = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !name.is_empty() {
                    segments.push(Segment::Name(std::mem::take(&mut name)));
                }
            }
            '[' => {
                if !name.is_empty() {
                    segments.push(Segment::Name(std::mem::take(&mut name)));
                }
                let mut digits = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    digits.push(c);
                }
                if let Ok(idx) = digits.parse::<usize>() {
                    segments.push(Segment::Index(idx));
                }
            }
            _ => name.push(ch),
        }
    }
    if !name.is_empty() {
        segments.push(Segment::Name(name));
    }

    (ups, segments)
}
