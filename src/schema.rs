//! Structural schema validation.
//!
//! A schema is itself a MOTLY tree. Its root (and any nested node used
//! as a property definition) is read as a *schema spec* with the
//! recognised sections `Required`, `Optional`, `Additional`, and, at
//! the root only, `Types`. A *type spec* is, in priority order: a
//! `oneOf` union, an enum (a spec whose own value slot is an array), a
//! `matches` pattern, a named type (built-in, `X[]`, or custom), or a
//! nested schema. Validation accumulates errors and never aborts.

use crate::error::SemanticError;
use crate::tree::{Node, Scalar, Slot, Value};
use indexmap::IndexMap;
use regex::Regex;

type Props = IndexMap<String, Slot>;

/// Validate `tree` against `schema`, returning every violation found.
pub fn validate_schema(tree: &Node, schema: &Node) -> Vec<SemanticError> {
    let mut errors = Vec::new();
    let types = section(schema, "Types");
    validate_against(tree, schema, types, &mut Vec::new(), &mut errors);
    errors
}

/// A named section of a schema spec, as a property bag.
fn section<'a>(node: &'a Node, name: &str) -> Option<&'a Props> {
    node.property(name)?
        .as_node()
        .and_then(|n| n.properties.as_ref())
}

/// The string in a node's value slot, if any.
fn value_string(node: &Node) -> Option<&str> {
    match &node.value {
        Some(Value::Scalar(Scalar::Str(s))) => Some(s.as_str()),
        _ => None,
    }
}

#[derive(Clone)]
enum AdditionalPolicy {
    Reject,
    Allow,
    ValidateAs(String),
}

/// The unknown-property policy of a schema spec. Absent means reject;
/// present without a value means allow; a string other than
/// "allow"/"reject" names the type every unknown property must satisfy.
fn additional_policy(schema: &Node) -> AdditionalPolicy {
    let Some(slot) = schema.property("Additional") else {
        return AdditionalPolicy::Reject;
    };
    match slot {
        Slot::Node(node) => match value_string(node) {
            Some("allow") => AdditionalPolicy::Allow,
            Some("reject") => AdditionalPolicy::Reject,
            Some(other) => AdditionalPolicy::ValidateAs(other.to_string()),
            None => AdditionalPolicy::Allow,
        },
        Slot::Link(_) => AdditionalPolicy::Reject,
    }
}

/// Validate a node against a spec with Required/Optional/Additional.
fn validate_against(
    tree: &Node,
    schema: &Node,
    types: Option<&Props>,
    path: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    let required = section(schema, "Required");
    let optional = section(schema, "Optional");
    let policy = additional_policy(schema);
    let props = tree.properties.as_ref();

    if let Some(required) = required {
        for (key, spec) in required {
            path.push(key.clone());
            match props.and_then(|p| p.get(key)) {
                None => errors.push(SemanticError::MissingRequired {
                    name: key.clone(),
                    path: path.clone(),
                }),
                Some(slot) => validate_value_type(slot, spec, types, path, errors),
            }
            path.pop();
        }
    }

    if let (Some(optional), Some(props)) = (optional, props) {
        for (key, spec) in optional {
            if let Some(slot) = props.get(key) {
                path.push(key.clone());
                validate_value_type(slot, spec, types, path, errors);
                path.pop();
            }
        }
    }

    if let Some(props) = props {
        let known = |key: &str| {
            required.is_some_and(|r| r.contains_key(key))
                || optional.is_some_and(|o| o.contains_key(key))
        };
        for (key, slot) in props {
            if known(key) {
                continue;
            }
            path.push(key.clone());
            match &policy {
                AdditionalPolicy::Reject => errors.push(SemanticError::UnknownProperty {
                    name: key.clone(),
                    path: path.clone(),
                }),
                AdditionalPolicy::Allow => {}
                AdditionalPolicy::ValidateAs(type_name) => {
                    validate_base_type(slot, type_name, types, path, errors);
                }
            }
            path.pop();
        }
    }
}

/// Validate a slot against a type spec node.
fn validate_value_type(
    slot: &Slot,
    spec: &Slot,
    types: Option<&Props>,
    path: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    let spec = match spec {
        Slot::Node(node) => node,
        // A link is not a type spec.
        Slot::Link(_) => return,
    };

    // Union: oneOf lists type names; the first clean attempt wins.
    if let Some(one_of) = spec.property("oneOf").and_then(Slot::as_node) {
        if let Some(Value::Array(members)) = &one_of.value {
            validate_union(slot, members, types, path, errors);
            return;
        }
    }

    // Enum: the spec's own value slot is an array of allowed values.
    // The property spelling `{ eq = [...] }` is accepted as well.
    if let Some(Value::Array(allowed)) = &spec.value {
        validate_enum(slot, allowed, path, errors);
        return;
    }
    if let Some(eq) = spec.property("eq").and_then(Slot::as_node) {
        if let Some(Value::Array(allowed)) = &eq.value {
            validate_enum(slot, allowed, path, errors);
            return;
        }
    }

    // Pattern: a `matches` regex, optionally next to a base type name
    // in the spec's value slot.
    if let Some(matches) = spec.property("matches").and_then(Slot::as_node) {
        if let Some(base) = value_string(spec) {
            validate_base_type(slot, base, types, path, errors);
        }
        validate_pattern(slot, matches, path, errors);
        return;
    }

    // Named type: the spec's value slot is a type name.
    if let Some(type_name) = value_string(spec) {
        validate_base_type(slot, type_name, types, path, errors);
        return;
    }

    // Nested schema: a spec with only structural sections.
    let structural = spec.properties.as_ref().is_some_and(|p| {
        p.contains_key("Required") || p.contains_key("Optional") || p.contains_key("Additional")
    });
    if structural {
        match slot {
            Slot::Node(node) => validate_against(node, spec, types, path, errors),
            Slot::Link(_) => errors.push(SemanticError::WrongType {
                expected: "a tag".to_string(),
                found: "a link".to_string(),
                path: path.clone(),
            }),
        }
    }
}

/// Validate a slot against a type name: `X[]`, a built-in, or a custom
/// type from the root `Types` section.
fn validate_base_type(
    slot: &Slot,
    type_name: &str,
    types: Option<&Props>,
    path: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    if let Some(inner) = type_name.strip_suffix("[]") {
        validate_array_type(slot, inner, types, path, errors);
        return;
    }

    match type_name {
        "string" => expect_scalar(slot, type_name, path, errors, |s| {
            matches!(s, Scalar::Str(_))
        }),
        "number" => expect_scalar(slot, type_name, path, errors, |s| {
            matches!(s, Scalar::Num(_))
        }),
        "boolean" => expect_scalar(slot, type_name, path, errors, |s| {
            matches!(s, Scalar::Bool(_))
        }),
        "date" => expect_scalar(slot, type_name, path, errors, |s| {
            matches!(s, Scalar::Date(_))
        }),
        // tag and flag are presence checks; only a link fails them.
        "tag" | "flag" => {
            if slot.as_link().is_some() {
                errors.push(SemanticError::WrongType {
                    expected: format!("type {type_name:?}"),
                    found: "a link".to_string(),
                    path: path.clone(),
                });
            }
        }
        "any" => {}
        custom => match types.and_then(|t| t.get(custom)) {
            Some(spec) => validate_value_type(slot, spec, types, path, errors),
            None => errors.push(SemanticError::InvalidSchema {
                message: format!("unknown type {custom:?} in schema"),
                path: path.clone(),
            }),
        },
    }
}

fn expect_scalar(
    slot: &Slot,
    type_name: &str,
    path: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
    pred: impl Fn(&Scalar) -> bool,
) {
    let ok = match slot {
        Slot::Node(node) => matches!(&node.value, Some(Value::Scalar(s)) if pred(s)),
        Slot::Link(_) => false,
    };
    if !ok {
        errors.push(SemanticError::WrongType {
            expected: format!("type {type_name:?}"),
            found: describe(slot).to_string(),
            path: path.clone(),
        });
    }
}

/// Validate `X[]`: the value slot must be an array, and every element
/// validates as `X`.
fn validate_array_type(
    slot: &Slot,
    inner: &str,
    types: Option<&Props>,
    path: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    let node = match slot {
        Slot::Node(node) => node,
        Slot::Link(_) => {
            errors.push(SemanticError::WrongType {
                expected: format!("type \"{inner}[]\""),
                found: "a link".to_string(),
                path: path.clone(),
            });
            return;
        }
    };

    let items = match &node.value {
        Some(Value::Array(items)) => items,
        _ => {
            errors.push(SemanticError::WrongType {
                expected: format!("type \"{inner}[]\""),
                found: describe(slot).to_string(),
                path: path.clone(),
            });
            return;
        }
    };

    for (i, item) in items.iter().enumerate() {
        path.push(format!("[{i}]"));
        validate_base_type(item, inner, types, path, errors);
        path.pop();
    }
}

/// Validate against an enum: the value slot must equal one of the
/// allowed scalars. Dates compare by epoch, everything else strictly.
fn validate_enum(
    slot: &Slot,
    allowed: &[Slot],
    path: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    let allowed_text = || {
        allowed
            .iter()
            .filter_map(|a| a.as_node())
            .filter_map(|n| match &n.value {
                Some(Value::Scalar(s)) => Some(scalar_text(s)),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    let node = match slot {
        Slot::Node(node) => node,
        Slot::Link(_) => {
            errors.push(SemanticError::WrongType {
                expected: "an enum value".to_string(),
                found: "a link".to_string(),
                path: path.clone(),
            });
            return;
        }
    };

    let scalar = match &node.value {
        Some(Value::Scalar(s)) => s,
        _ => {
            errors.push(SemanticError::InvalidEnumValue {
                allowed: allowed_text(),
                path: path.clone(),
            });
            return;
        }
    };

    let matched = allowed.iter().filter_map(|a| a.as_node()).any(|n| {
        matches!(&n.value, Some(Value::Scalar(s)) if scalar_enum_eq(s, scalar))
    });
    if !matched {
        errors.push(SemanticError::InvalidEnumValue {
            allowed: allowed_text(),
            path: path.clone(),
        });
    }
}

fn scalar_enum_eq(a: &Scalar, b: &Scalar) -> bool {
    match (a, b) {
        (Scalar::Date(x), Scalar::Date(y)) => x.instant == y.instant,
        _ => a == b,
    }
}

fn scalar_text(s: &Scalar) -> String {
    match s {
        Scalar::Str(v) => format!("{v:?}"),
        Scalar::Num(v) => v.to_string(),
        Scalar::Bool(v) => v.to_string(),
        Scalar::Date(v) => v.raw.clone(),
    }
}

/// Validate against a `matches` regex on the value slot string.
fn validate_pattern(
    slot: &Slot,
    matches_node: &Node,
    path: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    let Some(pattern) = value_string(matches_node) else {
        return;
    };

    let node = match slot {
        Slot::Node(node) => node,
        Slot::Link(_) => {
            errors.push(SemanticError::WrongType {
                expected: "a value matching a pattern".to_string(),
                found: "a link".to_string(),
                path: path.clone(),
            });
            return;
        }
    };

    let Some(text) = value_string(node) else {
        errors.push(SemanticError::PatternMismatch {
            message: format!("expected a string matching pattern {pattern:?}"),
            path: path.clone(),
        });
        return;
    };

    match Regex::new(pattern) {
        Ok(re) => {
            if !re.is_match(text) {
                errors.push(SemanticError::PatternMismatch {
                    message: format!("value {text:?} does not match pattern {pattern:?}"),
                    path: path.clone(),
                });
            }
        }
        Err(err) => errors.push(SemanticError::InvalidSchema {
            message: format!("invalid regex pattern {pattern:?}: {err}"),
            path: path.clone(),
        }),
    }
}

/// Validate a `oneOf` union: members are type names tried in listed
/// order; the first attempt producing no errors wins.
fn validate_union(
    slot: &Slot,
    members: &[Slot],
    types: Option<&Props>,
    path: &mut Vec<String>,
    errors: &mut Vec<SemanticError>,
) {
    let names: Vec<&str> = members
        .iter()
        .filter_map(|m| m.as_node())
        .filter_map(value_string)
        .collect();

    for name in &names {
        let mut trial = Vec::new();
        validate_base_type(slot, name, types, path, &mut trial);
        if trial.is_empty() {
            return;
        }
    }

    errors.push(SemanticError::WrongType {
        expected: format!("one of [{}]", names.join(", ")),
        found: describe(slot).to_string(),
        path: path.clone(),
    });
}

/// A short description of what a slot holds, for error messages.
fn describe(slot: &Slot) -> &'static str {
    match slot {
        Slot::Link(_) => "a link",
        Slot::Node(node) => match &node.value {
            Some(Value::Scalar(Scalar::Str(_))) => "a string",
            Some(Value::Scalar(Scalar::Num(_))) => "a number",
            Some(Value::Scalar(Scalar::Bool(_))) => "a boolean",
            Some(Value::Scalar(Scalar::Date(_))) => "a date",
            Some(Value::Array(_)) => "an array",
            Some(Value::Env(_)) => "an environment reference",
            None => "a node with no value",
        },
    }
}
