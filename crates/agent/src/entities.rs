//! Entity builders: turn action payloads into the model elements stored
//! in a workspace, plus their PURE source text.

use guardian_core::Entity;
use guardian_core::action::{ConstraintSpec, FieldSpec};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

pub const CLASS_CLASSIFIER: &str = "meta::pure::metamodel::type::Class";
pub const MAPPING_CLASSIFIER: &str = "meta::pure::mapping::Mapping";
pub const SERVICE_CLASSIFIER: &str = "meta::legend::service::Service";

/// Property names from the header row of a CSV sample.
pub fn csv_headers(csv: &str) -> Vec<String> {
    csv.lines()
        .find(|line| !line.trim().is_empty())
        .map(|header| {
            header
                .split(',')
                .map(|h| h.trim().trim_matches('"').to_string())
                .filter(|h| !h.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// A class in package `model` with one required `String` property per
/// CSV header.
pub fn class_entity(name: &str, csv: Option<&str>) -> Entity {
    let properties: Vec<Value> = csv
        .map(csv_headers)
        .unwrap_or_default()
        .into_iter()
        .map(|prop| {
            json!({
                "name": prop,
                "type": "String",
                "multiplicity": {"lowerBound": 1, "upperBound": 1},
            })
        })
        .collect();

    Entity {
        path: format!("model::{name}"),
        classifier_path: CLASS_CLASSIFIER.into(),
        content: json!({
            "name": name,
            "package": "model",
            "properties": properties,
        }),
    }
}

pub fn mapping_entity(name: &str, model: Option<&str>) -> Entity {
    let mut content = json!({
        "name": name,
        "package": "mapping",
        "classMappings": [],
    });
    if let Some(model) = model {
        content["model"] = json!(format!("model::{model}"));
    }
    Entity {
        path: format!("mapping::{name}"),
        classifier_path: MAPPING_CLASSIFIER.into(),
        content,
    }
}

/// A service exposed at `/api/service/{path}`.
pub fn service_entity(path: &str, query: Option<&str>) -> Entity {
    let mut execution = json!({});
    if let Some(query) = query {
        execution["query"] = json!(query);
    }
    Entity {
        path: format!("service::{}", path.replace('/', "::")),
        classifier_path: SERVICE_CLASSIFIER.into(),
        content: json!({
            "pattern": format!("/api/service/{path}"),
            "documentation": "Generated service",
            "execution": execution,
        }),
    }
}

/// PURE source for a class built from CSV headers.
pub fn class_pure(name: &str, csv: Option<&str>) -> String {
    let props: Vec<String> = csv
        .map(csv_headers)
        .unwrap_or_default()
        .iter()
        .map(|p| format!("  {p}: String[1];"))
        .collect();
    format!("Class model::{name}\n{{\n{}\n}}", props.join("\n"))
}

// ── Editing existing classes ──────────────────────────────────────────────

/// Body for a well-known constraint name.
fn known_constraint(name: &str) -> Option<&'static str> {
    match name {
        "qtyPositive" => Some("$this.quantity > 0"),
        "validTicker" => Some("$this.ticker->isNotEmpty()"),
        "notNull" => Some("$this->isNotEmpty()"),
        _ => None,
    }
}

/// The stored form of a constraint, or `Err(name)` for an unknown name
/// given without a body.
pub fn constraint_definition(spec: &ConstraintSpec) -> Result<Value, String> {
    let (name, body) = match spec {
        ConstraintSpec::Named(name) => {
            let body = known_constraint(name).ok_or_else(|| name.clone())?;
            (name.as_str(), body)
        }
        ConstraintSpec::Defined { name, body } => (name.as_str(), body.as_str()),
    };
    Ok(json!({
        "name": name,
        "functionDefinition": {"body": body},
    }))
}

/// Remove and return the array at `content[key]`; anything else reads as empty.
fn take_array(content: &mut Value, key: &str) -> Vec<Value> {
    match content.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn put_array(content: &mut Value, key: &str, items: Vec<Value>) {
    if !content.is_object() {
        *content = Value::Object(Map::new());
    }
    content[key] = Value::Array(items);
}

fn named<'a>(items: &'a [Value], name: &str) -> Option<&'a Value> {
    items.iter().find(|item| item.get("name").and_then(Value::as_str) == Some(name))
}

/// Rename class properties. Returns the number renamed; names with no
/// matching property are ignored.
pub fn rename_properties(entity: &mut Entity, renames: &BTreeMap<String, String>) -> usize {
    let mut properties = take_array(&mut entity.content, "properties");
    let mut renamed = 0;
    for prop in properties.iter_mut() {
        let Some(new_name) = prop
            .get("name")
            .and_then(Value::as_str)
            .and_then(|name| renames.get(name))
            .cloned()
        else {
            continue;
        };
        prop["name"] = Value::String(new_name);
        renamed += 1;
    }
    put_array(&mut entity.content, "properties", properties);
    renamed
}

/// Append optional properties. Fields whose name is already taken are
/// skipped. Returns the names added.
pub fn append_properties(entity: &mut Entity, fields: &[FieldSpec]) -> Vec<String> {
    let mut properties = take_array(&mut entity.content, "properties");
    let mut added = Vec::new();
    for field in fields {
        if named(&properties, &field.name).is_some() {
            continue;
        }
        properties.push(json!({
            "name": field.name,
            "type": field.type_name,
            "multiplicity": {"lowerBound": 0, "upperBound": 1},
        }));
        added.push(field.name.clone());
    }
    put_array(&mut entity.content, "properties", properties);
    added
}

/// Append constraint definitions, skipping names the class already has.
/// Returns the names added.
pub fn append_constraints(entity: &mut Entity, definitions: Vec<Value>) -> Vec<String> {
    let mut constraints = take_array(&mut entity.content, "constraints");
    let mut added = Vec::new();
    for definition in definitions {
        let Some(name) = definition.get("name").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        if named(&constraints, &name).is_some() {
            continue;
        }
        constraints.push(definition);
        added.push(name);
    }
    put_array(&mut entity.content, "constraints", constraints);
    added
}
