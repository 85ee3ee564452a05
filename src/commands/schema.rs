//! `schema` command: describe kinds and their attributes

use anyhow::Result;
use colored::Colorize;
use declarative::schema::{AttributeSpec, Rule};
use declarative::{Mutability, ResourceDescriptor};
use serde_json::{Value as Json, json};

use crate::Context;
use crate::cli::OutputFormat;
use crate::resource;
use crate::ui;

pub fn run(_ctx: &Context, kind: Option<&str>, format: OutputFormat) -> Result<()> {
    let registry = resource::registry()?;
    let descriptors = match kind {
        Some(kind) => vec![registry.descriptor(kind)?],
        None => registry
            .kinds()
            .map(|k| registry.descriptor(k))
            .collect::<declarative::Result<Vec<_>>>()?,
    };

    match format {
        OutputFormat::Json => {
            let documents: Vec<_> = descriptors.iter().map(|d| describe(d)).collect();
            println!("{}", serde_json::to_string_pretty(&documents)?);
        }
        OutputFormat::Text => {
            for descriptor in descriptors {
                ui::header(descriptor.kind());
                ui::dim(descriptor.description());
                for spec in descriptor.attributes() {
                    print_attribute(spec, 1);
                }
            }
        }
    }
    Ok(())
}

fn print_attribute(spec: &AttributeSpec, depth: usize) {
    let flags = flags(spec);
    println!(
        "{}{} {} {}",
        "  ".repeat(depth),
        spec.name.bold(),
        format!("({})", spec.attr_type.name()).cyan(),
        flags.join(", ").dimmed()
    );
    if !spec.description.is_empty() {
        println!("{}  {}", "  ".repeat(depth), spec.description.dimmed());
    }
    for nested in spec.attr_type.nested().unwrap_or_default() {
        print_attribute(nested, depth + 1);
    }
}

fn mutability(spec: &AttributeSpec) -> String {
    match &spec.mutability {
        Mutability::Required => "required".to_string(),
        Mutability::Optional { default } => format!("optional, default {}", default),
        Mutability::Computed => "computed".to_string(),
        Mutability::ComputedOnce => "computed once".to_string(),
    }
}

fn flags(spec: &AttributeSpec) -> Vec<String> {
    let mut flags = vec![mutability(spec)];
    if spec.sensitive {
        flags.push("sensitive".to_string());
    }
    if spec.updatable {
        flags.push("updatable".to_string());
    }
    if spec.replace {
        flags.push("forces replacement".to_string());
    }
    if spec.local {
        flags.push("not returned by the API".to_string());
    }
    flags
}

/// JSON description of a kind
pub fn describe(descriptor: &ResourceDescriptor) -> Json {
    json!({
        "kind": descriptor.kind(),
        "description": descriptor.description(),
        "identity": descriptor.identity(),
        "attributes": descriptor.attributes().iter().map(describe_attribute).collect::<Vec<_>>(),
    })
}

fn describe_attribute(spec: &AttributeSpec) -> Json {
    let rules: Vec<_> = spec
        .rules
        .iter()
        .map(|rule| match rule {
            Rule::MinLength(n) => json!({"min_length": n}),
            Rule::MaxLength(n) => json!({"max_length": n}),
            Rule::Pattern(p) => json!({"pattern": p.source}),
        })
        .collect();

    let mut doc = json!({
        "name": spec.name,
        "type": spec.attr_type.name(),
        "mutability": mutability(spec),
        "description": spec.description,
        "sensitive": spec.sensitive,
        "updatable": spec.updatable,
        "requires_replace": spec.replace,
        "rules": rules,
    });
    if let Some(nested) = spec.attr_type.nested() {
        doc["attributes"] = Json::Array(nested.iter().map(describe_attribute).collect());
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_project() {
        let registry = resource::registry().unwrap();
        let doc = describe(registry.descriptor("project").unwrap());

        assert_eq!(doc["kind"], "project");
        assert_eq!(doc["identity"], "id");
        let region = doc["attributes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["name"] == "region")
            .unwrap();
        assert_eq!(region["requires_replace"], true);
        assert_eq!(region["mutability"], "required");
    }

    #[test]
    fn test_describe_nested_and_rules() {
        let registry = resource::registry().unwrap();
        let doc = describe(registry.descriptor("cluster").unwrap());
        let attributes = doc["attributes"].as_array().unwrap();

        let password = attributes.iter().find(|a| a["name"] == "password").unwrap();
        assert_eq!(password["sensitive"], true);
        assert_eq!(password["rules"][0]["min_length"], 24);

        let specs = attributes
            .iter()
            .find(|a| a["name"] == "hardware_specs")
            .unwrap();
        assert_eq!(specs["attributes"].as_array().map(Vec::len), Some(6));

        let channel = attributes.iter().find(|a| a["name"] == "channel").unwrap();
        assert_eq!(channel["mutability"], "optional, default \"stable\"");
    }
}
