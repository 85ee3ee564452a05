//! Plan display

use colored::Colorize;
use declarative::{Action, AttributeChange, DiffSummary, InstanceDiff, Value, group_by_kind};

use super::planner::Plan;

const SENSITIVE: &str = "(sensitive value)";

/// Render one attribute change, masking sensitive values
pub fn describe_change(action: Action, change: &AttributeChange) -> String {
    let show = |value: &Value| {
        if change.sensitive && value.is_present() {
            SENSITIVE.to_string()
        } else {
            value.to_string()
        }
    };

    match action {
        Action::Create => format!("{} = {}", change.name, show(&change.to)),
        _ if change.sensitive && change.from.is_present() && change.to.is_present() => {
            format!("{} = {} (changed)", change.name, SENSITIVE)
        }
        _ => format!("{}: {} → {}", change.name, show(&change.from), show(&change.to)),
    }
}

/// Lines describing one instance diff, without colors
pub fn describe_diff(diff: &InstanceDiff) -> Vec<String> {
    let mut lines = Vec::new();
    if diff.action == Action::Delete {
        return lines;
    }

    for change in &diff.changes {
        let mut line = describe_change(diff.action, change);
        if diff.replace_reasons.contains(&change.name) {
            line.push_str(" (forces replacement)");
        } else if !change.applied {
            line.push_str(" (ignored, cannot be changed in place)");
        }
        lines.push(line);
    }

    for name in &diff.unknowns {
        if diff.changes.iter().all(|c| &c.name != name) {
            lines.push(format!("{} = {}", name, Value::Unknown));
        }
    }

    lines
}

/// Display the plan in a box, grouped by kind
pub fn display_plan(plan: &Plan) {
    for address in &plan.gone {
        println!(
            "  {} {} was deleted outside of this tool",
            "⚠".yellow(),
            address.bold()
        );
    }

    let changed: Vec<_> = plan
        .diffs
        .iter()
        .filter(|d| d.has_changes() || !d.ignored.is_empty())
        .cloned()
        .collect();

    if changed.is_empty() {
        println!();
        println!("  {} No changes. Infrastructure matches the configuration.", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for (kind, diffs) in group_by_kind(&changed) {
        println!("│ {}", kind.bold());
        for diff in diffs {
            let symbol = match diff.action {
                Action::Create => "+".green(),
                Action::Update => "~".yellow(),
                Action::Replace => "-/+".magenta(),
                Action::Delete => "-".red(),
                Action::NoOp => "!".dimmed(),
            };
            let note = match diff.action {
                Action::Create => "(will be created)".to_string(),
                Action::Update => "(will be updated in place)".to_string(),
                Action::Replace => format!(
                    "(must be replaced, {} changed)",
                    diff.replace_reasons.join(", ")
                ),
                Action::Delete => "(will be destroyed)".to_string(),
                Action::NoOp => "(changes ignored)".to_string(),
            };
            println!("│   {} {:<30} {}", symbol, diff.address, note.dimmed());
            for line in describe_diff(diff) {
                println!("│       {}", line.dimmed());
            }
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(&plan.diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to update, {} to replace, {} to destroy",
        summary.creations.to_string().green(),
        summary.updates.to_string().yellow(),
        summary.replacements.to_string().magenta(),
        summary.deletions.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::Record;

    fn change(name: &str, from: Value, to: Value, sensitive: bool) -> AttributeChange {
        AttributeChange {
            name: name.to_string(),
            from,
            to,
            sensitive,
            applied: true,
        }
    }

    fn diff(action: Action, changes: Vec<AttributeChange>) -> InstanceDiff {
        InstanceDiff {
            address: "cluster.analytics".to_string(),
            kind: "cluster".to_string(),
            action,
            changes,
            unknowns: Vec::new(),
            replace_reasons: Vec::new(),
            ignored: Vec::new(),
            desired: Some(Record::new()),
            prior: None,
        }
    }

    #[test]
    fn test_sensitive_values_masked() {
        let created = change("password", Value::Null, Value::string("hunter2"), true);
        assert_eq!(
            describe_change(Action::Create, &created),
            "password = (sensitive value)"
        );

        let updated = change(
            "password",
            Value::string("old"),
            Value::string("new"),
            true,
        );
        let line = describe_change(Action::Update, &updated);
        assert!(!line.contains("old") && !line.contains("new"));
    }

    #[test]
    fn test_plain_update() {
        let renamed = change("name", Value::string("a"), Value::string("b"), false);
        assert_eq!(describe_change(Action::Update, &renamed), "name: \"a\" → \"b\"");
    }

    #[test]
    fn test_unknowns_listed_once() {
        let mut create = diff(
            Action::Create,
            vec![change("name", Value::Null, Value::string("x"), false)],
        );
        create.unknowns = vec!["id".to_string(), "url".to_string()];

        let lines = describe_diff(&create);
        assert_eq!(
            lines,
            vec![
                "name = \"x\"".to_string(),
                "id = (known after apply)".to_string(),
                "url = (known after apply)".to_string(),
            ]
        );
    }

    #[test]
    fn test_replacement_and_ignored_marked() {
        let mut replace = diff(
            Action::Replace,
            vec![change("region", Value::string("a"), Value::string("b"), false)],
        );
        replace.replace_reasons = vec!["region".to_string()];
        assert!(describe_diff(&replace)[0].ends_with("(forces replacement)"));

        let mut ignored = change("organization_id", Value::Null, Value::string("o"), false);
        ignored.applied = false;
        let noop = diff(Action::NoOp, vec![ignored]);
        assert!(describe_diff(&noop)[0].contains("ignored"));
    }

    #[test]
    fn test_delete_has_no_attribute_lines() {
        assert!(describe_diff(&diff(Action::Delete, Vec::new())).is_empty());
    }
}
