use colored::Colorize;
use reconcile::{Action, ChangeResult, ConfirmCallback};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Plan symbol for an action
pub fn action_symbol(action: &Action) -> String {
    match action {
        Action::NoOp => "○".dimmed().to_string(),
        Action::Create => "+".green().to_string(),
        Action::Update { .. } => "~".yellow().to_string(),
        Action::Replace { .. } => format!("{}{}", "-/".red(), "+".green()),
        Action::Delete => "-".red().to_string(),
    }
}

/// Result symbol for an applied change
pub fn result_symbol(result: &ChangeResult) -> String {
    match result {
        ChangeResult::NoChange => "○".dimmed().to_string(),
        ChangeResult::Created
        | ChangeResult::Updated
        | ChangeResult::Replaced
        | ChangeResult::Deleted => "✓".green().to_string(),
        ChangeResult::Failed { .. } => "✗".red().to_string(),
        ChangeResult::Skipped { .. } => "⊘".yellow().to_string(),
    }
}

/// Past-tense description of a result
pub fn result_label(result: &ChangeResult) -> String {
    match result {
        ChangeResult::NoChange => "unchanged".to_string(),
        ChangeResult::Created => "created".to_string(),
        ChangeResult::Updated => "updated".to_string(),
        ChangeResult::Replaced => "replaced".to_string(),
        ChangeResult::Deleted => "deleted".to_string(),
        ChangeResult::Failed { error, .. } => format!("failed: {error}"),
        ChangeResult::Skipped { reason } => format!("skipped ({reason})"),
    }
}

/// Interactive confirmation, or automatic approval with `--yes`
pub struct Confirm {
    pub assume_yes: bool,
}

impl ConfirmCallback for Confirm {
    fn confirm(&mut self, prompt: &str) -> reconcile::Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        println!();
        match dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
        {
            Ok(confirmed) => Ok(confirmed),
            Err(e) => {
                log::warn!("cannot prompt for confirmation ({e}); use --yes to apply");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_label() {
        assert_eq!(result_label(&ChangeResult::Created), "created");
        assert_eq!(
            result_label(&ChangeResult::Failed {
                error: "HTTP 500".to_string(),
                category: reconcile::ErrorCategory::Remote,
            }),
            "failed: HTTP 500"
        );
        assert_eq!(
            result_label(&ChangeResult::Skipped {
                reason: "dry run".to_string()
            }),
            "skipped (dry run)"
        );
    }

    #[test]
    fn test_symbols_are_distinct() {
        colored::control::set_override(false);
        assert_eq!(action_symbol(&Action::Create), "+");
        assert_eq!(action_symbol(&Action::Delete), "-");
        assert_eq!(
            action_symbol(&Action::Replace {
                attributes: vec!["parent_id"]
            }),
            "-/+"
        );
        assert_eq!(result_symbol(&ChangeResult::Deleted), "✓");
    }

    #[test]
    fn test_assume_yes_confirms() {
        let mut confirm = Confirm { assume_yes: true };
        assert!(confirm.confirm("Apply?").unwrap());
    }
}
