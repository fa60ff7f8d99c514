//! List command: print the registered handlers.

use anyhow::Result;

use e2c_handlers::{HandlerSpec, builtin_registry};

use crate::cli::ListArgs;

/// Print one line per registered handler.
pub fn run(args: ListArgs) -> Result<()> {
    let registry = builtin_registry();
    for spec in registry
        .specs()
        .filter(|s| args.table.as_deref().is_none_or(|t| s.table() == t))
    {
        println!("{}", describe(spec));
    }
    Ok(())
}

fn describe(spec: &HandlerSpec) -> String {
    let mut line = format!(
        "{:<8} {:<16} {:<12} <- {}",
        spec.name(),
        spec.table(),
        spec.units(),
        spec.raw_variables().join(" + ")
    );
    line.push_str(&format!(" [{}]", spec.derivation().kind()));
    if let Some(positive) = spec.positive() {
        line.push_str(&format!(" positive={positive}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_multi_input_handler() {
        let registry = builtin_registry();
        let line = describe(registry.get("pr").unwrap());
        assert!(line.starts_with("pr "));
        assert!(line.contains("PRECC + PRECL"));
        assert!(line.contains("[linear-sum]"));
    }

    #[test]
    fn describes_sign_convention() {
        let registry = builtin_registry();
        let line = describe(registry.get("tauv").unwrap());
        assert!(line.ends_with("positive=down"));
    }
}
