//! `modules` command implementation.

use anyhow::{Context, Result};
use module_registry::ModuleDescription;

use crate::cli::ModulesArgs;
use crate::pipeline::builtin_registry;

/// Execute the `modules` command
pub fn run_modules(args: &ModulesArgs) -> Result<()> {
    let registry = builtin_registry();
    let modules = registry.describe_all(args.group.map(Into::into));

    if args.json {
        let json =
            serde_json::to_string_pretty(&modules).context("Failed to serialize module list")?;
        println!("{}", json);
    } else {
        print_modules(&modules);
    }
    Ok(())
}

fn print_modules(modules: &[ModuleDescription]) {
    println!("{:<8} {:<9} {:<8} PARAMETERS", "GROUP", "STAGE", "NAME");
    for module in modules {
        let fields = module
            .fields
            .iter()
            .map(|field| format!("{}:{}", field.name, field.kind))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:<8} {:<9} {:<8} {}",
            module.key.group, module.key.stage, module.key.name, fields
        );
    }
}
