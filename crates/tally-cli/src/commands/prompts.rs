//! Prompt library inspection commands

use std::collections::BTreeSet;

use anyhow::Result;
use tally_core::prompts::{default_prompts_dir, Prompt, PromptId, PromptLibrary};

/// `{{name}}` placeholders a prompt expects, sorted
fn placeholders(prompt: &Prompt) -> Vec<String> {
    let mut names = BTreeSet::new();
    let mut rest = prompt.content.as_str();
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        names.insert(after[..end].trim().to_string());
        rest = &after[end + 2..];
    }
    names.into_iter().collect()
}

fn source_label(prompt: &Prompt) -> &'static str {
    if prompt.is_override() {
        "override"
    } else {
        "embedded"
    }
}

/// List the copy-collaborator prompts with their version, source and variables
pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();

    println!("{:<26} {:>7}  {:<9} VARIABLES", "PROMPT", "VERSION", "SOURCE");
    println!("{}", "-".repeat(78));

    for &id in PromptId::all() {
        let prompt = library.get(id)?;
        println!(
            "{:<26} {:>7}  {:<9} {}",
            id.as_str(),
            prompt.metadata.version,
            source_label(prompt),
            placeholders(prompt).join(", ")
        );
    }

    match default_prompts_dir() {
        Some(dir) => println!("\nOverrides are read from {}", dir.display()),
        None => println!("\nNo data directory on this platform; only embedded prompts are used"),
    }

    Ok(())
}

/// Print one prompt's system and user sections
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let id: PromptId = match prompt_id.parse() {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{}", e);
            let known: Vec<&str> = PromptId::all().iter().map(|id| id.as_str()).collect();
            eprintln!("Known prompts: {}", known.join(", "));
            return Ok(());
        }
    };

    let mut library = PromptLibrary::new();
    let prompt = library.get(id)?;

    println!("📝 {} v{} ({})", prompt.metadata.id, prompt.metadata.version, source_label(prompt));
    if let Some(path) = &prompt.override_path {
        println!("   {}", path.display());
    }

    for (header, section) in [("System", prompt.system_section()), ("User", prompt.user_section())] {
        println!();
        println!("── {} ──", header);
        println!("{}", section.unwrap_or("(missing)"));
    }

    Ok(())
}

/// Print the override directory for prompt files
pub fn cmd_prompts_path() -> Result<()> {
    let Some(dir) = default_prompts_dir() else {
        eprintln!("Could not determine the data directory; only embedded prompts are used");
        return Ok(());
    };

    println!("{}", dir.display());
    if !dir.exists() {
        eprintln!("(does not exist yet; create it and add <prompt_id>.md files to override the defaults)");
    }

    Ok(())
}
