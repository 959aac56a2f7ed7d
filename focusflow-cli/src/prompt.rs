use anyhow::Result;
use std::io::{self, Write};

use focusflow_core::{BreakdownProposal, ContextSwitchDecision, EnvironmentChecklist, SwitchResolution};

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

fn prompt_multiline(label: &str) -> Result<Vec<String>> {
    println!("{} (one per line; blank line to finish)", label);
    let mut out = Vec::new();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut s = String::new();
        io::stdin().read_line(&mut s)?;
        let s = s.trim().to_string();
        if s.is_empty() {
            break;
        }
        out.push(s);
    }
    Ok(out)
}

pub fn parse_yes(answer: &str, default: bool) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

/// `p`roceed, `b`atch later or `c`ancel.
pub fn parse_resolution(choice: &str, note: Option<String>) -> Option<SwitchResolution> {
    match choice.trim().to_ascii_lowercase().as_str() {
        "p" | "proceed" => Some(SwitchResolution::Proceed {
            note: note.filter(|n| !n.trim().is_empty()),
        }),
        "b" | "batch" | "later" => Some(SwitchResolution::Defer),
        "c" | "cancel" => Some(SwitchResolution::Cancel),
        _ => None,
    }
}

pub fn ask_apply_breakdown(proposal: &BreakdownProposal) -> Result<bool> {
    println!("\nSuggested subtasks ({}):", proposal.complexity);
    for (i, s) in proposal.subtasks.iter().enumerate() {
        match s.estimated_minutes {
            Some(m) => println!("  {}. {} ({} min)", i + 1, s.title, m),
            None => println!("  {}. {}", i + 1, s.title),
        }
    }
    if proposal.is_empty() {
        println!("  (none)");
    }
    Ok(parse_yes(&prompt("Replace your subtasks with these? [y/N]")?, false))
}

/// `None` when the user skips the check.
pub fn ask_checklist() -> Result<Option<EnvironmentChecklist>> {
    println!("\nEnvironment check");
    if !parse_yes(&prompt("Run the checklist? [Y/n]")?, true) {
        return Ok(None);
    }

    let mut checklist = EnvironmentChecklist {
        quiet_space: parse_yes(&prompt("Quiet space? [y/N]")?, false),
        phone_silent: parse_yes(&prompt("Phone silent? [y/N]")?, false),
        materials_ready: parse_yes(&prompt("Materials ready? [y/N]")?, false),
        water_coffee_ready: parse_yes(&prompt("Water/coffee ready? [y/N]")?, false),
        comfortable_position: parse_yes(&prompt("Comfortable position? [y/N]")?, false),
        notifications_off: parse_yes(&prompt("Notifications off? [y/N]")?, false),
        ..EnvironmentChecklist::default()
    };
    checklist.apps_closed = prompt_multiline("Apps you closed")?;
    let notes = prompt("Notes (optional)")?;
    checklist.notes = (!notes.is_empty()).then_some(notes);

    if checklist.all_passed() {
        println!("All set.");
    } else {
        println!("{} item(s) left unchecked.", checklist.remaining());
    }
    Ok(Some(checklist))
}

pub fn ask_switch(decision: &ContextSwitchDecision) -> Result<SwitchResolution> {
    println!();
    if let Some(msg) = decision.warning_message.as_deref() {
        println!("{}", msg.trim_end());
    }
    println!("Estimated cost: ~{} min", decision.switch.estimated_cost_minutes);
    loop {
        let choice = prompt("[p]roceed, [b]atch with similar tasks later, [c]ancel")?;
        let proceeding = matches!(choice.trim().to_ascii_lowercase().as_str(), "p" | "proceed");
        let note = if proceeding {
            Some(prompt("Note (optional)")?)
        } else {
            None
        };
        if let Some(resolution) = parse_resolution(&choice, note) {
            return Ok(resolution);
        }
        println!("Please answer p, b or c.");
    }
}
