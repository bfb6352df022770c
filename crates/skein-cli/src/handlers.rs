use std::path::Path;

use anyhow::{Context, Result};
use is_terminal::IsTerminal;

use skein_protocol::parse_raw_line;
use skein_runtime::Runtime;

use crate::views::TreeView;

/// Feed a captured raw-stream JSONL file through a turn pipeline into the
/// store, then print a replay summary.
pub fn replay(runtime: &Runtime, file: &Path, turn_id: &str, user: Option<&str>) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read capture file: {}", file.display()))?;

    let mut turn = runtime.begin_turn(turn_id, user);

    let mut items = 0usize;
    let mut malformed = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_raw_line(line) {
            Some(item) => {
                items += 1;
                turn.push(item);
            }
            None => malformed += 1,
        }
    }

    // Captures cut off before the terminal result still close cleanly.
    let reached_terminal = turn.is_closed();
    if !reached_terminal {
        turn.close();
    }

    let records = runtime.store().list_records(turn_id)?;

    println!("Replayed {} item(s) into turn {}", items, turn_id);
    if malformed > 0 {
        println!("  malformed lines skipped: {}", malformed);
    }
    println!("  records persisted: {}", records.len());
    match turn.session_id() {
        Some(session_id) => println!("  session id: {}", session_id),
        None => println!("  session id: (never observed)"),
    }
    if !reached_terminal {
        println!("  note: capture ended before a terminal result");
    }

    let report = turn.anomalies();
    if report.is_empty() {
        println!("  anomalies: none");
    } else {
        println!("  anomalies:");
        let mut counts: Vec<_> = report.counts().collect();
        counts.sort_by_key(|(kind, _)| kind.as_str());
        for (kind, count) in counts {
            println!("    {}: {}", kind, count);
        }
    }

    Ok(())
}

/// Print the reconstructed conversation tree for a turn.
pub fn tree(runtime: &Runtime, turn_id: &str) -> Result<()> {
    let tree = runtime.conversation_tree(turn_id)?;

    if tree.is_empty() {
        println!("No records for turn {}", turn_id);
        return Ok(());
    }

    let view = TreeView {
        tree: &tree,
        enable_color: std::io::stdout().is_terminal(),
    };
    print!("{}", view);

    Ok(())
}
