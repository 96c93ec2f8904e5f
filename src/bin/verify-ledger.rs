use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info};

use tender_ledger::ledger::{build_root, Block, ChainValidator, Ledger, LedgerJournal};

fn main() -> Result<()> {
    let matches = Command::new("verify-ledger")
        .version("0.1.0")
        .about("Verify the integrity of a tender ledger journal")
        .arg(
            Arg::new("journal")
                .short('j')
                .long("journal")
                .value_name("PATH")
                .help("Path to the JSONL ledger journal")
                .required(true),
        )
        .arg(
            Arg::new("difficulty")
                .short('d')
                .long("difficulty")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Require every mined block to meet this difficulty"),
        )
        .arg(
            Arg::new("entity")
                .short('e')
                .long("entity")
                .value_name("ID")
                .help("Also print the audit trail of one entity"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress output except errors"),
        )
        .get_matches();

    let journal = matches
        .get_one::<String>("journal")
        .ok_or_else(|| anyhow!("--journal is required"))?;
    let difficulty = matches.get_one::<usize>("difficulty").copied();
    let entity = matches.get_one::<String>("entity");
    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    let level = if quiet {
        tracing::Level::ERROR
    } else if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(e) = verify_journal(journal, difficulty, entity.map(String::as_str), verbose) {
        error!("Ledger verification failed: {}", e);
        std::process::exit(1);
    }

    if !quiet {
        println!("✓ Ledger verification completed successfully");
    }

    Ok(())
}

fn verify_journal(path: &str, difficulty: Option<usize>, entity: Option<&str>, verbose: bool) -> Result<()> {
    info!("Verifying ledger journal: {}", path);

    if !Path::new(path).exists() {
        return Err(anyhow!("Ledger journal not found: {}", path));
    }

    let contents = LedgerJournal::load(path)?;
    for line in &contents.unreadable_lines {
        println!("✗ journal line {}: not a readable block", line);
    }
    if contents.blocks.is_empty() {
        return Err(anyhow!("Ledger journal has no readable blocks"));
    }
    let ledger = Ledger::from_blocks(contents.blocks)?;

    if verbose {
        println!("Loaded {} blocks", ledger.len());
    }

    let validator = match difficulty {
        Some(d) => ChainValidator::with_required_difficulty(d),
        None => ChainValidator::new(),
    };
    let report = validator
        .validate_ledger(&ledger)
        .with_unreadable_journal_lines(&contents.unreadable_lines);

    for check in report.failures() {
        for fault in &check.faults {
            println!("✗ block {}: {}", check.index, fault);
        }
    }

    if let Some(entity_id) = entity {
        let verification = validator.validate_entity(&ledger, entity_id);
        println!("\nAudit trail for {}:", entity_id);
        for line in &verification.audit_trail {
            println!("  {}", line);
        }
    }

    if verbose {
        print_summary(ledger.all())?;
    }

    if !report.is_valid {
        return Err(anyhow!(report.summary()));
    }

    Ok(())
}

fn print_summary(blocks: &[Block]) -> Result<()> {
    let digests: Vec<&str> = blocks.iter().map(|b| b.digest.as_str()).collect();
    let ledger_root = build_root(&digests)?;

    let mut kinds: HashMap<&str, usize> = HashMap::new();
    for block in blocks {
        *kinds.entry(block.payload.kind().as_str()).or_insert(0) += 1;
    }

    println!("\nLedger Summary:");
    println!("  Total blocks: {}", blocks.len());
    if let (Some(first), Some(last)) = (blocks.first(), blocks.last()) {
        println!("  First block: {}", first.timestamp);
        println!("  Last block: {}", last.timestamp);
        println!("  Head digest: {}", last.digest);
    }
    println!("  Merkle root over block digests: {}", ledger_root);

    println!("\nAction distribution:");
    for (kind, count) in kinds {
        println!("  {}: {}", kind, count);
    }

    Ok(())
}
