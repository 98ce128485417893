// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # HushHire CLI
//!
//! Entry point for the `hushhire` binary. Parses CLI arguments, initializes
//! logging, wires the devnet collaborators into a negotiation session and
//! drives one offer to its result.
//!
//! - `candidates` — list the catalog
//! - `negotiate`  — select, submit, wait for propagation, decrypt
//! - `mode`       — show / set / clear the persisted demonstration preference
//! - `version`    — print build version information

mod cli;
mod logging;
mod metrics;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hushhire_protocol::client::encryption::{EncryptionClient, FheError};
use hushhire_protocol::client::{load_candidates, AccountSigner, ContractClient};
use hushhire_protocol::config::{
    NegotiationConfig, CHAIN_ID, DEMO_MODE_PREFERENCE_KEY, HUSHHIRE_CONTRACT_ADDRESS,
};
use hushhire_protocol::devnet::{DecryptBehavior, DevnetContract, DevnetFhe, DevnetLedger, DevnetSigner};
use hushhire_protocol::mode::{build_time_default, parse_flag};
use hushhire_protocol::storage::{FallbackStore, HushDB};
use hushhire_protocol::types::parse_offer_amount;
use hushhire_protocol::{
    Address, Candidate, MatchResult, ModeSelector, NegotiationWorkflow, Session, WorkflowState,
};

use cli::{Commands, GlobalArgs, HushHireCli, ModeAction, NegotiateArgs};
use logging::LogFormat;
use metrics::WorkflowMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HushHireCli::parse();
    logging::init_logging(
        &cli.global.log_level,
        LogFormat::from_str_lossy(&cli.global.log_format),
    );

    match cli.command {
        Commands::Candidates => list_candidates().await,
        Commands::Negotiate(args) => negotiate(&cli.global, args).await,
        Commands::Mode { action } => manage_mode(&cli.global, action),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn open_db(data_dir: &Path) -> Result<HushDB> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
    let db = HushDB::open(data_dir)
        .with_context(|| format!("failed to open database at {}", data_dir.display()))?;
    tracing::debug!(path = %data_dir.display(), "database opened");
    Ok(db)
}

/// Prints the seeded devnet catalog.
async fn list_candidates() -> Result<()> {
    let ledger = DevnetLedger::seeded();
    let contract = DevnetContract::connect(ledger, Address::from_bytes([0; 20]));
    let candidates = load_candidates(&contract)
        .await
        .context("failed to load candidates")?;

    println!("{:<4} {:<14} {:<22} {:<8} SKILLS", "ID", "NAME", "POSITION", "STATUS");
    for c in candidates {
        println!(
            "{:<4} {:<14} {:<22} {:<8} {}",
            c.id,
            c.name,
            c.position,
            if c.is_active { "open" } else { "closed" },
            c.skills
        );
    }
    Ok(())
}

fn decrypt_behavior(args: &NegotiateArgs) -> DecryptBehavior {
    let latency = Duration::from_millis(args.decrypt_latency_ms);
    if args.hang {
        DecryptBehavior::Hang
    } else if args.relayer_failure {
        DecryptBehavior::Fail {
            latency,
            error: FheError::Relayer("devnet relayer unavailable".into()),
        }
    } else {
        DecryptBehavior::Respond { latency }
    }
}

fn account_signer(ledger: &Arc<DevnetLedger>, secret: Option<&str>) -> Result<DevnetSigner> {
    let Some(raw) = secret else {
        return Ok(DevnetSigner::generate(ledger));
    };
    let bytes = hex::decode(raw.trim().trim_start_matches("0x"))
        .context("account secret is not valid hex")?;
    let secret: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow!("account secret must be 32 bytes"))?;
    Ok(DevnetSigner::from_secret(ledger, &secret))
}

/// Runs one negotiation end to end against the devnet.
async fn negotiate(global: &GlobalArgs, args: NegotiateArgs) -> Result<()> {
    let amount = parse_offer_amount(&args.amount)?;
    let db = Arc::new(open_db(&global.data_dir)?);

    let persisted = db.demo_mode_preference()?;
    let mode = ModeSelector::with_build_default()
        .request_override(args.demo.as_deref())
        .persisted_preference(persisted.as_deref())
        .evaluate();

    let ledger = DevnetLedger::seeded();
    let fhe = Arc::new(DevnetFhe::new(Arc::clone(&ledger)).with_behavior(decrypt_behavior(&args)));
    let signer = Arc::new(account_signer(&ledger, args.account_secret.as_deref())?);
    signer.set_reject(args.reject_signature);
    let account = signer.address().clone();
    let contract = Arc::new(DevnetContract::connect(Arc::clone(&ledger), account.clone()));

    let session = Arc::new(Session::new(
        account.clone(),
        mode,
        fhe as Arc<dyn EncryptionClient>,
    ));
    session
        .initialize()
        .await
        .context("failed to initialize the FHE SDK")?;

    let candidate = find_candidate(contract.as_ref(), args.candidate).await?;
    let metrics = WorkflowMetrics::new().context("failed to create metrics registry")?;

    let workflow = NegotiationWorkflow::new(
        session,
        contract as Arc<dyn ContractClient>,
        signer as Arc<dyn AccountSigner>,
        db as Arc<dyn FallbackStore>,
        NegotiationConfig::default(),
    );

    println!("Account   : {}", account);
    println!("Mode      : {}", mode);
    println!("Candidate : {} ({})", candidate.name, candidate.position);

    workflow.select_candidate(candidate);
    let outcome = run_offer(&workflow, amount, &metrics).await;

    if args.metrics {
        print!("{}", metrics.encode()?);
    }
    let result = outcome?;
    println!(
        "Result    : {}",
        match result {
            MatchResult::Meets => "offer meets the candidate's expectation",
            MatchResult::Below => "offer is below the candidate's expectation",
        }
    );
    Ok(())
}

async fn find_candidate(contract: &dyn ContractClient, id: u64) -> Result<Candidate> {
    let candidates = load_candidates(contract)
        .await
        .context("failed to load candidates")?;
    candidates
        .into_iter()
        .find(|c| c.id == id)
        .ok_or_else(|| anyhow!("no candidate with id {}", id))
}

async fn run_offer(
    workflow: &NegotiationWorkflow,
    amount: u32,
    metrics: &WorkflowMetrics,
) -> Result<MatchResult> {
    let receipt = match workflow.submit(u64::from(amount)).await {
        Ok(receipt) => receipt,
        Err(e) => {
            metrics.record_failure(&e);
            return Err(e).context("offer submission failed");
        }
    };
    metrics.offers_submitted_total.inc();
    println!("Offer     : mined in block {} ({})", receipt.block_number, receipt.tx_hash);

    let mut states = workflow.subscribe();
    loop {
        let state = states.borrow_and_update().clone();
        match state {
            WorkflowState::AwaitingPropagation { remaining } => {
                println!("            permissions propagating, {}s left", remaining);
            }
            WorkflowState::ReadyToDecrypt => break,
            WorkflowState::Failed(e) => return Err(e.into()),
            _ => {}
        }
        states
            .changed()
            .await
            .context("workflow stopped before permissions propagated")?;
    }

    println!("            decrypting...");
    let started = Instant::now();
    let decrypted = workflow.decrypt().await;
    metrics.observe_decryption(&decrypted, &workflow.state(), started.elapsed());

    if let Some(attempt) = workflow.last_attempt() {
        metrics.record_attempt(&attempt);
    }
    decrypted.map_err(|e| {
        metrics.record_failure(&e);
        anyhow::Error::new(e).context("decryption failed")
    })
}

fn manage_mode(global: &GlobalArgs, action: ModeAction) -> Result<()> {
    let db = open_db(&global.data_dir)?;
    match action {
        ModeAction::Show => {
            let persisted = db.demo_mode_preference()?;
            let mode = ModeSelector::with_build_default()
                .persisted_preference(persisted.as_deref())
                .evaluate();
            println!("mode                : {}", mode);
            println!(
                "persisted preference: {}",
                persisted.as_deref().unwrap_or("unset")
            );
            println!(
                "build-time default  : {}",
                build_time_default().map_or("unset".to_string(), |b| b.to_string())
            );
        }
        ModeAction::Set { value } => {
            let Some(flag) = parse_flag(&value) else {
                bail!("not a flag: {:?} (use true/false, on/off, yes/no or 1/0)", value);
            };
            db.set_preference(DEMO_MODE_PREFERENCE_KEY, &flag.to_string())?;
            println!("demonstration mode preference set to {}", flag);
        }
        ModeAction::Clear => {
            db.clear_preference(DEMO_MODE_PREFERENCE_KEY)?;
            println!("demonstration mode preference cleared");
        }
    }
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("hushhire {}", env!("CARGO_PKG_VERSION"));
    println!("chain id  {}", CHAIN_ID);
    println!("contract  {}", HUSHHIRE_CONTRACT_ADDRESS);
}
