//! # CLI Interface
//!
//! Defines the command-line argument structure for `hushhire` using
//! `clap` derive. Subcommands: `candidates`, `negotiate`, `mode` and
//! `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// HushHire encrypted offer negotiation.
///
/// Submits an encrypted salary offer against a candidate's encrypted
/// expectation and reveals only whether the offer meets it. Runs against
/// an in-process devnet.
#[derive(Parser, Debug)]
#[command(
    name = "hushhire",
    about = "Encrypted salary-offer negotiation",
    version,
    propagate_version = true
)]
pub struct HushHireCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Directory of the persistent store (fallback records, preferences).
    #[arg(
        long,
        short = 'd',
        global = true,
        env = "HUSHHIRE_DATA_DIR",
        default_value = ".hushhire"
    )]
    pub data_dir: PathBuf,

    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "HUSHHIRE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "hushhire=info,hushhire_protocol=info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the candidates registered on the contract.
    Candidates,
    /// Submit an offer to one candidate and reveal the result.
    Negotiate(NegotiateArgs),
    /// Show or change the persisted demonstration-mode preference.
    Mode {
        #[command(subcommand)]
        action: ModeAction,
    },
    /// Print version information and exit.
    Version,
}

/// Arguments for the `negotiate` subcommand.
#[derive(Args, Debug)]
pub struct NegotiateArgs {
    /// Candidate id, as listed by `candidates`.
    #[arg(long, short = 'c')]
    pub candidate: u64,

    /// Offer amount. A positive integer that fits in 32 bits.
    #[arg(long, short = 'a')]
    pub amount: String,

    /// Per-request demonstration-mode override (`true`/`false`, `on`/`off`...).
    /// Takes priority over the persisted preference.
    #[arg(long)]
    pub demo: Option<String>,

    /// Hex-encoded 32-byte account secret. A fresh account is generated
    /// when omitted.
    #[arg(long, env = "HUSHHIRE_ACCOUNT_SECRET")]
    pub account_secret: Option<String>,

    /// Latency of the devnet decryption service, in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub decrypt_latency_ms: u64,

    /// Make the devnet decryption service never answer.
    #[arg(long, conflicts_with = "relayer_failure")]
    pub hang: bool,

    /// Make the devnet decryption service fail with a relayer error.
    #[arg(long)]
    pub relayer_failure: bool,

    /// Decline the decryption signature request.
    #[arg(long)]
    pub reject_signature: bool,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Subcommand, Debug)]
pub enum ModeAction {
    /// Print the mode a session would run in and where it came from.
    Show,
    /// Persist the demonstration-mode preference.
    Set {
        /// `true`/`false`, `1`/`0`, `yes`/`no` or `on`/`off`.
        value: String,
    },
    /// Remove the persisted preference.
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        HushHireCli::command().debug_assert();
    }

    #[test]
    fn negotiate_flags_parse() {
        let cli = HushHireCli::parse_from([
            "hushhire",
            "negotiate",
            "--candidate",
            "0",
            "--amount",
            "8500",
            "--demo",
            "on",
            "--hang",
        ]);
        match cli.command {
            Commands::Negotiate(args) => {
                assert_eq!(args.candidate, 0);
                assert_eq!(args.amount, "8500");
                assert_eq!(args.demo.as_deref(), Some("on"));
                assert!(args.hang);
                assert!(!args.relayer_failure);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn hang_conflicts_with_relayer_failure() {
        let parsed = HushHireCli::try_parse_from([
            "hushhire",
            "negotiate",
            "-c",
            "1",
            "-a",
            "100",
            "--hang",
            "--relayer-failure",
        ]);
        assert!(parsed.is_err());
    }
}
