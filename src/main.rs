use anyhow::{Context, Result};
use bitcoin::bip32::Xpub;
use clap::{Parser, Subcommand};
use serde_json::json;

use custody_signer::custody::{derive_account_xpub, verify_custodian_account, CustodianClient};
use custody_signer::logging::init_logging;
use custody_signer::ProviderConfig;

#[derive(Debug, Parser)]
#[command(name = "custody-signer", version, about = "Custodian-backed transaction signing tools")]
struct Cli {
    /// Tracing filter directives, e.g. `custody_signer=debug`
    #[arg(long, global = true, env = "CUSTODY_SIGNER_LOG")]
    log: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Derive the account xpub (44/280/0) from the custodian's root xpub
    DeriveXpub {
        root_xpub: String,
    },
    /// Check credentials and that the custodian holds the account's keys
    Check {
        /// Account xpub to verify against
        #[arg(long)]
        xpub: String,
    },
    /// Show the status of a signing operation by its external id
    Status {
        external_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    match cli.command {
        Command::DeriveXpub { root_xpub } => {
            let account = derive_account_xpub(&root_xpub).context("cannot derive account xpub")?;
            if cli.json {
                println!("{}", json!({ "xpub": account.to_string() }));
            } else {
                println!("Account path xPub: {}", account);
            }
        }
        Command::Check { xpub } => {
            let account: Xpub = xpub.parse().context("invalid account xpub")?;
            let client = client_from_env()?;
            client.ping().await.context("custodian rejected credentials")?;
            let public_key = verify_custodian_account(&client, &account).await?;
            if cli.json {
                println!("{}", json!({ "ok": true, "publicKey": public_key.to_string() }));
            } else {
                println!("Custodian account verified (address 0 key {})", public_key);
            }
        }
        Command::Status { external_id } => {
            let client = client_from_env()?;
            let info = tokio::select! {
                info = client.transaction_by_external_id(&external_id) => info?,
                _ = tokio::signal::ctrl_c() => anyhow::bail!("interrupted"),
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{} {}", info.id, info.status);
                if let Some(sub_status) = info.sub_status.filter(|s| !s.is_empty()) {
                    println!("  sub-status: {}", sub_status);
                }
                let signed = info.signed_messages.map(|m| m.len()).unwrap_or(0);
                println!("  signed messages: {}", signed);
            }
        }
    }

    Ok(())
}

fn client_from_env() -> Result<CustodianClient> {
    let config = ProviderConfig::from_env().context("custodian is not configured")?;
    Ok(CustodianClient::new(config)?)
}
