//! Wallet utility: generate an RSA keypair and sign transaction payloads
//! for submission to a node's wallet API.

use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use emberchain::crypto::KeyPair;
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ember-wallet", about = "Emberchain wallet utility")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new keypair and write the private key PEM to a file
    Generate {
        /// Where to store the private key
        #[arg(long, default_value = "wallet.pem")]
        out: PathBuf,
    },
    /// Sign a transaction payload with an existing key
    Sign {
        #[arg(long, default_value = "wallet.pem")]
        key: PathBuf,
        #[arg(long)]
        sender: String,
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        amount: Decimal,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    match Args::parse().command {
        Command::Generate { out } => {
            let keypair = KeyPair::generate()?;
            fs::write(&out, keypair.private_pem()?)?;
            println!("address:    {}", keypair.address()?);
            println!("public key: {}", keypair.public_key_b64()?);
            println!("private key written to {}", out.display());
        }
        Command::Sign {
            key,
            sender,
            recipient,
            amount,
        } => {
            let keypair = KeyPair::from_private_pem(&fs::read_to_string(&key)?)?;
            let timestamp = Utc::now();
            // Same canonical payload the node verifies: sender, recipient,
            // amount, RFC 3339 timestamp at microsecond precision.
            let stamp = timestamp.to_rfc3339_opts(SecondsFormat::Micros, true);
            let payload = format!("{}{}{}{}", sender, recipient, amount, stamp);
            let signature = keypair.sign(payload.as_bytes())?;

            println!("sender:     {}", sender);
            println!("recipient:  {}", recipient);
            println!("amount:     {}", amount);
            println!("timestamp:  {}", stamp);
            println!("signature:  {}", signature);
            println!("public key: {}", keypair.public_key_b64()?);
        }
    }
    Ok(())
}
