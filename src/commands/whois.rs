//! Whois command implementation.

use anyhow::{Context, Result};
use std::path::Path;

use super::load_config;
use crate::cidr::parse_block;
use crate::sources::{RegistryLookup, WhoisClient};

/// Run the whois command
pub async fn run(prefix: &str, config_path: &Path) -> Result<()> {
    let block = parse_block(prefix).with_context(|| format!("Invalid prefix: {}", prefix))?;
    let config = load_config(config_path)?;

    let mut client = WhoisClient::new(&config.whois.host, config.whois.port, config.whois.timeout());
    match client.lookup(block).await? {
        Some(record) => {
            println!("Allocated:   {}", if record.allocated { "yes" } else { "no" });
            println!("Network:     {}", record.network.as_deref().unwrap_or("-"));
            println!("Type:        {}", record.kind.as_deref().unwrap_or("-"));
            println!(
                "BGP:         {}",
                match record.bgp {
                    Some(true) => "yes",
                    Some(false) => "no",
                    None => "-",
                }
            );
            println!("Description: {}", record.description.as_deref().unwrap_or("-"));
        }
        None => println!("No registry record for {}", block),
    }

    Ok(())
}
