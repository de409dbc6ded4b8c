// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

use ari::config::{CliArgs, IpcpConfiguration};
use ari::device::DataDeviceHandle;
use ari::{Dif, EfcpContainer, Kfa, SendOutcome};
use clap::Parser;

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let config = IpcpConfiguration::from_cli(args).map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;
    config.validate().map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;
    config.log_summary();

    let constants = config.data_transfer.build()?;
    let mut dif = Dif::new_with_name(config.dif_name.clone(), constants);
    if let Some(address) = config.address {
        dif.add_member(address);
    }
    tracing::info!(dif = %dif.name, members = dif.member_count(), "DIF initialised");

    let efcp = EfcpContainer::new(constants);
    let mut kfa = Kfa::new();

    let port_id = kfa.reserve_port_id()?;
    let flow = kfa.create_flow(port_id, 0, constants.max_sdu_size);
    let device = DataDeviceHandle::new(flow);
    tracing::info!(port_id, "data-plane flow allocated");

    let cep_id = efcp
        .create_connection(config.address.unwrap_or(0), 0, port_id, 0, None)
        .await?;
    tracing::info!(cep_id, "EFCP connection established");

    let sdu = b"hello from the data-transfer core".to_vec();
    for outcome in efcp.write(cep_id, sdu.clone()).await? {
        match outcome {
            SendOutcome::Ready { sequence_number, payload, wire_bytes } => {
                tracing::info!(
                    sequence_number,
                    bytes = payload.len(),
                    wire_bytes = wire_bytes.len(),
                    "SDU admitted for transmission"
                );
                device.write(payload).await?;
            }
            SendOutcome::Queued => {
                tracing::info!("SDU queued behind a closed window");
            }
        }
    }

    let received = device.read().await?;
    tracing::info!(bytes = received.len(), "SDU delivered to local reader");

    efcp.destroy(cep_id).await?;
    kfa.deallocate(port_id).await?;
    tracing::info!("connection and flow torn down");

    Ok(())
}
