// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Configuration management for IPCP instances
//!
//! Supports both command-line arguments and TOML configuration files.
//! Handles bootstrap vs. member IPCP modes with appropriate parameters,
//! plus the per-DIF data-transfer profile (field widths, policy flags)
//! the PCI codec and DTP/DTCP state vectors are parameterised by.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::efcp::constants::DataTransferConstants;

/// IPCP operational mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpcpMode {
    /// Bootstrap IPCP - first in the DIF, has static address
    Bootstrap,
    /// Member IPCP - joins the DIF with a peer-assigned address
    Member,
    /// Demo mode - runs a local loopback demo without networking
    Demo,
}

impl std::fmt::Display for IpcpMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpcpMode::Bootstrap => write!(f, "bootstrap"),
            IpcpMode::Member => write!(f, "member"),
            IpcpMode::Demo => write!(f, "demo"),
        }
    }
}

impl std::str::FromStr for IpcpMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bootstrap" => Ok(IpcpMode::Bootstrap),
            "member" => Ok(IpcpMode::Member),
            "demo" => Ok(IpcpMode::Demo),
            _ => Err(format!(
                "Invalid mode: {}. Use 'bootstrap', 'member', or 'demo'",
                s
            )),
        }
    }
}

/// Command-line arguments for IPCP
#[derive(Parser, Debug)]
#[command(name = "ari-ipcp")]
#[command(author = "ARI Contributors")]
#[command(version = "0.1.0")]
#[command(about = "RINA IPC Process", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file (overrides other arguments)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// IPCP name
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Operating mode: bootstrap, member, or demo
    #[arg(long, value_name = "MODE", default_value = "demo")]
    pub mode: IpcpMode,

    /// DIF name to join
    #[arg(long, value_name = "DIF")]
    pub dif_name: Option<String>,

    /// RINA address (required for bootstrap mode)
    #[arg(long, value_name = "ADDRESS")]
    pub address: Option<u64>,

    /// Address to bind UDP socket (e.g., "0.0.0.0:7000")
    #[arg(long, value_name = "ADDR:PORT")]
    pub bind: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// TOML configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub ipcp: IpcpConfig,
    pub dif: DifConfig,
    pub shim: ShimConfig,
    #[serde(default)]
    pub data_transfer: DataTransferConfig,
}

/// IPCP section of config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcpConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ipcp_type: String,
    pub mode: IpcpMode,
}

/// DIF section of config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifConfig {
    pub name: String,
    /// Only for bootstrap mode
    pub address: Option<u64>,
}

/// Shim layer section of config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShimConfig {
    pub bind_address: String,
    pub bind_port: u16,
}

/// `[data_transfer]` section: the DIF's field-width and policy profile,
/// fed into [`DataTransferConstants::builder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTransferConfig {
    #[serde(default = "default_width_4")]
    pub address_length: u8,
    #[serde(default = "default_width_2")]
    pub qos_id_length: u8,
    #[serde(default = "default_width_2")]
    pub cep_id_length: u8,
    #[serde(default = "default_width_2")]
    pub port_id_length: u8,
    #[serde(default = "default_width_2")]
    pub length_length: u8,
    #[serde(default = "default_width_4")]
    pub seq_num_length: u8,
    #[serde(default = "default_width_4")]
    pub ctrl_seq_num_length: u8,
    #[serde(default = "default_width_2")]
    pub rate_length: u8,
    #[serde(default = "default_width_2")]
    pub frame_length: u8,
    #[serde(default = "default_max_pdu_size")]
    pub max_pdu_size: usize,
    #[serde(default = "default_max_sdu_size")]
    pub max_sdu_size: usize,
    #[serde(default = "default_max_pdu_life_ms")]
    pub max_pdu_life_ms: u64,
    #[serde(default)]
    pub dif_fragmentation: bool,
    #[serde(default = "default_max_sdu_size")]
    pub max_fragment_size: usize,
    /// A-timer: delayed-ack/in-order-batching window, in milliseconds.
    #[serde(default)]
    pub a_timer_ms: u64,
    /// tr-timer: per-PDU retransmission interval, in milliseconds.
    #[serde(default)]
    pub tr_timer_ms: u64,
    /// Idle gap before a sender emits a RENDEZVOUS PDU, in milliseconds.
    #[serde(default)]
    pub rendezvous_ms: u64,
}

fn default_width_2() -> u8 {
    2
}
fn default_width_4() -> u8 {
    4
}
fn default_max_pdu_size() -> usize {
    1500
}
fn default_max_sdu_size() -> usize {
    1460
}
fn default_max_pdu_life_ms() -> u64 {
    60_000
}

impl Default for DataTransferConfig {
    fn default() -> Self {
        Self {
            address_length: default_width_4(),
            qos_id_length: default_width_2(),
            cep_id_length: default_width_2(),
            port_id_length: default_width_2(),
            length_length: default_width_2(),
            seq_num_length: default_width_4(),
            ctrl_seq_num_length: default_width_4(),
            rate_length: default_width_2(),
            frame_length: default_width_2(),
            max_pdu_size: default_max_pdu_size(),
            max_sdu_size: default_max_sdu_size(),
            max_pdu_life_ms: default_max_pdu_life_ms(),
            dif_fragmentation: false,
            max_fragment_size: default_max_sdu_size(),
            a_timer_ms: 0,
            tr_timer_ms: 0,
            rendezvous_ms: 0,
        }
    }
}

impl DataTransferConfig {
    pub fn build(&self) -> Result<DataTransferConstants, String> {
        DataTransferConstants::builder()
            .address_length(self.address_length)
            .qos_id_length(self.qos_id_length)
            .cep_id_length(self.cep_id_length)
            .port_id_length(self.port_id_length)
            .length_length(self.length_length)
            .seq_num_length(self.seq_num_length)
            .ctrl_seq_num_length(self.ctrl_seq_num_length)
            .rate_length(self.rate_length)
            .frame_length(self.frame_length)
            .max_pdu_size(self.max_pdu_size)
            .max_sdu_size(self.max_sdu_size)
            .max_pdu_life_ms(self.max_pdu_life_ms)
            .fragmentation(self.dif_fragmentation)
            .max_fragment_size(self.max_fragment_size)
            .a_timer_ms(self.a_timer_ms)
            .tr_timer_ms(self.tr_timer_ms)
            .rendezvous_ms(self.rendezvous_ms)
            .build()
            .map_err(|e| e.to_string())
    }
}

/// Unified configuration after parsing CLI or file
#[derive(Debug, Clone)]
pub struct IpcpConfiguration {
    pub name: String,
    pub mode: IpcpMode,
    pub dif_name: String,
    pub address: Option<u64>,
    pub bind_address: String,
    pub data_transfer: DataTransferConfig,
}

impl IpcpConfiguration {
    /// Creates configuration from command-line arguments
    pub fn from_cli(args: CliArgs) -> Result<Self, String> {
        if let Some(config_path) = args.config {
            return Self::from_file(&config_path);
        }

        match args.mode {
            IpcpMode::Demo => Ok(Self {
                name: args.name.unwrap_or_else(|| "demo-ipcp".to_string()),
                mode: IpcpMode::Demo,
                dif_name: "demo-dif".to_string(),
                address: None,
                bind_address: String::new(),
                data_transfer: DataTransferConfig::default(),
            }),
            IpcpMode::Bootstrap => {
                let name = args.name.ok_or("--name is required for bootstrap mode")?;
                let dif_name = args
                    .dif_name
                    .ok_or("--dif-name is required for bootstrap mode")?;
                let address = args
                    .address
                    .ok_or("--address is required for bootstrap mode")?;
                let bind = args.bind.ok_or("--bind is required for bootstrap mode")?;

                Ok(Self {
                    name,
                    mode: IpcpMode::Bootstrap,
                    dif_name,
                    address: Some(address),
                    bind_address: bind,
                    data_transfer: DataTransferConfig::default(),
                })
            }
            IpcpMode::Member => {
                let name = args.name.ok_or("--name is required for member mode")?;
                let dif_name = args
                    .dif_name
                    .ok_or("--dif-name is required for member mode")?;
                let bind = args.bind.ok_or("--bind is required for member mode")?;

                Ok(Self {
                    name,
                    mode: IpcpMode::Member,
                    dif_name,
                    address: None,
                    bind_address: bind,
                    data_transfer: DataTransferConfig::default(),
                })
            }
        }
    }

    /// Loads configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, String> {
        let contents =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: TomlConfig =
            toml::from_str(&contents).map_err(|e| format!("Failed to parse TOML config: {}", e))?;

        let bind_address = format!("{}:{}", config.shim.bind_address, config.shim.bind_port);

        Ok(Self {
            name: config.ipcp.name,
            mode: config.ipcp.mode,
            dif_name: config.dif.name,
            address: config.dif.address,
            bind_address,
            data_transfer: config.data_transfer,
        })
    }

    /// Validates configuration based on mode
    pub fn validate(&self) -> Result<(), String> {
        match self.mode {
            IpcpMode::Bootstrap => {
                if self.address.is_none() {
                    return Err("Bootstrap mode requires an address".to_string());
                }
                if self.bind_address.is_empty() {
                    return Err("Bootstrap mode requires a bind address".to_string());
                }
            }
            IpcpMode::Member => {
                if self.bind_address.is_empty() {
                    return Err("Member mode requires a bind address".to_string());
                }
            }
            IpcpMode::Demo => {}
        }
        self.data_transfer.build().map(|_| ())
    }

    /// Logs a configuration summary at info level.
    pub fn log_summary(&self) {
        tracing::info!(
            name = %self.name,
            mode = %self.mode,
            dif = %self.dif_name,
            address = ?self.address,
            bind_address = %self.bind_address,
            "IPCP configuration loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipcp_mode_parsing() {
        assert_eq!(
            "bootstrap".parse::<IpcpMode>().unwrap(),
            IpcpMode::Bootstrap
        );
        assert_eq!("member".parse::<IpcpMode>().unwrap(), IpcpMode::Member);
        assert_eq!("demo".parse::<IpcpMode>().unwrap(), IpcpMode::Demo);
        assert!("invalid".parse::<IpcpMode>().is_err());
    }

    #[test]
    fn default_data_transfer_config_builds() {
        let dtc = DataTransferConfig::default().build().unwrap();
        assert_eq!(dtc.address_length, 4);
    }

    #[test]
    fn demo_mode_validates_without_address_or_bind() {
        let config = IpcpConfiguration {
            name: "demo".to_string(),
            mode: IpcpMode::Demo,
            dif_name: "demo-dif".to_string(),
            address: None,
            bind_address: String::new(),
            data_transfer: DataTransferConfig::default(),
        };
        assert!(config.validate().is_ok());
    }
}
