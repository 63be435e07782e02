//! EdgeSwitch example: read interface configuration as a tree and update
//! one interface description.
//!
//! # Prerequisites
//!
//! - A Ubiquiti EdgeSwitch reachable over SSH
//! - Credentials that land in privileged exec mode
//!
//! # Usage
//!
//! ```bash
//! cargo run --example edgeswitch_interfaces -- --host 192.168.1.2 --user admin --password secret
//! ```
//!
//! Set a description on one interface:
//! ```bash
//! cargo run --example edgeswitch_interfaces -- --host 192.168.1.2 --user admin --password secret \
//!     --interface 0/3 --description uplink
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use netcli::dialect::vendors;
use netcli::translation::parsing::{extract_value, parse_keys, parse_leaf};
use netcli::translation::{
    DeviceAccess, Diff, Keys, Path, ReaderRegistryBuilder, TreeValue, Writer,
    WriterRegistryBuilder,
};
use netcli::{Device, SessionBuilder};

static INTERFACE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^interface (?P<name>\d+/\d+)$").unwrap());
static DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^description '(?P<value>[^']*)'").unwrap());
static MTU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^mtu (?P<value>\d+)").unwrap());
static SHUTDOWN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^(?P<value>shutdown)$").unwrap());

static INTERFACE_LIST: LazyLock<Path> =
    LazyLock::new(|| Path::parse("/interfaces/interface").unwrap());

fn interface_name(path: &Path) -> netcli::Result<String> {
    path.keys_for(&INTERFACE_LIST)
        .and_then(|keys| keys.get("name"))
        .map(str::to_string)
        .ok_or_else(|| {
            netcli::error::SerializationError::Missing(format!("interface name in {}", path))
                .into()
        })
}

async fn read_interface_config(path: Path, device: DeviceAccess) -> netcli::Result<TreeValue> {
    let name = interface_name(&path)?;
    let output = device
        .read(&format!("show running-config interface {}", name))
        .await?;

    let mut config = TreeValue::empty()
        .with("name", name.as_str())
        .with("enabled", extract_value(&output, &SHUTDOWN, "value").is_none());
    if let Some(description) = extract_value(&output, &DESCRIPTION, "value") {
        config.insert("description", description);
    }
    if let Some(mtu) = parse_leaf::<u64>(&output, &MTU, "value")? {
        config.insert("mtu", mtu);
    }
    Ok(config)
}

struct DescriptionWriter;

#[async_trait]
impl Writer for DescriptionWriter {
    async fn create(&self, path: &Path, after: &TreeValue, device: &DeviceAccess) -> netcli::Result<()> {
        let name = interface_name(path)?;
        let description = after
            .get("description")
            .and_then(TreeValue::as_str)
            .unwrap_or_default();
        device
            .write(&format!(
                "configure\ninterface {}\ndescription '{}'\nexit\nexit",
                name, description
            ))
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        path: &Path,
        _before: &TreeValue,
        after: &TreeValue,
        device: &DeviceAccess,
    ) -> netcli::Result<()> {
        self.create(path, after, device).await
    }

    async fn delete(&self, path: &Path, _before: &TreeValue, device: &DeviceAccess) -> netcli::Result<()> {
        let name = interface_name(path)?;
        device
            .write(&format!("configure\ninterface {}\nno description\nexit\nexit", name))
            .await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .dialect(vendors::ubiquiti::dialect());
    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    println!("Connecting to {}:{}...", args.host, args.port);
    let session = builder.connect().await?;

    let readers = ReaderRegistryBuilder::new()
        .add_list_fn("/interfaces/interface", |_, device| async move {
            let output = device.read("show running-config").await?;
            Ok(parse_keys(&output, &INTERFACE_HEADER, "name", "name"))
        })
        .add_fn("/interfaces/interface/config", read_interface_config)
        .build()?;
    let writers = WriterRegistryBuilder::new()
        .add("/interfaces/interface/config", DescriptionWriter)
        .build()?;
    let device = Device::new(session, Arc::new(readers), Arc::new(writers));

    let config = device.read_config().await?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    if let (Some(interface), Some(description)) = (&args.interface, &args.description) {
        let path = INTERFACE_LIST
            .with_keys(Keys::single("name", interface.as_str()))?
            .child("config");
        let diff = Diff::new().create(
            path.clone(),
            TreeValue::empty().with("description", description.as_str()),
        );
        device.apply(&diff).await?;

        let updated = device.read(&path, netcli::ReadMode::Config).await?;
        println!("{}", serde_json::to_string_pretty(&updated)?);
    }

    device.close().await?;
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    interface: Option<String>,
    description: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: None,
            key: None,
            interface: None,
            description: None,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => parsed.host = value.unwrap_or(parsed.host),
                "--port" | "-p" => {
                    parsed.port = value.and_then(|v| v.parse().ok()).unwrap_or(22)
                }
                "--user" | "-u" => parsed.user = value.unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = value,
                "--key" | "-k" => parsed.key = value.map(PathBuf::from),
                "--interface" | "-i" => parsed.interface = value,
                "--description" | "-d" => parsed.description = value,
                "--help" => {
                    println!(
                        "USAGE:\n    cargo run --example edgeswitch_interfaces -- --host <HOST> \
                         --user <USER> (--password <PASS> | --key <PATH>) \
                         [--interface <NAME> --description <TEXT>]"
                    );
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        parsed
    }
}
