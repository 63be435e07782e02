//! A managed device: one session plus the registries that translate its CLI.

use std::sync::Arc;

use log::debug;

use crate::cli::Session;
use crate::error::Result;
use crate::translation::{
    DeviceAccess, Diff, Path, ReadMode, ReaderRegistry, TreeValue, WriterRegistry,
};

/// Reads and writes one device's tree through its session.
///
/// Whole-tree reads start from empty caches. Applying a diff invalidates
/// the caches afterwards, whether or not every write succeeded.
pub struct Device {
    session: Session,
    readers: Arc<ReaderRegistry>,
    writers: Arc<WriterRegistry>,
    access: DeviceAccess,
}

impl Device {
    pub fn new(
        session: Session,
        readers: Arc<ReaderRegistry>,
        writers: Arc<WriterRegistry>,
    ) -> Self {
        let access = session.device_access();
        Self {
            session,
            readers,
            writers,
            access,
        }
    }

    pub fn id(&self) -> &str {
        self.session.id()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn access(&self) -> &DeviceAccess {
        &self.access
    }

    /// Read `path`, answering from the caches where possible.
    pub async fn read(&self, path: &Path, mode: ReadMode) -> Result<TreeValue> {
        self.readers.read(path, mode, &self.access).await
    }

    /// Fresh read of the whole configuration tree.
    pub async fn read_config(&self) -> Result<TreeValue> {
        self.read_all(ReadMode::Config).await
    }

    /// Fresh read of the whole state tree.
    pub async fn read_state(&self) -> Result<TreeValue> {
        self.read_all(ReadMode::State).await
    }

    async fn read_all(&self, mode: ReadMode) -> Result<TreeValue> {
        debug!("{}: full {:?} read", self.id(), mode);
        self.session.clear_caches();
        self.readers.read_all(mode, &self.access).await
    }

    pub async fn apply(&self, diff: &Diff) -> Result<()> {
        let result = self.writers.apply(diff, &self.access).await;
        self.session.clear_caches();
        result
    }

    pub async fn close(&self) -> Result<()> {
        self.session.close().await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use regex::Regex;

    use super::*;
    use crate::cli::SessionBuilder;
    use crate::testing::{FakeTransport, test_dialect};
    use crate::translation::parsing::{extract_value, parse_keys};
    use crate::translation::{Keys, ReaderRegistryBuilder, Writer, WriterRegistryBuilder};

    const DUMP: &str = "interface 0/1\r\ndescription 'uplink'\r\nexit\r\ninterface 0/2\r\nexit";

    fn interface_name(path: &Path) -> String {
        path.keys_for(&Path::parse("/interfaces/interface").unwrap())
            .and_then(|keys| keys.get("name"))
            .unwrap_or_default()
            .to_string()
    }

    fn readers() -> ReaderRegistry {
        ReaderRegistryBuilder::new()
            .add_list_fn("/interfaces/interface", |_, device| async move {
                let output = device.read("show running-config").await?;
                let pattern = Regex::new(r"^interface (?P<name>\S+)$").unwrap();
                Ok(parse_keys(&output, &pattern, "name", "name"))
            })
            .add_fn("/interfaces/interface/config", |path, device| async move {
                let name = interface_name(&path);
                let output = device
                    .read(&format!("show running-config interface {}", name))
                    .await?;
                let pattern = Regex::new(r"(?m)^description '(?P<d>[^']*)'").unwrap();
                let mut value = TreeValue::empty().with("name", name);
                if let Some(description) = extract_value(&output, &pattern, "d") {
                    value.insert("description", description);
                }
                Ok(value)
            })
            .build()
            .unwrap()
    }

    struct DescriptionWriter;

    #[async_trait]
    impl Writer for DescriptionWriter {
        async fn create(&self, path: &Path, after: &TreeValue, device: &DeviceAccess) -> Result<()> {
            let description = after.get("description").and_then(TreeValue::as_str).unwrap_or("");
            device
                .write(&format!(
                    "interface {}\ndescription '{}'\nexit",
                    interface_name(path),
                    description
                ))
                .await?;
            Ok(())
        }

        async fn delete(&self, path: &Path, _before: &TreeValue, device: &DeviceAccess) -> Result<()> {
            device
                .write(&format!("interface {}\nno description\nexit", interface_name(path)))
                .await?;
            Ok(())
        }
    }

    async fn device(transport: FakeTransport) -> Device {
        let session = SessionBuilder::new("10.0.0.1")
            .dialect(test_dialect())
            .build_with_transport(transport)
            .await
            .unwrap();
        let writers = WriterRegistryBuilder::new()
            .add("/interfaces/interface/config", DescriptionWriter)
            .build()
            .unwrap();
        Device::new(session, Arc::new(readers()), Arc::new(writers))
    }

    #[tokio::test]
    async fn test_read_config_from_one_dump() {
        let transport = FakeTransport::new().respond("show running-config", DUMP);
        let sent = transport.sent();
        let device = device(transport).await;

        let config = device.read_config().await.unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["interfaces"]["interface"][0]["name"], "0/1");
        assert_eq!(json["interfaces"]["interface"][0]["config"]["description"], "uplink");
        assert!(json["interfaces"]["interface"][1]["config"].get("description").is_none());
        assert_eq!(sent.lock().unwrap()[1..], ["show running-config"]);

        // whole-tree reads never reuse a stale dump
        device.read_config().await.unwrap();
        assert_eq!(sent.lock().unwrap().len(), 3);

        device.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_writes_and_invalidates() {
        let transport = FakeTransport::new().respond("show running-config", DUMP);
        let sent = transport.sent();
        let device = device(transport).await;

        let element = Path::parse("/interfaces/interface/config")
            .unwrap()
            .parent()
            .unwrap()
            .with_keys(Keys::single("name", "0/2"))
            .unwrap()
            .child("config");
        let value = device
            .read(&element, ReadMode::Config)
            .await
            .unwrap();
        assert_eq!(value.get("config").unwrap().get("name").unwrap().as_str(), Some("0/2"));
        assert!(!device.session().tree_cache().unwrap().is_empty("show running-config"));

        let diff = Diff::new().create(element, TreeValue::empty().with("description", "spare"));
        device.apply(&diff).await.unwrap();

        assert_eq!(
            sent.lock().unwrap()[2..],
            ["interface 0/2", "description 'spare'", "exit"]
        );
        assert!(device.session().tree_cache().unwrap().is_empty("show running-config"));

        device.close().await.unwrap();
    }
}
