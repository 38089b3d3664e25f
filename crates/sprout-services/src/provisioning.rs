//! Two-phase device provisioning and device ownership.
//!
//! Phase one runs for an authenticated user and yields a one-time contract.
//! Phase two arrives over the message bus, carrying the contract and the
//! device's hardware address.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use sprout_db::{Database, repos::ProvisionOutcome};
use sprout_types::models::{Device, User};

use crate::blocking;
use crate::error::{Error, Result};

/// Supplies the authenticated user behind a request.
pub trait CurrentUserResolver: Send + Sync {
    fn current_user(&self) -> Result<User>;
}

/// An identity already established by the session check.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUserResolver for CurrentUser {
    fn current_user(&self) -> Result<User> {
        Ok(self.0.clone())
    }
}

impl CurrentUserResolver for Option<CurrentUser> {
    fn current_user(&self) -> Result<User> {
        self.as_ref()
            .map(|c| c.0.clone())
            .ok_or(Error::Unauthenticated)
    }
}

/// Resolves hardware addresses to devices for the telemetry path.
#[async_trait]
pub trait DeviceLookup: Send + Sync {
    async fn device_by_hardware_address(&self, mac_addr: &str) -> Result<Option<Device>>;
}

pub struct ProvisioningCoordinator {
    db: Arc<Database>,
}

impl ProvisioningCoordinator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create an unaddressed device for the current user and return the
    /// contract the physical device must present to finish provisioning.
    pub async fn create_device_provision(
        &self,
        who: &dyn CurrentUserResolver,
        display_name: &str,
    ) -> Result<String> {
        let user = who.current_user()?;
        let display_name = display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(Error::InvalidInput("display name must not be empty"));
        }

        let contract = Uuid::new_v4().to_string();
        let db = self.db.clone();
        let staged = contract.clone();
        let device = blocking("create_device_provision", move || {
            db.create_device_with_staging(user.id, &display_name, &staged)
        })
        .await?;

        info!(user_id = device.user_id, device_id = device.id, "device provision staged");
        Ok(contract)
    }

    /// Bind `mac_addr` to the device staged under `contract`.
    pub async fn complete_device_provision(&self, mac_addr: &str, contract: &str) -> Result<Device> {
        let db = self.db.clone();
        let (mac, c) = (mac_addr.to_string(), contract.to_string());
        let outcome = blocking("complete_device_provision", move || {
            db.complete_provision(&c, &mac)
        })
        .await?;

        match outcome {
            ProvisionOutcome::Completed(device) => {
                info!(device_id = device.id, mac_addr, "device provisioned");
                Ok(device)
            }
            ProvisionOutcome::UnknownContract => {
                warn!(mac_addr, "provision with unknown or consumed contract");
                Err(Error::NotFound("provision contract"))
            }
            ProvisionOutcome::AddressInUse { device_id } => Err(Error::AddressInUse {
                mac_addr: mac_addr.to_string(),
                device_id,
            }),
        }
    }

    pub async fn get_user_devices(&self, who: &dyn CurrentUserResolver) -> Result<Vec<Device>> {
        let user = who.current_user()?;
        let db = self.db.clone();
        blocking("get_user_devices", move || db.get_devices_by_user(user.id)).await
    }

    /// A device of the current user. Devices owned by someone else are
    /// reported as missing.
    pub async fn get_user_device(&self, who: &dyn CurrentUserResolver, id: i64) -> Result<Device> {
        let user = who.current_user()?;
        let db = self.db.clone();
        blocking("get_user_device", move || db.get_device(id))
            .await?
            .filter(|d| d.user_id == user.id)
            .ok_or(Error::NotFound("device"))
    }

    pub async fn rename_device(
        &self,
        who: &dyn CurrentUserResolver,
        id: i64,
        display_name: &str,
    ) -> Result<Device> {
        let display_name = display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(Error::InvalidInput("display name must not be empty"));
        }

        let mut device = self.get_user_device(who, id).await?;
        let db = self.db.clone();
        let name = display_name.clone();
        let renamed = blocking("rename_device", move || db.rename_device(id, &name)).await?;
        if !renamed {
            return Err(Error::NotFound("device"));
        }

        device.display_name = display_name;
        Ok(device)
    }

    pub async fn get_device_by_hardware_address(&self, mac_addr: &str) -> Result<Device> {
        self.device_by_hardware_address(mac_addr)
            .await?
            .ok_or(Error::NotFound("device"))
    }
}

#[async_trait]
impl DeviceLookup for ProvisioningCoordinator {
    async fn device_by_hardware_address(&self, mac_addr: &str) -> Result<Option<Device>> {
        let db = self.db.clone();
        let mac = mac_addr.to_string();
        blocking("get_device_by_hardware_address", move || db.get_device_by_mac(&mac)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ProvisioningCoordinator, CurrentUser, CurrentUser) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ann = db.create_user("ann@example.com", "h", "Ann").unwrap();
        let bob = db.create_user("bob@example.com", "h", "Bob").unwrap();
        (
            ProvisioningCoordinator::new(db),
            CurrentUser(ann.into()),
            CurrentUser(bob.into()),
        )
    }

    #[tokio::test]
    async fn provision_round_trip_binds_address() {
        let (coord, ann, _) = setup();

        let contract = coord.create_device_provision(&ann, "Fern").await.unwrap();
        let pending = coord.get_user_devices(&ann).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].is_provisioned());

        let device = coord
            .complete_device_provision("AA:BB:CC:00:11:22", &contract)
            .await
            .unwrap();
        assert_eq!(device.mac_addr.as_deref(), Some("AA:BB:CC:00:11:22"));
        assert_eq!(device.display_name, "Fern");

        let found = coord
            .get_device_by_hardware_address("AA:BB:CC:00:11:22")
            .await
            .unwrap();
        assert_eq!(found, device);
    }

    #[tokio::test]
    async fn contracts_are_unique_and_single_use() {
        let (coord, ann, _) = setup();
        let a = coord.create_device_provision(&ann, "One").await.unwrap();
        let b = coord.create_device_provision(&ann, "Two").await.unwrap();
        assert_ne!(a, b);

        coord.complete_device_provision("01", &a).await.unwrap();
        let err = coord.complete_device_provision("02", &a).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = coord
            .complete_device_provision("03", "never-issued")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn address_bound_once() {
        let (coord, ann, _) = setup();
        let a = coord.create_device_provision(&ann, "One").await.unwrap();
        let b = coord.create_device_provision(&ann, "Two").await.unwrap();

        let first = coord.complete_device_provision("AA", &a).await.unwrap();
        let err = coord.complete_device_provision("AA", &b).await.unwrap_err();
        match err {
            Error::AddressInUse { device_id, .. } => assert_eq!(device_id, first.id),
            other => panic!("unexpected error: {other:?}"),
        }

        // the losing contract stays usable with a different address
        assert!(coord.complete_device_provision("BB", &b).await.is_ok());
    }

    #[tokio::test]
    async fn unauthenticated_and_blank_names_are_rejected() {
        let (coord, ann, _) = setup();

        let err = coord
            .create_device_provision(&None::<CurrentUser>, "Fern")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));

        let err = coord.create_device_provision(&ann, "   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(coord.get_user_devices(&ann).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn devices_are_scoped_to_owner() {
        let (coord, ann, bob) = setup();
        coord.create_device_provision(&ann, "Ann's").await.unwrap();
        let id = coord.get_user_devices(&ann).await.unwrap()[0].id;

        assert!(coord.get_user_devices(&bob).await.unwrap().is_empty());
        assert!(matches!(
            coord.get_user_device(&bob, id).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            coord.rename_device(&bob, id, "mine now").await.unwrap_err(),
            Error::NotFound(_)
        ));

        let renamed = coord.rename_device(&ann, id, "Basil").await.unwrap();
        assert_eq!(renamed.display_name, "Basil");
        assert_eq!(coord.get_user_device(&ann, id).await.unwrap().display_name, "Basil");
    }

    #[tokio::test]
    async fn lookup_of_unknown_address() {
        let (coord, _, _) = setup();
        assert!(coord.device_by_hardware_address("ZZ").await.unwrap().is_none());
        assert!(matches!(
            coord.get_device_by_hardware_address("ZZ").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
