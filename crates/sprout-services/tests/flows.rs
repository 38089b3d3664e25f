//! End-to-end flows through the `Services` container, backed by in-memory
//! stores and an in-memory mailer.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

use sprout_db::{Database, SeriesStore};
use sprout_services::{AuthConfig, CurrentUser, Error, MemoryMailer, Services, Templates};
use sprout_types::bus::BreadcrumbPayload;
use sprout_types::models::Breadcrumb;

struct Harness {
    services: Services,
    mailer: Arc<MemoryMailer>,
}

fn harness() -> Harness {
    let mailer = Arc::new(MemoryMailer::new());
    let services = Services::new(
        Arc::new(Database::open_in_memory().unwrap()),
        Arc::new(SeriesStore::open_in_memory().unwrap()),
        mailer.clone(),
        Arc::new(Templates::new().unwrap()),
        AuthConfig::default(),
    );
    Harness { services, mailer }
}

async fn signed_in(h: &Harness, email: &str) -> CurrentUser {
    h.services
        .sessions
        .create_user(email, "secret", "Ann")
        .await
        .unwrap();
    let token = h.services.sessions.login(email, "secret").await.unwrap();
    CurrentUser(h.services.sessions.validate_token(&token).await.unwrap())
}

fn last_reset_token(mailer: &MemoryMailer) -> String {
    let sent = mailer.sent();
    let body = &sent.last().unwrap().body;
    let start = body.find("?token=").unwrap() + "?token=".len();
    body[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '='))
        .collect()
}

#[tokio::test]
async fn sign_up_login_logout() {
    let h = harness();
    let sessions = &h.services.sessions;

    let user = sessions.create_user("ann@example.com", "secret", "Ann").await.unwrap();
    assert!(user.last_login.is_none());
    assert!(matches!(
        sessions.create_user("ann@example.com", "x", "Imposter").await.unwrap_err(),
        Error::UserExists
    ));

    let token = sessions.login("ann@example.com", "secret").await.unwrap();
    let me = sessions.validate_token(&token).await.unwrap();
    assert_eq!(me.id, user.id);
    assert!(me.last_login.is_some());

    sessions.logout(&token).await.unwrap();
    assert!(matches!(
        sessions.validate_token(&token).await.unwrap_err(),
        Error::InvalidToken
    ));
}

#[tokio::test]
async fn provision_then_ingest_breadcrumbs() {
    let h = harness();
    let ann = signed_in(&h, "ann@example.com").await;

    let contract = h
        .services
        .provisioning
        .create_device_provision(&ann, "My Sensor")
        .await
        .unwrap();
    let device = h
        .services
        .provisioning
        .complete_device_provision("AA:BB", &contract)
        .await
        .unwrap();
    assert!(matches!(
        h.services
            .provisioning
            .complete_device_provision("AA:BB", &contract)
            .await
            .unwrap_err(),
        Error::NotFound(_)
    ));

    h.services
        .telemetry
        .record_breadcrumb(&BreadcrumbPayload {
            mac_addr: "AA:BB".into(),
            capacitance: 1234,
            temperature: 69,
        })
        .await
        .unwrap();

    assert_eq!(
        h.services.telemetry.get_latest_breadcrumb(device.id).await.unwrap(),
        Breadcrumb {
            capacitance: 1234,
            temperature: 69
        }
    );

    let err = h
        .services
        .telemetry
        .record_breadcrumb(&BreadcrumbPayload {
            mac_addr: "CC:DD".into(),
            capacitance: 1,
            temperature: 1,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoDevice(_)));
}

#[tokio::test]
async fn forgot_then_change_password() {
    let h = harness();
    let sessions = &h.services.sessions;
    sessions.create_user("ann@example.com", "old", "Ann").await.unwrap();

    sessions.forgot_pw("ann@example.com").await.unwrap();
    let encoded = last_reset_token(&h.mailer);
    assert!(URL_SAFE.decode(&encoded).is_ok());

    sessions.change_pw(&encoded, "new").await.unwrap();

    assert!(sessions.login("ann@example.com", "new").await.is_ok());
    assert!(matches!(
        sessions.login("ann@example.com", "old").await.unwrap_err(),
        Error::InvalidPassword
    ));
}

#[tokio::test]
async fn services_clone_shares_state() {
    let h = harness();
    let ann = signed_in(&h, "ann@example.com").await;
    let other = h.services.clone();

    other
        .provisioning
        .create_device_provision(&ann, "Shared")
        .await
        .unwrap();
    let devices = h.services.provisioning.get_user_devices(&ann).await.unwrap();
    assert_eq!(devices.len(), 1);
}
