mod common;

use easyppp_api::billing::RecordingBilling;
use easyppp_api::config::Settings;
use easyppp_api::{AppState, SetupError};
use easyppp_core::Platform;
use std::sync::Arc;

fn build(settings: Settings) -> Result<AppState, SetupError> {
    AppState::new(
        Platform::in_memory(common::PUBLIC_URL),
        settings,
        Arc::new(RecordingBilling::new()),
    )
}

#[test]
fn test_default_settings_refuse_to_start() {
    assert!(matches!(
        build(Settings::default()),
        Err(SetupError::EmptySecret("auth.jwt_secret"))
    ));
}

#[test]
fn test_each_webhook_secret_is_required() {
    let mut settings = common::settings();
    settings.webhooks.identity_secret.clear();
    assert!(matches!(
        build(settings),
        Err(SetupError::Webhook { field: "webhooks.identity_secret", .. })
    ));

    let mut settings = common::settings();
    settings.webhooks.billing_secret.clear();
    assert!(matches!(
        build(settings),
        Err(SetupError::Webhook { field: "webhooks.billing_secret", .. })
    ));

    assert!(build(common::settings()).is_ok());
}
