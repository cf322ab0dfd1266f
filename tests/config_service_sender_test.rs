//! Config service sender tests against a fake config service and SendGrid (using WireMock)

use std::{sync::Arc, time::Duration};

use email_sender::{
    domain::communication::{
        configuration::{ConfigServiceError, SenderConfigurationResolver},
        senders::{ConfigServiceEmailSender, EmailSender, SenderError},
        Message, SendContext,
    },
    infrastructure::{config_service::ConfigServiceProxy, email::SendGridMailerFactory},
};
use serde_json::json;
use testresult::TestResult;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONFIGURATION_PATH: &str = "/v1/admin/namespaces/studio/emailsender";

fn studio_configuration(is_domain_authenticated: bool) -> serde_json::Value {
    json!({
        "namespace": "studio",
        "fromAddress": "hello@studio.com",
        "fromName": "Studio",
        "apiKey": "SG.studio",
        "isDomainAuthenticated": is_domain_authenticated,
        "emailTemplates": [
            {"TemplateName": "welcome", "TemplateID": "tmpl_123"}
        ]
    })
}

async fn mount_configuration(server: &MockServer, body: serde_json::Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(CONFIGURATION_PATH))
        .and(query_param("includeEmailTemplates", "true"))
        .and(header("authorization", "Bearer service-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn create_sender(
    server: &MockServer,
    cache_ttl: Duration,
) -> ConfigServiceEmailSender<ConfigServiceProxy, SendGridMailerFactory> {
    ConfigServiceEmailSender::new(
        Arc::new(ConfigServiceProxy::new(server.uri(), cache_ttl)),
        SendGridMailerFactory::new(server.uri()),
        Duration::from_secs(60),
    )
}

fn service_context() -> SendContext {
    SendContext::new().with_access_token("service-token")
}

#[tokio::test]
async fn test_send_substitutes_template_and_backfills_sender() -> TestResult {
    let server = MockServer::start().await;
    mount_configuration(&server, studio_configuration(true), 1).await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("authorization", "Bearer SG.studio"))
        .and(body_partial_json(json!({
            "from": {"email": "hello@studio.com", "name": "Studio"},
            "template_id": "tmpl_123",
            "personalizations": [{"to": [{"email": "x@y.com"}]}]
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let sender = create_sender(&server, Duration::from_secs(60));
    let message = Message::new("studio", "x@y.com", "Welcome").with_template("welcome");

    sender.send_email(&service_context(), message).await?;

    Ok(())
}

#[tokio::test]
async fn test_send_keeps_caller_identity_and_unknown_template() -> TestResult {
    let server = MockServer::start().await;
    mount_configuration(&server, studio_configuration(true), 1).await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(body_partial_json(json!({
            "from": {"email": "promo@studio.com", "name": "Studio"},
            "template_id": "unknown"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let sender = create_sender(&server, Duration::from_secs(60));
    let message = Message::new("studio", "x@y.com", "Sale")
        .with_from("promo@studio.com")
        .with_template("unknown");

    sender.send_email(&service_context(), message).await?;

    Ok(())
}

#[tokio::test]
async fn test_unverified_domain_never_reaches_provider() {
    let server = MockServer::start().await;
    mount_configuration(&server, studio_configuration(false), 1).await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let sender = create_sender(&server, Duration::from_secs(60));

    let result = sender
        .send_email(&service_context(), Message::new("studio", "x@y.com", "Hi"))
        .await;

    assert!(matches!(result, Err(SenderError::ConfigurationNotValid)));
}

#[tokio::test]
async fn test_configuration_not_found_sentinel() -> TestResult {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONFIGURATION_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorCode": 20008,
            "errorMessage": "email sender configuration not found"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let proxy = ConfigServiceProxy::new(server.uri(), Duration::from_secs(60));

    assert_eq!(
        proxy
            .get_email_sender_configuration(&service_context(), "studio")
            .await?,
        None
    );

    let sender = ConfigServiceEmailSender::new(
        Arc::new(proxy),
        SendGridMailerFactory::new(server.uri()),
        Duration::from_secs(60),
    );

    let result = sender
        .send_email(&service_context(), Message::new("studio", "x@y.com", "Hi"))
        .await;

    assert!(matches!(result, Err(SenderError::ConfigurationNotFound)));

    Ok(())
}

async fn resolve_with_not_found_body(body: &str) -> Result<(), ConfigServiceError> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONFIGURATION_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let proxy = ConfigServiceProxy::new(server.uri(), Duration::from_secs(60));

    proxy
        .get_email_sender_configuration(&service_context(), "studio")
        .await
        .map(|_| ())
}

#[tokio::test]
async fn test_not_found_with_other_error_code_is_unexpected() {
    let body = r#"{"errorCode":20001,"errorMessage":"unauthorized"}"#;

    let result = resolve_with_not_found_body(body).await;

    assert!(matches!(
        result,
        Err(ConfigServiceError::UnexpectedResponse { status: 404, body: ref raw }) if raw == body
    ));
}

#[tokio::test]
async fn test_not_found_with_unparseable_body_is_unexpected() {
    let body = "404 page not found";

    let result = resolve_with_not_found_body(body).await;

    assert!(matches!(
        result,
        Err(ConfigServiceError::UnexpectedResponse { status: 404, body: ref raw }) if raw == body
    ));
}

#[tokio::test]
async fn test_unexpected_config_service_error_is_propagated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONFIGURATION_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let sender = create_sender(&server, Duration::from_secs(60));

    let result = sender
        .send_email(&service_context(), Message::new("studio", "x@y.com", "Hi"))
        .await;

    assert!(matches!(result, Err(SenderError::ConfigService(_))));
}

#[tokio::test]
async fn test_configuration_is_cached_until_expiry() -> TestResult {
    let server = MockServer::start().await;
    mount_configuration(&server, studio_configuration(true), 2).await;

    let proxy = ConfigServiceProxy::new(server.uri(), Duration::from_millis(200));
    let ctx = service_context();

    let first = proxy.get_email_sender_configuration(&ctx, "studio").await?;
    let second = proxy.get_email_sender_configuration(&ctx, "studio").await?;

    assert_eq!(first, second);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let third = proxy.get_email_sender_configuration(&ctx, "studio").await?;

    assert_eq!(third, first);

    Ok(())
}

#[tokio::test]
async fn test_provider_rejection_is_reported() {
    let server = MockServer::start().await;
    mount_configuration(&server, studio_configuration(true), 1).await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let sender = create_sender(&server, Duration::from_secs(60));

    let result = sender
        .send_email(&service_context(), Message::new("studio", "x@y.com", "Hi"))
        .await;

    assert!(matches!(result, Err(SenderError::Mailer(_))));
}

#[tokio::test]
async fn test_empty_namespace_makes_no_calls() {
    let server = MockServer::start().await;
    mount_configuration(&server, studio_configuration(true), 0).await;

    let sender = create_sender(&server, Duration::from_secs(60));

    let result = sender
        .send_email(&service_context(), Message::new("", "x@y.com", "Hi"))
        .await;

    assert!(matches!(result, Err(SenderError::NamespaceNotSpecified)));
}
