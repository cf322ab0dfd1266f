//! Sender resolving identity and mailer per namespace from the config service

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, error};

use crate::{
    cache::ExpiringCache,
    domain::communication::{
        configuration::{SenderConfiguration, SenderConfigurationResolver},
        mailer::{Mailer, MailerFactory},
        Message, SendContext,
    },
};

use super::{EmailSender, SenderError};

/// Sends messages with the sender configuration of the message's namespace.
///
/// Mailers are built lazily per provider api key and cached.
#[derive(Debug)]
pub struct ConfigServiceEmailSender<R, F>
where
    R: SenderConfigurationResolver,
    F: MailerFactory,
{
    resolver: Arc<R>,
    factory: F,
    mailers: ExpiringCache<String, Arc<F::Mailer>>,
}

impl<R, F> ConfigServiceEmailSender<R, F>
where
    R: SenderConfigurationResolver,
    F: MailerFactory,
{
    /// Creates a new sender whose mailer cache keeps entries for `mailer_ttl`.
    pub fn new(resolver: Arc<R>, factory: F, mailer_ttl: Duration) -> Self {
        Self {
            resolver,
            factory,
            mailers: ExpiringCache::with_ttl(mailer_ttl),
        }
    }

    /// The configuration resolver
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    async fn resolve_configuration(
        &self,
        ctx: &SendContext,
        namespace: &str,
    ) -> Result<Arc<SenderConfiguration>, SenderError> {
        let configuration = self
            .resolver
            .get_email_sender_configuration(ctx, namespace)
            .await
            .map_err(|e| {
                error!(namespace, "failed to get email sender configuration: {}", e);
                e
            })?;

        let Some(configuration) = configuration else {
            error!(namespace, "email sender configuration is not found");
            return Err(SenderError::ConfigurationNotFound);
        };

        if !configuration.is_domain_authenticated {
            error!(namespace, "email sender domain is not authenticated yet");
            return Err(SenderError::ConfigurationNotValid);
        }

        Ok(configuration)
    }

    async fn mailer(&self, api_key: &str) -> Option<Arc<F::Mailer>> {
        self.mailers
            .get_or_try_insert_with(api_key.to_string(), || async {
                debug!("building mailer for new api key");
                self.factory.build(api_key).map(Arc::new)
            })
            .await
            .map_err(|e| error!("failed to build mailer: {}", e))
            .ok()
    }
}

/// Fills in what the caller left unset from the namespace's configuration.
fn apply_configuration(message: &mut Message, configuration: &SenderConfiguration) {
    if message.from.as_deref().map_or(true, str::is_empty) {
        message.from = Some(configuration.from_address.clone());
    }

    if message.from_name.as_deref().map_or(true, str::is_empty) {
        message.from_name = Some(configuration.from_name.clone());
    }

    // Unknown template names are passed through, they may already be provider ids.
    if let Some(template) = message.template.as_mut() {
        if let Some(found) = configuration.get_email_template(template) {
            *template = found.template_id.clone();
        }
    }
}

#[async_trait]
impl<R, F> EmailSender for ConfigServiceEmailSender<R, F>
where
    R: SenderConfigurationResolver,
    F: MailerFactory,
{
    async fn send_email(&self, ctx: &SendContext, mut message: Message) -> Result<(), SenderError> {
        if message.namespace.is_empty() {
            return Err(SenderError::NamespaceNotSpecified);
        }

        let configuration = self.resolve_configuration(ctx, &message.namespace).await?;

        apply_configuration(&mut message, &configuration);
        message.apply_template_defaults();

        let Some(mailer) = self.mailer(&configuration.api_key).await else {
            error!(namespace = %message.namespace, "sender platform does not exist");
            return Err(SenderError::SenderPlatformNotExist);
        };

        debug!(namespace = %message.namespace, to = %message.to, "sending email");

        mailer.send(ctx, &message).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use testresult::TestResult;

    use crate::domain::communication::{
        configuration::{tests::MockSenderConfigurationResolver, ConfigServiceError, EmailTemplate},
        mailer::{
            tests::{MockMailer, MockMailerFactory},
            MailerError,
        },
    };

    use super::*;

    fn configuration(is_domain_authenticated: bool) -> SenderConfiguration {
        SenderConfiguration {
            namespace: "studio".to_string(),
            from_address: "a@b.com".to_string(),
            from_name: "Studio".to_string(),
            api_key: "SG.key".to_string(),
            is_domain_authenticated,
            email_templates: vec![EmailTemplate {
                template_name: "welcome".to_string(),
                template_id: "tmpl_123".to_string(),
            }],
        }
    }

    fn resolver_returning(
        configuration: Option<SenderConfiguration>,
    ) -> MockSenderConfigurationResolver {
        let configuration = configuration.map(Arc::new);
        let mut resolver = MockSenderConfigurationResolver::new();

        resolver
            .expect_get_email_sender_configuration()
            .returning(move |_, _| Ok(configuration.clone()));

        resolver
    }

    /// Factory whose mailers record every message they are asked to send.
    fn recording_factory(sent: Arc<Mutex<Vec<Message>>>) -> MockMailerFactory {
        let mut factory = MockMailerFactory::new();

        factory.expect_build().returning(move |_| {
            let sent = Arc::clone(&sent);
            let mut mailer = MockMailer::new();
            mailer.expect_send().returning(move |_, message| {
                sent.lock().expect("lock poisoned").push(message.clone());
                Ok(())
            });
            Ok(mailer)
        });

        factory
    }

    fn sender(
        resolver: MockSenderConfigurationResolver,
        factory: MockMailerFactory,
    ) -> ConfigServiceEmailSender<MockSenderConfigurationResolver, MockMailerFactory> {
        ConfigServiceEmailSender::new(Arc::new(resolver), factory, Duration::from_secs(60))
    }

    fn recorded(sent: &Arc<Mutex<Vec<Message>>>) -> Vec<Message> {
        sent.lock().expect("lock poisoned").clone()
    }

    #[tokio::test]
    async fn test_send_email_requires_namespace() {
        let mut resolver = MockSenderConfigurationResolver::new();
        resolver.expect_get_email_sender_configuration().times(0);

        let sender = sender(resolver, MockMailerFactory::new());

        let result = sender
            .send_email(&SendContext::new(), Message::new("", "x@y.com", "Hi"))
            .await;

        assert!(matches!(result, Err(SenderError::NamespaceNotSpecified)));
    }

    #[tokio::test]
    async fn test_send_email_configuration_not_found() {
        let mut factory = MockMailerFactory::new();
        factory.expect_build().times(0);

        let sender = sender(resolver_returning(None), factory);

        let result = sender
            .send_email(&SendContext::new(), Message::new("studio", "x@y.com", "Hi"))
            .await;

        assert!(matches!(result, Err(SenderError::ConfigurationNotFound)));
    }

    #[tokio::test]
    async fn test_send_email_unverified_configuration_never_dispatches() {
        let mut factory = MockMailerFactory::new();
        factory.expect_build().times(0);

        let sender = sender(resolver_returning(Some(configuration(false))), factory);

        let result = sender
            .send_email(&SendContext::new(), Message::new("studio", "x@y.com", "Hi"))
            .await;

        assert!(matches!(result, Err(SenderError::ConfigurationNotValid)));
    }

    #[tokio::test]
    async fn test_send_email_propagates_resolver_error() {
        let mut resolver = MockSenderConfigurationResolver::new();
        resolver
            .expect_get_email_sender_configuration()
            .returning(|_, _| Err(ConfigServiceError::MissingAccessToken));

        let sender = sender(resolver, MockMailerFactory::new());

        let result = sender
            .send_email(&SendContext::new(), Message::new("studio", "x@y.com", "Hi"))
            .await;

        assert!(matches!(
            result,
            Err(SenderError::ConfigService(ConfigServiceError::MissingAccessToken))
        ));
    }

    #[tokio::test]
    async fn test_send_email_backfills_sender_identity() -> TestResult {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sender = sender(
            resolver_returning(Some(configuration(true))),
            recording_factory(Arc::clone(&sent)),
        );

        sender
            .send_email(&SendContext::new(), Message::new("studio", "x@y.com", "Hi"))
            .await?;

        let sent = recorded(&sent);
        assert_eq!(sent[0].from.as_deref(), Some("a@b.com"));
        assert_eq!(sent[0].from_name.as_deref(), Some("Studio"));

        Ok(())
    }

    #[tokio::test]
    async fn test_send_email_keeps_caller_sender_identity() -> TestResult {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sender = sender(
            resolver_returning(Some(configuration(true))),
            recording_factory(Arc::clone(&sent)),
        );

        let message = Message::new("studio", "x@y.com", "Hi")
            .with_from("c@d.com")
            .with_from_name("Caller");

        sender.send_email(&SendContext::new(), message).await?;

        let sent = recorded(&sent);
        assert_eq!(sent[0].from.as_deref(), Some("c@d.com"));
        assert_eq!(sent[0].from_name.as_deref(), Some("Caller"));

        Ok(())
    }

    #[tokio::test]
    async fn test_send_email_substitutes_named_template() -> TestResult {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sender = sender(
            resolver_returning(Some(configuration(true))),
            recording_factory(Arc::clone(&sent)),
        );

        sender
            .send_email(
                &SendContext::new(),
                Message::new("studio", "x@y.com", "Hi").with_template("welcome"),
            )
            .await?;
        sender
            .send_email(
                &SendContext::new(),
                Message::new("studio", "x@y.com", "Hi").with_template("unknown"),
            )
            .await?;

        let sent = recorded(&sent);
        assert_eq!(sent[0].template.as_deref(), Some("tmpl_123"));
        assert_eq!(sent[1].template.as_deref(), Some("unknown"));

        Ok(())
    }

    #[tokio::test]
    async fn test_send_email_reuses_mailer_per_api_key() -> TestResult {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);

        let mut factory = MockMailerFactory::new();
        factory
            .expect_build()
            .withf(|api_key| api_key == "SG.key")
            .returning(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut mailer = MockMailer::new();
                mailer.expect_send().returning(|_, _| Ok(()));
                Ok(mailer)
            });

        let sender = sender(resolver_returning(Some(configuration(true))), factory);

        for _ in 0..3 {
            sender
                .send_email(&SendContext::new(), Message::new("studio", "x@y.com", "Hi"))
                .await?;
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_send_email_platform_not_exist() {
        let mut factory = MockMailerFactory::new();
        factory
            .expect_build()
            .returning(|_| Err(MailerError::InvalidConfiguration("no client".to_string())));

        let sender = sender(resolver_returning(Some(configuration(true))), factory);

        let result = sender
            .send_email(&SendContext::new(), Message::new("studio", "x@y.com", "Hi"))
            .await;

        assert!(matches!(result, Err(SenderError::SenderPlatformNotExist)));
    }

    #[tokio::test]
    async fn test_send_email_propagates_mailer_error() {
        let mut factory = MockMailerFactory::new();
        factory.expect_build().returning(|_| {
            let mut mailer = MockMailer::new();
            mailer.expect_send().returning(|_, message| {
                Err(MailerError::TimedOut {
                    to: message.to.clone(),
                })
            });
            Ok(mailer)
        });

        let sender = sender(resolver_returning(Some(configuration(true))), factory);

        let result = sender
            .send_email(&SendContext::new(), Message::new("studio", "x@y.com", "Hi"))
            .await;

        assert!(matches!(
            result,
            Err(SenderError::Mailer(MailerError::TimedOut { ref to })) if to == "x@y.com"
        ));
    }
}
