// Jellyfin: startup wizard, an API key for the stack, declared libraries.
//
// Jellyfin keeps no API key on disk that the engine can read. The admin
// account is declared, and the key the *arr apps need for notifications is
// created here and put into the run's credential cache.

use async_trait::async_trait;
use medialink_api::JellyfinClient;
use secrecy::SecretString;
use tracing::info;

use crate::action::{ConfigurationAction, Convergence};
use crate::context::RunContext;
use crate::credentials::{CredentialKind, ServiceCredential};
use crate::error::CoreError;
use crate::integration::ServiceIntegration;
use crate::integrations::same_path;
use crate::registry::ServiceName;
use crate::settings::LibrarySpec;
use crate::verify::{CheckOutcome, VerificationCheck};

/// App name the provisioned key is registered under.
pub const API_KEY_APP: &str = "medialink";

pub struct JellyfinIntegration;

impl ServiceIntegration for JellyfinIntegration {
    fn service(&self) -> ServiceName {
        ServiceName::Jellyfin
    }

    fn required_credential(&self) -> Option<CredentialKind> {
        None
    }

    fn configuration_actions(
        &self,
        ctx: &RunContext,
    ) -> Result<Vec<Box<dyn ConfigurationAction>>, CoreError> {
        let mut actions: Vec<Box<dyn ConfigurationAction>> =
            vec![Box::new(WizardAction), Box::new(ApiKeyAction)];
        for library in &ctx.settings().libraries {
            actions.push(Box::new(LibraryAction {
                library: library.clone(),
            }));
        }
        Ok(actions)
    }

    fn verification_checks(&self, ctx: &RunContext) -> Vec<Box<dyn VerificationCheck>> {
        vec![
            Box::new(AdminLoginCheck),
            Box::new(ApiKeyCheck),
            Box::new(LibrariesCheck {
                expected: ctx.settings().libraries.iter().map(|l| l.name.clone()).collect(),
            }),
        ]
    }
}

/// Log in as the declared admin and switch the client to that session.
async fn admin_client(ctx: &RunContext) -> Result<JellyfinClient, CoreError> {
    let mut client = ctx.jellyfin_client()?;
    let admin = &ctx.settings().admin;
    let token = client.authenticate(&admin.username, &admin.password).await?;
    client.set_token(token);
    Ok(client)
}

/// The provisioned key when known, otherwise an admin session.
async fn authed_client(ctx: &RunContext) -> Result<JellyfinClient, CoreError> {
    if ctx.api_key(ServiceName::Jellyfin).is_some() {
        ctx.jellyfin_keyed_client()
    } else {
        admin_client(ctx).await
    }
}

// ── Actions ─────────────────────────────────────────────────────────

struct WizardAction;

#[async_trait]
impl ConfigurationAction for WizardAction {
    fn target(&self) -> ServiceName {
        ServiceName::Jellyfin
    }

    fn description(&self) -> String {
        "startup wizard completed".into()
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let info = ctx.jellyfin_client()?.public_info().await?;
        Ok(Convergence::when(info.startup_wizard_completed, || {
            "wizard not completed".into()
        }))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let settings = ctx.settings();
        let client = ctx.jellyfin_client()?;
        client
            .startup_configuration(&settings.culture, &settings.country)
            .await?;
        client
            .startup_user(&settings.admin.username, &settings.admin.password)
            .await?;
        client.startup_remote_access().await?;
        client.startup_complete().await?;
        info!(user = %settings.admin.username, "Jellyfin wizard completed");
        Ok(())
    }
}

/// An API key for the stack exists; finding it stores it for later actions.
struct ApiKeyAction;

impl ApiKeyAction {
    async fn find_and_store(ctx: &RunContext) -> Result<bool, CoreError> {
        let keys = admin_client(ctx).await?.api_keys().await?;
        let Some(key) = keys
            .into_iter()
            .find(|k| k.app_name.as_deref() == Some(API_KEY_APP))
        else {
            return Ok(false);
        };
        ctx.credentials().insert(ServiceCredential::new(
            ServiceName::Jellyfin,
            CredentialKind::ApiKey,
            SecretString::from(key.access_token),
        ));
        Ok(true)
    }
}

#[async_trait]
impl ConfigurationAction for ApiKeyAction {
    fn target(&self) -> ServiceName {
        ServiceName::Jellyfin
    }

    fn description(&self) -> String {
        format!("API key '{API_KEY_APP}'")
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let found = Self::find_and_store(ctx).await?;
        Ok(Convergence::when(found, || "no key registered".into()))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        admin_client(ctx).await?.create_api_key(API_KEY_APP).await?;
        Ok(())
    }
}

struct LibraryAction {
    library: LibrarySpec,
}

#[async_trait]
impl ConfigurationAction for LibraryAction {
    fn target(&self) -> ServiceName {
        ServiceName::Jellyfin
    }

    fn description(&self) -> String {
        format!("library '{}' at {}", self.library.name, self.library.path)
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let folders = authed_client(ctx).await?.virtual_folders().await?;
        Ok(match folders.iter().find(|f| f.name == self.library.name) {
            None => Convergence::diverged("missing"),
            Some(folder) => Convergence::when(
                folder.locations.iter().any(|l| same_path(l, &self.library.path)),
                || format!("locations are [{}]", folder.locations.join(", ")),
            ),
        })
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let client = authed_client(ctx).await?;
        if client
            .virtual_folders()
            .await?
            .iter()
            .any(|f| f.name == self.library.name)
        {
            return Err(CoreError::action(format!(
                "library '{}' exists with other paths; not modified",
                self.library.name
            )));
        }
        client
            .add_virtual_folder(
                &self.library.name,
                &self.library.collection_type,
                &self.library.path,
            )
            .await?;
        Ok(())
    }
}

// ── Checks ──────────────────────────────────────────────────────────

struct AdminLoginCheck;

#[async_trait]
impl VerificationCheck for AdminLoginCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Jellyfin)
    }

    fn description(&self) -> String {
        "Jellyfin admin login".into()
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        Ok(match admin_client(ctx).await {
            Ok(_) => CheckOutcome::Pass,
            Err(CoreError::AuthenticationFailed { message }) => CheckOutcome::fail(message),
            Err(e) => return Err(e),
        })
    }
}

struct ApiKeyCheck;

#[async_trait]
impl VerificationCheck for ApiKeyCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Jellyfin)
    }

    fn description(&self) -> String {
        format!("Jellyfin API key '{API_KEY_APP}' registered")
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        let found = ApiKeyAction::find_and_store(ctx).await?;
        Ok(CheckOutcome::pass_if(found, || "no key registered".into()))
    }
}

struct LibrariesCheck {
    expected: Vec<String>,
}

#[async_trait]
impl VerificationCheck for LibrariesCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Jellyfin)
    }

    fn description(&self) -> String {
        "Jellyfin libraries present".into()
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if self.expected.is_empty() {
            return Ok(CheckOutcome::skip("no libraries declared"));
        }
        let folders = authed_client(ctx).await?.virtual_folders().await?;
        let missing: Vec<_> = self
            .expected
            .iter()
            .filter(|name| !folders.iter().any(|f| &f.name == *name))
            .map(String::as_str)
            .collect();
        Ok(CheckOutcome::pass_if(missing.is_empty(), || {
            format!("missing: {}", missing.join(", "))
        }))
    }
}
