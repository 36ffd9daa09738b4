//! Setup, reconciliation and verification engine for a self-hosted media
//! stack, sitting between `medialink-api` and the CLI.
//!
//! - **[`Registry`]**: One [`ServiceDescriptor`] per [`ServiceName`], built
//!   from defaults plus declared URL overrides.
//!
//! - **Readiness** ([`readiness`]): Polls health endpoints until any HTTP
//!   response arrives; records ready services in the [`RunContext`].
//!
//! - **Credentials** ([`credentials`]): Reads API keys from each service's
//!   own config files into an in-memory [`CredentialStore`].
//!
//! - **Configurator** ([`configurator`]): Runs every
//!   [`ConfigurationAction`] of every [`ServiceIntegration`] as
//!   check → apply → re-check, so a second run performs no mutations.
//!
//! - **Renderer** ([`render`]): `{{TOKEN}}` templates for the proxy,
//!   dashboard, cleanup job and compose `.env`.
//!
//! - **Verification** ([`verify`]): Ordered pass/fail/skip checks
//!   aggregated into a [`RunReport`].
//!
//! - **[`Pipeline`]**: Drives the stages in order and reports progress to an
//!   [`Observer`].

pub mod action;
pub mod configurator;
pub mod context;
pub mod credentials;
pub mod error;
pub mod integration;
pub mod integrations;
pub mod links;
pub mod pipeline;
pub mod readiness;
pub mod registry;
pub mod render;
pub mod settings;
pub mod verify;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::{ActionOutcome, ActionRecord, ConfigurationAction, Convergence};
pub use context::RunContext;
pub use credentials::{CredentialKind, CredentialStore, CredentialSummary, ServiceCredential};
pub use error::{CoreError, ErrorKind};
pub use integration::{ServiceIntegration, integration_for, integrations};
pub use links::{DesiredLink, LinkKind};
pub use pipeline::{NoopObserver, Observer, Pipeline, PipelineEvent, SetupReport, Stage};
pub use readiness::{Readiness, WaitPolicy};
pub use registry::{KeySource, Registry, ServiceDescriptor, ServiceName};
pub use render::{ArtifactKind, ArtifactStatus, RenderOutcome, RenderedArtifact};
pub use settings::{
    AdminAccount, IndexerSpec, LibrarySpec, MediaPaths, ServiceSettings, StackSettings,
    UsenetProvider,
};
pub use verify::{CheckOutcome, CheckResult, RunReport, VerificationCheck, VerificationSuite};
