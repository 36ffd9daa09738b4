// ── Template renderer ──
//
// `{{TOKEN}}` substitution over the built-in templates (or same-named
// overrides from the declared templates directory). Unknown tokens render
// as the empty string. A destination is only rewritten when its content
// would change, so repeated runs leave file timestamps alone.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use secrecy::ExposeSecret;
use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::error::CoreError;
use crate::registry::ServiceName;
use crate::settings::StackSettings;

pub type Bindings = BTreeMap<String, String>;

static TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    #[strum(to_string = "proxy rules")]
    ProxyRules,
    #[strum(to_string = "dashboard")]
    Dashboard,
    #[strum(to_string = "cleanup job")]
    CleanupJob,
    #[strum(to_string = "compose env")]
    ComposeEnv,
}

impl ArtifactKind {
    pub fn label(self) -> String {
        self.to_string()
    }

    pub fn template_name(self) -> &'static str {
        match self {
            Self::ProxyRules => "proxy.yml",
            Self::Dashboard => "services.yaml",
            Self::CleanupJob => "unpackerr.conf",
            Self::ComposeEnv => "stack.env",
        }
    }

    fn builtin(self) -> &'static str {
        match self {
            Self::ProxyRules => include_str!("../templates/proxy.yml"),
            Self::Dashboard => include_str!("../templates/services.yaml"),
            Self::CleanupJob => include_str!("../templates/unpackerr.conf"),
            Self::ComposeEnv => include_str!("../templates/stack.env"),
        }
    }
}

/// One generated file and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub destination: PathBuf,
}

pub fn artifacts(settings: &StackSettings) -> Vec<Artifact> {
    let root = &settings.config_root;
    ArtifactKind::iter()
        .map(|kind| {
            let destination = match kind {
                ArtifactKind::ProxyRules => root.join("traefik").join("dynamic").join("medialink.yml"),
                ArtifactKind::Dashboard => root.join("homepage").join("services.yaml"),
                ArtifactKind::CleanupJob => root.join("unpackerr").join("unpackerr.conf"),
                ArtifactKind::ComposeEnv => settings.stack_dir.join(".env"),
            };
            Artifact { kind, destination }
        })
        .collect()
}

/// Template text: the declared override if present, else the built-in.
pub fn load_template(kind: ArtifactKind, settings: &StackSettings) -> Result<String, CoreError> {
    if let Some(dir) = &settings.templates_dir {
        let path = dir.join(kind.template_name());
        if path.is_file() {
            debug!(path = %path.display(), "using template override");
            return std::fs::read_to_string(&path).map_err(|source| CoreError::Render {
                path: path.display().to_string(),
                source,
            });
        }
    }
    Ok(kind.builtin().to_owned())
}

/// Substitute every `{{TOKEN}}`. Deterministic for equal inputs.
pub fn render(template: &str, bindings: &Bindings) -> String {
    let Some(re) = TOKEN.as_ref() else {
        return template.to_owned();
    };
    re.replace_all(template, |caps: &Captures<'_>| {
        bindings.get(&caps[1]).cloned().unwrap_or_default()
    })
    .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderOutcome {
    Written,
    Unchanged,
}

/// Render and write `dest` only if the content differs from what is there.
pub fn render_to_file(
    template: &str,
    dest: &Path,
    bindings: &Bindings,
) -> Result<RenderOutcome, CoreError> {
    let content = render(template, bindings);
    let io_err = |source| CoreError::Render {
        path: dest.display().to_string(),
        source,
    };

    if std::fs::read_to_string(dest).is_ok_and(|existing| existing == content) {
        return Ok(RenderOutcome::Unchanged);
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(dest, content).map_err(io_err)?;
    Ok(RenderOutcome::Written)
}

/// Values available to every template.
pub fn bindings(ctx: &RunContext) -> Bindings {
    let settings = ctx.settings();
    let mut b = Bindings::new();

    b.insert("TZ".into(), settings.timezone.clone());
    b.insert("PUID".into(), settings.puid.to_string());
    b.insert("PGID".into(), settings.pgid.to_string());
    b.insert("DOMAIN".into(), settings.domain.clone());
    b.insert("USERNAME".into(), settings.admin.username.clone());
    b.insert("CONFIG_ROOT".into(), settings.config_root.display().to_string());
    b.insert("DOWNLOADS_DIR".into(), settings.paths.downloads.clone());
    b.insert("TV_DIR".into(), settings.paths.tv.clone());
    b.insert("MOVIES_DIR".into(), settings.paths.movies.clone());
    b.insert("MUSIC_DIR".into(), settings.paths.music.clone());

    for descriptor in ctx.registry().iter() {
        let prefix = descriptor.name.as_ref().to_ascii_uppercase();
        b.insert(format!("{prefix}_URL"), descriptor.internal_base());
        b.insert(
            format!("{prefix}_EXTERNAL_URL"),
            descriptor.external_url.as_str().trim_end_matches('/').to_owned(),
        );
        let key = ctx
            .api_key(descriptor.name)
            .map(|k| k.expose_secret().to_owned())
            .unwrap_or_default();
        b.insert(format!("{prefix}_API_KEY"), key);
    }

    b
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactStatus {
    Written,
    Unchanged,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedArtifact {
    pub kind: ArtifactKind,
    pub destination: PathBuf,
    #[serde(flatten)]
    pub status: ArtifactStatus,
}

/// Render every artifact. A failure on one does not stop the others.
pub fn render_all(
    ctx: &RunContext,
    on_result: &mut dyn FnMut(&RenderedArtifact),
) -> Vec<RenderedArtifact> {
    let bindings = bindings(ctx);
    let mut results = Vec::new();

    for artifact in artifacts(ctx.settings()) {
        let outcome = load_template(artifact.kind, ctx.settings())
            .and_then(|template| render_to_file(&template, &artifact.destination, &bindings));
        let status = match outcome {
            Ok(RenderOutcome::Written) => {
                info!(artifact = %artifact.kind, path = %artifact.destination.display(), "rendered");
                ArtifactStatus::Written
            }
            Ok(RenderOutcome::Unchanged) => ArtifactStatus::Unchanged,
            Err(e) => {
                warn!(artifact = %artifact.kind, error = %e, "render failed");
                ArtifactStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        let rendered = RenderedArtifact {
            kind: artifact.kind,
            destination: artifact.destination,
            status,
        };
        on_result(&rendered);
        results.push(rendered);
    }

    results
}

/// Every token name a template references.
pub fn tokens(template: &str) -> Vec<String> {
    TOKEN
        .as_ref()
        .map(|re| {
            re.captures_iter(template)
                .map(|c| c[1].to_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Whether `name` is a binding the renderer produces. Anything else renders
/// empty.
pub fn known_token(name: &str) -> bool {
    const FIXED: [&str; 10] = [
        "TZ",
        "PUID",
        "PGID",
        "DOMAIN",
        "USERNAME",
        "CONFIG_ROOT",
        "DOWNLOADS_DIR",
        "TV_DIR",
        "MOVIES_DIR",
        "MUSIC_DIR",
    ];
    FIXED.contains(&name)
        || ServiceName::all().any(|s| {
            let prefix = s.as_ref().to_ascii_uppercase();
            [
                format!("{prefix}_URL"),
                format!("{prefix}_EXTERNAL_URL"),
                format!("{prefix}_API_KEY"),
            ]
            .iter()
            .any(|t| t == name)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn bind(pairs: &[(&str, &str)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn substitutes_tokens_with_inner_whitespace() {
        let out = render(
            "url: {{SONARR_URL}}\nkey: {{ SONARR_API_KEY }}\n",
            &bind(&[("SONARR_URL", "http://sonarr:8989"), ("SONARR_API_KEY", "abc")]),
        );
        assert_eq!(out, "url: http://sonarr:8989\nkey: abc\n");
    }

    #[test]
    fn unresolved_tokens_render_empty() {
        assert_eq!(render("key={{MISSING}};", &Bindings::new()), "key=;");
    }

    #[test]
    fn lowercase_braces_are_left_alone() {
        let template = "{{ .Values.name }} {{lower}}";
        assert_eq!(render(template, &Bindings::new()), template);
    }

    #[test]
    fn rendering_is_deterministic() {
        let bindings = bind(&[("TZ", "Europe/Berlin"), ("PUID", "1000")]);
        let template = ArtifactKind::ComposeEnv.builtin();
        assert_eq!(render(template, &bindings), render(template, &bindings));
    }

    #[test]
    fn changed_binding_only_touches_its_line() {
        let template = ArtifactKind::ComposeEnv.builtin();
        let berlin = render(template, &bind(&[("TZ", "Europe/Berlin"), ("PUID", "1000")]));
        let tokyo = render(template, &bind(&[("TZ", "Asia/Tokyo"), ("PUID", "1000")]));

        assert_eq!(berlin.lines().count(), tokyo.lines().count());
        let changed: Vec<_> = berlin
            .lines()
            .zip(tokyo.lines())
            .filter(|(a, b)| a != b)
            .collect();
        assert_eq!(changed, vec![("TZ=Europe/Berlin", "TZ=Asia/Tokyo")]);
    }

    #[test]
    fn render_to_file_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("out.env");
        let bindings = bind(&[("TZ", "UTC")]);

        assert_eq!(
            render_to_file("TZ={{TZ}}\n", &dest, &bindings).unwrap(),
            RenderOutcome::Written
        );
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "TZ=UTC\n");
        assert_eq!(
            render_to_file("TZ={{TZ}}\n", &dest, &bindings).unwrap(),
            RenderOutcome::Unchanged
        );
        assert_eq!(
            render_to_file("TZ={{TZ}}\n", &dest, &bind(&[("TZ", "CET")])).unwrap(),
            RenderOutcome::Written
        );
    }

    #[test]
    fn builtin_templates_only_use_known_tokens() {
        for kind in ArtifactKind::iter() {
            for token in tokens(kind.builtin()) {
                assert!(known_token(&token), "{kind}: unknown token {token}");
            }
        }
    }

    #[test]
    fn override_directory_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stack.env"), "CUSTOM={{TZ}}\n").unwrap();
        let mut settings = StackSettings::new(
            "/srv/config",
            crate::settings::AdminAccount {
                username: "a".into(),
                password: secrecy::SecretString::from("p"),
                email: String::new(),
            },
        );
        settings.templates_dir = Some(dir.path().to_path_buf());

        assert_eq!(
            load_template(ArtifactKind::ComposeEnv, &settings).unwrap(),
            "CUSTOM={{TZ}}\n"
        );
        assert!(
            load_template(ArtifactKind::Dashboard, &settings)
                .unwrap()
                .contains("JELLYFIN_API_KEY")
        );
    }
}
