//! Layer resolution
//!
//! Works out the ordered chain of layers a top layer needs: the top layer
//! first, then its base, then the base's base. Online, the chain comes from
//! the release document `{remote}/release.xml`:
//!
//! ```xml
//! <Release>
//!   <Branch>
//!     <Layer uri="app" BaseLayerURIs="platform"/>
//!     <Layer uri="platform" BaseLayerURIs=""/>
//!   </Branch>
//! </Release>
//! ```
//!
//! Offline, each already mirrored `{root}/{layer}/layer.xml` names its base.

use crate::error::{StrataError, StrataResult};
use crate::release::Release;
use crate::transport::{join_url, Transport};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Release document at the remote root of a release
pub const RELEASE_DOCUMENT: &str = "release.xml";

/// Per-layer definition file inside each layer directory
pub const LAYER_DEFINITION: &str = "layer.xml";

static LAYER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Layer\b([^>]*)>").expect("valid regex"));
static URI_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\buri\s*=\s*"([^"]*)""#).expect("valid regex"));
static BASE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bBaseLayerURIs\s*=\s*"([^"]*)""#).expect("valid regex"));

/// One link of a layer chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredLayer {
    pub name: String,
    /// Local layer definition; `None` when the layer could not be resolved
    pub definition: Option<PathBuf>,
}

impl RequiredLayer {
    pub fn resolved(name: impl Into<String>, definition: PathBuf) -> Self {
        Self {
            name: name.into(),
            definition: Some(definition),
        }
    }

    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.definition.is_some()
    }
}

/// Determines which layers a top layer requires
#[async_trait]
pub trait LayerResolver: Send + Sync {
    /// Ordered chain for `top`, top layer first.
    ///
    /// Layers that cannot be resolved are still listed, with no definition.
    async fn resolve(
        &self,
        release: &Release,
        top: &str,
        allow_network: bool,
    ) -> StrataResult<Vec<RequiredLayer>>;
}

/// Resolves chains from release and layer documents
pub struct ReleaseLayerResolver {
    transport: Arc<dyn Transport>,
}

impl ReleaseLayerResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn resolve_online(&self, release: &Release, top: &str) -> Vec<RequiredLayer> {
        let url = join_url(&release.remote_url(), RELEASE_DOCUMENT);
        let document = match self.transport.read_to_string(&url).await {
            Ok(document) => document,
            Err(e) => {
                debug!("Release document unavailable: {}", e);
                return vec![RequiredLayer::unresolved(top)];
            }
        };

        let bases = parse_release_layers(&document);
        let root = release.local_root();
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(top.to_string());

        while let Some(name) = next.take() {
            if !seen.insert(name.clone()) {
                debug!("Layer chain loops back to {}", name);
                break;
            }
            match bases.get(&name) {
                Some(base) if validate_layer_name(&name).is_ok() => {
                    chain.push(RequiredLayer::resolved(
                        &name,
                        root.join(&name).join(LAYER_DEFINITION),
                    ));
                    next = base.clone();
                }
                _ => chain.push(RequiredLayer::unresolved(name)),
            }
        }
        chain
    }

    async fn resolve_offline(&self, release: &Release, top: &str) -> Vec<RequiredLayer> {
        let root = release.local_root();
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(top.to_string());

        while let Some(name) = next.take() {
            if !seen.insert(name.clone()) {
                debug!("Layer chain loops back to {}", name);
                break;
            }
            if validate_layer_name(&name).is_err() {
                chain.push(RequiredLayer::unresolved(name));
                break;
            }

            let definition = root.join(&name).join(LAYER_DEFINITION);
            if !tokio::fs::try_exists(&definition).await.unwrap_or(false) {
                chain.push(RequiredLayer::unresolved(name));
                break;
            }
            next = match tokio::fs::read_to_string(&definition).await {
                Ok(content) => base_of(&content),
                Err(e) => {
                    debug!("Cannot read {}: {}", definition.display(), e);
                    None
                }
            };
            chain.push(RequiredLayer::resolved(name, definition));
        }
        chain
    }
}

#[async_trait]
impl LayerResolver for ReleaseLayerResolver {
    async fn resolve(
        &self,
        release: &Release,
        top: &str,
        allow_network: bool,
    ) -> StrataResult<Vec<RequiredLayer>> {
        validate_layer_name(top)?;
        let chain = if allow_network {
            self.resolve_online(release, top).await
        } else {
            self.resolve_offline(release, top).await
        };
        debug!(
            "Resolved {} to [{}]",
            top,
            chain
                .iter()
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(chain)
    }
}

/// Layer name → first base layer, from a release document
fn parse_release_layers(document: &str) -> HashMap<String, Option<String>> {
    LAYER_TAG
        .captures_iter(document)
        .filter_map(|tag| {
            let attrs = tag.get(1)?.as_str();
            let uri = URI_ATTR.captures(attrs)?.get(1)?.as_str().to_string();
            Some((uri, base_of(attrs)))
        })
        .collect()
}

/// First entry of a `BaseLayerURIs` attribute, if any
fn base_of(attrs: &str) -> Option<String> {
    BASE_ATTR
        .captures(attrs)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().split_whitespace().next())
        .map(str::to_string)
}

/// Validate that a layer name is safe (no path traversal, no special characters).
pub fn validate_layer_name(name: &str) -> StrataResult<()> {
    let invalid = |reason: &str| StrataError::LayerInvalid {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(invalid("must not contain path separators or '..'"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(invalid(
            "must contain only alphanumeric characters, dots, hyphens, or underscores",
        ));
    }
    Ok(())
}
