//! Turns an image URL into something the provider accepts on an order item:
//! preferably a provider-hosted asset id, else the URL itself.

use std::sync::Arc;

use tracing::warn;
use url::Url;

use crate::clients::prodigi::{AssetEntry, ProdigiClient};

/// How the image will be referenced on the outgoing provider item.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetReference {
    /// Provider-side asset id from a successful upload
    Uploaded(String),
    /// Direct URL, used when the candidate is not uploadable or the upload
    /// failed
    Url(String),
}

impl AssetReference {
    pub fn to_entry(&self, print_area: &str) -> AssetEntry {
        match self {
            AssetReference::Uploaded(id) => AssetEntry {
                print_area: print_area.to_string(),
                id: Some(id.clone()),
                url: None,
            },
            AssetReference::Url(url) => AssetEntry {
                print_area: print_area.to_string(),
                id: None,
                url: Some(url.clone()),
            },
        }
    }
}

#[derive(Clone)]
pub struct AssetResolver {
    prodigi: Arc<ProdigiClient>,
}

impl AssetResolver {
    pub fn new(prodigi: Arc<ProdigiClient>) -> Self {
        Self { prodigi }
    }

    /// Uploads http(s) candidates to the provider for a stable reference.
    /// Upload failure falls back to passing the URL through; quoting and
    /// ordering keep working either way.
    pub async fn resolve(&self, candidate: Option<&str>) -> Option<AssetReference> {
        let candidate = candidate.map(str::trim).filter(|c| !c.is_empty())?;

        let is_http = Url::parse(candidate)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !is_http {
            return Some(AssetReference::Url(candidate.to_string()));
        }

        match self.prodigi.create_asset_from_url(candidate).await {
            Ok(asset_id) => Some(AssetReference::Uploaded(asset_id)),
            Err(e) => {
                warn!(error = %e, url = candidate, "asset upload failed, falling back to direct URL");
                Some(AssetReference::Url(candidate.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploaded_reference_serializes_as_id() {
        let entry = AssetReference::Uploaded("ast_1".into()).to_entry("default");
        assert_eq!(entry.id.as_deref(), Some("ast_1"));
        assert!(entry.url.is_none());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["printArea"], "default");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn url_reference_serializes_as_url() {
        let entry = AssetReference::Url("https://cdn.example/a.jpg".into()).to_entry("default");
        assert!(entry.id.is_none());
        assert_eq!(entry.url.as_deref(), Some("https://cdn.example/a.jpg"));
    }
}
