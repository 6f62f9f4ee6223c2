//! Loads the photo/variant/product triple behind every quote and order and
//! applies the color selection and asset precedence rules in one place.

use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::instrument;
use uuid::Uuid;

use crate::entities::photo_variant::ColorOption;
use crate::entities::{catalog_product, photo, photo_variant};
use crate::errors::ServiceError;

/// The fully loaded context a quote or order is computed against.
#[derive(Debug, Clone)]
pub struct ResolvedVariant {
    pub photo: photo::Model,
    pub variant: photo_variant::Model,
    pub product: catalog_product::Model,
    /// The color the caller picked, or the variant's first option when the
    /// variant has colors and none was requested
    pub selected_color: Option<ColorOption>,
}

#[derive(Clone)]
pub struct VariantResolver {
    db: Arc<DatabaseConnection>,
}

impl VariantResolver {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Loads photo and variant concurrently, joins the catalog product, and
    /// resolves the requested color. Inactive variants are treated as absent.
    #[instrument(skip(self), fields(%photo_id, %variant_id))]
    pub async fn resolve(
        &self,
        photo_id: Uuid,
        variant_id: Uuid,
        color_code: Option<&str>,
    ) -> Result<ResolvedVariant, ServiceError> {
        let photo_query = photo::Entity::find_by_id(photo_id).one(self.db.as_ref());
        let variant_query = photo_variant::Entity::find_by_id(variant_id)
            .filter(photo_variant::Column::IsActive.eq(true))
            .find_also_related(catalog_product::Entity)
            .one(self.db.as_ref());

        let (photo, variant) = tokio::try_join!(photo_query, variant_query)?;

        let photo =
            photo.ok_or_else(|| ServiceError::NotFound(format!("Photo {} not found", photo_id)))?;
        let (variant, product) = variant.ok_or_else(|| {
            ServiceError::NotFound(format!("Variant {} not found", variant_id))
        })?;
        let product = product.ok_or_else(|| {
            ServiceError::ConfigurationError(format!(
                "variant {} references missing catalog product {}",
                variant.id, variant.catalog_product_id
            ))
        })?;

        if variant.photo_id != photo.id {
            return Err(ServiceError::NotFound(format!(
                "Variant {} does not belong to photo {}",
                variant_id, photo_id
            )));
        }

        let selected_color = select_color(&variant.color_options(), color_code)?;

        Ok(ResolvedVariant {
            photo,
            variant,
            product,
            selected_color,
        })
    }
}

/// Case-insensitive color lookup. No options means no selection; a request
/// for a color the variant does not offer is a client error.
fn select_color(
    options: &[ColorOption],
    requested: Option<&str>,
) -> Result<Option<ColorOption>, ServiceError> {
    if options.is_empty() {
        return Ok(None);
    }
    match requested.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => options
            .iter()
            .find(|o| o.code.eq_ignore_ascii_case(code))
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("color '{}' is not available", code))
            }),
        None => Ok(Some(options[0].clone())),
    }
}

/// Picks the image URL to send to the provider. Precedence: caller override,
/// then the selected color's asset, then the variant default, then the
/// photo's stored path resolved against the public base URL.
pub fn select_asset_candidate(
    override_url: Option<&str>,
    resolved: &ResolvedVariant,
    public_base_url: &str,
) -> Option<String> {
    if let Some(url) = override_url.map(str::trim).filter(|u| !u.is_empty()) {
        return Some(url.to_string());
    }
    if let Some(url) = resolved
        .selected_color
        .as_ref()
        .and_then(|c| c.asset_url.as_deref())
        .map(str::trim)
        .filter(|u| !u.is_empty())
    {
        return Some(url.to_string());
    }
    if let Some(url) = resolved
        .variant
        .asset_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
    {
        return Some(url.to_string());
    }
    let path = resolved.photo.image_path.trim();
    if path.is_empty() {
        return None;
    }
    Some(format!(
        "{}/{}",
        public_base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}
