//! Attribute family admin operations: listing, create/edit forms, store, update,
//! single and bulk delete. Framework-free; the HTTP layer maps results onto
//! responses.

pub mod datagrid;
pub mod messages;
pub mod routes;
pub mod validation;

use serde::Serialize;
use shared::{
    domain::AttributeFamilyId,
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        AttributeFamilyInput, CatalogEvent, DataGridPayload, FamilyFormData, Flash,
        MassDestroyRequest, MessageResponse, PageView, Redirect, RedirectTarget,
    },
};
use storage::{FamilyDeletion, Storage};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use datagrid::GridQuery;
use validation::validate_family;

pub const DEFAULT_FAMILY_CODE: &str = "default";

pub const INDEX_VIEW: &str = "admin::catalog.families.index";
pub const CREATE_VIEW: &str = "admin::catalog.families.create";
pub const EDIT_VIEW: &str = "admin::catalog.families.edit";

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub events: broadcast::Sender<CatalogEvent>,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        let (events, _) = broadcast::channel(256);
        Self { storage, events }
    }

    /// Publishes to whoever is subscribed; having no subscribers is fine.
    pub fn dispatch(&self, event: CatalogEvent) {
        debug!(event = event.name(), "dispatching catalog event");
        let _ = self.events.send(event);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IndexResponse {
    Grid(DataGridPayload),
    Page(PageView<()>),
}

pub async fn index(
    ctx: &ApiContext,
    ajax: bool,
    query: &GridQuery,
) -> Result<IndexResponse, ApiError> {
    if ajax {
        return datagrid::family_grid(ctx, query)
            .await
            .map(IndexResponse::Grid);
    }

    Ok(IndexResponse::Page(PageView {
        view: INDEX_VIEW.to_string(),
        data: None,
    }))
}

/// Form data for a new family, prefilled from the `default` family's groups.
pub async fn create(ctx: &ApiContext) -> Result<PageView<FamilyFormData>, ApiError> {
    let default_family = ctx
        .storage
        .find_family_by_code(DEFAULT_FAMILY_CODE)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            ApiError::new(
                ErrorCode::NotFound,
                format!("attribute family '{DEFAULT_FAMILY_CODE}' not found"),
            )
        })?;

    form_view(ctx, CREATE_VIEW, default_family.id).await
}

pub async fn store(ctx: &ApiContext, input: AttributeFamilyInput) -> Result<Redirect, ApiError> {
    let validated = validate_family(&ctx.storage, input, None).await?;

    ctx.dispatch(CatalogEvent::AttributeFamilyCreateBefore);

    let family_id = ctx
        .storage
        .create_family(validated.record())
        .await
        .map_err(internal)?;
    let family = ctx
        .storage
        .load_family_detail(family_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Internal, "created family vanished"))?;
    info!(family_id = family_id.0, code = %family.family.code, "attribute family created");

    ctx.dispatch(CatalogEvent::AttributeFamilyCreateAfter { family });

    Ok(to_index(Flash::success(messages::CREATE_SUCCESS)))
}

pub async fn edit(
    ctx: &ApiContext,
    family_id: AttributeFamilyId,
) -> Result<PageView<FamilyFormData>, ApiError> {
    form_view(ctx, EDIT_VIEW, family_id).await
}

pub async fn update(
    ctx: &ApiContext,
    family_id: AttributeFamilyId,
    input: AttributeFamilyInput,
) -> Result<Redirect, ApiError> {
    find_or_fail(ctx, family_id).await?;
    let validated = validate_family(&ctx.storage, input, Some(family_id)).await?;

    ctx.dispatch(CatalogEvent::AttributeFamilyUpdateBefore { id: family_id });

    let updated = ctx
        .storage
        .update_family(family_id, validated.record())
        .await
        .map_err(internal)?;
    if !updated {
        return Err(not_found(family_id));
    }
    let family = ctx
        .storage
        .load_family_detail(family_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(family_id))?;
    info!(family_id = family_id.0, code = %family.family.code, "attribute family updated");

    ctx.dispatch(CatalogEvent::AttributeFamilyUpdateAfter { family });

    Ok(to_index(Flash::success(messages::UPDATE_SUCCESS)))
}

/// Deletes one family. Guard violations are `BadRequest`; a failing delete is
/// logged and reported as `Internal` with a generic message.
pub async fn destroy(
    ctx: &ApiContext,
    family_id: AttributeFamilyId,
) -> Result<MessageResponse, ApiError> {
    find_or_fail(ctx, family_id).await?;
    ensure_deletable(ctx, family_id).await.map_err(ApiError::from)?;

    remove_family(ctx, family_id).await?;
    info!(family_id = family_id.0, "attribute family deleted");

    Ok(MessageResponse {
        message: messages::DELETE_SUCCESS.to_string(),
    })
}

/// Deletes every id in `request.indexes` in order, skipping the ones that fail.
/// Only delete-style requests are honoured: `DELETE`, or `POST` with `_method=delete`.
pub async fn mass_destroy(ctx: &ApiContext, method: &str, request: MassDestroyRequest) -> Redirect {
    if !is_delete_request(method, request.method.as_deref()) {
        warn!(%method, "mass delete rejected for non-delete request");
        return back(Flash::error(messages::MASS_METHOD_ERROR));
    }

    let mut failed = 0usize;
    let mut deleted = 0usize;
    for raw in request.indexes.split(',') {
        match delete_one(ctx, raw).await {
            Ok(_) => deleted += 1,
            Err(e) => {
                error!(index = raw, error = %e, "mass delete skipped attribute family");
                failed += 1;
            }
        }
    }
    info!(deleted, failed, "attribute family mass delete finished");

    if failed == 0 {
        back(Flash::success(messages::MASS_DELETE_SUCCESS))
    } else {
        back(Flash::info(messages::MASS_PARTIAL_ACTION))
    }
}

pub fn is_delete_request(method: &str, spoofed: Option<&str>) -> bool {
    if method.eq_ignore_ascii_case("DELETE") {
        return true;
    }
    method.eq_ignore_ascii_case("POST")
        && spoofed.is_some_and(|m| m.trim().eq_ignore_ascii_case("DELETE"))
}

async fn delete_one(ctx: &ApiContext, raw: &str) -> Result<AttributeFamilyId, ApiException> {
    let family_id = raw
        .trim()
        .parse::<i64>()
        .map(AttributeFamilyId)
        .map_err(|_| ApiException::new(ErrorCode::Validation, format!("invalid family id '{raw}'")))?;

    find_or_fail(ctx, family_id).await?;
    ensure_deletable(ctx, family_id).await?;

    remove_family(ctx, family_id).await?;

    Ok(family_id)
}

/// Runs the delete between the `delete.before` and `delete.after` events. Storage
/// re-checks the last-family rule inside the `DELETE`, which catches a concurrent
/// delete that passed `ensure_deletable` at the same time.
async fn remove_family(
    ctx: &ApiContext,
    family_id: AttributeFamilyId,
) -> Result<(), ApiException> {
    ctx.dispatch(CatalogEvent::AttributeFamilyDeleteBefore { id: family_id });

    match ctx.storage.delete_family(family_id).await {
        Ok(FamilyDeletion::Deleted) => {
            ctx.dispatch(CatalogEvent::AttributeFamilyDeleteAfter { id: family_id });
            Ok(())
        }
        Ok(FamilyDeletion::LastFamily) => {
            warn!(
                family_id = family_id.0,
                "concurrent delete left this as the last attribute family"
            );
            Err(ApiException::new(
                ErrorCode::BadRequest,
                messages::LAST_DELETE_ERROR,
            ))
        }
        Ok(FamilyDeletion::Missing) => Err(not_found(family_id).into()),
        Err(e) => {
            error!(family_id = family_id.0, error = ?e, "attribute family delete failed");
            Err(ApiException::new(ErrorCode::Internal, messages::DELETE_FAILED))
        }
    }
}

/// The last family and families still used by products must stay.
async fn ensure_deletable(
    ctx: &ApiContext,
    family_id: AttributeFamilyId,
) -> Result<(), ApiException> {
    let total = ctx
        .storage
        .count_families()
        .await
        .map_err(|e| ApiException::new(ErrorCode::Internal, e.to_string()))?;
    if total <= 1 {
        warn!(family_id = family_id.0, "refusing to delete the last attribute family");
        return Err(ApiException::new(
            ErrorCode::BadRequest,
            messages::LAST_DELETE_ERROR,
        ));
    }

    let products = ctx
        .storage
        .count_family_products(family_id)
        .await
        .map_err(|e| ApiException::new(ErrorCode::Internal, e.to_string()))?;
    if products > 0 {
        warn!(family_id = family_id.0, products, "attribute family is used by products");
        return Err(ApiException::new(
            ErrorCode::BadRequest,
            messages::ATTRIBUTE_PRODUCT_ERROR,
        ));
    }

    Ok(())
}

async fn form_view(
    ctx: &ApiContext,
    view: &str,
    family_id: AttributeFamilyId,
) -> Result<PageView<FamilyFormData>, ApiError> {
    let attribute_family = ctx
        .storage
        .load_family_detail(family_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(family_id))?;
    let custom_attributes = ctx.storage.list_attributes().await.map_err(internal)?;

    Ok(PageView {
        view: view.to_string(),
        data: Some(FamilyFormData {
            attribute_family,
            custom_attributes,
        }),
    })
}

async fn find_or_fail(ctx: &ApiContext, family_id: AttributeFamilyId) -> Result<(), ApiError> {
    ctx.storage
        .find_family(family_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(family_id))?;
    Ok(())
}

fn to_index(flash: Flash) -> Redirect {
    Redirect {
        to: RedirectTarget::Route(routes::FAMILIES_INDEX.to_string()),
        flash,
    }
}

fn back(flash: Flash) -> Redirect {
    Redirect {
        to: RedirectTarget::Back,
        flash,
    }
}

fn not_found(family_id: AttributeFamilyId) -> ApiError {
    ApiError::new(
        ErrorCode::NotFound,
        format!("attribute family {} not found", family_id.0),
    )
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
