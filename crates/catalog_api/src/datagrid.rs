use serde::Deserialize;
use shared::{
    error::ApiError,
    protocol::{DataGridPayload, FamilyRow, GridAction, GridColumn, GridMeta},
};
use storage::{FamilyListQuery, FamilySortColumn, SortOrder};

use crate::{internal, routes, ApiContext};

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GridQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
}

pub async fn family_grid(ctx: &ApiContext, query: &GridQuery) -> Result<DataGridPayload, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let sort = match query.sort.as_deref() {
        Some("code") => FamilySortColumn::Code,
        Some("name") => FamilySortColumn::Name,
        _ => FamilySortColumn::Id,
    };
    let order = match query.order.as_deref() {
        Some(o) if o.eq_ignore_ascii_case("asc") => SortOrder::Asc,
        _ => SortOrder::Desc,
    };

    let listing = ctx
        .storage
        .list_families(&FamilyListQuery {
            search: query.search.clone(),
            sort,
            order,
            limit: per_page,
            offset: u64::from(page - 1) * u64::from(per_page),
        })
        .await
        .map_err(internal)?;

    let last_page = listing.total.div_ceil(u64::from(per_page)).max(1);

    Ok(DataGridPayload {
        id: "attribute_families".to_string(),
        columns: columns(),
        actions: vec![
            GridAction {
                index: "edit".to_string(),
                title: "Edit".to_string(),
                method: "GET".to_string(),
                route: routes::FAMILIES_EDIT.to_string(),
            },
            GridAction {
                index: "delete".to_string(),
                title: "Delete".to_string(),
                method: "DELETE".to_string(),
                route: routes::FAMILIES_DELETE.to_string(),
            },
        ],
        mass_actions: vec![GridAction {
            index: "delete".to_string(),
            title: "Delete".to_string(),
            method: "DELETE".to_string(),
            route: routes::FAMILIES_MASS_DELETE.to_string(),
        }],
        records: listing
            .families
            .into_iter()
            .map(|family| FamilyRow {
                id: family.id,
                code: family.code,
                name: family.name,
            })
            .collect(),
        meta: GridMeta {
            page,
            per_page,
            total: listing.total,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
            sort: match sort {
                FamilySortColumn::Id => "id",
                FamilySortColumn::Code => "code",
                FamilySortColumn::Name => "name",
            }
            .to_string(),
            order: match order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            }
            .to_string(),
        },
    })
}

fn columns() -> Vec<GridColumn> {
    [("id", "ID", "integer"), ("code", "Code", "string"), ("name", "Name", "string")]
        .into_iter()
        .map(|(index, label, column_type)| GridColumn {
            index: index.to_string(),
            label: label.to_string(),
            column_type: column_type.to_string(),
            searchable: true,
            sortable: true,
            filterable: true,
        })
        .collect()
}
