use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{
        Attribute, AttributeFamily, AttributeFamilyDetail, AttributeFamilyId, AttributeGroup,
        AttributeGroupId, AttributeId, AttributeType, GroupAttribute, ProductId,
    },
    protocol::AttributeGroupInput,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Everything written on create/update. Groups replace the stored ones wholesale.
#[derive(Debug, Clone, Copy)]
pub struct FamilyRecord<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub attribute_groups: &'a [AttributeGroupInput],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilySortColumn {
    Id,
    Code,
    Name,
}

impl FamilySortColumn {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Code => "code",
            Self::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Result of [`Storage::delete_family`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyDeletion {
    Deleted,
    Missing,
    LastFamily,
}

#[derive(Debug, Clone)]
pub struct FamilyListQuery {
    pub search: Option<String>,
    pub sort: FamilySortColumn,
    pub order: SortOrder,
    pub limit: u32,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct FamilyPage {
    pub families: Vec<AttributeFamily>,
    pub total: u64,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_attribute(
        &self,
        code: &str,
        admin_name: &str,
        attribute_type: AttributeType,
        is_user_defined: bool,
    ) -> Result<AttributeId> {
        let rec = sqlx::query(
            "INSERT INTO attributes (code, admin_name, type, is_user_defined)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(code)
        .bind(admin_name)
        .bind(attribute_type.as_str())
        .bind(is_user_defined)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create attribute '{code}'"))?;
        Ok(AttributeId(rec.get::<i64, _>(0)))
    }

    pub async fn list_attributes(&self) -> Result<Vec<Attribute>> {
        let rows = sqlx::query(
            "SELECT id, code, admin_name, type, is_user_defined FROM attributes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Attribute {
                id: AttributeId(r.get::<i64, _>(0)),
                code: r.get::<String, _>(1),
                admin_name: r.get::<String, _>(2),
                attribute_type: AttributeType::from_db(&r.get::<String, _>(3)),
                is_user_defined: r.get::<bool, _>(4),
            })
            .collect())
    }

    pub async fn find_family(&self, family_id: AttributeFamilyId) -> Result<Option<AttributeFamily>> {
        let row = sqlx::query(
            "SELECT id, code, name, created_at, updated_at FROM attribute_families WHERE id = ?",
        )
        .bind(family_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(family_from_row))
    }

    pub async fn find_family_by_code(&self, code: &str) -> Result<Option<AttributeFamily>> {
        let row = sqlx::query(
            "SELECT id, code, name, created_at, updated_at FROM attribute_families WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(family_from_row))
    }

    /// Loads a family with its groups and each group's attributes, all in position order.
    pub async fn load_family_detail(
        &self,
        family_id: AttributeFamilyId,
    ) -> Result<Option<AttributeFamilyDetail>> {
        let Some(family) = self.find_family(family_id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT g.id, g.name, g.group_column, g.position,
                    a.id, a.code, a.admin_name, a.type, a.is_user_defined, m.position
             FROM attribute_groups g
             LEFT JOIN attribute_group_mappings m ON m.attribute_group_id = g.id
             LEFT JOIN attributes a ON a.id = m.attribute_id
             WHERE g.attribute_family_id = ?
             ORDER BY g.position, g.id, m.position, a.id",
        )
        .bind(family_id.0)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to load groups for family {}", family_id.0))?;

        let mut attribute_groups: Vec<AttributeGroup> = Vec::new();
        for r in rows {
            let group_id = AttributeGroupId(r.get::<i64, _>(0));
            if attribute_groups.last().map(|g| g.id) != Some(group_id) {
                attribute_groups.push(AttributeGroup {
                    id: group_id,
                    name: r.get::<String, _>(1),
                    column: r.get::<i64, _>(2),
                    position: r.get::<i64, _>(3),
                    custom_attributes: Vec::new(),
                });
            }
            let Some(attribute_id) = r.get::<Option<i64>, _>(4) else {
                continue;
            };
            if let Some(group) = attribute_groups.last_mut() {
                group.custom_attributes.push(GroupAttribute {
                    attribute: Attribute {
                        id: AttributeId(attribute_id),
                        code: r.get::<String, _>(5),
                        admin_name: r.get::<String, _>(6),
                        attribute_type: AttributeType::from_db(&r.get::<String, _>(7)),
                        is_user_defined: r.get::<bool, _>(8),
                    },
                    position: r.get::<i64, _>(9),
                });
            }
        }

        Ok(Some(AttributeFamilyDetail {
            family,
            attribute_groups,
        }))
    }

    pub async fn family_code_taken(
        &self,
        code: &str,
        ignore_id: Option<AttributeFamilyId>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attribute_families WHERE code = ? AND (? IS NULL OR id <> ?)",
        )
        .bind(code)
        .bind(ignore_id.map(|id| id.0))
        .bind(ignore_id.map(|id| id.0))
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn count_families(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attribute_families")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn count_family_products(&self, family_id: AttributeFamilyId) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE attribute_family_id = ?")
                .bind(family_id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    pub async fn create_family(&self, record: FamilyRecord<'_>) -> Result<AttributeFamilyId> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO attribute_families (code, name, created_at, updated_at)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(record.code)
        .bind(record.name)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to insert family '{}'", record.code))?;
        let family_id = AttributeFamilyId(rec.get::<i64, _>(0));

        replace_groups(&mut tx, family_id, record.attribute_groups).await?;
        tx.commit().await?;
        Ok(family_id)
    }

    /// Returns `false` when no family has the given id.
    pub async fn update_family(
        &self,
        family_id: AttributeFamilyId,
        record: FamilyRecord<'_>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE attribute_families SET code = ?, name = ?, updated_at = ? WHERE id = ?",
        )
        .bind(record.code)
        .bind(record.name)
        .bind(Utc::now())
        .bind(family_id.0)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to update family {}", family_id.0))?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        replace_groups(&mut tx, family_id, record.attribute_groups).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Deletes a family unless it is the only one left. The count is part of the
    /// `DELETE` itself, so concurrent deletes cannot remove the last family.
    /// Fails if products still reference the family.
    pub async fn delete_family(&self, family_id: AttributeFamilyId) -> Result<FamilyDeletion> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "DELETE FROM attribute_families
             WHERE id = ? AND (SELECT COUNT(*) FROM attribute_families) > 1",
        )
        .bind(family_id.0)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to delete family {}", family_id.0))?;

        let outcome = if result.rows_affected() > 0 {
            FamilyDeletion::Deleted
        } else {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT id FROM attribute_families WHERE id = ?")
                    .bind(family_id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
            match exists {
                Some(_) => FamilyDeletion::LastFamily,
                None => FamilyDeletion::Missing,
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn list_families(&self, query: &FamilyListQuery) -> Result<FamilyPage> {
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(&s.to_lowercase())));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attribute_families
             WHERE ? IS NULL OR lower(code) LIKE ? ESCAPE '\\' OR lower(name) LIKE ? ESCAPE '\\'",
        )
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let order = match query.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let sql = format!(
            "SELECT id, code, name, created_at, updated_at FROM attribute_families
             WHERE ? IS NULL OR lower(code) LIKE ? ESCAPE '\\' OR lower(name) LIKE ? ESCAPE '\\'
             ORDER BY {} {order}, id {order}
             LIMIT ? OFFSET ?",
            query.sort.as_sql()
        );
        let rows = sqlx::query(&sql)
            .bind(pattern.as_deref())
            .bind(pattern.as_deref())
            .bind(pattern.as_deref())
            .bind(i64::from(query.limit))
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(FamilyPage {
            families: rows.into_iter().map(family_from_row).collect(),
            total: total as u64,
        })
    }

    pub async fn create_product(
        &self,
        sku: &str,
        family_id: AttributeFamilyId,
    ) -> Result<ProductId> {
        let rec = sqlx::query(
            "INSERT INTO products (sku, attribute_family_id, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(sku)
        .bind(family_id.0)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create product '{sku}'"))?;
        Ok(ProductId(rec.get::<i64, _>(0)))
    }
}

async fn replace_groups(
    tx: &mut Transaction<'_, Sqlite>,
    family_id: AttributeFamilyId,
    groups: &[AttributeGroupInput],
) -> Result<()> {
    sqlx::query("DELETE FROM attribute_groups WHERE attribute_family_id = ?")
        .bind(family_id.0)
        .execute(&mut **tx)
        .await?;

    for (index, group) in groups.iter().enumerate() {
        let rec = sqlx::query(
            "INSERT INTO attribute_groups (attribute_family_id, name, group_column, position)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(family_id.0)
        .bind(group.name.trim())
        .bind(group.column.unwrap_or(1))
        .bind(group.position.unwrap_or(index as i64 + 1))
        .fetch_one(&mut **tx)
        .await
        .with_context(|| format!("failed to insert attribute group '{}'", group.name))?;
        let group_id = rec.get::<i64, _>(0);

        for (attr_index, attribute) in group.custom_attributes.iter().enumerate() {
            sqlx::query(
                "INSERT INTO attribute_group_mappings (attribute_id, attribute_group_id, position)
                 VALUES (?, ?, ?)",
            )
            .bind(attribute.id.0)
            .bind(group_id)
            .bind(attribute.position.unwrap_or(attr_index as i64 + 1))
            .execute(&mut **tx)
            .await
            .with_context(|| {
                format!(
                    "failed to map attribute {} into group '{}'",
                    attribute.id.0, group.name
                )
            })?;
        }
    }

    Ok(())
}

fn family_from_row(r: SqliteRow) -> AttributeFamily {
    AttributeFamily {
        id: AttributeFamilyId(r.get::<i64, _>(0)),
        code: r.get::<String, _>(1),
        name: r.get::<String, _>(2),
        created_at: r.get::<DateTime<Utc>, _>(3),
        updated_at: r.get::<DateTime<Utc>, _>(4),
    }
}

/// Makes `%`, `_` and `\` match literally under `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
