pub mod models;

use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::catalog::KnowledgeBase;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0} already exists")]
    AlreadyExists(String),
}

/// Unique and primary key violations become `DbError::AlreadyExists`.
fn conflict(err: sqlx::Error, what: String) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::AlreadyExists(what).into()
        }
        _ => err.into(),
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        // An in-memory database lives only as long as its connection.
        let options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                username TEXT,
                full_name TEXT,
                started_at TEXT NOT NULL,
                last_active TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                preferences TEXT NOT NULL DEFAULT '{}',
                metadata TEXT NOT NULL DEFAULT '{}'
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS user_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                short_description TEXT,
                category TEXT,
                price REAL,
                benefits TEXT NOT NULL DEFAULT '[]',
                short_benefits TEXT NOT NULL DEFAULT '[]',
                indications TEXT NOT NULL DEFAULT '[]',
                properties TEXT NOT NULL DEFAULT '[]',
                components TEXT NOT NULL DEFAULT '[]',
                tags TEXT NOT NULL DEFAULT '[]',
                composition TEXT,
                dosage TEXT,
                contraindications TEXT,
                image_id TEXT,
                url TEXT,
                form TEXT,
                weight TEXT,
                volume TEXT,
                is_available BOOLEAN NOT NULL DEFAULT 1,
                rating REAL NOT NULL DEFAULT 0,
                review_count INTEGER NOT NULL DEFAULT 0,
                product_metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_stats_user ON user_stats(user_id, timestamp)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_category ON products(category)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ── User Operations ────────────────────────────────────────────

    /// Register the user on first contact and refresh `last_active`.
    /// The flag is `true` when the row was just created.
    pub async fn upsert_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> anyhow::Result<(models::User, bool)> {
        let now = Utc::now();
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (user_id, username, full_name, started_at, last_active)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(full_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;

        let user = sqlx::query_as::<_, models::User>(
            r#"
            UPDATE users
            SET last_active = ?,
                username = COALESCE(?, username),
                full_name = COALESCE(?, full_name)
            WHERE user_id = ?
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(username)
        .bind(full_name)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((user, inserted))
    }

    pub async fn create_user(&self, new: &models::NewUser) -> anyhow::Result<models::User> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, models::User>(
            r#"
            INSERT INTO users (user_id, username, full_name, started_at, last_active, preferences, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(&new.username)
        .bind(&new.full_name)
        .bind(now)
        .bind(now)
        .bind(Json(new.preferences.clone().unwrap_or_else(empty_object)))
        .bind(Json(new.metadata.clone().unwrap_or_else(empty_object)))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict(e, format!("user {}", new.user_id)))?;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: i64) -> anyhow::Result<Option<models::User>> {
        let user = sqlx::query_as::<_, models::User>("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_users(&self, skip: i64, limit: i64) -> anyhow::Result<Vec<models::User>> {
        let users = sqlx::query_as::<_, models::User>(
            "SELECT * FROM users ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn count_users(&self) -> anyhow::Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn update_user(
        &self,
        user_id: i64,
        update: &models::UserUpdate,
    ) -> anyhow::Result<Option<models::User>> {
        let user = sqlx::query_as::<_, models::User>(
            r#"
            UPDATE users
            SET username = COALESCE(?, username),
                full_name = COALESCE(?, full_name),
                is_active = COALESCE(?, is_active),
                preferences = COALESCE(?, preferences),
                metadata = COALESCE(?, metadata),
                last_active = ?
            WHERE user_id = ?
            RETURNING *
            "#,
        )
        .bind(&update.username)
        .bind(&update.full_name)
        .bind(update.is_active)
        .bind(update.preferences.clone().map(Json))
        .bind(update.metadata.clone().map(Json))
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn active_users(&self, hours: i64) -> anyhow::Result<Vec<models::User>> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let users = sqlx::query_as::<_, models::User>(
            "SELECT * FROM users WHERE is_active = 1 AND last_active >= ? ORDER BY last_active DESC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn recent_users(&self, limit: i64) -> anyhow::Result<Vec<models::User>> {
        let users = sqlx::query_as::<_, models::User>(
            "SELECT * FROM users ORDER BY started_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Broadcast audience.
    pub async fn all_user_ids(&self) -> anyhow::Result<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM users WHERE is_active = 1 ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    // ── Activity Log ───────────────────────────────────────────────

    pub async fn log_user_action(
        &self,
        user_id: i64,
        action: &str,
        metadata: Option<serde_json::Value>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO user_stats (user_id, action, timestamp, metadata) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(action)
        .bind(Utc::now())
        .bind(Json(metadata.unwrap_or_else(empty_object)))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn user_stats(&self, user_id: i64, days: i64) -> anyhow::Result<models::UserActivity> {
        let cutoff = Utc::now() - Duration::days(days);

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_stats WHERE user_id = ? AND timestamp >= ?",
        )
        .bind(user_id)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        let last = sqlx::query_as::<_, models::UserStat>(
            "SELECT * FROM user_stats WHERE user_id = ? ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let actions: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT action, COUNT(*) AS hits FROM user_stats
            WHERE user_id = ? AND timestamp >= ?
            GROUP BY action
            ORDER BY hits DESC, action ASC
            LIMIT 5
            "#,
        )
        .bind(user_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(models::UserActivity {
            user_id,
            total_queries: total.0,
            last_activity: last.map(|s| s.timestamp),
            popular_actions: actions
                .into_iter()
                .map(|(action, count)| models::ActionCount { action, count })
                .collect(),
        })
    }

    /// Logged actions across all users whose name starts with `prefix`:
    /// total count and the most frequent ones.
    pub async fn action_summary(
        &self,
        prefix: &str,
        days: i64,
        limit: i64,
    ) -> anyhow::Result<(i64, Vec<models::ActionCount>)> {
        let cutoff = Utc::now() - Duration::days(days);
        let pattern = format!("{}%", prefix);

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_stats WHERE action LIKE ? AND timestamp >= ?",
        )
        .bind(&pattern)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        let top: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT action, COUNT(*) AS hits FROM user_stats
            WHERE action LIKE ? AND timestamp >= ?
            GROUP BY action
            ORDER BY hits DESC, action ASC
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok((
            total.0,
            top.into_iter()
                .map(|(action, count)| models::ActionCount { action, count })
                .collect(),
        ))
    }

    // ── Product Operations ─────────────────────────────────────────

    pub async fn create_product(
        &self,
        new: &models::NewProduct,
    ) -> anyhow::Result<models::ProductRecord> {
        let id = new
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| crate::catalog::slug(&new.name));
        let now = Utc::now();
        let product = sqlx::query_as::<_, models::ProductRecord>(
            r#"
            INSERT INTO products (
                id, name, description, short_description, category, price,
                benefits, short_benefits, indications, properties, components, tags,
                composition, dosage, contraindications, image_id, url, form, weight, volume,
                is_available, rating, review_count, product_metadata, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.short_description)
        .bind(&new.category)
        .bind(new.price)
        .bind(Json(&new.benefits))
        .bind(Json(&new.short_benefits))
        .bind(Json(&new.indications))
        .bind(Json(&new.properties))
        .bind(Json(&new.components))
        .bind(Json(&new.tags))
        .bind(&new.composition)
        .bind(&new.dosage)
        .bind(&new.contraindications)
        .bind(&new.image_id)
        .bind(&new.url)
        .bind(&new.form)
        .bind(&new.weight)
        .bind(&new.volume)
        .bind(new.is_available.unwrap_or(true))
        .bind(new.rating.unwrap_or(0.0))
        .bind(new.review_count.unwrap_or(0))
        .bind(Json(new.product_metadata.clone().unwrap_or_else(empty_object)))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict(e, format!("product {}", id)))?;
        Ok(product)
    }

    pub async fn get_product(&self, id: &str) -> anyhow::Result<Option<models::ProductRecord>> {
        let product =
            sqlx::query_as::<_, models::ProductRecord>("SELECT * FROM products WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(product)
    }

    async fn all_products(&self) -> anyhow::Result<Vec<models::ProductRecord>> {
        let products = sqlx::query_as::<_, models::ProductRecord>(
            "SELECT * FROM products ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Page of products plus the total matching count.
    pub async fn list_products(
        &self,
        skip: i64,
        limit: i64,
        category: Option<&str>,
    ) -> anyhow::Result<(Vec<models::ProductRecord>, i64)> {
        let filter = models::ProductFilter {
            category: category.map(str::to_string),
            limit,
            offset: skip,
            ..Default::default()
        };
        let matching: Vec<_> = self
            .all_products()
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        let total = matching.len() as i64;
        Ok((paginate(matching, skip, limit), total))
    }

    pub async fn update_product(
        &self,
        id: &str,
        update: &models::ProductUpdate,
    ) -> anyhow::Result<Option<models::ProductRecord>> {
        let Some(mut p) = self.get_product(id).await? else {
            return Ok(None);
        };
        let u = update.clone();
        if let Some(v) = u.name {
            p.name = v;
        }
        p.description = u.description.or(p.description);
        p.short_description = u.short_description.or(p.short_description);
        p.category = u.category.or(p.category);
        p.price = u.price.or(p.price);
        if let Some(v) = u.benefits {
            p.benefits = Json(v);
        }
        if let Some(v) = u.short_benefits {
            p.short_benefits = Json(v);
        }
        if let Some(v) = u.indications {
            p.indications = Json(v);
        }
        if let Some(v) = u.properties {
            p.properties = Json(v);
        }
        if let Some(v) = u.components {
            p.components = Json(v);
        }
        if let Some(v) = u.tags {
            p.tags = Json(v);
        }
        p.composition = u.composition.or(p.composition);
        p.dosage = u.dosage.or(p.dosage);
        p.contraindications = u.contraindications.or(p.contraindications);
        p.image_id = u.image_id.or(p.image_id);
        p.url = u.url.or(p.url);
        p.form = u.form.or(p.form);
        p.weight = u.weight.or(p.weight);
        p.volume = u.volume.or(p.volume);
        if let Some(v) = u.is_available {
            p.is_available = v;
        }
        if let Some(v) = u.rating {
            p.rating = v;
        }
        if let Some(v) = u.review_count {
            p.review_count = v;
        }
        if let Some(v) = u.product_metadata {
            p.product_metadata = Json(v);
        }

        let product = sqlx::query_as::<_, models::ProductRecord>(
            r#"
            UPDATE products SET
                name = ?, description = ?, short_description = ?, category = ?, price = ?,
                benefits = ?, short_benefits = ?, indications = ?, properties = ?,
                components = ?, tags = ?, composition = ?, dosage = ?, contraindications = ?,
                image_id = ?, url = ?, form = ?, weight = ?, volume = ?, is_available = ?,
                rating = ?, review_count = ?, product_metadata = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&p.name)
        .bind(&p.description)
        .bind(&p.short_description)
        .bind(&p.category)
        .bind(p.price)
        .bind(&p.benefits)
        .bind(&p.short_benefits)
        .bind(&p.indications)
        .bind(&p.properties)
        .bind(&p.components)
        .bind(&p.tags)
        .bind(&p.composition)
        .bind(&p.dosage)
        .bind(&p.contraindications)
        .bind(&p.image_id)
        .bind(&p.url)
        .bind(&p.form)
        .bind(&p.weight)
        .bind(&p.volume)
        .bind(p.is_available)
        .bind(p.rating)
        .bind(p.review_count)
        .bind(&p.product_metadata)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    pub async fn delete_product(&self, id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_products(&self) -> anyhow::Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Filtering runs in Rust: SQLite's LIKE folds ASCII case only.
    pub async fn search_products(
        &self,
        filter: &models::ProductFilter,
    ) -> anyhow::Result<Vec<models::ProductRecord>> {
        let matching: Vec<_> = self
            .all_products()
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        Ok(paginate(matching, filter.offset, filter.limit))
    }

    pub async fn categories(&self) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT category FROM products WHERE category IS NOT NULL AND category != '' ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    pub async fn count_by_category(&self, category: &str) -> anyhow::Result<i64> {
        let (_, total) = self.list_products(0, 0, Some(category)).await?;
        Ok(total)
    }

    pub async fn popular_products(&self, limit: i64) -> anyhow::Result<Vec<models::ProductRecord>> {
        let products = sqlx::query_as::<_, models::ProductRecord>(
            r#"
            SELECT * FROM products
            WHERE is_available = 1
            ORDER BY rating DESC, review_count DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Copy catalog products into the table, skipping ids already present.
    pub async fn import_catalog(&self, kb: &KnowledgeBase) -> anyhow::Result<usize> {
        let mut imported = 0;
        for product in kb.all() {
            let new = models::NewProduct::from(product);
            match self.create_product(&new).await {
                Ok(_) => imported += 1,
                Err(e) if e.downcast_ref::<DbError>().is_some() => {
                    tracing::debug!("Skipping existing product {}", product.name);
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!("Imported {} products from the knowledge base", imported);
        Ok(imported)
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// `limit <= 0` means no limit.
fn paginate<T>(items: Vec<T>, skip: i64, limit: i64) -> Vec<T> {
    let iter = items.into_iter().skip(skip.max(0) as usize);
    if limit > 0 {
        iter.take(limit as usize).collect()
    } else {
        iter.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::models::*;
    use super::*;
    use crate::catalog::Product;

    async fn memory_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    fn product(name: &str, category: &str, price: f64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            category: Some(category.to_string()),
            price: Some(price),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upsert_reports_creation_once() {
        let db = memory_db().await;
        let (user, created) = db.upsert_user(42, Some("anna"), None).await.unwrap();
        assert!(created);
        assert_eq!(user.username.as_deref(), Some("anna"));

        let (user, created) = db.upsert_user(42, None, Some("Anna K")).await.unwrap();
        assert!(!created);
        assert_eq!(user.username.as_deref(), Some("anna"));
        assert_eq!(user.full_name.as_deref(), Some("Anna K"));
        assert_eq!(db.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn create_user_rejects_duplicates() {
        let db = memory_db().await;
        let new = NewUser {
            user_id: 7,
            ..Default::default()
        };
        db.create_user(&new).await.unwrap();
        let err = db.create_user(&new).await.unwrap_err();
        assert!(err.downcast_ref::<DbError>().is_some());
    }

    #[tokio::test]
    async fn inactive_users_are_not_broadcast_targets() {
        let db = memory_db().await;
        db.upsert_user(1, None, None).await.unwrap();
        db.upsert_user(2, None, None).await.unwrap();
        let update = UserUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        db.update_user(2, &update).await.unwrap().unwrap();

        assert_eq!(db.all_user_ids().await.unwrap(), vec![1]);
        assert_eq!(db.active_users(24).await.unwrap().len(), 1);
        assert!(db.update_user(99, &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn user_stats_ranks_actions() {
        let db = memory_db().await;
        db.upsert_user(5, None, None).await.unwrap();
        for action in ["asked: омега", "asked: омега", "start"] {
            db.log_user_action(5, action, None).await.unwrap();
        }
        let stats = db.user_stats(5, 30).await.unwrap();
        assert_eq!(stats.total_queries, 3);
        assert!(stats.last_activity.is_some());
        assert_eq!(stats.popular_actions[0].action, "asked: омега");
        assert_eq!(stats.popular_actions[0].count, 2);

        let empty = db.user_stats(6, 30).await.unwrap();
        assert_eq!(empty.total_queries, 0);
        assert!(empty.last_activity.is_none());
    }

    #[tokio::test]
    async fn product_id_defaults_to_slug_and_duplicates_fail() {
        let db = memory_db().await;
        let created = db.create_product(&product("Омега 3", "Омега", 990.0)).await.unwrap();
        assert_eq!(created.id, "омега-3");
        assert!(created.is_available);
        let err = db.create_product(&product("Омега 3", "Омега", 1.0)).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DbError>(), Some(DbError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn concurrent_duplicate_inserts_report_a_conflict() {
        let db = memory_db().await;
        let new = product("Коллаген", "Кожа", 1500.0);
        let (first, second) = tokio::join!(db.create_product(&new), db.create_product(&new));
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let err = results.into_iter().find_map(Result::err).unwrap();
        assert!(matches!(err.downcast_ref::<DbError>(), Some(DbError::AlreadyExists(_))));

        let user = NewUser {
            user_id: 11,
            ..Default::default()
        };
        let (first, second) = tokio::join!(db.create_user(&user), db.create_user(&user));
        assert!(first.is_ok() != second.is_ok());
    }

    #[tokio::test]
    async fn search_folds_cyrillic_case_and_combines_filters() {
        let db = memory_db().await;
        db.create_product(&product("Магний B6", "Минералы", 500.0)).await.unwrap();
        db.create_product(&product("Магний хелат", "Минералы", 1500.0)).await.unwrap();
        db.create_product(&product("Витамин C", "Витамины", 300.0)).await.unwrap();

        let filter = ProductFilter::text("МАГНИЙ", 10);
        assert_eq!(db.search_products(&filter).await.unwrap().len(), 2);

        let filter = ProductFilter {
            price_max: Some(1000.0),
            ..ProductFilter::text("магний", 10)
        };
        let found = db.search_products(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Магний B6");

        let filter = ProductFilter {
            category: Some("витамин".into()),
            ..Default::default()
        };
        assert_eq!(db.search_products(&filter).await.unwrap()[0].name, "Витамин C");
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let db = memory_db().await;
        db.create_product(&product("Битерон", "Печень", 800.0)).await.unwrap();
        let update = ProductUpdate {
            rating: Some(4.5),
            tags: Some(vec!["печень".into()]),
            ..Default::default()
        };
        let updated = db.update_product("битерон", &update).await.unwrap().unwrap();
        assert_eq!(updated.rating, 4.5);
        assert_eq!(updated.price, Some(800.0));
        assert_eq!(updated.tags.0, vec!["печень".to_string()]);
        assert!(db.update_product("missing", &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn catalog_import_is_idempotent() {
        let db = memory_db().await;
        let kb = KnowledgeBase::from_products(vec![
            Product::new("Солберри-H", "Иммунитет", "облепиха"),
            Product::new("Омега-3", "Омега", "рыбий жир"),
        ]);
        assert_eq!(db.import_catalog(&kb).await.unwrap(), 2);
        assert_eq!(db.import_catalog(&kb).await.unwrap(), 0);
        assert_eq!(db.categories().await.unwrap(), vec!["Иммунитет", "Омега"]);
        assert_eq!(db.count_by_category("омег").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn popular_products_skip_unavailable() {
        let db = memory_db().await;
        let mut top = product("A", "X", 1.0);
        top.rating = Some(5.0);
        top.is_available = Some(false);
        let mut second = product("B", "X", 1.0);
        second.rating = Some(4.0);
        db.create_product(&top).await.unwrap();
        db.create_product(&second).await.unwrap();
        db.create_product(&product("C", "X", 1.0)).await.unwrap();

        let popular = db.popular_products(5).await.unwrap();
        let names: Vec<_> = popular.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }
}
