// Catalog storage
//
// Read side: the enrichment work queue (unenriched items, most popular
// first). Write side: one UPDATE per item that lands the full metadata bundle
// and all three embedding vectors together; there is no statement that writes
// a subset, so a crash can never leave a half-enriched row.
//
// List columns (genres, keywords, vibes, themes, embeddings) are stored as
// JSON text, matching how the ingestion tooling writes them.

use crate::error::{EnrichError, EnrichResult};
use crate::types::{
    CatalogItem, EmbeddingBundle, EnrichedMetadata, EnrichmentMethod, ItemKind,
};
use chrono::Utc;
use sqlx::SqlitePool;

/// One enriched row as read back for auditing
#[derive(Debug, Clone)]
pub struct EnrichedRow {
    pub item_id: i64,
    pub method: EnrichmentMethod,
    pub metadata: EnrichedMetadata,
}

#[derive(Debug, Clone)]
pub struct CatalogStore {
    db: SqlitePool,
}

impl CatalogStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Items with no enrichment yet, most popular first
    pub async fn fetch_unenriched(&self, limit: Option<u32>) -> EnrichResult<Vec<CatalogItem>> {
        let rows = sqlx::query_as::<
            _,
            (i64, String, String, Option<String>, Option<i64>, String, String, String, Option<f64>),
        >(
            r#"
            SELECT id, kind, title, overview, release_year,
                   genres, keywords, cast_names, popularity
            FROM catalog_items
            WHERE enrich_method IS NULL
            ORDER BY popularity DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    pub async fn count_unenriched(&self) -> EnrichResult<u64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM catalog_items WHERE enrich_method IS NULL")
                .fetch_one(&self.db)
                .await?;
        Ok(count.0 as u64)
    }

    pub async fn get_item(&self, item_id: i64) -> EnrichResult<Option<CatalogItem>> {
        let row = sqlx::query_as::<
            _,
            (i64, String, String, Option<String>, Option<i64>, String, String, String, Option<f64>),
        >(
            r#"
            SELECT id, kind, title, overview, release_year,
                   genres, keywords, cast_names, popularity
            FROM catalog_items
            WHERE id = ?
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Self::row_to_item).transpose()
    }

    /// Commit one item's complete enrichment in a single UPDATE.
    ///
    /// Refuses a partial embedding bundle: the metadata and all three vectors
    /// become visible together or not at all.
    pub async fn commit_enrichment(
        &self,
        item_id: i64,
        method: EnrichmentMethod,
        metadata: &EnrichedMetadata,
        embeddings: &EmbeddingBundle,
    ) -> EnrichResult<()> {
        if !embeddings.is_complete() {
            return Err(EnrichError::Embedding(format!(
                "refusing partial commit for item {}: missing {:?}",
                item_id,
                embeddings.missing()
            )));
        }

        let themes = encode_list(&metadata.themes)?;
        let vibes = encode_list(&metadata.vibes)?;
        let vibe_vec = encode_vector(embeddings.vibe.as_deref())?;
        let content_vec = encode_vector(embeddings.content.as_deref())?;
        let metadata_vec = encode_vector(embeddings.metadata.as_deref())?;

        let updated = sqlx::query(
            r#"
            UPDATE catalog_items SET
                setting_place = ?, setting_time = ?, protagonist = ?,
                goal = ?, obstacle = ?, stakes = ?,
                themes = ?, vibes = ?, tone = ?, pacing = ?,
                profile_text = ?, source_url = ?,
                enrich_method = ?,
                vibe_embedding = ?, content_embedding = ?, metadata_embedding = ?,
                enriched_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&metadata.slots.setting_place)
        .bind(&metadata.slots.setting_time)
        .bind(&metadata.slots.protagonist)
        .bind(&metadata.slots.goal)
        .bind(&metadata.slots.obstacle)
        .bind(&metadata.slots.stakes)
        .bind(&themes)
        .bind(&vibes)
        .bind(&metadata.tone)
        .bind(&metadata.pacing)
        .bind(&metadata.profile)
        .bind(&metadata.source_url)
        .bind(method.as_str())
        .bind(&vibe_vec)
        .bind(&content_vec)
        .bind(&metadata_vec)
        .bind(Utc::now().to_rfc3339())
        .bind(item_id)
        .execute(&self.db)
        .await
        .map_err(EnrichError::Write)?
        .rows_affected();

        if updated == 0 {
            return Err(EnrichError::Write(sqlx::Error::RowNotFound));
        }

        tracing::debug!(item_id, method = method.as_str(), "Enrichment committed");
        Ok(())
    }

    /// Mark an item terminally failed; no metadata or vectors are written
    pub async fn mark_error(&self, item_id: i64) -> EnrichResult<()> {
        sqlx::query(
            "UPDATE catalog_items SET enrich_method = 'error', enriched_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(item_id)
        .execute(&self.db)
        .await
        .map_err(EnrichError::Write)?;
        Ok(())
    }

    /// Enriched rows read back for auditing (error-marked rows excluded)
    pub async fn fetch_enriched(&self, limit: Option<u32>) -> EnrichResult<Vec<EnrichedRow>> {
        let rows = sqlx::query_as::<
            _,
            (
                i64,
                String,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                String,
                String,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
            ),
        >(
            r#"
            SELECT id, enrich_method,
                   setting_place, setting_time, protagonist, goal, obstacle, stakes,
                   themes, vibes, tone, pacing, profile_text, source_url
            FROM catalog_items
            WHERE enrich_method IS NOT NULL AND enrich_method != 'error'
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let method = EnrichmentMethod::parse(&row.1).ok_or_else(|| {
                    EnrichError::Decode(format!("item {}: unknown method '{}'", row.0, row.1))
                })?;
                Ok(EnrichedRow {
                    item_id: row.0,
                    method,
                    metadata: EnrichedMetadata {
                        slots: crate::types::NarrativeSlots {
                            setting_place: row.2,
                            setting_time: row.3,
                            protagonist: row.4,
                            goal: row.5,
                            obstacle: row.6,
                            stakes: row.7,
                        },
                        themes: decode_list("themes", &row.8)?,
                        vibes: decode_list("vibes", &row.9)?,
                        tone: row.10.unwrap_or_default(),
                        pacing: row.11.unwrap_or_default(),
                        profile: row.12,
                        source_url: row.13,
                    },
                })
            })
            .collect()
    }

    /// Insert a bare catalog row (ingestion-side shape, used by tooling and tests)
    pub async fn insert_item(&self, item: &CatalogItem) -> EnrichResult<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_items
                (id, kind, title, overview, release_year, genres, keywords, cast_names, popularity)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.id)
        .bind(item.kind.as_str())
        .bind(&item.title)
        .bind(&item.overview)
        .bind(item.release_year.map(|y| y as i64))
        .bind(encode_list(&item.genres)?)
        .bind(encode_list(&item.keywords)?)
        .bind(encode_list(&item.cast_names)?)
        .bind(item.popularity)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    fn row_to_item(
        row: (i64, String, String, Option<String>, Option<i64>, String, String, String, Option<f64>),
    ) -> EnrichResult<CatalogItem> {
        let kind = ItemKind::parse(&row.1)
            .ok_or_else(|| EnrichError::Decode(format!("item {}: unknown kind '{}'", row.0, row.1)))?;
        Ok(CatalogItem {
            id: row.0,
            kind,
            title: row.2,
            overview: row.3.unwrap_or_default(),
            release_year: row.4.map(|y| y as i32),
            genres: decode_list("genres", &row.5)?,
            keywords: decode_list("keywords", &row.6)?,
            cast_names: decode_list("cast_names", &row.7)?,
            popularity: row.8.unwrap_or(0.0),
        })
    }
}

fn decode_list(field: &str, raw: &str) -> EnrichResult<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| EnrichError::Decode(format!("{} column: {}", field, e)))
}

fn encode_list(values: &[String]) -> EnrichResult<String> {
    serde_json::to_string(values).map_err(|e| EnrichError::Decode(format!("list encode: {}", e)))
}

fn encode_vector(vector: Option<&[f32]>) -> EnrichResult<String> {
    serde_json::to_string(vector.unwrap_or_default())
        .map_err(|e| EnrichError::Decode(format!("vector encode: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NarrativeSlots;

    async fn store() -> CatalogStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        cinevibe_common::db::init_tables(&pool).await.unwrap();
        CatalogStore::new(pool)
    }

    fn item(id: i64, title: &str, popularity: f64) -> CatalogItem {
        CatalogItem {
            id,
            kind: ItemKind::Movie,
            title: title.to_string(),
            overview: "A drifter arrives in a border town.".to_string(),
            release_year: Some(1967),
            genres: vec!["Western".to_string()],
            keywords: vec!["revenge".to_string()],
            cast_names: vec!["J. Doe".to_string()],
            popularity,
        }
    }

    fn metadata() -> EnrichedMetadata {
        EnrichedMetadata {
            slots: NarrativeSlots {
                setting_place: Some("a border town".to_string()),
                protagonist: Some("a nameless drifter".to_string()),
                ..Default::default()
            },
            themes: vec!["frontier justice".to_string()],
            vibes: vec!["dusty plains".to_string(), "coiled menace".to_string()],
            tone: "rugged".to_string(),
            pacing: "contemplative".to_string(),
            profile: Some("A drifter settles a debt the town forgot.".to_string()),
            source_url: None,
        }
    }

    fn complete_bundle() -> EmbeddingBundle {
        EmbeddingBundle {
            vibe: Some(vec![0.1, 0.2]),
            content: Some(vec![0.3, 0.4]),
            metadata: Some(vec![0.5, 0.6]),
        }
    }

    #[tokio::test]
    async fn test_work_queue_is_popularity_ordered() {
        let store = store().await;
        store.insert_item(&item(1, "Low", 1.0)).await.unwrap();
        store.insert_item(&item(2, "High", 9.0)).await.unwrap();
        store.insert_item(&item(3, "Mid", 5.0)).await.unwrap();

        let queue = store.fetch_unenriched(None).await.unwrap();
        let ids: Vec<i64> = queue.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(store.count_unenriched().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_commit_removes_item_from_queue() {
        let store = store().await;
        store.insert_item(&item(1, "One", 1.0)).await.unwrap();

        store
            .commit_enrichment(1, EnrichmentMethod::Defaults, &metadata(), &complete_bundle())
            .await
            .unwrap();

        assert!(store.fetch_unenriched(None).await.unwrap().is_empty());

        let enriched = store.fetch_enriched(None).await.unwrap();
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].method, EnrichmentMethod::Defaults);
        assert_eq!(enriched[0].metadata.vibes, metadata().vibes);
        assert_eq!(
            enriched[0].metadata.slots.protagonist.as_deref(),
            Some("a nameless drifter")
        );
    }

    #[tokio::test]
    async fn test_partial_bundle_is_refused_and_row_untouched() {
        let store = store().await;
        store.insert_item(&item(1, "One", 1.0)).await.unwrap();

        let partial = EmbeddingBundle {
            vibe: Some(vec![0.1]),
            content: None,
            metadata: Some(vec![0.2]),
        };
        let err = store
            .commit_enrichment(1, EnrichmentMethod::Content, &metadata(), &partial)
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::Embedding(_)));

        // Still in the work queue, nothing written
        let queue = store.fetch_unenriched(None).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert!(store.fetch_enriched(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_mark_excluded_from_audit() {
        let store = store().await;
        store.insert_item(&item(1, "One", 1.0)).await.unwrap();
        store.mark_error(1).await.unwrap();

        assert!(store.fetch_unenriched(None).await.unwrap().is_empty());
        assert!(store.fetch_enriched(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_unknown_item_fails() {
        let store = store().await;
        let err = store
            .commit_enrichment(999, EnrichmentMethod::Content, &metadata(), &complete_bundle())
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::Write(_)));
    }

    #[tokio::test]
    async fn test_empty_list_columns_decode() {
        let store = store().await;
        sqlx::query(
            "INSERT INTO catalog_items (id, kind, title, genres, keywords, cast_names) VALUES (1, 'movie', 'Bare', '', '[]', '[]')",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let fetched = store.get_item(1).await.unwrap().unwrap();
        assert!(fetched.genres.is_empty());
        assert_eq!(fetched.overview, "");
    }
}
