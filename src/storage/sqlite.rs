//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::ocr::{BoundingBox, OcrResult, OcrSummary, TextRegion};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    CrawlSummary, FailureCategory, FailureRecord, Heading, ImageRecord, PageRecord,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the corpus database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_headings(&self, page_id: i64) -> StorageResult<Vec<Heading>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT level, text, anchor FROM headings WHERE page_id = ?1 ORDER BY position",
        )?;

        let headings = stmt
            .query_map(params![page_id], |row| {
                Ok(Heading {
                    level: row.get(0)?,
                    text: row.get(1)?,
                    anchor: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(headings)
    }

    fn load_page_images(&self, page_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT image_url FROM page_images WHERE page_id = ?1 ORDER BY position",
        )?;

        let urls = stmt
            .query_map(params![page_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(urls)
    }

    fn load_regions(&self, result_id: i64) -> StorageResult<Vec<TextRegion>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT text, confidence, bbox_left, bbox_top, bbox_width, bbox_height
             FROM ocr_regions WHERE result_id = ?1 ORDER BY position",
        )?;

        let regions = stmt
            .query_map(params![result_id], |row| {
                Ok(TextRegion {
                    text: row.get(0)?,
                    confidence: row.get(1)?,
                    bbox: BoundingBox {
                        left: row.get(2)?,
                        top: row.get(3)?,
                        width: row.get(4)?,
                        height: row.get(5)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(regions)
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp '{}': {}", value, e)))
}

fn constraint_or_sqlite(e: rusqlite::Error, what: &str) -> StorageError {
    if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        StorageError::ConstraintViolation(what.to_string())
    } else {
        StorageError::Sqlite(e)
    }
}

impl Storage for SqliteStorage {
    // ===== Crawl output =====

    fn insert_page(&mut self, page: &PageRecord) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO pages (url, title, description, content, depth, status_code, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                page.url,
                page.title,
                page.description,
                page.content,
                page.depth,
                page.status_code,
                page.fetched_at.to_rfc3339()
            ],
        )
        .map_err(|e| constraint_or_sqlite(e, &format!("page already stored: {}", page.url)))?;

        let page_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO headings (page_id, position, level, text, anchor)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, heading) in page.headings.iter().enumerate() {
                stmt.execute(params![
                    page_id,
                    position as i64,
                    heading.level,
                    heading.text,
                    heading.anchor
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO page_images (page_id, position, image_url) VALUES (?1, ?2, ?3)",
            )?;
            for (position, image_url) in page.images.iter().enumerate() {
                stmt.execute(params![page_id, position as i64, image_url])?;
            }
        }

        tx.commit()?;
        Ok(page_id)
    }

    fn insert_image(&mut self, image: &ImageRecord) -> StorageResult<()> {
        self.conn
            .execute(
                "INSERT INTO images (url, filename, page_url, size, downloaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    image.url,
                    image.filename,
                    image.page_url,
                    image.size as i64,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| constraint_or_sqlite(e, &format!("image already stored: {}", image.url)))?;
        Ok(())
    }

    fn insert_failure(&mut self, failure: &FailureRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO failures (url, error, category, recorded_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                failure.url,
                failure.error,
                failure.category.to_db_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn save_summary(&mut self, summary: &CrawlSummary) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO crawl_summary
             (id, start_url, max_depth, pages_crawled, images_downloaded, failures, config_hash, crawled_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                summary.start_url,
                summary.max_depth,
                summary.pages_crawled as i64,
                summary.images_downloaded as i64,
                summary.failures as i64,
                summary.config_hash,
                summary.crawled_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    // ===== Text recovery =====

    fn save_ocr_summary(&mut self, summary: &OcrSummary) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute_batch("DELETE FROM ocr_regions; DELETE FROM ocr_results;")?;

        {
            let mut result_stmt = tx.prepare(
                "INSERT INTO ocr_results (filename, success, error, full_text, confidence_avg)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut region_stmt = tx.prepare(
                "INSERT INTO ocr_regions
                 (result_id, position, text, confidence, bbox_left, bbox_top, bbox_width, bbox_height)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;

            for result in &summary.results {
                result_stmt.execute(params![
                    result.filename,
                    result.success,
                    result.error,
                    result.full_text,
                    result.confidence_avg
                ])?;
                let result_id = tx.last_insert_rowid();

                for (position, region) in result.regions.iter().enumerate() {
                    region_stmt.execute(params![
                        result_id,
                        position as i64,
                        region.text,
                        region.confidence,
                        region.bbox.left,
                        region.bbox.top,
                        region.bbox.width,
                        region.bbox.height
                    ])?;
                }
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO ocr_summary (id, total, processed, failed) VALUES (1, ?1, ?2, ?3)",
            params![
                summary.total as i64,
                summary.processed as i64,
                summary.failed as i64
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    // ===== Reads =====

    fn load_pages(&self) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, title, description, content, depth, status_code, fetched_at
             FROM pages ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, u16>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut pages = Vec::with_capacity(rows.len());
        for (id, url, title, description, content, depth, status_code, fetched_at) in rows {
            pages.push(PageRecord {
                url,
                title,
                description,
                content,
                headings: self.load_headings(id)?,
                depth,
                fetched_at: parse_timestamp(&fetched_at)?,
                status_code,
                images: self.load_page_images(id)?,
            });
        }

        Ok(pages)
    }

    fn load_images(&self) -> StorageResult<Vec<ImageRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, filename, page_url, size FROM images ORDER BY id")?;

        let images = stmt
            .query_map([], |row| {
                Ok(ImageRecord {
                    url: row.get(0)?,
                    filename: row.get(1)?,
                    page_url: row.get(2)?,
                    size: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(images)
    }

    fn load_failures(&self) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, error, category FROM failures ORDER BY id")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(url, error, category)| {
                let category = FailureCategory::from_db_string(&category).ok_or_else(|| {
                    StorageError::Corrupt(format!("unknown failure category '{}'", category))
                })?;
                Ok(FailureRecord {
                    url,
                    error,
                    category,
                })
            })
            .collect()
    }

    fn load_summary(&self) -> StorageResult<Option<CrawlSummary>> {
        let row = self
            .conn
            .query_row(
                "SELECT start_url, max_depth, pages_crawled, images_downloaded, failures,
                 config_hash, crawled_at FROM crawl_summary WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((start_url, max_depth, pages, images, failures, config_hash, crawled_at)) = row
        else {
            return Ok(None);
        };

        Ok(Some(CrawlSummary {
            start_url,
            max_depth,
            pages_crawled: pages as u64,
            images_downloaded: images as u64,
            failures: failures as u64,
            config_hash,
            crawled_at: parse_timestamp(&crawled_at)?,
        }))
    }

    fn load_ocr_results(&self) -> StorageResult<Vec<OcrResult>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, success, error, full_text, confidence_avg
             FROM ocr_results ORDER BY filename",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut results = Vec::with_capacity(rows.len());
        for (id, filename, success, error, full_text, confidence_avg) in rows {
            results.push(OcrResult {
                filename,
                success,
                error,
                full_text,
                confidence_avg,
                regions: self.load_regions(id)?,
            });
        }

        Ok(results)
    }

    fn count_pages(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
