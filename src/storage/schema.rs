//! Database schema for a job corpus

/// SQL schema for the corpus database
pub const SCHEMA_SQL: &str = r#"
-- One row per successfully fetched page
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    content TEXT NOT NULL,
    depth INTEGER NOT NULL,
    status_code INTEGER NOT NULL,
    fetched_at TEXT NOT NULL
);

-- Heading outline, in document order
CREATE TABLE IF NOT EXISTS headings (
    page_id INTEGER NOT NULL REFERENCES pages(id),
    position INTEGER NOT NULL,
    level INTEGER NOT NULL,
    text TEXT NOT NULL,
    anchor TEXT NOT NULL,
    PRIMARY KEY (page_id, position)
);

-- Downloaded images
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    filename TEXT NOT NULL UNIQUE,
    page_url TEXT NOT NULL,
    size INTEGER NOT NULL,
    downloaded_at TEXT NOT NULL
);

-- Which page referenced which image
CREATE TABLE IF NOT EXISTS page_images (
    page_id INTEGER NOT NULL REFERENCES pages(id),
    position INTEGER NOT NULL,
    image_url TEXT NOT NULL,
    PRIMARY KEY (page_id, position)
);

CREATE INDEX IF NOT EXISTS idx_page_images_url ON page_images(image_url);

-- Append-only failure log
CREATE TABLE IF NOT EXISTS failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    error TEXT NOT NULL,
    category TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

-- Single-row crawl summary
CREATE TABLE IF NOT EXISTS crawl_summary (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    start_url TEXT NOT NULL,
    max_depth INTEGER NOT NULL,
    pages_crawled INTEGER NOT NULL,
    images_downloaded INTEGER NOT NULL,
    failures INTEGER NOT NULL,
    config_hash TEXT NOT NULL,
    crawled_at TEXT NOT NULL
);

-- Text recovery results keyed by image filename
CREATE TABLE IF NOT EXISTS ocr_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL UNIQUE,
    success INTEGER NOT NULL,
    error TEXT,
    full_text TEXT NOT NULL,
    confidence_avg REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS ocr_regions (
    result_id INTEGER NOT NULL REFERENCES ocr_results(id),
    position INTEGER NOT NULL,
    text TEXT NOT NULL,
    confidence REAL NOT NULL,
    bbox_left INTEGER NOT NULL,
    bbox_top INTEGER NOT NULL,
    bbox_width INTEGER NOT NULL,
    bbox_height INTEGER NOT NULL,
    PRIMARY KEY (result_id, position)
);

-- Text recovery totals
CREATE TABLE IF NOT EXISTS ocr_summary (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    total INTEGER NOT NULL,
    processed INTEGER NOT NULL,
    failed INTEGER NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in [
            "pages",
            "headings",
            "images",
            "page_images",
            "failures",
            "crawl_summary",
            "ocr_results",
            "ocr_regions",
            "ocr_summary",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
