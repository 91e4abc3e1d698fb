pub const SCHEMA: &str = r#"
-- sites table
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_url TEXT NOT NULL UNIQUE,
    secret TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- articles table (publish history and dedup index)
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    remote_post_id INTEGER NOT NULL,
    remote_status TEXT NOT NULL DEFAULT 'draft',
    remote_url TEXT,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    excerpt TEXT NOT NULL DEFAULT '',
    topic_key TEXT,
    fingerprint TEXT NOT NULL,
    meta TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(site_id, fingerprint)
);

CREATE INDEX IF NOT EXISTS idx_articles_site_topic_created
    ON articles(site_id, topic_key, created_at DESC);

-- memories table (per-site cached JSON)
CREATE TABLE IF NOT EXISTS memories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(site_id, key)
);

-- schedule_runs table (worker timestamps)
CREATE TABLE IF NOT EXISTS schedule_runs (
    job_key TEXT PRIMARY KEY,
    last_run_at INTEGER NOT NULL
);
"#;
