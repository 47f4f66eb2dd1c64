pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS commits (
  hash TEXT PRIMARY KEY,
  committed_at TEXT NOT NULL,
  pull_request INTEGER UNIQUE,
  pull_request_status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS builds (
  id INTEGER PRIMARY KEY,
  number INTEGER NOT NULL,
  duration REAL,
  state TEXT NOT NULL,
  started_at TEXT,
  commit_hash TEXT REFERENCES commits(hash)
);

CREATE INDEX IF NOT EXISTS idx_builds_started_at ON builds(started_at);

CREATE TABLE IF NOT EXISTS releases (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  published_at TEXT NOT NULL,
  name TEXT NOT NULL UNIQUE,
  scraped_cherrypicks INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS cherrypicks (
  hash TEXT PRIMARY KEY,
  release_id INTEGER NOT NULL REFERENCES releases(id)
);

CREATE TABLE IF NOT EXISTS cherrypick_issues (
  number INTEGER PRIMARY KEY,
  created_at TEXT NOT NULL,
  pull_request_number INTEGER
);

CREATE TABLE IF NOT EXISTS metric_results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  value REAL NOT NULL,
  computed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_metric_results_computed_at_name
  ON metric_results(computed_at, name);
"#;
