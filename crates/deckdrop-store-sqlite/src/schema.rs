//! SQL schema for the deckdrop SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS cards (
    card_id     TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE COLLATE NOCASE,
    card_type   TEXT NOT NULL,   -- 'Character' | 'Spell' | 'Item' | 'Environment'
    rarity      TEXT NOT NULL,   -- 'Common' .. 'Legendary'
    attack      INTEGER NOT NULL DEFAULT 0 CHECK (attack  >= 0),
    defense     INTEGER NOT NULL DEFAULT 0 CHECK (defense >= 0),
    cost        INTEGER NOT NULL CHECK (cost >= 0),
    image_url   TEXT NOT NULL,
    description TEXT NOT NULL,
    created_by  TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

-- Per-card version counter; bumped with an atomic upsert.
CREATE TABLE IF NOT EXISTS card_versions (
    card_id      TEXT PRIMARY KEY REFERENCES cards(card_id),
    last_version INTEGER NOT NULL CHECK (last_version >= 0)
);

-- Every serial ever issued. Never deleted, so a serial is never reused.
CREATE TABLE IF NOT EXISTS serials (
    serial       TEXT PRIMARY KEY,
    card_id      TEXT NOT NULL REFERENCES cards(card_id),
    allocated_at TEXT NOT NULL
);

-- One row per surfaced, unresolved drop. claimed flips 0 -> 1 at most once.
CREATE TABLE IF NOT EXISTS active_drops (
    drop_id    TEXT PRIMARY KEY,
    card_id    TEXT NOT NULL REFERENCES cards(card_id),
    channel_id TEXT NOT NULL,
    message_id TEXT NOT NULL UNIQUE,
    version    INTEGER NOT NULL CHECK (version >= 1),
    serial     TEXT NOT NULL UNIQUE REFERENCES serials(serial),
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,   -- fixed-width RFC 3339; compared as text
    claimed    INTEGER NOT NULL DEFAULT 0,
    claimed_by TEXT,
    CHECK ((claimed = 0) = (claimed_by IS NULL))
);

-- Drops that left active_drops, kept so late claims can be told apart from
-- unknown ids.
CREATE TABLE IF NOT EXISTS resolved_drops (
    drop_id     TEXT PRIMARY KEY,
    message_id  TEXT NOT NULL,
    outcome     TEXT NOT NULL CHECK (outcome IN ('claimed', 'expired')),
    resolved_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS inventories (
    user_id    TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

-- Append-only apart from the favorite flag.
CREATE TABLE IF NOT EXISTS owned_cards (
    serial      TEXT PRIMARY KEY REFERENCES serials(serial),
    user_id     TEXT NOT NULL REFERENCES inventories(user_id),
    card_id     TEXT NOT NULL REFERENCES cards(card_id),
    version     INTEGER NOT NULL CHECK (version >= 1),
    obtained_at TEXT NOT NULL,
    favorite    INTEGER NOT NULL DEFAULT 0,
    UNIQUE (card_id, version)
);

CREATE INDEX IF NOT EXISTS active_drops_channel_idx ON active_drops(channel_id, claimed, expires_at);
CREATE INDEX IF NOT EXISTS owned_cards_user_idx     ON owned_cards(user_id);
CREATE INDEX IF NOT EXISTS resolved_drops_msg_idx   ON resolved_drops(message_id);

PRAGMA user_version = 2;
";
