//! SQL schema definitions.

/// Complete schema for Parla v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Accounts
-- ============================================================

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    referral_code TEXT NOT NULL UNIQUE COLLATE NOCASE,
    sponsor_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    sponsor_preference TEXT CHECK (sponsor_preference IN ('left', 'right', 'auto')),
    created_at INTEGER NOT NULL,
    last_login_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_users_sponsor ON users(sponsor_id);

CREATE TABLE IF NOT EXISTS referral_invites (
    code TEXT PRIMARY KEY COLLATE NOCASE,
    owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    preference TEXT NOT NULL CHECK (preference IN ('left', 'right', 'auto')),
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    used_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
    used_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_invites_owner ON referral_invites(owner_id, expires_at);

-- ============================================================
-- Binary tree
-- ============================================================

-- One row per placed user. A root has neither upline nor position.
CREATE TABLE IF NOT EXISTS tree_nodes (
    user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    upline_id INTEGER REFERENCES tree_nodes(user_id),
    position TEXT CHECK (position IN ('left', 'right')),
    placed_at INTEGER NOT NULL,
    CHECK ((upline_id IS NULL) = (position IS NULL)),
    CHECK (upline_id IS NULL OR upline_id != user_id)
);

-- Slot invariant: at most one child per (upline, position).
CREATE UNIQUE INDEX IF NOT EXISTS idx_tree_slot
    ON tree_nodes(upline_id, position) WHERE upline_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS volume_aggregates (
    user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    left_volume INTEGER NOT NULL DEFAULT 0,
    right_volume INTEGER NOT NULL DEFAULT 0,
    paid_match_units INTEGER NOT NULL DEFAULT 0 CHECK (paid_match_units >= 0),
    binary_earnings INTEGER NOT NULL DEFAULT 0,
    total_commissions INTEGER NOT NULL DEFAULT 0,
    career_level TEXT NOT NULL DEFAULT 'none',
    career_rewards INTEGER NOT NULL DEFAULT 0
);

-- ============================================================
-- Requests
-- ============================================================

CREATE TABLE IF NOT EXISTS investments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    tier TEXT NOT NULL CHECK (tier IN ('silver', 'gold', 'platinum')),
    amount INTEGER NOT NULL CHECK (amount > 0),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'approved', 'rejected')),
    platform TEXT NOT NULL,
    payer_full_name TEXT NOT NULL DEFAULT '',
    payer_username TEXT NOT NULL DEFAULT '',
    payer_contact TEXT NOT NULL DEFAULT '',
    submitted_at INTEGER NOT NULL,
    decided_at INTEGER,
    processed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_investments_user ON investments(user_id, status);
CREATE INDEX IF NOT EXISTS idx_investments_status ON investments(status, submitted_at);

CREATE TABLE IF NOT EXISTS withdrawal_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    amount INTEGER NOT NULL CHECK (amount > 0),
    destination TEXT NOT NULL,
    destination_kind TEXT NOT NULL CHECK (destination_kind IN ('iban', 'crypto')),
    full_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'approved', 'rejected')),
    created_at INTEGER NOT NULL,
    decided_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_withdrawals_user ON withdrawal_requests(user_id, status);

-- ============================================================
-- Ledger (append-only)
-- ============================================================

-- No cascade: a user with ledger history cannot be deleted.
CREATE TABLE IF NOT EXISTS ledger_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    kind TEXT NOT NULL CHECK (kind IN (
        'weekly_profit', 'commission', 'binary_match',
        'career_reward', 'withdrawal', 'investment'
    )),
    amount INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'completed'
        CHECK (status IN ('pending', 'completed', 'rejected')),
    description TEXT NOT NULL,
    reference TEXT,
    created_at INTEGER NOT NULL
);

-- Each keyed payout happens at most once.
CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_reference
    ON ledger_entries(user_id, kind, reference) WHERE reference IS NOT NULL;

CREATE INDEX IF NOT EXISTS idx_ledger_user ON ledger_entries(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_ledger_kind ON ledger_entries(kind, status);

-- ============================================================
-- Settings
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
