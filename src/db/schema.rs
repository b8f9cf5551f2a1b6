//! List store schema
//!
//! Six tables: allow/deny lists keyed by stable account id, literal address,
//! or literal domain, plus the address-level MOTD deny shadow table. The DDL
//! is portable between SQLite and MariaDB. Statements run once, right after
//! pool construction, before the database is advertised as ready.

/// Table names in creation order
pub const TABLES: &[&str] = &[
    "whitelist",
    "whitelist_ip",
    "whitelist_domain",
    "blacklist",
    "blacklist_ip",
    "blacklist_motd",
];

pub(crate) const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS whitelist (\
        uuid VARCHAR(36) PRIMARY KEY, \
        name VARCHAR(36) UNIQUE, \
        added_by VARCHAR(36), \
        added_at BIGINT)",
    "CREATE TABLE IF NOT EXISTS whitelist_ip (\
        ip VARCHAR(39) PRIMARY KEY, \
        added_by VARCHAR(36), \
        added_at BIGINT)",
    "CREATE TABLE IF NOT EXISTS whitelist_domain (\
        domain VARCHAR(253) PRIMARY KEY, \
        added_by VARCHAR(36), \
        added_at BIGINT)",
    "CREATE TABLE IF NOT EXISTS blacklist (\
        uuid VARCHAR(36) PRIMARY KEY, \
        name VARCHAR(36) UNIQUE, \
        added_by VARCHAR(36), \
        added_at BIGINT, \
        reason VARCHAR(1500) DEFAULT 'No reason given')",
    "CREATE TABLE IF NOT EXISTS blacklist_ip (\
        ip VARCHAR(39) PRIMARY KEY, \
        added_by VARCHAR(36), \
        added_at BIGINT, \
        reason VARCHAR(1500) DEFAULT 'No reason given')",
    "CREATE TABLE IF NOT EXISTS blacklist_motd (\
        ip VARCHAR(39) PRIMARY KEY, \
        added_by VARCHAR(36), \
        added_at BIGINT)",
];
