//! Typed operations over the list tables
//!
//! The store is a thin repository over [`Database`]: every read and write the
//! engine performs is a named method here, so the SQL lives in one place.
//! The store performs no implicit mutation; entries are created, renamed, and
//! destroyed only through the engine's lifecycle paths.

use crate::db::{Database, SqlParam};
use crate::error::{DbError, DbResult};
use sqlx::Row;
use sqlx::any::AnyRow;
use std::fmt;
use std::sync::Arc;

/// Marker appended to a display name when its stable id takes a new name,
/// keeping the entry lookup-able under the old name.
pub const OLD_NAME_MARKER: &str = " (Old Name)";

/// The display name with the historical marker appended
pub fn historical(name: &str) -> String {
    format!("{name}{OLD_NAME_MARKER}")
}

/// Which list family a mutation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Grants access (whitelist)
    Allow,
    /// Denies access (blacklist)
    Deny,
}

impl ListKind {
    /// Account table for this list
    pub fn account_table(&self) -> &'static str {
        match self {
            ListKind::Allow => "whitelist",
            ListKind::Deny => "blacklist",
        }
    }

    /// Address table for this list
    pub fn address_table(&self) -> &'static str {
        match self {
            ListKind::Allow => "whitelist_ip",
            ListKind::Deny => "blacklist_ip",
        }
    }

    /// Deny-list tables carry a free-text reason column
    pub fn has_reason(&self) -> bool {
        matches!(self, ListKind::Deny)
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Allow => write!(f, "allow"),
            ListKind::Deny => write!(f, "deny"),
        }
    }
}

/// An account row: stable id plus last-observed display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEntry {
    pub uuid: String,
    pub name: String,
    pub added_by: String,
    pub added_at: i64,
    /// Deny list only
    pub reason: Option<String>,
}

/// An address row (primary tables and the MOTD shadow)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    pub ip: String,
    pub added_by: String,
    pub added_at: i64,
    /// Deny list only
    pub reason: Option<String>,
}

/// A domain row (allow list only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    pub domain: String,
    pub added_by: String,
    pub added_at: i64,
}

fn account_from_row(row: &AnyRow, with_reason: bool) -> DbResult<AccountEntry> {
    Ok(AccountEntry {
        uuid: row.try_get("uuid").map_err(DbError::query)?,
        name: row.try_get("name").map_err(DbError::query)?,
        added_by: row.try_get("added_by").map_err(DbError::query)?,
        added_at: row.try_get("added_at").map_err(DbError::query)?,
        reason: if with_reason {
            row.try_get("reason").map_err(DbError::query)?
        } else {
            None
        },
    })
}

fn address_from_row(row: &AnyRow, with_reason: bool) -> DbResult<AddressEntry> {
    Ok(AddressEntry {
        ip: row.try_get("ip").map_err(DbError::query)?,
        added_by: row.try_get("added_by").map_err(DbError::query)?,
        added_at: row.try_get("added_at").map_err(DbError::query)?,
        reason: if with_reason {
            row.try_get("reason").map_err(DbError::query)?
        } else {
            None
        },
    })
}

/// Repository over the six list tables
#[derive(Clone)]
pub struct ListStore {
    db: Arc<Database>,
}

impl ListStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // --- account tables ---

    /// Look up an account entry by its stable id
    pub async fn account_by_key(
        &self,
        list: ListKind,
        uuid: &str,
    ) -> DbResult<Option<AccountEntry>> {
        let sql = format!("SELECT * FROM {} WHERE uuid = ?", list.account_table());
        let row = self.db.fetch_optional(&sql, &[uuid.into()]).await?;
        row.map(|r| account_from_row(&r, list.has_reason())).transpose()
    }

    /// Look up an account entry by its display name (exact, marker included
    /// only if the caller appended it)
    pub async fn account_by_name(
        &self,
        list: ListKind,
        name: &str,
    ) -> DbResult<Option<AccountEntry>> {
        let sql = format!("SELECT * FROM {} WHERE name = ?", list.account_table());
        let row = self.db.fetch_optional(&sql, &[name.into()]).await?;
        row.map(|r| account_from_row(&r, list.has_reason())).transpose()
    }

    /// Insert an account entry
    ///
    /// An omitted deny-list reason relies on the column default.
    pub async fn insert_account(
        &self,
        list: ListKind,
        uuid: &str,
        name: &str,
        added_by: &str,
        added_at: i64,
        reason: Option<&str>,
    ) -> DbResult<()> {
        let table = list.account_table();
        match reason {
            Some(reason) if list.has_reason() => {
                let sql = format!(
                    "INSERT INTO {table} (uuid, name, added_by, added_at, reason) VALUES (?, ?, ?, ?, ?)"
                );
                self.db
                    .execute(
                        &sql,
                        &[
                            uuid.into(),
                            name.into(),
                            added_by.into(),
                            added_at.into(),
                            reason.into(),
                        ],
                    )
                    .await?;
            }
            _ => {
                let sql = format!(
                    "INSERT INTO {table} (uuid, name, added_by, added_at) VALUES (?, ?, ?, ?)"
                );
                self.db
                    .execute(
                        &sql,
                        &[uuid.into(), name.into(), added_by.into(), added_at.into()],
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Tag the holder of `name` as historical, freeing the name for reuse
    pub async fn relabel_account_name(&self, list: ListKind, name: &str) -> DbResult<u64> {
        let sql = format!("UPDATE {} SET name = ? WHERE name = ?", list.account_table());
        self.db
            .execute(&sql, &[historical(name).into(), name.into()])
            .await
    }

    /// Delete an account entry by display name, returning the affected count
    pub async fn delete_account_by_name(&self, list: ListKind, name: &str) -> DbResult<u64> {
        let sql = format!("DELETE FROM {} WHERE name = ?", list.account_table());
        self.db.execute(&sql, &[name.into()]).await
    }

    /// All display names in a list (tab-completion style enumeration)
    pub async fn list_account_names(&self, list: ListKind) -> DbResult<Vec<String>> {
        let sql = format!("SELECT name FROM {}", list.account_table());
        let rows = self.db.fetch_all(&sql, &[]).await?;
        rows.iter()
            .map(|r| r.try_get("name").map_err(DbError::query))
            .collect()
    }

    // --- address tables ---

    /// Look up an address entry
    pub async fn address_entry(&self, list: ListKind, ip: &str) -> DbResult<Option<AddressEntry>> {
        let sql = format!("SELECT * FROM {} WHERE ip = ?", list.address_table());
        let row = self.db.fetch_optional(&sql, &[ip.into()]).await?;
        row.map(|r| address_from_row(&r, list.has_reason())).transpose()
    }

    /// Insert an address entry
    pub async fn insert_address(
        &self,
        list: ListKind,
        ip: &str,
        added_by: &str,
        added_at: i64,
        reason: Option<&str>,
    ) -> DbResult<()> {
        let table = list.address_table();
        match reason {
            Some(reason) if list.has_reason() => {
                let sql = format!(
                    "INSERT INTO {table} (ip, added_by, added_at, reason) VALUES (?, ?, ?, ?)"
                );
                self.db
                    .execute(
                        &sql,
                        &[ip.into(), added_by.into(), added_at.into(), reason.into()],
                    )
                    .await?;
            }
            _ => {
                let sql = format!("INSERT INTO {table} (ip, added_by, added_at) VALUES (?, ?, ?)");
                self.db
                    .execute(&sql, &[ip.into(), added_by.into(), added_at.into()])
                    .await?;
            }
        }
        Ok(())
    }

    /// Delete an address entry, returning the affected count
    pub async fn delete_address(&self, list: ListKind, ip: &str) -> DbResult<u64> {
        let sql = format!("DELETE FROM {} WHERE ip = ?", list.address_table());
        self.db.execute(&sql, &[ip.into()]).await
    }

    /// All addresses in a list
    pub async fn list_addresses(&self, list: ListKind) -> DbResult<Vec<String>> {
        let sql = format!("SELECT ip FROM {}", list.address_table());
        let rows = self.db.fetch_all(&sql, &[]).await?;
        rows.iter()
            .map(|r| r.try_get("ip").map_err(DbError::query))
            .collect()
    }

    // --- MOTD shadow table ---

    pub async fn motd_entry(&self, ip: &str) -> DbResult<Option<AddressEntry>> {
        let row = self
            .db
            .fetch_optional("SELECT * FROM blacklist_motd WHERE ip = ?", &[ip.into()])
            .await?;
        row.map(|r| address_from_row(&r, false)).transpose()
    }

    pub async fn insert_motd(&self, ip: &str, added_by: &str, added_at: i64) -> DbResult<()> {
        self.db
            .execute(
                "INSERT INTO blacklist_motd (ip, added_by, added_at) VALUES (?, ?, ?)",
                &[ip.into(), added_by.into(), added_at.into()],
            )
            .await?;
        Ok(())
    }

    pub async fn delete_motd(&self, ip: &str) -> DbResult<u64> {
        self.db
            .execute("DELETE FROM blacklist_motd WHERE ip = ?", &[ip.into()])
            .await
    }

    pub async fn list_motd_addresses(&self) -> DbResult<Vec<String>> {
        let rows = self
            .db
            .fetch_all("SELECT ip FROM blacklist_motd", &[])
            .await?;
        rows.iter()
            .map(|r| r.try_get("ip").map_err(DbError::query))
            .collect()
    }

    // --- domain table (allow list only) ---

    pub async fn domain_entry(&self, domain: &str) -> DbResult<Option<DomainEntry>> {
        let row = self
            .db
            .fetch_optional(
                "SELECT * FROM whitelist_domain WHERE domain = ?",
                &[domain.into()],
            )
            .await?;
        row.map(|r| {
            Ok(DomainEntry {
                domain: r.try_get("domain").map_err(DbError::query)?,
                added_by: r.try_get("added_by").map_err(DbError::query)?,
                added_at: r.try_get("added_at").map_err(DbError::query)?,
            })
        })
        .transpose()
    }

    pub async fn insert_domain(&self, domain: &str, added_by: &str, added_at: i64) -> DbResult<()> {
        self.db
            .execute(
                "INSERT INTO whitelist_domain (domain, added_by, added_at) VALUES (?, ?, ?)",
                &[domain.into(), added_by.into(), added_at.into()],
            )
            .await?;
        Ok(())
    }

    pub async fn delete_domain(&self, domain: &str) -> DbResult<u64> {
        self.db
            .execute(
                "DELETE FROM whitelist_domain WHERE domain = ?",
                &[domain.into()],
            )
            .await
    }

    pub async fn list_domains(&self) -> DbResult<Vec<String>> {
        let rows = self
            .db
            .fetch_all("SELECT domain FROM whitelist_domain", &[])
            .await?;
        rows.iter()
            .map(|r| r.try_get("domain").map_err(DbError::query))
            .collect()
    }
}
