//! Entry lifecycle engine
//!
//! Drives a classified identifier, an optional external resolution, and a
//! mutation intent through the store: `Classified → Resolving? → Checked →
//! Committed | Rejected | Failed`. Business-rule rejections resolve entirely
//! here and never escalate; infrastructure errors cross the boundary as
//! tagged [`crate::error::AppError`] values.
//!
//! The existence-check-then-write sequence for a key is a critical section:
//! a keyed async mutex serializes concurrent mutations of the same key, so
//! two concurrent adds of the same name cannot both observe "absent" and
//! both insert. The check is always issued fresh inside the critical
//! section, never cached from before the resolution phase.

mod locks;
mod outcome;

pub use locks::KeyLocks;
pub use outcome::{EntryInfo, Outcome, Rejection, UserMessage};

use crate::error::Result;
use crate::identifier::{Identifier, classify};
use crate::notify::{EventScope, ListAction, ListEvent, NotificationSink, dispatch};
use crate::resolver::{DomainProber, ProfileResolver, ResolvedProfile, SecondaryResolver};
use crate::store::{ListKind, ListStore, historical};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Maximum deny-list reason length in characters
pub const MAX_REASON_LEN: usize = 1500;

/// Where a listed account is currently connected from, if anywhere
///
/// Used by deny-list account adds to maintain the MOTD shadow row for the
/// player's live address. The default implementation knows nobody.
#[async_trait]
pub trait Presence: Send + Sync {
    /// Current remote address of the account, if it is online
    async fn address_of(&self, stable_id: &str) -> Option<String>;
}

/// Presence provider that reports everyone offline
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPresence;

#[async_trait]
impl Presence for NoPresence {
    async fn address_of(&self, _stable_id: &str) -> Option<String> {
        None
    }
}

/// The access-control entry engine
///
/// All state for an in-flight request lives in the request; the engine holds
/// only shared collaborators and the per-key lock registry.
pub struct ListEngine {
    store: ListStore,
    resolver: Arc<dyn ProfileResolver>,
    secondary: Option<Arc<dyn SecondaryResolver>>,
    secondary_prefix: Option<String>,
    prober: Arc<dyn DomainProber>,
    presence: Arc<dyn Presence>,
    sink: Arc<dyn NotificationSink>,
    locks: KeyLocks,
}

impl ListEngine {
    /// Create an engine with default prober/presence and no secondary platform
    pub fn new(
        store: ListStore,
        resolver: Arc<dyn ProfileResolver>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            resolver,
            secondary: None,
            secondary_prefix: None,
            prober: Arc::new(crate::resolver::DnsProber),
            presence: Arc::new(NoPresence),
            sink,
            locks: KeyLocks::default(),
        }
    }

    /// Configure the secondary-platform name prefix without a resolver
    ///
    /// Prefixed identifiers will classify but fail fast with
    /// [`Rejection::SecondaryUnavailable`]; absence of the resolver is an
    /// error, not a silent fallback.
    pub fn with_secondary_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.secondary_prefix = Some(prefix.into());
        self
    }

    /// Attach the secondary-platform resolver and its name prefix
    pub fn with_secondary(
        mut self,
        prefix: impl Into<String>,
        resolver: Arc<dyn SecondaryResolver>,
    ) -> Self {
        self.secondary_prefix = Some(prefix.into());
        self.secondary = Some(resolver);
        self
    }

    /// Replace the domain prober (tests use a fake)
    pub fn with_prober(mut self, prober: Arc<dyn DomainProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Attach a presence provider
    pub fn with_presence(mut self, presence: Arc<dyn Presence>) -> Self {
        self.presence = presence;
        self
    }

    fn classify(&self, raw: &str) -> Identifier {
        classify(raw, self.secondary_prefix.as_deref())
    }

    // --- add ---

    /// Add an identifier to a list
    #[instrument(skip(self), fields(list = %list, actor = %actor, raw = %raw))]
    pub async fn add(
        &self,
        list: ListKind,
        actor: &str,
        raw: &str,
        reason: Option<&str>,
    ) -> Result<Outcome> {
        // reason is validated before any resolution, check, or event
        if let Some(reason) = reason
            && list.has_reason()
            && reason.chars().count() > MAX_REASON_LEN
        {
            return Ok(Outcome::Rejected(Rejection::ReasonTooLong {
                len: reason.chars().count(),
            }));
        }
        let reason = reason.filter(|_| list.has_reason());

        match self.classify(raw) {
            Identifier::AccountName(name) => {
                let profile = self.resolver.resolve(&name).await?;
                self.add_account(list, actor, profile, reason).await
            }
            Identifier::SecondaryName { name, .. } => {
                let Some(secondary) = &self.secondary else {
                    return Ok(Outcome::Rejected(Rejection::SecondaryUnavailable));
                };
                let profile = secondary.resolve(&name).await?;
                self.add_account(list, actor, profile, reason).await
            }
            Identifier::AddressV4(ip) | Identifier::AddressV6(ip) => {
                self.add_address(list, actor, &ip, reason).await
            }
            Identifier::Domain(domain) => {
                if list == ListKind::Deny {
                    return Ok(Outcome::Rejected(Rejection::DomainDenyUnsupported {
                        domain,
                    }));
                }
                self.add_domain(actor, &domain).await
            }
            Identifier::Invalid => Ok(Outcome::Rejected(Rejection::InvalidIdentifier {
                raw: raw.to_string(),
            })),
        }
    }

    /// Add path for a resolved account
    ///
    /// The resolution may have taken arbitrarily long, so the existence
    /// check happens fresh, inside the critical section. Both locks are
    /// needed: the insert is keyed by stable id, while the relabel below
    /// mutates name-keyed state that removals lock by display name.
    async fn add_account(
        &self,
        list: ListKind,
        actor: &str,
        profile: ResolvedProfile,
        reason: Option<&str>,
    ) -> Result<Outcome> {
        let _guards = self
            .locks
            .lock_pair(&profile.stable_id, &profile.canonical_name)
            .await;

        if self
            .store
            .account_by_key(list, &profile.stable_id)
            .await?
            .is_some()
        {
            return Ok(Outcome::Rejected(Rejection::AlreadyListed {
                entry: profile.canonical_name,
            }));
        }

        // Rename-on-identity-change: if another stable id holds this display
        // name, tag that row historical before inserting, preserving
        // lookup-by-old-name without a name collision.
        if let Some(holder) = self
            .store
            .account_by_name(list, &profile.canonical_name)
            .await?
        {
            debug!(old_key = %holder.uuid, name = %holder.name, "Relabeling renamed account");
            self.store
                .relabel_account_name(list, &profile.canonical_name)
                .await?;
        }

        let now = Utc::now().timestamp_millis();
        self.store
            .insert_account(
                list,
                &profile.stable_id,
                &profile.canonical_name,
                actor,
                now,
                reason,
            )
            .await?;

        dispatch(
            &self.sink,
            ListEvent {
                list: list.into(),
                scope: EventScope::Account,
                action: ListAction::Add,
                key: profile.stable_id.clone(),
                display_name: Some(profile.canonical_name.clone()),
                actor: actor.to_string(),
                at_millis: now,
                reason: reason.map(str::to_string),
            },
        );

        // Auxiliary shadow write for the live address; failure here is
        // isolated, not rolled into the primary insert.
        if list == ListKind::Deny
            && let Some(ip) = self.presence.address_of(&profile.stable_id).await
        {
            self.ensure_motd_shadow(actor, &ip).await;
        }

        Ok(Outcome::Committed(UserMessage::added(
            list,
            &profile.canonical_name,
        )))
    }

    /// Add path for a literal address (no resolution phase)
    async fn add_address(
        &self,
        list: ListKind,
        actor: &str,
        ip: &str,
        reason: Option<&str>,
    ) -> Result<Outcome> {
        let _guard = self.locks.lock(ip).await;

        if self.store.address_entry(list, ip).await?.is_some() {
            return Ok(Outcome::Rejected(Rejection::AlreadyListed {
                entry: ip.to_string(),
            }));
        }

        let now = Utc::now().timestamp_millis();
        self.store.insert_address(list, ip, actor, now, reason).await?;

        dispatch(
            &self.sink,
            ListEvent {
                list: list.into(),
                scope: EventScope::Address,
                action: ListAction::Add,
                key: ip.to_string(),
                display_name: None,
                actor: actor.to_string(),
                at_millis: now,
                reason: reason.map(str::to_string),
            },
        );

        if list == ListKind::Deny {
            self.ensure_motd_shadow(actor, ip).await;
        }

        Ok(Outcome::Committed(UserMessage::added(list, ip)))
    }

    /// Add path for a domain (allow list only)
    async fn add_domain(&self, actor: &str, domain: &str) -> Result<Outcome> {
        let _guard = self.locks.lock(domain).await;

        if self.store.domain_entry(domain).await?.is_some() {
            return Ok(Outcome::Rejected(Rejection::AlreadyListed {
                entry: domain.to_string(),
            }));
        }

        // Validates resolvability only; the stored key stays the literal
        if !self.prober.probe(domain).await {
            return Ok(Outcome::Rejected(Rejection::InvalidDomain {
                domain: domain.to_string(),
            }));
        }

        let now = Utc::now().timestamp_millis();
        self.store.insert_domain(domain, actor, now).await?;

        dispatch(
            &self.sink,
            ListEvent {
                list: ListKind::Allow.into(),
                scope: EventScope::Domain,
                action: ListAction::Add,
                key: domain.to_string(),
                display_name: None,
                actor: actor.to_string(),
                at_millis: now,
                reason: None,
            },
        );

        Ok(Outcome::Committed(UserMessage::added(ListKind::Allow, domain)))
    }

    /// Ensure the MOTD shadow row exists for an address
    ///
    /// Auxiliary, independent write: its failure is logged, never propagated.
    async fn ensure_motd_shadow(&self, actor: &str, ip: &str) {
        let result = async {
            if self.store.motd_entry(ip).await?.is_some() {
                return crate::error::DbResult::Ok(false);
            }
            let now = Utc::now().timestamp_millis();
            self.store.insert_motd(ip, actor, now).await?;
            dispatch(
                &self.sink,
                ListEvent {
                    list: ListKind::Deny.into(),
                    scope: EventScope::Motd,
                    action: ListAction::Add,
                    key: ip.to_string(),
                    display_name: None,
                    actor: actor.to_string(),
                    at_millis: now,
                    reason: None,
                },
            );
            Ok(true)
        }
        .await;

        if let Err(e) = result {
            warn!(ip = %ip, error = %e, "MOTD shadow write failed; primary entry kept");
        }
    }

    // --- remove ---

    /// Remove an identifier from a list
    #[instrument(skip(self), fields(list = %list, actor = %actor, raw = %raw))]
    pub async fn remove(&self, list: ListKind, actor: &str, raw: &str) -> Result<Outcome> {
        match self.classify(raw) {
            Identifier::AccountName(_) | Identifier::SecondaryName { .. } => {
                // accounts are removed by display name; secondary names are
                // stored prefixed, so the raw form is the stored name
                self.remove_account(list, actor, raw).await
            }
            Identifier::AddressV4(ip) | Identifier::AddressV6(ip) => {
                self.remove_address(list, actor, &ip).await
            }
            Identifier::Domain(domain) => {
                if list == ListKind::Deny {
                    return Ok(Outcome::Rejected(Rejection::DomainDenyUnsupported {
                        domain,
                    }));
                }
                self.remove_domain(actor, &domain).await
            }
            Identifier::Invalid => Ok(Outcome::Rejected(Rejection::InvalidIdentifier {
                raw: raw.to_string(),
            })),
        }
    }

    async fn remove_account(&self, list: ListKind, actor: &str, name: &str) -> Result<Outcome> {
        let _guard = self.locks.lock(name).await;

        // current name first, then the historical marker so removal still
        // works after a rename
        let (stored_name, entry) = match self.store.account_by_name(list, name).await? {
            Some(entry) => (name.to_string(), entry),
            None => {
                let old = historical(name);
                match self.store.account_by_name(list, &old).await? {
                    Some(entry) => (old, entry),
                    None => {
                        return Ok(Outcome::Rejected(Rejection::NotListed {
                            entry: name.to_string(),
                        }));
                    }
                }
            }
        };

        // commit only on an actual deletion; a zero count means the row is
        // gone and the event would report a mutation that never happened
        let deleted = self.store.delete_account_by_name(list, &stored_name).await?;
        if deleted == 0 {
            return Ok(Outcome::Rejected(Rejection::NotListed {
                entry: name.to_string(),
            }));
        }

        dispatch(
            &self.sink,
            ListEvent {
                list: list.into(),
                scope: EventScope::Account,
                action: ListAction::Remove,
                key: entry.uuid,
                display_name: Some(entry.name),
                actor: actor.to_string(),
                at_millis: Utc::now().timestamp_millis(),
                reason: None,
            },
        );

        Ok(Outcome::Committed(UserMessage::removed(list, &stored_name)))
    }

    /// Address removal clears the primary table and the MOTD shadow; the key
    /// may sit in either or both (shadow-only is the repair case)
    async fn remove_address(&self, list: ListKind, actor: &str, ip: &str) -> Result<Outcome> {
        let _guard = self.locks.lock(ip).await;

        let in_primary = self.store.address_entry(list, ip).await?.is_some();
        let in_shadow = list == ListKind::Deny && self.store.motd_entry(ip).await?.is_some();

        if !in_primary && !in_shadow {
            return Ok(Outcome::Rejected(Rejection::NotListed {
                entry: ip.to_string(),
            }));
        }

        let now = Utc::now().timestamp_millis();

        if in_primary {
            self.store.delete_address(list, ip).await?;
            dispatch(
                &self.sink,
                ListEvent {
                    list: list.into(),
                    scope: EventScope::Address,
                    action: ListAction::Remove,
                    key: ip.to_string(),
                    display_name: None,
                    actor: actor.to_string(),
                    at_millis: now,
                    reason: None,
                },
            );
        }

        if in_shadow {
            self.store.delete_motd(ip).await?;
            dispatch(
                &self.sink,
                ListEvent {
                    list: ListKind::Deny.into(),
                    scope: EventScope::Motd,
                    action: ListAction::Remove,
                    key: ip.to_string(),
                    display_name: None,
                    actor: actor.to_string(),
                    at_millis: now,
                    reason: None,
                },
            );
        }

        Ok(Outcome::Committed(UserMessage::removed(list, ip)))
    }

    async fn remove_domain(&self, actor: &str, domain: &str) -> Result<Outcome> {
        let _guard = self.locks.lock(domain).await;

        if self.store.domain_entry(domain).await?.is_none() {
            return Ok(Outcome::Rejected(Rejection::NotListed {
                entry: domain.to_string(),
            }));
        }

        self.store.delete_domain(domain).await?;

        dispatch(
            &self.sink,
            ListEvent {
                list: ListKind::Allow.into(),
                scope: EventScope::Domain,
                action: ListAction::Remove,
                key: domain.to_string(),
                display_name: None,
                actor: actor.to_string(),
                at_millis: Utc::now().timestamp_millis(),
                reason: None,
            },
        );

        Ok(Outcome::Committed(UserMessage::removed(
            ListKind::Allow,
            domain,
        )))
    }

    // --- MOTD-only add ---

    /// Add an address to the MOTD shadow table alone
    #[instrument(skip(self), fields(actor = %actor, raw = %raw))]
    pub async fn motd_add(&self, actor: &str, raw: &str) -> Result<Outcome> {
        let Identifier::AddressV4(ip) = self.classify(raw) else {
            return Ok(Outcome::Rejected(Rejection::MotdRequiresIpv4));
        };

        let _guard = self.locks.lock(&ip).await;

        if self.store.motd_entry(&ip).await?.is_some() {
            return Ok(Outcome::Rejected(Rejection::AlreadyListed { entry: ip }));
        }

        let now = Utc::now().timestamp_millis();
        self.store.insert_motd(&ip, actor, now).await?;

        dispatch(
            &self.sink,
            ListEvent {
                list: ListKind::Deny.into(),
                scope: EventScope::Motd,
                action: ListAction::Add,
                key: ip.clone(),
                display_name: None,
                actor: actor.to_string(),
                at_millis: now,
                reason: None,
            },
        );

        Ok(Outcome::Committed(UserMessage {
            key: "blacklist.motd.added",
            params: vec![ip],
        }))
    }

    // --- info / enumeration ---

    /// Read-only lookup of a single entry
    #[instrument(skip(self), fields(list = %list, raw = %raw))]
    pub async fn info(&self, list: ListKind, raw: &str) -> Result<Outcome> {
        match self.classify(raw) {
            Identifier::AccountName(_) | Identifier::SecondaryName { .. } => {
                let entry = match self.store.account_by_name(list, raw).await? {
                    Some(entry) => Some(entry),
                    None => self.store.account_by_name(list, &historical(raw)).await?,
                };
                match entry {
                    Some(entry) => Ok(Outcome::Info(EntryInfo {
                        list,
                        scope: EventScope::Account,
                        key: entry.uuid,
                        display_name: Some(entry.name),
                        added_by: entry.added_by,
                        added_at: entry.added_at,
                        reason: entry.reason,
                    })),
                    None => Ok(Outcome::Rejected(Rejection::NotListed {
                        entry: raw.to_string(),
                    })),
                }
            }
            Identifier::AddressV4(ip) | Identifier::AddressV6(ip) => {
                if let Some(entry) = self.store.address_entry(list, &ip).await? {
                    return Ok(Outcome::Info(EntryInfo {
                        list,
                        scope: EventScope::Address,
                        key: entry.ip,
                        display_name: None,
                        added_by: entry.added_by,
                        added_at: entry.added_at,
                        reason: entry.reason,
                    }));
                }
                // shadow-only entries are still reportable on the deny list
                if list == ListKind::Deny
                    && let Some(entry) = self.store.motd_entry(&ip).await?
                {
                    return Ok(Outcome::Info(EntryInfo {
                        list,
                        scope: EventScope::Motd,
                        key: entry.ip,
                        display_name: None,
                        added_by: entry.added_by,
                        added_at: entry.added_at,
                        reason: None,
                    }));
                }
                Ok(Outcome::Rejected(Rejection::NotListed { entry: ip }))
            }
            Identifier::Domain(domain) => {
                if list == ListKind::Deny {
                    return Ok(Outcome::Rejected(Rejection::DomainDenyUnsupported {
                        domain,
                    }));
                }
                match self.store.domain_entry(&domain).await? {
                    Some(entry) => Ok(Outcome::Info(EntryInfo {
                        list,
                        scope: EventScope::Domain,
                        key: entry.domain,
                        display_name: None,
                        added_by: entry.added_by,
                        added_at: entry.added_at,
                        reason: None,
                    })),
                    None => Ok(Outcome::Rejected(Rejection::NotListed { entry: domain })),
                }
            }
            Identifier::Invalid => Ok(Outcome::Rejected(Rejection::InvalidIdentifier {
                raw: raw.to_string(),
            })),
        }
    }

    /// Enumerate every key in a list (names, addresses, shadow addresses,
    /// and domains for the allow list)
    pub async fn list_entries(&self, list: ListKind) -> Result<Vec<String>> {
        let mut entries = self.store.list_account_names(list).await?;
        entries.extend(self.store.list_addresses(list).await?);

        match list {
            ListKind::Allow => {
                entries.extend(self.store.list_domains().await?);
            }
            ListKind::Deny => {
                for ip in self.store.list_motd_addresses().await? {
                    if !entries.contains(&ip) {
                        entries.push(format!("{ip} (motd)"));
                    }
                }
            }
        }

        Ok(entries)
    }
}
