//! Pane registry
//!
//! Tracks attached panes by caller-chosen name, enforces the capacity
//! ceiling, and keeps at most one pane flagged primary. The reserved
//! `primary` name is never stored; [`PaneRegistry::resolve`] maps it onto
//! whichever pane currently holds the flag.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use tooldex_protocol::PRIMARY_ALIAS;
use tooldex_utils::{Result, TooldexError};

use super::Pane;
use crate::gateway::PaneTarget;

lazy_static! {
    static ref NAME_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

/// Whether `name` satisfies the pane naming pattern
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

fn validate_name(name: &str) -> Result<()> {
    if name == PRIMARY_ALIAS || !is_valid_name(name) {
        return Err(TooldexError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// The pane the server was launched from, auto-attached on first use of the alias
#[derive(Debug, Clone)]
pub struct OriginPane {
    pub name: String,
    pub target: PaneTarget,
}

/// Registry of attached panes
#[derive(Debug)]
pub struct PaneRegistry {
    panes: HashMap<String, Pane>,
    max_panes: usize,
    next_seq: u64,
    origin: Option<OriginPane>,
    auto_attach_attempted: bool,
}

impl PaneRegistry {
    pub fn new(max_panes: usize) -> Self {
        Self {
            panes: HashMap::new(),
            max_panes,
            next_seq: 0,
            origin: None,
            auto_attach_attempted: false,
        }
    }

    /// Record the detected origin pane
    pub fn set_origin(&mut self, origin: Option<OriginPane>) {
        self.origin = origin;
    }

    pub fn max_panes(&self) -> usize {
        self.max_panes
    }

    pub fn len(&self) -> usize {
        self.panes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Attach (or re-attach) a pane under `name`
    ///
    /// Re-attaching an existing name replaces its identity and never counts
    /// against capacity. With `make_primary` every other pane loses the flag.
    pub fn attach(&mut self, name: &str, target: PaneTarget, make_primary: bool) -> Result<&Pane> {
        validate_name(name)?;

        if !self.panes.contains_key(name) && self.panes.len() >= self.max_panes {
            return Err(TooldexError::CapacityExceeded {
                limit: self.max_panes,
            });
        }

        if make_primary {
            for pane in self.panes.values_mut() {
                pane.set_primary(false);
            }
        }

        let seq = self.next_seq();
        let pane = match self.panes.entry(name.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                let pane = entry.into_mut();
                debug!(name, old = %pane.pane_id(), new = %target.pane_id, "re-attaching pane");
                pane.retarget(target, seq);
                if make_primary {
                    pane.set_primary(true);
                }
                pane
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(Pane::new(name, target, make_primary, seq))
            }
        };

        info!(name, pane_id = %pane.pane_id(), primary = pane.is_primary(), "pane attached");
        Ok(pane)
    }

    /// Remove a pane; `primary` removes whichever pane holds the flag
    ///
    /// The returned pane still carries its subscription tokens so the caller
    /// can cascade their removal.
    pub fn detach(&mut self, name: &str) -> Option<Pane> {
        let key = if name == PRIMARY_ALIAS {
            self.primary_name()?.to_string()
        } else {
            name.to_string()
        };

        let pane = self.panes.remove(&key)?;
        info!(name = %key, pane_id = %pane.pane_id(), "pane detached");
        Some(pane)
    }

    /// Resolve a name or the primary alias, touching the pane on success
    pub fn resolve(&mut self, name: &str) -> Result<&mut Pane> {
        let key = if name == PRIMARY_ALIAS {
            let primary = self.primary_name().map(str::to_string);
            match primary {
                Some(primary) => primary,
                None => self.auto_attach_origin()?,
            }
        } else {
            name.to_string()
        };

        let pane = self
            .panes
            .get_mut(&key)
            .ok_or_else(|| TooldexError::PaneNotFound(name.to_string()))?;
        pane.touch();
        Ok(pane)
    }

    /// One-shot attach of the origin pane as primary
    fn auto_attach_origin(&mut self) -> Result<String> {
        if self.auto_attach_attempted {
            return Err(TooldexError::NoPrimary);
        }
        self.auto_attach_attempted = true;

        let origin = self.origin.clone().ok_or(TooldexError::NoPrimary)?;

        // Already attached under some other name: promote that entry
        let existing = self
            .panes
            .values()
            .find(|p| p.pane_id() == origin.target.pane_id)
            .map(|p| p.name().to_string());
        if let Some(name) = existing {
            for pane in self.panes.values_mut() {
                pane.set_primary(pane.name() == name);
            }
            info!(name = %name, "promoted attached origin pane to primary");
            return Ok(name);
        }

        // The name belongs to a caller's pane on another surface; leave it alone
        if let Some(taken) = self.panes.get(&origin.name) {
            warn!(
                name = %origin.name,
                attached = %taken.pane_id(),
                origin = %origin.target.pane_id,
                "origin name already in use, not auto-attaching"
            );
            return Err(TooldexError::NoPrimary);
        }

        match self.attach(&origin.name, origin.target, true) {
            Ok(pane) => Ok(pane.name().to_string()),
            Err(e) => {
                warn!(error = %e, "auto-attach of origin pane failed");
                Err(TooldexError::NoPrimary)
            }
        }
    }

    /// Exact lookup, no alias handling
    pub fn get(&self, name: &str) -> Option<&Pane> {
        self.panes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Pane> {
        self.panes.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.panes.contains_key(name)
    }

    /// Name of the pane holding the primary flag
    pub fn primary_name(&self) -> Option<&str> {
        self.panes
            .values()
            .find(|p| p.is_primary())
            .map(|p| p.name())
    }

    /// Attached panes, newest attach first
    pub fn list(&self) -> Vec<&Pane> {
        let mut panes: Vec<&Pane> = self.panes.values().collect();
        panes.sort_by(|a, b| b.attach_seq().cmp(&a.attach_seq()));
        panes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pane> {
        self.panes.values()
    }
}
