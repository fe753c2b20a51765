//! Community sharing and importing of achievement definitions
//!
//! Business-rule rejections (already shared, already imported, name taken,
//! still used by a collection) come back as outcome variants with a notice
//! for the user. Only missing rows and storage failures are errors.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::Utc;
use meta_achiever_core::{
    round_places, AchievementDefinition, ActivityKind, MetaAchieverError, NewActivity, NewDefinition,
    Provenance, Result, SharedDefinition,
};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{activity, definitions, games, shared};
use crate::error::DbResultExt;

#[derive(Debug, Clone, PartialEq)]
pub enum ShareOutcome {
    Shared(SharedDefinition),
    AlreadyShared,
}

impl ShareOutcome {
    pub fn notice(&self) -> String {
        match self {
            ShareOutcome::Shared(s) => format!("\"{}\" is now shared with the community", s.name),
            ShareOutcome::AlreadyShared => "This achievement is already shared with the community".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnshareOutcome {
    Unshared,
    NotShared,
    /// Collections still containing the shared copy
    BlockedByCollections(Vec<String>),
}

impl UnshareOutcome {
    pub fn notice(&self) -> String {
        match self {
            UnshareOutcome::Unshared => "Achievement removed from the community".to_string(),
            UnshareOutcome::NotShared => "This achievement is not shared".to_string(),
            UnshareOutcome::BlockedByCollections(names) => format!(
                "Cannot unshare while it is part of these collections: {}",
                names.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Imported(AchievementDefinition),
    AlreadyImported,
    NameCollision,
}

impl ImportOutcome {
    pub fn notice(&self) -> String {
        match self {
            ImportOutcome::Imported(def) => format!("Imported \"{}\" into your achievements", def.name),
            ImportOutcome::AlreadyImported => "You have already imported this achievement".to_string(),
            ImportOutcome::NameCollision => "You already have an achievement with this name".to_string(),
        }
    }
}

/// Publish a snapshot of one of the user's definitions
pub fn share_definition(conn: &Connection, user_id: i64, definition_id: i64) -> Result<ShareOutcome> {
    let definition = definitions::get_definition(conn, definition_id)
        .db_err()?
        .filter(|d| d.user_id == user_id)
        .ok_or_else(|| MetaAchieverError::NotFound(format!("achievement {}", definition_id)))?;

    if shared::find_active_by_name(conn, user_id, &definition.name).db_err()?.is_some() {
        info!(user_id, definition_id, "Definition already shared, nothing to do");
        return Ok(ShareOutcome::AlreadyShared);
    }

    let now = Utc::now();
    // Snapshot and feed entry land together or not at all.
    let tx = conn.unchecked_transaction().db_err()?;
    let shared_id = shared::insert_shared(&tx, &definition, now).db_err()?;

    let mut entry = NewActivity::new(
        user_id,
        ActivityKind::DefinitionShared,
        format!("Shared \"{}\"", definition.name),
    );
    entry.definition_id = Some(definition.id);
    entry.shared_definition_id = Some(shared_id);
    activity::log_activity(&tx, &entry, now).db_err()?;
    tx.commit().db_err()?;

    info!(user_id, definition_id, shared_id, "Shared definition");
    let snapshot = shared::get_shared(conn, shared_id)
        .db_err()?
        .ok_or_else(|| MetaAchieverError::NotFound(format!("shared achievement {}", shared_id)))?;
    Ok(ShareOutcome::Shared(snapshot))
}

/// Withdraw the user's shared copy of a definition
pub fn unshare_definition(conn: &Connection, user_id: i64, definition_id: i64) -> Result<UnshareOutcome> {
    let Some(shared_id) = shared::find_by_original(conn, user_id, definition_id).db_err()? else {
        return Ok(UnshareOutcome::NotShared);
    };

    let collections = shared::referencing_collection_names(conn, shared_id).db_err()?;
    if !collections.is_empty() {
        warn!(user_id, shared_id, ?collections, "Unshare blocked by collections");
        return Ok(UnshareOutcome::BlockedByCollections(collections));
    }

    shared::delete_shared(conn, shared_id).db_err()?;
    info!(user_id, shared_id, "Unshared definition");
    Ok(UnshareOutcome::Unshared)
}

/// Copy a community definition into the user's own list
pub fn import_shared(conn: &mut Connection, user_id: i64, shared_id: i64) -> Result<ImportOutcome> {
    let tx = conn.transaction().db_err()?;

    let source = shared::get_shared(&tx, shared_id)
        .db_err()?
        .filter(|s| s.is_active)
        .ok_or_else(|| MetaAchieverError::NotFound(format!("shared achievement {}", shared_id)))?;

    if definitions::find_import(&tx, user_id, shared_id).db_err()?.is_some() {
        return Ok(ImportOutcome::AlreadyImported);
    }
    if definitions::name_exists(&tx, user_id, &source.name).db_err()? {
        return Ok(ImportOutcome::NameCollision);
    }

    let now = Utc::now();
    let copy = NewDefinition {
        name: source.name.clone(),
        description: source.description.clone(),
        condition: source.condition.clone(),
        image: source.image.clone(),
    };
    let provenance = Provenance {
        shared_id: Some(source.id),
        original_creator: source.creator_name.clone(),
    };
    let definition_id = definitions::insert_definition(&tx, user_id, &copy, Some(&provenance), now).db_err()?;
    shared::increment_tries(&tx, shared_id).db_err()?;

    let mut entry = NewActivity::new(
        user_id,
        ActivityKind::DefinitionImported,
        format!("Imported \"{}\"", source.name),
    );
    entry.description = Some(format!("Originally created by {}", source.creator_name));
    entry.definition_id = Some(definition_id);
    entry.shared_definition_id = Some(shared_id);
    activity::log_activity(&tx, &entry, now).db_err()?;

    let imported = definitions::get_definition(&tx, definition_id)
        .db_err()?
        .ok_or_else(|| MetaAchieverError::NotFound(format!("achievement {}", definition_id)))?;
    tx.commit().db_err()?;

    info!(user_id, shared_id, definition_id, "Imported shared definition");
    Ok(ImportOutcome::Imported(imported))
}

/// A (creator, name) group that had more than one shared row
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub creator_id: i64,
    pub creator_name: String,
    pub name: String,
    pub kept_id: i64,
    pub removed_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub groups: Vec<DuplicateGroup>,
    pub removed: usize,
}

/// Keep the most recently shared row of every (creator, name) group and
/// delete the rest, moving their references over first.
pub fn cleanup_duplicate_shares(conn: &mut Connection) -> Result<CleanupReport> {
    let tx = conn.transaction().db_err()?;

    let mut groups: BTreeMap<(i64, String), Vec<SharedDefinition>> = BTreeMap::new();
    for row in shared::list_all(&tx).db_err()? {
        groups.entry((row.creator_id, row.name.clone())).or_default().push(row);
    }

    let mut report = CleanupReport::default();
    for ((creator_id, name), rows) in groups {
        if rows.len() < 2 {
            continue;
        }
        let Some(keep) = rows.iter().max_by(|a, b| (a.shared_at, a.id).cmp(&(b.shared_at, b.id))) else {
            continue;
        };
        let kept_id = keep.id;
        let creator_name = keep.creator_name.clone();

        let mut removed_ids = Vec::new();
        for duplicate in rows.iter().filter(|r| r.id != kept_id) {
            shared::repoint_references(&tx, duplicate.id, kept_id).db_err()?;
            shared::delete_shared(&tx, duplicate.id).db_err()?;
            removed_ids.push(duplicate.id);
        }

        info!(creator_id, name = %name, kept_id, removed = removed_ids.len(), "Removed duplicate shares");
        report.removed += removed_ids.len();
        report.groups.push(DuplicateGroup {
            creator_id,
            creator_name,
            name,
            kept_id,
            removed_ids,
        });
    }

    tx.commit().db_err()?;
    Ok(report)
}

/// One row of the community browser, seen by a particular user
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityEntry {
    pub shared: SharedDefinition,
    pub game_names: Vec<String>,
    /// Percentage of required games the viewer owns
    pub compatibility: f64,
    pub already_imported: bool,
}

/// Active shares by other users, most popular first, then most compatible
pub fn community_listing(conn: &Connection, viewer_id: i64) -> Result<Vec<CommunityEntry>> {
    let library = games::get_library_snapshot(conn, viewer_id).db_err()?;
    let imported = definitions::imported_shared_ids(conn, viewer_id).db_err()?;

    let mut entries = Vec::new();
    for snapshot in shared::list_active_excluding(conn, viewer_id).db_err()? {
        let required = snapshot.condition.games();
        let game_names = games::game_names(conn, required).db_err()?;
        let compatibility = round_places(library.ownership_percent(required), 2);
        entries.push(CommunityEntry {
            already_imported: imported.contains_key(&snapshot.id),
            shared: snapshot,
            game_names,
            compatibility,
        });
    }

    entries.sort_by(|a, b| {
        b.shared
            .popularity()
            .cmp(&a.shared.popularity())
            .then_with(|| b.compatibility.partial_cmp(&a.compatibility).unwrap_or(Ordering::Equal))
    });
    Ok(entries)
}
