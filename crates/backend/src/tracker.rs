//! Collection catalogue and per-user collection progress

use chrono::Utc;
use meta_achiever_core::{
    compute_progress, ActivityKind, Collection, CollectionItem, CollectionProgress, MetaAchieverError,
    NewActivity, NewCollection, Result,
};
use rusqlite::Connection;
use tracing::info;

use crate::db::{activity, collections, definitions, shared};
use crate::error::DbResultExt;

pub fn create_collection(conn: &Connection, new: &NewCollection) -> Result<Collection> {
    if new.name.trim().is_empty() {
        return Err(MetaAchieverError::InvalidData("collection name is required".to_string()));
    }
    if let (Some(start), Some(end)) = (new.start_date, new.end_date) {
        if end < start {
            return Err(MetaAchieverError::InvalidData("collection ends before it starts".to_string()));
        }
    }

    let id = collections::insert_collection(conn, new, Utc::now()).db_err()?;
    info!(collection_id = id, name = %new.name, "Created collection");
    get_collection(conn, id)
}

pub fn get_collection(conn: &Connection, collection_id: i64) -> Result<Collection> {
    collections::get_collection(conn, collection_id)
        .db_err()?
        .ok_or_else(|| MetaAchieverError::NotFound(format!("collection {}", collection_id)))
}

/// Add a shared definition to a collection. Adding the same definition
/// twice fails with a database constraint error.
pub fn add_collection_item(
    conn: &Connection,
    collection_id: i64,
    shared_definition_id: i64,
    order_index: i32,
    is_required: bool,
    point_value: i64,
) -> Result<CollectionItem> {
    get_collection(conn, collection_id)?;
    if shared::get_shared(conn, shared_definition_id).db_err()?.is_none() {
        return Err(MetaAchieverError::NotFound(format!("shared achievement {}", shared_definition_id)));
    }

    let id = collections::insert_item(
        conn,
        collection_id,
        shared_definition_id,
        order_index,
        is_required,
        point_value,
        Utc::now(),
    )
    .db_err()?;

    Ok(CollectionItem {
        id,
        collection_id,
        shared_definition_id,
        order_index,
        is_required,
        point_value,
    })
}

pub fn list_collections(conn: &Connection, only_current: bool) -> Result<Vec<Collection>> {
    let now = Utc::now();
    let all = collections::list_collections(conn).db_err()?;
    Ok(all
        .into_iter()
        .filter(|c| !only_current || c.is_currently_active(now))
        .collect())
}

/// Retire or restore a collection. Retired collections drop out of the
/// current listing but keep their items and progress rows.
pub fn set_collection_active(conn: &Connection, collection_id: i64, active: bool) -> Result<Collection> {
    if collections::set_active(conn, collection_id, active).db_err()? == 0 {
        return Err(MetaAchieverError::NotFound(format!("collection {}", collection_id)));
    }
    info!(collection_id, active, "Changed collection status");
    get_collection(conn, collection_id)
}

/// Start tracking a user in a collection. Joining twice only recomputes.
pub fn join_collection(conn: &mut Connection, user_id: i64, collection_id: i64) -> Result<CollectionProgress> {
    let collection = get_collection(conn, collection_id)?;

    let tx = conn.transaction().db_err()?;
    if collections::get_progress(&tx, user_id, collection_id).db_err()?.is_none() {
        collections::increment_participants(&tx, collection_id).db_err()?;
        info!(user_id, collection_id, "Joined collection");
    }
    let progress = recompute_in(&tx, &collection, user_id)?;
    tx.commit().db_err()?;
    Ok(progress)
}

/// Rebuild the cached progress row from the collection's items and the
/// user's imports. Safe to run any number of times.
pub fn recompute_collection_progress(
    conn: &mut Connection,
    user_id: i64,
    collection_id: i64,
) -> Result<CollectionProgress> {
    let collection = get_collection(conn, collection_id)?;

    let tx = conn.transaction().db_err()?;
    let progress = recompute_in(&tx, &collection, user_id)?;
    tx.commit().db_err()?;
    Ok(progress)
}

/// Recompute every collection the user has joined, in collection id order
pub fn refresh_joined_collections(conn: &mut Connection, user_id: i64) -> Result<Vec<CollectionProgress>> {
    let joined = collections::joined_collection_ids(conn, user_id).db_err()?;
    let mut refreshed = Vec::with_capacity(joined.len());
    for collection_id in joined {
        refreshed.push(recompute_collection_progress(conn, user_id, collection_id)?);
    }
    Ok(refreshed)
}

fn recompute_in(conn: &Connection, collection: &Collection, user_id: i64) -> Result<CollectionProgress> {
    let items = collections::items_for(conn, collection.id).db_err()?;
    let imports = definitions::imported_shared_ids(conn, user_id).db_err()?;
    let previous = collections::get_progress(conn, user_id, collection.id).db_err()?;

    let now = Utc::now();
    let update = compute_progress(user_id, collection.id, &items, &imports, previous.as_ref(), now);
    collections::save_progress(conn, &update.progress).db_err()?;

    if update.newly_completed {
        collections::increment_completions(conn, collection.id).db_err()?;
        let mut entry = NewActivity::new(
            user_id,
            ActivityKind::CollectionCompleted,
            format!("Completed the \"{}\" collection", collection.name),
        );
        entry.collection_id = Some(collection.id);
        entry.metadata = serde_json::json!({ "points": update.progress.points_earned });
        activity::log_activity(conn, &entry, now).db_err()?;
        info!(user_id, collection_id = collection.id, "Collection completed");
    }

    Ok(update.progress)
}
