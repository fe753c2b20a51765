//! Authoring and evaluating a user's custom achievements

use chrono::Utc;
use meta_achiever_core::{
    AchievementDefinition, ActivityKind, Evaluation, MetaAchieverError, NewActivity, NewDefinition,
    Result,
};
use rusqlite::Connection;
use tracing::info;

use crate::db::{activity, definitions, games, shared};
use crate::error::DbResultExt;

/// A definition with its current evaluation and required game names
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedDefinition {
    pub definition: AchievementDefinition,
    pub evaluation: Evaluation,
    pub game_names: Vec<String>,
    /// True when this evaluation recorded the first completion
    pub newly_completed: bool,
}

pub fn create_definition(conn: &Connection, user_id: i64, new: NewDefinition) -> Result<AchievementDefinition> {
    let new = NewDefinition {
        name: new.name.trim().to_string(),
        description: new.description.trim().to_string(),
        ..new
    };
    if new.name.is_empty() {
        return Err(MetaAchieverError::InvalidData("achievement name is required".to_string()));
    }
    if new.description.is_empty() {
        return Err(MetaAchieverError::InvalidData("achievement description is required".to_string()));
    }

    let now = Utc::now();
    let id = definitions::insert_definition(conn, user_id, &new, None, now).db_err()?;

    let mut entry = NewActivity::new(user_id, ActivityKind::DefinitionCreated, format!("Created \"{}\"", new.name));
    entry.definition_id = Some(id);
    entry.metadata = serde_json::json!({ "condition_type": new.condition.kind_tag() });
    activity::log_activity(conn, &entry, now).db_err()?;

    info!(user_id, definition_id = id, "Created achievement definition");
    definitions::get_definition(conn, id)
        .db_err()?
        .ok_or_else(|| MetaAchieverError::NotFound(format!("achievement {}", id)))
}

/// Shared copies stay; their back-reference is cleared
pub fn delete_definition(conn: &Connection, user_id: i64, definition_id: i64) -> Result<()> {
    if !definitions::delete_definition(conn, user_id, definition_id).db_err()? {
        return Err(MetaAchieverError::NotFound(format!("achievement {}", definition_id)));
    }
    info!(user_id, definition_id, "Deleted achievement definition");
    Ok(())
}

/// Evaluate every definition of a user against one library snapshot,
/// recording first completions along the way.
pub fn evaluate_definitions(conn: &mut Connection, user_id: i64) -> Result<Vec<EvaluatedDefinition>> {
    let library = games::get_library_snapshot(conn, user_id).db_err()?;
    let owned = definitions::list_for_user(conn, user_id).db_err()?;

    let mut evaluated = Vec::with_capacity(owned.len());
    for mut definition in owned {
        let evaluation = definition.condition.evaluate(&library);
        let game_names = games::game_names(conn, definition.condition.games()).db_err()?;

        let mut newly_completed = false;
        if evaluation.complete && definition.completed_at.is_none() {
            newly_completed = record_completion(conn, &definition)?;
            if newly_completed {
                definition = definitions::get_definition(conn, definition.id)
                    .db_err()?
                    .unwrap_or(definition);
            }
        }

        evaluated.push(EvaluatedDefinition {
            definition,
            evaluation,
            game_names,
            newly_completed,
        });
    }
    Ok(evaluated)
}

fn record_completion(conn: &mut Connection, definition: &AchievementDefinition) -> Result<bool> {
    let now = Utc::now();
    let tx = conn.transaction().db_err()?;
    if !definitions::mark_completed(&tx, definition.id, now).db_err()? {
        return Ok(false);
    }

    let mut entry = NewActivity::new(
        definition.user_id,
        ActivityKind::DefinitionUnlocked,
        format!("Unlocked \"{}\"", definition.name),
    );
    entry.definition_id = Some(definition.id);
    entry.shared_definition_id = definition.imported_from();
    activity::log_activity(&tx, &entry, now).db_err()?;

    if let Some(shared_id) = definition.imported_from() {
        shared::increment_completions(&tx, shared_id).db_err()?;
    }
    tx.commit().db_err()?;

    info!(user_id = definition.user_id, definition_id = definition.id, "Achievement unlocked");
    Ok(true)
}
