// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite State Transition Repository
//!
//! Append-only ledger adapter. Sequence numbers are assigned inside the
//! insert transaction as `MAX(sequence_number) + 1` per entity; the
//! `UNIQUE(entity_id, sequence_number)` constraint is the arbiter for
//! concurrent writers to the same entity, surfacing the loser as
//! `DUPLICATE`.
//!
//! The "current state" queries use a per-entity argmax join on sequence
//! number: an entity is in state S when its highest-sequence transition's
//! `to_state` equals S.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use entity_exchange_domain::repositories::{
    NewStateTransition, StateTransitionFilter, StateTransitionRepository,
};
use entity_exchange_domain::{
    EntityId, EntityState, ErrorCode, RepositoryError, StateTransition, TenantContext,
    TransitionId, TransitionType,
};

use super::{map_db_error, parse_datetime, parse_json_map, require_tenant, to_json_text};

/// SQLite-backed state transition ledger.
pub struct SqliteStateTransitionRepository {
    pool: SqlitePool,
    context: TenantContext,
}

impl SqliteStateTransitionRepository {
    pub fn new(pool: SqlitePool, context: TenantContext) -> Self {
        SqliteStateTransitionRepository { pool, context }
    }

    fn transition_from_row(row: &SqliteRow) -> Result<StateTransition, RepositoryError> {
        let raw_id: String = row.get("id");
        let id = TransitionId::parse(&raw_id).map_err(|e| {
            RepositoryError::new(
                ErrorCode::InvalidData,
                format!("Malformed transition id: {}", e),
            )
        })?;

        let raw_entity_id: String = row.get("entity_id");
        let entity_id = EntityId::parse(&raw_entity_id).map_err(|e| {
            RepositoryError::new(ErrorCode::InvalidData, format!("Malformed entity id: {}", e))
        })?;

        let from_state: String = row.get("from_state");
        let to_state: String = row.get("to_state");
        let raw_type: String = row.get("transition_type");
        let transition_type = TransitionType::from_str(&raw_type).map_err(|e| {
            RepositoryError::new(ErrorCode::InvalidData, e.message)
        })?;

        let processor_data_raw: String = row.get("processor_data");
        let created_at_raw: String = row.get("created_at");

        Ok(StateTransition::from_parts(
            id,
            entity_id,
            row.get("tenant_id"),
            from_state.parse().expect("EntityState parsing is infallible"),
            to_state.parse().expect("EntityState parsing is infallible"),
            row.get("actor"),
            transition_type,
            parse_json_map(&processor_data_raw, "processor_data")?,
            row.get::<Option<String>, _>("queue_source"),
            row.get::<Option<String>, _>("queue_destination"),
            row.get::<Option<i64>, _>("transition_duration"),
            row.get("sequence_number"),
            row.get::<Option<String>, _>("notes"),
            parse_datetime(&created_at_raw, "created_at")?,
        ))
    }

    fn entity_ids_from_rows(rows: &[SqliteRow]) -> Result<Vec<EntityId>, RepositoryError> {
        rows.iter()
            .map(|row| {
                let raw: String = row.get("entity_id");
                EntityId::parse(&raw).map_err(|e| {
                    RepositoryError::new(
                        ErrorCode::InvalidData,
                        format!("Malformed entity id: {}", e),
                    )
                })
            })
            .collect()
    }
}

#[async_trait]
impl StateTransitionRepository for SqliteStateTransitionRepository {
    async fn record(&self, new: NewStateTransition) -> Result<TransitionId, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "record_state_transition")?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("record_state_transition", e))?;

        // Next ordinal for this entity; the unique constraint rejects a
        // concurrent writer that read the same maximum.
        let sequence_number: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence_number), 0) + 1 FROM state_transition WHERE entity_id = ?",
        )
        .bind(new.entity_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_error("record_state_transition", e))?;

        let id = TransitionId::new();
        sqlx::query(
            r#"
            INSERT INTO state_transition
                (id, entity_id, tenant_id, from_state, to_state, actor, transition_type,
                 processor_data, queue_source, queue_destination, transition_duration,
                 sequence_number, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(new.entity_id.to_string())
        .bind(&tenant_id)
        .bind(new.from_state.as_str())
        .bind(new.to_state.as_str())
        .bind(&new.actor)
        .bind(new.transition_type.as_str())
        .bind(to_json_text(&new.processor_data))
        .bind(&new.queue_source)
        .bind(&new.queue_destination)
        .bind(new.transition_duration)
        .bind(sequence_number)
        .bind(&new.notes)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            map_db_error("record_state_transition", e)
                .with_context("entity_id", new.entity_id.to_string())
        })?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("record_state_transition", e))?;

        info!(
            transition_id = %id,
            entity_id = %new.entity_id,
            from_state = %new.from_state,
            to_state = %new.to_state,
            actor = %new.actor,
            sequence_number,
            "Recorded state transition"
        );

        Ok(id)
    }

    async fn get_for_entity(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<StateTransition>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "get_entity_state_history")?;

        let rows = sqlx::query(
            r#"
            SELECT * FROM state_transition
            WHERE entity_id = ? AND tenant_id = ?
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(entity_id.to_string())
        .bind(&tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("get_entity_state_history", e))?;

        rows.iter().map(Self::transition_from_row).collect()
    }

    async fn get_by_filter(
        &self,
        filter: &StateTransitionFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<StateTransition>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "get_transitions_by_filter")?;

        let mut conditions = String::new();
        if filter.entity_id.is_some() {
            conditions.push_str(" AND entity_id = ?");
        }
        if filter.from_state.is_some() {
            conditions.push_str(" AND from_state = ?");
        }
        if filter.to_state.is_some() {
            conditions.push_str(" AND to_state = ?");
        }
        if filter.transition_type.is_some() {
            conditions.push_str(" AND transition_type = ?");
        }
        if filter.actor.is_some() {
            conditions.push_str(" AND actor = ?");
        }
        if filter.created_after.is_some() {
            conditions.push_str(" AND created_at >= ?");
        }
        if filter.created_before.is_some() {
            conditions.push_str(" AND created_at <= ?");
        }

        let sql = format!(
            "SELECT * FROM state_transition WHERE tenant_id = ?{} \
             ORDER BY created_at ASC, sequence_number ASC LIMIT ? OFFSET ?",
            conditions
        );

        let mut query = sqlx::query(&sql).bind(&tenant_id);
        if let Some(v) = &filter.entity_id {
            query = query.bind(v.to_string());
        }
        if let Some(v) = &filter.from_state {
            query = query.bind(v.as_str().to_string());
        }
        if let Some(v) = &filter.to_state {
            query = query.bind(v.as_str().to_string());
        }
        if let Some(v) = &filter.transition_type {
            query = query.bind(v.as_str());
        }
        if let Some(v) = &filter.actor {
            query = query.bind(v);
        }
        if let Some(v) = &filter.created_after {
            query = query.bind(v.to_rfc3339());
        }
        if let Some(v) = &filter.created_before {
            query = query.bind(v.to_rfc3339());
        }

        // SQLite treats LIMIT -1 as "no limit"
        let rows = query
            .bind(limit.unwrap_or(-1))
            .bind(offset.unwrap_or(0))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("get_transitions_by_filter", e))?;

        rows.iter().map(Self::transition_from_row).collect()
    }

    async fn entities_in_state(
        &self,
        state: &EntityState,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<EntityId>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "get_entities_in_state")?;

        let rows = sqlx::query(
            r#"
            SELECT st.entity_id AS entity_id
            FROM state_transition st
            JOIN (
                SELECT entity_id, MAX(sequence_number) AS max_seq
                FROM state_transition
                WHERE tenant_id = ?
                GROUP BY entity_id
            ) latest
              ON st.entity_id = latest.entity_id
             AND st.sequence_number = latest.max_seq
            WHERE st.tenant_id = ? AND st.to_state = ?
            ORDER BY st.entity_id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&tenant_id)
        .bind(&tenant_id)
        .bind(state.as_str())
        .bind(limit.unwrap_or(-1))
        .bind(offset.unwrap_or(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("get_entities_in_state", e))?;

        Self::entity_ids_from_rows(&rows)
    }

    async fn entities_stuck_in_state(
        &self,
        state: &EntityState,
        cutoff: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<EntityId>, RepositoryError> {
        let tenant_id = require_tenant(&self.context, "get_stuck_entities")?;

        let rows = sqlx::query(
            r#"
            SELECT st.entity_id AS entity_id
            FROM state_transition st
            JOIN (
                SELECT entity_id, MAX(sequence_number) AS max_seq
                FROM state_transition
                WHERE tenant_id = ?
                GROUP BY entity_id
            ) latest
              ON st.entity_id = latest.entity_id
             AND st.sequence_number = latest.max_seq
            WHERE st.tenant_id = ? AND st.to_state = ? AND st.created_at < ?
            ORDER BY st.created_at ASC
            LIMIT ?
            "#,
        )
        .bind(&tenant_id)
        .bind(&tenant_id)
        .bind(state.as_str())
        .bind(cutoff.to_rfc3339())
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("get_stuck_entities", e))?;

        Self::entity_ids_from_rows(&rows)
    }
}
