// /////////////////////////////////////////////////////////////////////////////
// Entity Exchange RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Coffee Pipeline Example
//!
//! A miniature two-stage pipeline: a source processor ingests roast orders
//! from a point-of-sale feed and persists them as versioned entities, then
//! a non-source processor enriches the stored order with grind
//! instructions.
//!
//! Run with:
//!
//! ```bash
//! RUST_LOG=info cargo run --example coffee_pipeline
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use entity_exchange::application::handler::ProcessorFactory;
use entity_exchange::application::services::TenantService;
use entity_exchange::infrastructure::observability;
use entity_exchange::infrastructure::repositories::{schema, SqliteTenantRepository};
use entity_exchange_domain::{
    EntityId, ExchangeError, JsonMap, Message, Processor, ProcessorConfig, ProcessorResult,
    Tenant, TenantContext,
};

/// Source processor: turns raw point-of-sale payloads into canonical roast
/// orders.
struct RoastOrderProcessor;

#[async_trait]
impl Processor for RoastOrderProcessor {
    async fn process(&self, message: &Message) -> Result<ProcessorResult, ExchangeError> {
        // Forward the order to the enrichment stage once it is persisted.
        let mut downstream = message.clone();
        downstream.add_routing_info("destination", json!("grind-enrichment"));

        Ok(ProcessorResult::success()
            .with_output_message(downstream)
            .with_metadata("stage", json!("ingestion")))
    }

    fn validate_message(&self, message: &Message) -> bool {
        message.payload.contains_key("beans") && message.payload.contains_key("roast_level")
    }

    fn to_canonical(
        &self,
        external_data: &JsonMap,
        _metadata: &JsonMap,
    ) -> Option<Result<Value, ExchangeError>> {
        // Canonical form: just the fields that define the order, so
        // point-of-sale noise (cashier id, terminal, etc.) never affects
        // the content hash.
        let canonical = json!({
            "beans": external_data.get("beans").cloned().unwrap_or(Value::Null),
            "roast_level": external_data.get("roast_level").cloned().unwrap_or(Value::Null),
            "quantity_kg": external_data.get("quantity_kg").cloned().unwrap_or(json!(1)),
        });
        Some(Ok(canonical))
    }
}

/// Non-source processor: annotates an existing order with grind
/// instructions.
struct GrindEnrichmentProcessor;

#[async_trait]
impl Processor for GrindEnrichmentProcessor {
    async fn process(&self, message: &Message) -> Result<ProcessorResult, ExchangeError> {
        let grind = match message
            .payload
            .get("roast_level")
            .and_then(Value::as_str)
            .unwrap_or("medium")
        {
            "dark" => "coarse",
            "light" => "fine",
            _ => "medium",
        };

        Ok(ProcessorResult::success()
            .with_metadata("stage", json!("enrichment"))
            .with_metadata("grind", json!(grind)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_tracing();

    let pool = schema::in_memory_pool().await?;
    let context = TenantContext::new();

    // Register the roastery tenant and make it current.
    let tenants = TenantService::new(
        Arc::new(SqliteTenantRepository::new(pool.clone(), context.clone())),
        context.clone(),
    );
    tenants
        .create_tenant(Tenant::new("roastery-42", "Big Bean Roastery")?)
        .await?;
    context.set_current_tenant("roastery-42")?;

    let factory = ProcessorFactory::new(pool, context.clone());

    let ingestion = factory.create_handler(
        Arc::new(RoastOrderProcessor),
        ProcessorConfig::new("roast-order-mapper").with_state_tracking(),
    );
    let enrichment = factory.create_handler(
        Arc::new(GrindEnrichmentProcessor),
        ProcessorConfig::new("grind-enricher")
            .non_source()
            .with_state_tracking(),
    );

    // Stage 1: a point-of-sale message arrives.
    let mut order = Message::entity_message(
        "POS-1001",
        "roast_order",
        "pos-feed",
        "roastery-42",
        json!({
            "beans": "ethiopia-yirgacheffe",
            "roast_level": "dark",
            "quantity_kg": 5,
            "cashier": "terminal-3",
        })
        .as_object()
        .cloned()
        .unwrap(),
    );

    let ingested = ingestion.execute(&mut order).await;
    println!(
        "ingestion: success={} entities_created={:?}",
        ingested.success, ingested.entities_created
    );

    // Stage 2: the host forwards the output message to the enrichment
    // queue, now carrying the persisted entity id.
    let entity_id: EntityId = ingested.entities_created[0].parse()?;
    let mut downstream = ingested.output_messages[0]
        .clone()
        .with_entity(entity_id.to_string(), Some(1));

    let enriched = enrichment.execute(&mut downstream).await;
    println!(
        "enrichment: success={} grind={}",
        enriched.success, enriched.processing_metadata["grind"]
    );

    // Replaying the same order produces a new version flagged as a
    // duplicate of the first.
    let mut replay = Message::entity_message(
        "POS-1001",
        "roast_order",
        "pos-feed",
        "roastery-42",
        json!({
            "beans": "ethiopia-yirgacheffe",
            "roast_level": "dark",
            "quantity_kg": 5,
            "cashier": "terminal-7",
        })
        .as_object()
        .cloned()
        .unwrap(),
    );
    let replayed = ingestion.execute(&mut replay).await;
    println!(
        "replay: success={} entities_updated={:?}",
        replayed.success, replayed.entities_updated
    );

    // Inspect the ledger for the first entity version.
    let state_tracking = factory.state_tracking_service();
    if let Some(history) = state_tracking.get_entity_state_history(entity_id).await? {
        println!(
            "history: {} transitions, current state {}",
            history.total_transitions, history.current_state
        );
        for transition in &history.transitions {
            println!(
                "  #{} {} -> {} by {}",
                transition.sequence_number(),
                transition.from_state(),
                transition.to_state(),
                transition.actor()
            );
        }
    }

    let stats = state_tracking.get_state_statistics(None, None).await?;
    println!(
        "ledger: {} transitions total, error rate {:.2}",
        stats.total_transitions, stats.error_rate
    );

    Ok(())
}
