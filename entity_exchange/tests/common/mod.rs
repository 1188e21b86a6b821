//! Shared harness for integration tests: an in-memory database with the
//! schema applied, one tenant context, and the full service stack wired the
//! way a host would wire it.

// Not every test binary exercises every helper.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

use entity_exchange::application::handler::{ProcessorFactory, ProcessorHandler};
use entity_exchange::application::services::{
    DuplicateDetectionService, EntityService, ProcessingErrorService, ProcessingService,
    StateTrackingService, TenantService,
};
use entity_exchange::infrastructure::repositories::{
    schema, SqliteEntityRepository, SqliteProcessingErrorRepository,
    SqliteStateTransitionRepository, SqliteTenantRepository,
};
use entity_exchange_domain::{
    ErrorCode, ExchangeError, JsonMap, Message, Processor, ProcessorConfig, ProcessorResult,
    ServiceError, Tenant, TenantContext,
};

pub struct TestHarness {
    pub pool: SqlitePool,
    pub context: TenantContext,
    pub entity_service: Arc<EntityService>,
    pub detection_service: Arc<DuplicateDetectionService>,
    pub state_tracking: Arc<StateTrackingService>,
    pub error_service: Arc<ProcessingErrorService>,
    pub tenant_service: Arc<TenantService>,
    pub processing_service: Arc<ProcessingService>,
}

pub async fn harness() -> TestHarness {
    let pool = schema::in_memory_pool().await.expect("in-memory database");
    let context = TenantContext::new();

    let entity_repository = Arc::new(SqliteEntityRepository::new(pool.clone(), context.clone()));
    let entity_service = Arc::new(EntityService::new(
        entity_repository.clone(),
        context.clone(),
    ));
    let detection_service = Arc::new(DuplicateDetectionService::new(
        entity_repository,
        context.clone(),
    ));
    let state_tracking = Arc::new(StateTrackingService::new(
        Arc::new(SqliteStateTransitionRepository::new(
            pool.clone(),
            context.clone(),
        )),
        context.clone(),
    ));
    let error_service = Arc::new(ProcessingErrorService::new(
        Arc::new(SqliteProcessingErrorRepository::new(
            pool.clone(),
            context.clone(),
        )),
        context.clone(),
    ));
    let tenant_service = Arc::new(TenantService::new(
        Arc::new(SqliteTenantRepository::new(pool.clone(), context.clone())),
        context.clone(),
    ));
    let processing_service = Arc::new(
        ProcessingService::new(
            entity_service.clone(),
            detection_service.clone(),
            context.clone(),
        )
        .with_state_tracking(state_tracking.clone())
        .with_error_recording(error_service.clone()),
    );

    TestHarness {
        pool,
        context,
        entity_service,
        detection_service,
        state_tracking,
        error_service,
        tenant_service,
        processing_service,
    }
}

impl TestHarness {
    /// Creates a tenant and makes it the active one.
    pub async fn seed_tenant(&self, tenant_id: &str) {
        let tenant = Tenant::new(tenant_id, format!("{} Inc", tenant_id)).unwrap();
        self.tenant_service.create_tenant(tenant).await.unwrap();
        self.context.set_current_tenant(tenant_id).unwrap();
    }

    /// Builds a fully wired handler over the harness pool and context.
    pub fn handler(&self, processor: Arc<dyn Processor>, config: ProcessorConfig) -> ProcessorHandler {
        ProcessorFactory::new(self.pool.clone(), self.context.clone())
            .create_handler(processor, config)
    }
}

/// Builds a JSON object bag from key/value pairs.
pub fn json_map(pairs: &[(&str, Value)]) -> JsonMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Builds an entity-processing message for the given tenant and payload.
pub fn order_message(tenant_id: &str, external_id: &str, payload: JsonMap) -> Message {
    Message::entity_message(external_id, "order", "shopify", tenant_id, payload)
}

/// Source processor that canonicalizes its payload verbatim.
pub struct CanonicalOrderProcessor;

#[async_trait]
impl Processor for CanonicalOrderProcessor {
    async fn process(&self, _message: &Message) -> Result<ProcessorResult, ExchangeError> {
        Ok(ProcessorResult::success())
    }

    fn to_canonical(
        &self,
        external_data: &JsonMap,
        _metadata: &JsonMap,
    ) -> Option<Result<Value, ExchangeError>> {
        Some(Ok(Value::Object(external_data.clone())))
    }
}

/// Non-source processor that always succeeds.
pub struct PassthroughProcessor;

#[async_trait]
impl Processor for PassthroughProcessor {
    async fn process(&self, _message: &Message) -> Result<ProcessorResult, ExchangeError> {
        Ok(ProcessorResult::success())
    }
}

/// Non-source processor that returns a failure result.
pub struct FailingProcessor;

#[async_trait]
impl Processor for FailingProcessor {
    async fn process(&self, _message: &Message) -> Result<ProcessorResult, ExchangeError> {
        Ok(ProcessorResult::failure(
            "Downstream delivery rejected the entity",
            ErrorCode::ProcessingFailure,
            true,
        ))
    }
}

/// Processor that throws a service error for its first N invocations, then
/// succeeds.
pub struct FlakyProcessor {
    failures_remaining: AtomicU32,
}

impl FlakyProcessor {
    pub fn failing_times(failures: u32) -> Self {
        FlakyProcessor {
            failures_remaining: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl Processor for FlakyProcessor {
    async fn process(&self, _message: &Message) -> Result<ProcessorResult, ExchangeError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(ServiceError::new(
                ErrorCode::IntegrationError,
                "Upstream connection reset",
                "process",
            )
            .into());
        }
        Ok(ProcessorResult::success())
    }
}

/// Processor that rejects every message during validation.
pub struct RejectingProcessor;

#[async_trait]
impl Processor for RejectingProcessor {
    async fn process(&self, _message: &Message) -> Result<ProcessorResult, ExchangeError> {
        Ok(ProcessorResult::success())
    }

    fn validate_message(&self, _message: &Message) -> bool {
        false
    }
}
