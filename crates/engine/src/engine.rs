//! Per-entity stream engine
//!
//! A [`StreamEngine`] binds one entity's store to its default
//! [`StreamConfig`]. Every stream method creates the output channel
//! synchronously, spawns the matching driver on the tokio runtime and
//! returns the consumer half immediately.
//!
//! Must be called from within a tokio runtime.

use std::future::Future;
use std::sync::Arc;

use rowstream_core::{CreateOptions, Record, Store, StreamConfig, StreamError, StreamResult};

use crate::channel::{channel, RecordStream};
use crate::context::{DriverContext, Flow};
use crate::fetch;
use crate::metrics::StreamMetrics;
use crate::mutation::{self, MutationKind};
use crate::request::{Intent, StreamRequest};

/// Stream entry point for one entity
pub struct StreamEngine<S: Store + 'static> {
    entity: String,
    store: Arc<S>,
    config: StreamConfig,
    metrics: Arc<StreamMetrics>,
}

impl<S: Store + 'static> Clone for StreamEngine<S> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<S: Store + 'static> StreamEngine<S> {
    /// Create an engine with its own metrics
    pub fn new(entity: impl Into<String>, store: Arc<S>, config: StreamConfig) -> Self {
        Self {
            entity: entity.into(),
            store,
            config,
            metrics: Arc::new(StreamMetrics::new()),
        }
    }

    /// Share metrics with other engines
    pub fn with_metrics(mut self, metrics: Arc<StreamMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Entity name
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Default configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The bound store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Metrics for streams started by this engine
    pub fn metrics(&self) -> &Arc<StreamMetrics> {
        &self.metrics
    }

    /// Stream the rows matching `request`
    pub fn search(&self, request: StreamRequest) -> RecordStream {
        self.spawn(Intent::Search, request, |ctx, request| async move {
            fetch::run(&ctx, &request).await
        })
    }

    /// Insert `records` in `batch_size` chunks, streaming the inserted rows
    pub fn bulk_create(
        &self,
        records: Vec<Record>,
        options: CreateOptions,
        request: StreamRequest,
    ) -> RecordStream {
        self.spawn(Intent::BulkCreate, request, move |ctx, _| async move {
            mutation::run_create(&ctx, records, &options).await
        })
    }

    /// Set `fields` on every row matching `request.filter`, one report per window
    pub fn update(&self, fields: Record, request: StreamRequest) -> RecordStream {
        let kind = MutationKind::Update { fields };
        self.spawn(Intent::Update, request, move |ctx, request| async move {
            mutation::run_mutation(&ctx, &request, &kind).await
        })
    }

    /// Delete every row matching `request.filter`, one report per window
    pub fn destroy(&self, request: StreamRequest) -> RecordStream {
        self.spawn(Intent::Destroy, request, |ctx, request| async move {
            mutation::run_mutation(&ctx, &request, &MutationKind::Destroy).await
        })
    }

    fn spawn<F, Fut>(&self, intent: Intent, request: StreamRequest, driver: F) -> RecordStream
    where
        F: FnOnce(Arc<DriverContext<S>>, StreamRequest) -> Fut,
        Fut: Future<Output = StreamResult<Flow>> + Send + 'static,
    {
        let (writer, reader) = channel(self.config.channel_capacity);
        let ctx = Arc::new(DriverContext {
            entity: self.entity.clone(),
            intent,
            store: Arc::clone(&self.store),
            writer,
            settings: request.resolve(&self.config),
        });
        self.metrics.record_start(&self.entity, intent);

        if let Err(e) = validate(intent, &request) {
            let completion = ctx.finish(Err(e));
            self.metrics.record_completion(&self.entity, intent, completion);
            return reader;
        }

        let metrics = Arc::clone(&self.metrics);
        let run = driver(Arc::clone(&ctx), request);
        tokio::spawn(async move {
            let outcome = run.await;
            let completion = ctx.finish(outcome);
            metrics.record_completion(&ctx.entity, intent, completion);
        });
        reader
    }
}

fn validate(intent: Intent, request: &StreamRequest) -> StreamResult<()> {
    if request.transactional && intent != Intent::Search {
        return Err(StreamError::invalid_request(format!(
            "transactional streams are only supported for search, not {}",
            intent
        )));
    }
    Ok(())
}
