//! Trigger registration table.
//!
//! The platform dispatches invocations by declared trigger; here that
//! declaration is an explicit table mapping each trigger binding to its
//! handler function. The daemon derives its stream subscriptions from the
//! same table, so a handler cannot be subscribed without being bound.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use warden_store::{DocumentWritten, InvocationEvent, StoreClient, USER_COLLECTION};

use crate::handlers::{self, HandlerError};

/// Boxed future returned by handler functions.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// Handler for scheduled firings.
pub type ScheduledHandler = Arc<dyn Fn(Arc<StoreClient>) -> HandlerFuture + Send + Sync>;

/// Handler for document writes.
pub type DocumentHandler =
    Arc<dyn Fn(Arc<StoreClient>, DocumentWritten) -> HandlerFuture + Send + Sync>;

/// A trigger declaration bound to its handler.
pub enum TriggerBinding {
    /// Fire on a declared schedule.
    Schedule {
        /// Schedule target name, unique within the registry.
        name: &'static str,
        /// Cron-style expression, evaluated by the platform.
        expression: &'static str,
        /// Timezone the expression is evaluated in.
        timezone: &'static str,
        handler: ScheduledHandler,
    },
    /// Fire on every write to a collection.
    DocumentWritten {
        collection: &'static str,
        handler: DocumentHandler,
    },
}

/// The registration table: trigger bindings in declaration order.
pub struct HandlerRegistry {
    bindings: Vec<TriggerBinding>,
}

impl HandlerRegistry {
    /// Build the production registry with both handlers bound.
    pub fn standard() -> Self {
        let mut registry = Self {
            bindings: Vec::new(),
        };

        registry.bind(TriggerBinding::Schedule {
            name: handlers::daily_reset::RESET_SCHEDULE_NAME,
            expression: handlers::daily_reset::RESET_SCHEDULE_EXPRESSION,
            timezone: handlers::daily_reset::RESET_SCHEDULE_TIMEZONE,
            handler: Arc::new(|store| {
                Box::pin(async move { handlers::daily_reset::run(&store).await })
            }),
        });

        registry.bind(TriggerBinding::DocumentWritten {
            collection: USER_COLLECTION,
            handler: Arc::new(|store, event| {
                Box::pin(async move { handlers::block_watch::run(&store, &event).await })
            }),
        });

        registry
    }

    /// Add a binding.
    pub fn bind(&mut self, binding: TriggerBinding) {
        self.bindings.push(binding);
    }

    /// Schedule targets declared in this registry.
    pub fn schedule_targets(&self) -> Vec<&'static str> {
        self.bindings
            .iter()
            .filter_map(|binding| match binding {
                TriggerBinding::Schedule { name, .. } => Some(*name),
                _ => None,
            })
            .collect()
    }

    /// Collections watched by this registry.
    pub fn watched_collections(&self) -> Vec<&'static str> {
        self.bindings
            .iter()
            .filter_map(|binding| match binding {
                TriggerBinding::DocumentWritten { collection, .. } => Some(*collection),
                _ => None,
            })
            .collect()
    }

    /// Resolve an event to its binding and run the handler.
    ///
    /// Events with no matching binding are logged and ignored: the platform
    /// only sends what was subscribed, so a mismatch is a stale
    /// subscription, not a failure worth redelivering.
    pub async fn dispatch(
        &self,
        store: Arc<StoreClient>,
        event: InvocationEvent,
    ) -> Result<(), HandlerError> {
        match event {
            InvocationEvent::Scheduled(firing) => {
                for binding in &self.bindings {
                    if let TriggerBinding::Schedule { name, handler, .. } = binding
                        && *name == firing.target
                    {
                        debug!(
                            target = %firing.target,
                            fired_at = %firing.fired_at,
                            "dispatching scheduled invocation"
                        );
                        return handler(store).await;
                    }
                }
                warn!(target = %firing.target, "no handler bound for schedule");
                Ok(())
            }
            InvocationEvent::DocumentWritten(write) => {
                for binding in &self.bindings {
                    if let TriggerBinding::DocumentWritten {
                        collection,
                        handler,
                    } = binding
                        && *collection == write.collection
                    {
                        return handler(store, write).await;
                    }
                }
                warn!(collection = %write.collection, "no handler bound for collection");
                Ok(())
            }
        }
    }
}
