use std::sync::Arc;

use imprint_core::repository::OrderStore;
use imprint_order::{FailureCompensator, FulfillmentService, PaymentReconciler, StatusEngine};

use crate::jobs::RetryPolicy;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub engine: StatusEngine,
    pub reconciler: PaymentReconciler,
    pub fulfillment: Arc<FulfillmentService>,
    pub compensator: Arc<FailureCompensator>,
    pub retry: RetryPolicy,
}
