pub mod error;
pub mod fulfillment;
pub mod payment;
pub mod repository;

pub use error::{ProviderError, StoreError};
pub use fulfillment::{FulfillmentProvider, Submission, SubmissionAck, SubmissionItem};
pub use payment::{PaymentProvider, PaymentSessionFacts, Refund, RefundReason, RefundRequest};
pub use repository::{OrderStore, PaymentFacts, TransitionWrite};
