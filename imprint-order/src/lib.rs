pub mod compensator;
pub mod engine;
pub mod reconciler;
pub mod submission;
pub mod validator;

pub use compensator::{FailureCompensator, MockPaymentProvider};
pub use engine::{StatusEngine, TransitionError, TransitionOutcome};
pub use reconciler::PaymentReconciler;
pub use submission::{FulfillmentService, MockFulfillmentProvider, SubmitError};
pub use validator::{build_submission, validate_for_submission, SubmissionRejection};
