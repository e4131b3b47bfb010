use imprint_core::fulfillment::{Submission, SubmissionItem};
use imprint_shared::{Order, OrderStatus};

/// Why an order cannot be submitted to the fulfillment partner. Item
/// positions are 1-based so the message reads the way a customer-support
/// agent would say it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionRejection {
    #[error("order is {0}, only PAID orders can be submitted")]
    NotPaid(OrderStatus),

    #[error("order has no shipping address")]
    MissingShippingAddress,

    #[error("order has no line items")]
    EmptyOrder,

    #[error("item {item} has no fulfillment variant mapping")]
    MissingProviderVariant { item: usize },

    #[error("item {item} has no design URL")]
    MissingDesignUrl { item: usize },
}

/// Pre-flight contract check for the PAID → SUBMITTED_TO_POD step. Pure,
/// no side effects; the first violation found wins.
pub fn validate_for_submission(order: &Order) -> Result<(), SubmissionRejection> {
    if order.status != OrderStatus::Paid {
        return Err(SubmissionRejection::NotPaid(order.status));
    }
    if order.shipping_address.is_none() {
        return Err(SubmissionRejection::MissingShippingAddress);
    }
    if order.items.is_empty() {
        return Err(SubmissionRejection::EmptyOrder);
    }
    for (i, item) in order.items.iter().enumerate() {
        let has_variant = item
            .provider_variant_id
            .as_deref()
            .is_some_and(|v| !v.is_empty());
        if !has_variant {
            return Err(SubmissionRejection::MissingProviderVariant { item: i + 1 });
        }
        if item.resolved_design_url().is_none() {
            return Err(SubmissionRejection::MissingDesignUrl { item: i + 1 });
        }
    }
    Ok(())
}

/// Build the outbound partner payload from a validated order. Each line
/// carries the partner's variant id and the item's resolved design asset.
pub fn build_submission(order: &Order) -> Result<Submission, SubmissionRejection> {
    validate_for_submission(order)?;

    let recipient = order
        .shipping_address
        .clone()
        .ok_or(SubmissionRejection::MissingShippingAddress)?;

    let items = order
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let provider_variant_id = item
                .provider_variant_id
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or(SubmissionRejection::MissingProviderVariant { item: i + 1 })?;
            let design_url = item
                .resolved_design_url()
                .map(str::to_string)
                .ok_or(SubmissionRejection::MissingDesignUrl { item: i + 1 })?;
            Ok(SubmissionItem {
                provider_variant_id,
                quantity: item.quantity,
                design_url,
            })
        })
        .collect::<Result<Vec<_>, SubmissionRejection>>()?;

    Ok(Submission {
        order_id: order.id,
        order_number: order.order_number.clone(),
        recipient,
        items,
    })
}
