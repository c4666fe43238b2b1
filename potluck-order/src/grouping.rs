use potluck_core::ParticipantOrder;
use tracing::warn;

use crate::models::RestaurantBatch;

/// Partition pending orders into one batch per restaurant.
///
/// Batches come back in the order their restaurant was first seen, members in
/// input order. Batches with nobody to bill (donors only) are dropped.
pub fn group_by_restaurant(orders: Vec<ParticipantOrder>) -> Vec<RestaurantBatch> {
    let mut batches: Vec<RestaurantBatch> = Vec::new();

    for order in orders {
        if !order.is_donor && !order.has_billable_items() {
            warn!(
                participant = %order.participant_id,
                restaurant = %order.restaurant,
                "Pending order has no billable items"
            );
        }
        match batches.iter_mut().find(|b| b.restaurant == order.restaurant) {
            Some(batch) => batch.members.push(order),
            None => {
                let mut batch = RestaurantBatch::new(order.restaurant.clone());
                batch.members.push(order);
                batches.push(batch);
            }
        }
    }

    batches.retain(|batch| {
        let keep = batch.is_submittable();
        if !keep {
            warn!(restaurant = %batch.restaurant, "Skipping restaurant with only donors");
        }
        keep
    });
    batches
}
