use potluck_core::CheckoutTotals;

/// Default largest shortfall that may be absorbed by lowering the gratuity
pub const DEFAULT_GRATUITY_TOLERANCE_CENTS: i32 = 75;

/// Extra cent taken off the gratuity so the allocation clears the total
const GRATUITY_MARGIN_CENTS: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    WithinBudget,
    ReduceGratuity { gratuity_cents: i32 },
    Exceeded { excess_cents: i32 },
}

/// Compare what payers were allocated against the priced total.
///
/// A small shortfall is absorbed by the gratuity when the gratuity can cover
/// it with a cent to spare; anything else exceeds the budget.
pub fn check_budget(totals: &CheckoutTotals, tolerance_cents: i32) -> BudgetDecision {
    let leftover = totals.priced_total_cents - totals.allocated_cents();
    if leftover <= 0 {
        return BudgetDecision::WithinBudget;
    }

    let reduction = leftover + GRATUITY_MARGIN_CENTS;
    if leftover <= tolerance_cents && totals.gratuity_cents > reduction {
        BudgetDecision::ReduceGratuity {
            gratuity_cents: totals.gratuity_cents - reduction,
        }
    } else {
        BudgetDecision::Exceeded { excess_cents: leftover }
    }
}
