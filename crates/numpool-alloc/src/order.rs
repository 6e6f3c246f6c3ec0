//! Multi-provider orders.
//!
//! An order is a list of `(provider, quantity)` lines for one customer. Lines
//! are allocated one after another with the allocator's windows; each line is
//! its own allocation with its own transaction id.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use numpool_types::Provider;

use crate::allocator::{Allocation, Allocator};
use crate::{AllocError, Result};

/// One line of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub provider: Provider,
    #[serde(alias = "qty")]
    pub quantity: u32,
}

/// A line that could not be allocated because storage failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedLine {
    pub line: OrderLine,
    pub error: String,
}

/// Result of [`Allocator::process_order`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub customer_ref: String,
    /// One allocation per completed line, in order.
    pub lines: Vec<Allocation>,
    /// Set when storage failed partway; later lines were not attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<FailedLine>,
}

impl OrderReceipt {
    /// Every number sold for `provider` across the order's lines.
    pub fn numbers_for(&self, provider: Provider) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|a| a.provider == provider)
            .flat_map(|a| a.numbers.iter().map(String::as_str))
            .collect()
    }

    /// Total numbers sold.
    pub fn total_sold(&self) -> usize {
        self.lines.iter().map(|a| a.numbers.len()).sum()
    }

    /// Lines that came back short.
    pub fn shortages(&self) -> impl Iterator<Item = &Allocation> {
        self.lines.iter().filter(|a| !a.is_fulfilled())
    }
}

impl Allocator {
    /// Allocate every line of an order for `customer_ref`.
    ///
    /// All lines are validated before anything is sold. A storage failure
    /// stops the order: if earlier lines already sold numbers, the receipt is
    /// returned with the failed line recorded, otherwise the error is.
    pub fn process_order(&self, customer_ref: &str, lines: &[OrderLine]) -> Result<OrderReceipt> {
        if lines.is_empty() {
            return Err(AllocError::InvalidDemand("order has no lines".into()));
        }
        let demands: Vec<_> = lines
            .iter()
            .map(|line| self.demand(line.provider, line.quantity, customer_ref))
            .collect();
        for demand in &demands {
            demand.validate()?;
        }

        let mut receipt = OrderReceipt {
            customer_ref: customer_ref.to_string(),
            lines: Vec::with_capacity(lines.len()),
            failed: None,
        };

        for (line, demand) in lines.iter().zip(&demands) {
            match self.allocate(demand) {
                Ok(allocation) => receipt.lines.push(allocation),
                Err(err) if receipt.total_sold() == 0 => return Err(err),
                Err(err) => {
                    warn!(
                        customer = customer_ref,
                        provider = %line.provider,
                        sold_so_far = receipt.total_sold(),
                        error = %err,
                        "order stopped by storage failure"
                    );
                    receipt.failed = Some(FailedLine {
                        line: *line,
                        error: err.to_string(),
                    });
                    break;
                }
            }
        }

        info!(
            customer = customer_ref,
            lines = receipt.lines.len(),
            sold = receipt.total_sold(),
            short_lines = receipt.shortages().count(),
            "order processed"
        );
        Ok(receipt)
    }
}
