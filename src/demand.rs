use crate::error::{Error, Result};
use crate::types::{Demand, ItemRecord, Rect};

/// Largest quantity the integer master can represent; solver integer
/// variables are `i32`.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// Item dimensions and required quantities in caller order. Index `i` is the
/// identity of item type `i` for the rest of the decision call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DemandTable {
    pub items: Vec<Demand>,
}

impl DemandTable {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dimensions(&self) -> Vec<Rect> {
        self.items.iter().map(|d| d.rect).collect()
    }

    pub fn required(&self) -> Vec<u32> {
        self.items.iter().map(|d| d.qty).collect()
    }

    pub fn total_required(&self) -> u64 {
        self.items.iter().map(|d| d.qty as u64).sum()
    }
}

pub fn extract(records: &[ItemRecord]) -> Result<DemandTable> {
    let items = records
        .iter()
        .enumerate()
        .map(|(index, rec)| {
            let (w, h) = rec.size.ok_or(Error::MalformedItem {
                index,
                reason: "missing size",
            })?;
            let qty = rec.quantity.ok_or(Error::MalformedItem {
                index,
                reason: "missing quantity",
            })?;
            if w == 0 || h == 0 {
                return Err(Error::MalformedItem {
                    index,
                    reason: "dimensions must be non-zero",
                });
            }
            if qty > MAX_QUANTITY {
                return Err(Error::MalformedItem {
                    index,
                    reason: "quantity exceeds 2147483647",
                });
            }
            Ok(Demand {
                rect: Rect::new(w, h),
                qty,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DemandTable { items })
}
