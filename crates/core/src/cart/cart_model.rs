//! Cart domain models and the optimistic merge rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic cart mutation endpoint.
pub const CART_UPDATE_ENDPOINT: &str = "/cart/update";

/// Legacy promo endpoint; takes `{ code }` instead of a partial cart.
pub const CART_APPLY_COUPON_ENDPOINT: &str = "/cart/apply-coupon";

/// One cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(alias = "id")]
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: None,
            name: None,
            price,
            quantity,
        }
    }

    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `None` when price times quantity overflows.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }

    /// Two lines are the same row when product and variant match.
    pub fn same_line(&self, product_id: &str, variant_id: Option<&str>) -> bool {
        self.product_id == product_id && self.variant_id.as_deref() == variant_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo: Option<String>,
}

impl Cart {
    /// Sum of the line totals, `None` on overflow.
    pub fn subtotal(&self) -> Option<Decimal> {
        self.items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.line_total()?))
    }

    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    pub fn find(&self, product_id: &str, variant_id: Option<&str>) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.same_line(product_id, variant_id))
    }

    /// Shallow, field-level merge of a partial cart.
    ///
    /// Fields absent from the patch keep their current value, so applying a
    /// promo never touches the items. When items change without an explicit
    /// total, the total is recomputed from the lines until the server
    /// answers with the authoritative one. If that sum overflows, the
    /// previous total is kept.
    pub fn merge(&self, patch: &CartPatch) -> Cart {
        let mut merged = self.clone();
        if let Some(items) = &patch.items {
            merged.items = items.clone();
            if let Some(subtotal) = merged.subtotal() {
                merged.total = subtotal;
            }
        }
        if let Some(total) = patch.total {
            merged.total = total;
        }
        if let Some(promo) = &patch.promo {
            merged.promo = Some(promo.clone());
        }
        merged
    }
}

/// Partial cart sent to `/cart/update` and merged optimistically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<CartItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo: Option<String>,
}

impl CartPatch {
    pub fn items(items: Vec<CartItem>) -> Self {
        Self {
            items: Some(items),
            ..Self::default()
        }
    }

    pub fn promo(code: impl Into<String>) -> Self {
        Self {
            promo: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_none() && self.total.is_none() && self.promo.is_none()
    }
}

/// A cart mutation waiting for replay: POST `payload` to `endpoint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartAction {
    pub endpoint: String,
    pub payload: Value,
}

impl CartAction {
    pub fn new(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
        }
    }
}

/// Add `item` to `items`, bumping the quantity of an existing row.
pub fn merge_item(items: &[CartItem], item: CartItem) -> Vec<CartItem> {
    let mut merged = items.to_vec();
    match merged
        .iter_mut()
        .find(|line| line.same_line(&item.product_id, item.variant_id.as_deref()))
    {
        Some(line) => {
            line.quantity = line.quantity.saturating_add(item.quantity);
            if line.name.is_none() {
                line.name = item.name;
            }
        }
        None => merged.push(item),
    }
    merged
}

/// Set the quantity of a row; zero removes it. Unknown rows are ignored.
pub fn set_item_quantity(
    items: &[CartItem],
    product_id: &str,
    variant_id: Option<&str>,
    quantity: u32,
) -> Vec<CartItem> {
    items
        .iter()
        .filter_map(|line| {
            if !line.same_line(product_id, variant_id) {
                return Some(line.clone());
            }
            (quantity > 0).then(|| CartItem {
                quantity,
                ..line.clone()
            })
        })
        .collect()
}
