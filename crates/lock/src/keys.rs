//! Lock key namespace.

use common::ProductId;

/// Returns the lock key guarding a product's stock counter.
///
/// All stock mutations for a product, in every process, must go through
/// this one key.
pub fn product_stock(product_id: ProductId) -> String {
    format!("product:{product_id}:stock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_key_shape() {
        let uuid = Uuid::new_v4();
        let key = product_stock(ProductId::from_uuid(uuid));
        assert_eq!(key, format!("product:{uuid}:stock"));
    }
}
