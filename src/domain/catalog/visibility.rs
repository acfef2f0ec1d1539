use std::collections::BTreeSet;

use super::value_objects::Product;
use crate::models::GroupId;

/// Whether a caller with the given group memberships may see (and order)
/// a product. Products without group tags are visible to everyone; tagged
/// products only to members of at least one of their groups.
pub fn is_visible_to(product: &Product, groups: &BTreeSet<GroupId>) -> bool {
    product.group_ids.is_empty() || !product.group_ids.is_disjoint(groups)
}
