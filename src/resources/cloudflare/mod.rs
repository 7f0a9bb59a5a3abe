//! Cloudflare provider resources.

pub mod dns;
pub mod load_balancer;

pub use dns::{cloudflare_record, cloudflare_zone};
pub use load_balancer::{
    cloudflare_load_balancer, cloudflare_load_balancer_monitor, cloudflare_load_balancer_pool,
};

use crate::resources::validation::{self, FieldResult};

/// Cloudflare account and zone identifiers are 32 hex characters.
pub(crate) fn identifier(field: &str, value: &str) -> FieldResult {
    validation::hex(field, value, 32)
}
