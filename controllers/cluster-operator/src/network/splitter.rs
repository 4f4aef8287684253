//! Subnet splitter.
//!
//! Pure functions that carve a block into equal children using the same
//! first-fit search as the allocator. Output order is ascending, so the
//! same input always renders the same stack body.

use super::allocator::free_block;
use crate::error::ControllerError;
use ipnet::Ipv4Net;

/// Smallest child prefix length that yields at least `n` children of a
/// `/parent_prefix` block.
pub fn calculate_mask(parent_prefix: u8, n: u32) -> Result<u8, ControllerError> {
    if n == 0 {
        return Err(ControllerError::Allocation("cannot split a network into zero blocks".to_string()));
    }
    if parent_prefix > 32 {
        return Err(ControllerError::Allocation(format!(
            "/{} is not a valid IPv4 prefix length",
            parent_prefix
        )));
    }

    // ceil(log2(n))
    let extra_bits = u32::BITS - (n - 1).leading_zeros();
    let free_bits = 32 - u32::from(parent_prefix);
    if extra_bits > free_bits {
        return Err(ControllerError::Exhausted(format!(
            "a /{} block cannot hold {} subnets",
            parent_prefix, n
        )));
    }

    // extra_bits <= free_bits <= 32, so the sum stays within u8
    Ok(parent_prefix + extra_bits as u8)
}

/// Split `parent` into `n` equal, non-overlapping blocks in ascending order.
pub fn split_network(parent: Ipv4Net, n: u32) -> Result<Vec<Ipv4Net>, ControllerError> {
    let parent = parent.trunc();
    let mask = calculate_mask(parent.prefix_len(), n)?;

    let mut blocks = Vec::new();
    for _ in 0..n {
        let block = free_block(parent, mask, &blocks)?;
        blocks.push(block);
    }
    Ok(blocks)
}
