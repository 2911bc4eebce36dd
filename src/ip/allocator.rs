//! /30 subnet allocation for point-to-point links.
//!
//! The allocator keeps a monotonically advancing pointer into the
//! 10.100.0.0/16 pool. Allocation order is purely positional, so replaying
//! a synthesis with the same inputs yields identical addresses.

use std::net::Ipv4Addr;

use crate::error::CoreError;
use crate::ip::LINK_MASK;

/// Base of the point-to-point link pool.
const LINK_POOL_BASE: Ipv4Addr = Ipv4Addr::new(10, 100, 0, 0);

/// Number of /30 subnets in a /16 pool.
const LINK_POOL_SUBNETS: u32 = 1 << 14;

/// One /30 carved out of the link pool: the two usable host addresses plus
/// the shared mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSubnet {
    pub network: Ipv4Addr,
    pub first_host: Ipv4Addr,
    pub second_host: Ipv4Addr,
    pub mask: Ipv4Addr,
}

/// Hands out /30 link subnets in ascending order.
#[derive(Debug, Default)]
pub struct AddressAllocator {
    next_subnet: u32,
}

impl AddressAllocator {
    pub fn new() -> AddressAllocator {
        AddressAllocator { next_subnet: 0 }
    }

    /// Next unused /30, or `AddressSpaceExhausted` once the /16 pool is
    /// spent (16384 links).
    pub fn next_link_subnet(&mut self) -> Result<LinkSubnet, CoreError> {
        if self.next_subnet >= LINK_POOL_SUBNETS {
            return Err(CoreError::AddressSpaceExhausted {
                pool: format!("{}/16", LINK_POOL_BASE),
            });
        }

        let network = u32::from(LINK_POOL_BASE) + self.next_subnet * 4;
        self.next_subnet += 1;

        Ok(LinkSubnet {
            network: Ipv4Addr::from(network),
            first_host: Ipv4Addr::from(network + 1),
            second_host: Ipv4Addr::from(network + 2),
            mask: LINK_MASK,
        })
    }

    /// Number of subnets handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next_subnet
    }
}
