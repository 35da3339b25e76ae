//! IP address allocation for universe networks
//!
//! Provides:
//! - Monotonic address cursors seeded at a start address
//! - Strictly increasing, never reused issuance
//! - Support for IPv4 and IPv6

use crate::error::{Error, Result};
use ipnet::{Ipv4Net, Ipv6Net};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Host block an IPv4 cursor may walk (the last octet)
const V4_BLOCK_PREFIX: u8 = 24;
/// Host block an IPv6 cursor may walk (the last byte)
const V6_BLOCK_PREFIX: u8 = 120;

/// IPv4 address cursor
///
/// Only the last octet advances. Once it passes 255 the cursor is
/// exhausted instead of wrapping back into already issued addresses.
#[derive(Debug, Clone)]
pub struct Ipv4Cursor {
    /// Block containing the seed
    block: Ipv4Net,
    /// Next address to hand out (None when exhausted)
    next: Option<Ipv4Addr>,
}

impl Ipv4Cursor {
    /// Create a cursor starting at `start`
    pub fn new(start: Ipv4Addr) -> Self {
        // A /24 prefix length is always valid
        let block = Ipv4Net::new(start, V4_BLOCK_PREFIX)
            .map(|n| n.trunc())
            .unwrap_or_else(|_| Ipv4Net::from(start));
        Self {
            block,
            next: Some(start),
        }
    }

    /// Return the current address and advance the cursor
    pub fn allocate(&mut self) -> Result<Ipv4Addr> {
        let current = self.next.ok_or_else(|| {
            Error::AddressExhausted(format!("no IPv4 addresses left in {}", self.block))
        })?;

        let octets = current.octets();
        self.next = octets[3].checked_add(1).map(|last| {
            Ipv4Addr::new(octets[0], octets[1], octets[2], last)
        });

        Ok(current)
    }

    /// Peek at the next address without issuing it
    pub fn peek(&self) -> Option<Ipv4Addr> {
        self.next
    }
}

/// IPv6 address cursor
///
/// Only the last byte advances, mirroring the IPv4 cursor.
#[derive(Debug, Clone)]
pub struct Ipv6Cursor {
    block: Ipv6Net,
    next: Option<Ipv6Addr>,
}

impl Ipv6Cursor {
    /// Create a cursor starting at `start`
    pub fn new(start: Ipv6Addr) -> Self {
        let block = Ipv6Net::new(start, V6_BLOCK_PREFIX)
            .map(|n| n.trunc())
            .unwrap_or_else(|_| Ipv6Net::from(start));
        Self {
            block,
            next: Some(start),
        }
    }

    /// Return the current address and advance the cursor
    pub fn allocate(&mut self) -> Result<Ipv6Addr> {
        let current = self.next.ok_or_else(|| {
            Error::AddressExhausted(format!("no IPv6 addresses left in {}", self.block))
        })?;

        let mut octets = current.octets();
        self.next = octets[15].checked_add(1).map(|last| {
            octets[15] = last;
            Ipv6Addr::from(octets)
        });

        Ok(current)
    }

    /// Peek at the next address without issuing it
    pub fn peek(&self) -> Option<Ipv6Addr> {
        self.next
    }
}

/// Both address cursors of a universe
///
/// Owned by the universe behind a mutex, so callers on different tasks
/// never observe the same address twice.
#[derive(Debug, Clone)]
pub struct AddressCursors {
    pub v4: Ipv4Cursor,
    pub v6: Ipv6Cursor,
}

impl AddressCursors {
    pub fn new(ipv4_start: Ipv4Addr, ipv6_start: Ipv6Addr) -> Self {
        Self {
            v4: Ipv4Cursor::new(ipv4_start),
            v6: Ipv6Cursor::new(ipv6_start),
        }
    }
}
