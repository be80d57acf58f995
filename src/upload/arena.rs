//! Capacity-checked fixed-size GPU arrays.

use bytemuck::Pod;

use crate::util::{Error, Result};

/// Items destined for a fixed-capacity device array.
///
/// The device side is always `capacity` elements; the unused tail is
/// zero-filled on upload. Overflow is rejected at construction.
#[derive(Debug, Clone)]
pub struct FixedArray<T: Pod> {
    what: &'static str,
    items: Vec<T>,
    capacity: usize,
}

impl<T: Pod> FixedArray<T> {
    pub fn new(what: &'static str, items: Vec<T>, capacity: usize) -> Result<Self> {
        if items.len() > capacity {
            return Err(Error::CapacityExceeded {
                what,
                count: items.len(),
                capacity,
            });
        }
        Ok(Self {
            what,
            items,
            capacity,
        })
    }

    pub fn empty(what: &'static str, capacity: usize) -> Self {
        Self {
            what,
            items: Vec::new(),
            capacity,
        }
    }

    /// Append one item, failing if the array is full.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.items.len() == self.capacity {
            return Err(Error::CapacityExceeded {
                what: self.what,
                count: self.items.len() + 1,
                capacity: self.capacity,
            });
        }
        self.items.push(item);
        Ok(())
    }

    pub fn label(&self) -> &'static str {
        self.what
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Size of the full device array in bytes.
    pub fn byte_size(&self) -> u64 {
        (self.capacity * std::mem::size_of::<T>()) as u64
    }

    /// Occupied items as bytes.
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.items)
    }

    /// Full device payload: the items followed by zeroes up to capacity.
    pub fn padded_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_size() as usize);
        out.extend_from_slice(self.bytes());
        out.resize(self.byte_size() as usize, 0);
        out
    }
}
