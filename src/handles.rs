//! Handle table for back-references.

use crate::error::Error;
use crate::token::BASE_WIRE_HANDLE;
use crate::value::Value;

/// Identity assigned to every registerable item in first-appearance order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(u32);

impl Handle {
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw wire value of this handle.
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
enum Slot {
    Value(Value),
    /// Read through `read_unshared`; back-references to it must fail.
    Unshared,
}

/// Dense mapping from handles to materialized values.
///
/// Handles count up from [`BASE_WIRE_HANDLE`] with no gaps. Slots may be
/// registered out of assignment order (an enum assigns its handle before
/// its constant-name string is read), so unfilled slots are legal until a
/// back-reference targets them.
#[derive(Debug)]
pub(crate) struct HandleTable {
    slots: Vec<Option<Slot>>,
    next: u32,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next: BASE_WIRE_HANDLE,
        }
    }

    /// Claims the next handle.
    pub fn assign(&mut self) -> Handle {
        let handle = Handle(self.next);
        self.next += 1;
        handle
    }

    /// Stores `value` under a previously assigned handle. With `unshared`
    /// a poison sentinel is stored instead so the item cannot be aliased.
    pub fn register(&mut self, handle: Handle, value: Value, unshared: bool) {
        let index = (handle.0 - BASE_WIRE_HANDLE) as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(if unshared { Slot::Unshared } else { Slot::Value(value) });
    }

    /// Resolves a back-reference.
    pub fn lookup(&self, handle: Handle) -> Result<Value, Error> {
        let slot = handle
            .0
            .checked_sub(BASE_WIRE_HANDLE)
            .and_then(|index| self.slots.get(index as usize))
            .and_then(Option::as_ref);

        match slot {
            Some(Slot::Value(value)) => Ok(value.clone()),
            Some(Slot::Unshared) => Err(Error::InvalidObject(
                "back-reference to an item that was read unshared".to_owned(),
            )),
            None => Err(Error::StreamCorrupted(format!(
                "back-reference to unassigned handle {:#010x}",
                handle.0
            ))),
        }
    }

    /// Drops all entries and restarts the counter at the base.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.next = BASE_WIRE_HANDLE;
    }
}
