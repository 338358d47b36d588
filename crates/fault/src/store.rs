//! Where the fault record lives.
//!
//! On hardware the record sits in a statically placed, zero-init-exempt RAM
//! section so that its bytes survive a reset (see the `fault-firmware`
//! crate). Everything above this layer only sees the [`RecordStore`] trait,
//! so tests inject a plain in-memory [`FaultRecord`] instead of a fixed
//! address.
//!
//! A store performs no validation and no allocation: it is raw field access.

use crate::record::FaultRecord;

/// Access to the single persistent fault record.
pub trait RecordStore {
    /// Shared view of the record bytes, whatever they currently contain.
    fn record(&self) -> &FaultRecord;

    /// Exclusive view of the record bytes.
    fn record_mut(&mut self) -> &mut FaultRecord;
}

/// A record held by value: the host-side and test store.
impl RecordStore for FaultRecord {
    fn record(&self) -> &FaultRecord {
        self
    }

    fn record_mut(&mut self) -> &mut FaultRecord {
        self
    }
}

impl<T: RecordStore + ?Sized> RecordStore for &mut T {
    fn record(&self) -> &FaultRecord {
        (**self).record()
    }

    fn record_mut(&mut self) -> &mut FaultRecord {
        (**self).record_mut()
    }
}
