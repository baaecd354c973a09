//! Merge policies shared by every record update.

/// First write wins: fill `slot` only while it is still empty.
pub fn set_once<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Latest write wins, but an absent value never clears what is there.
pub fn replace_if_present<T>(slot: &mut Option<T>, value: Option<T>) {
    if let Some(value) = value {
        *slot = Some(value);
    }
}
