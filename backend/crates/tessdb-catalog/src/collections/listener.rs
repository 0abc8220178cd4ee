use crate::value::Value;

/// Observer of entry changes in a map.
///
/// `old` is `None` for inserts and `new` is `None` for removals.
/// `expired` is set when the change was caused by expiration.
pub trait ModificationListener: Send + Sync {
    fn modify(&self, key: &Value, old: Option<&Value>, new: Option<&Value>, expired: bool);
}

impl<F> ModificationListener for F
where
    F: Fn(&Value, Option<&Value>, Option<&Value>, bool) + Send + Sync,
{
    fn modify(&self, key: &Value, old: Option<&Value>, new: Option<&Value>, expired: bool) {
        self(key, old, new, expired)
    }
}
