use crate::domain::entities::user::UserContact;
use crate::domain::ports::store::StoreError;

/// Lookup of notification recipients.
pub trait UserDirectory: Send + Sync {
    /// Contacts for the given user ids. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn contacts(&self, user_ids: &[i64]) -> Result<Vec<UserContact>, StoreError>;

    /// All staff contacts, used when a rule names no subscribers.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn staff_contacts(&self) -> Result<Vec<UserContact>, StoreError>;
}
