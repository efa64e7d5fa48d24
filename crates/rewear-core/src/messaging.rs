use uuid::Uuid;

use crate::CoreError;

/// A message about a listing always goes to the listing's owner.
///
/// Owners cannot open a thread about their own listing.
pub fn resolve_receiver(listing_owner: Uuid, requester: Uuid) -> Result<Uuid, CoreError> {
    if listing_owner == requester {
        return Err(CoreError::PermissionDenied(
            "cannot message yourself about your own listing".into(),
        ));
    }
    Ok(listing_owner)
}

/// Only the receiver of a message may change its read flag.
pub fn authorize_read_update(receiver: Uuid, requester: Uuid) -> Result<(), CoreError> {
    if receiver != requester {
        return Err(CoreError::PermissionDenied(
            "only the receiver can update a message's read state".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_is_owner() {
        let owner = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        assert_eq!(resolve_receiver(owner, buyer).unwrap(), owner);
    }

    #[test]
    fn owner_cannot_message_self() {
        let owner = Uuid::new_v4();
        assert!(matches!(
            resolve_receiver(owner, owner),
            Err(CoreError::PermissionDenied(_))
        ));
    }

    #[test]
    fn only_receiver_marks_read() {
        let receiver = Uuid::new_v4();
        assert!(authorize_read_update(receiver, receiver).is_ok());
        assert!(authorize_read_update(receiver, Uuid::new_v4()).is_err());
    }
}
