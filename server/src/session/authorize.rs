use shared::types::Authorization;

use super::validator::{SessionState, SessionValidator};
use super::SubjectId;

/// Ownership answer for a viewer whose session state is already known.
///
/// Routes that validated the cookie once for the request use this directly
/// instead of validating again.
pub fn authorization_for(viewer: &SessionState, resource_owner: &SubjectId) -> Authorization {
    match viewer {
        SessionState::Valid(subject) => Authorization {
            signed_in: true,
            is_owner: subject == resource_owner,
        },
        SessionState::Invalid => Authorization::ANONYMOUS,
    }
}

/// Is the caller signed in, and does it own the resource? Never fails.
pub async fn authorize(
    validator: &SessionValidator,
    credential: &str,
    resource_owner: &SubjectId,
    now: i64,
) -> Authorization {
    let viewer = validator.validate(credential, now).await;
    authorization_for(&viewer, resource_owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_viewer_is_neither_signed_in_nor_owner() {
        let owner = SubjectId::new("alice");
        assert_eq!(
            authorization_for(&SessionState::Invalid, &owner),
            Authorization {
                signed_in: false,
                is_owner: false
            }
        );
    }

    #[test]
    fn ownership_is_exact_subject_equality() {
        let owner = SubjectId::new("alice");
        let me = SessionState::Valid(SubjectId::new("alice"));
        let other = SessionState::Valid(SubjectId::new("Alice"));

        assert!(authorization_for(&me, &owner).is_owner);
        let a = authorization_for(&other, &owner);
        assert!(a.signed_in);
        assert!(!a.is_owner);
    }
}
