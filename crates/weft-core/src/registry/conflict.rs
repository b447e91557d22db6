//! Conflict handling for duplicate registrations.
//!
//! Two registrations conflict when they share a full key
//! (`component::engine::method`). The policy decides which one survives.
use crate::registry::error::RegistrySystemError;
use crate::registry::Registration;

/// Policy applied when a registration arrives under an occupied full key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Fail with `DuplicateRegistration`
    Reject,
    /// Keep the existing registration, drop the newcomer
    KeepExisting,
    /// Replace only when the newcomer is newer by version, then priority
    #[default]
    OverwriteNewer,
}

/// Outcome of conflict resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepExisting,
    Replace,
}

impl ConflictPolicy {
    /// Decide what happens when `incoming` collides with `existing`
    pub fn resolve(
        &self,
        existing: &Registration,
        incoming: &Registration,
    ) -> std::result::Result<Resolution, RegistrySystemError> {
        match self {
            ConflictPolicy::Reject => Err(RegistrySystemError::DuplicateRegistration {
                full_key: incoming.full_key(),
            }),
            ConflictPolicy::KeepExisting => Ok(Resolution::KeepExisting),
            ConflictPolicy::OverwriteNewer => {
                let newer = (&incoming.version, incoming.priority)
                    > (&existing.version, existing.priority);
                if newer {
                    Ok(Resolution::Replace)
                } else {
                    Ok(Resolution::KeepExisting)
                }
            }
        }
    }
}
