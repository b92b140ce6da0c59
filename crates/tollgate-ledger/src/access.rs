use tollgate_core::{Address, LedgerConfig};

use crate::error::LedgerError;

/// Capability a caller must hold for a privileged operation.
///
/// Host operators need no role: their entries are keyed by operator account,
/// so pause and unpause only ever reach the caller's own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The ledger administrator.
    Admin,
}

/// Check that `caller` holds `role`. An unset (zero) admin authorizes nobody.
pub fn authorize(config: &LedgerConfig, caller: &Address, role: Role) -> Result<(), LedgerError> {
    match role {
        Role::Admin => {
            if config.admin.is_zero() || *caller != config.admin {
                return Err(LedgerError::Unauthorized(format!(
                    "{} is not the admin",
                    caller
                )));
            }
        }
    }
    Ok(())
}
