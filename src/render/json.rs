use serde::Serialize;

use crate::error::PharmaGuardError;

pub fn to_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, PharmaGuardError> {
    Ok(serde_json::to_string_pretty(value)?)
}
