//! Location Resolver — maps a location code to a remote location id.
//!
//! Codes starting with `NO` are organization numbers; anything else is an
//! internal unique id.

use roster_core::{CoreError, Location, LocationId, Reader};

const ORGANIZATION_PREFIX: &str = "NO";

#[derive(Clone, Copy)]
pub struct LocationResolver<'a> {
    locations: &'a dyn Reader<Location>,
}

impl<'a> LocationResolver<'a> {
    pub fn new(locations: &'a dyn Reader<Location>) -> Self {
        Self { locations }
    }

    /// The location addressed by `code`, under either addressing scheme.
    pub fn find(&self, code: &str) -> Result<Option<Location>, CoreError> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }
        if code.starts_with(ORGANIZATION_PREFIX) {
            Ok(self
                .locations
                .all()?
                .into_iter()
                .find(|l| l.organization_number == code))
        } else {
            self.find_by_unique_id(code)
        }
    }

    /// Match on the internal unique id only (descriptor owners).
    pub fn find_by_unique_id(&self, unique_id: &str) -> Result<Option<Location>, CoreError> {
        let unique_id = unique_id.trim();
        if unique_id.is_empty() {
            return Ok(None);
        }
        self.locations.get(&unique_id.to_string())
    }

    /// Remote location id for `code`, or [`LocationId::UNRESOLVED`].
    ///
    /// Both an unknown code and an unusable stored id log a warning; neither
    /// is an error.
    pub fn resolve(&self, code: &str) -> Result<LocationId, CoreError> {
        if code.trim().is_empty() {
            return Ok(LocationId::UNRESOLVED);
        }
        match self.find(code)? {
            Some(location) => Ok(remote_location_id(&location)),
            None => {
                tracing::warn!(code, "no location matches code; ineligible for sync");
                Ok(LocationId::UNRESOLVED)
            }
        }
    }
}

/// Parse the stored remote id of a location; 0 if absent or unparseable.
pub fn remote_location_id(location: &Location) -> LocationId {
    let raw = location.remote_location_id.as_deref().unwrap_or_default().trim();
    match raw.parse::<u32>() {
        Ok(id) if id > 0 => LocationId(id),
        _ => {
            tracing::warn!(
                location = %location.name,
                unique_id = %location.unique_id,
                stored = raw,
                "location has no usable remote location id; ineligible for sync",
            );
            LocationId::UNRESOLVED
        }
    }
}
