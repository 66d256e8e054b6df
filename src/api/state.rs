use std::sync::Arc;

use crate::fetch::UpstreamClient;
use crate::models::Region;
use crate::profile::ProfileAssembler;
use crate::storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<UpstreamClient>,
    pub assembler: Arc<ProfileAssembler>,
    pub store: Arc<dyn Store>,
    /// Used when a request carries no `region`
    pub default_region: Region,
    pub cors_origin: String,
}

impl AppState {
    /// Parse an optional `region` query parameter.
    pub fn region(&self, param: Option<&str>) -> Result<Region, crate::api::ApiError> {
        match param {
            Some(region) if !region.trim().is_empty() => Ok(region.parse()?),
            _ => Ok(self.default_region),
        }
    }
}
