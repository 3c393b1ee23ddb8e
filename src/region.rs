//! Administrative region resolution

use crate::errors::Result;
use crate::site_table::SiteTable;

/// Resolves administrative attribute values to site ids
#[derive(Debug, Clone, Copy)]
pub struct RegionResolver<'a> {
    sites: &'a SiteTable,
}

impl<'a> RegionResolver<'a> {
    pub fn new(sites: &'a SiteTable) -> Self {
        Self { sites }
    }

    /// Site ids whose `attribute` equals `value`, in site table order.
    ///
    /// No match yields an empty list; an unknown attribute is a
    /// [`ColumnNotFound`](crate::errors::ExtractError::ColumnNotFound) error.
    pub fn resolve(&self, attribute: &str, value: &str) -> Result<Vec<usize>> {
        let column = self.sites.column(attribute)?;
        let gids: Vec<usize> = column
            .iter()
            .enumerate()
            .filter(|(_, v)| v.as_deref() == Some(value))
            .map(|(gid, _)| gid)
            .collect();

        tracing::debug!(attribute, value, matched = gids.len(), "Resolved region");
        Ok(gids)
    }
}
