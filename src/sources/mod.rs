mod deals;
mod leads;

use crate::mapping::SourceSpec;

/// All sources this deployment syncs, in run order.
pub fn all_sources() -> Vec<SourceSpec> {
    vec![leads::spec(), deals::spec(), deals::complete_spec()]
}

/// Sources filtered by the CLI enable flags, preserving run order.
pub fn enabled_sources(leads: bool, deals: bool, deals_complete: bool) -> Vec<SourceSpec> {
    let mut sources = Vec::new();
    if leads {
        sources.push(leads::spec());
    }
    if deals {
        sources.push(deals::spec());
    }
    if deals_complete {
        sources.push(deals::complete_spec());
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_source_ids_are_unique() {
        let sources = all_sources();
        let ids: HashSet<_> = sources.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), sources.len());
    }

    #[test]
    fn test_tables_are_distinct() {
        let sources = all_sources();
        let tables: HashSet<_> = sources.iter().map(|s| s.table).collect();
        assert_eq!(tables.len(), sources.len());
    }

    #[test]
    fn test_every_source_maps_modified_time() {
        for source in all_sources() {
            assert!(
                source
                    .columns
                    .iter()
                    .any(|c| c.source_field == crate::mapping::MODIFIED_TIME_FIELD),
                "source {} does not map Modified_Time",
                source.id
            );
        }
    }

    #[test]
    fn test_column_names_are_unique_per_source() {
        for source in all_sources() {
            let mut names: Vec<_> = source.columns.iter().map(|c| c.column).collect();
            names.push(source.key_column);
            let unique: HashSet<_> = names.iter().collect();
            assert_eq!(unique.len(), names.len(), "duplicate column in {}", source.id);
        }
    }

    #[test]
    fn test_enabled_sources_filtering() {
        assert_eq!(enabled_sources(true, true, true).len(), 3);
        let only_deals = enabled_sources(false, true, false);
        assert_eq!(only_deals.len(), 1);
        assert_eq!(only_deals[0].id, "deals");
        assert!(enabled_sources(false, false, false).is_empty());
    }
}
