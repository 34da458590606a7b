//! Session-wide, read-only registry of collection zones.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::CoreError;
use crate::model::{Zone, ZoneId, ZoneRecord};
use crate::ports::{PortError, ZoneSource};

#[derive(Debug, Clone, Copy)]
/// A served area whose name matched a search, with the zone serving it.
pub struct AreaMatch<'z> {
    /// Zone serving the area.
    pub zone: &'z Zone,
    /// Matching area name as listed by the zone.
    pub area: &'z str,
}

/// Zones loaded once per session, in source order.
#[derive(Debug)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
    index: HashMap<ZoneId, usize>,
}

impl ZoneRegistry {
    /// Fetch all zones from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DataUnavailable`] when the source fails, returns malformed
    /// records, or returns no zone at all.
    pub async fn load(source: &dyn ZoneSource) -> Result<Self, CoreError> {
        let service_area = &source.service_area().name;
        let records = source.fetch_zones().await.map_err(|error| {
            warn!(%service_area, %error, "zone source unavailable");
            CoreError::DataUnavailable(error)
        })?;

        let registry = Self::from_records(records)?;
        info!(%service_area, zones = registry.zones.len(), "zone registry loaded");
        Ok(registry)
    }

    /// Build a registry from records already at hand.
    ///
    /// Boundaries are not validated here; unusable ones are skipped at resolution time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DataUnavailable`] for an empty list, duplicate ids or
    /// unknown weekday names.
    pub fn from_records(records: Vec<ZoneRecord>) -> Result<Self, CoreError> {
        if records.is_empty() {
            return Err(malformed("source returned no zones".to_owned()));
        }

        let mut zones = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());

        for record in records {
            let name = record.name.clone();
            let zone = Zone::try_from(record)
                .map_err(|error| malformed(format!("zone {name}: {error}")))?;

            if index.insert(zone.id.clone(), zones.len()).is_some() {
                return Err(malformed(format!("duplicate zone id {}", zone.id)));
            }
            if zone.collection_days.is_empty() {
                warn!(zone = %zone.id, "zone has no collection days");
            }
            zones.push(zone);
        }

        Ok(Self { zones, index })
    }

    /// All zones in load order.
    #[must_use]
    pub fn all_zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Look up a zone by identifier.
    #[must_use]
    pub fn find_by_id(&self, id: &ZoneId) -> Option<&Zone> {
        self.index.get(id).and_then(|&position| self.zones.get(position))
    }

    /// Served areas whose name contains `query`, ignoring case.
    ///
    /// Results follow zone load order, then the zone's area order. A blank query
    /// matches nothing.
    #[must_use]
    pub fn search_areas(&self, query: &str) -> Vec<AreaMatch<'_>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.zones
            .iter()
            .flat_map(|zone| {
                zone.areas
                    .iter()
                    .filter(|area| area.to_lowercase().contains(&needle))
                    .map(move |area| AreaMatch {
                        zone,
                        area: area.as_str(),
                    })
            })
            .collect()
    }
}

fn malformed(reason: String) -> CoreError {
    CoreError::DataUnavailable(PortError::Malformed(reason))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Weekday;

    use super::ZoneRegistry;
    use crate::error::CoreError;
    use crate::model::{RecordId, ServiceAreaId, ServiceAreaMeta, ZoneId, ZoneRecord};
    use crate::ports::{PortError, ZoneSource};

    fn record(id: RecordId, name: &str, areas: &[&str], days: &[&str]) -> ZoneRecord {
        ZoneRecord {
            id,
            name: name.to_owned(),
            coordinates: vec![[-0.4146, 36.9452], [-0.4246, 36.9552], [-0.4346, 36.9452]],
            areas: areas.iter().map(|&area| area.to_owned()).collect(),
            collection_days: days.iter().map(|&day| day.to_owned()).collect(),
            time: "6:00 AM - 10:00 AM".to_owned(),
        }
    }

    fn nyeri_records() -> Vec<ZoneRecord> {
        vec![
            record(
                RecordId::Text("A".to_owned()),
                "Zone A",
                &["Nyeri Town", "King'ong'o", "Gatitu"],
                &["Thursday", "Monday"],
            ),
            record(RecordId::Number(2), "Zone B", &["Ruringu", "Gatitu Estate"], &["Tuesday"]),
        ]
    }

    struct UnreachableSource(ServiceAreaMeta);

    #[async_trait]
    impl ZoneSource for UnreachableSource {
        fn service_area(&self) -> &ServiceAreaMeta {
            &self.0
        }

        async fn fetch_zones(&self) -> Result<Vec<ZoneRecord>, PortError> {
            Err(PortError::Internal("connection refused".to_owned()))
        }
    }

    #[test]
    fn keeps_load_order_and_normalises_days() {
        let registry = ZoneRegistry::from_records(nyeri_records()).expect("well-formed records");

        let ids: Vec<&str> = registry.all_zones().iter().map(|zone| zone.id.0.as_str()).collect();
        assert_eq!(ids, vec!["A", "2"]);

        let zone_a = registry.find_by_id(&ZoneId::from("A")).expect("zone A present");
        let days: Vec<Weekday> = zone_a.collection_days.iter().collect();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Thu]);
        assert!(registry.find_by_id(&ZoneId::from("Z")).is_none());
    }

    #[test]
    fn area_search_is_case_insensitive_and_ordered() {
        let registry = ZoneRegistry::from_records(nyeri_records()).expect("well-formed records");

        let matches: Vec<(&str, &str)> = registry
            .search_areas("  gatitu ")
            .into_iter()
            .map(|hit| (hit.zone.name.as_str(), hit.area))
            .collect();
        assert_eq!(matches, vec![("Zone A", "Gatitu"), ("Zone B", "Gatitu Estate")]);
        assert!(registry.search_areas("   ").is_empty());
    }

    #[test]
    fn duplicate_ids_are_malformed() {
        let mut records = nyeri_records();
        records.push(record(RecordId::Text("A".to_owned()), "Zone A again", &[], &["Friday"]));
        assert!(matches!(
            ZoneRegistry::from_records(records),
            Err(CoreError::DataUnavailable(PortError::Malformed(_)))
        ));
    }

    #[test]
    fn unknown_weekday_is_malformed() {
        let records = vec![record(RecordId::Number(1), "Zone A", &[], &["Mondays"])];
        assert!(matches!(
            ZoneRegistry::from_records(records),
            Err(CoreError::DataUnavailable(PortError::Malformed(_)))
        ));
    }

    #[test]
    fn empty_source_is_unavailable() {
        assert!(matches!(
            ZoneRegistry::from_records(Vec::new()),
            Err(CoreError::DataUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_source_is_unavailable() {
        let source = UnreachableSource(ServiceAreaMeta {
            id: ServiceAreaId("nyeri".to_owned()),
            name: "Nyeri".to_owned(),
        });
        assert!(matches!(
            ZoneRegistry::load(&source).await,
            Err(CoreError::DataUnavailable(PortError::Internal(_)))
        ));
    }
}
