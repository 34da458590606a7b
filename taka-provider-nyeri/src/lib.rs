//! Built-in zone data for Nyeri, shipped with the binary.

use async_trait::async_trait;
use tracing::debug;

use taka_core::{
    model::{ServiceAreaId, ServiceAreaMeta, ZoneRecord},
    ports::{PortError, ZoneSource},
};

/// Zone table in the portal's JSON shape (`[lat, lon]` boundaries, English weekday names).
const ZONES_JSON: &str = include_str!("../data/zones.json");

/// Zone source serving the embedded Nyeri zone table.
pub struct NyeriZoneSource {
    meta: ServiceAreaMeta,
}

impl NyeriZoneSource {
    /// Create a new source over the embedded table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meta: service_area_meta(),
        }
    }
}

impl Default for NyeriZoneSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ZoneSource for NyeriZoneSource {
    fn service_area(&self) -> &ServiceAreaMeta {
        &self.meta
    }

    async fn fetch_zones(&self) -> Result<Vec<ZoneRecord>, PortError> {
        let records: Vec<ZoneRecord> = serde_json::from_str(ZONES_JSON)?;
        debug!(zones = records.len(), "decoded built-in Nyeri zones");
        Ok(records)
    }
}

/// Build the zone source for Nyeri.
#[must_use]
pub fn source() -> NyeriZoneSource {
    NyeriZoneSource::new()
}

fn service_area_meta() -> ServiceAreaMeta {
    ServiceAreaMeta {
        id: ServiceAreaId(String::from("nyeri")),
        name: String::from("Nyeri"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use taka_core::model::{GeoPoint, ZoneId};
    use taka_core::registry::ZoneRegistry;
    use taka_core::resolver::{resolve, validate_ring};
    use taka_core::ports::ZoneSource;

    use super::source;

    async fn registry() -> ZoneRegistry {
        ZoneRegistry::load(&source()).await.expect("embedded zones are well formed")
    }

    #[tokio::test]
    async fn embedded_zones_load_in_order() {
        let registry = registry().await;
        let names: Vec<&str> = registry.all_zones().iter().map(|zone| zone.name.as_str()).collect();
        assert_eq!(names, vec!["Zone A", "Zone B", "Zone C", "Zone D"]);

        let zone_a = registry.find_by_id(&ZoneId::from("1")).expect("zone A present");
        assert_eq!(zone_a.collection_days.to_string(), "Monday and Thursday");
        assert_eq!(zone_a.time_window.label(), "6:00 AM - 10:00 AM");
        assert_eq!(zone_a.areas, vec!["Nyeri Town", "King'ong'o", "Gatitu"]);
        assert_eq!(source().service_area().name, "Nyeri");
    }

    #[tokio::test]
    async fn every_boundary_is_usable_and_days_are_set() {
        let registry = registry().await;
        for zone in registry.all_zones() {
            assert!(validate_ring(&zone.boundary).is_ok(), "{} has a usable boundary", zone.name);
            assert!(!zone.collection_days.is_empty(), "{} has collection days", zone.name);
            assert!(zone.time_window.opens_at().is_some(), "{} has a readable window", zone.name);
        }
    }

    #[rstest]
    #[case::zone_a_edge(GeoPoint::new(-0.4246, 36.9452), Some("1"))]
    #[case::zone_a_inside(GeoPoint::new(-0.4246, 36.9500), Some("1"))]
    #[case::zone_b(GeoPoint::new(-0.4300, 36.9300), Some("2"))]
    #[case::zone_c(GeoPoint::new(-0.3900, 36.9400), Some("3"))]
    #[case::zone_d(GeoPoint::new(-0.4550, 36.9600), Some("4"))]
    #[case::nairobi(GeoPoint::new(-1.2921, 36.8219), None)]
    #[tokio::test]
    async fn points_resolve_to_expected_zone(
        #[case] point: GeoPoint,
        #[case] expected: Option<&str>,
    ) {
        let registry = registry().await;
        let resolution = resolve(point, registry.all_zones()).expect("valid point");
        assert_eq!(resolution.zone.map(|zone| zone.id.0.as_str()), expected);
        assert!(resolution.warnings.is_empty(), "embedded zones do not overlap");
    }
}
