//! Groups postcodes into search clusters so that one Places search covers
//! every postcode within the radius of its center.

use crate::core::{DirectoryStore, Postcode};
use crate::domain::model::{PostcodeId, ScrapeStatus};
use crate::utils::error::Result;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterStats {
    pub total_clusters: usize,
    pub avg_postcodes_per_cluster: f64,
    pub max_postcodes_per_cluster: usize,
    pub min_postcodes_per_cluster: usize,
    pub total_postcodes_covered: usize,
}

impl ClusterStats {
    pub fn from_postcodes(postcodes: &[Postcode]) -> Self {
        let sizes: Vec<usize> = postcodes
            .iter()
            .filter(|p| p.is_cluster_center)
            .map(|p| p.cluster_postcodes.len())
            .collect();
        if sizes.is_empty() {
            return Self::default();
        }

        let mut covered: Vec<PostcodeId> = postcodes
            .iter()
            .filter(|p| p.is_cluster_center)
            .flat_map(|p| p.cluster_postcodes.iter().copied())
            .collect();
        covered.sort_unstable();
        covered.dedup();

        Self {
            total_clusters: sizes.len(),
            avg_postcodes_per_cluster: sizes.iter().sum::<usize>() as f64 / sizes.len() as f64,
            max_postcodes_per_cluster: sizes.iter().copied().max().unwrap_or_default(),
            min_postcodes_per_cluster: sizes.iter().copied().min().unwrap_or_default(),
            total_postcodes_covered: covered.len(),
        }
    }

    pub fn log(&self) {
        tracing::info!("📊 Cluster Statistics:");
        tracing::info!("Total Clusters: {}", self.total_clusters);
        tracing::info!(
            "Average Postcodes per Cluster: {:.2}",
            self.avg_postcodes_per_cluster
        );
        tracing::info!("Max Postcodes per Cluster: {}", self.max_postcodes_per_cluster);
        tracing::info!("Min Postcodes per Cluster: {}", self.min_postcodes_per_cluster);
        tracing::info!("Total Postcodes Covered: {}", self.total_postcodes_covered);
    }
}

/// Recomputes cluster assignments in place. Returns the number of clusters.
pub fn assign_clusters(postcodes: &mut [Postcode], radius_km: f64) -> usize {
    let now = Utc::now();

    // 先清除舊的分群資料
    for postcode in postcodes.iter_mut() {
        if postcode.is_cluster_center || postcode.cluster_id.is_some() {
            postcode.is_cluster_center = false;
            postcode.cluster_id = None;
            postcode.cluster_postcodes.clear();
            postcode.scrape_status = ScrapeStatus::Pending;
            postcode.error_message = None;
            postcode.last_updated = now;
        }
    }

    let mut located: Vec<(PostcodeId, f64, f64)> = postcodes
        .iter()
        .filter_map(|p| p.coordinates().map(|(lat, lng)| (p.id, lat, lng)))
        .collect();
    located.sort_by_key(|(id, _, _)| *id);

    // 相同覆蓋集合只保留 id 最小的中心
    let mut distinct: BTreeMap<Vec<PostcodeId>, PostcodeId> = BTreeMap::new();
    for &(center, lat, lng) in &located {
        let coverage: Vec<PostcodeId> = located
            .iter()
            .filter(|(_, b_lat, b_lng)| haversine_km(lat, lng, *b_lat, *b_lng) <= radius_km)
            .map(|(id, _, _)| *id)
            .collect();
        distinct.entry(coverage).or_insert(center);
    }

    let mut centers: HashMap<PostcodeId, (i64, Vec<PostcodeId>)> = HashMap::new();
    let mut member_cluster: HashMap<PostcodeId, i64> = HashMap::new();
    for (index, (coverage, center)) in distinct.into_iter().enumerate() {
        let cluster_id = index as i64 + 1;
        for member in &coverage {
            member_cluster.entry(*member).or_insert(cluster_id);
        }
        centers.insert(center, (cluster_id, coverage));
    }

    let count = centers.len();
    for postcode in postcodes.iter_mut() {
        if let Some((cluster_id, coverage)) = centers.remove(&postcode.id) {
            postcode.is_cluster_center = true;
            postcode.cluster_id = Some(cluster_id);
            postcode.cluster_postcodes = coverage;
            postcode.scrape_status = ScrapeStatus::Pending;
            postcode.last_updated = now;
        } else if let Some(cluster_id) = member_cluster.get(&postcode.id) {
            postcode.cluster_id = Some(*cluster_id);
            postcode.last_updated = now;
        }
    }
    count
}

/// Rebuilds clusters for every stored postcode and persists the result.
pub async fn generate_clusters(
    store: &dyn DirectoryStore,
    radius_km: f64,
) -> Result<ClusterStats> {
    tracing::info!("🗺️  Starting cluster generation (radius {} km)", radius_km);

    let mut postcodes = store.postcodes().await?;
    let count = assign_clusters(&mut postcodes, radius_km);
    let stats = ClusterStats::from_postcodes(&postcodes);
    store.replace_postcodes(postcodes).await?;

    tracing::info!("✅ Successfully generated {} clusters", count);
    stats.log();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postcode(id: PostcodeId, lat: Option<f64>, lng: Option<f64>) -> Postcode {
        Postcode {
            id,
            postcode: format!("{}", 2000 + id),
            city: "Sydney".to_string(),
            region: "NSW".to_string(),
            country: "AU".to_string(),
            latitude: lat,
            longitude: lng,
            is_cluster_center: false,
            cluster_id: None,
            cluster_postcodes: Vec::new(),
            last_scraped: None,
            last_updated: Utc::now(),
            scrape_status: ScrapeStatus::Pending,
            error_message: None,
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // Sydney → Melbourne ≈ 713 km
        let d = haversine_km(-33.8688, 151.2093, -37.8136, 144.9631);
        assert!((d - 713.4).abs() < 2.0, "distance was {}", d);
        assert_eq!(haversine_km(10.0, 10.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn test_identical_coverage_collapses_to_one_cluster() {
        // 三個點彼此距離 < 1km
        let mut postcodes = vec![
            postcode(1, Some(-33.8688), Some(151.2093)),
            postcode(2, Some(-33.8700), Some(151.2100)),
            postcode(3, Some(-33.8710), Some(151.2080)),
        ];

        let count = assign_clusters(&mut postcodes, 5.0);

        assert_eq!(count, 1);
        assert!(postcodes[0].is_cluster_center);
        assert_eq!(postcodes[0].cluster_postcodes, vec![1, 2, 3]);
        assert_eq!(postcodes[1].cluster_id, Some(1));
        assert!(!postcodes[1].is_cluster_center);
        assert_eq!(postcodes[2].cluster_id, Some(1));
    }

    #[test]
    fn test_far_apart_postcodes_form_separate_clusters() {
        let mut postcodes = vec![
            postcode(1, Some(-33.8688), Some(151.2093)),
            postcode(2, Some(-37.8136), Some(144.9631)),
            postcode(3, None, None),
        ];

        let count = assign_clusters(&mut postcodes, 5.0);

        assert_eq!(count, 2);
        assert_eq!(postcodes[0].cluster_id, Some(1));
        assert_eq!(postcodes[1].cluster_id, Some(2));
        assert_eq!(postcodes[2].cluster_id, None);
        assert!(!postcodes[2].is_cluster_center);

        let stats = ClusterStats::from_postcodes(&postcodes);
        assert_eq!(stats.total_clusters, 2);
        assert_eq!(stats.max_postcodes_per_cluster, 1);
        assert_eq!(stats.total_postcodes_covered, 2);
    }

    #[test]
    fn test_chain_members_take_lowest_cluster() {
        // 1 與 2 相距約 4km，2 與 3 相距約 4km，1 與 3 約 8km
        let mut postcodes = vec![
            postcode(1, Some(0.0), Some(0.0)),
            postcode(2, Some(0.0), Some(0.036)),
            postcode(3, Some(0.0), Some(0.072)),
        ];

        let count = assign_clusters(&mut postcodes, 5.0);

        // {1,2}, {1,2,3}, {2,3} 三個不同集合
        assert_eq!(count, 3);
        assert_eq!(postcodes[0].cluster_postcodes, vec![1, 2]);
        assert_eq!(postcodes[1].cluster_postcodes, vec![1, 2, 3]);
        assert_eq!(postcodes[2].cluster_postcodes, vec![2, 3]);
        assert_eq!(postcodes[0].cluster_id, Some(1));
        assert_eq!(postcodes[1].cluster_id, Some(2));
        assert_eq!(postcodes[2].cluster_id, Some(3));
    }

    #[test]
    fn test_reset_clears_previous_assignment() {
        let mut stale = postcode(1, None, None);
        stale.is_cluster_center = true;
        stale.cluster_id = Some(9);
        stale.cluster_postcodes = vec![1, 4];
        stale.scrape_status = ScrapeStatus::Failed;
        stale.error_message = Some("old".to_string());
        let mut postcodes = vec![stale];

        assert_eq!(assign_clusters(&mut postcodes, 5.0), 0);
        assert!(!postcodes[0].is_cluster_center);
        assert!(postcodes[0].cluster_postcodes.is_empty());
        assert_eq!(postcodes[0].scrape_status, ScrapeStatus::Pending);
        assert!(postcodes[0].error_message.is_none());
    }

    #[tokio::test]
    async fn test_generate_clusters_persists() {
        use crate::domain::model::NewPostcode;
        let store = crate::store::memory_store().await.unwrap();
        store
            .import_postcodes(vec![
                NewPostcode {
                    postcode: "2000".to_string(),
                    city: "Sydney".to_string(),
                    region: "NSW".to_string(),
                    country: "AU".to_string(),
                    latitude: Some(-33.8688),
                    longitude: Some(151.2093),
                },
                NewPostcode {
                    postcode: "3000".to_string(),
                    city: "Melbourne".to_string(),
                    region: "VIC".to_string(),
                    country: "AU".to_string(),
                    latitude: Some(-37.8136),
                    longitude: Some(144.9631),
                },
            ])
            .await
            .unwrap();

        let stats = generate_clusters(&store, DEFAULT_RADIUS_KM).await.unwrap();
        assert_eq!(stats.total_clusters, 2);

        let stored = store.postcodes().await.unwrap();
        assert!(stored.iter().all(|p| p.is_cluster_center));
    }
}
