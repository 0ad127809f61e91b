//! Drill catalog operations: CRUD, search and recommendations.

use std::cmp::Ordering;
use std::sync::Arc;

use metrics::counter;
use swinglab_models::{Difficulty, Drill, DrillInput, DrillUpdate};
use tracing::{debug, info};

use crate::error::{DrillError, DrillResult};
use crate::recommend::{analyze_metrics, score_drill, SwingMetricsInput};
use crate::repository::{new_drill, DrillQuery, DrillRepository};

pub mod names {
    pub const DRILLS_CREATED: &str = "drills_created_total";
    pub const RECOMMENDATIONS: &str = "drill_recommendations_total";
}

pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 5;

/// Service over a [`DrillRepository`].
#[derive(Clone)]
pub struct DrillService {
    repo: Arc<dyn DrillRepository>,
}

impl DrillService {
    pub fn new(repo: Arc<dyn DrillRepository>) -> Self {
        Self { repo }
    }

    /// Drills matching every given filter, sorted by name.
    pub async fn get_drills(
        &self,
        category: Option<&str>,
        difficulty: Option<Difficulty>,
        equipment: Option<&str>,
    ) -> DrillResult<Vec<Drill>> {
        let query = DrillQuery {
            category: category.map(str::to_string),
            difficulty,
            equipment: equipment.map(str::to_string),
            ..Default::default()
        };
        let mut drills = self.repo.list(&query).await?;
        sort_by_name(&mut drills);
        Ok(drills)
    }

    pub async fn get_drill(&self, id: &str) -> DrillResult<Option<Drill>> {
        self.repo.get(id).await
    }

    pub async fn create_drill(&self, input: DrillInput) -> DrillResult<Drill> {
        input.validate().map_err(DrillError::Validation)?;
        let drill = self.repo.insert(new_drill(input)).await?;
        counter!(names::DRILLS_CREATED).increment(1);
        info!(drill_id = %drill.id, name = %drill.name, "Created drill");
        Ok(drill)
    }

    /// Apply a partial update. `None` when the drill does not exist.
    pub async fn update_drill(&self, id: &str, update: DrillUpdate) -> DrillResult<Option<Drill>> {
        if update.is_empty() {
            return Err(DrillError::EmptyUpdate(id.to_string()));
        }
        self.repo.update(id, update).await
    }

    pub async fn delete_drill(&self, id: &str) -> DrillResult<bool> {
        let deleted = self.repo.delete(id).await?;
        if deleted {
            info!(drill_id = %id, "Deleted drill");
        }
        Ok(deleted)
    }

    /// Text and/or correction search, sorted by name.
    ///
    /// The text matches name or description case-insensitively, or a tag
    /// exactly. Corrections narrow the result to drills addressing any of them.
    pub async fn search_drills(&self, text: &str, corrections: &[String]) -> DrillResult<Vec<Drill>> {
        let query = DrillQuery {
            corrections_any: corrections.to_vec(),
            ..Default::default()
        };
        let needle = text.trim().to_lowercase();

        let mut drills: Vec<Drill> = self
            .repo
            .list(&query)
            .await?
            .into_iter()
            .filter(|d| needle.is_empty() || matches_text(d, text.trim(), &needle))
            .collect();
        sort_by_name(&mut drills);
        Ok(drills)
    }

    /// Drills addressing the given corrections or those implied by `metrics`,
    /// highest relevance first, at most `limit`.
    pub async fn recommend_drills(
        &self,
        corrections: &[String],
        metrics: &SwingMetricsInput,
        limit: usize,
    ) -> DrillResult<Vec<Drill>> {
        let mut wanted: Vec<String> = corrections.to_vec();
        for c in analyze_metrics(metrics) {
            if !wanted.contains(&c) {
                wanted.push(c);
            }
        }

        let query = DrillQuery {
            corrections_any: wanted,
            ..Default::default()
        };

        let mut candidates: Vec<Drill> = self
            .repo
            .list(&query)
            .await?
            .into_iter()
            .take(limit.saturating_mul(2))
            .map(|mut d| {
                d.relevance_score = Some(score_drill(&d, corrections));
                d
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
        });
        candidates.truncate(limit);

        counter!(names::RECOMMENDATIONS).increment(1);
        debug!(
            requested = corrections.len(),
            returned = candidates.len(),
            "Recommended drills"
        );
        Ok(candidates)
    }
}

fn matches_text(drill: &Drill, raw: &str, lowered: &str) -> bool {
    drill.name.to_lowercase().contains(lowered)
        || drill.description.to_lowercase().contains(lowered)
        || drill.tags.iter().any(|t| t == raw)
}

fn sort_by_name(drills: &mut [Drill]) {
    drills.sort_by(|a, b| a.name.cmp(&b.name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::{LOW_LAUNCH_ANGLE, POOR_HIP_ROTATION};
    use crate::repository::InMemoryDrillRepository;

    fn service() -> DrillService {
        DrillService::new(Arc::new(InMemoryDrillRepository::seeded().unwrap()))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_recommend_low_launch_angle() {
        let svc = service();
        let drills = svc
            .recommend_drills(
                &strings(&[LOW_LAUNCH_ANGLE]),
                &SwingMetricsInput::default(),
                DEFAULT_RECOMMENDATION_LIMIT,
            )
            .await
            .unwrap();

        assert!(!drills.is_empty());
        assert!(drills.len() <= 5);
        assert!(drills.iter().all(|d| d.addresses(LOW_LAUNCH_ANGLE)));
        let scores: Vec<f64> = drills.iter().map(|d| d.relevance_score.unwrap()).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        // Beginner tee work outranks intermediate soft toss.
        assert_eq!(drills[0].name, "Tee Work - Launch Angle");
        assert!((scores[0] - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_recommend_from_metrics_only() {
        let svc = service();
        let metrics = SwingMetricsInput {
            hip_angle: Some(5.0),
            ..Default::default()
        };
        let drills = svc.recommend_drills(&[], &metrics, 10).await.unwrap();

        assert_eq!(drills.len(), 3);
        assert!(drills.iter().all(|d| d.addresses(POOR_HIP_ROTATION)));
        // No explicit corrections: only the difficulty and equipment bonuses count.
        assert_eq!(drills[0].name, "Hip Rotation Drill");
        assert!((drills[0].relevance_score.unwrap() - 0.15).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_recommend_respects_limit() {
        let svc = service();
        let drills = svc
            .recommend_drills(&[], &SwingMetricsInput::default(), 2)
            .await
            .unwrap();
        assert_eq!(drills.len(), 2);
        assert!(svc
            .recommend_drills(&[], &SwingMetricsInput::default(), 0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_get_drills_filters_sorted() {
        let svc = service();

        let all = svc.get_drills(None, None, None).await.unwrap();
        assert_eq!(all.len(), 10);
        assert!(all.windows(2).all(|w| w[0].name <= w[1].name));

        let beginner = svc
            .get_drills(Some("hitting"), Some(Difficulty::Beginner), None)
            .await
            .unwrap();
        assert_eq!(beginner.len(), 4);

        let partner = svc.get_drills(None, None, Some("partner")).await.unwrap();
        let names: Vec<&str> = partner.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Front Toss - Timing", "Soft Toss - Launch Angle"]);
    }

    #[tokio::test]
    async fn test_search_text_and_tags() {
        let svc = service();

        let by_name = svc.search_drills("TEE", &[]).await.unwrap();
        assert!(by_name.iter().any(|d| d.name == "Tee Work - Launch Angle"));

        let by_tag = svc.search_drills("muscle_memory", &[]).await.unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].name, "Dry Swing Practice");

        let narrowed = svc
            .search_drills("launch angle", &strings(&["high_launch_angle"]))
            .await
            .unwrap();
        assert_eq!(narrowed.len(), 1);

        let everything = svc.search_drills("", &[]).await.unwrap();
        assert_eq!(everything.len(), 10);
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let svc = service();

        let bad = DrillInput {
            name: "No description".to_string(),
            category: "hitting".to_string(),
            corrections: strings(&["poor_timing"]),
            ..Default::default()
        };
        let err = svc.create_drill(bad).await.unwrap_err();
        assert!(matches!(err, DrillError::Validation(_)));
        assert!(err.is_client_error());

        let created = svc
            .create_drill(DrillInput {
                name: "Rhythm Load".to_string(),
                description: "Load on a count".to_string(),
                category: "hitting".to_string(),
                corrections: strings(&["poor_timing"]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(svc.get_drill(&created.id).await.unwrap().unwrap().name, "Rhythm Load");

        assert!(matches!(
            svc.update_drill(&created.id, DrillUpdate::default()).await,
            Err(DrillError::EmptyUpdate(_))
        ));
        let updated = svc
            .update_drill(
                &created.id,
                DrillUpdate {
                    difficulty: Some(Difficulty::Advanced),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.difficulty, Difficulty::Advanced);

        assert!(svc.delete_drill(&created.id).await.unwrap());
        assert!(svc.get_drill(&created.id).await.unwrap().is_none());
    }
}
