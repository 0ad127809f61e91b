//! Drill storage.

use async_trait::async_trait;
use chrono::Utc;
use swinglab_models::{Difficulty, Drill, DrillInput, DrillUpdate};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::catalog::seed_drills;
use crate::error::DrillResult;

/// Filter pushed down to the store. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct DrillQuery {
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// Drill must list this equipment item
    pub equipment: Option<String>,
    /// Drill must address at least one of these
    pub corrections_any: Vec<String>,
}

impl DrillQuery {
    pub fn matches(&self, drill: &Drill) -> bool {
        self.category.as_deref().map_or(true, |c| drill.category == c)
            && self.difficulty.map_or(true, |d| drill.difficulty == d)
            && self
                .equipment
                .as_deref()
                .map_or(true, |e| drill.equipment.iter().any(|x| x == e))
            && (self.corrections_any.is_empty()
                || self.corrections_any.iter().any(|c| drill.addresses(c)))
    }
}

/// Persistence seam for drills.
#[async_trait]
pub trait DrillRepository: Send + Sync {
    /// Drills matching `query`, in storage order.
    async fn list(&self, query: &DrillQuery) -> DrillResult<Vec<Drill>>;

    async fn get(&self, id: &str) -> DrillResult<Option<Drill>>;

    async fn insert(&self, drill: Drill) -> DrillResult<Drill>;

    /// Apply `update`; `None` when the drill does not exist.
    async fn update(&self, id: &str, update: DrillUpdate) -> DrillResult<Option<Drill>>;

    /// `false` when nothing was deleted.
    async fn delete(&self, id: &str) -> DrillResult<bool>;
}

/// Build a stored drill from a create payload.
pub fn new_drill(input: DrillInput) -> Drill {
    let now = Utc::now();
    Drill {
        id: Uuid::new_v4().simple().to_string(),
        name: input.name,
        description: input.description,
        category: input.category,
        difficulty: input.difficulty.unwrap_or_default(),
        equipment: input.equipment,
        corrections: input.corrections,
        instructions: input.instructions,
        video_url: input.video_url.unwrap_or_default(),
        image_url: input.image_url.unwrap_or_default(),
        duration: input.duration.unwrap_or(10),
        reps: input.reps.unwrap_or(10),
        tags: input.tags,
        created_at: now,
        updated_at: now,
        relevance_score: None,
    }
}

/// Process-local store.
#[derive(Default)]
pub struct InMemoryDrillRepository {
    drills: RwLock<Vec<Drill>>,
}

impl InMemoryDrillRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the bundled catalog.
    pub fn seeded() -> DrillResult<Self> {
        let drills: Vec<Drill> = seed_drills()?.into_iter().map(new_drill).collect();
        info!(count = drills.len(), "Seeded drill catalog");
        Ok(Self {
            drills: RwLock::new(drills),
        })
    }

    pub async fn len(&self) -> usize {
        self.drills.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.drills.read().await.is_empty()
    }
}

#[async_trait]
impl DrillRepository for InMemoryDrillRepository {
    async fn list(&self, query: &DrillQuery) -> DrillResult<Vec<Drill>> {
        let drills = self.drills.read().await;
        Ok(drills.iter().filter(|d| query.matches(d)).cloned().collect())
    }

    async fn get(&self, id: &str) -> DrillResult<Option<Drill>> {
        let drills = self.drills.read().await;
        Ok(drills.iter().find(|d| d.id == id).cloned())
    }

    async fn insert(&self, drill: Drill) -> DrillResult<Drill> {
        self.drills.write().await.push(drill.clone());
        Ok(drill)
    }

    async fn update(&self, id: &str, update: DrillUpdate) -> DrillResult<Option<Drill>> {
        let mut drills = self.drills.write().await;
        let Some(drill) = drills.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        update.apply(drill);
        drill.updated_at = Utc::now();
        Ok(Some(drill.clone()))
    }

    async fn delete(&self, id: &str) -> DrillResult<bool> {
        let mut drills = self.drills.write().await;
        let before = drills.len();
        drills.retain(|d| d.id != id);
        Ok(drills.len() < before)
    }
}
