//! One play session: the three engines, their store, and the calls the
//! display layer is allowed to make.

use crate::economy::{Economy, Receipt, ShopItem};
use crate::environment::{Environment, EnvironmentState, MoodReport};
use crate::error::GameResult;
use crate::model::{Bulb, Mood};
use crate::store::KeyValueStore;
use crate::tasks::{Completion, TaskEngine, TaskEvent};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

pub struct Game<S: KeyValueStore> {
    store: S,
    environment: Environment,
    tasks: TaskEngine,
    economy: Economy,
    rng: StdRng,
    last_mood: Mood,
}

impl<S: KeyValueStore> Game<S> {
    /// Restores whatever `store` holds; missing pieces start at defaults.
    /// `seed` pins the soil-check dice, otherwise they come from entropy.
    pub fn load(mut store: S, now: DateTime<Utc>, seed: Option<u64>) -> Self {
        let environment = Environment::load(&mut store, now);
        let tasks = TaskEngine::load(&mut store, now);
        let economy = Economy::load(&store);
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let last_mood = environment.evaluate_mood().mood;
        info!(
            points = economy.points(),
            tasks = tasks.len(),
            mood = ?last_mood,
            "session loaded"
        );
        Self {
            store,
            environment,
            tasks,
            economy,
            rng,
            last_mood,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn environment(&self) -> &EnvironmentState {
        self.environment.state()
    }

    pub fn tasks(&self) -> &TaskEngine {
        &self.tasks
    }

    pub fn economy(&self) -> &Economy {
        &self.economy
    }

    pub fn points(&self) -> u32 {
        self.economy.points()
    }

    pub fn evaluate_mood(&self) -> MoodReport {
        self.environment.evaluate_mood()
    }

    pub fn care_hints(&self, now: DateTime<Utc>) -> Vec<String> {
        self.environment.care_hints(now)
    }

    pub fn water(&mut self, now: DateTime<Utc>) -> MoodReport {
        let report = self.environment.water(&mut self.store, now);
        self.note_mood(&report);
        report
    }

    pub fn check_soil(&mut self, now: DateTime<Utc>) -> MoodReport {
        let report = self
            .environment
            .check_soil(&mut self.store, &mut self.rng, now);
        self.note_mood(&report);
        report
    }

    pub fn change_bulb(&mut self, bulb: &str) -> GameResult<MoodReport> {
        let bulb: Bulb = bulb.parse()?;
        let report = self.environment.change_bulb(&mut self.store, bulb);
        self.note_mood(&report);
        Ok(report)
    }

    /// `duration_minutes` is the raw text the player typed.
    pub fn add_task(
        &mut self,
        text: &str,
        duration_minutes: &str,
        now: DateTime<Utc>,
    ) -> GameResult<String> {
        self.tasks
            .add_task_from_input(&mut self.store, text, duration_minutes, now)
    }

    /// On-time completion pays out and helps the plant grow a little.
    pub fn complete_task(&mut self, id: &str, now: DateTime<Utc>) -> GameResult<Completion> {
        let outcome = self.tasks.complete_task(&mut self.store, id, now)?;
        if let Completion::OnTime { points } = outcome {
            self.economy.earn(&mut self.store, points);
            let report = self.environment.record_task_completion(&mut self.store);
            self.note_mood(&report);
        }
        Ok(outcome)
    }

    pub fn delete_task(&mut self, id: &str, now: DateTime<Utc>) -> GameResult<()> {
        self.tasks.delete_task(&mut self.store, id, now)?;
        Ok(())
    }

    /// Buys one item and applies what it does to the plant.
    pub fn purchase(
        &mut self,
        category: &str,
        item_id: &str,
        now: DateTime<Utc>,
    ) -> GameResult<Receipt> {
        let item = ShopItem::parse(category, item_id)?;
        let receipt = self.economy.purchase(&mut self.store, item)?;
        let report = match item {
            ShopItem::Bulb(bulb) => Some(self.environment.change_bulb(&mut self.store, bulb)),
            ShopItem::Soil(_) => Some(self.environment.replace_soil(&mut self.store)),
            ShopItem::RainCloud => Some(self.environment.water(&mut self.store, now)),
            ShopItem::Pot(_) => None,
        };
        if let Some(report) = report {
            self.note_mood(&report);
        }
        Ok(receipt)
    }

    /// Wipes every stored key and starts over.
    pub fn reset_game(&mut self, now: DateTime<Utc>) {
        if let Err(err) = self.store.clear() {
            warn!(%err, "failed to clear store");
        }
        self.environment = Environment::new(EnvironmentState::new(now));
        self.environment.save_all(&mut self.store);
        self.tasks = TaskEngine::new();
        self.tasks.save(&mut self.store);
        self.economy = Economy::default();
        self.economy.save_all(&mut self.store);
        self.last_mood = self.environment.evaluate_mood().mood;
        info!("game reset");
    }

    /// The 1-second cycle.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TaskEvent> {
        self.tasks.tick(&mut self.store, now)
    }

    /// The slow background cycle. Only recomputes mood; counters never decay.
    pub fn background_check(&mut self) -> MoodReport {
        let report = self.environment.evaluate_mood();
        self.note_mood(&report);
        report
    }

    fn note_mood(&mut self, report: &MoodReport) {
        if report.mood != self.last_mood {
            info!(
                from = ?self.last_mood,
                to = ?report.mood,
                status = %report.status,
                "mood changed"
            );
            self.last_mood = report.mood;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameError;
    use crate::model::PotKind;
    use crate::store::MemoryStore;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn game() -> Game<MemoryStore> {
        Game::load(MemoryStore::new(), t0(), Some(42))
    }

    #[test]
    fn fresh_game_defaults() {
        let g = game();
        assert_eq!(g.points(), 0);
        assert_eq!(g.evaluate_mood().mood, Mood::HappyBud);
        assert_eq!(g.environment().game_start, t0());
        assert!(g.store().get("gameStart").is_some());
    }

    #[test]
    fn unknown_bulb_is_rejected_without_effect() {
        let mut g = game();
        let err = g.change_bulb("halogen").unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
        assert_eq!(g.environment().sun_amount, 0);
    }

    #[test]
    fn bulb_purchase_installs_bulb() {
        let mut g = game();
        for text in ["dust leaves", "wipe pot"] {
            let id = g.add_task(text, "90", t0()).unwrap();
            g.complete_task(&id, t0() + ChronoDuration::minutes(30))
                .unwrap();
        }
        assert_eq!(g.points(), 40);

        g.purchase("bulbs", "led", t0()).unwrap();
        assert_eq!(g.points(), 15);
        assert_eq!(g.environment().selected_bulb, Bulb::Led);
        // +1 from each task, +3 from the bulb.
        assert_eq!(g.environment().sun_amount, 5);
    }

    #[test]
    fn soil_purchase_fixes_soil() {
        let mut g = game();
        for i in 0..3 {
            let id = g.add_task(&format!("chore {i}"), "5", t0()).unwrap();
            g.complete_task(&id, t0()).unwrap();
        }
        // Force bad soil by rolling until it fails.
        let mut tries = 0;
        while g.environment().soil_enjoyment {
            g.check_soil(t0());
            tries += 1;
            assert!(tries < 500, "soil never went bad");
        }

        g.purchase("soils", "loam", t0()).unwrap();
        assert!(g.environment().soil_enjoyment);
        assert_eq!(g.economy().state().selected_soil.as_str(), "loam");
    }

    #[test]
    fn pot_purchase_is_cosmetic() {
        let mut g = game();
        for text in ["sort seeds", "label jars"] {
            let id = g.add_task(text, "5", t0()).unwrap();
            g.complete_task(&id, t0()).unwrap();
        }
        let env_before = g.environment().clone();
        let mood_before = g.evaluate_mood();

        let receipt = g.purchase("pots", "terracotta", t0()).unwrap();
        assert_eq!(receipt.cost, 15);
        assert_eq!(g.points(), 5);
        assert_eq!(g.economy().state().selected_pot, Some(PotKind::Terracotta));
        assert_eq!(g.store().get("selectedPot").as_deref(), Some("terracotta"));

        assert_eq!(g.environment(), &env_before);
        assert_eq!(g.evaluate_mood(), mood_before);
    }

    #[test]
    fn rain_waters_the_plant() {
        let mut g = game();
        let id = g.add_task("mist", "5", t0()).unwrap();
        g.complete_task(&id, t0()).unwrap();

        let later = t0() + ChronoDuration::hours(2);
        g.purchase("weather", "rain", later).unwrap();
        // +1 from the task, +1 from the rain.
        assert_eq!(g.environment().water_amount, 2);
        assert_eq!(g.environment().last_watered, later);
        assert_eq!(g.economy().state().rain_cloud_price, 20);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut g = game();
        g.water(t0());
        let id = g.add_task("repot", "5", t0()).unwrap();
        g.complete_task(&id, t0()).unwrap();

        let later = t0() + ChronoDuration::days(1);
        g.reset_game(later);

        assert_eq!(g.points(), 0);
        assert_eq!(g.environment().water_amount, 0);
        assert_eq!(g.environment().game_start, later);
        assert!(g.tasks().is_empty());
        assert_eq!(g.store().get("points").as_deref(), Some("0"));
        assert_eq!(g.store().get("selectedPot"), None);
    }
}
