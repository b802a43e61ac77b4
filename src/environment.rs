use crate::model::{from_millis, to_millis, Bulb, Mood, SOIL_OK_PROBABILITY};
use crate::store::{read_or, write_through, KeyValueStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use tracing::debug;

pub(crate) const KEY_LAST_WATERED: &str = "lastWatered";
pub(crate) const KEY_LAST_SOIL_CHECK: &str = "lastSoilCheck";
pub(crate) const KEY_GAME_START: &str = "gameStart";
pub(crate) const KEY_WATER: &str = "waterAmount";
pub(crate) const KEY_SUN: &str = "sunAmount";
pub(crate) const KEY_SOIL: &str = "soilEnjoyment";
pub(crate) const KEY_BULB: &str = "selectedBulb";

const SAD_THRESHOLD: u32 = 3;
const SPROUT_THRESHOLD: u32 = 6;
const BLOOM_THRESHOLD: u32 = 9;

const THIRSTY_AFTER_HOURS: i64 = 6;
const SOIL_CHECK_DUE_DAYS: i64 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentState {
    pub water_amount: u32,
    pub sun_amount: u32,
    pub soil_enjoyment: bool,
    pub selected_bulb: Bulb,
    pub last_watered: DateTime<Utc>,
    pub last_soil_check: DateTime<Utc>,
    pub game_start: DateTime<Utc>,
}

impl EnvironmentState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            water_amount: 0,
            sun_amount: 0,
            soil_enjoyment: true,
            selected_bulb: Bulb::default(),
            last_watered: now,
            last_soil_check: now,
            game_start: now,
        }
    }

    pub fn mood_inputs(&self) -> MoodInputs {
        MoodInputs {
            water: self.water_amount,
            sun: self.sun_amount,
            soil_ok: self.soil_enjoyment,
            bulb: Some(self.selected_bulb),
        }
    }
}

/// The four values mood depends on. `bulb` is `None` for anything outside
/// the recognised set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoodInputs {
    pub water: u32,
    pub sun: u32,
    pub soil_ok: bool,
    pub bulb: Option<Bulb>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoodReport {
    pub mood: Mood,
    pub image: String,
    pub status: String,
}

fn is_correct_bulb(bulb: Option<Bulb>) -> bool {
    matches!(
        bulb,
        Some(Bulb::Fluorescent) | Some(Bulb::Led) | Some(Bulb::Ultraviolet)
    )
}

/// Classifies the plant. First matching rule wins. The sad rules come first;
/// among the growth rules the bloom threshold is tested before the sprout
/// threshold it contains, otherwise bloom could never be reached.
pub fn classify_mood(inp: MoodInputs) -> Mood {
    let thirsty = inp.water < SAD_THRESHOLD;
    let dim = inp.sun < SAD_THRESHOLD;
    let thriving = inp.soil_ok && is_correct_bulb(inp.bulb);

    if thirsty && !dim && inp.soil_ok {
        return Mood::SadBud;
    }
    if !thirsty && dim && inp.soil_ok {
        return Mood::SadSprout;
    }
    if !thirsty && !dim && !inp.soil_ok {
        return Mood::SadBloom;
    }
    if thriving && inp.water >= BLOOM_THRESHOLD && inp.sun >= BLOOM_THRESHOLD {
        return Mood::HappyBloom;
    }
    if thriving && inp.water >= SPROUT_THRESHOLD && inp.sun >= SPROUT_THRESHOLD {
        return Mood::HappySprout;
    }
    Mood::HappyBud
}

pub fn evaluate_mood(inp: MoodInputs) -> MoodReport {
    let mood = classify_mood(inp);

    let mut qualifiers = Vec::new();
    if inp.water < SAD_THRESHOLD {
        qualifiers.push("needs more water");
    }
    if inp.sun < SAD_THRESHOLD {
        qualifiers.push("needs more sunlight");
    }
    if !inp.soil_ok {
        qualifiers.push("dislikes soil");
    }

    let feeling = if mood.is_happy() { "happy" } else { "sad" };
    let status = if qualifiers.is_empty() {
        feeling.to_string()
    } else {
        format!("{feeling}, {}", qualifiers.join(", "))
    };

    MoodReport {
        mood,
        image: mood.image().to_string(),
        status,
    }
}

fn read_time(store: &dyn KeyValueStore, key: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let ms = read_or(store, key, to_millis(now));
    from_millis(ms).unwrap_or(now)
}

/// Owns the plant's counters and writes every change through to the store.
#[derive(Clone, Debug)]
pub struct Environment {
    state: EnvironmentState,
}

impl Environment {
    pub fn new(state: EnvironmentState) -> Self {
        Self { state }
    }

    /// Rebuilds from stored keys. Missing or corrupt values take their
    /// defaults; a fresh game also records its start timestamps.
    pub fn load(store: &mut dyn KeyValueStore, now: DateTime<Utc>) -> Self {
        let defaults = EnvironmentState::new(now);
        let fresh = store.get(KEY_GAME_START).is_none();

        let state = EnvironmentState {
            water_amount: read_or(store, KEY_WATER, defaults.water_amount),
            sun_amount: read_or(store, KEY_SUN, defaults.sun_amount),
            soil_enjoyment: read_or(store, KEY_SOIL, defaults.soil_enjoyment),
            selected_bulb: read_or(store, KEY_BULB, defaults.selected_bulb),
            last_watered: read_time(store, KEY_LAST_WATERED, now),
            last_soil_check: read_time(store, KEY_LAST_SOIL_CHECK, now),
            game_start: read_time(store, KEY_GAME_START, now),
        };

        let env = Self { state };
        if fresh {
            env.save_all(store);
        }
        env
    }

    pub fn state(&self) -> &EnvironmentState {
        &self.state
    }

    pub fn save_all(&self, store: &mut dyn KeyValueStore) {
        let st = &self.state;
        write_through(store, KEY_WATER, st.water_amount);
        write_through(store, KEY_SUN, st.sun_amount);
        write_through(store, KEY_SOIL, st.soil_enjoyment);
        write_through(store, KEY_BULB, st.selected_bulb);
        write_through(store, KEY_LAST_WATERED, to_millis(st.last_watered));
        write_through(store, KEY_LAST_SOIL_CHECK, to_millis(st.last_soil_check));
        write_through(store, KEY_GAME_START, to_millis(st.game_start));
    }

    pub fn water(&mut self, store: &mut dyn KeyValueStore, now: DateTime<Utc>) -> MoodReport {
        self.state.last_watered = now;
        self.state.water_amount = self.state.water_amount.saturating_add(1);
        write_through(store, KEY_LAST_WATERED, to_millis(now));
        write_through(store, KEY_WATER, self.state.water_amount);
        debug!(water = self.state.water_amount, "watered");
        self.evaluate_mood()
    }

    /// Soil stays good with probability 0.8 regardless of its previous state.
    pub fn check_soil<R: Rng>(
        &mut self,
        store: &mut dyn KeyValueStore,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> MoodReport {
        self.state.last_soil_check = now;
        self.state.soil_enjoyment = rng.gen_bool(SOIL_OK_PROBABILITY);
        write_through(store, KEY_LAST_SOIL_CHECK, to_millis(now));
        write_through(store, KEY_SOIL, self.state.soil_enjoyment);
        debug!(soil_ok = self.state.soil_enjoyment, "soil checked");
        self.evaluate_mood()
    }

    pub fn change_bulb(&mut self, store: &mut dyn KeyValueStore, bulb: Bulb) -> MoodReport {
        self.state.selected_bulb = bulb;
        self.state.sun_amount = self.state.sun_amount.saturating_add(bulb.sun_bonus());
        write_through(store, KEY_BULB, bulb);
        write_through(store, KEY_SUN, self.state.sun_amount);
        debug!(%bulb, sun = self.state.sun_amount, "bulb changed");
        self.evaluate_mood()
    }

    /// Fresh soil always pleases the plant.
    pub fn replace_soil(&mut self, store: &mut dyn KeyValueStore) -> MoodReport {
        self.state.soil_enjoyment = true;
        write_through(store, KEY_SOIL, true);
        self.evaluate_mood()
    }

    /// An on-time task nudges both water and sun up by one.
    pub fn record_task_completion(&mut self, store: &mut dyn KeyValueStore) -> MoodReport {
        self.state.water_amount = self.state.water_amount.saturating_add(1);
        self.state.sun_amount = self.state.sun_amount.saturating_add(1);
        write_through(store, KEY_WATER, self.state.water_amount);
        write_through(store, KEY_SUN, self.state.sun_amount);
        self.evaluate_mood()
    }

    pub fn evaluate_mood(&self) -> MoodReport {
        evaluate_mood(self.state.mood_inputs())
    }

    /// Reminders based on elapsed time. These never change the counters.
    pub fn care_hints(&self, now: DateTime<Utc>) -> Vec<String> {
        let st = &self.state;
        let mut hints = Vec::new();
        if now - st.last_watered >= ChronoDuration::hours(THIRSTY_AFTER_HOURS) {
            hints.push("Doug is thirsty! Water him to keep him alive.".to_string());
        }
        if st.sun_amount == 0 && st.water_amount > 0 {
            hints.push("Doug needs sunlight! Turn on a lamp.".to_string());
        }
        if now - st.last_soil_check >= ChronoDuration::days(SOIL_CHECK_DUE_DAYS) {
            hints.push("Doug needs new soil! Please check his soil condition.".to_string());
        }
        hints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn inputs(water: u32, sun: u32, soil_ok: bool, bulb: Option<Bulb>) -> MoodInputs {
        MoodInputs {
            water,
            sun,
            soil_ok,
            bulb,
        }
    }

    #[test]
    fn documented_mood_scenarios() {
        let led = Some(Bulb::Led);
        assert_eq!(classify_mood(inputs(2, 4, true, led)), Mood::SadBud);
        assert_eq!(classify_mood(inputs(4, 2, true, led)), Mood::SadSprout);
        assert_eq!(classify_mood(inputs(4, 4, false, led)), Mood::SadBloom);
        assert_eq!(classify_mood(inputs(6, 6, true, led)), Mood::HappySprout);
        assert_eq!(
            classify_mood(inputs(9, 9, true, Some(Bulb::Ultraviolet))),
            Mood::HappyBloom
        );
        assert_eq!(classify_mood(inputs(0, 0, true, led)), Mood::HappyBud);
    }

    #[test]
    fn growth_needs_both_counters() {
        let uv = Some(Bulb::Ultraviolet);
        assert_eq!(classify_mood(inputs(9, 8, true, uv)), Mood::HappySprout);
        assert_eq!(classify_mood(inputs(20, 30, true, uv)), Mood::HappyBloom);
        assert_eq!(classify_mood(inputs(5, 40, true, uv)), Mood::HappyBud);
    }

    #[test]
    fn unrecognised_bulb_blocks_growth() {
        assert_eq!(classify_mood(inputs(6, 6, true, None)), Mood::HappyBud);
        assert_eq!(classify_mood(inputs(9, 9, true, None)), Mood::HappyBud);
        // Sad rules do not look at the bulb.
        assert_eq!(classify_mood(inputs(2, 4, true, None)), Mood::SadBud);
    }

    #[test]
    fn bad_soil_with_low_counters_is_default() {
        assert_eq!(classify_mood(inputs(0, 0, false, Some(Bulb::Led))), Mood::HappyBud);
        assert_eq!(classify_mood(inputs(1, 5, false, Some(Bulb::Led))), Mood::HappyBud);
    }

    #[test]
    fn classification_is_deterministic() {
        for water in 0..12 {
            for sun in 0..12 {
                for soil_ok in [true, false] {
                    for bulb in [None, Some(Bulb::Fluorescent), Some(Bulb::Ultraviolet)] {
                        let inp = inputs(water, sun, soil_ok, bulb);
                        assert_eq!(evaluate_mood(inp), evaluate_mood(inp));
                    }
                }
            }
        }
    }

    #[test]
    fn status_lists_every_problem() {
        let report = evaluate_mood(inputs(0, 0, false, Some(Bulb::Led)));
        assert_eq!(
            report.status,
            "happy, needs more water, needs more sunlight, dislikes soil"
        );

        let report = evaluate_mood(inputs(2, 4, true, Some(Bulb::Led)));
        assert_eq!(report.status, "sad, needs more water");
        assert_eq!(report.image, "sad-bud.gif");

        let report = evaluate_mood(inputs(6, 6, true, Some(Bulb::Led)));
        assert_eq!(report.status, "happy");
    }

    #[test]
    fn water_increments_and_persists() {
        let mut store = MemoryStore::new();
        let mut env = Environment::load(&mut store, t0());
        let later = t0() + ChronoDuration::minutes(5);

        env.water(&mut store, later);
        env.water(&mut store, later);

        assert_eq!(env.state().water_amount, 2);
        assert_eq!(store.get(KEY_WATER).as_deref(), Some("2"));
        assert_eq!(
            store.get(KEY_LAST_WATERED),
            Some(to_millis(later).to_string())
        );
    }

    #[test]
    fn bulb_bonus_accumulates() {
        let mut store = MemoryStore::new();
        let mut env = Environment::load(&mut store, t0());

        env.change_bulb(&mut store, Bulb::Fluorescent);
        env.change_bulb(&mut store, Bulb::Led);
        env.change_bulb(&mut store, Bulb::Ultraviolet);

        assert_eq!(env.state().sun_amount, 9);
        assert_eq!(env.state().selected_bulb, Bulb::Ultraviolet);
        assert_eq!(store.get(KEY_BULB).as_deref(), Some("ultraviolet"));
        assert_eq!(store.get(KEY_SUN).as_deref(), Some("9"));
    }

    #[test]
    fn soil_check_persists_time_and_verdict() {
        let mut store = MemoryStore::new();
        let mut env = Environment::load(&mut store, t0());
        let mut rng = StdRng::seed_from_u64(11);
        let later = t0() + ChronoDuration::days(3);

        env.check_soil(&mut store, &mut rng, later);

        assert_eq!(env.state().last_soil_check, later);
        assert_eq!(
            store.get(KEY_LAST_SOIL_CHECK),
            Some(to_millis(later).to_string())
        );
        assert_eq!(
            store.get(KEY_SOIL),
            Some(env.state().soil_enjoyment.to_string())
        );
        assert!(env.care_hints(later).iter().all(|h| !h.contains("soil")));
    }

    #[test]
    fn soil_check_is_roughly_eighty_percent() {
        let mut store = MemoryStore::new();
        let mut env = Environment::load(&mut store, t0());
        let mut rng = StdRng::seed_from_u64(7);

        let trials = 4000;
        let mut good = 0;
        for _ in 0..trials {
            env.check_soil(&mut store, &mut rng, t0());
            if env.state().soil_enjoyment {
                good += 1;
            }
        }
        let ratio = good as f64 / trials as f64;
        assert!((0.75..=0.85).contains(&ratio), "ratio was {ratio}");
    }

    #[test]
    fn load_restores_saved_counters() {
        let mut store = MemoryStore::new();
        let mut env = Environment::load(&mut store, t0());
        env.water(&mut store, t0());
        env.change_bulb(&mut store, Bulb::Led);
        env.replace_soil(&mut store);

        let reloaded = Environment::load(&mut store, t0() + ChronoDuration::days(3));
        assert_eq!(reloaded.state(), env.state());
        assert_eq!(reloaded.evaluate_mood(), env.evaluate_mood());
    }

    #[test]
    fn corrupt_keys_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set(KEY_GAME_START, "1700000000000").unwrap();
        store.set(KEY_WATER, "NaN").unwrap();
        store.set(KEY_SOIL, "yes").unwrap();
        store.set(KEY_BULB, "halogen").unwrap();

        let env = Environment::load(&mut store, t0());
        assert_eq!(env.state().water_amount, 0);
        assert!(env.state().soil_enjoyment);
        assert_eq!(env.state().selected_bulb, Bulb::Fluorescent);
    }

    #[test]
    fn hints_do_not_touch_counters() {
        let mut store = MemoryStore::new();
        let mut env = Environment::load(&mut store, t0());
        env.water(&mut store, t0());
        let before = env.state().clone();

        let hints = env.care_hints(t0() + ChronoDuration::days(3));
        assert_eq!(hints.len(), 3);
        assert_eq!(env.state(), &before);

        assert!(env.care_hints(t0() + ChronoDuration::hours(1)).len() == 1);
    }
}
