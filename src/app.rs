use crate::input::{collect_input_nonblocking, map_event_to_action, Action};
use crate::render::{draw_frame, Terminal};
use crate::Cli;
use chrono::Utc;
use plantbuddy::config::{load_settings, save_settings_atomic, Paths, Settings};
use plantbuddy::{Bulb, Completion, FileStore, Game, TaskEvent};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scene {
    Main,
    Shop,
    AddTask,
    Help,
    ConfirmReset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EditField {
    Text,
    Minutes,
}

/// Everything on screen that is not game state.
pub(crate) struct UiState {
    pub(crate) scene: Scene,
    pub(crate) selected_task: usize,
    pub(crate) shop_cursor: usize,
    pub(crate) edit_text: String,
    pub(crate) edit_minutes: String,
    pub(crate) edit_field: EditField,
    pub(crate) message: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            scene: Scene::Main,
            selected_task: 0,
            shop_cursor: 0,
            edit_text: String::new(),
            edit_minutes: String::new(),
            edit_field: EditField::Text,
            message: None,
        }
    }
}

pub(crate) struct App {
    settings: Settings,
    paths: Paths,
    game: Game<FileStore>,
    ui: UiState,
    term: Terminal,
    should_quit: bool,
}

impl App {
    fn init(cli: Cli, paths: Paths) -> anyhow::Result<Self> {
        let settings = load_settings(&paths.settings_path);
        let seed = cli.seed.or(settings.seed);

        let store = FileStore::open(&paths.save_path);
        info!(save = %store.path().display(), seeded = seed.is_some(), "opening save");
        let mut game = Game::load(store, Utc::now(), seed);
        if cli.reset {
            game.reset_game(Utc::now());
        }

        let term = Terminal::begin()?;

        Ok(Self {
            settings,
            paths,
            game,
            ui: UiState::default(),
            term,
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);
        let sim_step = Duration::from_millis(self.settings.tick_ms.max(100));
        let mood_every = Duration::from_secs(self.settings.mood_check_secs.max(1));

        let mut last_frame = Instant::now();
        let mut sim_accum = Duration::ZERO;
        let mut mood_check_at = Instant::now() + mood_every;

        while !self.should_quit {
            let _resized = self.term.resize_if_needed()?;

            let events = collect_input_nonblocking(frame_dt)?;
            for ev in events {
                if let Some(action) = map_event_to_action(self.ui.scene, ev) {
                    self.apply(action);
                    if self.should_quit {
                        break;
                    }
                }
            }

            // timer fixed-step
            let now = Instant::now();
            let real_dt = now.saturating_duration_since(last_frame);
            last_frame = now;
            sim_accum = sim_accum.saturating_add(real_dt);

            while sim_accum >= sim_step {
                let events = self.game.tick(Utc::now());
                self.announce(&events);
                sim_accum = sim_accum.saturating_sub(sim_step);
            }

            if Instant::now() >= mood_check_at {
                self.game.background_check();
                mood_check_at = Instant::now() + mood_every;
            }

            self.render_frame()?;

            spin_sleep(frame_dt, Instant::now());
        }

        self.term.end()?;
        save_settings_atomic(&self.paths.settings_path, &self.settings)?;
        info!("=== plantbuddy shutdown ===");
        Ok(())
    }

    fn apply(&mut self, action: Action) {
        let now = Utc::now();
        let name = self.settings.plant_name.clone();
        match action {
            Action::Quit => self.should_quit = true,
            Action::Water => {
                let report = self.game.water(now);
                self.say(format!("You water {name}. {name} is {}.", report.status));
            }
            Action::CheckSoil => {
                let report = self.game.check_soil(now);
                let verdict = if self.game.environment().soil_enjoyment {
                    "likes"
                } else {
                    "does not like"
                };
                self.say(format!("{name} {verdict} the soil ({}).", report.status));
            }
            Action::NextBulb => {
                let current = self.game.environment().selected_bulb;
                let pos = Bulb::ALL.iter().position(|b| *b == current).unwrap_or(0);
                let next = Bulb::ALL[(pos + 1) % Bulb::ALL.len()];
                match self.game.change_bulb(next.as_str()) {
                    Ok(report) => self.say(format!("Bulb switched to {next}. {}", report.status)),
                    Err(err) => self.say(err.to_string()),
                }
            }
            Action::SelectTask(delta) => {
                let count = self.game.tasks().len();
                if count > 0 {
                    let cur = self.ui.selected_task as i32 + delta;
                    self.ui.selected_task = cur.clamp(0, count as i32 - 1) as usize;
                }
            }
            Action::CompleteSelected => {
                if let Some(id) = self.selected_task_id() {
                    match self.game.complete_task(&id, now) {
                        Ok(Completion::OnTime { points }) => {
                            self.say(format!("Nice work! +{points} points."))
                        }
                        Ok(Completion::AlreadyCompleted) => self.say("Already done."),
                        Ok(Completion::Expired) => {
                            self.say("Too late, the grace window has closed.")
                        }
                        Err(err) => self.say(err.to_string()),
                    }
                }
            }
            Action::DeleteSelected => {
                if let Some(id) = self.selected_task_id() {
                    match self.game.delete_task(&id, now) {
                        Ok(()) => {
                            self.say("Task removed.");
                            let count = self.game.tasks().len();
                            self.ui.selected_task =
                                self.ui.selected_task.min(count.saturating_sub(1));
                        }
                        Err(err) => self.say(err.to_string()),
                    }
                }
            }
            Action::AddTaskOpen => {
                self.ui.edit_text.clear();
                self.ui.edit_minutes.clear();
                self.ui.edit_field = EditField::Text;
                self.ui.scene = Scene::AddTask;
            }
            Action::EditChar(ch) => match self.ui.edit_field {
                EditField::Text => {
                    if self.ui.edit_text.chars().count() < 40 {
                        self.ui.edit_text.push(ch);
                    }
                }
                EditField::Minutes => {
                    if self.ui.edit_minutes.len() < 6 {
                        self.ui.edit_minutes.push(ch);
                    }
                }
            },
            Action::EditBackspace => {
                match self.ui.edit_field {
                    EditField::Text => self.ui.edit_text.pop(),
                    EditField::Minutes => self.ui.edit_minutes.pop(),
                };
            }
            Action::EditSwitchField => {
                self.ui.edit_field = match self.ui.edit_field {
                    EditField::Text => EditField::Minutes,
                    EditField::Minutes => EditField::Text,
                };
            }
            Action::EditCommit => {
                let text = self.ui.edit_text.trim().to_string();
                let minutes = self.ui.edit_minutes.clone();
                match self.game.add_task(&text, &minutes, now) {
                    Ok(_) => {
                        self.say(format!("Timer started: {text}"));
                        self.ui.scene = Scene::Main;
                    }
                    // Stay in the dialog so the input can be fixed.
                    Err(err) => self.say(err.to_string()),
                }
            }
            Action::ShopOpen => {
                self.ui.shop_cursor = 0;
                self.ui.scene = Scene::Shop;
            }
            Action::ShopMove(delta) => {
                let count = self.game.economy().catalogue().len() as i32;
                let cur = self.ui.shop_cursor as i32 + delta;
                self.ui.shop_cursor = cur.rem_euclid(count.max(1)) as usize;
            }
            Action::ShopBuy => {
                let catalogue = self.game.economy().catalogue();
                if let Some((item, _)) = catalogue.get(self.ui.shop_cursor).copied() {
                    match self
                        .game
                        .purchase(item.category().as_str(), item.id(), now)
                    {
                        Ok(receipt) => self.say(format!(
                            "Bought {} for {} points, {} left.",
                            receipt.item, receipt.cost, receipt.balance
                        )),
                        Err(err) => self.say(err.to_string()),
                    }
                }
            }
            Action::HelpToggle => self.ui.scene = Scene::Help,
            Action::ResetAsk => self.ui.scene = Scene::ConfirmReset,
            Action::ResetConfirm => {
                self.game.reset_game(now);
                self.ui = UiState::default();
                self.say(format!("A fresh start for {name}."));
            }
            Action::Back => self.ui.scene = Scene::Main,
        }
    }

    fn selected_task_id(&self) -> Option<String> {
        self.game
            .tasks()
            .list()
            .get(self.ui.selected_task)
            .map(|t| t.id.clone())
    }

    fn announce(&mut self, events: &[TaskEvent]) {
        for ev in events {
            let line = match ev {
                TaskEvent::EnteredGrace { id } => {
                    let text = self.task_text(id);
                    format!("Time's up for \"{text}\". 30 minutes left to check it off!")
                }
                TaskEvent::Expired { id } => {
                    let text = self.task_text(id);
                    format!("\"{text}\" expired.")
                }
            };
            self.say(line);
        }
    }

    fn task_text(&self, id: &str) -> String {
        match self.game.tasks().get(id) {
            Some(task) => task.text.clone(),
            None => {
                warn!(%id, "event for unknown task");
                id.to_string()
            }
        }
    }

    fn say(&mut self, msg: impl Into<String>) {
        self.ui.message = Some(msg.into());
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        self.term.cur.clear();
        draw_frame(
            &mut self.term.cur,
            &self.game,
            &self.ui,
            &self.settings,
            Utc::now(),
        );
        self.term.present()?;
        Ok(())
    }
}

pub(crate) fn run(cli: Cli, paths: Paths) -> anyhow::Result<()> {
    let mut app = App::init(cli, paths)?;
    app.run()?;
    Ok(())
}

fn spin_sleep(target: Duration, now: Instant) {
    let end = now + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
