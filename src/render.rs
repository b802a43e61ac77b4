use crate::app::{EditField, Scene, UiState};
use chrono::{DateTime, Local, Utc};
use crossterm::{
    cursor, execute, queue,
    style::{
        Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
    },
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use plantbuddy::config::Settings;
use plantbuddy::{Game, KeyValueStore, Mood, TaskPhase};
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
    pub(crate) bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
            bold: false,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        queue!(self.out, Clear(ClearType::All))?;
        Ok(true)
    }

    /// Writes only the cells that changed since the last frame.
    pub(crate) fn present(&mut self) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;
        let mut last_bold = false;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }
                if c.bold != last_bold {
                    let attr = if c.bold {
                        Attribute::Bold
                    } else {
                        Attribute::NormalIntensity
                    };
                    queue!(self.out, SetAttribute(attr))?;
                    last_bold = c.bold;
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(
            self.out,
            SetAttribute(Attribute::Reset),
            ResetColor,
            EndSynchronizedUpdate
        )?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bold: bool) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(
            xx,
            y,
            Cell {
                ch,
                fg,
                bg: Color::Black,
                bold,
            },
        );
    }
}

struct Palette {
    text: Color,
    dim: Color,
    accent: Color,
    good: Color,
    bad: Color,
}

impl Palette {
    fn new(color: bool) -> Self {
        if color {
            Self {
                text: Color::White,
                dim: Color::DarkGrey,
                accent: Color::Yellow,
                good: Color::Green,
                bad: Color::Red,
            }
        } else {
            Self {
                text: Color::White,
                dim: Color::White,
                accent: Color::White,
                good: Color::White,
                bad: Color::White,
            }
        }
    }
}

fn plant_art(mood: Mood) -> &'static [&'static str] {
    match mood {
        Mood::HappyBud => &["     ", "  o  ", " \\|/ ", "  |  ", "[___]"],
        Mood::HappySprout => &["  \\ /  ", " --o-- ", "  /|\\  ", " \\ | / ", " [___] "],
        Mood::HappyBloom => &[" @ * @ ", "\\ @|@ /", " \\\\|// ", "  \\|/  ", " [___] "],
        Mood::SadBud => &["     ", "  .  ", "  |  ", "  ,  ", "[___]"],
        Mood::SadSprout => &["       ", "  _o_  ", "  /|   ", "   |   ", " [___] "],
        Mood::SadBloom => &["       ", " .,o., ", " /.|.\\ ", "   |   ", " [___] "],
    }
}

pub(crate) fn draw_frame<S: KeyValueStore>(
    buf: &mut CellBuffer,
    game: &Game<S>,
    ui: &UiState,
    settings: &Settings,
    now: DateTime<Utc>,
) {
    let pal = Palette::new(settings.enable_color);
    let report = game.evaluate_mood();
    let env = game.environment();
    let eco = game.economy().state();

    let clock = now.with_timezone(&Local).format("%H:%M:%S");
    let title = format!(
        "{}  |  {:?}  |  {} pts  |  {}",
        settings.plant_name,
        report.mood,
        game.points(),
        clock
    );
    draw_text(buf, 1, 0, &title, pal.text, true);

    let mood_color = if report.mood.is_happy() {
        pal.good
    } else {
        pal.bad
    };
    let status = format!("{} is {}", settings.plant_name, report.status);
    draw_text(buf, 1, 2, &status, mood_color, false);
    draw_text(buf, 1, 3, &format!("image: {}", report.image), pal.dim, false);

    for (i, line) in plant_art(report.mood).iter().enumerate() {
        draw_text(buf, 4, 5 + i as u16, line, mood_color, false);
    }

    let stats = [
        format!("Water : {}", env.water_amount),
        format!("Sun   : {}", env.sun_amount),
        format!(
            "Soil  : {} ({})",
            if env.soil_enjoyment { "happy" } else { "unhappy" },
            eco.selected_soil.as_str()
        ),
        format!("Bulb  : {}", env.selected_bulb),
        format!(
            "Pot   : {}",
            eco.selected_pot.map(|p| p.as_str()).unwrap_or("plain")
        ),
    ];
    for (i, line) in stats.iter().enumerate() {
        draw_text(buf, 16, 5 + i as u16, line, pal.text, false);
    }

    let mut y = 11u16;
    for hint in game.care_hints(now) {
        draw_text(buf, 1, y, &format!("! {hint}"), pal.accent, false);
        y += 1;
    }

    y += 1;
    draw_text(buf, 1, y, "Tasks", pal.text, true);
    y += 1;
    let tasks = game.tasks().list();
    if tasks.is_empty() {
        draw_text(buf, 3, y, "(none, press t to add one)", pal.dim, false);
    }
    for (i, task) in tasks.iter().enumerate() {
        let phase = task.phase(now);
        let (mark, color) = match phase {
            TaskPhase::Running { .. } => ("[ ]", pal.text),
            TaskPhase::GraceWindow { .. } => ("[!]", pal.accent),
            TaskPhase::Completed => ("[x]", pal.good),
            TaskPhase::Expired => ("[-]", pal.dim),
        };
        let cursor = if i == ui.selected_task { ">" } else { " " };
        let line = format!("{cursor} {mark} {:<28} {}", task.text, task.countdown_label(now));
        draw_text(buf, 1, y, &line, color, i == ui.selected_task);
        y += 1;
    }

    if let Some(msg) = &ui.message {
        draw_text(buf, 1, buf.h.saturating_sub(2), msg, pal.accent, false);
    }

    let help = match ui.scene {
        Scene::Main => concat!(
            "Keys: w water | s soil | b bulb | t task | enter done | x delete",
            " | p shop | r reset | h help | q quit"
        ),
        Scene::Shop => "Shop: ↑↓ select | enter buy | esc back",
        Scene::AddTask => "New task: type | tab switch field | enter add | esc cancel",
        Scene::Help => "Help: esc back | q quit",
        Scene::ConfirmReset => "Reset: y confirm | any other key cancels",
    };
    draw_text(buf, 1, buf.h.saturating_sub(1), help, pal.dim, false);

    match ui.scene {
        Scene::Shop => draw_shop(buf, game, ui),
        Scene::AddTask => draw_add_task(buf, ui),
        Scene::Help => draw_center_box(
            buf,
            "How to play",
            "Keep Doug watered, lit and in good soil.\n\
             Three of each keeps him out of the sad states;\n\
             six grows a sprout, nine a bloom (with a proper bulb).\n\n\
             Tasks: finish before the timer, or within the\n\
             30 minute grace window after it, to earn points.\n\
             Hour-long tasks pay 20, shorter ones 10.\n\n\
             Spend points in the shop on bulbs, pots, soil and rain.\n\
             Rain gets 10 points dearer every time you buy it.",
        ),
        Scene::ConfirmReset => draw_center_box(
            buf,
            "Start over?",
            "This wipes Doug, your tasks and your points.\n\nPress y to confirm.",
        ),
        Scene::Main => {}
    }
}

fn draw_shop<S: KeyValueStore>(buf: &mut CellBuffer, game: &Game<S>, ui: &UiState) {
    let catalogue = game.economy().catalogue();
    let mut body = String::new();
    for (i, (item, cost)) in catalogue.iter().enumerate() {
        let cursor = if i == ui.shop_cursor { ">" } else { " " };
        let afford = if *cost <= game.points() { "" } else { "  (need more)" };
        body.push_str(&format!(
            "{cursor} {:<8} {:<12} {:>4} pts{afford}\n",
            item.category().as_str(),
            item.id(),
            cost
        ));
    }
    body.push_str(&format!("\nBalance: {} pts", game.points()));
    draw_center_box(buf, "Shop", &body);
}

fn draw_add_task(buf: &mut CellBuffer, ui: &UiState) {
    let mark = |field: EditField| if ui.edit_field == field { "_" } else { "" };
    let body = format!(
        "Task:    {}{}\nMinutes: {}{}\n\nTab switches field, Enter adds the task.",
        ui.edit_text,
        mark(EditField::Text),
        ui.edit_minutes,
        mark(EditField::Minutes)
    );
    draw_center_box(buf, "New task", &body);
}

pub(crate) fn draw_center_box(buf: &mut CellBuffer, title: &str, body: &str) {
    let w = buf.w;
    let h = buf.h;

    let bw = 60.min(w.saturating_sub(4));
    let bh = 18.min(h.saturating_sub(4));
    if bw < 4 || bh < 4 {
        return;
    }

    let x0 = (w - bw) / 2;
    let y0 = (h - bh) / 2;

    let frame = |ch: char| Cell {
        ch,
        fg: Color::White,
        bg: Color::Black,
        bold: false,
    };

    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            buf.set(x, y, Cell::default());
        }
    }
    for x in x0..x0 + bw {
        buf.set(x, y0, frame('─'));
        buf.set(x, y0 + bh - 1, frame('─'));
    }
    for y in y0..y0 + bh {
        buf.set(x0, y, frame('│'));
        buf.set(x0 + bw - 1, y, frame('│'));
    }
    buf.set(x0, y0, frame('┌'));
    buf.set(x0 + bw - 1, y0, frame('┐'));
    buf.set(x0, y0 + bh - 1, frame('└'));
    buf.set(x0 + bw - 1, y0 + bh - 1, frame('┘'));

    draw_text(buf, x0 + 2, y0 + 1, title, Color::White, true);

    let mut yy = y0 + 3;
    for line in body.lines() {
        if yy >= y0 + bh - 1 {
            break;
        }
        let clipped: String = line.chars().take((bw - 4) as usize).collect();
        draw_text(buf, x0 + 2, yy, &clipped, Color::White, false);
        yy += 1;
    }
}
