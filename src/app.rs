use crate::audio::{AudioResource, NullAudioResource, RodioAudioResource};
use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::model::Route;
use crate::player::PlayerController;
use crate::ui;
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::cursor::Show;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use log::{error, info, warn};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::{Frame, Rect};
use std::io::{Stdout, stdout};
use std::rc::Rc;
use std::time::{Duration, Instant};

const VOLUME_STEP: f32 = 0.05;
const SCRUB_SECONDS: f64 = 5.0;

pub struct App {
    pub route: Route,
    pub cursor: usize,
    pub quit: bool,
    catalog: Rc<Catalog>,
    player: Option<PlayerController>,
    parked_audio: Option<Box<dyn AudioResource>>,
    area: Rect,
    dirty: bool,
}

impl App {
    pub fn new(catalog: Rc<Catalog>, audio: Box<dyn AudioResource>) -> Self {
        Self {
            route: Route::Landing,
            cursor: 0,
            quit: false,
            catalog,
            player: None,
            parked_audio: Some(audio),
            area: Rect::default(),
            dirty: true,
        }
    }

    pub fn player(&self) -> Option<&PlayerController> {
        self.player.as_ref()
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerController> {
        self.player.as_mut()
    }

    pub fn set_area(&mut self, area: Rect) {
        if self.area != area {
            self.area = area;
            self.dirty = true;
        }
    }

    /// Mounts a fresh player bound to the audio resource.
    pub fn open_player(&mut self) {
        if self.route == Route::Player {
            return;
        }
        let Some(audio) = self.parked_audio.take() else {
            error!("no audio resource available for the player page");
            return;
        };
        self.player = Some(PlayerController::new(self.catalog.clone(), audio));
        self.cursor = 0;
        self.navigate(Route::Player);
    }

    /// Unmounts the player; its resource is paused and parked.
    pub fn open_landing(&mut self) {
        if let Some(player) = self.player.take() {
            self.parked_audio = Some(player.into_resource());
        }
        self.navigate(Route::Landing);
    }

    pub fn tick(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.tick();
        }
    }

    pub fn take_dirty(&mut self) -> bool {
        let player_dirty = self
            .player
            .as_mut()
            .map(|player| std::mem::take(&mut player.dirty))
            .unwrap_or(false);
        std::mem::take(&mut self.dirty) || player_dirty
    }

    pub fn draw(&self, frame: &mut Frame) {
        match (&self.route, &self.player) {
            (Route::Player, Some(player)) => ui::draw_player(frame, player, self.cursor),
            _ => ui::draw_landing(frame, self.catalog.len()),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit = true;
            return;
        }

        match self.route {
            Route::Landing => match key.code {
                KeyCode::Enter => self.open_player(),
                KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
                _ => {}
            },
            Route::Player => self.handle_player_key(key.code),
        }
    }

    fn handle_player_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc | KeyCode::Backspace => {
                self.open_landing();
                return;
            }
            KeyCode::Char('q') => {
                self.quit = true;
                return;
            }
            KeyCode::Up => {
                self.cursor = self.cursor.saturating_sub(1);
                self.dirty = true;
                return;
            }
            KeyCode::Down => {
                self.cursor = (self.cursor + 1).min(self.catalog.len() - 1);
                self.dirty = true;
                return;
            }
            _ => {}
        }

        let cursor = self.cursor;
        let Some(player) = self.player.as_mut() else {
            return;
        };
        match code {
            KeyCode::Enter => player.select_track(cursor),
            KeyCode::Char(' ') => player.toggle_play_pause(),
            KeyCode::Char('n') => player.next_song(),
            KeyCode::Char('p') => player.prev_song(),
            KeyCode::Char('l') => player.toggle_loop(),
            KeyCode::Char('+') | KeyCode::Char('=') => player.nudge_volume(VOLUME_STEP),
            KeyCode::Char('-') => player.nudge_volume(-VOLUME_STEP),
            KeyCode::Left => player.scrub(-SCRUB_SECONDS),
            KeyCode::Right => player.scrub(SCRUB_SECONDS),
            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match self.route {
            Route::Landing => {
                let layout = ui::landing_layout(self.area);
                if matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left))
                    && ui::contains(layout.listen_now, mouse.column, mouse.row)
                {
                    self.open_player();
                }
            }
            Route::Player => self.handle_player_mouse(mouse),
        }
    }

    fn handle_player_mouse(&mut self, mouse: MouseEvent) {
        let layout = ui::player_layout(self.area);
        let (column, row) = (mouse.column, mouse.row);
        let inside_songs = ui::contains(layout.songs, column, row);

        match mouse.kind {
            MouseEventKind::ScrollDown if inside_songs => {
                self.cursor = (self.cursor + 1).min(self.catalog.len() - 1);
                self.dirty = true;
                return;
            }
            MouseEventKind::ScrollUp if inside_songs => {
                self.cursor = self.cursor.saturating_sub(1);
                self.dirty = true;
                return;
            }
            MouseEventKind::Down(MouseButton::Left) => {}
            _ => return,
        }

        let clicked_song = if inside_songs {
            ui::song_at(layout.songs, row, self.cursor).filter(|index| *index < self.catalog.len())
        } else {
            None
        };
        let Some(player) = self.player.as_mut() else {
            return;
        };

        if let Some(index) = clicked_song {
            self.cursor = index;
            player.select_track(index);
        } else if ui::contains(layout.prev, column, row) {
            player.prev_song();
        } else if ui::contains(layout.play, column, row) {
            player.toggle_play_pause();
        } else if ui::contains(layout.next, column, row) {
            player.next_song();
        } else if ui::contains(layout.loop_button, column, row) {
            player.toggle_loop();
        } else if ui::contains(layout.progress_bar, column, row) {
            player.seek(ui::fraction_at(layout.progress_bar, column));
        } else if ui::contains(layout.volume_bar, column, row) {
            player.set_volume(ui::fraction_at(layout.volume_bar, column) as f32);
        }
    }

    fn navigate(&mut self, route: Route) {
        info!("navigating to {}", route.path());
        self.route = route;
        self.dirty = true;
    }
}

pub fn open_audio(null_audio: bool) -> Box<dyn AudioResource> {
    if null_audio {
        info!("using null audio output");
        return Box::new(NullAudioResource::new());
    }
    match RodioAudioResource::new() {
        Ok(resource) => Box::new(resource),
        Err(err) => {
            warn!("falling back to null audio output: {err:#}");
            Box::new(NullAudioResource::new())
        }
    }
}

pub fn run(config: &AppConfig) -> Result<()> {
    let catalog = Rc::new(config.load_catalog()?);
    info!("loaded catalog with {} tracks", catalog.len());

    let mut app = App::new(catalog, open_audio(config.null_audio));
    if config.start_in_player {
        app.open_player();
    }

    enable_raw_mode()?;
    let result = with_cleanup(
        || {
            execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;
            let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
            terminal.clear()?;
            event_loop(&mut terminal, &mut app)
        },
        restore_terminal,
    );
    app.open_landing();
    info!("exiting");
    result
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let mut last_draw = Instant::now();

    loop {
        app.tick();

        if app.take_dirty() || last_draw.elapsed() > Duration::from_millis(250) {
            let area = terminal.draw(|frame| app.draw(frame))?.area;
            app.set_area(area);
            last_draw = Instant::now();
        }

        if app.quit {
            return Ok(());
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        match event::read()? {
            Event::Key(key) => app.handle_key(key),
            Event::Mouse(mouse) => app.handle_mouse(mouse),
            Event::Resize(..) => app.dirty = true,
            _ => {}
        }
    }
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen, DisableMouseCapture, Show)?;
    Ok(())
}

/// Runs `body`, then `cleanup` even if `body` failed. The body's error wins.
fn with_cleanup<T>(
    body: impl FnOnce() -> Result<T>,
    cleanup: impl FnOnce() -> Result<()>,
) -> Result<T> {
    let result = body();
    let cleaned = cleanup();
    let value = result?;
    cleaned?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::tests::catalog;

    const AREA: Rect = Rect {
        x: 0,
        y: 0,
        width: 100,
        height: 30,
    };

    fn app_with_duration(secs: u64) -> App {
        let audio = NullAudioResource::with_fixed_duration(Duration::from_secs(secs));
        let mut app = App::new(catalog(&["a", "b", "c"]), Box::new(audio));
        app.set_area(AREA);
        app
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn click(app: &mut App, rect: Rect, column: u16) {
        app.handle_mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row: rect.y,
            modifiers: KeyModifiers::NONE,
        });
    }

    fn center(rect: Rect) -> u16 {
        rect.x + rect.width / 2
    }

    #[test]
    fn enter_on_landing_opens_player() {
        let mut app = app_with_duration(200);
        assert_eq!(app.route, Route::Landing);
        assert!(app.player().is_none());

        press(&mut app, KeyCode::Enter);

        assert_eq!(app.route, Route::Player);
        let player = app.player().expect("player");
        assert_eq!(player.state().current_index, 0);
    }

    #[test]
    fn clicking_listen_now_opens_player() {
        let mut app = app_with_duration(200);
        let layout = ui::landing_layout(AREA);
        click(&mut app, layout.listen_now, center(layout.listen_now));
        assert_eq!(app.route, Route::Player);
    }

    #[test]
    fn leaving_player_discards_its_state() {
        let mut app = app_with_duration(200);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Char(' '));

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.route, Route::Landing);
        assert!(app.player().is_none());

        press(&mut app, KeyCode::Enter);
        let state = app.player().expect("player").state();
        assert_eq!(state.current_index, 0);
        assert!(!state.is_playing);
    }

    #[test]
    fn clicking_half_of_progress_bar_seeks_to_half_duration() {
        let mut app = app_with_duration(200);
        press(&mut app, KeyCode::Enter);
        app.tick();
        let bar = ui::player_layout(AREA).progress_bar;
        let column = center(bar);

        click(&mut app, bar, column);

        let expected = Duration::from_secs(200).mul_f64(ui::fraction_at(bar, column));
        let position = app.player().expect("player").state().position;
        assert_eq!(position, expected);
        assert!(position.abs_diff(Duration::from_secs(100)) < Duration::from_secs(3));
    }

    #[test]
    fn clicking_volume_bar_sets_volume() {
        let mut app = app_with_duration(200);
        press(&mut app, KeyCode::Enter);
        let bar = ui::player_layout(AREA).volume_bar;

        click(&mut app, bar, bar.x);
        assert_eq!(app.player().expect("player").state().volume, 0.0);
    }

    #[test]
    fn transport_buttons_drive_the_player() {
        let mut app = app_with_duration(200);
        press(&mut app, KeyCode::Enter);
        let layout = ui::player_layout(AREA);

        click(&mut app, layout.next, center(layout.next));
        assert_eq!(app.player().expect("player").state().current_index, 1);
        click(&mut app, layout.prev, center(layout.prev));
        click(&mut app, layout.prev, center(layout.prev));
        assert_eq!(app.player().expect("player").state().current_index, 2);
        click(&mut app, layout.play, center(layout.play));
        assert!(app.player().expect("player").state().is_playing);
        click(&mut app, layout.loop_button, center(layout.loop_button));
        assert!(app.player().expect("player").state().is_looping);
    }

    #[test]
    fn clicking_a_song_row_selects_it() {
        let mut app = app_with_duration(200);
        press(&mut app, KeyCode::Enter);
        let songs = ui::player_layout(AREA).songs;

        app.handle_mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: songs.x + 2,
            row: songs.y + 3,
            modifiers: KeyModifiers::NONE,
        });

        assert_eq!(app.cursor, 2);
        assert_eq!(app.player().expect("player").state().current_index, 2);
    }

    #[test]
    fn cursor_and_enter_select_track() {
        let mut app = app_with_duration(200);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.cursor, 2);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.player().expect("player").state().current_index, 2);
    }

    #[test]
    fn volume_keys_step_and_clamp() {
        let mut app = app_with_duration(200);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('+'));
        assert_eq!(app.player().expect("player").state().volume, 1.0);
        press(&mut app, KeyCode::Char('-'));
        let volume = app.player().expect("player").state().volume;
        assert!((volume - 0.95).abs() < 1e-6);
    }

    #[test]
    fn cleanup_runs_when_body_fails() {
        let cleaned = std::cell::Cell::new(false);

        let result: Result<()> = with_cleanup(
            || anyhow::bail!("draw failed"),
            || {
                cleaned.set(true);
                Ok(())
            },
        );

        assert!(cleaned.get());
        assert_eq!(result.expect_err("body error").to_string(), "draw failed");
    }

    #[test]
    fn cleanup_error_surfaces_after_success() {
        let result = with_cleanup(|| Ok(7), || anyhow::bail!("restore failed"));
        assert!(result.is_err());
        assert_eq!(with_cleanup(|| Ok(7), || Ok(())).expect("value"), 7);
    }

    #[test]
    fn ctrl_c_quits_from_any_route() {
        let mut app = app_with_duration(200);
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.quit);
    }
}
