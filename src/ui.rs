use crate::player::PlayerController;
use ratatui::layout::Flex;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use std::time::Duration;

const APP_TITLE: &str = "trackdeck  ";
const BUTTON_WIDTH: u16 = 13;

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    looping: Color,
    selected_bg: Color,
    button_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    panel_alt_bg: Color::Rgb(24, 38, 58),
    border: Color::Rgb(69, 121, 176),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(149, 173, 204),
    accent: Color::Rgb(100, 160, 255),
    alert: Color::Rgb(249, 174, 88),
    looping: Color::Rgb(72, 187, 120),
    selected_bg: Color::Rgb(34, 55, 82),
    button_bg: Color::Rgb(45, 55, 72),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandingLayout {
    pub welcome: Rect,
    pub listen_now: Rect,
    pub total: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerLayout {
    pub header: Rect,
    pub songs: Rect,
    pub now_playing: Rect,
    pub prev: Rect,
    pub play: Rect,
    pub next: Rect,
    pub loop_button: Rect,
    pub progress_row: Rect,
    pub elapsed: Rect,
    pub progress_bar: Rect,
    pub total: Rect,
    pub volume_row: Rect,
    pub volume_caption: Rect,
    pub volume_bar: Rect,
    pub volume_label: Rect,
    pub footer: Rect,
}

pub fn landing_layout(area: Rect) -> LandingLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let listen_now = Layout::horizontal([Constraint::Length(15)])
        .flex(Flex::Center)
        .split(vertical[2])[0];

    LandingLayout {
        welcome: vertical[1],
        listen_now,
        total: vertical[4],
    }
}

pub fn player_layout(area: Rect) -> PlayerLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(vertical[1]);

    let buttons = Layout::horizontal([Constraint::Length(BUTTON_WIDTH); 4])
        .flex(Flex::Center)
        .spacing(2)
        .split(vertical[2]);

    let progress_inner = bordered_inner(vertical[3]);
    let progress = Layout::horizontal([
        Constraint::Length(6),
        Constraint::Min(4),
        Constraint::Length(6),
    ])
    .split(progress_inner);

    let volume_inner = bordered_inner(vertical[4]);
    let volume = Layout::horizontal([
        Constraint::Length(5),
        Constraint::Min(4),
        Constraint::Length(6),
    ])
    .split(volume_inner);

    PlayerLayout {
        header: vertical[0],
        songs: body[0],
        now_playing: body[1],
        prev: buttons[0],
        play: buttons[1],
        next: buttons[2],
        loop_button: buttons[3],
        progress_row: vertical[3],
        elapsed: progress[0],
        progress_bar: padded(progress[1]),
        total: progress[2],
        volume_row: vertical[4],
        volume_caption: volume[0],
        volume_bar: padded(volume[1]),
        volume_label: volume[2],
        footer: vertical[5],
    }
}

pub fn contains(rect: Rect, column: u16, row: u16) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    column >= rect.x
        && column < rect.x.saturating_add(rect.width)
        && row >= rect.y
        && row < rect.y.saturating_add(rect.height)
}

/// Horizontal click offset inside `bar` as a fraction of its width.
pub fn fraction_at(bar: Rect, column: u16) -> f64 {
    if bar.width == 0 {
        return 0.0;
    }
    let offset = column.saturating_sub(bar.x);
    (f64::from(offset) / f64::from(bar.width)).clamp(0.0, 1.0)
}

/// First visible row of the song list so that `cursor` stays on screen.
pub fn song_list_offset(songs: Rect, cursor: usize) -> usize {
    let visible = usize::from(songs.height.saturating_sub(2)).max(1);
    cursor.saturating_sub(visible - 1)
}

pub fn song_at(songs: Rect, row: u16, cursor: usize) -> Option<usize> {
    let inner = bordered_inner(songs);
    if row < inner.y || row >= inner.y.saturating_add(inner.height) {
        return None;
    }
    Some(song_list_offset(songs, cursor) + usize::from(row - inner.y))
}

pub fn draw_landing(frame: &mut Frame, track_count: usize) {
    let colors = PALETTE;
    let layout = landing_layout(frame.area());
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.panel_bg)),
        frame.area(),
    );

    let welcome = Paragraph::new(Line::from(Span::styled(
        "Welcome to trackdeck, a small player for the tracks in your catalog",
        Style::default().fg(colors.text),
    )))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(welcome, layout.welcome);

    let listen = Paragraph::new(Span::styled(
        "Listen Now",
        Style::default()
            .fg(colors.accent)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    ))
    .alignment(Alignment::Center);
    frame.render_widget(listen, layout.listen_now);

    let total = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" Total songs: {track_count}"),
            Style::default().fg(colors.muted),
        ),
        Span::styled(
            "   Enter listen, q quit",
            Style::default().fg(colors.muted),
        ),
    ]));
    frame.render_widget(total, layout.total);
}

pub fn draw_player(frame: &mut Frame, controller: &PlayerController, cursor: usize) {
    let colors = PALETTE;
    let layout = player_layout(frame.area());
    let state = controller.state();
    let track = controller.current_track();

    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Track {}/{}", state.current_index + 1, controller.catalog().len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(controller.output_name(), Style::default().fg(colors.alert)),
    ]))
    .block(panel_block("Status", colors.panel_bg, colors));
    frame.render_widget(header, layout.header);

    let items: Vec<ListItem> = controller
        .catalog()
        .tracks()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let marker = if index == state.current_index {
                if state.is_playing { "  > " } else { "  = " }
            } else {
                "    "
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(entry.name.as_str(), Style::default().fg(colors.text)),
                Span::styled(
                    format!("  {}", entry.artist),
                    Style::default().fg(colors.muted),
                ),
            ]))
        })
        .collect();
    let mut list_state = ListState::default()
        .with_offset(song_list_offset(layout.songs, cursor))
        .with_selected(Some(cursor));
    let list = List::new(items)
        .block(panel_block("Songs", colors.panel_bg, colors))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, layout.songs, &mut list_state);

    let info = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Now playing: ", Style::default().fg(colors.text)),
            Span::styled(
                track.name.as_str(),
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("by ", Style::default().fg(colors.text)),
            Span::styled(track.artist.as_str(), Style::default().fg(colors.accent)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            track.audio_url.as_str(),
            Style::default().fg(colors.muted),
        )),
    ])
    .block(panel_block("Now Playing", colors.panel_alt_bg, colors))
    .wrap(Wrap { trim: true });
    frame.render_widget(info, layout.now_playing);

    let play_label = if state.is_playing { "Pause" } else { "Play" };
    let (loop_label, loop_bg) = if state.is_looping {
        ("Looping", colors.looping)
    } else {
        ("Loop", colors.button_bg)
    };
    render_button(frame, layout.prev, "Prev", colors.button_bg, colors);
    render_button(frame, layout.play, play_label, colors.accent, colors);
    render_button(frame, layout.next, "Next", colors.button_bg, colors);
    render_button(frame, layout.loop_button, loop_label, loop_bg, colors);

    frame.render_widget(
        panel_block("Progress", colors.panel_bg, colors),
        layout.progress_row,
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            format_duration(state.position),
            Style::default().fg(colors.muted),
        )),
        layout.elapsed,
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            bar_line(state.progress_ratio(), usize::from(layout.progress_bar.width)),
            Style::default().fg(colors.accent),
        )),
        layout.progress_bar,
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            state
                .duration
                .map(format_duration)
                .unwrap_or_else(|| String::from("--:--")),
            Style::default().fg(colors.muted),
        ))
        .alignment(Alignment::Right),
        layout.total,
    );

    frame.render_widget(
        panel_block("Volume", colors.panel_bg, colors),
        layout.volume_row,
    );
    frame.render_widget(
        Paragraph::new(Span::styled("Vol", Style::default().fg(colors.muted))),
        layout.volume_caption,
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            bar_line(
                Some(f64::from(state.volume)),
                usize::from(layout.volume_bar.width),
            ),
            Style::default().fg(colors.looping),
        )),
        layout.volume_bar,
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            format!("{:>3}%", (state.volume * 100.0).round() as u16),
            Style::default().fg(colors.text),
        ))
        .alignment(Alignment::Right),
        layout.volume_label,
    );

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(
            "Keys: Space play/pause, n/p next/prev, l loop, +/- volume, Left/Right scrub, Esc back, q quit",
            Style::default().fg(colors.muted),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(controller.status.as_str(), Style::default().fg(colors.text)),
    ]))
    .block(panel_block("Message", colors.panel_bg, colors));
    frame.render_widget(footer, layout.footer);
}

fn render_button(frame: &mut Frame, area: Rect, label: &str, bg: Color, colors: Palette) {
    let button = Paragraph::new(Span::styled(
        label,
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.border))
            .style(Style::default().bg(bg)),
    );
    frame.render_widget(button, area);
}

fn panel_block(title: &str, bg: Color, colors: Palette) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(colors.border))
        .style(Style::default().bg(bg))
}

fn bordered_inner(area: Rect) -> Rect {
    area.inner(Margin {
        vertical: 1,
        horizontal: 1,
    })
}

fn padded(area: Rect) -> Rect {
    area.inner(Margin {
        vertical: 0,
        horizontal: 1,
    })
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

fn bar_line(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width * 3);
    bar.push_str(&"█".repeat(filled.min(width)));
    bar.push_str(&"─".repeat(width.saturating_sub(filled)));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudioResource;
    use crate::player::tests::catalog;
    use ratatui::backend::TestBackend;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn click_at_half_width_is_half_fraction() {
        let bar = Rect::new(10, 5, 100, 1);
        assert_eq!(fraction_at(bar, 60), 0.5);
        assert_eq!(fraction_at(bar, 0), 0.0);
        assert_eq!(fraction_at(bar, 500), 1.0);
        assert_eq!(fraction_at(Rect::new(0, 0, 0, 1), 3), 0.0);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_duration(Duration::from_secs(0)), "00:00");
        assert_eq!(format_duration(Duration::from_secs(200)), "03:20");
    }

    #[test]
    fn bar_line_fills_proportionally() {
        assert_eq!(bar_line(Some(0.5), 4), "██──");
        assert_eq!(bar_line(None, 3), "───");
        assert_eq!(bar_line(Some(2.0), 2), "██");
    }

    #[test]
    fn player_layout_regions_do_not_overlap() {
        let layout = player_layout(Rect::new(0, 0, 100, 30));
        assert!(layout.progress_bar.width > 0);
        assert!(layout.volume_bar.width > 0);
        assert!(layout.prev.x + layout.prev.width <= layout.play.x);
        assert!(layout.play.x + layout.play.width <= layout.next.x);
        assert!(layout.next.x + layout.next.width <= layout.loop_button.x);
        assert!(layout.progress_bar.y < layout.volume_bar.y);
        assert!(contains(layout.play, layout.play.x, layout.play.y));
        assert!(!contains(layout.play, layout.prev.x, layout.prev.y));
    }

    #[test]
    fn song_rows_map_to_indices() {
        let songs = Rect::new(0, 3, 40, 6);
        assert_eq!(song_at(songs, 3, 0), None);
        assert_eq!(song_at(songs, 4, 0), Some(0));
        assert_eq!(song_at(songs, 6, 0), Some(2));
        assert_eq!(song_at(songs, 4, 9), Some(6));
    }

    #[test]
    fn player_page_shows_now_playing() {
        let controller = crate::player::PlayerController::new(
            catalog(&["alpha", "beta"]),
            Box::new(NullAudioResource::new()),
        );
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("terminal");
        terminal
            .draw(|frame| draw_player(frame, &controller, 0))
            .expect("draw");

        let text = screen_text(&terminal);
        assert!(text.contains("Now playing: alpha"));
        assert!(text.contains("by alpha artist"));
        assert!(text.contains("Play"));
        assert!(text.contains("--:--"));
    }

    #[test]
    fn landing_page_shows_total_songs() {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).expect("terminal");
        terminal
            .draw(|frame| draw_landing(frame, 3))
            .expect("draw");

        let text = screen_text(&terminal);
        assert!(text.contains("Listen Now"));
        assert!(text.contains("Total songs: 3"));
    }
}
