pub mod options;

use std::io::{stdout, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

pub use options::TuiOptions;

use crate::puzzle::prelude::*;
use crate::tablebase::prelude::*;
use crate::utils::prelude::*;

/// The only board side the tablebase hint is built for; building a full table for
/// larger `N` is out of scope for an interactive session (§"Non-goals").
const HINT_SIZE: usize = 2;

enum Mode {
    Playing,
    PromptingSize(String),
}

/// Runs the interactive swipe loop until the player quits. Raw mode and the alternate
/// screen are always torn down before returning, even on error.
pub fn run(options: &TuiOptions) -> Result<()> {
    let mut game = AnySizeGame::new(options.size, options.p4)?;
    let hints = if options.size == HINT_SIZE { Some(build_hint_table(options.p4)?) } else { None };

    enable_raw_mode().context("enabling raw terminal mode")?;
    execute!(stdout(), EnterAlternateScreen, Hide).context("entering alternate screen")?;
    let result = event_loop(&mut game, hints.as_ref(), options);
    let _ = execute!(stdout(), Show, LeaveAlternateScreen);
    let _ = disable_raw_mode();
    result
}

fn build_hint_table(p4: f64) -> Result<TablebaseEngine<InMemoryStore>> {
    log::info!("tui: building the N={HINT_SIZE} hint tablebase");
    let mut engine = TablebaseEngine::new(InMemoryStore::new(), HINT_SIZE, p4)?;
    engine.init(None)?;
    Ok(engine)
}

fn event_loop(game: &mut AnySizeGame, hints: Option<&TablebaseEngine<InMemoryStore>>, options: &TuiOptions) -> Result<()> {
    let mut mode = Mode::Playing;
    render(game, hints, &mode)?;

    loop {
        if !event::poll(Duration::from_millis(250)).context("polling terminal events")? {
            continue;
        }
        let Event::Key(key) = event::read().context("reading terminal event")? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match &mut mode {
            Mode::Playing => match key.code {
                KeyCode::Char('w') | KeyCode::Char('W') | KeyCode::Up => apply_swipe(game, Direction::Up)?,
                KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Down => apply_swipe(game, Direction::Down)?,
                KeyCode::Char('a') | KeyCode::Char('A') | KeyCode::Left => apply_swipe(game, Direction::Left)?,
                KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Right => apply_swipe(game, Direction::Right)?,
                KeyCode::Char('n') | KeyCode::Char('N') => mode = Mode::PromptingSize(String::new()),
                KeyCode::Backspace | KeyCode::Esc => return Ok(()),
                other => log::debug!("tui: unhandled key in playing mode: {other:?}"),
            },
            Mode::PromptingSize(buffer) => match key.code {
                KeyCode::Char(c) if c.is_ascii_digit() && buffer.is_empty() => buffer.push(c),
                KeyCode::Enter => {
                    let size = buffer.parse().unwrap_or(4);
                    if AnySizeGame::is_valid_size(size) {
                        *game = AnySizeGame::new(size, options.p4)?;
                    } else {
                        log::warn!("tui: rejected invalid new-game size {size}");
                    }
                    mode = Mode::Playing;
                }
                KeyCode::Backspace if !buffer.is_empty() => {
                    buffer.pop();
                }
                KeyCode::Backspace | KeyCode::Esc => mode = Mode::Playing,
                other => log::debug!("tui: unhandled key in size prompt: {other:?}"),
            },
        }

        render(game, hints, &mode)?;
    }
}

fn apply_swipe(game: &mut AnySizeGame, dir: Direction) -> Result<()> {
    if game.is_game_over() {
        return Ok(());
    }
    game.swipe(dir)
}

fn render(game: &AnySizeGame, hints: Option<&TablebaseEngine<InMemoryStore>>, mode: &Mode) -> Result<()> {
    let mut out = stdout();
    queue!(out, MoveTo(0, 0), Clear(ClearType::All)).context("clearing terminal")?;
    write!(out, "{}", game.grid()).context("writing grid")?;
    writeln!(out, "score: {}", game.score()).context("writing score")?;

    if game.is_game_over() {
        writeln!(out, "game over").context("writing game-over banner")?;
    }

    if let Some(engine) = hints {
        let chance = engine.query(game.grid())?;
        if chance >= 0.0 {
            writeln!(out, "win chance: {chance:.3}").context("writing win chance")?;
            if let Some(best) = engine.best_move(game.grid())? {
                writeln!(out, "recommended move: {best}").context("writing recommended move")?;
            }
        }
    }

    match mode {
        Mode::Playing => {
            writeln!(out, "W/A/S/D or arrows to swipe, N for new game, backspace/esc to quit").ok();
        }
        Mode::PromptingSize(buffer) => {
            writeln!(out, "new game size (2-8, enter for default 4): {buffer}").ok();
        }
    }

    out.flush().context("flushing terminal output")?;
    Ok(())
}
