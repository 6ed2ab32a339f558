pub mod options;

pub use options::ValidateOptions;

use crate::puzzle::prelude::*;
use crate::tablebase::prelude::*;
use crate::tablebase::store::sqlite::default_filename;
use crate::utils::prelude::*;

/// Builds the requested tablebase, then plays `options.games` Monte-Carlo games using
/// `best_move` as the policy, reporting the empirical win rate against `query(empty)`.
pub fn run(options: &ValidateOptions) -> Result<()> {
    let mut engine = build_engine(options)?;
    log::info!("validate: building N={} p4={} tablebase", options.size, options.p4);
    engine.init(None)?;

    let query_empty = engine.query(&Grid::new(options.size))?;
    let wins = play_games(&engine, options)?;
    let empirical = wins as f64 / options.games as f64;

    log::info!(
        "validate: N={} p4={} games={} empirical_win_rate={:.4} tablebase_query(empty)={:.4}",
        options.size,
        options.p4,
        options.games,
        empirical,
        query_empty
    );
    Ok(())
}

fn build_engine(options: &ValidateOptions) -> Result<TablebaseEngine<Box<dyn GraphStore>>> {
    let store: Box<dyn GraphStore> = match options.store.as_str() {
        "memory" => Box::new(InMemoryStore::new()),
        "sqlite" => {
            let path = options.path.clone().unwrap_or_else(|| default_filename(options.size, options.p4));
            Box::new(SqliteStore::open(&path, options.size)?)
        }
        other => return Err(anyhow!("unknown store backend {other:?}; expected \"memory\" or \"sqlite\"")),
    };
    TablebaseEngine::new(store, options.size, options.p4)
}

fn play_games(engine: &TablebaseEngine<Box<dyn GraphStore>>, options: &ValidateOptions) -> Result<u64> {
    let win = win_tile(options.size);
    let mut wins = 0u64;
    for _ in 0..options.games {
        let mut game = AnySizeGame::new(options.size, options.p4)?;
        while !game.is_game_over() {
            match engine.best_move(game.grid())? {
                Some(dir) => game.swipe(dir)?,
                None => break,
            }
        }
        if game.grid().has_tile(win) {
            wins += 1;
        }
    }
    Ok(wins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_store_backend() {
        let options = ValidateOptions { log_level: None, size: 2, p4: 0.1, games: 1, store: "postgres".into(), path: None };
        assert!(build_engine(&options).is_err());
    }

    #[test]
    fn plays_requested_number_of_games_without_panicking() {
        let options = ValidateOptions { log_level: None, size: 2, p4: 0.2, games: 5, store: "memory".into(), path: None };
        let mut engine = build_engine(&options).unwrap();
        engine.init(None).unwrap();
        let wins = play_games(&engine, &options).unwrap();
        assert!(wins <= options.games);
    }
}
