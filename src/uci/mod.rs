//! UCI protocol handling: the line loop and session state machine.
//!
//! One session per protocol connection. The session owns the base
//! position and move history set by `position`, and lazily builds the
//! search controller the first time a command needs one. Malformed
//! input is swallowed; the loop must survive anything the peer sends.

pub mod command;
mod output;

pub use command::{parse_setoption, parse_uci_command, UciCommand};
pub use output::UciOut;

use std::io::{self, BufRead};
use std::str::FromStr;

use crate::board::Board;
use crate::engine::{self, SearchController, SearchRequest};
use crate::{ENGINE_AUTHOR, ENGINE_NAME};

pub struct UciSession {
    out: UciOut,
    /// Base position from the last `position` command; moves are kept
    /// separately and replayed when a search starts.
    pos: Option<Board>,
    moves: Vec<crate::board::Move>,
    engine: Option<SearchController>,
    quit: bool,
}

impl UciSession {
    #[must_use]
    pub fn new(out: UciOut) -> Self {
        UciSession {
            out,
            pos: None,
            moves: Vec::new(),
            engine: None,
            quit: false,
        }
    }

    /// True once `quit` has been processed.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.quit
    }

    /// Read and handle lines until `quit` or end of input.
    pub fn run<R: BufRead>(&mut self, input: R) {
        for line in input.lines() {
            let Ok(line) = line else { break };
            self.handle_line(&line);
            if self.quit {
                break;
            }
        }
    }

    /// Process one protocol line.
    pub fn handle_line(&mut self, line: &str) {
        let Some(cmd) = parse_uci_command(line) else {
            return;
        };
        match cmd {
            UciCommand::Uci => {
                self.out.line(format_args!("id name {ENGINE_NAME}"));
                self.out.line(format_args!("id author {ENGINE_AUTHOR}"));
                // Current parameter values are advertised if the engine
                // exists; otherwise the defaults.
                match &self.engine {
                    Some(engine) => engine::write_options(&self.out, engine.params()),
                    None => engine::write_options(&self.out, &engine::Params::new()),
                }
                self.out.line(format_args!("uciok"));
            }
            UciCommand::IsReady => {
                self.ensure_engine();
                self.out.line(format_args!("readyok"));
            }
            UciCommand::SetOption(parts) => {
                self.ensure_engine();
                if let Some((name, value)) = parse_setoption(&parts) {
                    if let Some(engine) = self.engine.as_mut() {
                        engine.set_option(&name, &value);
                    }
                }
            }
            UciCommand::UciNewGame => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.new_game();
                }
            }
            UciCommand::Position(parts) => self.cmd_position(&parts),
            UciCommand::Go(parts) => self.cmd_go(&parts),
            UciCommand::Stop => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.stop_search();
                }
            }
            UciCommand::PonderHit => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.ponder_hit();
                }
            }
            UciCommand::Quit => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.stop_search();
                }
                self.quit = true;
            }
            UciCommand::Unknown(text) => {
                log::debug!("ignoring unknown command '{text}'");
            }
        }
    }

    fn ensure_engine(&mut self) -> &mut SearchController {
        let out = self.out.clone();
        self.engine
            .get_or_insert_with(|| SearchController::new(out))
    }

    /// `position (startpos | fen <fen>) [moves ...]`.
    ///
    /// An unparseable FEN keeps the previous position; move replay stops
    /// quietly at the first bad token.
    fn cmd_position(&mut self, parts: &[String]) {
        let mut idx = 1;
        let base = match parts.get(idx).map(String::as_str) {
            Some("startpos") => {
                idx += 1;
                Board::new()
            }
            Some("fen") => {
                idx += 1;
                let mut fen_parts: Vec<&str> = Vec::new();
                while idx < parts.len() && parts[idx] != "moves" {
                    fen_parts.push(&parts[idx]);
                    idx += 1;
                }
                match Board::try_from_fen(&fen_parts.join(" ")) {
                    Ok(board) => board,
                    Err(err) => {
                        log::warn!("keeping previous position, bad FEN: {err}");
                        return;
                    }
                }
            }
            _ => return,
        };

        self.pos = Some(base.clone());
        self.moves.clear();

        if parts.get(idx).map(String::as_str) == Some("moves") {
            idx += 1;
            let mut scratch = base;
            while let Some(token) = parts.get(idx) {
                match scratch.parse_move(token) {
                    Ok(mv) => {
                        scratch.make_move(mv);
                        self.moves.push(mv);
                    }
                    Err(_) => break,
                }
                idx += 1;
            }
        }
    }

    /// `go [...]`: build an immutable request and hand it to the
    /// controller. A malformed numeric argument abandons the command.
    fn cmd_go(&mut self, parts: &[String]) {
        if self.pos.is_none() {
            self.pos = Some(Board::new());
        }
        let base = self
            .pos
            .clone()
            .unwrap_or_default();
        let moves = self.moves.clone();

        // searchmoves tokens are validated against the search root.
        let mut root = base.clone();
        for mv in &moves {
            root.make_move(*mv);
        }

        let Some((req, ponder)) = parse_go(parts, &root) else {
            log::debug!("ignoring malformed go command");
            return;
        };

        let engine = self.ensure_engine();
        if ponder {
            engine.start_ponder(&base, &moves, &req);
        } else {
            engine.start_search(&base, &moves, &req);
        }
    }
}

fn next_number<T: FromStr>(parts: &[String], idx: &mut usize) -> Option<T> {
    let value = parts.get(*idx)?.parse().ok()?;
    *idx += 1;
    Some(value)
}

/// Parse the `go` argument list. Returns the request and whether this
/// is a ponder start, or `None` when an argument fails to parse.
fn parse_go(parts: &[String], root: &Board) -> Option<(SearchRequest, bool)> {
    let mut req = SearchRequest::default();
    let mut ponder = false;
    let mut idx = 1;
    while idx < parts.len() {
        let sub = parts[idx].as_str();
        idx += 1;
        match sub {
            "searchmoves" => {
                while let Some(token) = parts.get(idx) {
                    match root.parse_move(token) {
                        Ok(mv) => {
                            req.search_moves.push(mv);
                            idx += 1;
                        }
                        Err(_) => break,
                    }
                }
            }
            "ponder" => ponder = true,
            "wtime" => req.wtime = next_number(parts, &mut idx)?,
            "btime" => req.btime = next_number(parts, &mut idx)?,
            "winc" => req.winc = next_number(parts, &mut idx)?,
            "binc" => req.binc = next_number(parts, &mut idx)?,
            "movestogo" => req.moves_to_go = next_number(parts, &mut idx)?,
            "depth" => req.depth = next_number(parts, &mut idx)?,
            "nodes" => req.nodes = next_number(parts, &mut idx)?,
            "mate" => req.mate = next_number(parts, &mut idx)?,
            "movetime" => req.move_time = next_number(parts, &mut idx)?,
            "infinite" => req.infinite = true,
            _ => {}
        }
    }
    Some((req, ponder))
}

/// Entry point: drive the protocol over stdin/stdout until `quit` or
/// end of input.
pub fn run_uci_loop() {
    let mut session = UciSession::new(UciOut::stdout());
    session.run(io::stdin().lock());
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn session() -> (UciSession, Sink) {
        let sink = Sink::default();
        let out = UciOut::new(Box::new(sink.clone()));
        (UciSession::new(out), sink)
    }

    fn text(sink: &Sink) -> String {
        String::from_utf8(sink.0.lock().clone()).unwrap()
    }

    fn wait_for_bestmove(sink: &Sink) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let output = text(sink);
            if output.contains("bestmove") {
                return output;
            }
            assert!(Instant::now() < deadline, "no bestmove in: {output}");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn uci_command_lists_identity_and_options() {
        let (mut session, sink) = session();
        session.handle_line("uci");
        let output = text(&sink);
        assert!(output.contains("id name"));
        assert!(output.contains("id author"));
        for option in [
            "option name Hash type spin",
            "option name OwnBook type check",
            "option name Ponder type check default true",
            "option name UCI_AnalyseMode type check",
            "option name UCI_EngineAbout type string",
            "option name Strength type spin default 1000 min 0 max 1000",
            "option name UCI_LimitStrength type check",
            "option name UCI_Elo type spin default 1500 min -625 max 2400",
            "option name maxNPS type spin",
            "option name BishopPairBonus type spin",
        ] {
            assert!(output.contains(option), "missing '{option}' in: {output}");
        }
        assert!(output.ends_with("uciok\n"));
        // `uci` must not build a controller.
        assert!(session.engine.is_none());
    }

    #[test]
    fn isready_builds_the_engine_and_replies() {
        let (mut session, sink) = session();
        session.handle_line("isready");
        assert!(session.engine.is_some());
        assert_eq!(text(&sink), "readyok\n");
    }

    #[test]
    fn position_startpos_with_moves() {
        let (mut session, _sink) = session();
        session.handle_line("position startpos moves e2e4 e7e5");
        assert_eq!(session.moves.len(), 2);
        assert!(session.pos.is_some());
    }

    #[test]
    fn position_stops_at_first_bad_move_token() {
        let (mut session, _sink) = session();
        session.handle_line("position startpos moves e2e4 zz9 e7e5");
        assert_eq!(session.moves.len(), 1);
    }

    #[test]
    fn bad_fen_keeps_previous_position() {
        let (mut session, _sink) = session();
        session.handle_line("position startpos moves e2e4");
        session.handle_line("position fen not a real fen at all");
        assert_eq!(session.moves.len(), 1);
        assert_eq!(session.pos.as_ref().unwrap(), &Board::new());
    }

    #[test]
    fn go_movetime_produces_info_and_one_bestmove() {
        let (mut session, sink) = session();
        session.handle_line("position startpos");
        session.handle_line("go movetime 100");
        let output = wait_for_bestmove(&sink);
        session.handle_line("quit");
        assert!(output.contains("info depth"));
        let bestmoves: Vec<&str> = output
            .lines()
            .filter(|l| l.starts_with("bestmove"))
            .collect();
        assert_eq!(bestmoves.len(), 1);
        let mv = bestmoves[0].split_whitespace().nth(1).unwrap();
        assert!(Board::new().parse_move(mv).is_ok(), "illegal bestmove {mv}");
    }

    #[test]
    fn stop_without_search_is_silent() {
        let (mut session, sink) = session();
        session.handle_line("stop");
        session.handle_line("ponderhit");
        assert_eq!(text(&sink), "");
    }

    #[test]
    fn malformed_go_is_swallowed() {
        let (mut session, sink) = session();
        session.handle_line("position startpos");
        session.handle_line("go movetime banana");
        session.handle_line("isready");
        let output = text(&sink);
        assert!(!output.contains("bestmove"));
        assert!(output.contains("readyok"));
    }

    #[test]
    fn go_infinite_answers_only_after_stop() {
        let (mut session, sink) = session();
        session.handle_line("position startpos");
        session.handle_line("go infinite");
        std::thread::sleep(Duration::from_millis(80));
        assert!(!text(&sink).contains("bestmove"), "answered before stop");
        session.handle_line("stop");
        let output = text(&sink);
        let count = output.matches("bestmove").count();
        assert_eq!(count, 1, "expected exactly one bestmove in: {output}");
    }

    #[test]
    fn ponder_holds_back_until_ponderhit() {
        let (mut session, sink) = session();
        session.handle_line("position startpos moves e2e4");
        session.handle_line("go ponder movetime 50");
        std::thread::sleep(Duration::from_millis(120));
        assert!(!text(&sink).contains("bestmove"), "ponder answered early");
        session.handle_line("ponderhit");
        let output = wait_for_bestmove(&sink);
        session.handle_line("quit");
        assert_eq!(output.matches("bestmove").count(), 1);
        // The search was not restarted: bare depth announcements keep
        // increasing, depth 1 is announced exactly once.
        let depth_one = output
            .lines()
            .filter(|l| l.trim() == "info depth 1")
            .count();
        assert_eq!(depth_one, 1);
    }

    #[test]
    fn ponder_stop_answers_once() {
        let (mut session, sink) = session();
        session.handle_line("position startpos");
        session.handle_line("go ponder");
        std::thread::sleep(Duration::from_millis(50));
        session.handle_line("stop");
        let output = text(&sink);
        assert_eq!(output.matches("bestmove").count(), 1);
    }

    #[test]
    fn quit_stops_a_live_search_and_finishes() {
        let (mut session, sink) = session();
        session.handle_line("position startpos");
        session.handle_line("go infinite");
        session.handle_line("quit");
        assert!(session.finished());
        assert_eq!(text(&sink).matches("bestmove").count(), 1);
    }

    #[test]
    fn setoption_hash_applies_to_next_search() {
        let (mut session, sink) = session();
        session.handle_line("setoption name Hash value 64");
        session.handle_line("isready");
        session.handle_line("position startpos");
        session.handle_line("go depth 3");
        let output = wait_for_bestmove(&sink);
        session.handle_line("quit");
        assert!(output.contains("readyok"));
        assert!(output.contains("bestmove"));
        assert_eq!(session.engine.as_ref().unwrap().options().hash_mb, 64);
    }

    #[test]
    fn only_move_ponder_answers_immediately_on_ponderhit() {
        let (mut session, sink) = session();
        session.handle_line("position fen 7k/8/8/8/8/8/1r6/K7 w - - 0 1");
        session.handle_line("go ponder wtime 300000 btime 300000");
        std::thread::sleep(Duration::from_millis(50));
        assert!(!text(&sink).contains("bestmove"));
        let hit = Instant::now();
        session.handle_line("ponderhit");
        let output = wait_for_bestmove(&sink);
        session.handle_line("quit");
        // The forced move gets a 1 ms budget, not the clock-derived one.
        assert!(hit.elapsed() < Duration::from_secs(1));
        assert!(output.contains("bestmove a1b2"), "got: {output}");
    }

    #[test]
    fn only_move_answers_fast_even_with_a_full_clock() {
        let (mut session, sink) = session();
        session.handle_line("position fen 7k/8/8/8/8/8/1r6/K7 w - - 0 1");
        let started = Instant::now();
        session.handle_line("go wtime 300000 btime 300000");
        let output = wait_for_bestmove(&sink);
        session.handle_line("quit");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(output.contains("bestmove a1b2"), "got: {output}");
    }

    #[test]
    fn stalemate_reports_null_move() {
        let (mut session, sink) = session();
        session.handle_line("position fen k7/8/8/8/8/8/5q2/7K w - - 0 1");
        session.handle_line("go movetime 50");
        let output = wait_for_bestmove(&sink);
        session.handle_line("quit");
        assert!(output.contains("bestmove 0000"));
    }

    #[test]
    fn searchmoves_restricts_the_root() {
        let (mut session, sink) = session();
        session.handle_line("position startpos");
        session.handle_line("go searchmoves a2a3 depth 2");
        let output = wait_for_bestmove(&sink);
        session.handle_line("quit");
        assert!(output.contains("bestmove a2a3"), "got: {output}");
    }

    #[test]
    fn second_go_is_serialized_not_interleaved() {
        let (mut session, sink) = session();
        session.handle_line("position startpos");
        session.handle_line("go infinite");
        session.handle_line("go movetime 30");
        let deadline = Instant::now() + Duration::from_secs(5);
        while text(&sink).matches("bestmove").count() < 2 {
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(5));
        }
        session.handle_line("quit");
        assert_eq!(text(&sink).matches("bestmove").count(), 2);
    }

    #[test]
    fn own_book_plays_instantly_from_startpos() {
        let (mut session, sink) = session();
        session.handle_line("setoption name OwnBook value true");
        session.handle_line("position startpos");
        session.handle_line("go wtime 300000 btime 300000");
        let output = wait_for_bestmove(&sink);
        session.handle_line("quit");
        let mv = output
            .lines()
            .find(|l| l.starts_with("bestmove"))
            .and_then(|l| l.split_whitespace().nth(1))
            .unwrap()
            .to_string();
        assert!(Board::new().parse_move(&mv).is_ok());
    }
}
